// 🗺️ Geography Code Table - UF names → IBGE codes
//
// Names map to stable IBGE codes. Country and macro-region rows are kept in
// the table so the resolver can use them to find where data starts, but they
// are flagged as aggregates and never become state-level observations.

use crate::error::{IndicatorError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

// ============================================================================
// GEOGRAPHY LEVEL
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GeoLevel {
    /// Unidade federativa (state)
    #[serde(rename = "uf")]
    State,

    /// Município
    #[serde(rename = "mun")]
    Municipality,
}

impl GeoLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            GeoLevel::State => "uf",
            GeoLevel::Municipality => "mun",
        }
    }
}

impl fmt::Display for GeoLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GeoLevel {
    type Err = IndicatorError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "uf" => Ok(GeoLevel::State),
            "mun" => Ok(GeoLevel::Municipality),
            other => Err(IndicatorError::InvalidGeoLevel(other.to_string())),
        }
    }
}

// ============================================================================
// STATIC TABLE
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeographyKind {
    State,
    /// Country or macro-region total
    Aggregate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GeographyEntry {
    pub name: &'static str,
    pub code: &'static str,
    pub kind: GeographyKind,
}

const fn state(name: &'static str, code: &'static str) -> GeographyEntry {
    GeographyEntry { name, code, kind: GeographyKind::State }
}

const fn aggregate(name: &'static str, code: &'static str) -> GeographyEntry {
    GeographyEntry { name, code, kind: GeographyKind::Aggregate }
}

/// IBGE UF codes, in code order, followed by the country and its regions
pub const IBGE_GEOGRAPHIES: &[GeographyEntry] = &[
    state("Rondônia", "11"),
    state("Acre", "12"),
    state("Amazonas", "13"),
    state("Roraima", "14"),
    state("Pará", "15"),
    state("Amapá", "16"),
    state("Tocantins", "17"),
    state("Maranhão", "21"),
    state("Piauí", "22"),
    state("Ceará", "23"),
    state("Rio Grande do Norte", "24"),
    state("Paraíba", "25"),
    state("Pernambuco", "26"),
    state("Alagoas", "27"),
    state("Sergipe", "28"),
    state("Bahia", "29"),
    state("Minas Gerais", "31"),
    state("Espírito Santo", "32"),
    state("Rio de Janeiro", "33"),
    state("São Paulo", "35"),
    state("Paraná", "41"),
    state("Santa Catarina", "42"),
    state("Rio Grande do Sul", "43"),
    state("Mato Grosso do Sul", "50"),
    state("Mato Grosso", "51"),
    state("Goiás", "52"),
    state("Distrito Federal", "53"),
    aggregate("Brasil", "0"),
    aggregate("Norte", "1"),
    aggregate("Nordeste", "2"),
    aggregate("Sudeste", "3"),
    aggregate("Sul", "4"),
    aggregate("Centro-Oeste", "5"),
];

// ============================================================================
// LOOKUP TABLE
// ============================================================================

/// Exact-name lookup over a fixed set of geographies
///
/// No fuzzy matching: "São Paulo " and "são paulo" are both unknown. Callers
/// that read cells are expected to trim them first.
#[derive(Debug, Clone)]
pub struct GeographyTable {
    entries: &'static [GeographyEntry],
    by_name: HashMap<&'static str, GeographyEntry>,
}

impl GeographyTable {
    pub fn new(entries: &'static [GeographyEntry]) -> Self {
        let by_name = entries.iter().map(|e| (e.name, *e)).collect();
        GeographyTable { entries, by_name }
    }

    /// Shared IBGE table
    pub fn ibge() -> &'static GeographyTable {
        static TABLE: OnceLock<GeographyTable> = OnceLock::new();
        TABLE.get_or_init(|| GeographyTable::new(IBGE_GEOGRAPHIES))
    }

    /// Canonical id for an exact name (states and aggregates alike)
    pub fn resolve(&self, name: &str) -> Option<&'static str> {
        self.by_name.get(name).map(|e| e.code)
    }

    pub fn is_known(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    /// Country and macro-region rows
    pub fn is_aggregate(&self, name: &str) -> bool {
        self.by_name
            .get(name)
            .map(|e| e.kind == GeographyKind::Aggregate)
            .unwrap_or(false)
    }

    pub fn states(&self) -> impl Iterator<Item = &GeographyEntry> {
        self.entries.iter().filter(|e| e.kind == GeographyKind::State)
    }

    /// State codes in table order
    pub fn state_codes(&self) -> Vec<&'static str> {
        self.states().map(|e| e.code).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for GeographyTable {
    fn default() -> Self {
        GeographyTable::ibge().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_state() {
        let table = GeographyTable::ibge();
        assert_eq!(table.resolve("São Paulo"), Some("35"));
        assert_eq!(table.resolve("Distrito Federal"), Some("53"));
    }

    #[test]
    fn test_resolve_is_exact() {
        let table = GeographyTable::ibge();
        assert_eq!(table.resolve("são paulo"), None);
        assert_eq!(table.resolve(" São Paulo"), None);
        assert_eq!(table.resolve("Sao Paulo"), None);
    }

    #[test]
    fn test_aggregates() {
        let table = GeographyTable::ibge();
        assert!(table.is_aggregate("Brasil"));
        assert!(table.is_aggregate("Centro-Oeste"));
        assert!(!table.is_aggregate("Bahia"));
        assert!(!table.is_aggregate("Atlantis"));
        // aggregates still resolve, the extractor is what filters them
        assert_eq!(table.resolve("Sudeste"), Some("3"));
    }

    #[test]
    fn test_names_are_unique() {
        let table = GeographyTable::ibge();
        assert_eq!(table.len(), IBGE_GEOGRAPHIES.len());
        assert_eq!(table.by_name.len(), IBGE_GEOGRAPHIES.len());
    }

    #[test]
    fn test_state_codes() {
        let codes = GeographyTable::ibge().state_codes();
        assert_eq!(codes.len(), 27);
        assert_eq!(codes.first(), Some(&"11"));
        assert_eq!(codes.last(), Some(&"53"));
    }

    #[test]
    fn test_geo_level_round_trip() {
        assert_eq!("uf".parse::<GeoLevel>().unwrap(), GeoLevel::State);
        assert_eq!(GeoLevel::Municipality.to_string(), "mun");
        assert!("county".parse::<GeoLevel>().is_err());
    }
}
