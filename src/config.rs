//! Execution configuration and symbol mapping loaders.
//! Mission: one immutable, validated config object per process, never a global.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::errors::ConfigError;
use crate::model::UnifiedSymbol;

/// `dry` persists opportunities without executing; `live` trades.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    Dry,
    Live,
}

impl Default for RunMode {
    fn default() -> Self {
        RunMode::Dry
    }
}

/// Execution parameters, grounded on `config/execution_loader.py`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionConfig {
    pub mode: RunMode,
    pub max_capital_per_market: Decimal,
    pub max_contracts_per_event: u64,
    pub min_net_profit: Decimal,
    pub max_stale_seconds: f64,
}

impl ExecutionConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path_ref = path.as_ref();
        let contents =
            std::fs::read_to_string(path_ref).map_err(|source| ConfigError::Io {
                path: path_ref.display().to_string(),
                source,
            })?;
        let config: Self =
            serde_json::from_str(&contents).map_err(|source| ConfigError::Parse {
                path: path_ref.display().to_string(),
                source,
            })?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.max_capital_per_market <= Decimal::ZERO {
            return Err(ConfigError::Invalid(
                "max_capital_per_market must be positive".into(),
            ));
        }
        if self.max_contracts_per_event == 0 {
            return Err(ConfigError::Invalid(
                "max_contracts_per_event must be positive".into(),
            ));
        }
        if self.max_stale_seconds <= 0.0 {
            return Err(ConfigError::Invalid(
                "max_stale_seconds must be positive".into(),
            ));
        }
        Ok(())
    }
}

/// One row of the symbol mapping file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContractMapping {
    pub unified_symbol: UnifiedSymbol,
    pub description: String,
    pub venue_a_ticker: String,
    pub venue_b_yes_id: String,
    pub venue_b_no_id: String,
}

#[derive(Debug, Deserialize)]
struct SymbolMapFile {
    mappings: Vec<ContractMapping>,
}

/// Immutable, boot-time-constructed symbol map, shared by reference with
/// normalizers and the orchestrator — built once, never mutated after load,
/// and never stashed behind a process-wide global.
#[derive(Debug)]
pub struct SymbolMap {
    mappings: Vec<ContractMapping>,
}

impl SymbolMap {
    /// Build a map directly from already-parsed rows, bypassing the file
    /// loader. Used by tests and by callers that source mappings from
    /// somewhere other than a JSON file.
    pub fn from_mappings(mappings: Vec<ContractMapping>) -> Self {
        Self { mappings }
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path_ref = path.as_ref();
        let contents =
            std::fs::read_to_string(path_ref).map_err(|source| ConfigError::Io {
                path: path_ref.display().to_string(),
                source,
            })?;
        let file: SymbolMapFile =
            serde_json::from_str(&contents).map_err(|source| ConfigError::Parse {
                path: path_ref.display().to_string(),
                source,
            })?;
        if file.mappings.is_empty() {
            return Err(ConfigError::Invalid(
                "symbol map must contain at least one mapping".into(),
            ));
        }
        Ok(Self {
            mappings: file.mappings,
        })
    }

    pub fn by_unified(&self, symbol: &str) -> Option<&ContractMapping> {
        self.mappings.iter().find(|m| m.unified_symbol == symbol)
    }

    pub fn by_venue_a_ticker(&self, ticker: &str) -> Option<&ContractMapping> {
        self.mappings.iter().find(|m| m.venue_a_ticker == ticker)
    }

    /// Resolve a V-RPC contract id to (unified symbol, side).
    pub fn by_venue_b_id(&self, id: &str) -> Option<(&ContractMapping, crate::model::Side)> {
        self.mappings
            .iter()
            .find(|m| m.venue_b_yes_id == id)
            .map(|m| (m, crate::model::Side::Yes))
            .or_else(|| {
                self.mappings
                    .iter()
                    .find(|m| m.venue_b_no_id == id)
                    .map(|m| (m, crate::model::Side::No))
            })
    }

    pub fn mappings(&self) -> &[ContractMapping] {
        &self.mappings
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_temp(contents: &str) -> tempfile::NamedTempFile {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(contents.as_bytes()).unwrap();
        f
    }

    #[test]
    fn loads_valid_execution_config() {
        let f = write_temp(
            r#"{"mode":"dry","max_capital_per_market":"50.00","max_contracts_per_event":100,"min_net_profit":"0.00","max_stale_seconds":5.0}"#,
        );
        let cfg = ExecutionConfig::load(f.path()).unwrap();
        assert_eq!(cfg.mode, RunMode::Dry);
        assert_eq!(cfg.max_contracts_per_event, 100);
    }

    #[test]
    fn rejects_non_positive_capital() {
        let f = write_temp(
            r#"{"mode":"dry","max_capital_per_market":"0.00","max_contracts_per_event":100,"min_net_profit":"0.00","max_stale_seconds":5.0}"#,
        );
        assert!(ExecutionConfig::load(f.path()).is_err());
    }

    #[test]
    fn loads_symbol_map_and_resolves_lookups() {
        let f = write_temp(
            r#"{"mappings":[{"unified_symbol":"FED-MAR-25BPS","description":"Fed cuts 25bps in March","venue_a_ticker":"FED-25MAR-T25","venue_b_yes_id":"tok_yes_1","venue_b_no_id":"tok_no_1"}]}"#,
        );
        let map = SymbolMap::load(f.path()).unwrap();
        assert!(map.by_unified("FED-MAR-25BPS").is_some());
        assert!(map.by_venue_a_ticker("FED-25MAR-T25").is_some());
        let (mapping, side) = map.by_venue_b_id("tok_no_1").unwrap();
        assert_eq!(mapping.unified_symbol, "FED-MAR-25BPS");
        assert_eq!(side, crate::model::Side::No);
    }
}
