// Server settings: an optional JSON file plus environment overrides

use super::server::ServerConfig;
use crate::domain::solver_service::{SolverBackend, SolverError};
use crate::domain::value_objects::ProblemFormat;
use crate::solver::SolverFactory;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;
use tracing::debug;

/// File named by this variable is read first
pub const CONFIG_ENV: &str = "LETSMODEL_CONFIG";
pub const ADDRESS_ENV: &str = "LETSMODEL_ADDRESS";
pub const SOLVER_ENV: &str = "LETSMODEL_SOLVER";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Could not read {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("Invalid settings: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid listen address '{0}'")]
    Address(String),

    #[error(transparent)]
    Solver(#[from] SolverError),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub address: String,
    pub solver: SolverBackend,
    pub default_format: ProblemFormat,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            address: "0.0.0.0:50051".to_string(),
            solver: SolverBackend::Auto,
            default_format: ProblemFormat::Lp,
        }
    }
}

impl Settings {
    /// Defaults, then the file named by `LETSMODEL_CONFIG`, then the
    /// `LETSMODEL_ADDRESS` and `LETSMODEL_SOLVER` overrides
    pub fn load() -> Result<Self, ConfigError> {
        let mut settings = match std::env::var(CONFIG_ENV) {
            Ok(path) => Self::from_file(&path)?,
            Err(_) => Self::default(),
        };
        if let Ok(address) = std::env::var(ADDRESS_ENV) {
            settings.address = address;
        }
        if let Ok(solver) = std::env::var(SOLVER_ENV) {
            settings.solver = solver.parse()?;
        }
        debug!(?settings, "settings loaded");
        Ok(settings)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&text)
    }

    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn server_config(&self) -> Result<ServerConfig, ConfigError> {
        let address: SocketAddr = self
            .address
            .parse()
            .map_err(|_| ConfigError::Address(self.address.clone()))?;
        let solver = SolverFactory::create_from_backend(self.solver)?;
        Ok(ServerConfig::new(address, solver).with_default_format(self.default_format))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn partial_files_keep_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"default_format": "nl", "solver": "coin_cbc"}}"#).unwrap();

        let settings = Settings::from_file(file.path()).unwrap();
        assert_eq!(settings.default_format, ProblemFormat::Nl);
        assert_eq!(settings.solver, SolverBackend::CoinCbc);
        assert_eq!(settings.address, Settings::default().address);
    }

    #[test]
    fn bad_addresses_are_reported() {
        let settings = Settings {
            address: "not an address".to_string(),
            ..Settings::default()
        };
        assert!(matches!(
            settings.server_config(),
            Err(ConfigError::Address(_))
        ));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(matches!(
            Settings::from_json(r#"{"port": 1}"#),
            Err(ConfigError::Parse(_))
        ));
    }
}
