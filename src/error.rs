use std::path::PathBuf;

use thiserror::Error;

use crate::config::ConfigError;

/// Errors surfaced by the radiative-transfer engine.
///
/// Numerical guard conditions (near-zero denominators, unsafe log-log
/// brackets) are handled where they occur and never reach this type.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Gauss-Legendre roots did not converge for n = {n} on [{a}, {b}]")]
    Quadrature { a: f64, b: f64, n: usize },

    #[error("aerosol cache {path}: {reason}")]
    Cache { path: PathBuf, reason: String },

    #[error("embedded table {name}: {reason}")]
    Data { name: &'static str, reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("numerical failure in {stage}: {reason}")]
    Numerical { stage: &'static str, reason: String },
}

impl EngineError {
    pub fn cache<P: Into<PathBuf>>(path: P, reason: impl Into<String>) -> Self {
        EngineError::Cache {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;
