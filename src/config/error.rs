use std::fmt;

#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Json(serde_json::Error),
    DateParse(chrono::ParseError),
    Geometry(String),
    Atmosphere(String),
    Aerosol(String),
    TooManyModes(usize),
    Surface(String),
    Spectrum(String),
    Correction(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "I/O error: {}", e),
            ConfigError::Json(e) => write!(f, "Failed to parse JSON: {}", e),
            ConfigError::DateParse(e) => write!(f, "Failed to parse date: {}", e),
            ConfigError::Geometry(msg) => write!(f, "Invalid geometry: {}", msg),
            ConfigError::Atmosphere(msg) => write!(f, "Invalid atmosphere: {}", msg),
            ConfigError::Aerosol(msg) => write!(f, "Invalid aerosol model: {}", msg),
            ConfigError::TooManyModes(n) => {
                write!(f, "size distribution has {} modes, at most 4 are supported", n)
            }
            ConfigError::Surface(msg) => write!(f, "Invalid surface: {}", msg),
            ConfigError::Spectrum(msg) => write!(f, "Invalid spectral conditions: {}", msg),
            ConfigError::Correction(msg) => write!(f, "Invalid correction request: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<std::io::Error> for ConfigError {
    fn from(err: std::io::Error) -> ConfigError {
        ConfigError::Io(err)
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(err: serde_json::Error) -> ConfigError {
        ConfigError::Json(err)
    }
}

impl From<chrono::ParseError> for ConfigError {
    fn from(err: chrono::ParseError) -> ConfigError {
        ConfigError::DateParse(err)
    }
}
