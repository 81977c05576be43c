//! INI configuration file.
//!
//! ```ini
//! [mosaic]
//! intermediate_zoom = 17
//! super_res_zoom = 19
//! tile_size = 256
//! padding = 250
//! indexes = 1,2,3
//! nodata = 0
//! dtype = uint8
//!
//! [source]
//! type = web
//! url = https://tiles.example.com/{z}/{x}/{y}.png
//! timeout = 30
//!
//! [execution]
//! mode = pool
//! workers = 8
//! batch_size = 4
//!
//! [inference]
//! type = rest
//! url = http://localhost:8501/v1/models/buildings:predict
//! output_channels = 1
//!
//! [logging]
//! level = info
//! directory = logs
//! ```

use std::path::Path;

use ini::Ini;
use thiserror::Error;

use super::settings::{InferenceConfig, LoggingConfig, MosaicConfig, SourceConfig};

/// Errors from loading a configuration file.
#[derive(Debug, Error)]
pub enum ConfigFileError {
    /// Failed to read config file
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] ini::Error),

    /// Config text is not valid INI
    #[error("Failed to parse config: {0}")]
    ParseError(#[from] ini::ParseError),

    /// Invalid configuration value
    #[error("Invalid configuration: {section}.{key} = '{value}' - {reason}")]
    InvalidValue {
        section: String,
        key: String,
        value: String,
        reason: String,
    },

    /// A required key is absent
    #[error("Missing configuration: {section}.{key}")]
    MissingValue { section: String, key: String },
}

/// Everything a configuration file can specify.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigFile {
    pub mosaic: MosaicConfig,
    /// `None` when the file has no `[source]` section.
    pub source: Option<SourceConfig>,
    pub inference: InferenceConfig,
    pub logging: LoggingConfig,
}

impl ConfigFile {
    /// Load configuration from a specific path.
    ///
    /// If the file doesn't exist, returns defaults.
    pub fn load_from(path: &Path) -> Result<Self, ConfigFileError> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let ini = Ini::load_from_file(path)?;
        super::parser::parse_ini(&ini)
    }

    /// Parse configuration from INI text.
    pub fn parse(text: &str) -> Result<Self, ConfigFileError> {
        let ini = Ini::load_from_str(text)?;
        super::parser::parse_ini(&ini)
    }
}
