//! INI parsing logic for converting `Ini` → `ConfigFile`.
//!
//! This is the single place where INI key names are mapped to struct fields.

use std::path::PathBuf;
use std::str::FromStr;

use ini::{Ini, Properties};

use super::file::{ConfigFile, ConfigFileError};
use super::settings::{ExecutionMode, InferenceConfig, SourceConfig, DEFAULT_BATCH_SIZE, DEFAULT_WORKERS};
use crate::geo::DataType;
use crate::inference::DEFAULT_INFERENCE_TIMEOUT_SECS;
use crate::source::{BandIndexes, DEFAULT_TIMEOUT_SECS};

fn invalid(section: &str, key: &str, value: &str, reason: &str) -> ConfigFileError {
    ConfigFileError::InvalidValue {
        section: section.to_string(),
        key: key.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

/// Parses `section.key` if present.
fn parse_opt<T: FromStr>(
    props: &Properties,
    section: &str,
    key: &str,
    reason: &str,
) -> Result<Option<T>, ConfigFileError> {
    match props.get(key) {
        Some(v) => v
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| invalid(section, key, v, reason)),
        None => Ok(None),
    }
}

fn required<'a>(props: &'a Properties, section: &str, key: &str) -> Result<&'a str, ConfigFileError> {
    props
        .get(key)
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ConfigFileError::MissingValue {
            section: section.to_string(),
            key: key.to_string(),
        })
}

/// Parse an `Ini` object into a `ConfigFile`.
///
/// Starts from `ConfigFile::default()` and overlays any values found in the INI.
pub(super) fn parse_ini(ini: &Ini) -> Result<ConfigFile, ConfigFileError> {
    let mut config = ConfigFile::default();

    // [mosaic] section
    if let Some(section) = ini.section(Some("mosaic")) {
        let mosaic = &mut config.mosaic;
        if let Some(v) = parse_opt(section, "mosaic", "intermediate_zoom", "must be a zoom level (0-30)")? {
            mosaic.intermediate_zoom = v;
        }
        if let Some(v) = parse_opt(section, "mosaic", "super_res_zoom", "must be a zoom level (0-30)")? {
            mosaic.super_res_zoom = v;
        }
        if let Some(v) = parse_opt(section, "mosaic", "tile_size", "must be a positive integer (pixels)")? {
            mosaic.tile_size = v;
        }
        if let Some(v) = parse_opt(section, "mosaic", "padding", "must be a non-negative integer (pixels)")? {
            mosaic.padding = v;
        }
        if let Some(v) = section.get("indexes") {
            mosaic.indexes = v.parse::<BandIndexes>().map_err(|_| {
                invalid("mosaic", "indexes", v, "expected 1-based band list like '1,2,3'")
            })?;
        }
        if let Some(v) = parse_opt(section, "mosaic", "nodata", "must be a number")? {
            mosaic.nodata = v;
        }
        if let Some(v) = section.get("dtype") {
            let v = v.trim();
            mosaic.dtype = match v.to_lowercase().as_str() {
                "auto" | "" => None,
                _ => Some(
                    v.parse::<DataType>()
                        .map_err(|_| invalid("mosaic", "dtype", v, "must be one of: auto, uint8, float32"))?,
                ),
            };
        }
    }

    // [source] section
    if let Some(section) = ini.section(Some("source")) {
        let kind = section.get("type").map(|v| v.trim().to_lowercase());
        config.source = match kind.as_deref().unwrap_or("web") {
            "web" => Some(SourceConfig::Web {
                url_template: required(section, "source", "url")?.to_string(),
                timeout_secs: parse_opt(section, "source", "timeout", "must be a positive integer (seconds)")?
                    .unwrap_or(DEFAULT_TIMEOUT_SECS),
            }),
            "store" => Some(SourceConfig::Store {
                path: required(section, "source", "path")?.to_string(),
            }),
            other => return Err(invalid("source", "type", other, "must be 'web' or 'store'")),
        };
    }

    // [execution] section
    if let Some(section) = ini.section(Some("execution")) {
        let mode = section.get("mode").map(|v| v.trim().to_lowercase());
        config.mosaic.execution = match mode.as_deref().unwrap_or("sequential") {
            "sequential" => ExecutionMode::Sequential,
            "pool" | "worker_pool" => ExecutionMode::WorkerPool {
                workers: parse_opt(section, "execution", "workers", "must be a positive integer")?
                    .unwrap_or(DEFAULT_WORKERS),
                batch_size: parse_opt(section, "execution", "batch_size", "must be a positive integer")?
                    .unwrap_or(DEFAULT_BATCH_SIZE),
            },
            other => {
                return Err(invalid("execution", "mode", other, "must be 'sequential' or 'pool'"));
            }
        };
    }

    // [inference] section
    if let Some(section) = ini.section(Some("inference")) {
        let kind = section.get("type").map(|v| v.trim().to_lowercase());
        config.inference = match kind.as_deref().unwrap_or("none") {
            "none" => InferenceConfig::None,
            "model" => InferenceConfig::Model {
                dictionary: PathBuf::from(required(section, "inference", "model_dictionary")?),
            },
            "rest" => InferenceConfig::Rest {
                url: required(section, "inference", "url")?.to_string(),
                output_channels: parse_opt(section, "inference", "output_channels", "must be a positive integer")?
                    .unwrap_or(1),
                output_size: parse_opt(section, "inference", "output_size", "must be a positive integer (pixels)")?,
                timeout_secs: parse_opt(section, "inference", "timeout", "must be a positive integer (seconds)")?
                    .unwrap_or(DEFAULT_INFERENCE_TIMEOUT_SECS),
            },
            other => {
                return Err(invalid("inference", "type", other, "must be one of: none, model, rest"));
            }
        };
    }

    // [logging] section
    if let Some(section) = ini.section(Some("logging")) {
        if let Some(v) = parse_opt(section, "logging", "level", "must be one of: trace, debug, info, warn, error")? {
            config.logging.level = v;
        }
        if let Some(v) = section.get("directory") {
            let v = v.trim();
            if !v.is_empty() {
                config.logging.directory = Some(PathBuf::from(v));
            }
        }
    }

    Ok(config)
}
