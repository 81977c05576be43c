//! Builds sources and inference bridges from configuration.
//!
//! The variant is picked here once; the rest of the pipeline only sees the
//! boxed trait objects.

use tracing::info;

use super::settings::{InferenceConfig, SourceConfig};
use crate::error::{MosaicError, Result};
use crate::inference::{FirstBandModel, InferenceBridge, ModelDescriptor, Passthrough, RestInference};
use crate::source::{HttpError, RasterSource, ReqwestClient, UrlTemplate, WebTileSource};

fn client_error(e: HttpError) -> MosaicError {
    MosaicError::Config(format!("failed to build HTTP client: {}", e))
}

/// Creates the raster source described by `config`.
///
/// `nodata` fills web tiles whose request fails and store pixels outside the
/// source footprint.
pub fn build_source(config: &SourceConfig, nodata: f64) -> Result<Box<dyn RasterSource>> {
    match config {
        SourceConfig::Web {
            url_template,
            timeout_secs,
        } => {
            let client = ReqwestClient::with_timeout(*timeout_secs).map_err(client_error)?;
            let template = UrlTemplate::new(url_template.as_str())?;
            info!(template = %template.as_str(), timeout_secs, "Using web tile source");
            Ok(Box::new(
                WebTileSource::new(client, template).with_nodata(nodata as f32),
            ))
        }
        SourceConfig::Store { path } => build_store(path, nodata),
    }
}

#[cfg(feature = "gdal")]
fn build_store(path: &str, nodata: f64) -> Result<Box<dyn RasterSource>> {
    use crate::source::{GdalTileReader, TiledStoreSource};

    info!(path, "Using tiled store source");
    let reader = GdalTileReader::new(path).with_fill(nodata as f32);
    Ok(Box::new(TiledStoreSource::new(reader)))
}

#[cfg(not(feature = "gdal"))]
fn build_store(path: &str, _nodata: f64) -> Result<Box<dyn RasterSource>> {
    Err(MosaicError::Config(format!(
        "tiled store source '{}' requires the `gdal` feature",
        path
    )))
}

/// Creates the inference bridge described by `config`.
pub fn build_inference(config: &InferenceConfig) -> Result<Box<dyn InferenceBridge>> {
    match config {
        InferenceConfig::None => Ok(Box::new(Passthrough)),
        InferenceConfig::Model { dictionary } => {
            let descriptor = ModelDescriptor::from_file(dictionary)?;
            info!(
                model = %descriptor.model_file,
                version = %descriptor.model_version,
                "Loaded model dictionary"
            );
            Ok(Box::new(FirstBandModel::new(descriptor)))
        }
        InferenceConfig::Rest {
            url,
            output_channels,
            output_size,
            timeout_secs,
        } => {
            if *output_channels == 0 {
                return Err(MosaicError::Config(
                    "REST inference needs at least one output channel".to_string(),
                ));
            }
            let client = ReqwestClient::with_timeout(*timeout_secs).map_err(client_error)?;
            let mut bridge = RestInference::new(client, url.as_str(), *output_channels);
            if let Some(size) = output_size {
                bridge = bridge.with_output_size(*size);
            }
            info!(url = %url, output_channels, "Using REST inference");
            Ok(Box::new(bridge))
        }
    }
}
