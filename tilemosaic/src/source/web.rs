//! Tile-map service source.

use image::imageops::FilterType;
use image::DynamicImage;
use ndarray::Array3;
use tracing::{debug, warn};

use super::{check_tile_shape, BandIndexes, HttpClient, RasterSource};
use crate::coord::TileCoord;
use crate::error::{MosaicError, Result};

/// URL template with `{z}`, `{x}` and `{y}` placeholders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlTemplate(String);

impl UrlTemplate {
    /// Creates a template, requiring all three placeholders.
    pub fn new(template: impl Into<String>) -> Result<Self> {
        let template = template.into();
        for placeholder in ["{z}", "{x}", "{y}"] {
            if !template.contains(placeholder) {
                return Err(MosaicError::Config(format!(
                    "tile URL template '{}' is missing {}",
                    template, placeholder
                )));
            }
        }
        Ok(Self(template))
    }

    /// Substitutes the tile address into the template.
    pub fn url_for(&self, tile: &TileCoord) -> String {
        self.0
            .replace("{z}", &tile.z().to_string())
            .replace("{x}", &tile.x().to_string())
            .replace("{y}", &tile.y().to_string())
    }

    /// The raw template.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Fetches tiles from an XYZ tile-map service.
///
/// Any failed request (non-200 status, connection error, timeout) becomes a
/// tile filled with the no-data value and logged at `warn`. Image bytes that
/// arrive but cannot be decoded are an error.
pub struct WebTileSource<C: HttpClient> {
    client: C,
    template: UrlTemplate,
    nodata: f32,
}

impl<C: HttpClient> WebTileSource<C> {
    /// Creates a source with a no-data value of `0`.
    pub fn new(client: C, template: UrlTemplate) -> Self {
        Self {
            client,
            template,
            nodata: 0.0,
        }
    }

    /// Sets the value used to fill tiles that could not be downloaded.
    pub fn with_nodata(mut self, nodata: f32) -> Self {
        self.nodata = nodata;
        self
    }

    /// The HTTP client.
    pub fn client(&self) -> &C {
        &self.client
    }

    fn nodata_tile(&self, channels: usize, tile_size: usize) -> Array3<f32> {
        Array3::from_elem((channels, tile_size, tile_size), self.nodata)
    }
}

impl<C: HttpClient> RasterSource for WebTileSource<C> {
    fn fetch(&self, tile: &TileCoord, indexes: &BandIndexes, tile_size: usize) -> Result<Array3<f32>> {
        let url = self.template.url_for(tile);

        let bytes = match self.client.get(&url) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(tile = %tile, url = %url, error = %e, "Tile unavailable, using no-data");
                return Ok(self.nodata_tile(indexes.len(), tile_size));
            }
        };

        let image = image::load_from_memory(&bytes).map_err(|e| MosaicError::Decode {
            tile: *tile,
            reason: e.to_string(),
        })?;

        let array = image_to_array(tile, image, indexes, tile_size)?;
        check_tile_shape(tile, &array, indexes.len(), tile_size)?;
        Ok(array)
    }

    fn name(&self) -> &str {
        "web"
    }
}

/// Converts a decoded image into a `(bands, tile_size, tile_size)` array.
///
/// Images whose edge differs from `tile_size` are resampled with a cubic
/// filter first. `indexes` are 1-based; a band beyond the image's channel
/// count is a [`MosaicError::ShapeMismatch`].
fn image_to_array(
    tile: &TileCoord,
    image: DynamicImage,
    indexes: &BandIndexes,
    tile_size: usize,
) -> Result<Array3<f32>> {
    let edge = tile_size as u32;
    let image = if image.width() != edge || image.height() != edge {
        debug!(
            tile = %tile,
            width = image.width(),
            height = image.height(),
            tile_size,
            "Resampling tile"
        );
        image.resize_exact(edge, edge, FilterType::CatmullRom)
    } else {
        image
    };

    let (channels, raw): (usize, Vec<u8>) = match image.color().channel_count() {
        1 => (1, image.to_luma8().into_raw()),
        2 => (2, image.to_luma_alpha8().into_raw()),
        3 => (3, image.to_rgb8().into_raw()),
        _ => (4, image.to_rgba8().into_raw()),
    };

    let selected: Vec<usize> = indexes.zero_based().collect();
    if let Some(&missing) = selected.iter().find(|&&c| c >= channels) {
        return Err(MosaicError::shape_mismatch(
            format!("tile {} band {}", tile, missing + 1),
            (selected.len(), tile_size, tile_size),
            (channels, tile_size, tile_size),
        ));
    }

    Ok(Array3::from_shape_fn(
        (selected.len(), tile_size, tile_size),
        |(band, row, col)| f32::from(raw[(row * tile_size + col) * channels + selected[band]]),
    ))
}
