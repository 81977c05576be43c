//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};

use image::{DynamicImage, ImageFormat, RgbImage};
use ndarray::{Array3, Array4, Axis};
use parking_lot::Mutex;

use tilemosaic::coord::TileCoord;
use tilemosaic::inference::InferenceBridge;
use tilemosaic::source::{HttpClient, HttpError, TileReader};
use tilemosaic::{MosaicError, Result};

/// URL template served by [`PngTileServer`].
pub const TEMPLATE: &str = "https://tiles.test/{z}/{x}/{y}.png";

/// Colour of every pixel of a served tile: `(x % 256, y % 256, z * 10)`.
pub fn tile_rgb(x: u32, y: u32, z: u8) -> [u8; 3] {
    [(x % 256) as u8, (y % 256) as u8, z.saturating_mul(10)]
}

/// Tile-map service answering every `z/x/y.png` URL with a flat PNG.
pub struct PngTileServer {
    tile_size: u32,
    missing: Vec<String>,
    requests: AtomicUsize,
}

impl PngTileServer {
    pub fn new(tile_size: u32) -> Self {
        Self {
            tile_size,
            missing: Vec::new(),
            requests: AtomicUsize::new(0),
        }
    }

    /// Answers 404 for URLs containing `z/x/y`.
    pub fn with_missing(mut self, z: u8, x: u32, y: u32) -> Self {
        self.missing.push(format!("/{}/{}/{}.png", z, x, y));
        self
    }

    pub fn requests(&self) -> usize {
        self.requests.load(Ordering::Relaxed)
    }

    fn parse(url: &str) -> Option<(u8, u32, u32)> {
        let path = url.strip_prefix("https://tiles.test/")?.strip_suffix(".png")?;
        let mut parts = path.split('/');
        let z = parts.next()?.parse().ok()?;
        let x = parts.next()?.parse().ok()?;
        let y = parts.next()?.parse().ok()?;
        Some((z, x, y))
    }
}

impl HttpClient for PngTileServer {
    fn get(&self, url: &str) -> std::result::Result<Vec<u8>, HttpError> {
        self.requests.fetch_add(1, Ordering::Relaxed);
        if self.missing.iter().any(|m| url.ends_with(m.as_str())) {
            return Err(HttpError::Status(404));
        }
        let (z, x, y) = Self::parse(url).ok_or(HttpError::Status(400))?;

        let image = RgbImage::from_pixel(self.tile_size, self.tile_size, image::Rgb(tile_rgb(x, y, z)));
        let mut bytes = Vec::new();
        DynamicImage::ImageRgb8(image)
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .map_err(|e| HttpError::Transport(e.to_string()))?;
        Ok(bytes)
    }

    fn post_json(
        &self,
        _url: &str,
        _body: &serde_json::Value,
    ) -> std::result::Result<serde_json::Value, HttpError> {
        Err(HttpError::Status(405))
    }
}

/// Store reader whose band `b` of tile `(x, y)` holds `b * 100 + (x + y) % 100`.
///
/// Records the band lists it is asked for and can fail on one tile.
#[derive(Default)]
pub struct RecordingReader {
    pub bands_seen: Mutex<Vec<Vec<usize>>>,
    pub fail_on: Option<TileCoord>,
}

impl RecordingReader {
    pub fn failing_on(tile: TileCoord) -> Self {
        Self {
            fail_on: Some(tile),
            ..Default::default()
        }
    }

    pub fn value(band: usize, tile: &TileCoord) -> f32 {
        (band * 100) as f32 + ((tile.x() + tile.y()) % 100) as f32
    }
}

impl TileReader for RecordingReader {
    fn read_tile(&self, tile: &TileCoord, bands: &[usize], tile_size: usize) -> Result<Array3<f32>> {
        self.bands_seen.lock().push(bands.to_vec());
        if self.fail_on == Some(*tile) {
            return Err(MosaicError::Io(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "truncated block",
            )));
        }
        Ok(Array3::from_shape_fn((bands.len(), tile_size, tile_size), |(c, _, _)| {
            Self::value(bands[c], tile)
        }))
    }
}

/// Bridge producing one channel: the mean over input channels.
pub struct MeanBridge;

impl InferenceBridge for MeanBridge {
    fn predict_batch(&self, batch: Array4<f32>) -> Result<Array4<f32>> {
        let mean = batch
            .mean_axis(Axis(1))
            .ok_or_else(|| MosaicError::Inference("empty channel axis".to_string()))?;
        Ok(mean.insert_axis(Axis(1)))
    }

    fn output_channels(&self) -> Option<usize> {
        Some(1)
    }

    fn name(&self) -> &str {
        "mean"
    }
}
