//! Integration tests for mosaic builds.
//!
//! These tests run the full pipeline against in-process sources:
//! - web tile source over a PNG-serving HTTP client
//! - tiled store source over a recording reader
//! - in-memory output datasets
//!
//! Run with: `cargo test --test mosaic_integration`

mod common;

use ndarray::{Array3, Axis};

use common::{tile_rgb, MeanBridge, PngTileServer, RecordingReader, TEMPLATE};
use tilemosaic::assembler::build_super_tile;
use tilemosaic::coord::{expand_quadtree, TileCoord};
use tilemosaic::dataset::{MemoryDataset, RasterDataset};
use tilemosaic::geo::{create_webmercator_profile, DataType, Window};
use tilemosaic::source::{BandIndexes, TiledStoreSource, UrlTemplate, WebTileSource};
use tilemosaic::{ExecutionMode, MosaicConfig, MosaicError, MosaicOrchestrator, OrchestratorState};

// ============================================================================
// Helper Functions
// ============================================================================

/// Root tile at zoom 17 whose zoom-19 leaves start at (280000, 180000).
fn z17_root() -> TileCoord {
    TileCoord::new(70_000, 45_000, 17).unwrap()
}

fn web_source(server: PngTileServer) -> WebTileSource<PngTileServer> {
    WebTileSource::new(server, UrlTemplate::new(TEMPLATE).unwrap())
}

// ============================================================================
// Integration Tests
// ============================================================================

/// Zoom 17 → 19 yields 16 leaves and a (3, 1024, 1024) super tile.
#[test]
fn test_super_tile_17_to_19() {
    let root = z17_root();
    let leaves = expand_quadtree(root, 19).unwrap();
    assert_eq!(leaves.len(), 16);

    let source = web_source(PngTileServer::new(256));
    let buffer = build_super_tile(&source, &root, 19, &BandIndexes::rgb(), 256).unwrap();
    assert_eq!(buffer.dim(), (3, 1024, 1024));
    assert_eq!(source.client().requests(), 16);

    // Leaf (row 2, col 3) is tile (280003, 180002).
    let [r, g, b] = tile_rgb(280_003, 180_002, 19);
    assert_eq!(buffer[[0, 2 * 256 + 5, 3 * 256 + 5]], r as f32);
    assert_eq!(buffer[[1, 2 * 256 + 5, 3 * 256 + 5]], g as f32);
    assert_eq!(buffer[[2, 2 * 256 + 5, 3 * 256 + 5]], b as f32);
}

/// End to end with a one-channel bridge: a single window of one channel.
#[test]
fn test_end_to_end_with_single_channel_bridge() {
    let config = MosaicConfig::default().with_zooms(17, 19);
    let mut orchestrator = MosaicOrchestrator::new(web_source(PngTileServer::new(256)), z17_root(), config)
        .unwrap()
        .with_inference(MeanBridge);

    let dataset = orchestrator.run(MemoryDataset::create).unwrap();

    assert_eq!(orchestrator.state(), OrchestratorState::Closed);
    assert_eq!(orchestrator.written(), 1);
    assert_eq!(dataset.profile().count, 1);
    assert_eq!(dataset.profile().dtype, DataType::Float32);
    assert_eq!(dataset.data().dim(), (1, 1524, 1524));

    let window = dataset.read_window(&Window::new(250, 250, 1024, 1024)).unwrap();
    let mean = |x: u32, y: u32| {
        let [r, g, b] = tile_rgb(x, y, 19);
        (r as f32 + g as f32 + b as f32) / 3.0
    };
    assert_eq!(window[[0, 0, 0]], mean(280_000, 180_000));
    assert_eq!(window[[0, 1023, 1023]], mean(280_003, 180_003));
    assert_eq!(dataset.data()[[0, 249, 249]], 0.0);
}

/// A 404 leaf becomes a no-data block; the rest of the mosaic is intact.
#[test]
fn test_missing_tile_becomes_nodata() {
    let server = PngTileServer::new(256).with_missing(19, 280_001, 180_000);
    let source = web_source(server).with_nodata(7.0);
    let config = MosaicConfig::default().with_zooms(17, 19).with_nodata(7.0);

    let mut orchestrator = MosaicOrchestrator::new(source, z17_root(), config).unwrap();
    let dataset = orchestrator.run(MemoryDataset::create).unwrap();
    assert_eq!(orchestrator.state(), OrchestratorState::Closed);

    // NE leaf of the first row is missing.
    let missing = dataset.read_window(&Window::new(250 + 256, 250, 256, 256)).unwrap();
    assert!(missing.iter().all(|&v| v == 7.0));

    let [r, _, _] = tile_rgb(280_000, 180_000, 19);
    assert_eq!(dataset.data()[[0, 250, 250]], r as f32);
}

/// Web sources convert 1-based bands to 0-based channels.
#[test]
fn test_web_band_indexes_select_channels() {
    let source = web_source(PngTileServer::new(256));
    let tile = TileCoord::new(280_000, 180_000, 19).unwrap();
    let indexes = BandIndexes::new(vec![3, 1]).unwrap();

    let buffer = build_super_tile(&source, &tile, 19, &indexes, 256).unwrap();
    let [r, _, b] = tile_rgb(280_000, 180_000, 19);
    assert_eq!(buffer.dim(), (2, 256, 256));
    assert_eq!(buffer[[0, 0, 0]], b as f32);
    assert_eq!(buffer[[1, 0, 0]], r as f32);
}

/// Web tiles with a different edge length are resized to the tile size.
#[test]
fn test_web_tiles_resized() {
    let source = web_source(PngTileServer::new(512));
    let tile = TileCoord::new(280_000, 180_000, 19).unwrap();
    let buffer = build_super_tile(&source, &tile, 19, &BandIndexes::rgb(), 256).unwrap();
    assert_eq!(buffer.dim(), (3, 256, 256));
}

/// Store sources pass 1-based bands through unchanged.
#[test]
fn test_store_band_indexes_passed_through() {
    let source = TiledStoreSource::new(RecordingReader::default());
    let tile = TileCoord::new(100, 200, 10).unwrap();
    let indexes = BandIndexes::new(vec![3, 1]).unwrap();

    let buffer = build_super_tile(&source, &tile, 11, &indexes, 256).unwrap();
    let seen = source.reader().bands_seen.lock().clone();
    assert_eq!(seen.len(), 4);
    assert!(seen.iter().all(|bands| bands == &vec![3, 1]));

    let nw = TileCoord::new(200, 400, 11).unwrap();
    assert_eq!(buffer[[0, 0, 0]], RecordingReader::value(3, &nw));
    assert_eq!(buffer[[1, 0, 0]], RecordingReader::value(1, &nw));
}

/// Disjoint windows read back unchanged; untouched pixels keep the fill value.
#[test]
fn test_disjoint_window_writes() {
    let tile = TileCoord::new(8, 12, 5).unwrap();
    let profile = create_webmercator_profile(&tile, 6, 10, 2, DataType::Float32, -1.0).unwrap();
    let mut dataset = MemoryDataset::create(&profile).unwrap();

    let first = Window::new(10, 10, 256, 256);
    let second = Window::new(266, 266, 256, 256);
    assert!(!first.intersects(&second));

    let a = Array3::from_shape_fn((2, 256, 256), |(c, r, k)| (c + r + k) as f32);
    let b = Array3::from_elem((2, 256, 256), 5.0);
    dataset.write_window(&second, b.view()).unwrap();
    dataset.write_window(&first, a.view()).unwrap();
    dataset.close().unwrap();

    assert_eq!(dataset.read_window(&first).unwrap(), a);
    assert_eq!(dataset.read_window(&second).unwrap(), b);
    let untouched = dataset.read_window(&Window::new(266, 10, 256, 256)).unwrap();
    assert!(untouched.iter().all(|&v| v == -1.0));
    assert_eq!(dataset.data()[[1, 0, 0]], -1.0);
}

/// The worker pool writes exactly what the sequential loop writes.
#[test]
fn test_worker_pool_matches_sequential() {
    let root = TileCoord::new(300, 500, 16).unwrap();
    let base = MosaicConfig::default().with_zooms(17, 18).with_padding(16);

    let mut sequential = MosaicOrchestrator::new(
        TiledStoreSource::new(RecordingReader::default()),
        root,
        base.clone(),
    )
    .unwrap();
    let expected = sequential.run(MemoryDataset::create).unwrap();

    let pool = base.with_execution(ExecutionMode::WorkerPool {
        workers: 3,
        batch_size: 1,
    });
    let mut pooled =
        MosaicOrchestrator::new(TiledStoreSource::new(RecordingReader::default()), root, pool).unwrap();
    let actual = pooled.run(MemoryDataset::create).unwrap();

    assert_eq!(pooled.written(), 4);
    assert_eq!(expected.data(), actual.data());
    // Band 2 values fit in uint8.
    let nw = TileCoord::new(1200, 2000, 18).unwrap();
    assert_eq!(actual.data()[[1, 16, 16]], RecordingReader::value(2, &nw));
}

/// A store failure aborts the run and leaves the orchestrator failed.
#[test]
fn test_store_failure_aborts_run() {
    let root = TileCoord::new(300, 500, 16).unwrap();
    let bad_leaf = TileCoord::new(1203, 2002, 18).unwrap();
    let config = MosaicConfig::default()
        .with_zooms(17, 18)
        .with_execution(ExecutionMode::WorkerPool {
            workers: 2,
            batch_size: 2,
        });

    let source = TiledStoreSource::new(RecordingReader::failing_on(bad_leaf));
    let mut orchestrator = MosaicOrchestrator::new(source, root, config).unwrap();
    let err = orchestrator.run(MemoryDataset::create).unwrap_err();

    match err {
        MosaicError::SourceUnreadable { tile, reason } => {
            assert_eq!(tile, bad_leaf);
            assert!(reason.contains("truncated block"));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(orchestrator.state(), OrchestratorState::Failed);
}

/// An intermediate zoom finer than the super-resolution zoom is rejected.
#[test]
fn test_inverted_zoom_rejected() {
    let config = MosaicConfig::default().with_zooms(19, 17);
    let result = MosaicOrchestrator::new(web_source(PngTileServer::new(256)), z17_root(), config);
    assert!(matches!(result, Err(MosaicError::ProfileComputation(_))));
}

/// Each intermediate window covers exactly its own tile's leaves.
#[test]
fn test_intermediate_windows_are_disjoint_and_cover_footprint() {
    let root = TileCoord::new(300, 500, 16).unwrap();
    let config = MosaicConfig::default().with_zooms(17, 18).with_padding(0);
    let mut orchestrator =
        MosaicOrchestrator::new(TiledStoreSource::new(RecordingReader::default()), root, config).unwrap();
    let dataset = orchestrator.run(MemoryDataset::create).unwrap();

    // Without padding every pixel belongs to some leaf.
    let band = dataset.data().index_axis(Axis(0), 0);
    assert_eq!(band.dim(), (1024, 1024));
    for (row, col) in [(0, 0), (0, 1), (1, 0), (3, 3)] {
        let leaf = TileCoord::new(1200 + col as u32, 2000 + row as u32, 18).unwrap();
        assert_eq!(band[[row * 256 + 100, col * 256 + 100]], RecordingReader::value(1, &leaf));
    }
}
