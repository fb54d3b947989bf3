use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use flume::{Receiver, Sender};
use image::{Rgba, RgbaImage};
use pretty_assertions::assert_eq;
use qgisweb::{Container, read_bundle, read_container};
use tilepack::TilepackError;
use tilepack::job::{GenerationJob, GenerationResult, Generator, JobEvent, JobState};
use tilepack::render::{
    GraticuleConfig, GraticuleRenderer, LayerSet, RenderRequest, Renderer, TileSize,
};
use tilepack_tile_utils::{GeoExtent, TileCoord};

const OPAQUE: Rgba<u8> = Rgba([200, 30, 30, 255]);

/// Fills every tile with one color. Returns no image for the calls listed in `none_on`
/// and an image one pixel too wide for the calls listed in `wrong_size_on`.
struct SolidRenderer {
    calls: usize,
    none_on: Vec<usize>,
    wrong_size_on: Vec<usize>,
}

impl SolidRenderer {
    fn new() -> Self {
        Self {
            calls: 0,
            none_on: Vec::new(),
            wrong_size_on: Vec::new(),
        }
    }
}

impl Renderer for SolidRenderer {
    fn render(&mut self, _layers: &LayerSet, request: &RenderRequest) -> Option<RgbaImage> {
        self.calls += 1;
        if self.none_on.contains(&self.calls) {
            return None;
        }
        let width = if self.wrong_size_on.contains(&self.calls) {
            request.width + 1
        } else {
            request.width
        };
        Some(RgbaImage::from_pixel(width, request.height, OPAQUE))
    }
}

/// Announces the first render call and waits until the test lets it continue.
struct GatedRenderer {
    started: Sender<()>,
    proceed: Receiver<()>,
}

impl Renderer for GatedRenderer {
    fn render(&mut self, _layers: &LayerSet, request: &RenderRequest) -> Option<RgbaImage> {
        let _ = self.started.send(());
        // a closed channel means go ahead
        let _ = self.proceed.recv();
        Some(RgbaImage::new(request.width, request.height))
    }
}

fn gated() -> (GatedRenderer, Receiver<()>, Sender<()>) {
    let (started_tx, started_rx) = flume::unbounded();
    let (proceed_tx, proceed_rx) = flume::unbounded();
    let renderer = GatedRenderer {
        started: started_tx,
        proceed: proceed_rx,
    };
    (renderer, started_rx, proceed_tx)
}

fn tiny_job(dir: &Path) -> GenerationJob {
    let mut job = GenerationJob::new(
        dir.join("tiles.qgisweb"),
        GeoExtent::new(0.0, 0.0, 0.01, 0.01),
        [10],
    );
    job.render_margin = 0;
    job
}

fn run(job: GenerationJob, renderer: impl Renderer + 'static) -> (GenerationResult, Vec<JobEvent>) {
    let handle = Generator::new().submit(job, renderer).unwrap();
    let events = handle.events().iter().collect();
    (handle.join().unwrap(), events)
}

fn decode_tile(container: &Container, index: usize) -> RgbaImage {
    let png = container.tiles[index].decode_image().unwrap();
    image::load_from_memory(&png).unwrap().to_rgba8()
}

fn coords(container: &Container) -> Vec<TileCoord> {
    container.tiles.iter().map(|t| t.coord().unwrap()).collect()
}

fn infos(events: &[JobEvent]) -> Vec<&str> {
    events
        .iter()
        .filter_map(|e| match e {
            JobEvent::Info(msg) => Some(msg.as_str()),
            _ => None,
        })
        .collect()
}

#[test]
fn tiny_extent_gives_three_by_three_tiles() {
    let dir = tempfile::tempdir().unwrap();
    let (result, events) = run(tiny_job(dir.path()), SolidRenderer::new());

    assert_eq!(result.state, JobState::Completed);
    assert_eq!(result.errors, Vec::<String>::new());
    assert_eq!(result.tiles_written, 9);
    let output = result.output.unwrap();
    assert_eq!(output, dir.path().join("tiles.qgisweb"));

    let container = read_container(&output).unwrap();
    let extent = &container.params.extent;
    assert_eq!(
        [
            extent.lon_min.as_str(),
            extent.lon_max.as_str(),
            extent.lat_min.as_str(),
            extent.lat_max.as_str()
        ],
        ["0,00000000", "0,01000000", "0,00000000", "0,01000000"]
    );
    assert_eq!((extent.dxy.as_str(), extent.dh.as_str(), extent.epsg.as_str()), ("0", "0", "0"));

    let expected: Vec<TileCoord> = (511..=513)
        .flat_map(|x| (510..=512).map(move |y| TileCoord { z: 10, x, y }))
        .collect();
    assert_eq!(coords(&container), expected);
    for i in 0..9 {
        let img = decode_tile(&container, i);
        assert_eq!(img.dimensions(), (256, 256));
        assert_eq!(*img.get_pixel(128, 128), OPAQUE);
    }

    assert_eq!(events.first(), Some(&JobEvent::Info("Zoom 10: X=511-513, Y=510-512 (9 tiles)".to_string())));
    assert!(events.contains(&JobEvent::ProgressStarted(9)));
    assert!(events.contains(&JobEvent::ProgressUpdated(9)));
}

#[test]
fn degenerate_extent_only_warns() {
    let dir = tempfile::tempdir().unwrap();
    let mut job = tiny_job(dir.path());
    job.extent = GeoExtent::new(0.0, 5.0, 1.0, 5.0);
    job.zooms = vec![3, 5];
    let (result, events) = run(job, SolidRenderer::new());

    assert_eq!(result.state, JobState::Completed);
    assert!(result.errors.is_empty());
    assert_eq!(result.tiles_written, 0);
    let infos = infos(&events);
    assert_eq!(infos.iter().filter(|m| m.contains("has no area")).count(), 2);
    assert!(infos.contains(&"No tiles to generate"));
}

#[test]
fn bad_zoom_does_not_affect_others() {
    let dir = tempfile::tempdir().unwrap();
    let mut job = tiny_job(dir.path());
    job.zooms = vec![10, 31];
    let (result, _) = run(job, SolidRenderer::new());

    assert_eq!(result.state, JobState::Completed);
    assert_eq!(result.tiles_written, 9);
    assert_eq!(result.errors.len(), 1);
    assert!(result.errors[0].starts_with("Zoom 31:"), "{:?}", result.errors);
}

#[test]
fn zero_tiles_writes_empty_container() {
    let dir = tempfile::tempdir().unwrap();
    let mut job = tiny_job(dir.path());
    job.extent = GeoExtent::NULL;
    let (result, events) = run(job, SolidRenderer::new());

    assert_eq!(result.state, JobState::Completed);
    assert!(infos(&events).contains(&"No tiles to generate"));
    assert!(events.contains(&JobEvent::ProgressStarted(0)));
    assert!(!events.iter().any(|e| matches!(e, JobEvent::ProgressUpdated(_))));

    let container = read_container(&result.output.unwrap()).unwrap();
    assert!(container.tiles.is_empty());
    assert_eq!(container.params.extent.lon_min, "0,00000000");
}

#[test]
fn missing_image_gives_transparent_tile() {
    let dir = tempfile::tempdir().unwrap();
    let mut job = tiny_job(dir.path());
    job.tile_size = TileSize::square(64);
    job.render_margin = 20;
    let mut renderer = SolidRenderer::new();
    renderer.none_on = vec![1];
    let (result, events) = run(job, renderer);

    assert_eq!(result.state, JobState::Completed);
    assert!(result.errors.is_empty());
    assert!(
        infos(&events)
            .iter()
            .any(|m| m.starts_with("Tile 10/511/510:") && m.contains("transparent"))
    );

    let container = read_container(&result.output.unwrap()).unwrap();
    assert_eq!(container.tiles.len(), 9);
    let placeholder = decode_tile(&container, 0);
    assert_eq!(placeholder.dimensions(), (64, 64));
    assert!(placeholder.pixels().all(|p| p.0[3] == 0));
    let regular = decode_tile(&container, 1);
    assert_eq!(regular.dimensions(), (64, 64));
    assert!(regular.pixels().all(|p| *p == OPAQUE));
}

#[test]
fn wrong_image_size_skips_one_tile() {
    let dir = tempfile::tempdir().unwrap();
    let mut job = tiny_job(dir.path());
    job.tile_size = TileSize::square(8);
    job.render_margin = 4;
    let mut renderer = SolidRenderer::new();
    renderer.wrong_size_on = vec![5];
    let (result, events) = run(job, renderer);

    assert_eq!(result.state, JobState::Completed);
    assert_eq!(
        result.errors,
        vec!["Renderer returned a 13x12 image for tile 10/512/511, expected 12x12".to_string()]
    );
    assert_eq!(result.tiles_written, 8);

    let container = read_container(&result.output.unwrap()).unwrap();
    assert_eq!(container.tiles.len(), 8);
    assert!(!coords(&container).contains(&TileCoord { z: 10, x: 512, y: 511 }));
    assert!(matches!(
        events.last(),
        Some(JobEvent::Finished { cancelled: false, errors, .. }) if errors.len() == 1
    ));
}

#[test]
fn bundling_a_zip_output_is_refused() {
    let dir = tempfile::tempdir().unwrap();
    let mut job = tiny_job(dir.path());
    job.output = dir.path().join("tiles.zip");
    job.bundle = true;
    job.tile_size = TileSize::square(8);

    let handle = Generator::new().submit(job, SolidRenderer::new()).unwrap();
    let events: Vec<JobEvent> = handle.events().iter().collect();
    let err = handle.join().unwrap_err();
    assert!(err.to_string().contains("already has the bundle extension"));
    assert!(matches!(events.last(), Some(JobEvent::Failed(_))));
    assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[test]
fn bundling_replaces_container_with_zip() {
    let dir = tempfile::tempdir().unwrap();
    let mut job = tiny_job(dir.path());
    job.bundle = true;
    job.tile_size = TileSize::square(8);
    let (result, events) = run(job, SolidRenderer::new());

    let output = result.output.unwrap();
    assert_eq!(output, dir.path().join("tiles.zip"));
    assert!(!dir.path().join("tiles.qgisweb").exists());
    let names: BTreeSet<String> = fs::read_dir(dir.path())
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
        .collect();
    assert_eq!(names, BTreeSet::from(["tiles.zip".to_string()]));

    let (entry, _) = read_bundle(&output).unwrap();
    assert_eq!(entry, "tiles.qgisweb");
    assert_eq!(read_container(&output).unwrap().tiles.len(), 9);
    assert!(matches!(
        events.last(),
        Some(JobEvent::Finished { cancelled: false, output: Some(p), .. }) if *p == output
    ));
}

#[test]
fn cancellation_leaves_no_file() {
    let dir = tempfile::tempdir().unwrap();
    let (renderer, started, proceed) = gated();
    let handle = Generator::new().submit(tiny_job(dir.path()), renderer).unwrap();

    started.recv().unwrap();
    handle.cancel();
    drop(proceed);

    let events: Vec<JobEvent> = handle.events().iter().collect();
    let result = handle.join().unwrap();
    assert!(result.cancelled);
    assert_eq!(result.state, JobState::Cancelled);
    assert_eq!(result.output, None);
    assert_eq!(result.tiles_written, 1);
    assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    assert_eq!(
        events.last(),
        Some(&JobEvent::Finished {
            cancelled: true,
            errors: Vec::new(),
            output: None,
        })
    );
}

#[test]
fn second_submission_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let generator = Generator::new();
    let (renderer, started, proceed) = gated();
    let first = generator.submit(tiny_job(dir.path()), renderer).unwrap();
    started.recv().unwrap();
    assert!(generator.is_busy());
    assert_eq!(first.state(), JobState::Rendering);

    let second = generator.submit(tiny_job(dir.path()), SolidRenderer::new());
    assert!(matches!(second, Err(TilepackError::JobAlreadyRunning)));

    drop(proceed);
    assert_eq!(first.join().unwrap().state, JobState::Completed);
    assert!(!generator.is_busy());

    let third = generator.submit(tiny_job(dir.path()), SolidRenderer::new()).unwrap();
    assert_eq!(third.join().unwrap().tiles_written, 9);
}

#[test]
fn unsupported_projection_fails_the_job() {
    let dir = tempfile::tempdir().unwrap();
    let mut job = tiny_job(dir.path());
    job.projection = tilepack::render::TileProjection(4326);
    let handle = Generator::new().submit(job, SolidRenderer::new()).unwrap();
    let events: Vec<JobEvent> = handle.events().iter().collect();
    let err = handle.join().unwrap_err();

    assert!(matches!(err, TilepackError::UnsupportedProjection(_)));
    assert_eq!(
        events,
        vec![JobEvent::Failed(err.to_string())]
    );
    assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[test]
fn graticule_tiles_join_seamlessly() {
    let dir = tempfile::tempdir().unwrap();
    let mut job = GenerationJob::new(dir.path().join("world.qgisweb"), GeoExtent::MAX_TILED, [1]);
    job.tile_size = TileSize::square(64);
    job.render_margin = 16;
    job.layers = ["background", "graticule"].into_iter().collect();
    let config = GraticuleConfig {
        spacing: 30.0,
        ..GraticuleConfig::default()
    };
    let line = config.color.0;
    let (result, _) = run(job, GraticuleRenderer::new(config));
    assert!(result.errors.is_empty());

    let container = read_container(&result.output.unwrap()).unwrap();
    assert_eq!(
        coords(&container),
        [(0, 0), (0, 1), (1, 0), (1, 1)].map(|(x, y)| TileCoord { z: 1, x, y })
    );
    // the top-left and top-right tiles mirror each other around the prime meridian
    let left = decode_tile(&container, 0);
    let right = decode_tile(&container, 2);
    let lines = |img: &RgbaImage| {
        (0..64)
            .filter(|&x| *img.get_pixel(x, 5) == line)
            .count()
    };
    assert!(lines(&left) > 0);
    assert!(lines(&right) > 0);
}
