use std::any::Any;
use std::fs;
use std::io;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use flume::Sender;
use itertools::Itertools as _;
use qgisweb::{QgisWebWriter, QwError, bundle, bundle_path, wrap_document};
use tracing::{debug, error, info, info_span, warn};

use crate::job::{CancellationToken, GenerationJob, GenerationResult, JobEvent, JobState};
use crate::plan::plan_tile_ranges;
use crate::render::{Renderer, TileRenderer};
use crate::{TilepackError, TilepackResult};

/// What the worker shares with the [`JobHandle`](crate::job::JobHandle).
#[derive(Debug, Clone)]
pub(crate) struct JobContext {
    pub(crate) events: Sender<JobEvent>,
    pub(crate) cancel: CancellationToken,
    pub(crate) state: Arc<Mutex<JobState>>,
}

impl JobContext {
    fn send(&self, event: JobEvent) {
        // nobody listening is fine
        let _ = self.events.send(event);
    }

    fn info(&self, msg: String) {
        info!("{msg}");
        self.send(JobEvent::Info(msg));
    }

    fn transition(&self, next: JobState) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if state.can_transition_to(next) {
            debug!("Job state {} -> {next}", *state);
            *state = next;
        } else {
            error!("Ignoring illegal job state change {} -> {next}", *state);
        }
    }
}

/// Runs a job to its end and reports the terminal event.
pub(crate) fn run_job(
    job: &GenerationJob,
    renderer: &mut dyn Renderer,
    ctx: &JobContext,
) -> TilepackResult<GenerationResult> {
    let span = info_span!("generate", output = %job.output.display());
    let _enter = span.enter();

    ctx.transition(JobState::Planning);
    let outcome = catch_unwind(AssertUnwindSafe(|| run_pipeline(job, renderer, ctx)))
        .unwrap_or_else(|panic| {
            remove_partial_output(&job.output);
            Err(TilepackError::WorkerPanicked(panic_message(&*panic)))
        });
    match outcome {
        Ok(result) => {
            ctx.send(JobEvent::Finished {
                cancelled: result.cancelled,
                errors: result.errors.clone(),
                output: result.output.clone(),
            });
            Ok(result)
        }
        Err(e) => {
            error!("Tile generation failed: {e}");
            ctx.transition(JobState::Failed);
            ctx.send(JobEvent::Failed(e.to_string()));
            Err(e)
        }
    }
}

/// Removes whatever a panicking pipeline left at `path`.
fn remove_partial_output(path: &Path) {
    match fs::remove_file(path) {
        Ok(()) => debug!("Removed unfinished container {}", path.display()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => warn!("Unable to remove unfinished container {}: {e}", path.display()),
    }
}

pub(crate) fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(msg) = panic.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = panic.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}

fn run_pipeline(
    job: &GenerationJob,
    renderer: &mut dyn Renderer,
    ctx: &JobContext,
) -> TilepackResult<GenerationResult> {
    if !job.projection.is_web_mercator() {
        return Err(TilepackError::UnsupportedProjection(job.projection));
    }
    if !renderer.supports(job.projection) {
        return Err(TilepackError::ProjectionNotRenderable(job.projection));
    }
    if job.bundle && bundle_path(&job.output) == job.output {
        return Err(QwError::BundleOverwritesSource(job.output.clone()).into());
    }

    let zooms: Vec<u8> = job.zooms.iter().copied().sorted_unstable().dedup().collect();
    info!(
        "Generating tiles for extent {} at zoom levels {zooms:?} into {}",
        job.extent,
        job.output.display()
    );
    let plan = plan_tile_ranges(&job.extent, &zooms);
    let mut errors = Vec::new();
    for zoom in &plan.zooms {
        if let Some(summary) = zoom.summary() {
            ctx.info(summary);
        }
        if let Some(issue) = zoom.issue {
            warn!("{issue}");
            if issue.is_error() {
                errors.push(issue.to_string());
            } else {
                ctx.send(JobEvent::Info(issue.to_string()));
            }
        }
    }
    let total = plan.total;
    ctx.send(JobEvent::ProgressStarted(total));

    let mut writer = QgisWebWriter::create(&job.output, &job.extent)?;
    if plan.is_empty() {
        ctx.info("No tiles to generate".to_string());
    } else {
        ctx.transition(JobState::Rendering);
        let tile_renderer = TileRenderer::new(job.tile_size, job.render_margin, job.projection);
        let every = job.progress_every.max(1);
        for (done, coord) in (1..).zip(plan.tiles()) {
            if ctx.cancel.is_cancelled() {
                return cancel(writer, errors, ctx);
            }
            match tile_renderer.render_tile(renderer, &job.layers, coord) {
                Ok(tile) => {
                    if tile.placeholder {
                        ctx.send(JobEvent::Info(format!(
                            "Tile {coord}: the renderer returned no image, a transparent tile was stored"
                        )));
                    }
                    if let Err(e) = writer.write_tile(&tile.to_record()) {
                        if let Err(discard_err) = writer.discard() {
                            warn!("{discard_err}");
                        }
                        return Err(e.into());
                    }
                }
                Err(skip) => {
                    warn!("{skip}");
                    errors.push(skip.to_string());
                }
            }
            if done % every == 0 || done == total {
                ctx.send(JobEvent::ProgressUpdated(done));
            }
        }
    }

    ctx.transition(JobState::Finalizing);
    let tiles_written = writer.tiles_written();
    let path = writer.finish()?;
    wrap_document(&path)?;
    let output = if job.bundle {
        let outcome = bundle(&path)?;
        if let Some(cleanup_error) = outcome.cleanup_error {
            errors.push(cleanup_error);
        }
        outcome.archive_path
    } else {
        path
    };

    ctx.transition(JobState::Completed);
    info!(
        "Saved {tiles_written} tiles to {} with {} warnings",
        output.display(),
        errors.len()
    );
    Ok(GenerationResult {
        state: JobState::Completed,
        cancelled: false,
        errors,
        output: Some(output),
        tiles_written,
    })
}

fn cancel(
    writer: QgisWebWriter,
    mut errors: Vec<String>,
    ctx: &JobContext,
) -> TilepackResult<GenerationResult> {
    let tiles_written = writer.tiles_written();
    let path: PathBuf = writer.path().to_path_buf();
    if let Err(e) = writer.discard() {
        warn!("{e}");
        errors.push(e.to_string());
    }
    ctx.transition(JobState::Cancelled);
    ctx.info(format!(
        "Tile generation cancelled after {tiles_written} tiles, {} was removed",
        path.display()
    ));
    Ok(GenerationResult {
        state: JobState::Cancelled,
        cancelled: true,
        errors,
        output: None,
        tiles_written,
    })
}

#[cfg(test)]
mod tests {
    use image::RgbaImage;
    use pretty_assertions::assert_eq;
    use tilepack_tile_utils::GeoExtent;

    use super::*;
    use crate::render::{LayerSet, RenderRequest, TileProjection, TileSize};

    struct SolidRenderer;

    impl Renderer for SolidRenderer {
        fn render(&mut self, _layers: &LayerSet, request: &RenderRequest) -> Option<RgbaImage> {
            Some(RgbaImage::from_pixel(
                request.width,
                request.height,
                image::Rgba([10, 20, 30, 255]),
            ))
        }
    }

    /// Cancels the job from inside the renderer after the given number of tiles.
    struct CancellingRenderer {
        cancel: CancellationToken,
        after: usize,
        calls: usize,
    }

    impl Renderer for CancellingRenderer {
        fn render(&mut self, _layers: &LayerSet, request: &RenderRequest) -> Option<RgbaImage> {
            self.calls += 1;
            if self.calls == self.after {
                self.cancel.cancel();
            }
            Some(RgbaImage::new(request.width, request.height))
        }
    }

    fn context() -> (JobContext, flume::Receiver<JobEvent>) {
        let (events, rx) = flume::unbounded();
        let ctx = JobContext {
            events,
            cancel: CancellationToken::default(),
            state: Arc::new(Mutex::new(JobState::Idle)),
        };
        (ctx, rx)
    }

    fn small_job(dir: &tempfile::TempDir) -> GenerationJob {
        let mut job = GenerationJob::new(
            dir.path().join("tiles.qgisweb"),
            GeoExtent::new(0.0, 0.0, 0.01, 0.01),
            [10],
        );
        job.tile_size = TileSize::square(4);
        job.render_margin = 0;
        job.progress_every = 4;
        job
    }

    fn state(ctx: &JobContext) -> JobState {
        *ctx.state.lock().unwrap()
    }

    #[test]
    fn test_events_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let (ctx, rx) = context();
        let result = run_job(&small_job(&dir), &mut SolidRenderer, &ctx).unwrap();
        assert_eq!(result.tiles_written, 9);
        assert_eq!(state(&ctx), JobState::Completed);

        let events: Vec<JobEvent> = rx.drain().collect();
        assert_eq!(
            events,
            vec![
                JobEvent::Info("Zoom 10: X=511-513, Y=510-512 (9 tiles)".to_string()),
                JobEvent::ProgressStarted(9),
                JobEvent::ProgressUpdated(4),
                JobEvent::ProgressUpdated(8),
                JobEvent::ProgressUpdated(9),
                JobEvent::Finished {
                    cancelled: false,
                    errors: Vec::new(),
                    output: Some(dir.path().join("tiles.qgisweb")),
                },
            ]
        );
    }

    #[test]
    fn test_unsupported_projection_fails() {
        let dir = tempfile::tempdir().unwrap();
        let (ctx, rx) = context();
        let mut job = small_job(&dir);
        job.projection = TileProjection(4326);
        let err = run_job(&job, &mut SolidRenderer, &ctx).unwrap_err();
        assert!(matches!(err, TilepackError::UnsupportedProjection(_)));
        assert_eq!(state(&ctx), JobState::Failed);
        assert!(!job.output.exists());
        assert!(matches!(rx.drain().last(), Some(JobEvent::Failed(_))));
    }

    #[test]
    fn test_cancel_removes_file() {
        let dir = tempfile::tempdir().unwrap();
        let (ctx, rx) = context();
        let mut renderer = CancellingRenderer {
            cancel: ctx.cancel.clone(),
            after: 2,
            calls: 0,
        };
        let job = small_job(&dir);
        let result = run_job(&job, &mut renderer, &ctx).unwrap();
        assert!(result.cancelled);
        assert_eq!(result.tiles_written, 2);
        assert_eq!(renderer.calls, 2);
        assert_eq!(state(&ctx), JobState::Cancelled);
        assert!(!job.output.exists());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
        assert_eq!(
            rx.drain().last(),
            Some(JobEvent::Finished {
                cancelled: true,
                errors: Vec::new(),
                output: None,
            })
        );
    }

    #[test]
    fn test_bundle_into_own_path_fails() {
        let dir = tempfile::tempdir().unwrap();
        let (ctx, rx) = context();
        let mut job = small_job(&dir);
        job.output = dir.path().join("tiles.zip");
        job.bundle = true;

        let err = run_job(&job, &mut SolidRenderer, &ctx).unwrap_err();
        assert!(matches!(
            err,
            TilepackError::Container(QwError::BundleOverwritesSource(_))
        ));
        assert_eq!(state(&ctx), JobState::Failed);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
        assert!(matches!(rx.drain().last(), Some(JobEvent::Failed(_))));
    }

    #[test]
    fn test_dropped_receiver_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let (ctx, rx) = context();
        drop(rx);
        let result = run_job(&small_job(&dir), &mut SolidRenderer, &ctx).unwrap();
        assert_eq!(result.state, JobState::Completed);
    }
}
