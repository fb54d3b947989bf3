//! Tile generation jobs.
//!
//! A [`GenerationJob`] is submitted to a [`Generator`], which runs it on a dedicated worker
//! thread and hands back a [`JobHandle`]. The handle receives [`JobEvent`]s, can cancel the
//! job between two tiles, and yields the final [`GenerationResult`].

use std::fmt::{Display, Formatter};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use itertools::Itertools as _;
use tilepack_tile_utils::GeoExtent;

use crate::render::{DEFAULT_RENDER_MARGIN, LayerSet, TileProjection, TileSize};

mod generator;
pub use generator::{Generator, JobHandle};

mod pipeline;

/// Progress is reported after this many tiles by default.
pub const DEFAULT_PROGRESS_EVERY: u64 = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Idle,
    Planning,
    Rendering,
    Finalizing,
    Completed,
    Failed,
    Cancelled,
}

impl JobState {
    /// Whether the job may move from `self` to `next`.
    #[must_use]
    pub fn can_transition_to(self, next: Self) -> bool {
        use JobState::{Cancelled, Completed, Failed, Finalizing, Idle, Planning, Rendering};
        matches!(
            (self, next),
            (Idle, Planning)
                | (Planning, Rendering | Finalizing | Failed)
                | (Rendering, Finalizing | Cancelled | Failed)
                | (Finalizing, Completed | Failed)
        )
    }

    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }
}

impl Display for JobState {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Planning => "planning",
            Self::Rendering => "rendering",
            Self::Finalizing => "finalizing",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        };
        f.write_str(name)
    }
}

/// Everything needed to generate one container.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationJob {
    /// Path of the container to create
    pub output: PathBuf,
    /// Zoom levels, ascending and without duplicates
    pub zooms: Vec<u8>,
    /// Wrap the finished container into a zip archive
    pub bundle: bool,
    pub tile_size: TileSize,
    /// Pixels rendered around each tile and cropped afterwards
    pub render_margin: u32,
    pub extent: GeoExtent,
    pub layers: LayerSet,
    pub projection: TileProjection,
    /// Send a progress event after this many tiles
    pub progress_every: u64,
}

impl GenerationJob {
    /// A job with default tile size, margin, projection and progress interval.
    #[must_use]
    pub fn new(
        output: impl Into<PathBuf>,
        extent: GeoExtent,
        zooms: impl IntoIterator<Item = u8>,
    ) -> Self {
        Self {
            output: output.into(),
            zooms: zooms.into_iter().sorted_unstable().dedup().collect(),
            bundle: false,
            tile_size: TileSize::default(),
            render_margin: DEFAULT_RENDER_MARGIN,
            extent,
            layers: LayerSet::default(),
            projection: TileProjection::default(),
            progress_every: DEFAULT_PROGRESS_EVERY,
        }
    }
}

/// Messages sent from the worker while a job runs. The last one is always
/// either [`JobEvent::Finished`] or [`JobEvent::Failed`].
#[derive(Debug, Clone, PartialEq)]
pub enum JobEvent {
    /// Total number of tiles to render
    ProgressStarted(u64),
    /// Number of tiles processed so far
    ProgressUpdated(u64),
    /// Informational line, e.g. a zoom range summary
    Info(String),
    Finished {
        cancelled: bool,
        errors: Vec<String>,
        output: Option<PathBuf>,
    },
    Failed(String),
}

/// Outcome of a job that ran to completion or was cancelled.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationResult {
    pub state: JobState,
    pub cancelled: bool,
    /// Non-fatal problems in the order they happened
    pub errors: Vec<String>,
    /// Final artifact, the `.zip` file when bundled. `None` when cancelled.
    pub output: Option<PathBuf>,
    pub tiles_written: u64,
}

impl GenerationResult {
    /// One consolidated message for the user.
    #[must_use]
    pub fn summary(&self) -> String {
        if self.cancelled {
            return "Tile generation was cancelled, no container was written".to_string();
        }
        let output = self
            .output
            .as_ref()
            .map_or_else(String::new, |p| p.display().to_string());
        if self.errors.is_empty() {
            format!("Saved {} tiles to {output}", self.tiles_written)
        } else {
            format!(
                "Saved {} tiles to {output} with {} warnings:\n{}",
                self.tiles_written,
                self.errors.len(),
                self.errors.iter().map(|e| format!("  - {e}")).join("\n")
            )
        }
    }
}

/// Cooperative cancellation flag, checked by the worker before every tile.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}
