use std::io;
use std::path::PathBuf;

use qgisweb::QwError;

use crate::config::ConfigFileError;
use crate::render::TileProjection;

pub type TilepackResult<T> = Result<T, TilepackError>;

/// Errors that stop a job or the command line tool.
///
/// Problems with a single zoom level or a single tile are not errors of this kind;
/// they are collected into [`GenerationResult::errors`](crate::job::GenerationResult::errors).
#[derive(thiserror::Error, Debug)]
pub enum TilepackError {
    #[error("Tile projection {0} is not supported, only EPSG:3857 (or its alias EPSG:900913) can be used for tiles")]
    UnsupportedProjection(TileProjection),

    #[error("The renderer cannot draw in projection {0}")]
    ProjectionNotRenderable(TileProjection),

    #[error("A tile generation job is already running")]
    JobAlreadyRunning,

    #[error(transparent)]
    Container(#[from] QwError),

    #[error(transparent)]
    ConfigFileError(#[from] ConfigFileError),

    #[error("Unable to start the tile generation worker: {0}")]
    WorkerSpawn(#[source] io::Error),

    #[error("Tile generation worker panicked: {0}")]
    WorkerPanicked(String),

    #[error("No zoom levels were given. Use --max-zoom (with an optional --min-zoom) or --zoom-levels")]
    NoZoomLevels,

    #[error("Minimum zoom {0} is larger than the maximum zoom {1}")]
    InvalidZoomRange(u8, u8),

    #[error("No extent was given. Use --bbox west,south,east,north at least once")]
    NoExtent,

    #[error("Output path is not set. Use --output <FILE>.qgisweb")]
    NoOutput,

    #[error("Output directory {} does not exist", .0.display())]
    MissingOutputDirectory(PathBuf),

    #[error("Tile width and height must be larger than zero, got {0}x{1}")]
    InvalidTileSize(u32, u32),
}
