use std::path::PathBuf;

use clap::Parser;
use clap::builder::Styles;
use clap::builder::styling::AnsiColor;
use tilepack_tile_utils::GeoExtent;

use crate::render::TileSize;

/// Defines the styles used for the CLI help output.
const HELP_STYLES: Styles = Styles::styled()
    .header(AnsiColor::Blue.on_default().bold())
    .usage(AnsiColor::Blue.on_default().bold())
    .literal(AnsiColor::White.on_default())
    .placeholder(AnsiColor::Green.on_default());

#[derive(Parser, Debug, Default, PartialEq)]
#[command(
    about = "Render a map extent into a pyramid of PNG tiles and package it as a .qgisweb container",
    version,
    after_help = "Use RUST_LOG environment variable to control logging level, e.g. RUST_LOG=debug or RUST_LOG=tilepack=debug.\nUse TILEPACK_FORMAT environment variable to control output format: compact (default), full, pretty, bare or json.",
    styles = HELP_STYLES
)]
pub struct Args {
    /// Path to a configuration file. Command line arguments override its values.
    #[arg(short, long)]
    pub config: Option<PathBuf>,
    /// Save the effective configuration into a file, or print it to stdout with `-`.
    #[arg(long)]
    pub save_config: Option<PathBuf>,
    /// Path of the container to create, usually ending with `.qgisweb`.
    #[arg(short, long)]
    pub output: Option<PathBuf>,
    /// Extent to render in degrees, as `west,south,east,north`. Can be given several
    /// times, the union of all extents is rendered.
    #[arg(long, value_name = "WEST,SOUTH,EAST,NORTH", allow_hyphen_values = true)]
    pub bbox: Vec<GeoExtent>,
    /// Minimum zoom level to render [DEFAULT: 0]
    #[arg(long, alias = "minzoom", conflicts_with("zoom_levels"))]
    pub min_zoom: Option<u8>,
    /// Maximum zoom level to render
    #[arg(long, alias = "maxzoom", conflicts_with("zoom_levels"))]
    pub max_zoom: Option<u8>,
    /// List of zoom levels to render
    #[arg(short, long, alias = "zooms", value_delimiter = ',')]
    pub zoom_levels: Vec<u8>,
    /// Store the container as the only entry of a zip archive next to it.
    #[arg(long)]
    pub bundle: bool,
    /// Tile size in pixels, either `256` or `WIDTHxHEIGHT`. [DEFAULT: 256]
    #[arg(long)]
    pub tile_size: Option<TileSize>,
    /// Pixels rendered around each tile and cropped afterwards. [DEFAULT: 1000]
    #[arg(long)]
    pub render_margin: Option<u32>,
    /// EPSG code of the tile projection. [DEFAULT: 3857]
    #[arg(long, value_name = "CODE")]
    pub tile_epsg: Option<u32>,
    /// Map layer to draw. Can be given several times, layers are drawn in order.
    #[arg(short, long = "layer", value_name = "NAME")]
    pub layers: Vec<String>,
    /// Report progress after this many tiles. [DEFAULT: 20]
    #[arg(long)]
    pub progress_every: Option<u64>,
}
