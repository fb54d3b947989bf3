#![doc = include_str!("../README.md")]
#![forbid(unsafe_code)]

use std::f64::consts::PI;
use std::fmt::{Display, Formatter};

mod extent;
pub use extent::{GeoExtent, TileUtilsError, clamp_latitude, clamp_longitude};

mod projected;
pub use projected::ProjectedRect;

mod rectangle;
pub use rectangle::TileRect;

pub const EARTH_RADIUS: f64 = 6_378_137.0;
pub const EARTH_CIRCUMFERENCE: f64 = 2.0 * PI * EARTH_RADIUS;

/// Longitude bound of the tiled world, in degrees.
pub const MAX_LONGITUDE: f64 = 180.0;
/// Maximum latitude representable in Web Mercator tiles, in degrees.
pub const MAX_LATITUDE: f64 = 85.051_129;

/// Highest zoom level supported by the `u32` tile index arithmetic.
pub const MAX_ZOOM: u8 = 30;

/// Nudge applied to fractional tile positions before flooring.
const TILE_EPSILON: f64 = 1e-14;
/// Pulls the lower-right extent corner inside its tile so an extent ending
/// exactly on a tile edge does not pick up the next row/column.
const LL_EPSILON: f64 = 1e-11;

/// Tile coordinate in the XYZ (slippy map) scheme, with `y` growing southwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TileCoord {
    pub z: u8,
    pub x: u32,
    pub y: u32,
}

impl TileCoord {
    /// Creates a tile coordinate, or `None` if `x`/`y` fall outside the `2^z` grid.
    #[must_use]
    pub fn new_checked(z: u8, x: u32, y: u32) -> Option<Self> {
        if z > MAX_ZOOM {
            return None;
        }
        let max = max_tile_index(z);
        (x <= max && y <= max).then_some(Self { z, x, y })
    }
}

impl Display for TileCoord {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}/{}", self.z, self.x, self.y)
    }
}

/// Largest valid tile column/row at the given zoom, i.e. `2^z - 1`.
///
/// Zoom levels above [`MAX_ZOOM`] are treated as [`MAX_ZOOM`].
#[must_use]
pub fn max_tile_index(zoom: u8) -> u32 {
    (1_u32 << zoom.min(MAX_ZOOM)) - 1
}

#[must_use]
pub fn wgs84_to_webmercator(lon: f64, lat: f64) -> (f64, f64) {
    let x = lon.to_radians() * EARTH_RADIUS;
    let y = lat.to_radians().tan().asinh() * EARTH_RADIUS;
    (x, y)
}

#[must_use]
pub fn webmercator_to_wgs84(x: f64, y: f64) -> (f64, f64) {
    let lng = (x / EARTH_RADIUS).to_degrees();
    let lat = f64::atan(f64::sinh(y / EARTH_RADIUS)).to_degrees();
    (lng, lat)
}

/// Returns the `(x, y)` index of the tile containing the given point.
///
/// Points on or beyond the world edges land in the first or last row/column.
#[must_use]
#[expect(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn tile_index(lng: f64, lat: f64, zoom: u8) -> (u32, u32) {
    let zoom = zoom.min(MAX_ZOOM);
    let tiles = f64::from(1_u32 << zoom);
    let max = max_tile_index(zoom);

    let x = lng / 360.0 + 0.5;
    let sin_lat = lat.to_radians().sin();
    let y = 0.5 - 0.25 * ((1.0 + sin_lat) / (1.0 - sin_lat)).ln() / PI;

    let to_index = |v: f64| -> u32 {
        if v.is_nan() || v <= 0.0 {
            0
        } else if v >= 1.0 {
            max
        } else {
            (((v + TILE_EPSILON) * tiles).floor() as u32).min(max)
        }
    };
    (to_index(x), to_index(y))
}

/// Computes the rectangle of tiles covering the extent at the given zoom.
///
/// The extent is clamped to the tiled world first. Returns `None` when the clamped
/// extent is degenerate (`west >= east` or `south >= north`, or any coordinate is NaN),
/// or when `zoom` exceeds [`MAX_ZOOM`].
#[must_use]
pub fn tiles_covering_extent(extent: &GeoExtent, zoom: u8) -> Option<TileRect> {
    if zoom > MAX_ZOOM {
        return None;
    }
    let clamped = extent.clamped();
    if clamped.is_degenerate() {
        return None;
    }
    let (min_x, min_y) = tile_index(clamped.west, clamped.north, zoom);
    let (max_x, max_y) = tile_index(clamped.east - LL_EPSILON, clamped.south + LL_EPSILON, zoom);
    (min_x <= max_x && min_y <= max_y).then(|| TileRect::new(zoom, min_x, min_y, max_x, max_y))
}

/// Bounds of a tile in Web Mercator metres.
#[must_use]
pub fn tile_projected_bounds(coord: TileCoord) -> ProjectedRect {
    let tile_size = tile_length_from_zoom(coord.z);
    let left = f64::from(coord.x) * tile_size - EARTH_CIRCUMFERENCE / 2.0;
    let top = EARTH_CIRCUMFERENCE / 2.0 - f64::from(coord.y) * tile_size;
    ProjectedRect::new(left, top - tile_size, left + tile_size, top)
}

/// Side length of a tile at the given zoom, in Web Mercator metres.
#[must_use]
pub fn tile_length_from_zoom(zoom: u8) -> f64 {
    EARTH_CIRCUMFERENCE / f64::from(1_u32 << zoom.min(MAX_ZOOM))
}
