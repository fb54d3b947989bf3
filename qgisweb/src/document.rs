//! Serde model of a decoded `.qgisweb` document.
//!
//! Every value in the document is a string: coordinates use 8 decimals with a comma
//! as the decimal separator, tile indexes are plain decimal numbers, and tile images
//! are base64-encoded PNG.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};
use tilepack_tile_utils::{GeoExtent, TileCoord};

/// Text written for coordinates that are not finite.
pub const NON_FINITE_COORD: &str = "0,00000000";

/// Formats a coordinate the way the container stores it: 8 decimals, comma separator.
///
/// ```
/// # use qgisweb::format_coord;
/// assert_eq!(format_coord(0.01), "0,01000000");
/// assert_eq!(format_coord(-122.419_4), "-122,41940000");
/// assert_eq!(format_coord(f64::NAN), "0,00000000");
/// ```
#[must_use]
pub fn format_coord(value: f64) -> String {
    if value.is_finite() {
        format!("{value:.8}").replace('.', ",")
    } else {
        NON_FINITE_COORD.to_string()
    }
}

/// Inverse of [`format_coord`]. Returns `None` for text that is not a number.
#[must_use]
pub fn parse_coord(value: &str) -> Option<f64> {
    value.trim().replace(',', ".").parse().ok()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Container {
    pub params: ContainerParams,
    pub tiles: Vec<TileRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContainerParams {
    pub extent: ExtentParams,
}

/// Extent block of the container header, always in EPSG:4326 degrees.
///
/// `dxy`, `dh` and `epsg` are reserved and always written as `"0"`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtentParams {
    pub lon_min: String,
    pub lon_max: String,
    pub lat_min: String,
    pub lat_max: String,
    pub dxy: String,
    pub dh: String,
    pub epsg: String,
}

impl ExtentParams {
    #[must_use]
    pub fn from_extent(extent: &GeoExtent) -> Self {
        Self {
            lon_min: format_coord(extent.west),
            lon_max: format_coord(extent.east),
            lat_min: format_coord(extent.south),
            lat_max: format_coord(extent.north),
            dxy: "0".to_string(),
            dh: "0".to_string(),
            epsg: "0".to_string(),
        }
    }

    /// Parses the four coordinates back. Unparsable values become NaN.
    #[must_use]
    pub fn to_extent(&self) -> GeoExtent {
        let parse = |v: &str| parse_coord(v).unwrap_or(f64::NAN);
        GeoExtent::new(
            parse(&self.lon_min),
            parse(&self.lat_min),
            parse(&self.lon_max),
            parse(&self.lat_max),
        )
    }
}

/// One tile of the container. Key order on disk is `x`, `y`, `z`, `t`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TileRecord {
    pub x: String,
    pub y: String,
    pub z: String,
    /// Base64 (standard alphabet, padded) PNG image
    pub t: String,
}

impl TileRecord {
    /// Builds a record from already base64-encoded image text.
    #[must_use]
    pub fn new(coord: TileCoord, encoded: String) -> Self {
        Self {
            x: coord.x.to_string(),
            y: coord.y.to_string(),
            z: coord.z.to_string(),
            t: encoded,
        }
    }

    #[must_use]
    pub fn from_png(coord: TileCoord, png: &[u8]) -> Self {
        Self::new(coord, STANDARD.encode(png))
    }

    /// Tile coordinate of the record, or `None` if the indexes are not valid numbers
    /// or fall outside the grid of their zoom level.
    #[must_use]
    pub fn coord(&self) -> Option<TileCoord> {
        TileCoord::new_checked(
            self.z.parse().ok()?,
            self.x.parse().ok()?,
            self.y.parse().ok()?,
        )
    }

    pub fn decode_image(&self) -> Result<Vec<u8>, base64::DecodeError> {
        STANDARD.decode(&self.t)
    }

    /// Size of the decoded image in bytes, computed from the base64 text length.
    #[must_use]
    pub fn image_size(&self) -> u64 {
        let len = self.t.len() as u64;
        let padding = self.t.bytes().rev().take_while(|&b| b == b'=').count() as u64;
        (len / 4 * 3).saturating_sub(padding)
    }
}
