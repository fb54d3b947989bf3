//! Per-tile rendering.
//!
//! The map drawing itself is done by a [`Renderer`]. [`TileRenderer`] turns a tile
//! coordinate into a render request with an anti-aliasing margin, crops the margin away
//! again and encodes the result as PNG.

use std::fmt::{Display, Formatter};
use std::str::FromStr;

use image::{Rgba, RgbaImage};
use serde::{Deserialize, Serialize};
use tilepack_tile_utils::ProjectedRect;

mod graticule;
pub use graticule::{Color, GraticuleConfig, GraticuleRenderer};

mod tile;
pub use tile::{RenderedTile, TileRenderer, TileSkip};

/// Default margin in pixels rendered around each tile and cropped afterwards.
pub const DEFAULT_RENDER_MARGIN: u32 = 1000;

/// EPSG code of the projection tiles are rendered in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TileProjection(pub u32);

impl TileProjection {
    pub const WEB_MERCATOR: Self = Self(3857);
    /// Legacy code of Web Mercator, still found in older projects
    pub const GOOGLE_MERCATOR: Self = Self(900_913);

    #[must_use]
    pub fn is_web_mercator(self) -> bool {
        self == Self::WEB_MERCATOR || self == Self::GOOGLE_MERCATOR
    }
}

impl Default for TileProjection {
    fn default() -> Self {
        Self::WEB_MERCATOR
    }
}

impl Display for TileProjection {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "EPSG:{}", self.0)
    }
}

/// Pixel size of a tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileSize {
    pub width: u32,
    pub height: u32,
}

impl TileSize {
    #[must_use]
    pub fn square(size: u32) -> Self {
        Self {
            width: size,
            height: size,
        }
    }
}

impl Default for TileSize {
    fn default() -> Self {
        Self::square(256)
    }
}

impl Display for TileSize {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if self.width == self.height {
            write!(f, "{}", self.width)
        } else {
            write!(f, "{}x{}", self.width, self.height)
        }
    }
}

impl FromStr for TileSize {
    type Err = String;

    /// Parses `256` or `512x256`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parse = |v: &str| {
            v.trim()
                .parse::<u32>()
                .map_err(|_| format!("Invalid tile size '{s}', expected a size like 256 or 512x256"))
        };
        match s.split_once(['x', 'X']) {
            Some((w, h)) => Ok(Self {
                width: parse(w)?,
                height: parse(h)?,
            }),
            None => parse(s).map(Self::square),
        }
    }
}

impl Serialize for TileSize {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if self.width == self.height {
            serializer.serialize_u32(self.width)
        } else {
            serializer.collect_str(self)
        }
    }
}

impl<'de> Deserialize<'de> for TileSize {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Square(u32),
            Text(String),
        }
        match Raw::deserialize(deserializer)? {
            Raw::Square(v) => Ok(Self::square(v)),
            Raw::Text(v) => v.parse().map_err(serde::de::Error::custom),
        }
    }
}

/// Names of the map layers to draw, handed to the renderer as-is.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LayerSet(Vec<String>);

impl LayerSet {
    #[must_use]
    pub fn new(layers: Vec<String>) -> Self {
        Self(layers)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    #[must_use]
    pub fn contains(&self, layer: &str) -> bool {
        self.iter().any(|l| l == layer)
    }
}

impl<S: Into<String>> FromIterator<S> for LayerSet {
    fn from_iter<T: IntoIterator<Item = S>>(iter: T) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

/// What a [`Renderer`] is asked to draw.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderRequest {
    /// Map area to draw, in the units of `projection`
    pub extent: ProjectedRect,
    pub width: u32,
    pub height: u32,
    pub background: Rgba<u8>,
    pub projection: TileProjection,
}

/// A map rendering backend.
///
/// Calls are synchronous and happen on the generation worker thread, one tile at a time.
pub trait Renderer: Send {
    /// Draws `layers` for the requested area. `None` means the renderer produced no image;
    /// the tile is then stored as a fully transparent placeholder.
    fn render(&mut self, layers: &LayerSet, request: &RenderRequest) -> Option<RgbaImage>;

    /// Whether the renderer can draw in the given projection.
    fn supports(&self, projection: TileProjection) -> bool {
        projection.is_web_mercator()
    }
}

impl<R: Renderer + ?Sized> Renderer for Box<R> {
    fn render(&mut self, layers: &LayerSet, request: &RenderRequest) -> Option<RgbaImage> {
        (**self).render(layers, request)
    }

    fn supports(&self, projection: TileProjection) -> bool {
        (**self).supports(projection)
    }
}
