//! Rectangles of tiles at a single zoom level.
//!
//! A [`TileRect`] is the unit the planner works in: the covering set of an extent is a
//! rectangle, the one-tile safety border grows it, and rendering walks it column by column.

use std::fmt::{Display, Formatter};

use serde::Serialize;

use crate::{TileCoord, max_tile_index};

/// A rectangular region in tile coordinate space.
///
/// Both min and max coordinates are inclusive.
///
/// # Examples
///
/// ```
/// # use tilepack_tile_utils::TileRect;
/// let rect = TileRect::new(10, 0, 0, 255, 255);
/// assert_eq!(rect.size(), 256 * 256);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileRect {
    /// The zoom level of the tiles
    pub zoom: u8,
    /// The minimum X coordinate (inclusive)
    pub min_x: u32,
    /// The minimum Y coordinate (inclusive)
    pub min_y: u32,
    /// The maximum X coordinate (inclusive)
    pub max_x: u32,
    /// The maximum Y coordinate (inclusive)
    pub max_y: u32,
}

impl Display for TileRect {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}: ({},{}) - ({},{})",
            self.zoom, self.min_x, self.min_y, self.max_x, self.max_y
        )
    }
}

impl Serialize for TileRect {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::ser::Serializer,
    {
        serializer.collect_str(self)
    }
}

impl TileRect {
    /// Creates a new `TileRect` with the specified coordinates.
    ///
    /// # Panics
    ///
    /// Panics if `min_x > max_x` or `min_y > max_y`.
    #[must_use]
    pub fn new(zoom: u8, min_x: u32, min_y: u32, max_x: u32, max_y: u32) -> Self {
        assert!(min_x <= max_x);
        assert!(min_y <= max_y);
        TileRect {
            zoom,
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }

    /// Total number of tiles contained in this rectangle.
    ///
    /// ```
    /// # use tilepack_tile_utils::TileRect;
    /// // x = 0..=2 => 3 tiles
    /// // y = 0..=3 => 4 tiles
    /// let rect = TileRect::new(2, 0, 0, 2, 3);
    /// assert_eq!(rect.size(), 3 * 4);
    /// ```
    #[must_use]
    pub fn size(&self) -> u64 {
        u64::from(self.max_x - self.min_x + 1) * u64::from(self.max_y - self.min_y + 1)
    }

    /// True if `other` is at the same zoom and lies entirely within `self`.
    #[must_use]
    pub fn contains(&self, other: &Self) -> bool {
        self.zoom == other.zoom
            && self.min_x <= other.min_x
            && self.max_x >= other.max_x
            && self.min_y <= other.min_y
            && self.max_y >= other.max_y
    }

    /// Grows the rectangle by `border` tiles in every direction, clamped to the
    /// valid index range `[0, 2^zoom - 1]` of its zoom level.
    ///
    /// ```
    /// # use tilepack_tile_utils::TileRect;
    /// let rect = TileRect::new(3, 0, 4, 2, 4).expand_clamped(1);
    /// assert_eq!(rect, TileRect::new(3, 0, 3, 3, 5));
    ///
    /// // the single tile of zoom 0 cannot grow
    /// let root = TileRect::new(0, 0, 0, 0, 0);
    /// assert_eq!(root.expand_clamped(1), root);
    /// ```
    #[must_use]
    pub fn expand_clamped(&self, border: u32) -> Self {
        let max = max_tile_index(self.zoom);
        TileRect::new(
            self.zoom,
            self.min_x.saturating_sub(border),
            self.min_y.saturating_sub(border),
            self.max_x.saturating_add(border).min(max),
            self.max_y.saturating_add(border).min(max),
        )
    }

    /// Iterates over every tile of the rectangle, x ascending, then y ascending.
    pub fn iter(&self) -> impl Iterator<Item = TileCoord> + use<> {
        let Self {
            zoom: z,
            min_y,
            max_y,
            ..
        } = *self;
        (self.min_x..=self.max_x)
            .flat_map(move |x| (min_y..=max_y).map(move |y| TileCoord { z, x, y }))
    }
}
