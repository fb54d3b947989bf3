#![allow(clippy::cast_possible_truncation, clippy::cast_precision_loss, clippy::cast_sign_loss)]

use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};
use std::path::Path;

use serde::Serialize;
use size_format::SizeFormatterBinary;
use tilepack_tile_utils::{GeoExtent, TileRect};

use crate::wrap::is_bundle;
use crate::{Container, QwResult, read_container};

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ZoomInfo {
    pub zoom: u8,
    pub tile_count: u64,
    pub min_tile_size: u64,
    pub max_tile_size: u64,
    pub avg_tile_size: f64,
    /// Smallest tile rectangle containing every tile of this zoom
    pub range: TileRect,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ContainerSummary {
    pub file_size: Option<u64>,
    pub bundled: bool,
    pub extent: GeoExtent,
    pub tile_count: u64,
    /// Records whose `x`, `y` or `z` is not a valid tile index
    pub invalid_tiles: u64,
    pub zoom_info: Vec<ZoomInfo>,
}

impl ContainerSummary {
    /// Reads the container at `path` (plain or bundled) and summarizes it.
    pub fn from_file(path: &Path) -> QwResult<Self> {
        let container = read_container(path)?;
        let mut summary = Self::from_container(&container);
        summary.file_size = path.metadata().ok().map(|m| m.len());
        summary.bundled = is_bundle(path);
        Ok(summary)
    }

    #[must_use]
    pub fn from_container(container: &Container) -> Self {
        let mut per_zoom: BTreeMap<u8, (Vec<u64>, TileRect)> = BTreeMap::new();
        let mut invalid_tiles = 0;
        for tile in &container.tiles {
            let Some(c) = tile.coord() else {
                invalid_tiles += 1;
                continue;
            };
            let (sizes, rect) = per_zoom
                .entry(c.z)
                .or_insert_with(|| (Vec::new(), TileRect::new(c.z, c.x, c.y, c.x, c.y)));
            sizes.push(tile.image_size());
            *rect = TileRect::new(
                c.z,
                rect.min_x.min(c.x),
                rect.min_y.min(c.y),
                rect.max_x.max(c.x),
                rect.max_y.max(c.y),
            );
        }

        let zoom_info: Vec<ZoomInfo> = per_zoom
            .into_iter()
            .map(|(zoom, (sizes, range))| {
                let tile_count = sizes.len() as u64;
                ZoomInfo {
                    zoom,
                    tile_count,
                    min_tile_size: sizes.iter().copied().min().unwrap_or(0),
                    max_tile_size: sizes.iter().copied().max().unwrap_or(0),
                    avg_tile_size: sizes.iter().sum::<u64>() as f64 / tile_count as f64,
                    range,
                }
            })
            .collect();

        Self {
            file_size: None,
            bundled: false,
            extent: container.params.extent.to_extent(),
            tile_count: zoom_info.iter().map(|z| z.tile_count).sum(),
            invalid_tiles,
            zoom_info,
        }
    }
}

impl Display for ContainerSummary {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if let Some(file_size) = self.file_size {
            let file_size = SizeFormatterBinary::new(file_size);
            writeln!(f, "File size: {file_size:.2}B")?;
        } else {
            writeln!(f, "File size: unknown")?;
        }
        writeln!(f, "Bundled: {}", if self.bundled { "yes" } else { "no" })?;
        let e = &self.extent;
        writeln!(
            f,
            "Extent: {:.6}, {:.6}, {:.6}, {:.6}",
            e.west, e.south, e.east, e.north
        )?;
        writeln!(f, "Tiles: {}", self.tile_count)?;
        if self.invalid_tiles > 0 {
            writeln!(f, "Invalid tile records: {}", self.invalid_tiles)?;
        }
        if self.zoom_info.is_empty() {
            return Ok(());
        }

        writeln!(f)?;
        writeln!(
            f,
            "|{:^9}|{:^9}|{:^9}|{:^9}|{:^9}| {:^28} |",
            "Zoom", "Count", "Smallest", "Largest", "Average", "Tile range"
        )?;
        for l in &self.zoom_info {
            let min = SizeFormatterBinary::new(l.min_tile_size);
            let max = SizeFormatterBinary::new(l.max_tile_size);
            let avg = SizeFormatterBinary::new(l.avg_tile_size as u64);
            writeln!(
                f,
                "|{:>9}|{:>9}|{:>9}|{:>9}|{:>9}| {:<28} |",
                l.zoom,
                l.tile_count,
                format!("{min:.2}B"),
                format!("{max:.2}B"),
                format!("{avg:.2}B"),
                format!(
                    "X={}-{}, Y={}-{}",
                    l.range.min_x, l.range.max_x, l.range.min_y, l.range.max_y
                ),
            )?;
        }
        Ok(())
    }
}
