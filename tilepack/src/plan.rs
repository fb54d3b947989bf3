//! Per-zoom tile ranges of a generation job.
//!
//! For every zoom level the tiles covering the extent are computed and grown by one
//! tile in every direction (clamped to the world), so features near the extent edge are
//! never cut off at a tile boundary.

use std::fmt::{Display, Formatter};

use tilepack_tile_utils::{GeoExtent, MAX_ZOOM, TileCoord, TileRect, tiles_covering_extent};

/// Number of tiles added around the covering tiles on each side.
pub const SAFETY_BORDER: u32 = 1;

/// A problem found while planning one zoom level. The zoom level contributes no tiles.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PlanIssue {
    /// The clamped extent has no area. Reported as a warning only.
    DegenerateExtent { zoom: u8, extent: GeoExtent },
    /// The zoom level cannot be addressed with 32-bit tile indexes.
    ZoomTooLarge { zoom: u8 },
}

impl PlanIssue {
    /// Whether the issue belongs in the error list of the job result.
    #[must_use]
    pub fn is_error(&self) -> bool {
        matches!(self, Self::ZoomTooLarge { .. })
    }
}

impl Display for PlanIssue {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DegenerateExtent { zoom, extent } => write!(
                f,
                "Zoom {zoom}: extent {extent} has no area after clamping to the tiled world, no tiles generated"
            ),
            Self::ZoomTooLarge { zoom } => write!(
                f,
                "Zoom {zoom}: unable to compute the tile range, zoom levels above {MAX_ZOOM} are not supported"
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ZoomPlan {
    pub zoom: u8,
    /// Tiles touched by the extent itself
    pub covering: Option<TileRect>,
    /// Tiles to generate: `covering` plus the safety border
    pub range: Option<TileRect>,
    pub issue: Option<PlanIssue>,
}

impl ZoomPlan {
    #[must_use]
    pub fn tile_count(&self) -> u64 {
        self.range.as_ref().map_or(0, TileRect::size)
    }

    /// One-line description of the range, e.g. `Zoom 10: X=511-513, Y=510-512 (9 tiles)`.
    #[must_use]
    pub fn summary(&self) -> Option<String> {
        let r = self.range?;
        Some(format!(
            "Zoom {}: X={}-{}, Y={}-{} ({} tiles)",
            self.zoom,
            r.min_x,
            r.max_x,
            r.min_y,
            r.max_y,
            r.size()
        ))
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct TilePlan {
    pub zooms: Vec<ZoomPlan>,
    pub total: u64,
}

impl TilePlan {
    /// All planned tiles: zoom levels in plan order, then x ascending, then y ascending.
    pub fn tiles(&self) -> impl Iterator<Item = TileCoord> + '_ {
        self.zooms
            .iter()
            .filter_map(|z| z.range)
            .flat_map(|r| r.iter())
    }

    pub fn issues(&self) -> impl Iterator<Item = &PlanIssue> {
        self.zooms.iter().filter_map(|z| z.issue.as_ref())
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.total == 0
    }
}

/// Plans the tile range of a single zoom level.
#[must_use]
pub fn plan_zoom(extent: &GeoExtent, zoom: u8) -> ZoomPlan {
    let mut plan = ZoomPlan {
        zoom,
        covering: None,
        range: None,
        issue: None,
    };
    if zoom > MAX_ZOOM {
        plan.issue = Some(PlanIssue::ZoomTooLarge { zoom });
        return plan;
    }
    let clamped = extent.clamped();
    if clamped.is_degenerate() {
        plan.issue = Some(PlanIssue::DegenerateExtent {
            zoom,
            extent: clamped,
        });
        return plan;
    }
    plan.covering = tiles_covering_extent(&clamped, zoom);
    plan.range = plan.covering.map(|c| c.expand_clamped(SAFETY_BORDER));
    plan
}

/// Plans every zoom level in the given order. A zoom level that cannot be planned never
/// affects the others.
#[must_use]
pub fn plan_tile_ranges(extent: &GeoExtent, zooms: &[u8]) -> TilePlan {
    let zooms: Vec<ZoomPlan> = zooms.iter().map(|&z| plan_zoom(extent, z)).collect();
    let total = zooms.iter().map(ZoomPlan::tile_count).sum();
    TilePlan { zooms, total }
}
