use std::io::Cursor;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use image::{ImageFormat, Rgba, RgbaImage, imageops};
use qgisweb::TileRecord;
use tilepack_tile_utils::{TileCoord, tile_projected_bounds};
use tracing::{debug, warn};

use super::{LayerSet, RenderRequest, Renderer, TileProjection, TileSize};

/// Pixel resolutions at or below this are treated as zero.
const MIN_RESOLUTION: f64 = 1e-9;

/// Reason a tile was left out of the container.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum TileSkip {
    #[error("Tile {0} has degenerate bounds and was skipped")]
    DegenerateBounds(TileCoord),

    #[error("Tile {0} has a pixel resolution too close to zero and was skipped")]
    ResolutionTooSmall(TileCoord),

    #[error("Renderer returned a {actual_w}x{actual_h} image for tile {coord}, expected {expected_w}x{expected_h}")]
    SizeMismatch {
        coord: TileCoord,
        expected_w: u32,
        expected_h: u32,
        actual_w: u32,
        actual_h: u32,
    },

    #[error("Render margin {1} is too large for tile {0}")]
    MarginTooLarge(TileCoord, u32),

    #[error("Unable to crop the render margin of tile {0}")]
    CropFailed(TileCoord),

    #[error("Unable to encode tile {0} as PNG: {1}")]
    EncodingFailed(TileCoord, String),

    #[error("PNG encoding of tile {0} produced no data")]
    EmptyImage(TileCoord),
}

/// PNG image of one tile.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedTile {
    pub coord: TileCoord,
    pub png: Vec<u8>,
    /// Set when the renderer gave no image and a transparent tile was stored instead
    pub placeholder: bool,
}

impl RenderedTile {
    /// Base64 text of the PNG, as embedded in the container.
    #[must_use]
    pub fn encoded(&self) -> String {
        STANDARD.encode(&self.png)
    }

    #[must_use]
    pub fn to_record(&self) -> TileRecord {
        TileRecord::new(self.coord, self.encoded())
    }
}

/// Renders single tiles with a margin that is cropped away afterwards, so that labels
/// and symbols crossing tile edges are drawn identically on both neighbouring tiles.
#[derive(Debug, Clone)]
pub struct TileRenderer {
    size: TileSize,
    margin: u32,
    projection: TileProjection,
}

impl TileRenderer {
    #[must_use]
    pub fn new(size: TileSize, margin: u32, projection: TileProjection) -> Self {
        Self {
            size,
            margin,
            projection,
        }
    }

    #[must_use]
    pub fn size(&self) -> TileSize {
        self.size
    }

    /// Builds the render request for a tile: its Web Mercator bounds grown by half the
    /// margin on every side, and a pixel size grown by the full margin.
    pub fn request(&self, coord: TileCoord) -> Result<RenderRequest, TileSkip> {
        let bounds = tile_projected_bounds(coord);
        if bounds.is_degenerate() {
            return Err(TileSkip::DegenerateBounds(coord));
        }
        let TileSize { width, height } = self.size;
        let res_x = bounds.width() / f64::from(width);
        let res_y = bounds.height().abs() / f64::from(height);
        if res_y <= MIN_RESOLUTION {
            return Err(TileSkip::ResolutionTooSmall(coord));
        }

        let (Some(padded_w), Some(padded_h)) =
            (width.checked_add(self.margin), height.checked_add(self.margin))
        else {
            return Err(TileSkip::MarginTooLarge(coord, self.margin));
        };

        let half_margin = f64::from(self.margin) / 2.0;
        Ok(RenderRequest {
            extent: bounds.expand(res_x * half_margin, res_y * half_margin),
            width: padded_w,
            height: padded_h,
            background: Rgba([0, 0, 0, 0]),
            projection: self.projection,
        })
    }

    /// Renders, crops and encodes one tile.
    pub fn render_tile(
        &self,
        renderer: &mut dyn Renderer,
        layers: &LayerSet,
        coord: TileCoord,
    ) -> Result<RenderedTile, TileSkip> {
        let request = self.request(coord)?;
        debug!(
            "Rendering tile {coord} as {}x{} px",
            request.width, request.height
        );

        let (image, placeholder) = match renderer.render(layers, &request) {
            Some(img) if img.width() > 0 && img.height() > 0 => {
                (self.crop(coord, &img, &request)?, false)
            }
            _ => {
                warn!("Renderer returned no image for tile {coord}, storing a transparent tile");
                (RgbaImage::new(self.size.width, self.size.height), true)
            }
        };

        let mut png = Vec::new();
        image
            .write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
            .map_err(|e| TileSkip::EncodingFailed(coord, e.to_string()))?;
        if png.is_empty() {
            return Err(TileSkip::EmptyImage(coord));
        }
        Ok(RenderedTile {
            coord,
            png,
            placeholder,
        })
    }

    /// Cuts the tile out of the centre of the rendered image. With an odd margin the
    /// extra pixel ends up on the right and bottom edges.
    fn crop(
        &self,
        coord: TileCoord,
        img: &RgbaImage,
        request: &RenderRequest,
    ) -> Result<RgbaImage, TileSkip> {
        let TileSize { width, height } = self.size;
        let (expected_w, expected_h) = (request.width, request.height);
        if img.dimensions() != (expected_w, expected_h) {
            return Err(TileSkip::SizeMismatch {
                coord,
                expected_w,
                expected_h,
                actual_w: img.width(),
                actual_h: img.height(),
            });
        }
        if self.margin == 0 {
            return Ok(img.clone());
        }

        let offset = self.margin / 2;
        let cropped = imageops::crop_imm(img, offset, offset, width, height).to_image();
        if cropped.dimensions() == (width, height) {
            Ok(cropped)
        } else {
            Err(TileSkip::CropFailed(coord))
        }
    }
}
