use std::collections::HashSet;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

use image::{Rgba, RgbaImage};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use tilepack_tile_utils::webmercator_to_wgs84;
use tracing::warn;

use super::{LayerSet, RenderRequest, Renderer};

pub const BACKGROUND_LAYER: &str = "background";
pub const GRATICULE_LAYER: &str = "graticule";

/// RGBA color written as `#rrggbb` or `#rrggbbaa`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Color(pub Rgba<u8>);

impl Display for Color {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let [r, g, b, a] = self.0.0;
        write!(f, "#{r:02x}{g:02x}{b:02x}{a:02x}")
    }
}

impl FromStr for Color {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || format!("Invalid color '{s}', expected #rrggbb or #rrggbbaa");
        let hex = s.trim().strip_prefix('#').ok_or_else(err)?;
        if !(hex.len() == 6 || hex.len() == 8) || !hex.is_ascii() {
            return Err(err());
        }
        let mut rgba = [255_u8; 4];
        for (i, v) in rgba.iter_mut().enumerate().take(hex.len() / 2) {
            *v = u8::from_str_radix(&hex[i * 2..i * 2 + 2], 16).map_err(|_| err())?;
        }
        Ok(Self(Rgba(rgba)))
    }
}

impl Serialize for Color {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Color {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer)?
            .parse()
            .map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GraticuleConfig {
    /// Distance between graticule lines, in degrees
    pub spacing: f64,
    /// Line color of the `graticule` layer
    pub color: Color,
    /// Fill color of the `background` layer
    pub background: Color,
}

impl Default for GraticuleConfig {
    fn default() -> Self {
        Self {
            spacing: 10.0,
            color: Color(Rgba([60, 60, 60, 255])),
            background: Color(Rgba([242, 239, 233, 255])),
        }
    }
}

/// Built-in renderer drawing a solid background and a longitude/latitude grid.
///
/// Lines are placed from world coordinates, so neighbouring tiles join without seams
/// no matter how large the render margin is.
#[derive(Debug, Default)]
pub struct GraticuleRenderer {
    config: GraticuleConfig,
    reported_layers: HashSet<String>,
}

impl GraticuleRenderer {
    #[must_use]
    pub fn new(config: GraticuleConfig) -> Self {
        Self {
            config,
            reported_layers: HashSet::new(),
        }
    }

    fn draw_graticule(&self, img: &mut RgbaImage, request: &RenderRequest) {
        let spacing = self.config.spacing;
        let color = self.config.color.0;
        let ext = &request.extent;
        let res_x = ext.width() / f64::from(request.width);
        let res_y = ext.height() / f64::from(request.height);
        let cell = |deg: f64| (deg / spacing).floor();

        for px in 0..request.width {
            let x0 = ext.left + f64::from(px) * res_x;
            let (lon0, _) = webmercator_to_wgs84(x0, 0.0);
            let (lon1, _) = webmercator_to_wgs84(x0 + res_x, 0.0);
            if cell(lon0) != cell(lon1) {
                for py in 0..request.height {
                    img.put_pixel(px, py, color);
                }
            }
        }
        for py in 0..request.height {
            let y0 = ext.top - f64::from(py) * res_y;
            let (_, lat0) = webmercator_to_wgs84(0.0, y0);
            let (_, lat1) = webmercator_to_wgs84(0.0, y0 - res_y);
            if cell(lat0) != cell(lat1) {
                for px in 0..request.width {
                    img.put_pixel(px, py, color);
                }
            }
        }
    }
}

impl Renderer for GraticuleRenderer {
    fn render(&mut self, layers: &LayerSet, request: &RenderRequest) -> Option<RgbaImage> {
        if !request.projection.is_web_mercator() || request.width == 0 || request.height == 0 {
            return None;
        }
        let mut img = RgbaImage::from_pixel(request.width, request.height, request.background);
        for layer in layers.iter() {
            match layer {
                BACKGROUND_LAYER => {
                    for p in img.pixels_mut() {
                        *p = self.config.background.0;
                    }
                }
                GRATICULE_LAYER => {
                    if self.config.spacing.is_finite() && self.config.spacing > 0.0 {
                        self.draw_graticule(&mut img, request);
                    } else if self.reported_layers.insert(layer.to_string()) {
                        warn!(
                            "Graticule spacing {} is not a positive number, the graticule is not drawn",
                            self.config.spacing
                        );
                    }
                }
                other => {
                    if self.reported_layers.insert(other.to_string()) {
                        warn!("Layer '{other}' is not known to the graticule renderer and is ignored");
                    }
                }
            }
        }
        Some(img)
    }
}
