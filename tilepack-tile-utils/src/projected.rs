/// Axis-aligned rectangle in Web Mercator (EPSG:3857) metres.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProjectedRect {
    pub left: f64,
    pub bottom: f64,
    pub right: f64,
    pub top: f64,
}

impl ProjectedRect {
    #[must_use]
    pub fn new(left: f64, bottom: f64, right: f64, top: f64) -> Self {
        Self {
            left,
            bottom,
            right,
            top,
        }
    }

    #[must_use]
    pub fn width(&self) -> f64 {
        self.right - self.left
    }

    #[must_use]
    pub fn height(&self) -> f64 {
        self.top - self.bottom
    }

    /// A rectangle with zero (or non-finite) width or height cannot be rendered.
    #[must_use]
    pub fn is_degenerate(&self) -> bool {
        let (w, h) = (self.width(), self.height());
        !(w.is_finite() && h.is_finite()) || w == 0.0 || h == 0.0
    }

    /// Grows the rectangle by `dx` on the left and right, and `dy` on the top and bottom.
    #[must_use]
    pub fn expand(&self, dx: f64, dy: f64) -> Self {
        Self {
            left: self.left - dx,
            bottom: self.bottom - dy,
            right: self.right + dx,
            top: self.top + dy,
        }
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    #[test]
    fn test_expand() {
        let rect = ProjectedRect::new(0.0, 0.0, 256.0, 128.0).expand(10.0, 5.0);
        assert_relative_eq!(rect.left, -10.0);
        assert_relative_eq!(rect.bottom, -5.0);
        assert_relative_eq!(rect.width(), 276.0);
        assert_relative_eq!(rect.height(), 138.0);
    }

    #[test]
    fn test_degenerate() {
        assert!(!ProjectedRect::new(0.0, 0.0, 1.0, 1.0).is_degenerate());
        assert!(ProjectedRect::new(0.0, 0.0, 0.0, 1.0).is_degenerate());
        assert!(ProjectedRect::new(0.0, 3.0, 1.0, 3.0).is_degenerate());
        assert!(ProjectedRect::new(0.0, 0.0, f64::NAN, 1.0).is_degenerate());
    }
}
