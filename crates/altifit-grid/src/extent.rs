//! Axis-aligned boxes in map coordinates.

/// An axis-aligned `(x, y)` box with inclusive edges.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Extent {
    /// `(min, max)` along x.
    pub x: (f64, f64),
    /// `(min, max)` along y.
    pub y: (f64, f64),
}

impl Extent {
    /// Box from explicit ranges.
    pub fn new(x: (f64, f64), y: (f64, f64)) -> Self {
        Self { x, y }
    }

    /// Square box of side `width` centred on `center`.
    pub fn centered(center: (f64, f64), width: f64) -> Self {
        let half = width / 2.0;
        Self {
            x: (center.0 - half, center.0 + half),
            y: (center.1 - half, center.1 + half),
        }
    }

    /// Whether `(x, y)` lies inside the box, edges included.
    ///
    /// NaN coordinates are never inside.
    pub fn contains(&self, x: f64, y: f64) -> bool {
        x >= self.x.0 && x <= self.x.1 && y >= self.y.0 && y <= self.y.1
    }

    /// The box grown by `buffer` on every side.
    pub fn expand(&self, buffer: f64) -> Self {
        Self {
            x: (self.x.0 - buffer, self.x.1 + buffer),
            y: (self.y.0 - buffer, self.y.1 + buffer),
        }
    }

    /// Grow the box to include `(x, y)`. Non-finite coordinates are ignored.
    pub fn include(&mut self, x: f64, y: f64) {
        if x.is_finite() {
            self.x.0 = self.x.0.min(x);
            self.x.1 = self.x.1.max(x);
        }
        if y.is_finite() {
            self.y.0 = self.y.0.min(y);
            self.y.1 = self.y.1.max(y);
        }
    }

    /// Width along x.
    pub fn width(&self) -> f64 {
        self.x.1 - self.x.0
    }

    /// Height along y.
    pub fn height(&self) -> f64 {
        self.y.1 - self.y.0
    }
}
