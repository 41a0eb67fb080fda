use std::fmt;

/// Sub-pixel image position. `x` is the column, `y` the row.
#[derive(Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Point {
        Point { x, y }
    }

    pub fn distance(&self, other: &Point) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }
}

impl<X: Into<f64>, Y: Into<f64>> From<(X, Y)> for Point {
    fn from((x, y): (X, Y)) -> Self {
        Point {
            x: x.into(),
            y: y.into(),
        }
    }
}

impl fmt::Debug for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.05}, {:.05})", self.x, self.y)
    }
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.02}, {:.02})", self.x, self.y)
    }
}

/// Pixel bounds of a particle, both ends inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundingBox {
    pub x_min: u32,
    pub y_min: u32,
    pub x_max: u32,
    pub y_max: u32,
}

impl BoundingBox {
    pub fn at(x: u32, y: u32) -> BoundingBox {
        BoundingBox {
            x_min: x,
            y_min: y,
            x_max: x,
            y_max: y,
        }
    }

    pub fn extend(&mut self, x: u32, y: u32) {
        self.x_min = self.x_min.min(x);
        self.y_min = self.y_min.min(y);
        self.x_max = self.x_max.max(x);
        self.y_max = self.y_max.max(y);
    }

    pub fn width(&self) -> u32 {
        self.x_max - self.x_min + 1
    }

    pub fn height(&self) -> u32 {
        self.y_max - self.y_min + 1
    }
}

/// One detected particle of a field of view.
#[derive(Debug, Clone, PartialEq)]
pub struct ParticleRecord {
    pub label: u32,
    /// pixel count
    pub area: u64,
    pub centroid: Point,
    pub bbox: BoundingBox,
    /// background corrected intensity summed over the particle's pixels
    pub integrated_intensity: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bbox_grows_inclusive() {
        let mut b = BoundingBox::at(4, 9);
        b.extend(2, 10);
        b.extend(5, 9);
        assert_eq!(
            b,
            BoundingBox {
                x_min: 2,
                y_min: 9,
                x_max: 5,
                y_max: 10
            }
        );
        assert_eq!(b.width(), 4);
        assert_eq!(b.height(), 2);
    }
}
