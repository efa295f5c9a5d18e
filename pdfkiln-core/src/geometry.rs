//! Points, rectangles and affine matrices in PDF user space

use lopdf::Object;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// Axis-aligned rectangle given by its lower-left and upper-right corners
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x0: f32,
    pub y0: f32,
    pub x1: f32,
    pub y1: f32,
}

impl Rect {
    pub fn new(x0: f32, y0: f32, x1: f32, y1: f32) -> Self {
        Self { x0, y0, x1, y1 }.normalized()
    }

    pub fn from_size(width: f32, height: f32) -> Self {
        Self::new(0.0, 0.0, width, height)
    }

    /// Paper sizes in points
    pub fn a4() -> Self {
        Self::from_size(595.0, 842.0)
    }

    pub fn letter() -> Self {
        Self::from_size(612.0, 792.0)
    }

    pub fn width(&self) -> f32 {
        self.x1 - self.x0
    }

    pub fn height(&self) -> f32 {
        self.y1 - self.y0
    }

    pub fn is_empty(&self) -> bool {
        self.width() <= 0.0 || self.height() <= 0.0
    }

    /// Reorder corners so that x0 <= x1 and y0 <= y1
    pub fn normalized(self) -> Self {
        Self {
            x0: self.x0.min(self.x1),
            y0: self.y0.min(self.y1),
            x1: self.x0.max(self.x1),
            y1: self.y0.max(self.y1),
        }
    }

    /// Smallest rectangle containing both
    pub fn union(&self, other: &Rect) -> Rect {
        Rect {
            x0: self.x0.min(other.x0),
            y0: self.y0.min(other.y0),
            x1: self.x1.max(other.x1),
            y1: self.y1.max(other.y1),
        }
    }

    pub fn include_point(&self, p: Point) -> Rect {
        Rect {
            x0: self.x0.min(p.x),
            y0: self.y0.min(p.y),
            x1: self.x1.max(p.x),
            y1: self.y1.max(p.y),
        }
    }

    pub fn from_point(p: Point) -> Rect {
        Rect {
            x0: p.x,
            y0: p.y,
            x1: p.x,
            y1: p.y,
        }
    }

    /// Parse a PDF rectangle array; malformed entries yield `None`
    pub fn from_objects(values: &[Object]) -> Option<Rect> {
        if values.len() != 4 {
            return None;
        }
        let mut nums = [0f32; 4];
        for (slot, value) in nums.iter_mut().zip(values) {
            *slot = value.as_float().ok()?;
        }
        Some(Rect::new(nums[0], nums[1], nums[2], nums[3]))
    }

    pub fn to_object(&self) -> Object {
        Object::Array(vec![
            Object::Real(self.x0),
            Object::Real(self.y0),
            Object::Real(self.x1),
            Object::Real(self.y1),
        ])
    }

    /// Quad points in the order annotations expect: upper-left, upper-right,
    /// lower-left, lower-right
    pub fn quad_points(&self) -> Vec<Object> {
        [
            self.x0, self.y1, self.x1, self.y1, self.x0, self.y0, self.x1, self.y0,
        ]
        .iter()
        .map(|v| Object::Real(*v))
        .collect()
    }
}

/// Affine transformation `[a b c d e f]`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Matrix {
    pub a: f32,
    pub b: f32,
    pub c: f32,
    pub d: f32,
    pub e: f32,
    pub f: f32,
}

impl Default for Matrix {
    fn default() -> Self {
        Self::identity()
    }
}

impl Matrix {
    pub fn identity() -> Self {
        Self {
            a: 1.0,
            b: 0.0,
            c: 0.0,
            d: 1.0,
            e: 0.0,
            f: 0.0,
        }
    }

    pub fn from_operands(values: &[Object]) -> Option<Matrix> {
        if values.len() != 6 {
            return None;
        }
        let mut nums = [0f32; 6];
        for (slot, value) in nums.iter_mut().zip(values) {
            *slot = value.as_float().ok()?;
        }
        Some(Matrix {
            a: nums[0],
            b: nums[1],
            c: nums[2],
            d: nums[3],
            e: nums[4],
            f: nums[5],
        })
    }

    /// `self` applied first, then `other`
    pub fn then(&self, other: &Matrix) -> Matrix {
        Matrix {
            a: self.a * other.a + self.b * other.c,
            b: self.a * other.b + self.b * other.d,
            c: self.c * other.a + self.d * other.c,
            d: self.c * other.b + self.d * other.d,
            e: self.e * other.a + self.f * other.c + other.e,
            f: self.e * other.b + self.f * other.d + other.f,
        }
    }

    pub fn apply(&self, p: Point) -> Point {
        Point {
            x: self.a * p.x + self.c * p.y + self.e,
            y: self.b * p.x + self.d * p.y + self.f,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rect_normalizes_corners() {
        let r = Rect::new(100.0, 200.0, 10.0, 20.0);
        assert_eq!(r, Rect::new(10.0, 20.0, 100.0, 200.0));
        assert_eq!(r.width(), 90.0);
        assert_eq!(r.height(), 180.0);
    }

    #[test]
    fn test_rect_from_objects() {
        let values = vec![
            Object::Integer(0),
            Object::Integer(0),
            Object::Real(595.0),
            Object::Integer(842),
        ];
        assert_eq!(Rect::from_objects(&values), Some(Rect::a4()));
        assert_eq!(Rect::from_objects(&values[..3]), None);
        assert_eq!(
            Rect::from_objects(&[
                Object::Null,
                Object::Integer(0),
                Object::Integer(1),
                Object::Integer(1)
            ]),
            None
        );
    }

    #[test]
    fn test_matrix_composition() {
        let scale = Matrix {
            a: 2.0,
            d: 2.0,
            ..Matrix::identity()
        };
        let translate = Matrix {
            e: 10.0,
            f: 5.0,
            ..Matrix::identity()
        };
        let m = scale.then(&translate);
        assert_eq!(m.apply(Point::new(1.0, 1.0)), Point::new(12.0, 7.0));

        let m = translate.then(&scale);
        assert_eq!(m.apply(Point::new(1.0, 1.0)), Point::new(22.0, 12.0));
    }
}
