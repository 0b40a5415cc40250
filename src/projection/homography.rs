//! Four-point projective solver.
//!
//! Given four destination points (clockwise top-left, top-right, bottom-right,
//! bottom-left) the solver produces the unique 3x3 homogeneous matrix mapping
//! the unit square onto them. Degenerate inputs (three or more collinear
//! points) yield `None` rather than NaN-filled matrices.

use glam::{DMat3, DVec3};
use kurbo::Point;

const DET_EPSILON: f64 = 1e-12;
const W_EPSILON: f64 = 1e-12;

/// Unit square corners in the same clockwise order as control points.
const UNIT_SQUARE: [Point; 4] = [
    Point::new(0.0, 0.0),
    Point::new(1.0, 0.0),
    Point::new(1.0, 1.0),
    Point::new(0.0, 1.0),
];

/// A 2D projective transform in homogeneous coordinates.
#[derive(Clone, Copy, Debug)]
pub struct Homography(DMat3);

impl Homography {
    /// Map the projective basis onto the four points.
    ///
    /// The diagonal reorder (q1=P1, q2=P3, q3=P0, q4=P2) puts the fourth point
    /// opposite the first three so the per-column scale factors are solvable
    /// from a single 3x3 inversion.
    fn basis_to_quad(points: &[Point; 4]) -> Option<Homography> {
        let q1 = points[1];
        let q2 = points[3];
        let q3 = points[0];
        let q4 = points[2];

        let m = DMat3::from_cols(
            DVec3::new(q1.x, q1.y, 1.0),
            DVec3::new(q2.x, q2.y, 1.0),
            DVec3::new(q3.x, q3.y, 1.0),
        );
        if m.determinant().abs() <= DET_EPSILON {
            return None;
        }

        let s = m.inverse() * DVec3::new(q4.x, q4.y, 1.0);
        Some(Homography(DMat3::from_cols(
            m.x_axis * s.x,
            m.y_axis * s.y,
            m.z_axis * s.z,
        )))
    }

    /// Matrix mapping the unit square's corners onto `points`.
    ///
    /// Composes the basis-to-quad map with the inverted basis-to-unit-square
    /// map: one inversion, one multiply.
    pub fn square_to_quad(points: &[Point; 4]) -> Option<Homography> {
        let to_quad = Self::basis_to_quad(points)?;
        let to_square = Self::basis_to_quad(&UNIT_SQUARE)?;
        Some(Homography(to_quad.0 * to_square.0.inverse()))
    }

    pub fn invert(&self) -> Option<Homography> {
        if self.0.determinant().abs() <= DET_EPSILON {
            return None;
        }
        Some(Homography(self.0.inverse()))
    }

    /// Apply to a point; `None` when the result lies on the line at infinity.
    pub fn apply(&self, p: Point) -> Option<Point> {
        let v = self.0 * DVec3::new(p.x, p.y, 1.0);
        if v.z.abs() <= W_EPSILON {
            return None;
        }
        Some(Point::new(v.x / v.z, v.y / v.z))
    }
}
