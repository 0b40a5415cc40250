//! Analytic cone/frustum ray tracing.
//!
//! The surface is a frustum of height `H` centered on the local z axis with
//! top radius `R1` at `z = -H/2` and bottom radius `R2` at `z = +H/2` (z grows
//! downward, matching image v). Substituting a parametric ray into the implicit
//! radius law `r(z) = R1 + (z/H + 1/2)(R2 - R1)` gives one quadratic per ray.

use glam::DVec3;
use kurbo::Point;

use crate::{
    composition::model::{ConeConfig, ControlPoints},
    foundation::core::Canvas,
    foundation::error::{PackshotError, PackshotResult},
    projection::homography::Homography,
};

const QUAD_EPSILON: f64 = 1e-12;
const SEAM_EPSILON: f64 = 1e-9;
const RADIUS_EPSILON: f64 = 1e-12;

#[derive(Clone, Copy, Debug)]
pub struct Ray {
    pub origin: DVec3,
    pub dir: DVec3,
}

#[derive(Clone, Copy, Debug)]
pub struct ConeHit {
    pub t: f64,
    pub point: DVec3,
    /// Axial coordinate of the hit, in `[-H/2, H/2]`.
    pub z: f64,
    /// Angular coordinate, wrapped to `[0, 2*pi)`.
    pub theta: f64,
}

#[derive(Clone, Copy, Debug)]
pub struct ConeSurface {
    r_top: f64,
    r_bottom: f64,
    height: f64,
}

impl ConeSurface {
    pub fn new(diameter_top: f64, diameter_bottom: f64, height: f64) -> PackshotResult<Self> {
        if !(height.is_finite() && height > 0.0) {
            return Err(PackshotError::validation("cone height must be > 0"));
        }
        if !(diameter_top.is_finite() && diameter_top >= 0.0)
            || !(diameter_bottom.is_finite() && diameter_bottom >= 0.0)
        {
            return Err(PackshotError::validation("cone diameters must be >= 0"));
        }
        Ok(Self {
            r_top: diameter_top * 0.5,
            r_bottom: diameter_bottom * 0.5,
            height,
        })
    }

    pub fn from_config(config: &ConeConfig) -> PackshotResult<Self> {
        Self::new(config.diameter_top, config.diameter_bottom, config.height)
    }

    pub fn height(&self) -> f64 {
        self.height
    }

    pub fn max_radius(&self) -> f64 {
        self.r_top.max(self.r_bottom)
    }

    pub fn radius_at(&self, z: f64) -> f64 {
        self.r_top + (z / self.height + 0.5) * (self.r_bottom - self.r_top)
    }

    /// Nearest wall intersection along the ray's positive direction, taking
    /// the far root of the quadratic (the wall a label is read through).
    pub fn intersect(&self, ray: &Ray) -> Option<ConeHit> {
        let o = ray.origin;
        let d = ray.dir;
        let slope = (self.r_bottom - self.r_top) / self.height;

        let big_a = slope * d.z;
        let big_b = slope * o.z + (self.r_bottom - self.r_top) * 0.5 + self.r_top;

        let a = d.x * d.x + d.y * d.y - big_a * big_a;
        let b = 2.0 * (d.x * o.x + d.y * o.y - big_a * big_b);
        let c = o.x * o.x + o.y * o.y - big_b * big_b;

        let t = if a.abs() <= QUAD_EPSILON {
            // Ray parallel to the wall slope: the quadratic collapses.
            if b.abs() <= QUAD_EPSILON {
                return None;
            }
            -c / b
        } else {
            let disc = b * b - 4.0 * a * c;
            if disc < 0.0 {
                return None;
            }
            (-b + disc.sqrt()) / (2.0 * a)
        };

        if t <= QUAD_EPSILON {
            return None;
        }

        let point = o + d * t;
        let z = point.z;
        if z.abs() > self.height * 0.5 {
            return None;
        }

        let r = self.radius_at(z);
        if r <= RADIUS_EPSILON {
            // Apex: the angular coordinate is undefined there.
            return None;
        }

        let mut theta = (point.y / r).atan2(-point.x / r);
        if theta < 0.0 {
            theta += std::f64::consts::TAU;
        }
        // Floating rounding at the seam can land a hit at 2*pi instead of 0.
        if std::f64::consts::TAU - theta < SEAM_EPSILON {
            theta = 0.0;
        }

        Some(ConeHit { t, point, z, theta })
    }

    /// Unwrap a hit to source-image UV. The label spans the visible half-wrap
    /// (`theta` in `[0, pi]` maps to `u` in `[0, 1]`); `v` runs top to bottom.
    pub fn uv(&self, hit: &ConeHit) -> (f64, f64) {
        let u = hit.theta / std::f64::consts::PI;
        let v = hit.z / self.height + 0.5;
        (u, v)
    }
}

/// Camera calibration for the cone renderer, derived from the control points.
///
/// A single derivation: the inverse square-to-quad homography carries a canvas
/// pixel to unit-square UV, which places a sensor point on the axis plane; the
/// eye sits on the -y axis at a distance proportional to the surface extent.
#[derive(Clone, Debug)]
pub struct ConeCamera {
    eye: DVec3,
    pixel_to_unit: Homography,
    half_width: f64,
    height: f64,
}

impl ConeCamera {
    pub fn from_control_points(
        control_points: ControlPoints,
        surface: &ConeSurface,
        canvas: Canvas,
    ) -> PackshotResult<Self> {
        let quad = control_points.to_canvas(canvas);
        let pixel_to_unit = Homography::square_to_quad(&quad)
            .and_then(|h| h.invert())
            .ok_or_else(|| {
                PackshotError::render_computation("degenerate cone control points")
            })?;

        let extent = surface.max_radius().max(surface.height() * 0.5);
        Ok(Self {
            eye: DVec3::new(0.0, -4.0 * extent, 0.0),
            pixel_to_unit,
            half_width: surface.max_radius(),
            height: surface.height(),
        })
    }

    /// Ray through the given canvas pixel (center coordinates), or `None` when
    /// the pixel's homography preimage lies at infinity.
    pub fn ray_for_pixel(&self, x: f64, y: f64) -> Option<Ray> {
        let uv = self.pixel_to_unit.apply(Point::new(x, y))?;
        let sensor = DVec3::new(
            (uv.x - 0.5) * 2.0 * self.half_width,
            0.0,
            (uv.y - 0.5) * self.height,
        );
        Some(Ray {
            origin: self.eye,
            dir: (sensor - self.eye).normalize(),
        })
    }
}
