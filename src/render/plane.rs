use crate::{
    assets::cache::{AssetRoot, ImageCache},
    composition::model::{BlendMode, NodeConfig, NodeKind, PlaneConfig},
    foundation::core::Point,
    foundation::error::{PackshotError, PackshotResult},
    projection::homography::Homography,
    render::raster,
    render::renderer::{RenderEnv, RenderOutput, Renderer},
    render::surface::Surface,
};

/// Projects its source image onto the quadrilateral spanned by the control
/// points, by inverse-mapping every destination pixel of the quad's bounding
/// box through the square-to-quad homography.
#[derive(Default)]
pub struct PlaneRenderer {
    cache: ImageCache,
}

impl PlaneRenderer {
    pub fn new() -> Self {
        Self::default()
    }
}

fn plane_config(config: &NodeConfig) -> PackshotResult<&PlaneConfig> {
    match config {
        NodeConfig::Plane(c) => Ok(c),
        other => Err(PackshotError::contract(format!(
            "plane renderer given '{}' config",
            other.kind()
        ))),
    }
}

fn bounding_box(points: &[Point; 4], width: u32, height: u32) -> (u32, u32, u32, u32) {
    let mut min_x = f64::INFINITY;
    let mut min_y = f64::INFINITY;
    let mut max_x = f64::NEG_INFINITY;
    let mut max_y = f64::NEG_INFINITY;
    for p in points {
        min_x = min_x.min(p.x);
        min_y = min_y.min(p.y);
        max_x = max_x.max(p.x);
        max_y = max_y.max(p.y);
    }
    let x0 = min_x.floor().max(0.0) as u32;
    let y0 = min_y.floor().max(0.0) as u32;
    let x1 = (max_x.ceil().max(0.0) as u32).min(width);
    let y1 = (max_y.ceil().max(0.0) as u32).min(height);
    (x0, y0, x1, y1)
}

impl Renderer for PlaneRenderer {
    fn kind(&self) -> NodeKind {
        NodeKind::Plane
    }

    fn load(&mut self, config: &NodeConfig, assets: &AssetRoot) -> PackshotResult<()> {
        let cfg = plane_config(config)?;
        self.cache.request(cfg.image.as_deref(), assets)
    }

    fn render(
        &mut self,
        target: &mut Surface,
        config: &NodeConfig,
        env: &RenderEnv,
    ) -> PackshotResult<RenderOutput> {
        let cfg = plane_config(config)?;

        let quad = cfg.control_points.to_canvas(env.canvas);
        let inverse = Homography::square_to_quad(&quad)
            .and_then(|h| h.invert())
            .ok_or_else(|| {
                PackshotError::render_computation("degenerate plane control points")
            })?;

        // Missing or failed image renders the checkerboard placeholder through
        // the same projective path.
        let img = self.cache.image(true)?;

        let (x0, y0, x1, y1) = bounding_box(&quad, target.width(), target.height());
        for y in y0..y1 {
            for x in x0..x1 {
                let p = Point::new(f64::from(x) + 0.5, f64::from(y) + 0.5);
                let Some(uv) = inverse.apply(p) else {
                    continue;
                };
                if !(0.0..=1.0).contains(&uv.x) || !(0.0..=1.0).contains(&uv.y) {
                    continue;
                }
                let color = match img {
                    Some(img) => raster::sample_bilinear(img, uv.x, uv.y),
                    None => raster::checker_rgba(uv.x, uv.y),
                };
                target.blend_pixel(x, y, color, BlendMode::Normal);
            }
        }
        Ok(RenderOutput::Drawn)
    }

    fn dispose(&mut self) {
        self.cache.clear();
    }
}
