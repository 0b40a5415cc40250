use rayon::prelude::*;

use crate::{
    assets::cache::{AssetRoot, ImageCache, PreparedImage},
    composition::model::{BlendMode, ConeConfig, NodeConfig, NodeKind},
    foundation::error::{PackshotError, PackshotResult},
    render::composite,
    render::raster,
    render::renderer::{RenderEnv, RenderOutput, RenderQuality, Renderer},
    render::surface::Surface,
};

use crate::projection::cone::{ConeCamera, ConeSurface};

/// Ray-traces its source image onto a cone/frustum surface.
///
/// Per destination pixel: build a camera ray, intersect the analytic surface,
/// unwrap the hit to UV, sample, and write the result. A full-resolution
/// O(width x height) loop — the single performance-critical path in the
/// system. Rows run in parallel at full quality; draft quality (the
/// interactive-drag path) traces every other pixel and fills 2x2 blocks.
#[derive(Default)]
pub struct ConeRenderer {
    cache: ImageCache,
}

impl ConeRenderer {
    pub fn new() -> Self {
        Self::default()
    }
}

fn cone_config(config: &NodeConfig) -> PackshotResult<&ConeConfig> {
    match config {
        NodeConfig::Cone(c) => Ok(c),
        other => Err(PackshotError::contract(format!(
            "cone renderer given '{}' config",
            other.kind()
        ))),
    }
}

fn trace_pixel(
    camera: &ConeCamera,
    surface: &ConeSurface,
    img: Option<&PreparedImage>,
    x: f64,
    y: f64,
) -> Option<[u8; 4]> {
    let ray = camera.ray_for_pixel(x, y)?;
    let hit = surface.intersect(&ray)?;
    let (u, v) = surface.uv(&hit);
    if !(0.0..=1.0).contains(&u) {
        // Back half of the wrap; the label spans the visible half only.
        return None;
    }
    let color = match img {
        Some(img) => raster::sample_bilinear(img, u, v),
        None => raster::checker_rgba(u, v),
    };
    Some(color.to_array())
}

impl Renderer for ConeRenderer {
    fn kind(&self) -> NodeKind {
        NodeKind::Cone
    }

    fn load(&mut self, config: &NodeConfig, assets: &AssetRoot) -> PackshotResult<()> {
        let cfg = cone_config(config)?;
        self.cache.request(cfg.image.as_deref(), assets)
    }

    fn render(
        &mut self,
        target: &mut Surface,
        config: &NodeConfig,
        env: &RenderEnv,
    ) -> PackshotResult<RenderOutput> {
        let cfg = cone_config(config)?;
        let surface = ConeSurface::from_config(cfg)?;
        let camera = ConeCamera::from_control_points(cfg.control_points, &surface, env.canvas)?;
        let img = self.cache.image(true)?;

        match env.quality {
            RenderQuality::Full => {
                let stride = target.row_stride();
                target
                    .data_mut()
                    .par_chunks_exact_mut(stride)
                    .enumerate()
                    .for_each(|(y, row)| {
                        let py = y as f64 + 0.5;
                        for (x, px) in row.chunks_exact_mut(4).enumerate() {
                            let traced =
                                trace_pixel(&camera, &surface, img, x as f64 + 0.5, py);
                            if let Some(src) = traced {
                                let out =
                                    composite::over([px[0], px[1], px[2], px[3]], src);
                                px.copy_from_slice(&out);
                            }
                        }
                    });
            }
            RenderQuality::Draft => {
                let (w, h) = (target.width(), target.height());
                for y in (0..h).step_by(2) {
                    for x in (0..w).step_by(2) {
                        let traced = trace_pixel(
                            &camera,
                            &surface,
                            img,
                            f64::from(x) + 0.5,
                            f64::from(y) + 0.5,
                        );
                        let Some(src) = traced else {
                            continue;
                        };
                        let color = crate::foundation::core::Rgba8Premul::from_array(src);
                        for dy in 0..2 {
                            for dx in 0..2 {
                                target.blend_pixel(x + dx, y + dy, color, BlendMode::Normal);
                            }
                        }
                    }
                }
            }
        }
        Ok(RenderOutput::Drawn)
    }

    fn dispose(&mut self) {
        self.cache.clear();
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;
    use crate::composition::model::ControlPoints;
    use crate::foundation::core::{Canvas, Point};

    fn env(quality: RenderQuality) -> RenderEnv {
        RenderEnv {
            canvas: Canvas {
                width: 32,
                height: 32,
            },
            quality,
        }
    }

    fn cylinder_config(image: Option<&str>) -> NodeConfig {
        NodeConfig::Cone(ConeConfig {
            image: image.map(str::to_string),
            control_points: ControlPoints::identity(),
            diameter_top: 10.0,
            diameter_bottom: 10.0,
            height: 10.0,
        })
    }

    fn temp_dir(name: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!(
            "packshot_{name}_{}_{}",
            std::process::id(),
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap()
                .as_nanos()
        ))
    }

    #[test]
    fn traces_solid_label_onto_cylinder() {
        let tmp = temp_dir("cone_solid");
        std::fs::create_dir_all(&tmp).unwrap();
        let img = image::RgbaImage::from_raw(2, 2, [0u8, 255, 0, 255].repeat(4)).unwrap();
        let mut buf = Vec::new();
        image::DynamicImage::ImageRgba8(img)
            .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
            .unwrap();
        std::fs::write(tmp.join("green.png"), &buf).unwrap();

        let config = cylinder_config(Some("green.png"));
        let assets = AssetRoot::new(&tmp);
        let mut renderer = ConeRenderer::new();
        renderer.load(&config, &assets).unwrap();

        let mut target = Surface::new(32, 32).unwrap();
        renderer
            .render(&mut target, &config, &env(RenderQuality::Full))
            .unwrap();

        // The canvas center looks straight at the wall.
        let center = target.pixel(16, 16).unwrap();
        assert_eq!(center.to_array(), [0, 255, 0, 255]);

        std::fs::remove_dir_all(&tmp).ok();
    }

    #[test]
    fn draft_quality_fills_blocks() {
        let config = cylinder_config(None);
        let assets = AssetRoot::new(".");
        let mut renderer = ConeRenderer::new();
        renderer.load(&config, &assets).unwrap();

        let mut target = Surface::new(32, 32).unwrap();
        renderer
            .render(&mut target, &config, &env(RenderQuality::Draft))
            .unwrap();

        // 2x2 blocks share one traced sample.
        let p = target.pixel(16, 16).unwrap();
        assert_eq!(p, target.pixel(17, 17).unwrap());
        assert_eq!(p.a, 255);
    }

    #[test]
    fn degenerate_control_points_are_recoverable() {
        let config = NodeConfig::Cone(ConeConfig {
            image: None,
            control_points: ControlPoints([
                Point::new(-1.0, -1.0),
                Point::new(0.0, 0.0),
                Point::new(1.0, 1.0),
                Point::new(0.5, 0.5),
            ]),
            ..match cylinder_config(None) {
                NodeConfig::Cone(c) => c,
                _ => unreachable!(),
            }
        });
        let assets = AssetRoot::new(".");
        let mut renderer = ConeRenderer::new();
        renderer.load(&config, &assets).unwrap();

        let mut target = Surface::new(32, 32).unwrap();
        let err = renderer
            .render(&mut target, &config, &env(RenderQuality::Full))
            .unwrap_err();
        assert!(err.is_recoverable());
    }

    #[test]
    fn rays_missing_the_cone_leave_pixels_transparent() {
        // Narrow top: the upper canvas corners aim wide of the silhouette.
        let config = NodeConfig::Cone(ConeConfig {
            image: None,
            control_points: ControlPoints::identity(),
            diameter_top: 2.0,
            diameter_bottom: 10.0,
            height: 10.0,
        });
        let assets = AssetRoot::new(".");
        let mut renderer = ConeRenderer::new();
        renderer.load(&config, &assets).unwrap();

        let mut target = Surface::new(32, 32).unwrap();
        renderer
            .render(&mut target, &config, &env(RenderQuality::Full))
            .unwrap();

        assert_eq!(target.pixel(0, 0).unwrap().a, 0);
        assert_eq!(target.pixel(31, 0).unwrap().a, 0);
        // The wide base still renders.
        assert_eq!(target.pixel(16, 16).unwrap().a, 255);
    }
}
