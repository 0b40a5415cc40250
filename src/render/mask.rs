use crate::{
    assets::cache::{AssetRoot, ImageCache, PreparedImage},
    composition::model::{BlendMode, MaskConfig, NodeConfig, NodeKind},
    foundation::core::{Canvas, ColorChannel},
    foundation::error::{PackshotError, PackshotResult},
    foundation::math::unpremul_u8,
    render::raster,
    render::renderer::{RenderEnv, RenderOutput, Renderer},
    render::surface::{Stencil, Surface},
};

/// Masks its children through one channel of a stencil image.
///
/// The children draw onto an isolated transparent surface; `finish` multiplies
/// that surface by the stencil coverage and composites it source-over onto the
/// parent. Coverage is the selected channel's value, except for the alpha
/// channel where it is inverted (`255 - a`) so masking affects "holes"
/// consistently regardless of the channel chosen.
///
/// A disabled mask is a passthrough: no child surface is allocated and the
/// children draw directly, unmasked. A missing or failed mask image behaves
/// the same (with a warning) rather than blanking the subtree.
#[derive(Default)]
pub struct MaskRenderer {
    cache: ImageCache,
    stencil: Option<Stencil>,
    stencil_key: Option<(u64, Canvas)>,
}

impl MaskRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    fn ensure_stencil(&mut self, img: &PreparedImage, channel: ColorChannel, canvas: Canvas) {
        let key = (self.cache.generation(), canvas);
        if self.stencil_key == Some(key) && self.stencil.is_some() {
            return;
        }
        self.stencil = Some(build_stencil(img, channel, canvas));
        self.stencil_key = Some(key);
    }
}

/// Stretch the mask image to canvas size and extract one channel as coverage.
fn build_stencil(img: &PreparedImage, channel: ColorChannel, canvas: Canvas) -> Stencil {
    let mut alpha = Vec::with_capacity(canvas.pixel_count());
    for y in 0..canvas.height {
        let v = (f64::from(y) + 0.5) / f64::from(canvas.height);
        for x in 0..canvas.width {
            let u = (f64::from(x) + 0.5) / f64::from(canvas.width);
            let px = raster::sample_bilinear(img, u, v).to_array();
            let coverage = match channel {
                ColorChannel::Alpha => 255 - px[3],
                c => unpremul_u8(px[c.index()], px[3]),
            };
            alpha.push(coverage);
        }
    }
    Stencil::new(canvas.width, canvas.height, alpha)
        .unwrap_or_else(|_| unreachable!("stencil sized from canvas"))
}

fn mask_config(config: &NodeConfig) -> PackshotResult<&MaskConfig> {
    match config {
        NodeConfig::Mask(c) => Ok(c),
        other => Err(PackshotError::contract(format!(
            "mask renderer given '{}' config",
            other.kind()
        ))),
    }
}

impl Renderer for MaskRenderer {
    fn kind(&self) -> NodeKind {
        NodeKind::Mask
    }

    fn load(&mut self, config: &NodeConfig, assets: &AssetRoot) -> PackshotResult<()> {
        let cfg = mask_config(config)?;
        if cfg.is_disabled {
            // Skipped entirely: a disabled mask loads nothing.
            return Ok(());
        }
        self.cache.request(cfg.image.as_deref(), assets)
    }

    fn render(
        &mut self,
        target: &mut Surface,
        config: &NodeConfig,
        env: &RenderEnv,
    ) -> PackshotResult<RenderOutput> {
        let cfg = mask_config(config)?;
        if cfg.is_disabled {
            return Ok(RenderOutput::Drawn);
        }

        let Some(img) = self.cache.image(true)? else {
            tracing::warn!(
                source = cfg.image.as_deref().unwrap_or("<none>"),
                "mask image unavailable; children draw unmasked"
            );
            return Ok(RenderOutput::Drawn);
        };

        let img = img.clone();
        self.ensure_stencil(&img, cfg.channel, env.canvas);
        let child = Surface::for_canvas(target.canvas())?;
        Ok(RenderOutput::Isolate { child })
    }

    fn finish(
        &mut self,
        parent: &mut Surface,
        mut child: Surface,
        _config: &NodeConfig,
        _env: &RenderEnv,
    ) -> PackshotResult<()> {
        let stencil = self.stencil.as_ref().ok_or_else(|| {
            PackshotError::contract("mask finish called without a prepared stencil")
        })?;
        child.apply_stencil(stencil)?;
        parent.composite_over(&child, BlendMode::Normal)
    }

    fn dispose(&mut self) {
        self.cache.clear();
        self.stencil = None;
        self.stencil_key = None;
    }
}
