use crate::{
    assets::cache::{AssetRoot, ImageCache},
    composition::model::{NodeConfig, NodeKind},
    foundation::error::{PackshotError, PackshotResult},
    render::raster,
    render::renderer::{RenderEnv, RenderOutput, Renderer},
    render::surface::Surface,
};

/// Draws its source image stretched over the whole target surface.
#[derive(Default)]
pub struct ImageRenderer {
    cache: ImageCache,
}

impl ImageRenderer {
    pub fn new() -> Self {
        Self::default()
    }
}

fn image_config(config: &NodeConfig) -> PackshotResult<&crate::composition::model::ImageConfig> {
    match config {
        NodeConfig::Image(c) => Ok(c),
        other => Err(PackshotError::contract(format!(
            "image renderer given '{}' config",
            other.kind()
        ))),
    }
}

impl Renderer for ImageRenderer {
    fn kind(&self) -> NodeKind {
        NodeKind::Image
    }

    fn load(&mut self, config: &NodeConfig, assets: &AssetRoot) -> PackshotResult<()> {
        let cfg = image_config(config)?;
        self.cache.request(cfg.image.as_deref(), assets)
    }

    fn render(
        &mut self,
        target: &mut Surface,
        config: &NodeConfig,
        _env: &RenderEnv,
    ) -> PackshotResult<RenderOutput> {
        image_config(config)?;
        if let Some(img) = self.cache.image(true)? {
            raster::blit_stretched(target, img);
        }
        // Missing or failed image: draw nothing, the layer stays blank.
        Ok(RenderOutput::Drawn)
    }

    fn dispose(&mut self) {
        self.cache.clear();
    }
}
