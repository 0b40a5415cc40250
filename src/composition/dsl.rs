//! Small constructors for packshots and render trees, mainly for tests and
//! programmatic callers. Everything here goes through [`Packshot::validate`]
//! on `build`, so hand-assembled structs and built ones reject the same
//! inputs.

use std::sync::Arc;

use crate::{
    composition::model::{
        BlendMode, ConeConfig, ControlPoints, ImageConfig, Layer, LayerConfig, MaskConfig,
        NodeConfig, Packshot, PackshotConfig, PlaneConfig,
    },
    composition::tree::RenderNode,
    foundation::core::ColorChannel,
    foundation::error::PackshotResult,
};

pub fn image_node(source: Option<&str>) -> Arc<RenderNode> {
    RenderNode::new(NodeConfig::Image(ImageConfig {
        image: source.map(str::to_string),
    }))
}

pub fn mask_node(
    source: Option<&str>,
    channel: ColorChannel,
    children: Vec<Arc<RenderNode>>,
) -> Arc<RenderNode> {
    RenderNode::with_children(
        NodeConfig::Mask(MaskConfig {
            image: source.map(str::to_string),
            channel,
            is_disabled: false,
        }),
        children,
    )
}

pub fn plane_node(source: Option<&str>, control_points: ControlPoints) -> Arc<RenderNode> {
    RenderNode::new(NodeConfig::Plane(PlaneConfig {
        image: source.map(str::to_string),
        control_points,
    }))
}

pub fn cone_node(source: Option<&str>, config: ConeConfig) -> Arc<RenderNode> {
    RenderNode::new(NodeConfig::Cone(ConeConfig {
        image: source.map(str::to_string),
        ..config
    }))
}

pub struct PackshotBuilder {
    name: String,
    config: PackshotConfig,
    layers: Vec<Layer>,
}

impl PackshotBuilder {
    pub fn new(name: impl Into<String>, width: u32, height: u32) -> Self {
        Self {
            name: name.into(),
            config: PackshotConfig { width, height },
            layers: Vec::new(),
        }
    }

    /// Append a layer with default config (enabled, normal composition).
    pub fn layer(self, name: impl Into<String>, render_tree: Arc<RenderNode>) -> Self {
        self.layer_with(name, LayerConfig::default(), render_tree)
    }

    pub fn layer_with(
        mut self,
        name: impl Into<String>,
        config: LayerConfig,
        render_tree: Arc<RenderNode>,
    ) -> Self {
        self.layers.push(Layer {
            name: name.into(),
            config,
            render_tree,
        });
        self
    }

    pub fn blended_layer(
        self,
        name: impl Into<String>,
        composition: BlendMode,
        render_tree: Arc<RenderNode>,
    ) -> Self {
        self.layer_with(
            name,
            LayerConfig {
                composition,
                ..LayerConfig::default()
            },
            render_tree,
        )
    }

    pub fn build(self) -> PackshotResult<Packshot> {
        let packshot = Packshot {
            name: self.name,
            config: self.config,
            layers: self.layers,
        };
        packshot.validate()?;
        Ok(packshot)
    }
}
