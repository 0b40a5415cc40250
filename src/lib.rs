//! Packshot is a layered still-image compositor.
//!
//! A packshot is a flat output image assembled from ordered layers; each layer
//! is a small tree of compositing operations (plain image, channel mask,
//! plane/cone projective texture mapping).
//!
//! # Pipeline overview
//!
//! 1. **Model**: a JSON-serializable [`Packshot`] holds the canvas size and
//!    the layers, each with a [`RenderNode`] tree.
//! 2. **Load**: [`RenderPipeline::load`] syncs renderer instances to the trees
//!    and resolves every image up front — no IO happens during compositing.
//! 3. **Composite**: [`RenderPipeline::render`] walks each enabled layer's
//!    tree over an explicit draw-target stack (masks isolate their children on
//!    a pushed surface) and blends the finished layer onto the canvas with its
//!    composition mode.
//!
//! Key constraints:
//!
//! - **No unsafe**: `unsafe` is forbidden in this crate.
//! - **Deterministic**: the same packshot and assets produce the same pixels;
//!   this is a re-run-on-change compositor, not an animation engine.
//! - **Premultiplied RGBA8** end-to-end: surfaces and prepared images hold
//!   premultiplied pixels.
//! - **Recoverable by layer**: resource and geometry failures degrade the
//!   affected node or layer; only contract violations abort a pass.
#![forbid(unsafe_code)]

pub mod assets;
pub mod composition;
pub mod foundation;
pub mod projection;
pub mod render;

pub use assets::cache::{AssetRoot, ImageCache, PreparedImage, normalize_rel_path};
pub use assets::decode::decode_image;
pub use composition::dsl::{PackshotBuilder, cone_node, image_node, mask_node, plane_node};
pub use composition::model::{
    BlendMode, ConeConfig, ControlPoints, ImageConfig, Layer, LayerConfig, MaskConfig, NodeConfig,
    NodeKind, Packshot, PackshotConfig, PlaneConfig,
};
pub use composition::tree::{NodeId, RenderNode, TreeVisitor, flatten, replace_node, walk};
pub use foundation::core::{Affine, Canvas, ColorChannel, Point, Rect, Rgba8Premul, Vec2};
pub use foundation::error::{PackshotError, PackshotResult};
pub use projection::cone::{ConeCamera, ConeHit, ConeSurface, Ray};
pub use projection::homography::Homography;
pub use render::cone::ConeRenderer;
pub use render::image::ImageRenderer;
pub use render::mask::MaskRenderer;
pub use render::pipeline::{
    LoadFailure, LoadReport, RenderPhase, RenderPipeline, render_packshot,
};
pub use render::plane::PlaneRenderer;
pub use render::renderer::{
    RenderEnv, RenderOutput, RenderQuality, Renderer, RendererArena, RendererRegistry,
};
pub use render::surface::{Stencil, Surface};
