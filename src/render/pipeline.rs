use std::sync::Arc;

use crate::{
    assets::cache::AssetRoot,
    composition::model::{Layer, Packshot},
    composition::tree::{NodeId, RenderNode, flatten},
    foundation::core::Rgba8Premul,
    foundation::error::{PackshotError, PackshotResult},
    render::renderer::{RenderEnv, RenderOutput, RenderQuality, RendererArena, RendererRegistry},
    render::surface::Surface,
};

/// Pipeline phase, observable between calls.
///
/// `Idle -> LoadingResources -> Idle -> Compositing -> Idle`; the caller
/// re-enters `LoadingResources` (by calling [`RenderPipeline::load`]) on any
/// dependency change: layer list, render-tree identity, layer config, canvas
/// size.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RenderPhase {
    #[default]
    Idle,
    LoadingResources,
    Compositing,
}

/// One renderer's failed resource load, attached to its layer and node.
#[derive(Clone, Debug)]
pub struct LoadFailure {
    pub layer: String,
    pub node: NodeId,
    pub source: Option<String>,
    pub message: String,
}

/// Outcome of a load pass. Failures are collected, never thrown: a failed
/// layer degrades to placeholder/blank while its siblings render normally.
#[derive(Clone, Debug, Default)]
pub struct LoadReport {
    pub failures: Vec<LoadFailure>,
}

impl LoadReport {
    pub fn is_ok(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Orchestrates the per-layer tree walk: loads resources, keeps the renderer
/// arena in sync with the trees, and drives the compositing pass.
pub struct RenderPipeline {
    registry: RendererRegistry,
    arena: RendererArena,
    assets: AssetRoot,
    phase: RenderPhase,
}

impl RenderPipeline {
    pub fn new(assets: AssetRoot) -> Self {
        Self::with_registry(assets, RendererRegistry::default())
    }

    pub fn with_registry(assets: AssetRoot, registry: RendererRegistry) -> Self {
        Self {
            registry,
            arena: RendererArena::new(),
            assets,
            phase: RenderPhase::Idle,
        }
    }

    pub fn phase(&self) -> RenderPhase {
        self.phase
    }

    /// Sync the renderer arena to the packshot's enabled trees and resolve
    /// every renderer's resources. Must settle before [`RenderPipeline::render`].
    ///
    /// Disabled layers are skipped entirely: no renderer instances, no IO.
    #[tracing::instrument(skip(self, packshot), fields(packshot = %packshot.name))]
    pub fn load(&mut self, packshot: &Packshot) -> PackshotResult<LoadReport> {
        packshot.validate()?;
        self.phase = RenderPhase::LoadingResources;

        let live: Vec<_> = enabled_nodes(packshot)
            .iter()
            .map(|(_, node)| (node.id, node.kind()))
            .collect();
        // Dispose-then-create keeps peak resource usage bounded.
        self.arena.sync(&live, &self.registry)?;

        let mut report = LoadReport::default();
        for (layer, node) in enabled_nodes(packshot) {
            let renderer = self.arena.get_mut(node.id)?;
            if let Err(e) = renderer.load(&node.config, &self.assets) {
                if !e.is_recoverable() {
                    self.phase = RenderPhase::Idle;
                    return Err(e);
                }
                tracing::warn!(layer = %layer.name, node = node.id.as_u64(), error = %e, "resource load failed");
                report.failures.push(LoadFailure {
                    layer: layer.name.clone(),
                    node: node.id,
                    source: node.config.image_source().map(str::to_string),
                    message: e.to_string(),
                });
            }
        }

        self.phase = RenderPhase::Idle;
        Ok(report)
    }

    /// Render the packshot onto a fresh canvas-sized surface.
    pub fn render(
        &mut self,
        packshot: &Packshot,
        quality: RenderQuality,
    ) -> PackshotResult<Surface> {
        let mut target = Surface::for_canvas(packshot.config.canvas())?;
        self.render_into(&mut target, packshot, quality)?;
        Ok(target)
    }

    /// Synchronous compositing pass. Assumes [`RenderPipeline::load`] has
    /// settled for this packshot; rendering unloaded trees is a contract
    /// violation surfaced by the renderers themselves.
    ///
    /// Layers composite bottom-to-top. Each enabled layer draws its tree onto
    /// its own transparent surface, which is then blended onto the canvas with
    /// the layer's composition mode — so one layer's blend mode or mask can
    /// never leak into the next.
    #[tracing::instrument(skip_all, fields(packshot = %packshot.name))]
    pub fn render_into(
        &mut self,
        target: &mut Surface,
        packshot: &Packshot,
        quality: RenderQuality,
    ) -> PackshotResult<()> {
        if target.canvas() != packshot.config.canvas() {
            return Err(PackshotError::contract(
                "render target does not match the packshot canvas size",
            ));
        }

        self.phase = RenderPhase::Compositing;
        let result = self.composite_pass(target, packshot, quality);
        self.phase = RenderPhase::Idle;
        result
    }

    fn composite_pass(
        &mut self,
        target: &mut Surface,
        packshot: &Packshot,
        quality: RenderQuality,
    ) -> PackshotResult<()> {
        target.clear(Rgba8Premul::transparent());
        let env = RenderEnv {
            canvas: packshot.config.canvas(),
            quality,
        };

        for layer in &packshot.layers {
            if layer.config.is_disabled {
                tracing::debug!(layer = %layer.name, "layer disabled, skipped");
                continue;
            }

            let mut stack = vec![Surface::for_canvas(env.canvas)?];
            render_node(&mut self.arena, &layer.render_tree, &mut stack, &env)?;
            let layer_surface = stack
                .pop()
                .ok_or_else(|| PackshotError::contract("surface stack underflow"))?;

            target.composite_over(&layer_surface, layer.config.composition)?;
        }
        Ok(())
    }

    /// Dispose every renderer instance and drop their resources.
    pub fn dispose(&mut self) {
        self.arena.dispose_all();
    }

    #[cfg(test)]
    pub(crate) fn arena(&self) -> &RendererArena {
        &self.arena
    }
}

fn enabled_nodes(packshot: &Packshot) -> Vec<(&Layer, Arc<RenderNode>)> {
    let mut out = Vec::new();
    for layer in &packshot.layers {
        if layer.config.is_disabled {
            continue;
        }
        for node in flatten(&layer.render_tree) {
            out.push((layer, node));
        }
    }
    out
}

/// The explicit draw-target stack walk. The top of `stack` is the active
/// surface; an isolating node pushes its child surface before descending and
/// the matching `finish` runs as a plain post-order step after the pop.
fn render_node(
    arena: &mut RendererArena,
    node: &Arc<RenderNode>,
    stack: &mut Vec<Surface>,
    env: &RenderEnv,
) -> PackshotResult<()> {
    let target = stack
        .last_mut()
        .ok_or_else(|| PackshotError::contract("surface stack underflow"))?;

    let output = match arena.get_mut(node.id)?.render(target, &node.config, env) {
        Ok(output) => output,
        Err(e) if e.is_recoverable() => {
            tracing::warn!(node = node.id.as_u64(), kind = %node.kind(), error = %e, "node skipped");
            return Ok(());
        }
        Err(e) => return Err(e),
    };

    match output {
        RenderOutput::Drawn => {
            for child in &node.children {
                render_node(arena, child, stack, env)?;
            }
        }
        RenderOutput::Isolate { child } => {
            stack.push(child);
            let mut walk_result = Ok(());
            for child_node in &node.children {
                walk_result = render_node(arena, child_node, stack, env);
                if walk_result.is_err() {
                    break;
                }
            }
            let child_surface = stack
                .pop()
                .ok_or_else(|| PackshotError::contract("surface stack underflow"))?;
            walk_result?;

            let parent = stack
                .last_mut()
                .ok_or_else(|| PackshotError::contract("surface stack underflow"))?;
            arena
                .get_mut(node.id)?
                .finish(parent, child_surface, &node.config, env)?;
        }
    }
    Ok(())
}

/// One-shot convenience: load then render at full quality.
pub fn render_packshot(packshot: &Packshot, assets: AssetRoot) -> PackshotResult<Surface> {
    let mut pipeline = RenderPipeline::new(assets);
    let report = pipeline.load(packshot)?;
    if !report.is_ok() {
        tracing::warn!(
            failures = report.failures.len(),
            "rendering with degraded layers"
        );
    }
    let surface = pipeline.render(packshot, RenderQuality::Full);
    pipeline.dispose();
    surface
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::composition::dsl::{PackshotBuilder, image_node};
    use crate::composition::model::LayerConfig;

    fn temp_assets() -> AssetRoot {
        AssetRoot::new(std::env::temp_dir().join("packshot_pipeline_no_assets"))
    }

    #[test]
    fn load_collects_failures_without_aborting() {
        let ps = PackshotBuilder::new("p", 8, 8)
            .layer("a", image_node(Some("missing_a.png")))
            .layer("b", image_node(None))
            .build()
            .unwrap();

        let mut pipeline = RenderPipeline::new(temp_assets());
        let report = pipeline.load(&ps).unwrap();
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].layer, "a");
        assert_eq!(report.failures[0].source.as_deref(), Some("missing_a.png"));

        // The failed layer renders blank; the pass still completes.
        let surface = pipeline.render(&ps, RenderQuality::Full).unwrap();
        assert!(surface.data().iter().all(|&b| b == 0));
    }

    #[test]
    fn disabled_layers_get_no_renderers() {
        let ps = PackshotBuilder::new("p", 8, 8)
            .layer_with(
                "off",
                LayerConfig {
                    is_disabled: true,
                    ..LayerConfig::default()
                },
                image_node(Some("unused.png")),
            )
            .layer("on", image_node(None))
            .build()
            .unwrap();

        let mut pipeline = RenderPipeline::new(temp_assets());
        let report = pipeline.load(&ps).unwrap();
        assert!(report.is_ok(), "disabled layer must not even load");
        assert_eq!(pipeline.arena().len(), 1);
    }

    #[test]
    fn render_without_load_is_contract_violation() {
        let ps = PackshotBuilder::new("p", 8, 8)
            .layer("a", image_node(Some("x.png")))
            .build()
            .unwrap();

        let mut pipeline = RenderPipeline::new(temp_assets());
        let err = pipeline.render(&ps, RenderQuality::Full).unwrap_err();
        assert!(matches!(err, PackshotError::Contract(_)));
    }

    #[test]
    fn render_target_size_mismatch_is_contract_violation() {
        let ps = PackshotBuilder::new("p", 8, 8)
            .layer("a", image_node(None))
            .build()
            .unwrap();

        let mut pipeline = RenderPipeline::new(temp_assets());
        pipeline.load(&ps).unwrap();
        let mut wrong = Surface::new(4, 4).unwrap();
        let err = pipeline
            .render_into(&mut wrong, &ps, RenderQuality::Full)
            .unwrap_err();
        assert!(matches!(err, PackshotError::Contract(_)));
    }

    #[test]
    fn phase_returns_to_idle() {
        let ps = PackshotBuilder::new("p", 8, 8)
            .layer("a", image_node(None))
            .build()
            .unwrap();

        let mut pipeline = RenderPipeline::new(temp_assets());
        assert_eq!(pipeline.phase(), RenderPhase::Idle);
        pipeline.load(&ps).unwrap();
        assert_eq!(pipeline.phase(), RenderPhase::Idle);
        pipeline.render(&ps, RenderQuality::Full).unwrap();
        assert_eq!(pipeline.phase(), RenderPhase::Idle);
    }

    #[test]
    fn reload_after_tree_replacement_swaps_renderers() {
        let tree = image_node(None);
        let old_id = tree.id;
        let ps = PackshotBuilder::new("p", 8, 8)
            .layer("a", tree)
            .build()
            .unwrap();

        let mut pipeline = RenderPipeline::new(temp_assets());
        pipeline.load(&ps).unwrap();
        assert!(pipeline.arena().contains(old_id));

        let mut ps2 = ps.clone();
        let replacement = image_node(None);
        let new_id = replacement.id;
        ps2.layers[0].render_tree = replacement;
        pipeline.load(&ps2).unwrap();
        assert!(!pipeline.arena().contains(old_id));
        assert!(pipeline.arena().contains(new_id));
    }
}
