use std::collections::HashMap;

use crate::{
    assets::cache::AssetRoot,
    composition::model::{NodeConfig, NodeKind},
    composition::tree::NodeId,
    foundation::core::Canvas,
    foundation::error::{PackshotError, PackshotResult},
    render::surface::Surface,
};

/// Rendering quality for one pass. `Draft` is the interactive-drag path: the
/// cone tracer samples every other pixel and fills 2x2 blocks.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RenderQuality {
    #[default]
    Full,
    Draft,
}

#[derive(Clone, Copy, Debug)]
pub struct RenderEnv {
    pub canvas: Canvas,
    pub quality: RenderQuality,
}

/// What a renderer did with its node.
#[derive(Debug)]
pub enum RenderOutput {
    /// Drew (or intentionally skipped drawing) onto the given target; children
    /// draw onto the same target.
    Drawn,
    /// The node isolates its children: they draw onto `child`, and the walker
    /// hands the finished surface back through [`Renderer::finish`].
    Isolate { child: Surface },
}

/// The common contract of the four renderer types.
///
/// Instances are stateful and bound 1:1 to a render node id for their
/// lifetime; the [`RendererArena`] creates and disposes them as node ids
/// appear and disappear.
pub trait Renderer {
    fn kind(&self) -> NodeKind;

    /// Resolve all resources `render` needs. Idempotent for an unchanged
    /// config (no redundant IO). On failure the renderer must stay in a state
    /// where `render` degrades to a placeholder or blank rather than crashing
    /// the pass for sibling layers.
    fn load(&mut self, config: &NodeConfig, assets: &AssetRoot) -> PackshotResult<()>;

    fn render(
        &mut self,
        target: &mut Surface,
        config: &NodeConfig,
        env: &RenderEnv,
    ) -> PackshotResult<RenderOutput>;

    /// Post-order step for isolating nodes: merge the finished child surface
    /// back onto the parent. Only called after `render` returned
    /// [`RenderOutput::Isolate`].
    fn finish(
        &mut self,
        parent: &mut Surface,
        child: Surface,
        config: &NodeConfig,
        env: &RenderEnv,
    ) -> PackshotResult<()> {
        let _ = (parent, child, config, env);
        Ok(())
    }

    /// Release held resources. Idempotent and infallible; cleanup problems
    /// are logged, never raised.
    fn dispose(&mut self) {}
}

impl std::fmt::Debug for dyn Renderer + '_ {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Renderer({:?})", self.kind())
    }
}

type RendererCtor = Box<dyn Fn() -> Box<dyn Renderer>>;

/// The sole construction point for renderer instances.
///
/// Pre-seeded with the four built-in types; entries can be replaced to
/// inject test doubles.
pub struct RendererRegistry {
    ctors: HashMap<NodeKind, RendererCtor>,
}

impl Default for RendererRegistry {
    fn default() -> Self {
        let mut registry = Self {
            ctors: HashMap::new(),
        };
        registry.register(NodeKind::Image, || {
            Box::new(crate::render::image::ImageRenderer::new())
        });
        registry.register(NodeKind::Mask, || {
            Box::new(crate::render::mask::MaskRenderer::new())
        });
        registry.register(NodeKind::Plane, || {
            Box::new(crate::render::plane::PlaneRenderer::new())
        });
        registry.register(NodeKind::Cone, || {
            Box::new(crate::render::cone::ConeRenderer::new())
        });
        registry
    }
}

impl RendererRegistry {
    pub fn register(
        &mut self,
        kind: NodeKind,
        ctor: impl Fn() -> Box<dyn Renderer> + 'static,
    ) {
        self.ctors.insert(kind, Box::new(ctor));
    }

    pub fn create(&self, kind: NodeKind) -> PackshotResult<Box<dyn Renderer>> {
        let ctor = self.ctors.get(&kind).ok_or_else(|| {
            PackshotError::contract(format!("no renderer registered for '{kind}'"))
        })?;
        Ok(ctor())
    }

    /// String-tag factory; unknown tags are a contract violation.
    pub fn create_by_tag(&self, tag: &str) -> PackshotResult<Box<dyn Renderer>> {
        self.create(NodeKind::from_tag(tag)?)
    }
}

/// Renderer instances keyed by stable node id.
///
/// `sync` diffs by id: ids no longer present are disposed and removed FIRST,
/// then renderers for new ids are created, so peak resource usage stays
/// bounded during tree edits.
#[derive(Default)]
pub struct RendererArena {
    renderers: HashMap<NodeId, Box<dyn Renderer>>,
}

impl RendererArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.renderers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.renderers.is_empty()
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.renderers.contains_key(&id)
    }

    pub fn sync(
        &mut self,
        live: &[(NodeId, NodeKind)],
        registry: &RendererRegistry,
    ) -> PackshotResult<()> {
        let live_ids: std::collections::HashSet<NodeId> =
            live.iter().map(|(id, _)| *id).collect();

        let stale: Vec<NodeId> = self
            .renderers
            .keys()
            .filter(|id| !live_ids.contains(id))
            .copied()
            .collect();
        for id in stale {
            if let Some(mut renderer) = self.renderers.remove(&id) {
                renderer.dispose();
            }
        }

        for &(id, kind) in live {
            if !self.renderers.contains_key(&id) {
                self.renderers.insert(id, registry.create(kind)?);
            }
        }
        Ok(())
    }

    /// A missing id means render was invoked without a preceding sync/load —
    /// a programmer error.
    pub fn get_mut(&mut self, id: NodeId) -> PackshotResult<&mut (dyn Renderer + '_)> {
        match self.renderers.get_mut(&id) {
            Some(r) => Ok(r.as_mut()),
            None => Err(PackshotError::contract(format!(
                "no renderer instance for node {}; load before render",
                id.as_u64()
            ))),
        }
    }

    pub fn dispose_all(&mut self) {
        for (_, mut renderer) in self.renderers.drain() {
            renderer.dispose();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;

    struct ProbeRenderer {
        log: Rc<RefCell<Vec<String>>>,
        tag: &'static str,
    }

    impl Renderer for ProbeRenderer {
        fn kind(&self) -> NodeKind {
            NodeKind::Image
        }

        fn load(&mut self, _config: &NodeConfig, _assets: &AssetRoot) -> PackshotResult<()> {
            Ok(())
        }

        fn render(
            &mut self,
            _target: &mut Surface,
            _config: &NodeConfig,
            _env: &RenderEnv,
        ) -> PackshotResult<RenderOutput> {
            Ok(RenderOutput::Drawn)
        }

        fn dispose(&mut self) {
            self.log.borrow_mut().push(format!("dispose {}", self.tag));
        }
    }

    fn probe_registry(log: Rc<RefCell<Vec<String>>>) -> RendererRegistry {
        let mut registry = RendererRegistry::default();
        let create_log = Rc::clone(&log);
        registry.register(NodeKind::Image, move || {
            create_log.borrow_mut().push("create".to_string());
            Box::new(ProbeRenderer {
                log: Rc::clone(&create_log),
                tag: "probe",
            })
        });
        registry
    }

    #[test]
    fn create_by_tag_rejects_unknown() {
        let registry = RendererRegistry::default();
        assert!(registry.create_by_tag("image").is_ok());
        assert!(matches!(
            registry.create_by_tag("sphere"),
            Err(PackshotError::Contract(_))
        ));
    }

    #[test]
    fn sync_disposes_before_creating() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let registry = probe_registry(Rc::clone(&log));
        let mut arena = RendererArena::new();

        let a = NodeId::fresh();
        arena.sync(&[(a, NodeKind::Image)], &registry).unwrap();
        assert_eq!(arena.len(), 1);

        let b = NodeId::fresh();
        arena.sync(&[(b, NodeKind::Image)], &registry).unwrap();
        assert_eq!(arena.len(), 1);
        assert!(!arena.contains(a));
        assert!(arena.contains(b));
        assert_eq!(
            &*log.borrow(),
            &["create", "dispose probe", "create"],
            "old renderer must be disposed before the replacement is created"
        );
    }

    #[test]
    fn sync_keeps_surviving_ids() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let registry = probe_registry(Rc::clone(&log));
        let mut arena = RendererArena::new();

        let a = NodeId::fresh();
        let b = NodeId::fresh();
        arena
            .sync(&[(a, NodeKind::Image), (b, NodeKind::Image)], &registry)
            .unwrap();
        arena
            .sync(&[(a, NodeKind::Image), (b, NodeKind::Image)], &registry)
            .unwrap();
        assert_eq!(log.borrow().iter().filter(|s| *s == "create").count(), 2);
    }

    #[test]
    fn get_mut_on_missing_id_is_contract_violation() {
        let mut arena = RendererArena::new();
        let err = arena.get_mut(NodeId::fresh()).unwrap_err();
        assert!(matches!(err, PackshotError::Contract(_)));
    }

    #[test]
    fn dispose_all_empties_arena() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let registry = probe_registry(Rc::clone(&log));
        let mut arena = RendererArena::new();
        arena
            .sync(&[(NodeId::fresh(), NodeKind::Image)], &registry)
            .unwrap();
        arena.dispose_all();
        assert!(arena.is_empty());
        assert!(log.borrow().iter().any(|s| s.starts_with("dispose")));
    }
}
