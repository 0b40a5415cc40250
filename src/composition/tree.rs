use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};

use crate::composition::model::{NodeConfig, NodeKind};

/// Process-unique identity of a render node.
///
/// Ids are transient: they are minted when a node is constructed (including on
/// deserialization) and never persisted. The renderer arena keys instances by
/// id, so replacing a node in a tree retires the old renderer and creates a
/// fresh one, while structurally shared subtrees keep theirs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u64);

static NEXT_NODE_ID: AtomicU64 = AtomicU64::new(1);

impl NodeId {
    pub fn fresh() -> Self {
        Self(NEXT_NODE_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }
}

/// One drawing operation and its nested children (e.g. a mask with an image
/// child). Trees are immutable values: edits build a new tree via
/// [`replace_node`] with `Arc` structural sharing.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct RenderNode {
    #[serde(skip, default = "NodeId::fresh")]
    pub id: NodeId,
    #[serde(flatten)]
    pub config: NodeConfig,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<Arc<RenderNode>>,
}

impl RenderNode {
    pub fn new(config: NodeConfig) -> Arc<Self> {
        Self::with_children(config, Vec::new())
    }

    pub fn with_children(config: NodeConfig, children: Vec<Arc<RenderNode>>) -> Arc<Self> {
        Arc::new(Self {
            id: NodeId::fresh(),
            config,
            children,
        })
    }

    pub fn kind(&self) -> NodeKind {
        self.config.kind()
    }
}

/// Paired enter/leave callbacks for a depth-first walk.
///
/// `leave` receives the value its node's `enter` returned, so per-node state
/// set up on the way down is handed back on the way up without a side table.
pub trait TreeVisitor {
    type Entered;

    fn enter(&mut self, node: &Arc<RenderNode>) -> Self::Entered;
    fn leave(&mut self, node: &Arc<RenderNode>, entered: Self::Entered);
}

/// Depth-first traversal: pre-order `enter`, children in array order,
/// post-order `leave`.
pub fn walk<V: TreeVisitor>(root: &Arc<RenderNode>, visitor: &mut V) {
    let entered = visitor.enter(root);
    for child in &root.children {
        walk(child, visitor);
    }
    visitor.leave(root, entered);
}

/// Pre-order sequence of nodes.
pub fn flatten(root: &Arc<RenderNode>) -> Vec<Arc<RenderNode>> {
    let mut out = Vec::new();
    flatten_into(root, &mut out);
    out
}

fn flatten_into(node: &Arc<RenderNode>, out: &mut Vec<Arc<RenderNode>>) {
    out.push(Arc::clone(node));
    for child in &node.children {
        flatten_into(child, out);
    }
}

/// Returns a new tree with `replacement` at the position of the node with id
/// `target`. Subtrees not on the path to `target` are shared (`Arc`
/// pointer-equal with the input). If `target` is not present the original root
/// is returned unchanged — a silent no-op the caller should avoid relying on.
pub fn replace_node(
    root: &Arc<RenderNode>,
    target: NodeId,
    replacement: Arc<RenderNode>,
) -> Arc<RenderNode> {
    replace_impl(root, target, &replacement).unwrap_or_else(|| Arc::clone(root))
}

fn replace_impl(
    node: &Arc<RenderNode>,
    target: NodeId,
    replacement: &Arc<RenderNode>,
) -> Option<Arc<RenderNode>> {
    if node.id == target {
        return Some(Arc::clone(replacement));
    }

    for (i, child) in node.children.iter().enumerate() {
        if let Some(new_child) = replace_impl(child, target, replacement) {
            let mut children = node.children.clone();
            children[i] = new_child;
            return Some(Arc::new(RenderNode {
                id: node.id,
                config: node.config.clone(),
                children,
            }));
        }
    }
    None
}
