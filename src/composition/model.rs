use std::sync::Arc;

use crate::{
    composition::tree::RenderNode,
    foundation::core::{Canvas, ColorChannel, Point},
    foundation::error::{PackshotError, PackshotResult},
};

/// A full packshot: output canvas plus ordered layers (bottom-to-top).
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct Packshot {
    pub name: String,
    pub config: PackshotConfig,
    pub layers: Vec<Layer>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct PackshotConfig {
    pub width: u32,
    pub height: u32,
}

impl PackshotConfig {
    pub fn canvas(self) -> Canvas {
        Canvas {
            width: self.width,
            height: self.height,
        }
    }
}

/// One compositing unit: a named render tree plus layer-level options.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct Layer {
    pub name: String,
    #[serde(default)]
    pub config: LayerConfig,
    pub render_tree: Arc<RenderNode>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct LayerConfig {
    pub is_disabled: bool,
    /// UI hint only; persisted but never read by the render pipeline.
    pub is_expanded: bool,
    pub composition: BlendMode,
}

/// Layer composition mode (separable blend modes only).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlendMode {
    #[default]
    Normal,
    Multiply,
    Screen,
    Darken,
    Lighten,
}

/// Per-node renderer configuration, serialized as
/// `{"type": "image"|"mask"|"plane"|"cone", "config": {...}}`.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
#[serde(tag = "type", content = "config", rename_all = "lowercase")]
pub enum NodeConfig {
    Image(ImageConfig),
    Mask(MaskConfig),
    Plane(PlaneConfig),
    Cone(ConeConfig),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum NodeKind {
    Image,
    Mask,
    Plane,
    Cone,
}

impl NodeKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Mask => "mask",
            Self::Plane => "plane",
            Self::Cone => "cone",
        }
    }

    /// Parse a renderer tag. Unknown tags are a contract violation: the set of
    /// renderer types is closed and tags come from the factory's callers.
    pub fn from_tag(tag: &str) -> PackshotResult<Self> {
        match tag {
            "image" => Ok(Self::Image),
            "mask" => Ok(Self::Mask),
            "plane" => Ok(Self::Plane),
            "cone" => Ok(Self::Cone),
            other => Err(PackshotError::contract(format!(
                "unknown renderer type '{other}'"
            ))),
        }
    }
}

impl std::fmt::Display for NodeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, Default, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct ImageConfig {
    pub image: Option<String>,
}

#[derive(Clone, Debug, Default, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct MaskConfig {
    pub image: Option<String>,
    pub channel: ColorChannel,
    pub is_disabled: bool,
}

#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct PlaneConfig {
    pub image: Option<String>,
    pub control_points: ControlPoints,
}

impl Default for PlaneConfig {
    fn default() -> Self {
        Self {
            image: None,
            control_points: ControlPoints::identity(),
        }
    }
}

#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct ConeConfig {
    pub image: Option<String>,
    pub control_points: ControlPoints,
    pub diameter_top: f64,
    pub diameter_bottom: f64,
    pub height: f64,
}

impl Default for ConeConfig {
    fn default() -> Self {
        Self {
            image: None,
            control_points: ControlPoints::identity(),
            diameter_top: 1.0,
            diameter_bottom: 1.0,
            height: 1.0,
        }
    }
}

/// Four control points, clockwise top-left, top-right, bottom-right,
/// bottom-left, normalized to `[-1, 1]` with origin at the canvas center
/// (y grows downward, like pixel rows).
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ControlPoints(pub [Point; 4]);

impl ControlPoints {
    /// The corners of the canvas itself: the projected quad covers the whole
    /// output exactly.
    pub fn identity() -> Self {
        Self([
            Point::new(-1.0, -1.0),
            Point::new(1.0, -1.0),
            Point::new(1.0, 1.0),
            Point::new(-1.0, 1.0),
        ])
    }

    /// Convert normalized control points to canvas pixel coordinates.
    pub fn to_canvas(self, canvas: Canvas) -> [Point; 4] {
        let w = f64::from(canvas.width);
        let h = f64::from(canvas.height);
        self.0
            .map(|p| Point::new((p.x + 1.0) * 0.5 * w, (p.y + 1.0) * 0.5 * h))
    }

    /// Inverse of [`ControlPoints::to_canvas`] up to floating tolerance.
    pub fn from_canvas(points: [Point; 4], canvas: Canvas) -> Self {
        let w = f64::from(canvas.width);
        let h = f64::from(canvas.height);
        Self(points.map(|p| Point::new(p.x / w * 2.0 - 1.0, p.y / h * 2.0 - 1.0)))
    }

    pub fn is_finite(self) -> bool {
        self.0.iter().all(|p| p.x.is_finite() && p.y.is_finite())
    }
}

impl NodeConfig {
    pub fn kind(&self) -> NodeKind {
        match self {
            Self::Image(_) => NodeKind::Image,
            Self::Mask(_) => NodeKind::Mask,
            Self::Plane(_) => NodeKind::Plane,
            Self::Cone(_) => NodeKind::Cone,
        }
    }

    pub fn image_source(&self) -> Option<&str> {
        match self {
            Self::Image(c) => c.image.as_deref(),
            Self::Mask(c) => c.image.as_deref(),
            Self::Plane(c) => c.image.as_deref(),
            Self::Cone(c) => c.image.as_deref(),
        }
    }

    /// Control points for types that have them (the drag-handle UI interface).
    pub fn control_points(&self) -> Option<ControlPoints> {
        match self {
            Self::Plane(c) => Some(c.control_points),
            Self::Cone(c) => Some(c.control_points),
            Self::Image(_) | Self::Mask(_) => None,
        }
    }

    /// Returns a copy with replaced control points; a no-op for image/mask.
    /// Round-trips with [`NodeConfig::control_points`].
    pub fn with_control_points(&self, points: ControlPoints) -> Self {
        match self {
            Self::Plane(c) => Self::Plane(PlaneConfig {
                control_points: points,
                ..c.clone()
            }),
            Self::Cone(c) => Self::Cone(ConeConfig {
                control_points: points,
                ..c.clone()
            }),
            other => other.clone(),
        }
    }

    fn validate(&self) -> PackshotResult<()> {
        if let Some(cp) = self.control_points()
            && !cp.is_finite()
        {
            return Err(PackshotError::validation(format!(
                "{} node has non-finite control points",
                self.kind()
            )));
        }
        if let Self::Cone(c) = self {
            if !(c.height.is_finite() && c.height > 0.0) {
                return Err(PackshotError::validation("cone height must be > 0"));
            }
            if !(c.diameter_top.is_finite() && c.diameter_top >= 0.0)
                || !(c.diameter_bottom.is_finite() && c.diameter_bottom >= 0.0)
            {
                return Err(PackshotError::validation("cone diameters must be >= 0"));
            }
            if c.diameter_top == 0.0 && c.diameter_bottom == 0.0 {
                return Err(PackshotError::validation(
                    "cone must have at least one diameter > 0",
                ));
            }
        }
        Ok(())
    }
}

impl Packshot {
    pub fn validate(&self) -> PackshotResult<()> {
        if self.config.width == 0 || self.config.height == 0 {
            return Err(PackshotError::validation("canvas width/height must be > 0"));
        }

        for layer in &self.layers {
            validate_tree(&layer.name, &layer.render_tree)?;
        }
        Ok(())
    }
}

fn validate_tree(layer: &str, node: &Arc<RenderNode>) -> PackshotResult<()> {
    node.config.validate()?;
    if node.config.kind() != NodeKind::Mask && !node.children.is_empty() {
        return Err(PackshotError::validation(format!(
            "layer '{layer}': {} nodes must be leaves (only mask nodes nest children)",
            node.config.kind()
        )));
    }
    for child in &node.children {
        validate_tree(layer, child)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::composition::dsl::{image_node, mask_node, plane_node};

    fn basic_packshot() -> Packshot {
        Packshot {
            name: "bottle".to_string(),
            config: PackshotConfig {
                width: 640,
                height: 480,
            },
            layers: vec![
                Layer {
                    name: "background".to_string(),
                    config: LayerConfig::default(),
                    render_tree: image_node(Some("bg.png")),
                },
                Layer {
                    name: "label".to_string(),
                    config: LayerConfig {
                        composition: BlendMode::Multiply,
                        ..LayerConfig::default()
                    },
                    render_tree: mask_node(
                        Some("mask.png"),
                        ColorChannel::Red,
                        vec![plane_node(Some("label.png"), ControlPoints::identity())],
                    ),
                },
            ],
        }
    }

    #[test]
    fn json_roundtrip() {
        let ps = basic_packshot();
        let s = serde_json::to_string_pretty(&ps).unwrap();
        let de: Packshot = serde_json::from_str(&s).unwrap();
        assert_eq!(de.config.width, 640);
        assert_eq!(de.layers.len(), 2);
        assert_eq!(de.layers[1].config.composition, BlendMode::Multiply);
        assert_eq!(de.layers[1].render_tree.children.len(), 1);
    }

    #[test]
    fn node_ids_are_not_serialized() {
        let ps = basic_packshot();
        let v = serde_json::to_value(&ps).unwrap();
        let node = &v["layers"][0]["render_tree"];
        assert_eq!(node["type"], "image");
        assert!(node.get("id").is_none());
    }

    #[test]
    fn validate_rejects_zero_canvas() {
        let mut ps = basic_packshot();
        ps.config.width = 0;
        assert!(ps.validate().is_err());
    }

    #[test]
    fn validate_rejects_children_on_leaf_types() {
        let mut ps = basic_packshot();
        ps.layers[0].render_tree = RenderNode::with_children(
            NodeConfig::Image(ImageConfig::default()),
            vec![image_node(None)],
        );
        assert!(ps.validate().is_err());
    }

    #[test]
    fn validate_rejects_flat_cone() {
        let mut ps = basic_packshot();
        ps.layers[0].render_tree = RenderNode::new(NodeConfig::Cone(ConeConfig {
            diameter_top: 0.0,
            diameter_bottom: 0.0,
            ..ConeConfig::default()
        }));
        assert!(ps.validate().is_err());
    }

    #[test]
    fn control_points_canvas_roundtrip() {
        let canvas = Canvas {
            width: 800,
            height: 600,
        };
        let cp = ControlPoints([
            Point::new(-0.75, -0.5),
            Point::new(0.8, -0.4),
            Point::new(0.6, 0.9),
            Point::new(-0.9, 0.7),
        ]);
        let back = ControlPoints::from_canvas(cp.to_canvas(canvas), canvas);
        for (a, b) in cp.0.iter().zip(back.0.iter()) {
            assert!((a.x - b.x).abs() < 1e-6);
            assert!((a.y - b.y).abs() < 1e-6);
        }
    }

    #[test]
    fn identity_control_points_hit_canvas_corners() {
        let canvas = Canvas {
            width: 100,
            height: 50,
        };
        let pts = ControlPoints::identity().to_canvas(canvas);
        assert_eq!(pts[0], Point::new(0.0, 0.0));
        assert_eq!(pts[1], Point::new(100.0, 0.0));
        assert_eq!(pts[2], Point::new(100.0, 50.0));
        assert_eq!(pts[3], Point::new(0.0, 50.0));
    }

    #[test]
    fn with_control_points_roundtrips() {
        let cfg = NodeConfig::Plane(PlaneConfig::default());
        let cp = ControlPoints([
            Point::new(-0.5, -0.5),
            Point::new(0.5, -0.5),
            Point::new(0.5, 0.5),
            Point::new(-0.5, 0.5),
        ]);
        let updated = cfg.with_control_points(cp);
        assert_eq!(updated.control_points(), Some(cp));

        let mask = NodeConfig::Mask(MaskConfig::default());
        assert_eq!(mask.with_control_points(cp).control_points(), None);
    }

    #[test]
    fn unknown_tag_is_contract_violation() {
        let err = NodeKind::from_tag("video").unwrap_err();
        assert!(matches!(err, PackshotError::Contract(_)));
    }
}
