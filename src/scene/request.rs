//! Render Requests
//!
//! A [`RenderRequest`] is the complete input of one scene pass: the objects
//! to draw, the camera, the lighting, and how materials and visibility are
//! overridden for this pass. It is built by a pure function of the scene, so
//! hiding everything except the focus subject for the mask pass never
//! touches the scene itself.

use std::sync::Arc;

use glam::{Mat4, Vec4};

use super::{Camera, CameraState, Lighting, Mesh, Scene, Shading, TextureMap};

/// Which scene pass a request feeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestKind {
    /// The full opaque scene.
    Main,
    /// Focus subject only, flat white, tested against the main depth.
    Mask,
    /// Focus subject only, own materials, own depth.
    Focus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VisibilityFilter {
    All,
    FocusSubjectOnly,
}

/// Per-pass material replacement.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MaterialOverride {
    /// Unshaded constant color for every drawn object.
    Flat(Vec4),
}

/// One resolved draw.
#[derive(Debug, Clone)]
pub struct DrawItem {
    pub mesh: Arc<Mesh>,
    pub transform: Mat4,
    pub color: Vec4,
    pub shading: Shading,
    pub map: Option<TextureMap>,
}

#[derive(Debug, Clone)]
pub struct RenderRequest {
    pub kind: RequestKind,
    pub camera: CameraState,
    pub lighting: Lighting,
    pub visibility: VisibilityFilter,
    pub material_override: Option<MaterialOverride>,
    /// Draws in submission order.
    pub items: Vec<DrawItem>,
}

impl RequestKind {
    #[must_use]
    pub fn visibility(self) -> VisibilityFilter {
        match self {
            Self::Main => VisibilityFilter::All,
            Self::Mask | Self::Focus => VisibilityFilter::FocusSubjectOnly,
        }
    }

    #[must_use]
    pub fn material_override(self) -> Option<MaterialOverride> {
        match self {
            Self::Mask => Some(MaterialOverride::Flat(Vec4::ONE)),
            Self::Main | Self::Focus => None,
        }
    }
}

impl RenderRequest {
    /// Snapshots `scene` for one pass.
    ///
    /// Only visible objects whose mesh has loaded and has at least one
    /// triangle are included, sorted by render order (stable).
    #[must_use]
    pub fn build(scene: &Scene, camera: &Camera, kind: RequestKind) -> Self {
        let visibility = kind.visibility();
        let material_override = kind.material_override();

        let mut ordered: Vec<_> = scene
            .iter()
            .filter(|(_, o)| o.visible)
            .filter(|(_, o)| match visibility {
                VisibilityFilter::All => true,
                VisibilityFilter::FocusSubjectOnly => o.focus_subject,
            })
            .filter_map(|(_, o)| o.mesh().map(|mesh| (o, mesh)))
            .filter(|(_, mesh)| mesh.triangle_count() > 0)
            .collect();
        ordered.sort_by_key(|(o, _)| o.render_order);

        let items = ordered
            .into_iter()
            .map(|(object, mesh)| {
                let (color, shading, map) = match material_override {
                    Some(MaterialOverride::Flat(color)) => (color, Shading::Unlit, None),
                    None => (
                        object.material.color,
                        object.material.shading,
                        object.material.map.clone(),
                    ),
                };
                DrawItem {
                    mesh: Arc::clone(mesh),
                    transform: object.transform,
                    color,
                    shading,
                    map,
                }
            })
            .collect();

        Self {
            kind,
            camera: camera.state(),
            lighting: scene.lighting,
            visibility,
            material_override,
            items,
        }
    }

    /// A request that draws nothing. Used to force target allocation.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            kind: RequestKind::Main,
            camera: CameraState::IDENTITY,
            lighting: Lighting::default(),
            visibility: VisibilityFilter::All,
            material_override: None,
            items: Vec::new(),
        }
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
