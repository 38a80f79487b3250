//! Minimal Scene Layer
//!
//! A flat list of renderable objects, keyed by `slotmap` keys. This is just
//! enough scene to feed the compositor's scene passes:
//! - [`SceneObject`]: mesh source, material, transform, visibility and the
//!   focus-subject flag read by the mask and focus passes
//! - [`TextureMap`]: optional color texture of a [`Material`]
//! - [`Lighting`]: one directional light plus an ambient term
//! - [`Camera`]: perspective camera
//! - [`RenderRequest`]: per-pass snapshot built from the scene, never
//!   mutating it

pub mod camera;
pub mod mesh;
pub mod request;

pub use camera::{Camera, CameraState};
pub use mesh::Mesh;
pub use request::{DrawItem, MaterialOverride, RenderRequest, RequestKind, VisibilityFilter};

use std::sync::Arc;

use glam::{Mat4, Vec2, Vec3, Vec4};
use slotmap::{SlotMap, new_key_type};

use crate::assets::{AssetHandle, AssetPoll};
use crate::pixels::PixelBuffer;

new_key_type! {
    pub struct ObjectKey;
}

/// How an object's color responds to the scene lighting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Shading {
    /// Output the material color unchanged.
    Unlit,
    /// Two-sided diffuse lighting from the directional light plus ambient.
    #[default]
    Lambert,
}

/// Color texture multiplied into a material's color.
///
/// Sampled nearest with repeat addressing at `uv * repeat`.
#[derive(Debug, Clone, PartialEq)]
pub struct TextureMap {
    pub image: Arc<PixelBuffer>,
    pub repeat: Vec2,
}

impl TextureMap {
    #[must_use]
    pub fn new(image: Arc<PixelBuffer>) -> Self {
        Self {
            image,
            repeat: Vec2::ONE,
        }
    }

    #[must_use]
    pub fn with_repeat(mut self, u: f32, v: f32) -> Self {
        self.repeat = Vec2::new(u, v);
        self
    }

    #[inline]
    #[must_use]
    pub fn sample(&self, uv: Vec2) -> Vec4 {
        self.image.sample_repeat(uv * self.repeat)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Material {
    /// Linear RGBA.
    pub color: Vec4,
    pub shading: Shading,
    pub map: Option<TextureMap>,
}

impl Default for Material {
    fn default() -> Self {
        Self::lambert(Vec4::ONE)
    }
}

impl Material {
    #[must_use]
    pub fn lambert(color: Vec4) -> Self {
        Self {
            color,
            shading: Shading::Lambert,
            map: None,
        }
    }

    #[must_use]
    pub fn unlit(color: Vec4) -> Self {
        Self {
            color,
            shading: Shading::Unlit,
            map: None,
        }
    }

    #[must_use]
    pub fn with_map(mut self, map: TextureMap) -> Self {
        self.map = Some(map);
        self
    }
}

/// Where an object's geometry comes from.
#[derive(Debug)]
pub enum MeshSource {
    Ready(Arc<Mesh>),
    /// Still loading; promoted by [`Scene::poll_assets`].
    Loading(AssetHandle<Arc<Mesh>>),
    /// The load failed. The object is kept but never drawn.
    Failed(String),
}

#[derive(Debug)]
pub struct SceneObject {
    pub name: String,
    pub source: MeshSource,
    pub material: Material,
    pub transform: Mat4,
    pub visible: bool,
    /// Drawn by the mask / focus passes.
    pub focus_subject: bool,
    /// Objects are drawn in ascending order; ties keep insertion order.
    pub render_order: i32,
}

impl SceneObject {
    #[must_use]
    pub fn new(name: impl Into<String>, mesh: Arc<Mesh>) -> Self {
        Self::with_source(name, MeshSource::Ready(mesh))
    }

    /// An object whose mesh arrives later through `handle`.
    #[must_use]
    pub fn loading(name: impl Into<String>, handle: AssetHandle<Arc<Mesh>>) -> Self {
        Self::with_source(name, MeshSource::Loading(handle))
    }

    fn with_source(name: impl Into<String>, source: MeshSource) -> Self {
        Self {
            name: name.into(),
            source,
            material: Material::default(),
            transform: Mat4::IDENTITY,
            visible: true,
            focus_subject: false,
            render_order: 0,
        }
    }

    #[must_use]
    pub fn with_material(mut self, material: Material) -> Self {
        self.material = material;
        self
    }

    #[must_use]
    pub fn with_transform(mut self, transform: Mat4) -> Self {
        self.transform = transform;
        self
    }

    #[must_use]
    pub fn with_focus_subject(mut self, focus: bool) -> Self {
        self.focus_subject = focus;
        self
    }

    #[must_use]
    pub fn with_render_order(mut self, order: i32) -> Self {
        self.render_order = order;
        self
    }

    #[must_use]
    pub fn with_visible(mut self, visible: bool) -> Self {
        self.visible = visible;
        self
    }

    /// The mesh, once it is available.
    #[must_use]
    pub fn mesh(&self) -> Option<&Arc<Mesh>> {
        match &self.source {
            MeshSource::Ready(mesh) => Some(mesh),
            _ => None,
        }
    }

    #[inline]
    #[must_use]
    pub fn is_loading(&self) -> bool {
        matches!(self.source, MeshSource::Loading(_))
    }
}

/// Directional light plus ambient term, both linear RGB.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Lighting {
    /// Direction the light travels in (normalized).
    pub direction: Vec3,
    pub color: Vec3,
    pub ambient: Vec3,
}

impl Default for Lighting {
    fn default() -> Self {
        // A light placed at (10, 10, -10) shining toward the origin.
        Self {
            direction: (-Vec3::new(10.0, 10.0, -10.0)).normalize(),
            color: Vec3::splat(0.6),
            ambient: Vec3::splat(0.45),
        }
    }
}

/// Flat collection of renderable objects.
#[derive(Debug, Default)]
pub struct Scene {
    objects: SlotMap<ObjectKey, SceneObject>,
    pub lighting: Lighting,
}

impl Scene {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, object: SceneObject) -> ObjectKey {
        self.objects.insert(object)
    }

    pub fn remove(&mut self, key: ObjectKey) -> Option<SceneObject> {
        self.objects.remove(key)
    }

    #[must_use]
    pub fn get(&self, key: ObjectKey) -> Option<&SceneObject> {
        self.objects.get(key)
    }

    pub fn get_mut(&mut self, key: ObjectKey) -> Option<&mut SceneObject> {
        self.objects.get_mut(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (ObjectKey, &SceneObject)> {
        self.objects.iter()
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Number of objects still waiting on their mesh.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.objects.values().filter(|o| o.is_loading()).count()
    }

    /// Promotes resolved asset handles. Call once per frame.
    ///
    /// Returns the number of objects whose mesh became ready.
    pub fn poll_assets(&mut self) -> usize {
        let mut resolved = 0;
        for object in self.objects.values_mut() {
            let MeshSource::Loading(handle) = &object.source else {
                continue;
            };
            match handle.poll() {
                AssetPoll::Pending => {}
                AssetPoll::Ready(mesh) => {
                    log::info!(
                        "Mesh for '{}' ready ({} triangles)",
                        object.name,
                        mesh.triangle_count()
                    );
                    object.source = MeshSource::Ready(mesh);
                    resolved += 1;
                }
                AssetPoll::Failed(reason) => {
                    log::warn!("Mesh for '{}' failed to load: {reason}", object.name);
                    object.source = MeshSource::Failed(reason);
                }
            }
        }
        resolved
    }
}
