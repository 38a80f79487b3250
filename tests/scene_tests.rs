//! Scene & Render Request Tests
//!
//! Tests for:
//! - Scene object storage
//! - RenderRequest filtering per pass kind
//! - Material overrides of the mask pass, texture maps
//! - Meshes without triangles
//! - Draw ordering
//! - Camera matrices

use std::sync::Arc;

use glam::{Mat4, Vec2, Vec3, Vec4};
use myth_postfx::assets::AssetHandle;
use myth_postfx::scene::{
    Camera, Material, MaterialOverride, Mesh, RenderRequest, RequestKind, Scene, SceneObject,
    Shading, TextureMap, VisibilityFilter,
};
use myth_postfx::PixelBuffer;

fn unit_box() -> Arc<Mesh> {
    Arc::new(Mesh::cuboid(Vec3::ONE))
}

fn camera() -> Camera {
    Camera::new_perspective(60.0, 1.0, 0.1, 100.0)
}

/// Room with one focus subject and a hidden object.
fn room() -> Scene {
    let mut scene = Scene::new();
    scene.add(
        SceneObject::new("floor", Arc::new(Mesh::plane(5.0, 5.0)))
            .with_material(Material::lambert(Vec4::new(0.5, 0.5, 0.5, 1.0))),
    );
    scene.add(
        SceneObject::new("bed", unit_box())
            .with_material(Material::lambert(Vec4::new(0.8, 0.2, 0.2, 1.0)))
            .with_focus_subject(true)
            .with_render_order(10),
    );
    scene.add(SceneObject::new("ghost", unit_box()).with_visible(false));
    scene
}

fn names(scene: &Scene, request: &RenderRequest) -> Vec<String> {
    // Items carry no names; match them back by mesh pointer and transform.
    request
        .items
        .iter()
        .map(|item| {
            scene
                .iter()
                .find(|(_, o)| {
                    o.mesh().is_some_and(|m| Arc::ptr_eq(m, &item.mesh))
                        && o.transform == item.transform
                })
                .map(|(_, o)| o.name.clone())
                .unwrap()
        })
        .collect()
}

// ============================================================================
// Scene
// ============================================================================

#[test]
fn scene_add_get_remove() {
    let mut scene = Scene::new();
    assert!(scene.is_empty());

    let key = scene.add(SceneObject::new("box", unit_box()));
    assert_eq!(scene.len(), 1);
    assert_eq!(scene.get(key).unwrap().name, "box");

    scene.get_mut(key).unwrap().visible = false;
    assert!(!scene.get(key).unwrap().visible);

    let removed = scene.remove(key).unwrap();
    assert_eq!(removed.name, "box");
    assert!(scene.get(key).is_none());
}

#[test]
fn default_material_is_lambert() {
    let object = SceneObject::new("box", unit_box());
    assert_eq!(object.material.shading, Shading::Lambert);
    assert!(object.visible);
    assert!(!object.focus_subject);
    assert_eq!(object.render_order, 0);
}

// ============================================================================
// Requests
// ============================================================================

#[test]
fn main_request_draws_all_visible_objects() {
    let scene = room();
    let request = RenderRequest::build(&scene, &camera(), RequestKind::Main);

    assert_eq!(request.visibility, VisibilityFilter::All);
    assert_eq!(request.material_override, None);
    assert_eq!(names(&scene, &request), ["floor", "bed"]);
}

#[test]
fn mask_request_draws_subject_flat_white() {
    let scene = room();
    let request = RenderRequest::build(&scene, &camera(), RequestKind::Mask);

    assert_eq!(request.visibility, VisibilityFilter::FocusSubjectOnly);
    assert_eq!(request.material_override, Some(MaterialOverride::Flat(Vec4::ONE)));
    assert_eq!(request.items.len(), 1);
    assert_eq!(request.items[0].color, Vec4::ONE);
    assert_eq!(request.items[0].shading, Shading::Unlit);
}

#[test]
fn focus_request_keeps_subject_material() {
    let scene = room();
    let request = RenderRequest::build(&scene, &camera(), RequestKind::Focus);

    assert_eq!(request.items.len(), 1);
    assert_eq!(request.items[0].color, Vec4::new(0.8, 0.2, 0.2, 1.0));
    assert_eq!(request.items[0].shading, Shading::Lambert);
}

#[test]
fn hidden_subject_is_not_masked() {
    let mut scene = Scene::new();
    scene.add(
        SceneObject::new("bed", unit_box())
            .with_focus_subject(true)
            .with_visible(false),
    );
    assert!(RenderRequest::build(&scene, &camera(), RequestKind::Mask).is_empty());
}

#[test]
fn requests_skip_loading_objects() {
    let mut scene = room();
    let (_sender, handle) = AssetHandle::channel("table");
    scene.add(SceneObject::loading("table", handle));

    let request = RenderRequest::build(&scene, &camera(), RequestKind::Main);
    assert_eq!(request.items.len(), 2);
    assert_eq!(scene.pending_count(), 1);
}

#[test]
fn render_order_sorts_stably() {
    let mut scene = Scene::new();
    let at = |x: f32| Mat4::from_translation(Vec3::new(x, 0.0, 0.0));
    let mesh = unit_box();
    scene.add(SceneObject::new("late", mesh.clone()).with_transform(at(0.0)).with_render_order(5));
    scene.add(SceneObject::new("first", mesh.clone()).with_transform(at(1.0)).with_render_order(-1));
    scene.add(SceneObject::new("tie_a", mesh.clone()).with_transform(at(2.0)));
    scene.add(SceneObject::new("tie_b", mesh).with_transform(at(3.0)));

    let request = RenderRequest::build(&scene, &camera(), RequestKind::Main);
    assert_eq!(names(&scene, &request), ["first", "tie_a", "tie_b", "late"]);
}

#[test]
fn request_snapshots_camera_and_lighting() {
    let mut scene = room();
    scene.lighting.ambient = Vec3::splat(0.1);
    let camera = camera().with_position(Vec3::new(1.0, 2.0, 3.0));

    let request = RenderRequest::build(&scene, &camera, RequestKind::Main);
    assert_eq!(request.camera.position, Vec3::new(1.0, 2.0, 3.0));
    assert_eq!(request.camera.view_projection, camera.view_projection());
    assert_eq!(request.lighting.ambient, Vec3::splat(0.1));
}

#[test]
fn textured_subject_keeps_map_except_in_mask() {
    let map = TextureMap::new(Arc::new(PixelBuffer::new(2, 2, Vec4::new(0.5, 0.5, 0.5, 1.0))))
        .with_repeat(4.0, 4.0);
    let mut scene = Scene::new();
    scene.add(
        SceneObject::new("rug", Arc::new(Mesh::plane(1.0, 1.0)))
            .with_material(Material::lambert(Vec4::ONE).with_map(map.clone()))
            .with_focus_subject(true),
    );

    for kind in [RequestKind::Main, RequestKind::Focus] {
        let request = RenderRequest::build(&scene, &camera(), kind);
        assert_eq!(request.items[0].map.as_ref(), Some(&map), "{kind:?}");
    }
    let mask = RenderRequest::build(&scene, &camera(), RequestKind::Mask);
    assert_eq!(mask.items[0].map, None);
}

#[test]
fn meshes_without_triangles_are_not_drawn() {
    let mut scene = room();
    scene.add(SceneObject::new("empty", Arc::new(Mesh::new(vec![], vec![]))).with_focus_subject(true));

    for kind in [RequestKind::Main, RequestKind::Mask, RequestKind::Focus] {
        let request = RenderRequest::build(&scene, &camera(), kind);
        assert!(request.items.iter().all(|item| item.mesh.triangle_count() > 0), "{kind:?}");
    }
    assert_eq!(RenderRequest::build(&scene, &camera(), RequestKind::Main).items.len(), 2);
}

#[test]
fn plane_texture_covers_quad_once() {
    let plane = Mesh::plane(2.0, 1.0);
    let uv_at = |corner: Vec3| {
        let i = plane.positions().iter().position(|&p| p == corner).unwrap();
        plane.uvs()[i]
    };
    assert_eq!(uv_at(Vec3::new(-1.0, 0.5, 0.0)), Vec2::ZERO);
    assert_eq!(uv_at(Vec3::new(1.0, -0.5, 0.0)), Vec2::ONE);
}

#[test]
fn empty_request_draws_nothing() {
    assert!(RenderRequest::empty().is_empty());
}

// ============================================================================
// Camera
// ============================================================================

#[test]
fn camera_projects_target_to_center() {
    let camera = camera();
    let clip = camera.view_projection() * Vec3::ZERO.extend(1.0);
    let ndc = clip.truncate() / clip.w;
    assert!(ndc.x.abs() < 1e-6 && ndc.y.abs() < 1e-6);
    assert!((0.0..=1.0).contains(&ndc.z));
}

#[test]
fn camera_viewport_updates_aspect() {
    let mut camera = camera();
    camera.set_viewport(1920, 1080);
    assert!((camera.aspect - 16.0 / 9.0).abs() < 1e-6);
    camera.set_viewport(0, 1080);
    assert!((camera.aspect - 16.0 / 9.0).abs() < 1e-6);
}
