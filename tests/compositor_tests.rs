//! Compositor Pipeline Tests
//!
//! Tests for:
//! - Stage order per pipeline variant
//! - Mask, additive and blur-only composites
//! - Blur toggle and intensity controls
//! - Deferred and failing resizes
//! - Fallback when depth sharing is unavailable
//! - Rendering partially loaded scenes and meshes without triangles
//! - Texture-mapped materials
//! - PNG export of the screen

mod common;

use std::sync::Arc;

use glam::{Mat4, Vec3, Vec4};
use myth_postfx::assets::AssetHandle;
use myth_postfx::renderer::{Compositor, Extent, FrameStage, SoftwareBackend, TargetSlot};
use myth_postfx::scene::{Camera, Material, Mesh, Scene, SceneObject, TextureMap};
use myth_postfx::settings::{CompositorSettings, PipelineVariant};
use myth_postfx::PixelBuffer;

const SIZE: u32 = 32;
const RED: Vec4 = Vec4::new(1.0, 0.0, 0.0, 1.0);
const GREEN: Vec4 = Vec4::new(0.0, 1.0, 0.0, 1.0);

fn camera() -> Camera {
    Camera::new_perspective(60.0, 1.0, 0.1, 100.0)
}

fn settings(variant: PipelineVariant, intensity: f32) -> CompositorSettings {
    CompositorSettings::default()
        .with_variant(variant)
        .with_blur_intensity(intensity)
}

fn compositor(settings: CompositorSettings) -> Compositor<SoftwareBackend> {
    common::init_logging();
    Compositor::new(SoftwareBackend::new(SIZE, SIZE), settings, SIZE, SIZE).unwrap()
}

fn wall(color: Vec4) -> SceneObject {
    SceneObject::new("wall", Arc::new(Mesh::plane(10.0, 10.0))).with_material(Material::unlit(color))
}

fn green_box() -> SceneObject {
    SceneObject::new("box", Arc::new(Mesh::cuboid(Vec3::ONE)))
        .with_material(Material::unlit(GREEN))
        .with_transform(Mat4::from_translation(Vec3::new(0.0, 0.0, 1.0)))
}

/// Red wall with a green box in front; `focus` selects which is the subject.
fn wall_and_box(wall_focus: bool, box_focus: bool) -> Scene {
    let mut scene = Scene::new();
    scene.add(wall(RED).with_focus_subject(wall_focus));
    scene.add(green_box().with_focus_subject(box_focus));
    scene
}

fn target_color(c: &Compositor<SoftwareBackend>, slot: TargetSlot) -> &PixelBuffer {
    c.targets().get(slot).unwrap().color()
}

fn screen(c: &Compositor<SoftwareBackend>) -> &PixelBuffer {
    c.backend().screen()
}

// ============================================================================
// Stages
// ============================================================================

#[test]
fn masked_focus_stage_order() {
    let mut c = compositor(settings(PipelineVariant::MaskedFocus, 0.5));
    let report = c.render_frame(&Scene::new(), &camera()).unwrap();

    assert_eq!(
        report.stages.as_slice(),
        [
            FrameStage::Clear,
            FrameStage::MainPass,
            FrameStage::MaskPass,
            FrameStage::BlurPass,
            FrameStage::CompositePass,
            FrameStage::Present,
        ]
    );
    assert_eq!(report.variant, PipelineVariant::MaskedFocus);
    assert!(!report.degraded);
}

#[test]
fn additive_focus_stage_order() {
    let mut c = compositor(settings(PipelineVariant::AdditiveFocus, 0.5));
    let report = c.render_frame(&Scene::new(), &camera()).unwrap();
    assert!(report.stages.contains(&FrameStage::FocusPass));
    assert!(!report.stages.contains(&FrameStage::MaskPass));
}

#[test]
fn blur_only_stage_order() {
    let mut c = compositor(settings(PipelineVariant::BlurOnly, 0.5));
    let report = c.render_frame(&Scene::new(), &camera()).unwrap();
    assert_eq!(
        report.stages.as_slice(),
        [
            FrameStage::Clear,
            FrameStage::MainPass,
            FrameStage::BlurPass,
            FrameStage::CompositePass,
            FrameStage::Present,
        ]
    );
}

#[test]
fn frames_are_counted_and_presented() {
    let mut c = compositor(CompositorSettings::default());
    let scene = Scene::new();
    for i in 0..3 {
        assert_eq!(c.render_frame(&scene, &camera()).unwrap().frame_index, i);
    }
    assert_eq!(c.frame_index(), 3);
    assert_eq!(c.backend().presented_frames(), 3);
}

// ============================================================================
// Masked focus
// ============================================================================

#[test]
fn subject_filling_view_stays_sharp() {
    let mut scene = Scene::new();
    scene.add(wall(RED).with_focus_subject(true));
    let mut c = compositor(settings(PipelineVariant::MaskedFocus, 0.0));

    c.render_frame(&scene, &camera()).unwrap();
    assert!(screen(&c).pixels().iter().all(|&p| p == RED));
}

#[test]
fn full_mask_shows_main() {
    let mut c = compositor(settings(PipelineVariant::MaskedFocus, 1.0));
    c.render_frame(&wall_and_box(true, true), &camera()).unwrap();

    assert!(target_color(&c, TargetSlot::Mask).pixels().iter().all(|p| p.x > 0.0));
    assert_eq!(screen(&c), target_color(&c, TargetSlot::Main));
    // The blur really differs from the main image.
    assert_ne!(target_color(&c, TargetSlot::Blur), target_color(&c, TargetSlot::Main));
}

#[test]
fn empty_mask_shows_blur() {
    let mut c = compositor(settings(PipelineVariant::MaskedFocus, 1.0));
    c.render_frame(&wall_and_box(false, false), &camera()).unwrap();

    assert!(target_color(&c, TargetSlot::Mask).pixels().iter().all(|&p| p == Vec4::ZERO));
    assert_eq!(screen(&c), target_color(&c, TargetSlot::Blur));
}

#[test]
fn occluded_subject_is_blurred_behind_occluder() {
    let mut c = compositor(settings(PipelineVariant::MaskedFocus, 1.0));
    c.render_frame(&wall_and_box(true, false), &camera()).unwrap();

    let (center, corner) = ((SIZE / 2, SIZE / 2), (1, 1));
    let mask = target_color(&c, TargetSlot::Mask);
    assert_eq!(mask.get(center.0, center.1), Vec4::ZERO);
    assert_eq!(mask.get(corner.0, corner.1), Vec4::ONE);

    let blur = target_color(&c, TargetSlot::Blur);
    let main = target_color(&c, TargetSlot::Main);
    assert_eq!(screen(&c).get(center.0, center.1), blur.get(center.0, center.1));
    assert_eq!(screen(&c).get(corner.0, corner.1), main.get(corner.0, corner.1));
}

#[test]
fn mask_shares_depth_again_after_resize() {
    let mut c = compositor(settings(PipelineVariant::MaskedFocus, 0.5));
    let scene = wall_and_box(true, false);
    c.render_frame(&scene, &camera()).unwrap();

    c.request_resize(24, 24);
    let report = c.render_frame(&scene, &camera()).unwrap();
    assert_eq!(report.variant, PipelineVariant::MaskedFocus);

    let main = c.targets().get(TargetSlot::Main).unwrap();
    assert!(c.targets().get(TargetSlot::Mask).unwrap().shares_depth_with(main));
    assert_eq!(target_color(&c, TargetSlot::Mask).get(12, 12), Vec4::ZERO);
}

// ============================================================================
// Additive focus & blur only
// ============================================================================

#[test]
fn additive_focus_adds_subject_over_blur() {
    let mut c = compositor(settings(PipelineVariant::AdditiveFocus, 1.0));
    c.render_frame(&wall_and_box(false, true), &camera()).unwrap();

    let blur = target_color(&c, TargetSlot::Blur);
    let focus = target_color(&c, TargetSlot::Focus);
    let out = screen(&c);
    for y in 0..SIZE {
        for x in 0..SIZE {
            let expected = (blur.get(x, y) + focus.get(x, y)).clamp(Vec4::ZERO, Vec4::ONE);
            assert_eq!(out.get(x, y), expected, "pixel ({x}, {y})");
        }
    }
    // Focus holds only the subject, drawn with its own material.
    assert_eq!(focus.get(SIZE / 2, SIZE / 2), GREEN);
    assert_eq!(focus.get(1, 1), Vec4::ZERO);
}

#[test]
fn focus_pass_uses_its_own_depth() {
    // Subject behind a non-subject occluder is still fully drawn.
    let mut c = compositor(settings(PipelineVariant::AdditiveFocus, 0.5));
    c.render_frame(&wall_and_box(true, false), &camera()).unwrap();
    assert_eq!(target_color(&c, TargetSlot::Focus).get(SIZE / 2, SIZE / 2), RED);
}

#[test]
fn blur_only_presents_blur() {
    let mut c = compositor(settings(PipelineVariant::BlurOnly, 1.0));
    c.render_frame(&wall_and_box(true, true), &camera()).unwrap();
    assert_eq!(screen(&c), target_color(&c, TargetSlot::Blur));
}

// ============================================================================
// Blur controls
// ============================================================================

#[test]
fn zero_intensity_blur_is_identity() {
    let mut c = compositor(settings(PipelineVariant::BlurOnly, 0.0));
    c.render_frame(&wall_and_box(false, false), &camera()).unwrap();
    assert_eq!(target_color(&c, TargetSlot::Blur), target_color(&c, TargetSlot::Main));
}

#[test]
fn disabled_blur_still_runs_as_identity() {
    let mut c = compositor(settings(PipelineVariant::BlurOnly, 1.0));
    assert!(!c.toggle_blur());
    assert_eq!(c.settings().blur.effective_intensity(), 0.0);

    let report = c.render_frame(&wall_and_box(false, false), &camera()).unwrap();
    assert!(report.stages.contains(&FrameStage::BlurPass));
    assert_eq!(target_color(&c, TargetSlot::Blur), target_color(&c, TargetSlot::Main));

    assert!(c.toggle_blur());
    c.render_frame(&wall_and_box(false, false), &camera()).unwrap();
    assert_ne!(target_color(&c, TargetSlot::Blur), target_color(&c, TargetSlot::Main));
}

#[test]
fn intensity_is_clamped() {
    let mut c = compositor(CompositorSettings::default());
    c.set_blur_intensity(3.0);
    assert_eq!(c.settings().blur.intensity, 1.0);
    c.set_blur_intensity(-1.0);
    assert_eq!(c.settings().blur.intensity, 0.0);
    c.set_blur_intensity(f32::NAN);
    assert_eq!(c.settings().blur.intensity, 0.0);
}

#[test]
fn variant_switch_applies_next_frame() {
    let mut c = compositor(settings(PipelineVariant::MaskedFocus, 0.5));
    let scene = Scene::new();
    c.render_frame(&scene, &camera()).unwrap();

    c.set_variant(PipelineVariant::AdditiveFocus);
    let report = c.render_frame(&scene, &camera()).unwrap();
    assert_eq!(report.variant, PipelineVariant::AdditiveFocus);
    assert_eq!(c.active_variant(), PipelineVariant::AdditiveFocus);
}

// ============================================================================
// Resize
// ============================================================================

#[test]
fn resize_is_deferred_to_next_frame() {
    let mut c = compositor(CompositorSettings::default());
    c.request_resize(48, 20);

    assert_eq!(c.pending_resize(), Some(Extent::new(48, 20)));
    assert_eq!(c.targets().extent(), Some(Extent::new(SIZE, SIZE)));

    let report = c.render_frame(&Scene::new(), &camera()).unwrap();
    assert_eq!(report.extent, Extent::new(48, 20));
    assert!(!report.resize_failed);
    assert_eq!(c.pending_resize(), None);
    assert_eq!(screen(&c).width(), 48);
    assert_eq!(target_color(&c, TargetSlot::Blur).height(), 20);
}

#[test]
fn latest_resize_request_wins() {
    let mut c = compositor(CompositorSettings::default());
    c.request_resize(48, 20);
    c.request_resize(0, 10);
    c.request_resize(40, 40);

    let report = c.render_frame(&Scene::new(), &camera()).unwrap();
    assert_eq!(report.extent, Extent::new(40, 40));
}

fn screen_extent(c: &Compositor<SoftwareBackend>) -> Extent {
    Extent::new(screen(c).width(), screen(c).height())
}

#[test]
fn failed_resize_keeps_rendering_at_old_size() {
    let backend = SoftwareBackend::new(SIZE, SIZE).with_max_dimension(64);
    let mut c = Compositor::new(backend, CompositorSettings::default(), SIZE, SIZE).unwrap();
    let generation = c.targets().generation();

    c.request_resize(128, 32);
    let report = c.render_frame(&wall_and_box(true, false), &camera()).unwrap();

    assert!(report.resize_failed);
    assert_eq!(report.extent, Extent::new(SIZE, SIZE));
    assert_eq!(c.targets().generation(), generation);
    assert_eq!(report.stages.last(), Some(&FrameStage::Present));
    assert_eq!(c.backend().presented_frames(), 1);
    // The screen keeps the size of the retained targets.
    assert_eq!(screen_extent(&c), Extent::new(SIZE, SIZE));
}

#[test]
fn failed_resize_is_retried_until_replaced() {
    let backend = SoftwareBackend::new(SIZE, SIZE).with_max_dimension(64);
    let mut c = Compositor::new(backend, CompositorSettings::default(), SIZE, SIZE).unwrap();

    c.request_resize(128, 32);
    assert!(c.render_frame(&Scene::new(), &camera()).unwrap().resize_failed);
    assert_eq!(c.pending_resize(), Some(Extent::new(128, 32)));

    let report = c.render_frame(&Scene::new(), &camera()).unwrap();
    assert!(report.resize_failed);
    assert_eq!(report.extent, screen_extent(&c));

    c.request_resize(64, 16);
    let report = c.render_frame(&Scene::new(), &camera()).unwrap();
    assert!(!report.resize_failed);
    assert_eq!(report.extent, Extent::new(64, 16));
    assert_eq!(screen_extent(&c), Extent::new(64, 16));
    assert_eq!(c.pending_resize(), None);
}

#[test]
fn resize_failing_on_memory_budget_is_reported() {
    let budget = 28 * u64::from(SIZE * SIZE) + 1024;
    let backend = SoftwareBackend::new(SIZE, SIZE).with_memory_budget(budget);
    let mut c = Compositor::new(backend, CompositorSettings::default(), SIZE, SIZE).unwrap();

    // The first masked frame links the mask depth to main and frees the
    // mask's own plane.
    c.render_frame(&Scene::new(), &camera()).unwrap();
    let live = c.backend().live_bytes();
    let generation = c.targets().generation();

    c.request_resize(SIZE * 2, SIZE * 2);
    let report = c.render_frame(&Scene::new(), &camera()).unwrap();
    assert!(report.resize_failed);
    assert_eq!(report.extent, Extent::new(SIZE, SIZE));
    assert_eq!(c.targets().generation(), generation);
    assert_eq!(c.backend().live_bytes(), live);
    assert_eq!(screen_extent(&c), Extent::new(SIZE, SIZE));
}

#[test]
fn resize_succeeds_once_memory_frees_up() {
    let budget = 28 * u64::from(SIZE * SIZE) + 1024;
    let backend = SoftwareBackend::new(SIZE, SIZE).with_memory_budget(budget);
    let mut c = Compositor::new(backend, CompositorSettings::default(), SIZE, SIZE).unwrap();

    c.request_resize(SIZE * 2, SIZE * 2);
    assert!(c.render_frame(&Scene::new(), &camera()).unwrap().resize_failed);

    c.backend_mut().set_memory_budget(None);
    let report = c.render_frame(&wall_and_box(true, false), &camera()).unwrap();
    assert!(!report.resize_failed);
    assert_eq!(report.extent, Extent::new(SIZE * 2, SIZE * 2));
    assert_eq!(screen_extent(&c), report.extent);
    assert_eq!(report.variant, PipelineVariant::MaskedFocus);
}

#[test]
fn construction_fails_when_targets_cannot_be_allocated() {
    let backend = SoftwareBackend::new(SIZE, SIZE).with_max_dimension(16);
    assert!(Compositor::new(backend, CompositorSettings::default(), SIZE, SIZE).is_err());
}

// ============================================================================
// Capability fallback
// ============================================================================

#[test]
fn missing_depth_sharing_degrades_to_blur_only() {
    let backend = SoftwareBackend::new(SIZE, SIZE).with_depth_sharing(false);
    let mut c = Compositor::new(
        backend,
        settings(PipelineVariant::MaskedFocus, 1.0),
        SIZE,
        SIZE,
    )
    .unwrap();

    let report = c.render_frame(&wall_and_box(true, false), &camera()).unwrap();
    assert_eq!(report.variant, PipelineVariant::BlurOnly);
    assert!(report.degraded);
    assert!(!report.stages.contains(&FrameStage::MaskPass));
    assert_eq!(screen(&c), target_color(&c, TargetSlot::Blur));

    // The request is kept; only the active variant is degraded.
    assert_eq!(c.settings().variant, PipelineVariant::MaskedFocus);
    assert_eq!(c.active_variant(), PipelineVariant::BlurOnly);
    let report = c.render_frame(&Scene::new(), &camera()).unwrap();
    assert!(report.degraded);
}

#[test]
fn additive_focus_needs_no_depth_sharing() {
    let backend = SoftwareBackend::new(SIZE, SIZE).with_depth_sharing(false);
    let mut c = Compositor::new(
        backend,
        settings(PipelineVariant::AdditiveFocus, 0.5),
        SIZE,
        SIZE,
    )
    .unwrap();
    let report = c.render_frame(&Scene::new(), &camera()).unwrap();
    assert_eq!(report.variant, PipelineVariant::AdditiveFocus);
    assert!(!report.degraded);
}

// ============================================================================
// Scene contents
// ============================================================================

#[test]
fn loading_objects_are_skipped_until_ready() {
    let mut scene = Scene::new();
    scene.add(wall(RED));
    let (sender, handle) = AssetHandle::channel("box");
    let key = scene.add(
        SceneObject::loading("box", handle)
            .with_material(Material::unlit(GREEN))
            .with_transform(Mat4::from_translation(Vec3::new(0.0, 0.0, 1.0))),
    );

    let mut c = compositor(settings(PipelineVariant::BlurOnly, 0.0));
    let report = c.render_frame(&scene, &camera()).unwrap();
    assert_eq!(report.main_draws, 1);
    assert_eq!(screen(&c).get(SIZE / 2, SIZE / 2), RED);

    sender.resolve(Arc::new(Mesh::cuboid(Vec3::ONE)));
    assert_eq!(scene.poll_assets(), 1);
    assert!(!scene.get(key).unwrap().is_loading());

    let report = c.render_frame(&scene, &camera()).unwrap();
    assert_eq!(report.main_draws, 2);
    assert_eq!(screen(&c).get(SIZE / 2, SIZE / 2), GREEN);
}

#[test]
fn hidden_objects_are_not_drawn() {
    let mut scene = Scene::new();
    scene.add(wall(RED));
    scene.add(green_box().with_visible(false));

    let mut c = compositor(settings(PipelineVariant::BlurOnly, 0.0));
    let report = c.render_frame(&scene, &camera()).unwrap();
    assert_eq!(report.main_draws, 1);
    assert_eq!(screen(&c).get(SIZE / 2, SIZE / 2), RED);
}

#[test]
fn clear_color_fills_empty_main() {
    let blue = [0.0, 0.0, 1.0, 1.0];
    let mut c = compositor(
        settings(PipelineVariant::BlurOnly, 0.0).with_clear_color(blue),
    );
    c.render_frame(&Scene::new(), &camera()).unwrap();
    assert!(screen(&c).pixels().iter().all(|&p| p == Vec4::from_array(blue)));
}

#[test]
fn mesh_without_triangles_is_skipped() {
    let mut scene = Scene::new();
    scene.add(wall(RED));
    scene.add(SceneObject::new("empty", Arc::new(Mesh::new(vec![], vec![]))).with_focus_subject(true));
    let mut c = compositor(settings(PipelineVariant::MaskedFocus, 1.0));

    let report = c.render_frame(&scene, &camera()).unwrap();
    assert_eq!(report.main_draws, 1);
    assert!(target_color(&c, TargetSlot::Mask).pixels().iter().all(|&p| p == Vec4::ZERO));
}

#[test]
fn screen_exports_as_png() {
    let mut scene = Scene::new();
    scene.add(wall(RED));
    let mut c = compositor(settings(PipelineVariant::BlurOnly, 0.0));
    c.render_frame(&scene, &camera()).unwrap();

    let path = std::env::temp_dir().join(format!("myth_postfx_{}_screen.png", std::process::id()));
    screen(&c).save_png(&path).unwrap();

    let image = image::open(&path).unwrap().to_rgba8();
    assert_eq!(image.dimensions(), (SIZE, SIZE));
    assert_eq!(image.get_pixel(SIZE / 2, SIZE / 2).0, [255, 0, 0, 255]);
    std::fs::remove_file(path).ok();
}

// ============================================================================
// Textures
// ============================================================================

/// Unlit wall whose left half samples red and right half green.
fn split_wall() -> SceneObject {
    let texture = PixelBuffer::from_fn(2, 1, |x, _| if x == 0 { RED } else { GREEN });
    SceneObject::new("wall", Arc::new(Mesh::plane(10.0, 10.0)))
        .with_material(Material::unlit(Vec4::ONE).with_map(TextureMap::new(Arc::new(texture))))
}

#[test]
fn texture_map_is_sampled_across_the_surface() {
    let mut scene = Scene::new();
    scene.add(split_wall());
    let mut c = compositor(settings(PipelineVariant::BlurOnly, 0.0));
    c.render_frame(&scene, &camera()).unwrap();

    let row = SIZE / 2;
    assert_eq!(screen(&c).get(1, row), RED);
    assert_eq!(screen(&c).get(SIZE - 2, row), GREEN);
}

#[test]
fn texture_map_tints_material_color() {
    let mut scene = Scene::new();
    let half = Vec4::new(0.5, 0.5, 0.5, 1.0);
    let texture = Arc::new(PixelBuffer::new(1, 1, Vec4::new(1.0, 0.5, 0.0, 1.0)));
    scene.add(
        SceneObject::new("wall", Arc::new(Mesh::plane(10.0, 10.0)))
            .with_material(Material::unlit(half).with_map(TextureMap::new(texture).with_repeat(3.0, 3.0))),
    );
    let mut c = compositor(settings(PipelineVariant::BlurOnly, 0.0));
    c.render_frame(&scene, &camera()).unwrap();

    assert_eq!(screen(&c).get(SIZE / 2, SIZE / 2), Vec4::new(0.5, 0.25, 0.0, 1.0));
}

#[test]
fn textured_subject_masks_flat_white() {
    let mut scene = Scene::new();
    scene.add(split_wall().with_focus_subject(true));
    let mut c = compositor(settings(PipelineVariant::MaskedFocus, 1.0));
    c.render_frame(&scene, &camera()).unwrap();

    assert!(target_color(&c, TargetSlot::Mask).pixels().iter().all(|&p| p == Vec4::ONE));
    assert_eq!(screen(&c), target_color(&c, TargetSlot::Main));
}
