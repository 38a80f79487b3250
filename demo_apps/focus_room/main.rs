//! Focus Room
//!
//! A small room whose bed stays sharp while everything else is blurred.
//! The wooden floor appears once its texture has loaded.
//!
//! ```text
//! cargo run -p focus_room [-- settings.json]
//! ```
//!
//! `B` toggles the blur, `Up`/`Down` change its intensity and `1`/`2`/`3`
//! switch between blur-only, masked focus and additive focus.

use std::f32::consts::FRAC_PI_2;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use glam::{Mat4, Vec3, Vec4};
use myth_postfx::app::winit::{App, AppHandler, AppState, FrameState, Window};
use myth_postfx::prelude::*;

const ROOM_SIZE: f32 = 5.0;
const WALL_HEIGHT: f32 = 2.5;
const FLOOR_REPEAT: f32 = 4.0;

fn asset_path(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("assets").join(name)
}

fn plane(name: &str, width: f32, height: f32, transform: Mat4, color: Vec4) -> SceneObject {
    SceneObject::new(name, Arc::new(Mesh::plane(width, height)))
        .with_transform(transform)
        .with_material(Material::lambert(color))
}

fn build_room(scene: &mut Scene) {
    let half = ROOM_SIZE * 0.5;
    let wall_color = Vec4::new(0.85, 0.82, 0.75, 1.0);

    scene.add(plane(
        "back_wall",
        ROOM_SIZE,
        WALL_HEIGHT,
        Mat4::from_translation(Vec3::new(0.0, WALL_HEIGHT * 0.5, -half)),
        wall_color,
    ));
    scene.add(plane(
        "left_wall",
        ROOM_SIZE,
        WALL_HEIGHT,
        Mat4::from_translation(Vec3::new(-half, WALL_HEIGHT * 0.5, 0.0))
            * Mat4::from_rotation_y(FRAC_PI_2),
        wall_color,
    ));
    scene.add(plane(
        "right_wall",
        ROOM_SIZE,
        WALL_HEIGHT,
        Mat4::from_translation(Vec3::new(half, WALL_HEIGHT * 0.5, 0.0))
            * Mat4::from_rotation_y(-FRAC_PI_2),
        wall_color,
    ));
}

fn floor(texture: Arc<PixelBuffer>) -> SceneObject {
    let map = TextureMap::new(texture).with_repeat(FLOOR_REPEAT, FLOOR_REPEAT);
    SceneObject::new("floor", Arc::new(Mesh::plane(ROOM_SIZE, ROOM_SIZE)))
        .with_transform(Mat4::from_rotation_x(-FRAC_PI_2))
        .with_material(Material::lambert(Vec4::ONE).with_map(map))
}

struct FocusRoom {
    floor_texture: Option<AssetHandle<Arc<PixelBuffer>>>,
    reported_loaded: bool,
}

impl FocusRoom {
    fn poll_floor(&mut self, scene: &mut Scene) {
        let Some(handle) = &self.floor_texture else {
            return;
        };
        match handle.poll() {
            AssetPoll::Pending => return,
            AssetPoll::Ready(texture) => {
                scene.add(floor(texture));
            }
            AssetPoll::Failed(reason) => {
                log::warn!("Floor texture unavailable, room has no floor: {reason}");
            }
        }
        self.floor_texture = None;
    }
}

impl AppHandler for FocusRoom {
    fn init(state: &mut AppState, _window: &Arc<Window>) -> Self {
        build_room(&mut state.scene);

        let bed: AssetHandle<Arc<Mesh>> = load_mesh_async(asset_path("bed.json"));
        state.scene.add(
            SceneObject::loading("bed", bed)
                .with_material(Material::lambert(Vec4::new(0.8, 0.25, 0.2, 1.0)))
                .with_transform(Mat4::from_translation(Vec3::new(-0.6, 0.0, -1.2)))
                .with_focus_subject(true)
                .with_render_order(10),
        );

        let table = load_mesh_async(asset_path("table.json"));
        state.scene.add(
            SceneObject::loading("table", table)
                .with_material(Material::lambert(Vec4::new(0.35, 0.3, 0.25, 1.0)))
                .with_transform(
                    Mat4::from_translation(Vec3::new(1.2, 0.0, -0.8)) * Mat4::from_scale(Vec3::splat(0.25)),
                ),
        );

        state.camera = state
            .camera
            .clone()
            .with_position(Vec3::new(0.0, 1.6, 2.4))
            .looking_at(Vec3::new(0.0, 0.6, -1.0));

        FocusRoom {
            floor_texture: Some(load_texture_async(asset_path("floor.png"))),
            reported_loaded: false,
        }
    }

    fn update(&mut self, state: &mut AppState, _window: &Arc<Window>, _frame: &FrameState) {
        self.poll_floor(&mut state.scene);
        if !self.reported_loaded
            && self.floor_texture.is_none()
            && state.scene.pending_count() == 0
        {
            log::info!("All {} objects loaded", state.scene.len());
            self.reported_loaded = true;
        }
    }
}

fn main() -> Result<()> {
    env_logger::init();

    let settings = match std::env::args().nth(1) {
        Some(path) => CompositorSettings::load(path)?,
        None => CompositorSettings::default(),
    };

    App::new()
        .with_title("Myth PostFX - Focus Room")
        .with_settings(settings)
        .run::<FocusRoom>()
}
