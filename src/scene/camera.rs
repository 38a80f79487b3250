use glam::{Mat4, Vec3};

/// Perspective camera looking at a fixed target.
#[derive(Debug, Clone, PartialEq)]
pub struct Camera {
    pub position: Vec3,
    pub target: Vec3,
    pub up: Vec3,
    /// Vertical field of view in radians.
    pub fov_y: f32,
    pub aspect: f32,
    pub near: f32,
    pub far: f32,
}

/// Camera data captured into a render request.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraState {
    pub view_projection: Mat4,
    pub position: Vec3,
}

impl CameraState {
    pub const IDENTITY: Self = Self {
        view_projection: Mat4::IDENTITY,
        position: Vec3::ZERO,
    };
}

impl Camera {
    /// `fov_degrees` is the vertical field of view.
    #[must_use]
    pub fn new_perspective(fov_degrees: f32, aspect: f32, near: f32, far: f32) -> Self {
        Self {
            position: Vec3::new(0.0, 0.0, 5.0),
            target: Vec3::ZERO,
            up: Vec3::Y,
            fov_y: fov_degrees.to_radians(),
            aspect,
            near,
            far,
        }
    }

    #[must_use]
    pub fn with_position(mut self, position: Vec3) -> Self {
        self.position = position;
        self
    }

    #[must_use]
    pub fn looking_at(mut self, target: Vec3) -> Self {
        self.target = target;
        self
    }

    /// Updates the aspect ratio after a viewport resize. Zero heights are ignored.
    pub fn set_viewport(&mut self, width: u32, height: u32) {
        if width > 0 && height > 0 {
            self.aspect = width as f32 / height as f32;
        }
    }

    #[must_use]
    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.position, self.target, self.up)
    }

    /// Right-handed projection with a `[0, 1]` depth range.
    #[must_use]
    pub fn projection_matrix(&self) -> Mat4 {
        Mat4::perspective_rh(self.fov_y, self.aspect, self.near, self.far)
    }

    #[must_use]
    pub fn view_projection(&self) -> Mat4 {
        self.projection_matrix() * self.view_matrix()
    }

    #[must_use]
    pub fn state(&self) -> CameraState {
        CameraState {
            view_projection: self.view_projection(),
            position: self.position,
        }
    }
}
