// SPDX-License-Identifier: CEPL-1.0
//! Free-look camera. World is Z-up; the camera looks down its local +X
//! with +Y to its left.
use bitflags::bitflags;
use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec2, Vec3};

/// Keep pitch short of straight up/down so `look_to` never degenerates.
const PITCH_LIMIT: f32 = std::f32::consts::FRAC_PI_2 - 0.01;

bitflags! {
    /// Movement keys held this frame, in camera-local terms.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct Movement: u8 {
        const FORWARD  = 1 << 0;
        const BACKWARD = 1 << 1;
        const LEFT     = 1 << 2;
        const RIGHT    = 1 << 3;
        const UP       = 1 << 4;
        const DOWN     = 1 << 5;
    }
}

/// Layout of the `Camera` uniform block (set 0, binding 0).
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, Pod, Zeroable)]
pub struct CameraUbo {
    pub view: [[f32; 4]; 4],
    pub projection: [[f32; 4]; 4],
}

const IDENTITY_COLS: [[f32; 4]; 4] = [
    [1.0, 0.0, 0.0, 0.0],
    [0.0, 1.0, 0.0, 0.0],
    [0.0, 0.0, 1.0, 0.0],
    [0.0, 0.0, 0.0, 1.0],
];

impl CameraUbo {
    pub const IDENTITY: CameraUbo = CameraUbo {
        view: IDENTITY_COLS,
        projection: IDENTITY_COLS,
    };
}

#[derive(Clone, Copy, Debug)]
pub struct CameraSettings {
    pub move_speed: f32,
    pub mouse_sensitivity: f32,
    pub fov_y_deg: f32,
    pub near: f32,
    pub far: f32,
}

impl Default for CameraSettings {
    fn default() -> Self {
        CameraSettings {
            move_speed: 4.5,
            mouse_sensitivity: 0.0018,
            fov_y_deg: 70.0,
            near: 0.1,
            far: 1000.0,
        }
    }
}

#[derive(Clone, Debug)]
pub struct FreeLookCamera {
    position: Vec3,
    yaw: f32,
    pitch: f32,
    settings: CameraSettings,
}

impl FreeLookCamera {
    pub fn new(position: Vec3, settings: CameraSettings) -> Self {
        FreeLookCamera {
            position,
            yaw: 0.0,
            pitch: 0.0,
            settings,
        }
    }

    pub fn position(&self) -> Vec3 {
        self.position
    }

    pub fn set_position(&mut self, position: Vec3) {
        self.position = position;
    }

    pub fn settings(&self) -> &CameraSettings {
        &self.settings
    }

    pub fn forward(&self) -> Vec3 {
        let (sy, cy) = self.yaw.sin_cos();
        let (sp, cp) = self.pitch.sin_cos();
        Vec3::new(cp * cy, cp * sy, sp)
    }

    pub fn left(&self) -> Vec3 {
        let (sy, cy) = self.yaw.sin_cos();
        Vec3::new(-sy, cy, 0.0)
    }

    pub fn up(&self) -> Vec3 {
        self.forward().cross(self.left())
    }

    /// `look` is the cursor delta in pixels (x right, y down).
    pub fn update(&mut self, dt: f32, movement: Movement, look: Vec2) {
        let s = self.settings.mouse_sensitivity;
        self.yaw -= look.x * s;
        self.pitch = (self.pitch - look.y * s).clamp(-PITCH_LIMIT, PITCH_LIMIT);

        let mut velocity = Vec3::ZERO;
        let axes = [
            (Movement::FORWARD, self.forward()),
            (Movement::BACKWARD, -self.forward()),
            (Movement::LEFT, self.left()),
            (Movement::RIGHT, -self.left()),
            (Movement::UP, self.up()),
            (Movement::DOWN, -self.up()),
        ];
        for (flag, axis) in axes {
            if movement.contains(flag) {
                velocity += axis;
            }
        }
        self.position += velocity * self.settings.move_speed * dt;
    }

    pub fn view(&self) -> Mat4 {
        Mat4::look_to_rh(self.position, self.forward(), Vec3::Z)
    }

    /// Vulkan clip space: depth 0..1, Y pointing down.
    pub fn projection(&self, aspect: f32) -> Mat4 {
        let mut proj = Mat4::perspective_rh(
            self.settings.fov_y_deg.to_radians(),
            aspect,
            self.settings.near,
            self.settings.far,
        );
        proj.y_axis.y *= -1.0;
        proj
    }

    pub fn ubo(&self, width: u32, height: u32) -> CameraUbo {
        let aspect = if height == 0 {
            1.0
        } else {
            width as f32 / height as f32
        };
        CameraUbo {
            view: self.view().to_cols_array_2d(),
            projection: self.projection(aspect).to_cols_array_2d(),
        }
    }
}
