// SPDX-License-Identifier: CEPL-1.0
mod camera;

pub use camera::{CameraSettings, CameraUbo, FreeLookCamera, Movement};
pub use glam;
