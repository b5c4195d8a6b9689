// SPDX-License-Identifier: CEPL-1.0
mod input;
mod surface;

pub use input::InputState;
pub use surface::WindowSurface;
pub use winit;
