// SPDX-License-Identifier: CEPL-1.0
use ash::vk;
use serde::Deserialize;
use std::str::FromStr;

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct RendererSettings {
    pub max_frames_in_flight: usize,
    pub present_mode: PresentModePref,
    pub clear_color: [f32; 4],
    pub wireframe: bool,
    pub cull_mode: CullModePref,
    /// Enable `VK_LAYER_KHRONOS_validation` and route its messages to tracing.
    pub validation: bool,
    pub hud: bool,
}

impl Default for RendererSettings {
    fn default() -> Self {
        RendererSettings {
            max_frames_in_flight: 2,
            present_mode: PresentModePref::default(),
            clear_color: [0.01, 0.01, 0.01, 1.0],
            wireframe: false,
            cull_mode: CullModePref::default(),
            validation: cfg!(debug_assertions),
            hud: true,
        }
    }
}

#[derive(Clone, Copy, Debug, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PresentModePref {
    /// No vsync; tearing allowed.
    #[default]
    Immediate,
    Mailbox,
    Fifo,
    FifoRelaxed,
}

impl PresentModePref {
    pub(crate) fn as_vk(self) -> vk::PresentModeKHR {
        match self {
            PresentModePref::Immediate => vk::PresentModeKHR::IMMEDIATE,
            PresentModePref::Mailbox => vk::PresentModeKHR::MAILBOX,
            PresentModePref::Fifo => vk::PresentModeKHR::FIFO,
            PresentModePref::FifoRelaxed => vk::PresentModeKHR::FIFO_RELAXED,
        }
    }
}

impl FromStr for PresentModePref {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "immediate" => Ok(PresentModePref::Immediate),
            "mailbox" => Ok(PresentModePref::Mailbox),
            "fifo" => Ok(PresentModePref::Fifo),
            "fifo_relaxed" | "fifo-relaxed" => Ok(PresentModePref::FifoRelaxed),
            other => Err(format!(
                "unknown present mode '{other}' (immediate | mailbox | fifo | fifo_relaxed)"
            )),
        }
    }
}

#[derive(Clone, Copy, Debug, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CullModePref {
    #[default]
    None,
    Back,
    Front,
}

impl CullModePref {
    pub(crate) fn as_vk(self) -> vk::CullModeFlags {
        match self {
            CullModePref::None => vk::CullModeFlags::NONE,
            CullModePref::Back => vk::CullModeFlags::BACK,
            CullModePref::Front => vk::CullModeFlags::FRONT,
        }
    }
}
