// SPDX-License-Identifier: CEPL-1.0
//! Frame-time graph drawn with `vkCmdClearAttachments` inside the scene pass.
use crate::{SwapchainTarget, VkRenderer};
use anyhow::Result;
use ash::vk;
use std::collections::VecDeque;
use std::time::Instant;
use vklab_render::Overlay;

const HISTORY: usize = 120;
const BAR_WIDTH: u32 = 2;
const PANEL_HEIGHT: u32 = 48;
const MARGIN: u32 = 8;
/// Frame time that fills the panel height (30 fps).
const FULL_SCALE_MS: f32 = 33.3;
const BUDGET_60_MS: f32 = 16.7;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Shade {
    Panel,
    Fast,
    Slow,
    Janky,
}

impl Shade {
    fn for_ms(ms: f32) -> Shade {
        if ms <= BUDGET_60_MS {
            Shade::Fast
        } else if ms <= FULL_SCALE_MS {
            Shade::Slow
        } else {
            Shade::Janky
        }
    }

    fn rgba(self) -> [f32; 4] {
        match self {
            Shade::Panel => [0.04, 0.04, 0.05, 1.0],
            Shade::Fast => [0.15, 0.75, 0.25, 1.0],
            Shade::Slow => [0.85, 0.7, 0.1, 1.0],
            Shade::Janky => [0.9, 0.15, 0.1, 1.0],
        }
    }
}

fn rect(x: u32, y: u32, width: u32, height: u32) -> vk::ClearRect {
    vk::ClearRect {
        rect: vk::Rect2D {
            offset: vk::Offset2D {
                x: x as i32,
                y: y as i32,
            },
            extent: vk::Extent2D { width, height },
        },
        base_array_layer: 0,
        layer_count: 1,
    }
}

/// Panel plus one bar per sample, newest on the right. Everything is clipped
/// to `extent`; zero-sized rects are dropped.
pub fn layout(samples: &VecDeque<f32>, extent: vk::Extent2D) -> Vec<(Shade, vk::ClearRect)> {
    let mut out = Vec::new();
    if extent.width <= MARGIN * 2 || extent.height <= MARGIN * 2 {
        return out;
    }
    let width = (HISTORY as u32 * BAR_WIDTH).min(extent.width - MARGIN * 2);
    let height = PANEL_HEIGHT.min(extent.height - MARGIN * 2);
    out.push((Shade::Panel, rect(MARGIN, MARGIN, width, height)));

    let fits = (width / BAR_WIDTH) as usize;
    let bottom = MARGIN + height;
    for (i, &ms) in samples.iter().rev().take(fits).enumerate() {
        let h = ((ms / FULL_SCALE_MS).clamp(0.0, 1.0) * height as f32).round() as u32;
        if h == 0 {
            continue;
        }
        let x = MARGIN + width - (i as u32 + 1) * BAR_WIDTH;
        out.push((Shade::for_ms(ms), rect(x, bottom - h, BAR_WIDTH, h)));
    }
    out
}

pub struct HudOverlay {
    enabled: bool,
    extent: vk::Extent2D,
    last: Option<Instant>,
    samples: VecDeque<f32>,
}

impl HudOverlay {
    pub fn new(enabled: bool) -> Self {
        HudOverlay {
            enabled,
            extent: vk::Extent2D::default(),
            last: None,
            samples: VecDeque::with_capacity(HISTORY),
        }
    }

    pub fn set_enabled(&mut self, on: bool) {
        self.enabled = on;
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    /// Mean of the recorded frame times, in milliseconds.
    pub fn average_ms(&self) -> Option<f32> {
        if self.samples.is_empty() {
            None
        } else {
            Some(self.samples.iter().sum::<f32>() / self.samples.len() as f32)
        }
    }

    fn push_sample(&mut self, ms: f32) {
        if self.samples.len() == HISTORY {
            self.samples.pop_front();
        }
        self.samples.push_back(ms);
    }
}

impl Overlay<VkRenderer> for HudOverlay {
    fn begin_frame(&mut self) {
        let now = Instant::now();
        if let Some(last) = self.last.replace(now) {
            self.push_sample((now - last).as_secs_f32() * 1000.0);
        }
    }

    fn end_frame(&mut self, backend: &VkRenderer, cmd: vk::CommandBuffer) -> Result<()> {
        if !self.enabled {
            return Ok(());
        }
        let rects = layout(&self.samples, self.extent);
        let device = backend.device();
        // One clear call per shade; the clear value is per attachment.
        for shade in [Shade::Panel, Shade::Fast, Shade::Slow, Shade::Janky] {
            let batch: Vec<vk::ClearRect> = rects
                .iter()
                .filter(|(s, _)| *s == shade)
                .map(|(_, r)| *r)
                .collect();
            if batch.is_empty() {
                continue;
            }
            let attachment = vk::ClearAttachment {
                aspect_mask: vk::ImageAspectFlags::COLOR,
                color_attachment: 0,
                clear_value: vk::ClearValue {
                    color: vk::ClearColorValue {
                        float32: shade.rgba(),
                    },
                },
            };
            unsafe { device.cmd_clear_attachments(cmd, &[attachment], &batch) };
        }
        Ok(())
    }

    fn retarget(&mut self, target: &SwapchainTarget) {
        self.extent = target.extent;
        // The pause across a recreation is not a frame time.
        self.last = None;
    }
}
