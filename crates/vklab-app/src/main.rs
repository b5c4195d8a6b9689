// SPDX-License-Identifier: CEPL-1.0
#![deny(unsafe_op_in_unsafe_fn)]
mod config;

use anyhow::{Context, Result};
use clap::Parser;
use glam::Vec3;
use std::time::{Duration, Instant};
use tracing::{info, warn};
use std::path::Path;
use vklab_core::config::{load_or_default, ConfigError};
use vklab_core::init_tracing;
use vklab_math::{FreeLookCamera, Movement};
use vklab_platform::winit::{event::MouseButton, keyboard::KeyCode};
use vklab_platform::{InputState, WindowSurface};
use vklab_render::{DrawableSurface, FrameDriver, FrameStatus};
use vklab_render_vk::{HudOverlay, VkRenderer};

use config::{AppCfg, Args};

type Driver = FrameDriver<VkRenderer, HudOverlay>;

const MOVE_KEYS: [(KeyCode, Movement); 8] = [
    (KeyCode::KeyW, Movement::FORWARD),
    (KeyCode::KeyS, Movement::BACKWARD),
    (KeyCode::KeyA, Movement::LEFT),
    (KeyCode::KeyD, Movement::RIGHT),
    (KeyCode::KeyE, Movement::UP),
    (KeyCode::Space, Movement::UP),
    (KeyCode::KeyQ, Movement::DOWN),
    (KeyCode::ShiftLeft, Movement::DOWN),
];

fn movement(input: &InputState) -> Movement {
    MOVE_KEYS
        .iter()
        .filter(|(key, _)| input.is_key_down(*key))
        .fold(Movement::empty(), |acc, (_, m)| acc | *m)
}

/// Frames per second over one-second windows.
struct FpsCounter {
    window_start: Instant,
    frames: u32,
}

impl FpsCounter {
    fn new(now: Instant) -> Self {
        FpsCounter {
            window_start: now,
            frames: 0,
        }
    }

    /// Returns the rate once a full second has passed.
    fn tick(&mut self, now: Instant) -> Option<f32> {
        self.frames += 1;
        let elapsed = now - self.window_start;
        if elapsed < Duration::from_secs(1) {
            return None;
        }
        let fps = self.frames as f32 / elapsed.as_secs_f32();
        self.frames = 0;
        self.window_start = now;
        Some(fps)
    }
}

fn run(
    driver: &mut Driver,
    surface: &mut WindowSurface,
    camera: &mut FreeLookCamera,
    title: &str,
) -> Result<()> {
    let mut last = Instant::now();
    let mut fps = FpsCounter::new(last);

    while !surface.should_close() {
        // 1) events + input
        surface.poll_events();
        if surface.should_close() {
            break;
        }
        let now = Instant::now();
        let dt = (now - last).as_secs_f32();
        last = now;

        let input = surface.input();
        let quit = input.is_key_pressed(KeyCode::Escape);
        let toggle_hud = input.is_key_pressed(KeyCode::F1);
        let look = input.is_mouse_down(MouseButton::Right);
        let moves = movement(input);
        let delta = input.mouse_delta();

        if quit {
            surface.request_close();
            break;
        }
        if toggle_hud {
            let hud = driver.overlay_mut();
            hud.set_enabled(!hud.enabled());
        }

        // 2) camera, only while the right button is held
        if look {
            camera.update(dt, moves, delta);
        }
        let extent = driver.backend().extent();
        driver
            .backend_mut()
            .set_camera(camera.ubo(extent.width, extent.height));

        // 3) frame
        if let FrameStatus::Presented {
            recreated: true, ..
        } = driver.draw_frame(surface)?
        {
            info!("swapchain now {}", driver.backend().extent());
        }
        surface.input_mut().end_frame();

        if let Some(rate) = fps.tick(Instant::now()) {
            let stats = driver.stats();
            info!(
                fps = format_args!("{rate:.0}"),
                presented = stats.presented,
                skipped = stats.skipped,
                recreations = stats.recreations,
                "frame stats"
            );
            let ms = driver.overlay_mut().average_ms().unwrap_or(0.0);
            surface.set_title(&format!("{title} | {rate:.0} fps | {ms:.2} ms"));
        }
    }
    Ok(())
}

/// Defaults plus the error when the file exists but is unusable. The error is
/// held until tracing is up so it is not lost.
fn load_cfg(path: &Path) -> (AppCfg, Option<ConfigError>) {
    match load_or_default(path) {
        Ok(cfg) => (cfg, None),
        Err(e) => (AppCfg::default(), Some(e)),
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    let (mut cfg, cfg_err) = load_cfg(&args.config);
    args.apply(&mut cfg);
    init_tracing(&cfg.log);
    if let Some(e) = cfg_err {
        let cause = std::error::Error::source(&e).map(ToString::to_string);
        warn!("{e} ({}); using defaults", cause.unwrap_or_default());
    }
    info!(config = %args.config.display(), "vklab starting");

    let mut surface = WindowSurface::new(&cfg.window.title, cfg.window.width, cfg.window.height)?;
    let renderer = VkRenderer::new(
        surface.window(),
        surface.window(),
        surface.drawable_size(),
        cfg.render.clone(),
    )
    .context("vulkan init")?;
    info!(device = renderer.device_name(), "renderer = vk");

    let hud = HudOverlay::new(cfg.render.hud);
    let mut driver = FrameDriver::new(renderer, hud)?;
    let mut camera = FreeLookCamera::new(Vec3::from(cfg.camera.start), cfg.camera.settings());

    let result = run(&mut driver, &mut surface, &mut camera, &cfg.window.title);
    if let Err(e) = &result {
        warn!("frame loop stopped: {e:#}");
    }

    // GPU objects go before the window they present to.
    if let Err(e) = driver.wait_idle() {
        warn!("wait_idle on exit: {e}");
    }
    let stats = driver.stats();
    drop(driver);
    drop(surface);

    info!(
        presented = stats.presented,
        skipped = stats.skipped,
        recreations = stats.recreations,
        "exit"
    );
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WindowCfg;

    #[test]
    fn movement_combines_held_keys() {
        let mut input = InputState::default();
        assert_eq!(movement(&input), Movement::empty());

        input.press_key(KeyCode::KeyW);
        input.press_key(KeyCode::KeyD);
        input.press_key(KeyCode::Space);
        assert_eq!(
            movement(&input),
            Movement::FORWARD | Movement::RIGHT | Movement::UP
        );

        input.release_key(KeyCode::KeyW);
        assert_eq!(movement(&input), Movement::RIGHT | Movement::UP);
    }

    #[test]
    fn malformed_config_falls_back_but_keeps_the_error() {
        let path = std::env::temp_dir().join(format!("vklab-app-{}-bad.toml", std::process::id()));
        std::fs::write(&path, "[window\nwidth = 3").unwrap();

        let (cfg, err) = load_cfg(&path);

        assert_eq!(cfg.window.width, WindowCfg::default().width);
        assert!(matches!(err, Some(ConfigError::Parse { .. })));
        let _ = std::fs::remove_file(path);

        let missing = std::env::temp_dir().join("vklab-app-no-such-config.toml");
        let (_, err) = load_cfg(&missing);
        assert!(err.is_none());
    }

    #[test]
    fn fps_reports_once_per_second() {
        let t0 = Instant::now();
        let mut fps = FpsCounter::new(t0);
        for i in 1..60 {
            assert_eq!(fps.tick(t0 + Duration::from_millis(i * 10)), None);
        }
        let rate = fps.tick(t0 + Duration::from_secs(1)).unwrap();
        assert!((rate - 60.0).abs() < 0.01);
        // window restarts
        assert_eq!(fps.tick(t0 + Duration::from_millis(1010)), None);
    }
}
