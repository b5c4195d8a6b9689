// SPDX-License-Identifier: CEPL-1.0
use clap::Parser;
use serde::Deserialize;
use std::path::PathBuf;
use vklab_core::LogConfig;
use vklab_math::CameraSettings;
use vklab_render_vk::{PresentModePref, RendererSettings};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Config file; a missing file means all defaults
    #[arg(long, default_value = "vklab.toml")]
    pub config: PathBuf,

    /// Frames recorded ahead of the GPU (>= 1)
    #[arg(long)]
    pub frames_in_flight: Option<usize>,

    /// immediate | mailbox | fifo | fifo_relaxed
    #[arg(long)]
    pub present_mode: Option<PresentModePref>,

    /// Skip VK_LAYER_KHRONOS_validation even if the config enables it
    #[arg(long)]
    pub no_validation: bool,

    /// Draw with PolygonMode::LINE
    #[arg(long)]
    pub wireframe: bool,
}

impl Args {
    /// Command-line flags win over the file.
    pub fn apply(&self, cfg: &mut AppCfg) {
        if let Some(n) = self.frames_in_flight {
            cfg.render.max_frames_in_flight = n;
        }
        if let Some(mode) = self.present_mode {
            cfg.render.present_mode = mode;
        }
        if self.no_validation {
            cfg.render.validation = false;
        }
        if self.wireframe {
            cfg.render.wireframe = true;
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct WindowCfg {
    pub title: String,
    pub width: u32,
    pub height: u32,
}

impl Default for WindowCfg {
    fn default() -> Self {
        WindowCfg {
            title: "vklab".to_owned(),
            width: 1280,
            height: 720,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct CameraCfg {
    pub move_speed: f32,
    pub mouse_sensitivity: f32,
    pub fov_deg: f32,
    /// World position, Z up.
    pub start: [f32; 3],
}

impl Default for CameraCfg {
    fn default() -> Self {
        let s = CameraSettings::default();
        CameraCfg {
            move_speed: s.move_speed,
            mouse_sensitivity: s.mouse_sensitivity,
            fov_deg: s.fov_y_deg,
            start: [-2.0, 0.0, 0.0],
        }
    }
}

impl CameraCfg {
    pub fn settings(&self) -> CameraSettings {
        CameraSettings {
            move_speed: self.move_speed,
            mouse_sensitivity: self.mouse_sensitivity,
            fov_y_deg: self.fov_deg,
            ..CameraSettings::default()
        }
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct AppCfg {
    pub window: WindowCfg,
    pub render: RendererSettings,
    pub camera: CameraCfg,
    pub log: LogConfig,
}

#[cfg(test)]
mod tests {
    use super::*;
    use vklab_render_vk::CullModePref;

    #[test]
    fn empty_file_is_all_defaults() {
        let cfg: AppCfg = toml::from_str("").unwrap();
        assert_eq!(cfg.window.title, "vklab");
        assert_eq!(cfg.render.max_frames_in_flight, 2);
        assert_eq!(cfg.render.present_mode, PresentModePref::Immediate);
        assert!(cfg.render.hud);
        assert_eq!(cfg.camera.start, [-2.0, 0.0, 0.0]);
        assert_eq!(cfg.log.level, "info");
    }

    #[test]
    fn full_file_parses() {
        let cfg: AppCfg = toml::from_str(
            r#"
            [window]
            title = "lab"
            width = 800
            height = 600

            [render]
            max_frames_in_flight = 3
            present_mode = "fifo_relaxed"
            clear_color = [0.1, 0.2, 0.3, 1.0]
            wireframe = true
            cull_mode = "back"
            validation = false
            hud = false

            [camera]
            move_speed = 10.0
            fov_deg = 90.0
            start = [0.0, 0.0, 5.0]

            [log]
            level = "debug"
            "#,
        )
        .unwrap();
        assert_eq!(cfg.window.width, 800);
        assert_eq!(cfg.render.max_frames_in_flight, 3);
        assert_eq!(cfg.render.present_mode, PresentModePref::FifoRelaxed);
        assert_eq!(cfg.render.cull_mode, CullModePref::Back);
        assert!(cfg.render.wireframe && !cfg.render.validation && !cfg.render.hud);
        assert_eq!(cfg.camera.settings().fov_y_deg, 90.0);
        // untouched fields keep their defaults
        assert_eq!(cfg.camera.mouse_sensitivity, CameraSettings::default().mouse_sensitivity);
        assert_eq!(cfg.log.level, "debug");
    }

    #[test]
    fn unknown_present_mode_is_rejected() {
        let res: Result<AppCfg, _> = toml::from_str("[render]\npresent_mode = \"vsync\"");
        assert!(res.is_err());
    }

    #[test]
    fn cli_overrides_file() {
        let args = Args::try_parse_from([
            "vklab",
            "--config",
            "other.toml",
            "--frames-in-flight",
            "4",
            "--present-mode",
            "mailbox",
            "--no-validation",
            "--wireframe",
        ])
        .unwrap();
        assert_eq!(args.config, PathBuf::from("other.toml"));

        let mut cfg = AppCfg::default();
        cfg.render.validation = true;
        args.apply(&mut cfg);
        assert_eq!(cfg.render.max_frames_in_flight, 4);
        assert_eq!(cfg.render.present_mode, PresentModePref::Mailbox);
        assert!(!cfg.render.validation);
        assert!(cfg.render.wireframe);
    }

    #[test]
    fn no_flags_leave_config_alone() {
        let args = Args::try_parse_from(["vklab"]).unwrap();
        let mut cfg = AppCfg::default();
        cfg.render.max_frames_in_flight = 3;
        args.apply(&mut cfg);
        assert_eq!(cfg.render.max_frames_in_flight, 3);
        assert_eq!(args.config, PathBuf::from("vklab.toml"));
    }

    #[test]
    fn bad_present_mode_flag_is_a_usage_error() {
        assert!(Args::try_parse_from(["vklab", "--present-mode", "vsync"]).is_err());
    }
}
