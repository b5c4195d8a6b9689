// SPDX-License-Identifier: CEPL-1.0
use crate::InputState;
use anyhow::{anyhow, bail, Context, Result};
use std::time::Duration;
use tracing::{debug, info};
use vklab_render::{DrawableSurface, RenderSize};
use winit::{
    application::ApplicationHandler,
    dpi::PhysicalSize,
    error::OsError,
    event::WindowEvent,
    event_loop::{ActiveEventLoop, EventLoop},
    platform::pump_events::{EventLoopExtPumpEvents, PumpStatus},
    window::{Window, WindowAttributes, WindowId},
};

/// How long start-up waits for the platform to deliver `resumed`.
const RESUME_TIMEOUT: Duration = Duration::from_secs(5);

struct WindowState {
    attributes: WindowAttributes,
    pending_window: Option<Window>,
    create_error: Option<OsError>,
    window_id: Option<WindowId>,
    input: InputState,
    resized: bool,
    close_requested: bool,
}

impl ApplicationHandler for WindowState {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window_id.is_some() || self.pending_window.is_some() {
            return;
        }
        match event_loop.create_window(self.attributes.clone()) {
            Ok(window) => {
                self.window_id = Some(window.id());
                self.pending_window = Some(window);
            }
            Err(e) => {
                self.create_error = Some(e);
                event_loop.exit();
            }
        }
    }

    fn window_event(&mut self, _event_loop: &ActiveEventLoop, id: WindowId, event: WindowEvent) {
        if self.window_id != Some(id) {
            return;
        }
        match event {
            WindowEvent::CloseRequested => {
                info!("CloseRequested");
                self.close_requested = true;
            }
            WindowEvent::Resized(size) => {
                debug!("Resized → {}x{}", size.width, size.height);
                self.resized = true;
            }
            other => self.input.handle_window_event(&other),
        }
    }
}

/// The window, its event loop and input state. Events are pumped by the
/// caller's frame loop rather than by `run_app`, so the frame driver can
/// block on them while the window is minimised.
pub struct WindowSurface {
    window: Window,
    event_loop: EventLoop<()>,
    state: WindowState,
}

impl WindowSurface {
    pub fn new(title: &str, width: u32, height: u32) -> Result<Self> {
        let mut event_loop = EventLoop::new().context("EventLoop::new")?;
        let mut state = WindowState {
            attributes: Window::default_attributes()
                .with_title(title)
                .with_inner_size(PhysicalSize::new(width.max(1), height.max(1))),
            pending_window: None,
            create_error: None,
            window_id: None,
            input: InputState::default(),
            resized: false,
            close_requested: false,
        };

        // Desktop platforms deliver `resumed` on the first pumps.
        let started = std::time::Instant::now();
        let window = loop {
            let status = event_loop.pump_app_events(Some(Duration::from_millis(10)), &mut state);
            if let Some(e) = state.create_error.take() {
                return Err(anyhow!(e)).context("create_window");
            }
            if let Some(window) = state.pending_window.take() {
                break window;
            }
            if let PumpStatus::Exit(code) = status {
                bail!("event loop exited with code {code} before a window was created");
            }
            if started.elapsed() > RESUME_TIMEOUT {
                bail!("window system never resumed the application");
            }
        };

        let size = window.inner_size();
        info!("window '{title}' created ({}x{})", size.width, size.height);
        Ok(WindowSurface {
            window,
            event_loop,
            state,
        })
    }

    pub fn window(&self) -> &Window {
        &self.window
    }

    /// Process pending events without blocking.
    pub fn poll_events(&mut self) {
        self.pump(Some(Duration::ZERO));
    }

    fn pump(&mut self, timeout: Option<Duration>) {
        if let PumpStatus::Exit(code) = self.event_loop.pump_app_events(timeout, &mut self.state) {
            info!("event loop exit ({code})");
            self.state.close_requested = true;
        }
    }

    pub fn input(&self) -> &InputState {
        &self.state.input
    }

    pub fn input_mut(&mut self) -> &mut InputState {
        &mut self.state.input
    }

    pub fn request_close(&mut self) {
        self.state.close_requested = true;
    }

    pub fn set_title(&self, title: &str) {
        self.window.set_title(title);
    }
}

impl DrawableSurface for WindowSurface {
    fn drawable_size(&self) -> RenderSize {
        let size = self.window.inner_size();
        RenderSize::new(size.width, size.height)
    }

    fn wait_events(&mut self) {
        self.pump(None);
    }

    fn should_close(&self) -> bool {
        self.state.close_requested
    }

    fn take_resize_request(&mut self) -> bool {
        std::mem::take(&mut self.state.resized)
    }
}
