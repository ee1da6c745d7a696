use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{anyhow, Context, Result};
use tracing::{debug, error, warn};
use winit::dpi::PhysicalSize;
use winit::event::{ElementState, Event, KeyEvent, MouseButton, WindowEvent};
use winit::event_loop::{ControlFlow, EventLoop};
use winit::keyboard::{Key, NamedKey};
use winit::window::{Window, WindowBuilder};

use crate::gpu::WgpuBackend;
use crate::input::{command_for_text, Command};
use crate::session::{Session, SessionOptions};
use crate::types::RendererConfig;

const RELOAD_FAILED_MARKER: &str = "[reload failed]";

/// Window, session and the bookkeeping the event loop needs between events.
///
/// Field order matters: the session owns the surface, which must be dropped
/// before the window it was created from.
struct WindowState {
    session: Session<WgpuBackend>,
    window: Arc<Window>,
    title: String,
    showing_failure: bool,
    stats: FrameStats,
}

impl WindowState {
    fn window(&self) -> &Window {
        self.window.as_ref()
    }

    /// Keeps the `[reload failed]` marker in sync with the last build.
    fn sync_title(&mut self) {
        let failed = self.session.last_diagnostic().is_some();
        if failed == self.showing_failure {
            return;
        }
        self.showing_failure = failed;
        if failed {
            self.window
                .set_title(&format!("{} {RELOAD_FAILED_MARKER}", self.title));
        } else {
            self.window.set_title(&self.title);
        }
    }

    fn handle_key(&mut self, event: &KeyEvent) {
        if event.state != ElementState::Pressed {
            return;
        }
        let command = match &event.logical_key {
            Key::Named(NamedKey::Escape) => Some(Command::Quit),
            Key::Character(text) => command_for_text(text.as_str(), event.repeat),
            _ => None,
        };
        if let Some(command) = command {
            self.session.apply(command, Instant::now());
        }
    }

    /// Draws one frame; returns `false` when the loop must stop.
    fn redraw(&mut self) -> bool {
        let keep_running = match self.session.tick(Instant::now()) {
            Ok(()) => {
                self.stats.record(&self.session);
                true
            }
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                warn!("surface lost; reconfiguring");
                let (width, height) = self.session.viewport();
                self.session.resize(width, height);
                true
            }
            Err(wgpu::SurfaceError::OutOfMemory) => {
                error!("surface out of memory; exiting");
                false
            }
            Err(wgpu::SurfaceError::Timeout) => {
                debug!("surface timeout; skipping frame");
                true
            }
            Err(other) => {
                warn!("surface error: {other:?}; retrying next frame");
                true
            }
        };
        self.sync_title();
        keep_running
    }
}

/// Once-a-second frame rate report.
struct FrameStats {
    frames: u32,
    since: Instant,
}

impl FrameStats {
    fn new(now: Instant) -> Self {
        Self {
            frames: 0,
            since: now,
        }
    }

    fn record(&mut self, session: &Session<WgpuBackend>) {
        self.frames += 1;
        let now = Instant::now();
        let window = now.saturating_duration_since(self.since);
        if window >= Duration::from_secs(1) {
            let fps = self.frames as f32 / window.as_secs_f32();
            debug!(
                fps = fps.round(),
                frame = session.frame(),
                generation = session.active_program().generation(),
                paused = session.is_paused(),
                "render stats"
            );
            self.frames = 0;
            self.since = now;
        }
    }
}

/// Opens the window and drives the session until the user quits.
pub(crate) fn run(config: &RendererConfig) -> Result<()> {
    let event_loop = EventLoop::new().context("failed to initialize event loop")?;
    let window_size = PhysicalSize::new(config.surface_size.0, config.surface_size.1);
    let window = WindowBuilder::new()
        .with_title(config.title.as_str())
        .with_inner_size(window_size)
        .build(&event_loop)
        .context("failed to create window")?;
    let window = Arc::new(window);

    let size = window.inner_size();
    let backend = WgpuBackend::new(window.as_ref(), size, config.vsync)?;
    let mut options = SessionOptions::from_config(config);
    let backend_size = backend.size();
    options.viewport = (backend_size.width, backend_size.height);
    let session = Session::start(backend, options, Instant::now())?;

    let mut state = WindowState {
        session,
        window,
        title: config.title.clone(),
        showing_failure: false,
        stats: FrameStats::new(Instant::now()),
    };
    state.sync_title();
    state.window().request_redraw();

    event_loop
        .run(move |event, elwt| {
            elwt.set_control_flow(ControlFlow::Wait);

            match event {
                Event::WindowEvent { window_id, event } if window_id == state.window().id() => {
                    match event {
                        WindowEvent::CloseRequested | WindowEvent::Destroyed => {
                            elwt.exit();
                        }
                        WindowEvent::KeyboardInput { event, .. } => {
                            state.handle_key(&event);
                            if state.session.should_quit() {
                                elwt.exit();
                            }
                        }
                        WindowEvent::CursorMoved { position, .. } => {
                            state
                                .session
                                .input_mut()
                                .handle_cursor_moved(position.x, position.y);
                        }
                        WindowEvent::MouseInput {
                            state: button_state,
                            button: MouseButton::Left,
                            ..
                        } => {
                            state
                                .session
                                .input_mut()
                                .handle_button(button_state == ElementState::Pressed);
                        }
                        WindowEvent::Resized(new_size) => {
                            state.session.resize(new_size.width, new_size.height);
                        }
                        WindowEvent::RedrawRequested => {
                            if !state.redraw() {
                                elwt.exit();
                            }
                        }
                        _ => {}
                    }
                }
                Event::AboutToWait => {
                    state.window().request_redraw();
                }
                _ => {}
            }
        })
        .map_err(|err| anyhow!("event loop error: {err}"))
}
