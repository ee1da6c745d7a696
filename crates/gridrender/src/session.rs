//! The owned session tying document, watcher, active program, clock and input
//! together.
//!
//! Everything the render loop mutates lives here and is reached through
//! `&mut Session`, so the whole reload path can be driven from tests with a
//! [`HeadlessBackend`](crate::backend::HeadlessBackend) and synthetic
//! instants.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::backend::ShaderBackend;
use crate::clock::ClockState;
use crate::compose::{compose, DEFAULT_BODY, VERTEX_SHADER};
use crate::error::{SessionError, ShaderError};
use crate::input::{Command, InputState};
use crate::program::{CompiledProgram, GenerationCounter};
use crate::source::ShaderDocument;
use crate::types::{GridConfig, RendererConfig, WatchMode};
use crate::uniforms::{RenderUniforms, UniformBinder};
use crate::watcher::{stamp_source, HotReloadWatcher, ReloadPhase};

/// Start-up parameters of a [`Session`].
#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub shader: PathBuf,
    pub grid: GridConfig,
    pub seed: i32,
    pub viewport: (u32, u32),
    pub poll_interval: Duration,
    pub watch_mode: WatchMode,
    pub dump_composed: Option<PathBuf>,
}

impl SessionOptions {
    pub fn from_config(config: &RendererConfig) -> Self {
        Self {
            shader: config.shader_source.clone(),
            grid: config.grid,
            seed: config.seed,
            viewport: config.surface_size,
            poll_interval: config.poll_interval,
            watch_mode: config.watch_mode,
            dump_composed: config.dump_composed.clone(),
        }
    }
}

pub struct Session<B: ShaderBackend> {
    backend: B,
    document: ShaderDocument,
    watcher: HotReloadWatcher,
    active: CompiledProgram<B::Program>,
    generations: GenerationCounter,
    binder: UniformBinder,
    clock: ClockState,
    grid: GridConfig,
    input: InputState,
    viewport: (u32, u32),
    frame: i32,
    seed: i32,
    last_diagnostic: Option<ShaderError>,
    dump_composed: Option<PathBuf>,
    quit: bool,
}

impl<B: ShaderBackend> Session<B> {
    /// Builds the initial program and starts the clock at `now`.
    ///
    /// An unavailable file is replaced by the built-in body, and a body that
    /// fails to build falls back to it. Only when the built-in body fails as
    /// well does start-up fail.
    pub fn start(mut backend: B, options: SessionOptions, now: Instant) -> Result<Self, SessionError> {
        let mut document = ShaderDocument::open(&options.shader);
        let mut generations = GenerationCounter::default();
        let dump = options.dump_composed.as_deref();

        let requested_body = match document.reload() {
            Ok(text) => Some(text.to_string()),
            Err(err) => {
                warn!(%err, "substituting built-in shader");
                None
            }
        };

        let mut last_diagnostic = None;
        let active = match requested_body {
            Some(body) => match build_program(&mut backend, &body, &mut generations, dump) {
                Ok(program) => program,
                Err(requested) => {
                    warn!(
                        path = %document.path().display(),
                        stage = requested.tag(),
                        "initial shader failed; falling back to built-in shader:\n{requested}"
                    );
                    match build_program(&mut backend, DEFAULT_BODY, &mut generations, dump) {
                        Ok(program) => {
                            last_diagnostic = Some(requested);
                            program
                        }
                        Err(fallback) => {
                            return Err(SessionError::NoWorkingProgram {
                                requested: Box::new(requested),
                                fallback: Box::new(fallback),
                            })
                        }
                    }
                }
            },
            None => build_program(&mut backend, DEFAULT_BODY, &mut generations, dump)
                .map_err(|err| SessionError::DefaultFailed(Box::new(err)))?,
        };

        info!(
            path = %document.path().display(),
            generation = active.generation(),
            uniforms = active.locations().len(),
            "shader program ready"
        );

        let watcher = HotReloadWatcher::new(
            options.poll_interval,
            stamp_source(
                options.watch_mode,
                document.path(),
                document.stamp(),
                options.poll_interval,
            ),
            now,
        );
        backend.resize(options.viewport.0, options.viewport.1);

        Ok(Self {
            backend,
            document,
            watcher,
            active,
            generations,
            binder: UniformBinder::new(),
            clock: ClockState::new(now),
            grid: options.grid,
            input: InputState::default(),
            viewport: options.viewport,
            frame: 0,
            seed: options.seed,
            last_diagnostic,
            dump_composed: options.dump_composed,
            quit: false,
        })
    }

    /// Runs one frame: reload check, clock advance, uniform upload and draw.
    pub fn tick(&mut self, now: Instant) -> Result<(), B::DrawError> {
        self.reload_if_needed(now);

        let elapsed = self.clock.tick(now);
        let snapshot = self.snapshot(elapsed);
        let block = self.binder.bind(self.active.locations(), &snapshot);
        self.backend.draw(self.active.handle(), block)?;
        self.frame = self.frame.wrapping_add(1);
        Ok(())
    }

    /// Rebuilds the program when the watcher asks for it.
    ///
    /// Returns `None` when no rebuild was due, otherwise whether the new
    /// program was swapped in. On failure the previous program stays active.
    pub fn reload_if_needed(&mut self, now: Instant) -> Option<bool> {
        if !self.watcher.poll(now, &mut self.document) {
            return None;
        }

        let body = match self.document.reload() {
            Ok(text) => text.to_string(),
            Err(err) => {
                warn!(%err, "substituting built-in shader");
                DEFAULT_BODY.to_string()
            }
        };

        match build_program(
            &mut self.backend,
            &body,
            &mut self.generations,
            self.dump_composed.as_deref(),
        ) {
            Ok(program) => {
                let previous = std::mem::replace(&mut self.active, program);
                self.backend.release(previous.into_handle());
                self.frame = 0;
                self.last_diagnostic = None;
                self.watcher.complete(true);
                info!(
                    path = %self.document.path().display(),
                    generation = self.active.generation(),
                    "shader reloaded"
                );
                Some(true)
            }
            Err(err) => {
                warn!(
                    path = %self.document.path().display(),
                    stage = err.tag(),
                    generation = self.active.generation(),
                    "reload failed, keeping previous program:\n{err}"
                );
                self.last_diagnostic = Some(err);
                self.watcher.complete(false);
                Some(false)
            }
        }
    }

    pub fn apply(&mut self, command: Command, now: Instant) {
        match command {
            Command::TogglePause => {
                let paused = self.clock.toggle_pause(now);
                info!(paused, "pause toggled");
            }
            Command::ForceReload => {
                debug!("reload requested");
                self.watcher.request_reload();
            }
            Command::GrowColumns => self.resize_grid(GridConfig::grow_columns),
            Command::ShrinkColumns => self.resize_grid(GridConfig::shrink_columns),
            Command::GrowRows => self.resize_grid(GridConfig::grow_rows),
            Command::ShrinkRows => self.resize_grid(GridConfig::shrink_rows),
            Command::Quit => self.quit = true,
        }
    }

    fn resize_grid(&mut self, change: fn(&mut GridConfig)) {
        let before = self.grid;
        change(&mut self.grid);
        if self.grid != before {
            info!(
                columns = self.grid.columns(),
                rows = self.grid.rows(),
                "grid resized"
            );
        }
    }

    /// Tracks a viewport change; zero-sized viewports (minimised windows) are
    /// ignored.
    pub fn resize(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        self.viewport = (width, height);
        self.backend.resize(width, height);
    }

    fn snapshot(&self, elapsed: Duration) -> RenderUniforms {
        let (width, height) = self.viewport;
        RenderUniforms {
            time: elapsed.as_secs_f32(),
            resolution: [width as f32, height as f32],
            mouse: self.input.pointer(height as f32),
            mouse_down: self.input.is_pressed(),
            grid: self.grid.as_ivec2(),
            paused: self.clock.is_paused(),
            frame: self.frame,
            seed: self.seed,
        }
    }

    pub fn input_mut(&mut self) -> &mut InputState {
        &mut self.input
    }

    pub fn grid(&self) -> GridConfig {
        self.grid
    }

    pub fn is_paused(&self) -> bool {
        self.clock.is_paused()
    }

    /// Frame index the next draw will carry.
    pub fn frame(&self) -> i32 {
        self.frame
    }

    pub fn viewport(&self) -> (u32, u32) {
        self.viewport
    }

    pub fn active_program(&self) -> &CompiledProgram<B::Program> {
        &self.active
    }

    pub fn document(&self) -> &ShaderDocument {
        &self.document
    }

    pub fn reload_phase(&self) -> ReloadPhase {
        self.watcher.phase()
    }

    /// Diagnostic of the most recent failed build, cleared by the next
    /// successful one.
    pub fn last_diagnostic(&self) -> Option<&ShaderError> {
        self.last_diagnostic.as_ref()
    }

    pub fn should_quit(&self) -> bool {
        self.quit
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }
}

fn build_program<B: ShaderBackend>(
    backend: &mut B,
    body: &str,
    generations: &mut GenerationCounter,
    dump: Option<&Path>,
) -> Result<CompiledProgram<B::Program>, ShaderError> {
    let fragment = compose(body);
    if let Some(path) = dump {
        if let Err(err) = fs::write(path, &fragment) {
            warn!(path = %path.display(), %err, "failed to write composed shader");
        }
    }
    let handle = backend.build(VERTEX_SHADER, &fragment)?;
    let generation = generations.next();
    let locations = backend.resolve_uniforms(&handle, generation);
    Ok(CompiledProgram::new(handle, locations))
}
