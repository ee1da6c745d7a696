//! Live shader program management for the grid shader lab.
//!
//! A user writes only the body of `mainImage`. Each frame the session checks
//! the file stamp, and when it moved the body is recomposed between a fixed
//! prologue and epilogue, compiled, linked and swapped in without tearing
//! down the renderer:
//!
//! ```text
//!   Session::tick ──▶ HotReloadWatcher::poll ──changed──▶ ShaderDocument::reload
//!        │                                                       │
//!        │                                                    compose
//!        │                                                       ▼
//!        │                                  ShaderBackend::build ──err──▶ keep previous,
//!        │                                         │ ok                  store diagnostic
//!        │                                         ▼
//!        │                     swap, release old, resolve_uniforms, frame = 0
//!        ▼
//!   ClockState::tick ──▶ RenderUniforms ──▶ UniformBinder ──▶ ShaderBackend::draw
//! ```
//!
//! [`Session`] is generic over [`ShaderBackend`]; the window path uses
//! [`gpu::WgpuBackend`], while [`HeadlessBackend`] compiles with naga alone
//! and is what the `check` subcommand and the tests run against.

pub mod backend;
pub mod clock;
pub mod compile;
pub mod compose;
pub mod error;
pub mod gpu;
pub mod input;
pub mod program;
pub mod session;
pub mod source;
pub mod types;
pub mod uniforms;
pub mod watcher;

mod window;

use anyhow::Result;

pub use backend::{HeadlessBackend, ShaderBackend};
pub use compose::{compose, DEFAULT_BODY, VERTEX_SHADER};
pub use error::{SessionError, ShaderError, Stage};
pub use session::{Session, SessionOptions};
pub use types::{GridConfig, RendererConfig, WatchMode};

/// Entry point used by the binary: opens the window and runs the session.
pub struct Renderer {
    config: RendererConfig,
}

impl Renderer {
    pub fn new(config: RendererConfig) -> Self {
        Self { config }
    }

    /// Blocks until the window is closed or the user quits.
    ///
    /// Fails when no window or GPU device can be created, or when neither the
    /// requested shader nor the built-in one builds.
    pub fn run(&mut self) -> Result<()> {
        window::run(&self.config)
    }
}

/// Composes and builds `body` without a window, returning the diagnostic of
/// the first failing stage.
pub fn check_body(body: &str) -> Result<usize, ShaderError> {
    let mut backend = HeadlessBackend::new();
    let program = backend.build(VERTEX_SHADER, &compose(body))?;
    Ok(backend.resolve_uniforms(&program, 0).len())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn check_body_reports_uniform_count() {
        assert_eq!(check_body(DEFAULT_BODY).unwrap(), 8);
    }

    #[test]
    fn check_body_tags_the_failing_stage() {
        let err = check_body("void mainImage(out vec4 c, in vec2 f, in ivec2 cell, in vec2 uv) { c = oops; }")
            .unwrap_err();
        assert_eq!(err.tag(), "fragment");
    }
}
