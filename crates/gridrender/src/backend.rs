//! The seam between the program-management core and whatever executes the
//! shaders.
//!
//! [`Session`](crate::session::Session) is generic over [`ShaderBackend`], so
//! reload, fallback and uniform handling run unchanged against the wgpu
//! backend in [`gpu`](crate::gpu) and against [`HeadlessBackend`], which
//! compiles with naga and records draws in memory.

use std::fmt;

use crate::compile::{build_stages, reflect_uniforms, LinkedStages};
use crate::error::ShaderError;
use crate::uniforms::UniformLocations;

/// Compiles programs and issues draws for a [`Session`](crate::session::Session).
pub trait ShaderBackend {
    /// Opaque handle of a linked program.
    type Program;
    /// Failure while presenting a frame.
    type DrawError: fmt::Debug + fmt::Display;

    /// Compiles both stages and links them.
    ///
    /// Only a handle is returned; uniform locations are resolved separately
    /// through [`resolve_uniforms`](Self::resolve_uniforms).
    fn build(&mut self, vertex: &str, fragment: &str) -> Result<Self::Program, ShaderError>;

    /// Resolves the uniform-location table of a freshly linked program.
    fn resolve_uniforms(&self, program: &Self::Program, generation: u64) -> UniformLocations;

    /// Destroys a program that has been superseded.
    fn release(&mut self, program: Self::Program) {
        drop(program);
    }

    /// Draws one full-screen frame with `program`, uploading `uniforms` first.
    fn draw(&mut self, program: &Self::Program, uniforms: &[u8]) -> Result<(), Self::DrawError>;

    /// Reacts to a viewport change.
    fn resize(&mut self, _width: u32, _height: u32) {}
}

/// Program built by [`HeadlessBackend`].
#[derive(Debug)]
pub struct HeadlessProgram {
    id: u64,
    stages: LinkedStages,
}

impl HeadlessProgram {
    /// Identity of the handle; unique per successful build.
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn stages(&self) -> &LinkedStages {
        &self.stages
    }
}

/// A frame recorded by [`HeadlessBackend::draw`].
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedDraw {
    pub program: u64,
    pub uniforms: Vec<u8>,
}

/// Windowless backend: naga compiles and validates, draws are recorded.
///
/// Used by the `check` subcommand and throughout the session tests.
#[derive(Debug, Default)]
pub struct HeadlessBackend {
    next_id: u64,
    builds: usize,
    released: Vec<u64>,
    draws: Vec<RecordedDraw>,
    viewport: Option<(u32, u32)>,
}

impl HeadlessBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of build attempts, successful or not.
    pub fn builds(&self) -> usize {
        self.builds
    }

    /// Ids of released programs, in release order.
    pub fn released(&self) -> &[u64] {
        &self.released
    }

    pub fn draws(&self) -> &[RecordedDraw] {
        &self.draws
    }

    pub fn last_draw(&self) -> Option<&RecordedDraw> {
        self.draws.last()
    }

    pub fn viewport(&self) -> Option<(u32, u32)> {
        self.viewport
    }
}

impl ShaderBackend for HeadlessBackend {
    type Program = HeadlessProgram;
    type DrawError = std::convert::Infallible;

    fn build(&mut self, vertex: &str, fragment: &str) -> Result<HeadlessProgram, ShaderError> {
        self.builds += 1;
        let stages = build_stages(vertex, fragment)?;
        self.next_id += 1;
        Ok(HeadlessProgram {
            id: self.next_id,
            stages,
        })
    }

    fn resolve_uniforms(&self, program: &HeadlessProgram, generation: u64) -> UniformLocations {
        reflect_uniforms(&program.stages.fragment.module)
            .map(|layout| UniformLocations::from_layout(generation, &layout))
            .unwrap_or_else(|| UniformLocations::new(generation, 0, Default::default()))
    }

    fn release(&mut self, program: HeadlessProgram) {
        self.released.push(program.id);
    }

    fn draw(&mut self, program: &HeadlessProgram, uniforms: &[u8]) -> Result<(), Self::DrawError> {
        self.draws.push(RecordedDraw {
            program: program.id,
            uniforms: uniforms.to_vec(),
        });
        Ok(())
    }

    fn resize(&mut self, width: u32, height: u32) {
        self.viewport = Some((width, height));
    }
}
