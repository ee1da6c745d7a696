//! wgpu implementation of [`ShaderBackend`](crate::backend::ShaderBackend).
//!
//! - `context` owns instance, adapter, device and surface wiring and
//!   reconfigures the swapchain on resize.
//! - `backend` turns naga-validated modules into render pipelines, owns one
//!   uniform buffer per program and draws the full-screen triangle.

mod backend;
mod context;

pub use backend::{GpuProgram, WgpuBackend};
