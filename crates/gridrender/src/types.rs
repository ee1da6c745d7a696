use std::path::PathBuf;
use std::time::Duration;

/// Number of grid columns and rows the screen is partitioned into.
///
/// Both axes are clamped to at least one on construction and on every
/// mutation, so shaders never see an empty grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridConfig {
    columns: u32,
    rows: u32,
}

impl GridConfig {
    pub fn new(columns: u32, rows: u32) -> Self {
        Self {
            columns: columns.max(1),
            rows: rows.max(1),
        }
    }

    pub fn columns(&self) -> u32 {
        self.columns
    }

    pub fn rows(&self) -> u32 {
        self.rows
    }

    pub fn grow_columns(&mut self) {
        self.columns = self.columns.saturating_add(1);
    }

    pub fn shrink_columns(&mut self) {
        self.columns = self.columns.saturating_sub(1).max(1);
    }

    pub fn grow_rows(&mut self) {
        self.rows = self.rows.saturating_add(1);
    }

    pub fn shrink_rows(&mut self) {
        self.rows = self.rows.saturating_sub(1).max(1);
    }

    /// Dimensions as signed integers for the `iGrid` uniform.
    pub fn as_ivec2(&self) -> [i32; 2] {
        [
            self.columns.min(i32::MAX as u32) as i32,
            self.rows.min(i32::MAX as u32) as i32,
        ]
    }
}

impl Default for GridConfig {
    fn default() -> Self {
        Self::new(4, 3)
    }
}

/// Selects how the stamp of the watched shader file is sampled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WatchMode {
    /// Query file metadata inline on the render thread.
    #[default]
    Inline,
    /// Watch the shader directory from a background poll watcher that hands
    /// stamps over a channel.
    Threaded,
}

/// Immutable configuration passed to the renderer at start-up.
///
/// `RendererConfig` mirrors the merged CLI flags and config file and tells the
/// renderer which shader file to watch, how large the window should be and how
/// the grid starts out.
#[derive(Debug, Clone)]
pub struct RendererConfig {
    /// Window size in physical pixels.
    pub surface_size: (u32, u32),
    /// Window title.
    pub title: String,
    /// Path of the user shader body that is composed, compiled and watched.
    pub shader_source: PathBuf,
    /// Initial grid dimensions.
    pub grid: GridConfig,
    /// Seed exposed as `iSeed`; fixed for the lifetime of the process.
    pub seed: i32,
    /// Cadence at which the shader file stamp is checked.
    pub poll_interval: Duration,
    /// Where stamp checks run.
    pub watch_mode: WatchMode,
    /// Present with vsync (Fifo) when true.
    pub vsync: bool,
    /// Optional path the composed fragment source is written to on each build.
    pub dump_composed: Option<PathBuf>,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            surface_size: (1280, 720),
            title: "Shader Grid Lab".to_string(),
            shader_source: PathBuf::new(),
            grid: GridConfig::default(),
            seed: 1337,
            poll_interval: Duration::from_millis(100),
            watch_mode: WatchMode::default(),
            vsync: true,
            dump_composed: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grid_axes_never_drop_below_one() {
        let mut grid = GridConfig::new(0, 0);
        assert_eq!((grid.columns(), grid.rows()), (1, 1));
        grid.shrink_columns();
        grid.shrink_rows();
        assert_eq!((grid.columns(), grid.rows()), (1, 1));
        grid.grow_columns();
        grid.grow_rows();
        grid.grow_rows();
        assert_eq!((grid.columns(), grid.rows()), (2, 3));
    }

    #[test]
    fn grid_ivec2_saturates() {
        let grid = GridConfig::new(u32::MAX, 7);
        assert_eq!(grid.as_ivec2(), [i32::MAX, 7]);
    }
}
