use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use gridconfig::{GridLabConfig, SeedSetting};
use gridrender::source::read_source;
use gridrender::{check_body, compose, GridConfig, Renderer, RendererConfig, WatchMode};
use tracing_subscriber::EnvFilter;

use crate::cli::RunArgs;
use crate::paths::{default_shader_path, AppPaths};

pub fn initialise_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Effective settings after layering CLI flags over the config file over the
/// built-in defaults.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub shader: PathBuf,
    pub grid: (u32, u32),
    pub size: (u32, u32),
    pub title: String,
    pub seed: SeedSetting,
    pub poll_interval: Duration,
    pub threaded_watch: bool,
    pub vsync: bool,
    pub dump_composed: Option<PathBuf>,
}

impl Settings {
    pub fn resolve(args: &RunArgs, config: &GridLabConfig, default_shader: PathBuf) -> Self {
        Self {
            shader: args
                .shader
                .clone()
                .or_else(|| config.shader.clone())
                .unwrap_or(default_shader),
            grid: args.grid.unwrap_or((config.columns(), config.rows())),
            size: args.size.unwrap_or_else(|| config.window_size()),
            title: config.title().to_string(),
            seed: args.seed.unwrap_or_else(|| config.seed()),
            poll_interval: args.poll_interval.unwrap_or_else(|| config.poll_interval()),
            threaded_watch: args.threaded_watch || config.reload.threaded,
            vsync: !args.no_vsync && config.vsync(),
            dump_composed: args
                .dump_composed
                .clone()
                .or_else(|| config.debug.dump_composed.clone()),
        }
    }

    pub fn renderer_config(&self) -> RendererConfig {
        let seed = match self.seed {
            SeedSetting::Fixed(seed) => seed,
            SeedSetting::Random => rand::random::<i32>(),
        };
        RendererConfig {
            surface_size: self.size,
            title: self.title.clone(),
            shader_source: self.shader.clone(),
            grid: GridConfig::new(self.grid.0, self.grid.1),
            seed,
            poll_interval: self.poll_interval,
            watch_mode: if self.threaded_watch {
                WatchMode::Threaded
            } else {
                WatchMode::Inline
            },
            vsync: self.vsync,
            dump_composed: self.dump_composed.clone(),
        }
    }
}

/// Loads the explicit `--config` file, or the default one when it exists.
fn load_config(args: &RunArgs, paths: &AppPaths) -> Result<(Option<PathBuf>, GridLabConfig)> {
    if let Some(path) = &args.config {
        let config = GridLabConfig::load(path)
            .with_context(|| format!("failed to load config {}", path.display()))?;
        return Ok((Some(path.clone()), config));
    }

    let default_file = paths.config_file();
    if default_file.is_file() {
        let config = GridLabConfig::load(&default_file)
            .with_context(|| format!("failed to load config {}", default_file.display()))?;
        Ok((Some(default_file), config))
    } else {
        Ok((None, GridLabConfig::default()))
    }
}

fn resolve_settings(args: &RunArgs, shader: Option<PathBuf>) -> Result<(Option<PathBuf>, Settings)> {
    let paths = AppPaths::discover()?;
    let (config_file, config) = load_config(args, &paths)?;
    let mut settings = Settings::resolve(args, &config, default_shader_path());
    if let Some(shader) = shader {
        settings.shader = shader;
    }
    Ok((config_file, settings))
}

pub fn run(args: RunArgs) -> Result<()> {
    let (config_file, settings) = resolve_settings(&args, None)?;
    tracing::debug!(config = ?config_file, ?settings, "resolved settings");

    let config = settings.renderer_config();
    tracing::info!(
        shader = %config.shader_source.display(),
        columns = config.grid.columns(),
        rows = config.grid.rows(),
        seed = config.seed,
        "starting shader grid"
    );
    Renderer::new(config).run()
}

fn read_shader(path: &Path) -> Result<String> {
    read_source(path).with_context(|| format!("cannot read shader {}", path.display()))
}

pub fn check(args: &RunArgs, shader: Option<PathBuf>) -> Result<()> {
    let (_, settings) = resolve_settings(args, shader)?;
    let body = read_shader(&settings.shader)?;
    let uniforms = check_body(&body)
        .with_context(|| format!("{} failed to build", settings.shader.display()))?;
    println!(
        "{}: ok ({uniforms} uniforms bound)",
        settings.shader.display()
    );
    Ok(())
}

pub fn print_composed(args: &RunArgs, shader: Option<PathBuf>) -> Result<()> {
    let (_, settings) = resolve_settings(args, shader)?;
    let body = read_shader(&settings.shader)?;
    print!("{}", compose(&body));
    Ok(())
}

pub fn describe_paths(args: &RunArgs) -> Result<()> {
    let paths = AppPaths::discover()?;
    let (config_file, settings) = resolve_settings(args, None)?;
    println!("Configuration:");
    println!("  directory:  {}", paths.config_dir().display());
    match config_file {
        Some(path) => println!("  file:       {}", path.display()),
        None => println!(
            "  file:       {} (not present, using defaults)",
            paths.config_file().display()
        ),
    }
    println!("Shader:");
    println!("  path:       {}", settings.shader.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(toml: &str) -> GridLabConfig {
        GridLabConfig::from_toml_str(toml).unwrap()
    }

    #[test]
    fn defaults_apply_without_flags_or_file() {
        let settings = Settings::resolve(
            &RunArgs::default(),
            &GridLabConfig::default(),
            PathBuf::from("/opt/lab/src/user_shader.glsl"),
        );
        assert_eq!(settings.shader, PathBuf::from("/opt/lab/src/user_shader.glsl"));
        assert_eq!(settings.grid, (4, 3));
        assert_eq!(settings.size, (1280, 720));
        assert_eq!(settings.seed, SeedSetting::Fixed(1337));
        assert_eq!(settings.poll_interval, Duration::from_millis(100));
        assert!(settings.vsync);
        assert!(!settings.threaded_watch);
    }

    #[test]
    fn config_file_overrides_defaults() {
        let file = config(
            r#"
version = 1
shader = "/tmp/tiles.glsl"
seed = 7
[grid]
columns = 9
[reload]
poll_interval = "250ms"
threaded = true
[window]
vsync = false
"#,
        );
        let settings = Settings::resolve(&RunArgs::default(), &file, PathBuf::from("unused"));
        assert_eq!(settings.shader, PathBuf::from("/tmp/tiles.glsl"));
        assert_eq!(settings.grid, (9, 3));
        assert_eq!(settings.seed, SeedSetting::Fixed(7));
        assert_eq!(settings.poll_interval, Duration::from_millis(250));
        assert!(settings.threaded_watch);
        assert!(!settings.vsync);
    }

    #[test]
    fn cli_flags_override_config_file() {
        let file = config("version = 1\nseed = 7\n[grid]\ncolumns = 9\nrows = 9\n");
        let args = RunArgs {
            shader: Some(PathBuf::from("cli.glsl")),
            grid: Some((2, 2)),
            seed: Some(SeedSetting::Fixed(99)),
            no_vsync: true,
            ..RunArgs::default()
        };
        let settings = Settings::resolve(&args, &file, PathBuf::from("unused"));
        assert_eq!(settings.shader, PathBuf::from("cli.glsl"));
        assert_eq!(settings.grid, (2, 2));
        assert_eq!(settings.seed, SeedSetting::Fixed(99));
        assert!(!settings.vsync);
    }

    #[test]
    fn renderer_config_carries_settings() {
        let mut settings = Settings::resolve(
            &RunArgs::default(),
            &GridLabConfig::default(),
            PathBuf::from("shader.glsl"),
        );
        settings.threaded_watch = true;
        let config = settings.renderer_config();
        assert_eq!(config.seed, 1337);
        assert_eq!(config.grid, GridConfig::new(4, 3));
        assert_eq!(config.watch_mode, WatchMode::Threaded);
        assert_eq!(config.title, "Shader Grid Lab");
    }
}
