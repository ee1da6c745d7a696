use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use gridconfig::SeedSetting;

#[derive(Parser, Debug)]
#[command(
    name = "shadergrid",
    author,
    version,
    about = "Live-reloading grid shader lab",
    arg_required_else_help = false
)]
pub struct Cli {
    #[command(flatten)]
    pub run: RunArgs,
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Args, Debug, Default, Clone)]
pub struct RunArgs {
    /// GLSL file holding the `mainImage` body (defaults to `src/user_shader.glsl` beside the executable).
    #[arg(value_name = "SHADER")]
    pub shader: Option<PathBuf>,

    /// Configuration file to load instead of `shadergrid.toml` in the config directory.
    #[arg(long, value_name = "FILE", global = true)]
    pub config: Option<PathBuf>,

    /// Initial grid dimensions (e.g. `4x3`).
    #[arg(long, value_name = "COLSxROWS", value_parser = parse_grid)]
    pub grid: Option<(u32, u32)>,

    /// Window size in physical pixels (e.g. `1280x720`).
    #[arg(long, value_name = "WIDTHxHEIGHT", value_parser = parse_surface_size)]
    pub size: Option<(u32, u32)>,

    /// Value of `iSeed`: an integer, or `random` for a per-process seed.
    #[arg(long, value_name = "N|random", value_parser = gridconfig::parse_seed)]
    pub seed: Option<SeedSetting>,

    /// How often the shader file stamp is checked (e.g. `100ms`, `0.25`).
    #[arg(long, value_name = "DURATION", value_parser = parse_poll_interval)]
    pub poll_interval: Option<Duration>,

    /// Watch the shader directory from a background poll watcher.
    #[arg(long)]
    pub threaded_watch: bool,

    /// Present without waiting for vertical blank.
    #[arg(long)]
    pub no_vsync: bool,

    /// Write the composed fragment source to PATH on every build.
    #[arg(long, value_name = "PATH")]
    pub dump_composed: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Compose and compile a shader without opening a window.
    Check(ShaderTarget),
    /// Print the composed fragment source to stdout.
    Compose(ShaderTarget),
    /// Print the resolved configuration file and shader paths.
    Where,
}

#[derive(Args, Debug)]
pub struct ShaderTarget {
    /// Shader body to use instead of the configured one.
    #[arg(value_name = "SHADER")]
    pub shader: Option<PathBuf>,
}

pub fn parse() -> Cli {
    Cli::parse()
}

fn parse_pair(spec: &str, what: &str, example: &str) -> Result<(u32, u32), String> {
    let trimmed = spec.trim();
    let (first, second) = trimmed
        .split_once(['x', 'X', '×'])
        .ok_or_else(|| format!("expected {what} in AxB format, e.g. {example}"))?;

    let first: u32 = first
        .trim()
        .parse()
        .map_err(|_| format!("invalid number '{}' in {what}", first.trim()))?;
    let second: u32 = second
        .trim()
        .parse()
        .map_err(|_| format!("invalid number '{}' in {what}", second.trim()))?;

    if first == 0 || second == 0 {
        return Err(format!("{what} must be greater than zero in both dimensions"));
    }

    Ok((first, second))
}

pub fn parse_grid(spec: &str) -> Result<(u32, u32), String> {
    parse_pair(spec, "grid", "4x3")
}

pub fn parse_surface_size(spec: &str) -> Result<(u32, u32), String> {
    parse_pair(spec, "window size", "1280x720")
}

/// Accepts humantime strings (`100ms`, `1s`) or bare seconds (`0.25`).
pub fn parse_poll_interval(value: &str) -> Result<Duration, String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err("poll interval must not be empty".to_string());
    }

    let interval = match trimmed.parse::<f64>() {
        Ok(seconds) if seconds.is_finite() && seconds >= 0.0 => Duration::from_secs_f64(seconds),
        Ok(_) => return Err(format!("invalid poll interval '{trimmed}'")),
        Err(_) => humantime::parse_duration(trimmed)
            .map_err(|err| format!("invalid poll interval '{trimmed}': {err}"))?,
    };

    if interval.is_zero() {
        return Err("poll interval must be greater than zero".to_string());
    }
    Ok(interval)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grid_accepts_common_separators() {
        assert_eq!(parse_grid("4x3").unwrap(), (4, 3));
        assert_eq!(parse_grid(" 8X2 ").unwrap(), (8, 2));
        assert_eq!(parse_grid("16×9").unwrap(), (16, 9));
    }

    #[test]
    fn grid_rejects_zero_and_garbage() {
        assert!(parse_grid("0x3").is_err());
        assert!(parse_grid("4").is_err());
        assert!(parse_grid("axb").is_err());
    }

    #[test]
    fn surface_size_parses() {
        assert_eq!(parse_surface_size("1280x720").unwrap(), (1280, 720));
        assert!(parse_surface_size("1280x0").is_err());
    }

    #[test]
    fn poll_interval_accepts_seconds_and_humantime() {
        assert_eq!(parse_poll_interval("100ms").unwrap(), Duration::from_millis(100));
        assert_eq!(parse_poll_interval("0.25").unwrap(), Duration::from_millis(250));
        assert_eq!(parse_poll_interval("2s").unwrap(), Duration::from_secs(2));
        assert!(parse_poll_interval("0").is_err());
        assert!(parse_poll_interval("-1").is_err());
        assert!(parse_poll_interval("soon").is_err());
    }

    #[test]
    fn parses_run_flags() {
        let cli = Cli::try_parse_from([
            "shadergrid",
            "tiles.glsl",
            "--grid",
            "6x2",
            "--seed",
            "random",
            "--threaded-watch",
            "--no-vsync",
        ])
        .unwrap();
        assert!(cli.command.is_none());
        assert_eq!(cli.run.shader, Some(PathBuf::from("tiles.glsl")));
        assert_eq!(cli.run.grid, Some((6, 2)));
        assert_eq!(cli.run.seed, Some(SeedSetting::Random));
        assert!(cli.run.threaded_watch);
        assert!(cli.run.no_vsync);
    }

    #[test]
    fn parses_check_subcommand() {
        let cli = Cli::try_parse_from(["shadergrid", "check", "broken.glsl"]).unwrap();
        match cli.command {
            Some(Command::Check(target)) => {
                assert_eq!(target.shader, Some(PathBuf::from("broken.glsl")))
            }
            other => panic!("unexpected command {other:?}"),
        }
    }
}
