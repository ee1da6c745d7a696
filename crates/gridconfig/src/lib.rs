use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::de::{self, Deserializer};
use serde::Deserialize;

pub const DEFAULT_COLUMNS: u32 = 4;
pub const DEFAULT_ROWS: u32 = 3;
pub const DEFAULT_SEED: i32 = 1337;
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);
pub const DEFAULT_WINDOW_SIZE: (u32, u32) = (1280, 720);
pub const DEFAULT_TITLE: &str = "Shader Grid Lab";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read configuration at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// How the per-process seed uniform is chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeedSetting {
    Fixed(i32),
    Random,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GridLabConfig {
    pub version: u32,
    #[serde(default)]
    pub shader: Option<PathBuf>,
    #[serde(default, deserialize_with = "deserialize_seed_opt")]
    pub seed: Option<SeedSetting>,
    #[serde(default)]
    pub grid: GridSection,
    #[serde(default)]
    pub reload: ReloadSection,
    #[serde(default)]
    pub window: WindowSection,
    #[serde(default)]
    pub debug: DebugSection,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GridSection {
    pub columns: Option<i64>,
    pub rows: Option<i64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReloadSection {
    #[serde(default, deserialize_with = "deserialize_duration_opt")]
    pub poll_interval: Option<Duration>,
    #[serde(default)]
    pub threaded: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WindowSection {
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub title: Option<String>,
    pub vsync: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DebugSection {
    pub dump_composed: Option<PathBuf>,
}

impl Default for GridLabConfig {
    fn default() -> Self {
        Self {
            version: 1,
            shader: None,
            seed: None,
            grid: GridSection::default(),
            reload: ReloadSection::default(),
            window: WindowSection::default(),
            debug: DebugSection::default(),
        }
    }
}

fn deserialize_duration_opt<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
where
    D: Deserializer<'de>,
{
    struct Visitor;
    impl<'de> de::Visitor<'de> for Visitor {
        type Value = Option<Duration>;

        fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
            formatter.write_str("a duration as number of seconds or human-readable string")
        }

        fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            humantime::parse_duration(v)
                .map(Some)
                .map_err(|err| E::custom(format!("invalid duration '{v}': {err}")))
        }

        fn visit_i64<E>(self, v: i64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            if v < 0 {
                return Err(E::custom("duration must be non-negative"));
            }
            Ok(Some(Duration::from_secs(v as u64)))
        }

        fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(Some(Duration::from_secs(v)))
        }

        fn visit_f64<E>(self, v: f64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            if v.is_nan() || v.is_sign_negative() {
                return Err(E::custom("duration must be non-negative"));
            }
            Ok(Some(Duration::from_secs_f64(v)))
        }

        fn visit_none<E>(self) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(None)
        }

        fn visit_unit<E>(self) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(None)
        }
    }

    deserializer.deserialize_any(Visitor)
}

fn deserialize_seed_opt<'de, D>(deserializer: D) -> Result<Option<SeedSetting>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Helper {
        Str(String),
        Num(i64),
    }

    let helper: Option<Helper> = Option::deserialize(deserializer)?;
    match helper {
        None => Ok(None),
        Some(Helper::Str(raw)) => parse_seed(&raw).map(Some).map_err(de::Error::custom),
        Some(Helper::Num(value)) => i32::try_from(value)
            .map(|seed| Some(SeedSetting::Fixed(seed)))
            .map_err(|_| de::Error::custom(format!("seed {value} does not fit in a 32-bit integer"))),
    }
}

/// Parses `random` or a decimal 32-bit integer.
pub fn parse_seed(raw: &str) -> Result<SeedSetting, String> {
    let normalized = raw.trim().to_ascii_lowercase();
    match normalized.as_str() {
        "random" | "rand" => Ok(SeedSetting::Random),
        other => other
            .parse::<i32>()
            .map(SeedSetting::Fixed)
            .map_err(|_| format!("invalid seed '{other}'; expected an integer or 'random'")),
    }
}

impl GridLabConfig {
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        let raw: GridLabConfig = toml::from_str(input)?;
        raw.validate()?;
        Ok(raw)
    }

    /// Reads and validates a config file, resolving a relative `shader`
    /// entry against the file's directory.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config = Self::from_toml_str(&contents)?;
        if let Some(base) = path.parent() {
            config.resolve_relative(base);
        }
        Ok(config)
    }

    pub fn resolve_relative(&mut self, base: &Path) {
        if let Some(shader) = self.shader.as_mut() {
            if shader.is_relative() {
                *shader = base.join(&*shader);
            }
        }
    }

    pub fn columns(&self) -> u32 {
        self.grid
            .columns
            .map(|value| value.clamp(1, i64::from(u32::MAX)) as u32)
            .unwrap_or(DEFAULT_COLUMNS)
    }

    pub fn rows(&self) -> u32 {
        self.grid
            .rows
            .map(|value| value.clamp(1, i64::from(u32::MAX)) as u32)
            .unwrap_or(DEFAULT_ROWS)
    }

    pub fn seed(&self) -> SeedSetting {
        self.seed.unwrap_or(SeedSetting::Fixed(DEFAULT_SEED))
    }

    pub fn poll_interval(&self) -> Duration {
        self.reload.poll_interval.unwrap_or(DEFAULT_POLL_INTERVAL)
    }

    pub fn window_size(&self) -> (u32, u32) {
        (
            self.window.width.unwrap_or(DEFAULT_WINDOW_SIZE.0),
            self.window.height.unwrap_or(DEFAULT_WINDOW_SIZE.1),
        )
    }

    pub fn title(&self) -> &str {
        self.window.title.as_deref().unwrap_or(DEFAULT_TITLE)
    }

    pub fn vsync(&self) -> bool {
        self.window.vsync.unwrap_or(true)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.version != 1 {
            return Err(ConfigError::Invalid(format!(
                "unsupported config version {}; expected 1",
                self.version
            )));
        }

        if let Some(shader) = &self.shader {
            if shader.as_os_str().is_empty() {
                return Err(ConfigError::Invalid("shader path may not be empty".into()));
            }
        }

        for (label, value) in [("columns", self.grid.columns), ("rows", self.grid.rows)] {
            if let Some(value) = value {
                if value < 1 {
                    return Err(ConfigError::Invalid(format!(
                        "grid.{label} must be at least 1 (got {value})"
                    )));
                }
                if value > i64::from(u32::MAX) {
                    return Err(ConfigError::Invalid(format!(
                        "grid.{label} is too large (got {value})"
                    )));
                }
            }
        }

        if let Some(interval) = self.reload.poll_interval {
            if interval.is_zero() {
                return Err(ConfigError::Invalid(
                    "reload.poll_interval must be greater than zero".into(),
                ));
            }
        }

        if self.window.width == Some(0) || self.window.height == Some(0) {
            return Err(ConfigError::Invalid(
                "window dimensions must be greater than zero".into(),
            ));
        }

        Ok(())
    }
}
