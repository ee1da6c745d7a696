use std::fmt;
use std::path::PathBuf;

/// Pipeline stage a compile diagnostic belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Vertex,
    Fragment,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Vertex => f.write_str("vertex"),
            Stage::Fragment => f.write_str("fragment"),
        }
    }
}

/// Every recoverable failure of the live program pipeline.
///
/// None of these terminate a session: an unavailable file is replaced by the
/// built-in body, compile and link failures keep the previous program active,
/// and a missing uniform only skips that one binding.
#[derive(Debug, thiserror::Error)]
pub enum ShaderError {
    #[error("shader source {path} is unavailable: {source}")]
    FileUnavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{stage} shader failed to compile:\n{log}")]
    Compile { stage: Stage, log: String },
    #[error("program failed to link:\n{log}")]
    Link { log: String },
    #[error("uniform `{name}` is not present in the active program")]
    UniformMissing { name: &'static str },
}

impl ShaderError {
    /// Short tag for logs and window titles (`vertex`, `fragment`, `link`, ...).
    pub fn tag(&self) -> &'static str {
        match self {
            ShaderError::FileUnavailable { .. } => "file",
            ShaderError::Compile {
                stage: Stage::Vertex,
                ..
            } => "vertex",
            ShaderError::Compile {
                stage: Stage::Fragment,
                ..
            } => "fragment",
            ShaderError::Link { .. } => "link",
            ShaderError::UniformMissing { .. } => "uniform",
        }
    }

    /// Diagnostic text as reported by the compiler or linker, if any.
    pub fn diagnostic(&self) -> Option<&str> {
        match self {
            ShaderError::Compile { log, .. } | ShaderError::Link { log } => Some(log),
            _ => None,
        }
    }
}

/// The single fatal condition: no program could be built at start-up.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error(
        "no working shader program: requested shader failed ({requested}); built-in shader failed ({fallback})"
    )]
    NoWorkingProgram {
        requested: Box<ShaderError>,
        fallback: Box<ShaderError>,
    },
    #[error("no working shader program: built-in shader failed ({0})")]
    DefaultFailed(Box<ShaderError>),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compile_errors_are_stage_tagged() {
        let err = ShaderError::Compile {
            stage: Stage::Fragment,
            log: "0:3: 'foo' : undeclared identifier".into(),
        };
        assert_eq!(err.tag(), "fragment");
        assert!(err.to_string().starts_with("fragment shader failed to compile"));
        assert_eq!(err.diagnostic(), Some("0:3: 'foo' : undeclared identifier"));
    }

    #[test]
    fn link_errors_carry_their_log() {
        let err = ShaderError::Link {
            log: "location 0 not written".into(),
        };
        assert_eq!(err.tag(), "link");
        assert!(err.to_string().contains("location 0 not written"));
    }
}
