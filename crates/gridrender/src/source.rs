use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use crate::error::ShaderError;

/// Modification stamp of a watched file.
pub type Stamp = SystemTime;

/// The user shader file as last seen by the session.
#[derive(Debug, Clone)]
pub struct ShaderDocument {
    path: PathBuf,
    text: Option<String>,
    stamp: Option<Stamp>,
}

impl ShaderDocument {
    /// Creates a document for `path`, recording its current stamp without
    /// reading the contents.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let stamp = file_stamp(&path);
        Self {
            path,
            text: None,
            stamp,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Text from the last successful read.
    pub fn text(&self) -> Option<&str> {
        self.text.as_deref()
    }

    pub fn stamp(&self) -> Option<Stamp> {
        self.stamp
    }

    pub(crate) fn set_stamp(&mut self, stamp: Option<Stamp>) {
        self.stamp = stamp;
    }

    /// Re-reads the file fully into memory.
    ///
    /// On failure the previously read text is discarded so callers cannot
    /// mistake stale contents for the current file.
    pub fn reload(&mut self) -> Result<&str, ShaderError> {
        match read_source(&self.path) {
            Ok(text) => Ok(self.text.insert(text).as_str()),
            Err(err) => {
                self.text = None;
                Err(err)
            }
        }
    }
}

/// Reads a shader body from disk.
pub fn read_source(path: &Path) -> Result<String, ShaderError> {
    fs::read_to_string(path).map_err(|source| ShaderError::FileUnavailable {
        path: path.to_path_buf(),
        source,
    })
}

/// Last-modified time of `path`, or `None` if it cannot be queried.
pub fn file_stamp(path: &Path) -> Option<Stamp> {
    fs::metadata(path)
        .and_then(|metadata| metadata.modified())
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn reload_reads_whole_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("user_shader.glsl");
        fs::write(&path, "void mainImage() {}\n// tail\n").unwrap();

        let mut document = ShaderDocument::open(&path);
        assert!(document.stamp().is_some());
        assert!(document.text().is_none());
        let text = document.reload().unwrap();
        assert_eq!(text, "void mainImage() {}\n// tail\n");
        assert_eq!(document.text(), Some("void mainImage() {}\n// tail\n"));
    }

    #[test]
    fn missing_file_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.glsl");
        let mut document = ShaderDocument::open(&path);
        assert!(document.stamp().is_none());
        let err = document.reload().unwrap_err();
        assert!(matches!(err, ShaderError::FileUnavailable { ref path, .. } if path.ends_with("absent.glsl")));
    }

    #[test]
    fn failed_reload_drops_stale_text() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("user_shader.glsl");
        fs::write(&path, "first").unwrap();
        let mut document = ShaderDocument::open(&path);
        document.reload().unwrap();
        fs::remove_file(&path).unwrap();
        assert!(document.reload().is_err());
        assert!(document.text().is_none());
    }

    #[test]
    fn stamp_tracks_modification_time() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("user_shader.glsl");
        fs::write(&path, "body").unwrap();
        let target = SystemTime::UNIX_EPOCH + Duration::from_secs(1_700_000_000);
        let file = fs::File::options().write(true).open(&path).unwrap();
        file.set_modified(target).unwrap();
        drop(file);
        assert_eq!(file_stamp(&path), Some(target));
    }
}
