//! Modification-stamp polling and the reload state machine.
//!
//! ```text
//! Idle ──due / forced──▶ Checking ──unchanged──▶ Idle
//!                            │
//!                  changed / forced
//!                            ▼
//!                       Rebuilding ──ok──▶ Swapped ──next poll──▶ Idle
//!                            └──────err──▶ Failed  ──next poll──▶ Idle
//! ```
//!
//! The document stamp is stored on entering `Rebuilding`, whatever the build
//! outcome, so a broken file is not rebuilt again until it is touched.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use crossbeam_channel::{unbounded, Receiver, Sender};
use notify::{Event, EventKind, PollWatcher, RecursiveMode, Watcher};
use tracing::{debug, warn};

use crate::source::{file_stamp, ShaderDocument, Stamp};
use crate::types::WatchMode;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReloadPhase {
    Idle,
    Checking,
    Rebuilding,
    Swapped,
    Failed,
}

/// Outcome of asking a [`StampSource`] for the current stamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StampObservation {
    /// The stamp as of this sample; `None` when the file cannot be queried.
    Observed(Option<Stamp>),
    /// Nothing new since the previous sample.
    Unchanged,
}

/// Where stamp samples come from.
pub trait StampSource: Send {
    fn sample(&mut self, path: &Path) -> StampObservation;
}

/// Queries file metadata inline; one bounded syscall per check.
#[derive(Debug, Default)]
pub struct PollingStamps;

impl StampSource for PollingStamps {
    fn sample(&mut self, path: &Path) -> StampObservation {
        StampObservation::Observed(file_stamp(path))
    }
}

/// Watches the shader's directory with a [`notify::PollWatcher`] and hands
/// changed stamps over a channel.
///
/// The directory is watched rather than the file so editors that save by
/// renaming a temporary file are still seen. The render thread only drains
/// the channel, so a slow filesystem never stalls a frame.
pub struct WatchedStamps {
    stamps: Receiver<Option<Stamp>>,
    _watcher: PollWatcher,
}

impl WatchedStamps {
    /// Starts watching `path`, reporting any stamp that differs from
    /// `baseline`, the stamp the caller last loaded.
    ///
    /// A change that lands before the watcher's first scan is reported
    /// straight away.
    pub fn spawn(path: PathBuf, baseline: Option<Stamp>, interval: Duration) -> notify::Result<Self> {
        let (stamp_tx, stamp_rx) = unbounded();
        let directory = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let forwarder = StampForwarder {
            path: path.clone(),
            last: baseline,
            stamps: stamp_tx.clone(),
        };
        let mut watcher = PollWatcher::new(
            forwarder,
            notify::Config::default().with_poll_interval(interval),
        )?;
        watcher.watch(&directory, RecursiveMode::NonRecursive)?;
        debug!(path = %path.display(), ?interval, "watching shader directory");

        let current = file_stamp(&path);
        if current != baseline {
            let _ = stamp_tx.send(current);
        }

        Ok(Self {
            stamps: stamp_rx,
            _watcher: watcher,
        })
    }
}

struct StampForwarder {
    path: PathBuf,
    last: Option<Stamp>,
    stamps: Sender<Option<Stamp>>,
}

impl notify::EventHandler for StampForwarder {
    fn handle_event(&mut self, event: notify::Result<Event>) {
        let event = match event {
            Ok(event) => event,
            Err(err) => {
                warn!(%err, "shader watcher error");
                return;
            }
        };
        if !matches!(
            event.kind,
            EventKind::Modify(_) | EventKind::Create(_) | EventKind::Remove(_)
        ) {
            return;
        }
        let file_name = self.path.file_name();
        if !event.paths.iter().any(|path| path.file_name() == file_name) {
            return;
        }

        let stamp = file_stamp(&self.path);
        if stamp != self.last {
            self.last = stamp;
            let _ = self.stamps.send(stamp);
        }
    }
}

impl StampSource for WatchedStamps {
    fn sample(&mut self, _path: &Path) -> StampObservation {
        match self.stamps.try_iter().last() {
            Some(stamp) => StampObservation::Observed(stamp),
            None => StampObservation::Unchanged,
        }
    }
}

impl std::fmt::Debug for WatchedStamps {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatchedStamps").finish_non_exhaustive()
    }
}

/// Builds the stamp source for `mode`, falling back to inline polling when
/// the watcher cannot be started.
pub fn stamp_source(
    mode: WatchMode,
    path: &Path,
    baseline: Option<Stamp>,
    interval: Duration,
) -> Box<dyn StampSource> {
    match mode {
        WatchMode::Inline => Box::new(PollingStamps),
        WatchMode::Threaded => match WatchedStamps::spawn(path.to_path_buf(), baseline, interval) {
            Ok(source) => Box::new(source),
            Err(err) => {
                warn!(%err, "failed to start shader watcher; polling inline");
                Box::new(PollingStamps)
            }
        },
    }
}

/// Decides when the watched document has to be rebuilt.
pub struct HotReloadWatcher {
    poll_interval: Duration,
    last_check: Instant,
    force: bool,
    phase: ReloadPhase,
    stamps: Box<dyn StampSource>,
}

impl HotReloadWatcher {
    pub fn new(poll_interval: Duration, stamps: Box<dyn StampSource>, now: Instant) -> Self {
        Self {
            poll_interval,
            last_check: now,
            force: false,
            phase: ReloadPhase::Idle,
            stamps,
        }
    }

    pub fn phase(&self) -> ReloadPhase {
        self.phase
    }

    /// Requests a rebuild on the next poll, bypassing both the cadence and
    /// the stamp comparison.
    pub fn request_reload(&mut self) {
        self.force = true;
    }

    /// Runs one check and returns `true` when the caller must rebuild.
    ///
    /// On `true` the watcher is in [`ReloadPhase::Rebuilding`] and the
    /// document already carries the stamp observed for this attempt; report
    /// the outcome with [`complete`](Self::complete).
    pub fn poll(&mut self, now: Instant, document: &mut ShaderDocument) -> bool {
        if matches!(self.phase, ReloadPhase::Swapped | ReloadPhase::Failed) {
            self.phase = ReloadPhase::Idle;
        }

        let due = now.saturating_duration_since(self.last_check) >= self.poll_interval;
        if !due && !self.force {
            return false;
        }
        self.phase = ReloadPhase::Checking;
        self.last_check = now;

        if std::mem::take(&mut self.force) {
            let stamp = file_stamp(document.path());
            debug!(path = %document.path().display(), "forced reload");
            document.set_stamp(stamp);
            self.phase = ReloadPhase::Rebuilding;
            return true;
        }

        match self.stamps.sample(document.path()) {
            StampObservation::Observed(Some(stamp)) if Some(stamp) != document.stamp() => {
                debug!(path = %document.path().display(), "shader stamp changed");
                document.set_stamp(Some(stamp));
                self.phase = ReloadPhase::Rebuilding;
                true
            }
            _ => {
                self.phase = ReloadPhase::Idle;
                false
            }
        }
    }

    /// Records the outcome of the rebuild started by the last [`poll`](Self::poll).
    pub fn complete(&mut self, swapped: bool) {
        self.phase = if swapped {
            ReloadPhase::Swapped
        } else {
            ReloadPhase::Failed
        };
    }
}

impl std::fmt::Debug for HotReloadWatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HotReloadWatcher")
            .field("poll_interval", &self.poll_interval)
            .field("phase", &self.phase)
            .field("force", &self.force)
            .finish()
    }
}
