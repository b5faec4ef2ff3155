// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use duration_string::DurationString;
use parking_lot::RwLock;
use tracing::warn;

pub mod error;
pub mod rig;
pub mod scene;

pub use self::error::ConfigError;
pub use self::rig::{Button, Defaults, Fixture, Mode, Rig, Role};
pub use self::scene::{Attrs, Color, Rgb, Scene, Step, StepPayload};

/// Provides a fresh, immutable snapshot of the rig for each operation. Edits made
/// after a snapshot is taken don't affect operations that are already running.
pub trait RigSource: Send + Sync {
    /// Returns the current rig. Never fails; sources fall back to an empty rig.
    fn snapshot(&self) -> Rig;
}

/// A rig source that re-reads a file on every snapshot.
pub struct FileRigSource {
    path: PathBuf,
}

impl FileRigSource {
    /// Creates a new file rig source.
    pub fn new(path: &Path) -> FileRigSource {
        FileRigSource {
            path: path.to_path_buf(),
        }
    }

    /// Gets the path of the rig file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl RigSource for FileRigSource {
    fn snapshot(&self) -> Rig {
        match Rig::load(&self.path) {
            Ok(rig) => rig,
            Err(e) => {
                warn!(
                    path = self.path.display().to_string(),
                    err = e.to_string(),
                    "Unable to load rig, using an empty one."
                );
                Rig::default()
            }
        }
    }
}

/// A rig source backed by an in-memory rig that can be replaced at any time.
#[derive(Clone, Default)]
pub struct StaticRigSource {
    rig: Arc<RwLock<Rig>>,
}

impl StaticRigSource {
    /// Creates a new static rig source.
    pub fn new(rig: Rig) -> StaticRigSource {
        StaticRigSource {
            rig: Arc::new(RwLock::new(rig)),
        }
    }

    /// Replaces the rig.
    pub fn replace(&self, rig: Rig) {
        *self.rig.write() = rig;
    }
}

impl RigSource for StaticRigSource {
    fn snapshot(&self) -> Rig {
        self.rig.read().clone()
    }
}

/// Parses a duration such as `500ms` or `2s`. A bare number is taken as milliseconds.
pub fn parse_duration(value: &str) -> Result<Duration, duration_string::Error> {
    if let Ok(millis) = value.parse::<u64>() {
        return Ok(Duration::from_millis(millis));
    }
    Ok(DurationString::from_string(value.to_string())?.into())
}
