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

//! The global dimmer: a persisted percentage layered on top of every transmitted frame.

use std::fs;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::{Fixture, Role};
use crate::lighting::mapper::channel_of;

/// The level used when nothing has been persisted.
pub const DEFAULT_LEVEL: u8 = 100;

/// The highest dimmer level.
pub const MAX_LEVEL: u8 = 100;

/// Persists the dimmer level across restarts. Persistence is best effort.
pub trait DimmerStore: Send + Sync {
    /// Loads the last saved level, or the default level if there isn't one.
    fn load(&self) -> u8;

    /// Saves the level. Failures are logged and otherwise ignored.
    fn save(&self, level: u8);
}

#[derive(Serialize, Deserialize)]
struct DimmerState {
    level: i64,
}

/// Stores the dimmer level as a small JSON document.
pub struct FileDimmerStore {
    path: PathBuf,
}

impl FileDimmerStore {
    /// Creates a new file dimmer store.
    pub fn new(path: &Path) -> FileDimmerStore {
        FileDimmerStore {
            path: path.to_path_buf(),
        }
    }
}

impl DimmerStore for FileDimmerStore {
    fn load(&self) -> u8 {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) => {
                debug!(
                    path = self.path.display().to_string(),
                    err = e.to_string(),
                    "No dimmer state, using the default level."
                );
                return DEFAULT_LEVEL;
            }
        };

        match serde_json::from_str::<DimmerState>(&contents) {
            Ok(state) => clamp_level(state.level),
            Err(e) => {
                warn!(
                    path = self.path.display().to_string(),
                    err = e.to_string(),
                    "Unable to parse dimmer state, using the default level."
                );
                DEFAULT_LEVEL
            }
        }
    }

    fn save(&self, level: u8) {
        let state = DimmerState {
            level: i64::from(level),
        };
        let result = serde_json::to_string(&state)
            .map_err(|e| e.to_string())
            .and_then(|json| fs::write(&self.path, json).map_err(|e| e.to_string()));
        if let Err(err) = result {
            warn!(
                path = self.path.display().to_string(),
                err, "Unable to persist dimmer level."
            );
        }
    }
}

/// Keeps the dimmer level in memory only.
#[derive(Default)]
pub struct MemoryDimmerStore {
    level: Mutex<Option<u8>>,
}

impl MemoryDimmerStore {
    /// Creates a new memory dimmer store.
    pub fn new() -> MemoryDimmerStore {
        MemoryDimmerStore::default()
    }

    /// Creates a memory dimmer store that starts at the given level.
    pub fn with_level(level: u8) -> MemoryDimmerStore {
        MemoryDimmerStore {
            level: Mutex::new(Some(level)),
        }
    }
}

impl DimmerStore for MemoryDimmerStore {
    fn load(&self) -> u8 {
        (*self.level.lock()).unwrap_or(DEFAULT_LEVEL)
    }

    fn save(&self, level: u8) {
        *self.level.lock() = Some(level);
    }
}

fn clamp_level(level: i64) -> u8 {
    level.clamp(0, i64::from(MAX_LEVEL)) as u8
}

/// The global dimmer level and where it is persisted.
pub struct GlobalDimmer {
    level: Mutex<u8>,
    store: Box<dyn DimmerStore>,
}

impl GlobalDimmer {
    /// Creates a new global dimmer, starting at the persisted level.
    pub fn new(store: Box<dyn DimmerStore>) -> GlobalDimmer {
        let level = store.load().min(MAX_LEVEL);
        info!(level, "Global dimmer loaded.");
        GlobalDimmer {
            level: Mutex::new(level),
            store,
        }
    }

    /// Gets the current level in percent.
    pub fn level(&self) -> u8 {
        *self.level.lock()
    }

    /// Sets the level, clamped to [0, 100], and persists it. Returns the new level.
    pub fn set(&self, percent: i64) -> u8 {
        let mut level = self.level.lock();
        *level = clamp_level(percent);
        self.store.save(*level);
        debug!(level = *level, "Global dimmer set.");
        *level
    }

    /// Moves the level by the given delta. Returns the new level.
    pub fn step(&self, delta: i64) -> u8 {
        let mut level = self.level.lock();
        *level = clamp_level(i64::from(*level).saturating_add(delta));
        self.store.save(*level);
        debug!(level = *level, delta, "Global dimmer stepped.");
        *level
    }

    /// Applies the current level to a copy of the buffer.
    pub fn apply(&self, buffer: &[u8], fixtures: &[Fixture]) -> Vec<u8> {
        apply(buffer, fixtures, self.level())
    }
}

/// Scales value by percent / 100, rounding half up.
fn scale(value: u8, percent: u8) -> u8 {
    ((u32::from(value) * u32::from(percent) + 50) / 100) as u8
}

/// Applies a dimmer level to a copy of the buffer. Fixtures with a DIM or amber channel have
/// that channel set to the level directly; other fixtures have their color channels scaled.
pub fn apply(buffer: &[u8], fixtures: &[Fixture], percent: u8) -> Vec<u8> {
    let mut out = buffer.to_vec();
    let percent = percent.min(MAX_LEVEL);
    if percent == MAX_LEVEL {
        return out;
    }

    for fixture in fixtures {
        let dimmer_channels: Vec<usize> = [Role::Dimmer, Role::Amber]
            .iter()
            .filter_map(|role| channel_of(fixture, role))
            .collect();

        if !dimmer_channels.is_empty() {
            for channel in dimmer_channels {
                if let Some(value) = out.get_mut(channel) {
                    *value = scale(u8::MAX, percent);
                }
            }
            continue;
        }

        // Only the first four channels carry color.
        let start = fixture.start_index();
        for channel in start..start + fixture.span().min(4) {
            if let Some(value) = out.get_mut(channel) {
                *value = scale(*value, percent);
            }
        }
    }

    out
}
