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

//! The transmission gate: the only path that writes to the DMX sink.

use std::sync::Arc;

use parking_lot::{Mutex, MutexGuard};
use tracing::error;

use super::dimmer::GlobalDimmer;
use super::Sink;
use crate::config::RigSource;
use crate::lighting::frame::ensure_len;

/// The last frames handed to the gate and actually sent.
#[derive(Default)]
struct Frames {
    /// The last undimmed frame. Transitions start from here.
    base: Option<Vec<u8>>,
    /// The last dimmed frame that was sent.
    current: Option<Vec<u8>>,
}

/// Serializes every frame sent to the sink. Holds the base and current frames and layers the
/// global dimmer over every frame on its way out.
pub struct Gate {
    /// The transmission lock. Whoever holds it may send.
    sink: Mutex<Box<dyn Sink>>,
    /// Guards the frame state. Only ever taken while already holding the sink, or alone.
    frames: Mutex<Frames>,
    dimmer: GlobalDimmer,
    rig: Arc<dyn RigSource>,
}

impl Gate {
    /// Creates a new gate.
    pub fn new(sink: Box<dyn Sink>, dimmer: GlobalDimmer, rig: Arc<dyn RigSource>) -> Gate {
        Gate {
            sink: Mutex::new(sink),
            frames: Mutex::new(Frames::default()),
            dimmer,
            rig,
        }
    }

    /// Acquires the transmission lock. Frames sent through the returned transmitter are
    /// never interleaved with frames from anyone else.
    pub fn lock(&self) -> Transmitter<'_> {
        Transmitter {
            gate: self,
            sink: self.sink.lock(),
        }
    }

    /// Sends a single frame.
    pub fn send(&self, universe: u32, base: &[u8]) {
        self.lock().send(universe, base);
    }

    /// Gets the global dimmer.
    pub fn dimmer(&self) -> &GlobalDimmer {
        &self.dimmer
    }

    /// A copy of the base frame, resized to the given length.
    pub fn base_frame(&self, len: usize) -> Vec<u8> {
        ensure_len(self.frames.lock().base.as_deref().unwrap_or_default(), len)
    }

    /// A copy of the last sent frame, resized to the given length.
    pub fn current_frame(&self, len: usize) -> Vec<u8> {
        ensure_len(self.frames.lock().current.as_deref().unwrap_or_default(), len)
    }

    /// Returns true if a base frame has ever been committed.
    pub fn has_base_frame(&self) -> bool {
        self.frames.lock().base.is_some()
    }
}

/// Proof that the transmission lock is held.
pub struct Transmitter<'a> {
    gate: &'a Gate,
    sink: MutexGuard<'a, Box<dyn Sink>>,
}

impl Transmitter<'_> {
    /// Commits the base frame, then sends a dimmed copy of it. Sink failures are logged and
    /// swallowed; the base frame stays committed either way.
    pub fn send(&mut self, universe: u32, base: &[u8]) {
        self.gate.frames.lock().base = Some(base.to_vec());

        let rig = self.gate.rig.snapshot();
        let dimmed = self.gate.dimmer.apply(base, rig.fixtures());

        if let Err(e) = self.sink.send_dmx(universe, &dimmed) {
            error!(universe, err = e.to_string(), "Error sending DMX frame.");
        }

        self.gate.frames.lock().current = Some(dimmed);
    }
}
