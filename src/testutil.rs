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

//! Test helpers shared across modules.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::dmx::{Sink, SinkError};

pub mod polling;

pub use self::polling::eventually;

/// A sink that records every frame it is handed.
#[derive(Clone, Default)]
pub struct RecordingSink {
    frames: Arc<Mutex<Vec<(u32, Vec<u8>)>>>,
    attempts: Arc<Mutex<usize>>,
    should_fail: bool,
}

impl RecordingSink {
    /// Creates a new recording sink.
    pub fn new() -> RecordingSink {
        RecordingSink::default()
    }

    /// Creates a sink that fails every send without recording it.
    pub fn failing() -> RecordingSink {
        RecordingSink {
            should_fail: true,
            ..Default::default()
        }
    }

    /// Every (universe, frame) pair sent so far.
    pub fn frames(&self) -> Vec<(u32, Vec<u8>)> {
        self.frames.lock().clone()
    }

    /// Every frame sent so far, without the universe.
    pub fn buffers(&self) -> Vec<Vec<u8>> {
        self.frames
            .lock()
            .iter()
            .map(|(_, buffer)| buffer.clone())
            .collect()
    }

    /// The number of frames recorded.
    pub fn count(&self) -> usize {
        self.frames.lock().len()
    }

    /// The last frame recorded.
    pub fn last(&self) -> Option<Vec<u8>> {
        self.frames.lock().last().map(|(_, buffer)| buffer.clone())
    }

    /// The number of sends attempted, including failed ones.
    pub fn attempts(&self) -> usize {
        *self.attempts.lock()
    }
}

impl Sink for RecordingSink {
    fn send_dmx(&mut self, universe: u32, buffer: &[u8]) -> Result<(), SinkError> {
        *self.attempts.lock() += 1;
        if self.should_fail {
            return Err(SinkError::Send("recording sink failure".to_string()));
        }
        self.frames.lock().push((universe, buffer.to_vec()));
        Ok(())
    }
}
