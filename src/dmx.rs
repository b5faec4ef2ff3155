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
use std::fmt;

use tracing::debug;

pub mod dimmer;
pub mod gate;
mod ola_client;

pub use self::dimmer::{DimmerStore, FileDimmerStore, GlobalDimmer, MemoryDimmerStore};
pub use self::gate::{Gate, Transmitter};
pub use self::ola_client::OlaSink;

/// A DMX universe is 512 channels.
pub const UNIVERSE_SIZE: usize = 512;

/// Errors reported by a DMX sink.
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("Unable to connect to DMX sink: {0}")]
    Connect(String),

    #[error("Unable to send DMX frame: {0}")]
    Send(String),
}

/// Physically transmits channel buffers to a universe.
pub trait Sink: Send {
    /// Sends the buffer to the given universe.
    fn send_dmx(&mut self, universe: u32, buffer: &[u8]) -> Result<(), SinkError>;
}

/// A sink that only logs what it would have sent.
#[derive(Default)]
pub struct LogSink {}

impl LogSink {
    pub fn new() -> LogSink {
        LogSink {}
    }
}

impl Sink for LogSink {
    fn send_dmx(&mut self, universe: u32, buffer: &[u8]) -> Result<(), SinkError> {
        debug!(universe, frame = %FrameDisplay(buffer), "DMX frame");
        Ok(())
    }
}

/// Formats a channel buffer as a compact list of values.
pub struct FrameDisplay<'a>(pub &'a [u8]);

impl fmt::Display for FrameDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, value) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, " ")?;
            }
            write!(f, "{}", value)?;
        }
        write!(f, "]")
    }
}

/// Gets a sink: OLA if available, or a log-only sink for dry runs.
pub fn get_sink(dry_run: bool, ola_port: Option<u16>) -> Result<Box<dyn Sink>, SinkError> {
    if dry_run {
        return Ok(Box::new(LogSink::new()));
    }
    Ok(Box::new(OlaSink::connect(ola_port)?))
}
