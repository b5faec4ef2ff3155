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

//! An OLA-backed DMX sink.

use std::net::TcpStream;
use std::thread;
use std::time::Duration;

use ola::{client::StreamingClientConfig, DmxBuffer, StreamingClient};
use tracing::{debug, info};

use super::{Sink, SinkError, UNIVERSE_SIZE};

/// The number of times we try to reach OLA before giving up.
const CONNECT_ATTEMPTS: u32 = 10;

/// How long to wait between connection attempts.
const CONNECT_RETRY_DELAY: Duration = Duration::from_secs(5);

/// Sends DMX frames to the Open Lighting Architecture daemon.
pub struct OlaSink {
    client: StreamingClient<TcpStream>,
    buffer: DmxBuffer,
}

impl OlaSink {
    /// Connects to OLA, retrying a few times so that we can start before the daemon does.
    pub fn connect(port: Option<u16>) -> Result<OlaSink, SinkError> {
        let mut config = StreamingClientConfig::default();
        if let Some(port) = port {
            config.server_port = port;
        }

        for i in 0..CONNECT_ATTEMPTS {
            // Don't sleep on the first iteration.
            if i > 0 {
                thread::sleep(CONNECT_RETRY_DELAY);
            }

            match ola::connect_with_config(config.clone()) {
                Ok(client) => {
                    info!("Connected to OLA.");
                    return Ok(OlaSink {
                        client,
                        buffer: DmxBuffer::new(),
                    });
                }
                Err(e) => debug!(
                    err = e.to_string(),
                    "Error connecting to OLA, waiting {} seconds and trying again.",
                    CONNECT_RETRY_DELAY.as_secs()
                ),
            }
        }

        Err(SinkError::Connect("unable to connect to OLA".to_string()))
    }
}

impl Sink for OlaSink {
    fn send_dmx(&mut self, universe: u32, buffer: &[u8]) -> Result<(), SinkError> {
        for channel in 0..UNIVERSE_SIZE {
            // Channels past the frame are zeroed so a shrunken rig doesn't leave stale values.
            self.buffer
                .set_channel(channel, buffer.get(channel).copied().unwrap_or(0));
        }

        self.client
            .send_dmx(universe, &self.buffer)
            .map_err(|e| SinkError::Send(e.to_string()))
    }
}
