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

//! The sequence runner: loops a list of steps until cancelled.

use std::time::Duration;

use tracing::{debug, info, span, Level};

use super::fade::{frame_at, step_delay, steps_for};
use super::frame::SequenceFrame;
use crate::dmx::Gate;
use crate::playsync::CancelHandle;

/// Runs the sequence until the cancel handle is cancelled. The first step is sent right away;
/// after that, each step is held, then the next step is crossfaded in (or sent directly if
/// it has no crossfade). The sequence wraps around and never ends on its own.
pub fn run(gate: &Gate, universe: u32, frames: Vec<SequenceFrame>, cancel_handle: &CancelHandle) {
    let span = span!(Level::INFO, "sequence");
    let _enter = span.enter();

    if frames.is_empty() {
        debug!("Sequence has no steps.");
        return;
    }

    let len = frames
        .iter()
        .map(|step| step.frame.len())
        .max()
        .unwrap_or(0);
    let frames: Vec<SequenceFrame> = frames
        .into_iter()
        .map(|mut step| {
            step.frame.resize(len, 0);
            step
        })
        .collect();

    info!(steps = frames.len(), "Starting sequence.");

    if !send_unless_cancelled(gate, universe, &frames[0].frame, cancel_handle) {
        return;
    }

    let mut index = 0;
    while !cancel_handle.is_cancelled() {
        let hold_ms = frames[index].hold_ms;
        if hold_ms > 0 && cancel_handle.wait_timeout(Duration::from_millis(hold_ms)) {
            break;
        }

        index = (index + 1) % frames.len();
        let step = &frames[index];
        let completed = if step.crossfade_ms > 0 {
            crossfade(gate, universe, &step.frame, step.crossfade_ms, cancel_handle)
        } else {
            send_unless_cancelled(gate, universe, &step.frame, cancel_handle)
        };
        if !completed {
            break;
        }
    }

    info!("Sequence stopped.");
}

/// Crossfades from the gate's current base frame to the target. The base frame is used rather
/// than the previous step so that anything sent in the meantime is the fade's true start.
/// Returns false if the fade was cancelled.
fn crossfade(
    gate: &Gate,
    universe: u32,
    target: &[u8],
    duration_ms: u64,
    cancel_handle: &CancelHandle,
) -> bool {
    let steps = steps_for(duration_ms);
    let delay = step_delay(duration_ms, steps);
    let start = gate.base_frame(target.len());

    for step in 1..=steps {
        let frame = frame_at(&start, target, step, steps);
        if !send_unless_cancelled(gate, universe, &frame, cancel_handle) {
            return false;
        }
        if cancel_handle.wait_timeout(delay) {
            return false;
        }
    }
    true
}

/// Sends the frame unless the handle has been cancelled. The check happens while holding the
/// transmission lock. Returns false if cancelled.
fn send_unless_cancelled(
    gate: &Gate,
    universe: u32,
    frame: &[u8],
    cancel_handle: &CancelHandle,
) -> bool {
    let mut transmitter = gate.lock();
    if cancel_handle.is_cancelled() {
        return false;
    }
    transmitter.send(universe, frame);
    true
}
