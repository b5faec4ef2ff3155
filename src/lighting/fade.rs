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

//! Linear crossfades between channel buffers.

use std::time::Duration;

/// Duration bands for choosing a step count: (upper bound in ms, divisor, min steps, max steps).
/// Short fades aim for roughly 30-50 frames per second; long fades get more steps rather
/// than a higher rate, bounded at the top.
const BANDS: [(u64, u64, u32, u32); 4] = [
    (100, 20, 2, 5),
    (500, 30, 5, 15),
    (2000, 40, 15, 40),
    (5000, 50, 40, 80),
];

/// The band used for fades of five seconds or longer.
const LONG_BAND: (u64, u32, u32) = (60, 80, 150);

/// The number of intermediate frames to use for a fade of the given length.
pub fn steps_for(duration_ms: u64) -> u32 {
    let (divisor, min, max) = BANDS
        .iter()
        .find(|(upper, _, _, _)| duration_ms < *upper)
        .map(|(_, divisor, min, max)| (*divisor, *min, *max))
        .unwrap_or(LONG_BAND);

    let steps = u32::try_from(duration_ms / divisor).unwrap_or(u32::MAX);
    steps.clamp(min, max)
}

/// The delay between two intermediate frames of a fade.
pub fn step_delay(duration_ms: u64, steps: u32) -> Duration {
    if steps == 0 {
        return Duration::ZERO;
    }
    Duration::from_millis(duration_ms) / steps
}

/// The intermediate frame `step` of `steps` between start and target. The shorter of the two
/// buffers is treated as zero-padded.
pub fn frame_at(start: &[u8], target: &[u8], step: u32, steps: u32) -> Vec<u8> {
    let len = start.len().max(target.len());
    let t = if steps == 0 {
        1.0
    } else {
        f64::from(step) / f64::from(steps)
    };

    (0..len)
        .map(|channel| {
            let from = f64::from(start.get(channel).copied().unwrap_or(0));
            let to = f64::from(target.get(channel).copied().unwrap_or(0));
            (from + (to - from) * t).round().clamp(0.0, 255.0) as u8
        })
        .collect()
}

/// Interpolates from start to target in the given number of steps. The start buffer is never
/// included; the last frame is always exactly the target.
pub fn interpolate(start: &[u8], target: &[u8], steps: u32) -> Vec<Vec<u8>> {
    (1..=steps)
        .map(|step| frame_at(start, target, step, steps))
        .collect()
}
