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
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{debug, info, span, Level};

use super::animator::Animator;
use super::fade::{frame_at, step_delay, steps_for};
use super::frame::{build, build_sequence, frame_len};
use super::sequence;
use crate::config::{Rig, RigSource, Scene};
use crate::dmx::{DimmerStore, Gate, GlobalDimmer, Sink};

/// Errors caused by bad caller input. These are raised before anything is stopped or sent.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum EngineError {
    #[error("No button with index {0}")]
    UnknownButton(u32),
}

/// What a trigger ended up doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// A frame (or a fade to it) was sent.
    Sent,
    /// A sequence was started with the given animation id.
    Animating(u64),
    /// The scene was a sequence without any steps, so nothing happened.
    Empty,
}

/// The lighting engine. Owns the transmission gate and the animation supervisor, and takes a
/// fresh snapshot of the rig for every operation.
pub struct Engine {
    rig: Arc<dyn RigSource>,
    gate: Arc<Gate>,
    animator: Arc<Animator>,
    /// Held from stopping the old animation until the new one is sent or started, so a later
    /// request always lands after an earlier one. Never taken while holding the gate.
    operation: Mutex<()>,
}

impl Engine {
    /// Creates a new engine.
    pub fn new(
        rig: Arc<dyn RigSource>,
        sink: Box<dyn Sink>,
        dimmer_store: Box<dyn DimmerStore>,
    ) -> Engine {
        let dimmer = GlobalDimmer::new(dimmer_store);
        Engine {
            gate: Arc::new(Gate::new(sink, dimmer, rig.clone())),
            rig,
            animator: Arc::new(Animator::new()),
            operation: Mutex::new(()),
        }
    }

    /// Takes a snapshot of the rig.
    pub fn rig(&self) -> Rig {
        self.rig.snapshot()
    }

    /// Fires the scene of the button with the given index, fading to it over the given
    /// duration. Any running sequence is stopped first.
    pub fn trigger(&self, index: u32, fade: Duration) -> Result<Outcome, EngineError> {
        let span = span!(Level::INFO, "trigger");
        let _enter = span.enter();

        let rig = self.rig.snapshot();
        let button = rig
            .button(index)
            .ok_or(EngineError::UnknownButton(index))?;

        info!(
            index,
            label = %button.label(),
            scene = button.scene().kind(),
            fade_ms = fade.as_millis() as u64,
            "Triggering button."
        );
        Ok(self.play(&rig, button.scene(), fade))
    }

    /// Plays a scene that isn't attached to a button. Sequences start on their first step
    /// without a fade and are stopped automatically after the given duration unless something
    /// else has replaced them by then.
    pub fn play_scene(&self, scene: &Scene, fade: Duration, duration: Duration) -> Outcome {
        let rig = self.rig.snapshot();
        info!(scene = scene.kind(), "Playing scene.");

        let fade = match scene {
            Scene::Sequence { .. } => Duration::ZERO,
            _ => fade,
        };
        let outcome = self.play(&rig, scene, fade);
        if let Outcome::Animating(id) = outcome {
            if let Some(cancel_handle) = self.animator.cancel_handle(id) {
                let animator = self.animator.clone();
                thread::spawn(move || {
                    // Returns early if the sequence was stopped some other way.
                    if !cancel_handle.wait_timeout(duration) {
                        debug!(id, "Scene duration elapsed, stopping sequence.");
                        animator.stop_if(id);
                    }
                });
            }
        }
        outcome
    }

    /// Stops any running sequence and sends an all-zero frame.
    pub fn blackout(&self) {
        let _operation = self.operation.lock();
        self.animator.stop();
        let rig = self.rig.snapshot();
        info!("Blackout.");
        self.gate
            .send(rig.universe(), &vec![0; frame_len(rig.fixtures())]);
    }

    /// Stops any running sequence, leaving the last frame in place.
    pub fn stop(&self) -> bool {
        let _operation = self.operation.lock();
        self.animator.stop()
    }

    /// Returns true if a sequence is running.
    pub fn is_animating(&self) -> bool {
        self.animator.is_active()
    }

    /// Gets the global dimmer level.
    pub fn dimmer(&self) -> u8 {
        self.gate.dimmer().level()
    }

    /// Sets the global dimmer level and re-sends the base frame at the new level.
    pub fn set_dimmer(&self, percent: i64) -> u8 {
        let level = self.gate.dimmer().set(percent);
        info!(level, "Global dimmer changed.");
        self.resend();
        level
    }

    /// Moves the global dimmer level and re-sends the base frame at the new level.
    pub fn step_dimmer(&self, delta: i64) -> u8 {
        let level = self.gate.dimmer().step(delta);
        info!(level, "Global dimmer changed.");
        self.resend();
        level
    }

    /// The last undimmed frame, sized to the current rig.
    pub fn base_frame(&self) -> Vec<u8> {
        self.gate.base_frame(frame_len(self.rig.snapshot().fixtures()))
    }

    /// The last frame sent, sized to the current rig.
    pub fn current_frame(&self) -> Vec<u8> {
        self.gate
            .current_frame(frame_len(self.rig.snapshot().fixtures()))
    }

    fn play(&self, rig: &Rig, scene: &Scene, fade: Duration) -> Outcome {
        let _operation = self.operation.lock();
        self.animator.stop();

        let universe = rig.universe();
        match scene {
            Scene::Sequence {
                steps,
                hold_ms,
                crossfade_ms,
            } => {
                let frames =
                    build_sequence(rig.fixtures(), steps, *hold_ms, *crossfade_ms, rig.defaults());
                let Some(first) = frames.first() else {
                    debug!("Sequence has no steps, nothing to play.");
                    return Outcome::Empty;
                };
                if !fade.is_zero() {
                    self.fade_to(universe, &first.frame, fade);
                }

                let gate = self.gate.clone();
                let id = self.animator.start(move |cancel_handle| {
                    sequence::run(&gate, universe, frames, &cancel_handle)
                });
                Outcome::Animating(id)
            }
            _ => {
                let target = build(rig.fixtures(), scene, rig.defaults());
                if fade.is_zero() {
                    self.gate.send(universe, &target);
                } else {
                    self.fade_to(universe, &target, fade);
                }
                Outcome::Sent
            }
        }
    }

    /// Fades from the base frame to the target, holding the transmission lock throughout so
    /// that racing triggers queue up behind the whole fade.
    fn fade_to(&self, universe: u32, target: &[u8], fade: Duration) {
        let duration_ms = u64::try_from(fade.as_millis()).unwrap_or(u64::MAX);
        let steps = steps_for(duration_ms);
        let delay = step_delay(duration_ms, steps);

        let mut transmitter = self.gate.lock();
        let start = self.gate.base_frame(target.len());
        debug!(steps, duration_ms, "Fading.");
        for step in 1..=steps {
            transmitter.send(universe, &frame_at(&start, target, step, steps));
            if step < steps {
                spin_sleep::sleep(delay);
            }
        }
    }

    /// Re-sends the base frame so that a dimmer change becomes visible. Does nothing if no
    /// frame has been sent yet.
    fn resend(&self) {
        if !self.gate.has_base_frame() {
            return;
        }
        let rig = self.rig.snapshot();
        let mut transmitter = self.gate.lock();
        let base = self.gate.base_frame(frame_len(rig.fixtures()));
        transmitter.send(rig.universe(), &base);
    }
}
