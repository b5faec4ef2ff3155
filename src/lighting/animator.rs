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

//! Makes sure at most one background animation runs at a time.

use std::sync::atomic::{AtomicU64, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError};
use parking_lot::Mutex;
use tracing::{debug, error, warn};

use crate::playsync::CancelHandle;

/// How long to wait for an animation to wind down after cancelling it.
pub const JOIN_TIMEOUT: Duration = Duration::from_secs(2);

/// A running background animation.
pub struct Animation {
    id: u64,
    cancel_handle: CancelHandle,
    /// Disconnects when the animation thread exits.
    finished: Receiver<()>,
    join_handle: JoinHandle<()>,
}

impl Animation {
    /// Spawns the animation on its own thread.
    pub fn spawn<F>(id: u64, animation: F) -> Animation
    where
        F: FnOnce(CancelHandle) + Send + 'static,
    {
        let cancel_handle = CancelHandle::new();
        let (finished_tx, finished) = crossbeam_channel::bounded::<()>(0);
        let join_handle = {
            let cancel_handle = cancel_handle.clone();
            thread::spawn(move || {
                // Dropped when the animation returns or panics, which wakes up joiners.
                let _finished_tx = finished_tx;
                animation(cancel_handle);
            })
        };

        Animation {
            id,
            cancel_handle,
            finished,
            join_handle,
        }
    }

    /// Gets the animation's id.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Gets the animation's cancel handle.
    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel_handle.clone()
    }

    /// Requests cancellation.
    pub fn cancel(&self) {
        self.cancel_handle.cancel();
    }

    /// Returns true if the animation thread has exited.
    pub fn is_finished(&self) -> bool {
        self.join_handle.is_finished()
    }

    /// Waits up to the timeout for the animation thread to exit. Returns false if it didn't;
    /// the thread is then left to finish on its own.
    pub fn join(self, timeout: Duration) -> bool {
        match self.finished.recv_timeout(timeout) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                if self.join_handle.join().is_err() {
                    error!(id = self.id, "Animation thread panicked.");
                }
                true
            }
            Err(RecvTimeoutError::Timeout) => {
                warn!(
                    id = self.id,
                    timeout_ms = timeout.as_millis() as u64,
                    "Animation did not stop in time, detaching it."
                );
                false
            }
        }
    }
}

/// Supervises the single active animation.
#[derive(Default)]
pub struct Animator {
    active: Mutex<Option<Animation>>,
    next_id: AtomicU64,
}

impl Animator {
    /// Creates a new animator.
    pub fn new() -> Animator {
        Animator::default()
    }

    /// Stops any active animation, then starts the given one. Returns the new animation's id.
    pub fn start<F>(&self, animation: F) -> u64
    where
        F: FnOnce(CancelHandle) + Send + 'static,
    {
        let mut active = self.active.lock();
        if let Some(previous) = active.take() {
            Self::stop_animation(previous);
        }

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        debug!(id, "Starting animation.");
        *active = Some(Animation::spawn(id, animation));
        id
    }

    /// Stops the active animation, if any. Returns true if there was one.
    pub fn stop(&self) -> bool {
        let mut active = self.active.lock();
        match active.take() {
            Some(animation) => {
                Self::stop_animation(animation);
                true
            }
            None => false,
        }
    }

    /// Stops the active animation only if it is the one with the given id.
    pub fn stop_if(&self, id: u64) -> bool {
        let mut active = self.active.lock();
        if active.as_ref().is_some_and(|animation| animation.id() == id) {
            if let Some(animation) = active.take() {
                Self::stop_animation(animation);
                return true;
            }
        }
        false
    }

    /// Returns true if an animation is running.
    pub fn is_active(&self) -> bool {
        self.active
            .lock()
            .as_ref()
            .is_some_and(|animation| !animation.is_finished())
    }

    /// The cancel handle of the animation with the given id, if it is still the active one.
    pub fn cancel_handle(&self, id: u64) -> Option<CancelHandle> {
        self.active
            .lock()
            .as_ref()
            .filter(|animation| animation.id() == id)
            .map(Animation::cancel_handle)
    }

    fn stop_animation(animation: Animation) {
        debug!(id = animation.id(), "Stopping animation.");
        animation.cancel();
        animation.join(JOIN_TIMEOUT);
    }
}

impl Drop for Animator {
    fn drop(&mut self) {
        self.stop();
    }
}
