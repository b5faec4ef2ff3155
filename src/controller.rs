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
use std::io;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::{JoinError, JoinSet};
use tokio::{sync::mpsc::Sender, task::JoinHandle};
use tracing::{error, info, span, Instrument, Level};

use crate::lighting::Engine;

pub mod keyboard;

/// Dimmer change applied by the up and down commands.
pub const DIMMER_STEP: i64 = 10;

/// Controller events that will trigger behavior in the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// Fires the button with the given index.
    Trigger { index: u32, fade: Duration },

    /// Stops any sequence and sends an all-zero frame.
    Blackout,

    /// Stops any sequence, leaving the last frame in place.
    Stop,

    /// Reports the global dimmer level.
    ShowDimmer,

    /// Sets the global dimmer level.
    SetDimmer(i64),

    /// Moves the global dimmer level by the given amount.
    StepDimmer(i64),

    /// Lists the configured buttons.
    Buttons,

    /// Shuts the controller down.
    Quit,
}

pub trait Driver: Send + Sync + 'static {
    fn monitor_events(&self, events_tx: Sender<Event>) -> JoinHandle<Result<(), io::Error>>;
}

/// Drives an engine from the events of a driver.
pub struct Controller {
    handle: JoinHandle<()>,
}

impl Controller {
    /// Creates a new controller with the given driver.
    pub fn new(engine: Arc<Engine>, driver: Arc<dyn Driver>) -> Controller {
        Controller {
            handle: tokio::spawn(
                Controller::trigger_events(engine, driver).instrument(span!(Level::INFO, "controller")),
            ),
        }
    }

    /// Join will block until the controller finishes.
    pub async fn join(&mut self) -> Result<(), JoinError> {
        (&mut self.handle).await
    }

    /// Triggers engine operations by watching the driver and getting events from it.
    async fn trigger_events(engine: Arc<Engine>, driver: Arc<dyn Driver>) {
        let (events_tx, mut events_rx) = mpsc::channel(1);
        let join_handle = driver.monitor_events(events_tx);

        info!(
            buttons = engine.rig().buttons().len(),
            dimmer = engine.dimmer(),
            "Controller started."
        );

        // Engine calls block on fades and joins, so each one gets its own blocking thread and a
        // long fade doesn't hold up the next command.
        let mut handlers = JoinSet::new();
        while let Some(event) = events_rx.recv().await {
            info!(event = format!("{:?}", event), "Received event.");
            if event == Event::Quit {
                break;
            }

            let engine = engine.clone();
            handlers.spawn_blocking(move || handle_event(&engine, event));
            while let Some(result) = handlers.try_join_next() {
                log_handler_result(result);
            }
        }

        info!("Controller closing.");
        drop(events_rx);
        while let Some(result) = handlers.join_next().await {
            log_handler_result(result);
        }
        match join_handle.await {
            Ok(Err(e)) => error!(err = e.to_string(), "Event monitor failed."),
            Err(e) => error!(err = e.to_string(), "Error waiting for event monitor to stop."),
            Ok(Ok(())) => {}
        }
    }
}

fn log_handler_result(result: Result<(), JoinError>) {
    if let Err(e) = result {
        error!(err = e.to_string(), "Error handling event.");
    }
}

/// Applies a single event to the engine.
fn handle_event(engine: &Engine, event: Event) {
    match event {
        Event::Trigger { index, fade } => match engine.trigger(index, fade) {
            Ok(outcome) => info!(index, outcome = format!("{:?}", outcome), "Triggered."),
            Err(e) => error!(err = e.to_string(), "Unable to trigger button."),
        },
        Event::Blackout => engine.blackout(),
        Event::Stop => {
            if !engine.stop() {
                info!("Nothing to stop.");
            }
        }
        Event::ShowDimmer => info!(level = engine.dimmer(), "Global dimmer."),
        Event::SetDimmer(percent) => {
            engine.set_dimmer(percent);
        }
        Event::StepDimmer(delta) => {
            engine.step_dimmer(delta);
        }
        Event::Buttons => {
            for button in engine.rig().sorted_buttons() {
                println!(
                    "{:>4}  {:<20} {:<10} {}",
                    button.index(),
                    button.label(),
                    button.scene().kind(),
                    button.scene().preview()
                );
            }
        }
        Event::Quit => {}
    }
}
