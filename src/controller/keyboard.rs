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
use std::time::Duration;

use tokio::{sync::mpsc::Sender, task::JoinHandle};
use tracing::{info, span, warn, Level};

use super::{Event, DIMMER_STEP};
use crate::config::parse_duration;

const TRIGGER: &str = "trigger";
const BLACKOUT: &str = "blackout";
const STOP: &str = "stop";
const DIM: &str = "dim";
const UP: &str = "up";
const DOWN: &str = "down";
const BUTTONS: &str = "buttons";
const QUIT: &str = "quit";

/// A driver that reads commands from the console.
#[derive(Default)]
pub struct Driver {}

impl Driver {
    pub fn new() -> Driver {
        Driver {}
    }

    /// Reads and dispatches one command. Returns false once there is nothing more to read.
    fn monitor_io<R, W>(
        events_tx: &Sender<Event>,
        mut reader: R,
        mut writer: W,
    ) -> Result<bool, io::Error>
    where
        R: io::BufRead,
        W: io::Write,
    {
        write!(
            writer,
            "Command ({} <n> [fade], {}, {}, {} [pct], {}, {}, {}, {}): ",
            TRIGGER, BLACKOUT, STOP, DIM, UP, DOWN, BUTTONS, QUIT,
        )?;
        writer.flush()?;
        let mut input: String = String::default();
        if reader.read_line(&mut input)? == 0 {
            events_tx
                .blocking_send(Event::Quit)
                .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
            return Ok(false);
        }

        let Some(event) = parse(&input) else {
            return Ok(true);
        };
        let more = event != Event::Quit;
        events_tx
            .blocking_send(event)
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
        Ok(more)
    }
}

/// Parses a console command. Bad input is logged and ignored.
fn parse(input: &str) -> Option<Event> {
    let lowered = input.trim().to_lowercase();
    let mut words = lowered.split_whitespace();
    let command = words.next()?;
    let args: Vec<&str> = words.collect();

    match (command, args.as_slice()) {
        (TRIGGER, [index]) => parse_index(index).map(|index| Event::Trigger {
            index,
            fade: Duration::ZERO,
        }),
        (TRIGGER, [index, fade]) => {
            let index = parse_index(index)?;
            match parse_duration(fade) {
                Ok(fade) => Some(Event::Trigger { index, fade }),
                Err(e) => {
                    warn!(fade, err = e.to_string(), "Invalid fade");
                    None
                }
            }
        }
        (BLACKOUT, []) => Some(Event::Blackout),
        (STOP, []) => Some(Event::Stop),
        (DIM, []) => Some(Event::ShowDimmer),
        (DIM, [percent]) => match percent.trim_end_matches('%').parse::<i64>() {
            Ok(percent) => Some(Event::SetDimmer(percent)),
            Err(e) => {
                warn!(percent, err = e.to_string(), "Invalid dimmer level");
                None
            }
        },
        (UP, []) => Some(Event::StepDimmer(DIMMER_STEP)),
        (DOWN, []) => Some(Event::StepDimmer(-DIMMER_STEP)),
        (BUTTONS, []) => Some(Event::Buttons),
        (QUIT, []) => Some(Event::Quit),
        _ => {
            warn!(input = input.trim(), "Unrecognized input");
            None
        }
    }
}

fn parse_index(index: &str) -> Option<u32> {
    match index.parse::<u32>() {
        Ok(index) => Some(index),
        Err(e) => {
            warn!(index, err = e.to_string(), "Invalid button index");
            None
        }
    }
}

impl super::Driver for Driver {
    fn monitor_events(&self, events_tx: Sender<Event>) -> JoinHandle<Result<(), io::Error>> {
        tokio::task::spawn_blocking(move || {
            let span = span!(Level::INFO, "keyboard driver");
            let _enter = span.enter();

            info!("Keyboard driver started.");

            while Self::monitor_io(&events_tx, io::stdin().lock(), io::stdout())? {}
            Ok(())
        })
    }
}

#[cfg(test)]
mod test {
    use std::io::{self, BufReader, BufWriter};
    use std::time::Duration;

    use tokio::sync::mpsc;

    use crate::controller::{keyboard::*, Event};

    use super::Driver;

    fn get_event(input: &str) -> Result<(bool, Option<Event>), io::Error> {
        let (sender, mut receiver) = mpsc::channel::<Event>(1);

        let reader = BufReader::new(input.as_bytes());
        let writer = BufWriter::new(Vec::new());
        let more = Driver::monitor_io(&sender, reader, writer)?;

        // Force the sender to close.
        drop(sender);
        Ok((more, receiver.blocking_recv()))
    }

    fn event(input: &str) -> Option<Event> {
        get_event(input).unwrap().1
    }

    #[test]
    fn test_keyboard_events() {
        assert_eq!(
            Some(Event::Trigger {
                index: 3,
                fade: Duration::ZERO
            }),
            event("trigger 3\n")
        );
        assert_eq!(
            Some(Event::Trigger {
                index: 3,
                fade: Duration::from_millis(500)
            }),
            event("TRIGGER 3 500ms\n")
        );
        assert_eq!(
            Some(Event::Trigger {
                index: 2,
                fade: Duration::from_millis(250)
            }),
            event("trigger 2 250\n")
        );
        assert_eq!(Some(Event::Blackout), event(BLACKOUT));
        assert_eq!(Some(Event::Stop), event(STOP));
        assert_eq!(Some(Event::ShowDimmer), event(DIM));
        assert_eq!(Some(Event::SetDimmer(40)), event("dim 40%"));
        assert_eq!(Some(Event::StepDimmer(10)), event(UP));
        assert_eq!(Some(Event::StepDimmer(-10)), event(DOWN));
        assert_eq!(Some(Event::Buttons), event(BUTTONS));
    }

    #[test]
    fn test_bad_input_is_ignored() -> Result<(), io::Error> {
        assert_eq!((true, None), get_event("unrecognized\n")?);
        assert_eq!((true, None), get_event("trigger\n")?);
        assert_eq!((true, None), get_event("trigger x\n")?);
        assert_eq!((true, None), get_event("trigger 1 soon\n")?);
        assert_eq!((true, None), get_event("dim lots\n")?);
        assert_eq!((true, None), get_event("\n")?);
        Ok(())
    }

    #[test]
    fn test_quit_and_end_of_input() -> Result<(), io::Error> {
        assert_eq!((false, Some(Event::Quit)), get_event("quit\n")?);
        assert_eq!((false, Some(Event::Quit)), get_event("")?);
        Ok(())
    }
}
