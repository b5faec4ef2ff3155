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
use clap::{crate_version, Parser, Subcommand};
use dmxscene::config::{parse_duration, FileRigSource, Rig, Scene};
use dmxscene::controller::{keyboard, Controller};
use dmxscene::dmx::{self, FileDimmerStore, FrameDisplay, GlobalDimmer};
use dmxscene::lighting::frame::{build, build_sequence};
use dmxscene::lighting::{Engine, Outcome};
use std::error::Error;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

const SYSTEMD_SERVICE: &str = r#"
[Unit]
Description=DMX scene engine

[Service]
Type=simple
Restart=on-failure
EnvironmentFile=-/etc/default/dmxscene
ExecStart=/usr/local/bin/dmxscene start

[Install]
WantedBy=multi-user.target
Alias=dmxscene.service
"#;

/// How often to check whether a sequence is still running while waiting on it.
const POLL_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Parser)]
#[clap(
    author = "Michael Wilson",
    version = crate_version!(),
    about = "A scene and sequence engine for DMX lighting rigs."
)]
struct Cli {
    /// The path to the rig file with fixtures and buttons.
    #[arg(long, global = true, env = "SCENES_JSON", default_value = "scenes.json")]
    rig: PathBuf,
    /// The path to the file the global dimmer level is kept in.
    #[arg(
        long,
        global = true,
        env = "DIMMER_STATE_PATH",
        default_value = "dimmer.json"
    )]
    dimmer_state: PathBuf,
    /// The port of the OLA daemon.
    #[arg(long, global = true, env = "OLA_PORT")]
    ola_port: Option<u16>,
    /// Logs frames instead of sending them to OLA.
    #[arg(long, global = true)]
    dry_run: bool,

    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Verifies the rig and lists its fixtures and buttons.
    Verify {},
    /// Prints the frame a button would send, before dimming.
    Frame {
        /// The button index.
        index: u32,
    },
    /// Fires a button.
    Trigger {
        /// The button index.
        index: u32,
        /// How long to fade into the scene, e.g. 500ms.
        #[arg(short, long, value_parser = parse_duration, default_value = "0ms")]
        fade: Duration,
        /// How long to let a sequence run. Sequences run until interrupted without it.
        #[arg(short, long, value_parser = parse_duration)]
        duration: Option<Duration>,
    },
    /// Stops everything and sends an all-zero frame.
    Blackout {},
    /// Shows or changes the stored global dimmer level. Nothing is sent; a running engine
    /// picks up the new level when it is next started.
    Dim {
        #[clap(subcommand)]
        action: Option<DimAction>,
    },
    /// Plays a scene from a JSON or YAML file.
    PlayScene {
        /// The path to the scene file.
        path: PathBuf,
        /// How long to fade into the scene, e.g. 500ms.
        #[arg(short, long, value_parser = parse_duration, default_value = "0ms")]
        fade: Duration,
        /// How long to let a sequence run.
        #[arg(short, long, value_parser = parse_duration, default_value = "3s")]
        duration: Duration,
    },
    /// Starts the engine with a console controller.
    Start {},
    /// Prints a systemd service definition to stdout.
    Systemd {},
}

#[derive(Subcommand)]
enum DimAction {
    /// Sets the global dimmer level in percent.
    Set {
        /// The new level, clamped to 0-100.
        percent: i64,
    },
    /// Moves the global dimmer level.
    Step {
        /// The change in percent, e.g. -10.
        #[arg(allow_hyphen_values = true)]
        delta: i64,
    },
}

impl Cli {
    fn engine(&self) -> Result<Engine, Box<dyn Error>> {
        let sink = dmx::get_sink(self.dry_run, self.ola_port)?;
        Ok(Engine::new(
            Arc::new(FileRigSource::new(&self.rig)),
            sink,
            Box::new(FileDimmerStore::new(&self.dimmer_state)),
        ))
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    match &cli.command {
        Commands::Verify {} => {
            let rig = Rig::load(&cli.rig)?;

            println!("Universe: {}", rig.universe());
            println!("Fixtures (count: {}):", rig.fixtures().len());
            for fixture in rig.fixtures() {
                let roles = match fixture.map() {
                    Some(map) => map
                        .iter()
                        .map(|role| role.to_string())
                        .collect::<Vec<String>>()
                        .join(","),
                    None => fixture.mode().to_string(),
                };
                println!(
                    "- {} (channels {}-{}, {})",
                    fixture.name(),
                    fixture.start_channel(),
                    fixture.end_index(),
                    roles
                );
            }

            println!("Buttons (count: {}):", rig.buttons().len());
            for button in rig.sorted_buttons() {
                println!(
                    "- {}: {} ({}, {})",
                    button.index(),
                    button.label(),
                    button.scene().kind(),
                    button.scene().preview()
                );
            }
        }
        Commands::Frame { index } => {
            let rig = Rig::load(&cli.rig)?;
            let Some(button) = rig.button(*index) else {
                return Err(format!("no button with index {}", index).into());
            };

            match button.scene() {
                Scene::Sequence {
                    steps,
                    hold_ms,
                    crossfade_ms,
                } => {
                    let frames = build_sequence(
                        rig.fixtures(),
                        steps,
                        *hold_ms,
                        *crossfade_ms,
                        rig.defaults(),
                    );
                    for (i, frame) in frames.iter().enumerate() {
                        println!(
                            "{}: {} (hold {}ms, crossfade {}ms)",
                            i,
                            FrameDisplay(&frame.frame),
                            frame.hold_ms,
                            frame.crossfade_ms
                        );
                    }
                }
                scene => {
                    let frame = build(rig.fixtures(), scene, rig.defaults());
                    println!("{}", FrameDisplay(&frame));
                }
            }
        }
        Commands::Trigger {
            index,
            fade,
            duration,
        } => {
            let engine = cli.engine()?;
            if let Outcome::Animating(_) = engine.trigger(*index, *fade)? {
                match duration {
                    Some(duration) => {
                        tokio::time::sleep(*duration).await;
                        engine.stop();
                    }
                    None => wait_for_sequence(&engine).await,
                }
            }
        }
        Commands::Blackout {} => cli.engine()?.blackout(),
        Commands::Dim { action } => {
            println!("Dimmer: {}%", dim(&cli.dimmer_state, action.as_ref()));
        }
        Commands::PlayScene {
            path,
            fade,
            duration,
        } => {
            let scene = Scene::load(path)?;
            let engine = cli.engine()?;
            if let Outcome::Animating(_) = engine.play_scene(&scene, *fade, *duration) {
                wait_for_sequence(&engine).await;
            }
        }
        Commands::Start {} => {
            let engine = Arc::new(cli.engine()?);
            let mut controller = Controller::new(engine, Arc::new(keyboard::Driver::new()));
            controller.join().await?;
        }
        Commands::Systemd {} => {
            println!("{}", SYSTEMD_SERVICE);
        }
    }

    Ok(())
}

async fn wait_for_sequence(engine: &Engine) {
    while engine.is_animating() {
        tokio::time::sleep(POLL_INTERVAL).await;
    }
}

/// Reads or updates the stored dimmer level without opening a sink. A fresh process has no
/// frame to re-send, so there is nothing to transmit.
fn dim(dimmer_state: &Path, action: Option<&DimAction>) -> u8 {
    let dimmer = GlobalDimmer::new(Box::new(FileDimmerStore::new(dimmer_state)));
    match action {
        None => dimmer.level(),
        Some(DimAction::Set { percent }) => dimmer.set(*percent),
        Some(DimAction::Step { delta }) => dimmer.step(*delta),
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_dim_uses_state_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dimmer.json");

        assert_eq!(100, dim(&path, None));
        assert_eq!(40, dim(&path, Some(&DimAction::Set { percent: 40 })));
        assert_eq!(30, dim(&path, Some(&DimAction::Step { delta: -10 })));
        assert_eq!(30, dim(&path, None));
    }

    #[test]
    fn test_dim_parses_without_sink_options() {
        let cli = Cli::try_parse_from(["dmxscene", "--dry-run", "dim", "step", "-10"]).unwrap();
        let Commands::Dim {
            action: Some(DimAction::Step { delta }),
        } = cli.command
        else {
            panic!("expected a dim step");
        };
        assert_eq!(-10, delta);
    }
}
