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

//! Composes full channel buffers from scene snapshots.

use std::collections::BTreeMap;

use tracing::debug;

use super::mapper::apply_fixture;
use crate::config::{Attrs, Defaults, Fixture, Scene, Step, StepPayload};

/// The buffer length needed to address every fixture in the rig.
pub fn frame_len(fixtures: &[Fixture]) -> usize {
    fixtures.iter().map(Fixture::end_index).max().unwrap_or(0)
}

/// Returns a copy of the buffer zero-padded or truncated to the given length.
pub fn ensure_len(buffer: &[u8], len: usize) -> Vec<u8> {
    let mut resized = buffer.to_vec();
    resized.resize(len, 0);
    resized
}

/// Builds the channel buffer for a single scene snapshot. Sequences and unknown scene
/// types build to an all-zero buffer; sequence steps are built with [build_sequence].
pub fn build(fixtures: &[Fixture], scene: &Scene, defaults: &Defaults) -> Vec<u8> {
    let mut buffer = vec![0u8; frame_len(fixtures)];

    match scene {
        Scene::Blackout => {}
        Scene::Static {
            all,
            attrs,
            per_fixture_attrs,
        } => {
            for fixture in fixtures {
                let attrs = attrs.overridden_by(per_fixture_attrs.get(fixture.name()));
                apply_fixture(&mut buffer, fixture, all, &attrs, defaults);
            }
        }
        Scene::PerFixture {
            values,
            attrs,
            per_fixture_attrs,
        } => {
            for fixture in fixtures {
                let color = values.get(fixture.name()).copied().unwrap_or_default();
                let attrs = attrs.overridden_by(per_fixture_attrs.get(fixture.name()));
                apply_fixture(&mut buffer, fixture, &color, &attrs, defaults);
            }
        }
        Scene::Sequence { .. } => {
            debug!("Sequences are not built as a single frame.");
        }
        Scene::Unknown(kind) => {
            debug!(kind = kind.as_str(), "Unknown scene type, building a dark frame.");
        }
    }

    buffer
}

/// A fully built step of a sequence.
#[derive(Clone, Debug, PartialEq)]
pub struct SequenceFrame {
    /// The base buffer for the step.
    pub frame: Vec<u8>,
    /// How long to hold the step before advancing.
    pub hold_ms: u64,
    /// How long to crossfade into the step.
    pub crossfade_ms: u64,
}

/// Builds every step of a sequence. Step timings fall back to the sequence defaults.
pub fn build_sequence(
    fixtures: &[Fixture],
    steps: &[Step],
    hold_ms: u64,
    crossfade_ms: u64,
    defaults: &Defaults,
) -> Vec<SequenceFrame> {
    steps
        .iter()
        .map(|step| {
            let scene = match &step.payload {
                StepPayload::Static(all) => Scene::solid(*all),
                StepPayload::PerFixture(values) => Scene::PerFixture {
                    values: values.clone(),
                    attrs: Attrs::default(),
                    per_fixture_attrs: BTreeMap::new(),
                },
                StepPayload::Dark => Scene::Blackout,
            };
            SequenceFrame {
                frame: build(fixtures, &scene, defaults),
                hold_ms: step.hold_ms.unwrap_or(hold_ms),
                crossfade_ms: step.crossfade_ms.unwrap_or(crossfade_ms),
            }
        })
        .collect()
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::config::{Color, Mode, Role};

    fn par1() -> Fixture {
        Fixture::new("par1", 1, Mode::Rgbw, None)
    }

    fn defaults() -> Defaults {
        Defaults {
            dimmer: 255,
            strobe: 0,
        }
    }

    #[test]
    fn test_frame_len() {
        assert_eq!(0, frame_len(&[]));
        assert_eq!(4, frame_len(&[par1()]));
        assert_eq!(
            12,
            frame_len(&[
                Fixture::new("a", 10, Mode::Rgb, None),
                Fixture::new("b", 1, Mode::Rgbwa, None),
            ])
        );
        assert_eq!(
            7,
            frame_len(&[Fixture::new("a", 6, Mode::Rgbwa, Some(vec![Role::Dimmer, Role::Red]))])
        );
    }

    #[test]
    fn test_ensure_len() {
        assert_eq!(vec![1, 2, 0, 0], ensure_len(&[1, 2], 4));
        assert_eq!(vec![1], ensure_len(&[1, 2], 1));
        assert_eq!(vec![0, 0], ensure_len(&[], 2));
    }

    #[test]
    fn test_static_red() {
        let scene = Scene::solid(Color::rgbw(255, 0, 0, 0));
        assert_eq!(vec![255, 0, 0, 0], build(&[par1()], &scene, &defaults()));
    }

    #[test]
    fn test_blackout_and_unknown() {
        let fixtures = vec![par1(), Fixture::new("par2", 5, Mode::Rgb, None)];
        assert_eq!(vec![0; 7], build(&fixtures, &Scene::Blackout, &defaults()));
        assert_eq!(
            vec![0; 7],
            build(&fixtures, &Scene::Unknown("rainbow".into()), &defaults())
        );
    }

    #[test]
    fn test_per_fixture_missing_entry_goes_dark() -> Result<(), serde_json::Error> {
        let fixtures = vec![par1(), Fixture::new("par2", 5, Mode::Rgb, None)];
        let scene = Scene::from_json(
            r#"{"type": "per-fixture", "values": {"par2": {"r": 1, "g": 2, "b": 3}}}"#,
        )?;
        assert_eq!(
            vec![0, 0, 0, 0, 1, 2, 3],
            build(&fixtures, &scene, &defaults())
        );
        Ok(())
    }

    #[test]
    fn test_attribute_precedence() -> Result<(), serde_json::Error> {
        let fixtures = vec![
            Fixture::new(
                "a",
                1,
                Mode::Rgb,
                Some(vec![Role::Dimmer, Role::Strobe, Role::Red]),
            ),
            Fixture::new(
                "b",
                4,
                Mode::Rgb,
                Some(vec![Role::Dimmer, Role::Strobe, Role::Red]),
            ),
        ];
        let scene = Scene::from_json(
            r#"{
                "type": "static",
                "all": {"r": 10},
                "attrs": {"dimmer": 100},
                "per_fixture_attrs": {"b": {"dimmer": 50, "strobe": 200}}
            }"#,
        )?;
        assert_eq!(
            vec![100, 9, 10, 50, 200, 10],
            build(
                &fixtures,
                &scene,
                &Defaults {
                    dimmer: 255,
                    strobe: 9
                }
            )
        );
        Ok(())
    }

    #[test]
    fn test_sequence_builds_dark_frame() -> Result<(), serde_json::Error> {
        let scene = Scene::from_json(r#"{"type": "sequence", "steps": [{"all": {"r": 255}}]}"#)?;
        assert_eq!(vec![0; 4], build(&[par1()], &scene, &defaults()));
        Ok(())
    }

    #[test]
    fn test_build_sequence() -> Result<(), serde_json::Error> {
        let Scene::Sequence {
            steps,
            hold_ms,
            crossfade_ms,
        } = Scene::from_json(
            r#"{
                "type": "sequence",
                "hold_ms": 1000,
                "crossfade_ms": 200,
                "steps": [
                    {"all": {"r": 255}},
                    {"values": {"par1": {"g": 255}}, "hold_ms": 50},
                    {"crossfade_ms": 0}
                ]
            }"#,
        )?
        else {
            panic!("expected a sequence");
        };

        let frames = build_sequence(&[par1()], &steps, hold_ms, crossfade_ms, &defaults());
        assert_eq!(
            vec![
                SequenceFrame {
                    frame: vec![255, 0, 0, 0],
                    hold_ms: 1000,
                    crossfade_ms: 200
                },
                SequenceFrame {
                    frame: vec![0, 255, 0, 0],
                    hold_ms: 50,
                    crossfade_ms: 200
                },
                SequenceFrame {
                    frame: vec![0, 0, 0, 0],
                    hold_ms: 1000,
                    crossfade_ms: 0
                },
            ],
            frames
        );
        Ok(())
    }
}
