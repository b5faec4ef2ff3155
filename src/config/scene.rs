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
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use config::{Config, File};
use serde::Deserialize;

use super::error::ConfigError;
use super::rig::Defaults;

/// A color payload. Values are clamped to [0, 255] when they are written to a buffer.
#[derive(Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Color {
    #[serde(default)]
    pub r: i64,
    #[serde(default)]
    pub g: i64,
    #[serde(default)]
    pub b: i64,
    #[serde(default)]
    pub w: i64,
    #[serde(default)]
    pub a: i64,
}

impl Color {
    /// Creates a color with only the RGB components set.
    pub fn rgb(r: i64, g: i64, b: i64) -> Color {
        Color {
            r,
            g,
            b,
            ..Default::default()
        }
    }

    /// Creates a color with the RGBW components set.
    pub fn rgbw(r: i64, g: i64, b: i64, w: i64) -> Color {
        Color {
            r,
            g,
            b,
            w,
            ..Default::default()
        }
    }
}

/// Fixture attributes. Absent values fall back to the next level of precedence.
#[derive(Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Attrs {
    #[serde(default)]
    pub dimmer: Option<i64>,
    #[serde(default)]
    pub strobe: Option<i64>,
}

impl Attrs {
    /// Layers the given override on top of these attributes. The override wins per field.
    pub fn overridden_by(&self, over: Option<&Attrs>) -> Attrs {
        match over {
            Some(over) => Attrs {
                dimmer: over.dimmer.or(self.dimmer),
                strobe: over.strobe.or(self.strobe),
            },
            None => *self,
        }
    }

    /// Resolves the effective (dimmer, strobe) pair against the rig defaults.
    pub fn resolve(&self, defaults: &Defaults) -> (i64, i64) {
        (
            self.dimmer.unwrap_or(defaults.dimmer),
            self.strobe.unwrap_or(defaults.strobe),
        )
    }
}

/// The color payload of a single sequence step.
#[derive(Clone, Debug, PartialEq)]
pub enum StepPayload {
    /// One color for every fixture.
    Static(Color),
    /// One color per fixture name.
    PerFixture(BTreeMap<String, Color>),
    /// No payload; every fixture goes dark.
    Dark,
}

/// A single step in a sequence.
#[derive(Deserialize, Clone, Debug, PartialEq)]
#[serde(from = "RawStep")]
pub struct Step {
    pub payload: StepPayload,
    /// Overrides the sequence's hold time.
    pub hold_ms: Option<u64>,
    /// Overrides the sequence's crossfade time.
    pub crossfade_ms: Option<u64>,
}

#[derive(Deserialize)]
struct RawStep {
    #[serde(default)]
    all: Option<Color>,
    #[serde(default)]
    values: Option<BTreeMap<String, Color>>,
    #[serde(default)]
    hold_ms: Option<i64>,
    #[serde(default)]
    crossfade_ms: Option<i64>,
}

impl From<RawStep> for Step {
    fn from(raw: RawStep) -> Self {
        let payload = match (raw.all, raw.values) {
            (Some(all), _) => StepPayload::Static(all),
            (None, Some(values)) => StepPayload::PerFixture(values),
            (None, None) => StepPayload::Dark,
        };
        Step {
            payload,
            hold_ms: raw.hold_ms.map(non_negative),
            crossfade_ms: raw.crossfade_ms.map(non_negative),
        }
    }
}

fn non_negative(ms: i64) -> u64 {
    u64::try_from(ms).unwrap_or(0)
}

/// A declarative lighting state, or an animated sequence of states.
#[derive(Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(from = "RawScene")]
pub enum Scene {
    /// Every channel at zero.
    #[default]
    Blackout,
    /// One color and set of attributes for every fixture.
    Static {
        all: Color,
        attrs: Attrs,
        per_fixture_attrs: BTreeMap<String, Attrs>,
    },
    /// One color per fixture. Fixtures without an entry go dark.
    PerFixture {
        values: BTreeMap<String, Color>,
        attrs: Attrs,
        per_fixture_attrs: BTreeMap<String, Attrs>,
    },
    /// A looping list of steps.
    Sequence {
        steps: Vec<Step>,
        hold_ms: u64,
        crossfade_ms: u64,
    },
    /// A scene type we don't recognize. Builds to an all-zero buffer.
    Unknown(String),
}

#[derive(Deserialize)]
struct RawScene {
    #[serde(rename = "type", default)]
    kind: Option<String>,
    #[serde(default)]
    all: Color,
    #[serde(default)]
    values: BTreeMap<String, Color>,
    #[serde(default)]
    attrs: Attrs,
    #[serde(default)]
    per_fixture_attrs: BTreeMap<String, Attrs>,
    #[serde(default)]
    steps: Vec<Step>,
    #[serde(default)]
    hold_ms: i64,
    #[serde(default)]
    crossfade_ms: i64,
}

impl From<RawScene> for Scene {
    fn from(raw: RawScene) -> Self {
        let kind = raw
            .kind
            .map(|kind| kind.to_lowercase())
            .unwrap_or_else(|| "static".to_string());
        match kind.as_str() {
            "blackout" => Scene::Blackout,
            "static" => Scene::Static {
                all: raw.all,
                attrs: raw.attrs,
                per_fixture_attrs: raw.per_fixture_attrs,
            },
            "per-fixture" => Scene::PerFixture {
                values: raw.values,
                attrs: raw.attrs,
                per_fixture_attrs: raw.per_fixture_attrs,
            },
            "sequence" => Scene::Sequence {
                steps: raw.steps,
                hold_ms: non_negative(raw.hold_ms),
                crossfade_ms: non_negative(raw.crossfade_ms),
            },
            _ => Scene::Unknown(kind),
        }
    }
}

impl Scene {
    /// Creates a static scene with no attribute overrides.
    pub fn solid(all: Color) -> Scene {
        Scene::Static {
            all,
            attrs: Attrs::default(),
            per_fixture_attrs: BTreeMap::new(),
        }
    }

    /// Parses a scene from JSON.
    pub fn from_json(json: &str) -> Result<Scene, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Loads a scene from the given file. The format is chosen by the file extension.
    pub fn load(path: &Path) -> Result<Scene, ConfigError> {
        Ok(Config::builder()
            .add_source(File::from(path))
            .build()?
            .try_deserialize::<Scene>()?)
    }

    /// The name of this scene's type.
    pub fn kind(&self) -> &str {
        match self {
            Scene::Blackout => "blackout",
            Scene::Static { .. } => "static",
            Scene::PerFixture { .. } => "per-fixture",
            Scene::Sequence { .. } => "sequence",
            Scene::Unknown(kind) => kind,
        }
    }

    /// A single averaged RGB color that represents this scene.
    pub fn preview(&self) -> Rgb {
        let colors: Vec<Color> = match self {
            Scene::Blackout | Scene::Unknown(_) => Vec::new(),
            Scene::Static { all, .. } => vec![*all],
            Scene::PerFixture { values, .. } => values.values().copied().collect(),
            Scene::Sequence { steps, .. } => match steps.first().map(|step| &step.payload) {
                Some(StepPayload::Static(all)) => vec![*all],
                Some(StepPayload::PerFixture(values)) => {
                    values.values().take(1).copied().collect()
                }
                Some(StepPayload::Dark) | None => Vec::new(),
            },
        };

        if colors.is_empty() {
            return Rgb::default();
        }

        let count = colors.len() as i64;
        let average = |component: fn(&Color) -> i64| -> u8 {
            let total: i64 = colors
                .iter()
                .map(|color| i64::from(clamp_channel(component(color))))
                .sum();
            clamp_channel(total / count)
        };
        Rgb {
            r: average(|color| color.r),
            g: average(|color| color.g),
            b: average(|color| color.b),
        }
    }
}

/// Clamps a configured value into a DMX channel value.
pub fn clamp_channel(value: i64) -> u8 {
    value.clamp(0, 255) as u8
}

/// A preview color.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}
