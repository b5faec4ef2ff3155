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
use std::collections::HashSet;
use std::fmt;
use std::path::Path;

use config::{Config, File};
use serde::Deserialize;
use tracing::warn;

use super::error::ConfigError;
use super::scene::Scene;
use crate::dmx::UNIVERSE_SIZE;

/// The default DMX universe.
pub const DEFAULT_UNIVERSE: u32 = 1;
/// The default dimmer attribute value.
pub const DEFAULT_DIMMER: i64 = 255;
/// The default strobe attribute value.
pub const DEFAULT_STROBE: i64 = 0;

/// A lighting rig: the universe, its fixtures, attribute defaults and trigger buttons.
#[derive(Deserialize, Clone, Debug)]
pub struct Rig {
    /// The universe the rig is transmitted on.
    #[serde(default = "default_universe")]
    universe: u32,

    /// The fixtures in the rig.
    #[serde(default)]
    fixtures: Vec<Fixture>,

    /// Rig-wide attribute defaults.
    #[serde(default)]
    defaults: Defaults,

    /// The trigger buttons.
    #[serde(default)]
    buttons: Vec<Button>,
}

fn default_universe() -> u32 {
    DEFAULT_UNIVERSE
}

impl Default for Rig {
    fn default() -> Self {
        Rig::new(DEFAULT_UNIVERSE, Vec::new(), Defaults::default(), Vec::new())
    }
}

impl Rig {
    /// Creates a new rig. Fixtures that can't be addressed are dropped.
    pub fn new(
        universe: u32,
        fixtures: Vec<Fixture>,
        defaults: Defaults,
        buttons: Vec<Button>,
    ) -> Rig {
        Rig {
            universe,
            fixtures,
            defaults,
            buttons,
        }
        .normalized()
    }

    /// Loads a rig from the given file. The format is chosen by the file extension.
    pub fn load(path: &Path) -> Result<Rig, ConfigError> {
        let rig = Config::builder()
            .add_source(File::from(path))
            .build()?
            .try_deserialize::<Rig>()?;
        Ok(rig.normalized())
    }

    /// Parses a rig from a JSON string.
    pub fn from_json(json: &str) -> Result<Rig, ConfigError> {
        Ok(serde_json::from_str::<Rig>(json)?.normalized())
    }

    /// Drops fixtures whose start channel is zero. Channels are 1-based.
    fn normalized(mut self) -> Rig {
        self.fixtures.retain(|fixture| {
            if fixture.start_channel == 0 {
                warn!(
                    fixture = fixture.name(),
                    "Fixture has start channel 0, ignoring it."
                );
                return false;
            }
            true
        });

        let mut seen = HashSet::new();
        for fixture in self.fixtures.iter() {
            if !seen.insert(fixture.name.as_str()) {
                warn!(fixture = fixture.name(), "Duplicate fixture name.");
            }
            if !fixture.fits_universe() {
                warn!(
                    fixture = fixture.name(),
                    last_channel = fixture.end_index(),
                    "Fixture runs past the end of the universe, its extra channels won't be sent."
                );
            }
        }
        self
    }

    /// Gets the universe.
    pub fn universe(&self) -> u32 {
        self.universe
    }

    /// Gets the fixtures.
    pub fn fixtures(&self) -> &[Fixture] {
        &self.fixtures
    }

    /// Gets the attribute defaults.
    pub fn defaults(&self) -> &Defaults {
        &self.defaults
    }

    /// Gets the buttons.
    pub fn buttons(&self) -> &[Button] {
        &self.buttons
    }

    /// Gets the button with the given index.
    pub fn button(&self, index: u32) -> Option<&Button> {
        self.buttons.iter().find(|button| button.index == index)
    }

    /// Gets the buttons sorted by index.
    pub fn sorted_buttons(&self) -> Vec<&Button> {
        let mut buttons: Vec<&Button> = self.buttons.iter().collect();
        buttons.sort_by_key(|button| button.index);
        buttons
    }
}

/// Rig-wide attribute defaults.
#[derive(Deserialize, Clone, Copy, Debug, PartialEq)]
pub struct Defaults {
    #[serde(default = "default_dimmer")]
    pub dimmer: i64,
    #[serde(default = "default_strobe")]
    pub strobe: i64,
}

fn default_dimmer() -> i64 {
    DEFAULT_DIMMER
}

fn default_strobe() -> i64 {
    DEFAULT_STROBE
}

impl Default for Defaults {
    fn default() -> Self {
        Defaults {
            dimmer: DEFAULT_DIMMER,
            strobe: DEFAULT_STROBE,
        }
    }
}

/// The channel layout used when a fixture has no explicit map.
#[derive(Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(from = "String")]
pub enum Mode {
    Rgb,
    #[default]
    Rgbw,
    Rgbwa,
}

impl From<String> for Mode {
    fn from(value: String) -> Self {
        match value.to_uppercase().as_str() {
            "RGBWA" => Mode::Rgbwa,
            "RGBW" => Mode::Rgbw,
            _ => Mode::Rgb,
        }
    }
}

impl Mode {
    /// The number of channels a fixture in this mode occupies.
    pub fn span(&self) -> usize {
        match self {
            Mode::Rgb => 3,
            Mode::Rgbw => 4,
            Mode::Rgbwa => 5,
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Rgb => write!(f, "RGB"),
            Mode::Rgbw => write!(f, "RGBW"),
            Mode::Rgbwa => write!(f, "RGBWA"),
        }
    }
}

/// The role of a single channel in an explicit fixture map.
#[derive(Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(from = "String")]
pub enum Role {
    Red,
    Green,
    Blue,
    White,
    Amber,
    Dimmer,
    Strobe,
    /// A token we don't know. It still occupies a channel but nothing is written to it.
    Unknown(String),
}

impl From<String> for Role {
    fn from(value: String) -> Self {
        match value.to_uppercase().as_str() {
            "R" => Role::Red,
            "G" => Role::Green,
            "B" => Role::Blue,
            "W" => Role::White,
            "A" => Role::Amber,
            "DIM" => Role::Dimmer,
            "STROBE" => Role::Strobe,
            _ => Role::Unknown(value),
        }
    }
}

impl From<&str> for Role {
    fn from(value: &str) -> Self {
        Role::from(value.to_string())
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Red => write!(f, "R"),
            Role::Green => write!(f, "G"),
            Role::Blue => write!(f, "B"),
            Role::White => write!(f, "W"),
            Role::Amber => write!(f, "A"),
            Role::Dimmer => write!(f, "DIM"),
            Role::Strobe => write!(f, "STROBE"),
            Role::Unknown(token) => write!(f, "{}?", token),
        }
    }
}

/// A fixture definition.
#[derive(Deserialize, Clone, Debug)]
pub struct Fixture {
    /// The name of the fixture. Unique within a rig.
    name: String,

    /// The 1-based start channel.
    start_channel: u16,

    /// The fallback layout.
    #[serde(default)]
    mode: Mode,

    /// An explicit channel layout. Overrides the mode.
    #[serde(default)]
    map: Option<Vec<Role>>,
}

impl Fixture {
    /// Creates a new fixture.
    pub fn new(name: &str, start_channel: u16, mode: Mode, map: Option<Vec<Role>>) -> Fixture {
        Fixture {
            name: name.to_string(),
            start_channel,
            mode,
            map,
        }
    }

    /// Gets the name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Gets the 1-based start channel.
    pub fn start_channel(&self) -> u16 {
        self.start_channel
    }

    /// Gets the mode.
    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Gets the explicit map. An empty map counts as no map.
    pub fn map(&self) -> Option<&[Role]> {
        self.map.as_deref().filter(|map| !map.is_empty())
    }

    /// The 0-based buffer index of the fixture's first channel.
    pub fn start_index(&self) -> usize {
        usize::from(self.start_channel.saturating_sub(1))
    }

    /// The number of channels this fixture occupies.
    pub fn span(&self) -> usize {
        match self.map() {
            Some(map) => map.len(),
            None => self.mode.span(),
        }
    }

    /// The 0-based index one past the fixture's last channel.
    pub fn end_index(&self) -> usize {
        self.start_index() + self.span()
    }

    /// Returns true if every channel of the fixture is inside a single universe.
    pub fn fits_universe(&self) -> bool {
        self.end_index() <= UNIVERSE_SIZE
    }
}

/// A trigger button that fires a scene.
#[derive(Deserialize, Clone, Debug)]
pub struct Button {
    /// The index used to trigger this button.
    index: u32,

    /// A display label.
    #[serde(default)]
    label: Option<String>,

    /// The scene fired by this button.
    #[serde(default)]
    scene: Scene,
}

impl Button {
    /// Creates a new button.
    pub fn new(index: u32, label: Option<String>, scene: Scene) -> Button {
        Button {
            index,
            label,
            scene,
        }
    }

    /// Gets the index.
    pub fn index(&self) -> u32 {
        self.index
    }

    /// Gets the label, falling back to the index.
    pub fn label(&self) -> String {
        self.label
            .clone()
            .unwrap_or_else(|| format!("Button {}", self.index))
    }

    /// Gets the scene.
    pub fn scene(&self) -> &Scene {
        &self.scene
    }
}

#[cfg(test)]
mod test {
    use std::io::Write;

    use super::*;

    #[test]
    fn test_fixture_span() {
        assert_eq!(3, Fixture::new("a", 1, Mode::Rgb, None).span());
        assert_eq!(4, Fixture::new("a", 1, Mode::Rgbw, None).span());
        assert_eq!(5, Fixture::new("a", 1, Mode::Rgbwa, None).span());
        assert_eq!(
            2,
            Fixture::new("a", 1, Mode::Rgbwa, Some(vec![Role::Dimmer, Role::Red])).span()
        );
        assert_eq!(4, Fixture::new("a", 1, Mode::Rgbw, Some(vec![])).span());
    }

    #[test]
    fn test_mode_and_role_parsing() {
        assert_eq!(Mode::Rgbwa, Mode::from("rgbwa".to_string()));
        assert_eq!(Mode::Rgbw, Mode::from("RGBW".to_string()));
        assert_eq!(Mode::Rgb, Mode::from("rgb".to_string()));
        assert_eq!(Mode::Rgb, Mode::from("something".to_string()));

        assert_eq!(Role::Dimmer, Role::from("dim"));
        assert_eq!(Role::Strobe, Role::from("Strobe"));
        assert_eq!(Role::Unknown("PAN".to_string()), Role::from("PAN"));
    }

    #[test]
    fn test_rig_from_json() -> Result<(), ConfigError> {
        let rig = Rig::from_json(
            r#"{
                "universe": 2,
                "fixtures": [
                    {"name": "par1", "start_channel": 1, "mode": "RGBW"},
                    {"name": "bar", "start_channel": 5, "map": ["DIM", "r", "G", "B", "pan"]},
                    {"name": "broken", "start_channel": 0}
                ],
                "buttons": [
                    {"index": 2, "scene": {"type": "blackout"}},
                    {"index": 1, "label": "Red", "scene": {"type": "static", "all": {"r": 255}}}
                ]
            }"#,
        )?;

        assert_eq!(2, rig.universe());
        assert_eq!(2, rig.fixtures().len());
        assert_eq!(Defaults::default(), *rig.defaults());
        assert_eq!(
            Some(
                &[
                    Role::Dimmer,
                    Role::Red,
                    Role::Green,
                    Role::Blue,
                    Role::Unknown("pan".to_string())
                ][..]
            ),
            rig.fixtures()[1].map()
        );
        assert_eq!(
            vec![1, 2],
            rig.sorted_buttons()
                .iter()
                .map(|button| button.index())
                .collect::<Vec<u32>>()
        );
        assert_eq!("Red", rig.button(1).unwrap().label());
        assert_eq!("Button 2", rig.button(2).unwrap().label());
        assert!(rig.button(3).is_none());
        Ok(())
    }

    #[test]
    fn test_rig_defaults_when_empty() -> Result<(), ConfigError> {
        let rig = Rig::from_json("{}")?;
        assert_eq!(DEFAULT_UNIVERSE, rig.universe());
        assert!(rig.fixtures().is_empty());
        assert_eq!(255, rig.defaults().dimmer);
        assert_eq!(0, rig.defaults().strobe);
        Ok(())
    }

    #[test]
    fn test_rig_load_from_file() -> Result<(), Box<dyn std::error::Error>> {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile()?;
        write!(
            file,
            r#"{{
                "universe": 3,
                "fixtures": [{{"name": "par1", "start_channel": 1, "mode": "rgb"}}],
                "defaults": {{"dimmer": 128, "strobe": 10}},
                "buttons": [{{"index": 1}}]
            }}"#
        )?;

        let rig = Rig::load(file.path())?;
        assert_eq!(3, rig.universe());
        assert_eq!(Mode::Rgb, rig.fixtures()[0].mode());
        assert_eq!(128, rig.defaults().dimmer);
        assert_eq!(10, rig.defaults().strobe);
        assert_eq!(Scene::Blackout, *rig.button(1).unwrap().scene());
        Ok(())
    }

    #[test]
    fn test_rig_load_missing_file() {
        assert!(Rig::load(Path::new("/definitely/not/here.json")).is_err());
    }

    #[test]
    fn test_fixture_past_universe_is_kept() -> Result<(), ConfigError> {
        assert!(Fixture::new("last", 509, Mode::Rgbw, None).fits_universe());
        assert!(!Fixture::new("over", 510, Mode::Rgbw, None).fits_universe());

        let rig = Rig::from_json(
            r#"{"fixtures": [{"name": "over", "start_channel": 511, "mode": "RGB"}]}"#,
        )?;
        assert_eq!(1, rig.fixtures().len());
        assert!(!rig.fixtures()[0].fits_universe());
        Ok(())
    }
}
