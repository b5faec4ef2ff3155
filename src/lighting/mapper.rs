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

//! Maps a fixture's logical attributes onto absolute positions in a channel buffer.

use crate::config::scene::clamp_channel;
use crate::config::{Attrs, Color, Defaults, Fixture, Mode, Role};

/// Returns the absolute buffer index of the given role for the fixture, or None if the
/// fixture has no explicit map or the role isn't in it.
pub fn channel_of(fixture: &Fixture, role: &Role) -> Option<usize> {
    fixture
        .map()?
        .iter()
        .position(|candidate| candidate == role)
        .map(|offset| fixture.start_index() + offset)
}

/// Writes a fixture's color and attributes into the buffer. Writes past the end of the
/// buffer are skipped and every value is clamped to a valid channel value.
pub fn apply_fixture(
    buffer: &mut [u8],
    fixture: &Fixture,
    color: &Color,
    attrs: &Attrs,
    defaults: &Defaults,
) {
    let start = fixture.start_index();

    let Some(map) = fixture.map() else {
        let mut fallback = vec![color.r, color.g, color.b];
        if fixture.mode() == Mode::Rgbw {
            fallback.push(color.w);
        }
        for (offset, value) in fallback.into_iter().enumerate() {
            if let Some(channel) = buffer.get_mut(start + offset) {
                *channel = clamp_channel(value);
            }
        }
        return;
    };

    let (dimmer, strobe) = attrs.resolve(defaults);
    for (offset, role) in map.iter().enumerate() {
        let Some(channel) = buffer.get_mut(start + offset) else {
            break;
        };
        let value = match role {
            Role::Dimmer => dimmer,
            Role::Red => color.r,
            Role::Green => color.g,
            Role::Blue => color.b,
            Role::White => color.w,
            Role::Amber => color.a,
            Role::Strobe => strobe,
            Role::Unknown(_) => continue,
        };
        *channel = clamp_channel(value);
    }
}

#[cfg(test)]
mod test {
    use super::*;

    const UNTOUCHED: u8 = 7;

    fn touched(buffer: &[u8]) -> Vec<usize> {
        buffer
            .iter()
            .enumerate()
            .filter(|(_, value)| **value != UNTOUCHED)
            .map(|(index, _)| index)
            .collect()
    }

    fn bright() -> Color {
        Color {
            r: 200,
            g: 201,
            b: 202,
            w: 203,
            a: 204,
        }
    }

    #[test]
    fn test_channel_of() {
        let fixture = Fixture::new(
            "bar",
            10,
            Mode::Rgb,
            Some(vec![Role::Dimmer, Role::Red, Role::Green, Role::Blue]),
        );
        assert_eq!(Some(9), channel_of(&fixture, &Role::Dimmer));
        assert_eq!(Some(12), channel_of(&fixture, &Role::Blue));
        assert_eq!(None, channel_of(&fixture, &Role::Amber));

        let mapless = Fixture::new("par", 1, Mode::Rgbw, None);
        assert_eq!(None, channel_of(&mapless, &Role::Red));
    }

    #[test]
    fn test_explicit_map_writes_only_mapped_channels() {
        let fixture = Fixture::new(
            "bar",
            3,
            Mode::Rgbwa,
            Some(vec![Role::Red, Role::Strobe, Role::Amber]),
        );
        let mut buffer = vec![UNTOUCHED; 10];
        apply_fixture(
            &mut buffer,
            &fixture,
            &bright(),
            &Attrs {
                dimmer: None,
                strobe: Some(99),
            },
            &Defaults::default(),
        );

        assert_eq!(vec![2, 3, 4], touched(&buffer));
        assert_eq!(&[200, 99, 204], &buffer[2..5]);
    }

    #[test]
    fn test_mapless_rgbw_writes_four_channels() {
        let fixture = Fixture::new("par", 2, Mode::Rgbw, None);
        let mut buffer = vec![UNTOUCHED; 10];
        apply_fixture(
            &mut buffer,
            &fixture,
            &bright(),
            &Attrs::default(),
            &Defaults::default(),
        );

        assert_eq!(vec![1, 2, 3, 4], touched(&buffer));
        assert_eq!(&[200, 201, 202, 203], &buffer[1..5]);
    }

    #[test]
    fn test_mapless_rgb_writes_three_channels() {
        let fixture = Fixture::new("par", 1, Mode::Rgb, None);
        let mut buffer = vec![UNTOUCHED; 10];
        apply_fixture(
            &mut buffer,
            &fixture,
            &bright(),
            &Attrs::default(),
            &Defaults::default(),
        );

        assert_eq!(vec![0, 1, 2], touched(&buffer));
    }

    #[test]
    fn test_mapless_rgbwa_skips_white_and_amber() {
        let fixture = Fixture::new("par", 1, Mode::Rgbwa, None);
        let mut buffer = vec![UNTOUCHED; 5];
        apply_fixture(
            &mut buffer,
            &fixture,
            &bright(),
            &Attrs::default(),
            &Defaults::default(),
        );

        assert_eq!(vec![200, 201, 202, UNTOUCHED, UNTOUCHED], buffer);
    }

    #[test]
    fn test_unknown_roles_are_ignored() {
        let fixture = Fixture::new(
            "mover",
            1,
            Mode::Rgb,
            Some(vec![Role::from("PAN"), Role::Green, Role::from("TILT")]),
        );
        let mut buffer = vec![UNTOUCHED; 3];
        apply_fixture(
            &mut buffer,
            &fixture,
            &bright(),
            &Attrs::default(),
            &Defaults::default(),
        );

        assert_eq!(vec![UNTOUCHED, 201, UNTOUCHED], buffer);
    }

    #[test]
    fn test_values_are_clamped_and_defaults_used() {
        let fixture = Fixture::new(
            "bar",
            1,
            Mode::Rgb,
            Some(vec![Role::Dimmer, Role::Red, Role::Green, Role::Strobe]),
        );
        let mut buffer = vec![UNTOUCHED; 4];
        apply_fixture(
            &mut buffer,
            &fixture,
            &Color::rgb(512, -20, 0),
            &Attrs::default(),
            &Defaults {
                dimmer: 300,
                strobe: 12,
            },
        );

        assert_eq!(vec![255, 255, 0, 12], buffer);
    }

    #[test]
    fn test_writes_past_the_buffer_are_skipped() {
        let fixture = Fixture::new("par", 3, Mode::Rgbw, None);
        let mut buffer = vec![UNTOUCHED; 4];
        apply_fixture(
            &mut buffer,
            &fixture,
            &bright(),
            &Attrs::default(),
            &Defaults::default(),
        );

        assert_eq!(vec![UNTOUCHED, UNTOUCHED, 200, 201], buffer);
    }
}
