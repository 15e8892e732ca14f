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

//! The catalog of playable pitches.
//!
//! Pitches are named like `C2` or `F#0`. The size of the catalog is an explicit octave count
//! handed to whoever needs it; nothing here is global.

use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

/// Number of semitones in an octave.
pub const NOTES_PER_OCTAVE: u8 = 12;

/// The largest supported octave count.
pub const MAX_OCTAVES: u8 = 8;

/// Errors from building catalogs or parsing pitch names.
#[derive(Debug, PartialEq, thiserror::Error)]
pub enum PitchError {
    #[error("octave count must be between 1 and {MAX_OCTAVES}, got {0}")]
    InvalidOctaves(u8),

    #[error("invalid pitch name '{0}'")]
    InvalidName(String),
}

/// One of the twelve pitch classes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PitchClass {
    C,
    CSharp,
    D,
    DSharp,
    E,
    F,
    FSharp,
    G,
    GSharp,
    A,
    ASharp,
    B,
}

impl PitchClass {
    /// All pitch classes in ascending order.
    pub const ALL: [PitchClass; 12] = [
        PitchClass::C,
        PitchClass::CSharp,
        PitchClass::D,
        PitchClass::DSharp,
        PitchClass::E,
        PitchClass::F,
        PitchClass::FSharp,
        PitchClass::G,
        PitchClass::GSharp,
        PitchClass::A,
        PitchClass::ASharp,
        PitchClass::B,
    ];

    /// Semitone offset from C.
    pub fn index(self) -> u8 {
        self as u8
    }

    fn name(self) -> &'static str {
        match self {
            PitchClass::C => "C",
            PitchClass::CSharp => "C#",
            PitchClass::D => "D",
            PitchClass::DSharp => "D#",
            PitchClass::E => "E",
            PitchClass::F => "F",
            PitchClass::FSharp => "F#",
            PitchClass::G => "G",
            PitchClass::GSharp => "G#",
            PitchClass::A => "A",
            PitchClass::ASharp => "A#",
            PitchClass::B => "B",
        }
    }
}

/// A discrete pitch: a pitch class within an octave of the catalog.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize)]
#[serde(try_from = "String")]
pub struct Pitch {
    octave: u8,
    class: PitchClass,
}

impl Pitch {
    pub const fn new(octave: u8, class: PitchClass) -> Pitch {
        Pitch { octave, class }
    }

    pub fn octave(&self) -> u8 {
        self.octave
    }

    pub fn class(&self) -> PitchClass {
        self.class
    }

    /// Absolute semitone number, counted from C0.
    pub fn semitone(&self) -> i32 {
        i32::from(self.octave) * i32::from(NOTES_PER_OCTAVE) + i32::from(self.class.index())
    }

    /// Signed distance in semitones from `root` to this pitch.
    pub fn semitones_from(&self, root: Pitch) -> i32 {
        self.semitone() - root.semitone()
    }

    /// Playback rate that shifts a sample recorded at `root` to this pitch.
    pub fn playback_rate(&self, root: Pitch) -> f64 {
        2f64.powf(f64::from(self.semitones_from(root)) / f64::from(NOTES_PER_OCTAVE))
    }
}

impl Default for Pitch {
    fn default() -> Self {
        Pitch::new(0, PitchClass::C)
    }
}

impl fmt::Display for Pitch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.class.name(), self.octave)
    }
}

impl FromStr for Pitch {
    type Err = PitchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || PitchError::InvalidName(s.to_string());
        let trimmed = s.trim();
        let split = trimmed
            .find(|c: char| c.is_ascii_digit())
            .ok_or_else(invalid)?;
        let (name, octave) = trimmed.split_at(split);

        let class = PitchClass::ALL
            .into_iter()
            .find(|class| class.name().eq_ignore_ascii_case(name))
            .ok_or_else(invalid)?;
        let octave = octave.parse::<u8>().map_err(|_| invalid())?;
        if octave >= MAX_OCTAVES {
            return Err(invalid());
        }

        Ok(Pitch::new(octave, class))
    }
}

impl TryFrom<String> for Pitch {
    type Error = PitchError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Enumerates the playable pitches for a fixed number of octaves.
#[derive(Clone, Debug, PartialEq)]
pub struct PitchCatalog {
    octaves: u8,
}

impl PitchCatalog {
    /// Creates a catalog spanning `octaves` octaves starting at C0.
    pub fn new(octaves: u8) -> Result<PitchCatalog, PitchError> {
        if octaves == 0 || octaves > MAX_OCTAVES {
            return Err(PitchError::InvalidOctaves(octaves));
        }
        Ok(PitchCatalog { octaves })
    }

    pub fn octaves(&self) -> u8 {
        self.octaves
    }

    /// Number of pitches in the catalog.
    pub fn len(&self) -> usize {
        usize::from(self.octaves) * usize::from(NOTES_PER_OCTAVE)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns true if the pitch belongs to this catalog.
    pub fn contains(&self, pitch: Pitch) -> bool {
        pitch.octave < self.octaves
    }

    /// All pitches in ascending order.
    pub fn pitches(&self) -> impl Iterator<Item = Pitch> + '_ {
        (0..self.octaves).flat_map(|octave| {
            PitchClass::ALL
                .into_iter()
                .map(move |class| Pitch::new(octave, class))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_display() {
        let pitch: Pitch = "C#1".parse().unwrap();
        assert_eq!(pitch, Pitch::new(1, PitchClass::CSharp));
        assert_eq!(pitch.to_string(), "C#1");

        assert_eq!("a3".parse::<Pitch>().unwrap(), Pitch::new(3, PitchClass::A));
        assert_eq!(" G0 ".parse::<Pitch>().unwrap(), Pitch::new(0, PitchClass::G));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        for name in ["", "H2", "C", "#1", "C#", "C9", "Cb2"] {
            assert!(name.parse::<Pitch>().is_err(), "{name} should not parse");
        }
    }

    #[test]
    fn test_catalog_size() {
        let catalog = PitchCatalog::new(2).unwrap();
        assert_eq!(catalog.len(), 24);
        let pitches: Vec<Pitch> = catalog.pitches().collect();
        assert_eq!(pitches.len(), 24);
        assert_eq!(pitches[0], Pitch::new(0, PitchClass::C));
        assert_eq!(pitches[23], Pitch::new(1, PitchClass::B));
        assert!(pitches.windows(2).all(|w| w[0] < w[1]));

        assert!(catalog.contains(Pitch::new(1, PitchClass::B)));
        assert!(!catalog.contains(Pitch::new(2, PitchClass::C)));
    }

    #[test]
    fn test_catalog_octave_bounds() {
        assert_eq!(PitchCatalog::new(0), Err(PitchError::InvalidOctaves(0)));
        assert_eq!(PitchCatalog::new(9), Err(PitchError::InvalidOctaves(9)));
        assert!(PitchCatalog::new(MAX_OCTAVES).is_ok());
    }

    #[test]
    fn test_playback_rate() {
        let root = Pitch::new(1, PitchClass::C);
        assert_eq!(Pitch::new(1, PitchClass::C).playback_rate(root), 1.0);
        assert!((Pitch::new(2, PitchClass::C).playback_rate(root) - 2.0).abs() < 1e-9);
        assert!((Pitch::new(0, PitchClass::C).playback_rate(root) - 0.5).abs() < 1e-9);
        assert_eq!(Pitch::new(1, PitchClass::G).semitones_from(root), 7);
    }
}
