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
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::pitch::Pitch;

/// Identifies an instrument. Cheap to clone.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstrumentId(Arc<str>);

impl InstrumentId {
    pub fn new(name: &str) -> InstrumentId {
        InstrumentId(Arc::from(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for InstrumentId {
    fn from(name: &str) -> Self {
        InstrumentId::new(name)
    }
}

impl fmt::Display for InstrumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A sound-producing voice family backed by a single sample file.
#[derive(Clone, Debug)]
pub struct Instrument {
    /// The instrument's identity.
    id: InstrumentId,
    /// Path to the source sample.
    sample: PathBuf,
    /// The pitch the sample was recorded at. Voices are tuned relative to it.
    root: Pitch,
    /// Linear gain applied to every voice of this instrument.
    gain: f32,
}

impl Instrument {
    /// Creates a new instrument with a root of C0 and unity gain.
    pub fn new(name: &str, sample: impl Into<PathBuf>) -> Instrument {
        Instrument {
            id: InstrumentId::new(name),
            sample: sample.into(),
            root: Pitch::default(),
            gain: 1.0,
        }
    }

    /// Sets the natural pitch of the sample.
    pub fn with_root(mut self, root: Pitch) -> Instrument {
        self.root = root;
        self
    }

    /// Sets the gain of the instrument.
    pub fn with_gain(mut self, gain: f32) -> Instrument {
        self.gain = gain;
        self
    }

    pub fn id(&self) -> &InstrumentId {
        &self.id
    }

    pub fn sample(&self) -> &Path {
        &self.sample
    }

    pub fn root(&self) -> Pitch {
        self.root
    }

    pub fn gain(&self) -> f32 {
        self.gain
    }
}
