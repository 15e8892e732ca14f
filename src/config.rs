// Copyright (C) 2024 Michael Wilson <mike@mdwn.dev>
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
use std::path::Path;

mod audio;
mod engine;
pub mod error;

pub use self::audio::Audio;
pub use self::engine::{EngineConfig, InstrumentConfig, NoteConfig, Recording};
pub use self::error::ConfigError;

/// Loads an engine file.
pub fn load(path: &Path) -> Result<EngineConfig, ConfigError> {
    EngineConfig::deserialize(path)
}
