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

//! A block-based step sequencer.
//!
//! A loop is divided into a fixed number of blocks. Each instrument can have notes switched on
//! at any (pitch, block) pair, and the transport walks the blocks at a fixed rate, triggering
//! the pre-loaded sample voices for each block and stopping the previous block's. The mixed
//! output can be recorded to a WAV file.

pub mod audio;
pub mod config;
pub mod engine;
pub mod events;
pub mod instrument;
pub mod pitch;
pub mod playsync;
pub mod recording;
pub mod render;
pub mod samples;
pub mod scheduler;
pub mod sequencer;
pub mod transport;
pub mod util;

#[cfg(test)]
mod testutil;

pub use engine::{Engine, EngineError, EngineSettings};
pub use events::EngineEvent;
pub use transport::RunMode;
