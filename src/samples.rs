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

//! Pitched sample playback.
//!
//! This module provides:
//! - Sample loading and caching (in-memory for zero-latency playback)
//! - One voice per (instrument, pitch), tuned relative to the sample's root
//! - The voice pool the transport triggers and stops

mod loader;
mod pool;
mod voice;

pub use loader::{LoadedSample, SampleLoader};
pub use pool::VoicePool;
pub use voice::SampleVoice;

use crate::instrument::InstrumentId;
use crate::pitch::Pitch;

/// Anything that can start and stop the sound for an (instrument, pitch) pair.
///
/// Both calls must return quickly: they're made from the transport's tick and must never block
/// on audio I/O.
pub trait VoiceBackend: Send + Sync {
    /// Plays the voice from its start.
    fn trigger(&self, instrument: &InstrumentId, pitch: Pitch);

    /// Halts the voice. Idempotent.
    fn stop(&self, instrument: &InstrumentId, pitch: Pitch);
}
