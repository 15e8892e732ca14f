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

//! A single pitched playback unit.
//!
//! Each voice plays one loaded sample at one fixed rate. Retriggering restarts it; there is no
//! stacking of overlapping hits on the same voice.

use parking_lot::Mutex;

use super::loader::LoadedSample;
use crate::instrument::InstrumentId;
use crate::pitch::Pitch;

/// Runtime playback state, owned exclusively by its voice.
#[derive(Default)]
struct Playhead {
    /// Fractional frame position in the sample.
    position: f64,
    /// Whether the voice is currently producing sound.
    playing: bool,
}

/// A pre-loaded sample bound to an (instrument, pitch) pair.
pub struct SampleVoice {
    /// The instrument this voice belongs to.
    instrument: InstrumentId,
    /// The pitch this voice is tuned to.
    pitch: Pitch,
    /// The shared sample data.
    sample: LoadedSample,
    /// Frames of source advanced per output frame.
    rate: f64,
    /// Linear output gain.
    gain: f32,
    playhead: Mutex<Playhead>,
}

impl SampleVoice {
    /// Creates a new, stopped voice.
    pub fn new(
        instrument: InstrumentId,
        pitch: Pitch,
        sample: LoadedSample,
        rate: f64,
        gain: f32,
    ) -> SampleVoice {
        SampleVoice {
            instrument,
            pitch,
            sample,
            rate,
            gain,
            playhead: Mutex::new(Playhead::default()),
        }
    }

    pub fn instrument(&self) -> &InstrumentId {
        &self.instrument
    }

    pub fn pitch(&self) -> Pitch {
        self.pitch
    }

    pub fn rate(&self) -> f64 {
        self.rate
    }

    pub fn sample(&self) -> &LoadedSample {
        &self.sample
    }

    /// Plays the voice from its start, restarting it if it's already playing.
    pub fn trigger(&self) {
        let mut playhead = self.playhead.lock();
        playhead.position = 0.0;
        playhead.playing = true;
    }

    /// Halts the voice immediately. Stopping a stopped voice does nothing.
    pub fn stop(&self) {
        self.playhead.lock().playing = false;
    }

    pub fn is_playing(&self) -> bool {
        self.playhead.lock().playing
    }

    /// Adds this voice's output into an interleaved buffer with `channels` channels.
    /// Mono samples are spread across all output channels.
    pub fn mix_into(&self, output: &mut [f32], channels: u16) {
        let mut playhead = self.playhead.lock();
        if !playhead.playing {
            return;
        }

        let channels = channels.max(1) as usize;
        let source_channels = self.sample.channel_count() as usize;
        let total_frames = self.sample.frame_count();

        for frame in output.chunks_exact_mut(channels) {
            let index = playhead.position as usize;
            if index >= total_frames {
                playhead.playing = false;
                break;
            }
            let frac = (playhead.position - index as f64) as f32;

            for (channel, out) in frame.iter_mut().enumerate() {
                let source_channel = channel % source_channels;
                let s0 = self.sample.sample(index, source_channel);
                let s1 = if index + 1 < total_frames {
                    self.sample.sample(index + 1, source_channel)
                } else {
                    s0
                };
                *out += (s0 + (s1 - s0) * frac) * self.gain;
            }

            playhead.position += self.rate;
        }
    }
}

impl std::fmt::Debug for SampleVoice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SampleVoice")
            .field("instrument", &self.instrument)
            .field("pitch", &self.pitch)
            .field("rate", &self.rate)
            .field("playing", &self.is_playing())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pitch::PitchClass;

    fn voice(data: Vec<f32>, channels: u16, rate: f64) -> SampleVoice {
        SampleVoice::new(
            InstrumentId::new("test"),
            Pitch::new(0, PitchClass::C),
            LoadedSample::new(data, channels, 44100),
            rate,
            1.0,
        )
    }

    #[test]
    fn test_stopped_voice_is_silent() {
        let voice = voice(vec![1.0; 8], 1, 1.0);
        let mut output = vec![0.0; 4];
        voice.mix_into(&mut output, 1);
        assert_eq!(output, vec![0.0; 4]);
    }

    #[test]
    fn test_mono_is_spread_to_all_channels() {
        let voice = voice(vec![0.1, 0.2, 0.3], 1, 1.0);
        voice.trigger();

        let mut output = vec![0.0; 8];
        voice.mix_into(&mut output, 2);

        assert_eq!(output, vec![0.1, 0.1, 0.2, 0.2, 0.3, 0.3, 0.0, 0.0]);
        assert!(!voice.is_playing());
    }

    #[test]
    fn test_retrigger_restarts() {
        let voice = voice(vec![0.1, 0.2, 0.3, 0.4], 1, 1.0);
        voice.trigger();
        let mut output = vec![0.0; 2];
        voice.mix_into(&mut output, 1);
        assert_eq!(output, vec![0.1, 0.2]);

        voice.trigger();
        let mut output = vec![0.0; 2];
        voice.mix_into(&mut output, 1);
        assert_eq!(output, vec![0.1, 0.2]);
    }

    #[test]
    fn test_stop_is_immediate_and_idempotent() {
        let voice = voice(vec![0.5; 16], 1, 1.0);
        voice.trigger();
        voice.stop();
        voice.stop();

        let mut output = vec![0.0; 4];
        voice.mix_into(&mut output, 1);
        assert_eq!(output, vec![0.0; 4]);
    }

    #[test]
    fn test_double_rate_skips_frames() {
        let voice = voice(vec![0.0, 0.1, 0.2, 0.3, 0.4, 0.5], 1, 2.0);
        voice.trigger();

        let mut output = vec![0.0; 4];
        voice.mix_into(&mut output, 1);

        assert_eq!(output, vec![0.0, 0.2, 0.4, 0.0]);
    }

    #[test]
    fn test_half_rate_interpolates() {
        let voice = voice(vec![0.0, 1.0], 1, 0.5);
        voice.trigger();

        let mut output = vec![0.0; 3];
        voice.mix_into(&mut output, 1);

        assert_eq!(output, vec![0.0, 0.5, 1.0]);
    }
}
