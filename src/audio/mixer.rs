// Copyright (C) 2025 Michael Wilson <mike@mdwn.dev>
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
// Core audio mixing logic shared by the cpal device, the mock device and offline rendering.
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use crate::samples::SampleVoice;

/// Identifies an installed output tap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TapId(u64);

/// Receives every mixed buffer, interleaved, after the voices are summed.
pub type Tap = Box<dyn FnMut(&[f32]) + Send>;

/// Core audio mixing logic that's independent of any audio backend.
pub struct AudioMixer {
    /// Every voice attached to the mix. Stopped voices contribute nothing.
    voices: RwLock<Vec<Arc<SampleVoice>>>,
    /// Observers of the mixed output.
    taps: Mutex<Vec<(TapId, Tap)>>,
    next_tap_id: AtomicU64,
    /// Number of output channels
    num_channels: u16,
    /// Sample rate
    sample_rate: u32,
    /// Total frames produced so far.
    frames_rendered: AtomicU64,
}

impl AudioMixer {
    /// Creates a new audio mixer
    pub fn new(num_channels: u16, sample_rate: u32) -> Self {
        Self {
            voices: RwLock::new(Vec::new()),
            taps: Mutex::new(Vec::new()),
            next_tap_id: AtomicU64::new(0),
            num_channels: num_channels.max(1),
            sample_rate,
            frames_rendered: AtomicU64::new(0),
        }
    }

    /// Attaches a voice to the mix.
    pub fn add_voice(&self, voice: Arc<SampleVoice>) {
        self.voices.write().push(voice);
    }

    /// Number of voices attached.
    pub fn voice_count(&self) -> usize {
        self.voices.read().len()
    }

    /// Stops every attached voice.
    pub fn stop_all(&self) {
        self.voices.read().iter().for_each(|voice| voice.stop());
    }

    /// Fills an interleaved buffer with the next block of mixed output, then hands it to every tap.
    /// This is what the device callback calls.
    pub fn process_into(&self, output: &mut [f32]) {
        output.fill(0.0);

        for voice in self.voices.read().iter() {
            voice.mix_into(output, self.num_channels);
        }

        let frames = output.len() / self.num_channels as usize;
        self.frames_rendered
            .fetch_add(frames as u64, Ordering::Relaxed);

        let mut taps = self.taps.lock();
        for (_, tap) in taps.iter_mut() {
            tap(output);
        }
    }

    /// Processes multiple frames of audio mixing
    pub fn process_frames(&self, num_frames: usize) -> Vec<f32> {
        let mut frames = vec![0.0f32; num_frames * self.num_channels as usize];
        self.process_into(&mut frames);
        frames
    }

    /// Installs an observer of the mixed output. It sees every buffer produced from now on.
    pub fn install_tap(&self, tap: Tap) -> TapId {
        let id = TapId(self.next_tap_id.fetch_add(1, Ordering::Relaxed));
        self.taps.lock().push((id, tap));
        id
    }

    /// Removes a tap, dropping it. Returns false if it wasn't installed.
    pub fn remove_tap(&self, id: TapId) -> bool {
        let removed = {
            let mut taps = self.taps.lock();
            taps.iter()
                .position(|(tap_id, _)| *tap_id == id)
                .map(|index| taps.remove(index))
        };
        // The tap is dropped outside of the lock.
        removed.is_some()
    }

    pub fn tap_count(&self) -> usize {
        self.taps.lock().len()
    }

    /// Gets the number of output channels
    pub fn num_channels(&self) -> u16 {
        self.num_channels
    }

    /// Gets the sample rate
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Frames produced since the mixer was created.
    pub fn frames_rendered(&self) -> u64 {
        self.frames_rendered.load(Ordering::Relaxed)
    }
}

impl std::fmt::Debug for AudioMixer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AudioMixer")
            .field("voices", &self.voice_count())
            .field("taps", &self.tap_count())
            .field("num_channels", &self.num_channels)
            .field("sample_rate", &self.sample_rate)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instrument::InstrumentId;
    use crate::pitch::{Pitch, PitchClass};
    use crate::samples::LoadedSample;

    fn voice(data: Vec<f32>, channels: u16) -> Arc<SampleVoice> {
        Arc::new(SampleVoice::new(
            InstrumentId::new("test"),
            Pitch::new(0, PitchClass::C),
            LoadedSample::new(data, channels, 44100),
            1.0,
            1.0,
        ))
    }

    #[test]
    fn test_basic_mixing() {
        let mixer = AudioMixer::new(2, 44100);
        let v = voice(vec![0.1, 0.2, 0.3, 0.4], 2);
        mixer.add_voice(v.clone());

        assert_eq!(mixer.process_frames(1), vec![0.0, 0.0]);

        v.trigger();
        assert_eq!(mixer.process_frames(3), vec![0.1, 0.2, 0.3, 0.4, 0.0, 0.0]);
        assert_eq!(mixer.frames_rendered(), 4);
    }

    #[test]
    fn test_multiple_voice_mixing() {
        let mixer = AudioMixer::new(1, 44100);
        let a = voice(vec![0.25, 0.25], 1);
        let b = voice(vec![0.5], 1);
        mixer.add_voice(a.clone());
        mixer.add_voice(b.clone());
        a.trigger();
        b.trigger();

        assert_eq!(mixer.process_frames(2), vec![0.75, 0.25]);

        a.trigger();
        mixer.stop_all();
        assert_eq!(mixer.process_frames(1), vec![0.0]);
    }

    #[test]
    fn test_process_into_clears_buffer() {
        let mixer = AudioMixer::new(2, 44100);
        let mut output = vec![1.0; 4];
        mixer.process_into(&mut output);
        assert_eq!(output, vec![0.0; 4]);
    }

    #[test]
    fn test_taps_see_mixed_output() {
        let mixer = AudioMixer::new(1, 44100);
        let v = voice(vec![0.5, 0.5, 0.5], 1);
        mixer.add_voice(v.clone());
        v.trigger();

        let seen = Arc::new(Mutex::new(Vec::new()));
        let id = {
            let seen = seen.clone();
            mixer.install_tap(Box::new(move |buf| seen.lock().extend_from_slice(buf)))
        };
        assert_eq!(mixer.tap_count(), 1);

        mixer.process_frames(2);
        assert!(mixer.remove_tap(id));
        assert!(!mixer.remove_tap(id));
        mixer.process_frames(2);

        assert_eq!(*seen.lock(), vec![0.5, 0.5]);
    }
}
