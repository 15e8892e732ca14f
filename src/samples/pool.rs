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
use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, info, trace};

use super::loader::SampleLoader;
use super::voice::SampleVoice;
use super::VoiceBackend;
use crate::audio::mixer::AudioMixer;
use crate::audio::AudioError;
use crate::instrument::{Instrument, InstrumentId};
use crate::pitch::{Pitch, PitchCatalog};

/// Every voice the engine can play, one per (instrument, pitch).
///
/// Voices are built once and attached to the mixer; after construction the table never changes.
pub struct VoicePool {
    voices: HashMap<(InstrumentId, Pitch), Arc<SampleVoice>>,
    /// Total memory held by the decoded samples.
    memory_usage: usize,
}

impl VoicePool {
    /// Decodes every instrument's sample once and builds a tuned voice for each catalog pitch.
    /// A sample that fails to decode fails the whole pool.
    pub fn new(
        instruments: &[Instrument],
        catalog: &PitchCatalog,
        mixer: &AudioMixer,
    ) -> Result<VoicePool, AudioError> {
        let mut loader = SampleLoader::new(mixer.sample_rate());
        loader.load_all(instruments.iter().map(Instrument::sample))?;

        let mut voices = HashMap::with_capacity(instruments.len() * catalog.len());
        for instrument in instruments {
            let sample = loader.load(instrument.sample())?;
            for pitch in catalog.pitches() {
                let voice = Arc::new(SampleVoice::new(
                    instrument.id().clone(),
                    pitch,
                    sample.clone(),
                    pitch.playback_rate(instrument.root()),
                    instrument.gain(),
                ));
                mixer.add_voice(voice.clone());
                voices.insert((instrument.id().clone(), pitch), voice);
            }
            debug!(
                instrument = %instrument.id(),
                root = %instrument.root(),
                voices = catalog.len(),
                "Instrument voices built"
            );
        }

        let memory_usage = loader.total_memory_usage();
        info!(
            instruments = instruments.len(),
            voices = voices.len(),
            memory_kb = memory_usage / 1024,
            "Voice pool ready"
        );

        Ok(VoicePool {
            voices,
            memory_usage,
        })
    }

    /// Looks up the voice for an (instrument, pitch) pair.
    pub fn voice(&self, instrument: &InstrumentId, pitch: Pitch) -> Option<&Arc<SampleVoice>> {
        self.voices.get(&(instrument.clone(), pitch))
    }

    /// Number of voices in the pool.
    pub fn len(&self) -> usize {
        self.voices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.voices.is_empty()
    }

    /// Number of voices currently sounding.
    pub fn active_voice_count(&self) -> usize {
        self.voices.values().filter(|v| v.is_playing()).count()
    }

    /// Silences every voice.
    pub fn stop_all(&self) {
        self.voices.values().for_each(|voice| voice.stop());
    }

    /// Returns the memory used by decoded samples.
    pub fn memory_usage(&self) -> usize {
        self.memory_usage
    }
}

impl VoiceBackend for VoicePool {
    fn trigger(&self, instrument: &InstrumentId, pitch: Pitch) {
        match self.voice(instrument, pitch) {
            Some(voice) => {
                voice.trigger();
                trace!(instrument = %instrument, pitch = %pitch, "Voice triggered");
            }
            None => debug!(instrument = %instrument, pitch = %pitch, "No voice to trigger"),
        }
    }

    fn stop(&self, instrument: &InstrumentId, pitch: Pitch) {
        if let Some(voice) = self.voice(instrument, pitch) {
            voice.stop();
            trace!(instrument = %instrument, pitch = %pitch, "Voice stopped");
        }
    }
}

impl std::fmt::Debug for VoicePool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VoicePool")
            .field("voices", &self.voices.len())
            .field("active_voices", &self.active_voice_count())
            .field("memory_kb", &(self.memory_usage / 1024))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pitch::PitchClass;
    use crate::testutil::write_constant_wav;

    #[test]
    fn test_pool_builds_one_voice_per_pitch() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("kick.wav");
        write_constant_wav(path.clone(), 0.5, 64, 44100).unwrap();

        let instruments = vec![
            Instrument::new("kick", &path),
            Instrument::new("low-kick", &path).with_root(Pitch::new(1, PitchClass::C)),
        ];
        let mixer = AudioMixer::new(2, 44100);
        let catalog = PitchCatalog::new(2).unwrap();
        let pool = VoicePool::new(&instruments, &catalog, &mixer).unwrap();

        assert_eq!(pool.len(), 48);
        assert_eq!(mixer.voice_count(), 48);

        let kick = InstrumentId::new("kick");
        let low_kick = InstrumentId::new("low-kick");
        let c1 = Pitch::new(1, PitchClass::C);
        let a = pool.voice(&kick, c1).unwrap();
        let b = pool.voice(&low_kick, c1).unwrap();
        assert!(a.sample().shares_data_with(b.sample()));
        assert!((a.rate() - 2.0).abs() < 1e-9);
        assert_eq!(b.rate(), 1.0);
    }

    #[test]
    fn test_trigger_and_stop() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hat.wav");
        write_constant_wav(path.clone(), 0.25, 64, 44100).unwrap();

        let mixer = AudioMixer::new(1, 44100);
        let catalog = PitchCatalog::new(1).unwrap();
        let pool = VoicePool::new(&[Instrument::new("hat", &path)], &catalog, &mixer).unwrap();
        let hat = InstrumentId::new("hat");
        let c0 = Pitch::new(0, PitchClass::C);

        pool.trigger(&hat, c0);
        assert_eq!(pool.active_voice_count(), 1);
        assert_eq!(mixer.process_frames(2), vec![0.25, 0.25]);

        pool.stop(&hat, c0);
        pool.stop(&hat, c0);
        assert_eq!(pool.active_voice_count(), 0);
        assert_eq!(mixer.process_frames(2), vec![0.0, 0.0]);

        // Unknown pairs are ignored.
        pool.trigger(&InstrumentId::new("ghost"), c0);
        assert_eq!(pool.active_voice_count(), 0);
    }

    #[test]
    fn test_missing_sample_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let mixer = AudioMixer::new(2, 44100);
        let catalog = PitchCatalog::new(1).unwrap();
        let result = VoicePool::new(
            &[Instrument::new("gone", dir.path().join("gone.wav"))],
            &catalog,
            &mixer,
        );
        assert!(result.is_err());
        assert_eq!(mixer.voice_count(), 0);
    }

    #[test]
    fn test_empty_pool() {
        let mixer = AudioMixer::new(2, 44100);
        let pool = VoicePool::new(&[], &PitchCatalog::new(1).unwrap(), &mixer).unwrap();
        assert!(pool.is_empty());
    }
}
