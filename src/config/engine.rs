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
use std::path::{Path, PathBuf};

use config::{Config, File, FileFormat};
use serde::Deserialize;
use tracing::warn;

use super::audio::Audio;
use crate::audio::{SampleFormat, WavFormat};
use super::error::ConfigError;
use crate::instrument::{Instrument, InstrumentId};
use crate::pitch::{Pitch, PitchCatalog};
use crate::sequencer::{BlockIndex, NoteAtBlock, Pattern};

const DEFAULT_OCTAVES: u8 = 2;

fn default_octaves() -> u8 {
    DEFAULT_OCTAVES
}

fn default_gain() -> f32 {
    1.0
}

/// An instrument entry.
#[derive(Deserialize, Clone, Debug)]
pub struct InstrumentConfig {
    /// Unique instrument name.
    name: String,
    /// Sample file, relative to the config file.
    sample: PathBuf,
    /// The pitch the sample sounds at when played unshifted.
    #[serde(default)]
    root: Pitch,
    #[serde(default = "default_gain")]
    gain: f32,
}

/// A note in the initial pattern.
#[derive(Deserialize, Clone, Debug)]
pub struct NoteConfig {
    instrument: String,
    pitch: Pitch,
    block: BlockIndex,
}

/// Where recordings go, and what they're written as.
#[derive(Deserialize, Clone, Debug)]
pub struct Recording {
    path: PathBuf,
    #[serde(default)]
    sample_format: SampleFormat,
    /// Defaults to 32 for float and 16 for int.
    bits_per_sample: Option<u16>,
}

/// The YAML engine file.
#[derive(Deserialize, Clone, Debug)]
pub struct EngineConfig {
    /// Number of blocks in the loop.
    blocks: usize,
    blocks_per_second: f64,
    /// Size of the pitch catalog.
    #[serde(default = "default_octaves")]
    octaves: u8,
    #[serde(default)]
    audio: Audio,
    recording: Option<Recording>,
    #[serde(default)]
    instruments: Vec<InstrumentConfig>,
    #[serde(default)]
    pattern: Vec<NoteConfig>,

    /// Directory relative paths are resolved against.
    #[serde(skip)]
    base_dir: PathBuf,
}

impl EngineConfig {
    /// Parses and validates an engine file.
    pub fn deserialize(path: &Path) -> Result<EngineConfig, ConfigError> {
        let mut config = Config::builder()
            .add_source(File::from(path))
            .build()?
            .try_deserialize::<EngineConfig>()?;
        config.base_dir = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        config.validate()?;
        Ok(config)
    }

    /// Parses and validates YAML text, resolving relative paths against `base_dir`.
    pub fn from_yaml(yaml: &str, base_dir: &Path) -> Result<EngineConfig, ConfigError> {
        let mut config = Config::builder()
            .add_source(File::from_str(yaml, FileFormat::Yaml))
            .build()?
            .try_deserialize::<EngineConfig>()?;
        config.base_dir = base_dir.to_path_buf();
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.blocks == 0 {
            return Err(ConfigError::Invalid(
                "blocks must be greater than 0".to_string(),
            ));
        }
        if !self.blocks_per_second.is_finite() || self.blocks_per_second <= 0.0 {
            return Err(ConfigError::Invalid(format!(
                "blocks_per_second must be a positive number, got {}",
                self.blocks_per_second
            )));
        }
        if self.audio.channels() == 0 || self.audio.sample_rate() == 0 {
            return Err(ConfigError::Invalid(
                "audio channels and sample rate must be greater than 0".to_string(),
            ));
        }
        PitchCatalog::new(self.octaves)?;
        WavFormat::new(
            self.audio.channels(),
            self.audio.sample_rate(),
            self.recording_sample_format(),
            self.recording_bits_per_sample(),
        )
        .map_err(|e| ConfigError::Invalid(format!("recording: {}", e)))?;

        let mut names = HashSet::new();
        for instrument in &self.instruments {
            if instrument.name.trim().is_empty() {
                return Err(ConfigError::Invalid(
                    "instrument names can't be empty".to_string(),
                ));
            }
            if !names.insert(instrument.name.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "instrument {} is defined more than once",
                    instrument.name
                )));
            }
            if !instrument.gain.is_finite() || instrument.gain < 0.0 {
                return Err(ConfigError::Invalid(format!(
                    "instrument {} has an invalid gain {}",
                    instrument.name, instrument.gain
                )));
            }
        }
        Ok(())
    }

    pub fn blocks(&self) -> usize {
        self.blocks
    }

    pub fn blocks_per_second(&self) -> f64 {
        self.blocks_per_second
    }

    pub fn octaves(&self) -> u8 {
        self.octaves
    }

    /// The pitch catalog these settings describe.
    pub fn catalog(&self) -> Result<PitchCatalog, ConfigError> {
        Ok(PitchCatalog::new(self.octaves)?)
    }

    pub fn audio(&self) -> &Audio {
        &self.audio
    }

    /// Returns the resolved recording target, if any.
    pub fn recording_path(&self) -> Option<PathBuf> {
        self.recording
            .as_ref()
            .map(|recording| self.resolve(&recording.path))
    }

    /// Replaces the recording target, keeping any configured format.
    pub fn set_recording_path(&mut self, path: &Path) {
        match self.recording.as_mut() {
            Some(recording) => recording.path = path.to_path_buf(),
            None => {
                self.recording = Some(Recording {
                    path: path.to_path_buf(),
                    sample_format: SampleFormat::default(),
                    bits_per_sample: None,
                })
            }
        }
    }

    pub fn recording_sample_format(&self) -> SampleFormat {
        self.recording
            .as_ref()
            .map(|recording| recording.sample_format)
            .unwrap_or_default()
    }

    pub fn recording_bits_per_sample(&self) -> u16 {
        let explicit = self
            .recording
            .as_ref()
            .and_then(|recording| recording.bits_per_sample);
        explicit.unwrap_or(match self.recording_sample_format() {
            SampleFormat::Float => 32,
            SampleFormat::Int => 16,
        })
    }

    /// Returns the instruments with sample paths resolved.
    pub fn instruments(&self) -> Vec<Instrument> {
        self.instruments
            .iter()
            .map(|instrument| {
                Instrument::new(&instrument.name, self.resolve(&instrument.sample))
                    .with_root(instrument.root)
                    .with_gain(instrument.gain)
            })
            .collect()
    }

    /// Builds the initial pattern. Notes for instruments that aren't defined are skipped.
    pub fn pattern(&self) -> Pattern {
        let known: HashSet<&str> = self
            .instruments
            .iter()
            .map(|instrument| instrument.name.as_str())
            .collect();

        let mut pattern = Pattern::new();
        for note in &self.pattern {
            if !known.contains(note.instrument.as_str()) {
                warn!(
                    instrument = %note.instrument,
                    pitch = %note.pitch,
                    block = note.block,
                    "Skipping note for unknown instrument"
                );
                continue;
            }
            pattern
                .entry(InstrumentId::new(&note.instrument))
                .or_default()
                .insert(NoteAtBlock::new(note.pitch, note.block));
        }
        pattern
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir.join(path)
        }
    }
}

#[cfg(test)]
mod test {
    use std::error::Error;

    use super::*;
    use crate::pitch::PitchClass;

    const FULL: &str = r#"
        blocks: 8
        blocks_per_second: 4
        octaves: 3
        audio:
          device: mock
          sample_rate: 48000
        recording:
          path: takes/take.wav
          sample_format: int
          bits_per_sample: 24
        instruments:
          - name: kick
            sample: samples/kick.wav
            root: C1
            gain: 0.5
          - name: hat
            sample: /abs/hat.wav
        pattern:
          - { instrument: kick, pitch: C1, block: 0 }
          - { instrument: kick, pitch: C1, block: 4 }
          - { instrument: hat, pitch: "F#0", block: 2 }
          - { instrument: ghost, pitch: C0, block: 1 }
    "#;

    #[test]
    fn test_full_config() -> Result<(), Box<dyn Error>> {
        let config = EngineConfig::from_yaml(FULL, Path::new("/loops"))?;
        assert_eq!(config.recording_sample_format(), SampleFormat::Int);
        assert_eq!(config.recording_bits_per_sample(), 24);

        assert_eq!(config.blocks(), 8);
        assert_eq!(config.blocks_per_second(), 4.0);
        assert_eq!(config.catalog()?.len(), 36);
        assert_eq!(config.audio().device(), "mock");
        assert_eq!(config.audio().sample_rate(), 48000);
        assert_eq!(config.audio().channels(), 2);
        assert_eq!(
            config.recording_path(),
            Some(PathBuf::from("/loops/takes/take.wav"))
        );

        let instruments = config.instruments();
        assert_eq!(instruments.len(), 2);
        assert_eq!(instruments[0].id().as_str(), "kick");
        assert_eq!(instruments[0].sample(), Path::new("/loops/samples/kick.wav"));
        assert_eq!(instruments[0].root(), Pitch::new(1, PitchClass::C));
        assert_eq!(instruments[0].gain(), 0.5);
        assert_eq!(instruments[1].sample(), Path::new("/abs/hat.wav"));
        assert_eq!(instruments[1].root(), Pitch::default());
        assert_eq!(instruments[1].gain(), 1.0);

        let pattern = config.pattern();
        assert_eq!(pattern.len(), 2);
        assert_eq!(pattern[&InstrumentId::new("kick")].len(), 2);
        assert!(pattern[&InstrumentId::new("hat")]
            .contains(&NoteAtBlock::new(Pitch::new(0, PitchClass::FSharp), 2)));
        Ok(())
    }

    #[test]
    fn test_minimal_config_defaults() -> Result<(), Box<dyn Error>> {
        let config = EngineConfig::from_yaml("blocks: 4\nblocks_per_second: 2.5", Path::new(""))?;
        assert_eq!(config.octaves(), 2);
        assert_eq!(config.audio().device(), "default");
        assert!(config.recording_path().is_none());
        assert_eq!(config.recording_sample_format(), SampleFormat::Float);
        assert_eq!(config.recording_bits_per_sample(), 32);
        assert!(config.instruments().is_empty());
        assert!(config.pattern().is_empty());
        Ok(())
    }

    #[test]
    fn test_set_recording_path() -> Result<(), Box<dyn Error>> {
        let mut config = EngineConfig::from_yaml("blocks: 4\nblocks_per_second: 1", Path::new("/base"))?;
        config.set_recording_path(Path::new("out.wav"));
        assert_eq!(config.recording_path(), Some(PathBuf::from("/base/out.wav")));

        let yaml = "blocks: 4\nblocks_per_second: 1\nrecording:\n  path: a.wav\n  sample_format: int";
        let mut config = EngineConfig::from_yaml(yaml, Path::new("/base"))?;
        assert_eq!(config.recording_bits_per_sample(), 16);
        config.set_recording_path(Path::new("b.wav"));
        assert_eq!(config.recording_path(), Some(PathBuf::from("/base/b.wav")));
        assert_eq!(config.recording_sample_format(), SampleFormat::Int);
        Ok(())
    }

    #[test]
    fn test_invalid_configs() {
        let invalid = [
            "blocks: 0\nblocks_per_second: 1",
            "blocks: 4\nblocks_per_second: 0",
            "blocks: 4\nblocks_per_second: -2",
            "blocks: 4\nblocks_per_second: 1\noctaves: 0",
            "blocks: 4\nblocks_per_second: 1\noctaves: 9",
            "blocks: 4\nblocks_per_second: 1\naudio:\n  device: mock\n  channels: 0",
            "blocks: 4\nblocks_per_second: 1\ninstruments:\n  - { name: a, sample: a.wav }\n  - { name: a, sample: b.wav }",
            "blocks: 4\nblocks_per_second: 1\ninstruments:\n  - { name: '', sample: a.wav }",
            "blocks: 4\nblocks_per_second: 1\ninstruments:\n  - { name: a, sample: a.wav, gain: -1 }",
            "blocks: 4\nblocks_per_second: 1\npattern:\n  - { instrument: a, pitch: H2, block: 0 }",
            "blocks_per_second: 1",
            "blocks: 4\nblocks_per_second: 1\nrecording:\n  path: a.wav\n  bits_per_sample: 16",
            "blocks: 4\nblocks_per_second: 1\nrecording:\n  path: a.wav\n  sample_format: double",
        ];
        for yaml in invalid {
            assert!(
                EngineConfig::from_yaml(yaml, Path::new("")).is_err(),
                "expected error for {:?}",
                yaml
            );
        }
    }

    #[test]
    fn test_deserialize_file() -> Result<(), Box<dyn Error>> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("loop.yaml");
        std::fs::write(
            &path,
            "blocks: 2\nblocks_per_second: 1\ninstruments:\n  - { name: a, sample: a.wav }\n",
        )?;

        let config = EngineConfig::deserialize(&path)?;
        assert_eq!(config.instruments()[0].sample(), dir.path().join("a.wav"));

        assert!(matches!(
            EngineConfig::deserialize(&dir.path().join("missing.yaml")),
            Err(ConfigError::Load(_))
        ));
        Ok(())
    }
}
