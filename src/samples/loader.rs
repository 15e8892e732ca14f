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

//! Sample loading and caching for instrument voices.
//!
//! Samples are loaded entirely into memory at startup for zero-latency playback.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use rayon::prelude::*;
use tracing::{debug, info};

use crate::audio::{decode_file, AudioError};
use crate::util::filename_display;

/// A loaded sample that can be played back.
/// The sample data is stored in an Arc for efficient sharing between voices.
#[derive(Clone)]
pub struct LoadedSample {
    /// The sample data as f32 samples (interleaved if multi-channel).
    data: Arc<Vec<f32>>,
    /// Number of channels in the sample.
    channel_count: u16,
    /// Sample rate of the audio data.
    sample_rate: u32,
}

impl LoadedSample {
    /// Wraps already decoded interleaved data.
    pub fn new(data: Vec<f32>, channel_count: u16, sample_rate: u32) -> LoadedSample {
        LoadedSample {
            data: Arc::new(data),
            channel_count: channel_count.max(1),
            sample_rate,
        }
    }

    /// Returns the number of channels.
    pub fn channel_count(&self) -> u16 {
        self.channel_count
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Number of frames (samples per channel).
    pub fn frame_count(&self) -> usize {
        self.data.len() / self.channel_count as usize
    }

    /// The sample for a frame and channel, or silence past the end.
    #[inline]
    pub fn sample(&self, frame: usize, channel: usize) -> f32 {
        self.data
            .get(frame * self.channel_count as usize + channel)
            .copied()
            .unwrap_or(0.0)
    }

    pub fn duration(&self) -> Duration {
        Duration::from_secs_f64(self.frame_count() as f64 / self.sample_rate as f64)
    }

    /// Returns true if both handles share the same decoded buffer.
    pub fn shares_data_with(&self, other: &LoadedSample) -> bool {
        Arc::ptr_eq(&self.data, &other.data)
    }

    /// Returns the memory size in bytes.
    pub fn memory_size(&self) -> usize {
        self.data.len() * std::mem::size_of::<f32>()
    }
}

/// Manages loading and caching of sample data.
pub struct SampleLoader {
    /// Cache of loaded samples by file path.
    cache: HashMap<PathBuf, LoadedSample>,
    /// Target sample rate for resampling (matches the mixer).
    target_sample_rate: u32,
}

impl SampleLoader {
    /// Creates a new sample loader.
    pub fn new(target_sample_rate: u32) -> Self {
        Self {
            cache: HashMap::new(),
            target_sample_rate,
        }
    }

    /// Loads a sample from a file into memory.
    /// Returns a cached version if already loaded.
    pub fn load(&mut self, path: &Path) -> Result<LoadedSample, AudioError> {
        if let Some(sample) = self.cache.get(path) {
            debug!(path = ?path, "Using cached sample");
            return Ok(sample.clone());
        }

        let loaded = Self::decode(path, self.target_sample_rate)?;
        self.cache.insert(path.to_path_buf(), loaded.clone());
        Ok(loaded)
    }

    /// Loads every path that isn't cached yet, decoding files in parallel.
    /// Fails on the first file that can't be decoded.
    pub fn load_all<'a>(
        &mut self,
        paths: impl IntoIterator<Item = &'a Path>,
    ) -> Result<(), AudioError> {
        let mut missing: Vec<&Path> = paths
            .into_iter()
            .filter(|path| !self.cache.contains_key(*path))
            .collect();
        missing.sort();
        missing.dedup();

        let target_sample_rate = self.target_sample_rate;
        let decoded = missing
            .par_iter()
            .map(|path| Self::decode(path, target_sample_rate).map(|s| (path.to_path_buf(), s)))
            .collect::<Result<Vec<(PathBuf, LoadedSample)>, AudioError>>()?;

        self.cache.extend(decoded);
        Ok(())
    }

    /// Returns the total memory used by cached samples.
    pub fn total_memory_usage(&self) -> usize {
        self.cache.values().map(|s| s.memory_size()).sum()
    }

    fn decode(path: &Path, target_sample_rate: u32) -> Result<LoadedSample, AudioError> {
        info!(file = filename_display(path), "Loading sample into memory");

        let decoded = decode_file(path)?;
        let channel_count = decoded.channel_count;

        let (final_samples, final_sample_rate) = if decoded.sample_rate != target_sample_rate {
            info!(
                source_rate = decoded.sample_rate,
                target_rate = target_sample_rate,
                "Resampling sample"
            );
            let resampled = resample(
                &decoded.samples,
                channel_count,
                decoded.sample_rate,
                target_sample_rate,
            );
            (resampled, target_sample_rate)
        } else {
            (decoded.samples, decoded.sample_rate)
        };

        let loaded = LoadedSample::new(final_samples, channel_count, final_sample_rate);

        info!(
            file = filename_display(path),
            channels = channel_count,
            sample_rate = final_sample_rate,
            duration_ms = loaded.duration().as_millis(),
            memory_kb = loaded.memory_size() / 1024,
            "Sample loaded"
        );

        Ok(loaded)
    }
}

/// Resamples interleaved samples from one rate to another using linear interpolation.
/// Linear interpolation is plenty for drum hits and one-shots.
fn resample(samples: &[f32], channel_count: u16, source_rate: u32, target_rate: u32) -> Vec<f32> {
    let ratio = target_rate as f64 / source_rate as f64;
    let channels = channel_count.max(1) as usize;
    let source_frames = samples.len() / channels;
    let target_frames = (source_frames as f64 * ratio).ceil() as usize;

    let mut output = Vec::with_capacity(target_frames * channels);

    for target_frame in 0..target_frames {
        let source_pos = target_frame as f64 / ratio;
        let source_frame = source_pos.floor() as usize;
        let frac = source_pos.fract() as f32;

        for channel in 0..channels {
            let idx0 = source_frame * channels + channel;
            let idx1 = (source_frame + 1) * channels + channel;

            let s0 = samples.get(idx0).copied().unwrap_or(0.0);
            let s1 = samples.get(idx1).copied().unwrap_or(s0);

            output.push(s0 + (s1 - s0) * frac);
        }
    }

    output
}

impl std::fmt::Debug for SampleLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SampleLoader")
            .field("cached_samples", &self.cache.len())
            .field("target_sample_rate", &self.target_sample_rate)
            .field("total_memory_kb", &(self.total_memory_usage() / 1024))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{write_constant_wav, write_wav};

    #[test]
    fn test_resample_length() {
        let source_rate = 44100;
        let source_samples: Vec<f32> = (0..4410)
            .map(|i| (2.0 * std::f32::consts::PI * 440.0 * i as f32 / source_rate as f32).sin())
            .collect();

        let result = resample(&source_samples, 1, source_rate, 48000);

        let expected_len = (4410.0_f64 * 48000.0 / 44100.0).ceil() as usize;
        assert_eq!(result.len(), expected_len);
    }

    #[test]
    fn test_resample_stereo_keeps_channels() {
        let source_samples = vec![1.0f32, -1.0, 1.0, -1.0, 1.0, -1.0, 1.0, -1.0];

        let result = resample(&source_samples, 2, 44100, 48000);

        assert_eq!(result.len() % 2, 0);
        assert!((result[0] - 1.0).abs() < 0.1);
        assert!((result[1] - (-1.0)).abs() < 0.1);
    }

    #[test]
    fn test_load_is_cached() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("kick.wav");
        write_constant_wav(path.clone(), 0.5, 100, 44100).unwrap();

        let mut loader = SampleLoader::new(44100);
        let first = loader.load(&path).unwrap();
        let second = loader.load(&path).unwrap();

        assert!(first.shares_data_with(&second));
        assert_eq!(first.frame_count(), 100);
        assert_eq!(first.sample(0, 0), 0.5);
        assert_eq!(first.sample(100, 0), 0.0);
        assert_eq!(loader.total_memory_usage(), 400);
    }

    #[test]
    fn test_load_resamples_to_target() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("snare.wav");
        write_wav(path.clone(), vec![vec![0.25; 22050]], 22050).unwrap();

        let mut loader = SampleLoader::new(44100);
        let sample = loader.load(&path).unwrap();

        assert_eq!(sample.sample_rate(), 44100);
        assert_eq!(sample.frame_count(), 44100);
    }

    #[test]
    fn test_load_all_dedups_and_fails_fast() {
        let dir = tempfile::tempdir().unwrap();
        let good = dir.path().join("good.wav");
        write_constant_wav(good.clone(), 0.1, 10, 44100).unwrap();

        let mut loader = SampleLoader::new(44100);
        loader
            .load_all([good.as_path(), good.as_path()])
            .unwrap();
        assert_eq!(loader.cache.len(), 1);

        let missing = dir.path().join("missing.wav");
        assert!(loader.load_all([missing.as_path()]).is_err());
    }
}
