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

use serde::Deserialize;

use super::AudioError;

/// Sample format enumeration for written audio.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SampleFormat {
    /// Integer samples (16, 24 or 32 bit).
    Int,
    /// 32-bit floating point samples.
    #[default]
    Float,
}

impl SampleFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            SampleFormat::Float => "float",
            SampleFormat::Int => "int",
        }
    }
}

impl fmt::Display for SampleFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The format a recording is written in.
#[derive(Debug, Clone, PartialEq)]
pub struct WavFormat {
    /// Number of interleaved channels.
    pub channels: u16,
    /// Sample rate in Hz.
    pub sample_rate: u32,
    /// Sample format (integer or float).
    pub sample_format: SampleFormat,
    /// Bits per sample.
    pub bits_per_sample: u16,
}

impl WavFormat {
    /// Creates a new format, rejecting combinations a WAV file can't hold.
    pub fn new(
        channels: u16,
        sample_rate: u32,
        sample_format: SampleFormat,
        bits_per_sample: u16,
    ) -> Result<Self, AudioError> {
        if channels == 0 {
            return Err(AudioError::UnsupportedFormat(
                "channel count must be greater than 0".to_string(),
            ));
        }
        if sample_rate == 0 {
            return Err(AudioError::UnsupportedFormat(
                "sample rate must be greater than 0".to_string(),
            ));
        }
        let supported = match sample_format {
            SampleFormat::Float => bits_per_sample == 32,
            SampleFormat::Int => matches!(bits_per_sample, 16 | 24 | 32),
        };
        if !supported {
            return Err(AudioError::UnsupportedFormat(format!(
                "{}-bit {} samples",
                bits_per_sample, sample_format
            )));
        }

        Ok(WavFormat {
            channels,
            sample_rate,
            sample_format,
            bits_per_sample,
        })
    }

    /// 32-bit float at the given layout.
    pub fn float(channels: u16, sample_rate: u32) -> Result<Self, AudioError> {
        WavFormat::new(channels, sample_rate, SampleFormat::Float, 32)
    }

    /// The matching hound spec.
    pub fn wav_spec(&self) -> hound::WavSpec {
        hound::WavSpec {
            channels: self.channels,
            sample_rate: self.sample_rate,
            bits_per_sample: self.bits_per_sample,
            sample_format: match self.sample_format {
                SampleFormat::Float => hound::SampleFormat::Float,
                SampleFormat::Int => hound::SampleFormat::Int,
            },
        }
    }
}
