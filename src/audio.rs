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
use std::{fmt, sync::Arc};

use crate::config;

pub mod cpal;
pub mod decode;
pub mod error;
pub mod format;
pub mod mixer;
pub mod mock;

pub use decode::decode_file;
pub use error::AudioError;
pub use format::{SampleFormat, WavFormat};
pub use mixer::AudioMixer;

/// An output that continuously pulls audio from a mixer.
pub trait Device: fmt::Display + Send + Sync {
    /// Starts pulling from the mixer. Starting a running device does nothing.
    fn start(&self, mixer: Arc<AudioMixer>) -> Result<(), AudioError>;

    /// Stops the output stream, if running.
    fn stop(&self);

    /// Returns true once the output stream is running.
    fn is_running(&self) -> bool;
}

/// Lists devices known to cpal.
pub fn list_devices() -> Result<Vec<Box<dyn Device>>, AudioError> {
    cpal::Device::list()
}

/// Gets a device with the given name. Names starting with "mock" produce a mock device.
pub fn get_device(config: &config::Audio) -> Result<Arc<dyn Device>, AudioError> {
    let device = config.device();
    if device.starts_with("mock") {
        return Ok(Arc::new(mock::Device::get(device)));
    };

    Ok(Arc::new(cpal::Device::get(config)?))
}
