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
use std::{
    fmt,
    sync::Arc,
    thread::{self, JoinHandle},
    time::{Duration, Instant},
};

use parking_lot::Mutex;
use tracing::{error, info, span, Level};

use super::{mixer::AudioMixer, AudioError};
use crate::playsync::CancelHandle;

/// Frames rendered per mock period.
const PERIOD_FRAMES: usize = 256;

/// A mock device. Pulls audio from the mixer in real time and throws it away.
pub struct Device {
    name: String,
    output: Mutex<Option<(CancelHandle, JoinHandle<()>)>>,
}

impl Device {
    /// Gets the given mock device.
    pub fn get(name: &str) -> Device {
        Device {
            name: name.to_string(),
            output: Mutex::new(None),
        }
    }
}

impl super::Device for Device {
    fn start(&self, mixer: Arc<AudioMixer>) -> Result<(), AudioError> {
        let mut output = self.output.lock();
        if output.is_some() {
            return Ok(());
        }

        let cancel_handle = CancelHandle::new();
        let join_handle = {
            let cancel_handle = cancel_handle.clone();
            let name = self.name.clone();
            thread::Builder::new()
                .name("gridloop-mock-output".to_string())
                .spawn(move || {
                    let span = span!(Level::INFO, "output stream (mock)", device = name);
                    let _enter = span.enter();
                    info!("Mock output started");

                    let channels = mixer.num_channels() as usize;
                    let period = Duration::from_secs_f64(
                        PERIOD_FRAMES as f64 / mixer.sample_rate().max(1) as f64,
                    );
                    let mut buffer = vec![0.0f32; PERIOD_FRAMES * channels];
                    let started = Instant::now();
                    let mut periods: u32 = 0;

                    while !cancel_handle.is_cancelled() {
                        mixer.process_into(&mut buffer);
                        periods += 1;
                        let next = started + period * periods;
                        thread::sleep(next.saturating_duration_since(Instant::now()));
                    }
                    info!("Mock output stopped");
                })?
        };

        *output = Some((cancel_handle, join_handle));
        Ok(())
    }

    fn stop(&self) {
        let output = self.output.lock().take();
        if let Some((cancel_handle, join_handle)) = output {
            cancel_handle.cancel();
            if join_handle.join().is_err() {
                error!(device = self.name, "Mock output thread panicked");
            }
        }
    }

    fn is_running(&self) -> bool {
        self.output.lock().is_some()
    }
}

impl Drop for Device {
    fn drop(&mut self) {
        super::Device::stop(self);
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (Mock)", self.name,)
    }
}

#[cfg(test)]
mod test {
    use std::sync::Arc;

    use super::*;
    use crate::audio::Device as _;
    use crate::testutil::eventually;

    #[test]
    fn test_mock_device_pulls_from_mixer() {
        let mixer = Arc::new(AudioMixer::new(2, 44100));
        let device = Device::get("mock-device");
        assert!(!device.is_running());

        device.start(mixer.clone()).unwrap();
        // Starting twice is harmless.
        device.start(mixer.clone()).unwrap();
        assert!(device.is_running());

        eventually(
            || mixer.frames_rendered() >= PERIOD_FRAMES as u64 * 2,
            "Mock device never rendered audio",
        );

        device.stop();
        assert!(!device.is_running());
        let rendered = mixer.frames_rendered();
        thread::sleep(Duration::from_millis(20));
        assert_eq!(mixer.frames_rendered(), rendered);
    }

    #[test]
    fn test_display() {
        assert_eq!(Device::get("mock").to_string(), "mock (Mock)");
    }
}
