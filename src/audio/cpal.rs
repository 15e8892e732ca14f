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
};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use parking_lot::Mutex;
use tracing::{error, info, span, Level};

use super::{mixer::AudioMixer, AudioError, Device as AudioDevice};
use crate::{config, playsync::CancelHandle};

/// The name that selects the host's default output device.
pub const DEFAULT_DEVICE: &str = "default";

/// A small wrapper around a cpal::Device. The output stream lives on its own thread, since
/// cpal streams can't move between threads.
pub struct Device {
    /// The name of the device.
    name: String,
    /// The maximum number of channels the device supports.
    max_channels: u16,
    /// The host ID of the device.
    host_id: cpal::HostId,
    /// The underlying cpal device.
    device: cpal::Device,
    /// The running output stream, if started.
    output: Mutex<Option<OutputThread>>,
}

/// Keeps the stream thread alive until cancelled.
struct OutputThread {
    cancel_handle: CancelHandle,
    join_handle: JoinHandle<()>,
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (Channels={}) ({})",
            self.name,
            self.max_channels,
            self.host_id.name()
        )
    }
}

impl Device {
    /// Lists cpal devices and produces the Device trait.
    pub fn list() -> Result<Vec<Box<dyn AudioDevice>>, AudioError> {
        Ok(Device::list_cpal_devices()?
            .into_iter()
            .map(|device| {
                let device: Box<dyn AudioDevice> = Box::new(device);
                device
            })
            .collect())
    }

    /// Lists cpal devices that have at least one output channel.
    fn list_cpal_devices() -> Result<Vec<Device>, AudioError> {
        // Suppress noisy output here.
        let _shh_stdout = shh::stdout()?;
        let _shh_stderr = shh::stderr()?;

        let mut devices: Vec<Device> = Vec::new();
        for host_id in cpal::available_hosts() {
            let host = match cpal::host_from_id(host_id) {
                Ok(host) => host,
                Err(e) => {
                    error!(err = %e, host = host_id.name(), "Host unavailable");
                    continue;
                }
            };
            let host_devices = match host.devices() {
                Ok(host_devices) => host_devices,
                Err(e) => {
                    error!(
                        err = e.to_string(),
                        host = host_id.name(),
                        "Unable to list devices for host"
                    );
                    continue;
                }
            };

            for device in host_devices {
                if let Some(device) = Device::from_cpal(host_id, device) {
                    devices.push(device);
                }
            }
        }

        devices.sort_by_key(|device| device.name.to_string());
        Ok(devices)
    }

    /// Wraps a cpal device, skipping devices with no usable outputs.
    fn from_cpal(host_id: cpal::HostId, device: cpal::Device) -> Option<Device> {
        let max_channels = device
            .supported_output_configs()
            .ok()?
            .map(|output_config| output_config.channels())
            .max()
            .unwrap_or(0);
        if max_channels == 0 {
            return None;
        }

        Some(Device {
            name: device.name().ok()?,
            max_channels,
            host_id,
            device,
            output: Mutex::new(None),
        })
    }

    /// Gets the given cpal device. The name "default" picks the default host's default output.
    pub fn get(config: &config::Audio) -> Result<Device, AudioError> {
        let name = config.device();
        let device = if name == DEFAULT_DEVICE {
            let host = cpal::default_host();
            host.default_output_device()
                .and_then(|device| Device::from_cpal(host.id(), device))
        } else {
            Device::list_cpal_devices()?
                .into_iter()
                .find(|device| device.name.trim() == name)
        };

        let device = device.ok_or_else(|| AudioError::DeviceNotFound(name.to_string()))?;
        if device.max_channels < config.channels() {
            return Err(AudioError::Device(format!(
                "{} supports at most {} channels, {} requested",
                device.name,
                device.max_channels,
                config.channels()
            )));
        }
        Ok(device)
    }
}

impl AudioDevice for Device {
    fn start(&self, mixer: Arc<AudioMixer>) -> Result<(), AudioError> {
        let mut output = self.output.lock();
        if output.is_some() {
            return Ok(());
        }

        let stream_config = cpal::StreamConfig {
            channels: mixer.num_channels(),
            sample_rate: cpal::SampleRate(mixer.sample_rate()),
            buffer_size: cpal::BufferSize::Default,
        };
        let device = self.device.clone();
        let device_name = self.name.clone();
        let cancel_handle = CancelHandle::new();
        let (ready_tx, ready_rx) = crossbeam_channel::bounded::<Result<(), AudioError>>(1);

        let join_handle = {
            let cancel_handle = cancel_handle.clone();
            thread::Builder::new()
                .name("gridloop-output".to_string())
                .spawn(move || {
                    let span = span!(Level::INFO, "output stream (cpal)", device = device_name);
                    let _enter = span.enter();

                    let stream = match device.build_output_stream(
                        &stream_config,
                        move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                            mixer.process_into(data);
                        },
                        |err| error!("CPAL output stream error: {}", err),
                        None,
                    ) {
                        Ok(stream) => stream,
                        Err(e) => {
                            let _ = ready_tx.send(Err(e.into()));
                            return;
                        }
                    };
                    if let Err(e) = stream.play() {
                        let _ = ready_tx.send(Err(e.into()));
                        return;
                    }
                    info!("CPAL output stream started");
                    let _ = ready_tx.send(Ok(()));

                    // Keep the stream alive until we're told to stop.
                    cancel_handle.wait();
                    drop(stream);
                    info!("CPAL output stream stopped");
                })?
        };

        match ready_rx.recv() {
            Ok(Ok(())) => {
                *output = Some(OutputThread {
                    cancel_handle,
                    join_handle,
                });
                Ok(())
            }
            Ok(Err(e)) => {
                let _ = join_handle.join();
                Err(e)
            }
            Err(_) => Err(AudioError::Device(
                "output thread exited before the stream started".to_string(),
            )),
        }
    }

    fn stop(&self) {
        let output = self.output.lock().take();
        if let Some(output) = output {
            output.cancel_handle.cancel();
            if output.join_handle.join().is_err() {
                error!(device = self.name, "Output thread panicked");
            }
        }
    }

    fn is_running(&self) -> bool {
        self.output.lock().is_some()
    }
}

impl Drop for Device {
    fn drop(&mut self) {
        self.stop();
    }
}
