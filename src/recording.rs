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

//! Capture of the mixed output to a WAV file.
//!
//! While recording, a tap on the mixer copies every rendered buffer onto a channel. A dedicated
//! writer thread drains the channel into the file, so the audio thread never touches the disk.

use std::{
    fs::File,
    io::BufWriter,
    path::{Path, PathBuf},
    sync::Arc,
    thread::{self, JoinHandle},
};

use hound::WavWriter;
use parking_lot::Mutex;
use tracing::{info, span, warn, Level};

use crate::{
    audio::{mixer::TapId, AudioError, AudioMixer, SampleFormat, WavFormat},
    events::{EngineEvent, EventBus},
    transport::Transport,
    util::filename_display,
};

#[derive(Debug, thiserror::Error)]
pub enum RecordingError {
    #[error("No recording target configured")]
    NoTarget,

    #[error("Unable to open {} for recording: {}", .0.display(), .1)]
    Open(PathBuf, #[source] hound::Error),

    #[error("Buffer of {samples} samples doesn't hold whole {channels}-channel frames")]
    PartialFrame { samples: usize, channels: u16 },

    #[error("Unable to write recording: {0}")]
    Write(#[from] hound::Error),

    #[error("Invalid recording format: {0}")]
    Format(#[from] AudioError),

    #[error("Unable to start recording writer: {0}")]
    Io(#[from] std::io::Error),
}

/// A WAV file being written to.
pub struct WavSink {
    path: PathBuf,
    format: WavFormat,
    writer: WavWriter<BufWriter<File>>,
    samples_written: u64,
}

impl WavSink {
    /// Creates (or truncates) the file at `path`.
    pub fn create(path: &Path, format: &WavFormat) -> Result<WavSink, RecordingError> {
        let writer = WavWriter::create(path, format.wav_spec())
            .map_err(|e| RecordingError::Open(path.to_path_buf(), e))?;
        Ok(WavSink {
            path: path.to_path_buf(),
            format: format.clone(),
            writer,
            samples_written: 0,
        })
    }

    /// Appends an interleaved buffer. Buffers must hold whole frames.
    pub fn write(&mut self, buffer: &[f32]) -> Result<(), RecordingError> {
        if buffer.len() % self.format.channels as usize != 0 {
            return Err(RecordingError::PartialFrame {
                samples: buffer.len(),
                channels: self.format.channels,
            });
        }
        match self.format.sample_format {
            SampleFormat::Float => {
                for sample in buffer {
                    self.writer.write_sample(*sample)?;
                }
            }
            SampleFormat::Int => {
                let max = ((1i64 << (self.format.bits_per_sample - 1)) - 1) as f32;
                for sample in buffer {
                    self.writer
                        .write_sample((sample.clamp(-1.0, 1.0) * max) as i32)?;
                }
            }
        }
        self.samples_written += buffer.len() as u64;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Frames written so far.
    pub fn frames_written(&self) -> u64 {
        self.samples_written / self.format.channels as u64
    }

    /// Flushes the header and closes the file. Returns the number of frames written.
    pub fn finalize(self) -> Result<u64, RecordingError> {
        let frames = self.frames_written();
        self.writer.finalize()?;
        Ok(frames)
    }
}

/// A recording in progress.
struct ActiveRecording {
    tap: TapId,
    writer: JoinHandle<()>,
}

/// Starts and stops capture of the mixer output. Stopping a recording also stops the transport.
pub struct RecordingController {
    target: Option<PathBuf>,
    format: WavFormat,
    mixer: Arc<AudioMixer>,
    events: Arc<EventBus>,
    active: Mutex<Option<ActiveRecording>>,
}

impl RecordingController {
    /// Creates a new recording controller. Recordings are written in the mixer's layout with
    /// the given sample format.
    pub fn new(
        target: Option<PathBuf>,
        sample_format: SampleFormat,
        bits_per_sample: u16,
        mixer: Arc<AudioMixer>,
        events: Arc<EventBus>,
    ) -> Result<RecordingController, RecordingError> {
        let format = WavFormat::new(
            mixer.num_channels(),
            mixer.sample_rate(),
            sample_format,
            bits_per_sample,
        )?;
        Ok(RecordingController {
            target,
            format,
            mixer,
            events,
            active: Mutex::new(None),
        })
    }

    /// Starts recording if it isn't already and the sink can be opened. Otherwise stops the
    /// transport and ends any recording. Returns whether we're now recording.
    pub fn toggle_record(&self, transport: &Transport) -> bool {
        let span = span!(Level::INFO, "recording");
        let _enter = span.enter();

        let mut active = self.active.lock();
        let recording = if active.is_some() {
            false
        } else {
            match self.begin() {
                Ok(recording) => {
                    *active = Some(recording);
                    true
                }
                Err(e) => {
                    warn!(err = %e, "Not recording");
                    false
                }
            }
        };

        if !recording {
            transport.hard_stop();
            if let Some(recording) = active.take() {
                self.finish(recording);
            }
        }

        self.events
            .publish(EngineEvent::RecordingStateChanged(recording));
        recording
    }

    pub fn is_recording(&self) -> bool {
        self.active.lock().is_some()
    }

    /// The configured sink target.
    pub fn target(&self) -> Option<&Path> {
        self.target.as_deref()
    }

    fn begin(&self) -> Result<ActiveRecording, RecordingError> {
        let path = self.target.as_ref().ok_or(RecordingError::NoTarget)?;
        let mut sink = WavSink::create(path, &self.format)?;
        let (tx, rx) = crossbeam_channel::unbounded::<Vec<f32>>();

        let writer = thread::Builder::new()
            .name("gridloop-recorder".to_string())
            .spawn(move || {
                for buffer in rx.iter() {
                    if let Err(e) = sink.write(&buffer) {
                        warn!(err = %e, "Dropping recorded buffer");
                    }
                }
                let file = filename_display(sink.path()).to_string();
                match sink.finalize() {
                    Ok(frames) => info!(file = %file, frames, "Recording finished"),
                    Err(e) => warn!(file = %file, err = %e, "Unable to finalize recording"),
                }
            })?;

        let tap = self.mixer.install_tap(Box::new(move |buffer: &[f32]| {
            // The writer only goes away once the tap is removed, so a failed send can be dropped.
            let _ = tx.send(buffer.to_vec());
        }));
        info!(file = filename_display(path), "Recording started");

        Ok(ActiveRecording { tap, writer })
    }

    fn finish(&self, recording: ActiveRecording) {
        // Dropping the tap closes the channel, which lets the writer finalize.
        self.mixer.remove_tap(recording.tap);
        if recording.writer.join().is_err() {
            warn!("Recording writer panicked");
        }
    }
}

impl Drop for RecordingController {
    fn drop(&mut self) {
        if let Some(recording) = self.active.lock().take() {
            self.finish(recording);
        }
    }
}

impl std::fmt::Debug for RecordingController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordingController")
            .field("target", &self.target)
            .field("format", &self.format)
            .field("recording", &self.is_recording())
            .finish()
    }
}
