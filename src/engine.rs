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
use std::{collections::HashSet, fmt, path::PathBuf, sync::Arc, time::Duration};

use crossbeam_channel::Receiver;
use tracing::{info, span, Level};

use crate::{
    audio::{AudioError, AudioMixer, Device, SampleFormat},
    config::{ConfigError, EngineConfig},
    events::{EngineEvent, EventBus},
    instrument::{Instrument, InstrumentId},
    pitch::{Pitch, PitchCatalog, PitchError},
    recording::{RecordingController, RecordingError},
    samples::VoicePool,
    scheduler::Scheduler,
    sequencer::{BlockIndex, Pattern, SequencerState},
    transport::{RunMode, Transport, TransportError},
};

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("Audio error: {0}")]
    Audio(#[from] AudioError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Pitch error: {0}")]
    Pitch(#[from] PitchError),

    #[error("Recording error: {0}")]
    Recording(#[from] RecordingError),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Invalid engine settings: {0}")]
    InvalidSettings(String),

    #[error("Unable to record to {}", .0.display())]
    RecordingUnavailable(PathBuf),
}

/// Fixed parameters of an engine.
#[derive(Clone, Debug)]
pub struct EngineSettings {
    /// Number of blocks in the loop.
    pub block_count: usize,
    pub blocks_per_second: f64,
    /// Size of the pitch catalog.
    pub octaves: u8,
    /// Where recordings are written. Recording is unavailable without one.
    pub recording_target: Option<PathBuf>,
    pub recording_sample_format: SampleFormat,
    pub recording_bits_per_sample: u16,
}

impl EngineSettings {
    fn validate(&self) -> Result<(), EngineError> {
        if self.block_count == 0 {
            return Err(EngineError::InvalidSettings(
                "block count must be greater than 0".to_string(),
            ));
        }
        if !self.blocks_per_second.is_finite() || self.blocks_per_second <= 0.0 {
            return Err(EngineError::InvalidSettings(format!(
                "blocks per second must be positive, got {}",
                self.blocks_per_second
            )));
        }
        Ok(())
    }
}

/// The step sequencer. Owns the voices, the transport and the recorder, and fans their
/// notifications out to subscribers.
pub struct Engine {
    transport: Transport,
    recorder: RecordingController,
    voices: Arc<VoicePool>,
    mixer: Arc<AudioMixer>,
    events: Arc<EventBus>,
    instruments: Vec<Instrument>,
    output: Option<Arc<dyn Device>>,
}

impl Engine {
    /// Builds the engine: decodes every instrument sample, builds the voices and applies the
    /// initial pattern. Fails if any sample can't be decoded.
    pub fn new(
        instruments: Vec<Instrument>,
        initial: &Pattern,
        settings: EngineSettings,
        mixer: Arc<AudioMixer>,
        scheduler: Arc<dyn Scheduler>,
    ) -> Result<Engine, EngineError> {
        let span = span!(Level::INFO, "engine");
        let _enter = span.enter();

        settings.validate()?;
        let mut names = HashSet::new();
        if let Some(duplicate) = instruments.iter().find(|i| !names.insert(i.id().clone())) {
            return Err(EngineError::InvalidSettings(format!(
                "instrument {} is defined more than once",
                duplicate.id()
            )));
        }

        let catalog = PitchCatalog::new(settings.octaves)?;
        let voices = Arc::new(VoicePool::new(&instruments, &catalog, &mixer)?);

        let events = Arc::new(EventBus::new());
        let mut state = SequencerState::new(
            instruments.iter().map(|instrument| instrument.id().clone()),
            settings.block_count,
            catalog,
            events.clone(),
        );
        state.load(initial);

        let transport = Transport::new(
            state,
            settings.blocks_per_second,
            voices.clone(),
            scheduler,
            events.clone(),
        )?;
        let recorder = RecordingController::new(
            settings.recording_target,
            settings.recording_sample_format,
            settings.recording_bits_per_sample,
            mixer.clone(),
            events.clone(),
        )?;

        info!(
            instruments = instruments.len(),
            blocks = settings.block_count,
            blocks_per_second = settings.blocks_per_second,
            octaves = settings.octaves,
            "Engine ready"
        );

        Ok(Engine {
            transport,
            recorder,
            voices,
            mixer,
            events,
            instruments,
            output: None,
        })
    }

    /// Builds the engine described by a config file, with a mixer in the configured layout.
    pub fn from_config(
        config: &EngineConfig,
        scheduler: Arc<dyn Scheduler>,
    ) -> Result<Engine, EngineError> {
        let mixer = Arc::new(AudioMixer::new(
            config.audio().channels(),
            config.audio().sample_rate(),
        ));
        Engine::new(
            config.instruments(),
            &config.pattern(),
            EngineSettings {
                block_count: config.blocks(),
                blocks_per_second: config.blocks_per_second(),
                octaves: config.octaves(),
                recording_target: config.recording_path(),
                recording_sample_format: config.recording_sample_format(),
                recording_bits_per_sample: config.recording_bits_per_sample(),
            },
            mixer,
            scheduler,
        )
    }

    /// Attaches an output device. It's started by [`Engine::prepare_for_playing`].
    pub fn with_output(mut self, device: Arc<dyn Device>) -> Engine {
        self.output = Some(device);
        self
    }

    /// Silences every voice and makes sure the output is running.
    pub fn prepare_for_playing(&self) -> Result<(), EngineError> {
        self.voices.stop_all();
        if let Some(output) = &self.output {
            if !output.is_running() {
                info!(device = %output, "Starting output");
            }
            output.start(self.mixer.clone())?;
        }
        Ok(())
    }

    pub fn start(&self) {
        self.transport.start();
    }

    pub fn hard_stop(&self) {
        self.transport.hard_stop();
    }

    pub fn register_note(&self, pitch: Pitch, instrument: &InstrumentId, block: BlockIndex) {
        self.transport.register_note(pitch, instrument, block);
    }

    pub fn deregister_note(&self, pitch: Pitch, instrument: &InstrumentId, block: BlockIndex) {
        self.transport.deregister_note(pitch, instrument, block);
    }

    pub fn toggle_note(&self, pitch: Pitch, instrument: &InstrumentId, block: BlockIndex) {
        self.transport.toggle_note(pitch, instrument, block);
    }

    /// Toggles recording. Returns whether we're recording afterwards.
    pub fn toggle_record(&self) -> bool {
        self.recorder.toggle_record(&self.transport)
    }

    pub fn is_recording(&self) -> bool {
        self.recorder.is_recording()
    }

    pub fn mode(&self) -> RunMode {
        self.transport.mode()
    }

    pub fn current_block(&self) -> BlockIndex {
        self.transport.current_block()
    }

    /// Returns a snapshot of the programmed notes.
    pub fn pattern(&self) -> Pattern {
        self.transport.pattern()
    }

    /// Length of one pass over the loop.
    pub fn loop_duration(&self) -> Duration {
        self.transport.loop_duration()
    }

    /// Subscribes to engine notifications.
    pub fn subscribe(&self) -> Receiver<EngineEvent> {
        self.events.subscribe()
    }

    pub fn events(&self) -> &Arc<EventBus> {
        &self.events
    }

    pub fn mixer(&self) -> &Arc<AudioMixer> {
        &self.mixer
    }

    pub fn voices(&self) -> &VoicePool {
        &self.voices
    }

    pub fn instruments(&self) -> &[Instrument] {
        &self.instruments
    }

    /// The configured recording target.
    pub fn recording_target(&self) -> Option<PathBuf> {
        self.recorder.target().map(PathBuf::from)
    }
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("transport", &self.transport)
            .field("recorder", &self.recorder)
            .field("voices", &self.voices)
            .field("mixer", &self.mixer)
            .field("output", &self.output.as_ref().map(|o| o.to_string()))
            .finish()
    }
}
