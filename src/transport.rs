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
use std::{
    fmt,
    sync::{Arc, Weak},
    time::Duration,
};

use parking_lot::Mutex;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info, span, trace, Level, Span};

use crate::{
    events::{EngineEvent, EventBus},
    instrument::InstrumentId,
    pitch::Pitch,
    playsync::CancelHandle,
    samples::VoiceBackend,
    scheduler::Scheduler,
    sequencer::{BlockIndex, Pattern, SequencerState},
};

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Blocks per second must be positive and finite, got {0}")]
    InvalidRate(f64),
}

/// Whether the transport is running.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    #[default]
    Stopped,
    Playing,
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunMode::Stopped => write!(f, "stopped"),
            RunMode::Playing => write!(f, "playing"),
        }
    }
}

/// Everything the transport touches. All of it sits behind one mutex, so ticks and public
/// calls are serialized against each other.
struct TransportCore {
    mode: RunMode,
    current_block: BlockIndex,
    /// Time between blocks.
    interval: Duration,
    state: SequencerState,
    voices: Arc<dyn VoiceBackend>,
    scheduler: Arc<dyn Scheduler>,
    events: Arc<EventBus>,
    /// The next scheduled tick, if the loop is running.
    pending: Option<CancelHandle>,
    /// Scheduler time at which block 0 of the current run fired.
    origin: Duration,
    /// Ticks fired since the origin.
    ticks: u32,
    /// Bumped on every start and stop. Ticks scheduled under an older run are dropped.
    run: u64,
    span: Span,
}

impl TransportCore {
    /// Moves the loop from `old_block` to `new_block` and schedules the following tick.
    fn advance(
        &mut self,
        this: &Weak<Mutex<TransportCore>>,
        run: u64,
        new_block: BlockIndex,
        old_block: Option<BlockIndex>,
    ) {
        if run != self.run {
            debug!(run, current = self.run, "Dropping tick from a previous run");
            return;
        }

        if let Some(old_block) = old_block {
            for (instrument, pitch) in self.state.notes_at(old_block) {
                self.voices.stop(&instrument, pitch);
            }
        }

        if self.mode != RunMode::Playing {
            debug!(block = new_block, "Transport stopped, ending tick chain");
            self.pending = None;
            return;
        }

        self.current_block = new_block;
        self.events.publish(EngineEvent::BlockChanged(new_block));

        let notes = self.state.notes_at(new_block);
        trace!(block = new_block, notes = notes.len(), "Block");
        for (instrument, pitch) in notes {
            self.voices.trigger(&instrument, pitch);
        }

        // Ticks are pinned to the origin so that late callbacks don't accumulate drift.
        self.ticks += 1;
        let due = self.origin + self.interval * self.ticks;
        let delay = due.saturating_sub(self.scheduler.now());
        let next_block = (new_block + 1) % self.state.block_count().max(1);
        let this = this.clone();
        self.pending = Some(self.scheduler.schedule_after(
            delay,
            Box::new(move || Transport::tick(&this, run, next_block, new_block)),
        ));
    }
}

/// The block clock. Walks the loop one block at a time while playing, stopping the previous
/// block's voices and triggering the new block's.
pub struct Transport {
    core: Arc<Mutex<TransportCore>>,
}

impl Transport {
    /// Creates a new, stopped transport over the given sequencer state.
    pub fn new(
        state: SequencerState,
        blocks_per_second: f64,
        voices: Arc<dyn VoiceBackend>,
        scheduler: Arc<dyn Scheduler>,
        events: Arc<EventBus>,
    ) -> Result<Transport, TransportError> {
        if !blocks_per_second.is_finite() || blocks_per_second <= 0.0 {
            return Err(TransportError::InvalidRate(blocks_per_second));
        }
        let interval = Duration::try_from_secs_f64(1.0 / blocks_per_second)
            .map_err(|_| TransportError::InvalidRate(blocks_per_second))?;
        let span = span!(Level::INFO, "transport", blocks = state.block_count());
        Ok(Transport {
            core: Arc::new(Mutex::new(TransportCore {
                mode: RunMode::Stopped,
                current_block: 0,
                interval,
                state,
                voices,
                scheduler,
                events,
                pending: None,
                origin: Duration::ZERO,
                ticks: 0,
                run: 0,
                span,
            })),
        })
    }

    /// Starts the loop at block 0. Does nothing if already playing.
    pub fn start(&self) {
        let mut core = self.core.lock();
        let span = core.span.clone();
        let _enter = span.enter();

        if core.mode == RunMode::Playing {
            debug!("Transport already playing");
            return;
        }

        info!(interval = ?core.interval, "Starting transport");
        core.mode = RunMode::Playing;
        core.events.publish(EngineEvent::ModeChanged(RunMode::Playing));
        core.origin = core.scheduler.now();
        core.ticks = 0;
        core.run += 1;
        let run = core.run;
        core.advance(&Arc::downgrade(&self.core), run, 0, None);
    }

    /// Stops the loop and silences every voice that has a note anywhere in the pattern.
    /// Programmed notes are kept.
    pub fn hard_stop(&self) {
        let mut core = self.core.lock();
        let span = core.span.clone();
        let _enter = span.enter();

        info!("Stopping transport");
        core.mode = RunMode::Stopped;
        core.run += 1;
        if let Some(pending) = core.pending.take() {
            pending.cancel();
        }
        for (instrument, pitch) in core.state.all_voices() {
            core.voices.stop(&instrument, pitch);
        }
        core.current_block = 0;
        core.events.publish(EngineEvent::ModeChanged(RunMode::Stopped));
        core.events.publish(EngineEvent::BlockChanged(0));
    }

    /// Body of a scheduled tick. Does nothing if the transport is gone.
    fn tick(
        this: &Weak<Mutex<TransportCore>>,
        run: u64,
        new_block: BlockIndex,
        old_block: BlockIndex,
    ) {
        let Some(core) = this.upgrade() else {
            return;
        };
        let mut core = core.lock();
        let span = core.span.clone();
        let _enter = span.enter();
        core.advance(this, run, new_block, Some(old_block));
    }

    pub fn register_note(&self, pitch: Pitch, instrument: &InstrumentId, block: BlockIndex) {
        self.core.lock().state.register(pitch, instrument, block);
    }

    pub fn deregister_note(&self, pitch: Pitch, instrument: &InstrumentId, block: BlockIndex) {
        self.core.lock().state.deregister(pitch, instrument, block);
    }

    pub fn toggle_note(&self, pitch: Pitch, instrument: &InstrumentId, block: BlockIndex) {
        self.core.lock().state.toggle(pitch, instrument, block);
    }

    /// Returns the current run mode.
    pub fn mode(&self) -> RunMode {
        self.core.lock().mode
    }

    /// Returns the block most recently fired, or 0 when stopped.
    pub fn current_block(&self) -> BlockIndex {
        self.core.lock().current_block
    }

    /// Returns a snapshot of the programmed notes.
    pub fn pattern(&self) -> Pattern {
        self.core.lock().state.snapshot()
    }

    pub fn block_count(&self) -> usize {
        self.core.lock().state.block_count()
    }

    /// Time between blocks.
    pub fn interval(&self) -> Duration {
        self.core.lock().interval
    }

    /// Length of one full pass over the loop.
    pub fn loop_duration(&self) -> Duration {
        let core = self.core.lock();
        core.interval * core.state.block_count() as u32
    }
}

impl Drop for Transport {
    fn drop(&mut self) {
        if let Some(pending) = self.core.lock().pending.take() {
            pending.cancel();
        }
    }
}

impl fmt::Debug for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let core = self.core.lock();
        f.debug_struct("Transport")
            .field("mode", &core.mode)
            .field("current_block", &core.current_block)
            .field("interval", &core.interval)
            .field("state", &core.state)
            .finish()
    }
}
