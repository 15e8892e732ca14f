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

//! The programmed notes: which pitches each instrument plays in which block.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use tracing::debug;

use crate::events::{EngineEvent, EventBus};
use crate::instrument::InstrumentId;
use crate::pitch::{Pitch, PitchCatalog};

/// Position of a block within the loop.
pub type BlockIndex = usize;

/// A pitch switched on in a block. Two entries with the same pitch and block are the same entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NoteAtBlock {
    pub pitch: Pitch,
    pub block: BlockIndex,
}

impl NoteAtBlock {
    pub fn new(pitch: Pitch, block: BlockIndex) -> NoteAtBlock {
        NoteAtBlock { pitch, block }
    }
}

/// A read-only snapshot of every instrument's notes.
pub type Pattern = BTreeMap<InstrumentId, BTreeSet<NoteAtBlock>>;

/// Mutable note state for a fixed set of instruments.
///
/// Only instruments supplied at construction are addressable. Mutations that name anything else
/// (an unknown instrument, a block past the end of the loop, a pitch outside the catalog) are
/// dropped without a notification.
pub struct SequencerState {
    notes: Pattern,
    block_count: usize,
    catalog: PitchCatalog,
    events: Arc<EventBus>,
}

impl SequencerState {
    /// Creates an empty state with one entry per instrument.
    pub fn new(
        instruments: impl IntoIterator<Item = InstrumentId>,
        block_count: usize,
        catalog: PitchCatalog,
        events: Arc<EventBus>,
    ) -> SequencerState {
        SequencerState {
            notes: instruments
                .into_iter()
                .map(|id| (id, BTreeSet::new()))
                .collect(),
            block_count,
            catalog,
            events,
        }
    }

    /// Seeds the state from a pattern without emitting notifications.
    pub fn load(&mut self, pattern: &Pattern) {
        for (instrument, notes) in pattern {
            for note in notes {
                if !self.insert(instrument, *note) {
                    debug!(
                        instrument = %instrument,
                        pitch = %note.pitch,
                        block = note.block,
                        "Skipping initial note"
                    );
                }
            }
        }
    }

    /// Switches a note on. Notifies whenever the instrument is addressable, even if the note was
    /// already on.
    pub fn register(&mut self, pitch: Pitch, instrument: &InstrumentId, block: BlockIndex) {
        if self.insert(instrument, NoteAtBlock::new(pitch, block)) {
            self.notify();
        }
    }

    /// Switches a note off. Notifies only if the note was on.
    pub fn deregister(&mut self, pitch: Pitch, instrument: &InstrumentId, block: BlockIndex) {
        let removed = self
            .notes
            .get_mut(instrument)
            .is_some_and(|notes| notes.remove(&NoteAtBlock::new(pitch, block)));
        if removed {
            self.notify();
        }
    }

    /// Flips a note.
    pub fn toggle(&mut self, pitch: Pitch, instrument: &InstrumentId, block: BlockIndex) {
        if self.contains(pitch, instrument, block) {
            self.deregister(pitch, instrument, block);
        } else {
            self.register(pitch, instrument, block);
        }
    }

    pub fn contains(&self, pitch: Pitch, instrument: &InstrumentId, block: BlockIndex) -> bool {
        self.notes
            .get(instrument)
            .is_some_and(|notes| notes.contains(&NoteAtBlock::new(pitch, block)))
    }

    /// Every (instrument, pitch) switched on in the given block.
    pub fn notes_at(&self, block: BlockIndex) -> Vec<(InstrumentId, Pitch)> {
        self.notes
            .iter()
            .flat_map(|(instrument, notes)| {
                notes
                    .iter()
                    .filter(move |note| note.block == block)
                    .map(move |note| (instrument.clone(), note.pitch))
            })
            .collect()
    }

    /// Every distinct (instrument, pitch) switched on in any block.
    pub fn all_voices(&self) -> BTreeSet<(InstrumentId, Pitch)> {
        self.notes
            .iter()
            .flat_map(|(instrument, notes)| {
                notes.iter().map(move |note| (instrument.clone(), note.pitch))
            })
            .collect()
    }

    /// A copy of the full mapping.
    pub fn snapshot(&self) -> Pattern {
        self.notes.clone()
    }

    pub fn block_count(&self) -> usize {
        self.block_count
    }

    fn insert(&mut self, instrument: &InstrumentId, note: NoteAtBlock) -> bool {
        if note.block >= self.block_count || !self.catalog.contains(note.pitch) {
            return false;
        }
        match self.notes.get_mut(instrument) {
            Some(notes) => {
                notes.insert(note);
                true
            }
            None => false,
        }
    }

    fn notify(&self) {
        self.events
            .publish(EngineEvent::StateChanged(self.notes.clone()));
    }
}

impl std::fmt::Debug for SequencerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SequencerState")
            .field("instruments", &self.notes.len())
            .field(
                "notes",
                &self.notes.values().map(BTreeSet::len).sum::<usize>(),
            )
            .field("block_count", &self.block_count)
            .finish()
    }
}
