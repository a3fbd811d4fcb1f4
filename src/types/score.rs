//! Score types produced by the notation builder.

use serde::{Deserialize, Serialize};

/// A single timed note.
///
/// Invariant: `end_tick > start_tick`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteEvent {
    /// MIDI pitch (0-127).
    pub pitch: u8,
    /// Onset in ticks from the start of the score.
    pub start_tick: u32,
    /// Release in ticks from the start of the score.
    pub end_tick: u32,
    /// MIDI velocity (1-127).
    pub velocity: u8,
}

impl NoteEvent {
    /// Length of the note in ticks.
    pub fn duration_ticks(&self) -> u32 {
        self.end_tick - self.start_tick
    }
}

/// A reconstructed, renderer-ready score on a single instrument line.
///
/// Notes are sorted by start tick and never overlap.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Score {
    /// Tempo in beats per minute.
    pub bpm: u32,
    /// Tick resolution (pulses per quarter note).
    pub ticks_per_beat: u32,
    /// Beats in one bar.
    pub beats_per_bar: u32,
    /// Number of bar delimiters seen in the token stream.
    pub bar_count: u32,
    /// Latest tick any note may end on.
    pub horizon_ticks: u32,
    /// Note events in onset order.
    pub notes: Vec<NoteEvent>,
}

impl Score {
    /// Ticks in one bar.
    pub fn ticks_per_bar(&self) -> u32 {
        self.ticks_per_beat * self.beats_per_bar
    }

    /// Tick at which the last note ends, or 0 for an empty score.
    pub fn end_tick(&self) -> u32 {
        self.notes.last().map_or(0, |n| n.end_tick)
    }

    /// Playing time up to the last note release, in seconds.
    pub fn duration_seconds(&self) -> f32 {
        if self.ticks_per_beat == 0 || self.bpm == 0 {
            return 0.0;
        }
        let beats = self.end_tick() as f32 / self.ticks_per_beat as f32;
        beats * 60.0 / self.bpm as f32
    }

    /// Returns true if the notes are onset-ordered and non-overlapping.
    pub fn is_well_formed(&self) -> bool {
        self.notes.iter().all(|n| n.end_tick > n.start_tick && n.end_tick <= self.horizon_ticks)
            && self
                .notes
                .windows(2)
                .all(|w| w[0].end_tick <= w[1].start_tick)
    }

    /// Serializes the score to canonical JSON.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}
