//! Reconstruction of timed notes from a token stream.
//!
//! Tokens are read left to right. `BAR` advances the bar and resets the grid
//! cursor, `POS_n` moves the cursor, `NOTE_p` opens a pending note, and the
//! `DUR_n` / `VEL_b` pair completes it in either order. A note is emitted
//! once both are known. Malformed or incomplete runs are dropped.

use crate::types::token::{parse_bpm, TokenKind, DEFAULT_BPM};
use crate::types::{NotationConfig, NoteEvent, Score};

/// A note waiting for its duration and velocity.
#[derive(Debug, Clone, Copy)]
struct PendingNote {
    pitch: u8,
    bar: u32,
    pos: u32,
    duration: Option<u32>,
    velocity: Option<u32>,
}

impl PendingNote {
    /// Duration and velocity bucket, once both are known.
    fn complete(&self) -> Option<(u32, u32)> {
        self.duration.zip(self.velocity)
    }
}

struct Builder<'c> {
    config: &'c NotationConfig,
    horizon: u64,
    bar: u32,
    pos: u32,
    pending: Option<PendingNote>,
    last_end: u64,
    notes: Vec<NoteEvent>,
}

impl<'c> Builder<'c> {
    fn new(config: &'c NotationConfig, horizon: u64) -> Self {
        Self {
            config,
            horizon,
            bar: 0,
            pos: 0,
            pending: None,
            last_end: 0,
            notes: Vec::new(),
        }
    }

    fn step(&mut self, kind: TokenKind<'_>) {
        match kind {
            TokenKind::Bar => {
                self.bar = self.bar.saturating_add(1);
                self.pos = 0;
            }
            TokenKind::Position(pos) => self.pos = pos,
            TokenKind::Note(pitch) => {
                self.pending = Some(PendingNote {
                    pitch,
                    bar: self.bar,
                    pos: self.pos,
                    duration: None,
                    velocity: None,
                });
            }
            TokenKind::Duration(units) => {
                if let Some(pending) = self.pending.as_mut() {
                    pending.duration = Some(units);
                    self.flush_if_complete();
                }
            }
            TokenKind::Velocity(bucket) => {
                if let Some(pending) = self.pending.as_mut() {
                    pending.velocity = Some(bucket);
                    self.flush_if_complete();
                }
            }
            _ => {}
        }
    }

    fn flush_if_complete(&mut self) {
        let Some(pending) = self.pending else {
            return;
        };
        let Some((duration, bucket)) = pending.complete() else {
            return;
        };
        self.pending = None;

        let ticks_per_bar = self.config.ticks_per_bar() as u64;
        let ticks_per_grid = self.config.ticks_per_grid() as u64;

        let nominal = pending.bar as u64 * ticks_per_bar + pending.pos as u64 * ticks_per_grid;
        let start = nominal.max(self.last_end);
        let length = (duration as u64 * ticks_per_grid).max(ticks_per_grid);
        let end = (start + length).min(self.horizon);
        if end <= start {
            return;
        }

        // end <= horizon, which fits in u32
        self.notes.push(NoteEvent {
            pitch: pending.pitch,
            start_tick: start as u32,
            end_tick: end as u32,
            velocity: velocity_from_bucket(bucket, self.config.velocity_bins),
        });
        self.last_end = end;
    }
}

/// Maps a velocity bucket to the midpoint of its slice of 1..=127.
pub fn velocity_from_bucket(bucket: u32, bins: u32) -> u8 {
    let bins = bins.max(1);
    let bucket = bucket.clamp(1, bins);
    let step = 127.0 / bins as f64;
    let velocity = ((bucket as f64 - 0.5) * step).round_ties_even();
    velocity.clamp(1.0, 127.0) as u8
}

/// Rebuilds a score from a token stream.
///
/// Never fails: unrecognized tokens are ignored and notes that cannot be
/// placed are dropped. Building the same stream twice yields the same score.
pub fn build<S: AsRef<str>>(tokens: &[S], config: &NotationConfig) -> Score {
    let bpm = parse_bpm(tokens, DEFAULT_BPM);
    let bar_count = tokens
        .iter()
        .filter(|t| TokenKind::classify(t.as_ref()) == TokenKind::Bar)
        .count() as u64;
    let max_horizon = u32::MAX as u64;
    let horizon = ((bar_count + 1) * config.ticks_per_bar() as u64).min(max_horizon);

    let mut builder = Builder::new(config, horizon);
    for token in tokens {
        let kind = TokenKind::classify(token.as_ref());
        if kind == TokenKind::Eos {
            break;
        }
        builder.step(kind);
    }
    builder.flush_if_complete();

    Score {
        bpm,
        ticks_per_beat: config.ticks_per_beat,
        beats_per_bar: config.beats_per_bar,
        bar_count: bar_count.min(u32::MAX as u64) as u32,
        horizon_ticks: horizon as u32,
        notes: builder.notes,
    }
}
