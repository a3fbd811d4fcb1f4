//! MIDI output from scores.
//!
//! Converts a [`Score`] into a Standard MIDI File (format 1). Track 0 holds
//! tempo and time signature; track 1 holds the melody line.

use std::path::Path;

use midly::{
    num::{u15, u24, u28, u4, u7},
    Format, Header, MetaMessage, MidiMessage, Smf, Timing, Track, TrackEvent, TrackEventKind,
};

use crate::error::{DaemonError, Result};
use crate::types::Score;

const MELODY_CHANNEL: u8 = 0;

/// Acoustic grand piano.
const MELODY_PROGRAM: u8 = 0;

/// Convert a score to MIDI and write it to a file.
pub fn write_midi(score: &Score, path: &Path) -> Result<()> {
    let bytes = score_to_bytes(score)?;
    std::fs::write(path, &bytes).map_err(|e| {
        DaemonError::rendering_failed(format!("Failed to write {}: {}", path.display(), e))
    })
}

/// Serialize a score to SMF bytes.
pub fn score_to_bytes(score: &Score) -> Result<Vec<u8>> {
    let smf = score_to_smf(score);
    let mut buf = Vec::new();
    smf.write(&mut buf)
        .map_err(|e| DaemonError::rendering_failed(format!("Failed to encode MIDI: {}", e)))?;
    Ok(buf)
}

/// Convert a score to an in-memory SMF.
pub fn score_to_smf(score: &Score) -> Smf<'static> {
    let ticks_per_beat = score.ticks_per_beat.clamp(1, 0x7FFF) as u16;
    let mut smf = Smf::new(Header::new(
        Format::Parallel,
        Timing::Metrical(u15::new(ticks_per_beat)),
    ));

    // Track 0: tempo and meter
    let mut tempo_track: Track<'static> = Vec::new();
    let tempo_microseconds = (60_000_000 / score.bpm.max(1)).min(0xFF_FFFF);
    tempo_track.push(TrackEvent {
        delta: u28::new(0),
        kind: TrackEventKind::Meta(MetaMessage::Tempo(u24::new(tempo_microseconds))),
    });
    tempo_track.push(TrackEvent {
        delta: u28::new(0),
        kind: TrackEventKind::Meta(MetaMessage::TimeSignature(
            score.beats_per_bar.clamp(1, 255) as u8,
            2, // quarter-note beat
            24,
            8,
        )),
    });
    tempo_track.push(TrackEvent {
        delta: u28::new(0),
        kind: TrackEventKind::Meta(MetaMessage::EndOfTrack),
    });
    smf.tracks.push(tempo_track);

    // Track 1: melody
    let channel = u4::new(MELODY_CHANNEL);
    let mut track: Track<'static> = Vec::new();
    track.push(TrackEvent {
        delta: u28::new(0),
        kind: TrackEventKind::Meta(MetaMessage::TrackName(b"melody")),
    });
    track.push(TrackEvent {
        delta: u28::new(0),
        kind: TrackEventKind::Midi {
            channel,
            message: MidiMessage::ProgramChange {
                program: u7::new(MELODY_PROGRAM),
            },
        },
    });

    // Notes never overlap, so on/off events are already in tick order.
    let mut last_event_tick: u32 = 0;
    for note in &score.notes {
        track.push(TrackEvent {
            delta: u28::new(note.start_tick.saturating_sub(last_event_tick)),
            kind: TrackEventKind::Midi {
                channel,
                message: MidiMessage::NoteOn {
                    key: u7::new(note.pitch.min(127)),
                    vel: u7::new(note.velocity.clamp(1, 127)),
                },
            },
        });
        track.push(TrackEvent {
            delta: u28::new(note.end_tick.saturating_sub(note.start_tick)),
            kind: TrackEventKind::Midi {
                channel,
                message: MidiMessage::NoteOff {
                    key: u7::new(note.pitch.min(127)),
                    vel: u7::new(0),
                },
            },
        });
        last_event_tick = note.end_tick.max(note.start_tick);
    }

    track.push(TrackEvent {
        delta: u28::new(0),
        kind: TrackEventKind::Meta(MetaMessage::EndOfTrack),
    });
    smf.tracks.push(track);

    smf
}
