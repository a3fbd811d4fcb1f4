//! Bar-aware autoregressive decoding.
//!
//! Samples tokens from a [`DistributionSource`] until the requested number of
//! bars has been produced. Ending is only allowed on a bar boundary or an
//! explicit end-of-sequence token once the bar target is met. Step and
//! wall-clock guards bound every run, whatever the source returns.

use std::fmt;
use std::time::{Duration, Instant};

use rand::Rng;
use serde::Serialize;

use crate::error::{DaemonError, Result};
use crate::models::{DistributionSource, Logits, Vocabulary};
use crate::types::token::{count_bars, parse_bpm, TokenKind, DEFAULT_BPM, PAD_TOKEN};
use crate::types::GenerationConfig;

/// Why a decode run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// A bar delimiter was sampled after the bar target was met.
    BarTarget,
    /// The end-of-sequence token was sampled.
    EndOfSequence,
    /// The step budget ran out.
    MaxSteps,
    /// The wall-clock budget ran out.
    TimeLimit,
}

impl StopReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            StopReason::BarTarget => "bar_target",
            StopReason::EndOfSequence => "end_of_sequence",
            StopReason::MaxSteps => "max_steps",
            StopReason::TimeLimit => "time_limit",
        }
    }

    /// Returns true if a guard cut the run short.
    pub fn is_forced(&self) -> bool {
        matches!(self, StopReason::MaxSteps | StopReason::TimeLimit)
    }
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Result of one decode run.
#[derive(Debug, Clone)]
pub struct Decoded {
    /// Seed tokens followed by every appended sample.
    pub tokens: Vec<String>,
    /// Tempo parsed from the seed.
    pub bpm: u32,
    /// Bars the run aimed for.
    pub target_bars: usize,
    /// Bars present in `tokens`.
    pub bars: usize,
    /// Sampling steps taken.
    pub steps: usize,
    pub stop: StopReason,
}

impl Decoded {
    /// Musical length of the produced bars in seconds.
    pub fn approx_seconds(&self, beats_per_bar: u32) -> f32 {
        if self.bpm == 0 {
            return 0.0;
        }
        self.bars as f32 * beats_per_bar as f32 * 60.0 / self.bpm as f32
    }
}

/// Decodes a token sequence long enough to cover `target_seconds`.
///
/// The only error is a failure of the distribution source; every
/// degenerate distribution has a fallback.
pub fn decode<R: Rng + ?Sized>(
    source: &dyn DistributionSource,
    vocab: &dyn Vocabulary,
    seed_tokens: &[String],
    target_seconds: f32,
    config: &GenerationConfig,
    rng: &mut R,
) -> Result<Decoded> {
    let bpm = parse_bpm(seed_tokens, DEFAULT_BPM);
    let target_bars = config.target_bars(target_seconds, bpm);
    let pad_id = vocab.pad_id();
    let eos_id = vocab.eos_id();
    let bar_id = vocab.bar_id();
    let window = source.context_window().max(1);
    if source.vocab_size() != vocab.len() {
        return Err(DaemonError::model_unavailable(format!(
            "Source scores {} tokens but the vocabulary has {}",
            source.vocab_size(),
            vocab.len()
        )));
    }

    let mut ids = vocab.encode(seed_tokens);
    let mut tokens = seed_tokens.to_vec();
    let mut bars = count_bars(seed_tokens);
    let mut limit = bars >= target_bars;
    let mut in_last_bar = false;
    let mut last_bar_notes = 0usize;

    let time_limit = Duration::try_from_secs_f64(
        target_seconds as f64 * config.time_limit_factor as f64,
    )
    .unwrap_or(Duration::MAX);
    let started = Instant::now();
    let mut steps = 0usize;

    tracing::debug!(bpm, target_bars, seed_bars = bars, "decode started");

    let stop = loop {
        if steps >= config.max_steps {
            tracing::warn!(max_steps = config.max_steps, bars, target_bars, "max steps reached, forcing stop");
            break StopReason::MaxSteps;
        }
        if started.elapsed() > time_limit {
            tracing::warn!(limit_sec = time_limit.as_secs_f32(), bars, target_bars, "time limit exceeded, forcing stop");
            break StopReason::TimeLimit;
        }
        steps += 1;

        let context = &ids[ids.len().saturating_sub(window)..];
        let scores = source.next_token_scores(context, pad_id)?;
        if scores.len() != vocab.len() {
            return Err(DaemonError::model_unavailable(format!(
                "Source returned {} scores for a vocabulary of {}",
                scores.len(),
                vocab.len()
            )));
        }

        let raw = Logits::new(scores);
        let mut logits = raw.clone();
        logits.scale(config.temperature);

        let final_bar_empty = config.fill_last_bar && in_last_bar && last_bar_notes == 0;
        let mut suppressed = Vec::with_capacity(2);
        if let Some(eos) = eos_id {
            if !limit || final_bar_empty {
                suppressed.push(eos);
            }
        }
        if let Some(bar) = bar_id {
            if config.forbid_empty_final_bar && final_bar_empty {
                suppressed.push(bar);
            }
        }
        for &id in &suppressed {
            logits.suppress(id);
        }

        let mut candidates = logits.nucleus(config.top_p);
        if candidates.is_fully_masked() {
            tracing::debug!(step = steps, "nucleus masked every token, using untruncated scores");
            candidates = logits;
        }

        let next = match candidates.sample(rng) {
            Some(idx) => idx as u32,
            None => fallback_choice(&candidates, &raw, &suppressed, pad_id),
        };
        let token = vocab.id_to_token(next).unwrap_or(PAD_TOKEN).to_string();
        let kind = TokenKind::classify(&token);
        let (is_bar, is_eos, is_note) = (kind == TokenKind::Bar, kind == TokenKind::Eos, kind.is_note());

        if is_bar && limit {
            break StopReason::BarTarget;
        }

        ids.push(next);
        tokens.push(token);

        if is_bar {
            bars += 1;
            if bars >= target_bars {
                limit = true;
                in_last_bar = true;
            }
        }
        if in_last_bar && is_note {
            last_bar_notes += 1;
        }
        if is_eos {
            break StopReason::EndOfSequence;
        }
    };

    tracing::info!(
        bars,
        target_bars,
        bpm,
        steps,
        stop = %stop,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "decode finished"
    );

    Ok(Decoded {
        tokens,
        bpm,
        target_bars,
        bars,
        steps,
        stop,
    })
}

/// Picks a token when the candidate scores cannot be normalized.
///
/// Tries the best candidate, then the best raw score that is not
/// suppressed, then the padding id.
fn fallback_choice(candidates: &Logits, raw: &Logits, suppressed: &[u32], pad_id: u32) -> u32 {
    if let Some(idx) = candidates.argmax() {
        return idx as u32;
    }
    let mut unsuppressed = raw.clone();
    for &id in suppressed {
        unsuppressed.suppress(id);
    }
    unsuppressed.argmax().map_or(pad_id, |idx| idx as u32)
}
