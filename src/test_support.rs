//! Fakes shared by the unit tests.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime};

use crate::audio::{write_wav, Renderer, SAMPLE_RATE};
use crate::error::{DaemonError, ErrorCode, Result};
use crate::generation::{InMemoryJobStore, JobStore, PassRunner};
use crate::models::{DistributionSource, ModelHandle, TokenTable, Vocabulary};
use crate::types::{Asset, Job, JobStatus, PassKind};

pub const TEST_TOKENS: [&str; 13] = [
    "<pad>", "EOS", "BAR", "BPM_120", "NOTE_60", "NOTE_62", "DUR_1", "DUR_2", "VEL_1", "VEL_8",
    "POS_0", "POS_4", "KEY_C",
];

pub fn token_table() -> TokenTable {
    TokenTable::from_tokens(TEST_TOKENS).unwrap()
}

pub fn strings(tokens: &[&str]) -> Vec<String> {
    tokens.iter().map(|t| t.to_string()).collect()
}

/// Four one-note bars, then end of sequence.
pub fn round_trip_script() -> Vec<&'static str> {
    let mut script = Vec::new();
    for _ in 0..4 {
        script.extend(["NOTE_60", "DUR_2", "VEL_8", "BAR"]);
    }
    script.push("EOS");
    script
}

pub fn model_handle<S, F>(make: F) -> ModelHandle
where
    S: DistributionSource + 'static,
    F: FnOnce(&TokenTable) -> S,
{
    let vocab = token_table();
    let source = make(&vocab);
    ModelHandle::new(Arc::new(vocab), Arc::new(source), "test-v1")
}

/// Puts almost all mass on the next token of a cyclic script.
pub struct ScriptedSource {
    script: Vec<u32>,
    vocab_size: usize,
    window: usize,
    delay: Option<Duration>,
    cursor: Mutex<usize>,
    longest: AtomicUsize,
}

impl ScriptedSource {
    pub fn new(vocab: &TokenTable, script: &[&str]) -> Self {
        Self {
            script: script.iter().map(|t| vocab.token_to_id(t)).collect(),
            vocab_size: vocab.len(),
            window: 1024,
            delay: None,
            cursor: Mutex::new(0),
            longest: AtomicUsize::new(0),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn with_window(mut self, window: usize) -> Self {
        self.window = window;
        self
    }

    /// Longest context passed to the source so far.
    pub fn longest_context(&self) -> usize {
        self.longest.load(Ordering::SeqCst)
    }
}

impl DistributionSource for ScriptedSource {
    fn vocab_size(&self) -> usize {
        self.vocab_size
    }

    fn context_window(&self) -> usize {
        self.window
    }

    fn next_token_scores(&self, context: &[u32], _pad_id: u32) -> Result<Vec<f32>> {
        self.longest.fetch_max(context.len(), Ordering::SeqCst);
        if let Some(delay) = self.delay {
            std::thread::sleep(delay);
        }
        let mut cursor = self.cursor.lock().unwrap();
        let id = self.script[*cursor % self.script.len()];
        *cursor += 1;

        let mut scores = vec![0.0; self.vocab_size];
        scores[id as usize] = 10.0;
        Ok(scores)
    }
}

/// Returns the same scores for every context.
pub struct FixedSource {
    scores: Vec<f32>,
}

impl FixedSource {
    pub fn new(vocab: &TokenTable, overrides: &[(&str, f32)], default: f32) -> Self {
        let mut scores = vec![default; vocab.len()];
        for (token, score) in overrides {
            scores[vocab.token_to_id(token) as usize] = *score;
        }
        Self { scores }
    }

    pub fn from_scores(scores: Vec<f32>) -> Self {
        Self { scores }
    }
}

impl DistributionSource for FixedSource {
    fn vocab_size(&self) -> usize {
        self.scores.len()
    }

    fn context_window(&self) -> usize {
        1024
    }

    fn next_token_scores(&self, _context: &[u32], _pad_id: u32) -> Result<Vec<f32>> {
        Ok(self.scores.clone())
    }
}

pub struct FailingSource;

impl DistributionSource for FailingSource {
    fn vocab_size(&self) -> usize {
        TEST_TOKENS.len()
    }

    fn context_window(&self) -> usize {
        1024
    }

    fn next_token_scores(&self, _context: &[u32], _pad_id: u32) -> Result<Vec<f32>> {
        Err(DaemonError::model_unavailable("inference session was never created"))
    }
}

/// Writes a short silent WAV instead of running a synthesizer.
pub struct WavRenderer {
    pub seconds: f32,
    pub sample_rate: u32,
}

impl Default for WavRenderer {
    fn default() -> Self {
        Self {
            seconds: 0.5,
            sample_rate: SAMPLE_RATE,
        }
    }
}

impl Renderer for WavRenderer {
    fn render(&self, midi_path: &Path, wav_path: &Path) -> Result<()> {
        if !midi_path.exists() {
            return Err(DaemonError::rendering_failed(format!(
                "missing MIDI input {}",
                midi_path.display()
            )));
        }
        let frames = (self.seconds * self.sample_rate as f32) as usize;
        write_wav(&vec![0.0; frames], wav_path, self.sample_rate)
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}

pub struct FailingRenderer;

impl Renderer for FailingRenderer {
    fn render(&self, _midi_path: &Path, _wav_path: &Path) -> Result<()> {
        Err(DaemonError::rendering_failed("soundfont not found"))
    }

    fn sample_rate(&self) -> u32 {
        SAMPLE_RATE
    }
}

/// Pass runner with scripted outcomes and an optional gate.
///
/// When gated, passes of the gated kind block until the release sender
/// sends a message or is dropped.
pub struct ScriptedRunner {
    fail_preview: Option<ErrorCode>,
    fail_final: Option<ErrorCode>,
    gate: Option<(PassKind, Mutex<Receiver<()>>)>,
    panic_final_once: AtomicBool,
    calls: Mutex<Vec<PassKind>>,
}

impl ScriptedRunner {
    pub fn succeeding() -> Self {
        Self {
            fail_preview: None,
            fail_final: None,
            gate: None,
            panic_final_once: AtomicBool::new(false),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Panics inside the first final pass, then behaves normally.
    pub fn panicking_final_once() -> Self {
        Self {
            panic_final_once: AtomicBool::new(true),
            ..Self::succeeding()
        }
    }

    pub fn failing_preview(code: ErrorCode) -> Self {
        Self {
            fail_preview: Some(code),
            ..Self::succeeding()
        }
    }

    pub fn failing_final(code: ErrorCode) -> Self {
        Self {
            fail_final: Some(code),
            ..Self::succeeding()
        }
    }

    /// Blocks passes of `kind` until released.
    pub fn gated(mut self, kind: PassKind) -> (Self, Sender<()>) {
        let (release, gate) = mpsc::channel();
        self.gate = Some((kind, Mutex::new(gate)));
        (self, release)
    }

    pub fn calls(&self) -> Vec<PassKind> {
        self.calls.lock().unwrap().clone()
    }
}

impl PassRunner for ScriptedRunner {
    fn run_pass(&self, job: &Job, kind: PassKind) -> Result<Asset> {
        self.calls.lock().unwrap().push(kind);
        if let Some((gated, gate)) = &self.gate {
            if *gated == kind {
                gate.lock().unwrap().recv().ok();
            }
        }
        if kind == PassKind::Final && self.panic_final_once.swap(false, Ordering::SeqCst) {
            panic!("renderer crashed mid-pass");
        }

        let failure = match kind {
            PassKind::Preview => self.fail_preview,
            PassKind::Final => self.fail_final,
        };
        if let Some(code) = failure {
            return Err(DaemonError::new(code, format!("{} pass failed", kind)));
        }

        let asset_id = format!("{}-{}", &job.job_id[..8], kind);
        Ok(Asset {
            path: PathBuf::from(format!("{}.wav", asset_id)),
            midi_path: PathBuf::from(format!("{}.mid", asset_id)),
            asset_id,
            job_id: job.job_id.clone(),
            kind,
            duration_sec: 1.0,
            sample_rate: SAMPLE_RATE,
            bpm: 120,
            note_count: 4,
            generation_time_sec: 0.01,
            created_at: SystemTime::now(),
        })
    }
}

/// In-memory store that records every status it publishes.
#[derive(Default)]
pub struct RecordingStore {
    inner: InMemoryJobStore,
    history: Mutex<Vec<(String, JobStatus)>>,
}

impl RecordingStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Statuses published for `job_id`, in order.
    pub fn history(&self, job_id: &str) -> Vec<JobStatus> {
        self.history
            .lock()
            .unwrap()
            .iter()
            .filter(|(id, _)| id == job_id)
            .map(|(_, status)| *status)
            .collect()
    }
}

impl JobStore for RecordingStore {
    fn insert(&self, job: Job) -> Result<()> {
        let entry = (job.job_id.clone(), job.status);
        self.inner.insert(job)?;
        self.history.lock().unwrap().push(entry);
        Ok(())
    }

    fn get(&self, job_id: &str) -> Option<Arc<Job>> {
        self.inner.get(job_id)
    }

    fn replace(&self, job: Job) -> Result<Arc<Job>> {
        let record = self.inner.replace(job)?;
        self.history
            .lock()
            .unwrap()
            .push((record.job_id.clone(), record.status));
        Ok(record)
    }

    fn len(&self) -> usize {
        self.inner.len()
    }
}
