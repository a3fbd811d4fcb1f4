//! Generation pipeline.
//!
//! One pass takes a job's seed tokens through decode, notation, MIDI
//! serialization, and rendering, and registers the result as an asset.

use std::sync::Arc;
use std::time::{Instant, SystemTime};

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use crate::audio::{probe_wav, write_midi, Renderer};
use crate::cache::AssetCache;
use crate::error::{DaemonError, Result};
use crate::models::ModelHandle;
use crate::types::{compute_asset_id, Asset, GenerationConfig, Job, NotationConfig, PassKind, Score};

use super::decode::{decode, Decoded};
use super::notation;

/// Runs one pass of a job and returns the produced asset.
///
/// This is the only thing the job manager needs from the pipeline.
pub trait PassRunner: Send + Sync {
    fn run_pass(&self, job: &Job, kind: PassKind) -> Result<Asset>;
}

/// Decodes tokens and rebuilds the score for one pass.
///
/// `seed` fully determines sampling, so a deterministic model gives the
/// same score for the same arguments.
pub fn generate_score(
    model: &ModelHandle,
    seed_tokens: &[String],
    target_seconds: f32,
    seed: u64,
    generation: &GenerationConfig,
    notation: &NotationConfig,
) -> Result<(Decoded, Score)> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let decoded = decode(
        model.source.as_ref(),
        model.vocab.as_ref(),
        seed_tokens,
        target_seconds,
        generation,
        &mut rng,
    )?;
    let score = notation::build(&decoded.tokens, notation);
    tracing::debug!(notes = score.notes.len(), bpm = score.bpm, "score built");
    Ok((decoded, score))
}

/// Model availability as seen by the pipeline.
///
/// The daemon keeps serving when the model fails to load; every pass then
/// fails with the load error.
#[derive(Debug, Clone)]
pub enum ModelState {
    Ready(ModelHandle),
    Unavailable(String),
}

impl ModelState {
    /// Returns the model, or MODEL_UNAVAILABLE with the load error.
    pub fn handle(&self) -> Result<&ModelHandle> {
        match self {
            ModelState::Ready(handle) => Ok(handle),
            ModelState::Unavailable(reason) => Err(DaemonError::model_unavailable(reason.clone())),
        }
    }
}

impl From<Result<ModelHandle>> for ModelState {
    fn from(result: Result<ModelHandle>) -> Self {
        match result {
            Ok(handle) => ModelState::Ready(handle),
            Err(e) => ModelState::Unavailable(e.message),
        }
    }
}

/// The production [`PassRunner`].
pub struct GenerationPipeline {
    model: ModelState,
    renderer: Arc<dyn Renderer>,
    assets: Arc<AssetCache>,
    generation: GenerationConfig,
    notation: NotationConfig,
    preview_seconds: f32,
}

impl GenerationPipeline {
    pub fn new(
        model: ModelState,
        renderer: Arc<dyn Renderer>,
        assets: Arc<AssetCache>,
        generation: GenerationConfig,
        notation: NotationConfig,
        preview_seconds: f32,
    ) -> Self {
        Self {
            model,
            renderer,
            assets,
            generation,
            notation,
            preview_seconds,
        }
    }

    /// Target duration of a pass. The preview never outlasts the job.
    pub fn pass_seconds(&self, job: &Job, kind: PassKind) -> f32 {
        match kind {
            PassKind::Preview => self.preview_seconds.min(job.target_seconds),
            PassKind::Final => job.target_seconds,
        }
    }
}

impl PassRunner for GenerationPipeline {
    fn run_pass(&self, job: &Job, kind: PassKind) -> Result<Asset> {
        let started = Instant::now();
        let model = self.model.handle()?;
        let target_seconds = self.pass_seconds(job, kind);
        let seed = job.seed.wrapping_add(kind.seed_offset());

        tracing::info!(job_id = %job.job_id, pass = %kind, target_seconds, "pass started");

        let (decoded, score) = generate_score(
            model,
            &job.seed_tokens,
            target_seconds,
            seed,
            &self.generation,
            &self.notation,
        )?;

        let asset_id = compute_asset_id(&job.job_id, kind, job.seed, model.version());
        let midi_path = self.assets.midi_path(&asset_id);
        let wav_path = self.assets.wav_path(&asset_id);

        write_midi(&score, &midi_path)?;
        self.renderer.render(&midi_path, &wav_path)?;
        let info = probe_wav(&wav_path)?;

        let asset = Asset {
            asset_id,
            job_id: job.job_id.clone(),
            kind,
            path: wav_path,
            midi_path,
            duration_sec: info.duration_sec,
            sample_rate: info.sample_rate,
            bpm: score.bpm,
            note_count: score.notes.len(),
            generation_time_sec: started.elapsed().as_secs_f32(),
            created_at: SystemTime::now(),
        };
        self.assets.insert(asset.clone());

        tracing::info!(
            job_id = %job.job_id,
            pass = %kind,
            asset_id = %asset.asset_id,
            bars = decoded.bars,
            stop = %decoded.stop,
            notes = asset.note_count,
            duration_sec = asset.duration_sec,
            "pass finished"
        );

        Ok(asset)
    }
}
