//! notegen-daemon: symbolic music generation daemon.
//!
//! This binary can run in two modes:
//! - CLI mode: one generation pass written to MIDI and WAV
//! - Daemon mode: JSON-RPC server over stdio

use std::sync::Arc;
use std::time::Instant;

use anyhow::{bail, Context};
use tracing_subscriber::EnvFilter;

use notegen_daemon::audio::{probe_wav, write_midi, FluidSynthRenderer, Renderer};
use notegen_daemon::cache::AssetCache;
use notegen_daemon::cli::Cli;
use notegen_daemon::config::DaemonConfig;
use notegen_daemon::generation::{
    generate_score, validate_duration, GenerationPipeline, InMemoryJobStore, JobManager, ModelState,
};
use notegen_daemon::models::{ensure_models, load_model};
use notegen_daemon::rpc::{run_server, ServerState};

fn main() {
    init_tracing();
    if let Err(e) = run() {
        tracing::error!("{:#}", e);
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

/// Logs go to stderr; stdout is reserved for JSON-RPC responses.
fn init_tracing() {
    let filter = EnvFilter::try_from_env("NOTEGEN_LOG").unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run() -> anyhow::Result<()> {
    let cli = Cli::parse_args();

    let mut config = DaemonConfig::from_env();
    cli.apply(&mut config);
    if let Some(reason) = config.validate() {
        bail!("invalid configuration: {}", reason);
    }

    if cli.is_daemon_mode() {
        run_daemon_mode(config)
    } else if cli.is_cli_mode() {
        run_cli_mode(&cli, &config)
    } else {
        print_usage();
        Ok(())
    }
}

fn renderer(config: &DaemonConfig) -> FluidSynthRenderer {
    FluidSynthRenderer::new(
        config.renderer.clone(),
        config.soundfont.clone(),
        config.sample_rate,
    )
}

/// Runs one generation pass and writes its outputs.
fn run_cli_mode(cli: &Cli, config: &DaemonConfig) -> anyhow::Result<()> {
    validate_duration(cli.duration)?;

    let model_dir = config.effective_model_path();
    let seed_tokens = cli.seed_token_list();
    let seed = cli.seed.unwrap_or_else(rand::random);
    let midi_path = cli.midi_path();
    let output_path = cli.output_path();

    tracing::info!(
        seed_tokens = %seed_tokens.join(" "),
        duration = cli.duration,
        seed,
        model_dir = %model_dir.display(),
        "generating"
    );

    ensure_models(&model_dir, config.model_url.as_deref())
        .with_context(|| format!("model files unavailable in {}", model_dir.display()))?;
    let model = load_model(&model_dir)?;

    let start_time = Instant::now();
    let (decoded, score) = generate_score(
        &model,
        &seed_tokens,
        cli.duration,
        seed,
        &config.generation,
        &config.notation,
    )?;

    write_midi(&score, &midi_path)?;
    eprintln!("Decoded {} tokens in {} steps ({})", decoded.tokens.len(), decoded.steps, decoded.stop);
    eprintln!(
        "Score: {} notes, {} bars, {} bpm, {:.2}s",
        score.notes.len(),
        score.bar_count,
        score.bpm,
        score.duration_seconds()
    );
    eprintln!("Saved MIDI to: {}", midi_path.display());

    if !cli.no_render {
        renderer(config)
            .render(&midi_path, &output_path)
            .context("rendering failed; pass --no-render to write MIDI only")?;
        let info = probe_wav(&output_path)?;
        eprintln!(
            "Saved WAV to: {} ({:.2}s at {} Hz)",
            output_path.display(),
            info.duration_sec,
            info.sample_rate
        );
    }

    eprintln!("Time: {:.2}s", start_time.elapsed().as_secs_f32());
    Ok(())
}

/// Runs the daemon mode (JSON-RPC server).
///
/// A model that fails to load does not stop the daemon; jobs then fail
/// with MODEL_UNAVAILABLE.
fn run_daemon_mode(config: DaemonConfig) -> anyhow::Result<()> {
    let model_dir = config.effective_model_path();
    let cache_dir = config.effective_cache_path();

    let model = ModelState::from(
        ensure_models(&model_dir, config.model_url.as_deref()).and_then(|_| load_model(&model_dir)),
    );
    match &model {
        ModelState::Ready(handle) => tracing::info!(version = handle.version(), "model ready"),
        ModelState::Unavailable(reason) => tracing::warn!(%reason, "model unavailable, jobs will fail"),
    }

    let renderer = renderer(&config);
    if let Err(e) = renderer.resolve_executable() {
        tracing::warn!(error = %e, "renderer not found, jobs will fail");
    }

    let assets = Arc::new(
        AssetCache::with_capacity(&cache_dir, config.max_assets)
            .with_context(|| format!("cannot use asset directory {}", cache_dir.display()))?,
    );
    let pipeline = GenerationPipeline::new(
        model,
        Arc::new(renderer),
        Arc::clone(&assets),
        config.generation.clone(),
        config.notation.clone(),
        config.preview_seconds,
    );
    let jobs = JobManager::new(
        Arc::new(InMemoryJobStore::with_capacity(config.max_finished_jobs)),
        Arc::new(pipeline),
        assets,
        config.job_manager_config(),
    );

    tracing::info!(assets = %cache_dir.display(), "reading JSON-RPC requests from stdin");
    run_server(ServerState::new(jobs))?;
    Ok(())
}

/// Prints usage information.
fn print_usage() {
    eprintln!("notegen-daemon: symbolic music generation");
    eprintln!();
    eprintln!("Usage:");
    eprintln!("  One-shot generation:");
    eprintln!("    notegen-daemon --seed-tokens \"BPM_120 BAR\" --duration 30 --output song.wav");
    eprintln!();
    eprintln!("  MIDI only:");
    eprintln!("    notegen-daemon --seed-tokens \"BPM_96 BAR\" --midi song.mid --no-render");
    eprintln!();
    eprintln!("  Daemon mode (JSON-RPC server):");
    eprintln!("    notegen-daemon --daemon");
    eprintln!();
    eprintln!("Run 'notegen-daemon --help' for full options.");
}
