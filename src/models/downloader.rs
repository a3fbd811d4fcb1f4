//! Model downloader.
//!
//! Fetches missing model files from a configured base URL.

use std::fs;
use std::io::{Read, Write};
use std::path::Path;

use crate::error::{DaemonError, Result};

use super::loader::{missing_model_files, CONFIG_FILE};

/// Downloads all required model files if not present.
///
/// Each missing file is fetched from `{base_url}/{file}`. Without a base URL,
/// missing files are reported as MODEL_NOT_FOUND.
pub fn ensure_models(model_dir: &Path, base_url: Option<&str>) -> Result<()> {
    let missing = missing_model_files(model_dir);
    if missing.is_empty() {
        tracing::debug!(dir = %model_dir.display(), "all model files present");
        return Ok(());
    }

    let Some(base_url) = base_url else {
        return Err(DaemonError::model_not_found(format!(
            "Missing model files in {}: {}",
            model_dir.display(),
            missing.join(", ")
        )));
    };

    if !model_dir.exists() {
        fs::create_dir_all(model_dir).map_err(|e| {
            DaemonError::model_download_failed(format!(
                "Failed to create model directory {}: {}",
                model_dir.display(),
                e
            ))
        })?;
    }

    tracing::info!(count = missing.len(), base_url, "downloading missing model files");

    for file in &missing {
        download_file_streaming(&file_url(base_url, file), &model_dir.join(file))?;
    }

    // config.json is optional.
    let config_path = model_dir.join(CONFIG_FILE);
    if !config_path.exists() {
        if let Err(e) = download_file_streaming(&file_url(base_url, CONFIG_FILE), &config_path) {
            tracing::debug!(error = %e, "no config.json at model source, using defaults");
        }
    }

    tracing::info!("model files downloaded");
    Ok(())
}

fn file_url(base_url: &str, file: &str) -> String {
    format!("{}/{}", base_url.trim_end_matches('/'), file)
}

/// Downloads a file using streaming to handle large files.
///
/// Writes to a `.part` file first so an interrupted download never leaves a
/// truncated model behind.
fn download_file_streaming(url: &str, dest: &Path) -> Result<()> {
    let client = reqwest::blocking::Client::builder()
        .timeout(std::time::Duration::from_secs(3600))
        .build()
        .map_err(|e| {
            DaemonError::model_download_failed(format!("Failed to create HTTP client: {}", e))
        })?;

    let mut response = client.get(url).send().map_err(|e| {
        DaemonError::model_download_failed(format!("Failed to download {}: {}", url, e))
    })?;

    if !response.status().is_success() {
        return Err(DaemonError::model_download_failed(format!(
            "HTTP {} for {}",
            response.status(),
            url
        )));
    }

    let total_size = response.content_length().unwrap_or(0);
    let partial = dest.with_extension("part");

    let mut file = fs::File::create(&partial).map_err(|e| {
        DaemonError::model_download_failed(format!(
            "Failed to create file {}: {}",
            partial.display(),
            e
        ))
    })?;

    let mut downloaded: u64 = 0;
    let mut buffer = [0u8; 65536];
    let mut last_progress = 0;

    loop {
        let bytes_read = response.read(&mut buffer).map_err(|e| {
            DaemonError::model_download_failed(format!("Failed to read response: {}", e))
        })?;

        if bytes_read == 0 {
            break;
        }

        file.write_all(&buffer[..bytes_read]).map_err(|e| {
            DaemonError::model_download_failed(format!("Failed to write file: {}", e))
        })?;

        downloaded += bytes_read as u64;

        if total_size > 0 {
            let progress = (downloaded * 100 / total_size) as usize;
            if progress >= last_progress + 10 {
                tracing::info!(url, progress, "downloading");
                last_progress = progress;
            }
        }
    }

    fs::rename(&partial, dest).map_err(|e| {
        DaemonError::model_download_failed(format!(
            "Failed to move {} into place: {}",
            dest.display(),
            e
        ))
    })?;

    let size_mb = downloaded as f64 / (1024.0 * 1024.0);
    tracing::info!(url, size_mb, "download complete");

    Ok(())
}
