//! Checkpoint resolution and weight loading.
//!
//! A model directory may hold several `*.safetensors` snapshots. The one
//! named by a TensorFlow-style `checkpoint` index file wins; otherwise the
//! snapshot with the highest trailing `-<step>` number is used.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use candle_core::{DType, Device, Tensor};

use crate::error::Result;

pub const INDEX_FILE: &str = "checkpoint";
pub const EXTENSION: &str = "safetensors";
const INDEX_KEY: &str = "model_checkpoint_path:";
const TRANSFORMER_PREFIX: &str = "transformer.";

/// Path of the newest checkpoint in `dir`, if any.
pub fn latest_checkpoint(dir: &Path) -> Result<Option<PathBuf>> {
    if !dir.is_dir() {
        return Ok(None);
    }
    if let Some(indexed) = indexed_checkpoint(dir)? {
        return Ok(Some(indexed));
    }

    let mut candidates = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() && path.extension().is_some_and(|e| e == EXTENSION) {
            candidates.push(path);
        }
    }
    Ok(candidates
        .into_iter()
        .max_by(|a, b| (step_of(a), a.file_name()).cmp(&(step_of(b), b.file_name()))))
}

fn indexed_checkpoint(dir: &Path) -> Result<Option<PathBuf>> {
    let index = dir.join(INDEX_FILE);
    if !index.is_file() {
        return Ok(None);
    }
    let raw = std::fs::read_to_string(&index)?;
    let named = raw
        .lines()
        .find_map(|line| line.trim().strip_prefix(INDEX_KEY))
        .map(|rest| rest.trim().trim_matches('"'));

    let Some(stem) = named else {
        tracing::warn!(index = %index.display(), "checkpoint index has no model_checkpoint_path");
        return Ok(None);
    };
    let path = dir.join(stem);
    let path = if path.extension().is_some_and(|e| e == EXTENSION) {
        path
    } else {
        dir.join(format!("{stem}.{EXTENSION}"))
    };
    if path.is_file() {
        Ok(Some(path))
    } else {
        tracing::warn!(path = %path.display(), "indexed checkpoint is missing, scanning directory");
        Ok(None)
    }
}

/// `model-1000.safetensors` -> 1000.
fn step_of(path: &Path) -> Option<u64> {
    path.file_stem()?
        .to_str()?
        .rsplit_once('-')
        .and_then(|(_, step)| step.parse().ok())
}

/// Load every tensor of a checkpoint, dropping a leading `transformer.`
/// prefix and casting to `dtype`.
pub fn load_weights(path: &Path, dtype: DType, device: &Device) -> Result<HashMap<String, Tensor>> {
    let raw = candle_core::safetensors::load(path, device)?;
    raw.into_iter()
        .map(|(name, tensor)| -> Result<(String, Tensor)> {
            let name = name
                .strip_prefix(TRANSFORMER_PREFIX)
                .map(str::to_string)
                .unwrap_or(name);
            Ok((name, tensor.to_dtype(dtype)?))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn touch(dir: &Path, name: &str) {
        fs::write(dir.join(name), b"").unwrap();
    }

    #[test]
    fn test_highest_step_wins() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "model.safetensors");
        touch(dir.path(), "model-900.safetensors");
        touch(dir.path(), "model-1000.safetensors");
        touch(dir.path(), "notes.txt");
        let latest = latest_checkpoint(dir.path()).unwrap().unwrap();
        assert_eq!(latest.file_name().unwrap(), "model-1000.safetensors");
    }

    #[test]
    fn test_index_file_takes_precedence() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "model-5.safetensors");
        touch(dir.path(), "model-10.safetensors");
        fs::write(
            dir.path().join(INDEX_FILE),
            "model_checkpoint_path: \"model-5\"\nall_model_checkpoint_paths: \"model-5\"\n",
        )
        .unwrap();
        let latest = latest_checkpoint(dir.path()).unwrap().unwrap();
        assert_eq!(latest.file_name().unwrap(), "model-5.safetensors");
    }

    #[test]
    fn test_stale_index_falls_back_to_scan() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "model-10.safetensors");
        fs::write(dir.path().join(INDEX_FILE), "model_checkpoint_path: \"model-99\"\n").unwrap();
        let latest = latest_checkpoint(dir.path()).unwrap().unwrap();
        assert_eq!(latest.file_name().unwrap(), "model-10.safetensors");
    }

    #[test]
    fn test_empty_or_missing_dir_has_no_checkpoint() {
        let dir = tempfile::tempdir().unwrap();
        assert!(latest_checkpoint(dir.path()).unwrap().is_none());
        assert!(latest_checkpoint(&dir.path().join("absent")).unwrap().is_none());
    }

    #[test]
    fn test_load_weights_strips_prefix() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.safetensors");
        let tensors = HashMap::from([(
            "transformer.wte.weight".to_string(),
            Tensor::ones((2, 3), DType::F32, &Device::Cpu).unwrap(),
        )]);
        candle_core::safetensors::save(&tensors, &path).unwrap();

        let loaded = load_weights(&path, DType::F32, &Device::Cpu).unwrap();
        assert_eq!(loaded["wte.weight"].dims(), [2, 3]);
        assert!(!loaded.contains_key("transformer.wte.weight"));
    }
}
