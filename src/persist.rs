use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::{debug, info};

/// Bytes written next to their target but not yet visible under its name.
/// Dropping a `Staged` without publishing removes the temp file and leaves
/// the target untouched.
pub struct Staged {
    target: PathBuf,
    tmp: PathBuf,
    published: bool,
}

/// Write `bytes` to a temp file in the target's directory and fsync it.
pub fn stage(target: &Path, bytes: &[u8]) -> Result<Staged> {
    if let Some(parent) = target.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {:?}", parent))?;
    }
    let tmp = temp_path(target);
    let staged = Staged {
        target: target.to_path_buf(),
        tmp,
        published: false,
    };
    let mut file = File::create(&staged.tmp)
        .with_context(|| format!("Failed to create temp file {:?}", staged.tmp))?;
    file.write_all(bytes)
        .and_then(|_| file.sync_all())
        .with_context(|| format!("Failed to write temp file {:?}", staged.tmp))?;
    debug!("Staged {} bytes at {:?}", bytes.len(), staged.tmp);
    Ok(staged)
}

impl Staged {
    #[cfg(test)]
    pub fn temp_path(&self) -> &Path {
        &self.tmp
    }

    /// Replace the target with the staged bytes. With `backup_tag`, an
    /// existing target is first copied to a timestamped backup, which is
    /// returned.
    pub fn publish(mut self, backup_tag: Option<&str>) -> Result<Option<PathBuf>> {
        let backup = match backup_tag {
            Some(tag) if self.target.exists() => {
                let path = sibling_with_tag(&self.target, "bak", tag);
                fs::copy(&self.target, &path)
                    .with_context(|| format!("Failed to back up {:?} to {:?}", self.target, path))?;
                Some(path)
            }
            _ => None,
        };
        fs::rename(&self.tmp, &self.target)
            .with_context(|| format!("Failed to replace {:?}", self.target))?;
        self.published = true;
        if let Some(b) = &backup {
            info!("Previous version kept at {:?}", b);
        }
        Ok(backup)
    }
}

impl Drop for Staged {
    fn drop(&mut self) {
        if !self.published {
            let _ = fs::remove_file(&self.tmp);
        }
    }
}

/// Stage then publish in one step.
pub fn write_atomic(target: &Path, bytes: &[u8], backup_tag: Option<&str>) -> Result<Option<PathBuf>> {
    stage(target, bytes)?.publish(backup_tag)
}

/// Move an existing file aside under a timestamped `label` name.
pub fn set_aside(target: &Path, label: &str, tag: &str) -> Result<PathBuf> {
    let path = sibling_with_tag(target, label, tag);
    fs::rename(target, &path)
        .with_context(|| format!("Failed to move {:?} to {:?}", target, path))?;
    Ok(path)
}

/// Dump rows that could not be committed to `dir/<store>_recovery_<tag>.json`.
pub fn spill_recovery<T: Serialize>(dir: &Path, store: &str, tag: &str, rows: &T) -> Result<PathBuf> {
    let path = dir.join(format!("{}_recovery_{}.json", store, tag));
    let bytes = serde_json::to_vec_pretty(rows)?;
    write_atomic(&path, &bytes, None)?;
    Ok(path)
}

fn temp_path(target: &Path) -> PathBuf {
    let name = target
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "store".to_string());
    target.with_file_name(format!(".{}.tmp-{}", name, std::process::id()))
}

/// `dir/stem.<label>-<tag>.ext`
fn sibling_with_tag(target: &Path, label: &str, tag: &str) -> PathBuf {
    let stem = target
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = match target.extension() {
        Some(ext) => format!("{}.{}-{}.{}", stem, label, tag, ext.to_string_lossy()),
        None => format!("{}.{}-{}", stem, label, tag),
    };
    target.with_file_name(name)
}
