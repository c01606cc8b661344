use anyhow::{anyhow, Context};
use serde_json::json;
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

const MANIFEST_ENTRY: &str = "manifest.json";
const DATA_PREFIX: &str = "data/";
pub const BUNDLE_FORMAT_V1: &str = "examtrack-workspace-v1";

#[derive(Debug, Clone)]
pub struct ExportSummary {
    pub bundle_format: String,
    pub entry_count: usize,
}

#[derive(Debug, Clone)]
pub struct RestoreSummary {
    pub bundle_format_detected: String,
    pub restored_files: usize,
}

/// Bundle the store's data files into a zip with a manifest carrying a
/// SHA-256 digest per file. Files that do not exist yet (fresh JSON
/// workspaces) are skipped.
pub fn export_workspace_bundle(
    backend: &str,
    data_files: &[PathBuf],
    out_path: &Path,
) -> anyhow::Result<ExportSummary> {
    let present: Vec<&PathBuf> = data_files.iter().filter(|p| p.is_file()).collect();
    if present.is_empty() {
        return Err(anyhow!("workspace has no data files to export"));
    }

    if let Some(parent) = out_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create directory {}", parent.to_string_lossy()))?;
    }
    let out_file = File::create(out_path).with_context(|| {
        format!(
            "failed to create output file {}",
            out_path.to_string_lossy()
        )
    })?;
    let mut zip = ZipWriter::new(out_file);
    let opts = FileOptions::default().compression_method(CompressionMethod::Deflated);

    let mut files_meta = Vec::new();
    let mut entry_count = 0usize;
    for path in &present {
        let name = path
            .file_name()
            .and_then(|s| s.to_str())
            .ok_or_else(|| anyhow!("data file has no usable name: {}", path.to_string_lossy()))?;
        let bytes = std::fs::read(path)
            .with_context(|| format!("failed to read data file {}", path.to_string_lossy()))?;
        let digest = Sha256::digest(&bytes);

        zip.start_file(format!("{DATA_PREFIX}{name}"), opts)
            .with_context(|| format!("failed to start entry for {name}"))?;
        zip.write_all(&bytes)
            .with_context(|| format!("failed to write entry for {name}"))?;
        entry_count += 1;

        files_meta.push(json!({
            "name": name,
            "bytes": bytes.len(),
            "sha256": format!("{digest:x}"),
        }));
    }

    let exported_at = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();
    let manifest = json!({
        "format": BUNDLE_FORMAT_V1,
        "version": 1,
        "appVersion": env!("CARGO_PKG_VERSION"),
        "exportedAt": exported_at,
        "backend": backend,
        "files": files_meta,
    });
    zip.start_file(MANIFEST_ENTRY, opts)
        .context("failed to start manifest entry")?;
    zip.write_all(
        serde_json::to_string_pretty(&manifest)
            .context("failed to serialize manifest")?
            .as_bytes(),
    )
    .context("failed to write manifest entry")?;
    entry_count += 1;

    zip.finish().context("failed to finalize zip bundle")?;

    Ok(ExportSummary {
        bundle_format: BUNDLE_FORMAT_V1.to_string(),
        entry_count,
    })
}

/// Extract a bundle's data files into a workspace directory. Each file is
/// written to a temp name first and renamed into place so a failed restore
/// never leaves a half-written store file.
pub fn restore_workspace_bundle(
    in_path: &Path,
    workspace_path: &Path,
) -> anyhow::Result<RestoreSummary> {
    std::fs::create_dir_all(workspace_path).with_context(|| {
        format!(
            "failed to create workspace {}",
            workspace_path.to_string_lossy()
        )
    })?;

    let in_file = File::open(in_path)
        .with_context(|| format!("failed to open bundle {}", in_path.to_string_lossy()))?;
    let mut archive = ZipArchive::new(in_file).context("invalid zip archive")?;

    let mut manifest_text = String::new();
    archive
        .by_name(MANIFEST_ENTRY)
        .context("bundle missing manifest.json")?
        .read_to_string(&mut manifest_text)
        .context("failed to read manifest.json")?;
    let manifest: serde_json::Value =
        serde_json::from_str(&manifest_text).context("manifest.json is invalid JSON")?;
    let format = manifest
        .get("format")
        .and_then(|v| v.as_str())
        .unwrap_or("");
    if format != BUNDLE_FORMAT_V1 {
        return Err(anyhow!("unsupported bundle format: {}", format));
    }

    let entry_names: Vec<String> = (0..archive.len())
        .filter_map(|i| archive.by_index(i).ok().map(|e| e.name().to_string()))
        .filter(|n| n.starts_with(DATA_PREFIX))
        .collect();

    let mut restored = 0usize;
    for entry_name in entry_names {
        let file_name = entry_name
            .strip_prefix(DATA_PREFIX)
            .unwrap_or(&entry_name)
            .to_string();
        // Bundles are flat; reject anything trying to escape the workspace.
        if file_name.contains('/') || file_name.contains("..") {
            return Err(anyhow!("unexpected bundle entry: {}", entry_name));
        }

        let dst = workspace_path.join(&file_name);
        let tmp = workspace_path.join(format!("{file_name}.restoring"));
        if tmp.exists() {
            let _ = std::fs::remove_file(&tmp);
        }

        let mut out = File::create(&tmp)
            .with_context(|| format!("failed to create temp file {}", tmp.to_string_lossy()))?;
        {
            let mut entry = archive
                .by_name(&entry_name)
                .with_context(|| format!("bundle missing {}", entry_name))?;
            std::io::copy(&mut entry, &mut out)
                .with_context(|| format!("failed to extract {}", entry_name))?;
        }
        out.flush()
            .with_context(|| format!("failed to flush {}", tmp.to_string_lossy()))?;

        if dst.exists() {
            std::fs::remove_file(&dst).with_context(|| {
                format!("failed to remove existing file {}", dst.to_string_lossy())
            })?;
        }
        std::fs::rename(&tmp, &dst)
            .with_context(|| format!("failed to move {} into place", file_name))?;
        restored += 1;
    }

    if restored == 0 {
        return Err(anyhow!("bundle contains no data entries"));
    }

    Ok(RestoreSummary {
        bundle_format_detected: BUNDLE_FORMAT_V1.to_string(),
        restored_files: restored,
    })
}
