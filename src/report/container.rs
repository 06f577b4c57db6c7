use std::collections::BTreeSet;
use std::fs::File;
use std::io::{self, Read, Write};
use std::path::PathBuf;

use crate::report::{Manifest, ReportError};

const LENGTH_PREFIX: usize = 4;

/// One file to embed, with the size recorded in the manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub key: String,
    pub path: PathBuf,
    pub size: u64,
}

/// Writes the length prefix, the manifest, then streams every artifact in
/// manifest order. Returns the number of bytes written.
pub fn write_container<W: Write>(
    out: &mut W,
    manifest: &Manifest,
    artifacts: &[Artifact],
) -> Result<u64, ReportError> {
    let manifest_bytes = serde_json::to_vec(manifest)?;
    let manifest_len = u32::try_from(manifest_bytes.len())
        .map_err(|_| ReportError::ManifestTooLarge(manifest_bytes.len()))?;

    out.write_all(&manifest_len.to_le_bytes())?;
    out.write_all(&manifest_bytes)?;
    let mut written = (LENGTH_PREFIX + manifest_bytes.len()) as u64;

    for key in &manifest.embedded_data_order {
        let artifact = artifacts
            .iter()
            .find(|a| &a.key == key)
            .ok_or_else(|| ReportError::Corrupt(format!("no artifact for key '{key}'")))?;
        written += copy_artifact(out, artifact)?;
    }
    out.flush()?;
    Ok(written)
}

fn copy_artifact<W: Write>(out: &mut W, artifact: &Artifact) -> Result<u64, ReportError> {
    let mut file = File::open(&artifact.path)?;
    let copied = io::copy(&mut (&mut file).take(artifact.size), out)?;
    let mut extra = [0u8; 1];
    let grew = file.read(&mut extra)? != 0;
    if copied != artifact.size || grew {
        return Err(ReportError::SizeChanged {
            key: artifact.key.clone(),
            declared: artifact.size,
            copied: if grew { copied + 1 } else { copied },
        });
    }
    Ok(copied)
}

/// A validated container: every declared blob lies inside `bytes` and the
/// blobs cover the data region exactly.
#[derive(Debug)]
pub struct ParsedContainer<'a> {
    pub manifest: Manifest,
    pub manifest_len: usize,
    /// Blob bytes, parallel to `manifest.embedded_data_order`.
    pub blobs: Vec<&'a [u8]>,
}

impl<'a> ParsedContainer<'a> {
    pub fn entries(&self) -> impl Iterator<Item = (&str, &'a [u8])> {
        self.manifest
            .embedded_data_order
            .iter()
            .map(String::as_str)
            .zip(self.blobs.iter().copied())
    }
}

pub fn parse_container(bytes: &[u8]) -> Result<ParsedContainer<'_>, ReportError> {
    let Some(prefix) = bytes.first_chunk::<LENGTH_PREFIX>() else {
        return Err(ReportError::Corrupt(format!(
            "{} bytes is too short for the length prefix",
            bytes.len()
        )));
    };
    let manifest_len = u32::from_le_bytes(*prefix) as usize;
    let data_start = LENGTH_PREFIX
        .checked_add(manifest_len)
        .filter(|&end| end <= bytes.len())
        .ok_or_else(|| {
            ReportError::Corrupt(format!(
                "manifest length {manifest_len} exceeds container size {}",
                bytes.len()
            ))
        })?;

    let manifest: Manifest = serde_json::from_slice(&bytes[LENGTH_PREFIX..data_start])
        .map_err(|e| ReportError::Corrupt(format!("invalid manifest: {e}")))?;

    let mut seen = BTreeSet::new();
    for key in &manifest.embedded_data_order {
        if !seen.insert(key.as_str()) {
            return Err(ReportError::Corrupt(format!("key '{key}' is listed twice")));
        }
    }
    if seen.len() != manifest.embedded_data_sizes.len() {
        return Err(ReportError::Corrupt(
            "embedded_data_sizes and embedded_data_order disagree".to_string(),
        ));
    }

    let mut offset = data_start;
    let mut blobs = Vec::with_capacity(manifest.embedded_data_order.len());
    for key in &manifest.embedded_data_order {
        let size = *manifest
            .embedded_data_sizes
            .get(key)
            .ok_or_else(|| ReportError::Corrupt(format!("no size declared for '{key}'")))?;
        let end = usize::try_from(size)
            .ok()
            .and_then(|size| offset.checked_add(size))
            .filter(|&end| end <= bytes.len())
            .ok_or_else(|| {
                ReportError::Corrupt(format!(
                    "truncated: '{key}' needs {size} bytes, {} remain",
                    bytes.len() - offset
                ))
            })?;
        blobs.push(&bytes[offset..end]);
        offset = end;
    }
    if offset != bytes.len() {
        return Err(ReportError::Corrupt(format!(
            "{} trailing bytes after the last artifact",
            bytes.len() - offset
        )));
    }

    Ok(ParsedContainer {
        manifest,
        manifest_len,
        blobs,
    })
}

#[cfg(test)]
#[path = "../../tests/src_inline/report/container.rs"]
mod tests;
