use std::collections::BTreeSet;
use std::ffi::OsString;
use std::fs::{self, File};
use std::path::{Component, Path, PathBuf};

use memmap2::Mmap;

use crate::report::container::parse_container;
use crate::report::{ReportError, UNPACK_SUFFIX, renamed_key};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnpackSummary {
    pub out_dir: PathBuf,
    pub report_name: String,
    pub files: Vec<PathBuf>,
}

/// `<container>.out` next to the container.
pub fn default_unpack_dir(container: &Path) -> PathBuf {
    let mut name = OsString::from(container.as_os_str());
    name.push(UNPACK_SUFFIX);
    PathBuf::from(name)
}

/// Relative output path of an embedded artifact.
pub fn artifact_path(key: &str) -> Result<PathBuf, ReportError> {
    if let Some(name) = renamed_key(key) {
        return Ok(PathBuf::from(name));
    }

    let path = Path::new(key);
    let safe = !key.is_empty()
        && path
            .components()
            .all(|component| matches!(component, Component::Normal(_)));
    if !safe {
        return Err(ReportError::Corrupt(format!("unsafe artifact key '{key}'")));
    }

    let in_pca_dir = path
        .parent()
        .and_then(Path::file_name)
        .is_some_and(|name| name == "pca");
    if in_pca_dir && !path.extension().is_some_and(|ext| ext == "html") {
        let mut name = OsString::from(path.as_os_str());
        name.push(".html");
        return Ok(PathBuf::from(name));
    }
    Ok(path.to_path_buf())
}

/// Restores every embedded artifact of `container` under `out_dir`.
///
/// Nothing is written unless `out_dir` is absent and the whole container
/// validates, including that no two artifacts land on the same path and no
/// artifact path is the parent directory of another.
pub fn unpack_report(container: &Path, out_dir: &Path) -> Result<UnpackSummary, ReportError> {
    if fs::symlink_metadata(out_dir).is_ok() {
        return Err(ReportError::OutputExists(out_dir.to_path_buf()));
    }

    let file = File::open(container)?;
    let len = file.metadata()?.len();
    if len < 4 {
        return Err(ReportError::Corrupt(format!(
            "{len} bytes is too short for the length prefix"
        )));
    }
    let mmap = unsafe { Mmap::map(&file)? };
    let parsed = parse_container(&mmap[..])?;
    tracing::debug!(
        "container {}: manifest {} bytes, {} artifacts, {} data bytes",
        container.display(),
        parsed.manifest_len,
        parsed.blobs.len(),
        parsed.manifest.total_data_size()
    );

    let mut planned = Vec::with_capacity(parsed.blobs.len());
    let mut taken = BTreeSet::new();
    for (key, blob) in parsed.entries() {
        let relative = artifact_path(key)?;
        if !taken.insert(relative.clone()) {
            return Err(ReportError::Corrupt(format!(
                "artifact '{key}' unpacks to {}, which is already taken",
                relative.display()
            )));
        }
        planned.push((key, out_dir.join(&relative), blob));
    }
    for relative in &taken {
        let mut parents = relative.ancestors().skip(1);
        if let Some(dir) = parents.find(|dir| taken.contains(*dir)) {
            return Err(ReportError::Corrupt(format!(
                "{} is both a file and the directory of {}",
                dir.display(),
                relative.display()
            )));
        }
    }

    fs::create_dir_all(out_dir)?;
    let mut files = Vec::with_capacity(planned.len());
    for (key, path, blob) in planned {
        tracing::info!("{key}: {}", blob.len());
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, blob)?;
        files.push(path);
    }

    Ok(UnpackSummary {
        out_dir: out_dir.to_path_buf(),
        report_name: parsed.manifest.report_name.clone(),
        files,
    })
}

#[cfg(test)]
#[path = "../../tests/src_inline/report/unpack.rs"]
mod tests;
