use std::ffi::OsString;
use std::fs;
use std::io::{self, BufRead, BufReader, Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use serde_json::Value;
use thiserror::Error;

use crate::config::EngineConfig;
use crate::model::design::{DesignFormula, Role};
use crate::notify::{Notice, Notifier};

/// Prefix of structured progress lines on the engine's stdout.
pub const MESSAGE_SENTINEL: &str = "__LATCH_MESSAGE_DATA";

/// Output tree the engine expects to exist before it starts.
pub const OUTPUT_SUBDIRS: [&str; 8] = [
    "Data",
    "Data/QC",
    "Data/Contrast",
    "Plots",
    "Plots/QC",
    "Plots/QC/Variance P-Value",
    "Plots/QC/PCA",
    "Plots/Contrast",
];

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("failed to start statistics engine '{program}': {source}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },
    #[error("R script failed with return code {}", .code.map(|c| c.to_string()).unwrap_or_else(|| "none".to_string()))]
    Failed { code: Option<i32> },
    #[error("R script produced no outputs in {}", .0.display())]
    NoOutputs(PathBuf),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl EngineError {
    pub fn notice(&self) -> Option<Notice> {
        match self {
            EngineError::Failed { .. } => {
                Some(Notice::warning("R script failed", "The DESeq2 run failed"))
            }
            EngineError::NoOutputs(_) => Some(Notice::error(
                "R script produced no outputs",
                "The DESeq2 run produced no outputs",
            )),
            EngineError::Spawn { .. } => {
                Some(Notice::error("R script failed", self.to_string()))
            }
            EngineError::Io(_) => None,
        }
    }
}

/// Positional arguments of one engine run.
#[derive(Debug, Clone, Copy)]
pub struct EngineInvocation<'a> {
    pub conditions_path: &'a Path,
    pub sample_id_column: &'a str,
    pub design: &'a DesignFormula,
    pub counts_path: &'a Path,
    pub gene_id_column: &'a str,
    pub highlighted_genes: &'a [String],
    pub top_genes: u32,
    pub output_dir: &'a Path,
}

impl EngineInvocation<'_> {
    /// Arguments in wire order. Paths are made absolute since the engine runs
    /// from its own working directory.
    pub fn args(&self) -> Result<Vec<OsString>, EngineError> {
        Ok(vec![
            fs::canonicalize(self.conditions_path)?.into_os_string(),
            self.sample_id_column.into(),
            self.design.joined(Role::Explanatory).into(),
            self.design.joined(Role::Confounding).into(),
            self.design.joined(Role::Cluster).into(),
            fs::canonicalize(self.counts_path)?.into_os_string(),
            self.gene_id_column.into(),
            self.highlighted_genes.join(",").into(),
            self.top_genes.to_string().into(),
            fs::canonicalize(self.output_dir)?.into_os_string(),
        ])
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum EngineLine<'a> {
    Message { message_type: &'a str, payload: Value },
    Log(&'a str),
    Malformed(String),
}

/// `<sentinel> <type> <json>` is a progress message; anything else is log.
pub fn classify_line(line: &str) -> EngineLine<'_> {
    if !line.starts_with(MESSAGE_SENTINEL) {
        return EngineLine::Log(line);
    }
    let mut parts = line.trim_end_matches(['\r', '\n']).splitn(3, ' ');
    parts.next();
    let (Some(message_type), Some(payload)) = (parts.next(), parts.next()) else {
        return EngineLine::Malformed(format!("missing message type or payload: {line:?}"));
    };
    match serde_json::from_str(payload) {
        Ok(payload) => EngineLine::Message {
            message_type,
            payload,
        },
        Err(e) => EngineLine::Malformed(format!("invalid payload for '{message_type}': {e}")),
    }
}

pub fn prepare_output_dir(output_dir: &Path) -> Result<(), EngineError> {
    for sub in OUTPUT_SUBDIRS {
        fs::create_dir_all(output_dir.join(sub))?;
    }
    Ok(())
}

/// True when a regular file exists anywhere below `dir`.
pub fn has_regular_file(dir: &Path) -> Result<bool, EngineError> {
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let file_type = entry.file_type()?;
        if file_type.is_file() || (file_type.is_dir() && has_regular_file(&entry.path())?) {
            return Ok(true);
        }
    }
    Ok(false)
}

fn forward_output<R: Read>(
    stdout: R,
    notifier: &dyn Notifier,
    log: &mut dyn Write,
) -> Result<(), EngineError> {
    let mut reader = BufReader::new(stdout);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf)? == 0 {
            break;
        }
        let line = String::from_utf8_lossy(&buf);
        match classify_line(&line) {
            EngineLine::Message {
                message_type,
                payload,
            } => notifier.message(message_type, &payload),
            EngineLine::Log(_) => {
                log.write_all(&buf)?;
                log.flush()?;
            }
            EngineLine::Malformed(reason) => {
                tracing::warn!("dropping malformed engine message: {reason}")
            }
        }
    }
    Ok(())
}

/// Runs the engine to completion, streaming its stdout as it arrives.
pub fn run_engine(
    config: &EngineConfig,
    invocation: &EngineInvocation<'_>,
    notifier: &dyn Notifier,
    log: &mut dyn Write,
) -> Result<(), EngineError> {
    prepare_output_dir(invocation.output_dir)?;

    let mut command = Command::new(&config.program);
    if let Some(script) = &config.script {
        command.arg(script);
    }
    command
        .args(invocation.args()?)
        .current_dir(&config.working_dir)
        .stdout(Stdio::piped());
    tracing::debug!("spawning {command:?}");

    let mut child = command.spawn().map_err(|source| EngineError::Spawn {
        program: config.program.clone(),
        source,
    })?;
    let streamed = match child.stdout.take() {
        Some(stdout) => forward_output(stdout, notifier, log),
        None => Err(EngineError::Io(io::Error::other("engine stdout was not captured"))),
    };
    let status = child.wait()?;
    streamed?;

    if !status.success() {
        let err = EngineError::Failed {
            code: status.code(),
        };
        tracing::warn!("{err}");
        return Err(err);
    }
    if !has_regular_file(invocation.output_dir)? {
        return Err(EngineError::NoOutputs(invocation.output_dir.to_path_buf()));
    }
    Ok(())
}

#[cfg(test)]
#[path = "../../tests/src_inline/pipeline/stage2_engine.rs"]
mod tests;
