use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;

/// `"{level1} vs {level2} ({column})"`, matched against a file stem.
static CONTRAST_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?P<l1>.+) vs (?P<l2>.+) \((?P<col>.+)\)").unwrap());

/// Column -> level1 -> sorted level2 values.
pub type LevelOptions = BTreeMap<String, BTreeMap<String, BTreeSet<String>>>;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct ContrastIdentifier {
    pub column: String,
    pub level1: String,
    pub level2: String,
}

impl ContrastIdentifier {
    pub fn parse(stem: &str) -> Option<Self> {
        let caps = CONTRAST_RE.captures(stem)?;
        Some(Self {
            column: caps["col"].to_string(),
            level1: caps["l1"].to_string(),
            level2: caps["l2"].to_string(),
        })
    }

    pub fn from_file_name(path: &Path) -> Option<Self> {
        let stem = path.file_stem()?.to_str()?;
        Self::parse(stem)
    }

    pub fn id(&self) -> String {
        format!("{}_{}_{}", self.column, self.level1, self.level2)
    }

    pub fn insert_into(self, options: &mut LevelOptions) {
        options
            .entry(self.column)
            .or_default()
            .entry(self.level1)
            .or_default()
            .insert(self.level2);
    }
}

#[cfg(test)]
#[path = "../../tests/src_inline/model/contrast.rs"]
mod tests;
