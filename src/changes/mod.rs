//! Change-set model: what a diff did to the workspace.

pub mod diff;

use std::collections::BTreeSet;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

pub use diff::{format_unified_diff, parse_unified_diff, DiffParse};

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    strum_macros::Display,
    strum_macros::EnumString,
)]
#[strum(ascii_case_insensitive)]
pub enum ChangeKind {
    Added,
    Modified,
    Deleted,
    Renamed,
    Configuration,
}

/// One file's worth of change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CodeChange {
    pub file: PathBuf,
    pub kind: ChangeKind,
    /// Method names touched by the change: full MethodIds when the diff
    /// carried them in hunk context, bare names when recovered from
    /// declaration headers. The engine resolves bare names against the
    /// symbol index.
    #[serde(default)]
    pub changed_methods: BTreeSet<String>,
    #[serde(default)]
    pub changed_types: BTreeSet<String>,
    pub start_line: u32,
    pub end_line: u32,
}

/// Ordered collection of [`CodeChange`] records driving an impact query.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeSet {
    pub changes: Vec<CodeChange>,
}

impl ChangeSet {
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    /// All changed file names (lossy), for category-prior matching.
    pub fn changed_files(&self) -> Vec<String> {
        self.changes
            .iter()
            .map(|c| c.file.to_string_lossy().into_owned())
            .collect()
    }

    pub fn changed_types(&self) -> BTreeSet<&str> {
        self.changes
            .iter()
            .flat_map(|c| c.changed_types.iter().map(String::as_str))
            .collect()
    }

    pub fn has_configuration_change(&self) -> bool {
        self.changes
            .iter()
            .any(|c| c.kind == ChangeKind::Configuration)
    }
}

/// File extensions that make a change `Configuration` rather than code.
pub const CONFIG_EXTENSIONS: &[&str] = &[
    "json", "xml", "config", "yml", "yaml", "toml", "ini", "csproj", "props", "targets", "sln",
];

pub fn is_configuration_file(path: &std::path::Path) -> bool {
    path.extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .is_some_and(|ext| CONFIG_EXTENSIONS.contains(&ext.as_str()))
}
