//! Source providers.
//!
//! The engine never touches the runtime that produced a workspace; it only
//! consumes `{file, text}` through this capability. The filesystem provider
//! is the production implementation; the in-memory provider backs tests and
//! embedders that already hold sources.

use std::collections::BTreeMap;
use std::fs::File;
use std::path::{Path, PathBuf};

use memmap2::Mmap;
use walkdir::WalkDir;

use crate::error::{EngineError, Result};

/// Directories that hold build artifacts, never sources.
const SKIP_DIRS: &[&str] = &["bin", "obj", ".git", ".vs", "node_modules", "packages", "TestResults"];

/// Files larger than this are memory-mapped instead of buffered.
const MMAP_THRESHOLD: u64 = 1 << 16;

pub trait SourceProvider: Send + Sync {
    /// Every C# source file in the workspace, sorted by path.
    fn files(&self) -> Result<Vec<PathBuf>>;

    fn read(&self, path: &Path) -> Result<String>;

    /// Project and solution manifests (`.sln`, `.csproj`), sorted by path.
    fn manifests(&self) -> Result<Vec<PathBuf>>;
}

pub struct FsProvider {
    root: PathBuf,
}

impl FsProvider {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn walk(&self, wanted: &dyn Fn(&Path) -> bool) -> Result<Vec<PathBuf>> {
        if !self.root.exists() {
            return Err(EngineError::InvalidInput(format!(
                "solution root '{}' does not exist",
                self.root.display()
            )));
        }
        let mut found = Vec::new();
        let walker = WalkDir::new(&self.root).into_iter().filter_entry(|e| {
            let name = e.file_name().to_string_lossy();
            !(e.file_type().is_dir() && SKIP_DIRS.iter().any(|s| name.eq_ignore_ascii_case(s)))
        });
        for entry in walker {
            let entry = entry.map_err(|e| EngineError::Io(e.into()))?;
            if entry.file_type().is_file() && wanted(entry.path()) {
                found.push(entry.into_path());
            }
        }
        found.sort();
        Ok(found)
    }
}

impl SourceProvider for FsProvider {
    fn files(&self) -> Result<Vec<PathBuf>> {
        self.walk(&|p| p.extension().is_some_and(|e| e.eq_ignore_ascii_case("cs")))
    }

    fn manifests(&self) -> Result<Vec<PathBuf>> {
        self.walk(&|p| {
            p.extension()
                .is_some_and(|e| e.eq_ignore_ascii_case("sln") || e.eq_ignore_ascii_case("csproj"))
        })
    }

    fn read(&self, path: &Path) -> Result<String> {
        let file = File::open(path)?;
        let len = file.metadata()?.len();
        if len > MMAP_THRESHOLD {
            let mmap = unsafe { Mmap::map(&file)? };
            Ok(String::from_utf8_lossy(&mmap).into_owned())
        } else {
            Ok(std::fs::read_to_string(path)?)
        }
    }
}

/// Provider over an in-memory file map.
#[derive(Default)]
pub struct MemoryProvider {
    files: BTreeMap<PathBuf, String>,
}

impl MemoryProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(mut self, path: impl Into<PathBuf>, text: impl Into<String>) -> Self {
        self.files.insert(path.into(), text.into());
        self
    }

    pub fn insert(&mut self, path: impl Into<PathBuf>, text: impl Into<String>) {
        self.files.insert(path.into(), text.into());
    }
}

impl SourceProvider for MemoryProvider {
    fn files(&self) -> Result<Vec<PathBuf>> {
        Ok(self
            .files
            .keys()
            .filter(|p| p.extension().is_some_and(|e| e == "cs"))
            .cloned()
            .collect())
    }

    fn manifests(&self) -> Result<Vec<PathBuf>> {
        Ok(self
            .files
            .keys()
            .filter(|p| {
                p.extension()
                    .is_some_and(|e| e == "sln" || e == "csproj")
            })
            .cloned()
            .collect())
    }

    fn read(&self, path: &Path) -> Result<String> {
        self.files
            .get(path)
            .cloned()
            .ok_or_else(|| EngineError::InvalidInput(format!("unknown file '{}'", path.display())))
    }
}
