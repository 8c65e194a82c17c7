//! Solution and project discovery.
//!
//! A workspace is either described by a `.sln` (whose project entries we
//! parse), by loose `.csproj` files, or — for bare source trees — by one
//! implicit project rooted at the solution root. Discovery cost is
//! proportional to the number of manifests, not sources, which is what
//! keeps lazy initialization cheap.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use crate::config::ProjectsConfig;
use crate::error::Result;
use crate::workspace::provider::SourceProvider;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectKind {
    Library,
    Test,
}

#[derive(Debug, Clone)]
pub struct Project {
    pub name: String,
    /// Directory that scopes this project's sources.
    pub dir: PathBuf,
    pub kind: ProjectKind,
}

/// `Project("{GUID}") = "Name", "rel\path.csproj", …` lines in a `.sln`.
static SLN_PROJECT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?m)^Project\("\{[^}]*\}"\)\s*=\s*"([^"]+)",\s*"([^"]+)""#).unwrap()
});

/// Package references that mark a project as a test project.
const TEST_PACKAGE_MARKERS: &[&str] = &[
    "xunit",
    "nunit",
    "mstest",
    "microsoft.net.test.sdk",
];

/// Path tokens that mark a file as living in a test project.
pub fn path_is_testish(path: &str) -> bool {
    let lower = path.to_ascii_lowercase().replace('\\', "/");
    lower.contains("/test/")
        || lower.contains("/tests/")
        || lower.contains(".test.")
        || lower.contains(".tests.")
        || lower.ends_with(".test")
        || lower.ends_with(".tests")
}

/// Discover the projects of a workspace, applying the include/exclude
/// filters. An unreadable solution file is fatal; everything else degrades
/// to coarser discovery.
pub fn discover(
    root: &Path,
    provider: &dyn SourceProvider,
    filters: &ProjectsConfig,
) -> Result<Vec<Project>> {
    let manifests = provider.manifests()?;
    let slns: Vec<_> = manifests
        .iter()
        .filter(|p| p.extension().is_some_and(|e| e.eq_ignore_ascii_case("sln")))
        .collect();
    let csprojs: Vec<_> = manifests
        .iter()
        .filter(|p| p.extension().is_some_and(|e| e.eq_ignore_ascii_case("csproj")))
        .collect();

    let mut projects = Vec::new();
    if let Some(sln) = slns.first() {
        // The solution file is the authority when present; failing to read
        // it is fatal by contract.
        let text = provider.read(sln)?;
        let sln_dir = sln.parent().unwrap_or(root);
        for caps in SLN_PROJECT.captures_iter(&text) {
            let name = caps[1].to_string();
            let rel = caps[2].replace('\\', "/");
            if !rel.ends_with(".csproj") {
                continue;
            }
            let csproj = sln_dir.join(&rel);
            projects.push(make_project(name, &csproj, provider));
        }
    } else if !csprojs.is_empty() {
        for csproj in csprojs {
            let name = csproj
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default();
            projects.push(make_project(name, csproj, provider));
        }
    } else {
        let name = root
            .file_name()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "workspace".to_string());
        debug!(root = %root.display(), "no manifests found, using implicit project");
        projects.push(Project {
            kind: if path_is_testish(&name) {
                ProjectKind::Test
            } else {
                ProjectKind::Library
            },
            name,
            dir: root.to_path_buf(),
        });
    }

    projects.retain(|p| {
        let admitted = filters.admits(&p.name);
        if !admitted {
            debug!(project = %p.name, "excluded by project filters");
        }
        admitted
    });
    projects.sort_by(|a, b| a.name.cmp(&b.name));
    projects.dedup_by(|a, b| a.name == b.name);
    Ok(projects)
}

fn make_project(name: String, csproj: &Path, provider: &dyn SourceProvider) -> Project {
    let dir = csproj.parent().unwrap_or(Path::new(".")).to_path_buf();
    let testish = path_is_testish(&name)
        || path_is_testish(&csproj.to_string_lossy())
        || provider
            .read(csproj)
            .map(|text| {
                let lower = text.to_ascii_lowercase();
                TEST_PACKAGE_MARKERS.iter().any(|m| lower.contains(m))
            })
            .unwrap_or(false);
    Project {
        name,
        dir,
        kind: if testish {
            ProjectKind::Test
        } else {
            ProjectKind::Library
        },
    }
}

impl Project {
    pub fn owns(&self, file: &Path) -> bool {
        file.starts_with(&self.dir)
    }
}
