//! Unified-diff parsing and formatting.
//!
//! The parser is line-oriented and never fails: structured lines (git
//! headers, hunk headers) go through small winnow grammars, declaration
//! headers inside added/removed lines go through regexes, and anything
//! unrecognized degrades to a `Modified` record with empty sets plus a
//! warning. Hunk context text is used two ways: a full canonical
//! `Type.Method(params)` id is taken verbatim, and a C# declaration
//! header has its method name extracted.
//!
//! The formatter emits a canonical diff for a [`ChangeSet`] — one file
//! section per change, one hunk per changed method with the id in the
//! hunk context, one added declaration line per changed type — chosen so
//! that `parse(format(cs)) == cs`.

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::LazyLock;

use regex::Regex;
use tracing::warn;
use winnow::ascii::dec_uint;
use winnow::combinator::{opt, preceded, rest};
use winnow::token::take_until0;
use winnow::{PResult, Parser};

use crate::changes::{is_configuration_file, ChangeKind, ChangeSet, CodeChange};

/// A canonical method id in hunk context: `Shop.Svc.Run(int)`.
static FULL_METHOD_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][\w.<>,\[\]]*\([\w.<>,\[\]? ]*\)$").unwrap());

/// A C# method declaration header on a changed line.
static METHOD_DECL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?:(?:public|private|protected|internal|static|virtual|override|async|sealed|partial|new|extern|unsafe)\s+)+[\w.<>,\[\]?]+\s+([A-Za-z_]\w*)\s*(?:<[^>]*>)?\s*\(",
    )
    .unwrap()
});

static TYPE_DECL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(?:class|interface|struct|record|enum)\s+([A-Za-z_]\w*)").unwrap()
});

#[derive(Debug, Clone, PartialEq, Eq)]
struct HunkHeader {
    new_start: u32,
    new_count: u32,
    context: String,
}

fn hunk_header(input: &mut &str) -> PResult<HunkHeader> {
    let _ = "@@ -".parse_next(input)?;
    let _old_start: u32 = dec_uint.parse_next(input)?;
    let _old_count: Option<u32> = opt(preceded(',', dec_uint)).parse_next(input)?;
    let _ = " +".parse_next(input)?;
    let new_start: u32 = dec_uint.parse_next(input)?;
    let new_count: Option<u32> = opt(preceded(',', dec_uint)).parse_next(input)?;
    let _ = " @@".parse_next(input)?;
    let context: Option<&str> = opt(preceded(' ', rest)).parse_next(input)?;
    Ok(HunkHeader {
        new_start,
        new_count: new_count.unwrap_or(1),
        context: context.unwrap_or_default().trim().to_string(),
    })
}

/// `diff --git a/<old> b/<new>` → the new path.
fn git_header(input: &mut &str) -> PResult<String> {
    let _ = "diff --git a/".parse_next(input)?;
    let _old: &str = take_until0(" b/").parse_next(input)?;
    let _ = " b/".parse_next(input)?;
    let new: &str = rest.parse_next(input)?;
    Ok(new.trim().to_string())
}

#[derive(Debug)]
pub struct DiffParse {
    pub change_set: ChangeSet,
    pub warnings: Vec<String>,
}

#[derive(Default)]
struct Section {
    path: Option<PathBuf>,
    added: bool,
    deleted: bool,
    renamed: bool,
    methods: BTreeSet<String>,
    types: BTreeSet<String>,
    min_line: u32,
    max_line: u32,
    damaged_hunks: usize,
    hunks: usize,
}

impl Section {
    fn flush(self, warnings: &mut Vec<String>) -> Option<CodeChange> {
        let path = match self.path {
            Some(path) => path,
            None => {
                if self.hunks > 0 || self.damaged_hunks > 0 {
                    warnings.push("hunk with no file header discarded".to_string());
                }
                return None;
            }
        };
        let kind = if is_configuration_file(&path) {
            ChangeKind::Configuration
        } else if self.added {
            ChangeKind::Added
        } else if self.deleted {
            ChangeKind::Deleted
        } else if self.renamed {
            ChangeKind::Renamed
        } else {
            ChangeKind::Modified
        };
        let (methods, types) = if kind == ChangeKind::Configuration {
            (BTreeSet::new(), BTreeSet::new())
        } else {
            (self.methods, self.types)
        };
        Some(CodeChange {
            file: path,
            kind,
            changed_methods: methods,
            changed_types: types,
            start_line: self.min_line,
            end_line: self.max_line,
        })
    }

    fn record_hunk(&mut self, header: &HunkHeader) {
        self.hunks += 1;
        let start = header.new_start;
        let end = start + header.new_count.saturating_sub(1);
        if self.min_line == 0 || start < self.min_line {
            self.min_line = start;
        }
        if end > self.max_line {
            self.max_line = end;
        }
        if !header.context.is_empty() {
            self.capture_context(&header.context);
        }
    }

    fn capture_context(&mut self, context: &str) {
        if FULL_METHOD_ID.is_match(context) {
            self.methods.insert(context.to_string());
            return;
        }
        if let Some(caps) = METHOD_DECL.captures(context) {
            self.methods.insert(caps[1].to_string());
        }
        if let Some(caps) = TYPE_DECL.captures(context) {
            self.types.insert(caps[1].to_string());
        }
    }

    fn capture_content(&mut self, line: &str) {
        if let Some(caps) = TYPE_DECL.captures(line) {
            self.types.insert(caps[1].to_string());
        } else if let Some(caps) = METHOD_DECL.captures(line) {
            self.methods.insert(caps[1].to_string());
        }
    }
}

/// Parse a unified diff. Never fails: damage is reported through the
/// returned warnings and whatever was recovered is kept.
pub fn parse_unified_diff(text: &str) -> DiffParse {
    let mut warnings = Vec::new();
    let mut changes = Vec::new();
    let mut current: Option<Section> = None;

    for raw in text.lines() {
        let line = raw.trim_end_matches('\r');
        if let Some(header) = line.strip_prefix("diff --git ") {
            if let Some(section) = current.take() {
                changes.extend(section.flush(&mut warnings));
            }
            let mut section = Section::default();
            let mut input = line;
            match git_header.parse_next(&mut input) {
                Ok(path) => section.path = Some(PathBuf::from(path)),
                Err(_) => {
                    warnings.push(format!("unparseable diff header: '{header}'"));
                }
            }
            current = Some(section);
        } else if line.starts_with("rename from ") {
            if let Some(section) = current.as_mut() {
                section.renamed = true;
            }
        } else if let Some(to) = line.strip_prefix("rename to ") {
            if let Some(section) = current.as_mut() {
                section.renamed = true;
                section.path = Some(PathBuf::from(to.trim()));
            }
        } else if line.starts_with("new file mode") {
            if let Some(section) = current.as_mut() {
                section.added = true;
            }
        } else if line.starts_with("deleted file mode") {
            if let Some(section) = current.as_mut() {
                section.deleted = true;
            }
        } else if let Some(old) = line.strip_prefix("--- ") {
            let section = current.get_or_insert_with(Section::default);
            if old.trim() == "/dev/null" {
                section.added = true;
            } else if section.path.is_none() {
                section.path = Some(PathBuf::from(
                    old.trim().strip_prefix("a/").unwrap_or(old.trim()),
                ));
            }
        } else if let Some(new) = line.strip_prefix("+++ ") {
            let section = current.get_or_insert_with(Section::default);
            if new.trim() == "/dev/null" {
                section.deleted = true;
                section.added = false;
            } else {
                section.path = Some(PathBuf::from(
                    new.trim().strip_prefix("b/").unwrap_or(new.trim()),
                ));
            }
        } else if line.starts_with("@@") {
            let section = current.get_or_insert_with(Section::default);
            let mut input = line;
            match hunk_header.parse_next(&mut input) {
                Ok(header) => section.record_hunk(&header),
                Err(_) => {
                    section.damaged_hunks += 1;
                    let display_path = section
                        .path
                        .as_ref()
                        .map(|p| p.display().to_string())
                        .unwrap_or_else(|| "<unknown>".to_string());
                    warn!(file = %display_path, line = %line, "unparseable hunk header");
                    warnings.push(format!("unparseable hunk header in '{display_path}'"));
                }
            }
        } else if (line.starts_with('+') || line.starts_with('-'))
            && !line.starts_with("+++")
            && !line.starts_with("---")
        {
            if let Some(section) = current.as_mut() {
                section.capture_content(&line[1..]);
            }
        }
    }
    if let Some(section) = current.take() {
        changes.extend(section.flush(&mut warnings));
    }

    DiffParse {
        change_set: ChangeSet { changes },
        warnings,
    }
}

/// Render a [`ChangeSet`] as a canonical unified diff; the inverse of
/// [`parse_unified_diff`] for sets it produced.
pub fn format_unified_diff(set: &ChangeSet) -> String {
    let mut out = String::new();
    for change in &set.changes {
        let file = change.file.to_string_lossy().replace('\\', "/");
        out.push_str(&format!("diff --git a/{file} b/{file}\n"));
        match change.kind {
            ChangeKind::Added => {
                out.push_str("new file mode 100644\n");
                out.push_str("--- /dev/null\n");
                out.push_str(&format!("+++ b/{file}\n"));
            }
            ChangeKind::Deleted => {
                out.push_str("deleted file mode 100644\n");
                out.push_str(&format!("--- a/{file}\n"));
                out.push_str("+++ /dev/null\n");
            }
            ChangeKind::Renamed => {
                out.push_str(&format!("rename from {file}\n"));
                out.push_str(&format!("rename to {file}\n"));
                out.push_str(&format!("--- a/{file}\n"));
                out.push_str(&format!("+++ b/{file}\n"));
            }
            ChangeKind::Modified | ChangeKind::Configuration => {
                out.push_str(&format!("--- a/{file}\n"));
                out.push_str(&format!("+++ b/{file}\n"));
            }
        }
        let start = change.start_line.max(1);
        let count = if change.end_line >= start {
            change.end_line - start + 1
        } else {
            1
        };
        if change.changed_methods.is_empty() {
            out.push_str(&format!("@@ -{start},{count} +{start},{count} @@\n"));
        }
        for method in &change.changed_methods {
            out.push_str(&format!("@@ -{start},{count} +{start},{count} @@ {method}\n"));
        }
        for ty in &change.changed_types {
            out.push_str(&format!("+internal class {ty}\n"));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hunk_header_grammar() {
        let mut input = "@@ -10,4 +12,6 @@ Shop.Svc.Run(int)";
        let header = hunk_header.parse_next(&mut input).unwrap();
        assert_eq!(header.new_start, 12);
        assert_eq!(header.new_count, 6);
        assert_eq!(header.context, "Shop.Svc.Run(int)");

        let mut short = "@@ -3 +4 @@";
        let header = hunk_header.parse_next(&mut short).unwrap();
        assert_eq!(header.new_start, 4);
        assert_eq!(header.new_count, 1);
        assert!(header.context.is_empty());
    }

    #[test]
    fn test_git_header_grammar() {
        let mut input = "diff --git a/src/Svc.cs b/src/Svc.cs";
        assert_eq!(git_header.parse_next(&mut input).unwrap(), "src/Svc.cs");
    }

    #[test]
    fn test_parse_simple_modification() {
        let diff = "\
diff --git a/src/UserController.cs b/src/UserController.cs
--- a/src/UserController.cs
+++ b/src/UserController.cs
@@ -10,8 +10,9 @@ public class UserController
-        public User GetUser(int id)
+        public virtual User GetUser(int id)
         {
";
        let parsed = parse_unified_diff(diff);
        assert!(parsed.warnings.is_empty());
        let change = &parsed.change_set.changes[0];
        assert_eq!(change.kind, ChangeKind::Modified);
        assert_eq!(change.file, PathBuf::from("src/UserController.cs"));
        assert!(change.changed_methods.contains("GetUser"));
        assert!(change.changed_types.contains("UserController"));
        assert_eq!(change.start_line, 10);
        assert_eq!(change.end_line, 18);
    }

    #[test]
    fn test_parse_added_and_deleted() {
        let diff = "\
diff --git a/src/New.cs b/src/New.cs
new file mode 100644
--- /dev/null
+++ b/src/New.cs
@@ -0,0 +1,3 @@
+public class Fresh
+{
+}
diff --git a/src/Old.cs b/src/Old.cs
deleted file mode 100644
--- a/src/Old.cs
+++ /dev/null
@@ -1,3 +0,0 @@
-public class Stale
-{
-}
";
        let parsed = parse_unified_diff(diff);
        let changes = &parsed.change_set.changes;
        assert_eq!(changes[0].kind, ChangeKind::Added);
        assert!(changes[0].changed_types.contains("Fresh"));
        assert_eq!(changes[1].kind, ChangeKind::Deleted);
        assert!(changes[1].changed_types.contains("Stale"));
    }

    #[test]
    fn test_configuration_change_has_empty_sets() {
        let diff = "\
diff --git a/appsettings.json b/appsettings.json
--- a/appsettings.json
+++ b/appsettings.json
@@ -1,3 +1,4 @@
+  \"NewKey\": true,
";
        let parsed = parse_unified_diff(diff);
        let change = &parsed.change_set.changes[0];
        assert_eq!(change.kind, ChangeKind::Configuration);
        assert!(change.changed_methods.is_empty());
        assert!(change.changed_types.is_empty());
    }

    #[test]
    fn test_malformed_hunk_warns_but_recovers() {
        let diff = "\
diff --git a/src/A.cs b/src/A.cs
--- a/src/A.cs
+++ b/src/A.cs
@@ garbage @@
+        public void Recovered() { }
";
        let parsed = parse_unified_diff(diff);
        assert_eq!(parsed.warnings.len(), 1);
        let change = &parsed.change_set.changes[0];
        assert_eq!(change.kind, ChangeKind::Modified);
        // Content-line recovery still works after a damaged header.
        assert!(change.changed_methods.contains("Recovered"));
    }

    #[test]
    fn test_rename_detection() {
        let diff = "\
diff --git a/src/Old.cs b/src/Renamed.cs
rename from src/Old.cs
rename to src/Renamed.cs
--- a/src/Old.cs
+++ b/src/Renamed.cs
@@ -1,1 +1,1 @@
";
        let parsed = parse_unified_diff(diff);
        let change = &parsed.change_set.changes[0];
        assert_eq!(change.kind, ChangeKind::Renamed);
        assert_eq!(change.file, PathBuf::from("src/Renamed.cs"));
    }

    #[test]
    fn test_full_method_id_in_context_is_kept_verbatim() {
        let diff = "\
diff --git a/src/Svc.cs b/src/Svc.cs
--- a/src/Svc.cs
+++ b/src/Svc.cs
@@ -5,3 +5,4 @@ Shop.Core.Svc.Run(int,string)
";
        let parsed = parse_unified_diff(diff);
        assert!(parsed.change_set.changes[0]
            .changed_methods
            .contains("Shop.Core.Svc.Run(int,string)"));
    }

    #[test]
    fn test_format_parse_roundtrip() {
        let set = ChangeSet {
            changes: vec![
                CodeChange {
                    file: "src/UserController.cs".into(),
                    kind: ChangeKind::Modified,
                    changed_methods: [
                        "Shop.Api.UserController.GetUser(int)".to_string(),
                        "Shop.Api.UserController.ListUsers()".to_string(),
                    ]
                    .into_iter()
                    .collect(),
                    changed_types: ["UserController".to_string()].into_iter().collect(),
                    start_line: 10,
                    end_line: 30,
                },
                CodeChange {
                    file: "src/New.cs".into(),
                    kind: ChangeKind::Added,
                    changed_methods: BTreeSet::new(),
                    changed_types: ["Fresh".to_string()].into_iter().collect(),
                    start_line: 1,
                    end_line: 3,
                },
                CodeChange {
                    file: "appsettings.json".into(),
                    kind: ChangeKind::Configuration,
                    changed_methods: BTreeSet::new(),
                    changed_types: BTreeSet::new(),
                    start_line: 1,
                    end_line: 2,
                },
            ],
        };
        let formatted = format_unified_diff(&set);
        let parsed = parse_unified_diff(&formatted);
        assert!(parsed.warnings.is_empty());
        assert_eq!(parsed.change_set, set);
    }

    #[test]
    fn test_empty_input_yields_empty_set() {
        let parsed = parse_unified_diff("");
        assert!(parsed.change_set.changes.is_empty());
        assert!(parsed.warnings.is_empty());
    }
}
