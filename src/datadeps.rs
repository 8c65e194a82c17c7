//! Data-dependency analysis for parallel-batch planning.
//!
//! Pluggable detectors inspect each test for shared external resources;
//! pairwise conflict rules then decide which tests must not run in the
//! same parallel batch. Two detectors ship: an ORM-context detector (any
//! local, field, or parameter whose type is a database context is a
//! `Database` dependency on `ctx:{ContextType}` with entities taken from
//! its `DbSet<T>` properties) and a filesystem detector (string-literal
//! arguments to `File`/`Directory` members, with the access mode deduced
//! from the member name).
//!
//! Conservative default: when a detector fails, the affected test only
//! conflicts with tests sharing its fixture class; everything else is
//! assumed parallel-safe and the failure is logged.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::cancel::CancelToken;
use crate::classify::TestEntry;
use crate::error::{Phase, Result};
use crate::symbols::{canonical_method_id, strip_generics, MethodId, SymbolIndex};
use crate::syntax::{BodyStep, LocalTy, MethodDecl, Receiver, SourceModel, TypeDecl};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DependencyKind {
    Database,
    FileSystem,
    Network,
    Cache,
    ExternalService,
    Configuration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AccessMode {
    Read,
    Write,
    ReadWrite,
    Create,
    Update,
    Delete,
}

impl AccessMode {
    pub fn writes(self) -> bool {
        !matches!(self, AccessMode::Read)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataDependency {
    pub test: MethodId,
    pub kind: DependencyKind,
    pub resource: String,
    pub access: AccessMode,
    pub entities: BTreeSet<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConflictKind {
    SharedData,
    ExclusiveResource,
    OrderDependency,
    SharedFixture,
    ResourceContention,
    RaceCondition,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Severity {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conflict {
    pub test_a: MethodId,
    pub test_b: MethodId,
    pub kind: ConflictKind,
    pub severity: Severity,
    pub prevents_parallel: bool,
}

/// Everything a detector may look at for one test.
pub struct TestContext<'a> {
    pub test: &'a MethodId,
    pub method: &'a MethodDecl,
    pub ty: &'a TypeDecl,
    pub model: &'a SourceModel,
    pub index: &'a SymbolIndex,
}

pub trait DependencyDetector: Send + Sync {
    fn name(&self) -> &'static str;
    fn detect(&self, ctx: &TestContext<'_>) -> Result<Vec<DataDependency>>;
}

/// Database contexts: a type is a context when its name ends in
/// `DbContext`, it derives from one, or it declares `DbSet<T>` members.
pub struct DbContextDetector;

impl DbContextDetector {
    fn context_type<'i>(&self, raw_ty: &str, ctx: &TestContext<'i>) -> Option<String> {
        let simple = strip_generics(raw_ty).rsplit('.').next()?.to_string();
        if simple.ends_with("DbContext") || simple.ends_with("DataContext") {
            return Some(simple);
        }
        let resolve_ctx = crate::symbols::ResolveCtx {
            namespace: &ctx.ty.namespace,
            usings: &ctx.model.usings,
        };
        let entry = ctx.index.resolve_type(raw_ty, &resolve_ctx)?;
        let derives = entry
            .bases_raw
            .iter()
            .any(|b| strip_generics(b).ends_with("DbContext"));
        let has_sets = entry
            .fields
            .iter()
            .any(|(_, field_ty, _)| strip_generics(field_ty) == "DbSet");
        (derives || has_sets).then(|| simple)
    }

    fn entities_of(&self, context_simple: &str, ctx: &TestContext<'_>) -> BTreeSet<String> {
        let mut entities = BTreeSet::new();
        for entry in ctx.index.types() {
            let simple = entry.fq.rsplit('.').next().unwrap_or(&entry.fq);
            if simple != context_simple {
                continue;
            }
            for (_, field_ty, _) in &entry.fields {
                if strip_generics(field_ty) == "DbSet" {
                    if let Some(arg) = generic_arg(field_ty) {
                        entities.insert(arg);
                    }
                }
            }
        }
        entities
    }
}

impl DependencyDetector for DbContextDetector {
    fn name(&self) -> &'static str {
        "db-context"
    }

    fn detect(&self, ctx: &TestContext<'_>) -> Result<Vec<DataDependency>> {
        let mut seen: BTreeSet<String> = BTreeSet::new();
        let mut candidate_tys: Vec<String> = Vec::new();
        for param in &ctx.method.params {
            candidate_tys.push(param.ty.clone());
        }
        for field in &ctx.ty.fields {
            candidate_tys.push(field.ty.clone());
        }
        for step in &ctx.method.body {
            match step {
                BodyStep::Local {
                    ty: LocalTy::Explicit(t) | LocalTy::FromNew(t),
                    ..
                } => candidate_tys.push(t.clone()),
                BodyStep::New(creation) => candidate_tys.push(creation.ty.clone()),
                _ => {}
            }
        }

        let mut deps = Vec::new();
        for raw in candidate_tys {
            let Some(simple) = self.context_type(&raw, ctx) else {
                continue;
            };
            if !seen.insert(simple.clone()) {
                continue;
            }
            deps.push(DataDependency {
                test: ctx.test.clone(),
                kind: DependencyKind::Database,
                resource: format!("ctx:{simple}"),
                access: AccessMode::ReadWrite,
                entities: self.entities_of(&simple, ctx),
            });
        }
        Ok(deps)
    }
}

/// Filesystem access through the static `File`/`Directory`/`Path` APIs.
pub struct FileSystemDetector;

impl FileSystemDetector {
    fn access_for(member: &str) -> AccessMode {
        if member.starts_with("Read") || member.starts_with("Open") || member.starts_with("Exists")
        {
            AccessMode::Read
        } else if member.starts_with("Write") || member.starts_with("Append") {
            AccessMode::Write
        } else if member.starts_with("Create") {
            AccessMode::Create
        } else if member.starts_with("Delete") {
            AccessMode::Delete
        } else {
            AccessMode::ReadWrite
        }
    }
}

impl DependencyDetector for FileSystemDetector {
    fn name(&self) -> &'static str {
        "filesystem"
    }

    fn detect(&self, ctx: &TestContext<'_>) -> Result<Vec<DataDependency>> {
        let mut deps = Vec::new();
        for step in &ctx.method.body {
            let BodyStep::Invoke(inv) = step else { continue };
            let Receiver::Chain(chain) = &inv.receiver else {
                continue;
            };
            let receiver = chain.last().map(String::as_str).unwrap_or("");
            if !matches!(receiver, "File" | "Directory" | "Path") {
                continue;
            }
            // Only literal arguments name a concrete resource.
            for literal in &inv.str_args {
                deps.push(DataDependency {
                    test: ctx.test.clone(),
                    kind: DependencyKind::FileSystem,
                    resource: literal.clone(),
                    access: Self::access_for(&inv.name),
                    entities: BTreeSet::new(),
                });
            }
        }
        Ok(deps)
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct DependencyReport {
    pub dependencies: BTreeMap<MethodId, Vec<DataDependency>>,
    pub conflicts: Vec<Conflict>,
    /// Containing type per test, for fixture-sharing decisions.
    fixtures: BTreeMap<MethodId, String>,
}

impl DependencyReport {
    /// A report with known conflicts and no dependency detail; useful for
    /// embedders that computed conflicts elsewhere, and for tests.
    pub fn with_conflicts(conflicts: Vec<Conflict>) -> Self {
        Self {
            conflicts,
            ..Default::default()
        }
    }

    pub fn can_parallelize(&self, a: &MethodId, b: &MethodId) -> bool {
        !self.conflicts.iter().any(|c| {
            c.prevents_parallel
                && ((c.test_a == *a && c.test_b == *b) || (c.test_a == *b && c.test_b == *a))
        })
    }

    pub fn conflicts_between(&self, a: &MethodId, b: &MethodId) -> Vec<&Conflict> {
        self.conflicts
            .iter()
            .filter(|c| {
                (c.test_a == *a && c.test_b == *b) || (c.test_a == *b && c.test_b == *a)
            })
            .collect()
    }
}

pub struct DataDependencyAnalyzer {
    detectors: Vec<Box<dyn DependencyDetector>>,
}

impl Default for DataDependencyAnalyzer {
    fn default() -> Self {
        Self {
            detectors: vec![Box::new(DbContextDetector), Box::new(FileSystemDetector)],
        }
    }
}

impl DataDependencyAnalyzer {
    pub fn with_detectors(detectors: Vec<Box<dyn DependencyDetector>>) -> Self {
        Self { detectors }
    }

    pub fn analyze(
        &self,
        models: &[Arc<SourceModel>],
        index: &SymbolIndex,
        tests: &[TestEntry],
        cancel: &CancelToken,
    ) -> Result<DependencyReport> {
        let test_ids: BTreeSet<&MethodId> = tests.iter().map(|t| &t.id).collect();
        let mut report = DependencyReport::default();
        let mut degraded: BTreeSet<MethodId> = BTreeSet::new();

        for model in models {
            for ty in &model.types {
                let fq = ty.fq_name();
                for method in &ty.methods {
                    let id = canonical_method_id(&fq, method);
                    if !test_ids.contains(&id) {
                        continue;
                    }
                    cancel.checkpoint(Phase::DependencyAnalysis)?;
                    report.fixtures.insert(id.clone(), fq.clone());
                    let ctx = TestContext {
                        test: &id,
                        method,
                        ty,
                        model,
                        index,
                    };
                    let mut deps = Vec::new();
                    for detector in &self.detectors {
                        match detector.detect(&ctx) {
                            Ok(found) => deps.extend(found),
                            Err(e) => {
                                warn!(
                                    detector = detector.name(),
                                    test = %id,
                                    error = %e,
                                    "dependency detection failed, assuming parallel-safe"
                                );
                                degraded.insert(id.clone());
                            }
                        }
                    }
                    report.dependencies.insert(id, deps);
                }
            }
        }

        let ids: Vec<MethodId> = report.dependencies.keys().cloned().collect();
        for (i, a) in ids.iter().enumerate() {
            for b in ids.iter().skip(i + 1) {
                if let Some(conflict) = self.conflict_between(&report, index, &degraded, a, b) {
                    report.conflicts.push(conflict);
                }
            }
        }
        Ok(report)
    }

    fn conflict_between(
        &self,
        report: &DependencyReport,
        index: &SymbolIndex,
        degraded: &BTreeSet<MethodId>,
        a: &MethodId,
        b: &MethodId,
    ) -> Option<Conflict> {
        let fixture_shared = report.fixtures.get(a).is_some() && report.fixtures.get(a) == report.fixtures.get(b);

        // Degraded detection falls back to fixture sharing alone.
        if degraded.contains(a) || degraded.contains(b) {
            return fixture_shared.then(|| Conflict {
                test_a: a.clone(),
                test_b: b.clone(),
                kind: ConflictKind::SharedFixture,
                severity: Severity::Medium,
                prevents_parallel: true,
            });
        }

        let empty = Vec::new();
        let deps_a = report.dependencies.get(a).unwrap_or(&empty);
        let deps_b = report.dependencies.get(b).unwrap_or(&empty);

        let mut race = false;
        for da in deps_a {
            for db in deps_b {
                if da.resource == db.resource {
                    if da.access.writes() || db.access.writes() {
                        return Some(Conflict {
                            test_a: a.clone(),
                            test_b: b.clone(),
                            kind: ConflictKind::SharedData,
                            severity: Severity::High,
                            prevents_parallel: true,
                        });
                    }
                    race = true;
                }
                if da.access.writes()
                    && db.access.writes()
                    && da.entities.intersection(&db.entities).next().is_some()
                {
                    return Some(Conflict {
                        test_a: a.clone(),
                        test_b: b.clone(),
                        kind: ConflictKind::ResourceContention,
                        severity: Severity::Medium,
                        prevents_parallel: true,
                    });
                }
            }
        }

        if fixture_shared && !self.fixture_is_readonly(report, index, a) {
            return Some(Conflict {
                test_a: a.clone(),
                test_b: b.clone(),
                kind: ConflictKind::SharedFixture,
                severity: Severity::Medium,
                prevents_parallel: true,
            });
        }

        race.then(|| Conflict {
            test_a: a.clone(),
            test_b: b.clone(),
            kind: ConflictKind::RaceCondition,
            severity: Severity::Low,
            prevents_parallel: false,
        })
    }

    /// A fixture with no mutable instance state is safe to share.
    fn fixture_is_readonly(
        &self,
        report: &DependencyReport,
        index: &SymbolIndex,
        test: &MethodId,
    ) -> bool {
        let Some(fixture) = report.fixtures.get(test) else {
            return true;
        };
        match index.type_entry(fixture) {
            Some(entry) => entry.fields.iter().all(|(_, _, readonly)| *readonly),
            None => false,
        }
    }
}

fn generic_arg(ty: &str) -> Option<String> {
    let open = ty.find('<')?;
    let close = ty.rfind('>')?;
    let inner = ty[open + 1..close].trim();
    (!inner.is_empty()).then(|| inner.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::{TestCategory, TestFramework};
    use crate::syntax::parse_source;
    use std::path::PathBuf;

    fn analyze(sources: &[(&str, &str)], tests: &[&str]) -> DependencyReport {
        let models: Vec<Arc<SourceModel>> = sources
            .iter()
            .map(|(p, t)| Arc::new(parse_source(&PathBuf::from(p), t).unwrap()))
            .collect();
        let index = SymbolIndex::build(&models);
        let entries: Vec<TestEntry> = tests
            .iter()
            .map(|id| TestEntry {
                id: MethodId::from(*id),
                framework: TestFramework::NUnit,
                category: TestCategory::Database,
                confidence: 1.0,
            })
            .collect();
        DataDependencyAnalyzer::default()
            .analyze(&models, &index, &entries, &CancelToken::new())
            .unwrap()
    }

    const DB_TESTS: &str = r#"
        namespace S;
        public class ShopContext : DbContext
        {
            public DbSet<Customer> Customers { get; set; }
            public DbSet<Order> Orders { get; set; }
        }
        public class DbTestsA
        {
            public void WritesCustomers()
            {
                var ctx = new ShopContext();
                ctx.SaveChanges();
            }
        }
        public class DbTestsB
        {
            public void WritesOrders()
            {
                var ctx = new ShopContext();
                ctx.SaveChanges();
            }
        }
        "#;

    #[test]
    fn test_db_context_dependency() {
        let report = analyze(
            &[("tests/Db.cs", DB_TESTS)],
            &["S.DbTestsA.WritesCustomers()", "S.DbTestsB.WritesOrders()"],
        );
        let deps = &report.dependencies[&MethodId::from("S.DbTestsA.WritesCustomers()")];
        assert_eq!(deps.len(), 1);
        assert_eq!(deps[0].kind, DependencyKind::Database);
        assert_eq!(deps[0].resource, "ctx:ShopContext");
        assert_eq!(deps[0].access, AccessMode::ReadWrite);
        assert!(deps[0].entities.contains("Customer"));
        assert!(deps[0].entities.contains("Order"));
    }

    #[test]
    fn test_shared_context_prevents_parallel() {
        let report = analyze(
            &[("tests/Db.cs", DB_TESTS)],
            &["S.DbTestsA.WritesCustomers()", "S.DbTestsB.WritesOrders()"],
        );
        let a = MethodId::from("S.DbTestsA.WritesCustomers()");
        let b = MethodId::from("S.DbTestsB.WritesOrders()");
        assert!(!report.can_parallelize(&a, &b));
        let conflicts = report.conflicts_between(&a, &b);
        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].kind, ConflictKind::SharedData);
        assert_eq!(conflicts[0].severity, Severity::High);
    }

    #[test]
    fn test_filesystem_dependency_and_access() {
        let report = analyze(
            &[(
                "tests/Fs.cs",
                r#"
                namespace S;
                public class FsTests
                {
                    public void ReadsConfig()
                    {
                        File.ReadAllText("settings.json");
                    }
                    public void WritesConfig()
                    {
                        File.WriteAllText("settings.json", "{}");
                    }
                }
                "#,
            )],
            &["S.FsTests.ReadsConfig()", "S.FsTests.WritesConfig()"],
        );
        let reads = &report.dependencies[&MethodId::from("S.FsTests.ReadsConfig()")];
        assert_eq!(reads[0].access, AccessMode::Read);
        assert_eq!(reads[0].resource, "settings.json");
        let writes = &report.dependencies[&MethodId::from("S.FsTests.WritesConfig()")];
        assert_eq!(writes[0].access, AccessMode::Write);
        // Same resource, one writer: blocked.
        assert!(!report.can_parallelize(
            &MethodId::from("S.FsTests.ReadsConfig()"),
            &MethodId::from("S.FsTests.WritesConfig()")
        ));
    }

    #[test]
    fn test_both_readers_race_does_not_prevent_parallel() {
        let report = analyze(
            &[(
                "tests/Fs.cs",
                r#"
                namespace S;
                public class ReadersA
                {
                    public void ReadsOne()
                    {
                        File.ReadAllText("data.csv");
                    }
                }
                public class ReadersB
                {
                    public void ReadsTwo()
                    {
                        File.ReadAllText("data.csv");
                    }
                }
                "#,
            )],
            &["S.ReadersA.ReadsOne()", "S.ReadersB.ReadsTwo()"],
        );
        let a = MethodId::from("S.ReadersA.ReadsOne()");
        let b = MethodId::from("S.ReadersB.ReadsTwo()");
        assert!(report.can_parallelize(&a, &b));
        let conflicts = report.conflicts_between(&a, &b);
        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].kind, ConflictKind::RaceCondition);
        assert_eq!(conflicts[0].severity, Severity::Low);
    }

    #[test]
    fn test_shared_fixture_conflict() {
        let report = analyze(
            &[(
                "tests/Fix.cs",
                r#"
                namespace S;
                public class StatefulTests
                {
                    private int _counter;
                    public void First() { _counter = 1; }
                    public void Second() { _counter = 2; }
                }
                "#,
            )],
            &["S.StatefulTests.First()", "S.StatefulTests.Second()"],
        );
        let a = MethodId::from("S.StatefulTests.First()");
        let b = MethodId::from("S.StatefulTests.Second()");
        let conflicts = report.conflicts_between(&a, &b);
        assert_eq!(conflicts[0].kind, ConflictKind::SharedFixture);
        assert!(!report.can_parallelize(&a, &b));
    }

    #[test]
    fn test_readonly_fixture_is_parallel_safe() {
        let report = analyze(
            &[(
                "tests/Fix.cs",
                r#"
                namespace S;
                public class StatelessTests
                {
                    private readonly int _seed = 42;
                    public void First() { }
                    public void Second() { }
                }
                "#,
            )],
            &["S.StatelessTests.First()", "S.StatelessTests.Second()"],
        );
        let a = MethodId::from("S.StatelessTests.First()");
        let b = MethodId::from("S.StatelessTests.Second()");
        assert!(report.can_parallelize(&a, &b));
    }

    #[test]
    fn test_unrelated_tests_are_parallel_safe() {
        let report = analyze(
            &[(
                "tests/U.cs",
                r#"
                namespace S;
                public class UnitA
                {
                    public void Quick() { }
                }
                public class UnitB
                {
                    public void AlsoQuick() { }
                }
                "#,
            )],
            &["S.UnitA.Quick()", "S.UnitB.AlsoQuick()"],
        );
        assert!(report.can_parallelize(
            &MethodId::from("S.UnitA.Quick()"),
            &MethodId::from("S.UnitB.AlsoQuick()")
        ));
        assert!(report.conflicts.is_empty());
    }
}
