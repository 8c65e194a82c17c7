//! The test classifier.
//!
//! Primary rule: a method is a test iff it carries a recognized test
//! attribute (NUnit `Test`/`TestCase`/`TestFixtureSource`, xUnit
//! `Fact`/`Theory`, MSTest `TestMethod`/`DataTestMethod`), compared both
//! short and fully qualified, case-insensitively, with or without the
//! `Attribute` suffix.
//!
//! Secondary rule (toggleable, only inside test projects): a public method
//! whose name starts with a conventional test verb or ends in `Test(s)` /
//! `Spec(s)` is a test. Methods in production code without attributes are
//! never tests — that asymmetry is deliberate.
//!
//! Categories are decided by an ordered pattern list over the file path,
//! class name, and method name; first match wins. Identifiers are split
//! on camel humps and delimiters so `OrdersApiTests` yields an `api`
//! token without `BuildOrder` yielding a `ui` one.

use std::path::Path;
use std::sync::Arc;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::symbols::{canonical_method_id, MethodId};
use crate::syntax::{MethodKind, SourceModel};
use crate::workspace::project::path_is_testish;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum_macros::Display,
)]
pub enum TestFramework {
    NUnit,
    XUnit,
    MSTest,
    Unknown,
}

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    strum_macros::Display,
    strum_macros::EnumString,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case", ascii_case_insensitive)]
pub enum TestCategory {
    Unit,
    Integration,
    Database,
    Api,
    Ui,
    EndToEnd,
    Performance,
    Security,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestEntry {
    pub id: MethodId,
    pub framework: TestFramework,
    pub category: TestCategory,
    /// Classification confidence in `[0, 1]`.
    pub confidence: f64,
}

/// `(attribute short name, framework it implies)`.
const TEST_ATTRIBUTES: &[(&str, TestFramework)] = &[
    ("test", TestFramework::NUnit),
    ("testcase", TestFramework::NUnit),
    ("testfixturesource", TestFramework::NUnit),
    ("fact", TestFramework::XUnit),
    ("theory", TestFramework::XUnit),
    ("testmethod", TestFramework::MSTest),
    ("datatestmethod", TestFramework::MSTest),
];

static NAME_PREFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(Test|Should|When|Given|Scenario|Example|Verify|Check|Ensure|Benchmark|Calculate)",
    )
    .unwrap()
});

static NAME_SUFFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(Tests?|Specs?)$").unwrap());

/// Ordered category patterns; first hit wins. Multi-word patterns are
/// checked against the squashed text, single tokens against the token set.
const CATEGORY_RULES: &[(TestCategory, &[&str], &[&str])] = &[
    (TestCategory::EndToEnd, &["e2e", "journey", "scenario"], &["endtoend"]),
    (TestCategory::Integration, &["integration"], &[]),
    (TestCategory::Performance, &["performance", "benchmark"], &[]),
    (TestCategory::Security, &["security", "auth", "permission"], &[]),
    (TestCategory::Database, &["database", "ef", "sql"], &[]),
    (TestCategory::Api, &["controller", "api", "http"], &[]),
    (TestCategory::Ui, &["selenium", "ui"], &[]),
];

pub struct Classifier {
    pub name_heuristics: bool,
}

impl Classifier {
    pub fn new(name_heuristics: bool) -> Self {
        Self { name_heuristics }
    }

    /// Classify every method in the given models. `in_test_project` should
    /// answer from project metadata; testish path tokens are an additional
    /// signal either way.
    pub fn classify(
        &self,
        models: &[Arc<SourceModel>],
        in_test_project: impl Fn(&Path) -> bool,
    ) -> Vec<TestEntry> {
        let mut entries = Vec::new();
        for model in models {
            let path_str = model.path.to_string_lossy();
            let testish_path = path_is_testish(&path_str) || in_test_project(&model.path);
            let test_suffixed_file = file_stem_is_test_suffixed(&model.path);
            for ty in &model.types {
                let class_matches = NAME_PREFIX.is_match(&ty.name) || NAME_SUFFIX.is_match(&ty.name);
                for method in &ty.methods {
                    if method.kind != MethodKind::Ordinary {
                        continue;
                    }
                    let framework = attribute_framework(method);
                    let name_match = NAME_PREFIX.is_match(&method.name)
                        || NAME_SUFFIX.is_match(&method.name);
                    let is_test = framework.is_some()
                        || (self.name_heuristics
                            && testish_path
                            && method.modifiers.public
                            && name_match);
                    if !is_test {
                        continue;
                    }

                    let mut confidence: f64 = 0.0;
                    if framework.is_some() {
                        confidence += 0.8;
                    }
                    if name_match {
                        confidence += 0.4;
                    }
                    if testish_path {
                        confidence += 0.3;
                    }
                    if test_suffixed_file {
                        confidence += 0.2;
                    }
                    if class_matches {
                        confidence += 0.2;
                    }

                    let category = categorize(&path_str, &ty.name, &method.name);
                    entries.push(TestEntry {
                        id: canonical_method_id(&ty.fq_name(), method),
                        framework: framework.unwrap_or(TestFramework::Unknown),
                        category,
                        confidence: confidence.clamp(0.0, 1.0),
                    });
                }
            }
        }
        entries.sort_by(|a, b| a.id.cmp(&b.id));
        entries.dedup_by(|a, b| a.id == b.id);
        entries
    }
}

fn attribute_framework(method: &crate::syntax::MethodDecl) -> Option<TestFramework> {
    for attr in &method.attributes {
        let lower = attr.name.to_ascii_lowercase();
        let short = lower.rsplit('.').next().unwrap_or(&lower);
        let short = short.strip_suffix("attribute").unwrap_or(short);
        for (name, framework) in TEST_ATTRIBUTES {
            if short == *name {
                // Fully-qualified names pin the framework regardless of
                // which table row matched the short name.
                if lower.contains("nunit") {
                    return Some(TestFramework::NUnit);
                }
                if lower.contains("xunit") {
                    return Some(TestFramework::XUnit);
                }
                if lower.contains("microsoft.visualstudio") {
                    return Some(TestFramework::MSTest);
                }
                return Some(*framework);
            }
        }
    }
    None
}

fn file_stem_is_test_suffixed(path: &Path) -> bool {
    path.file_stem()
        .map(|s| s.to_string_lossy().to_ascii_lowercase())
        .is_some_and(|stem| {
            stem.ends_with("test") || stem.ends_with("tests") || stem.ends_with("spec") || stem.ends_with("specs")
        })
}

/// First matching category for the path/class/method triple.
pub fn categorize(path: &str, type_name: &str, method_name: &str) -> TestCategory {
    let combined = format!("{path} {type_name} {method_name}");
    let tokens = split_tokens(&combined);
    let squashed: String = combined
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect::<String>()
        .to_ascii_lowercase();
    for (category, token_patterns, squashed_patterns) in CATEGORY_RULES {
        let token_hit = token_patterns.iter().any(|p| {
            tokens
                .iter()
                .any(|t| t == p || (p.len() > 3 && t.starts_with(p)))
        });
        let squashed_hit = squashed_patterns.iter().any(|p| squashed.contains(p));
        if token_hit || squashed_hit {
            return *category;
        }
    }
    TestCategory::Unit
}

/// Split a path or identifier into lowercase tokens on delimiters and
/// camel humps: `tests/OrdersApiTests.cs` → `[tests, orders, api, tests, cs]`.
fn split_tokens(text: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut prev_lower = false;
    for c in text.chars() {
        if c.is_ascii_alphanumeric() {
            if c.is_ascii_uppercase() && prev_lower && !current.is_empty() {
                tokens.push(std::mem::take(&mut current));
            }
            current.push(c.to_ascii_lowercase());
            prev_lower = c.is_ascii_lowercase() || c.is_ascii_digit();
        } else {
            if !current.is_empty() {
                tokens.push(std::mem::take(&mut current));
            }
            prev_lower = false;
        }
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    tokens
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syntax::parse_source;
    use std::path::PathBuf;

    fn classify(path: &str, text: &str) -> Vec<TestEntry> {
        let model = Arc::new(parse_source(&PathBuf::from(path), text).unwrap());
        Classifier::new(true).classify(&[model], |_| false)
    }

    #[test]
    fn test_attribute_rule() {
        let entries = classify(
            "src/CalcTests.cs",
            r#"
            namespace T;
            public class CalcTests
            {
                [Fact]
                public void AddsTwo() { }

                [Test]
                public void Subtracts() { }

                [TestMethod]
                public void Divides() { }

                public void Helper() { }
            }
            "#,
        );
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].framework, TestFramework::XUnit);
        assert_eq!(entries[1].id.method_name(), "Divides");
        assert_eq!(entries[1].framework, TestFramework::MSTest);
        assert_eq!(entries[2].framework, TestFramework::NUnit);
    }

    #[test]
    fn test_qualified_attribute_pins_framework() {
        let entries = classify(
            "src/T.cs",
            r#"
            namespace T;
            public class Ts
            {
                [NUnit.Framework.TestCase(1)]
                public void Cases() { }
            }
            "#,
        );
        assert_eq!(entries[0].framework, TestFramework::NUnit);
    }

    #[test]
    fn test_name_rule_only_in_test_paths() {
        let source = r#"
            namespace T;
            public class OrderChecks
            {
                public void ShouldCreateOrder() { }
            }
            "#;
        let in_tests = classify("src/tests/OrderChecks.cs", source);
        assert_eq!(in_tests.len(), 1);
        assert_eq!(in_tests[0].framework, TestFramework::Unknown);

        // Same code in production is never a test.
        let in_prod = classify("src/core/OrderChecks.cs", source);
        assert!(in_prod.is_empty());
    }

    #[test]
    fn test_name_rule_requires_public() {
        let entries = classify(
            "tests/Checks.cs",
            r#"
            namespace T;
            public class Checks
            {
                private void ShouldNotCount() { }
            }
            "#,
        );
        assert!(entries.is_empty());
    }

    #[test]
    fn test_name_heuristics_can_be_disabled() {
        let model = Arc::new(
            parse_source(
                &PathBuf::from("tests/Checks.cs"),
                r#"
                namespace T;
                public class Checks
                {
                    public void ShouldWork() { }
                }
                "#,
            )
            .unwrap(),
        );
        let entries = Classifier::new(false).classify(&[model], |_| true);
        assert!(entries.is_empty());
    }

    #[test]
    fn test_confidence_components() {
        let entries = classify(
            "tests/CalcTests.cs",
            r#"
            namespace T;
            public class CalcTests
            {
                [Fact]
                public void ShouldAdd() { }
            }
            "#,
        );
        // attribute 0.8 + name 0.4 + path 0.3 + filename 0.2 + class 0.2,
        // clamped.
        assert!((entries[0].confidence - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_categories_first_match_wins() {
        assert_eq!(
            categorize("tests/e2e/CheckoutJourney.cs", "CheckoutJourney", "FullFlow"),
            TestCategory::EndToEnd
        );
        assert_eq!(
            categorize("tests/integration/DbTests.cs", "DbTests", "Connects"),
            TestCategory::Integration
        );
        assert_eq!(
            categorize("tests/OrdersApiTests.cs", "OrdersApiTests", "Gets"),
            TestCategory::Api
        );
        assert_eq!(
            categorize("tests/SqlRepositoryTests.cs", "SqlRepositoryTests", "Reads"),
            TestCategory::Database
        );
        assert_eq!(
            categorize("tests/AuthTests.cs", "AuthTests", "DeniesAnonymous"),
            TestCategory::Security
        );
        assert_eq!(
            categorize("tests/LoginUiTests.cs", "LoginUiTests", "Renders"),
            TestCategory::Ui
        );
        assert_eq!(
            categorize("tests/CalcTests.cs", "CalcTests", "Adds"),
            TestCategory::Unit
        );
        // Camel-hump splitting keeps `BuildOrder` out of the UI bucket.
        assert_eq!(
            categorize("tests/BuilderTests.cs", "BuilderTests", "BuildsOrder"),
            TestCategory::Unit
        );
    }

    #[test]
    fn test_performance_category() {
        assert_eq!(
            categorize("tests/perf/CalcBenchmarks.cs", "CalcBenchmarks", "Throughput"),
            TestCategory::Performance
        );
    }

    #[test]
    fn test_endtoend_squashed_pattern() {
        assert_eq!(
            categorize("tests/EndToEndTests.cs", "EndToEndTests", "Flows"),
            TestCategory::EndToEnd
        );
    }
}
