//! Builds the call graph from parsed sources.
//!
//! One pass registers every declared method as a node and collects
//! address-taken method groups; a second pass walks each method body in
//! source order, resolves every invocation, creation, and constructor
//! chain through the symbol index, and emits edges:
//!
//! - resolved instance/static calls → `Direct` (confidence 1.0)
//! - interface/virtual targets → one `VirtualOrInterface` edge per known
//!   workspace implementation, plus an anchor edge to the declaring
//!   member (confidence 0.6 with implementations, 0.3 without)
//! - extension methods → `Extension` (0.85)
//! - `new T(…)` and `: this(…)`/`: base(…)` chains → `Constructor` (1.0);
//!   a constructor without an explicit initializer still chains to its
//!   base class implicitly
//! - delegate invokes → `DelegateInvoke` edges to every address-taken
//!   method with a matching arity (0.6)
//! - anything unresolvable → a sentinel edge to `unknown://{file}:{line}`
//!   so fan-out counts stay honest; these never reach coverage results
//!
//! Receivers traced to a mocking-framework proxy (`Substitute.For<T>()`
//! and friends) mark their dispatch edges `via_mock`; the proxy-creation
//! call itself is materialized as an external node under the framework's
//! namespace so mock-aware filtering can see it on paths.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use tracing::debug;

use crate::cancel::CancelToken;
use crate::error::{Phase, Result};
use crate::graph::{CallGraph, CallKind, CallSite, EdgeData};
use crate::symbols::{
    canonical_method_id, strip_generics, MethodId, ResolveCtx, SymbolIndex,
};
use crate::syntax::{
    BodyStep, Creation, Invocation, LocalTy, MethodDecl, MethodKind, Receiver, SourceModel,
    TypeDecl, TypeKind,
};

/// Delegate-ish type texts: calls through these resolve to address-taken
/// methods rather than declared members.
fn is_delegate_ty(ty: &str) -> bool {
    let base = strip_generics(ty);
    matches!(base, "Func" | "Action" | "Predicate" | "Delegate")
        || base.ends_with("Handler")
        || base.ends_with("Callback")
}

/// Proxy-creation helpers of the mocking frameworks we recognize, mapped
/// to their namespace marker.
fn proxy_namespace(receiver: &str, name: &str) -> Option<&'static str> {
    match (receiver, name) {
        ("Substitute", "For") => Some("NSubstitute"),
        ("Mock", "Of") => Some("Moq"),
        ("A", "Fake") => Some("FakeItEasy"),
        ("MockRepository", "GenerateMock" | "GenerateStub") => Some("Rhino.Mocks"),
        _ => None,
    }
}

#[derive(Clone, Default)]
struct VarInfo {
    /// Raw type text, when known.
    ty: Option<String>,
    /// The proxied type, when the value came from a mock helper.
    mock_of: Option<String>,
}

/// What one call site resolved to.
enum Resolution {
    Edges(Vec<(MethodId, CallKind, bool, f64)>),
    Unknown,
}

pub struct GraphBuilder<'a> {
    index: &'a mut SymbolIndex,
    graph: CallGraph,
    /// Address-taken methods: id → parameter count.
    taken: BTreeMap<MethodId, usize>,
}

impl<'a> GraphBuilder<'a> {
    pub fn build(
        index: &'a mut SymbolIndex,
        models: &[Arc<SourceModel>],
        cancel: &CancelToken,
    ) -> Result<CallGraph> {
        let mut builder = GraphBuilder {
            index,
            graph: CallGraph::new(),
            taken: BTreeMap::new(),
        };
        builder.collect_taken(models);

        // Every declared method is a node even if it has no edges.
        let ids: Vec<MethodId> = builder.index.methods().map(|m| m.id.clone()).collect();
        for id in ids {
            builder.graph.add_node(id);
        }

        for model in models {
            for ty in &model.types {
                if ty.kind == TypeKind::Enum {
                    continue;
                }
                for method in &ty.methods {
                    cancel.checkpoint(Phase::CallGraph)?;
                    builder.process_method(model, ty, method);
                }
            }
        }
        Ok(builder.graph)
    }

    /// First pass: record every method group reference so delegate-invoke
    /// edges can find their candidates.
    fn collect_taken(&mut self, models: &[Arc<SourceModel>]) {
        for model in models {
            for ty in &model.types {
                let ty_fq = ty.fq_name();
                for method in &ty.methods {
                    for step in &method.body {
                        let BodyStep::MethodRef { name, .. } = step else {
                            continue;
                        };
                        let mut candidates = self.index.members_named(&ty_fq, name);
                        if candidates.is_empty() {
                            candidates = self.index.all_members_named(name);
                        }
                        for sig in candidates {
                            self.taken.insert(sig.id.clone(), sig.argc);
                        }
                    }
                }
            }
        }
    }

    fn process_method(&mut self, model: &SourceModel, ty: &TypeDecl, method: &MethodDecl) {
        let ty_fq = ty.fq_name();
        let caller = canonical_method_id(&ty_fq, method);

        let mut env: HashMap<String, VarInfo> = HashMap::new();
        // Fields of the type and its workspace bases are in scope…
        for base in self.index.base_closure(&ty_fq) {
            if let Some(entry) = self.index.type_entry(&base) {
                for (name, field_ty, _) in entry.fields.clone() {
                    env.insert(
                        name,
                        VarInfo {
                            ty: Some(field_ty),
                            mock_of: None,
                        },
                    );
                }
            }
        }
        for field in &ty.fields {
            env.insert(
                field.name.clone(),
                VarInfo {
                    ty: Some(field.ty.clone()),
                    mock_of: None,
                },
            );
        }
        // …then parameters shadow them.
        for param in &method.params {
            env.insert(
                param.name.clone(),
                VarInfo {
                    ty: Some(param.ty.clone()),
                    mock_of: None,
                },
            );
        }

        if method.kind == MethodKind::Constructor {
            self.emit_ctor_chain(model, ty, method, &caller);
        }

        for step in &method.body {
            match step {
                BodyStep::Local { name, ty: local_ty, .. } => {
                    let info = self.classify_local(model, ty, local_ty);
                    env.insert(name.clone(), info);
                }
                BodyStep::New(creation) => {
                    self.emit_creation(model, ty, &caller, creation);
                }
                BodyStep::Invoke(inv) => {
                    self.emit_invocation(model, ty, &caller, &env, inv);
                }
                BodyStep::MethodRef { .. } => {}
            }
        }
    }

    fn classify_local(&self, model: &SourceModel, ty: &TypeDecl, local: &LocalTy) -> VarInfo {
        match local {
            LocalTy::Explicit(t) => VarInfo {
                ty: Some(t.clone()),
                mock_of: None,
            },
            LocalTy::FromNew(t) => {
                // `new Mock<IFoo>()` wraps a proxy of IFoo.
                let mock_of = (strip_generics(t) == "Mock")
                    .then(|| generic_args(t))
                    .and_then(|args| args.into_iter().next());
                VarInfo {
                    ty: Some(t.clone()),
                    mock_of,
                }
            }
            LocalTy::FromCall {
                chain,
                name,
                type_args,
            } => {
                let receiver = chain.last().map(String::as_str).unwrap_or("");
                if proxy_namespace(receiver, name).is_some() {
                    let proxied = type_args.first().cloned();
                    return VarInfo {
                        ty: proxied.clone(),
                        mock_of: proxied,
                    };
                }
                // Recover the static type from the callee's return type.
                let ctx = ResolveCtx {
                    namespace: &ty.namespace,
                    usings: &model.usings,
                };
                let ret = if chain.is_empty() {
                    self.index
                        .find_member(&ty.fq_name(), name, usize::MAX)
                        .map(|m| m.return_type.clone())
                } else if chain.len() == 1 {
                    self.index
                        .resolve_type(&chain[0], &ctx)
                        .map(|t| t.fq.clone())
                        .and_then(|fq| {
                            self.index
                                .find_member(&fq, name, usize::MAX)
                                .map(|m| m.return_type.clone())
                        })
                } else {
                    None
                };
                VarInfo {
                    ty: ret.filter(|r| !r.is_empty() && r != "void"),
                    mock_of: None,
                }
            }
            LocalTy::Unknown => VarInfo::default(),
        }
    }

    fn emit_ctor_chain(
        &mut self,
        model: &SourceModel,
        ty: &TypeDecl,
        method: &MethodDecl,
        caller: &MethodId,
    ) {
        let ty_fq = ty.fq_name();
        let (target_ty, argc, site) = match &method.initializer {
            Some(chain) if !chain.to_base => (
                Some(ty_fq.clone()),
                chain.argc,
                CallSite {
                    file: model.path.clone(),
                    line: chain.line,
                    col: chain.col,
                },
            ),
            Some(chain) => (
                self.first_base_class(&ty_fq),
                chain.argc,
                CallSite {
                    file: model.path.clone(),
                    line: chain.line,
                    col: chain.col,
                },
            ),
            None => (
                // Implicit `: base()`.
                self.first_base_class(&ty_fq),
                0,
                CallSite {
                    file: model.path.clone(),
                    line: method.line,
                    col: 0,
                },
            ),
        };
        let Some(target_ty) = target_ty else { return };
        let target = match self.index.find_constructor(&target_ty, argc) {
            Some(sig) => Some(sig.id.clone()),
            None => self.index.ensure_default_ctor(&target_ty),
        };
        match target {
            Some(target) if target != *caller => {
                self.graph.add_edge(
                    caller.clone(),
                    target,
                    EdgeData {
                        site,
                        kind: CallKind::Constructor,
                        resolved_concrete: true,
                        via_mock: false,
                        confidence: 1.0,
                    },
                );
            }
            _ => {}
        }
    }

    fn first_base_class(&self, ty_fq: &str) -> Option<String> {
        let entry = self.index.type_entry(ty_fq)?;
        entry
            .bases
            .iter()
            .find(|b| {
                self.index
                    .type_entry(b)
                    .is_some_and(|t| t.kind != TypeKind::Interface)
            })
            .cloned()
    }

    fn emit_creation(
        &mut self,
        model: &SourceModel,
        ty: &TypeDecl,
        caller: &MethodId,
        creation: &Creation,
    ) {
        let site = CallSite {
            file: model.path.clone(),
            line: creation.line,
            col: creation.col,
        };
        if strip_generics(&creation.ty) == "Mock" {
            // `new Mock<IFoo>()`: materialize the framework entry point.
            let external = MethodId::new(format!("Moq.{}.Mock()", creation.ty));
            self.index
                .add_external_method(external.clone(), &model.path, creation.line);
            self.graph.add_node(external.clone());
            self.graph.add_edge(
                caller.clone(),
                external,
                EdgeData {
                    site,
                    kind: CallKind::Constructor,
                    resolved_concrete: true,
                    via_mock: true,
                    confidence: 1.0,
                },
            );
            return;
        }
        let ctx = ResolveCtx {
            namespace: &ty.namespace,
            usings: &model.usings,
        };
        let resolved = self
            .index
            .resolve_type(&creation.ty, &ctx)
            .filter(|t| t.kind != TypeKind::Interface && t.kind != TypeKind::Enum)
            .map(|t| t.fq.clone());
        match resolved {
            Some(fq) => {
                let target = match self.index.find_constructor(&fq, creation.argc) {
                    Some(sig) => Some(sig.id.clone()),
                    None => self.index.ensure_default_ctor(&fq),
                };
                if let Some(target) = target {
                    self.graph.add_edge(
                        caller.clone(),
                        target,
                        EdgeData {
                            site,
                            kind: CallKind::Constructor,
                            resolved_concrete: true,
                            via_mock: false,
                            confidence: 1.0,
                        },
                    );
                }
            }
            None => self.emit_unknown(model, caller, site, CallKind::Constructor),
        }
    }

    fn emit_invocation(
        &mut self,
        model: &SourceModel,
        ty: &TypeDecl,
        caller: &MethodId,
        env: &HashMap<String, VarInfo>,
        inv: &Invocation,
    ) {
        let site = CallSite {
            file: model.path.clone(),
            line: inv.line,
            col: inv.col,
        };

        // Proxy-creation helpers first: `Substitute.For<IFoo>()`.
        if let Receiver::Chain(chain) = &inv.receiver {
            let receiver_last = chain.last().map(String::as_str).unwrap_or("");
            if let Some(ns) = proxy_namespace(receiver_last, &inv.name) {
                let targs = if inv.type_args.is_empty() {
                    String::new()
                } else {
                    format!("<{}>", inv.type_args.join(","))
                };
                let external =
                    MethodId::new(format!("{ns}.{}.{}{targs}()", chain.join("."), inv.name));
                self.index
                    .add_external_method(external.clone(), &model.path, inv.line);
                self.graph.add_node(external.clone());
                self.graph.add_edge(
                    caller.clone(),
                    external,
                    EdgeData {
                        site,
                        kind: CallKind::Direct,
                        resolved_concrete: true,
                        via_mock: true,
                        confidence: 1.0,
                    },
                );
                return;
            }
        }

        let (resolution, via_mock) = self.resolve_invocation(model, ty, env, inv);
        match resolution {
            Resolution::Edges(edges) => {
                for (target, kind, resolved_concrete, confidence) in edges {
                    self.graph.add_edge(
                        caller.clone(),
                        target,
                        EdgeData {
                            site: site.clone(),
                            kind,
                            resolved_concrete,
                            via_mock,
                            confidence,
                        },
                    );
                }
            }
            Resolution::Unknown => self.emit_unknown(model, caller, site, CallKind::DynamicDispatch),
        }
    }

    fn resolve_invocation(
        &self,
        model: &SourceModel,
        ty: &TypeDecl,
        env: &HashMap<String, VarInfo>,
        inv: &Invocation,
    ) -> (Resolution, bool) {
        let ty_fq = ty.fq_name();
        let ctx = ResolveCtx {
            namespace: &ty.namespace,
            usings: &model.usings,
        };

        match &inv.receiver {
            Receiver::None => (self.resolve_unqualified(model, &ty_fq, inv), false),
            Receiver::CallResult => (Resolution::Unknown, false),
            Receiver::Chain(chain) if chain.len() == 1 && chain[0] == "this" => {
                (self.resolve_unqualified(model, &ty_fq, inv), false)
            }
            Receiver::Chain(chain) if chain.len() == 1 && chain[0] == "base" => {
                let resolution = match self.first_base_class(&ty_fq) {
                    Some(base) => self.resolve_member_direct(&base, inv),
                    None => Resolution::Unknown,
                };
                (resolution, false)
            }
            Receiver::Chain(chain) if chain.len() == 1 => {
                if let Some(var) = env.get(&chain[0]) {
                    if let Some(proxied) = &var.mock_of {
                        let resolution = match self.index.resolve_type(proxied, &ctx) {
                            Some(entry) => {
                                let fq = entry.fq.clone();
                                self.resolve_member_dispatch(&fq, inv)
                            }
                            None => Resolution::Unknown,
                        };
                        return (resolution, true);
                    }
                    if let Some(raw) = &var.ty {
                        if is_delegate_ty(raw) {
                            return (self.resolve_delegate(inv.argc), false);
                        }
                        let resolution = match self.index.resolve_type(raw, &ctx) {
                            Some(entry) => {
                                let fq = entry.fq.clone();
                                match self.resolve_member_dispatch(&fq, inv) {
                                    Resolution::Unknown => self.resolve_extension(raw, inv),
                                    hit => hit,
                                }
                            }
                            None => self.resolve_extension(raw, inv),
                        };
                        return (resolution, false);
                    }
                    // Untyped local: only an explicit `Invoke` reads as a
                    // delegate call.
                    if inv.name == "Invoke" {
                        return (self.resolve_delegate(inv.argc), false);
                    }
                    return (Resolution::Unknown, false);
                }
                // Not a variable: a type's static member.
                match self.index.resolve_type(&chain[0], &ctx) {
                    Some(entry) => {
                        let fq = entry.fq.clone();
                        (self.resolve_member_dispatch(&fq, inv), false)
                    }
                    None => (Resolution::Unknown, false),
                }
            }
            Receiver::Chain(chain) => {
                // Qualified static call: `Shop.Util.Clock.Now()`.
                let joined = chain.join(".");
                match self.index.resolve_type(&joined, &ctx) {
                    Some(entry) => {
                        let fq = entry.fq.clone();
                        (self.resolve_member_dispatch(&fq, inv), false)
                    }
                    None => (Resolution::Unknown, false),
                }
            }
        }
    }

    fn resolve_unqualified(
        &self,
        model: &SourceModel,
        ty_fq: &str,
        inv: &Invocation,
    ) -> Resolution {
        match self.resolve_member_dispatch(ty_fq, inv) {
            Resolution::Unknown => {}
            hit => return hit,
        }
        // Static usings bring members into scope unqualified.
        for using in model.usings.iter().filter(|u| u.is_static) {
            if self.index.type_entry(&using.namespace).is_some() {
                match self.resolve_member_dispatch(&using.namespace, inv) {
                    Resolution::Unknown => continue,
                    hit => return hit,
                }
            }
        }
        Resolution::Unknown
    }

    /// Member lookup with virtual/interface expansion.
    fn resolve_member_dispatch(&self, ty_fq: &str, inv: &Invocation) -> Resolution {
        let Some(member) = self.index.find_member(ty_fq, &inv.name, inv.argc) else {
            return Resolution::Unknown;
        };
        if !member.is_dispatchable {
            return Resolution::Edges(vec![(member.id.clone(), CallKind::Direct, true, 1.0)]);
        }
        let member_id = member.id.clone();
        let impls: BTreeSet<MethodId> = self.index.implementations(&member_id).cloned().collect();
        let anchor_confidence = if impls.is_empty() { 0.3 } else { 0.6 };
        let mut edges: Vec<(MethodId, CallKind, bool, f64)> = impls
            .into_iter()
            .map(|id| (id, CallKind::VirtualOrInterface, true, 0.6))
            .collect();
        edges.push((
            member_id,
            CallKind::VirtualOrInterface,
            false,
            anchor_confidence,
        ));
        Resolution::Edges(edges)
    }

    /// Member lookup without dispatch expansion (`base.…` calls).
    fn resolve_member_direct(&self, ty_fq: &str, inv: &Invocation) -> Resolution {
        match self.index.find_member(ty_fq, &inv.name, inv.argc) {
            Some(member) => {
                Resolution::Edges(vec![(member.id.clone(), CallKind::Direct, true, 1.0)])
            }
            None => Resolution::Unknown,
        }
    }

    fn resolve_extension(&self, receiver_ty: &str, inv: &Invocation) -> Resolution {
        match self.index.find_extension(&inv.name, receiver_ty, inv.argc) {
            Some(ext) => Resolution::Edges(vec![(ext.id.clone(), CallKind::Extension, true, 0.85)]),
            None => Resolution::Unknown,
        }
    }

    fn resolve_delegate(&self, argc: usize) -> Resolution {
        let edges: Vec<(MethodId, CallKind, bool, f64)> = self
            .taken
            .iter()
            .filter(|(_, taken_argc)| **taken_argc == argc)
            .map(|(id, _)| (id.clone(), CallKind::DelegateInvoke, false, 0.6))
            .collect();
        if edges.is_empty() {
            Resolution::Unknown
        } else {
            Resolution::Edges(edges)
        }
    }

    fn emit_unknown(
        &mut self,
        model: &SourceModel,
        caller: &MethodId,
        site: CallSite,
        kind: CallKind,
    ) {
        let target = MethodId::synthetic(&model.path, site.line);
        debug!(caller = %caller, target = %target, "unresolved call site");
        self.graph.add_edge(
            caller.clone(),
            target,
            EdgeData {
                site,
                kind,
                resolved_concrete: false,
                via_mock: false,
                confidence: 0.3,
            },
        );
    }
}

/// `Mock<IFoo>` → `["IFoo"]`; naive split is fine for the single-level
/// generics mock helpers use.
fn generic_args(ty: &str) -> Vec<String> {
    let Some(open) = ty.find('<') else {
        return Vec::new();
    };
    let Some(close) = ty.rfind('>') else {
        return Vec::new();
    };
    ty[open + 1..close]
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syntax::parse_source;
    use std::path::PathBuf;

    fn graph_of(sources: &[(&str, &str)]) -> (SymbolIndex, CallGraph) {
        let models: Vec<Arc<SourceModel>> = sources
            .iter()
            .map(|(path, text)| Arc::new(parse_source(&PathBuf::from(path), text).unwrap()))
            .collect();
        let mut index = SymbolIndex::build(&models);
        let graph = GraphBuilder::build(&mut index, &models, &CancelToken::new()).unwrap();
        (index, graph)
    }

    fn id(s: &str) -> MethodId {
        MethodId::from(s)
    }

    fn edge_to<'g>(
        graph: &'g CallGraph,
        from: &MethodId,
        to: &str,
    ) -> Option<&'g EdgeData> {
        graph
            .successors(from)
            .into_iter()
            .find(|(m, _)| m.as_str() == to)
            .map(|(_, e)| e)
    }

    #[test]
    fn test_direct_call_edge() {
        let (_, graph) = graph_of(&[(
            "a.cs",
            r#"
            namespace P
            {
                public class P
                {
                    public int Add(int a, int b) => a + b;
                }
            }
            namespace T
            {
                public class T
                {
                    public void AddsTwo()
                    {
                        var p = new P.P();
                        p.Add(1, 1);
                    }
                }
            }
            "#,
        )]);
        let caller = id("T.T.AddsTwo()");
        let edge = edge_to(&graph, &caller, "P.P.Add(int,int)").unwrap();
        assert_eq!(edge.kind, CallKind::Direct);
        assert!((edge.confidence - 1.0).abs() < 1e-9);
        // The synthesized default constructor also gets an edge.
        assert!(edge_to(&graph, &caller, "P.P.P()").is_some());
    }

    #[test]
    fn test_interface_dispatch_expansion() {
        let (_, graph) = graph_of(&[(
            "a.cs",
            r#"
            namespace S;
            public interface IFoo
            {
                void Do();
            }
            public class FooImpl : IFoo
            {
                public void Do() { }
            }
            public class User
            {
                public void Use(IFoo foo)
                {
                    foo.Do();
                }
            }
            "#,
        )]);
        let caller = id("S.User.Use(IFoo)");
        let concrete = edge_to(&graph, &caller, "S.FooImpl.Do()").unwrap();
        assert_eq!(concrete.kind, CallKind::VirtualOrInterface);
        assert!(concrete.resolved_concrete);
        assert!((concrete.confidence - 0.6).abs() < 1e-9);
        let anchor = edge_to(&graph, &caller, "S.IFoo.Do()").unwrap();
        assert!(!anchor.resolved_concrete);
        assert!((anchor.confidence - 0.6).abs() < 1e-9);
    }

    #[test]
    fn test_interface_without_impl_derates_anchor() {
        let (_, graph) = graph_of(&[(
            "a.cs",
            r#"
            namespace S;
            public interface IExternal
            {
                void Go();
            }
            public class User
            {
                public void Use(IExternal thing)
                {
                    thing.Go();
                }
            }
            "#,
        )]);
        let anchor = edge_to(&graph, &id("S.User.Use(IExternal)"), "S.IExternal.Go()").unwrap();
        assert!(!anchor.resolved_concrete);
        assert!((anchor.confidence - 0.3).abs() < 1e-9);
    }

    #[test]
    fn test_mocked_receiver_marks_edges() {
        let (index, graph) = graph_of(&[(
            "a.cs",
            r#"
            using NSubstitute;
            namespace S;
            public interface IFoo
            {
                void Do();
            }
            public class FooImpl : IFoo
            {
                public void Do() { }
            }
            public class MockTest
            {
                public void UsesMock()
                {
                    var sub = Substitute.For<IFoo>();
                    sub.Do();
                }
            }
            "#,
        )]);
        let caller = id("S.MockTest.UsesMock()");
        let to_impl = edge_to(&graph, &caller, "S.FooImpl.Do()").unwrap();
        assert!(to_impl.via_mock);
        // The proxy-creation call is an external node under the marker
        // namespace, present in the index.
        let external = id("NSubstitute.Substitute.For<IFoo>()");
        assert!(graph.contains_method(&external));
        assert!(index.method(&external).unwrap().external);
    }

    #[test]
    fn test_extension_edge() {
        let (_, graph) = graph_of(&[(
            "a.cs",
            r#"
            namespace S;
            public class Order { }
            public static class OrderExtensions
            {
                public static bool IsRush(this Order order) => false;
            }
            public class User
            {
                public void Use(Order order)
                {
                    order.IsRush();
                }
            }
            "#,
        )]);
        let edge = edge_to(
            &graph,
            &id("S.User.Use(Order)"),
            "S.OrderExtensions.IsRush(Order)",
        )
        .unwrap();
        assert_eq!(edge.kind, CallKind::Extension);
        assert!((edge.confidence - 0.85).abs() < 1e-9);
    }

    #[test]
    fn test_ctor_chaining_edges() {
        let (_, graph) = graph_of(&[(
            "a.cs",
            r#"
            namespace S;
            public class Base
            {
                public Base() { }
            }
            public class Derived : Base
            {
                public Derived() : this(1) { }
                public Derived(int x) { }
            }
            "#,
        )]);
        // Explicit `: this(1)`.
        assert!(edge_to(&graph, &id("S.Derived.Derived()"), "S.Derived.Derived(int)").is_some());
        // Implicit `: base()` from Derived(int).
        let implicit = edge_to(&graph, &id("S.Derived.Derived(int)"), "S.Base.Base()").unwrap();
        assert_eq!(implicit.kind, CallKind::Constructor);
    }

    #[test]
    fn test_delegate_invoke_edges() {
        let (_, graph) = graph_of(&[(
            "a.cs",
            r#"
            namespace S;
            public class Worker
            {
                public void Register(List<Action<int>> handlers)
                {
                    handlers.ForEach(Print);
                }
                public void Fire(Action<int> callback)
                {
                    callback.Invoke(1);
                }
                public void Print(int x) { }
            }
            "#,
        )]);
        let edge = edge_to(&graph, &id("S.Worker.Fire(Action<int>)"), "S.Worker.Print(int)").unwrap();
        assert_eq!(edge.kind, CallKind::DelegateInvoke);
        assert!(!edge.resolved_concrete);
    }

    #[test]
    fn test_unresolved_goes_to_sentinel() {
        let (_, graph) = graph_of(&[(
            "a.cs",
            r#"
            namespace S;
            public class User
            {
                public void Use()
                {
                    Console.WriteLine("hi");
                }
            }
            "#,
        )]);
        let successors = graph.successors(&id("S.User.Use()"));
        assert_eq!(successors.len(), 1);
        assert!(successors[0].0.is_synthetic());
        assert!(!successors[0].1.resolved_concrete);
    }

    #[test]
    fn test_property_accessor_calls_emit_edges() {
        let (_, graph) = graph_of(&[(
            "a.cs",
            r#"
            namespace S;
            public class Holder
            {
                public int Total
                {
                    get { return Compute(); }
                }
                private int Compute() => 41;
            }
            "#,
        )]);
        assert!(edge_to(&graph, &id("S.Holder.get_Total()"), "S.Holder.Compute()").is_some());
    }

    #[test]
    fn test_recursion_is_preserved() {
        let (_, graph) = graph_of(&[(
            "a.cs",
            r#"
            namespace S;
            public class R
            {
                public int Fact(int n) => n <= 1 ? 1 : n * Fact(n - 1);
            }
            "#,
        )]);
        let edge = edge_to(&graph, &id("S.R.Fact(int)"), "S.R.Fact(int)");
        assert!(edge.is_some());
    }

    #[test]
    fn test_virtual_call_expands_overrides() {
        let (_, graph) = graph_of(&[(
            "a.cs",
            r#"
            namespace S;
            public class Base
            {
                public virtual void Work() { }
            }
            public class Derived : Base
            {
                public override void Work() { }
            }
            public class User
            {
                public void Use(Base thing)
                {
                    thing.Work();
                }
            }
            "#,
        )]);
        let caller = id("S.User.Use(Base)");
        assert!(edge_to(&graph, &caller, "S.Derived.Work()").is_some());
        let anchor = edge_to(&graph, &caller, "S.Base.Work()").unwrap();
        assert!(!anchor.resolved_concrete);
    }
}
