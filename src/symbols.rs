//! The symbol index.
//!
//! Canonicalizes every method declaration into a [`MethodId`], the primary
//! key shared by the call graph, the coverage index, and the scorer, and
//! answers the resolution questions the graph builder asks: what type does
//! this name mean here, which member does this call hit, which workspace
//! types implement this interface member, which extension method matches
//! this receiver.
//!
//! The canonical identifier is
//! `{FullyQualifiedContainingType}.{Name}({paramType1,…})`, with generic
//! methods appending `<T1,…>` before the parameter list. Two requests for
//! the same declaration always produce the same string, byte for byte.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::syntax::{MethodDecl, MethodKind, Modifiers, SourceModel, TypeKind, Using};

pub type TypeId = String;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MethodId(String);

impl MethodId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Synthetic nodes stand in for unresolvable call targets; they carry
    /// fan-out counts but never appear in coverage results.
    pub fn is_synthetic(&self) -> bool {
        self.0.starts_with("unknown://")
    }

    pub fn synthetic(file: &Path, line: u32) -> Self {
        Self(format!("unknown://{}:{line}", file.display()))
    }

    /// The fully-qualified containing type, i.e. everything before the
    /// method name. Empty for synthetic nodes.
    pub fn containing_type(&self) -> &str {
        if self.is_synthetic() {
            return "";
        }
        let head = self.0.split('(').next().unwrap_or("");
        match head.rsplit_once('.') {
            Some((ty, _)) => ty,
            None => "",
        }
    }

    /// The bare method name without type or parameter list.
    pub fn method_name(&self) -> &str {
        let head = self.0.split(['(', '<']).next().unwrap_or("");
        head.rsplit('.').next().unwrap_or(head)
    }
}

impl fmt::Display for MethodId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for MethodId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl std::borrow::Borrow<str> for MethodId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Access {
    Public,
    Protected,
    Internal,
    Private,
}

impl Access {
    fn from_modifiers(mods: &Modifiers) -> Self {
        if mods.public {
            Access::Public
        } else if mods.protected {
            Access::Protected
        } else if mods.internal {
            Access::Internal
        } else {
            Access::Private
        }
    }
}

/// One method declaration, immutable once the workspace is built (the test
/// flag is stamped by the classifier during initialization, before any
/// query runs).
#[derive(Debug, Clone)]
pub struct MethodNode {
    pub id: MethodId,
    pub defined_in: PathBuf,
    pub line: u32,
    pub is_test: bool,
    pub access: Access,
    pub is_abstract: bool,
    pub is_virtual: bool,
    pub is_override: bool,
    pub is_extension: bool,
    pub is_constructor: bool,
    /// Interfaces (in-workspace) declaring a member this method implements.
    pub declaring_interfaces: BTreeSet<TypeId>,
    /// True for out-of-workspace helpers we materialize (e.g. mocking
    /// framework entry points); they have a sighting location, not a
    /// definition.
    pub external: bool,
}

/// Member signature used during call resolution.
#[derive(Debug, Clone)]
pub struct MemberSig {
    pub id: MethodId,
    pub name: String,
    pub argc: usize,
    pub is_static: bool,
    pub is_dispatchable: bool,
    pub return_type: String,
}

#[derive(Debug, Clone)]
pub struct ExtensionSig {
    pub id: MethodId,
    pub receiver_ty: String,
    /// Argument count excluding the receiver parameter.
    pub argc: usize,
    pub return_type: String,
}

#[derive(Debug, Clone)]
pub struct TypeEntry {
    pub fq: TypeId,
    pub kind: TypeKind,
    pub file: PathBuf,
    pub line: u32,
    pub is_static: bool,
    pub bases_raw: Vec<String>,
    /// Workspace types from the base list; external bases are absent by
    /// design, not an error.
    pub bases: Vec<TypeId>,
    pub methods: Vec<MethodId>,
    pub fields: Vec<(String, String, bool)>,
    pub attributes: Vec<String>,
}

#[derive(Default)]
pub struct SymbolIndex {
    types: BTreeMap<TypeId, TypeEntry>,
    by_simple: BTreeMap<String, Vec<TypeId>>,
    methods: BTreeMap<MethodId, MethodNode>,
    members: BTreeMap<TypeId, Vec<MemberSig>>,
    impls: BTreeMap<MethodId, BTreeSet<MethodId>>,
    extensions: BTreeMap<String, Vec<ExtensionSig>>,
}

/// Name-resolution context: the file's usings plus the caller's location.
pub struct ResolveCtx<'a> {
    pub namespace: &'a str,
    pub usings: &'a [Using],
}

/// Build the canonical MethodId for a declaration in `type_fq`.
pub fn canonical_method_id(type_fq: &str, method: &MethodDecl) -> MethodId {
    let mut id = String::with_capacity(type_fq.len() + method.name.len() + 16);
    id.push_str(type_fq);
    id.push('.');
    id.push_str(&method.name);
    if !method.type_params.is_empty() {
        id.push('<');
        id.push_str(&method.type_params.join(","));
        id.push('>');
    }
    id.push('(');
    for (i, p) in method.params.iter().enumerate() {
        if i > 0 {
            id.push(',');
        }
        id.push_str(&p.ty);
    }
    id.push(')');
    MethodId(id)
}

impl SymbolIndex {
    /// Index every model. Models must be passed in sorted path order; the
    /// resulting index is deterministic.
    pub fn build(models: &[Arc<SourceModel>]) -> Self {
        let mut index = Self::default();
        for model in models {
            for ty in &model.types {
                index.register_type(model, ty);
            }
        }
        index.resolve_bases(models);
        index.link_dispatch();
        index
    }

    fn register_type(&mut self, model: &SourceModel, ty: &crate::syntax::TypeDecl) {
        let fq = ty.fq_name();
        let mut entry = TypeEntry {
            fq: fq.clone(),
            kind: ty.kind,
            file: model.path.clone(),
            line: ty.line,
            is_static: ty.modifiers.is_static,
            bases_raw: ty.bases.clone(),
            bases: Vec::new(),
            methods: Vec::new(),
            fields: ty
                .fields
                .iter()
                .map(|f| (f.name.clone(), f.ty.clone(), f.is_readonly))
                .collect(),
            attributes: ty.attributes.iter().map(|a| a.name.clone()).collect(),
        };
        let mut members = Vec::new();
        for method in &ty.methods {
            let id = canonical_method_id(&fq, method);
            let dispatchable = ty.kind == TypeKind::Interface
                || method.modifiers.is_abstract
                || method.modifiers.is_virtual;
            let node = MethodNode {
                id: id.clone(),
                defined_in: model.path.clone(),
                line: method.line,
                is_test: false,
                access: Access::from_modifiers(&method.modifiers),
                is_abstract: method.modifiers.is_abstract || ty.kind == TypeKind::Interface,
                is_virtual: method.modifiers.is_virtual,
                is_override: method.modifiers.is_override,
                is_extension: method.is_extension(),
                is_constructor: method.kind == MethodKind::Constructor,
                declaring_interfaces: BTreeSet::new(),
                external: false,
            };
            // First declaration wins for duplicate ids (partial classes
            // re-listing a signature, or overload blind spots).
            if !self.methods.contains_key(&id) {
                self.methods.insert(id.clone(), node);
            }
            members.push(MemberSig {
                id: id.clone(),
                name: method.name.clone(),
                argc: method.params.len(),
                is_static: method.modifiers.is_static,
                is_dispatchable: dispatchable,
                return_type: method.return_type.clone(),
            });
            entry.methods.push(id.clone());
            if method.is_extension() {
                let receiver = method.params[0].ty.clone();
                self.extensions
                    .entry(method.name.clone())
                    .or_default()
                    .push(ExtensionSig {
                        id,
                        receiver_ty: receiver,
                        argc: method.params.len() - 1,
                        return_type: method.return_type.clone(),
                    });
            }
        }
        members.sort_by(|a, b| a.id.cmp(&b.id));
        self.members.insert(fq.clone(), members);

        let simple = ty.name.rsplit('.').next().unwrap_or(&ty.name).to_string();
        self.by_simple.entry(simple).or_default().push(fq.clone());
        if ty.name.contains('.') {
            self.by_simple
                .entry(ty.name.clone())
                .or_default()
                .push(fq.clone());
        }
        self.types.insert(fq, entry);
    }

    fn resolve_bases(&mut self, models: &[Arc<SourceModel>]) {
        // Usings are per file; rebuild the mapping from file to usings.
        let mut usings_by_file: BTreeMap<&Path, &[Using]> = BTreeMap::new();
        for model in models {
            usings_by_file.insert(&model.path, &model.usings);
        }
        let mut resolved: BTreeMap<TypeId, Vec<TypeId>> = BTreeMap::new();
        for (fq, entry) in &self.types {
            let namespace = namespace_of(fq);
            let usings = usings_by_file
                .get(entry.file.as_path())
                .copied()
                .unwrap_or(&[]);
            let ctx = ResolveCtx { namespace, usings };
            let bases = entry
                .bases_raw
                .iter()
                .filter_map(|raw| self.resolve_type(raw, &ctx).map(|t| t.fq.clone()))
                .collect();
            resolved.insert(fq.clone(), bases);
        }
        for (fq, bases) in resolved {
            if let Some(entry) = self.types.get_mut(&fq) {
                entry.bases = bases;
            }
        }
    }

    /// Connect interface members and virtual methods to their workspace
    /// implementations and overrides.
    fn link_dispatch(&mut self) {
        let mut additions: Vec<(MethodId, MethodId, Option<TypeId>)> = Vec::new();
        for entry in self.types.values() {
            if entry.kind == TypeKind::Interface {
                continue;
            }
            for base_fq in self.base_closure(&entry.fq) {
                let Some(base) = self.types.get(&base_fq) else { continue };
                let base_is_interface = base.kind == TypeKind::Interface;
                let Some(base_members) = self.members.get(&base_fq) else { continue };
                let Some(own_members) = self.members.get(&entry.fq) else { continue };
                for base_member in base_members {
                    if !base_member.is_dispatchable {
                        continue;
                    }
                    for own in own_members {
                        if own.name != base_member.name || own.argc != base_member.argc {
                            continue;
                        }
                        let own_node_overrides = self
                            .methods
                            .get(&own.id)
                            .is_some_and(|n| n.is_override || base_is_interface);
                        if own_node_overrides {
                            additions.push((
                                base_member.id.clone(),
                                own.id.clone(),
                                base_is_interface.then(|| base_fq.clone()),
                            ));
                        }
                    }
                }
            }
        }
        for (base, implementation, iface) in additions {
            self.impls.entry(base).or_default().insert(implementation.clone());
            if let Some(iface) = iface {
                if let Some(node) = self.methods.get_mut(&implementation) {
                    node.declaring_interfaces.insert(iface);
                }
            }
        }
    }

    /// Transitive base types of `fq`, in deterministic order.
    pub fn base_closure(&self, fq: &str) -> Vec<TypeId> {
        let mut seen = BTreeSet::new();
        let mut queue: Vec<TypeId> = self
            .types
            .get(fq)
            .map(|t| t.bases.clone())
            .unwrap_or_default();
        let mut out = Vec::new();
        while let Some(base) = queue.pop() {
            if !seen.insert(base.clone()) {
                continue;
            }
            if let Some(entry) = self.types.get(&base) {
                queue.extend(entry.bases.clone());
            }
            out.push(base);
        }
        out.sort();
        out
    }

    /// Resolve a syntactic type name against the workspace.
    ///
    /// Order: exact fully-qualified match, then the caller's namespace and
    /// its ancestors, then each using, then a unique simple-name match
    /// (lexicographically first when ambiguous, for determinism).
    pub fn resolve_type(&self, raw: &str, ctx: &ResolveCtx<'_>) -> Option<&TypeEntry> {
        let stripped = strip_generics(raw);
        if let Some(entry) = self.types.get(stripped) {
            return Some(entry);
        }
        let mut ns = ctx.namespace;
        loop {
            if !ns.is_empty() {
                let candidate = format!("{ns}.{stripped}");
                if let Some(entry) = self.types.get(candidate.as_str()) {
                    return Some(entry);
                }
            }
            match ns.rsplit_once('.') {
                Some((parent, _)) => ns = parent,
                None => break,
            }
        }
        for using in ctx.usings {
            if using.is_static {
                continue;
            }
            if let Some(alias) = &using.alias {
                if alias == stripped {
                    if let Some(entry) = self.types.get(using.namespace.as_str()) {
                        return Some(entry);
                    }
                }
                continue;
            }
            let candidate = format!("{}.{stripped}", using.namespace);
            if let Some(entry) = self.types.get(candidate.as_str()) {
                return Some(entry);
            }
        }
        let simple = stripped.rsplit('.').next().unwrap_or(stripped);
        self.by_simple
            .get(simple)
            .and_then(|candidates| candidates.first())
            .and_then(|fq| self.types.get(fq))
    }

    /// Find a member by name in `ty` or its base chain. Exact argument
    /// count wins; a single same-name candidate is accepted otherwise
    /// (optional parameters make counts fuzzy).
    pub fn find_member(&self, ty: &str, name: &str, argc: usize) -> Option<&MemberSig> {
        let mut chain = vec![ty.to_string()];
        chain.extend(self.base_closure(ty));
        for link in &chain {
            let Some(members) = self.members.get(link.as_str()) else { continue };
            let same_name: Vec<&MemberSig> = members.iter().filter(|m| m.name == name).collect();
            if let Some(exact) = same_name.iter().find(|m| m.argc == argc) {
                return Some(*exact);
            }
            if let Some(first) = same_name.first() {
                return Some(*first);
            }
        }
        None
    }

    /// Every member named `name` declared by `ty` (no base-chain search).
    pub fn members_named(&self, ty: &str, name: &str) -> Vec<&MemberSig> {
        self.members
            .get(ty)
            .map(|members| members.iter().filter(|m| m.name == name).collect())
            .unwrap_or_default()
    }

    /// Every member named `name` anywhere in the workspace, in
    /// deterministic (type-sorted) order.
    pub fn all_members_named(&self, name: &str) -> Vec<&MemberSig> {
        self.members
            .values()
            .flatten()
            .filter(|m| m.name == name)
            .collect()
    }

    /// Constructors of `ty` matching `argc`; falls back to any declared
    /// constructor, then `None` (the caller synthesizes a default).
    pub fn find_constructor(&self, ty: &str, argc: usize) -> Option<&MemberSig> {
        let members = self.members.get(ty)?;
        let simple = ty.rsplit('.').next().unwrap_or(ty);
        let ctors: Vec<&MemberSig> = members.iter().filter(|m| m.name == simple).collect();
        ctors
            .iter()
            .find(|m| m.argc == argc)
            .or_else(|| ctors.first())
            .copied()
    }

    /// Extension candidates for `name` whose receiver parameter matches
    /// the receiver type (by simple-name comparison) and whose remaining
    /// arity matches.
    pub fn find_extension(&self, name: &str, receiver_ty: &str, argc: usize) -> Option<&ExtensionSig> {
        let receiver_simple = strip_generics(receiver_ty).rsplit('.').next().unwrap_or(receiver_ty);
        self.extensions.get(name).and_then(|candidates| {
            candidates
                .iter()
                .filter(|c| {
                    let ext_simple =
                        strip_generics(&c.receiver_ty).rsplit('.').next().unwrap_or(&c.receiver_ty);
                    ext_simple == receiver_simple && c.argc == argc
                })
                .min_by(|a, b| a.id.cmp(&b.id))
        })
    }

    pub fn implementations(&self, member: &MethodId) -> impl Iterator<Item = &MethodId> {
        self.impls.get(member).into_iter().flatten()
    }

    pub fn contains(&self, id: &MethodId) -> bool {
        self.methods.contains_key(id)
    }

    pub fn method(&self, id: &MethodId) -> Option<&MethodNode> {
        self.methods.get(id)
    }

    pub fn methods(&self) -> impl Iterator<Item = &MethodNode> {
        self.methods.values()
    }

    pub fn method_count(&self) -> usize {
        self.methods.len()
    }

    pub fn type_entry(&self, fq: &str) -> Option<&TypeEntry> {
        self.types.get(fq)
    }

    pub fn types(&self) -> impl Iterator<Item = &TypeEntry> {
        self.types.values()
    }

    /// Stamp the classifier's verdicts onto the nodes. Runs once during
    /// initialization; nodes are immutable afterwards.
    pub fn mark_tests(&mut self, tests: impl Iterator<Item = MethodId>) {
        for id in tests {
            if let Some(node) = self.methods.get_mut(&id) {
                node.is_test = true;
            }
        }
    }

    /// Materialize a node for an out-of-workspace helper (mock framework
    /// entry points) so paths that include it satisfy the index invariant.
    pub fn add_external_method(&mut self, id: MethodId, sighted_in: &Path, line: u32) {
        self.methods.entry(id.clone()).or_insert_with(|| MethodNode {
            id,
            defined_in: sighted_in.to_path_buf(),
            line,
            is_test: false,
            access: Access::Public,
            is_abstract: false,
            is_virtual: false,
            is_override: false,
            is_extension: false,
            is_constructor: false,
            declaring_interfaces: BTreeSet::new(),
            external: true,
        });
    }

    /// Synthesize a default-constructor node for a workspace type that
    /// declares no constructor but is instantiated.
    pub fn ensure_default_ctor(&mut self, ty_fq: &str) -> Option<MethodId> {
        let entry = self.types.get(ty_fq)?;
        let simple = ty_fq.rsplit('.').next().unwrap_or(ty_fq);
        let id = MethodId(format!("{ty_fq}.{simple}()"));
        if !self.methods.contains_key(&id) {
            let node = MethodNode {
                id: id.clone(),
                defined_in: entry.file.clone(),
                line: entry.line,
                is_test: false,
                access: Access::Public,
                is_abstract: false,
                is_virtual: false,
                is_override: false,
                is_extension: false,
                is_constructor: true,
                declaring_interfaces: BTreeSet::new(),
                external: false,
            };
            self.methods.insert(id.clone(), node);
            if let Some(entry) = self.types.get_mut(ty_fq) {
                entry.methods.push(id.clone());
            }
            if let Some(members) = self.members.get_mut(ty_fq) {
                members.push(MemberSig {
                    id: id.clone(),
                    name: simple.to_string(),
                    argc: 0,
                    is_static: false,
                    is_dispatchable: false,
                    return_type: String::new(),
                });
                members.sort_by(|a, b| a.id.cmp(&b.id));
            }
        }
        Some(id)
    }
}

pub fn namespace_of(type_fq: &str) -> &str {
    match type_fq.rsplit_once('.') {
        Some((ns, _)) => ns,
        None => "",
    }
}

/// `IRepo<Order>` → `IRepo`; leaves non-generic names alone.
pub fn strip_generics(raw: &str) -> &str {
    match raw.find('<') {
        Some(i) => &raw[..i],
        None => raw,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syntax::parse_source;
    use std::path::PathBuf;

    fn index_of(sources: &[(&str, &str)]) -> SymbolIndex {
        let models: Vec<Arc<SourceModel>> = sources
            .iter()
            .map(|(path, text)| Arc::new(parse_source(&PathBuf::from(path), text).unwrap()))
            .collect();
        SymbolIndex::build(&models)
    }

    #[test]
    fn test_canonical_ids() {
        let index = index_of(&[(
            "a.cs",
            r#"
            namespace Shop.Core;
            public class Calc
            {
                public int Add(int a, int b) => a + b;
                public T Echo<T>(T value) => value;
                public Calc() { }
            }
            "#,
        )]);
        assert!(index.contains(&MethodId::from("Shop.Core.Calc.Add(int,int)")));
        assert!(index.contains(&MethodId::from("Shop.Core.Calc.Echo<T>(T)")));
        assert!(index.contains(&MethodId::from("Shop.Core.Calc.Calc()")));
    }

    #[test]
    fn test_method_id_accessors() {
        let id = MethodId::from("Shop.Core.Calc.Add(int,int)");
        assert_eq!(id.containing_type(), "Shop.Core.Calc");
        assert_eq!(id.method_name(), "Add");
        let generic = MethodId::from("Shop.Core.Calc.Echo<T>(T)");
        assert_eq!(generic.method_name(), "Echo");
        assert!(MethodId::synthetic(Path::new("a.cs"), 3).is_synthetic());
    }

    #[test]
    fn test_interface_implementations_are_linked() {
        let index = index_of(&[(
            "a.cs",
            r#"
            namespace Shop;
            public interface IFoo
            {
                void Do();
            }
            public class FooImpl : IFoo
            {
                public void Do() { }
            }
            "#,
        )]);
        let member = MethodId::from("Shop.IFoo.Do()");
        let impls: Vec<_> = index.implementations(&member).collect();
        assert_eq!(impls, vec![&MethodId::from("Shop.FooImpl.Do()")]);
        let node = index.method(&MethodId::from("Shop.FooImpl.Do()")).unwrap();
        assert!(node.declaring_interfaces.contains("Shop.IFoo"));
    }

    #[test]
    fn test_virtual_overrides_are_linked() {
        let index = index_of(&[(
            "a.cs",
            r#"
            namespace Shop;
            public class Base
            {
                public virtual void Work() { }
            }
            public class Derived : Base
            {
                public override void Work() { }
            }
            "#,
        )]);
        let base = MethodId::from("Shop.Base.Work()");
        let impls: Vec<_> = index.implementations(&base).collect();
        assert_eq!(impls, vec![&MethodId::from("Shop.Derived.Work()")]);
    }

    #[test]
    fn test_interface_with_no_impl_is_empty_not_error() {
        let index = index_of(&[(
            "a.cs",
            r#"
            namespace Shop;
            public interface IExternal
            {
                void Go();
            }
            "#,
        )]);
        let member = MethodId::from("Shop.IExternal.Go()");
        assert!(index.contains(&member));
        assert_eq!(index.implementations(&member).count(), 0);
    }

    #[test]
    fn test_resolve_type_by_namespace_and_using() {
        let index = index_of(&[
            (
                "a.cs",
                "namespace Shop.Core;\npublic class Order { public Order() { } }\n",
            ),
            (
                "b.cs",
                "using Shop.Core;\nnamespace Shop.Api;\npublic class OrdersController { }\n",
            ),
        ]);
        let ctx = ResolveCtx {
            namespace: "Shop.Api",
            usings: &[Using {
                namespace: "Shop.Core".into(),
                is_static: false,
                alias: None,
            }],
        };
        let entry = index.resolve_type("Order", &ctx).unwrap();
        assert_eq!(entry.fq, "Shop.Core.Order");
        // Generic arguments don't defeat resolution.
        assert!(index.resolve_type("Order<int>", &ctx).is_some());
    }

    #[test]
    fn test_find_member_prefers_exact_argc() {
        let index = index_of(&[(
            "a.cs",
            r#"
            namespace Shop;
            public class Svc
            {
                public void Run() { }
                public void Run(int speed) { }
            }
            "#,
        )]);
        let member = index.find_member("Shop.Svc", "Run", 1).unwrap();
        assert_eq!(member.id.as_str(), "Shop.Svc.Run(int)");
    }

    #[test]
    fn test_find_member_searches_base_chain() {
        let index = index_of(&[(
            "a.cs",
            r#"
            namespace Shop;
            public class Base
            {
                public void Shared() { }
            }
            public class Derived : Base
            {
            }
            "#,
        )]);
        let member = index.find_member("Shop.Derived", "Shared", 0).unwrap();
        assert_eq!(member.id.as_str(), "Shop.Base.Shared()");
    }

    #[test]
    fn test_extension_lookup() {
        let index = index_of(&[(
            "a.cs",
            r#"
            namespace Shop.Ext;
            public static class OrderExtensions
            {
                public static bool IsRush(this Order order) => false;
            }
            public class Order { }
            "#,
        )]);
        let ext = index.find_extension("IsRush", "Order", 0).unwrap();
        assert_eq!(ext.id.as_str(), "Shop.Ext.OrderExtensions.IsRush(Order)");
        assert!(index.find_extension("IsRush", "Customer", 0).is_none());
    }

    #[test]
    fn test_default_ctor_synthesis() {
        let mut index = index_of(&[(
            "a.cs",
            "namespace Shop;\npublic class Plain { public void Use() { } }\n",
        )]);
        let id = index.ensure_default_ctor("Shop.Plain").unwrap();
        assert_eq!(id.as_str(), "Shop.Plain.Plain()");
        assert!(index.contains(&id));
        // Idempotent.
        let again = index.ensure_default_ctor("Shop.Plain").unwrap();
        assert_eq!(id, again);
    }

    #[test]
    fn test_mark_tests() {
        let mut index = index_of(&[(
            "a.cs",
            "namespace T;\npublic class Ts { public void ShouldWork() { } }\n",
        )]);
        let id = MethodId::from("T.Ts.ShouldWork()");
        index.mark_tests(std::iter::once(id.clone()));
        assert!(index.method(&id).unwrap().is_test);
    }
}
