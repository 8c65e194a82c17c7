//! The syntactic model extracted from one C# source file.
//!
//! This is deliberately not a full AST. The engine needs declarations
//! (namespaces, types, members, attributes) and a flat, source-ordered list
//! of body events (locals, invocations, object creations, method-group
//! references) per method. Lambdas and local functions are not separate
//! nodes: events inside them land in the enclosing method's list.

use std::path::PathBuf;

/// One `using` directive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Using {
    pub namespace: String,
    pub is_static: bool,
    pub alias: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeKind {
    Class,
    Interface,
    Struct,
    Record,
    Enum,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Modifiers {
    pub public: bool,
    pub private: bool,
    pub protected: bool,
    pub internal: bool,
    pub is_static: bool,
    pub is_abstract: bool,
    pub is_virtual: bool,
    pub is_override: bool,
    pub is_sealed: bool,
    pub is_partial: bool,
    pub is_async: bool,
    pub is_readonly: bool,
}

/// An attribute applied to a type or member, e.g. `[Fact]` or
/// `[NUnit.Framework.TestCase(1, 2)]`. The name keeps any qualification the
/// source wrote; a trailing `Attribute` suffix is preserved as written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub name: String,
    pub line: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Param {
    /// Canonical type text, e.g. `int`, `List<string>`, `int[]`.
    pub ty: String,
    pub name: String,
    /// `this` modifier on the first parameter of an extension method.
    pub is_this: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MethodKind {
    Ordinary,
    Constructor,
    Getter,
    Setter,
}

/// `: this(…)` / `: base(…)` on a constructor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CtorChain {
    pub to_base: bool,
    pub argc: usize,
    pub line: u32,
    pub col: u32,
}

/// What a local variable's type could be traced to, syntactically.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LocalTy {
    /// Explicitly annotated: `Foo x = …`.
    Explicit(String),
    /// `var x = new Foo(…)`.
    FromNew(String),
    /// `var x = Receiver.Call<T>(…)`; resolution may recover the static
    /// type from the callee (e.g. proxy-creation helpers).
    FromCall {
        chain: Vec<String>,
        name: String,
        type_args: Vec<String>,
    },
    Unknown,
}

/// Where an invocation's receiver came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Receiver {
    /// Unqualified call: `Helper(…)`.
    None,
    /// Dotted chain: `orders.Save(…)`, `File.ReadAllText(…)`.
    Chain(Vec<String>),
    /// Chained off another call's result: `Make().Use(…)`.
    CallResult,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub receiver: Receiver,
    pub name: String,
    pub type_args: Vec<String>,
    pub argc: usize,
    /// String literals appearing as whole arguments, in argument order.
    pub str_args: Vec<String>,
    pub line: u32,
    pub col: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Creation {
    /// Canonical type text including generic arguments; empty for
    /// target-typed `new(…)`.
    pub ty: String,
    pub argc: usize,
    pub line: u32,
    pub col: u32,
}

/// One source-ordered event inside a method body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BodyStep {
    Local {
        name: String,
        ty: LocalTy,
        line: u32,
    },
    Invoke(Invocation),
    New(Creation),
    /// A method referenced as a method group (its address is taken), e.g.
    /// `list.ForEach(Print)` or `handler.Register(this.OnSave)`.
    MethodRef {
        chain: Vec<String>,
        name: String,
        line: u32,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodDecl {
    pub name: String,
    pub kind: MethodKind,
    pub type_params: Vec<String>,
    pub params: Vec<Param>,
    pub return_type: String,
    pub attributes: Vec<Attribute>,
    pub modifiers: Modifiers,
    pub initializer: Option<CtorChain>,
    pub body: Vec<BodyStep>,
    pub line: u32,
}

impl MethodDecl {
    pub fn is_extension(&self) -> bool {
        self.modifiers.is_static && self.params.first().is_some_and(|p| p.is_this)
    }
}

/// A field or auto-property; enough for receiver-type inference and for
/// `DbSet<T>`-style entity extraction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDecl {
    pub name: String,
    pub ty: String,
    pub is_readonly: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeDecl {
    pub namespace: String,
    /// Simple name; nested types use `Outer.Inner`.
    pub name: String,
    pub arity: usize,
    pub kind: TypeKind,
    pub bases: Vec<String>,
    pub attributes: Vec<Attribute>,
    pub modifiers: Modifiers,
    pub methods: Vec<MethodDecl>,
    pub fields: Vec<FieldDecl>,
    pub line: u32,
}

impl TypeDecl {
    /// Fully-qualified name, the `{namespace}.{name}` prefix of every
    /// MethodId this type declares.
    pub fn fq_name(&self) -> String {
        if self.namespace.is_empty() {
            self.name.clone()
        } else {
            format!("{}.{}", self.namespace, self.name)
        }
    }
}

/// Everything extracted from one file.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SourceModel {
    pub path: PathBuf,
    pub usings: Vec<Using>,
    pub types: Vec<TypeDecl>,
}
