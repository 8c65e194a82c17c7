//! The declaration and body scanner.
//!
//! Walks the token stream once, tracking brace depth, and extracts the
//! [`SourceModel`]: namespaces, usings, type declarations with attributes
//! and base lists, member declarations with parameter types, and a flat
//! source-ordered event list per method body. It is a tolerant scanner,
//! not a grammar: unrecognized constructs are stepped over, and only
//! unbalanced nesting at end of file is treated as a parse failure.
//!
//! Shapes the scanner recognizes inside bodies:
//! - local declarations (`Foo x = …`, `var x = …`), with the initializer
//!   traced when it is a `new` expression or a call
//! - invocations (`x.Save(…)`, `Helper(…)`, `File.ReadAllText("a.txt")`),
//!   with argument count, generic arguments, and whole-argument string
//!   literals
//! - object creations (`new Foo(…)`, `new Mock<IFoo>()`)
//! - method-group references in argument position (`items.ForEach(Print)`)
//! - constructor initializers (`: this(…)` / `: base(…)`)
//!
//! Lambdas and local functions are not separate nodes; their contents are
//! recorded against the enclosing method, which matches how the call graph
//! wants them.

use std::path::Path;

use crate::error::{EngineError, Result};
use crate::syntax::lexer::{tokenize, Token, TokenKind};
use crate::syntax::model::*;

/// Statement keywords that can never start a receiver chain.
const STMT_KEYWORDS: &[&str] = &[
    "return", "throw", "if", "else", "while", "do", "for", "foreach", "switch", "case", "break",
    "continue", "lock", "try", "catch", "finally", "yield", "goto", "in", "out", "ref", "is",
    "as", "await", "using", "when", "null", "true", "false",
];

const MODIFIERS: &[&str] = &[
    "public", "private", "protected", "internal", "static", "abstract", "virtual", "override",
    "sealed", "partial", "async", "readonly", "new", "extern", "unsafe", "volatile", "required",
];

pub fn parse_source(path: &Path, text: &str) -> Result<SourceModel> {
    let tokens = tokenize(text);
    let mut scanner = Scanner { tokens, pos: 0 };
    let mut model = SourceModel {
        path: path.to_path_buf(),
        ..Default::default()
    };
    scanner
        .parse_unit(&mut model)
        .map_err(|detail| EngineError::ParseFailure {
            file: path.to_path_buf(),
            detail,
        })?;
    Ok(model)
}

#[derive(Default)]
struct Pending {
    attrs: Vec<Attribute>,
    mods: Modifiers,
}

impl Pending {
    fn take(&mut self) -> Pending {
        std::mem::take(self)
    }
}

struct Scanner<'d> {
    tokens: Vec<Token<'d>>,
    pos: usize,
}

impl<'d> Scanner<'d> {
    fn peek(&self) -> Option<Token<'d>> {
        self.tokens.get(self.pos).copied()
    }

    fn peek_at(&self, n: usize) -> Option<Token<'d>> {
        self.tokens.get(self.pos + n).copied()
    }

    fn bump(&mut self) -> Option<Token<'d>> {
        let tok = self.peek();
        if tok.is_some() {
            self.pos += 1;
        }
        tok
    }

    fn ident(&self) -> Option<&'d str> {
        self.peek().and_then(|t| t.ident())
    }

    fn ident_at(&self, n: usize) -> Option<&'d str> {
        self.peek_at(n).and_then(|t| t.ident())
    }

    fn is_punct(&self, c: char) -> bool {
        self.peek().is_some_and(|t| t.is_punct(c))
    }

    fn is_punct_at(&self, n: usize, c: char) -> bool {
        self.peek_at(n).is_some_and(|t| t.is_punct(c))
    }

    fn eat_punct(&mut self, c: char) -> bool {
        if self.is_punct(c) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn line(&self) -> u32 {
        self.peek().map(|t| t.line).unwrap_or(0)
    }

    fn pos_of_next(&self) -> (u32, u32) {
        self.peek().map(|t| (t.line, t.col)).unwrap_or((0, 0))
    }

    // ---- compilation unit ---------------------------------------------

    fn parse_unit(&mut self, model: &mut SourceModel) -> std::result::Result<(), String> {
        let mut current_ns = String::new();
        let mut pending = Pending::default();
        while let Some(tok) = self.peek() {
            match tok.kind {
                TokenKind::Ident("using") if !self.is_punct_at(1, '(') => {
                    self.parse_using(model);
                }
                TokenKind::Ident("namespace") => {
                    self.bump();
                    let ns = self.parse_dotted_name();
                    let full = join_ns(&current_ns, &ns);
                    if self.eat_punct('{') {
                        self.parse_namespace_body(model, &full)?;
                    } else {
                        self.eat_punct(';');
                        current_ns = full;
                    }
                }
                TokenKind::Punct('[') => pending.attrs.extend(self.parse_attribute_list()),
                TokenKind::Ident(m) if MODIFIERS.contains(&m) => {
                    set_modifier(&mut pending.mods, m);
                    self.bump();
                }
                TokenKind::Ident(
                    "class" | "interface" | "struct" | "enum" | "record",
                ) => {
                    self.parse_type_decl(model, &current_ns, None, pending.take())?;
                }
                TokenKind::Ident("delegate") => {
                    self.skip_to_semi();
                    pending = Pending::default();
                }
                _ => {
                    self.bump();
                    pending = Pending::default();
                }
            }
        }
        Ok(())
    }

    fn parse_namespace_body(
        &mut self,
        model: &mut SourceModel,
        ns: &str,
    ) -> std::result::Result<(), String> {
        let mut pending = Pending::default();
        loop {
            let Some(tok) = self.peek() else {
                return Err("unbalanced '{' in namespace body".into());
            };
            match tok.kind {
                TokenKind::Punct('}') => {
                    self.bump();
                    return Ok(());
                }
                TokenKind::Ident("using") if !self.is_punct_at(1, '(') => {
                    self.parse_using(model);
                }
                TokenKind::Ident("namespace") => {
                    self.bump();
                    let inner = self.parse_dotted_name();
                    let full = join_ns(ns, &inner);
                    if self.eat_punct('{') {
                        self.parse_namespace_body(model, &full)?;
                    } else {
                        self.eat_punct(';');
                    }
                }
                TokenKind::Punct('[') => pending.attrs.extend(self.parse_attribute_list()),
                TokenKind::Ident(m) if MODIFIERS.contains(&m) => {
                    set_modifier(&mut pending.mods, m);
                    self.bump();
                }
                TokenKind::Ident(
                    "class" | "interface" | "struct" | "enum" | "record",
                ) => {
                    self.parse_type_decl(model, ns, None, pending.take())?;
                }
                TokenKind::Ident("delegate") => {
                    self.skip_to_semi();
                    pending = Pending::default();
                }
                _ => {
                    self.bump();
                    pending = Pending::default();
                }
            }
        }
    }

    fn parse_using(&mut self, model: &mut SourceModel) {
        self.bump(); // `using`
        let is_static = if self.ident() == Some("static") {
            self.bump();
            true
        } else {
            false
        };
        // `using Alias = Some.Namespace;`
        let alias = if self.ident().is_some() && self.is_punct_at(1, '=') {
            let alias = self.ident().unwrap().to_string();
            self.bump();
            self.bump();
            Some(alias)
        } else {
            None
        };
        let namespace = self.parse_type_text().unwrap_or_default();
        self.skip_to_semi();
        if !namespace.is_empty() {
            model.usings.push(Using {
                namespace,
                is_static,
                alias,
            });
        }
    }

    fn parse_dotted_name(&mut self) -> String {
        let mut name = String::new();
        while let Some(seg) = self.ident() {
            name.push_str(seg);
            self.bump();
            if self.is_punct('.') && self.ident_at(1).is_some() {
                name.push('.');
                self.bump();
            } else {
                break;
            }
        }
        name
    }

    /// One `[…]` attribute list; the caller loops for stacked lists.
    fn parse_attribute_list(&mut self) -> Vec<Attribute> {
        let mut attrs = Vec::new();
        self.bump(); // '['
        loop {
            // Target specifier: `assembly:`, `return:`, …
            if self.ident().is_some() && self.is_punct_at(1, ':') && !self.is_punct_at(2, ':') {
                self.bump();
                self.bump();
            }
            let line = self.line();
            let name = self.parse_dotted_name();
            if self.is_punct('<') {
                self.skip_balanced('<', '>');
            }
            if self.is_punct('(') {
                self.skip_balanced('(', ')');
            }
            if !name.is_empty() {
                attrs.push(Attribute { name, line });
            }
            if self.eat_punct(',') {
                continue;
            }
            self.eat_punct(']');
            return attrs;
        }
    }

    // ---- type declarations --------------------------------------------

    fn parse_type_decl(
        &mut self,
        model: &mut SourceModel,
        ns: &str,
        outer: Option<&str>,
        pending: Pending,
    ) -> std::result::Result<(), String> {
        let keyword = self.bump().and_then(|t| t.ident()).unwrap_or_default();
        if keyword == "record" && matches!(self.ident(), Some("class") | Some("struct")) {
            self.bump();
        }
        let kind = match keyword {
            "interface" => TypeKind::Interface,
            "struct" => TypeKind::Struct,
            "record" => TypeKind::Record,
            "enum" => TypeKind::Enum,
            _ => TypeKind::Class,
        };
        let line = self.line();
        let Some(simple) = self.ident() else {
            return Ok(());
        };
        let simple = simple.to_string();
        self.bump();

        let mut arity = 0;
        if self.eat_punct('<') {
            arity = 1;
            let mut depth = 1usize;
            while let Some(tok) = self.peek() {
                match tok.kind {
                    TokenKind::Punct('<') => depth += 1,
                    TokenKind::Punct('>') => {
                        depth -= 1;
                        if depth == 0 {
                            self.bump();
                            break;
                        }
                    }
                    TokenKind::Punct(',') if depth == 1 => arity += 1,
                    _ => {}
                }
                self.bump();
            }
        }

        // Primary constructor on records: `record Point(int X, int Y)`.
        if self.is_punct('(') {
            self.skip_balanced('(', ')');
        }

        let mut bases = Vec::new();
        if self.eat_punct(':') {
            loop {
                match self.parse_type_text() {
                    Some(base) => bases.push(base),
                    None => break,
                }
                if self.is_punct('(') {
                    // Base primary-constructor arguments.
                    self.skip_balanced('(', ')');
                }
                if !self.eat_punct(',') {
                    break;
                }
            }
        }
        self.skip_where_clauses();

        let name = match outer {
            Some(outer) => format!("{outer}.{simple}"),
            None => simple.clone(),
        };
        let mut decl = TypeDecl {
            namespace: ns.to_string(),
            name,
            arity,
            kind,
            bases,
            attributes: pending.attrs,
            modifiers: pending.mods,
            methods: Vec::new(),
            fields: Vec::new(),
            line,
        };

        if !self.eat_punct('{') {
            self.eat_punct(';');
            model.types.push(decl);
            return Ok(());
        }
        if kind == TypeKind::Enum {
            self.skip_body_from_open_brace();
            model.types.push(decl);
            return Ok(());
        }
        self.parse_members(model, &mut decl)?;
        model.types.push(decl);
        Ok(())
    }

    fn skip_where_clauses(&mut self) {
        while self.ident() == Some("where") {
            self.bump();
            while let Some(tok) = self.peek() {
                if tok.is_punct('{')
                    || tok.is_punct(';')
                    || tok.ident() == Some("where")
                    || (tok.is_punct('=') && self.is_punct_at(1, '>'))
                {
                    break;
                }
                self.bump();
            }
        }
    }

    fn parse_members(
        &mut self,
        model: &mut SourceModel,
        ty: &mut TypeDecl,
    ) -> std::result::Result<(), String> {
        let simple_name = ty.name.rsplit('.').next().unwrap_or(&ty.name).to_string();
        let mut pending = Pending::default();
        loop {
            let Some(tok) = self.peek() else {
                return Err(format!("unbalanced '{{' in type '{}'", ty.name));
            };
            match tok.kind {
                TokenKind::Punct('}') => {
                    self.bump();
                    return Ok(());
                }
                TokenKind::Punct('[') => pending.attrs.extend(self.parse_attribute_list()),
                TokenKind::Ident(m) if MODIFIERS.contains(&m) => {
                    set_modifier(&mut pending.mods, m);
                    self.bump();
                }
                TokenKind::Ident(
                    "class" | "interface" | "struct" | "enum" | "record",
                ) => {
                    let ns = ty.namespace.clone();
                    let outer = ty.name.clone();
                    self.parse_type_decl(model, &ns, Some(&outer), pending.take())?;
                }
                TokenKind::Ident("const") => {
                    self.bump();
                    if let Some(field_ty) = self.parse_type_text() {
                        if let Some(name) = self.ident() {
                            ty.fields.push(FieldDecl {
                                name: name.to_string(),
                                ty: field_ty,
                                is_readonly: true,
                            });
                        }
                    }
                    self.skip_to_semi();
                    pending = Pending::default();
                }
                TokenKind::Ident("event" | "delegate") | TokenKind::Punct('~') => {
                    self.skip_member_tail();
                    pending = Pending::default();
                }
                TokenKind::Ident(name) if name == simple_name && self.is_punct_at(1, '(') => {
                    // Constructor.
                    let line = tok.line;
                    let name = name.to_string();
                    self.bump();
                    let method = self.parse_method_rest(
                        name,
                        MethodKind::Constructor,
                        String::new(),
                        Vec::new(),
                        pending.take(),
                        line,
                    );
                    ty.methods.push(method);
                }
                TokenKind::Ident(_) => {
                    self.parse_general_member(ty, pending.take());
                }
                _ => {
                    self.bump();
                    pending = Pending::default();
                }
            }
        }
    }

    /// A member that starts with a type: method, property, or field.
    fn parse_general_member(&mut self, ty: &mut TypeDecl, pending: Pending) {
        let Some(ret) = self.parse_type_text() else {
            self.bump();
            return;
        };
        if self.ident() == Some("operator") || ret == "operator" {
            self.skip_member_tail();
            return;
        }

        // Member name, possibly dotted (explicit interface implementation).
        let line = self.line();
        let full_name = self.parse_dotted_name();
        if full_name.is_empty() {
            self.skip_member_tail();
            return;
        }
        let name = full_name.rsplit('.').next().unwrap_or(&full_name).to_string();

        let mut type_params = Vec::new();
        if self.is_punct('<') {
            if let Some(params) = self.try_parse_type_args() {
                type_params = params;
            }
        }

        if self.is_punct('(') {
            let method =
                self.parse_method_rest(name, MethodKind::Ordinary, ret, type_params, pending, line);
            ty.methods.push(method);
        } else if self.is_punct('{') {
            ty.fields.push(FieldDecl {
                name: name.clone(),
                ty: ret.clone(),
                is_readonly: false,
            });
            self.parse_accessors(ty, &name, &ret, &pending, line);
        } else if self.is_punct('=') && self.is_punct_at(1, '>') {
            // Expression-bodied property: a getter.
            self.bump();
            self.bump();
            ty.fields.push(FieldDecl {
                name: name.clone(),
                ty: ret.clone(),
                is_readonly: true,
            });
            let mut body = Vec::new();
            self.scan_until(&mut body, &[';'], None);
            ty.methods.push(MethodDecl {
                name: format!("get_{name}"),
                kind: MethodKind::Getter,
                type_params: Vec::new(),
                params: Vec::new(),
                return_type: ret,
                attributes: pending.attrs,
                modifiers: pending.mods,
                initializer: None,
                body,
                line,
            });
        } else {
            // Field, possibly with an initializer.
            ty.fields.push(FieldDecl {
                name,
                ty: ret,
                is_readonly: pending.mods.is_readonly,
            });
            self.skip_to_semi();
        }
    }

    fn parse_accessors(
        &mut self,
        ty: &mut TypeDecl,
        prop: &str,
        prop_ty: &str,
        pending: &Pending,
        line: u32,
    ) {
        self.bump(); // '{'
        loop {
            let Some(tok) = self.peek() else { return };
            match tok.kind {
                TokenKind::Punct('}') => {
                    self.bump();
                    // Property initializer: `{ get; } = new …;`
                    if self.is_punct('=') {
                        self.skip_to_semi();
                    }
                    return;
                }
                TokenKind::Punct('[') => {
                    self.parse_attribute_list();
                }
                TokenKind::Ident(m) if MODIFIERS.contains(&m) => {
                    self.bump();
                }
                TokenKind::Ident(acc @ ("get" | "set" | "init" | "add" | "remove")) => {
                    let acc = acc.to_string();
                    let acc_line = tok.line;
                    self.bump();
                    let mut body = Vec::new();
                    let has_body = if self.is_punct('{') {
                        self.scan_block(&mut body);
                        true
                    } else if self.is_punct('=') && self.is_punct_at(1, '>') {
                        self.bump();
                        self.bump();
                        self.scan_until(&mut body, &[';'], None);
                        true
                    } else {
                        self.eat_punct(';');
                        false
                    };
                    if has_body && acc != "add" && acc != "remove" {
                        let is_get = acc == "get";
                        ty.methods.push(MethodDecl {
                            name: format!("{}_{prop}", if is_get { "get" } else { "set" }),
                            kind: if is_get { MethodKind::Getter } else { MethodKind::Setter },
                            type_params: Vec::new(),
                            params: if is_get {
                                Vec::new()
                            } else {
                                vec![Param {
                                    ty: prop_ty.to_string(),
                                    name: "value".to_string(),
                                    is_this: false,
                                }]
                            },
                            return_type: if is_get { prop_ty.to_string() } else { "void".into() },
                            attributes: pending.attrs.clone(),
                            modifiers: pending.mods,
                            initializer: None,
                            body,
                            line: if acc_line != 0 { acc_line } else { line },
                        });
                    }
                }
                _ => {
                    self.bump();
                }
            }
        }
    }

    /// Parse from the parameter list onward; the cursor sits on `(`.
    fn parse_method_rest(
        &mut self,
        name: String,
        kind: MethodKind,
        return_type: String,
        type_params: Vec<String>,
        pending: Pending,
        line: u32,
    ) -> MethodDecl {
        let params = self.parse_params();
        self.skip_where_clauses();

        let mut body = Vec::new();
        let mut initializer = None;
        if kind == MethodKind::Constructor && self.is_punct(':') {
            self.bump();
            if let Some(target @ ("this" | "base")) = self.ident() {
                let to_base = target == "base";
                let (chain_line, chain_col) = self.pos_of_next();
                self.bump();
                if self.is_punct('(') {
                    let args = self.scan_args(&mut body);
                    initializer = Some(CtorChain {
                        to_base,
                        argc: args.argc,
                        line: chain_line,
                        col: chain_col,
                    });
                }
            }
        }

        if self.is_punct('{') {
            self.scan_block(&mut body);
        } else if self.is_punct('=') && self.is_punct_at(1, '>') {
            self.bump();
            self.bump();
            self.scan_until(&mut body, &[';'], None);
        } else {
            self.eat_punct(';');
        }

        MethodDecl {
            name,
            kind,
            type_params,
            params,
            return_type,
            attributes: pending.attrs,
            modifiers: pending.mods,
            initializer,
            body,
            line,
        }
    }

    fn parse_params(&mut self) -> Vec<Param> {
        let mut params = Vec::new();
        self.bump(); // '('
        if self.eat_punct(')') {
            return params;
        }
        loop {
            while self.is_punct('[') {
                self.skip_balanced('[', ']');
            }
            let mut is_this = false;
            while let Some(m) = self.ident() {
                match m {
                    "this" => {
                        is_this = true;
                        self.bump();
                    }
                    "ref" | "out" | "in" | "params" | "scoped" | "readonly" => {
                        self.bump();
                    }
                    _ => break,
                }
            }
            let ty = self.parse_type_text().unwrap_or_default();
            let name = if let Some(name) = self.ident() {
                let name = name.to_string();
                self.bump();
                name
            } else {
                String::new()
            };
            if !ty.is_empty() {
                params.push(Param { ty, name, is_this });
            }
            // Default value or end of parameter.
            let mut depth = 0usize;
            loop {
                let Some(tok) = self.peek() else {
                    return params;
                };
                match tok.kind {
                    TokenKind::Punct('(' | '[') => {
                        depth += 1;
                        self.bump();
                    }
                    TokenKind::Punct(')') if depth == 0 => {
                        self.bump();
                        return params;
                    }
                    TokenKind::Punct(')' | ']') => {
                        depth = depth.saturating_sub(1);
                        self.bump();
                    }
                    TokenKind::Punct(',') if depth == 0 => {
                        self.bump();
                        break;
                    }
                    _ => {
                        self.bump();
                    }
                }
            }
        }
    }

    // ---- type text ------------------------------------------------------

    /// Canonical type text at the cursor: `Ns.Type`, `List<int>`, `int[]`,
    /// `string?`. Returns `None` when the cursor is not on an identifier.
    fn parse_type_text(&mut self) -> Option<String> {
        self.ident()?;
        let mut text = String::new();
        loop {
            let seg = self.ident()?;
            text.push_str(seg);
            self.bump();
            if self.is_punct('<') {
                if let Some(args) = self.try_parse_type_args() {
                    text.push('<');
                    text.push_str(&args.join(","));
                    text.push('>');
                }
            }
            if self.is_punct(':') && self.is_punct_at(1, ':') && self.ident_at(2).is_some() {
                // `global::` qualification.
                self.bump();
                self.bump();
                text.push('.');
                continue;
            }
            if self.is_punct('.') && self.ident_at(1).is_some() {
                self.bump();
                text.push('.');
                continue;
            }
            break;
        }
        loop {
            if self.is_punct('?') && !self.is_punct_at(1, '.') && !self.is_punct_at(1, '?') {
                text.push('?');
                self.bump();
            } else if self.is_punct('[') && (self.is_punct_at(1, ']') || self.is_punct_at(1, ',')) {
                self.bump();
                while self.eat_punct(',') {}
                self.eat_punct(']');
                text.push_str("[]");
            } else {
                break;
            }
        }
        Some(text)
    }

    /// Try `<T, U<V>>` at the cursor. Commits and returns the argument
    /// texts only when the bracket closes over type-like tokens; otherwise
    /// rewinds (it was a less-than comparison).
    fn try_parse_type_args(&mut self) -> Option<Vec<String>> {
        let start = self.pos;
        if !self.eat_punct('<') {
            return None;
        }
        let mut args = Vec::new();
        if self.eat_punct('>') {
            return Some(args); // open generic `Foo<>`
        }
        loop {
            let Some(arg) = self.parse_type_text() else {
                self.pos = start;
                return None;
            };
            args.push(arg);
            if self.eat_punct(',') {
                continue;
            }
            if self.eat_punct('>') {
                return Some(args);
            }
            self.pos = start;
            return None;
        }
    }

    // ---- bodies ---------------------------------------------------------

    /// Scan a `{ … }` block; the cursor sits on `{`.
    fn scan_block(&mut self, steps: &mut Vec<BodyStep>) {
        self.bump();
        self.scan_until(steps, &['}'], None);
    }

    /// Linear body walk until one of `closers` at nesting depth zero. The
    /// closer itself is consumed. `arg` is filled when scanning a single
    /// call argument, to classify string-literal and method-group args.
    fn scan_until(
        &mut self,
        steps: &mut Vec<BodyStep>,
        closers: &[char],
        mut arg: Option<&mut ArgShape>,
    ) {
        loop {
            let Some(tok) = self.peek() else { return };
            match tok.kind {
                TokenKind::Punct(c) if closers.contains(&c) => {
                    self.bump();
                    return;
                }
                TokenKind::Punct('{') => {
                    if let Some(a) = arg.as_deref_mut() {
                        a.impure();
                    }
                    self.bump();
                    self.scan_until(steps, &['}'], None);
                }
                TokenKind::Punct('(') => {
                    if let Some(a) = arg.as_deref_mut() {
                        a.impure();
                    }
                    self.bump();
                    self.scan_until(steps, &[')'], None);
                }
                TokenKind::Punct('[') => {
                    if let Some(a) = arg.as_deref_mut() {
                        a.impure();
                    }
                    self.bump();
                    self.scan_until(steps, &[']'], None);
                }
                TokenKind::Str(s) => {
                    if let Some(a) = arg.as_deref_mut() {
                        a.saw_string(s);
                    }
                    self.bump();
                }
                TokenKind::Ident("new") => {
                    if let Some(a) = arg.as_deref_mut() {
                        a.impure();
                    }
                    self.bump();
                    self.scan_creation(steps);
                }
                TokenKind::Ident("nameof" | "typeof" | "sizeof" | "default")
                    if self.is_punct_at(1, '(') =>
                {
                    if let Some(a) = arg.as_deref_mut() {
                        a.impure();
                    }
                    self.bump();
                    self.skip_balanced('(', ')');
                }
                TokenKind::Ident("using") => {
                    // `using var x = …;` statement.
                    self.bump();
                }
                TokenKind::Ident(first) if !STMT_KEYWORDS.contains(&first) => {
                    self.scan_chain_or_decl(steps, arg.as_deref_mut());
                }
                _ => {
                    if let Some(a) = arg.as_deref_mut() {
                        if !tok.is_punct('.') {
                            a.impure();
                        }
                    }
                    self.bump();
                }
            }
        }
    }

    /// `new Type(…)`, `new Type { … }`, `new(…)`, `new Type[…]`.
    fn scan_creation(&mut self, steps: &mut Vec<BodyStep>) -> Option<String> {
        let (line, col) = self.pos_of_next();
        let ty = if self.ident().is_some() {
            self.parse_type_text().unwrap_or_default()
        } else {
            String::new()
        };
        if self.is_punct('[') {
            // Array allocation; scan the size expression and any initializer.
            self.bump();
            self.scan_until(steps, &[']'], None);
            if self.is_punct('{') {
                self.bump();
                self.scan_until(steps, &['}'], None);
            }
            return None;
        }
        let mut argc = 0;
        if self.is_punct('(') {
            let args = self.scan_args(steps);
            argc = args.argc;
        }
        if self.is_punct('{') {
            self.bump();
            self.scan_until(steps, &['}'], None);
        }
        if ty.is_empty() {
            return None;
        }
        steps.push(BodyStep::New(Creation {
            ty: ty.clone(),
            argc,
            line,
            col,
        }));
        Some(ty)
    }

    /// An identifier at expression level: a dotted chain that turns out to
    /// be an invocation, a local declaration, or a plain mention.
    fn scan_chain_or_decl(&mut self, steps: &mut Vec<BodyStep>, mut arg: Option<&mut ArgShape>) {
        let mut chain: Vec<String> = Vec::new();
        let mut type_args: Vec<String> = Vec::new();
        let mut last_tok = self.pos_of_next();

        while let Some(seg) = self.ident() {
            last_tok = self.pos_of_next();
            chain.push(seg.to_string());
            self.bump();
            type_args.clear();
            if self.is_punct('<') {
                if let Some(args) = self.try_parse_type_args() {
                    type_args = args;
                }
            }
            // Null-forgiving operator between segments.
            if self.is_punct('!') && self.is_punct_at(1, '.') {
                self.bump();
            }
            if self.is_punct('.') && self.ident_at(1).is_some() {
                self.bump();
                continue;
            }
            if self.is_punct('?') && self.is_punct_at(1, '.') && self.ident_at(2).is_some() {
                self.bump();
                self.bump();
                continue;
            }
            break;
        }
        if chain.is_empty() {
            self.bump();
            return;
        }

        if self.is_punct('(') {
            // Invocation.
            let name = chain.pop().unwrap();
            let args = self.scan_args(steps);
            let receiver = if chain.is_empty() {
                Receiver::None
            } else {
                Receiver::Chain(chain)
            };
            steps.push(BodyStep::Invoke(Invocation {
                receiver,
                name,
                type_args,
                argc: args.argc,
                str_args: args.str_args,
                line: last_tok.0,
                col: last_tok.1,
            }));
            if let Some(a) = arg.as_deref_mut() {
                a.impure();
            }
            self.scan_call_tail(steps);
            return;
        }

        // Local declaration: `Chain name` followed by `=`, `;`, `)`, `,`
        // or `in`.
        let chain_text = chain.join(".");
        let looks_like_decl = self.ident().is_some_and(|name| {
            !STMT_KEYWORDS.contains(&name)
                && ((self.is_punct_at(1, '=') && !self.is_punct_at(2, '=') && !self.is_punct_at(2, '>'))
                    || self.is_punct_at(1, ';')
                    || self.is_punct_at(1, ')')
                    || self.is_punct_at(1, ',')
                    || self.ident_at(1) == Some("in"))
        });
        if looks_like_decl {
            let decl_ty = if type_args.is_empty() {
                chain_text
            } else {
                format!("{}<{}>", chain_text, type_args.join(","))
            };
            let name = self.ident().unwrap().to_string();
            let decl_line = self.line();
            self.bump();
            if let Some(a) = arg.as_deref_mut() {
                a.impure();
            }
            let ty = if self.is_punct('=') && !self.is_punct_at(1, '=') {
                self.bump();
                self.trace_initializer(steps, &decl_ty)
            } else if decl_ty == "var" {
                LocalTy::Unknown
            } else {
                LocalTy::Explicit(decl_ty)
            };
            steps.push(BodyStep::Local {
                name,
                ty,
                line: decl_line,
            });
            return;
        }

        // Plain chain mention; in argument position this may be a method
        // group whose address is being taken.
        if let Some(a) = arg {
            a.saw_chain(chain);
        }
    }

    /// After an invocation or creation, consume `.Next(…)` chains so the
    /// follow-on calls are recorded with a `CallResult` receiver.
    fn scan_call_tail(&mut self, steps: &mut Vec<BodyStep>) {
        loop {
            if self.is_punct('!') && self.is_punct_at(1, '.') {
                self.bump();
            }
            let dotted = if self.is_punct('.') && self.ident_at(1).is_some() {
                self.bump();
                true
            } else if self.is_punct('?') && self.is_punct_at(1, '.') && self.ident_at(2).is_some() {
                self.bump();
                self.bump();
                true
            } else {
                false
            };
            if !dotted {
                return;
            }
            let mut chain: Vec<String> = Vec::new();
            let mut type_args: Vec<String> = Vec::new();
            let mut last = (0u32, 0u32);
            while let Some(seg) = self.ident() {
                last = self.pos_of_next();
                chain.push(seg.to_string());
                self.bump();
                type_args.clear();
                if self.is_punct('<') {
                    if let Some(args) = self.try_parse_type_args() {
                        type_args = args;
                    }
                }
                if self.is_punct('.') && self.ident_at(1).is_some() {
                    self.bump();
                } else {
                    break;
                }
            }
            match chain.pop() {
                Some(name) if self.is_punct('(') => {
                    let args = self.scan_args(steps);
                    steps.push(BodyStep::Invoke(Invocation {
                        receiver: Receiver::CallResult,
                        name,
                        type_args,
                        argc: args.argc,
                        str_args: args.str_args,
                        line: last.0,
                        col: last.1,
                    }));
                }
                // Property access on a call result; nothing to record.
                _ => return,
            }
        }
    }

    /// Scan a parenthesized argument list; the cursor sits on `(`.
    fn scan_args(&mut self, steps: &mut Vec<BodyStep>) -> ArgsInfo {
        self.bump(); // '('
        let mut info = ArgsInfo::default();
        if self.eat_punct(')') {
            return info;
        }
        loop {
            // Argument label `name:` and `ref`/`out` modifiers.
            if self.ident().is_some() && self.is_punct_at(1, ':') && !self.is_punct_at(2, ':') {
                self.bump();
                self.bump();
            }
            while matches!(self.ident(), Some("ref" | "out" | "in")) {
                self.bump();
                // `out var x` introduces a local with an unknown type.
                if self.ident() == Some("var") {
                    self.bump();
                    if let Some(name) = self.ident() {
                        steps.push(BodyStep::Local {
                            name: name.to_string(),
                            ty: LocalTy::Unknown,
                            line: self.line(),
                        });
                        self.bump();
                    }
                }
            }

            let mut shape = ArgShape::default();
            let before = self.pos;
            self.scan_arg(steps, &mut shape);
            if self.pos == before {
                self.bump();
            }
            info.argc += 1;
            match shape.classify() {
                ArgClass::StringLit(s) => info.str_args.push(s),
                ArgClass::MethodGroup(mut chain) => {
                    let name = chain.pop().unwrap();
                    steps.push(BodyStep::MethodRef {
                        chain,
                        name,
                        line: self.line(),
                    });
                }
                ArgClass::Other => {}
            }
            if shape.ended_with_close {
                return info;
            }
        }
    }

    /// One argument: ends at `,` or `)` at depth zero; reports which.
    fn scan_arg(&mut self, steps: &mut Vec<BodyStep>, shape: &mut ArgShape) {
        loop {
            let Some(tok) = self.peek() else {
                shape.ended_with_close = true;
                return;
            };
            match tok.kind {
                TokenKind::Punct(')') => {
                    self.bump();
                    shape.ended_with_close = true;
                    return;
                }
                TokenKind::Punct(',') => {
                    self.bump();
                    return;
                }
                TokenKind::Str(s) => {
                    shape.saw_string(s);
                    self.bump();
                }
                TokenKind::Ident("new") => {
                    shape.impure();
                    self.bump();
                    self.scan_creation(steps);
                }
                TokenKind::Ident("nameof" | "typeof" | "default") if self.is_punct_at(1, '(') => {
                    shape.impure();
                    self.bump();
                    self.skip_balanced('(', ')');
                }
                TokenKind::Ident(first) if !STMT_KEYWORDS.contains(&first) => {
                    let mut one = ArgShape::default();
                    self.scan_chain_or_decl(steps, Some(&mut one));
                    if let Some(chain) = one.pure_chain.take() {
                        shape.saw_chain(chain);
                    } else {
                        shape.impure();
                    }
                }
                TokenKind::Punct('(') => {
                    shape.impure();
                    self.bump();
                    self.scan_until(steps, &[')'], None);
                }
                TokenKind::Punct('[') => {
                    shape.impure();
                    self.bump();
                    self.scan_until(steps, &[']'], None);
                }
                TokenKind::Punct('{') => {
                    shape.impure();
                    self.bump();
                    self.scan_until(steps, &['}'], None);
                }
                _ => {
                    shape.impure();
                    self.bump();
                }
            }
        }
    }

    /// The right-hand side of `x = …`; traces `new` and call initializers.
    fn trace_initializer(&mut self, steps: &mut Vec<BodyStep>, decl_ty: &str) -> LocalTy {
        let explicit = decl_ty != "var";
        let Some(tok) = self.peek() else {
            return LocalTy::Unknown;
        };
        match tok.kind {
            TokenKind::Ident("new") => {
                self.bump();
                let created = self.scan_creation(steps);
                if explicit {
                    LocalTy::Explicit(decl_ty.to_string())
                } else {
                    match created {
                        Some(ty) => LocalTy::FromNew(ty),
                        None => LocalTy::Unknown,
                    }
                }
            }
            TokenKind::Ident("await") => {
                self.bump();
                self.trace_initializer(steps, decl_ty)
            }
            TokenKind::Ident(first) if !STMT_KEYWORDS.contains(&first) => {
                let before_len = steps.len();
                let mut shape = ArgShape::default();
                self.scan_chain_or_decl(steps, Some(&mut shape));
                let from_call = steps[before_len..].iter().find_map(|s| match s {
                    BodyStep::Invoke(inv) => Some(LocalTy::FromCall {
                        chain: match &inv.receiver {
                            Receiver::Chain(c) => c.clone(),
                            _ => Vec::new(),
                        },
                        name: inv.name.clone(),
                        type_args: inv.type_args.clone(),
                    }),
                    _ => None,
                });
                if explicit {
                    LocalTy::Explicit(decl_ty.to_string())
                } else {
                    from_call.unwrap_or(LocalTy::Unknown)
                }
            }
            _ => {
                if explicit {
                    LocalTy::Explicit(decl_ty.to_string())
                } else {
                    LocalTy::Unknown
                }
            }
        }
    }

    // ---- skipping -------------------------------------------------------

    fn skip_to_semi(&mut self) {
        let mut depth = 0usize;
        while let Some(tok) = self.peek() {
            match tok.kind {
                TokenKind::Punct('{' | '(' | '[') => depth += 1,
                TokenKind::Punct('}') if depth == 0 => return, // don't escape the enclosing body
                TokenKind::Punct('}' | ')' | ']') => depth = depth.saturating_sub(1),
                TokenKind::Punct(';') if depth == 0 => {
                    self.bump();
                    return;
                }
                _ => {}
            }
            self.bump();
        }
    }

    /// Skip a member whose shape we don't model: operator, event, finalizer.
    fn skip_member_tail(&mut self) {
        while let Some(tok) = self.peek() {
            match tok.kind {
                TokenKind::Punct(';') => {
                    self.bump();
                    return;
                }
                TokenKind::Punct('{') => {
                    self.bump();
                    self.skip_body_from_open_brace();
                    return;
                }
                TokenKind::Punct('}') => return,
                _ => {
                    self.bump();
                }
            }
        }
    }

    /// The '{' is already consumed.
    fn skip_body_from_open_brace(&mut self) {
        let mut depth = 1usize;
        while let Some(tok) = self.bump() {
            match tok.kind {
                TokenKind::Punct('{') => depth += 1,
                TokenKind::Punct('}') => {
                    depth -= 1;
                    if depth == 0 {
                        return;
                    }
                }
                _ => {}
            }
        }
    }

    fn skip_balanced(&mut self, open: char, close: char) {
        if !self.is_punct(open) {
            return;
        }
        self.bump();
        let mut depth = 1usize;
        while let Some(tok) = self.bump() {
            match tok.kind {
                TokenKind::Punct(c) if c == open => depth += 1,
                TokenKind::Punct(c) if c == close => {
                    depth -= 1;
                    if depth == 0 {
                        return;
                    }
                }
                _ => {}
            }
        }
    }
}

#[derive(Default)]
struct ArgsInfo {
    argc: usize,
    str_args: Vec<String>,
}

/// Classification state for one call argument.
#[derive(Default)]
struct ArgShape {
    str_lit: Option<String>,
    pure_chain: Option<Vec<String>>,
    tainted: bool,
    ended_with_close: bool,
}

enum ArgClass {
    StringLit(String),
    MethodGroup(Vec<String>),
    Other,
}

impl ArgShape {
    fn impure(&mut self) {
        self.tainted = true;
        self.str_lit = None;
        self.pure_chain = None;
    }

    fn saw_string(&mut self, s: &str) {
        if self.tainted || self.str_lit.is_some() || self.pure_chain.is_some() {
            self.impure();
        } else {
            self.str_lit = Some(s.to_string());
        }
    }

    fn saw_chain(&mut self, chain: Vec<String>) {
        if self.tainted || self.str_lit.is_some() || self.pure_chain.is_some() {
            self.impure();
        } else {
            self.pure_chain = Some(chain);
        }
    }

    fn classify(&mut self) -> ArgClass {
        if self.tainted {
            return ArgClass::Other;
        }
        if let Some(s) = self.str_lit.take() {
            return ArgClass::StringLit(s);
        }
        if let Some(chain) = self.pure_chain.take() {
            // `obj.Handler` and bare `Handler` are the usual method-group
            // shapes; lowercase single identifiers are locals and literals.
            let last_is_methodish = chain
                .last()
                .and_then(|s| s.chars().next())
                .is_some_and(|c| c.is_ascii_uppercase());
            if last_is_methodish {
                return ArgClass::MethodGroup(chain);
            }
        }
        ArgClass::Other
    }
}

fn join_ns(outer: &str, inner: &str) -> String {
    if outer.is_empty() {
        inner.to_string()
    } else if inner.is_empty() {
        outer.to_string()
    } else {
        format!("{outer}.{inner}")
    }
}

fn set_modifier(mods: &mut Modifiers, m: &str) {
    match m {
        "public" => mods.public = true,
        "private" => mods.private = true,
        "protected" => mods.protected = true,
        "internal" => mods.internal = true,
        "static" => mods.is_static = true,
        "abstract" => mods.is_abstract = true,
        "virtual" => mods.is_virtual = true,
        "override" => mods.is_override = true,
        "sealed" => mods.is_sealed = true,
        "partial" => mods.is_partial = true,
        "async" => mods.is_async = true,
        "readonly" => mods.is_readonly = true,
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn parse(text: &str) -> SourceModel {
        parse_source(&PathBuf::from("test.cs"), text).unwrap()
    }

    #[test]
    fn test_namespace_and_type() {
        let model = parse(
            r#"
            namespace Shop.Core
            {
                public class OrderService
                {
                }
            }
            "#,
        );
        assert_eq!(model.types.len(), 1);
        assert_eq!(model.types[0].fq_name(), "Shop.Core.OrderService");
        assert!(model.types[0].modifiers.public);
    }

    #[test]
    fn test_file_scoped_namespace() {
        let model = parse("namespace Shop.Core;\npublic interface IClock { }\n");
        assert_eq!(model.types[0].fq_name(), "Shop.Core.IClock");
        assert_eq!(model.types[0].kind, TypeKind::Interface);
    }

    #[test]
    fn test_usings() {
        let model = parse("using System;\nusing static System.Math;\nusing IO = System.IO;\n");
        assert_eq!(model.usings.len(), 3);
        assert_eq!(model.usings[0].namespace, "System");
        assert!(model.usings[1].is_static);
        assert_eq!(model.usings[2].alias.as_deref(), Some("IO"));
    }

    #[test]
    fn test_method_with_params() {
        let model = parse(
            r#"
            namespace N;
            public class Calc
            {
                public int Add(int a, int b) { return a + b; }
            }
            "#,
        );
        let m = &model.types[0].methods[0];
        assert_eq!(m.name, "Add");
        assert_eq!(m.params.len(), 2);
        assert_eq!(m.params[0].ty, "int");
        assert_eq!(m.return_type, "int");
    }

    #[test]
    fn test_generic_param_types_are_canonical() {
        let model = parse(
            r#"
            namespace N;
            public class Repo
            {
                public void SaveAll(Dictionary<string, List<int>> items, int[] ids) { }
            }
            "#,
        );
        let m = &model.types[0].methods[0];
        assert_eq!(m.params[0].ty, "Dictionary<string,List<int>>");
        assert_eq!(m.params[1].ty, "int[]");
    }

    #[test]
    fn test_attributes() {
        let model = parse(
            r#"
            namespace N;
            public class CalcTests
            {
                [Fact]
                public void AddsTwo() { }

                [NUnit.Framework.TestCase(1, 2)]
                public void Cases() { }
            }
            "#,
        );
        let methods = &model.types[0].methods;
        assert_eq!(methods[0].attributes[0].name, "Fact");
        assert_eq!(methods[1].attributes[0].name, "NUnit.Framework.TestCase");
    }

    #[test]
    fn test_invocations_and_receivers() {
        let model = parse(
            r#"
            namespace N;
            public class Svc
            {
                public void Run(IRepo repo)
                {
                    var order = new Order(1);
                    repo.Save(order);
                    Helper();
                    File.ReadAllText("data.txt");
                }
            }
            "#,
        );
        let body = &model.types[0].methods[0].body;
        let invokes: Vec<_> = body
            .iter()
            .filter_map(|s| match s {
                BodyStep::Invoke(i) => Some(i),
                _ => None,
            })
            .collect();
        assert_eq!(invokes.len(), 3);
        assert_eq!(invokes[0].name, "Save");
        assert_eq!(invokes[0].receiver, Receiver::Chain(vec!["repo".into()]));
        assert_eq!(invokes[1].receiver, Receiver::None);
        assert_eq!(invokes[2].str_args, vec!["data.txt"]);
        assert!(body.iter().any(|s| matches!(
            s,
            BodyStep::New(Creation { ty, argc: 1, .. }) if ty == "Order"
        )));
        assert!(body.iter().any(|s| matches!(
            s,
            BodyStep::Local { name, ty: LocalTy::FromNew(t), .. } if name == "order" && t == "Order"
        )));
    }

    #[test]
    fn test_generic_invocation() {
        let model = parse(
            r#"
            namespace N;
            public class T
            {
                public void M()
                {
                    var sub = Substitute.For<IFoo>();
                    sub.Do();
                }
            }
            "#,
        );
        let body = &model.types[0].methods[0].body;
        assert!(body.iter().any(|s| matches!(
            s,
            BodyStep::Local {
                name,
                ty: LocalTy::FromCall { chain, name: call, type_args },
                ..
            } if name == "sub" && chain == &["Substitute"] && call == "For"
                && type_args == &["IFoo"]
        )));
        assert!(body.iter().any(|s| matches!(
            s,
            BodyStep::Invoke(Invocation { name, receiver: Receiver::Chain(c), .. })
                if name == "Do" && c == &["sub"]
        )));
    }

    #[test]
    fn test_method_group_argument() {
        let model = parse(
            r#"
            namespace N;
            public class T
            {
                public void M(List<int> items)
                {
                    items.ForEach(Print);
                }
                private void Print(int x) { }
            }
            "#,
        );
        let body = &model.types[0].methods[0].body;
        assert!(body.iter().any(|s| matches!(
            s,
            BodyStep::MethodRef { name, .. } if name == "Print"
        )));
    }

    #[test]
    fn test_expression_bodied_method() {
        let model = parse(
            r#"
            namespace N;
            public class T
            {
                public int Twice(int x) => Double(x);
                private int Double(int x) => x * 2;
            }
            "#,
        );
        let body = &model.types[0].methods[0].body;
        assert!(body.iter().any(|s| matches!(
            s,
            BodyStep::Invoke(Invocation { name, .. }) if name == "Double"
        )));
        assert_eq!(model.types[0].methods.len(), 2);
    }

    #[test]
    fn test_property_accessors_become_methods() {
        let model = parse(
            r#"
            namespace N;
            public class T
            {
                private int _count;
                public int Count
                {
                    get { return Compute(); }
                    set { _count = value; }
                }
                public string Name { get; set; }
                private int Compute() => 1;
            }
            "#,
        );
        let ty = &model.types[0];
        let names: Vec<_> = ty.methods.iter().map(|m| m.name.as_str()).collect();
        assert!(names.contains(&"get_Count"));
        assert!(names.contains(&"set_Count"));
        // Auto-properties have no accessor bodies, hence no methods.
        assert!(!names.contains(&"get_Name"));
        assert!(ty.fields.iter().any(|f| f.name == "Name" && f.ty == "string"));
        let getter = ty.methods.iter().find(|m| m.name == "get_Count").unwrap();
        assert!(getter.body.iter().any(|s| matches!(
            s,
            BodyStep::Invoke(Invocation { name, .. }) if name == "Compute"
        )));
    }

    #[test]
    fn test_ctor_and_chaining() {
        let model = parse(
            r#"
            namespace N;
            public class T : Base
            {
                public T() : this(1) { }
                public T(int x) : base(x) { Init(); }
                private void Init() { }
            }
            "#,
        );
        let methods = &model.types[0].methods;
        assert_eq!(methods[0].kind, MethodKind::Constructor);
        let chained = methods[0].initializer.as_ref().unwrap();
        assert!(!chained.to_base);
        assert_eq!(chained.argc, 1);
        assert!(methods[1].initializer.as_ref().unwrap().to_base);
    }

    #[test]
    fn test_interface_members_have_no_bodies() {
        let model = parse(
            r#"
            namespace N;
            public interface IRepo
            {
                void Save(Order order);
                Order Load(int id);
            }
            "#,
        );
        let ty = &model.types[0];
        assert_eq!(ty.kind, TypeKind::Interface);
        assert_eq!(ty.methods.len(), 2);
        assert!(ty.methods[0].body.is_empty());
    }

    #[test]
    fn test_nested_types() {
        let model = parse(
            r#"
            namespace N;
            public class Outer
            {
                public class Inner
                {
                    public void Ping() { }
                }
                public void Pong() { }
            }
            "#,
        );
        let names: Vec<_> = model.types.iter().map(|t| t.name.as_str()).collect();
        assert!(names.contains(&"Outer"));
        assert!(names.contains(&"Outer.Inner"));
        let outer = model.types.iter().find(|t| t.name == "Outer").unwrap();
        assert_eq!(outer.methods.len(), 1);
    }

    #[test]
    fn test_base_list() {
        let model = parse(
            r#"
            namespace N;
            public class FooImpl : BaseThing, IFoo, IDisposable
            {
            }
            "#,
        );
        assert_eq!(model.types[0].bases, vec!["BaseThing", "IFoo", "IDisposable"]);
    }

    #[test]
    fn test_extension_method() {
        let model = parse(
            r#"
            namespace N;
            public static class StringExtensions
            {
                public static bool IsBlank(this string value) => value.Length == 0;
            }
            "#,
        );
        let m = &model.types[0].methods[0];
        assert!(m.is_extension());
        assert_eq!(m.params[0].ty, "string");
    }

    #[test]
    fn test_lambda_calls_attach_to_enclosing_method() {
        let model = parse(
            r#"
            namespace N;
            public class T
            {
                public void M(List<int> xs)
                {
                    xs.Select(x => Transform(x));
                }
                private int Transform(int x) => x;
            }
            "#,
        );
        let body = &model.types[0].methods[0].body;
        assert!(body.iter().any(|s| matches!(
            s,
            BodyStep::Invoke(Invocation { name, .. }) if name == "Transform"
        )));
    }

    #[test]
    fn test_unbalanced_braces_is_parse_failure() {
        let err = parse_source(&PathBuf::from("bad.cs"), "namespace N { class A {").unwrap_err();
        assert!(matches!(err, EngineError::ParseFailure { .. }));
    }

    #[test]
    fn test_dbset_fields_are_captured() {
        let model = parse(
            r#"
            namespace N;
            public class ShopContext : DbContext
            {
                public DbSet<Customer> Customers { get; set; }
                public DbSet<Order> Orders { get; set; }
            }
            "#,
        );
        let fields = &model.types[0].fields;
        assert!(fields.iter().any(|f| f.ty == "DbSet<Customer>"));
        assert!(fields.iter().any(|f| f.ty == "DbSet<Order>"));
    }

    #[test]
    fn test_call_result_chaining() {
        let model = parse(
            r#"
            namespace N;
            public class T
            {
                public void M()
                {
                    Build().Run();
                }
                private T Build() => this;
                private void Run() { }
            }
            "#,
        );
        let body = &model.types[0].methods[0].body;
        let invokes: Vec<_> = body
            .iter()
            .filter_map(|s| match s {
                BodyStep::Invoke(i) => Some(i),
                _ => None,
            })
            .collect();
        assert_eq!(invokes.len(), 2);
        assert_eq!(invokes[0].name, "Build");
        assert_eq!(invokes[1].name, "Run");
        assert_eq!(invokes[1].receiver, Receiver::CallResult);
    }
}
