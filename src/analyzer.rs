// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use crate::ast::*;
use crate::context::{ContextError, TypeContext};
use crate::definition::{ElementDefinition, StructureDefinition};
use crate::functions::{self, ParamKind, ReturnTemplate};
use crate::lexer::Span;
use crate::parser::parse_expression;
use crate::typing::*;

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use anyhow::{bail, Result};
use log::debug;

// Bounds for walks that may otherwise follow recursive type graphs.
const MAX_REPEAT_ROUNDS: usize = 8;
const MAX_INHERITANCE_DEPTH: usize = 16;
const MAX_DESCENDANT_TYPES: usize = 256;

/// Statically checks FHIRPath expressions against type definitions and
/// reports every element path the expression navigates through.
///
/// The analyzer is immutable once built and can be shared across threads.
#[derive(Debug, Clone)]
pub struct Analyzer {
    context: Arc<TypeContext>,
}

impl Analyzer {
    pub fn new(context: Arc<TypeContext>) -> Result<Self, ContextError> {
        if context.is_empty() {
            return Err(ContextError::NotLoaded);
        }
        Ok(Self { context })
    }

    pub fn context(&self) -> &TypeContext {
        &self.context
    }

    /// Returns the set of element paths that `expression`, evaluated with
    /// `starting_path` as its context element, reads.
    ///
    /// `definition` is the definition the expression belongs to. Its
    /// differential takes precedence over the base definition of the same
    /// type so that elements the definition introduces resolve.
    pub fn resolve_field_references(
        &self,
        expression: &str,
        root_type: &str,
        starting_path: &str,
        definition: &StructureDefinition,
    ) -> Result<BTreeSet<String>> {
        let expr = parse_expression(starting_path, expression)?;
        self.check(&expr, root_type, starting_path, definition)
    }

    pub fn check(
        &self,
        expr: &Expr,
        root_type: &str,
        starting_path: &str,
        definition: &StructureDefinition,
    ) -> Result<BTreeSet<String>> {
        let mut checker = Checker {
            context: &self.context,
            definition,
            resource: TypeDetails::singleton(ProfiledType::named(root_type)),
            start: TypeDetails::empty(),
            variables: BTreeMap::new(),
            found: BTreeSet::new(),
        };
        let start = checker.starting_focus(starting_path)?;
        checker.start = start.clone();
        let env = Env {
            this: start.clone(),
            total: TypeDetails::empty(),
        };
        checker.check_expr(expr, &start, &env)?;
        debug!("{starting_path}: {:?}", checker.found);
        Ok(checker.found)
    }
}

#[derive(Clone)]
struct Env {
    this: TypeDetails,
    total: TypeDetails,
}

struct Checker<'a> {
    context: &'a TypeContext,
    definition: &'a StructureDefinition,
    resource: TypeDetails,
    start: TypeDetails,
    variables: BTreeMap<String, TypeDetails>,
    found: BTreeSet<String>,
}

fn upper_first(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) => c.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

impl<'a> Checker<'a> {
    // Element lists that may declare members of `type_name`, most specific
    // first.
    fn sources(&self, type_name: &str) -> Vec<&'a [ElementDefinition]> {
        let definition = self.definition;
        let context = self.context;
        let mut sources = vec![];
        if definition.type_name == type_name {
            sources.push(definition.differential.element.as_slice());
        }
        if let Some(sd) = context.get(type_name) {
            sources.push(sd.elements());
        }
        sources
    }

    fn base_type(&self, type_name: &str) -> Option<String> {
        if self.definition.type_name == type_name {
            if let Some(base) = self.definition.base_type() {
                return Some(base.to_string());
            }
        }
        self.context
            .get(type_name)
            .and_then(|sd| sd.base_type())
            .map(|b| b.to_string())
    }

    fn starting_focus(&self, starting_path: &str) -> Result<TypeDetails> {
        if split_path(starting_path).is_none() {
            return Ok(TypeDetails::singleton(ProfiledType::named(starting_path)));
        }
        for elements in self.sources(root_of(starting_path)) {
            if let Some(ed) = elements.iter().find(|e| e.path == starting_path) {
                let mut focus = self.element_types(ed, elements);
                focus.collection = false;
                return Ok(focus);
            }
        }
        bail!("unknown context path {starting_path}")
    }

    fn element_types(&self, ed: &ElementDefinition, elements: &[ElementDefinition]) -> TypeDetails {
        let mut t = TypeDetails {
            collection: ed.is_collection(),
            types: vec![],
        };

        if let Some(target) = ed.content_reference_path() {
            let code = elements
                .iter()
                .find(|e| e.path == target)
                .and_then(|e| e.types.first())
                .map(|r| normalize_type_code(&r.code))
                .unwrap_or_else(|| "Element".to_string());
            t.add(ProfiledType::inline(&code, target));
            return t;
        }

        if ed.types.is_empty() {
            if split_path(&ed.path).is_none() {
                t.add(ProfiledType::named(&ed.path));
            } else {
                t.add(ProfiledType::inline("Element", &ed.path));
            }
            return t;
        }

        for r in &ed.types {
            let code = normalize_type_code(&r.code);
            if is_inline_type(&code) {
                t.add(ProfiledType::inline(&code, &ed.path));
            } else {
                t.add(ProfiledType::named(&code));
            }
        }
        t
    }

    fn contribute(
        &mut self,
        ed: &ElementDefinition,
        elements: &[ElementDefinition],
        out: &mut TypeDetails,
    ) {
        self.found.insert(ed.path.clone());
        let t = self.element_types(ed, elements);
        out.merge(&t);
    }

    // Type whose members are inherited by `t`.
    fn inherited(&self, t: &ProfiledType) -> Option<ProfiledType> {
        match &t.element {
            Some(_) => Some(ProfiledType::named(&t.code)),
            None => self
                .base_type(&t.code)
                .filter(|b| *b != t.code)
                .map(|b| ProfiledType::named(&b)),
        }
    }

    /// Adds the types of member `name` of `t` to `out`.
    fn members_named(
        &mut self,
        t: &ProfiledType,
        name: &str,
        out: &mut TypeDetails,
        depth: usize,
    ) -> bool {
        if t.is_system() || depth > MAX_INHERITANCE_DEPTH {
            return false;
        }
        let (owner, parent) = t.member_scope();

        for elements in self.sources(owner) {
            let mut matched = false;
            for ed in elements {
                let Some((p, tail)) = split_path(&ed.path) else {
                    continue;
                };
                if p != parent {
                    continue;
                }
                if tail == name {
                    self.contribute(ed, elements, out);
                    matched = true;
                    continue;
                }
                let Some(base) = tail.strip_suffix("[x]") else {
                    continue;
                };
                if name == base {
                    self.contribute(ed, elements, out);
                    matched = true;
                } else if let Some(suffix) = name.strip_prefix(base) {
                    // valueQuantity selects the Quantity choice of value[x].
                    let chosen = ed
                        .types
                        .iter()
                        .map(|r| normalize_type_code(&r.code))
                        .find(|code| upper_first(code) == suffix);
                    if let Some(code) = chosen {
                        self.found.insert(ed.path.clone());
                        out.collection |= ed.is_collection();
                        out.add(ProfiledType::named(&code));
                        matched = true;
                    }
                }
            }
            if matched {
                return true;
            }
        }

        match self.inherited(t) {
            Some(base) => self.members_named(&base, name, out, depth + 1),
            None => false,
        }
    }

    /// Adds the types of all members of `t` to `out`.
    fn all_members(&mut self, t: &ProfiledType, out: &mut TypeDetails, depth: usize) {
        if t.is_system() || depth > MAX_INHERITANCE_DEPTH {
            return;
        }
        let (owner, parent) = t.member_scope();
        for elements in self.sources(owner) {
            let mut matched = false;
            for ed in elements {
                if matches!(split_path(&ed.path), Some((p, _)) if p == parent) {
                    self.contribute(ed, elements, out);
                    matched = true;
                }
            }
            if matched {
                break;
            }
        }
        if let Some(base) = self.inherited(t) {
            self.all_members(&base, out, depth + 1);
        }
    }

    fn navigate(&mut self, input: &TypeDetails, name: &str) -> TypeDetails {
        let mut out = TypeDetails {
            collection: input.collection,
            types: vec![],
        };
        for t in &input.types {
            self.members_named(t, name, &mut out, 0);
        }
        out
    }

    fn check_member(&mut self, name: &str, input: &TypeDetails) -> TypeDetails {
        // `Patient.name` on a Patient focus: the leading type name filters.
        if name.starts_with(|c: char| c.is_ascii_uppercase()) {
            if input.has_type(name) {
                return input.clone();
            }
            if self.resource.has_type(name) && self.start.has_type(name) {
                return self.resource.clone();
            }
        }
        self.navigate(input, name)
    }

    fn check_constant(&self, span: &Span, name: &str) -> Result<TypeDetails> {
        if let Some(t) = self.variables.get(name) {
            return Ok(t.clone());
        }
        Ok(match name {
            "resource" | "rootResource" => self.resource.clone(),
            "context" => self.start.clone(),
            "ucum" | "sct" | "loinc" => TypeDetails::system(SYSTEM_STRING),
            n if n.starts_with("vs-") || n.starts_with("ext-") || n.starts_with("cs-") => {
                TypeDetails::system(SYSTEM_STRING)
            }
            _ => bail!(span.error(&format!("unknown external constant %{name}"))),
        })
    }

    fn narrow(input: &TypeDetails, spec: &TypeSpecifier) -> TypeDetails {
        let namespace = spec.namespace.as_deref();
        let mut out = TypeDetails {
            collection: input.collection,
            types: input
                .types
                .iter()
                .filter(|t| t.matches_name(namespace, &spec.name))
                .cloned()
                .collect(),
        };
        if out.is_empty() {
            out.add(match namespace {
                Some("System") => ProfiledType::named(&format!("System.{}", spec.name)),
                _ => ProfiledType::named(&spec.name),
            });
        }
        out
    }

    fn check_expr(&mut self, expr: &Expr, input: &TypeDetails, env: &Env) -> Result<TypeDetails> {
        Ok(match expr {
            Expr::Empty(_) => TypeDetails::empty(),
            Expr::Bool(_) => TypeDetails::system(SYSTEM_BOOLEAN),
            Expr::String(_) => TypeDetails::system(SYSTEM_STRING),
            Expr::Number((_, kind)) => TypeDetails::system(match kind {
                NumberKind::Integer => SYSTEM_INTEGER,
                NumberKind::Long => SYSTEM_LONG,
                NumberKind::Decimal => SYSTEM_DECIMAL,
            }),
            Expr::Temporal((_, kind)) => TypeDetails::system(match kind {
                TemporalKind::Date => SYSTEM_DATE,
                TemporalKind::DateTime => SYSTEM_DATETIME,
                TemporalKind::Time => SYSTEM_TIME,
            }),
            Expr::Quantity { .. } => TypeDetails::system(SYSTEM_QUANTITY),

            Expr::This(_) => env.this.clone(),
            Expr::Index(_) => TypeDetails::system(SYSTEM_INTEGER),
            Expr::Total(_) => env.total.clone(),
            Expr::Constant((span, name)) => self.check_constant(span, name)?,

            Expr::Member {
                focus: None, name, ..
            } => self.check_member(&name.1, input),
            Expr::Member {
                focus: Some(focus),
                name,
                ..
            } => {
                let focus = self.check_expr(focus, input, env)?;
                self.navigate(&focus, &name.1)
            }

            Expr::Call {
                focus: None,
                name,
                params,
                ..
            } => self.check_call(name, params, input, env)?,
            Expr::Call {
                focus: Some(focus),
                name,
                params,
                ..
            } => {
                let focus = self.check_expr(focus, input, env)?;
                self.check_call(name, params, &focus, env)?
            }

            Expr::Indexer { focus, index, .. } => {
                let focus = self.check_expr(focus, input, env)?;
                self.check_expr(index, &env.this, env)?;
                focus.to_singleton()
            }

            Expr::UnaryExpr { expr, .. } => self.check_expr(expr, input, env)?.to_singleton(),

            Expr::ArithExpr { op, lhs, rhs, .. } => {
                let l = self.check_expr(lhs, input, env)?;
                let r = self.check_expr(rhs, input, env)?;
                match op {
                    ArithOp::Concat => TypeDetails::system(SYSTEM_STRING),
                    ArithOp::IntDiv => TypeDetails::system(SYSTEM_INTEGER),
                    ArithOp::Div if !l.has_type(SYSTEM_QUANTITY) && !l.has_type("Quantity") => {
                        TypeDetails::system(SYSTEM_DECIMAL)
                    }
                    _ if l.is_empty() => r.to_singleton(),
                    _ => l.to_singleton(),
                }
            }

            Expr::BoolExpr { lhs, rhs, .. }
            | Expr::LogicExpr { lhs, rhs, .. }
            | Expr::Membership { lhs, rhs, .. } => {
                self.check_expr(lhs, input, env)?;
                self.check_expr(rhs, input, env)?;
                TypeDetails::system(SYSTEM_BOOLEAN)
            }

            Expr::Union { lhs, rhs, .. } => {
                let l = self.check_expr(lhs, input, env)?;
                let r = self.check_expr(rhs, input, env)?;
                l.union(&r)
            }

            Expr::TypeExpr { op, expr, spec, .. } => {
                let t = self.check_expr(expr, input, env)?;
                match op {
                    TypeOp::Is => TypeDetails::system(SYSTEM_BOOLEAN),
                    TypeOp::As => Self::narrow(&t, spec),
                }
            }
        })
    }

    fn check_call(
        &mut self,
        name: &(Span, String),
        params: &[Ref<Expr>],
        input: &TypeDetails,
        env: &Env,
    ) -> Result<TypeDetails> {
        let (span, name) = (&name.0, name.1.as_str());
        let Some(spec) = functions::lookup(name) else {
            bail!(span.error(&format!("unknown function {name}")));
        };
        if !spec.accepts(params.len()) {
            bail!(span.error(&format!(
                "{name} expects between {} and {} arguments, found {}",
                spec.min_args,
                spec.max_args,
                params.len()
            )));
        }

        let item = input.to_singleton();
        // $total inside aggregate starts out as the init argument.
        let total = match (name, params.get(1)) {
            ("aggregate", Some(init)) => self.check_expr(init, &env.this, env)?,
            _ => env.total.clone(),
        };
        let item_env = Env {
            this: item.clone(),
            total,
        };

        let mut args = Vec::with_capacity(params.len());
        let mut specifiers = vec![];
        for (idx, param) in params.iter().enumerate() {
            match spec.param_kind(idx) {
                ParamKind::Expression => args.push(self.check_expr(param, &env.this, env)?),
                ParamKind::Criteria => args.push(self.check_expr(param, &item, &item_env)?),
                ParamKind::TypeSpecifier => match param.as_type_specifier() {
                    Some(s) => {
                        specifiers.push(s);
                        args.push(TypeDetails::empty());
                    }
                    None => bail!(param.span().error("expecting a type name")),
                },
            }
        }

        if name == "defineVariable" {
            if let Some(Expr::String((_, var))) = params.first().map(|p| p.as_ref()) {
                let t = args.get(1).cloned().unwrap_or_else(|| input.clone());
                self.variables.insert(var.clone(), t);
            }
        }

        let arg = |idx: u8| args.get(idx as usize).cloned().unwrap_or_default();
        Ok(match spec.returns {
            ReturnTemplate::Boolean => TypeDetails::system(SYSTEM_BOOLEAN),
            ReturnTemplate::Integer => TypeDetails::system(SYSTEM_INTEGER),
            ReturnTemplate::Decimal => TypeDetails::system(SYSTEM_DECIMAL),
            ReturnTemplate::String => TypeDetails::system(SYSTEM_STRING),
            ReturnTemplate::Date => TypeDetails::system(SYSTEM_DATE),
            ReturnTemplate::DateTime => TypeDetails::system(SYSTEM_DATETIME),
            ReturnTemplate::Time => TypeDetails::system(SYSTEM_TIME),
            ReturnTemplate::Quantity => TypeDetails::system(SYSTEM_QUANTITY),
            ReturnTemplate::Focus => input.clone(),
            ReturnTemplate::FocusSingleton => input.to_singleton(),
            ReturnTemplate::FocusUnionArgument(idx) => input.union(&arg(idx)),
            ReturnTemplate::Argument(idx) => arg(idx),
            ReturnTemplate::Projection(idx) => {
                let mut t = arg(idx);
                t.collection = true;
                t
            }
            ReturnTemplate::Repeat => self.check_repeat(&params[0], arg(0), &item_env)?,
            ReturnTemplate::Iif => {
                let mut t = arg(1);
                t.merge(&arg(2));
                t
            }
            ReturnTemplate::OfType => match specifiers.first() {
                Some(s) => Self::narrow(input, s),
                None => TypeDetails::empty(),
            },
            ReturnTemplate::Children => {
                let mut out = TypeDetails {
                    collection: true,
                    types: vec![],
                };
                for t in &input.types {
                    self.all_members(t, &mut out, 0);
                }
                out
            }
            ReturnTemplate::Descendants => self.descendants(input),
            ReturnTemplate::Extension => TypeDetails {
                collection: true,
                types: vec![ProfiledType::named("Extension")],
            },
            ReturnTemplate::Resource => TypeDetails {
                collection: input.collection,
                types: vec![ProfiledType::named("Resource")],
            },
            ReturnTemplate::ElementDefinition => {
                TypeDetails::singleton(ProfiledType::named("ElementDefinition"))
            }
            ReturnTemplate::Value => {
                let mut out = TypeDetails {
                    collection: input.collection,
                    types: vec![],
                };
                for t in &input.types {
                    if t.is_system() {
                        out.add(t.clone());
                    } else if let Some(s) = system_type_for(&t.code) {
                        out.add(ProfiledType::named(s));
                    }
                }
                out
            }
            ReturnTemplate::Unknown => TypeDetails::empty(),
        })
    }

    // Applies the projection repeatedly until no new types turn up.
    fn check_repeat(
        &mut self,
        projection: &Expr,
        first: TypeDetails,
        env: &Env,
    ) -> Result<TypeDetails> {
        let mut result = first.clone();
        let mut frontier = first;
        for _ in 0..MAX_REPEAT_ROUNDS {
            let item = frontier.to_singleton();
            let round_env = Env {
                this: item.clone(),
                total: env.total.clone(),
            };
            let next = self.check_expr(projection, &item, &round_env)?;
            let before = result.types.len();
            result.merge(&next);
            if result.types.len() == before {
                break;
            }
            frontier = next;
        }
        result.collection = true;
        Ok(result)
    }

    fn descendants(&mut self, input: &TypeDetails) -> TypeDetails {
        let mut out = TypeDetails {
            collection: true,
            types: vec![],
        };
        let mut seen = BTreeSet::new();
        let mut pending = input.types.clone();
        while let Some(t) = pending.pop() {
            if seen.len() >= MAX_DESCENDANT_TYPES || !seen.insert(t.clone()) {
                continue;
            }
            let mut children = TypeDetails::empty();
            self.all_members(&t, &mut children, 0);
            for c in children.types {
                if !seen.contains(&c) {
                    pending.push(c.clone());
                }
                out.add(c);
            }
        }
        out
    }
}
