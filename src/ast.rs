// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use crate::lexer::*;

use core::{cmp, fmt, ops::Deref};
use std::rc::Rc;

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum ArithOp {
    Add,
    Sub,
    Mul,
    Div,
    IntDiv,
    Mod,
    Concat,
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum BoolOp {
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
    Equiv,
    NotEquiv,
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum LogicOp {
    And,
    Or,
    Xor,
    Implies,
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum MembershipOp {
    In,
    Contains,
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum TypeOp {
    Is,
    As,
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum UnaryOp {
    Plus,
    Minus,
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum NumberKind {
    Integer,
    Long,
    Decimal,
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum TemporalKind {
    Date,
    DateTime,
    Time,
}

pub struct NodeRef<T> {
    r: Rc<T>,
}

impl<T> Clone for NodeRef<T> {
    fn clone(&self) -> Self {
        Self { r: self.r.clone() }
    }
}

impl<T: fmt::Debug> fmt::Debug for NodeRef<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.r.as_ref().fmt(f)
    }
}

impl<T> cmp::PartialEq for NodeRef<T> {
    fn eq(&self, other: &Self) -> bool {
        Rc::as_ptr(&self.r).eq(&Rc::as_ptr(&other.r))
    }
}

impl<T> cmp::Eq for NodeRef<T> {}

impl<T> Deref for NodeRef<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.r
    }
}

impl<T> AsRef<T> for NodeRef<T> {
    fn as_ref(&self) -> &T {
        self.deref()
    }
}

impl<T> NodeRef<T> {
    pub fn new(t: T) -> Self {
        Self { r: Rc::new(t) }
    }
}

pub type Ref<T> = NodeRef<T>;

/// A possibly qualified type name such as `Quantity`, `FHIR.Quantity` or
/// `System.String`.
#[derive(Debug, Clone)]
pub struct TypeSpecifier {
    pub span: Span,
    pub namespace: Option<String>,
    pub name: String,
}

#[derive(Debug)]
pub enum Expr {
    // `{}`
    Empty(Span),
    Bool((Span, bool)),
    String((Span, String)),
    Number((Span, NumberKind)),
    Temporal((Span, TemporalKind)),

    Quantity {
        span: Span,
        value: Span,
        unit: (Span, String),
    },

    This(Span),
    Index(Span),
    Total(Span),

    // %resource, %`vs-name` etc.
    Constant((Span, String)),

    // Member navigation. A member without focus starts a path and is
    // resolved against the current input collection.
    Member {
        span: Span,
        focus: Option<Ref<Expr>>,
        name: (Span, String),
    },

    Call {
        span: Span,
        focus: Option<Ref<Expr>>,
        name: (Span, String),
        params: Vec<Ref<Expr>>,
    },

    Indexer {
        span: Span,
        focus: Ref<Expr>,
        index: Ref<Expr>,
    },

    UnaryExpr {
        span: Span,
        op: UnaryOp,
        expr: Ref<Expr>,
    },

    // Infix expressions
    ArithExpr {
        span: Span,
        op: ArithOp,
        lhs: Ref<Expr>,
        rhs: Ref<Expr>,
    },

    BoolExpr {
        span: Span,
        op: BoolOp,
        lhs: Ref<Expr>,
        rhs: Ref<Expr>,
    },

    LogicExpr {
        span: Span,
        op: LogicOp,
        lhs: Ref<Expr>,
        rhs: Ref<Expr>,
    },

    Membership {
        span: Span,
        op: MembershipOp,
        lhs: Ref<Expr>,
        rhs: Ref<Expr>,
    },

    Union {
        span: Span,
        lhs: Ref<Expr>,
        rhs: Ref<Expr>,
    },

    TypeExpr {
        span: Span,
        op: TypeOp,
        expr: Ref<Expr>,
        spec: TypeSpecifier,
    },
}

impl Expr {
    pub fn span(&self) -> &Span {
        use Expr::*;
        match self {
            Empty(s) | This(s) | Index(s) | Total(s) => s,
            Bool((s, _)) | String((s, _)) | Number((s, _)) | Temporal((s, _)) => s,
            Constant((s, _)) => s,
            Quantity { span, .. }
            | Member { span, .. }
            | Call { span, .. }
            | Indexer { span, .. }
            | UnaryExpr { span, .. }
            | ArithExpr { span, .. }
            | BoolExpr { span, .. }
            | LogicExpr { span, .. }
            | Membership { span, .. }
            | Union { span, .. }
            | TypeExpr { span, .. } => span,
        }
    }

    /// Interprets an expression used as a function argument as a type
    /// specifier, e.g. the `Quantity` in `ofType(Quantity)` or the
    /// `FHIR.Quantity` in `as(FHIR.Quantity)`.
    pub fn as_type_specifier(&self) -> Option<TypeSpecifier> {
        match self {
            Expr::Member {
                span,
                focus: None,
                name,
            } => Some(TypeSpecifier {
                span: span.clone(),
                namespace: None,
                name: name.1.clone(),
            }),
            Expr::Member {
                span,
                focus: Some(focus),
                name,
            } => match focus.as_ref() {
                Expr::Member {
                    focus: None,
                    name: ns,
                    ..
                } => Some(TypeSpecifier {
                    span: span.clone(),
                    namespace: Some(ns.1.clone()),
                    name: name.1.clone(),
                }),
                _ => None,
            },
            _ => None,
        }
    }
}
