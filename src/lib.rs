// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

// Use README.md as crate documentation.
#![doc = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/README.md"))]

mod analyzer;
mod ast;
mod context;
mod definition;
mod document;
mod functions;
mod lexer;
mod parser;
mod rewriter;
mod scanner;
mod typing;
mod xml;

pub use analyzer::Analyzer;
pub use context::{ContextError, PackageCache, TypeContext, DEFAULT_PACKAGE};
pub use definition::{
    Constraint, DerivationKind, ElementDefinition, ElementList, StructureDefinition, TypeRef,
};
pub use document::{Document, DocumentError, Format};
pub use rewriter::{ConditionRewriter, URL_SAFETY_EXPRESSION, URL_SAFETY_KEY};
pub use scanner::{Outcome, ScanOptions, ScanSummary, Scanner};

/// Items in `unstable` are likely to change.
pub mod unstable {
    pub use crate::ast::*;
    pub use crate::functions::{lookup, FunctionSpec, ParamKind, ReturnTemplate};
    pub use crate::lexer::*;
    pub use crate::parser::*;
    pub use crate::typing::*;
    pub use crate::xml::{Element, Node, XmlDocument};
}

#[cfg(test)]
mod tests;
