// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Signatures of the FHIRPath functions known to the checker.
//!
//! The checker never evaluates a function. It only needs to know how many
//! arguments a function takes, in which scope each argument is checked, and
//! what the result looks like in terms of the input and argument types.

pub mod conversions;
pub mod existence;
pub mod fhir;
pub mod navigation;
pub mod strings;

use std::collections::HashMap;

use lazy_static::lazy_static;

/// How an argument is checked.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ParamKind {
    /// Checked against the enclosing `$this`.
    Expression,
    /// Checked once per input item, with the item as `$this`.
    Criteria,
    /// A type name, not an expression.
    TypeSpecifier,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReturnTemplate {
    Boolean,
    Integer,
    Decimal,
    String,
    Date,
    DateTime,
    Time,
    Quantity,
    /// Same types and cardinality as the input.
    Focus,
    /// Same types as the input, at most one item.
    FocusSingleton,
    /// Input merged with the given argument.
    FocusUnionArgument(u8),
    /// Type of the given argument.
    Argument(u8),
    /// Type of the given criteria argument, as a collection.
    Projection(u8),
    /// Fixed point of the first criteria argument applied to the input.
    Repeat,
    /// Union of the two result branches of `iif`.
    Iif,
    /// Input narrowed to the type specifier argument.
    OfType,
    Children,
    Descendants,
    Extension,
    Resource,
    ElementDefinition,
    /// System type of a FHIR primitive's value.
    Value,
    Unknown,
}

#[derive(Clone, Debug)]
pub struct FunctionSpec {
    pub min_args: u8,
    pub max_args: u8,
    pub params: &'static [ParamKind],
    pub returns: ReturnTemplate,
}

impl FunctionSpec {
    pub const fn new(min_args: u8, max_args: u8, returns: ReturnTemplate) -> Self {
        Self {
            min_args,
            max_args,
            params: &[],
            returns,
        }
    }

    pub const fn with_params(
        min_args: u8,
        max_args: u8,
        params: &'static [ParamKind],
        returns: ReturnTemplate,
    ) -> Self {
        Self {
            min_args,
            max_args,
            params,
            returns,
        }
    }

    pub fn param_kind(&self, idx: usize) -> ParamKind {
        self.params
            .get(idx)
            .copied()
            .unwrap_or(ParamKind::Expression)
    }

    pub fn accepts(&self, n_args: usize) -> bool {
        (self.min_args as usize..=self.max_args as usize).contains(&n_args)
    }
}

pub type FunctionTable = HashMap<&'static str, FunctionSpec>;

#[rustfmt::skip]
lazy_static! {
    pub static ref FUNCTIONS: FunctionTable = {
	let mut m: FunctionTable = HashMap::new();

	existence::register(&mut m);
	navigation::register(&mut m);
	conversions::register(&mut m);
	strings::register(&mut m);
	fhir::register(&mut m);

	m
    };
}

pub fn lookup(name: &str) -> Option<&'static FunctionSpec> {
    FUNCTIONS.get(name)
}
