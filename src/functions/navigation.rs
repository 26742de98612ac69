// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use crate::functions::ParamKind::*;
use crate::functions::ReturnTemplate::*;
use crate::functions::{FunctionSpec, FunctionTable};

pub fn register(m: &mut FunctionTable) {
    // Filtering and projection
    m.insert("where", FunctionSpec::with_params(1, 1, &[Criteria], Focus));
    m.insert("select", FunctionSpec::with_params(1, 1, &[Criteria], Projection(0)));
    m.insert("repeat", FunctionSpec::with_params(1, 1, &[Criteria], Repeat));
    m.insert("ofType", FunctionSpec::with_params(1, 1, &[TypeSpecifier], OfType));

    // Subsetting
    m.insert("single", FunctionSpec::new(0, 0, FocusSingleton));
    m.insert("first", FunctionSpec::new(0, 0, FocusSingleton));
    m.insert("last", FunctionSpec::new(0, 0, FocusSingleton));
    m.insert("tail", FunctionSpec::new(0, 0, Focus));
    m.insert("skip", FunctionSpec::new(1, 1, Focus));
    m.insert("take", FunctionSpec::new(1, 1, Focus));
    m.insert("intersect", FunctionSpec::new(1, 1, Focus));
    m.insert("exclude", FunctionSpec::new(1, 1, Focus));

    // Combining
    m.insert("union", FunctionSpec::new(1, 1, FocusUnionArgument(0)));
    m.insert("combine", FunctionSpec::new(1, 1, FocusUnionArgument(0)));

    // Tree navigation
    m.insert("children", FunctionSpec::new(0, 0, Children));
    m.insert("descendants", FunctionSpec::new(0, 0, Descendants));

    // Utility
    m.insert("iif", FunctionSpec::with_params(2, 3, &[Criteria, Expression, Expression], Iif));
    m.insert("trace", FunctionSpec::with_params(1, 2, &[Expression, Criteria], Focus));
    m.insert("now", FunctionSpec::new(0, 0, DateTime));
    m.insert("timeOfDay", FunctionSpec::new(0, 0, Time));
    m.insert("today", FunctionSpec::new(0, 0, Date));
    m.insert("defineVariable", FunctionSpec::with_params(1, 2, &[Expression, Criteria], Focus));
    m.insert("sort", FunctionSpec::with_params(0, 3, &[Criteria, Criteria, Criteria], Focus));
}
