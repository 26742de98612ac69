// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use crate::functions::ParamKind::*;
use crate::functions::ReturnTemplate::*;
use crate::functions::{FunctionSpec, FunctionTable};

pub fn register(m: &mut FunctionTable) {
    m.insert("empty", FunctionSpec::new(0, 0, Boolean));
    m.insert("exists", FunctionSpec::with_params(0, 1, &[Criteria], Boolean));
    m.insert("all", FunctionSpec::with_params(1, 1, &[Criteria], Boolean));
    m.insert("allTrue", FunctionSpec::new(0, 0, Boolean));
    m.insert("anyTrue", FunctionSpec::new(0, 0, Boolean));
    m.insert("allFalse", FunctionSpec::new(0, 0, Boolean));
    m.insert("anyFalse", FunctionSpec::new(0, 0, Boolean));
    m.insert("subsetOf", FunctionSpec::new(1, 1, Boolean));
    m.insert("supersetOf", FunctionSpec::new(1, 1, Boolean));
    m.insert("count", FunctionSpec::new(0, 0, Integer));
    m.insert("distinct", FunctionSpec::new(0, 0, Focus));
    m.insert("isDistinct", FunctionSpec::new(0, 0, Boolean));
    m.insert("not", FunctionSpec::new(0, 0, Boolean));
    m.insert("hasValue", FunctionSpec::new(0, 0, Boolean));

    // Aggregates
    m.insert("aggregate", FunctionSpec::with_params(1, 2, &[Criteria, Expression], Projection(0)));
    m.insert("sum", FunctionSpec::new(0, 0, FocusSingleton));
    m.insert("min", FunctionSpec::new(0, 0, FocusSingleton));
    m.insert("max", FunctionSpec::new(0, 0, FocusSingleton));
    m.insert("avg", FunctionSpec::new(0, 0, Decimal));
}
