// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use crate::functions::ReturnTemplate::*;
use crate::functions::{FunctionSpec, FunctionTable};

pub fn register(m: &mut FunctionTable) {
    m.insert("indexOf", FunctionSpec::new(1, 1, Integer));
    m.insert("lastIndexOf", FunctionSpec::new(1, 1, Integer));
    m.insert("substring", FunctionSpec::new(1, 2, String));
    m.insert("startsWith", FunctionSpec::new(1, 1, Boolean));
    m.insert("endsWith", FunctionSpec::new(1, 1, Boolean));
    m.insert("contains", FunctionSpec::new(1, 1, Boolean));
    m.insert("upper", FunctionSpec::new(0, 0, String));
    m.insert("lower", FunctionSpec::new(0, 0, String));
    m.insert("replace", FunctionSpec::new(2, 2, String));
    m.insert("matches", FunctionSpec::new(1, 2, Boolean));
    m.insert("matchesFull", FunctionSpec::new(1, 2, Boolean));
    m.insert("replaceMatches", FunctionSpec::new(2, 3, String));
    m.insert("length", FunctionSpec::new(0, 0, Integer));
    m.insert("toChars", FunctionSpec::new(0, 0, String));
    m.insert("trim", FunctionSpec::new(0, 0, String));
    m.insert("split", FunctionSpec::new(1, 1, String));
    m.insert("join", FunctionSpec::new(0, 1, String));
    m.insert("encode", FunctionSpec::new(1, 1, String));
    m.insert("decode", FunctionSpec::new(1, 1, String));
    m.insert("escape", FunctionSpec::new(1, 1, String));
    m.insert("unescape", FunctionSpec::new(1, 1, String));

    // Math
    m.insert("abs", FunctionSpec::new(0, 0, FocusSingleton));
    m.insert("ceiling", FunctionSpec::new(0, 0, Integer));
    m.insert("exp", FunctionSpec::new(0, 0, Decimal));
    m.insert("floor", FunctionSpec::new(0, 0, Integer));
    m.insert("ln", FunctionSpec::new(0, 0, Decimal));
    m.insert("log", FunctionSpec::new(1, 1, Decimal));
    m.insert("power", FunctionSpec::new(1, 1, FocusSingleton));
    m.insert("round", FunctionSpec::new(0, 1, Decimal));
    m.insert("sqrt", FunctionSpec::new(0, 0, Decimal));
    m.insert("truncate", FunctionSpec::new(0, 0, Integer));
}
