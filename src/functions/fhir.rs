// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use crate::functions::ParamKind::*;
use crate::functions::ReturnTemplate::*;
use crate::functions::{FunctionSpec, FunctionTable};

pub fn register(m: &mut FunctionTable) {
    m.insert("extension", FunctionSpec::new(1, 1, Extension));
    m.insert("getValue", FunctionSpec::new(0, 0, Value));
    m.insert("resolve", FunctionSpec::new(0, 0, Resource));
    m.insert("memberOf", FunctionSpec::new(1, 1, Boolean));
    m.insert("subsumes", FunctionSpec::new(1, 1, Boolean));
    m.insert("subsumedBy", FunctionSpec::new(1, 1, Boolean));
    m.insert("conformsTo", FunctionSpec::new(1, 1, Boolean));
    m.insert("htmlChecks", FunctionSpec::new(0, 0, Boolean));
    m.insert("htmlChecks1", FunctionSpec::new(0, 0, Boolean));
    m.insert("htmlChecks2", FunctionSpec::new(0, 0, Boolean));
    m.insert("hasTemplateIdOf", FunctionSpec::new(1, 1, Boolean));
    m.insert("elementDefinition", FunctionSpec::new(0, 0, ElementDefinition));
    m.insert("slice", FunctionSpec::new(2, 2, Focus));
    m.insert("checkModifiers", FunctionSpec::new(1, 1, Focus));
    m.insert("getReferenceKey", FunctionSpec::with_params(0, 1, &[TypeSpecifier], String));
    m.insert("getResourceKey", FunctionSpec::new(0, 0, String));
    m.insert("hasCodedValue", FunctionSpec::new(0, 0, Boolean));
    m.insert("isValidUri", FunctionSpec::new(0, 0, Boolean));
}
