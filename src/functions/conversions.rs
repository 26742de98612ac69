// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use crate::functions::ParamKind::*;
use crate::functions::ReturnTemplate::*;
use crate::functions::{FunctionSpec, FunctionTable};

pub fn register(m: &mut FunctionTable) {
    m.insert("toBoolean", FunctionSpec::new(0, 0, Boolean));
    m.insert("convertsToBoolean", FunctionSpec::new(0, 0, Boolean));
    m.insert("toInteger", FunctionSpec::new(0, 0, Integer));
    m.insert("convertsToInteger", FunctionSpec::new(0, 0, Boolean));
    m.insert("toLong", FunctionSpec::new(0, 0, Integer));
    m.insert("convertsToLong", FunctionSpec::new(0, 0, Boolean));
    m.insert("toDecimal", FunctionSpec::new(0, 0, Decimal));
    m.insert("convertsToDecimal", FunctionSpec::new(0, 0, Boolean));
    m.insert("toString", FunctionSpec::new(0, 0, String));
    m.insert("convertsToString", FunctionSpec::new(0, 0, Boolean));
    m.insert("toDate", FunctionSpec::new(0, 0, Date));
    m.insert("convertsToDate", FunctionSpec::new(0, 0, Boolean));
    m.insert("toDateTime", FunctionSpec::new(0, 0, DateTime));
    m.insert("convertsToDateTime", FunctionSpec::new(0, 0, Boolean));
    m.insert("toTime", FunctionSpec::new(0, 0, Time));
    m.insert("convertsToTime", FunctionSpec::new(0, 0, Boolean));
    m.insert("toQuantity", FunctionSpec::new(0, 1, Quantity));
    m.insert("convertsToQuantity", FunctionSpec::new(0, 1, Boolean));

    // Types
    m.insert("is", FunctionSpec::with_params(1, 1, &[TypeSpecifier], Boolean));
    m.insert("as", FunctionSpec::with_params(1, 1, &[TypeSpecifier], OfType));
    m.insert("type", FunctionSpec::new(0, 0, Unknown));

    // Temporal precision
    m.insert("lowBoundary", FunctionSpec::new(0, 1, FocusSingleton));
    m.insert("highBoundary", FunctionSpec::new(0, 1, FocusSingleton));
    m.insert("precision", FunctionSpec::new(0, 0, Integer));
    m.insert("comparable", FunctionSpec::new(1, 1, Boolean));
    m.insert("yearOf", FunctionSpec::new(0, 0, Integer));
    m.insert("monthOf", FunctionSpec::new(0, 0, Integer));
    m.insert("dayOf", FunctionSpec::new(0, 0, Integer));
    m.insert("hourOf", FunctionSpec::new(0, 0, Integer));
    m.insert("minuteOf", FunctionSpec::new(0, 0, Integer));
    m.insert("secondOf", FunctionSpec::new(0, 0, Integer));
    m.insert("millisecondOf", FunctionSpec::new(0, 0, Integer));
}
