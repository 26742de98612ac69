// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Small type hierarchy shared by the unit tests.

use crate::*;

use std::sync::Arc;

fn specialization(
    type_name: &str,
    base: Option<&str>,
    elements: Vec<ElementDefinition>,
) -> StructureDefinition {
    let mut sd = StructureDefinition::new(type_name, DerivationKind::Specialization);
    if let Some(base) = base {
        sd = sd.with_base(base);
    }
    sd = sd.with_element(ElementDefinition::new(type_name));
    for e in elements {
        sd = sd.with_element(e);
    }
    sd
}

fn el(path: &str, code: &str) -> ElementDefinition {
    ElementDefinition::new(path).with_type(code)
}

fn many(path: &str, code: &str) -> ElementDefinition {
    el(path, code).with_max("*")
}

pub fn base_types() -> Vec<StructureDefinition> {
    vec![
        specialization("Element", None, vec![many("Element.extension", "Extension")]),
        specialization(
            "BackboneElement",
            Some("Element"),
            vec![many("BackboneElement.modifierExtension", "Extension")],
        ),
        specialization("Resource", None, vec![el("Resource.id", "id")]),
        specialization(
            "DomainResource",
            Some("Resource"),
            vec![el("DomainResource.text", "Narrative")],
        ),
        specialization("Narrative", Some("Element"), vec![el("Narrative.div", "xhtml")]),
        specialization("Extension", Some("Element"), vec![el("Extension.url", "uri")]),
        specialization("string", Some("Element"), vec![]),
        specialization("boolean", Some("Element"), vec![]),
        specialization("uri", Some("Element"), vec![]),
        specialization("id", Some("string"), vec![]),
        specialization(
            "HumanName",
            Some("Element"),
            vec![el("HumanName.family", "string"), many("HumanName.given", "string")],
        ),
        specialization(
            "Identifier",
            Some("Element"),
            vec![el("Identifier.system", "uri"), el("Identifier.value", "string")],
        ),
        patient(),
    ]
}

pub fn patient() -> StructureDefinition {
    specialization(
        "Patient",
        Some("DomainResource"),
        vec![
            many("Patient.identifier", "Identifier"),
            el("Patient.active", "boolean"),
            many("Patient.name", "HumanName"),
            many("Patient.contact", "BackboneElement"),
            el("Patient.contact.name", "HumanName"),
        ],
    )
}

pub fn analyzer() -> Analyzer {
    match Analyzer::new(Arc::new(TypeContext::from_definitions(base_types()))) {
        Ok(a) => a,
        Err(e) => panic!("{e}"),
    }
}

pub fn rewriter() -> ConditionRewriter {
    ConditionRewriter::new(analyzer())
}

pub fn conditions_of<'a>(sd: &'a StructureDefinition, path: &str) -> &'a [String] {
    sd.differential_element(path)
        .map(|e| e.conditions.as_slice())
        .unwrap_or_default()
}
