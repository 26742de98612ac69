// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::Result;
use sdconditions::*;
use serde::Deserialize;

pub const TYPES_FIXTURE: &str = "tests/fixtures/types.yaml";

#[derive(Deserialize, Debug, Clone)]
pub struct ConstraintDef {
    pub key: String,
    pub expression: String,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct ElementDef {
    pub path: String,
    #[serde(default)]
    pub types: Vec<String>,
    #[serde(default)]
    pub max: Option<String>,
    #[serde(default)]
    pub content_reference: Option<String>,
    #[serde(default)]
    pub constraints: Vec<ConstraintDef>,
    #[serde(default)]
    pub conditions: Vec<String>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct TypeDef {
    #[serde(rename = "type")]
    pub type_name: String,
    #[serde(default)]
    pub base: Option<String>,
    #[serde(default)]
    pub profile: bool,
    #[serde(default)]
    pub elements: Vec<ElementDef>,
}

impl TypeDef {
    pub fn to_definition(&self) -> StructureDefinition {
        let derivation = if self.profile {
            DerivationKind::Constraint
        } else {
            DerivationKind::Specialization
        };
        let mut sd = StructureDefinition::new(&self.type_name, derivation);
        if let Some(base) = &self.base {
            sd = sd.with_base(base);
        }
        for e in &self.elements {
            let mut element = ElementDefinition::new(&e.path);
            for t in &e.types {
                element = element.with_type(t);
            }
            if let Some(max) = &e.max {
                element = element.with_max(max);
            }
            if let Some(reference) = &e.content_reference {
                element = element.with_content_reference(reference);
            }
            for c in &e.constraints {
                element = element.with_constraint(&c.key, &c.expression);
            }
            for key in &e.conditions {
                element = element.with_condition(key);
            }
            sd = sd.with_element(element);
        }
        sd
    }
}

#[derive(Deserialize, Debug)]
struct Fixture {
    definitions: Vec<TypeDef>,
}

pub fn fixture_definitions() -> Result<Vec<StructureDefinition>> {
    let yaml = std::fs::read_to_string(TYPES_FIXTURE)?;
    let fixture: Fixture = serde_yaml::from_str(&yaml)?;
    Ok(fixture.definitions.iter().map(|d| d.to_definition()).collect())
}

/// Builds a context from `extra` followed by the shared fixture. Definitions
/// in `extra` win over fixture types of the same name.
pub fn context_with(extra: &[StructureDefinition]) -> Result<Arc<TypeContext>> {
    let mut definitions = extra.to_vec();
    definitions.extend(fixture_definitions()?);
    Ok(Arc::new(TypeContext::from_definitions(definitions)))
}

pub fn analyzer_with(extra: &[StructureDefinition]) -> Result<Analyzer> {
    Ok(Analyzer::new(context_with(extra)?)?)
}

pub fn conditions_by_path(sd: &StructureDefinition) -> BTreeMap<String, Vec<String>> {
    sd.differential
        .element
        .iter()
        .filter(|e| !e.conditions.is_empty())
        .map(|e| (e.path.clone(), e.conditions.clone()))
        .collect()
}
