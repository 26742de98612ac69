// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! In-memory view of a StructureDefinition.
//!
//! Only the parts needed for dependency inference are modelled. The model
//! deserializes directly from FHIR JSON; XML documents are converted by
//! [`crate::document`]. Everything else in a document is left alone and
//! survives re-serialization untouched.

use crate::document::DocumentError;
use crate::typing::split_path;

use std::collections::HashMap;

use serde::Deserialize;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DerivationKind {
    /// Introduces a new type. Definitions without a `derivation` element,
    /// such as `Element` or `Base`, are specializations too.
    #[default]
    Specialization,
    /// Profiles an existing type.
    Constraint,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypeRef {
    pub code: String,
    #[serde(default)]
    pub profile: Vec<String>,
    #[serde(default)]
    pub target_profile: Vec<String>,
}

impl TypeRef {
    pub fn new(code: &str) -> Self {
        Self {
            code: code.to_string(),
            ..Self::default()
        }
    }
}

/// An invariant attached to an element.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Constraint {
    #[serde(default)]
    pub key: String,
    #[serde(default)]
    pub expression: Option<String>,
    #[serde(default)]
    pub severity: Option<String>,
    #[serde(default)]
    pub human: Option<String>,
}

impl Constraint {
    pub fn new(key: &str, expression: &str) -> Self {
        Self {
            key: key.to_string(),
            expression: Some(expression.to_string()),
            ..Self::default()
        }
    }

    pub fn has_expression(&self) -> bool {
        matches!(&self.expression, Some(e) if !e.is_empty())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElementDefinition {
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub slice_name: Option<String>,
    #[serde(default)]
    pub min: Option<u32>,
    #[serde(default)]
    pub max: Option<String>,
    #[serde(default, rename = "type")]
    pub types: Vec<TypeRef>,
    #[serde(default)]
    pub content_reference: Option<String>,
    /// Keys of constraints, declared elsewhere, whose outcome depends on this
    /// element.
    #[serde(default, rename = "condition")]
    pub conditions: Vec<String>,
    #[serde(default, rename = "constraint")]
    pub constraints: Vec<Constraint>,
}

impl ElementDefinition {
    pub fn new(path: &str) -> Self {
        Self {
            path: path.to_string(),
            ..Self::default()
        }
    }

    pub fn with_type(mut self, code: &str) -> Self {
        self.types.push(TypeRef::new(code));
        self
    }

    pub fn with_max(mut self, max: &str) -> Self {
        self.max = Some(max.to_string());
        self
    }

    pub fn with_content_reference(mut self, reference: &str) -> Self {
        self.content_reference = Some(reference.to_string());
        self
    }

    pub fn with_constraint(mut self, key: &str, expression: &str) -> Self {
        self.constraints.push(Constraint::new(key, expression));
        self
    }

    pub fn with_condition(mut self, key: &str) -> Self {
        self.conditions.push(key.to_string());
        self
    }

    /// Last segment of the path, e.g. `value[x]` for `Observation.value[x]`.
    pub fn name(&self) -> &str {
        match split_path(&self.path) {
            Some((_, name)) => name,
            None => &self.path,
        }
    }

    pub fn is_collection(&self) -> bool {
        matches!(self.max.as_deref(), Some(max) if max != "0" && max != "1")
    }

    /// Path targeted by `contentReference`, without the leading `#` or the
    /// canonical URL in front of it.
    pub fn content_reference_path(&self) -> Option<&str> {
        let reference = self.content_reference.as_deref()?;
        Some(match reference.rsplit_once('#') {
            Some((_, path)) => path,
            None => reference,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ElementList {
    #[serde(default)]
    pub element: Vec<ElementDefinition>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StructureDefinition {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub kind: Option<String>,
    #[serde(default, rename = "abstract")]
    pub is_abstract: bool,
    #[serde(rename = "type")]
    pub type_name: String,
    #[serde(default)]
    pub derivation: DerivationKind,
    #[serde(default)]
    pub base_definition: Option<String>,
    #[serde(default)]
    pub snapshot: ElementList,
    #[serde(default)]
    pub differential: ElementList,
}

impl StructureDefinition {
    pub fn new(type_name: &str, derivation: DerivationKind) -> Self {
        Self {
            type_name: type_name.to_string(),
            derivation,
            ..Self::default()
        }
    }

    /// Adds an element to the differential.
    pub fn with_element(mut self, element: ElementDefinition) -> Self {
        self.differential.element.push(element);
        self
    }

    pub fn with_base(mut self, base_type: &str) -> Self {
        self.base_definition = Some(format!(
            "http://hl7.org/fhir/StructureDefinition/{base_type}"
        ));
        self
    }

    /// The most complete element list available: the snapshot when present,
    /// the differential otherwise.
    pub fn elements(&self) -> &[ElementDefinition] {
        if self.snapshot.element.is_empty() {
            &self.differential.element
        } else {
            &self.snapshot.element
        }
    }

    /// Type this definition derives from, taken from the tail of
    /// `baseDefinition`.
    pub fn base_type(&self) -> Option<&str> {
        let base = self.base_definition.as_deref()?;
        let name = match base.rsplit_once('/') {
            Some((_, name)) => name,
            None => base,
        };
        match name.split_once('|') {
            Some((name, _)) => Some(name),
            None => Some(name),
        }
    }

    /// Maps each differential element path to its index. When paths repeat
    /// (slices) the last element wins.
    pub fn path_lookup(&self) -> HashMap<String, usize> {
        self.differential
            .element
            .iter()
            .enumerate()
            .map(|(idx, e)| (e.path.clone(), idx))
            .collect()
    }

    pub fn differential_element(&self, path: &str) -> Option<&ElementDefinition> {
        self.differential.element.iter().find(|e| e.path == path)
    }

    pub fn validate(&self) -> Result<(), DocumentError> {
        if self.type_name.is_empty() {
            return Err(DocumentError::Malformed(
                "StructureDefinition has no type".to_string(),
            ));
        }
        let elements = self.snapshot.element.iter().chain(&self.differential.element);
        for (idx, e) in elements.enumerate() {
            if e.path.is_empty() {
                return Err(DocumentError::Malformed(format!(
                    "element {idx} of {} has no path",
                    self.type_name
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_from_fhir_json() {
        let sd: StructureDefinition = serde_json::from_str(
            r#"{
              "resourceType": "StructureDefinition",
              "url": "http://hl7.org/fhir/StructureDefinition/Patient",
              "type": "Patient",
              "baseDefinition": "http://hl7.org/fhir/StructureDefinition/DomainResource",
              "derivation": "specialization",
              "differential": {
                "element": [
                  { "path": "Patient" },
                  { "path": "Patient.name", "max": "*", "type": [{ "code": "HumanName" }],
                    "condition": ["pat-1"] },
                  { "path": "Patient.contact", "type": [{ "code": "BackboneElement" }],
                    "constraint": [{ "key": "pat-1", "severity": "error",
                                     "expression": "name.exists()" }] }
                ]
              }
            }"#,
        )
        .unwrap();

        assert_eq!(sd.type_name, "Patient");
        assert_eq!(sd.derivation, DerivationKind::Specialization);
        assert_eq!(sd.base_type(), Some("DomainResource"));
        assert_eq!(sd.differential.element.len(), 3);
        assert!(sd.differential.element[1].is_collection());
        assert_eq!(sd.differential.element[1].conditions, vec!["pat-1"]);
        assert!(sd.differential.element[2].constraints[0].has_expression());
        assert_eq!(sd.elements().len(), 3);
    }

    #[test]
    fn missing_derivation_is_specialization() {
        let sd: StructureDefinition = serde_json::from_str(r#"{"type": "Element"}"#).unwrap();
        assert_eq!(sd.derivation, DerivationKind::Specialization);
        let sd: StructureDefinition =
            serde_json::from_str(r#"{"type": "Patient", "derivation": "constraint"}"#).unwrap();
        assert_eq!(sd.derivation, DerivationKind::Constraint);
    }

    #[test]
    fn path_lookup_last_duplicate_wins() {
        let sd = StructureDefinition::new("Observation", DerivationKind::Specialization)
            .with_element(ElementDefinition::new("Observation"))
            .with_element(ElementDefinition::new("Observation.code"))
            .with_element(ElementDefinition::new("Observation.code"));
        let lookup = sd.path_lookup();
        assert_eq!(lookup.len(), 2);
        assert_eq!(lookup["Observation.code"], 2);
    }

    #[test]
    fn content_reference_path() {
        let e = ElementDefinition::new("Questionnaire.item.item").with_content_reference(
            "http://hl7.org/fhir/StructureDefinition/Questionnaire#Questionnaire.item",
        );
        assert_eq!(e.content_reference_path(), Some("Questionnaire.item"));
        let e = ElementDefinition::new("Questionnaire.item.item")
            .with_content_reference("#Questionnaire.item");
        assert_eq!(e.content_reference_path(), Some("Questionnaire.item"));
    }

    #[test]
    fn empty_path_is_rejected() {
        let sd = StructureDefinition::new("Patient", DerivationKind::Specialization)
            .with_element(ElementDefinition::new(""));
        assert!(sd.validate().is_err());
    }

    #[test]
    fn expression_presence() {
        assert!(!Constraint {
            key: "x".into(),
            ..Constraint::default()
        }
        .has_expression());
        assert!(!Constraint::new("x", "").has_expression());
    }
}
