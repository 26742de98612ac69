// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! FHIR resource documents on disk.
//!
//! A document keeps its full parsed form. The model is extracted from it with
//! [`Document::definition`] and the parts the rewriter may change (conditions
//! and constraint expressions of the differential) are written back with
//! [`Document::apply`]. Everything else is preserved as read.

use crate::definition::{
    Constraint, DerivationKind, ElementDefinition, ElementList, StructureDefinition, TypeRef,
};
use crate::xml::{Element, XmlDocument};

use std::fs;
use std::path::{Path, PathBuf};

use serde_json::{Map, Value};
use thiserror::Error;

const STRUCTURE_DEFINITION: &str = "StructureDefinition";

// ElementDefinition children that follow `condition`, in document order.
const AFTER_CONDITION: &[&str] = &[
    "constraint",
    "mustHaveValue",
    "valueAlternatives",
    "mustSupport",
    "isModifier",
    "isModifierReason",
    "isSummary",
    "binding",
    "mapping",
];

#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid xml: {0}")]
    Xml(String),
    #[error("malformed StructureDefinition: {0}")]
    Malformed(String),
    #[error("unsupported document format: {0}")]
    UnsupportedFormat(PathBuf),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Json,
    Xml,
}

impl Format {
    pub fn from_path(path: &Path) -> Option<Format> {
        match path.extension()?.to_str()? {
            "json" => Some(Format::Json),
            "xml" => Some(Format::Xml),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Document {
    Json(Value),
    Xml(XmlDocument),
}

impl Document {
    pub fn parse(format: Format, text: &str) -> Result<Self, DocumentError> {
        Ok(match format {
            Format::Json => Document::Json(serde_json::from_str(text)?),
            Format::Xml => Document::Xml(XmlDocument::parse(text)?),
        })
    }

    pub fn read(path: &Path) -> Result<Self, DocumentError> {
        let format =
            Format::from_path(path).ok_or_else(|| DocumentError::UnsupportedFormat(path.into()))?;
        let text = fs::read_to_string(path).map_err(|source| DocumentError::Io {
            path: path.into(),
            source,
        })?;
        Self::parse(format, &text)
    }

    pub fn resource_type(&self) -> Option<&str> {
        match self {
            Document::Json(v) => v.get("resourceType").and_then(|t| t.as_str()),
            Document::Xml(x) => Some(x.root.name.as_str()),
        }
    }

    /// The model view of this document, or None when it is some other kind
    /// of resource.
    pub fn definition(&self) -> Result<Option<StructureDefinition>, DocumentError> {
        if self.resource_type() != Some(STRUCTURE_DEFINITION) {
            return Ok(None);
        }
        let sd = match self {
            Document::Json(v) => serde_json::from_value(v.clone())?,
            Document::Xml(x) => xml_definition(&x.root)?,
        };
        sd.validate()?;
        Ok(Some(sd))
    }

    /// Writes the differential's conditions and constraint expressions from
    /// `sd` back into the document.
    pub fn apply(&mut self, sd: &StructureDefinition) -> Result<(), DocumentError> {
        match self {
            Document::Json(v) => json_apply(v, &sd.differential.element),
            Document::Xml(x) => xml_apply(&mut x.root, &sd.differential.element),
        }
    }

    pub fn to_string_pretty(&self) -> Result<String, DocumentError> {
        match self {
            Document::Json(v) => Ok(serde_json::to_string_pretty(v)?),
            Document::Xml(x) => x.to_xml_string(),
        }
    }

    pub fn write(&self, path: &Path) -> Result<(), DocumentError> {
        fs::write(path, self.to_string_pretty()?).map_err(|source| DocumentError::Io {
            path: path.into(),
            source,
        })
    }
}

fn mismatch(found: usize, expected: usize) -> DocumentError {
    DocumentError::Malformed(format!(
        "differential has {found} elements, expected {expected}"
    ))
}

fn json_apply(doc: &mut Value, elements: &[ElementDefinition]) -> Result<(), DocumentError> {
    let items = doc
        .get_mut("differential")
        .and_then(|d| d.get_mut("element"))
        .and_then(|e| e.as_array_mut());
    let items = match items {
        Some(items) => items,
        None if elements.is_empty() => return Ok(()),
        None => return Err(mismatch(0, elements.len())),
    };
    if items.len() != elements.len() {
        return Err(mismatch(items.len(), elements.len()));
    }

    for (item, element) in items.iter_mut().zip(elements) {
        let Some(obj) = item.as_object_mut() else {
            return Err(DocumentError::Malformed(format!(
                "element {} is not an object",
                element.path
            )));
        };
        json_set_conditions(obj, &element.conditions);

        if let Some(Value::Array(constraints)) = obj.get_mut("constraint") {
            for (c, constraint) in constraints.iter_mut().zip(&element.constraints) {
                let (Some(c), Some(expression)) = (c.as_object_mut(), &constraint.expression) else {
                    continue;
                };
                if c.get("expression").and_then(|e| e.as_str()) != Some(expression.as_str()) {
                    c.insert("expression".to_string(), Value::String(expression.clone()));
                }
            }
        }
    }
    Ok(())
}

// Rebuilds the object so `condition` lands at its canonical position. Any
// `_condition` extension array no longer lines up and is dropped.
fn json_set_conditions(obj: &mut Map<String, Value>, conditions: &[String]) {
    let current: Vec<&str> = match obj.get("condition") {
        Some(Value::Array(a)) => a.iter().filter_map(|v| v.as_str()).collect(),
        _ => vec![],
    };
    if current == conditions && !obj.contains_key("_condition") {
        return;
    }

    let mut pending = if conditions.is_empty() {
        None
    } else {
        Some(Value::Array(
            conditions.iter().map(|c| Value::String(c.clone())).collect(),
        ))
    };
    let old = std::mem::take(obj);
    for (key, value) in old {
        if key == "condition" || key == "_condition" {
            continue;
        }
        if AFTER_CONDITION.contains(&key.trim_start_matches('_')) {
            if let Some(conditions) = pending.take() {
                obj.insert("condition".to_string(), conditions);
            }
        }
        obj.insert(key, value);
    }
    if let Some(conditions) = pending {
        obj.insert("condition".to_string(), conditions);
    }
}

fn xml_definition(root: &Element) -> Result<StructureDefinition, DocumentError> {
    let type_name = root
        .value_of("type")
        .ok_or_else(|| DocumentError::Malformed("StructureDefinition has no type".to_string()))?;
    let elements = |name: &str| -> Result<ElementList, DocumentError> {
        Ok(ElementList {
            element: match root.child(name) {
                Some(list) => list
                    .children_named("element")
                    .map(xml_element)
                    .collect::<Result<_, _>>()?,
                None => vec![],
            },
        })
    };

    Ok(StructureDefinition {
        url: root.value_of("url").map(String::from),
        name: root.value_of("name").map(String::from),
        kind: root.value_of("kind").map(String::from),
        is_abstract: root.value_of("abstract") == Some("true"),
        type_name: type_name.to_string(),
        derivation: match root.value_of("derivation") {
            Some("constraint") => DerivationKind::Constraint,
            _ => DerivationKind::Specialization,
        },
        base_definition: root.value_of("baseDefinition").map(String::from),
        snapshot: elements("snapshot")?,
        differential: elements("differential")?,
    })
}

fn values(e: &Element, name: &str) -> Vec<String> {
    e.children_named(name)
        .filter_map(|c| c.attribute("value"))
        .map(String::from)
        .collect()
}

fn xml_element(e: &Element) -> Result<ElementDefinition, DocumentError> {
    let path = e
        .value_of("path")
        .ok_or_else(|| DocumentError::Malformed("element has no path".to_string()))?;
    let min = match e.value_of("min") {
        Some(min) => Some(
            min.parse()
                .map_err(|_| DocumentError::Malformed(format!("{path}: bad min {min}")))?,
        ),
        None => None,
    };

    Ok(ElementDefinition {
        path: path.to_string(),
        slice_name: e.value_of("sliceName").map(String::from),
        min,
        max: e.value_of("max").map(String::from),
        types: e
            .children_named("type")
            .map(|t| TypeRef {
                code: t.value_of("code").unwrap_or_default().to_string(),
                profile: values(t, "profile"),
                target_profile: values(t, "targetProfile"),
            })
            .collect(),
        content_reference: e.value_of("contentReference").map(String::from),
        conditions: values(e, "condition"),
        constraints: e
            .children_named("constraint")
            .map(|c| Constraint {
                key: c.value_of("key").unwrap_or_default().to_string(),
                expression: c.value_of("expression").map(String::from),
                severity: c.value_of("severity").map(String::from),
                human: c.value_of("human").map(String::from),
            })
            .collect(),
    })
}

fn xml_apply(root: &mut Element, elements: &[ElementDefinition]) -> Result<(), DocumentError> {
    let Some(differential) = root.child_mut("differential") else {
        return if elements.is_empty() {
            Ok(())
        } else {
            Err(mismatch(0, elements.len()))
        };
    };
    let found = differential.children_named("element").count();
    if found != elements.len() {
        return Err(mismatch(found, elements.len()));
    }

    for (item, element) in differential.children_named_mut("element").zip(elements) {
        if values(item, "condition") != element.conditions {
            item.remove_children("condition");
            let conditions = element
                .conditions
                .iter()
                .map(|c| Element::with_value("condition", c))
                .collect();
            item.insert_before(conditions, AFTER_CONDITION);
        }

        for (c, constraint) in item.children_named_mut("constraint").zip(&element.constraints) {
            let (Some(expression), Some(node)) = (&constraint.expression, c.child_mut("expression"))
            else {
                continue;
            };
            if node.attribute("value") != Some(expression.as_str()) {
                node.set_attribute("value", expression);
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_from_extension() {
        assert_eq!(Format::from_path(Path::new("a/b.json")), Some(Format::Json));
        assert_eq!(Format::from_path(Path::new("b.xml")), Some(Format::Xml));
        assert_eq!(Format::from_path(Path::new("b.ttl")), None);
        assert_eq!(Format::from_path(Path::new("json")), None);
    }

    #[test]
    fn other_resources_have_no_definition() {
        let doc = Document::parse(Format::Json, r#"{"resourceType": "ValueSet"}"#).unwrap();
        assert_eq!(doc.definition().unwrap(), None);
        let doc =
            Document::parse(Format::Xml, r#"<Patient xmlns="http://hl7.org/fhir"/>"#).unwrap();
        assert_eq!(doc.definition().unwrap(), None);
    }

    #[test]
    fn json_condition_position() {
        let mut obj: Map<String, Value> = serde_json::from_str(
            r#"{"id": "a", "path": "A.b", "_condition": [null], "condition": ["x"],
                "max": "1", "mustSupport": true, "binding": {}}"#,
        )
        .unwrap();
        json_set_conditions(&mut obj, &["y".to_string(), "y".to_string()]);
        let keys: Vec<&str> = obj.keys().map(|k| k.as_str()).collect();
        assert_eq!(keys, vec!["id", "path", "max", "condition", "mustSupport", "binding"]);
        assert_eq!(obj["condition"], serde_json::json!(["y", "y"]));

        json_set_conditions(&mut obj, &[]);
        let keys: Vec<&str> = obj.keys().map(|k| k.as_str()).collect();
        assert_eq!(keys, vec!["id", "path", "max", "mustSupport", "binding"]);
    }

    #[test]
    fn json_numbers_keep_their_text() {
        let text = r#"{"resourceType": "Basic", "value": 1.50}"#;
        let doc = Document::parse(Format::Json, text).unwrap();
        assert!(doc.to_string_pretty().unwrap().contains("1.50"));
    }

    #[test]
    fn xml_definition_and_apply() {
        let text = r#"<StructureDefinition xmlns="http://hl7.org/fhir">
  <type value="Patient"/>
  <differential>
    <element id="Patient.name">
      <path value="Patient.name"/>
      <max value="*"/>
      <type>
        <code value="HumanName"/>
      </type>
      <condition value="old-1"/>
      <mustSupport value="true"/>
    </element>
    <element id="Patient.identifier">
      <path value="Patient.identifier"/>
      <constraint>
        <key value="inv-1"/>
        <expression value="%resource.name.exists()"/>
      </constraint>
    </element>
  </differential>
</StructureDefinition>"#;
        let mut doc = Document::parse(Format::Xml, text).unwrap();
        let mut sd = doc.definition().unwrap().unwrap();
        assert_eq!(sd.derivation, DerivationKind::Specialization);
        assert_eq!(sd.differential.element[0].conditions, vec!["old-1"]);
        assert_eq!(sd.differential.element[0].types[0].code, "HumanName");
        assert!(sd.differential.element[0].is_collection());
        assert_eq!(sd.differential.element[1].constraints[0].key, "inv-1");

        sd.differential.element[0].conditions = vec!["inv-1".to_string()];
        sd.differential.element[1].constraints[0].expression = Some("name.exists()".to_string());
        doc.apply(&sd).unwrap();

        let out = doc.to_string_pretty().unwrap();
        assert!(out.contains(
            "<condition value=\"inv-1\"/>\n      <mustSupport value=\"true\"/>"
        ));
        assert!(!out.contains("old-1"));
        assert!(out.contains("<expression value=\"name.exists()\"/>"));
        let again = Document::parse(Format::Xml, &out).unwrap().definition().unwrap();
        assert_eq!(again, Some(sd));
    }

    #[test]
    fn apply_rejects_mismatched_model() {
        let mut doc = Document::parse(
            Format::Json,
            r#"{"resourceType": "StructureDefinition", "type": "A",
                "differential": {"element": [{"path": "A"}]}}"#,
        )
        .unwrap();
        let sd = StructureDefinition::new("A", DerivationKind::Specialization);
        assert!(matches!(doc.apply(&sd), Err(DocumentError::Malformed(_))));
    }
}
