// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Types tracked while checking an expression.
//!
//! A FHIRPath expression always evaluates to a collection. Statically we only
//! track which types the items of that collection may have and whether the
//! collection may hold more than one item.

pub const SYSTEM_BOOLEAN: &str = "System.Boolean";
pub const SYSTEM_STRING: &str = "System.String";
pub const SYSTEM_INTEGER: &str = "System.Integer";
pub const SYSTEM_LONG: &str = "System.Long";
pub const SYSTEM_DECIMAL: &str = "System.Decimal";
pub const SYSTEM_DATE: &str = "System.Date";
pub const SYSTEM_DATETIME: &str = "System.DateTime";
pub const SYSTEM_TIME: &str = "System.Time";
pub const SYSTEM_QUANTITY: &str = "System.Quantity";

const FHIRPATH_TYPE_PREFIX: &str = "http://hl7.org/fhirpath/";
const FHIR_TYPE_PREFIX: &str = "http://hl7.org/fhir/StructureDefinition/";

/// A single candidate type.
///
/// Named types (`HumanName`, `Patient`, `string`) are resolved through the
/// definition with the same type name. Types that are declared inline inside
/// another definition (`BackboneElement` and `Element` children) also carry
/// the path of the declaring element; their members live under that path.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct ProfiledType {
    pub code: String,
    pub element: Option<String>,
}

impl ProfiledType {
    pub fn named(code: &str) -> Self {
        Self {
            code: normalize_type_code(code),
            element: None,
        }
    }

    pub fn inline(code: &str, element: &str) -> Self {
        Self {
            code: normalize_type_code(code),
            element: Some(element.to_string()),
        }
    }

    pub fn is_system(&self) -> bool {
        self.code.starts_with("System.")
    }

    /// Name of the definition that declares the members of this type, and
    /// the path under which those members are found.
    pub fn member_scope(&self) -> (&str, &str) {
        match &self.element {
            Some(path) => (root_of(path), path.as_str()),
            None => (self.code.as_str(), self.code.as_str()),
        }
    }

    /// Whether this type is named `name`, ignoring the `FHIR.` namespace.
    pub fn matches_name(&self, namespace: Option<&str>, name: &str) -> bool {
        match namespace {
            Some("System") => self.code.strip_prefix("System.") == Some(name),
            Some("FHIR") | None => {
                self.code == name
                    || (namespace.is_none() && self.code.strip_prefix("System.") == Some(name))
            }
            Some(_) => false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TypeDetails {
    pub collection: bool,
    pub types: Vec<ProfiledType>,
}

impl TypeDetails {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn singleton(t: ProfiledType) -> Self {
        Self {
            collection: false,
            types: vec![t],
        }
    }

    pub fn system(code: &str) -> Self {
        Self::singleton(ProfiledType::named(code))
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    pub fn add(&mut self, t: ProfiledType) {
        if !self.types.contains(&t) {
            self.types.push(t);
        }
    }

    pub fn merge(&mut self, other: &TypeDetails) {
        self.collection |= other.collection;
        for t in &other.types {
            self.add(t.clone());
        }
    }

    pub fn union(&self, other: &TypeDetails) -> TypeDetails {
        let mut t = self.clone();
        t.merge(other);
        t.collection = true;
        t
    }

    pub fn to_singleton(&self) -> TypeDetails {
        Self {
            collection: false,
            types: self.types.clone(),
        }
    }

    pub fn has_type(&self, code: &str) -> bool {
        self.types.iter().any(|t| t.code == code)
    }
}

/// Last dot separated segment is the element name, the rest is its parent.
pub fn split_path(path: &str) -> Option<(&str, &str)> {
    path.rsplit_once('.')
}

/// The type name an element path starts with.
pub fn root_of(path: &str) -> &str {
    match path.split_once('.') {
        Some((root, _)) => root,
        None => path,
    }
}

/// Maps the type codes found in definitions onto the names used while
/// checking: FHIRPath system type URLs become `System.X` and canonical FHIR
/// type URLs become the bare type name.
pub fn normalize_type_code(code: &str) -> String {
    if let Some(system) = code.strip_prefix(FHIRPATH_TYPE_PREFIX) {
        return system.to_string();
    }
    if let Some(name) = code.strip_prefix(FHIR_TYPE_PREFIX) {
        return name.to_string();
    }
    code.to_string()
}

/// System type produced by `getValue()` on a FHIR primitive.
pub fn system_type_for(code: &str) -> Option<&'static str> {
    Some(match code {
        "boolean" => SYSTEM_BOOLEAN,
        "integer" | "positiveInt" | "unsignedInt" => SYSTEM_INTEGER,
        "integer64" => SYSTEM_LONG,
        "decimal" => SYSTEM_DECIMAL,
        "date" => SYSTEM_DATE,
        "dateTime" | "instant" => SYSTEM_DATETIME,
        "time" => SYSTEM_TIME,
        "string" | "code" | "id" | "markdown" | "uri" | "url" | "canonical" | "oid" | "uuid"
        | "base64Binary" | "xhtml" => SYSTEM_STRING,
        _ => return None,
    })
}

/// Whether a type code names a type whose members are declared inline by the
/// element that uses it.
pub fn is_inline_type(code: &str) -> bool {
    matches!(code, "BackboneElement" | "Element")
}
