// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Base type definitions used to resolve paths while checking expressions.

use crate::definition::{DerivationKind, StructureDefinition};

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, warn};
use serde::Deserialize;
use thiserror::Error;

pub const DEFAULT_PACKAGE: &str = "hl7.fhir.r5.core";

#[derive(Debug, Error)]
pub enum ContextError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("package {0} not found in {1}")]
    PackageNotFound(String, PathBuf),
    #[error("no type definitions found in {0}")]
    Empty(PathBuf),
    #[error("type context holds no definitions")]
    NotLoaded,
    #[error("cannot locate the package cache: HOME is not set")]
    NoHome,
}

/// Definitions of the base types, keyed by type name.
///
/// Only specializations are kept; profiles never introduce members. The first
/// definition registered for a type name wins.
#[derive(Debug, Default, Clone)]
pub struct TypeContext {
    types: BTreeMap<String, StructureDefinition>,
}

#[derive(Debug, Deserialize)]
struct PackageIndex {
    #[serde(default)]
    files: Vec<IndexEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IndexEntry {
    filename: String,
    #[serde(default)]
    resource_type: Option<String>,
    #[serde(default)]
    derivation: Option<String>,
}

impl TypeContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_definitions<I>(definitions: I) -> Self
    where
        I: IntoIterator<Item = StructureDefinition>,
    {
        let mut context = Self::new();
        for sd in definitions {
            context.add_definition(sd);
        }
        context
    }

    /// Loads every type definition of an unpacked FHIR package, i.e. the
    /// `package` directory inside the package cache.
    pub fn from_package_dir(dir: &Path) -> Result<Self, ContextError> {
        let mut context = Self::new();
        if context.add_package_dir(dir)? == 0 {
            return Err(ContextError::Empty(dir.to_path_buf()));
        }
        Ok(context)
    }

    /// Returns false if the definition was ignored.
    pub fn add_definition(&mut self, sd: StructureDefinition) -> bool {
        if sd.derivation == DerivationKind::Constraint || sd.type_name.is_empty() {
            return false;
        }
        if self.types.contains_key(&sd.type_name) {
            debug!("ignoring duplicate definition of {}", sd.type_name);
            return false;
        }
        self.types.insert(sd.type_name.clone(), sd);
        true
    }

    pub fn add_package_dir(&mut self, dir: &Path) -> Result<usize, ContextError> {
        let files = Self::package_files(dir)?;
        let mut added = 0;
        for file in files {
            match Self::read_definition(&file) {
                Ok(Some(sd)) => {
                    if self.add_definition(sd) {
                        added += 1;
                    }
                }
                Ok(None) => (),
                Err(e) => warn!("skipping {}: {e}", file.display()),
            }
        }
        debug!("loaded {added} type definitions from {}", dir.display());
        Ok(added)
    }

    // Uses the package index when present to avoid parsing every resource.
    fn package_files(dir: &Path) -> Result<Vec<PathBuf>, ContextError> {
        let index_path = dir.join(".index.json");
        if let Ok(text) = fs::read_to_string(&index_path) {
            match serde_json::from_str::<PackageIndex>(&text) {
                Ok(index) => {
                    return Ok(index
                        .files
                        .into_iter()
                        .filter(|f| f.resource_type.as_deref() == Some("StructureDefinition"))
                        .filter(|f| f.derivation.as_deref() != Some("constraint"))
                        .map(|f| dir.join(f.filename))
                        .collect())
                }
                Err(e) => warn!("ignoring unreadable {}: {e}", index_path.display()),
            }
        }

        let entries = fs::read_dir(dir).map_err(|source| ContextError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
        let mut files: Vec<PathBuf> = entries
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.extension().is_some_and(|ext| ext == "json"))
            .filter(|p| p.file_name().is_some_and(|n| n != "package.json"))
            .collect();
        files.sort();
        Ok(files)
    }

    fn read_definition(path: &Path) -> anyhow::Result<Option<StructureDefinition>> {
        let text = fs::read_to_string(path)?;
        let value: serde_json::Value = serde_json::from_str(&text)?;
        if value.get("resourceType").and_then(|t| t.as_str()) != Some("StructureDefinition") {
            return Ok(None);
        }
        let sd: StructureDefinition = serde_json::from_value(value)?;
        sd.validate()?;
        Ok(Some(sd))
    }

    pub fn get(&self, type_name: &str) -> Option<&StructureDefinition> {
        self.types.get(type_name)
    }

    pub fn contains(&self, type_name: &str) -> bool {
        self.types.contains_key(type_name)
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    pub fn type_names(&self) -> impl Iterator<Item = &str> {
        self.types.keys().map(|k| k.as_str())
    }
}

/// The local FHIR package cache, laid out as `<root>/<id>#<version>/package`.
#[derive(Debug, Clone)]
pub struct PackageCache {
    root: PathBuf,
}

impl PackageCache {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    /// `$HOME/.fhir/packages`
    pub fn user_default() -> Result<Self, ContextError> {
        let home = std::env::var_os("HOME")
            .or_else(|| std::env::var_os("USERPROFILE"))
            .ok_or(ContextError::NoHome)?;
        Ok(Self::new(PathBuf::from(home).join(".fhir").join("packages")))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Finds the `package` directory for `id` or `id#version`. Without a
    /// version the highest semantic version present wins.
    pub fn locate(&self, package: &str) -> Result<PathBuf, ContextError> {
        let not_found = || ContextError::PackageNotFound(package.to_string(), self.root.clone());
        let (id, version) = match package.split_once('#') {
            Some((id, version)) => (id, Some(version)),
            None => (package, None),
        };

        if let Some(version) = version {
            let dir = self.root.join(format!("{id}#{version}")).join("package");
            return if dir.is_dir() { Ok(dir) } else { Err(not_found()) };
        }

        let entries = fs::read_dir(&self.root).map_err(|_| not_found())?;
        let mut best: Option<(semver::Version, PathBuf)> = None;
        for entry in entries.filter_map(|e| e.ok()) {
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };
            let Some((entry_id, entry_version)) = name.split_once('#') else {
                continue;
            };
            if entry_id != id {
                continue;
            }
            let Ok(v) = semver::Version::parse(entry_version) else {
                debug!("ignoring {name}: not a semantic version");
                continue;
            };
            let dir = entry.path().join("package");
            if !dir.is_dir() {
                continue;
            }
            if best.as_ref().map_or(true, |(b, _)| v > *b) {
                best = Some((v, dir));
            }
        }
        best.map(|(_, dir)| dir).ok_or_else(not_found)
    }

    pub fn load(&self, package: &str) -> Result<TypeContext, ContextError> {
        TypeContext::from_package_dir(&self.locate(package)?)
    }
}
