// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use crate::analyzer::Analyzer;
use crate::definition::{DerivationKind, StructureDefinition};

use log::{info, warn};

/// Key of the invariant whose expression is replaced before analysis.
pub const URL_SAFETY_KEY: &str = "cnl-1";
/// Replacement expression for [`URL_SAFETY_KEY`].
pub const URL_SAFETY_EXPRESSION: &str = "exists() implies matches('([^|#])*')";

/// Recomputes the `condition` lists of a definition's differential from the
/// invariants declared in it.
#[derive(Debug, Clone)]
pub struct ConditionRewriter {
    analyzer: Analyzer,
}

impl ConditionRewriter {
    pub fn new(analyzer: Analyzer) -> Self {
        Self { analyzer }
    }

    /// Rewrites the conditions in place. Returns true if the definition
    /// differs from what was passed in.
    ///
    /// Profiles are left untouched. A constraint whose expression cannot be
    /// analyzed is logged and contributes nothing.
    pub fn process(&self, definition: &mut StructureDefinition) -> bool {
        if definition.derivation == DerivationKind::Constraint {
            return false;
        }
        info!("{}", definition.type_name);

        let previous: Vec<Vec<String>> = definition
            .differential
            .element
            .iter_mut()
            .map(|e| std::mem::take(&mut e.conditions))
            .collect();

        let mut changed = false;
        let lookup = definition.path_lookup();
        let type_name = definition.type_name.clone();
        for idx in 0..definition.differential.element.len() {
            for c in 0..definition.differential.element[idx].constraints.len() {
                let (key, expression, path) = {
                    let element = &mut definition.differential.element[idx];
                    let path = element.path.clone();
                    let constraint = &mut element.constraints[c];
                    if !constraint.has_expression() {
                        continue;
                    }
                    if constraint.key == URL_SAFETY_KEY
                        && constraint.expression.as_deref() != Some(URL_SAFETY_EXPRESSION)
                    {
                        constraint.expression = Some(URL_SAFETY_EXPRESSION.to_string());
                        changed = true;
                    }
                    (
                        constraint.key.clone(),
                        constraint.expression.clone().unwrap_or_default(),
                        path,
                    )
                };

                let paths = match self.analyzer.resolve_field_references(
                    &expression,
                    &type_name,
                    &path,
                    definition,
                ) {
                    Ok(paths) => paths,
                    Err(e) => {
                        warn!("Exception processing {key}: {e}");
                        continue;
                    }
                };

                for p in paths {
                    if p == path {
                        continue;
                    }
                    if let Some(&target) = lookup.get(&p) {
                        definition.differential.element[target]
                            .conditions
                            .push(key.clone());
                    }
                }
            }
        }

        changed
            || definition
                .differential
                .element
                .iter()
                .zip(&previous)
                .any(|(e, before)| e.conditions != *before)
    }
}
