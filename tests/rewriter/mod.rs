// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use crate::common::*;

use std::collections::BTreeMap;

use anyhow::{bail, Result};
use sdconditions::*;
use serde::Deserialize;
use test_generator::test_resources;

#[derive(Deserialize, Debug)]
struct Case {
    note: String,
    definition: TypeDef,
    changed: bool,
    #[serde(default)]
    conditions: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    expressions: BTreeMap<String, String>,
}

#[derive(Deserialize, Debug)]
struct Test {
    cases: Vec<Case>,
}

fn expressions_by_key(sd: &StructureDefinition) -> BTreeMap<String, String> {
    sd.differential
        .element
        .iter()
        .flat_map(|e| e.constraints.iter())
        .filter_map(|c| Some((c.key.clone(), c.expression.clone()?)))
        .collect()
}

fn yaml_test_impl(file: &str) -> Result<()> {
    println!("\nrunning {file}");

    let yaml = std::fs::read_to_string(file)?;
    let test: Test = serde_yaml::from_str(&yaml)?;
    let rewriter = ConditionRewriter::new(analyzer_with(&[])?);

    for case in &test.cases {
        print!("case {} ", case.note);
        let mut sd = case.definition.to_definition();

        let changed = rewriter.process(&mut sd);
        if changed != case.changed {
            bail!("{}: expected changed = {}, got {}", case.note, case.changed, changed);
        }
        let conditions = conditions_by_path(&sd);
        if conditions != case.conditions {
            bail!(
                "{}:\nexpected {:?}\nactual   {:?}",
                case.note,
                case.conditions,
                conditions
            );
        }
        let expressions = expressions_by_key(&sd);
        for (key, expected) in &case.expressions {
            if expressions.get(key) != Some(expected) {
                bail!("{}: expression of {key} is {:?}", case.note, expressions.get(key));
            }
        }

        // A second pass over the result must be a no-op.
        let before = sd.clone();
        if rewriter.process(&mut sd) {
            bail!("{}: second pass reported a change", case.note);
        }
        if sd != before {
            bail!("{}: second pass modified the definition", case.note);
        }

        println!("passed");
    }

    println!("{} cases passed.", test.cases.len());
    Ok(())
}

fn yaml_test(file: &str) -> Result<()> {
    match yaml_test_impl(file) {
        Ok(_) => Ok(()),
        Err(e) => {
            // If Err is returned, it doesn't always get printed by cargo test.
            // Therefore, panic with the error.
            panic!("{}", e);
        }
    }
}

#[test_resources("tests/rewriter/**/*.yaml")]
fn run(path: &str) {
    yaml_test(path).unwrap()
}
