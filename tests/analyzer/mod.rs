// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use crate::common::*;

use std::collections::BTreeSet;
use std::env;

use anyhow::{bail, Result};
use sdconditions::*;
use serde::Deserialize;
use test_generator::test_resources;

#[derive(Deserialize, Debug)]
struct Case {
    note: String,
    root: String,
    path: Option<String>,
    expr: String,
    paths: Option<Vec<String>>,
    error: Option<String>,
}

#[derive(Deserialize, Debug)]
struct Test {
    #[serde(default)]
    definitions: Vec<TypeDef>,
    cases: Vec<Case>,
}

fn yaml_test_impl(file: &str) -> Result<()> {
    println!("\nrunning {file}");

    let yaml = std::fs::read_to_string(file)?;
    let test: Test = serde_yaml::from_str(&yaml)?;
    let extra: Vec<StructureDefinition> =
        test.definitions.iter().map(|d| d.to_definition()).collect();
    let analyzer = analyzer_with(&extra)?;

    for case in &test.cases {
        print!("case {} ", case.note);
        let definition = match extra.iter().find(|d| d.type_name == case.root) {
            Some(d) => d.clone(),
            None => match analyzer.context().get(&case.root) {
                Some(d) => d.clone(),
                None => bail!("{}: unknown root type {}", case.note, case.root),
            },
        };
        let path = case.path.as_deref().unwrap_or(&case.root);

        match (
            analyzer.resolve_field_references(&case.expr, &case.root, path, &definition),
            &case.error,
        ) {
            (Ok(actual), None) => {
                let expected: BTreeSet<String> =
                    case.paths.clone().unwrap_or_default().into_iter().collect();
                if actual != expected {
                    bail!(
                        "{}: `{}`\nexpected {:?}\nactual   {:?}",
                        case.note,
                        case.expr,
                        expected,
                        actual
                    );
                }
            }
            (Ok(actual), Some(expected)) => {
                bail!(
                    "{}: expected error `{expected}`, analysis produced {actual:?}",
                    case.note
                )
            }
            (Err(actual), Some(expected)) => {
                let actual = actual.to_string();
                if !actual.contains(expected.as_str()) {
                    bail!(
                        "Error message\n`{}\n`\ndoes not contain `{}`",
                        actual,
                        expected
                    );
                }
            }
            (Err(actual), None) => return Err(actual),
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

#[test]
#[ignore = "intended for running a single yaml file"]
fn one_yaml() -> Result<()> {
    let mut file = String::default();
    for a in env::args() {
        if a.ends_with(".yaml") {
            file = a;
            break;
        }
    }

    if file.is_empty() {
        bail!("missing yaml test file");
    }

    yaml_test(file.as_str())
}

#[test_resources("tests/analyzer/**/*.yaml")]
fn run(path: &str) {
    yaml_test(path).unwrap()
}
