// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use anyhow::{bail, Result};
use sdconditions::unstable::*;
use serde::Deserialize;
use test_generator::test_resources;

fn get_tokens(source: &Source) -> Result<Vec<Token>> {
    let mut tokens = vec![];
    let mut lex = Lexer::new(source);
    loop {
        let tok = lex.next_token()?;
        tokens.push(tok.clone());
        if tok.0 == TokenKind::Eof {
            break;
        }
    }

    Ok(tokens)
}

#[derive(Deserialize, Debug)]
struct Case {
    note: String,
    expr: String,
    #[serde(default)]
    tokens: Vec<String>,
    kinds: Option<Vec<String>>,
    error: Option<String>,
}

#[derive(Deserialize, Debug)]
struct Test {
    cases: Vec<Case>,
}

fn yaml_test_impl(file: &str) -> Result<()> {
    println!("\nrunning {file}");

    let yaml = std::fs::read_to_string(file)?;
    let test: Test = serde_yaml::from_str(&yaml)?;

    for case in &test.cases {
        print!("case {} ", &case.note);
        let source = Source::from_contents("case.fhirpath".to_string(), case.expr.clone())?;

        match (get_tokens(&source), &case.error) {
            (Ok(tokens), None) => {
                // The trailing Eof token is implied.
                let texts: Vec<&str> = tokens
                    .iter()
                    .filter(|t| t.0 != TokenKind::Eof)
                    .map(|t| t.1.text())
                    .collect();
                if texts != case.tokens {
                    bail!("{}: expected {:?}, got {:?}", case.note, case.tokens, texts);
                }
                if let Some(kinds) = &case.kinds {
                    for (idx, k) in kinds.iter().enumerate() {
                        let actual = format!("{:?}", tokens[idx].0);
                        if &actual != k {
                            let span = &tokens[idx].1;
                            bail!(
                                "{}",
                                source.message(
                                    span.line,
                                    span.col,
                                    "mismatch-error",
                                    &format!("expected kind {k}, got {actual}")
                                )
                            );
                        }
                    }
                }
            }
            (Ok(_), Some(e)) => bail!("{}: expected error `{e}`, lexing succeeded", case.note),
            (Err(actual), Some(expected)) => {
                let actual = actual.to_string();
                if !actual.contains(expected.as_str()) {
                    bail!("Error message\n`{actual}\n`\ndoes not contain `{expected}`");
                }
            }
            (Err(e), None) => return Err(e),
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
fn debug_shortens_long_tokens() -> Result<()> {
    // One ASCII byte first so that byte 32 falls inside a two byte char.
    let text = format!("'a{}'", "é".repeat(40));
    let source = Source::from_contents("case.fhirpath".to_string(), text)?;
    let tokens = get_tokens(&source)?;
    assert_eq!(tokens[0].0, TokenKind::String);

    let rendered = format!("{:?}", tokens[0].1);
    let expected = format!("\"a{}...\"", "é".repeat(31));
    assert!(rendered.ends_with(&expected), "{rendered}");
    Ok(())
}

#[test_resources("tests/lexer/**/*.yaml")]
fn run(path: &str) {
    yaml_test(path).unwrap()
}
