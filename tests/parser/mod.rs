// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use anyhow::{bail, Result};
use sdconditions::unstable::*;
use serde::Deserialize;
use test_generator::test_resources;

fn arith(op: &ArithOp) -> &'static str {
    match op {
        ArithOp::Add => "+",
        ArithOp::Sub => "-",
        ArithOp::Mul => "*",
        ArithOp::Div => "/",
        ArithOp::IntDiv => "div",
        ArithOp::Mod => "mod",
        ArithOp::Concat => "&",
    }
}

fn compare(op: &BoolOp) -> &'static str {
    match op {
        BoolOp::Lt => "<",
        BoolOp::Le => "<=",
        BoolOp::Gt => ">",
        BoolOp::Ge => ">=",
        BoolOp::Eq => "=",
        BoolOp::Ne => "!=",
        BoolOp::Equiv => "~",
        BoolOp::NotEquiv => "!~",
    }
}

fn spec(s: &TypeSpecifier) -> String {
    match &s.namespace {
        Some(ns) => format!("{ns}.{}", s.name),
        None => s.name.clone(),
    }
}

fn focus(f: &Option<Ref<Expr>>) -> String {
    match f {
        Some(f) => render(f),
        None => "_".to_string(),
    }
}

// Renders the tree as an s-expression so that cases stay readable.
fn render(e: &Expr) -> String {
    match e {
        Expr::Empty(_) => "{}".to_string(),
        Expr::Bool((_, b)) => b.to_string(),
        Expr::String((_, s)) => format!("'{s}'"),
        Expr::Number((span, _)) | Expr::Temporal((span, _)) => span.text().to_string(),
        Expr::Quantity { value, unit, .. } => format!("(quantity {} {})", value.text(), unit.1),
        Expr::This(_) => "$this".to_string(),
        Expr::Index(_) => "$index".to_string(),
        Expr::Total(_) => "$total".to_string(),
        Expr::Constant((_, name)) => format!("%{name}"),
        Expr::Member {
            focus: None, name, ..
        } => name.1.clone(),
        Expr::Member {
            focus: Some(f),
            name,
            ..
        } => format!("(. {} {})", render(f), name.1),
        Expr::Call {
            focus: f,
            name,
            params,
            ..
        } => {
            let mut out = format!("({} {}", name.1, focus(f));
            for p in params {
                out.push(' ');
                out.push_str(&render(p));
            }
            out.push(')');
            out
        }
        Expr::Indexer { focus, index, .. } => format!("([] {} {})", render(focus), render(index)),
        Expr::UnaryExpr { op, expr, .. } => {
            let op = match op {
                UnaryOp::Plus => "+",
                UnaryOp::Minus => "-",
            };
            format!("({op} {})", render(expr))
        }
        Expr::ArithExpr { op, lhs, rhs, .. } => {
            format!("({} {} {})", arith(op), render(lhs), render(rhs))
        }
        Expr::BoolExpr { op, lhs, rhs, .. } => {
            format!("({} {} {})", compare(op), render(lhs), render(rhs))
        }
        Expr::LogicExpr { op, lhs, rhs, .. } => {
            let op = match op {
                LogicOp::And => "and",
                LogicOp::Or => "or",
                LogicOp::Xor => "xor",
                LogicOp::Implies => "implies",
            };
            format!("({op} {} {})", render(lhs), render(rhs))
        }
        Expr::Membership { op, lhs, rhs, .. } => {
            let op = match op {
                MembershipOp::In => "in",
                MembershipOp::Contains => "contains",
            };
            format!("({op} {} {})", render(lhs), render(rhs))
        }
        Expr::Union { lhs, rhs, .. } => format!("(| {} {})", render(lhs), render(rhs)),
        Expr::TypeExpr {
            op, expr, spec: s, ..
        } => {
            let op = match op {
                TypeOp::Is => "is",
                TypeOp::As => "as",
            };
            format!("({op} {} {})", render(expr), spec(s))
        }
    }
}

#[derive(Deserialize, Debug)]
struct Case {
    note: String,
    expr: String,
    ast: Option<String>,
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

        match (parse_expression("case.fhirpath", &case.expr), &case.error) {
            (Ok(expr), None) => {
                let actual = render(&expr);
                let expected = case.ast.as_deref().unwrap_or_default();
                if actual != expected {
                    bail!(
                        "{}: `{}`\nexpected {expected}\nactual   {actual}",
                        case.note,
                        case.expr
                    );
                }
            }
            (Ok(expr), Some(e)) => {
                bail!("{}: expected error `{e}`, parsed {}", case.note, render(&expr))
            }
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

#[test_resources("tests/parser/**/*.yaml")]
fn run(path: &str) {
    yaml_test(path).unwrap()
}
