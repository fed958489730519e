//! Lower a type tree into render-time guard statements.
//!
//! The output is a flat list of statement bodies (`if x is not string`,
//! `raise("...")`, `endif`, `for elem_x in x`, ...) without delimiters;
//! [`render_block`] wraps them for inclusion in a template.

use crate::types::{Scalar, TypeTree};

/// How a lowered type contributes to the surrounding control flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Branch {
    /// Standalone assertion: raise unless the value matches.
    Assert,
    /// One positive alternative of a union chain, opened with `if` or `elif`.
    Alternative(&'static str),
}

/// Guard statements asserting that `name` holds a value of type `tree`.
pub fn guards(tree: &TypeTree, name: &str) -> Vec<String> {
    let mut out = Vec::new();
    lower(tree, name, Branch::Assert, &mut out);
    out
}

/// Wrap guard statements as trimmed template statements, one per line.
pub fn render_block(statements: &[String]) -> String {
    let mut block = String::new();
    for stmt in statements {
        block.push_str("{{%- ");
        block.push_str(stmt);
        block.push_str(" %}}\n");
    }
    block
}

fn raise(name: &str, tree: &TypeTree) -> String {
    format!("raise(\"{} is not '{}'\")", name, tree)
}

/// Engine test name for scalars checked with `is <test>`.
fn scalar_test(scalar: Scalar) -> Option<&'static str> {
    match scalar {
        Scalar::Bool => Some("boolean"),
        Scalar::Int => Some("integer"),
        Scalar::Float => Some("float"),
        Scalar::Str => Some("string"),
        Scalar::None => Some("none"),
        Scalar::Char => None,
    }
}

fn lower(tree: &TypeTree, name: &str, branch: Branch, out: &mut Vec<String>) {
    match tree {
        TypeTree::Scalar(scalar) => lower_scalar(tree, *scalar, name, branch, out),
        TypeTree::List(elem) => {
            let is_list = format!(
                "({name} is sequence) and ({name} is not mapping) and ({name} is not string)"
            );
            match branch {
                Branch::Assert => {
                    out.push(format!("if not({})", is_list));
                    out.push(raise(name, tree));
                    out.push("endif".to_string());
                }
                Branch::Alternative(kw) => out.push(format!("{} {}", kw, is_list)),
            }
            let elem_name = format!("elem_{}", name);
            out.push(format!("for {} in {}", elem_name, name));
            lower(elem, &elem_name, Branch::Assert, out);
            out.push("endfor".to_string());
        }
        TypeTree::Map(key, value) => {
            match branch {
                Branch::Assert => {
                    out.push(format!("if {} is not mapping", name));
                    out.push(raise(name, tree));
                    out.push("endif".to_string());
                }
                Branch::Alternative(kw) => out.push(format!("{} {} is mapping", kw, name)),
            }
            let key_name = format!("key_{}", name);
            let value_name = format!("value_{}", name);
            out.push(format!("for {}, {} in {}", key_name, value_name, name));
            lower(key, &key_name, Branch::Assert, out);
            lower(value, &value_name, Branch::Assert, out);
            out.push("endfor".to_string());
        }
        TypeTree::Union(alternatives) => {
            for (i, alt) in alternatives.iter().enumerate() {
                let kw = if i == 0 { "if" } else { "elif" };
                lower(alt, name, Branch::Alternative(kw), out);
            }
            out.push("else".to_string());
            out.push(raise(name, tree));
            out.push("endif".to_string());
        }
    }
}

fn lower_scalar(
    tree: &TypeTree,
    scalar: Scalar,
    name: &str,
    branch: Branch,
    out: &mut Vec<String>,
) {
    match (scalar_test(scalar), branch) {
        (Some(test), Branch::Alternative(kw)) => {
            out.push(format!("{} {} is {}", kw, name, test))
        }
        (None, Branch::Alternative(kw)) => out.push(format!(
            "{kw} ({name} is string) and (({name} | length) == 1)"
        )),
        (Some(test), Branch::Assert) => {
            out.push(format!("if {} is not {}", name, test));
            out.push(raise(name, tree));
            out.push("endif".to_string());
        }
        (None, Branch::Assert) => {
            out.push(format!(
                "if not(({name} is string) and (({name} | length) == 1))"
            ));
            out.push(raise(name, tree));
            out.push("endif".to_string());
        }
    }
}
