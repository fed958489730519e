//! Per-macro parameter ledger and the end-of-macro consistency sweep.

use crate::diagnostic::Severity;
use crate::types::TypeTree;
use std::collections::BTreeMap;
use std::fmt;

/// Parameters the template engine provides to every macro.
pub const IMPLICIT_PARAMS: &[&str] = &["varargs", "kwargs", "caller"];

/// Level at which undocumented parameters become fatal.
pub const LEVEL_REQUIRE_DOCS: u8 = 3;

/// Accumulated knowledge about one macro parameter.
#[derive(Debug, Clone, Default)]
pub struct Param {
    pub description: Vec<String>,
    /// Declared type text, or the type inferred from a default or a test.
    pub type_text: Option<String>,
    pub type_tree: Option<TypeTree>,
    pub default: Option<String>,
    pub seen_in_doc: bool,
    pub seen_in_def: bool,
    pub seen_in_body: bool,
}

impl Param {
    /// Whether the parameter is known to hold a boolean.
    pub fn is_bool(&self) -> bool {
        match &self.type_tree {
            Some(tree) => tree.admits(crate::types::DefaultKind::Bool),
            None => self.type_text.as_deref() == Some("bool"),
        }
    }
}

impl fmt::Display for Param {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "type={} default={} doc={} def={} body={}",
            self.type_text.as_deref().unwrap_or("-"),
            self.default.as_deref().unwrap_or("-"),
            self.seen_in_doc,
            self.seen_in_def,
            self.seen_in_body
        )
    }
}

/// A problem found by [`Ledger::sweep`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Finding {
    pub severity: Severity,
    pub message: String,
}

#[derive(Debug, Default)]
pub struct Ledger {
    params: BTreeMap<String, Param>,
}

impl Ledger {
    pub fn get_mut(&mut self, name: &str) -> Option<&mut Param> {
        self.params.get_mut(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.params.contains_key(name)
    }

    pub fn insert(&mut self, name: &str, param: Param) {
        self.params.insert(name.to_string(), param);
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Param)> {
        self.params.iter()
    }

    pub fn clear(&mut self) {
        self.params.clear();
    }

    /// Mark `name` as used in the body if it is a known parameter.
    pub fn mark_used(&mut self, name: &str) {
        if let Some(param) = self.params.get_mut(name) {
            param.seen_in_body = true;
        }
    }

    /// Cross-check documented, defined and used parameters.
    pub fn sweep(&self, level: u8) -> Vec<Finding> {
        let mut findings = Vec::new();

        for (name, param) in &self.params {
            if param.seen_in_doc && param.seen_in_def && param.seen_in_body {
                continue;
            }
            let implicit = IMPLICIT_PARAMS.contains(&name.as_str());

            if param.seen_in_doc && !param.seen_in_def {
                if !implicit {
                    findings.push(Finding {
                        severity: Severity::Error,
                        message: format!(
                            "param `{}` is documented but not a real parameter ({})",
                            name, param
                        ),
                    });
                }
            } else if param.seen_in_def && !param.seen_in_body {
                findings.push(Finding {
                    severity: Severity::Error,
                    message: format!(
                        "param `{}` is declared but unused in the macro body ({})",
                        name, param
                    ),
                });
            } else if !param.seen_in_doc && !implicit && level >= LEVEL_REQUIRE_DOCS {
                findings.push(Finding {
                    severity: Severity::Error,
                    message: format!("param `{}` is undocumented ({})", name, param),
                });
            }
        }

        findings
    }
}
