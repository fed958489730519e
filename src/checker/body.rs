//! Macro header and body states.
//!
//! The header is merged into the ledger; the body is scanned for parameter
//! references inside `{{% ... %}}` statements and `{{{ ... }}}` expressions.

use super::{Checker, Flow, State, RE_MACRO_START};
use crate::ledger::Param;
use crate::types::DefaultKind;
use regex::Regex;
use std::sync::LazyLock;

static RE_SET: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\{\{%-? set \w+ = .*? -?%\}\}$").unwrap());

static RE_MACRO_HEADER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\{\{%-? macro (\w+)\(\s*(.*?)\s*\) -?%\}\}$").unwrap()
});

static RE_PARAM_BARE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\w+$").unwrap());

static RE_PARAM_STRING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"^(\w+)=(?:'([^']*)'|"([^"]*)")$"#).unwrap());

static RE_PARAM_LITERAL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\w+)=(False|false|True|true|None|none|\d+|\[\]|\{\})$").unwrap()
});

static RE_IDENT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\w+").unwrap());

// Inner text of `{{% if x %}}`, `{{%- elif not x -%}}`, ...
static RE_BOOL_TEST: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^-?\s*(?:el)?if\s+(?:not\s+)?(\w+)\s*-?$").unwrap()
});

/// Level at which boolean tests of non-bool parameters are reported.
const LEVEL_MAYBE_BOOL: u8 = 2;

/// Delimited template construct inside a macro body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Construct {
    Statement,
    Expression,
}

impl Construct {
    fn open(self) -> &'static str {
        match self {
            Construct::Statement => "{{%",
            Construct::Expression => "{{{",
        }
    }

    fn close(self) -> &'static str {
        match self {
            Construct::Statement => "%}}",
            Construct::Expression => "}}}",
        }
    }

    fn state(self) -> State {
        match self {
            Construct::Statement => State::MacroBodyStatement,
            Construct::Expression => State::MacroBodyExpression,
        }
    }
}

/// Earliest construct opener in `text`.
fn next_opener(text: &str) -> Option<(usize, Construct)> {
    [Construct::Statement, Construct::Expression]
        .into_iter()
        .filter_map(|c| text.find(c.open()).map(|pos| (pos, c)))
        .min_by_key(|(pos, _)| *pos)
}

/// One parameter of a macro header.
#[derive(Debug, Clone, PartialEq, Eq)]
struct HeaderParam {
    name: String,
    default: Option<String>,
    kind: Option<DefaultKind>,
}

/// Parse one comma-separated header token: `name`, `name='text'` or
/// `name=LITERAL`.
fn parse_header_param(token: &str) -> Option<HeaderParam> {
    if RE_PARAM_BARE.is_match(token) {
        return Some(HeaderParam {
            name: token.to_string(),
            default: None,
            kind: None,
        });
    }

    if let Some(caps) = RE_PARAM_STRING.captures(token) {
        let text = caps.get(2).or_else(|| caps.get(3)).map_or("", |m| m.as_str());
        return Some(HeaderParam {
            name: caps[1].to_string(),
            default: Some(text.to_string()),
            kind: Some(DefaultKind::Str),
        });
    }

    let caps = RE_PARAM_LITERAL.captures(token)?;
    let literal = &caps[2];
    let kind = match literal {
        "False" | "false" | "True" | "true" => Some(DefaultKind::Bool),
        "None" | "none" => None,
        "[]" => Some(DefaultKind::List),
        "{}" => Some(DefaultKind::Dict),
        _ => Some(DefaultKind::Int),
    };
    Some(HeaderParam {
        name: caps[1].to_string(),
        default: Some(literal.to_string()),
        kind,
    })
}

/// Parse the text between the header's parentheses. On failure returns the
/// offending token.
fn parse_header_params(raw: &str) -> Result<Vec<HeaderParam>, String> {
    if raw.is_empty() {
        return Ok(Vec::new());
    }
    raw.split(',')
        .map(str::trim)
        .map(|token| parse_header_param(token).ok_or_else(|| token.to_string()))
        .collect()
}

impl Checker<'_> {
    pub(super) fn macro_def(&mut self, line: &str) -> Flow {
        if line.is_empty() {
            self.ctx.state = State::PreComment;
            return Flow::Continue;
        }

        if RE_SET.is_match(line) {
            self.ctx.reset();
            return Flow::Continue;
        }

        let Some(caps) = RE_MACRO_HEADER.captures(line) else {
            return self.error("malformed macro header");
        };

        self.ctx.macro_name = Some(caps[1].to_string());

        let params = match parse_header_params(&caps[2]) {
            Ok(params) => params,
            Err(token) => {
                return self.error(format!("cannot parse macro parameter `{}`", token));
            }
        };

        for param in params {
            if let Some(problem) = self.merge_header_param(param) {
                return self.error(problem);
            }
        }

        self.ctx.state = State::MacroBody;
        Flow::Continue
    }

    /// Record a header parameter, checking it against the documented type.
    fn merge_header_param(&mut self, header: HeaderParam) -> Option<String> {
        if !self.ctx.ledger.contains(&header.name) {
            self.ctx.ledger.insert(
                &header.name,
                Param {
                    type_text: header.kind.map(|k| k.name().to_string()),
                    default: header.default,
                    seen_in_def: true,
                    ..Param::default()
                },
            );
            return None;
        }
        let param = self.ctx.ledger.get_mut(&header.name)?;

        if param.seen_in_def {
            return Some(format!("param `{}` is defined twice", header.name));
        }
        param.seen_in_def = true;
        param.default = header.default;

        let kind = header.kind?;
        match &param.type_tree {
            Some(tree) if !tree.admits(kind) => Some(format!(
                "type mismatch for `{}`: documented `{}`, default is `{}`",
                header.name,
                tree,
                kind.name()
            )),
            Some(_) => None,
            None => {
                param.type_text.get_or_insert_with(|| kind.name().to_string());
                None
            }
        }
    }

    pub(super) fn macro_body(&mut self, line: &str) -> Flow {
        if RE_MACRO_START.is_match(line) {
            return self.error("macro defined inside another macro body");
        }

        let mut rest = line;
        while let Some((start, construct)) = next_opener(rest) {
            let inner_start = start + construct.open().len();
            let after = &rest[inner_start..];
            match after.find(construct.close()) {
                Some(end) => {
                    self.scan_construct(construct, &after[..end]);
                    rest = &after[end + construct.close().len()..];
                }
                None => {
                    self.ctx.state = construct.state();
                    return self.dispatch(after);
                }
            }
        }

        Flow::Continue
    }

    /// Continue a construct opened on an earlier line.
    pub(super) fn body_continuation(&mut self, construct: Construct, line: &str) -> Flow {
        match line.find(construct.close()) {
            Some(end) => {
                self.mark_identifiers(&line[..end]);
                self.ctx.state = State::MacroBody;
                self.dispatch(&line[end + construct.close().len()..])
            }
            None => {
                self.mark_identifiers(line);
                Flow::Continue
            }
        }
    }

    fn scan_construct(&mut self, construct: Construct, inner: &str) {
        if construct == Construct::Statement {
            if let Some(caps) = RE_BOOL_TEST.captures(inner) {
                self.bool_test(&caps[1]);
            }
        }
        self.mark_identifiers(inner);
    }

    fn mark_identifiers(&mut self, text: &str) {
        for m in RE_IDENT.find_iter(text) {
            self.ctx.ledger.mark_used(m.as_str());
        }
    }

    /// `name` is used as an `if`/`elif` condition.
    fn bool_test(&mut self, name: &str) {
        let declared = match self.ctx.ledger.get_mut(name) {
            None => return,
            Some(param) if param.type_tree.is_none() && param.type_text.is_none() => {
                param.type_text = Some("bool".to_string());
                return;
            }
            Some(param) if param.is_bool() => return,
            Some(param) => param.type_text.clone().unwrap_or_default(),
        };

        if self.opts.level >= LEVEL_MAYBE_BOOL {
            self.warn(format!(
                "param `{}` is tested as a boolean but declared `{}`",
                name, declared
            ));
        }
    }
}
