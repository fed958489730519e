//! Doc-comment states: free text, lists, literal blocks and `:param`/`:type`
//! fields.

use super::{split_indent, Checker, Flow, State, RE_MACRO_START};
use crate::ledger::Param;
use crate::types::parse_type;
use regex::Regex;
use std::sync::LazyLock;

static RE_COMMENT_OPEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\{\{#-?(.*)").unwrap());

static RE_COMMENT_CLOSE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^-?#\}\}$").unwrap());

static RE_PARAM_START: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^:param(?:eter)?\s").unwrap());

static RE_PARAM_FIELD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^:param(?:eter)?(\s+)(\w+):(.*)").unwrap());

static RE_TYPE_FIELD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^:type(\s+)(\w+):\s+(.*?)\s*$").unwrap());

// Template syntax that belongs in a `::` literal block.
static RE_COMMAND_LIKE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:[$>{}]|\w+\(|\{\{|\}\})").unwrap());

static RE_LIST_ITEM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(#\.|\d+\.|\*) ").unwrap());

/// Number of a `N.` list marker.
fn marker_number(marker: &str) -> Option<u64> {
    marker.strip_suffix('.')?.parse().ok()
}

impl Checker<'_> {
    pub(super) fn pre_comment(&mut self, line: &str) -> Flow {
        if RE_MACRO_START.is_match(line) {
            self.ctx.state = State::MacroDef;
            return self.dispatch(line);
        }

        let Some(caps) = RE_COMMENT_OPEN.captures(line) else {
            return Flow::Continue;
        };

        self.ctx.reset();

        // {{# ... #}} on one line: a macro without a doc block.
        if line.ends_with("#}}") {
            self.ctx.state = State::MacroDef;
            return Flow::Continue;
        }

        if !caps[1].is_empty() {
            return self.error("macro doc must start on the line after `{{#`");
        }

        self.ctx.state = State::CommentText;
        Flow::Continue
    }

    pub(super) fn comment_text(&mut self, line: &str) -> Flow {
        if line.is_empty() {
            if self.ctx.last_blank {
                return self.error("more than one empty line");
            }
            return Flow::Continue;
        }

        if RE_COMMENT_CLOSE.is_match(line) {
            self.ctx.state = State::MacroDef;
            return Flow::Continue;
        }

        let (indent, content) = split_indent(line);

        if indent.is_empty() {
            if RE_PARAM_START.is_match(line) {
                self.ctx.state = State::CommentParam;
                self.ctx.param_name = None;
                return self.dispatch(line);
            }
            if line.starts_with(":type ") {
                return self.error("`:type` field without a preceding `:param`");
            }
        }

        self.ctx.indent = Some(indent.to_string());

        if line.ends_with("::") {
            self.ctx.state = State::CommentCmd;
        }

        if content.starts_with(":param") || content.starts_with(":type") {
            self.warn("indented `:param` or `:type` field");
        }

        if RE_COMMAND_LIKE.is_match(content) {
            return self.error("looks like a template command but is not inside a `::` block");
        }

        if let Some(caps) = RE_LIST_ITEM.captures(content) {
            self.ctx.list_style = Some(caps[1].to_string());
            self.ctx.state = State::CommentList;
            return self.dispatch(line);
        }

        Flow::Continue
    }

    pub(super) fn comment_list(&mut self, line: &str) -> Flow {
        if line.is_empty() {
            self.ctx.list_style = None;
            self.ctx.state = State::CommentText;
            return Flow::Continue;
        }

        if RE_COMMENT_CLOSE.is_match(line) {
            self.ctx.list_style = None;
            self.ctx.state = State::MacroDef;
            return Flow::Continue;
        }

        let (indent, content) = split_indent(line);

        let (Some(list_indent), Some(style)) =
            (self.ctx.indent.clone(), self.ctx.list_style.clone())
        else {
            return self.error("list line without an open list");
        };

        if indent != list_indent {
            if indent.len() < list_indent.len() {
                return self.error("list continuation is indented less than the list");
            }
            // Wrapped or nested content.
            return Flow::Continue;
        }

        let Some(caps) = RE_LIST_ITEM.captures(content) else {
            return self.error("expected a list item marker");
        };
        let marker = &caps[1];

        if marker == style {
            return Flow::Continue;
        }

        match (marker_number(&style), marker_number(marker)) {
            (Some(prev), Some(next)) if prev.checked_add(1) == Some(next) => {
                self.ctx.list_style = Some(marker.to_string());
                Flow::Continue
            }
            _ => self.error(format!(
                "unexpected list marker `{}` after `{}`",
                marker, style
            )),
        }
    }

    pub(super) fn comment_cmd(&mut self, line: &str) -> Flow {
        if line.is_empty() {
            return Flow::Continue;
        }

        let Some(block_indent) = self.ctx.indent.as_ref().map(String::len) else {
            return self.error("literal block without a recorded indent");
        };

        let (indent, _) = split_indent(line);
        if indent.is_empty() || indent.len() <= block_indent {
            self.ctx.state = State::CommentText;
            return self.dispatch(line);
        }

        Flow::Continue
    }

    pub(super) fn comment_param(&mut self, line: &str) -> Flow {
        if line.is_empty() {
            self.ctx.state = State::CommentEnd;
            return Flow::Continue;
        }

        if RE_COMMENT_CLOSE.is_match(line) {
            self.ctx.state = State::MacroDef;
            return Flow::Continue;
        }

        if line.starts_with(":type") {
            self.ctx.state = State::CommentType;
            self.ctx.indent = None;
            return self.dispatch(line);
        }

        if RE_PARAM_START.is_match(line) {
            return self.param_field(line);
        }

        let Some(name) = self.ctx.param_name.clone() else {
            return self.error("expected a `:param` or `:type` field");
        };

        let (indent, desc) = split_indent(line);
        let expected = self.ctx.indent.clone().unwrap_or_default();
        if expected.is_empty() && !indent.is_empty() {
            self.ctx.indent = Some(indent.to_string());
        } else if expected != indent {
            return self.error(format!(
                "continuation indent `{}` does not match `{}`",
                indent, expected
            ));
        }

        if let Some(param) = self.ctx.ledger.get_mut(&name) {
            param.description.push(desc.to_string());
        }
        Flow::Continue
    }

    fn param_field(&mut self, line: &str) -> Flow {
        let Some(caps) = RE_PARAM_FIELD.captures(line) else {
            return self.error("malformed `:param` field");
        };
        let name = &caps[2];

        if &caps[1] != " " {
            self.warn("`:param` must be followed by exactly one space");
        }

        if self.ctx.ledger.contains(name) {
            let known: Vec<&str> = self.ctx.ledger.iter().map(|(n, _)| n.as_str()).collect();
            let message = format!(
                "param `{}` is already documented (known: {})",
                name,
                known.join(", ")
            );
            return self.error(message);
        }

        self.ctx.ledger.insert(
            name,
            Param {
                description: vec![caps[3].trim().to_string()],
                seen_in_doc: true,
                ..Param::default()
            },
        );
        self.ctx.param_name = Some(name.to_string());
        self.ctx.indent = Some(String::new());
        Flow::Continue
    }

    pub(super) fn comment_type(&mut self, line: &str) -> Flow {
        let Some(caps) = RE_TYPE_FIELD.captures(line) else {
            return self.error("malformed `:type` field");
        };
        let name = &caps[2];
        let expr = &caps[3];

        if &caps[1] != " " {
            self.warn("`:type` must be followed by exactly one space");
        }

        let Some(open) = self.ctx.param_name.clone() else {
            return self.error("`:type` field without a preceding `:param`");
        };
        if name != open {
            return self.error(format!(
                "`:type {}` does not match the open `:param {}`",
                name, open
            ));
        }

        let tree = match parse_type(expr) {
            Ok(tree) => tree,
            Err(e) => return self.error(format!("cannot parse type `{}`: {}", expr, e)),
        };

        if let Some(param) = self.ctx.ledger.get_mut(name) {
            param.type_text = Some(expr.to_string());
            param.type_tree = Some(tree);
        }

        self.ctx.indent = None;
        self.ctx.param_name = None;
        self.ctx.list_style = None;
        self.ctx.state = State::CommentParam;
        Flow::Continue
    }

    pub(super) fn comment_end(&mut self, line: &str) -> Flow {
        if line.is_empty() {
            return Flow::Continue;
        }

        if RE_COMMENT_CLOSE.is_match(line) {
            self.ctx.state = State::MacroDef;
            return Flow::Continue;
        }

        self.error("expected the end of the doc comment `#}}`")
    }
}
