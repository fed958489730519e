//! Macro documentation checker - line-by-line state machine.
//!
//! Each physical line is dispatched in the current [`State`]. A handler may
//! decide the line belongs to the next state and re-dispatch it (or the rest
//! of it) without consuming another line. Diagnostics are collected into a
//! [`FileReport`]; the first fatal one stops the scan of that file.

mod body;
mod comment;

use crate::diagnostic::{Diagnostic, Severity};
use crate::guard;
use crate::ledger::Ledger;
use log::debug;
use regex::Regex;
use std::fmt;
use std::sync::LazyLock;

// -- Regex patterns -----------------------------------------------------------

static RE_MACRO_START: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\{\{%-? macro ").unwrap());

static RE_ENDMACRO: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\{\{%-?\s+endmacro\s+-?%\}\}$").unwrap());

// -- State --------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    PreComment,
    CommentText,
    CommentList,
    CommentCmd,
    CommentParam,
    CommentType,
    CommentEnd,
    MacroDef,
    MacroBody,
    MacroBodyStatement,
    MacroBodyExpression,
}

impl State {
    fn in_comment(self) -> bool {
        matches!(
            self,
            State::CommentText
                | State::CommentList
                | State::CommentCmd
                | State::CommentParam
                | State::CommentType
                | State::CommentEnd
        )
    }

    fn in_body(self) -> bool {
        matches!(
            self,
            State::MacroBody | State::MacroBodyStatement | State::MacroBodyExpression
        )
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

// -- Options and results ------------------------------------------------------

/// Knobs for one checking run.
#[derive(Debug, Clone)]
pub struct CheckOptions {
    /// 2: warn on boolean tests of non-bool parameters. 3: require docs.
    pub level: u8,
    /// Collect type guards for documented parameters at each macro close.
    pub emit_guards: bool,
}

impl Default for CheckOptions {
    fn default() -> Self {
        Self {
            level: 1,
            emit_guards: false,
        }
    }
}

/// Guard statements generated for one documented parameter.
#[derive(Debug, Clone)]
pub struct GuardBlock {
    pub macro_name: String,
    pub param: String,
    pub statements: Vec<String>,
}

/// Outcome of checking one file.
#[derive(Debug, Default)]
pub struct FileReport {
    pub file: String,
    pub diagnostics: Vec<Diagnostic>,
    pub guards: Vec<GuardBlock>,
    /// Macros that closed without a fatal diagnostic.
    pub macros: usize,
}

impl FileReport {
    pub fn is_fatal(&self) -> bool {
        self.diagnostics.iter().any(Diagnostic::is_fatal)
    }
}

// -- Context ------------------------------------------------------------------

/// Mutable state threaded through the scan of one file.
#[derive(Debug)]
struct CheckContext {
    file: String,
    lineno: usize,
    line: String,
    state: State,
    /// Indent recorded for list, literal block or `:param` continuation.
    indent: Option<String>,
    /// `:param` field currently open.
    param_name: Option<String>,
    last_blank: bool,
    list_style: Option<String>,
    macro_name: Option<String>,
    ledger: Ledger,
}

impl CheckContext {
    fn new(file: &str) -> Self {
        Self {
            file: file.to_string(),
            lineno: 0,
            line: String::new(),
            state: State::PreComment,
            indent: None,
            param_name: None,
            last_blank: false,
            list_style: None,
            macro_name: None,
            ledger: Ledger::default(),
        }
    }

    /// Forget the current macro and go back to scanning between macros.
    fn reset(&mut self) {
        self.state = State::PreComment;
        self.indent = None;
        self.param_name = None;
        self.last_blank = false;
        self.list_style = None;
        self.macro_name = None;
        self.ledger.clear();
    }
}

/// Whether the dispatcher keeps going after a line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Halt,
}

// -- Checker ------------------------------------------------------------------

struct Checker<'o> {
    opts: &'o CheckOptions,
    ctx: CheckContext,
    report: FileReport,
}

/// Check every macro in `source`, reporting positions against `file`.
pub fn check_source(file: &str, source: &str, opts: &CheckOptions) -> FileReport {
    let mut checker = Checker {
        opts,
        ctx: CheckContext::new(file),
        report: FileReport {
            file: file.to_string(),
            ..FileReport::default()
        },
    };

    for (idx, raw) in source.lines().enumerate() {
        checker.ctx.lineno = idx + 1;
        checker.ctx.line = raw.trim_end().to_string();
        let line = checker.ctx.line.clone();
        if checker.dispatch_line(&line) == Flow::Halt {
            return checker.report;
        }
        checker.ctx.last_blank = line.is_empty();
    }

    checker.finish();
    checker.report
}

impl Checker<'_> {
    /// Entry point for a whole physical line. `endmacro` only counts when it
    /// is the entire line, never the tail left over by a re-dispatch.
    fn dispatch_line(&mut self, line: &str) -> Flow {
        if RE_ENDMACRO.is_match(line) {
            self.trace(line);
            return self.close_macro();
        }
        self.dispatch(line)
    }

    fn dispatch(&mut self, line: &str) -> Flow {
        self.trace(line);

        match self.ctx.state {
            State::PreComment => self.pre_comment(line),
            State::CommentText => self.comment_text(line),
            State::CommentList => self.comment_list(line),
            State::CommentCmd => self.comment_cmd(line),
            State::CommentParam => self.comment_param(line),
            State::CommentType => self.comment_type(line),
            State::CommentEnd => self.comment_end(line),
            State::MacroDef => self.macro_def(line),
            State::MacroBody => self.macro_body(line),
            State::MacroBodyStatement => self.body_continuation(body::Construct::Statement, line),
            State::MacroBodyExpression => {
                self.body_continuation(body::Construct::Expression, line)
            }
        }
    }

    fn trace(&self, line: &str) {
        debug!(
            "{}:{} {} {}",
            self.ctx.file, self.ctx.lineno, self.ctx.state, line
        );
    }

    fn push_diagnostic(&mut self, severity: Severity, message: String) {
        self.report.diagnostics.push(Diagnostic {
            severity,
            file: self.ctx.file.clone(),
            line: self.ctx.lineno,
            state: self.ctx.state,
            message,
            text: self.ctx.line.clone(),
        });
    }

    fn error(&mut self, message: impl Into<String>) -> Flow {
        self.push_diagnostic(Severity::Error, message.into());
        Flow::Halt
    }

    fn warn(&mut self, message: impl Into<String>) {
        self.push_diagnostic(Severity::Warning, message.into());
    }

    /// Handle `endmacro`: run the consistency sweep and start over.
    fn close_macro(&mut self) -> Flow {
        if !self.ctx.state.in_body() {
            return self.error("endmacro outside of a macro body");
        }

        let findings = self.ctx.ledger.sweep(self.opts.level);
        let fatal = findings.iter().any(|f| f.severity == Severity::Error);
        for finding in findings {
            self.push_diagnostic(finding.severity, finding.message);
        }
        if fatal {
            return Flow::Halt;
        }

        let macro_name = self.ctx.macro_name.clone().unwrap_or_default();
        for (name, param) in self.ctx.ledger.iter() {
            debug!(
                "{} {}: {} desc={:?}",
                macro_name,
                name,
                param,
                param.description.join(" ")
            );
        }

        if self.opts.emit_guards {
            for (name, param) in self.ctx.ledger.iter() {
                if let Some(tree) = &param.type_tree {
                    self.report.guards.push(GuardBlock {
                        macro_name: macro_name.clone(),
                        param: name.clone(),
                        statements: guard::guards(tree, name),
                    });
                }
            }
        }

        self.report.macros += 1;
        self.ctx.reset();
        Flow::Continue
    }

    /// End of input: a doc comment or macro body must not be left open, and a
    /// doc comment with `:param` fields must be followed by its macro.
    fn finish(&mut self) {
        let state = self.ctx.state;
        if state.in_comment() {
            self.error("file ends inside a doc comment");
        } else if state.in_body() {
            let name = self.ctx.macro_name.clone().unwrap_or_default();
            self.error(format!("file ends inside macro `{}`", name));
        } else if self.ctx.ledger.iter().any(|(_, p)| p.seen_in_doc) {
            self.error("file ends after a doc comment without a macro header");
        }
    }
}

/// Split a line into its leading whitespace and the rest.
fn split_indent(line: &str) -> (&str, &str) {
    let content = line.trim_start();
    (&line[..line.len() - content.len()], content)
}

#[cfg(test)]
mod tests {
    use super::*;

    pub(super) fn check(source: &str) -> FileReport {
        check_source("test.jinja", source, &CheckOptions::default())
    }

    pub(super) fn check_level(source: &str, level: u8) -> FileReport {
        let opts = CheckOptions {
            level,
            ..CheckOptions::default()
        };
        check_source("test.jinja", source, &opts)
    }

    pub(super) fn messages(report: &FileReport) -> Vec<String> {
        report
            .diagnostics
            .iter()
            .map(|d| d.message.clone())
            .collect()
    }

    const GREET: &str = "\
{{#
    Say hello.

:param name: Who to greet.
:type name: str
#}}
{{%- macro greet(name) %}}
Hello {{{ name }}}!
{{%- endmacro %}}
";

    #[test]
    fn minimal_macro_is_clean() {
        let report = check(GREET);
        assert!(report.diagnostics.is_empty(), "{:?}", report.diagnostics);
        assert_eq!(report.macros, 1);
    }

    #[test]
    fn extra_header_param_is_unused() {
        let source = GREET.replace("greet(name)", "greet(name, age)");
        let report = check(&source);
        assert!(report.is_fatal());
        let msgs = messages(&report);
        assert_eq!(msgs.len(), 1);
        assert!(msgs[0].contains("`age`"));
        assert!(msgs[0].contains("declared but unused"));
        assert_eq!(report.diagnostics[0].line, 9);
    }

    #[test]
    fn undocumented_unused_param_is_reported_as_unused() {
        let source = "\
{{%- macro f(x) %}}
nothing here
{{%- endmacro %}}
";
        let msgs = messages(&check(source));
        assert_eq!(msgs.len(), 1);
        assert!(msgs[0].contains("declared but unused"));
        assert!(!msgs[0].contains("documented"));
    }

    #[test]
    fn documented_param_missing_from_header() {
        let source = "\
{{#
:param y: A number.
:type y: int
#}}
{{%- macro f() %}}
body
{{%- endmacro %}}
";
        let msgs = messages(&check(source));
        assert_eq!(msgs.len(), 1);
        assert!(msgs[0].contains("`y` is documented but not a real parameter"));
    }

    #[test]
    fn each_file_starts_fresh_after_endmacro() {
        let source = format!("{}\n{}", GREET, GREET);
        let report = check(&source);
        assert!(report.diagnostics.is_empty(), "{:?}", report.diagnostics);
        assert_eq!(report.macros, 2);
    }

    #[test]
    fn endmacro_outside_body_is_fatal() {
        let report = check("{{%- endmacro %}}\n");
        assert_eq!(messages(&report), vec!["endmacro outside of a macro body"]);
        assert_eq!(report.diagnostics[0].state, State::PreComment);
    }

    #[test]
    fn unterminated_macro_is_fatal() {
        let report = check("{{%- macro f() %}}\nbody\n");
        assert!(report.is_fatal());
        assert_eq!(messages(&report), vec!["file ends inside macro `f`"]);
    }

    #[test]
    fn unterminated_comment_is_fatal() {
        let report = check("{{#\nsome text\n");
        assert_eq!(messages(&report), vec!["file ends inside a doc comment"]);
    }

    #[test]
    fn doc_comment_without_macro_is_fatal() {
        let report = check("{{#\n:param a: One.\n:type a: str\n#}}\n");
        assert_eq!(
            messages(&report),
            vec!["file ends after a doc comment without a macro header"]
        );
        assert_eq!(report.diagnostics[0].state, State::MacroDef);

        let report = check("{{#\n:param a: One.\n#}}\n\n");
        assert_eq!(report.diagnostics[0].state, State::PreComment);

        // Free text only: nothing is lost.
        assert!(check("{{#\nJust notes.\n#}}\n").diagnostics.is_empty());
    }

    #[test]
    fn endmacro_must_be_the_whole_line() {
        let source = "\
{{%- macro f(a) %}}
{{{ a
}}}{{%- endmacro %}}
{{%- macro g(b) %}}
";
        let report = check(source);
        assert_eq!(report.macros, 0);
        assert_eq!(
            messages(&report),
            vec!["macro defined inside another macro body"]
        );
        assert_eq!(report.diagnostics[0].line, 4);
    }

    #[test]
    fn scan_stops_at_first_fatal() {
        let source = "\
{{%- macro f(a) %}}
{{%- endmacro %}}
{{%- macro g(b) %}}
{{%- endmacro %}}
";
        let report = check(source);
        assert_eq!(report.diagnostics.len(), 1);
        assert!(report.diagnostics[0].message.contains("`a`"));
    }

    #[test]
    fn implicit_params_are_exempt_from_docs() {
        let source = "\
{{%- macro wrap(caller) %}}
{{{ caller() }}}
{{%- endmacro %}}
";
        let report = check_level(source, 3);
        assert!(report.diagnostics.is_empty(), "{:?}", report.diagnostics);
    }

    #[test]
    fn strict_level_requires_docs() {
        let source = "\
{{%- macro f(a) %}}
{{{ a }}}
{{%- endmacro %}}
";
        assert!(check_level(source, 2).diagnostics.is_empty());
        let msgs = messages(&check_level(source, 3));
        assert_eq!(msgs.len(), 1);
        assert!(msgs[0].contains("`a` is undocumented"));
    }

    #[test]
    fn guards_collected_when_requested() {
        let opts = CheckOptions {
            emit_guards: true,
            ..CheckOptions::default()
        };
        let report = check_source("test.jinja", GREET, &opts);
        assert_eq!(report.guards.len(), 1);
        assert_eq!(report.guards[0].macro_name, "greet");
        assert_eq!(report.guards[0].param, "name");
        assert_eq!(report.guards[0].statements[0], "if name is not string");
    }

    #[test]
    fn split_indent_keeps_content() {
        assert_eq!(split_indent("   * item"), ("   ", "* item"));
        assert_eq!(split_indent("text"), ("", "text"));
    }
}
