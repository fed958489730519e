//! Type grammar for `:type NAME:` fields.
//!
//! ```text
//! type  := union
//! union := atom ('|' atom)*
//! atom  := SCALAR | 'list' '[' union ']' | 'dict' '[' union ',' union ']'
//! ```
//!
//! Parsing never yields a union nested directly inside another union: every
//! alternative is an atom.

use std::fmt;
use thiserror::Error;

// -- Type tree ----------------------------------------------------------------

/// Scalar vocabulary of the template engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scalar {
    Bool,
    Char,
    Float,
    Int,
    Str,
    None,
}

impl Scalar {
    /// Look up a scalar by name. `None` is accepted as a spelling of `none`.
    pub fn from_name(name: &str) -> Option<Scalar> {
        match name {
            "bool" => Some(Scalar::Bool),
            "char" => Some(Scalar::Char),
            "float" => Some(Scalar::Float),
            "int" => Some(Scalar::Int),
            "str" => Some(Scalar::Str),
            "none" | "None" => Some(Scalar::None),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Scalar::Bool => "bool",
            Scalar::Char => "char",
            Scalar::Float => "float",
            Scalar::Int => "int",
            Scalar::Str => "str",
            Scalar::None => "none",
        }
    }
}

/// Parsed `:type` expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeTree {
    Scalar(Scalar),
    List(Box<TypeTree>),
    Map(Box<TypeTree>, Box<TypeTree>),
    /// Alternatives in source order; never empty, never nested.
    Union(Vec<TypeTree>),
}

/// Type implied by a default value in a macro header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefaultKind {
    Bool,
    Int,
    Str,
    List,
    Dict,
}

impl DefaultKind {
    pub fn name(self) -> &'static str {
        match self {
            DefaultKind::Bool => "bool",
            DefaultKind::Int => "int",
            DefaultKind::Str => "str",
            DefaultKind::List => "list",
            DefaultKind::Dict => "dict",
        }
    }
}

impl TypeTree {
    /// Whether a value of the given default kind satisfies this type.
    /// A documented `char` accepts a string default.
    pub fn admits(&self, kind: DefaultKind) -> bool {
        match self {
            TypeTree::Scalar(scalar) => matches!(
                (scalar, kind),
                (Scalar::Bool, DefaultKind::Bool)
                    | (Scalar::Int, DefaultKind::Int)
                    | (Scalar::Str, DefaultKind::Str)
                    | (Scalar::Char, DefaultKind::Str)
            ),
            TypeTree::List(_) => kind == DefaultKind::List,
            TypeTree::Map(_, _) => kind == DefaultKind::Dict,
            TypeTree::Union(alternatives) => alternatives.iter().any(|alt| alt.admits(kind)),
        }
    }
}

impl fmt::Display for TypeTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeTree::Scalar(scalar) => f.write_str(scalar.name()),
            TypeTree::List(elem) => write!(f, "list[{}]", elem),
            TypeTree::Map(key, value) => write!(f, "dict[{}, {}]", key, value),
            TypeTree::Union(alternatives) => {
                for (i, alt) in alternatives.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" | ")?;
                    }
                    write!(f, "{}", alt)?;
                }
                Ok(())
            }
        }
    }
}

// -- Errors -------------------------------------------------------------------

/// Why a type expression failed to parse. Offsets are byte positions in the
/// trimmed expression.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TypeError {
    #[error("empty type at offset {offset}")]
    Empty { offset: usize },

    #[error("unknown type `{name}` at offset {offset}")]
    Unknown { name: String, offset: usize },

    #[error("expected `[` after `{name}` at offset {offset}")]
    ExpectedBracket { name: String, offset: usize },

    #[error("unterminated `[` at offset {offset}")]
    Unterminated { offset: usize },

    #[error("unmatched `]` at offset {offset}")]
    Unmatched { offset: usize },

    #[error("unexpected `,` at offset {offset}")]
    UnexpectedComma { offset: usize },

    #[error("dict needs exactly one key/value separator, found {found} at offset {offset}")]
    DictArity { found: usize, offset: usize },

    #[error("unexpected `{text}` at offset {offset}")]
    Trailing { text: String, offset: usize },
}

// -- Tokenizer ----------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
enum Tok<'a> {
    Word(&'a str),
    Pipe,
    Comma,
    Open,
    Close,
}

#[derive(Debug, Clone)]
struct Token<'a> {
    tok: Tok<'a>,
    offset: usize,
}

impl Token<'_> {
    fn text(&self) -> &str {
        match self.tok {
            Tok::Word(w) => w,
            Tok::Pipe => "|",
            Tok::Comma => ",",
            Tok::Open => "[",
            Tok::Close => "]",
        }
    }
}

/// Split on `| , [ ]`, keeping them as tokens and trimming the words between.
fn tokenize(input: &str) -> Vec<Token<'_>> {
    let mut tokens = Vec::new();
    let mut word_start = 0;

    for (i, c) in input.char_indices() {
        let tok = match c {
            '|' => Tok::Pipe,
            ',' => Tok::Comma,
            '[' => Tok::Open,
            ']' => Tok::Close,
            _ => continue,
        };
        push_word(&mut tokens, input, word_start, i);
        tokens.push(Token { tok, offset: i });
        word_start = i + 1;
    }
    push_word(&mut tokens, input, word_start, input.len());
    tokens
}

fn push_word<'a>(tokens: &mut Vec<Token<'a>>, input: &'a str, start: usize, end: usize) {
    let raw = &input[start..end];
    let word = raw.trim();
    if !word.is_empty() {
        let lead = raw.len() - raw.trim_start().len();
        tokens.push(Token {
            tok: Tok::Word(word),
            offset: start + lead,
        });
    }
}

// -- Parser -------------------------------------------------------------------

/// Parse a type expression such as `list[dict[str, int | none]] | str`.
pub fn parse_type(input: &str) -> Result<TypeTree, TypeError> {
    let input = input.trim();
    let tokens = tokenize(input);

    // Single known scalar short-circuits.
    if let [Token {
        tok: Tok::Word(word),
        ..
    }] = tokens.as_slice()
    {
        if let Some(scalar) = Scalar::from_name(word) {
            return Ok(TypeTree::Scalar(scalar));
        }
    }

    parse_union(&tokens, 0)
}

/// Split `tokens` at every top-level occurrence of `sep`, tracking bracket
/// depth. Each part carries the offset where it starts.
fn split_top_level<'t, 'a>(
    tokens: &'t [Token<'a>],
    sep: &Tok<'a>,
) -> Result<Vec<(&'t [Token<'a>], usize)>, TypeError> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    let mut part_offset = tokens.first().map_or(0, |t| t.offset);

    for (i, token) in tokens.iter().enumerate() {
        match token.tok {
            Tok::Open => depth += 1,
            Tok::Close => {
                if depth == 0 {
                    return Err(TypeError::Unmatched {
                        offset: token.offset,
                    });
                }
                depth -= 1;
            }
            _ if depth == 0 && token.tok == *sep => {
                parts.push((&tokens[start..i], part_offset));
                start = i + 1;
                part_offset = token.offset + 1;
            }
            _ => {}
        }
    }

    if depth != 0 {
        let open = tokens
            .iter()
            .rev()
            .find(|t| t.tok == Tok::Open)
            .map_or(0, |t| t.offset);
        return Err(TypeError::Unterminated { offset: open });
    }

    parts.push((&tokens[start..], part_offset));
    Ok(parts)
}

fn parse_union(tokens: &[Token<'_>], offset: usize) -> Result<TypeTree, TypeError> {
    if tokens.is_empty() {
        return Err(TypeError::Empty { offset });
    }

    let parts = split_top_level(tokens, &Tok::Pipe)?;
    let mut alternatives = Vec::with_capacity(parts.len());
    for (part, part_offset) in parts {
        alternatives.push(parse_atom(part, part_offset)?);
    }

    if alternatives.len() == 1 {
        Ok(alternatives.remove(0))
    } else {
        Ok(TypeTree::Union(alternatives))
    }
}

fn parse_atom(tokens: &[Token<'_>], offset: usize) -> Result<TypeTree, TypeError> {
    let Some(head) = tokens.first() else {
        return Err(TypeError::Empty { offset });
    };

    let name = match head.tok {
        Tok::Word(word) => word,
        Tok::Comma => {
            return Err(TypeError::UnexpectedComma {
                offset: head.offset,
            })
        }
        Tok::Close => {
            return Err(TypeError::Unmatched {
                offset: head.offset,
            })
        }
        _ => {
            return Err(TypeError::Trailing {
                text: head.text().to_string(),
                offset: head.offset,
            })
        }
    };

    if let Some(scalar) = Scalar::from_name(name) {
        return match tokens.get(1) {
            None => Ok(TypeTree::Scalar(scalar)),
            Some(next) => Err(trailing_or_comma(next)),
        };
    }

    if name != "list" && name != "dict" {
        return Err(TypeError::Unknown {
            name: name.to_string(),
            offset: head.offset,
        });
    }

    let (inner, inner_offset) = bracketed(name, tokens)?;

    if name == "list" {
        let parts = split_top_level(inner, &Tok::Comma)?;
        if parts.len() > 1 {
            let comma = inner
                .iter()
                .find(|t| t.tok == Tok::Comma)
                .map_or(inner_offset, |t| t.offset);
            return Err(TypeError::UnexpectedComma { offset: comma });
        }
        let elem = parse_union(inner, inner_offset)?;
        return Ok(TypeTree::List(Box::new(elem)));
    }

    let parts = split_top_level(inner, &Tok::Comma)?;
    if parts.len() != 2 {
        return Err(TypeError::DictArity {
            found: parts.len() - 1,
            offset: inner_offset,
        });
    }
    let (key_tokens, key_offset) = parts[0];
    let (value_tokens, value_offset) = parts[1];
    let key = parse_union(key_tokens, key_offset)?;
    let value = parse_union(value_tokens, value_offset)?;
    Ok(TypeTree::Map(Box::new(key), Box::new(value)))
}

/// Return the tokens between `NAME [` and its matching `]`, which must be the
/// last token of the atom.
fn bracketed<'t, 'a>(
    name: &str,
    tokens: &'t [Token<'a>],
) -> Result<(&'t [Token<'a>], usize), TypeError> {
    let open = match tokens.get(1) {
        Some(t) if t.tok == Tok::Open => t,
        Some(t) => {
            return Err(TypeError::ExpectedBracket {
                name: name.to_string(),
                offset: t.offset,
            })
        }
        None => {
            return Err(TypeError::ExpectedBracket {
                name: name.to_string(),
                offset: tokens[0].offset + name.len(),
            })
        }
    };

    let mut depth = 0usize;
    for (i, token) in tokens.iter().enumerate().skip(1) {
        match token.tok {
            Tok::Open => depth += 1,
            Tok::Close => {
                depth -= 1;
                if depth == 0 {
                    if let Some(extra) = tokens.get(i + 1) {
                        return Err(trailing_or_comma(extra));
                    }
                    return Ok((&tokens[2..i], open.offset + 1));
                }
            }
            _ => {}
        }
    }

    Err(TypeError::Unterminated {
        offset: open.offset,
    })
}

fn trailing_or_comma(token: &Token<'_>) -> TypeError {
    match token.tok {
        Tok::Comma => TypeError::UnexpectedComma {
            offset: token.offset,
        },
        Tok::Close => TypeError::Unmatched {
            offset: token.offset,
        },
        _ => TypeError::Trailing {
            text: token.text().to_string(),
            offset: token.offset,
        },
    }
}
