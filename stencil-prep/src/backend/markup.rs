//! Backend for plain markup templates (XML and text)
//!
//! Scans expression blocks such as `{%= client.name %}`, `{%if paid%}` and
//! `{%for item in items%}` and records the variable paths they reference.
//! Archive formats are rejected; they need a backend that can unpack them.
//!
//! Supports:
//! - value blocks (`{%= path %}`)
//! - conditionals (`if`, `unless`, `else`, `else if`)
//! - loops, with loop variables resolved to `source[]` paths
//! - `end` closing the innermost block

use std::collections::BTreeSet;
use std::io::Read;

use once_cell::sync::Lazy;
use regex::Regex;

use super::{ParseResult, ParsingBackend};
use crate::config::MarkupConfig;
use crate::error::ParsingError;
use crate::formats::DocumentFormat;

/// Payload key holding the template text
pub const CONTENT_KEY: &str = "content";

/// Dotted variable path, each key optionally followed by `[]`
static VARIABLE_PATH: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z_][\w-]*(\[\])*(\.[A-Za-z_][\w-]*(\[\])*)*$")
        .expect("Invalid regex pattern for variable paths")
});

/// Parser for XML and plain text templates
#[derive(Debug)]
pub struct MarkupBackend {
    block: Regex,
}

impl Default for MarkupBackend {
    fn default() -> Self {
        Self::from_config(&MarkupConfig::default())
    }
}

impl MarkupBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a backend using the configured block delimiters
    pub fn from_config(config: &MarkupConfig) -> Self {
        let (open, close) = config.delimiters();
        let block = Regex::new(&format!(
            r"(?s){}(.*?){}",
            regex::escape(open),
            regex::escape(close)
        ))
        .expect("Invalid regex pattern for block delimiters");
        Self { block }
    }

    /// Collect the variable paths referenced by `text`.
    pub fn scan(&self, text: &str) -> Result<BTreeSet<String>, ParsingError> {
        let mut found = BTreeSet::new();
        let mut scopes: Vec<Scope> = Vec::new();

        for cap in self.block.captures_iter(text) {
            let Some(whole) = cap.get(0) else { continue };
            let body = cap.get(1).map_or("", |m| m.as_str()).trim();
            // Only counted when reporting an error
            let line = || line_of(text, whole.start());

            match classify(body) {
                Block::Value(expr) => {
                    if self.is_path(expr) {
                        found.insert(resolve(expr, &scopes));
                    }
                }
                Block::Condition(expr) => {
                    if self.is_path(expr) {
                        found.insert(resolve(expr, &scopes));
                    }
                    scopes.push(Scope::Branch);
                }
                Block::ElseIf(expr) => {
                    if scopes.is_empty() {
                        return Err(ParsingError::new(format!(
                            "line {}: 'else' outside of a block",
                            line()
                        )));
                    }
                    if self.is_path(expr) {
                        found.insert(resolve(expr, &scopes));
                    }
                }
                Block::Else => {
                    if scopes.is_empty() {
                        return Err(ParsingError::new(format!(
                            "line {}: 'else' outside of a block",
                            line()
                        )));
                    }
                }
                Block::Loop { var, source } => {
                    if !self.is_path(source) {
                        return Err(ParsingError::new(format!(
                            "line {}: invalid loop source '{source}'",
                            line()
                        )));
                    }
                    let source = resolve(source, &scopes);
                    found.insert(format!("{source}[]"));
                    scopes.push(Scope::Loop {
                        var: var.to_string(),
                        source,
                    });
                }
                Block::MalformedLoop => {
                    return Err(ParsingError::new(format!(
                        "line {}: expected 'for <name> in <path>'",
                        line()
                    )));
                }
                Block::End => {
                    if scopes.pop().is_none() {
                        return Err(ParsingError::new(format!(
                            "line {}: 'end' without an open block",
                            line()
                        )));
                    }
                }
                Block::Other => {}
            }
        }

        if !scopes.is_empty() {
            return Err(ParsingError::new(format!(
                "{} block(s) not closed before end of template",
                scopes.len()
            )));
        }

        Ok(found)
    }

    fn is_path(&self, expr: &str) -> bool {
        VARIABLE_PATH.is_match(expr)
    }
}

impl ParsingBackend for MarkupBackend {
    fn parse(&self, format: DocumentFormat, input: &mut dyn Read) -> anyhow::Result<ParseResult> {
        if format.is_archive() {
            return Err(ParsingError::new(format!(
                "no markup parser for {format} documents"
            ))
            .into());
        }

        let mut bytes = Vec::new();
        input.read_to_end(&mut bytes)?;
        let text = String::from_utf8(bytes)
            .map_err(|e| ParsingError::wrapping("template is not valid UTF-8", e))?;

        let variables = self.scan(&text)?;
        tracing::debug!(%format, variables = variables.len(), "scanned markup template");

        Ok(ParseResult::new()
            .with_variables(variables)
            .with_payload(CONTENT_KEY, text))
    }
}

enum Scope {
    Branch,
    Loop { var: String, source: String },
}

enum Block<'a> {
    Value(&'a str),
    Condition(&'a str),
    ElseIf(&'a str),
    Else,
    Loop { var: &'a str, source: &'a str },
    MalformedLoop,
    End,
    Other,
}

fn classify(body: &str) -> Block<'_> {
    if let Some(expr) = body.strip_prefix('=') {
        return Block::Value(expr.trim());
    }

    let (keyword, rest) = match body.split_once(char::is_whitespace) {
        Some((keyword, rest)) => (keyword, rest.trim()),
        None => (body, ""),
    };

    match keyword {
        "if" | "unless" => Block::Condition(rest),
        "else" => match rest.strip_prefix("if") {
            Some(expr) if expr.starts_with(char::is_whitespace) => Block::ElseIf(expr.trim()),
            _ => Block::Else,
        },
        "for" => {
            let mut words = rest.split_whitespace();
            match (words.next(), words.next(), words.next(), words.next()) {
                (Some(var), Some("in"), Some(source), None) => Block::Loop { var, source },
                _ => Block::MalformedLoop,
            }
        }
        "end" => Block::End,
        _ => Block::Other,
    }
}

/// Rewrite paths rooted at a loop variable onto the loop source.
fn resolve(path: &str, scopes: &[Scope]) -> String {
    let head_end = path.find(['.', '[']).unwrap_or(path.len());
    let (head, rest) = path.split_at(head_end);
    for scope in scopes.iter().rev() {
        if let Scope::Loop { var, source } = scope
            && var == head
        {
            return format!("{source}[]{rest}");
        }
    }
    path.to_string()
}

fn line_of(text: &str, offset: usize) -> usize {
    text[..offset].matches('\n').count() + 1
}
