//! Raw SQL fragments with named placeholders

use std::borrow::Cow;

use crate::lexer::{tokenize, TokenKind};

/// Piece of a raw fragment
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawSegment {
    Text(String),
    /// `:name` or `:name.a.b`
    Placeholder { name: String, path: Vec<String> },
}

/// A raw fragment split into text and placeholders
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawSql {
    pub segments: Vec<RawSegment>,
}

impl RawSql {
    /// Parse a fragment; outside of literals, line breaks and the blanks
    /// around them collapse to one space
    pub fn parse(sql: &str) -> Self {
        let source = sql.trim();
        let mut segments: Vec<RawSegment> = Vec::new();
        for token in tokenize(source) {
            let text = token.text(source);
            match token.kind {
                TokenKind::Eof => break,
                TokenKind::Placeholder => {
                    let mut parts = text[1..].split('.').map(str::to_string);
                    let name = parts.next().unwrap_or_default();
                    segments.push(RawSegment::Placeholder {
                        name,
                        path: parts.collect(),
                    });
                }
                kind => {
                    let text = match kind {
                        TokenKind::Text => collapse_line_breaks(text),
                        _ => Cow::Borrowed(text),
                    };
                    match segments.last_mut() {
                        Some(RawSegment::Text(last)) => last.push_str(&text),
                        _ => segments.push(RawSegment::Text(text.into_owned())),
                    }
                }
            }
        }
        Self { segments }
    }

    /// Names of referenced parameters in occurrence order
    pub fn parameter_names(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|s| match s {
            RawSegment::Placeholder { name, .. } => Some(name.as_str()),
            RawSegment::Text(_) => None,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }
}

/// Replace every whitespace run that spans a line break with one space
fn collapse_line_breaks(text: &str) -> Cow<'_, str> {
    if !text.contains('\n') {
        return Cow::Borrowed(text);
    }
    let mut out = String::with_capacity(text.len());
    let mut run = String::new();
    for c in text.chars() {
        if c.is_whitespace() {
            run.push(c);
            continue;
        }
        push_run(&mut out, &mut run);
        out.push(c);
    }
    push_run(&mut out, &mut run);
    Cow::Owned(out)
}

fn push_run(out: &mut String, run: &mut String) {
    if run.contains('\n') {
        out.push(' ');
    } else {
        out.push_str(run);
    }
    run.clear();
}
