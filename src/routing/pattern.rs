//! Route pattern parsing.
//!
//! A pattern is split into tokens: runs of literal text, named parameters
//! (`:name`, one segment) and a trailing wildcard (`*name`, rest of path).
//! Markers are only special at the start of a segment.

use std::sync::Arc;

use crate::error::RouteError;

pub(crate) const PARAM_MARKER: u8 = b':';
pub(crate) const WILDCARD_MARKER: u8 = b'*';

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Token {
    Static(String),
    Param(Arc<str>),
    Wildcard(Arc<str>),
}

/// Parsed route pattern.
#[derive(Debug, Clone)]
pub(crate) struct Pattern {
    pub tokens: Vec<Token>,
    pub param_count: usize,
}

pub(crate) fn parse(pattern: &str) -> Result<Pattern, RouteError> {
    if !pattern.starts_with('/') {
        return Err(RouteError::invalid(pattern, "must begin with '/'"));
    }

    let mut tokens = Vec::new();
    let mut names: Vec<Arc<str>> = Vec::new();
    let mut literal = String::new();
    let mut segments = pattern[1..].split('/').peekable();
    literal.push('/');

    while let Some(segment) = segments.next() {
        let is_last = segments.peek().is_none();

        match segment.as_bytes().first() {
            Some(&PARAM_MARKER) | Some(&WILDCARD_MARKER) => {
                let name = &segment[1..];
                if name.is_empty() {
                    return Err(RouteError::invalid(pattern, "parameter names must be non-empty"));
                }
                if names.iter().any(|n| &**n == name) {
                    return Err(RouteError::invalid(
                        pattern,
                        format!("duplicate parameter name '{}'", name),
                    ));
                }

                if !literal.is_empty() {
                    tokens.push(Token::Static(std::mem::take(&mut literal)));
                }

                let name: Arc<str> = Arc::from(name);
                names.push(name.clone());

                if segment.as_bytes()[0] == WILDCARD_MARKER {
                    if !is_last {
                        return Err(RouteError::invalid(
                            pattern,
                            "a wildcard must be the final segment",
                        ));
                    }
                    tokens.push(Token::Wildcard(name));
                } else {
                    tokens.push(Token::Param(name));
                }
            }
            _ => literal.push_str(segment),
        }

        if !is_last {
            literal.push('/');
        }
    }

    if !literal.is_empty() {
        tokens.push(Token::Static(literal));
    }

    Ok(Pattern {
        param_count: names.len(),
        tokens,
    })
}

/// Flip the trailing slash of `path`: `/foo` becomes `/foo/` and back.
pub(crate) fn toggle_trailing_slash(path: &str) -> Option<String> {
    if path.len() <= 1 {
        return None;
    }
    match path.strip_suffix('/') {
        Some(stripped) => Some(stripped.to_string()),
        None => {
            let mut toggled = String::with_capacity(path.len() + 1);
            toggled.push_str(path);
            toggled.push('/');
            Some(toggled)
        }
    }
}
