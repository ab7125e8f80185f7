//! A module implementing lexical analysis (tokenization) for the command line.
//!
//! Tokens are maximal runs of non-delimiter characters. There is no quoting and no
//! escaping, so a delimiter can never appear inside a token. Tokens borrow from the
//! line they were split from; the line itself is never modified.

use std::iter::FusedIterator;

/// The single character that separates tokens.
pub const DELIMITER: char = ' ';

/// Lazy sequence of tokens over an immutable line.
///
/// The iterator is cheap to clone, and a clone restarts from the position it was
/// taken at, so the same line can be walked any number of times.
#[derive(Debug, Clone)]
pub struct Tokens<'a> {
    rest: &'a str,
}

impl<'a> Tokens<'a> {
    /// Creates a token sequence over `line`.
    pub fn new(line: &'a str) -> Self {
        Tokens { rest: line }
    }
}

impl<'a> Iterator for Tokens<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<&'a str> {
        let trimmed = self.rest.trim_start_matches(DELIMITER);
        if trimmed.is_empty() {
            self.rest = trimmed;
            return None;
        }
        let end = trimmed.find(DELIMITER).unwrap_or(trimmed.len());
        let (token, rest) = trimmed.split_at(end);
        self.rest = rest;
        Some(token)
    }
}

impl FusedIterator for Tokens<'_> {}

/// The main entry point function to perform lexical analysis.
///
/// A line made only of delimiters produces zero tokens.
pub fn split_into_tokens(line: &str) -> Tokens<'_> {
    Tokens::new(line)
}
