//! Minimal Java source scanning: the `package` declaration and the
//! `implements <Interface>` marker. Nothing here tries to parse Java beyond
//! the single line it is handed.

use regex::Regex;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PackageError {
    #[error("package declaration has no terminating ';'")]
    MissingTerminator,

    #[error("package declaration has no name")]
    MissingName,

    #[error("expected an identifier after '.', found {0}")]
    EmptySegment(String),

    #[error("unexpected {0} in package declaration")]
    Unexpected(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Token<'a> {
    Ident(&'a str),
    Dot,
    Semi,
    Other(char),
}

impl Token<'_> {
    fn describe(&self) -> String {
        match self {
            Token::Ident(s) => format!("'{s}'"),
            Token::Dot => "'.'".to_string(),
            Token::Semi => "';'".to_string(),
            Token::Other(c) => format!("'{c}'"),
        }
    }
}

fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || c == '_' || c == '$'
}

fn is_ident_part(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$'
}

struct Lexer<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> Lexer<'a> {
    fn new(src: &'a str) -> Self {
        Self { src, pos: 0 }
    }
}

impl<'a> Iterator for Lexer<'a> {
    type Item = Token<'a>;

    fn next(&mut self) -> Option<Token<'a>> {
        let rest = &self.src[self.pos..];
        let trimmed = rest.trim_start();
        self.pos += rest.len() - trimmed.len();

        let c = trimmed.chars().next()?;
        if is_ident_start(c) {
            let len = trimmed
                .find(|ch: char| !is_ident_part(ch))
                .unwrap_or(trimmed.len());
            self.pos += len;
            return Some(Token::Ident(&trimmed[..len]));
        }
        self.pos += c.len_utf8();
        Some(match c {
            '.' => Token::Dot,
            ';' => Token::Semi,
            other => Token::Other(other),
        })
    }
}

/// Parse a `package a.b.c;` declaration at the start of `line`.
///
/// Returns `Ok(None)` when the line does not begin with the `package`
/// keyword. Text after the terminating `;` is ignored.
pub fn parse_package(line: &str) -> Result<Option<String>, PackageError> {
    let mut tokens = Lexer::new(line);
    match tokens.next() {
        Some(Token::Ident("package")) => {}
        _ => return Ok(None),
    }

    let mut segments: Vec<&str> = Vec::new();
    match tokens.next() {
        Some(Token::Ident(first)) => segments.push(first),
        Some(Token::Semi) => return Err(PackageError::MissingName),
        Some(other) => return Err(PackageError::Unexpected(other.describe())),
        None => return Err(PackageError::MissingTerminator),
    }

    loop {
        match tokens.next() {
            Some(Token::Semi) => return Ok(Some(segments.join("."))),
            Some(Token::Dot) => match tokens.next() {
                Some(Token::Ident(segment)) => segments.push(segment),
                Some(other) => return Err(PackageError::EmptySegment(other.describe())),
                None => return Err(PackageError::MissingTerminator),
            },
            Some(other) => return Err(PackageError::Unexpected(other.describe())),
            None => return Err(PackageError::MissingTerminator),
        }
    }
}

/// Detects a line declaring that a class implements the given interface.
#[derive(Debug, Clone)]
pub struct ImplementsMatcher {
    keyword: Regex,
    interface: Regex,
}

impl ImplementsMatcher {
    pub fn new(interface: &str) -> Result<Self, regex::Error> {
        Ok(Self {
            keyword: Regex::new(r"\bimplements\b")?,
            interface: Regex::new(&format!(r"\b{}\b", regex::escape(interface)))?,
        })
    }

    pub fn matches(&self, line: &str) -> bool {
        self.keyword.is_match(line) && self.interface.is_match(line)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_simple_declaration() {
        assert_eq!(parse_package("package com.x;"), Ok(Some("com.x".to_string())));
    }

    #[test]
    fn tolerates_irregular_spacing_and_trailing_code() {
        assert_eq!(
            parse_package("  package   com . networknt.light ;  class Foo {}"),
            Ok(Some("com.networknt.light".to_string()))
        );
        assert_eq!(
            parse_package("package com.x; class Foo implements Rule {}"),
            Ok(Some("com.x".to_string()))
        );
    }

    #[test]
    fn ignores_lines_without_the_keyword() {
        assert_eq!(parse_package("import com.x.Y;"), Ok(None));
        assert_eq!(parse_package("packageFoo bar;"), Ok(None));
        assert_eq!(parse_package(""), Ok(None));
    }

    #[test]
    fn rejects_malformed_declarations() {
        assert_eq!(parse_package("package com.x"), Err(PackageError::MissingTerminator));
        assert_eq!(parse_package("package ;"), Err(PackageError::MissingName));
        assert!(matches!(
            parse_package("package com..x;"),
            Err(PackageError::EmptySegment(_))
        ));
        assert!(matches!(
            parse_package("package com.1x;"),
            Err(PackageError::EmptySegment(_))
        ));
        assert!(matches!(
            parse_package("package com x;"),
            Err(PackageError::Unexpected(_))
        ));
    }

    #[test]
    fn implements_matcher_requires_both_words_on_the_line() {
        let m = ImplementsMatcher::new("Rule").unwrap();
        assert!(m.matches("public class Foo implements Bar, Rule {"));
        assert!(m.matches("class Foo implements Rule {}"));
        assert!(!m.matches("class Foo implements Bar"));
        assert!(!m.matches("class Rule {"));
        assert!(!m.matches("class Foo implements RuleBase {"));
    }
}
