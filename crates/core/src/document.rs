//! Query documents and operation classification.
//!
//! Tether does not parse the query language. A document is carried as source
//! text; the only thing the engine needs to know about it is which kind of
//! operation it declares, which is the job of an [`OperationClassifier`].

use crate::error::{Error, Result};
use crate::types::OperationKind;
use std::fmt;
use std::rc::Rc;

/// The identity of a declared query.
///
/// Cloning is cheap; the source text is shared.
#[derive(Clone)]
pub struct QueryDocument {
    source: Rc<str>,
}

impl QueryDocument {
    /// Creates a document from its source text.
    pub fn new(source: impl Into<Rc<str>>) -> Self {
        Self {
            source: source.into(),
        }
    }

    /// Returns the source text.
    #[inline]
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Returns the declared operation name, if the document names one.
    pub fn operation_name(&self) -> Option<&str> {
        let rest = operation_start(&self.source).ok()?;
        let (keyword, rest) = split_word(rest);
        OperationKind::from_keyword(keyword)?;
        let (name, _) = split_word(skip_ignored(rest));
        if name.is_empty() {
            None
        } else {
            Some(name)
        }
    }
}

impl PartialEq for QueryDocument {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.source, &other.source) || self.source == other.source
    }
}

impl Eq for QueryDocument {}

impl fmt::Debug for QueryDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.operation_name() {
            Some(name) => write!(f, "QueryDocument({})", name),
            None => write!(f, "QueryDocument({:?})", self.source),
        }
    }
}

impl From<&str> for QueryDocument {
    fn from(source: &str) -> Self {
        QueryDocument::new(source)
    }
}

/// Classifies a document by the kind of operation it declares.
pub trait OperationClassifier {
    /// Returns the operation kind, or an error if the document declares none.
    fn classify(&self, document: &QueryDocument) -> Result<OperationKind>;
}

/// Classifies a document by its leading keyword.
///
/// A document that opens with a selection set (`{ ... }`) is the query
/// shorthand. Comments (`# ...`), whitespace and fragment definitions before
/// the keyword are skipped.
#[derive(Clone, Copy, Debug, Default)]
pub struct KeywordClassifier;

impl OperationClassifier for KeywordClassifier {
    fn classify(&self, document: &QueryDocument) -> Result<OperationKind> {
        let rest = operation_start(document.source())?;
        if rest.starts_with('{') {
            return Ok(OperationKind::Query);
        }
        let (keyword, _) = split_word(rest);
        OperationKind::from_keyword(keyword).ok_or_else(|| {
            Error::malformed_document(format!("unexpected token `{}`", first_token(rest)))
        })
    }
}

impl OperationKind {
    fn from_keyword(keyword: &str) -> Option<Self> {
        match keyword {
            "query" => Some(OperationKind::Query),
            "mutation" => Some(OperationKind::Mutation),
            "subscription" => Some(OperationKind::Subscription),
            _ => None,
        }
    }
}

/// Returns the source from the first operation keyword or selection set on.
fn operation_start(source: &str) -> Result<&str> {
    let mut rest = skip_ignored(source);
    let mut fragments = 0;
    loop {
        if rest.is_empty() {
            let message = if fragments > 0 {
                "document declares only fragments"
            } else {
                "document declares no operation"
            };
            return Err(Error::malformed_document(message));
        }
        match split_word(rest) {
            ("fragment", body) => {
                rest = skip_ignored(skip_selection_set(body)?);
                fragments += 1;
            }
            _ => return Ok(rest),
        }
    }
}

/// Skips past the first balanced `{ ... }` block.
fn skip_selection_set(s: &str) -> Result<&str> {
    let start = s
        .find('{')
        .ok_or_else(|| Error::malformed_document("fragment has no selection set"))?;
    let mut depth = 0usize;
    let mut chars = s[start..].char_indices();
    while let Some((idx, c)) = chars.next() {
        match c {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Ok(&s[start + idx + 1..]);
                }
            }
            '"' => {
                // Braces inside string arguments do not count.
                while let Some((_, c)) = chars.next() {
                    match c {
                        '\\' => {
                            chars.next();
                        }
                        '"' => break,
                        _ => {}
                    }
                }
            }
            '#' => {
                for (_, c) in chars.by_ref() {
                    if c == '\n' {
                        break;
                    }
                }
            }
            _ => {}
        }
    }
    Err(Error::malformed_document("unterminated fragment"))
}

fn skip_ignored(mut s: &str) -> &str {
    loop {
        s = s.trim_start_matches(|c: char| c.is_whitespace() || c == ',');
        match s.strip_prefix('#') {
            Some(comment) => s = comment.find('\n').map_or("", |idx| &comment[idx..]),
            None => return s,
        }
    }
}

fn split_word(s: &str) -> (&str, &str) {
    let end = s
        .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
        .unwrap_or(s.len());
    s.split_at(end)
}

fn first_token(s: &str) -> &str {
    let (word, _) = split_word(s);
    if word.is_empty() {
        s.chars().next().map_or("", |c| &s[..c.len_utf8()])
    } else {
        word
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classify(source: &str) -> Result<OperationKind> {
        KeywordClassifier.classify(&QueryDocument::new(source))
    }

    #[test]
    fn test_classify_keywords() {
        assert_eq!(classify("query { allPlanets { name } }").unwrap(), OperationKind::Query);
        assert_eq!(
            classify("mutation addShip { addShip(name: \"X\") { id } }").unwrap(),
            OperationKind::Mutation
        );
        assert_eq!(
            classify("subscription onShip { shipAdded { id } }").unwrap(),
            OperationKind::Subscription
        );
    }

    #[test]
    fn test_classify_shorthand_and_comments() {
        assert_eq!(classify("{ allShips { name } }").unwrap(), OperationKind::Query);
        assert_eq!(
            classify("# fetch a film\n  query film { film(id: 1) { title } }").unwrap(),
            OperationKind::Query
        );
    }

    #[test]
    fn test_classify_malformed() {
        assert!(matches!(classify(""), Err(Error::MalformedDocument { .. })));
        assert!(matches!(classify("   # only a comment"), Err(Error::MalformedDocument { .. })));

        let err = classify("fragment ShipParts on Ship { id }").unwrap_err();
        assert!(err.to_string().contains("fragment"));

        let err = classify("fragment ShipParts on Ship { id ").unwrap_err();
        assert!(err.to_string().contains("unterminated"));
        assert!(matches!(classify("subscriptions { a }"), Err(Error::MalformedDocument { .. })));
    }

    #[test]
    fn test_classify_skips_leading_fragments() {
        let source = "fragment FilmParts on Film { title }\nquery film { film { ...FilmParts } }";
        assert_eq!(classify(source).unwrap(), OperationKind::Query);
        assert_eq!(QueryDocument::new(source).operation_name(), Some("film"));

        let nested = "# parts\nfragment A on Ship { pilot { name(format: \"{x}\") } }\n\
                      fragment B on Ship { id }\n\
                      mutation addShip { addShip { ...A ...B } }";
        assert_eq!(classify(nested).unwrap(), OperationKind::Mutation);
        assert_eq!(QueryDocument::new(nested).operation_name(), Some("addShip"));

        let shorthand = "fragment A on Ship { id } { ship { ...A } }";
        assert_eq!(classify(shorthand).unwrap(), OperationKind::Query);
    }

    #[test]
    fn test_operation_name() {
        let doc = QueryDocument::new("query data($id: ID!) { film(id: $id) { title } }");
        assert_eq!(doc.operation_name(), Some("data"));

        assert_eq!(QueryDocument::new("query { a }").operation_name(), None);
        assert_eq!(QueryDocument::new("{ a }").operation_name(), None);
    }

    #[test]
    fn test_document_equality() {
        let a = QueryDocument::new("{ allPlanets { name } }");
        let b = a.clone();
        let c = QueryDocument::new("{ allPlanets { name } }");
        let d = QueryDocument::new("{ allShips { name } }");

        assert_eq!(a, b);
        assert_eq!(a, c);
        assert_ne!(a, d);
    }
}
