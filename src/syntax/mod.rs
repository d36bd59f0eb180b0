//! C# syntax layer
//!
//! The lexer and recursive-descent parser cover the subset of C# that
//! application code uses day to day. A [`SyntaxTree`] is immutable: edits go
//! through [`SyntaxTree::with_edits`], which reparses and hands back a new
//! tree.

pub mod ast;
pub mod lexer;
pub mod node;
mod parser;

pub use ast::*;
pub use lexer::{Trivia, TriviaKind};
pub use node::{SyntaxKind, SyntaxNode};

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

/// Byte range in the source text
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    pub fn contains(&self, offset: usize) -> bool {
        self.start <= offset && offset < self.end
    }

    /// Smallest span covering both
    pub fn cover(self, other: Span) -> Span {
        Span::new(self.start.min(other.start), self.end.max(other.end))
    }

    /// Slice the text this span covers
    pub fn text<'a>(&self, src: &'a str) -> &'a str {
        src.get(self.start..self.end).unwrap_or("")
    }
}

impl std::fmt::Display for Span {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}

/// A lexical or syntactic error
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyntaxError {
    pub code: &'static str,
    pub message: String,
    pub span: Span,
}

/// Maps byte offsets to 1-based line/column pairs
#[derive(Debug, Clone, Default)]
pub struct LineIndex {
    line_starts: Vec<usize>,
}

impl LineIndex {
    pub fn new(text: &str) -> Self {
        let mut line_starts = vec![0];
        line_starts.extend(text.match_indices('\n').map(|(i, _)| i + 1));
        Self { line_starts }
    }

    /// Line and column (both 1-based, column counted in characters)
    pub fn line_col(&self, text: &str, offset: usize) -> (usize, usize) {
        let line = match self.line_starts.binary_search(&offset) {
            Ok(i) => i,
            Err(i) => i - 1,
        };
        let start = self.line_starts[line];
        let column = text
            .get(start..offset.min(text.len()))
            .map(|s| s.chars().count())
            .unwrap_or(0);
        (line + 1, column + 1)
    }

    /// Text of a 1-based line without its terminator
    pub fn line_text<'a>(&self, text: &'a str, line: usize) -> Option<&'a str> {
        let start = *self.line_starts.get(line.checked_sub(1)?)?;
        let end = self
            .line_starts
            .get(line)
            .map(|next| next - 1)
            .unwrap_or(text.len());
        text.get(start..end).map(|l| l.trim_end_matches('\r'))
    }

    pub fn line_count(&self) -> usize {
        self.line_starts.len()
    }
}

/// A textual replacement applied to a tree's source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextEdit {
    pub span: Span,
    pub replacement: String,
}

impl TextEdit {
    pub fn replace(span: Span, replacement: impl Into<String>) -> Self {
        Self {
            span,
            replacement: replacement.into(),
        }
    }

    pub fn insert(offset: usize, text: impl Into<String>) -> Self {
        Self::replace(Span::new(offset, offset), text)
    }

    pub fn delete(span: Span) -> Self {
        Self::replace(span, String::new())
    }
}

/// Edit application error
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EditError {
    #[error("edit {0} is outside the source text")]
    OutOfBounds(Span),

    #[error("edits {0} and {1} overlap")]
    Overlap(Span, Span),
}

/// Immutable parsed source file
#[derive(Debug)]
pub struct SyntaxTree {
    text: Arc<str>,
    root: CompilationUnit,
    trivia: Vec<Trivia>,
    errors: Vec<SyntaxError>,
    line_index: LineIndex,
}

impl SyntaxTree {
    /// Parse source text
    pub fn parse(text: &str) -> Self {
        let lexed = lexer::lex(text);
        let mut errors = lexed.errors;
        let (root, parse_errors) = parser::parse(text, &lexed.tokens);
        errors.extend(parse_errors);
        errors.sort_by_key(|e| e.span.start);

        Self {
            text: Arc::from(text),
            root,
            trivia: lexed.trivia,
            errors,
            line_index: LineIndex::new(text),
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn root(&self) -> &CompilationUnit {
        &self.root
    }

    /// Root as a generic node
    pub fn root_node(&self) -> SyntaxNode<'_> {
        SyntaxNode::CompilationUnit(&self.root)
    }

    /// Comments and preprocessor lines in source order
    pub fn trivia(&self) -> &[Trivia] {
        &self.trivia
    }

    pub fn errors(&self) -> &[SyntaxError] {
        &self.errors
    }

    pub fn line_index(&self) -> &LineIndex {
        &self.line_index
    }

    /// Text covered by a span
    pub fn slice(&self, span: Span) -> &str {
        span.text(&self.text)
    }

    /// Apply edits and reparse. Edits refer to offsets in this tree.
    pub fn with_edits(&self, edits: &[TextEdit]) -> Result<SyntaxTree, EditError> {
        let mut sorted: Vec<&TextEdit> = edits.iter().collect();
        sorted.sort_by_key(|e| (e.span.start, e.span.end));

        for pair in sorted.windows(2) {
            if pair[0].span.end > pair[1].span.start {
                return Err(EditError::Overlap(pair[0].span, pair[1].span));
            }
        }

        let mut out = String::with_capacity(self.text.len());
        let mut cursor = 0;
        for edit in sorted {
            let span = edit.span;
            if span.end > self.text.len()
                || !self.text.is_char_boundary(span.start)
                || !self.text.is_char_boundary(span.end)
            {
                return Err(EditError::OutOfBounds(span));
            }
            out.push_str(&self.text[cursor..span.start]);
            out.push_str(&edit.replacement);
            cursor = span.end;
        }
        out.push_str(&self.text[cursor..]);

        Ok(SyntaxTree::parse(&out))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_span_helpers() {
        let span = Span::new(2, 5);
        assert_eq!(span.len(), 3);
        assert!(span.contains(2));
        assert!(!span.contains(5));
        assert_eq!(span.cover(Span::new(4, 9)), Span::new(2, 9));
        assert_eq!(span.text("abcdefg"), "cde");
    }

    #[test]
    fn test_line_index() {
        let text = "ab\ncd\n\nef";
        let index = LineIndex::new(text);
        assert_eq!(index.line_col(text, 0), (1, 1));
        assert_eq!(index.line_col(text, 4), (2, 2));
        assert_eq!(index.line_col(text, 7), (4, 1));
        assert_eq!(index.line_text(text, 2), Some("cd"));
        assert_eq!(index.line_text(text, 3), Some(""));
        assert_eq!(index.line_text(text, 4), Some("ef"));
        assert_eq!(index.line_text(text, 5), None);
    }

    #[test]
    fn test_with_edits_produces_new_tree() {
        let tree = SyntaxTree::parse("class A { }");
        let edited = tree
            .with_edits(&[TextEdit::replace(Span::new(6, 7), "B")])
            .unwrap();
        assert_eq!(tree.text(), "class A { }");
        assert_eq!(edited.text(), "class B { }");
    }

    #[test]
    fn test_with_edits_rejects_overlap() {
        let tree = SyntaxTree::parse("class A { }");
        let result = tree.with_edits(&[
            TextEdit::replace(Span::new(0, 5), "struct"),
            TextEdit::replace(Span::new(3, 7), "x"),
        ]);
        assert!(matches!(result, Err(EditError::Overlap(_, _))));
    }

    #[test]
    fn test_with_edits_rejects_out_of_bounds() {
        let tree = SyntaxTree::parse("class A { }");
        let result = tree.with_edits(&[TextEdit::insert(100, "x")]);
        assert_eq!(result.unwrap_err(), EditError::OutOfBounds(Span::new(100, 100)));
    }
}
