//! In-source suppression
//!
//! Two forms are recognized:
//! - `#pragma warning disable [ids]` ... `#pragma warning restore [ids]`
//!   regions, where no ids means every rule
//! - `// tasklint-disable-next-line [ids]` for the following line

use crate::diagnostic::Diagnostic;
use crate::syntax::{Span, SyntaxTree, TriviaKind};
use once_cell::sync::Lazy;
use std::collections::{HashMap, HashSet};

use regex::Regex;

static PRAGMA: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^#\s*pragma\s+warning\s+(disable|restore)\b\s*([\w\s,]*)")
        .expect("pragma pattern")
});

static NEXT_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^//\s*tasklint-disable-next-line\b\s*([\w\s,]*)").expect("next-line pattern")
});

/// Byte range where `ids` (all rules when empty) are suppressed
#[derive(Debug, Clone, PartialEq, Eq)]
struct Region {
    span: Span,
    ids: Option<String>,
}

/// Suppressions found in one file
#[derive(Debug, Clone, Default)]
pub struct Suppressions {
    regions: Vec<Region>,
    /// line -> ids (empty = all)
    next_line: HashMap<usize, HashSet<String>>,
}

fn parse_ids(list: &str) -> Vec<String> {
    list.split(|c: char| c == ',' || c.is_whitespace())
        .filter(|s| !s.is_empty())
        .map(str::to_lowercase)
        .collect()
}

impl Suppressions {
    pub fn from_tree(tree: &SyntaxTree) -> Self {
        let text = tree.text();
        let mut regions = Vec::new();
        let mut next_line: HashMap<usize, HashSet<String>> = HashMap::new();
        let mut all_since: Option<usize> = None;
        let mut open: HashMap<String, usize> = HashMap::new();

        for trivia in tree.trivia() {
            let written = tree.slice(trivia.span);
            match trivia.kind {
                TriviaKind::Directive => {
                    let Some(caps) = PRAGMA.captures(written) else {
                        continue;
                    };
                    let ids = parse_ids(caps.get(2).map_or("", |m| m.as_str()));
                    let disable = &caps[1] == "disable";
                    match (disable, ids.is_empty()) {
                        (true, true) => {
                            all_since.get_or_insert(trivia.span.end);
                        }
                        (true, false) => {
                            for id in ids {
                                open.entry(id).or_insert(trivia.span.end);
                            }
                        }
                        (false, true) => {
                            if let Some(start) = all_since.take() {
                                regions.push(Region {
                                    span: Span::new(start, trivia.span.start),
                                    ids: None,
                                });
                            }
                            for (id, start) in open.drain() {
                                regions.push(Region {
                                    span: Span::new(start, trivia.span.start),
                                    ids: Some(id),
                                });
                            }
                        }
                        (false, false) => {
                            for id in ids {
                                if let Some(start) = open.remove(&id) {
                                    regions.push(Region {
                                        span: Span::new(start, trivia.span.start),
                                        ids: Some(id),
                                    });
                                }
                            }
                        }
                    }
                }
                TriviaKind::LineComment => {
                    if let Some(caps) = NEXT_LINE.captures(written) {
                        let (line, _) = tree.line_index().line_col(text, trivia.span.start);
                        next_line
                            .entry(line + 1)
                            .or_default()
                            .extend(parse_ids(caps.get(1).map_or("", |m| m.as_str())));
                    }
                }
                TriviaKind::BlockComment => {}
            }
        }

        let end = text.len() + 1;
        if let Some(start) = all_since {
            regions.push(Region {
                span: Span::new(start, end),
                ids: None,
            });
        }
        for (id, start) in open {
            regions.push(Region {
                span: Span::new(start, end),
                ids: Some(id),
            });
        }

        Self { regions, next_line }
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty() && self.next_line.is_empty()
    }

    /// Whether `id` is suppressed at `offset` on `line` (1-based)
    pub fn is_suppressed(&self, id: &str, offset: usize, line: usize) -> bool {
        let id = id.to_lowercase();
        let in_region = self.regions.iter().any(|r| {
            r.span.contains(offset) && r.ids.as_ref().is_none_or(|ids| *ids == id)
        });
        in_region
            || self
                .next_line
                .get(&line)
                .is_some_and(|ids| ids.is_empty() || ids.contains(&id))
    }

    /// Drop suppressed diagnostics reported on `tree`
    pub fn retain(&self, tree: &SyntaxTree, diagnostics: &mut Vec<Diagnostic>) {
        if self.is_empty() {
            return;
        }
        diagnostics.retain(|d| {
            let (line, _) = tree.line_index().line_col(tree.text(), d.span.start);
            !self.is_suppressed(d.rule_id.as_str(), d.span.start, line)
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn offset(src: &str, needle: &str) -> usize {
        src.find(needle).unwrap()
    }

    #[test]
    fn test_pragma_region_for_one_id() {
        let src = "class C {
#pragma warning disable DroppedTask
    void A() { }
#pragma warning restore DroppedTask
    void B() { }
}";
        let tree = SyntaxTree::parse(src);
        let s = Suppressions::from_tree(&tree);
        assert!(s.is_suppressed("DroppedTask", offset(src, "void A"), 3));
        assert!(!s.is_suppressed("CancellationTokenPrivateOptional", offset(src, "void A"), 3));
        assert!(!s.is_suppressed("DroppedTask", offset(src, "void B"), 5));
        assert!(!s.is_suppressed("DroppedTask", offset(src, "class"), 1));
    }

    #[test]
    fn test_pragma_without_ids_runs_to_end_of_file() {
        let src = "class C {\n#pragma warning disable\n    void A() { }\n}";
        let tree = SyntaxTree::parse(src);
        let s = Suppressions::from_tree(&tree);
        assert!(s.is_suppressed("droppedtask", offset(src, "void A"), 3));
        assert!(s.is_suppressed("MustImplementIHandleMessages", src.len() - 1, 4));
    }

    #[test]
    fn test_multiple_ids_and_partial_restore() {
        let src = "class C {
#pragma warning disable DroppedTask, CS1998
    void A() { }
#pragma warning restore CS1998
    void B() { }
}";
        let tree = SyntaxTree::parse(src);
        let s = Suppressions::from_tree(&tree);
        assert!(s.is_suppressed("CS1998", offset(src, "void A"), 3));
        assert!(!s.is_suppressed("CS1998", offset(src, "void B"), 5));
        assert!(s.is_suppressed("DroppedTask", offset(src, "void B"), 5));
    }

    #[test]
    fn test_next_line_comment() {
        let src = "class C {
    // tasklint-disable-next-line DroppedTask
    void A() { }
    void B() { }
}";
        let tree = SyntaxTree::parse(src);
        let s = Suppressions::from_tree(&tree);
        assert!(s.is_suppressed("DroppedTask", offset(src, "void A"), 3));
        assert!(!s.is_suppressed("DroppedTask", offset(src, "void B"), 4));
        assert!(!s.is_suppressed("CancellationTokenPrivateOptional", offset(src, "void A"), 3));
    }

    #[test]
    fn test_no_suppressions() {
        let tree = SyntaxTree::parse("// plain comment\nclass C { }");
        assert!(Suppressions::from_tree(&tree).is_empty());
    }
}
