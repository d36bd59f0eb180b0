//! Add or remove `= default` on cancellation token parameters

use super::{find_parameter, CodeFixAction};
use crate::diagnostic::{Diagnostic, FixSafety};
use crate::syntax::{Parameter, Span, SyntaxTree, TextEdit};

const TOKEN_NAMES: [&str; 2] = ["CancellationToken", "System.Threading.CancellationToken"];

fn is_token(param: &Parameter) -> bool {
    param
        .ty
        .as_ref()
        .and_then(|t| t.dotted_name())
        .is_some_and(|name| TOKEN_NAMES.contains(&name.as_str()))
}

fn has_modifier(param: &Parameter, names: &[&str]) -> bool {
    param.modifiers.iter().any(|m| names.contains(&m.text.as_str()))
}

/// A parameter that callers must pass
fn is_required(param: &Parameter) -> bool {
    param.default.is_none() && !has_modifier(param, &["params"])
}

/// Default the token and every later token that has none
///
/// Declines when a later parameter that is not a token is still required,
/// since an optional parameter may not precede a required one.
pub fn make_optional(diagnostic: &Diagnostic, tree: &SyntaxTree) -> Vec<CodeFixAction> {
    let Some((index, params)) = find_parameter(tree, diagnostic.span) else {
        return Vec::new();
    };
    let target = &params[index];
    if target.default.is_some() || has_modifier(target, &["ref", "out", "in", "this"]) {
        return Vec::new();
    }

    let mut edits = Vec::new();
    for param in &params[index..] {
        if param.default.is_some() || has_modifier(param, &["params"]) {
            continue;
        }
        if !is_token(param) && param.id != target.id {
            return Vec::new();
        }
        if has_modifier(param, &["ref", "out", "in"]) {
            return Vec::new();
        }
        edits.push(TextEdit::insert(param.name.span.end, " = default"));
    }

    vec![CodeFixAction::new(
        format!("Make '{}' optional", target.name.text),
        "MakeCancellationTokenOptional",
        FixSafety::Safe,
        tree,
        diagnostic.span,
        edits,
    )]
}

/// Remove the token's default value
///
/// Declines when an earlier parameter is optional, since that would leave
/// an optional parameter ahead of a required one.
pub fn make_required(diagnostic: &Diagnostic, tree: &SyntaxTree) -> Vec<CodeFixAction> {
    let Some((index, params)) = find_parameter(tree, diagnostic.span) else {
        return Vec::new();
    };
    let target = &params[index];
    let Some(default) = &target.default else {
        return Vec::new();
    };
    if params[..index].iter().any(|p| !is_required(p)) {
        return Vec::new();
    }

    vec![CodeFixAction::new(
        format!("Make '{}' required", target.name.text),
        "MakeCancellationTokenRequired",
        FixSafety::Unsafe,
        tree,
        diagnostic.span,
        vec![TextEdit::delete(Span::new(
            target.name.span.end,
            default.span.end,
        ))],
    )]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cancel::Cancellation;
    use crate::compiler::{CompilerHost, SourceHost};
    use crate::rule::DiagnosticId;
    use crate::rules::analyze;
    use pretty_assertions::assert_eq;

    const PRELUDE: &str = "using System.Threading;\nusing System.Threading.Tasks;\n";

    /// Text after applying the first fix offered for `id`, or `None` when
    /// the provider declines
    fn fix(body: &str, id: DiagnosticId) -> Option<String> {
        let src = format!("{}{}", PRELUDE, body);
        let host = SourceHost::default();
        let cancel = Cancellation::new();
        let compilation = host.compile(&src, &cancel).unwrap();
        let diagnostic = analyze(&compilation, host.features(), &cancel)
            .unwrap()
            .into_iter()
            .find(|d| d.rule_id == id)
            .unwrap();
        let provide = match id {
            DiagnosticId::CancellationTokenPrivateOptional => make_optional,
            _ => make_required,
        };
        let actions = provide(&diagnostic, compilation.tree());
        let action = actions.first()?;
        let fixed = action.apply(compilation.tree()).unwrap();
        Some(fixed.text()[PRELUDE.len()..].to_string())
    }

    #[test]
    fn test_make_optional() {
        assert_eq!(
            fix(
                "class C { void M(int x, CancellationToken token) { } }",
                DiagnosticId::CancellationTokenPrivateOptional
            )
            .as_deref(),
            Some("class C { void M(int x, CancellationToken token = default) { } }")
        );
    }

    #[test]
    fn test_make_optional_defaults_later_tokens() {
        assert_eq!(
            fix(
                "class C { void M(CancellationToken a, CancellationToken b, params int[] rest) { } }",
                DiagnosticId::CancellationTokenPrivateOptional
            )
            .as_deref(),
            Some("class C { void M(CancellationToken a = default, CancellationToken b = default, params int[] rest) { } }")
        );
    }

    #[test]
    fn test_make_optional_declines_before_required_parameter() {
        assert_eq!(
            fix(
                "class C { void M(CancellationToken token, int count) { } }",
                DiagnosticId::CancellationTokenPrivateOptional
            ),
            None
        );
    }

    #[test]
    fn test_make_required() {
        assert_eq!(
            fix(
                "public class C { public void M(int x, CancellationToken token = default) { } }",
                DiagnosticId::CancellationTokenNonPrivateRequired
            )
            .as_deref(),
            Some("public class C { public void M(int x, CancellationToken token) { } }")
        );
    }

    #[test]
    fn test_make_required_declines_after_optional_parameter() {
        assert_eq!(
            fix(
                "public class C { public void M(int x = 0, CancellationToken token = default) { } }",
                DiagnosticId::CancellationTokenNonPrivateRequired
            ),
            None
        );
    }

    #[test]
    fn test_actions_are_classified() {
        let src = format!("{}class C {{ void M(CancellationToken token) {{ }} }}", PRELUDE);
        let tree = SyntaxTree::parse(&src);
        let name = src.find("token)").unwrap();
        let diagnostic = Diagnostic::new(
            DiagnosticId::CancellationTokenPrivateOptional,
            crate::diagnostic::Severity::Warning,
            "",
            Span::new(name, name + "token".len()),
        );
        let actions = make_optional(&diagnostic, &tree);
        assert_eq!(actions.len(), 1);
        assert_eq!(actions[0].safety, FixSafety::Safe);
        assert_eq!(actions[0].equivalence_key, "MakeCancellationTokenOptional");
        assert_eq!(actions[0].title, "Make 'token' optional");
    }
}
