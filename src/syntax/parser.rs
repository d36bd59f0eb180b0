//! Recursive-descent parser
//!
//! Ambiguous constructs (generic names, casts, lambdas, local declarations)
//! are resolved by speculative parsing: the parser records its position,
//! tries one reading, and rewinds if the reading does not fit.

use super::ast::*;
use super::lexer::{Token, TokenKind};
use super::{Span, SyntaxError};

/// Keywords that can never be identifiers
const RESERVED: &[&str] = &[
    "abstract", "as", "base", "bool", "break", "byte", "case", "catch", "char", "checked",
    "class", "const", "continue", "decimal", "default", "delegate", "do", "double", "else",
    "enum", "event", "explicit", "extern", "false", "finally", "fixed", "float", "for",
    "foreach", "goto", "if", "implicit", "in", "int", "interface", "internal", "is", "lock",
    "long", "namespace", "new", "null", "object", "operator", "out", "override", "params",
    "private", "protected", "public", "readonly", "ref", "return", "sbyte", "sealed", "short",
    "sizeof", "stackalloc", "static", "string", "struct", "switch", "this", "throw", "true",
    "try", "typeof", "uint", "ulong", "unchecked", "unsafe", "ushort", "using", "virtual",
    "void", "volatile", "while",
];

const PREDEFINED: &[&str] = &[
    "bool", "byte", "sbyte", "char", "decimal", "double", "float", "int", "uint", "long",
    "ulong", "short", "ushort", "object", "string", "void", "nint", "nuint",
];

/// Nesting at which an expression or statement is abandoned with `CS8078`
///
/// Left-deep chains (`a + b + ...`, `x.A().B()...`) count one level per link.
const MAX_DEPTH: usize = 100;

/// Tokens that start a member declaration; used to bail out of a block
/// whose closing brace is missing
const MEMBER_START: &[&str] = &[
    "public", "private", "protected", "internal", "class", "struct", "interface", "namespace",
    "enum", "override", "virtual", "abstract",
];

pub(super) fn parse(src: &str, tokens: &[Token]) -> (CompilationUnit, Vec<SyntaxError>) {
    let mut parser = Parser {
        src,
        tokens,
        pos: 0,
        next_id: 0,
        depth: 0,
        errors: Vec::new(),
    };
    let unit = parser.compilation_unit();
    (unit, parser.errors)
}

struct Parser<'a> {
    src: &'a str,
    tokens: &'a [Token],
    pos: usize,
    next_id: u32,
    depth: usize,
    errors: Vec<SyntaxError>,
}

#[derive(Clone, Copy)]
struct Checkpoint {
    pos: usize,
    errors: usize,
}

impl<'a> Parser<'a> {
    // ---- token helpers ----

    fn nth(&self, n: usize) -> Token {
        let last = self.tokens.len() - 1;
        self.tokens[(self.pos + n).min(last)]
    }

    fn tok(&self) -> Token {
        self.nth(0)
    }

    fn kind(&self) -> TokenKind {
        self.tok().kind
    }

    fn nth_kind(&self, n: usize) -> TokenKind {
        self.nth(n).kind
    }

    fn text_of(&self, token: Token) -> &'a str {
        let raw = token.span.text(self.src);
        if token.verbatim {
            &raw[1..]
        } else {
            raw
        }
    }

    fn nth_is_kw(&self, n: usize, kw: &str) -> bool {
        let t = self.nth(n);
        t.kind == TokenKind::Ident && !t.verbatim && t.span.text(self.src) == kw
    }

    fn at_kw(&self, kw: &str) -> bool {
        self.nth_is_kw(0, kw)
    }

    fn at_any_kw(&self, kws: &[&str]) -> bool {
        kws.iter().any(|kw| self.at_kw(kw))
    }

    /// Identifier usable as a name
    fn nth_is_ident(&self, n: usize) -> bool {
        let t = self.nth(n);
        t.kind == TokenKind::Ident
            && (t.verbatim || !RESERVED.contains(&t.span.text(self.src)))
    }

    fn at_ident(&self) -> bool {
        self.nth_is_ident(0)
    }

    fn at(&self, kind: TokenKind) -> bool {
        self.kind() == kind
    }

    /// Next token starts exactly where the current one ends
    fn next_adjacent(&self) -> bool {
        self.nth(0).span.end == self.nth(1).span.start
    }

    fn bump(&mut self) -> Token {
        let t = self.tok();
        if t.kind != TokenKind::Eof {
            self.pos += 1;
        }
        t
    }

    fn eat(&mut self, kind: TokenKind) -> Option<Token> {
        if self.at(kind) {
            Some(self.bump())
        } else {
            None
        }
    }

    fn eat_kw(&mut self, kw: &str) -> Option<Token> {
        if self.at_kw(kw) {
            Some(self.bump())
        } else {
            None
        }
    }

    fn start(&self) -> usize {
        self.tok().span.start
    }

    fn prev_end(&self) -> usize {
        if self.pos == 0 {
            0
        } else {
            self.tokens[self.pos - 1].span.end
        }
    }

    fn span_from(&self, start: usize) -> Span {
        Span::new(start, self.prev_end().max(start))
    }

    fn id(&mut self) -> NodeId {
        let id = NodeId(self.next_id);
        self.next_id += 1;
        id
    }

    fn checkpoint(&self) -> Checkpoint {
        Checkpoint {
            pos: self.pos,
            errors: self.errors.len(),
        }
    }

    fn rewind(&mut self, cp: Checkpoint) {
        self.pos = cp.pos;
        self.errors.truncate(cp.errors);
    }

    // ---- errors ----

    fn error_at(&mut self, span: Span, code: &'static str, message: String) {
        // one error per position keeps recovery from cascading
        if self.errors.last().is_some_and(|e| e.span.start == span.start) {
            return;
        }
        self.errors.push(SyntaxError {
            code,
            message,
            span,
        });
    }

    fn error_missing(&mut self, code: &'static str, message: &str) {
        let at = self.prev_end();
        self.error_at(Span::new(at, at), code, message.to_string());
    }

    fn error_here(&mut self, code: &'static str, message: String) {
        let span = self.tok().span;
        self.error_at(span, code, message);
    }

    // ---- nesting ----

    /// Enter one level of nesting; past the limit reports `CS8078` and
    /// refuses
    fn descend(&mut self) -> bool {
        if self.depth >= MAX_DEPTH {
            self.error_here(
                "CS8078",
                "An expression is too long or complex to compile".to_string(),
            );
            return false;
        }
        self.depth += 1;
        true
    }

    /// Run `parse` one level deeper; `None` past the limit
    fn nested<T>(&mut self, parse: impl FnOnce(&mut Self) -> T) -> Option<T> {
        let depth = self.depth;
        if !self.descend() {
            return None;
        }
        let node = parse(self);
        self.depth = depth;
        Some(node)
    }

    /// Skip to the end of the enclosing expression
    fn skip_expression(&mut self) {
        let mut nesting = 0usize;
        loop {
            match self.kind() {
                TokenKind::Eof => return,
                TokenKind::LParen | TokenKind::LBracket | TokenKind::LBrace => nesting += 1,
                TokenKind::RParen | TokenKind::RBracket | TokenKind::RBrace => {
                    if nesting == 0 {
                        return;
                    }
                    nesting -= 1;
                }
                TokenKind::Semi | TokenKind::Comma if nesting == 0 => return,
                _ => {}
            }
            self.bump();
        }
    }

    /// Skip the rest of a statement with its `else`, `catch` and `finally`
    /// continuations
    fn skip_statement(&mut self) {
        let mut nesting = 0usize;
        loop {
            match self.kind() {
                TokenKind::Eof => return,
                TokenKind::LParen | TokenKind::LBracket | TokenKind::LBrace => nesting += 1,
                TokenKind::RParen | TokenKind::RBracket if nesting > 0 => nesting -= 1,
                TokenKind::RBrace if nesting > 0 => {
                    nesting -= 1;
                    if nesting == 0 {
                        self.bump();
                        if self.at_any_kw(&["else", "catch", "finally"]) {
                            continue;
                        }
                        return;
                    }
                }
                TokenKind::RParen | TokenKind::RBracket | TokenKind::RBrace => return,
                TokenKind::Semi if nesting == 0 => {
                    self.bump();
                    if self.at_kw("else") {
                        continue;
                    }
                    return;
                }
                _ => {}
            }
            self.bump();
        }
    }

    fn too_complex_expr(&mut self) -> Expr {
        self.skip_expression();
        self.missing_expr()
    }

    fn expect(&mut self, kind: TokenKind) -> bool {
        if self.eat(kind).is_some() {
            return true;
        }
        let (code, message) = match kind {
            TokenKind::Semi => ("CS1002", "; expected".to_string()),
            TokenKind::RBrace => ("CS1513", "} expected".to_string()),
            TokenKind::LBrace => ("CS1514", "{ expected".to_string()),
            TokenKind::RParen => ("CS1026", ") expected".to_string()),
            other => (
                "CS1003",
                format!("Syntax error, '{}' expected", punct_text(other)),
            ),
        };
        self.error_missing(code, &message);
        false
    }

    fn expect_ident(&mut self) -> Ident {
        if self.at_ident() {
            let t = self.bump();
            return Ident {
                text: self.text_of(t).to_string(),
                span: t.span,
            };
        }
        self.error_missing("CS1001", "Identifier expected");
        let at = self.prev_end();
        Ident {
            text: String::new(),
            span: Span::new(at, at),
        }
    }

    fn ident_token(&mut self) -> Ident {
        let t = self.bump();
        Ident {
            text: self.text_of(t).to_string(),
            span: t.span,
        }
    }

    // ---- compilation unit & namespaces ----

    fn compilation_unit(&mut self) -> CompilationUnit {
        let id = self.id();
        let usings = self.usings();
        let mut members = Vec::new();
        loop {
            self.members_until(TokenKind::Eof, &mut members);
            if self.at(TokenKind::Eof) {
                break;
            }
            // stray closing brace at top level
            self.error_here(
                "CS1022",
                "Type or namespace definition, or end-of-file expected".to_string(),
            );
            self.bump();
        }
        CompilationUnit {
            id,
            span: Span::new(0, self.src.len()),
            usings,
            members,
        }
    }

    fn usings(&mut self) -> Vec<UsingDirective> {
        let mut usings = Vec::new();
        loop {
            let start = self.start();
            let global = self.at_kw("global") && self.nth_is_kw(1, "using");
            if !(self.at_kw("using") || global) {
                break;
            }
            if global {
                self.bump();
            }
            self.bump();
            let is_static = self.eat_kw("static").is_some();
            let alias = if self.at_ident() && self.nth_kind(1) == TokenKind::Eq {
                let alias = self.ident_token();
                self.bump();
                Some(alias)
            } else {
                None
            };
            let name = self.required_type();
            self.expect(TokenKind::Semi);
            let id = self.id();
            usings.push(UsingDirective {
                id,
                span: self.span_from(start),
                is_static,
                alias,
                name,
            });
        }
        usings
    }

    fn members_until(&mut self, end: TokenKind, members: &mut Vec<Member>) {
        loop {
            self.skip_attributes();
            if self.at(end) || self.at(TokenKind::Eof) || self.at(TokenKind::RBrace) {
                return;
            }
            if self.eat(TokenKind::Semi).is_some() {
                continue;
            }
            let before = self.pos;
            let member = self.member();
            if self.pos == before {
                let text = self.tok().span.text(self.src).to_string();
                self.error_here(
                    "CS1519",
                    format!(
                        "Invalid token '{}' in class, record, struct, or interface member declaration",
                        text
                    ),
                );
                self.bump();
                continue;
            }
            members.extend(member);
        }
    }

    fn skip_attributes(&mut self) {
        while self.at(TokenKind::LBracket) {
            self.skip_balanced(TokenKind::LBracket, TokenKind::RBracket);
        }
    }

    /// Skip a bracketed region including nested pairs
    fn skip_balanced(&mut self, open: TokenKind, close: TokenKind) {
        let mut depth = 0usize;
        loop {
            let kind = self.kind();
            if kind == TokenKind::Eof {
                self.expect(close);
                return;
            }
            self.bump();
            if kind == open {
                depth += 1;
            } else if kind == close {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return;
                }
            }
        }
    }

    fn modifiers(&mut self) -> Modifiers {
        let mut list = Vec::new();
        loop {
            let t = self.tok();
            if t.kind != TokenKind::Ident || t.verbatim {
                break;
            }
            let Some(kind) = ModifierKind::from_keyword(t.span.text(self.src)) else {
                break;
            };
            // contextual modifiers must be followed by another word
            let contextual = matches!(
                kind,
                ModifierKind::Async
                    | ModifierKind::Partial
                    | ModifierKind::Required
                    | ModifierKind::File
            );
            if contextual && self.nth_kind(1) != TokenKind::Ident {
                break;
            }
            self.bump();
            list.push(Modifier { kind, span: t.span });
        }
        Modifiers { list }
    }

    fn member(&mut self) -> Option<Member> {
        let start = self.start();
        let modifiers = self.modifiers();

        if self.at_kw("namespace") {
            return Some(Member::Namespace(self.namespace(start)));
        }
        if let Some(keyword) = self.type_keyword() {
            return Some(Member::Type(self.type_decl(start, modifiers, keyword)));
        }
        if self.at_kw("delegate") {
            return Some(Member::Delegate(self.delegate_decl(start, modifiers)));
        }
        if self.at(TokenKind::Tilde) && self.nth_is_ident(1) {
            self.bump();
            let mut name = self.ident_token();
            name.text.insert(0, '~');
            return Some(Member::Constructor(self.constructor(start, modifiers, name)));
        }
        if self.at_ident() && self.nth_kind(1) == TokenKind::LParen {
            let name = self.ident_token();
            return Some(Member::Constructor(self.constructor(start, modifiers, name)));
        }
        if self.at_kw("operator") {
            // conversion operator: implicit/explicit already taken as modifiers
            let keyword = self.ident_token();
            let return_type = self.required_type();
            return Some(Member::Method(self.method_rest(
                start,
                modifiers,
                return_type,
                None,
                keyword,
                Vec::new(),
            )));
        }

        if modifiers.is_empty() && !self.starts_type() {
            return None;
        }
        let ty = self.required_type();

        if self.at_kw("operator") {
            let keyword = self.ident_token();
            while !self.at(TokenKind::LParen) && !self.at(TokenKind::Eof) && !self.at(TokenKind::LBrace)
            {
                self.bump();
            }
            return Some(Member::Method(self.method_rest(
                start,
                modifiers,
                ty,
                None,
                keyword,
                Vec::new(),
            )));
        }

        if self.at_kw("this") && self.nth_kind(1) == TokenKind::LBracket {
            let name = self.ident_token();
            let params = self.parameter_list(TokenKind::LBracket, TokenKind::RBracket);
            return Some(Member::Property(self.property_rest(
                start,
                modifiers,
                ty,
                None,
                name,
                Some(params),
            )));
        }

        let (explicit_interface, name, type_params) = self.member_name();

        match self.kind() {
            TokenKind::LParen => Some(Member::Method(self.method_rest(
                start,
                modifiers,
                ty,
                explicit_interface,
                name,
                type_params,
            ))),
            TokenKind::LBrace | TokenKind::Arrow => Some(Member::Property(self.property_rest(
                start,
                modifiers,
                ty,
                explicit_interface,
                name,
                None,
            ))),
            _ => Some(Member::Field(self.field_rest(start, modifiers, ty, name))),
        }
    }

    fn starts_type(&self) -> bool {
        self.at_ident()
            || self.at(TokenKind::LParen)
            || PREDEFINED.iter().any(|p| self.at_kw(p))
    }

    fn namespace(&mut self, start: usize) -> NamespaceDecl {
        self.bump();
        let name = self.required_type();
        let id = self.id();
        if self.eat(TokenKind::Semi).is_some() {
            let usings = self.usings();
            let mut members = Vec::new();
            self.members_until(TokenKind::Eof, &mut members);
            return NamespaceDecl {
                id,
                span: self.span_from(start),
                name,
                file_scoped: true,
                usings,
                members,
            };
        }
        self.expect(TokenKind::LBrace);
        let usings = self.usings();
        let mut members = Vec::new();
        self.members_until(TokenKind::RBrace, &mut members);
        self.expect(TokenKind::RBrace);
        self.eat(TokenKind::Semi);
        NamespaceDecl {
            id,
            span: self.span_from(start),
            name,
            file_scoped: false,
            usings,
            members,
        }
    }

    fn type_keyword(&mut self) -> Option<TypeKeyword> {
        let keyword = if self.at_kw("class") {
            TypeKeyword::Class
        } else if self.at_kw("struct") {
            TypeKeyword::Struct
        } else if self.at_kw("interface") {
            TypeKeyword::Interface
        } else if self.at_kw("enum") {
            TypeKeyword::Enum
        } else if self.at_kw("record") && (self.nth_is_ident(1) || self.nth_is_kw(1, "struct") || self.nth_is_kw(1, "class")) {
            if self.nth_is_kw(1, "struct") {
                self.bump();
                TypeKeyword::RecordStruct
            } else {
                if self.nth_is_kw(1, "class") {
                    self.bump();
                }
                TypeKeyword::Record
            }
        } else {
            return None;
        };
        self.bump();
        Some(keyword)
    }

    fn type_decl(&mut self, start: usize, modifiers: Modifiers, keyword: TypeKeyword) -> TypeDecl {
        let id = self.id();
        let name = self.expect_ident();
        let type_params = self.type_parameters();
        let primary_params = if self.at(TokenKind::LParen) {
            Some(self.parameter_list(TokenKind::LParen, TokenKind::RParen))
        } else {
            None
        };
        let base_list = if self.at(TokenKind::Colon) {
            Some(self.base_list())
        } else {
            None
        };
        self.skip_constraints();

        let mut members = Vec::new();
        let mut open_brace = None;
        let mut close_brace = None;

        if keyword == TypeKeyword::Enum {
            if self.at(TokenKind::LBrace) {
                open_brace = Some(self.tok().span);
                self.skip_balanced(TokenKind::LBrace, TokenKind::RBrace);
                close_brace = Some(Span::new(self.prev_end() - 1, self.prev_end()));
            } else {
                self.expect(TokenKind::LBrace);
            }
        } else if self.eat(TokenKind::Semi).is_some() {
            return TypeDecl {
                id,
                span: self.span_from(start),
                modifiers,
                keyword,
                name,
                type_params,
                primary_params,
                base_list,
                members,
                open_brace,
                close_brace,
            };
        } else if let Some(open) = self.eat(TokenKind::LBrace) {
            open_brace = Some(open.span);
            self.members_until(TokenKind::RBrace, &mut members);
            if let Some(close) = self.eat(TokenKind::RBrace) {
                close_brace = Some(close.span);
            } else {
                self.expect(TokenKind::RBrace);
            }
        } else {
            self.expect(TokenKind::LBrace);
        }
        self.eat(TokenKind::Semi);

        TypeDecl {
            id,
            span: self.span_from(start),
            modifiers,
            keyword,
            name,
            type_params,
            primary_params,
            base_list,
            members,
            open_brace,
            close_brace,
        }
    }

    fn type_parameters(&mut self) -> Vec<Ident> {
        let mut params = Vec::new();
        if self.eat(TokenKind::Lt).is_none() {
            return params;
        }
        loop {
            self.skip_attributes();
            if self.at_kw("in") || self.at_kw("out") {
                self.bump();
            }
            params.push(self.expect_ident());
            if self.eat(TokenKind::Comma).is_none() {
                break;
            }
        }
        self.expect(TokenKind::Gt);
        params
    }

    fn skip_constraints(&mut self) {
        while self.at_kw("where") {
            self.bump();
            while !matches!(
                self.kind(),
                TokenKind::LBrace | TokenKind::Semi | TokenKind::Arrow | TokenKind::Eof
            ) && !self.at_kw("where")
            {
                self.bump();
            }
        }
    }

    fn base_list(&mut self) -> BaseList {
        let start = self.start();
        self.bump();
        let mut types = Vec::new();
        loop {
            let type_start = self.start();
            let ty = self.required_type();
            let args = if self.at(TokenKind::LParen) {
                Some(self.argument_list(TokenKind::LParen, TokenKind::RParen))
            } else {
                None
            };
            let id = self.id();
            types.push(BaseType {
                id,
                span: self.span_from(type_start),
                ty,
                args,
            });
            if self.eat(TokenKind::Comma).is_none() {
                break;
            }
        }
        BaseList {
            span: self.span_from(start),
            types,
        }
    }

    fn delegate_decl(&mut self, start: usize, modifiers: Modifiers) -> DelegateDecl {
        self.bump();
        let id = self.id();
        let return_type = self.required_type();
        let name = self.expect_ident();
        let type_params = self.type_parameters();
        let params = self.parameter_list(TokenKind::LParen, TokenKind::RParen);
        self.skip_constraints();
        self.expect(TokenKind::Semi);
        DelegateDecl {
            id,
            span: self.span_from(start),
            modifiers,
            return_type,
            name,
            type_params,
            params,
        }
    }

    fn constructor(&mut self, start: usize, modifiers: Modifiers, name: Ident) -> ConstructorDecl {
        let id = self.id();
        let params = self.parameter_list(TokenKind::LParen, TokenKind::RParen);
        let initializer = if self.eat(TokenKind::Colon).is_some() {
            if self.at_kw("base") || self.at_kw("this") {
                self.bump();
            } else {
                self.error_here("CS1018", "Keyword 'this' or 'base' expected".to_string());
            }
            Some(self.argument_list(TokenKind::LParen, TokenKind::RParen))
        } else {
            None
        };
        let (body, expr_body) = self.body();
        ConstructorDecl {
            id,
            span: self.span_from(start),
            modifiers,
            name,
            params,
            initializer,
            body,
            expr_body,
        }
    }

    /// `{ ... }`, `=> expr;` or `;`
    fn body(&mut self) -> (Option<Block>, Option<Expr>) {
        if self.at(TokenKind::LBrace) {
            (Some(self.block()), None)
        } else if self.eat(TokenKind::Arrow).is_some() {
            let expr = self.expression();
            self.expect(TokenKind::Semi);
            (None, Some(expr))
        } else {
            self.expect(TokenKind::Semi);
            (None, None)
        }
    }

    /// `Name`, `Name<T>`, or `IFoo<T>.Name<U>`
    fn member_name(&mut self) -> (Option<TypeSyntax>, Ident, Vec<Ident>) {
        let mut segments: Vec<NameSegment> = Vec::new();
        let last = loop {
            let seg_start = self.start();
            let ident = self.expect_ident();
            let type_args = if self.at(TokenKind::Lt) {
                let cp = self.checkpoint();
                match self.type_argument_list() {
                    Some(args) => args,
                    None => {
                        self.rewind(cp);
                        Vec::new()
                    }
                }
            } else {
                Vec::new()
            };
            let segment = NameSegment {
                ident,
                type_args,
                span: self.span_from(seg_start),
            };
            if self.at(TokenKind::Dot) && self.nth_is_ident(1) {
                self.bump();
                segments.push(segment);
                continue;
            }
            break segment;
        };

        let type_params = last
            .type_args
            .iter()
            .filter_map(|t| t.simple_name().cloned())
            .collect();
        let explicit_interface = if segments.is_empty() {
            None
        } else {
            let span = segments[0].span.cover(segments[segments.len() - 1].span);
            Some(TypeSyntax {
                id: self.id(),
                span,
                kind: TypeSyntaxKind::Named(segments),
            })
        };
        (explicit_interface, last.ident, type_params)
    }

    fn method_rest(
        &mut self,
        start: usize,
        modifiers: Modifiers,
        return_type: TypeSyntax,
        explicit_interface: Option<TypeSyntax>,
        name: Ident,
        type_params: Vec<Ident>,
    ) -> MethodDecl {
        let id = self.id();
        let params = self.parameter_list(TokenKind::LParen, TokenKind::RParen);
        self.skip_constraints();
        let (body, expr_body) = self.body();
        MethodDecl {
            id,
            span: self.span_from(start),
            modifiers,
            return_type,
            explicit_interface,
            name,
            type_params,
            params,
            body,
            expr_body,
        }
    }

    fn property_rest(
        &mut self,
        start: usize,
        modifiers: Modifiers,
        ty: TypeSyntax,
        explicit_interface: Option<TypeSyntax>,
        name: Ident,
        params: Option<ParameterList>,
    ) -> PropertyDecl {
        let id = self.id();
        let mut accessors = Vec::new();
        let mut expr_body = None;
        let mut initializer = None;

        if self.eat(TokenKind::Arrow).is_some() {
            expr_body = Some(self.expression());
            self.expect(TokenKind::Semi);
        } else if self.expect(TokenKind::LBrace) {
            while !self.at(TokenKind::RBrace) && !self.at(TokenKind::Eof) {
                let acc_start = self.start();
                self.skip_attributes();
                self.modifiers();
                if !self.at(TokenKind::Ident) {
                    self.error_here("CS1014", "A get or set accessor expected".to_string());
                    self.bump();
                    continue;
                }
                let keyword = self.ident_token();
                let (body, expr) = self.body();
                accessors.push(Accessor {
                    span: self.span_from(acc_start),
                    keyword,
                    body,
                    expr_body: expr,
                });
            }
            self.expect(TokenKind::RBrace);
            if self.eat(TokenKind::Eq).is_some() {
                initializer = Some(self.variable_initializer());
                self.expect(TokenKind::Semi);
            }
        }

        PropertyDecl {
            id,
            span: self.span_from(start),
            modifiers,
            ty,
            explicit_interface,
            name,
            params,
            accessors,
            expr_body,
            initializer,
        }
    }

    fn field_rest(&mut self, start: usize, modifiers: Modifiers, ty: TypeSyntax, first: Ident) -> FieldDecl {
        let id = self.id();
        let declarators = self.declarators_from(first);
        self.expect(TokenKind::Semi);
        FieldDecl {
            id,
            span: self.span_from(start),
            modifiers,
            ty,
            declarators,
        }
    }

    /// Declarators after the first name has been consumed
    fn declarators_from(&mut self, first: Ident) -> Vec<VariableDeclarator> {
        let mut declarators = Vec::new();
        let mut name = first;
        loop {
            let decl_start = name.span.start;
            // fixed-size buffer / array rank after the name
            if self.at(TokenKind::LBracket) {
                self.skip_balanced(TokenKind::LBracket, TokenKind::RBracket);
            }
            let init = if self.eat(TokenKind::Eq).is_some() {
                Some(self.variable_initializer())
            } else {
                None
            };
            let id = self.id();
            declarators.push(VariableDeclarator {
                id,
                span: self.span_from(decl_start),
                name,
                init,
            });
            if self.eat(TokenKind::Comma).is_none() {
                break;
            }
            name = self.expect_ident();
        }
        declarators
    }

    fn variable_initializer(&mut self) -> Expr {
        if self.at(TokenKind::LBrace) {
            let start = self.start();
            let items = self.initializer();
            let id = self.id();
            Expr {
                id,
                span: self.span_from(start),
                kind: ExprKind::InitializerList(items),
            }
        } else {
            self.expression()
        }
    }

    fn parameter_list(&mut self, open: TokenKind, close: TokenKind) -> ParameterList {
        let start = self.start();
        let mut params = Vec::new();
        if !self.expect(open) {
            return ParameterList {
                span: self.span_from(start),
                params,
            };
        }
        if self.eat(close).is_none() {
            loop {
                params.push(self.parameter());
                if self.eat(TokenKind::Comma).is_none() {
                    break;
                }
            }
            self.expect(close);
        }
        ParameterList {
            span: self.span_from(start),
            params,
        }
    }

    fn parameter_modifiers(&mut self) -> Vec<Ident> {
        let mut modifiers = Vec::new();
        while self.at_any_kw(&["ref", "out", "in", "params", "this", "scoped", "readonly"]) {
            // `scoped` is a modifier only when a type follows
            if self.at_kw("scoped") && !matches!(self.nth_kind(1), TokenKind::Ident) {
                break;
            }
            modifiers.push(self.ident_token());
        }
        modifiers
    }

    fn parameter(&mut self) -> Parameter {
        let start = self.start();
        self.skip_attributes();
        let modifiers = self.parameter_modifiers();
        let id = self.id();
        if self.at_kw("__arglist") {
            let name = self.ident_token();
            return Parameter {
                id,
                span: self.span_from(start),
                modifiers,
                ty: None,
                name,
                default: None,
            };
        }
        let ty = self.required_type();
        let name = self.expect_ident();
        let default = if self.eat(TokenKind::Eq).is_some() {
            Some(self.expression())
        } else {
            None
        };
        Parameter {
            id,
            span: self.span_from(start),
            modifiers,
            ty: Some(ty),
            name,
            default,
        }
    }

    // ---- types ----

    fn required_type(&mut self) -> TypeSyntax {
        if let Some(ty) = self.type_opt() {
            return ty;
        }
        self.error_missing("CS1031", "Type expected");
        let at = self.prev_end();
        TypeSyntax {
            id: self.id(),
            span: Span::new(at, at),
            kind: TypeSyntaxKind::Named(Vec::new()),
        }
    }

    /// Parse a type without reporting errors; rewinds on failure
    fn type_opt(&mut self) -> Option<TypeSyntax> {
        let cp = self.checkpoint();
        let result = self.type_inner();
        if result.is_none() {
            self.rewind(cp);
        }
        result
    }

    /// Elements of a tuple type through the closing `)`
    fn tuple_elements(&mut self) -> Option<Vec<TypeSyntax>> {
        let mut elements = Vec::new();
        loop {
            elements.push(self.type_inner()?);
            if self.at_ident() {
                self.bump();
            }
            if self.eat(TokenKind::Comma).is_none() {
                break;
            }
        }
        if elements.len() < 2 || self.eat(TokenKind::RParen).is_none() {
            return None;
        }
        Some(elements)
    }

    fn type_inner(&mut self) -> Option<TypeSyntax> {
        let start = self.start();
        let mut ty = if self.at(TokenKind::LParen) {
            self.bump();
            let elements = self.nested(Self::tuple_elements).flatten()?;
            TypeSyntax {
                id: self.id(),
                span: self.span_from(start),
                kind: TypeSyntaxKind::Tuple(elements),
            }
        } else if let Some(p) = PREDEFINED.iter().find(|p| self.at_kw(p)) {
            self.bump();
            TypeSyntax {
                id: self.id(),
                span: self.span_from(start),
                kind: TypeSyntaxKind::Predefined(p.to_string()),
            }
        } else if self.at_ident() {
            // `global::X` and `alias::X`
            if self.nth_kind(1) == TokenKind::ColonColon {
                self.bump();
                self.bump();
                if !self.at_ident() {
                    return None;
                }
            }
            let mut segments = Vec::new();
            loop {
                let seg_start = self.start();
                let ident = self.ident_token();
                let type_args = if self.at(TokenKind::Lt) {
                    self.nested(Self::type_argument_list).flatten()?
                } else {
                    Vec::new()
                };
                segments.push(NameSegment {
                    ident,
                    type_args,
                    span: self.span_from(seg_start),
                });
                if self.at(TokenKind::Dot) && self.nth_is_ident(1) {
                    self.bump();
                    continue;
                }
                break;
            }
            TypeSyntax {
                id: self.id(),
                span: self.span_from(start),
                kind: TypeSyntaxKind::Named(segments),
            }
        } else {
            return None;
        };

        loop {
            if self.at(TokenKind::Question) && self.nullable_suffix_ok() {
                self.bump();
                ty = TypeSyntax {
                    id: self.id(),
                    span: self.span_from(start),
                    kind: TypeSyntaxKind::Nullable(Box::new(ty)),
                };
            } else if self.at(TokenKind::LBracket)
                && matches!(self.nth_kind(1), TokenKind::RBracket | TokenKind::Comma)
            {
                self.bump();
                while self.eat(TokenKind::Comma).is_some() {}
                if self.eat(TokenKind::RBracket).is_none() {
                    return None;
                }
                ty = TypeSyntax {
                    id: self.id(),
                    span: self.span_from(start),
                    kind: TypeSyntaxKind::Array(Box::new(ty)),
                };
            } else {
                break;
            }
        }
        Some(ty)
    }

    /// Decide whether `?` after a type is a nullable marker rather than
    /// the start of a conditional expression
    fn nullable_suffix_ok(&self) -> bool {
        match self.nth_kind(1) {
            TokenKind::RParen
            | TokenKind::Comma
            | TokenKind::Gt
            | TokenKind::RBracket
            | TokenKind::LBracket
            | TokenKind::Semi
            | TokenKind::Eq
            | TokenKind::LBrace
            | TokenKind::RBrace
            | TokenKind::Eof => true,
            TokenKind::Ident => {
                matches!(
                    self.nth_kind(2),
                    TokenKind::Eq
                        | TokenKind::Semi
                        | TokenKind::Comma
                        | TokenKind::RParen
                        | TokenKind::LBrace
                        | TokenKind::LParen
                        | TokenKind::Arrow
                        | TokenKind::Lt
                ) || self.nth_is_kw(2, "in")
            }
            _ => false,
        }
    }

    fn type_argument_list(&mut self) -> Option<Vec<TypeSyntax>> {
        self.eat(TokenKind::Lt)?;
        let mut args = Vec::new();
        // `Dictionary<,>` in typeof
        if matches!(self.kind(), TokenKind::Comma | TokenKind::Gt) {
            while self.eat(TokenKind::Comma).is_some() {}
            self.eat(TokenKind::Gt)?;
            return Some(args);
        }
        loop {
            args.push(self.type_inner()?);
            if self.eat(TokenKind::Comma).is_none() {
                break;
            }
        }
        self.eat(TokenKind::Gt)?;
        Some(args)
    }

    // ---- statements ----

    fn block(&mut self) -> Block {
        let start = self.start();
        let id = self.id();
        let mut stmts = Vec::new();
        if !self.expect(TokenKind::LBrace) {
            return Block {
                id,
                span: self.span_from(start),
                stmts,
            };
        }
        while !self.at(TokenKind::RBrace) && !self.at(TokenKind::Eof) {
            if self.at_any_kw(MEMBER_START) {
                break;
            }
            let before = self.pos;
            stmts.push(self.statement());
            if self.pos == before {
                let text = self.tok().span.text(self.src).to_string();
                self.error_here("CS1525", format!("Invalid expression term '{}'", text));
                self.bump();
            }
        }
        self.expect(TokenKind::RBrace);
        Block {
            id,
            span: self.span_from(start),
            stmts,
        }
    }

    fn stmt(&mut self, start: usize, kind: StmtKind) -> Stmt {
        let id = self.id();
        Stmt {
            id,
            span: self.span_from(start),
            kind,
        }
    }

    fn embedded(&mut self) -> Box<Stmt> {
        Box::new(self.statement())
    }

    fn paren_expr(&mut self) -> Expr {
        self.expect(TokenKind::LParen);
        let expr = self.expression();
        self.expect(TokenKind::RParen);
        expr
    }

    fn statement(&mut self) -> Stmt {
        self.nested(Self::statement_body).unwrap_or_else(|| {
            let start = self.start();
            self.skip_statement();
            self.stmt(start, StmtKind::Empty)
        })
    }

    fn statement_body(&mut self) -> Stmt {
        let start = self.start();

        match self.kind() {
            TokenKind::LBrace => {
                let block = self.block();
                return self.stmt(start, StmtKind::Block(block));
            }
            TokenKind::Semi => {
                self.bump();
                return self.stmt(start, StmtKind::Empty);
            }
            _ => {}
        }

        if self.at_ident() && self.nth_kind(1) == TokenKind::Colon && !self.at_kw("default") {
            let label = self.ident_token();
            self.bump();
            let body = self.embedded();
            return self.stmt(start, StmtKind::Labeled { label, body });
        }

        if self.at_kw("if") {
            self.bump();
            let cond = self.paren_expr();
            let then = self.embedded();
            let otherwise = if self.eat_kw("else").is_some() {
                Some(self.embedded())
            } else {
                None
            };
            return self.stmt(start, StmtKind::If { cond, then, otherwise });
        }
        if self.at_kw("while") {
            self.bump();
            let cond = self.paren_expr();
            let body = self.embedded();
            return self.stmt(start, StmtKind::While { cond, body });
        }
        if self.at_kw("do") {
            self.bump();
            let body = self.embedded();
            if self.eat_kw("while").is_none() {
                self.error_missing("CS1003", "Syntax error, 'while' expected");
            }
            let cond = self.paren_expr();
            self.expect(TokenKind::Semi);
            return self.stmt(start, StmtKind::DoWhile { body, cond });
        }
        if self.at_kw("for") {
            return self.for_statement(start);
        }
        if self.at_kw("foreach") || (self.at_kw("await") && self.nth_is_kw(1, "foreach")) {
            return self.foreach_statement(start);
        }
        if self.at_kw("try") {
            return self.try_statement(start);
        }
        if self.at_kw("using") || (self.at_kw("await") && self.nth_is_kw(1, "using")) {
            return self.using_statement(start);
        }
        if self.at_kw("lock") {
            self.bump();
            let target = self.paren_expr();
            let body = self.embedded();
            return self.stmt(start, StmtKind::Lock { target, body });
        }
        if self.at_kw("switch") {
            return self.switch_statement(start);
        }
        if self.at_kw("return") {
            self.bump();
            let value = if self.at(TokenKind::Semi) {
                None
            } else {
                Some(self.expression())
            };
            self.expect(TokenKind::Semi);
            return self.stmt(start, StmtKind::Return(value));
        }
        if self.at_kw("throw") {
            self.bump();
            let value = if self.at(TokenKind::Semi) {
                None
            } else {
                Some(self.expression())
            };
            self.expect(TokenKind::Semi);
            return self.stmt(start, StmtKind::Throw(value));
        }
        if self.at_kw("yield") && self.nth_is_kw(1, "return") {
            self.bump();
            self.bump();
            let value = self.expression();
            self.expect(TokenKind::Semi);
            return self.stmt(start, StmtKind::YieldReturn(value));
        }
        if self.at_kw("yield") && self.nth_is_kw(1, "break") {
            self.bump();
            self.bump();
            self.expect(TokenKind::Semi);
            return self.stmt(start, StmtKind::YieldBreak);
        }
        if self.at_kw("break") || self.at_kw("continue") {
            let is_break = self.at_kw("break");
            self.bump();
            self.expect(TokenKind::Semi);
            let kind = if is_break {
                StmtKind::Break
            } else {
                StmtKind::Continue
            };
            return self.stmt(start, kind);
        }
        if self.at_kw("goto") {
            while !matches!(self.kind(), TokenKind::Semi | TokenKind::Eof | TokenKind::RBrace) {
                self.bump();
            }
            self.expect(TokenKind::Semi);
            return self.stmt(start, StmtKind::Goto);
        }
        if self.at_any_kw(&["checked", "unchecked", "unsafe"]) && self.nth_kind(1) == TokenKind::LBrace {
            self.bump();
            let block = self.block();
            return self.stmt(start, StmtKind::Checked(block));
        }
        if self.at_kw("const") {
            self.bump();
            let decl = self.local_decl_after_type_required(false);
            self.expect(TokenKind::Semi);
            let decl = LocalDecl { is_const: true, ..decl };
            return self.stmt(start, StmtKind::LocalDecl(decl));
        }

        if let Some(stmt) = self.local_decl_or_function(start) {
            return stmt;
        }

        let expr = self.expression();
        self.expect(TokenKind::Semi);
        self.stmt(start, StmtKind::Expr(expr))
    }

    fn local_decl_after_type_required(&mut self, is_using: bool) -> LocalDecl {
        let ty = self.required_type();
        let first = self.expect_ident();
        let declarators = self.declarators_from(first);
        LocalDecl {
            is_const: false,
            is_using,
            ty,
            declarators,
        }
    }

    /// Try `T x = ...;` or `T F(...) { }`; rewinds and returns None otherwise
    fn local_decl_or_function(&mut self, start: usize) -> Option<Stmt> {
        if self.at_kw("await") || self.at_kw("yield") {
            return None;
        }
        let cp = self.checkpoint();
        let modifiers = self.modifiers();
        let Some(ty) = self.type_opt() else {
            self.rewind(cp);
            return None;
        };
        if !self.at_ident() {
            self.rewind(cp);
            return None;
        }

        match self.nth_kind(1) {
            TokenKind::LParen | TokenKind::Lt => {
                let name = self.ident_token();
                let type_params = if self.at(TokenKind::Lt) {
                    let tp_cp = self.checkpoint();
                    let params = self.type_parameters();
                    if !self.at(TokenKind::LParen) {
                        self.rewind(tp_cp);
                        self.rewind(cp);
                        return None;
                    }
                    params
                } else {
                    Vec::new()
                };
                let method = self.method_rest(start, modifiers, ty, None, name, type_params);
                if method.body.is_none() && method.expr_body.is_none() {
                    // `Foo Bar(x);` is not a local function
                    self.rewind(cp);
                    return None;
                }
                Some(self.stmt(start, StmtKind::LocalFunction(Box::new(method))))
            }
            TokenKind::Eq | TokenKind::Semi | TokenKind::Comma | TokenKind::LBracket
                if modifiers.is_empty() =>
            {
                let first = self.ident_token();
                let declarators = self.declarators_from(first);
                self.expect(TokenKind::Semi);
                let decl = LocalDecl {
                    is_const: false,
                    is_using: false,
                    ty,
                    declarators,
                };
                Some(self.stmt(start, StmtKind::LocalDecl(decl)))
            }
            _ => {
                self.rewind(cp);
                None
            }
        }
    }

    fn for_statement(&mut self, start: usize) -> Stmt {
        self.bump();
        self.expect(TokenKind::LParen);
        let mut init = Vec::new();
        if !self.at(TokenKind::Semi) {
            let init_start = self.start();
            let cp = self.checkpoint();
            let decl = match self.type_opt() {
                Some(ty) if self.at_ident() => {
                    let first = self.ident_token();
                    let declarators = self.declarators_from(first);
                    Some(LocalDecl {
                        is_const: false,
                        is_using: false,
                        ty,
                        declarators,
                    })
                }
                _ => {
                    self.rewind(cp);
                    None
                }
            };
            match decl {
                Some(decl) => {
                    let stmt = self.stmt(init_start, StmtKind::LocalDecl(decl));
                    init.push(stmt);
                }
                None => loop {
                    let expr_start = self.start();
                    let expr = self.expression();
                    let stmt = self.stmt(expr_start, StmtKind::Expr(expr));
                    init.push(stmt);
                    if self.eat(TokenKind::Comma).is_none() {
                        break;
                    }
                },
            }
        }
        self.expect(TokenKind::Semi);
        let cond = if self.at(TokenKind::Semi) {
            None
        } else {
            Some(self.expression())
        };
        self.expect(TokenKind::Semi);
        let mut step = Vec::new();
        if !self.at(TokenKind::RParen) {
            loop {
                step.push(self.expression());
                if self.eat(TokenKind::Comma).is_none() {
                    break;
                }
            }
        }
        self.expect(TokenKind::RParen);
        let body = self.embedded();
        self.stmt(start, StmtKind::For { init, cond, step, body })
    }

    fn foreach_statement(&mut self, start: usize) -> Stmt {
        let is_await = self.eat_kw("await").is_some();
        self.bump();
        self.expect(TokenKind::LParen);
        let ty = self.required_type();
        let name = if self.at_ident() {
            self.ident_token()
        } else {
            // deconstruction `var (a, b)`; the designation is not modelled
            if self.at(TokenKind::LParen) {
                self.skip_balanced(TokenKind::LParen, TokenKind::RParen);
            } else {
                self.error_missing("CS1001", "Identifier expected");
            }
            let at = self.prev_end();
            Ident {
                text: String::new(),
                span: Span::new(at, at),
            }
        };
        let local_id = self.id();
        if self.eat_kw("in").is_none() {
            self.error_missing("CS1515", "'in' expected");
        }
        let collection = self.expression();
        self.expect(TokenKind::RParen);
        let body = self.embedded();
        self.stmt(
            start,
            StmtKind::Foreach {
                is_await,
                ty,
                name,
                local_id,
                collection,
                body,
            },
        )
    }

    fn try_statement(&mut self, start: usize) -> Stmt {
        self.bump();
        let block = self.block();
        let mut catches = Vec::new();
        while self.at_kw("catch") {
            let keyword = self.bump().span;
            let declaration = if self.at(TokenKind::LParen) {
                let decl_start = self.start();
                self.bump();
                let ty = self.required_type();
                let name = if self.at_ident() {
                    Some(self.ident_token())
                } else {
                    None
                };
                self.expect(TokenKind::RParen);
                let id = self.id();
                Some(CatchDeclaration {
                    id,
                    span: self.span_from(decl_start),
                    ty,
                    name,
                })
            } else {
                None
            };
            let filter = if self.at_kw("when") {
                let filter_start = self.start();
                self.bump();
                let expr = self.paren_expr();
                Some(CatchFilter {
                    span: self.span_from(filter_start),
                    expr,
                })
            } else {
                None
            };
            let block = self.block();
            let id = self.id();
            catches.push(CatchClause {
                id,
                span: self.span_from(keyword.start),
                keyword,
                declaration,
                filter,
                block,
            });
        }
        let finally = if self.eat_kw("finally").is_some() {
            Some(self.block())
        } else {
            None
        };
        if catches.is_empty() && finally.is_none() {
            self.error_missing("CS1524", "Expected catch or finally");
        }
        self.stmt(
            start,
            StmtKind::Try(TryStmt {
                block,
                catches,
                finally,
            }),
        )
    }

    fn using_statement(&mut self, start: usize) -> Stmt {
        self.eat_kw("await");
        self.bump();
        if self.eat(TokenKind::LParen).is_some() {
            let cp = self.checkpoint();
            let resource = match self.type_opt() {
                Some(ty) if self.at_ident() && self.nth_kind(1) == TokenKind::Eq => {
                    let first = self.ident_token();
                    let declarators = self.declarators_from(first);
                    UsingResource::Decl(LocalDecl {
                        is_const: false,
                        is_using: true,
                        ty,
                        declarators,
                    })
                }
                _ => {
                    self.rewind(cp);
                    UsingResource::Expr(self.expression())
                }
            };
            self.expect(TokenKind::RParen);
            let body = self.embedded();
            return self.stmt(start, StmtKind::Using { resource, body });
        }
        let decl = self.local_decl_after_type_required(true);
        self.expect(TokenKind::Semi);
        self.stmt(start, StmtKind::LocalDecl(decl))
    }

    fn switch_statement(&mut self, start: usize) -> Stmt {
        self.bump();
        let subject = self.paren_expr();
        let mut sections = Vec::new();
        self.expect(TokenKind::LBrace);
        while !self.at(TokenKind::RBrace) && !self.at(TokenKind::Eof) {
            let section_start = self.start();
            let mut labels = Vec::new();
            loop {
                if self.at_kw("case") {
                    self.bump();
                    let pattern = self.pattern();
                    let guard = if self.eat_kw("when").is_some() {
                        Some(self.expression())
                    } else {
                        None
                    };
                    self.expect(TokenKind::Colon);
                    labels.push(SwitchLabel::Case { pattern, guard });
                } else if self.at_kw("default") && self.nth_kind(1) == TokenKind::Colon {
                    self.bump();
                    self.bump();
                    labels.push(SwitchLabel::Default);
                } else {
                    break;
                }
            }
            if labels.is_empty() {
                self.error_here("CS1525", "Invalid expression term".to_string());
                self.bump();
                continue;
            }
            let mut stmts = Vec::new();
            while !self.at(TokenKind::RBrace)
                && !self.at(TokenKind::Eof)
                && !self.at_kw("case")
                && !(self.at_kw("default") && self.nth_kind(1) == TokenKind::Colon)
            {
                let before = self.pos;
                stmts.push(self.statement());
                if self.pos == before {
                    self.bump();
                }
            }
            sections.push(SwitchSection {
                span: self.span_from(section_start),
                labels,
                stmts,
            });
        }
        self.expect(TokenKind::RBrace);
        self.stmt(start, StmtKind::Switch { subject, sections })
    }

    // ---- expressions ----

    fn expr(&mut self, start: usize, kind: ExprKind) -> Expr {
        let id = self.id();
        Expr {
            id,
            span: self.span_from(start),
            kind,
        }
    }

    fn missing_expr(&mut self) -> Expr {
        let at = self.prev_end();
        let id = self.id();
        Expr {
            id,
            span: Span::new(at, at),
            kind: ExprKind::Missing,
        }
    }

    fn expression(&mut self) -> Expr {
        self.nested(Self::expression_body)
            .unwrap_or_else(|| self.too_complex_expr())
    }

    fn expression_body(&mut self) -> Expr {
        if self.at_lambda() {
            return self.lambda();
        }
        let start = self.start();
        let target = self.conditional();

        if self.eat(TokenKind::Eq).is_some() {
            let value = self.expression_or_initializer();
            return self.expr(
                start,
                ExprKind::Assignment {
                    target: Box::new(target),
                    value: Box::new(value),
                },
            );
        }
        let compound = match self.kind() {
            TokenKind::PlusEq
            | TokenKind::MinusEq
            | TokenKind::StarEq
            | TokenKind::SlashEq
            | TokenKind::PercentEq
            | TokenKind::AmpEq
            | TokenKind::PipeEq
            | TokenKind::CaretEq
            | TokenKind::LtLtEq
            | TokenKind::QuestionQuestionEq => 1,
            TokenKind::Gt if self.nth_kind(1) == TokenKind::GtEq && self.next_adjacent() => 2,
            _ => 0,
        };
        if compound > 0 {
            for _ in 0..compound {
                self.bump();
            }
            let value = self.expression();
            return self.expr(
                start,
                ExprKind::CompoundAssignment {
                    target: Box::new(target),
                    value: Box::new(value),
                },
            );
        }
        target
    }

    fn expression_or_initializer(&mut self) -> Expr {
        if self.at(TokenKind::LBrace) {
            self.variable_initializer()
        } else {
            self.expression()
        }
    }

    fn conditional(&mut self) -> Expr {
        let start = self.start();
        let cond = self.coalesce();
        if self.at(TokenKind::Question) {
            self.bump();
            let when_true = self.expression();
            self.expect(TokenKind::Colon);
            let when_false = self.expression();
            return self.expr(
                start,
                ExprKind::Conditional {
                    cond: Box::new(cond),
                    when_true: Box::new(when_true),
                    when_false: Box::new(when_false),
                },
            );
        }
        cond
    }

    fn coalesce(&mut self) -> Expr {
        self.nested(Self::coalesce_body)
            .unwrap_or_else(|| self.too_complex_expr())
    }

    fn coalesce_body(&mut self) -> Expr {
        let start = self.start();
        let left = self.binary(0);
        if self.eat(TokenKind::QuestionQuestion).is_some() {
            let right = self.coalesce();
            return self.expr(
                start,
                ExprKind::Binary {
                    op: BinaryOp::Coalesce,
                    left: Box::new(left),
                    right: Box::new(right),
                },
            );
        }
        left
    }

    /// Operator at the cursor with its precedence and token count
    fn binary_op(&self) -> Option<(u8, BinaryOp, usize)> {
        let op = match self.kind() {
            TokenKind::PipePipe => (1, BinaryOp::Or, 1),
            TokenKind::AmpAmp => (2, BinaryOp::And, 1),
            TokenKind::Pipe => (3, BinaryOp::BitOr, 1),
            TokenKind::Caret => (4, BinaryOp::BitXor, 1),
            TokenKind::Amp => (5, BinaryOp::BitAnd, 1),
            TokenKind::EqEq => (6, BinaryOp::Eq, 1),
            TokenKind::NotEq => (6, BinaryOp::Ne, 1),
            TokenKind::Lt => (7, BinaryOp::Lt, 1),
            TokenKind::LtEq => (7, BinaryOp::Le, 1),
            TokenKind::GtEq => (7, BinaryOp::Ge, 1),
            TokenKind::Gt if self.nth_kind(1) == TokenKind::Gt && self.next_adjacent() => {
                (8, BinaryOp::Shr, 2)
            }
            TokenKind::Gt if self.nth_kind(1) == TokenKind::GtEq && self.next_adjacent() => {
                return None;
            }
            TokenKind::Gt => (7, BinaryOp::Gt, 1),
            TokenKind::LtLt => (8, BinaryOp::Shl, 1),
            TokenKind::Plus => (9, BinaryOp::Add, 1),
            TokenKind::Minus => (9, BinaryOp::Sub, 1),
            TokenKind::Star => (10, BinaryOp::Mul, 1),
            TokenKind::Slash => (10, BinaryOp::Div, 1),
            TokenKind::Percent => (10, BinaryOp::Rem, 1),
            TokenKind::DotDot => (11, BinaryOp::Range, 1),
            _ => return None,
        };
        Some(op)
    }

    fn binary(&mut self, min_prec: u8) -> Expr {
        let depth = self.depth;
        let start = self.start();
        let mut left = self.unary();
        loop {
            if min_prec <= 7 && (self.at_kw("is") || self.at_kw("as")) {
                let is = self.at_kw("is");
                self.bump();
                if is {
                    let pattern = self.pattern();
                    let kind = match pattern.kind {
                        PatternKind::Type(ty) => ExprKind::IsType {
                            operand: Box::new(left),
                            ty,
                        },
                        _ => ExprKind::IsPattern {
                            operand: Box::new(left),
                            pattern: Box::new(pattern),
                        },
                    };
                    left = self.expr(start, kind);
                } else {
                    let ty = self.required_type();
                    left = self.expr(
                        start,
                        ExprKind::As {
                            operand: Box::new(left),
                            ty,
                        },
                    );
                }
                if !self.descend() {
                    self.skip_expression();
                    break;
                }
                continue;
            }
            let Some((prec, op, width)) = self.binary_op() else {
                break;
            };
            if prec < min_prec {
                break;
            }
            for _ in 0..width {
                self.bump();
            }
            let right = self.binary(prec + 1);
            left = self.expr(
                start,
                ExprKind::Binary {
                    op,
                    left: Box::new(left),
                    right: Box::new(right),
                },
            );
            if !self.descend() {
                self.skip_expression();
                break;
            }
        }
        self.depth = depth;
        left
    }

    fn unary(&mut self) -> Expr {
        self.nested(Self::unary_body)
            .unwrap_or_else(|| self.too_complex_expr())
    }

    fn unary_body(&mut self) -> Expr {
        let start = self.start();
        let op = match self.kind() {
            TokenKind::Bang => Some(UnaryOp::Not),
            TokenKind::Minus => Some(UnaryOp::Neg),
            TokenKind::Plus => Some(UnaryOp::Plus),
            TokenKind::Tilde => Some(UnaryOp::BitNot),
            TokenKind::PlusPlus => Some(UnaryOp::PreInc),
            TokenKind::MinusMinus => Some(UnaryOp::PreDec),
            TokenKind::Amp => Some(UnaryOp::AddressOf),
            TokenKind::Star => Some(UnaryOp::Deref),
            TokenKind::Caret => Some(UnaryOp::Index),
            _ => None,
        };
        if let Some(op) = op {
            self.bump();
            let operand = self.unary();
            return self.expr(
                start,
                ExprKind::Unary {
                    op,
                    operand: Box::new(operand),
                },
            );
        }
        if self.at_kw("await") && self.starts_operand(1) {
            self.bump();
            let operand = self.unary();
            return self.expr(start, ExprKind::Await(Box::new(operand)));
        }
        if self.at_kw("throw") {
            self.bump();
            let operand = self.coalesce();
            return self.expr(start, ExprKind::Throw(Box::new(operand)));
        }
        if self.at(TokenKind::LParen) {
            if let Some(cast) = self.try_cast(start) {
                return cast;
            }
        }
        let primary = self.primary();
        self.postfix(start, primary)
    }

    /// Whether the token at `n` can begin an operand
    fn starts_operand(&self, n: usize) -> bool {
        match self.nth_kind(n) {
            TokenKind::Ident
            | TokenKind::Number
            | TokenKind::String
            | TokenKind::Char
            | TokenKind::LParen
            | TokenKind::Bang
            | TokenKind::Tilde
            | TokenKind::Minus
            | TokenKind::Plus
            | TokenKind::PlusPlus
            | TokenKind::MinusMinus
            | TokenKind::LBracket => {
                let t = self.nth(n);
                !(t.kind == TokenKind::Ident
                    && !t.verbatim
                    && matches!(t.span.text(self.src), "is" | "as" | "when" | "and" | "or" | "switch" | "with"))
            }
            _ => false,
        }
    }

    fn try_cast(&mut self, start: usize) -> Option<Expr> {
        let cp = self.checkpoint();
        self.bump();
        let ty = match self.type_opt() {
            Some(ty) if self.at(TokenKind::RParen) => ty,
            _ => {
                self.rewind(cp);
                return None;
            }
        };
        self.bump();
        let predefined = matches!(&ty.kind, TypeSyntaxKind::Predefined(_))
            || matches!(&ty.kind, TypeSyntaxKind::Nullable(_) | TypeSyntaxKind::Array(_));
        let follows = match self.kind() {
            TokenKind::Ident => {
                let t = self.tok();
                t.verbatim
                    || !matches!(
                        t.span.text(self.src),
                        "is" | "as" | "when" | "and" | "or" | "switch" | "with" | "in"
                    )
            }
            TokenKind::Number | TokenKind::String | TokenKind::Char | TokenKind::LParen => true,
            TokenKind::Bang | TokenKind::Tilde => true,
            TokenKind::Minus | TokenKind::Plus | TokenKind::PlusPlus | TokenKind::MinusMinus => {
                predefined
            }
            _ => false,
        };
        if !follows {
            self.rewind(cp);
            return None;
        }
        let operand = self.unary();
        Some(self.expr(
            start,
            ExprKind::Cast {
                ty,
                operand: Box::new(operand),
            },
        ))
    }

    fn at_lambda(&self) -> bool {
        let offset = usize::from(self.at_kw("async") || self.at_kw("static"));
        if offset == 1 && self.nth_is_kw(1, "delegate") {
            return true;
        }
        if self.nth_is_ident(offset) && self.nth_kind(offset + 1) == TokenKind::Arrow {
            return true;
        }
        if self.nth_kind(offset) == TokenKind::LParen {
            if let Some(close) = self.matching_paren(offset) {
                return self.nth_kind(close + 1) == TokenKind::Arrow;
            }
        }
        false
    }

    /// Offset of the `)` matching the `(` at `n`
    fn matching_paren(&self, n: usize) -> Option<usize> {
        let mut depth = 0usize;
        let mut i = n;
        loop {
            match self.nth_kind(i) {
                TokenKind::LParen => depth += 1,
                TokenKind::RParen => {
                    depth -= 1;
                    if depth == 0 {
                        return Some(i);
                    }
                }
                TokenKind::Eof | TokenKind::Semi | TokenKind::LBrace | TokenKind::RBrace => {
                    return None
                }
                _ => {}
            }
            i += 1;
        }
    }

    fn lambda(&mut self) -> Expr {
        let start = self.start();
        let mut is_async = false;
        loop {
            if self.eat_kw("async").is_some() {
                is_async = true;
            } else if self.eat_kw("static").is_none() {
                break;
            }
        }
        if self.at_kw("delegate") {
            return self.anonymous_method(start, is_async);
        }
        let params = if self.at_ident() {
            let name = self.ident_token();
            let id = self.id();
            vec![Parameter {
                id,
                span: name.span,
                modifiers: Vec::new(),
                ty: None,
                name,
                default: None,
            }]
        } else {
            self.lambda_parameters()
        };
        self.expect(TokenKind::Arrow);
        let body = if self.at(TokenKind::LBrace) {
            LambdaBody::Block(self.block())
        } else {
            LambdaBody::Expr(self.expression())
        };
        self.expr(
            start,
            ExprKind::Lambda(Box::new(Lambda {
                is_async,
                params,
                body,
            })),
        )
    }

    fn lambda_parameters(&mut self) -> Vec<Parameter> {
        let mut params = Vec::new();
        self.expect(TokenKind::LParen);
        if self.eat(TokenKind::RParen).is_some() {
            return params;
        }
        loop {
            let start = self.start();
            self.skip_attributes();
            let modifiers = self.parameter_modifiers();
            let id = self.id();
            let implicit = self.at_ident()
                && matches!(self.nth_kind(1), TokenKind::Comma | TokenKind::RParen);
            let (ty, name) = if implicit {
                (None, self.ident_token())
            } else {
                let ty = self.required_type();
                (Some(ty), self.expect_ident())
            };
            let default = if self.eat(TokenKind::Eq).is_some() {
                Some(self.expression())
            } else {
                None
            };
            params.push(Parameter {
                id,
                span: self.span_from(start),
                modifiers,
                ty,
                name,
                default,
            });
            if self.eat(TokenKind::Comma).is_none() {
                break;
            }
        }
        self.expect(TokenKind::RParen);
        params
    }

    fn anonymous_method(&mut self, start: usize, is_async: bool) -> Expr {
        self.bump();
        let params = if self.at(TokenKind::LParen) {
            self.parameter_list(TokenKind::LParen, TokenKind::RParen).params
        } else {
            Vec::new()
        };
        let body = LambdaBody::Block(self.block());
        self.expr(
            start,
            ExprKind::Lambda(Box::new(Lambda {
                is_async,
                params,
                body,
            })),
        )
    }

    fn primary(&mut self) -> Expr {
        let start = self.start();
        let t = self.tok();
        match t.kind {
            TokenKind::Number => {
                self.bump();
                return self.expr(start, ExprKind::Literal(LiteralKind::Number));
            }
            TokenKind::String => {
                self.bump();
                return self.expr(start, ExprKind::Literal(LiteralKind::String));
            }
            TokenKind::Char => {
                self.bump();
                return self.expr(start, ExprKind::Literal(LiteralKind::Char));
            }
            TokenKind::LParen => return self.parenthesized(start),
            TokenKind::LBracket => {
                // collection expression
                let items = self.delimited_items(TokenKind::LBracket, TokenKind::RBracket);
                return self.expr(start, ExprKind::InitializerList(items));
            }
            TokenKind::Ident => {}
            _ => {
                let text = t.span.text(self.src).to_string();
                let message = if t.kind == TokenKind::Eof {
                    "Expression expected".to_string()
                } else {
                    format!("Invalid expression term '{}'", text)
                };
                self.error_here("CS1525", message);
                if !matches!(
                    t.kind,
                    TokenKind::Semi
                        | TokenKind::RParen
                        | TokenKind::RBrace
                        | TokenKind::RBracket
                        | TokenKind::Comma
                        | TokenKind::Eof
                ) {
                    self.bump();
                }
                return self.missing_expr();
            }
        }

        if !t.verbatim {
            let word = t.span.text(self.src);
            match word {
                "true" | "false" | "null" => {
                    self.bump();
                    let kind = match word {
                        "true" => LiteralKind::True,
                        "false" => LiteralKind::False,
                        _ => LiteralKind::Null,
                    };
                    return self.expr(start, ExprKind::Literal(kind));
                }
                "this" => {
                    self.bump();
                    return self.expr(start, ExprKind::This);
                }
                "base" => {
                    self.bump();
                    return self.expr(start, ExprKind::Base);
                }
                "new" | "stackalloc" => return self.creation(start),
                "default" => {
                    self.bump();
                    if self.at(TokenKind::LParen) {
                        self.bump();
                        let ty = self.required_type();
                        self.expect(TokenKind::RParen);
                        return self.expr(start, ExprKind::Default(Some(ty)));
                    }
                    return self.expr(start, ExprKind::Default(None));
                }
                "typeof" | "sizeof" => {
                    self.bump();
                    self.expect(TokenKind::LParen);
                    let ty = self.required_type();
                    self.expect(TokenKind::RParen);
                    let kind = if word == "typeof" {
                        ExprKind::TypeOf(ty)
                    } else {
                        ExprKind::SizeOf(ty)
                    };
                    return self.expr(start, kind);
                }
                "checked" | "unchecked" => {
                    self.bump();
                    let inner = self.paren_expr();
                    return self.expr(start, ExprKind::Parenthesized(Box::new(inner)));
                }
                "delegate" => return self.anonymous_method(start, false),
                "ref" | "out" | "in" => {
                    // `ref x` as an expression; the modifier carries no meaning here
                    self.bump();
                    return self.unary();
                }
                _ => {}
            }
            if PREDEFINED.contains(&word) {
                self.bump();
                return self.expr(start, ExprKind::PredefinedType(word.to_string()));
            }
            if RESERVED.contains(&word) {
                self.error_here("CS1525", format!("Invalid expression term '{}'", word));
                self.bump();
                return self.missing_expr();
            }
        }

        let name = self.simple_name_expr();
        self.expr(start, ExprKind::Name(name))
    }

    /// Identifier with optional type arguments when they are unambiguous
    fn simple_name_expr(&mut self) -> SimpleName {
        let ident = self.ident_token();
        let mut type_args = Vec::new();
        if self.at(TokenKind::Lt) {
            let cp = self.checkpoint();
            match self.type_argument_list() {
                Some(args) if self.generic_follow() => type_args = args,
                _ => self.rewind(cp),
            }
        }
        SimpleName { ident, type_args }
    }

    /// Tokens that may follow a generic name in expression context
    fn generic_follow(&self) -> bool {
        matches!(
            self.kind(),
            TokenKind::LParen
                | TokenKind::RParen
                | TokenKind::RBracket
                | TokenKind::RBrace
                | TokenKind::Colon
                | TokenKind::Semi
                | TokenKind::Comma
                | TokenKind::Dot
                | TokenKind::QuestionDot
                | TokenKind::Question
                | TokenKind::EqEq
                | TokenKind::NotEq
                | TokenKind::Pipe
                | TokenKind::Caret
                | TokenKind::AmpAmp
                | TokenKind::PipePipe
                | TokenKind::Amp
                | TokenKind::LBracket
                | TokenKind::Eof
        )
    }

    fn parenthesized(&mut self, start: usize) -> Expr {
        self.bump();
        let first_start = self.start();
        let named = self.at_ident() && self.nth_kind(1) == TokenKind::Colon;
        if named {
            self.bump();
            self.bump();
        }
        let first = self.expression();
        if self.at(TokenKind::Comma) {
            let mut items = Vec::new();
            let id = self.id();
            items.push(Argument {
                id,
                span: self.span_from(first_start),
                name: None,
                ref_kind: None,
                expr: first,
            });
            while self.eat(TokenKind::Comma).is_some() {
                items.push(self.argument());
            }
            self.expect(TokenKind::RParen);
            return self.expr(start, ExprKind::Tuple(items));
        }
        self.expect(TokenKind::RParen);
        self.expr(start, ExprKind::Parenthesized(Box::new(first)))
    }

    fn creation(&mut self, start: usize) -> Expr {
        self.bump();
        match self.kind() {
            TokenKind::LParen => {
                let args = self.argument_list(TokenKind::LParen, TokenKind::RParen);
                let initializer = self.initializer_opt();
                return self.expr(
                    start,
                    ExprKind::ObjectCreation {
                        ty: None,
                        args: Some(args),
                        initializer,
                    },
                );
            }
            TokenKind::LBracket => {
                self.skip_balanced(TokenKind::LBracket, TokenKind::RBracket);
                let initializer = self.initializer_opt();
                return self.expr(
                    start,
                    ExprKind::ArrayCreation {
                        ty: None,
                        sizes: Vec::new(),
                        initializer,
                    },
                );
            }
            TokenKind::LBrace => {
                let initializer = Some(self.initializer());
                return self.expr(
                    start,
                    ExprKind::ObjectCreation {
                        ty: None,
                        args: None,
                        initializer,
                    },
                );
            }
            _ => {}
        }

        let ty = self.required_type();
        if matches!(ty.kind, TypeSyntaxKind::Array(_)) {
            let initializer = self.initializer_opt();
            return self.expr(
                start,
                ExprKind::ArrayCreation {
                    ty: Some(ty),
                    sizes: Vec::new(),
                    initializer,
                },
            );
        }
        match self.kind() {
            TokenKind::LParen => {
                let args = self.argument_list(TokenKind::LParen, TokenKind::RParen);
                let initializer = self.initializer_opt();
                self.expr(
                    start,
                    ExprKind::ObjectCreation {
                        ty: Some(ty),
                        args: Some(args),
                        initializer,
                    },
                )
            }
            TokenKind::LBrace => {
                let initializer = Some(self.initializer());
                self.expr(
                    start,
                    ExprKind::ObjectCreation {
                        ty: Some(ty),
                        args: None,
                        initializer,
                    },
                )
            }
            TokenKind::LBracket => {
                let sizes = self.delimited_items(TokenKind::LBracket, TokenKind::RBracket);
                while self.at(TokenKind::LBracket)
                    && matches!(self.nth_kind(1), TokenKind::RBracket | TokenKind::Comma)
                {
                    self.skip_balanced(TokenKind::LBracket, TokenKind::RBracket);
                }
                let initializer = self.initializer_opt();
                self.expr(
                    start,
                    ExprKind::ArrayCreation {
                        ty: Some(ty),
                        sizes,
                        initializer,
                    },
                )
            }
            _ => {
                self.expect(TokenKind::LParen);
                self.expr(
                    start,
                    ExprKind::ObjectCreation {
                        ty: Some(ty),
                        args: None,
                        initializer: None,
                    },
                )
            }
        }
    }

    fn initializer_opt(&mut self) -> Option<Vec<Expr>> {
        if self.at(TokenKind::LBrace) {
            Some(self.initializer())
        } else {
            None
        }
    }

    fn initializer(&mut self) -> Vec<Expr> {
        self.delimited_items(TokenKind::LBrace, TokenKind::RBrace)
    }

    /// Comma separated expressions between delimiters; trailing comma allowed
    fn delimited_items(&mut self, open: TokenKind, close: TokenKind) -> Vec<Expr> {
        let mut items = Vec::new();
        self.expect(open);
        while !self.at(close) && !self.at(TokenKind::Eof) {
            let before = self.pos;
            let item = if self.at(TokenKind::LBrace) {
                self.variable_initializer()
            } else {
                self.expression_or_initializer()
            };
            items.push(item);
            if self.eat(TokenKind::Comma).is_none() {
                break;
            }
            if self.pos == before {
                break;
            }
        }
        self.expect(close);
        items
    }

    fn argument_list(&mut self, open: TokenKind, close: TokenKind) -> ArgumentList {
        let start = self.start();
        let mut args = Vec::new();
        self.expect(open);
        if self.eat(close).is_none() {
            loop {
                args.push(self.argument());
                if self.eat(TokenKind::Comma).is_none() {
                    break;
                }
            }
            self.expect(close);
        }
        ArgumentList {
            span: self.span_from(start),
            args,
        }
    }

    fn argument(&mut self) -> Argument {
        let start = self.start();
        let name = if self.at_ident() && self.nth_kind(1) == TokenKind::Colon {
            let name = self.ident_token();
            self.bump();
            Some(name)
        } else {
            None
        };
        let ref_kind = if self.at_any_kw(&["ref", "out", "in"]) {
            Some(self.ident_token())
        } else {
            None
        };
        let expr = if ref_kind.as_ref().is_some_and(|r| r.is("out")) {
            self.out_target()
        } else {
            self.expression()
        };
        let id = self.id();
        Argument {
            id,
            span: self.span_from(start),
            name,
            ref_kind,
            expr,
        }
    }

    /// `out var x`, `out T x` or a plain expression
    fn out_target(&mut self) -> Expr {
        let start = self.start();
        let cp = self.checkpoint();
        if let Some(ty) = self.type_opt() {
            if self.at_ident() && matches!(self.nth_kind(1), TokenKind::RParen | TokenKind::Comma)
            {
                let name = self.ident_token();
                return self.expr(start, ExprKind::Declaration { ty, name });
            }
        }
        self.rewind(cp);
        self.expression()
    }

    fn postfix(&mut self, start: usize, expr: Expr) -> Expr {
        let depth = self.depth;
        let expr = self.postfix_chain(start, expr);
        self.depth = depth;
        expr
    }

    fn postfix_chain(&mut self, start: usize, mut expr: Expr) -> Expr {
        let mut first = true;
        loop {
            if !first && !self.descend() {
                self.skip_expression();
                return expr;
            }
            first = false;
            match self.kind() {
                TokenKind::Dot | TokenKind::QuestionDot => {
                    let conditional = self.at(TokenKind::QuestionDot);
                    self.bump();
                    if !self.at(TokenKind::Ident) {
                        self.error_missing("CS1001", "Identifier expected");
                        return expr;
                    }
                    let name = self.simple_name_expr();
                    expr = self.expr(
                        start,
                        ExprKind::MemberAccess {
                            target: Box::new(expr),
                            name,
                            conditional,
                        },
                    );
                }
                TokenKind::Question
                    if self.nth_kind(1) == TokenKind::LBracket && self.next_adjacent() =>
                {
                    self.bump();
                    let args = self.argument_list(TokenKind::LBracket, TokenKind::RBracket);
                    expr = self.expr(
                        start,
                        ExprKind::ElementAccess {
                            target: Box::new(expr),
                            args,
                            conditional: true,
                        },
                    );
                }
                TokenKind::LParen => {
                    let args = self.argument_list(TokenKind::LParen, TokenKind::RParen);
                    expr = self.expr(
                        start,
                        ExprKind::Invocation {
                            target: Box::new(expr),
                            args,
                        },
                    );
                }
                TokenKind::LBracket => {
                    let args = self.argument_list(TokenKind::LBracket, TokenKind::RBracket);
                    expr = self.expr(
                        start,
                        ExprKind::ElementAccess {
                            target: Box::new(expr),
                            args,
                            conditional: false,
                        },
                    );
                }
                TokenKind::PlusPlus | TokenKind::MinusMinus => {
                    let op = if self.at(TokenKind::PlusPlus) {
                        PostfixOp::Inc
                    } else {
                        PostfixOp::Dec
                    };
                    self.bump();
                    expr = self.expr(
                        start,
                        ExprKind::Postfix {
                            op,
                            operand: Box::new(expr),
                        },
                    );
                }
                TokenKind::Bang
                    if matches!(
                        self.nth_kind(1),
                        TokenKind::Dot
                            | TokenKind::RParen
                            | TokenKind::Semi
                            | TokenKind::Comma
                            | TokenKind::RBracket
                            | TokenKind::LBracket
                            | TokenKind::QuestionDot
                            | TokenKind::RBrace
                    ) =>
                {
                    self.bump();
                    expr = self.expr(
                        start,
                        ExprKind::Postfix {
                            op: PostfixOp::NullForgiving,
                            operand: Box::new(expr),
                        },
                    );
                }
                TokenKind::Ident
                    if self.at_kw("switch") && self.nth_kind(1) == TokenKind::LBrace =>
                {
                    self.bump();
                    let arms = self.switch_arms();
                    expr = self.expr(
                        start,
                        ExprKind::Switch {
                            subject: Box::new(expr),
                            arms,
                        },
                    );
                }
                TokenKind::Ident if self.at_kw("with") && self.nth_kind(1) == TokenKind::LBrace => {
                    self.bump();
                    let initializer = self.initializer();
                    expr = self.expr(
                        start,
                        ExprKind::With {
                            target: Box::new(expr),
                            initializer,
                        },
                    );
                }
                _ => return expr,
            }
        }
    }

    fn switch_arms(&mut self) -> Vec<SwitchArm> {
        let mut arms = Vec::new();
        self.expect(TokenKind::LBrace);
        while !self.at(TokenKind::RBrace) && !self.at(TokenKind::Eof) {
            let start = self.start();
            let before = self.pos;
            let pattern = self.pattern();
            let guard = if self.eat_kw("when").is_some() {
                Some(self.expression())
            } else {
                None
            };
            self.expect(TokenKind::Arrow);
            let result = self.expression();
            arms.push(SwitchArm {
                span: self.span_from(start),
                pattern,
                guard,
                result,
            });
            if self.eat(TokenKind::Comma).is_none() || self.pos == before {
                break;
            }
        }
        self.expect(TokenKind::RBrace);
        arms
    }

    // ---- patterns ----

    fn pattern_node(&mut self, start: usize, kind: PatternKind) -> Pattern {
        let id = self.id();
        Pattern {
            id,
            span: self.span_from(start),
            kind,
        }
    }

    fn pattern(&mut self) -> Pattern {
        let depth = self.depth;
        let start = self.start();
        let mut left = self.and_pattern();
        while self.at_kw("or") {
            self.bump();
            let right = self.and_pattern();
            left = self.pattern_node(start, PatternKind::Or(Box::new(left), Box::new(right)));
            if !self.descend() {
                self.skip_expression();
                break;
            }
        }
        self.depth = depth;
        left
    }

    fn and_pattern(&mut self) -> Pattern {
        let depth = self.depth;
        let start = self.start();
        let mut left = self.not_pattern();
        while self.at_kw("and") {
            self.bump();
            let right = self.not_pattern();
            left = self.pattern_node(start, PatternKind::And(Box::new(left), Box::new(right)));
            if !self.descend() {
                self.skip_expression();
                break;
            }
        }
        self.depth = depth;
        left
    }

    fn not_pattern(&mut self) -> Pattern {
        self.nested(Self::not_pattern_body).unwrap_or_else(|| {
            let start = self.start();
            let value = self.too_complex_expr();
            self.pattern_node(start, PatternKind::Constant(value))
        })
    }

    fn not_pattern_body(&mut self) -> Pattern {
        let start = self.start();
        if self.at_kw("not") {
            self.bump();
            let inner = self.not_pattern();
            return self.pattern_node(start, PatternKind::Not(Box::new(inner)));
        }
        self.primary_pattern()
    }

    fn primary_pattern(&mut self) -> Pattern {
        let start = self.start();
        match self.kind() {
            TokenKind::LParen => {
                // parenthesized or positional
                let cp = self.checkpoint();
                self.bump();
                let inner = self.pattern();
                if self.eat(TokenKind::RParen).is_some() {
                    return inner;
                }
                self.rewind(cp);
                self.skip_balanced(TokenKind::LParen, TokenKind::RParen);
                let designation = self.designation();
                return self.pattern_node(start, PatternKind::Recursive { ty: None, designation });
            }
            TokenKind::LBrace | TokenKind::LBracket => {
                let (open, close) = if self.at(TokenKind::LBrace) {
                    (TokenKind::LBrace, TokenKind::RBrace)
                } else {
                    (TokenKind::LBracket, TokenKind::RBracket)
                };
                self.skip_balanced(open, close);
                let designation = self.designation();
                return self.pattern_node(start, PatternKind::Recursive { ty: None, designation });
            }
            TokenKind::Lt | TokenKind::LtEq | TokenKind::Gt | TokenKind::GtEq => {
                let op = match self.kind() {
                    TokenKind::Lt => BinaryOp::Lt,
                    TokenKind::LtEq => BinaryOp::Le,
                    TokenKind::Gt => BinaryOp::Gt,
                    _ => BinaryOp::Ge,
                };
                self.bump();
                let value = self.binary(8);
                return self.pattern_node(start, PatternKind::Relational { op, value });
            }
            TokenKind::Number | TokenKind::String | TokenKind::Char | TokenKind::Minus => {
                let value = self.binary(8);
                return self.pattern_node(start, PatternKind::Constant(value));
            }
            _ => {}
        }

        if self.at_any_kw(&["null", "true", "false", "default"]) {
            let value = self.binary(8);
            return self.pattern_node(start, PatternKind::Constant(value));
        }
        if self.at_kw("_") {
            self.bump();
            return self.pattern_node(start, PatternKind::Discard);
        }
        if self.at_kw("var") && self.nth_is_ident(1) {
            self.bump();
            let name = self.ident_token();
            return self.pattern_node(start, PatternKind::Var(name));
        }

        if let Some(ty) = self.type_opt() {
            if matches!(self.kind(), TokenKind::LBrace | TokenKind::LParen) {
                let (open, close) = if self.at(TokenKind::LBrace) {
                    (TokenKind::LBrace, TokenKind::RBrace)
                } else {
                    (TokenKind::LParen, TokenKind::RParen)
                };
                self.skip_balanced(open, close);
                if self.at(TokenKind::LBrace) {
                    self.skip_balanced(TokenKind::LBrace, TokenKind::RBrace);
                }
                let designation = self.designation();
                return self.pattern_node(
                    start,
                    PatternKind::Recursive {
                        ty: Some(ty),
                        designation,
                    },
                );
            }
            if let Some(name) = self.designation() {
                return self.pattern_node(start, PatternKind::Declaration { ty, name });
            }
            return self.pattern_node(start, PatternKind::Type(ty));
        }

        let value = self.binary(8);
        self.pattern_node(start, PatternKind::Constant(value))
    }

    fn designation(&mut self) -> Option<Ident> {
        if self.at_ident() && !self.at_any_kw(&["when", "and", "or", "not", "is", "as", "with", "switch"]) {
            Some(self.ident_token())
        } else {
            None
        }
    }
}

fn punct_text(kind: TokenKind) -> &'static str {
    match kind {
        TokenKind::LBrace => "{",
        TokenKind::RBrace => "}",
        TokenKind::LParen => "(",
        TokenKind::RParen => ")",
        TokenKind::LBracket => "[",
        TokenKind::RBracket => "]",
        TokenKind::Semi => ";",
        TokenKind::Comma => ",",
        TokenKind::Dot => ".",
        TokenKind::Colon => ":",
        TokenKind::Arrow => "=>",
        TokenKind::Eq => "=",
        TokenKind::Lt => "<",
        TokenKind::Gt => ">",
        _ => "token",
    }
}

#[cfg(test)]
mod tests {
    use crate::syntax::*;

    fn parse_ok(src: &str) -> SyntaxTree {
        let tree = SyntaxTree::parse(src);
        assert!(tree.errors().is_empty(), "unexpected errors: {:?}", tree.errors());
        tree
    }

    fn first_type(tree: &SyntaxTree) -> &TypeDecl {
        fn find(members: &[Member]) -> Option<&TypeDecl> {
            members.iter().find_map(|m| match m {
                Member::Type(t) => Some(t),
                Member::Namespace(n) => find(&n.members),
                _ => None,
            })
        }
        find(&tree.root().members).expect("type declaration")
    }

    fn method<'a>(ty: &'a TypeDecl, name: &str) -> &'a MethodDecl {
        ty.members
            .iter()
            .find_map(|m| match m {
                Member::Method(m) if m.name.is(name) => Some(m),
                _ => None,
            })
            .expect("method")
    }

    fn body_stmts(m: &MethodDecl) -> &[Stmt] {
        &m.body.as_ref().expect("body").stmts
    }

    #[test]
    fn test_parse_usings_and_namespaces() {
        let tree = parse_ok(
            "using System;\nusing static System.Math;\nusing T = System.Threading.Tasks.Task;\nnamespace A.B { class C { } }",
        );
        let root = tree.root();
        assert_eq!(root.usings.len(), 3);
        assert!(root.usings[1].is_static);
        assert_eq!(root.usings[2].alias.as_ref().unwrap().text, "T");
        assert!(matches!(root.members[0], Member::Namespace(_)));
    }

    #[test]
    fn test_parse_file_scoped_namespace() {
        let tree = parse_ok("namespace A;\nusing System;\nclass C { }\nclass D { }");
        match &tree.root().members[0] {
            Member::Namespace(ns) => {
                assert!(ns.file_scoped);
                assert_eq!(ns.usings.len(), 1);
                assert_eq!(ns.members.len(), 2);
            }
            _ => panic!("expected namespace"),
        }
    }

    #[test]
    fn test_parse_class_with_base_list() {
        let tree = parse_ok("public class H : Base, IHandleMessages<OrderPlaced> { }");
        let ty = first_type(&tree);
        assert_eq!(ty.name.text, "H");
        let bases = &ty.base_list.as_ref().unwrap().types;
        assert_eq!(bases.len(), 2);
        assert_eq!(tree.slice(bases[1].span), "IHandleMessages<OrderPlaced>");
        assert!(ty.open_brace.is_some() && ty.close_brace.is_some());
    }

    #[test]
    fn test_parse_method_parameters() {
        let tree = parse_ok(
            "class C { public Task Run(int a, CancellationToken token = default) => Task.CompletedTask; }",
        );
        let m = method(first_type(&tree), "Run");
        assert_eq!(m.params.params.len(), 2);
        assert!(m.params.params[1].default.is_some());
        assert_eq!(tree.slice(m.params.params[1].name.span), "token");
        assert!(m.expr_body.is_some());
    }

    #[test]
    fn test_parse_explicit_interface_implementation() {
        let tree = parse_ok("class C : I { void I.M(CancellationToken t) { } Task IFoo<int>.N() => null; }");
        let ty = first_type(&tree);
        let m = method(ty, "M");
        assert_eq!(m.explicit_interface.as_ref().unwrap().dotted_name().unwrap(), "I");
        let n = method(ty, "N");
        assert!(n.explicit_interface.is_some());
    }

    #[test]
    fn test_parse_generic_method_and_constraints() {
        let tree = parse_ok("class C { T Get<T>(T value) where T : class, new() { return value; } }");
        let m = method(first_type(&tree), "Get");
        assert_eq!(m.type_params.len(), 1);
        assert_eq!(body_stmts(m).len(), 1);
    }

    #[test]
    fn test_parse_interface_members() {
        let tree = parse_ok(
            "interface I { Task A(CancellationToken t); private void B() { } int P { get; } }",
        );
        let ty = first_type(&tree);
        assert_eq!(ty.keyword, TypeKeyword::Interface);
        assert_eq!(ty.members.len(), 3);
        assert!(!method(ty, "A").has_body());
        assert!(method(ty, "B").has_body());
    }

    #[test]
    fn test_parse_nested_delegate() {
        let tree = parse_ok("class C { private delegate Task D(CancellationToken t); }");
        let ty = first_type(&tree);
        assert!(matches!(ty.members[0], Member::Delegate(_)));
    }

    #[test]
    fn test_parse_properties_and_fields() {
        let tree = parse_ok(
            "class C { int x = 1, y; public string Name { get; private set; } = \"\"; int Z => x; event Action E; }",
        );
        let ty = first_type(&tree);
        assert_eq!(ty.members.len(), 4);
        match &ty.members[0] {
            Member::Field(f) => assert_eq!(f.declarators.len(), 2),
            _ => panic!("expected field"),
        }
        match &ty.members[1] {
            Member::Property(p) => {
                assert_eq!(p.accessors.len(), 2);
                assert!(p.initializer.is_some());
            }
            _ => panic!("expected property"),
        }
    }

    #[test]
    fn test_parse_constructor_and_destructor() {
        let tree = parse_ok("class C { public C(int a) : base(a) { } ~C() { } }");
        let ty = first_type(&tree);
        assert!(matches!(ty.members[0], Member::Constructor(_)));
        match &ty.members[1] {
            Member::Constructor(c) => assert_eq!(c.name.text, "~C"),
            _ => panic!("expected destructor"),
        }
    }

    #[test]
    fn test_parse_local_declarations_and_invocations() {
        let tree = parse_ok(
            "class C { async Task M() { var x = Foo(); List<int> items = new List<int>(); await Bar(x); Baz<int>(1); x = 2; } }",
        );
        let stmts = body_stmts(method(first_type(&tree), "M"));
        assert!(matches!(stmts[0].kind, StmtKind::LocalDecl(_)));
        assert!(matches!(stmts[1].kind, StmtKind::LocalDecl(_)));
        match &stmts[2].kind {
            StmtKind::Expr(e) => assert!(matches!(e.kind, ExprKind::Await(_))),
            _ => panic!("expected await statement"),
        }
        match &stmts[3].kind {
            StmtKind::Expr(Expr {
                kind: ExprKind::Invocation { target, .. },
                ..
            }) => match &target.kind {
                ExprKind::Name(n) => assert_eq!(n.type_args.len(), 1),
                _ => panic!("expected generic name"),
            },
            _ => panic!("expected invocation"),
        }
        assert!(matches!(
            stmts[4].kind,
            StmtKind::Expr(Expr {
                kind: ExprKind::Assignment { .. },
                ..
            })
        ));
    }

    #[test]
    fn test_parse_local_function() {
        let tree = parse_ok("class C { void M() { async Task Local(int a) { await Task.Delay(a); } Local(1); } }");
        let stmts = body_stmts(method(first_type(&tree), "M"));
        assert!(matches!(stmts[0].kind, StmtKind::LocalFunction(_)));
        assert!(matches!(stmts[1].kind, StmtKind::Expr(_)));
    }

    #[test]
    fn test_parse_try_catch_with_filters() {
        let tree = parse_ok(
            "class C { void M() { try { } catch (OperationCanceledException) { } catch (Exception ex) when (!(ex is OperationCanceledException)) { } catch { } finally { } } }",
        );
        let stmts = body_stmts(method(first_type(&tree), "M"));
        let StmtKind::Try(t) = &stmts[0].kind else {
            panic!("expected try");
        };
        assert_eq!(t.catches.len(), 3);
        assert!(t.catches[0].declaration.as_ref().unwrap().name.is_none());
        assert_eq!(tree.slice(t.catches[1].keyword), "catch");
        let filter = &t.catches[1].filter.as_ref().unwrap().expr;
        let ExprKind::Unary { op: UnaryOp::Not, operand } = &filter.kind else {
            panic!("expected negation");
        };
        let ExprKind::Parenthesized(inner) = &operand.kind else {
            panic!("expected parentheses");
        };
        assert!(matches!(inner.kind, ExprKind::IsType { .. }));
        assert!(t.catches[2].declaration.is_none());
        assert!(t.finally.is_some());
    }

    #[test]
    fn test_parse_is_not_pattern() {
        let tree = parse_ok("class C { void M() { try { } catch (Exception ex) when (ex is not OperationCanceledException) { } } }");
        let stmts = body_stmts(method(first_type(&tree), "M"));
        let StmtKind::Try(t) = &stmts[0].kind else {
            panic!("expected try");
        };
        let filter = &t.catches[0].filter.as_ref().unwrap().expr;
        let ExprKind::IsPattern { pattern, .. } = &filter.kind else {
            panic!("expected is pattern");
        };
        let PatternKind::Not(inner) = &pattern.kind else {
            panic!("expected not pattern");
        };
        assert!(matches!(inner.kind, PatternKind::Type(_)));
    }

    #[test]
    fn test_parse_lambdas() {
        let tree = parse_ok(
            "class C { void M() { Func<Task> f = async () => await Task.Delay(1); Run(x => x + 1); Run((a, b) => { }); Run(delegate { }); } }",
        );
        let stmts = body_stmts(method(first_type(&tree), "M"));
        let StmtKind::LocalDecl(decl) = &stmts[0].kind else {
            panic!("expected declaration");
        };
        let init = decl.declarators[0].init.as_ref().unwrap();
        match &init.kind {
            ExprKind::Lambda(l) => assert!(l.is_async),
            _ => panic!("expected lambda"),
        }
        assert_eq!(stmts.len(), 4);
    }

    #[test]
    fn test_parse_casts_and_parentheses() {
        let tree = parse_ok("class C { void M() { var a = (int)x; var b = (x) + 1; var c = (Foo)y; var d = (a, b); } }");
        let stmts = body_stmts(method(first_type(&tree), "M"));
        let init = |i: usize| match &stmts[i].kind {
            StmtKind::LocalDecl(d) => d.declarators[0].init.clone().unwrap(),
            _ => panic!("expected declaration"),
        };
        assert!(matches!(init(0).kind, ExprKind::Cast { .. }));
        assert!(matches!(init(1).kind, ExprKind::Binary { .. }));
        assert!(matches!(init(2).kind, ExprKind::Cast { .. }));
        assert!(matches!(init(3).kind, ExprKind::Tuple(_)));
    }

    #[test]
    fn test_parse_generic_comparison_is_not_generic_name() {
        let tree = parse_ok("class C { void M() { var r = a < b && c > d; } }");
        let stmts = body_stmts(method(first_type(&tree), "M"));
        let StmtKind::LocalDecl(decl) = &stmts[0].kind else {
            panic!("expected declaration");
        };
        let init = decl.declarators[0].init.as_ref().unwrap();
        assert!(matches!(
            init.kind,
            ExprKind::Binary {
                op: BinaryOp::And,
                ..
            }
        ));
    }

    #[test]
    fn test_parse_statements() {
        parse_ok(
            r#"class C {
                void M(int[] xs) {
                    if (x) { } else if (y) return; else { }
                    while (true) break;
                    do { continue; } while (false);
                    for (var i = 0; i < 10; i++) { }
                    foreach (var item in xs) { }
                    using (var s = Open()) { }
                    using var t = Open();
                    lock (this) { }
                    switch (x) { case 1: case 2 when y: break; default: break; }
                    throw new InvalidOperationException("x");
                }
            }"#,
        );
    }

    #[test]
    fn test_parse_object_and_array_creation() {
        parse_ok(
            "class C { void M() { var a = new Foo { X = 1 }; var b = new int[] { 1, 2 }; var c = new[] { 1 }; var d = new int[3]; Foo e = new(); var f = new { A = 1 }; } }",
        );
    }

    #[test]
    fn test_parse_switch_expression_and_patterns() {
        parse_ok(
            "class C { int M(object o) { if (o is string s && s.Length > 0) { } return o switch { int i when i > 0 => 1, null => 0, _ => -1 }; } }",
        );
    }

    #[test]
    fn test_parse_pragma_lines_are_ignored() {
        let tree = parse_ok(
            "class C {\n#pragma warning disable\n  void M() { }\n#pragma warning restore\n}",
        );
        assert_eq!(first_type(&tree).members.len(), 1);
        assert_eq!(tree.trivia().len(), 2);
    }

    #[test]
    fn test_missing_semicolon_reports_error() {
        let tree = SyntaxTree::parse("class C { void M() { Foo() } }");
        assert_eq!(tree.errors().len(), 1);
        assert_eq!(tree.errors()[0].code, "CS1002");
    }

    #[test]
    fn test_missing_brace_reports_error() {
        let tree = SyntaxTree::parse("class C { void M() { }");
        assert!(tree.errors().iter().any(|e| e.code == "CS1513"));
    }

    #[test]
    fn test_recovery_keeps_following_members() {
        let tree = SyntaxTree::parse("class C { void M() { Foo( } void N() { } }");
        assert!(!tree.errors().is_empty());
        let ty = first_type(&tree);
        assert!(ty.members.iter().any(|m| matches!(m, Member::Method(m) if m.name.is("N"))));
    }

    #[test]
    fn test_node_ids_are_unique() {
        let tree = parse_ok("class C { void M(int a) { Foo(a); Bar(a); } }");
        let mut ids: Vec<_> = tree.root_node().descendants().map(|n| n.id()).collect();
        let count = ids.len();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), count);
    }

    fn else_if_chain(branches: usize) -> String {
        let mut body = String::from("if (x == 0) { }");
        for i in 1..branches {
            body.push_str(&format!(" else if (x == {}) {{ }}", i));
        }
        body.push_str(" else { }");
        body
    }

    fn sum_chain(terms: usize) -> String {
        vec!["x"; terms].join(" + ")
    }

    #[test]
    fn test_long_else_if_chain_reports_too_complex() {
        let src = format!(
            "class C {{ void M(int x) {{ {} }} void After() {{ }} }}",
            else_if_chain(1000)
        );
        let tree = SyntaxTree::parse(&src);
        assert!(!tree.errors().is_empty());
        assert!(tree.errors().iter().all(|e| e.code == "CS8078"), "{:?}", tree.errors());
        let ty = first_type(&tree);
        assert!(ty.members.iter().any(|m| matches!(m, Member::Method(m) if m.name.is("After"))));
    }

    #[test]
    fn test_long_addition_chain_reports_too_complex() {
        let src = format!(
            "class C {{ int M(int x) {{ var y = {}; return y; }} void After() {{ }} }}",
            sum_chain(5000)
        );
        let tree = SyntaxTree::parse(&src);
        let codes: Vec<&str> = tree.errors().iter().map(|e| e.code).collect();
        assert_eq!(codes, vec!["CS8078"]);
        let ty = first_type(&tree);
        let stmts = body_stmts(method(ty, "M"));
        assert_eq!(stmts.len(), 2);
        assert!(matches!(stmts[1].kind, StmtKind::Return(Some(_))));
        assert!(ty.members.iter().any(|m| matches!(m, Member::Method(m) if m.name.is("After"))));
    }

    #[test]
    fn test_moderate_nesting_is_accepted() {
        let src = format!(
            "class C {{ int M(int x) {{ {} var y = {}; return ((((y)))); }} }}",
            else_if_chain(40),
            sum_chain(60)
        );
        parse_ok(&src);
    }
}
