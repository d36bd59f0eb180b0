//! Tokenizer for C# source text
//!
//! Produces a flat token stream. Comments and preprocessor lines are kept
//! out of the stream but recorded separately so suppression pragmas can be
//! read back later.

use super::{Span, SyntaxError};

/// Token kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    Ident,
    Number,
    String,
    Char,
    LBrace,
    RBrace,
    LParen,
    RParen,
    LBracket,
    RBracket,
    Semi,
    Comma,
    Dot,
    Colon,
    ColonColon,
    Question,
    QuestionDot,
    QuestionQuestion,
    QuestionQuestionEq,
    Arrow,
    Eq,
    EqEq,
    NotEq,
    Bang,
    Lt,
    LtEq,
    LtLt,
    LtLtEq,
    Gt,
    GtEq,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    PlusEq,
    MinusEq,
    StarEq,
    SlashEq,
    PercentEq,
    AmpEq,
    PipeEq,
    CaretEq,
    PlusPlus,
    MinusMinus,
    Amp,
    AmpAmp,
    Pipe,
    PipePipe,
    Caret,
    Tilde,
    DotDot,
    Unknown,
    Eof,
}

/// A single token
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
    /// `@`-prefixed identifier; never treated as a keyword
    pub verbatim: bool,
}

/// Kind of trivia recorded alongside the token stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriviaKind {
    LineComment,
    BlockComment,
    Directive,
}

/// A comment or preprocessor line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Trivia {
    pub kind: TriviaKind,
    pub span: Span,
}

/// Output of the lexer
#[derive(Debug, Default)]
pub struct Lexed {
    pub tokens: Vec<Token>,
    pub trivia: Vec<Trivia>,
    pub errors: Vec<SyntaxError>,
}

/// Tokenize C# source
pub fn lex(src: &str) -> Lexed {
    Lexer::new(src).run()
}

struct Lexer<'a> {
    src: &'a str,
    bytes: &'a [u8],
    pos: usize,
    /// True while only whitespace has been seen on the current line
    line_start: bool,
    out: Lexed,
}

impl<'a> Lexer<'a> {
    fn new(src: &'a str) -> Self {
        Self {
            src,
            bytes: src.as_bytes(),
            pos: 0,
            line_start: true,
            out: Lexed::default(),
        }
    }

    fn peek(&self, offset: usize) -> u8 {
        self.bytes.get(self.pos + offset).copied().unwrap_or(0)
    }

    fn run(mut self) -> Lexed {
        while self.pos < self.bytes.len() {
            let c = self.peek(0);
            match c {
                b'\n' => {
                    self.pos += 1;
                    self.line_start = true;
                }
                b' ' | b'\t' | b'\r' | 0x0b | 0x0c => self.pos += 1,
                b'#' if self.line_start => self.directive(),
                b'/' if self.peek(1) == b'/' => self.line_comment(),
                b'/' if self.peek(1) == b'*' => self.block_comment(),
                _ => {
                    self.line_start = false;
                    self.token();
                }
            }
        }
        let end = self.bytes.len();
        self.out.tokens.push(Token {
            kind: TokenKind::Eof,
            span: Span::new(end, end),
            verbatim: false,
        });
        self.out
    }

    fn skip_to_line_end(&mut self) {
        while self.pos < self.bytes.len() && self.peek(0) != b'\n' {
            self.pos += 1;
        }
    }

    fn directive(&mut self) {
        let start = self.pos;
        self.skip_to_line_end();
        let end = trim_end(self.src, start, self.pos);
        self.out.trivia.push(Trivia {
            kind: TriviaKind::Directive,
            span: Span::new(start, end),
        });
    }

    fn line_comment(&mut self) {
        let start = self.pos;
        self.skip_to_line_end();
        let end = trim_end(self.src, start, self.pos);
        self.out.trivia.push(Trivia {
            kind: TriviaKind::LineComment,
            span: Span::new(start, end),
        });
    }

    fn block_comment(&mut self) {
        let start = self.pos;
        self.pos += 2;
        loop {
            if self.pos >= self.bytes.len() {
                self.error(start, "CS1035", "End-of-file found, '*/' expected");
                break;
            }
            if self.peek(0) == b'*' && self.peek(1) == b'/' {
                self.pos += 2;
                break;
            }
            self.pos += 1;
        }
        self.out.trivia.push(Trivia {
            kind: TriviaKind::BlockComment,
            span: Span::new(start, self.pos),
        });
    }

    fn error(&mut self, start: usize, code: &'static str, message: &str) {
        self.out.errors.push(SyntaxError {
            code,
            message: message.to_string(),
            span: Span::new(start, self.pos.max(start)),
        });
    }

    fn push(&mut self, kind: TokenKind, start: usize) {
        self.out.tokens.push(Token {
            kind,
            span: Span::new(start, self.pos),
            verbatim: false,
        });
    }

    fn token(&mut self) {
        let start = self.pos;
        let c = self.peek(0);

        if c == b'@' && self.peek(1) == b'"' {
            self.pos += 1;
            self.verbatim_string(start);
            return;
        }
        if c == b'$' {
            let mut i = 1;
            let mut verbatim = false;
            while matches!(self.peek(i), b'@' | b'$') {
                verbatim |= self.peek(i) == b'@';
                i += 1;
            }
            if self.peek(i) == b'"' {
                self.pos += i;
                if verbatim {
                    self.verbatim_string(start);
                } else {
                    self.interpolated_string(start);
                }
                return;
            }
        }
        if c == b'@' && self.starts_ident(self.pos + 1) {
            self.pos += 1;
            self.ident_tail();
            self.out.tokens.push(Token {
                kind: TokenKind::Ident,
                span: Span::new(start, self.pos),
                verbatim: true,
            });
            return;
        }
        if self.starts_ident(self.pos) {
            self.ident_tail();
            self.push(TokenKind::Ident, start);
            return;
        }
        if c.is_ascii_digit() || (c == b'.' && self.peek(1).is_ascii_digit()) {
            self.number();
            self.push(TokenKind::Number, start);
            return;
        }
        match c {
            b'"' => {
                self.regular_string(start);
                return;
            }
            b'\'' => {
                self.char_literal(start);
                return;
            }
            _ => {}
        }

        let (kind, len) = self.punct();
        self.pos += len;
        if kind == TokenKind::Unknown {
            self.error(start, "CS1056", &format!("Unexpected character '{}'", char_at(self.src, start)));
        }
        self.push(kind, start);
    }

    fn starts_ident(&self, at: usize) -> bool {
        match self.bytes.get(at) {
            Some(&c) if c < 0x80 => c.is_ascii_alphabetic() || c == b'_',
            Some(_) => char_at(self.src, at).is_alphabetic(),
            None => false,
        }
    }

    fn ident_tail(&mut self) {
        while self.pos < self.bytes.len() {
            let c = self.peek(0);
            if is_ident_continue(c) {
                self.pos += 1;
            } else if c >= 0x80 {
                // non-ASCII letters are accepted as identifier characters
                let ch = char_at(self.src, self.pos);
                if ch.is_alphanumeric() {
                    self.pos += ch.len_utf8();
                } else {
                    break;
                }
            } else {
                break;
            }
        }
    }

    fn number(&mut self) {
        if self.peek(0) == b'0' && matches!(self.peek(1), b'x' | b'X' | b'b' | b'B') {
            self.pos += 2;
            while self.peek(0).is_ascii_hexdigit() || self.peek(0) == b'_' {
                self.pos += 1;
            }
        } else {
            while self.peek(0).is_ascii_digit() || self.peek(0) == b'_' {
                self.pos += 1;
            }
            if self.peek(0) == b'.' && self.peek(1).is_ascii_digit() {
                self.pos += 1;
                while self.peek(0).is_ascii_digit() || self.peek(0) == b'_' {
                    self.pos += 1;
                }
            }
            if matches!(self.peek(0), b'e' | b'E') {
                let sign = usize::from(matches!(self.peek(1), b'+' | b'-'));
                if self.peek(1 + sign).is_ascii_digit() {
                    self.pos += 1 + sign;
                    while self.peek(0).is_ascii_digit() {
                        self.pos += 1;
                    }
                }
            }
        }
        while matches!(
            self.peek(0),
            b'u' | b'U' | b'l' | b'L' | b'f' | b'F' | b'd' | b'D' | b'm' | b'M'
        ) {
            self.pos += 1;
        }
    }

    fn regular_string(&mut self, start: usize) {
        self.pos += 1;
        loop {
            if self.pos >= self.bytes.len() || self.peek(0) == b'\n' {
                self.error(start, "CS1010", "Newline in constant");
                break;
            }
            match self.peek(0) {
                b'"' => {
                    self.pos += 1;
                    break;
                }
                b'\\' => self.pos += 2,
                _ => self.pos += 1,
            }
        }
        self.pos = self.pos.min(self.bytes.len());
        self.push(TokenKind::String, start);
    }

    fn verbatim_string(&mut self, start: usize) {
        // positioned on the opening quote
        self.pos += 1;
        loop {
            if self.pos >= self.bytes.len() {
                self.error(start, "CS1039", "Unterminated string literal");
                break;
            }
            if self.peek(0) == b'"' {
                if self.peek(1) == b'"' {
                    self.pos += 2;
                    continue;
                }
                self.pos += 1;
                break;
            }
            self.pos += 1;
        }
        self.push(TokenKind::String, start);
    }

    fn interpolated_string(&mut self, start: usize) {
        // positioned on the opening quote; holes may nest strings and braces
        self.pos += 1;
        let mut depth = 0usize;
        loop {
            if self.pos >= self.bytes.len() || (depth == 0 && self.peek(0) == b'\n') {
                self.error(start, "CS1010", "Newline in constant");
                break;
            }
            match self.peek(0) {
                b'{' if depth == 0 && self.peek(1) == b'{' => self.pos += 2,
                b'}' if depth == 0 && self.peek(1) == b'}' => self.pos += 2,
                b'{' => {
                    depth += 1;
                    self.pos += 1;
                }
                b'}' if depth > 0 => {
                    depth -= 1;
                    self.pos += 1;
                }
                b'"' if depth > 0 => {
                    let inner = self.pos;
                    self.regular_string(inner);
                    // nested literal tokens are folded into the outer string
                    self.out.tokens.pop();
                }
                b'\\' if depth == 0 => self.pos += 2,
                b'"' => {
                    self.pos += 1;
                    break;
                }
                _ => self.pos += 1,
            }
        }
        self.pos = self.pos.min(self.bytes.len());
        self.push(TokenKind::String, start);
    }

    fn char_literal(&mut self, start: usize) {
        self.pos += 1;
        loop {
            match self.peek(0) {
                b'\'' => {
                    self.pos += 1;
                    break;
                }
                b'\\' => self.pos += 2,
                b'\n' | 0 => {
                    self.error(start, "CS1012", "Too many characters in character literal");
                    break;
                }
                _ => self.pos += 1,
            }
        }
        self.pos = self.pos.min(self.bytes.len());
        self.push(TokenKind::Char, start);
    }

    fn punct(&self) -> (TokenKind, usize) {
        use TokenKind::*;
        let (a, b, c) = (self.peek(0), self.peek(1), self.peek(2));
        match (a, b, c) {
            (b'?', b'?', b'=') => (QuestionQuestionEq, 3),
            (b'<', b'<', b'=') => (LtLtEq, 3),
            (b'?', b'?', _) => (QuestionQuestion, 2),
            (b'?', b'.', d) if !d.is_ascii_digit() => (QuestionDot, 2),
            (b':', b':', _) => (ColonColon, 2),
            (b'=', b'>', _) => (Arrow, 2),
            (b'=', b'=', _) => (EqEq, 2),
            (b'!', b'=', _) => (NotEq, 2),
            (b'<', b'=', _) => (LtEq, 2),
            (b'<', b'<', _) => (LtLt, 2),
            (b'>', b'=', _) => (GtEq, 2),
            (b'+', b'=', _) => (PlusEq, 2),
            (b'-', b'=', _) => (MinusEq, 2),
            (b'*', b'=', _) => (StarEq, 2),
            (b'/', b'=', _) => (SlashEq, 2),
            (b'%', b'=', _) => (PercentEq, 2),
            (b'&', b'=', _) => (AmpEq, 2),
            (b'|', b'=', _) => (PipeEq, 2),
            (b'^', b'=', _) => (CaretEq, 2),
            (b'+', b'+', _) => (PlusPlus, 2),
            (b'-', b'-', _) => (MinusMinus, 2),
            (b'&', b'&', _) => (AmpAmp, 2),
            (b'|', b'|', _) => (PipePipe, 2),
            (b'.', b'.', _) => (DotDot, 2),
            (b'-', b'>', _) => (Dot, 2),
            (b'{', _, _) => (LBrace, 1),
            (b'}', _, _) => (RBrace, 1),
            (b'(', _, _) => (LParen, 1),
            (b')', _, _) => (RParen, 1),
            (b'[', _, _) => (LBracket, 1),
            (b']', _, _) => (RBracket, 1),
            (b';', _, _) => (Semi, 1),
            (b',', _, _) => (Comma, 1),
            (b'.', _, _) => (Dot, 1),
            (b':', _, _) => (Colon, 1),
            (b'?', _, _) => (Question, 1),
            (b'=', _, _) => (Eq, 1),
            (b'!', _, _) => (Bang, 1),
            (b'<', _, _) => (Lt, 1),
            (b'>', _, _) => (Gt, 1),
            (b'+', _, _) => (Plus, 1),
            (b'-', _, _) => (Minus, 1),
            (b'*', _, _) => (Star, 1),
            (b'/', _, _) => (Slash, 1),
            (b'%', _, _) => (Percent, 1),
            (b'&', _, _) => (Amp, 1),
            (b'|', _, _) => (Pipe, 1),
            (b'^', _, _) => (Caret, 1),
            (b'~', _, _) => (Tilde, 1),
            _ => (Unknown, char_at(self.src, self.pos).len_utf8()),
        }
    }
}

fn is_ident_continue(c: u8) -> bool {
    c.is_ascii_alphanumeric() || c == b'_'
}

fn char_at(src: &str, pos: usize) -> char {
    src[pos..].chars().next().unwrap_or('\0')
}

fn trim_end(src: &str, start: usize, end: usize) -> usize {
    start + src[start..end].trim_end().len()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<TokenKind> {
        lex(src).tokens.iter().map(|t| t.kind).collect()
    }

    #[test]
    fn test_lex_identifiers_and_punct() {
        use TokenKind::*;
        assert_eq!(
            kinds("a.b(c, d);"),
            vec![Ident, Dot, Ident, LParen, Ident, Comma, Ident, RParen, Semi, Eof]
        );
    }

    #[test]
    fn test_lex_operators() {
        use TokenKind::*;
        assert_eq!(
            kinds("a ?? b ?. c => d != e >= f"),
            vec![
                Ident,
                QuestionQuestion,
                Ident,
                QuestionDot,
                Ident,
                Arrow,
                Ident,
                NotEq,
                Ident,
                GtEq,
                Ident,
                Eof
            ]
        );
    }

    #[test]
    fn test_greater_than_is_never_merged() {
        use TokenKind::*;
        assert_eq!(kinds("A<B<C>>"), vec![Ident, Lt, Ident, Lt, Ident, Gt, Gt, Eof]);
    }

    #[test]
    fn test_comments_and_directives_are_trivia() {
        let lexed = lex("#pragma warning disable\n// note\nx /* y */;");
        assert_eq!(lexed.trivia.len(), 3);
        assert_eq!(lexed.trivia[0].kind, TriviaKind::Directive);
        assert_eq!(lexed.trivia[1].kind, TriviaKind::LineComment);
        assert_eq!(lexed.trivia[2].kind, TriviaKind::BlockComment);
        assert_eq!(lexed.tokens.len(), 3);
    }

    #[test]
    fn test_hash_inside_line_is_not_directive() {
        let lexed = lex("x # y");
        assert!(lexed.trivia.is_empty());
        assert_eq!(lexed.errors.len(), 1);
    }

    #[test]
    fn test_string_literals() {
        use TokenKind::*;
        assert_eq!(kinds(r#""a\"b" @"c""d" $"{x} {{y}}""#), vec![String, String, String, Eof]);
        assert_eq!(kinds("'a' '\\''"), vec![Char, Char, Eof]);
    }

    #[test]
    fn test_unterminated_string_reports_error() {
        let lexed = lex("\"abc\nx");
        assert_eq!(lexed.errors.len(), 1);
        assert_eq!(lexed.errors[0].code, "CS1010");
    }

    #[test]
    fn test_verbatim_identifier() {
        let lexed = lex("@class");
        assert_eq!(lexed.tokens[0].kind, TokenKind::Ident);
        assert!(lexed.tokens[0].verbatim);
    }

    #[test]
    fn test_numbers() {
        use TokenKind::*;
        assert_eq!(kinds("1 2.5 0xFF 10L 1e3 .5"), vec![Number; 6].into_iter().chain([Eof]).collect::<Vec<_>>());
    }
}
