//! # Lexer
//!
//! Breaks script source into tokens using [Logos]. Like the markdown lexer
//! this crate grew out of, it is **lossless**: every byte of the input ends up
//! in exactly one token, including whitespace and comments. The interpreter's
//! parser skips trivia; the syntax highlighter needs all of it so that
//! concatenating the highlighted tokens reproduces the code verbatim.
//!
//! [Logos]: https://docs.rs/logos
//!
//! ```
//! use blockpress_script::lexer::lex;
//!
//! let input = "let x = 1; // one\n";
//! let reconstructed: String = lex(input).iter().map(|t| t.text).collect();
//! assert_eq!(input, reconstructed);
//! ```
//!
//! Punctuators are a single token kind; the parser compares their text. That
//! keeps the token set small while still lexing `===` as one token rather
//! than three.

use std::ops::Range;

use logos::Logos;

/// Raw Logos token set. Kept private because Logos has no way to express the
/// "unrecognised byte" case as a variant; [`TokenKind`] adds it.
#[derive(Logos, Debug, Clone, Copy, PartialEq, Eq)]
enum RawToken {
    #[regex(r"[ \t\x{0b}\x{0c}\x{a0}\x{feff}]+")]
    Whitespace,

    #[regex(r"\r?\n")]
    Newline,

    #[regex(r"//[^\n]*")]
    LineComment,

    #[regex(r"/\*([^*]|\*+[^*/])*\*+/")]
    BlockComment,

    #[regex(r"[0-9]+(\.[0-9]*)?([eE][+-]?[0-9]+)?")]
    #[regex(r"\.[0-9]+([eE][+-]?[0-9]+)?")]
    #[regex(r"0[xX][0-9a-fA-F]+")]
    Number,

    #[regex(r#""([^"\\\n]|\\.)*""#)]
    #[regex(r"'([^'\\\n]|\\.)*'")]
    String,

    #[regex(r"`([^`\\]|\\.)*`")]
    Template,

    #[regex(r"[\p{XID_Start}_$][\p{XID_Continue}$]*")]
    Ident,

    #[regex(r"===|!==|\*\*=|\.\.\.|=>|==|!=|<=|>=|&&|\|\||\?\?|\+\+|--|\+=|-=|\*=|/=|%=|\*\*")]
    #[regex(r"[-+*/%<>=!?:;,.()\[\]{}&|^~@#\\]")]
    Punct,
}

impl RawToken {
    fn kind(self) -> TokenKind {
        match self {
            RawToken::Whitespace => TokenKind::Whitespace,
            RawToken::Newline => TokenKind::Newline,
            RawToken::LineComment => TokenKind::LineComment,
            RawToken::BlockComment => TokenKind::BlockComment,
            RawToken::Number => TokenKind::Number,
            RawToken::String => TokenKind::String,
            RawToken::Template => TokenKind::Template,
            RawToken::Ident => TokenKind::Ident,
            RawToken::Punct => TokenKind::Punct,
        }
    }
}

/// Token classification shared by the parser and the highlighter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    Whitespace,
    Newline,
    LineComment,
    BlockComment,
    Number,
    /// Single- or double-quoted string literal, quotes included.
    String,
    /// Backtick template literal, backticks included.
    Template,
    /// Identifier or keyword.
    Ident,
    Punct,
    /// A byte sequence no rule matched (stray quote, unterminated comment).
    Unknown,
}

impl TokenKind {
    /// Whitespace and comments: significant for highlighting only.
    pub fn is_trivia(self) -> bool {
        matches!(
            self,
            TokenKind::Whitespace
                | TokenKind::Newline
                | TokenKind::LineComment
                | TokenKind::BlockComment
        )
    }
}

/// A lexed token with its kind, text slice and byte span.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token<'a> {
    pub kind: TokenKind,
    pub text: &'a str,
    pub span: Range<usize>,
}

/// Lex the input into a sequence of tokens.
///
/// All bytes of the input appear in the output, in order.
pub fn lex(input: &str) -> Vec<Token<'_>> {
    let mut tokens: Vec<Token<'_>> = Vec::new();
    let mut lexer = RawToken::lexer(input);

    while let Some(result) = lexer.next() {
        let span = lexer.span();
        let text = lexer.slice();
        let kind = match result {
            Ok(raw) => raw.kind(),
            Err(()) => TokenKind::Unknown,
        };

        // Merge runs of unknown bytes so a stray multi-byte sequence stays one token.
        if kind == TokenKind::Unknown
            && let Some(last) = tokens.last_mut()
            && last.kind == TokenKind::Unknown
            && last.span.end == span.start
        {
            last.span.end = span.end;
            last.text = &input[last.span.clone()];
            continue;
        }

        tokens.push(Token { kind, text, span });
    }

    tokens
}
