//! Token-level syntax highlighting for code blocks.
//!
//! Works on already-sanitized markup and only ever wraps text in
//! `<span class="token …">`, so it cannot introduce anything the sanitizer
//! would have removed. Concatenating the text of the output gives back the
//! original code exactly. Highlighted elements are marked with
//! `data-highlighted="yes"` and skipped on later passes.

use std::sync::OnceLock;

use blockpress_script::lexer::{TokenKind, lex};
use regex::Regex;

const JS_KEYWORDS: &[&str] = &[
    "async", "await", "break", "case", "catch", "class", "const", "continue", "debugger",
    "default", "delete", "do", "else", "export", "extends", "finally", "for", "function", "if",
    "import", "in", "instanceof", "let", "new", "of", "return", "static", "super", "switch",
    "this", "throw", "try", "typeof", "var", "void", "while", "with", "yield",
];

const PYTHON_KEYWORDS: &[&str] = &[
    "and", "as", "assert", "async", "await", "break", "class", "continue", "def", "del", "elif",
    "else", "except", "finally", "for", "from", "global", "if", "import", "in", "is", "lambda",
    "nonlocal", "not", "or", "pass", "raise", "return", "try", "while", "with", "yield",
];

const RUST_KEYWORDS: &[&str] = &[
    "as", "async", "await", "break", "const", "continue", "crate", "dyn", "else", "enum",
    "extern", "fn", "for", "if", "impl", "in", "let", "loop", "match", "mod", "move", "mut",
    "pub", "ref", "return", "self", "Self", "static", "struct", "super", "trait", "type",
    "unsafe", "use", "where", "while",
];

const SHELL_KEYWORDS: &[&str] = &[
    "case", "do", "done", "elif", "else", "esac", "export", "fi", "for", "function", "if", "in",
    "local", "readonly", "return", "select", "then", "until", "while",
];

const C_LIKE_KEYWORDS: &[&str] = &[
    "auto", "break", "case", "catch", "class", "const", "continue", "default", "do", "else",
    "enum", "extends", "final", "for", "goto", "if", "implements", "import", "interface", "new",
    "package", "private", "protected", "public", "return", "sizeof", "static", "struct",
    "switch", "this", "throw", "throws", "try", "typedef", "union", "using", "void", "volatile",
    "while",
];

const LITERALS: &[&str] = &[
    "true", "false", "null", "undefined", "None", "True", "False", "nil", "NaN",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Family {
    JavaScript,
    Python,
    Rust,
    Shell,
    /// Hash-comment languages without a keyword set of their own.
    Hash,
    CLike,
}

impl Family {
    fn of(language: &str) -> Self {
        match language.to_ascii_lowercase().as_str() {
            "javascript" | "js" | "jsx" | "mjs" | "typescript" | "ts" | "tsx" | "json" => {
                Family::JavaScript
            }
            "python" | "py" => Family::Python,
            "rust" | "rs" => Family::Rust,
            "bash" | "sh" | "shell" | "zsh" | "console" => Family::Shell,
            "ruby" | "rb" | "yaml" | "yml" | "r" | "toml" => Family::Hash,
            _ => Family::CLike,
        }
    }

    fn keywords(self) -> &'static [&'static str] {
        match self {
            Family::JavaScript => JS_KEYWORDS,
            Family::Python => PYTHON_KEYWORDS,
            Family::Rust => RUST_KEYWORDS,
            Family::Shell => SHELL_KEYWORDS,
            Family::Hash => &[],
            Family::CLike => C_LIKE_KEYWORDS,
        }
    }

    fn hash_comments(self) -> bool {
        matches!(self, Family::Python | Family::Shell | Family::Hash)
    }
}

/// Highlight one snippet. Returns escaped markup with token spans.
pub fn highlight_code(source: &str, language: &str) -> String {
    let family = Family::of(language);
    let keywords = family.keywords();
    let tokens = lex(source);
    let mut out = String::with_capacity(source.len() * 2);
    let mut i = 0;

    while i < tokens.len() {
        let token = &tokens[i];

        if family.hash_comments() && token.kind == TokenKind::Punct && token.text == "#" {
            let start = token.span.start;
            while i < tokens.len() && tokens[i].kind != TokenKind::Newline {
                i += 1;
            }
            let end = tokens.get(i).map_or(source.len(), |t| t.span.start);
            push_span(&mut out, "comment", &source[start..end]);
            continue;
        }

        let class = match token.kind {
            TokenKind::Whitespace | TokenKind::Newline | TokenKind::Unknown => None,
            TokenKind::LineComment | TokenKind::BlockComment => Some("comment"),
            TokenKind::Number => Some("number"),
            TokenKind::String | TokenKind::Template => Some("string"),
            TokenKind::Ident if LITERALS.contains(&token.text) => Some("boolean"),
            TokenKind::Ident if keywords.contains(&token.text) => Some("keyword"),
            TokenKind::Ident => {
                let called = tokens[i + 1..]
                    .iter()
                    .find(|t| !t.kind.is_trivia())
                    .is_some_and(|t| t.kind == TokenKind::Punct && t.text == "(");
                called.then_some("function")
            }
            TokenKind::Punct if is_punctuation(token.text) => Some("punctuation"),
            TokenKind::Punct => Some("operator"),
        };

        match class {
            Some(class) => push_span(&mut out, class, token.text),
            None => out.push_str(&html_escape::encode_text(token.text)),
        }
        i += 1;
    }
    out
}

fn is_punctuation(text: &str) -> bool {
    matches!(text, "(" | ")" | "{" | "}" | "[" | "]" | ";" | "," | "." | ":")
}

fn push_span(out: &mut String, class: &str, text: &str) {
    out.push_str("<span class=\"token ");
    out.push_str(class);
    out.push_str("\">");
    out.push_str(&html_escape::encode_text(text));
    out.push_str("</span>");
}

fn code_block_regex() -> &'static Regex {
    static CODE_BLOCK: OnceLock<Regex> = OnceLock::new();
    CODE_BLOCK.get_or_init(|| {
        Regex::new(r#"(?s)<pre>(<code( [^>]*)?)>(.*?)</code></pre>"#).expect("Invalid code block regex")
    })
}

fn language_regex() -> &'static Regex {
    static LANGUAGE: OnceLock<Regex> = OnceLock::new();
    LANGUAGE.get_or_init(|| {
        Regex::new(r#"class="(?:[^"]* )?language-([^" ]+)[^"]*""#).expect("Invalid language regex")
    })
}

/// Highlight every `<pre><code class="language-…">` in sanitized markup.
///
/// Blocks without a language, blocks already marked, and blocks whose
/// content is not plain text are left as they are.
pub fn highlight_markup(html: &str) -> String {
    code_block_regex()
        .replace_all(html, |caps: &regex::Captures<'_>| {
            let whole = &caps[0];
            let open_tag = &caps[1];
            let attributes = caps.get(2).map_or("", |m| m.as_str());
            let content = &caps[3];

            if attributes.contains("data-highlighted=") || content.contains('<') {
                return whole.to_string();
            }
            let Some(language) = language_regex().captures(attributes).map(|c| c[1].to_string())
            else {
                return whole.to_string();
            };

            let code = html_escape::decode_html_entities(content);
            format!(
                "<pre>{open_tag} data-highlighted=\"yes\">{}</code></pre>",
                highlight_code(&code, &language)
            )
        })
        .into_owned()
}
