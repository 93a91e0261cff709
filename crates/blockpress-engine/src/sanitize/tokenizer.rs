//! A small, tolerant HTML tokenizer.
//!
//! It accepts the sloppy markup rich-text editors produce (unquoted and
//! valueless attributes, stray `<`, uppercase names) but refuses input
//! whose structure is ambiguous: a tag, comment or quoted attribute value
//! that never ends. The sanitizer treats that refusal as "not markup".

use std::collections::HashSet;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    /// Lowercased.
    pub name: String,
    /// Raw value, entities not yet decoded. `None` for `<input disabled>`.
    pub value: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token<'a> {
    Text(&'a str),
    StartTag {
        name: String,
        attributes: Vec<Attribute>,
        self_closing: bool,
    },
    EndTag {
        name: String,
    },
    /// Comments, doctypes and processing instructions.
    Ignored,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unterminated {
    Tag,
    Comment,
    Quote,
}

impl fmt::Display for Unterminated {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Unterminated::Tag => "unterminated tag",
            Unterminated::Comment => "unterminated comment",
            Unterminated::Quote => "unterminated attribute value",
        })
    }
}

/// Elements whose content is raw text up to the matching end tag.
const RAW_TEXT: &[&str] = &[
    "script", "style", "xmp", "iframe", "noembed", "noframes", "textarea", "title",
];

pub fn tokenize(input: &str) -> Result<Vec<Token<'_>>, Unterminated> {
    let mut tokens = Vec::new();
    let bytes = input.as_bytes();
    let mut pos = 0;
    let mut text_start = 0;

    while pos < bytes.len() {
        if bytes[pos] != b'<' {
            pos += 1;
            continue;
        }
        let next = bytes.get(pos + 1).copied();
        let is_markup = match next {
            Some(b) if b.is_ascii_alphabetic() => true,
            Some(b'/') => bytes.get(pos + 2).is_some_and(u8::is_ascii_alphabetic),
            Some(b'!' | b'?') => true,
            _ => false,
        };
        if !is_markup {
            pos += 1;
            continue;
        }

        if text_start < pos {
            tokens.push(Token::Text(&input[text_start..pos]));
        }

        let (token, end) = match next {
            Some(b'!') if input[pos..].starts_with("<!--") => {
                let close = input[pos + 4..]
                    .find("-->")
                    .ok_or(Unterminated::Comment)?;
                (Token::Ignored, pos + 4 + close + 3)
            }
            Some(b'!' | b'?') => {
                let close = input[pos..].find('>').ok_or(Unterminated::Tag)?;
                (Token::Ignored, pos + close + 1)
            }
            Some(b'/') => end_tag(input, pos)?,
            _ => start_tag(input, pos)?,
        };
        pos = end;

        let raw_text = match &token {
            Token::StartTag {
                name, self_closing, ..
            } if !self_closing && RAW_TEXT.contains(&name.as_str()) => Some(name.clone()),
            _ => None,
        };
        tokens.push(token);

        if let Some(name) = raw_text {
            let close = find_end_tag(&input[pos..], &name).map_or(input.len(), |i| pos + i);
            if close > pos {
                tokens.push(Token::Text(&input[pos..close]));
            }
            pos = close;
        }
        text_start = pos;
    }

    if text_start < input.len() {
        tokens.push(Token::Text(&input[text_start..]));
    }
    Ok(tokens)
}

fn is_name_char(b: u8) -> bool {
    b.is_ascii_alphanumeric() || matches!(b, b'-' | b':' | b'_')
}

fn end_tag(input: &str, start: usize) -> Result<(Token<'_>, usize), Unterminated> {
    let bytes = input.as_bytes();
    let mut pos = start + 2;
    let name_start = pos;
    while pos < bytes.len() && is_name_char(bytes[pos]) {
        pos += 1;
    }
    let name = input[name_start..pos].to_ascii_lowercase();
    let close = input[pos..].find('>').ok_or(Unterminated::Tag)?;
    Ok((Token::EndTag { name }, pos + close + 1))
}

fn start_tag(input: &str, start: usize) -> Result<(Token<'_>, usize), Unterminated> {
    let bytes = input.as_bytes();
    let mut pos = start + 1;
    let name_start = pos;
    while pos < bytes.len() && is_name_char(bytes[pos]) {
        pos += 1;
    }
    let name = input[name_start..pos].to_ascii_lowercase();
    let mut attributes: Vec<Attribute> = Vec::new();
    let mut seen = HashSet::new();
    let mut self_closing = false;

    loop {
        while pos < bytes.len() && bytes[pos].is_ascii_whitespace() {
            pos += 1;
        }
        match bytes.get(pos) {
            None => return Err(Unterminated::Tag),
            Some(b'>') => {
                pos += 1;
                break;
            }
            Some(b'/') => {
                pos += 1;
                self_closing = bytes.get(pos) == Some(&b'>');
                continue;
            }
            Some(_) => {}
        }

        let attr_start = pos;
        while pos < bytes.len()
            && !bytes[pos].is_ascii_whitespace()
            && !matches!(bytes[pos], b'>' | b'/' | b'=')
        {
            pos += 1;
        }
        // A lone `=` where a name should be: consume it as part of the name.
        if pos == attr_start {
            pos += 1;
        }
        let attr_name = input[attr_start..pos].to_ascii_lowercase();

        let mut probe = pos;
        while probe < bytes.len() && bytes[probe].is_ascii_whitespace() {
            probe += 1;
        }
        let value = if bytes.get(probe) == Some(&b'=') {
            pos = probe + 1;
            while pos < bytes.len() && bytes[pos].is_ascii_whitespace() {
                pos += 1;
            }
            match bytes.get(pos) {
                None => return Err(Unterminated::Tag),
                Some(&quote) if quote == b'"' || quote == b'\'' => {
                    let close = input[pos + 1..]
                        .find(char::from(quote))
                        .ok_or(Unterminated::Quote)?;
                    let value = &input[pos + 1..pos + 1 + close];
                    pos = pos + 1 + close + 1;
                    Some(value.to_string())
                }
                Some(_) => {
                    let value_start = pos;
                    while pos < bytes.len()
                        && !bytes[pos].is_ascii_whitespace()
                        && bytes[pos] != b'>'
                    {
                        pos += 1;
                    }
                    Some(input[value_start..pos].to_string())
                }
            }
        } else {
            None
        };

        if seen.insert(attr_name.clone()) {
            attributes.push(Attribute {
                name: attr_name,
                value,
            });
        }
    }

    Ok((
        Token::StartTag {
            name,
            attributes,
            self_closing,
        },
        pos,
    ))
}

/// Byte offset of `</name` (any case) in `haystack`.
fn find_end_tag(haystack: &str, name: &str) -> Option<usize> {
    let bytes = haystack.as_bytes();
    let mut from = 0;
    while let Some(i) = haystack[from..].find("</") {
        let at = from + i;
        let name_end = at + 2 + name.len();
        let matches = bytes
            .get(at + 2..name_end)
            .is_some_and(|candidate| candidate.eq_ignore_ascii_case(name.as_bytes()));
        if matches && bytes.get(name_end).is_none_or(|b| !is_name_char(*b)) {
            return Some(at);
        }
        from = at + 2;
    }
    None
}
