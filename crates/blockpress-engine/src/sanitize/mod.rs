//! Allow-list HTML sanitizer.
//!
//! Markup is tokenized, filtered against a [`Policy`] and serialized again,
//! so the output is always balanced, double-quoted and escaped regardless of
//! how the input was written. Input that cannot be tokenized is reduced to
//! its escaped text by [`strip_all_markup`].

mod policy;
mod tokenizer;

pub use policy::Policy;

use tokenizer::{Attribute, Token, tokenize};

/// Sanitize article markup with [`Policy::ARTICLE`].
pub fn sanitize(input: &str) -> String {
    sanitize_with(input, Policy::article())
}

pub fn sanitize_with(input: &str, policy: &Policy) -> String {
    match tokenize(input) {
        Ok(tokens) => rebuild(&tokens, policy),
        Err(err) => {
            log::warn!("markup could not be parsed ({err}); keeping its text only");
            strip_all_markup(input)
        }
    }
}

/// Escaped text content of `input`, with every tag removed.
pub fn strip_all_markup(input: &str) -> String {
    html_escape::encode_text(&plain_text(input)).into_owned()
}

/// Unescaped text content of `input`, for places that take plain text
/// (attribute values, terminal output).
pub fn plain_text(input: &str) -> String {
    let mut text = String::with_capacity(input.len());
    let mut rest = input;
    while let Some(i) = rest.find('<') {
        text.push_str(&rest[..i]);
        let after = &rest[i + 1..];
        if !after.starts_with(|c: char| c.is_ascii_alphabetic() || matches!(c, '/' | '!' | '?')) {
            text.push('<');
            rest = after;
            continue;
        }
        match after.find('>') {
            Some(close) => rest = &after[close + 1..],
            None => {
                rest = "";
                break;
            }
        }
    }
    text.push_str(rest);
    html_escape::decode_html_entities(&text).into_owned()
}

fn rebuild(tokens: &[Token<'_>], policy: &Policy) -> String {
    let mut out = String::new();
    let mut open: Vec<&str> = Vec::new();
    // Element whose content is being discarded, and how deeply it nests.
    let mut dropping: Option<(&str, usize)> = None;

    for token in tokens {
        if let Some((dropped, depth)) = dropping {
            let depth = match token {
                Token::StartTag {
                    name, self_closing, ..
                } if name == dropped && !self_closing => depth + 1,
                Token::EndTag { name } if name == dropped => depth - 1,
                _ => depth,
            };
            dropping = (depth > 0).then_some((dropped, depth));
            continue;
        }

        match token {
            Token::Text(text) => {
                let decoded = html_escape::decode_html_entities(text);
                out.push_str(&html_escape::encode_text(&decoded));
            }
            Token::Ignored => {}
            Token::StartTag {
                name,
                attributes,
                self_closing,
            } => {
                let name = name.as_str();
                let keep = policy.allows_tag(name);
                if keep {
                    write_start_tag(&mut out, name, attributes, policy);
                }

                if policy.drops_content(name) {
                    if keep && !policy.is_void(name) {
                        out.push_str(&format!("</{name}>"));
                    }
                    if !self_closing && !policy.is_void(name) {
                        dropping = Some((name, 1));
                    }
                    continue;
                }

                if keep && !policy.is_void(name) {
                    if *self_closing {
                        out.push_str(&format!("</{name}>"));
                    } else {
                        open.push(name);
                    }
                }
            }
            Token::EndTag { name } => {
                // Closing an outer element closes everything opened inside it.
                if let Some(pos) = open.iter().rposition(|open| open == name) {
                    for closed in open.drain(pos..).rev() {
                        out.push_str(&format!("</{closed}>"));
                    }
                }
            }
        }
    }

    for closed in open.into_iter().rev() {
        out.push_str(&format!("</{closed}>"));
    }
    out
}

fn write_start_tag(out: &mut String, tag: &str, attributes: &[Attribute], policy: &Policy) {
    out.push('<');
    out.push_str(tag);

    let mut blank_target = false;
    let mut has_rel = false;
    for attribute in attributes {
        let name = attribute.name.as_str();
        if !policy.allows_attribute(tag, name) {
            continue;
        }
        let value = attribute
            .value
            .as_deref()
            .map(html_escape::decode_html_entities);
        if !policy.allows_value(tag, name, value.as_deref().unwrap_or("")) {
            continue;
        }

        out.push(' ');
        out.push_str(name);
        if let Some(value) = value {
            out.push_str("=\"");
            out.push_str(&html_escape::encode_double_quoted_attribute(&value));
            out.push('"');
            blank_target |= name == "target" && value.trim().eq_ignore_ascii_case("_blank");
        }
        has_rel |= name == "rel";
    }

    if blank_target && !has_rel {
        out.push_str(" rel=\"noopener noreferrer\"");
    }
    out.push('>');
}
