//! The allow-list, as data.

/// What markup survives sanitization.
///
/// Everything is a static table so the policy can be read and reviewed in
/// one place. Tag and attribute names are lowercase.
#[derive(Debug, Clone, Copy)]
pub struct Policy {
    /// Elements kept as elements.
    pub tags: &'static [&'static str],
    /// Elements without content or end tag.
    pub void_tags: &'static [&'static str],
    /// Elements removed together with everything inside them.
    pub drop_content_tags: &'static [&'static str],
    /// Allowed elements whose content is nonetheless discarded.
    pub empty_content_tags: &'static [&'static str],
    /// Attributes allowed on any kept element.
    pub global_attributes: &'static [&'static str],
    /// Additional attributes per element.
    pub tag_attributes: &'static [(&'static str, &'static [&'static str])],
    /// Attributes restricted to a fixed set of values, per element.
    pub attribute_values: &'static [(&'static str, &'static str, &'static [&'static str])],
    /// Attributes holding URLs.
    pub url_attributes: &'static [&'static str],
    /// Schemes allowed in URL attributes. Relative URLs are always allowed.
    pub url_schemes: &'static [&'static str],
    /// Elements whose URLs must be absolute and use `frame_schemes`.
    pub framed_tags: &'static [&'static str],
    pub frame_schemes: &'static [&'static str],
    /// Substrings that disqualify a `style` value once it is normalised.
    pub unsafe_style_patterns: &'static [&'static str],
}

impl Policy {
    /// The policy applied to article content.
    pub const ARTICLE: Policy = Policy {
        tags: &[
            "p", "h1", "h2", "h3", "h4", "h5", "h6", "ul", "ol", "li", "figure", "figcaption",
            "blockquote", "img", "pre", "code", "span", "div", "a", "b", "i", "em", "strong", "u",
            "s", "mark", "sub", "sup", "small", "br", "hr", "table", "thead", "tbody", "tfoot",
            "tr", "th", "td", "caption", "input", "label", "iframe",
        ],
        void_tags: &["br", "hr", "img", "input", "wbr", "col", "embed", "frame", "source"],
        drop_content_tags: &[
            "script", "style", "noscript", "template", "object", "embed", "applet", "frame",
            "frameset", "svg", "math", "textarea", "select", "xmp", "noembed", "noframes",
            "title", "head",
        ],
        empty_content_tags: &["iframe"],
        global_attributes: &["class", "title", "lang", "dir", "style"],
        tag_attributes: &[
            ("a", &["href", "target", "rel"]),
            ("img", &["src", "alt", "width", "height", "loading"]),
            (
                "iframe",
                &[
                    "src",
                    "width",
                    "height",
                    "allow",
                    "allowfullscreen",
                    "frameborder",
                    "scrolling",
                ],
            ),
            ("ol", &["start", "reversed"]),
            ("li", &["value"]),
            ("td", &["colspan", "rowspan"]),
            ("th", &["colspan", "rowspan", "scope"]),
            ("input", &["type", "checked", "disabled"]),
            ("label", &["for"]),
            ("code", &["data-highlighted"]),
        ],
        attribute_values: &[
            ("input", "type", &["checkbox"]),
            ("a", "target", &["_blank", "_self"]),
            ("iframe", "scrolling", &["yes", "no", "auto"]),
            ("code", "data-highlighted", &["yes"]),
        ],
        url_attributes: &["href", "src"],
        url_schemes: &["http", "https", "mailto", "tel"],
        framed_tags: &["iframe"],
        frame_schemes: &["http", "https"],
        unsafe_style_patterns: &[
            "expression(",
            "url(",
            "javascript:",
            "vbscript:",
            "behavior:",
            "-moz-binding",
            "@import",
        ],
    };

    pub fn article() -> &'static Policy {
        &Self::ARTICLE
    }

    pub fn allows_tag(&self, tag: &str) -> bool {
        self.tags.contains(&tag)
    }

    pub fn is_void(&self, tag: &str) -> bool {
        self.void_tags.contains(&tag)
    }

    pub fn drops_content(&self, tag: &str) -> bool {
        self.drop_content_tags.contains(&tag) || self.empty_content_tags.contains(&tag)
    }

    /// Name-level check; values are checked by [`Policy::allows_value`].
    pub fn allows_attribute(&self, tag: &str, attribute: &str) -> bool {
        if attribute.starts_with("on") {
            return false;
        }
        self.global_attributes.contains(&attribute)
            || self
                .tag_attributes
                .iter()
                .any(|(t, attrs)| *t == tag && attrs.contains(&attribute))
    }

    /// Check an attribute value. `value` is already entity-decoded.
    pub fn allows_value(&self, tag: &str, attribute: &str, value: &str) -> bool {
        if let Some((_, _, allowed)) = self
            .attribute_values
            .iter()
            .find(|(t, a, _)| *t == tag && *a == attribute)
        {
            return allowed.iter().any(|v| v.eq_ignore_ascii_case(value.trim()));
        }
        if attribute == "style" {
            return self.allows_style(value);
        }
        if self.url_attributes.contains(&attribute) {
            return self.allows_url(tag, value);
        }
        true
    }

    pub fn allows_url(&self, tag: &str, url: &str) -> bool {
        // Browsers ignore control characters and whitespace inside a scheme,
        // so `java\tscript:` must be read as `javascript:`.
        let normalized: String = url
            .chars()
            .filter(|c| !c.is_ascii_control() && !c.is_whitespace())
            .collect::<String>()
            .to_ascii_lowercase();
        let framed = self.framed_tags.contains(&tag);

        match scheme(&normalized) {
            Some(scheme) if framed => self.frame_schemes.contains(&scheme),
            Some(scheme) => self.url_schemes.contains(&scheme),
            // Protocol-relative URLs inherit http(s).
            None if framed => normalized.starts_with("//"),
            None => true,
        }
    }

    pub fn allows_style(&self, style: &str) -> bool {
        let normalized: String = strip_css_comments(style)
            .chars()
            .filter(|c| !c.is_whitespace() && !c.is_ascii_control() && *c != '\\')
            .collect::<String>()
            .to_ascii_lowercase();
        !self
            .unsafe_style_patterns
            .iter()
            .any(|pattern| normalized.contains(pattern))
    }
}

/// The scheme of a normalised URL, if it has one. A colon after the first
/// `/`, `?` or `#` belongs to the path, not a scheme.
fn scheme(url: &str) -> Option<&str> {
    let end = url.find([':', '/', '?', '#'])?;
    if url.as_bytes()[end] != b':' || end == 0 {
        return None;
    }
    Some(&url[..end])
}

fn strip_css_comments(style: &str) -> String {
    let mut out = String::with_capacity(style.len());
    let mut rest = style;
    while let Some(start) = rest.find("/*") {
        out.push_str(&rest[..start]);
        match rest[start + 2..].find("*/") {
            Some(end) => rest = &rest[start + 2 + end + 2..],
            None => return out,
        }
    }
    out.push_str(rest);
    out
}
