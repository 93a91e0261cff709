//! Block-to-markup conversion and the full article pipeline.
//!
//! [`render_blocks`] turns each block into exactly one top-level element.
//! Rich-text fields are sanitized on their own before they are placed, so
//! a stray end tag in a field cannot close the element around it. Code is
//! escaped as text and URLs are escaped as attribute values.
//! [`render_article`] runs the composed markup through [`sanitize`] once
//! more and then through the highlighter.

use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value;

use crate::highlight::highlight_markup;
use crate::model::{
    Block, BlockDocument, BlockKind, ChecklistData, CodeData, EmbedData, HeaderData, ImageData,
    ListData, ListStyle, QuoteAlignment, QuoteData, TableData,
};
use crate::options::RenderOptions;
use crate::sanitize::{plain_text, sanitize};

/// Shown instead of an article that has nothing to render.
pub const NO_CONTENT_PLACEHOLDER: &str = r#"<p class="no-content">No content available.</p>"#;

const EMBED_CONTAINER_STYLE: &str =
    "position: relative; padding-bottom: 56.25%; height: 0; overflow: hidden;";
const EMBED_FRAME_STYLE: &str =
    "position: absolute; top: 0; left: 0; width: 100%; height: 100%;";
const EMBED_ALLOW: &str =
    "accelerometer; autoplay; clipboard-write; encrypted-media; gyroscope; picture-in-picture";

/// Source of a code block that can be run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutableSource {
    pub source: String,
    pub language: String,
}

/// The markup of one block, tagged with where it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedBlock {
    /// Position of the block in the document.
    pub index: usize,
    pub kind: String,
    pub html: String,
    pub executable: Option<ExecutableSource>,
}

/// A rendered document: the joined markup plus its per-block parts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Article {
    pub html: String,
    pub blocks: Vec<RenderedBlock>,
    /// The max-width hint, present only when it was a valid CSS length.
    pub max_width: Option<String>,
}

impl Article {
    pub fn executable_blocks(&self) -> impl Iterator<Item = (&RenderedBlock, &ExecutableSource)> {
        self.blocks
            .iter()
            .filter_map(|block| block.executable.as_ref().map(|source| (block, source)))
    }

    /// `body` inside the max-width container, or unchanged without a width.
    pub fn contain(&self, body: String) -> String {
        contain(self.max_width.as_deref(), body)
    }
}

/// Convert every renderable block, in document order.
///
/// Unknown kinds and blocks missing required data are skipped with a
/// warning; they never stop the remaining blocks.
pub fn render_blocks(document: &BlockDocument) -> Vec<RenderedBlock> {
    document
        .blocks
        .iter()
        .enumerate()
        .filter_map(|(index, block)| render_block(index, block))
        .collect()
}

/// Converter output for a whole document, before the article-wide
/// sanitizer pass.
pub fn render_markup(document: Option<&BlockDocument>) -> String {
    let blocks = document.map(render_blocks).unwrap_or_default();
    if blocks.is_empty() {
        return NO_CONTENT_PLACEHOLDER.to_string();
    }
    blocks.iter().map(|b| b.html.as_str()).collect()
}

/// Convert, sanitize and highlight a document.
pub fn render_article(document: Option<&BlockDocument>, options: &RenderOptions) -> Article {
    let mut blocks = document.map(render_blocks).unwrap_or_default();

    for block in &mut blocks {
        block.html = sanitize(&block.html);
        if options.highlight {
            block.html = highlight_markup(&block.html);
        }
        if !options.allow_execution {
            block.executable = None;
        }
    }

    let body = if blocks.is_empty() {
        NO_CONTENT_PLACEHOLDER.to_string()
    } else {
        blocks.iter().map(|b| b.html.as_str()).collect()
    };

    let max_width = options
        .max_width
        .as_deref()
        .and_then(checked_max_width)
        .map(str::to_string);
    let html = contain(max_width.as_deref(), body);

    log::debug!(
        "rendered {} of {} blocks",
        blocks.len(),
        document.map_or(0, |d| d.blocks.len())
    );
    Article {
        html,
        blocks,
        max_width,
    }
}

/// [`render_article`] for article-store JSON. A document that cannot be
/// read renders as the placeholder.
pub fn render_article_json(json: &str, options: &RenderOptions) -> Article {
    match BlockDocument::from_json_str(json) {
        Ok(document) => render_article(Some(&document), options),
        Err(err) => {
            log::warn!("malformed block document: {err}");
            render_article(None, options)
        }
    }
}

fn contain(max_width: Option<&str>, body: String) -> String {
    match max_width {
        Some(width) => {
            format!(r#"<div class="block-document" style="max-width: {width}">{body}</div>"#)
        }
        None => body,
    }
}

fn max_width_regex() -> &'static Regex {
    static MAX_WIDTH: OnceLock<Regex> = OnceLock::new();
    MAX_WIDTH.get_or_init(|| {
        Regex::new(r"^(\d+(\.\d+)?(px|em|rem|%|vw|ch)|none)$").expect("Invalid max-width regex")
    })
}

fn checked_max_width(width: &str) -> Option<&str> {
    let width = width.trim();
    if max_width_regex().is_match(width) {
        Some(width)
    } else {
        log::warn!("ignoring max-width {width:?}: not a CSS length");
        None
    }
}

fn render_block(index: usize, block: &Block) -> Option<RenderedBlock> {
    let mut executable = None;
    let html = match &block.kind {
        BlockKind::Paragraph(data) => Some(format!("<p>{}</p>", rich_text(&data.text))),
        BlockKind::Header(data) => Some(header(data)),
        BlockKind::List(data) => list(data),
        BlockKind::Quote(data) => Some(quote(data)),
        BlockKind::Image(data) => image(data),
        BlockKind::Code(data) => {
            executable = data.is_executable().then(|| ExecutableSource {
                source: data.code.clone(),
                language: data.language().unwrap_or_default(),
            });
            Some(code(data))
        }
        BlockKind::Embed(data) => embed(data),
        BlockKind::Delimiter => Some(r#"<hr class="block-delimiter">"#.to_string()),
        BlockKind::Table(data) => table(data),
        BlockKind::Checklist(data) => checklist(data),
        BlockKind::Unknown(kind) => {
            log::warn!("skipping block {index}: unknown type {kind:?}");
            return None;
        }
        BlockKind::Invalid { kind, reason } => {
            log::warn!("skipping block {index} ({kind}): {reason}");
            return None;
        }
    };

    let Some(html) = html else {
        log::warn!(
            "skipping block {index} ({}): required data missing",
            block.kind.name()
        );
        return None;
    };

    Some(RenderedBlock {
        index,
        kind: block.kind.name().to_string(),
        html,
        executable,
    })
}

fn header(data: &HeaderData) -> String {
    let level = data.level();
    format!("<h{level}>{}</h{level}>", rich_text(&data.text))
}

fn list(data: &ListData) -> Option<String> {
    if data.items.is_empty() {
        return None;
    }
    let mut out = String::new();
    write_list(&mut out, data.style, &data.items);
    Some(out)
}

fn write_list(out: &mut String, style: ListStyle, items: &[Value]) {
    let tag = match style {
        ListStyle::Ordered => "ol",
        ListStyle::Unordered => "ul",
    };
    out.push('<');
    out.push_str(tag);
    out.push('>');
    for item in items {
        out.push_str("<li>");
        match item {
            Value::String(text) => out.push_str(&rich_text(text)),
            Value::Object(map) => {
                let content = map
                    .get("content")
                    .or_else(|| map.get("text"))
                    .and_then(Value::as_str);
                match content {
                    Some(text) => out.push_str(&rich_text(text)),
                    None if !map.contains_key("items") => out.push_str(&escaped_json(item)),
                    None => {}
                }
                if let Some(Value::Array(nested)) = map.get("items")
                    && !nested.is_empty()
                {
                    write_list(out, style, nested);
                }
            }
            other => out.push_str(&escaped_json(other)),
        }
        out.push_str("</li>");
    }
    out.push_str("</");
    out.push_str(tag);
    out.push('>');
}

/// A rich-text field as a balanced fragment. Markup that cannot be parsed
/// is reduced to its text, which still sits inside the block's element.
fn rich_text(text: &str) -> String {
    sanitize(text)
}

fn escaped_json(value: &Value) -> String {
    html_escape::encode_text(&value.to_string()).into_owned()
}

fn caption_of(caption: Option<&str>) -> Option<&str> {
    caption.filter(|c| !c.trim().is_empty())
}

fn quote(data: &QuoteData) -> String {
    let class = match data.alignment() {
        Some(QuoteAlignment::Left) => "block-quote quote-align-left",
        Some(QuoteAlignment::Center) => "block-quote quote-align-center",
        None => "block-quote",
    };
    let mut out = format!(
        r#"<figure class="{class}"><blockquote>{}</blockquote>"#,
        rich_text(&data.text)
    );
    if let Some(caption) = caption_of(data.caption.as_deref()) {
        out.push_str(&format!("<figcaption>{}</figcaption>", rich_text(caption)));
    }
    out.push_str("</figure>");
    out
}

fn image(data: &ImageData) -> Option<String> {
    let url = data.url()?;
    let mut class = String::from("block-image");
    for (set, name) in [
        (data.with_border, "with-border"),
        (data.stretched, "stretched"),
        (data.with_background, "with-background"),
    ] {
        if set {
            class.push(' ');
            class.push_str(name);
        }
    }
    let caption = caption_of(data.caption.as_deref());
    let alt = caption.map(plain_text).unwrap_or_default();

    let mut out = format!(
        r#"<figure class="{class}"><img src="{}" alt="{}">"#,
        html_escape::encode_double_quoted_attribute(url),
        html_escape::encode_double_quoted_attribute(&alt),
    );
    if let Some(caption) = caption {
        out.push_str(&format!("<figcaption>{}</figcaption>", rich_text(caption)));
    }
    out.push_str("</figure>");
    Some(out)
}

fn code(data: &CodeData) -> String {
    let mut classes = Vec::new();
    let language = data.language();
    if let Some(language) = &language {
        classes.push(format!("language-{language}"));
    }
    if data.is_executable() {
        classes.push("executable-code".to_string());
    }
    let class = if classes.is_empty() {
        String::new()
    } else {
        format!(r#" class="{}""#, classes.join(" "))
    };
    format!(
        "<pre><code{class}>{}</code></pre>",
        html_escape::encode_text(&data.code)
    )
}

fn embed(data: &EmbedData) -> Option<String> {
    let url = data.url()?;
    let mut out = format!(
        concat!(
            r#"<figure class="block-embed"><div class="embed-responsive" style="{}">"#,
            r#"<iframe src="{}" style="{}" frameborder="0" allow="{}" allowfullscreen></iframe>"#,
            "</div>",
        ),
        EMBED_CONTAINER_STYLE,
        html_escape::encode_double_quoted_attribute(url.trim()),
        EMBED_FRAME_STYLE,
        EMBED_ALLOW,
    );
    if let Some(caption) = caption_of(data.caption.as_deref()) {
        out.push_str(&format!("<figcaption>{}</figcaption>", rich_text(caption)));
    }
    out.push_str("</figure>");
    Some(out)
}

fn cell_text(value: &Value) -> String {
    match value {
        Value::String(text) => rich_text(text),
        Value::Null => String::new(),
        Value::Number(_) | Value::Bool(_) => value.to_string(),
        other => escaped_json(other),
    }
}

fn write_row(out: &mut String, row: &[Value], cell: &str) {
    out.push_str("<tr>");
    for value in row {
        out.push_str(&format!("<{cell}>{}</{cell}>", cell_text(value)));
    }
    out.push_str("</tr>");
}

fn table(data: &TableData) -> Option<String> {
    let (first, rest) = data.content.split_first()?;
    let mut out = String::from("<table>");
    if data.with_headings {
        out.push_str("<thead>");
        write_row(&mut out, first, "th");
        out.push_str("</thead>");
        if !rest.is_empty() {
            out.push_str("<tbody>");
            for row in rest {
                write_row(&mut out, row, "td");
            }
            out.push_str("</tbody>");
        }
    } else {
        out.push_str("<tbody>");
        for row in &data.content {
            write_row(&mut out, row, "td");
        }
        out.push_str("</tbody>");
    }
    out.push_str("</table>");
    Some(out)
}

fn checklist(data: &ChecklistData) -> Option<String> {
    if data.items.is_empty() {
        return None;
    }
    let mut out = String::from(r#"<div class="block-checklist">"#);
    for item in &data.items {
        let (class, checked) = if item.checked {
            ("checklist-item checked", " checked")
        } else {
            ("checklist-item", "")
        };
        out.push_str(&format!(
            r#"<div class="{class}"><input type="checkbox" disabled{checked}><span>{}</span></div>"#,
            rich_text(&item.text)
        ));
    }
    out.push_str("</div>");
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use serde_json::json;

    fn block(kind: &str, data: Value) -> Block {
        Block::from_value(json!({"type": kind, "data": data}))
    }

    fn markup(block: Block) -> String {
        render_markup(Some(&BlockDocument::new(vec![block])))
    }

    #[rstest]
    #[case::paragraph(block("paragraph", json!({"text": "Hi <b>there</b>"})), "<p>Hi <b>there</b></p>")]
    #[case::header(block("header", json!({"text": "T", "level": 3})), "<h3>T</h3>")]
    #[case::header_default(block("header", json!({"text": "T"})), "<h2>T</h2>")]
    #[case::header_clamped(block("header", json!({"text": "T", "level": 9})), "<h6>T</h6>")]
    #[case::delimiter(block("delimiter", json!({})), r#"<hr class="block-delimiter">"#)]
    #[case::ordered(
        block("list", json!({"style": "ordered", "items": ["a", "b"]})),
        "<ol><li>a</li><li>b</li></ol>"
    )]
    #[case::nested(
        block("list", json!({"items": [{"content": "a", "items": [{"content": "a1", "items": []}]}, "b"]})),
        "<ul><li>a<ul><li>a1</li></ul></li><li>b</li></ul>"
    )]
    #[case::odd_item(block("list", json!({"items": [3, {"x": "<y>"}]})), r#"<ul><li>3</li><li>{"x":"&lt;y&gt;"}</li></ul>"#)]
    fn simple_shapes(#[case] block: Block, #[case] expected: &str) {
        assert_eq!(markup(block), expected);
    }

    #[test]
    fn quote_with_caption_and_alignment() {
        let html = markup(block(
            "quote",
            json!({"text": "Q", "caption": "Someone", "alignment": "center"}),
        ));
        assert_eq!(
            html,
            r#"<figure class="block-quote quote-align-center"><blockquote>Q</blockquote><figcaption>Someone</figcaption></figure>"#
        );
    }

    #[test]
    fn image_shape() {
        let html = markup(block(
            "image",
            json!({
                "file": {"url": "https://img.example/a.png?x=1&y=\"2\""},
                "caption": "A <i>fine</i> \"cat\"",
                "withBorder": true,
                "stretched": true
            }),
        ));
        assert_eq!(
            html,
            concat!(
                r#"<figure class="block-image with-border stretched">"#,
                r#"<img src="https://img.example/a.png?x=1&amp;y=&quot;2&quot;" alt="A fine &quot;cat&quot;">"#,
                r#"<figcaption>A <i>fine</i> "cat"</figcaption></figure>"#
            )
        );
    }

    #[rstest]
    #[case(json!({"code": "print(1)", "language": "python"}), r#"<pre><code class="language-python">print(1)</code></pre>"#, false)]
    #[case(json!({"code": "a < b", "language": "JavaScript"}), r#"<pre><code class="language-javascript executable-code">a &lt; b</code></pre>"#, true)]
    #[case(json!({"code": "x"}), "<pre><code>x</code></pre>", false)]
    fn code_shape(#[case] data: Value, #[case] expected: &str, #[case] executable: bool) {
        let blocks = render_blocks(&BlockDocument::new(vec![block("code", data)]));
        assert_eq!(blocks[0].html, expected);
        assert_eq!(blocks[0].executable.is_some(), executable);
    }

    #[test]
    fn embed_shape() {
        let html = markup(block(
            "embed",
            json!({"service": "youtube", "embed": "https://www.youtube.com/embed/xyz", "caption": "Clip"}),
        ));
        insta::assert_snapshot!(html, @r#"<figure class="block-embed"><div class="embed-responsive" style="position: relative; padding-bottom: 56.25%; height: 0; overflow: hidden;"><iframe src="https://www.youtube.com/embed/xyz" style="position: absolute; top: 0; left: 0; width: 100%; height: 100%;" frameborder="0" allow="accelerometer; autoplay; clipboard-write; encrypted-media; gyroscope; picture-in-picture" allowfullscreen></iframe></div><figcaption>Clip</figcaption></figure>"#);
    }

    #[test]
    fn embed_url_from_service_object() {
        let blocks = render_blocks(&BlockDocument::new(vec![block(
            "embed",
            json!({"service": {"url": "https://player.example/1"}}),
        )]));
        assert!(blocks[0].html.contains(r#"<iframe src="https://player.example/1""#));
    }

    #[test]
    fn table_with_headings() {
        let html = markup(block(
            "table",
            json!({"withHeadings": true, "content": [["h1", "h2"], ["a", 1], [null, true]]}),
        ));
        assert_eq!(
            html,
            "<table><thead><tr><th>h1</th><th>h2</th></tr></thead><tbody><tr><td>a</td><td>1</td></tr><tr><td></td><td>true</td></tr></tbody></table>"
        );
    }

    #[test]
    fn checklist_shape() {
        let html = markup(block(
            "checklist",
            json!({"items": [{"text": "done", "checked": true}, {"text": "todo"}]}),
        ));
        assert_eq!(
            html,
            concat!(
                r#"<div class="block-checklist">"#,
                r#"<div class="checklist-item checked"><input type="checkbox" disabled checked><span>done</span></div>"#,
                r#"<div class="checklist-item"><input type="checkbox" disabled><span>todo</span></div>"#,
                "</div>"
            )
        );
    }

    #[rstest]
    #[case::unknown(block("carousel", json!({"slides": []})))]
    #[case::invalid(block("paragraph", json!({"words": "x"})))]
    #[case::image_without_url(block("image", json!({"caption": "c"})))]
    #[case::embed_without_url(block("embed", json!({"service": "youtube"})))]
    #[case::empty_table(block("table", json!({"content": []})))]
    #[case::empty_list(block("list", json!({"items": []})))]
    fn skipped_blocks_render_nothing(#[case] skipped: Block) {
        let document = BlockDocument::new(vec![
            block("paragraph", json!({"text": "before"})),
            skipped,
            block("paragraph", json!({"text": "after"})),
        ]);
        let blocks = render_blocks(&document);
        assert_eq!(
            blocks.iter().map(|b| b.index).collect::<Vec<_>>(),
            vec![0, 2]
        );
        assert_eq!(render_markup(Some(&document)), "<p>before</p><p>after</p>");
    }

    #[test]
    fn nothing_to_render_gives_the_placeholder() {
        assert_eq!(render_markup(None), NO_CONTENT_PLACEHOLDER);
        assert_eq!(
            render_markup(Some(&BlockDocument::default())),
            NO_CONTENT_PLACEHOLDER
        );
        let article = render_article(None, &RenderOptions::default());
        assert_eq!(article.html, NO_CONTENT_PLACEHOLDER);
        assert!(article.blocks.is_empty());
    }

    #[rstest]
    #[case("720px", true)]
    #[case("42.5rem", true)]
    #[case("none", true)]
    #[case("100%; background: red", false)]
    #[case("720px\" onclick=\"x", false)]
    #[case("wide", false)]
    fn max_width_hint(#[case] width: &str, #[case] applied: bool) {
        let document = BlockDocument::new(vec![block("paragraph", json!({"text": "x"}))]);
        let article = render_article(
            Some(&document),
            &RenderOptions::default().with_max_width(width),
        );
        assert_eq!(article.max_width.is_some(), applied);
        if applied {
            assert_eq!(
                article.html,
                format!(r#"<div class="block-document" style="max-width: {width}"><p>x</p></div>"#)
            );
        } else {
            assert_eq!(article.html, "<p>x</p>");
        }
    }

    #[test]
    fn executable_sources_need_permission() {
        let document = BlockDocument::new(vec![block(
            "code",
            json!({"code": "1 + 1", "language": "js"}),
        )]);
        let denied = render_article(Some(&document), &RenderOptions::default());
        assert_eq!(denied.executable_blocks().count(), 0);

        let allowed = render_article(Some(&document), &RenderOptions::default().with_execution());
        let (_, source) = allowed.executable_blocks().next().expect("executable block");
        assert_eq!(source.source, "1 + 1");
        assert_eq!(source.language, "js");
    }

    #[test]
    fn malformed_json_renders_the_placeholder() {
        let article = render_article_json("{\"blocks\": 3}", &RenderOptions::default());
        assert_eq!(article.html, NO_CONTENT_PLACEHOLDER);
    }
}
