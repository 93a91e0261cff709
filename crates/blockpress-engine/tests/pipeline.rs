//! End-to-end checks of the article pipeline and run panels.

use blockpress_engine::{
    BlockDocument, Level, LogEntry, NO_CONTENT_PLACEHOLDER, Outcome, RenderOptions, RunSurface,
    render_article, render_article_json, render_blocks, render_markup, render_panel,
};
use pretty_assertions::assert_eq;
use rstest::rstest;
use serde_json::json;

fn document(blocks: serde_json::Value) -> BlockDocument {
    BlockDocument::from_value(json!({"time": 1, "version": "2.28", "blocks": blocks}))
        .expect("valid document")
}

fn mixed_document() -> BlockDocument {
    document(json!([
        {"type": "header", "data": {"text": "Findings", "level": 2}},
        {"type": "paragraph", "data": {"text": "Intro"}},
        {"type": "mystery", "data": {}},
        {"type": "list", "data": {"style": "unordered", "items": ["a", "b"]}},
        {"type": "delimiter", "data": {}},
        {"type": "code", "data": {"code": "console.log(1)", "language": "javascript"}},
    ]))
}

#[test]
fn one_element_per_block_in_order() {
    let blocks = render_blocks(&mixed_document());
    assert_eq!(
        blocks.iter().map(|b| (b.index, b.kind.as_str())).collect::<Vec<_>>(),
        vec![
            (0, "header"),
            (1, "paragraph"),
            (3, "list"),
            (4, "delimiter"),
            (5, "code")
        ]
    );
    let openers: Vec<&str> = blocks
        .iter()
        .map(|b| b.html.split(['>', ' ']).next().unwrap_or_default())
        .collect();
    assert_eq!(openers, vec!["<h2", "<p", "<ul", "<hr", "<pre"]);
}

#[test]
fn article_markup_is_the_blocks_joined() {
    let article = render_article(Some(&mixed_document()), &RenderOptions::default());
    let joined: String = article.blocks.iter().map(|b| b.html.as_str()).collect();
    assert_eq!(article.html, joined);
}

#[test]
fn absent_document_gives_placeholder() {
    assert_eq!(render_markup(None), NO_CONTENT_PLACEHOLDER);
    assert_eq!(
        render_article(None, &RenderOptions::default()).html,
        NO_CONTENT_PLACEHOLDER
    );
    assert_eq!(
        render_article_json("not json", &RenderOptions::default()).html,
        NO_CONTENT_PLACEHOLDER
    );
}

#[rstest]
#[case("python", r#"<code class="language-python""#)]
#[case("javascript", r#"<code class="language-javascript executable-code""#)]
fn code_language_classes(#[case] language: &str, #[case] expected: &str) {
    let doc = document(json!([{"type": "code", "data": {"code": "x", "language": language}}]));
    assert!(render_markup(Some(&doc)).contains(expected));
    assert!(
        render_article(Some(&doc), &RenderOptions::default())
            .html
            .contains(expected)
    );
}

#[rstest]
#[case("<script>alert(1)</script>")]
#[case("<SCRIPT src=//evil.example/x.js></SCRIPT>")]
#[case("<img src=x onerror=alert(1)>")]
#[case("<a href=\"jav&#x09;ascript:alert(1)\">x</a>")]
#[case("<iframe src=\"javascript:alert(1)\"></iframe>")]
fn hostile_paragraphs_are_defused(#[case] text: &str) {
    let doc = document(json!([{"type": "paragraph", "data": {"text": text}}]));
    let html = render_article(Some(&doc), &RenderOptions::default()).html;
    let lower = html.to_ascii_lowercase();
    assert!(!lower.contains("<script"), "{html}");
    assert!(!lower.contains("onerror"), "{html}");
    assert!(!lower.contains("javascript:"), "{html}");
    assert!(html.starts_with("<p>") && html.ends_with("</p>"), "{html}");
}

/// Top-level nodes of sanitizer output: elements, plus runs of text
/// outside any element.
fn top_level_nodes(html: &str) -> usize {
    const VOID: &[&str] = &["br", "hr", "img", "input"];
    let mut parts = html.split('<');
    let mut count = usize::from(!parts.next().unwrap_or_default().is_empty());
    let mut depth = 0usize;
    for part in parts {
        let (tag, text) = part.split_once('>').unwrap_or((part, ""));
        if tag.starts_with('/') {
            depth = depth.saturating_sub(1);
        } else {
            if depth == 0 {
                count += 1;
            }
            let name = tag.split_ascii_whitespace().next().unwrap_or_default();
            if !VOID.contains(&name) {
                depth += 1;
            }
        }
        if depth == 0 && !text.is_empty() {
            count += 1;
        }
    }
    count
}

#[rstest]
#[case::closes_and_reopens("a</p><p>b")]
#[case::trailing_text("a</p>tail")]
#[case::unterminated_quote("5' <a href='x>y")]
#[case::closes_outer("x</li></ul></figure></blockquote></td></tr></table></span></div>after")]
#[case::opens_more("<div><p>open")]
fn stray_markup_in_fields_stays_inside_its_block(#[case] text: &str) {
    let doc = document(json!([
        {"type": "paragraph", "data": {"text": text}},
        {"type": "header", "data": {"text": text, "level": 3}},
        {"type": "quote", "data": {"text": text, "caption": text}},
        {"type": "list", "data": {"items": [text, {"content": text, "items": [text]}]}},
        {"type": "table", "data": {"content": [[text, text]]}},
        {"type": "checklist", "data": {"items": [{"text": text}]}},
        {"type": "image", "data": {"file": {"url": "/a.png"}, "caption": text}},
        {"type": "embed", "data": {"embed": "https://player.example/1", "caption": text}},
    ]));
    let article = render_article(Some(&doc), &RenderOptions::default());
    assert_eq!(article.blocks.len(), 8);
    for block in &article.blocks {
        assert_eq!(top_level_nodes(&block.html), 1, "{}: {}", block.kind, block.html);
    }
}

#[rstest]
#[case("a</p><p>b", "<p>a<p>b</p></p>")]
#[case("a</p>tail", "<p>atail</p>")]
#[case("5' <a href='x>y", "<p>5' y</p>")]
fn paragraphs_keep_their_wrapper(#[case] text: &str, #[case] expected: &str) {
    let doc = document(json!([{"type": "paragraph", "data": {"text": text}}]));
    let html = render_article(Some(&doc), &RenderOptions::default()).html;
    assert_eq!(html, expected);
}

#[test]
fn embed_survives_sanitization() {
    let doc = document(json!([
        {"type": "embed", "data": {"service": "youtube", "embed": "https://www.youtube.com/embed/abc"}},
        {"type": "embed", "data": {"service": "youtube"}},
    ]));
    let article = render_article(Some(&doc), &RenderOptions::default());
    assert_eq!(article.blocks.len(), 1);
    let html = &article.html;
    assert!(html.contains("padding-bottom: 56.25%"));
    assert!(html.contains(r#"<iframe src="https://www.youtube.com/embed/abc""#));
    assert!(html.contains("allowfullscreen"));
}

#[test]
fn table_rows_and_cells_in_order() {
    let doc = document(json!([{"type": "table", "data": {"content": [["a", "b"], ["c", "d"]]}}]));
    let html = render_article(Some(&doc), &RenderOptions::default()).html;
    assert_eq!(
        html,
        "<table><tbody><tr><td>a</td><td>b</td></tr><tr><td>c</td><td>d</td></tr></tbody></table>"
    );
}

#[test]
fn code_is_highlighted_after_sanitization() {
    let doc = document(json!([{"type": "code", "data": {"code": "let a = \"<b>\";", "language": "js"}}]));
    let html = render_article(Some(&doc), &RenderOptions::default()).html;
    insta::assert_snapshot!(html, @r#"<pre><code class="language-js executable-code" data-highlighted="yes"><span class="token keyword">let</span> a <span class="token operator">=</span> <span class="token string">"&lt;b&gt;"</span><span class="token punctuation">;</span></code></pre>"#);

    let plain = render_article(
        Some(&doc),
        &RenderOptions {
            highlight: false,
            ..RenderOptions::default()
        },
    );
    assert!(!plain.html.contains("token"));
}

#[test]
fn run_panel_captures_output_and_value() {
    let doc = document(json!([
        {"type": "paragraph", "data": {"text": "Try it"}},
        {"type": "code", "data": {"code": "console.log(\"hi\"); 42", "language": "javascript"}},
    ]));
    let options = RenderOptions::default().with_execution();
    let article = render_article(Some(&doc), &options);
    let mut surface = RunSurface::from_article(&article, &options);

    let report = surface.trigger(1).expect("block 1 is executable").clone();
    assert_eq!(report.entries, vec![LogEntry::new(Level::Log, "hi")]);
    assert_eq!(report.value.as_deref(), Some("42"));
    assert_eq!(
        render_panel(1, &report),
        r#"<div class="code-result" data-block="1"><div class="log-entry log-log">hi</div><div class="result-value">42</div></div>"#
    );
}

#[test]
fn thrown_errors_become_entries() {
    let doc = document(json!([
        {"type": "code", "data": {"code": "throw new Error(\"boom\")", "language": "js"}},
    ]));
    let options = RenderOptions::default().with_execution();
    let mut surface = RunSurface::from_article(&render_article(Some(&doc), &options), &options);
    let report = surface.trigger(0).expect("trigger succeeds");
    assert_eq!(report.outcome, Outcome::Failed);
    assert!(
        report
            .entries
            .iter()
            .any(|e| e.level == Level::Error && e.message.contains("boom"))
    );
}

#[test]
fn retriggering_replaces_the_panel() {
    let doc = document(json!([
        {"type": "code", "data": {"code": "console.log(Math.floor(Math.random() * 0) + 'x')", "language": "js"}},
    ]));
    let options = RenderOptions::default().with_execution();
    let mut surface = RunSurface::from_article(&render_article(Some(&doc), &options), &options);

    let first = surface.trigger(0).expect("first").clone();
    let second = surface.trigger(0).expect("second").clone();
    assert_eq!(first.entries.len(), 1);
    assert_eq!(second.entries, first.entries);
    let panel = surface.panel(0).and_then(|p| p.report()).expect("finished");
    assert_eq!(panel.entries.len(), 1);
}

#[test]
fn host_capabilities_are_unavailable() {
    let doc = document(json!([
        {"type": "code", "data": {"code": "document.write('<iframe>')", "language": "js"}},
    ]));
    let mut options = RenderOptions::default().with_execution();
    options.auto_run_markup_snippets = true;
    let surface = RunSurface::from_article(&render_article(Some(&doc), &options), &options);
    let report = surface
        .panel(0)
        .and_then(|p| p.report())
        .expect("auto-run happened");
    assert_eq!(
        report.failure().map(|e| e.message.as_str()),
        Some("ReferenceError: document is not defined")
    );
}
