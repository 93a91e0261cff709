// Benchmark helper functions - Rust's dead code analysis doesn't understand
// that these are used by benchmark files in the same directory
#[allow(dead_code)]
pub fn generate_document_json(sections: usize) -> String {
    let mut blocks = Vec::new();
    for section in 0..sections {
        blocks.push(serde_json::json!({
            "type": "header",
            "data": {"text": format!("Section {section}"), "level": 2}
        }));
        blocks.push(serde_json::json!({
            "type": "paragraph",
            "data": {"text": "Some <b>bold</b> text with a <a href=\"https://example.org\" target=\"_blank\">link</a> and <script>alert(1)</script>."}
        }));
        blocks.push(serde_json::json!({
            "type": "list",
            "data": {"style": "ordered", "items": ["one", {"content": "two", "items": ["two-a"]}]}
        }));
        blocks.push(serde_json::json!({
            "type": "code",
            "data": {"code": "function fib(n) {\n  return n < 2 ? n : fib(n - 1) + fib(n - 2);\n}\nconsole.log(fib(15));", "language": "javascript"}
        }));
        blocks.push(serde_json::json!({
            "type": "table",
            "data": {"withHeadings": true, "content": [["a", "b"], ["1", "2"], ["3", "4"]]}
        }));
    }
    serde_json::json!({"blocks": blocks}).to_string()
}
