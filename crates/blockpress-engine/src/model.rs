//! The block document handed over by the article store.
//!
//! The wire format is Editor.js-style JSON:
//!
//! ```json
//! {"time": 1700000000000, "version": "2.28", "blocks": [
//!   {"id": "a1", "type": "paragraph", "data": {"text": "Hello"}}
//! ]}
//! ```
//!
//! Parsing is lenient at block granularity. A block of an unknown type
//! becomes [`BlockKind::Unknown`]; a known type whose `data` does not fit
//! becomes [`BlockKind::Invalid`]. Neither fails the document, and the
//! renderer skips both.

use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, thiserror::Error)]
pub enum DocumentError {
    #[error("document is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("not a block document: {0}")]
    NotADocument(&'static str),
}

/// An ordered sequence of typed content blocks.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BlockDocument {
    /// Creation timestamp, passed through untouched.
    pub time: Option<Value>,
    /// Format version tag, passed through untouched.
    pub version: Option<Value>,
    pub blocks: Vec<Block>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub id: Option<String>,
    pub kind: BlockKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum BlockKind {
    Paragraph(ParagraphData),
    Header(HeaderData),
    List(ListData),
    Quote(QuoteData),
    Image(ImageData),
    Code(CodeData),
    Embed(EmbedData),
    Delimiter,
    Table(TableData),
    Checklist(ChecklistData),
    /// A `type` this renderer does not know.
    Unknown(String),
    /// A known `type` whose `data` could not be read.
    Invalid { kind: String, reason: String },
}

impl BlockKind {
    /// The wire name of the kind.
    pub fn name(&self) -> &str {
        match self {
            BlockKind::Paragraph(_) => "paragraph",
            BlockKind::Header(_) => "header",
            BlockKind::List(_) => "list",
            BlockKind::Quote(_) => "quote",
            BlockKind::Image(_) => "image",
            BlockKind::Code(_) => "code",
            BlockKind::Embed(_) => "embed",
            BlockKind::Delimiter => "delimiter",
            BlockKind::Table(_) => "table",
            BlockKind::Checklist(_) => "checklist",
            BlockKind::Unknown(kind) | BlockKind::Invalid { kind, .. } => kind.as_str(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ParagraphData {
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct HeaderData {
    pub text: String,
    /// Usually a number; strings like `"3"` are tolerated.
    #[serde(default)]
    pub level: Option<Value>,
}

impl HeaderData {
    pub const DEFAULT_LEVEL: u8 = 2;

    /// The heading level, clamped to `1..=6`.
    pub fn level(&self) -> u8 {
        let level = match &self.level {
            Some(Value::Number(n)) => n.as_f64(),
            Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
            _ => None,
        };
        match level {
            Some(n) if n.is_finite() => n.round().clamp(1.0, 6.0) as u8,
            _ => Self::DEFAULT_LEVEL,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ListStyle {
    Ordered,
    #[default]
    #[serde(other)]
    Unordered,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ListData {
    #[serde(default)]
    pub style: ListStyle,
    /// Strings, or objects with `content`/`text` and optional nested `items`.
    #[serde(default)]
    pub items: Vec<Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuoteAlignment {
    Left,
    Center,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct QuoteData {
    pub text: String,
    #[serde(default)]
    pub caption: Option<String>,
    #[serde(default)]
    pub alignment: Option<String>,
}

impl QuoteData {
    pub fn alignment(&self) -> Option<QuoteAlignment> {
        match self.alignment.as_deref()?.to_ascii_lowercase().as_str() {
            "left" => Some(QuoteAlignment::Left),
            "center" => Some(QuoteAlignment::Center),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct ImageFile {
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageData {
    #[serde(default)]
    pub file: Option<ImageFile>,
    /// Flat `url`, as written by the simple-image tool.
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub caption: Option<String>,
    #[serde(default)]
    pub with_border: bool,
    #[serde(default)]
    pub stretched: bool,
    #[serde(default)]
    pub with_background: bool,
}

impl ImageData {
    pub fn url(&self) -> Option<&str> {
        self.file
            .as_ref()
            .and_then(|f| f.url.as_deref())
            .or(self.url.as_deref())
            .filter(|u| !u.trim().is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CodeData {
    pub code: String,
    #[serde(default)]
    pub language: Option<String>,
}

impl CodeData {
    /// Language tag reduced to characters safe inside a class name.
    pub fn language(&self) -> Option<String> {
        let language: String = self
            .language
            .as_deref()?
            .trim()
            .to_ascii_lowercase()
            .chars()
            .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '+' | '#'))
            .collect();
        (!language.is_empty()).then_some(language)
    }

    /// JavaScript blocks can be run.
    pub fn is_executable(&self) -> bool {
        matches!(self.language().as_deref(), Some("javascript" | "js"))
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct EmbedData {
    #[serde(default)]
    pub embed: Option<String>,
    /// Either a service name or an object carrying `url`.
    #[serde(default)]
    pub service: Option<Value>,
    #[serde(default)]
    pub caption: Option<String>,
    #[serde(default)]
    pub width: Option<Value>,
    #[serde(default)]
    pub height: Option<Value>,
}

impl EmbedData {
    pub fn url(&self) -> Option<&str> {
        self.embed
            .as_deref()
            .or_else(|| self.service.as_ref()?.get("url")?.as_str())
            .filter(|u| !u.trim().is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableData {
    #[serde(default)]
    pub content: Vec<Vec<Value>>,
    #[serde(default)]
    pub with_headings: bool,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ChecklistItem {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub checked: bool,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ChecklistData {
    #[serde(default)]
    pub items: Vec<ChecklistItem>,
}

impl Block {
    pub fn new(kind: BlockKind) -> Self {
        Self { id: None, kind }
    }

    /// Interpret one entry of the `blocks` array. Never fails.
    pub fn from_value(value: Value) -> Self {
        let Value::Object(mut map) = value else {
            return Block::new(BlockKind::Invalid {
                kind: String::new(),
                reason: "block is not an object".to_string(),
            });
        };
        let id = match map.remove("id") {
            Some(Value::String(id)) => Some(id),
            _ => None,
        };
        let kind = match map.remove("type") {
            Some(Value::String(kind)) => kind,
            _ => {
                return Block {
                    id,
                    kind: BlockKind::Invalid {
                        kind: String::new(),
                        reason: "block has no type".to_string(),
                    },
                };
            }
        };
        let data = map.remove("data").unwrap_or(Value::Null);
        Block {
            id,
            kind: BlockKind::from_parts(kind, data),
        }
    }
}

impl BlockKind {
    fn from_parts(kind: String, data: Value) -> Self {
        fn read<T: serde::de::DeserializeOwned>(
            kind: String,
            data: Value,
            wrap: fn(T) -> BlockKind,
        ) -> BlockKind {
            match serde_json::from_value(data) {
                Ok(data) => wrap(data),
                Err(err) => BlockKind::Invalid {
                    kind,
                    reason: err.to_string(),
                },
            }
        }

        match kind.as_str() {
            "paragraph" => read(kind, data, BlockKind::Paragraph),
            "header" => read(kind, data, BlockKind::Header),
            "list" => read(kind, data, BlockKind::List),
            "quote" => read(kind, data, BlockKind::Quote),
            "image" => read(kind, data, BlockKind::Image),
            "code" => read(kind, data, BlockKind::Code),
            "embed" => read(kind, data, BlockKind::Embed),
            "delimiter" => BlockKind::Delimiter,
            "table" => read(kind, data, BlockKind::Table),
            "checklist" => read(kind, data, BlockKind::Checklist),
            _ => BlockKind::Unknown(kind),
        }
    }
}

impl BlockDocument {
    pub fn new(blocks: Vec<Block>) -> Self {
        Self {
            time: None,
            version: None,
            blocks,
        }
    }

    pub fn from_json_str(json: &str) -> Result<Self, DocumentError> {
        Self::from_value(serde_json::from_str(json)?)
    }

    pub fn from_value(value: Value) -> Result<Self, DocumentError> {
        let Value::Object(mut map) = value else {
            return Err(DocumentError::NotADocument("expected a JSON object"));
        };
        let blocks = match map.remove("blocks") {
            Some(Value::Array(blocks)) => blocks,
            Some(_) => return Err(DocumentError::NotADocument("`blocks` is not an array")),
            None => return Err(DocumentError::NotADocument("missing `blocks`")),
        };
        Ok(Self {
            time: map.remove("time"),
            version: map.remove("version"),
            blocks: blocks.into_iter().map(Block::from_value).collect(),
        })
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use serde_json::json;

    fn kind_of(block: Value) -> BlockKind {
        Block::from_value(block).kind
    }

    #[test]
    fn parses_an_editor_document() {
        let doc = BlockDocument::from_json_str(
            r#"{"time": 1, "version": "2.28", "blocks": [
                {"id": "a", "type": "paragraph", "data": {"text": "Hi"}},
                {"type": "delimiter", "data": {}}
            ]}"#,
        )
        .unwrap();

        assert_eq!(doc.version, Some(json!("2.28")));
        assert_eq!(doc.blocks.len(), 2);
        assert_eq!(doc.blocks[0].id.as_deref(), Some("a"));
        assert_eq!(
            doc.blocks[0].kind,
            BlockKind::Paragraph(ParagraphData {
                text: "Hi".to_string()
            })
        );
        assert_eq!(doc.blocks[1].kind, BlockKind::Delimiter);
    }

    #[rstest]
    #[case("not json")]
    #[case("[1, 2]")]
    #[case(r#"{"time": 1}"#)]
    #[case(r#"{"blocks": "nope"}"#)]
    fn rejects_non_documents(#[case] json: &str) {
        assert!(BlockDocument::from_json_str(json).is_err());
    }

    #[test]
    fn unknown_types_are_kept_as_unknown() {
        assert_eq!(
            kind_of(json!({"type": "warning", "data": {"title": "x"}})),
            BlockKind::Unknown("warning".to_string())
        );
    }

    #[test]
    fn mistyped_data_is_invalid_not_fatal() {
        let kind = kind_of(json!({"type": "paragraph", "data": {"text": 5}}));
        assert!(matches!(kind, BlockKind::Invalid { ref kind, .. } if kind == "paragraph"));

        let kind = kind_of(json!("just a string"));
        assert!(matches!(kind, BlockKind::Invalid { .. }));
    }

    #[rstest]
    #[case(json!({"text": "t"}), 2)]
    #[case(json!({"text": "t", "level": 3}), 3)]
    #[case(json!({"text": "t", "level": 0}), 1)]
    #[case(json!({"text": "t", "level": 9}), 6)]
    #[case(json!({"text": "t", "level": "4"}), 4)]
    #[case(json!({"text": "t", "level": "big"}), 2)]
    fn header_levels_default_and_clamp(#[case] data: Value, #[case] expected: u8) {
        let header: HeaderData = serde_json::from_value(data).unwrap();
        assert_eq!(header.level(), expected);
    }

    #[rstest]
    #[case(Some("JavaScript"), true)]
    #[case(Some("js"), true)]
    #[case(Some("python"), false)]
    #[case(None, false)]
    fn javascript_code_is_executable(#[case] language: Option<&str>, #[case] expected: bool) {
        let code = CodeData {
            code: "1".to_string(),
            language: language.map(str::to_string),
        };
        assert_eq!(code.is_executable(), expected);
    }

    #[test]
    fn language_is_reduced_to_class_safe_characters() {
        let code = CodeData {
            code: String::new(),
            language: Some("\"><script>C++".to_string()),
        };
        assert_eq!(code.language().as_deref(), Some("scriptc++"));
    }

    #[test]
    fn embed_url_falls_back_to_service_url() {
        let embed: EmbedData =
            serde_json::from_value(json!({"service": {"url": "https://v.example/1"}})).unwrap();
        assert_eq!(embed.url(), Some("https://v.example/1"));

        let embed: EmbedData = serde_json::from_value(json!({"service": "youtube"})).unwrap();
        assert_eq!(embed.url(), None);
    }

    #[test]
    fn list_style_defaults_to_unordered() {
        let list: ListData = serde_json::from_value(json!({"style": "weird", "items": []})).unwrap();
        assert_eq!(list.style, ListStyle::Unordered);
        let list: ListData = serde_json::from_value(json!({"style": "ordered"})).unwrap();
        assert_eq!(list.style, ListStyle::Ordered);
    }
}
