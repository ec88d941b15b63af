//! Single-payload content fragments and the coercion rules that produce them.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::EllError;

use super::tool::{ToolCall, ToolResult};

/// Audio format tag used by the normalized wire shape.
pub const AUDIO_FORMAT_PCM_F32: &str = "pcm_f32";

/// Opaque reference to an image.
///
/// Remote images stay URLs; inline images keep their base64 payload and media type
/// so adapters can re-encode them as data URLs.
///
/// # Examples
///
/// ```
/// use ell_core::types::ImageHandle;
///
/// let inline = ImageHandle::from_url("data:image/png;base64,iVBORw0KGgo=");
/// assert_eq!(
///     inline,
///     ImageHandle::Base64 { data: "iVBORw0KGgo=".into(), media_type: "image/png".into() }
/// );
/// assert_eq!(inline.to_url(), "data:image/png;base64,iVBORw0KGgo=");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ImageHandle {
    /// Public URL accessible by the provider.
    Url { url: String },
    /// Base64-encoded inline payload.
    Base64 { data: String, media_type: String },
}

impl ImageHandle {
    /// Wraps a remote image URL.
    pub fn url(url: impl Into<String>) -> Self {
        Self::Url { url: url.into() }
    }

    /// Wraps an inline base64 payload.
    pub fn base64(data: impl Into<String>, media_type: impl Into<String>) -> Self {
        Self::Base64 {
            data: data.into(),
            media_type: media_type.into(),
        }
    }

    /// Parses a URL, recognizing `data:<media>;base64,<payload>` as an inline image.
    pub fn from_url(url: &str) -> Self {
        if let Some(rest) = url.strip_prefix("data:") {
            if let Some((header, data)) = rest.split_once(',') {
                if let Some(media_type) = header.strip_suffix(";base64") {
                    return Self::base64(data, media_type);
                }
            }
        }
        Self::url(url)
    }

    /// Renders the handle as a URL; inline images become data URLs.
    pub fn to_url(&self) -> String {
        match self {
            Self::Url { url } => url.clone(),
            Self::Base64 { data, media_type } => format!("data:{media_type};base64,{data}"),
        }
    }
}

/// Detail preset requested for image inspection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageDetail {
    Low,
    High,
    Auto,
}

impl ImageDetail {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::High => "high",
            Self::Auto => "auto",
        }
    }
}

/// Name of the payload carried by a [`ContentBlock`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContentKind {
    Text,
    Image,
    Audio,
    ToolCall,
    Parsed,
    ToolResult,
}

impl ContentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Image => "image",
            Self::Audio => "audio",
            Self::ToolCall => "tool_call",
            Self::Parsed => "parsed",
            Self::ToolResult => "tool_result",
        }
    }
}

impl fmt::Display for ContentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A fragment of a message carrying exactly one payload.
///
/// Blocks serialize to the normalized wire shape shared by every adapter, for example
/// `{"type":"text","text":"hi"}` or `{"type":"tool_use","id":"call_1","name":"add","arguments":{}}`.
///
/// # Examples
///
/// ```
/// use ell_core::types::{ContentBlock, ContentKind, ImageDetail, ImageHandle};
///
/// let block = ContentBlock::image_with_detail(ImageHandle::url("https://example.com/a.png"), ImageDetail::High);
/// assert_eq!(block.kind(), ContentKind::Image);
/// assert_eq!(
///     serde_json::to_value(&block).unwrap(),
///     serde_json::json!({
///         "type": "image_url",
///         "image_url": { "url": "https://example.com/a.png", "detail": "high" }
///     })
/// );
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(into = "WireBlock", try_from = "WireBlock")]
pub enum ContentBlock {
    Text(String),
    /// Image handle with an optional detail hint.
    Image {
        image: ImageHandle,
        detail: Option<ImageDetail>,
    },
    /// Floating-point PCM samples.
    Audio(Vec<f32>),
    ToolCall(ToolCall),
    ToolResult(ToolResult),
    /// Structured object produced by schema-directed decoding.
    Parsed(Value),
}

impl ContentBlock {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(text.into())
    }

    pub fn image(image: ImageHandle) -> Self {
        Self::Image {
            image,
            detail: None,
        }
    }

    pub fn image_with_detail(image: ImageHandle, detail: ImageDetail) -> Self {
        Self::Image {
            image,
            detail: Some(detail),
        }
    }

    pub fn audio(samples: Vec<f32>) -> Self {
        Self::Audio(samples)
    }

    /// Serializes `value` into a parsed block.
    ///
    /// # Errors
    ///
    /// Returns [`EllError::InvalidContent`] when `value` cannot be represented as JSON.
    pub fn parsed<T: Serialize>(value: &T) -> Result<Self, EllError> {
        serde_json::to_value(value)
            .map(Self::Parsed)
            .map_err(|err| EllError::invalid_content(format!("unserializable parsed value: {err}")))
    }

    /// Builds a block from a partial assignment of payload fields.
    ///
    /// Exactly one field must be set; `image` together with `image_detail` is the only
    /// tolerated pair.
    ///
    /// # Examples
    ///
    /// ```
    /// use ell_core::types::{ContentBlock, ContentBlockFields};
    ///
    /// let err = ContentBlock::from_fields(ContentBlockFields {
    ///     text: Some("hi".into()),
    ///     audio: Some(vec![0.0]),
    ///     ..Default::default()
    /// })
    /// .unwrap_err();
    /// assert!(err.to_string().contains("text, audio"));
    /// ```
    ///
    /// # Errors
    ///
    /// Returns [`EllError::InvalidContent`] when no payload or more than one payload is set.
    pub fn from_fields(fields: ContentBlockFields) -> Result<Self, EllError> {
        let populated = fields.populated();
        let image_pair = populated == ["image", "image_detail"];
        if populated.len() > 1 && !image_pair {
            return Err(EllError::invalid_content(format!(
                "only one field can be set (except image with image_detail), found: {}",
                populated.join(", ")
            )));
        }

        let ContentBlockFields {
            text,
            image,
            image_detail,
            audio,
            tool_call,
            parsed,
            tool_result,
        } = fields;

        if let Some(text) = text {
            return Ok(Self::Text(text));
        }
        if let Some(image) = image {
            return Ok(Self::Image {
                image,
                detail: image_detail,
            });
        }
        if image_detail.is_some() {
            return Err(EllError::invalid_content("image_detail requires an image"));
        }
        if let Some(audio) = audio {
            return Ok(Self::Audio(audio));
        }
        if let Some(call) = tool_call {
            return Ok(Self::ToolCall(call));
        }
        if let Some(value) = parsed {
            return Ok(Self::Parsed(value));
        }
        if let Some(result) = tool_result {
            return Ok(Self::ToolResult(result));
        }
        Err(EllError::invalid_content("content block has no payload"))
    }

    /// Reports which payload this block carries.
    pub fn kind(&self) -> ContentKind {
        match self {
            Self::Text(_) => ContentKind::Text,
            Self::Image { .. } => ContentKind::Image,
            Self::Audio(_) => ContentKind::Audio,
            Self::ToolCall(_) => ContentKind::ToolCall,
            Self::ToolResult(_) => ContentKind::ToolResult,
            Self::Parsed(_) => ContentKind::Parsed,
        }
    }

    /// Maps a loosely typed input onto a block.
    ///
    /// Existing blocks pass through unchanged, so coercion is idempotent.
    ///
    /// # Examples
    ///
    /// ```
    /// use ell_core::types::{ContentBlock, ContentInput};
    ///
    /// let block = ContentBlock::coerce("hello").unwrap();
    /// assert_eq!(block, ContentBlock::text("hello"));
    /// assert_eq!(ContentBlock::coerce(block.clone()).unwrap(), block);
    /// assert!(ContentBlock::coerce(ContentInput::Raw(serde_json::json!(42))).is_err());
    /// ```
    ///
    /// # Errors
    ///
    /// Returns [`EllError::InvalidContent`] for raw JSON values that are neither strings
    /// nor blocks in the normalized wire shape.
    pub fn coerce(input: impl Into<ContentInput>) -> Result<Self, EllError> {
        match input.into() {
            ContentInput::Block(block) => Ok(block),
            ContentInput::Text(text) => Ok(Self::Text(text)),
            ContentInput::Image(image) => Ok(Self::image(image)),
            ContentInput::ToolCall(call) => Ok(Self::ToolCall(call)),
            ContentInput::ToolResult(result) => Ok(Self::ToolResult(result)),
            ContentInput::Parsed(value) => Ok(Self::Parsed(value)),
            ContentInput::Raw(Value::String(text)) => Ok(Self::Text(text)),
            ContentInput::Raw(value @ Value::Object(_)) if value.get("type").is_some() => {
                serde_json::from_value(value)
                    .map_err(|err| EllError::invalid_content(format!("malformed content block: {err}")))
            }
            ContentInput::Raw(other) => Err(EllError::invalid_content(format!(
                "cannot coerce {} into a content block",
                json_type_name(&other)
            ))),
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_image(&self) -> Option<(&ImageHandle, Option<ImageDetail>)> {
        match self {
            Self::Image { image, detail } => Some((image, *detail)),
            _ => None,
        }
    }

    pub fn as_audio(&self) -> Option<&[f32]> {
        match self {
            Self::Audio(samples) => Some(samples),
            _ => None,
        }
    }

    pub fn as_tool_call(&self) -> Option<&ToolCall> {
        match self {
            Self::ToolCall(call) => Some(call),
            _ => None,
        }
    }

    pub fn as_tool_result(&self) -> Option<&ToolResult> {
        match self {
            Self::ToolResult(result) => Some(result),
            _ => None,
        }
    }

    pub fn as_parsed(&self) -> Option<&Value> {
        match self {
            Self::Parsed(value) => Some(value),
            _ => None,
        }
    }
}

/// Joins blocks with newlines, rendering non-text blocks as `<kind>`.
pub(crate) fn render_blocks(blocks: &[ContentBlock]) -> String {
    blocks
        .iter()
        .map(|block| match block {
            ContentBlock::Text(text) => text.clone(),
            other => format!("<{}>", other.kind()),
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an untyped object",
    }
}

/// Partial assignment of content fields, mirroring the optional-field construction path.
///
/// Convert with [`ContentBlock::from_fields`]; it also serves as the default block for
/// messages built without content.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContentBlockFields {
    pub text: Option<String>,
    pub image: Option<ImageHandle>,
    pub image_detail: Option<ImageDetail>,
    pub audio: Option<Vec<f32>>,
    pub tool_call: Option<ToolCall>,
    pub parsed: Option<Value>,
    pub tool_result: Option<ToolResult>,
}

impl ContentBlockFields {
    /// Reports the populated payload in precedence
    /// `text > image > audio > tool_call > parsed > tool_result`.
    pub fn kind(&self) -> Option<ContentKind> {
        if self.text.is_some() {
            Some(ContentKind::Text)
        } else if self.image.is_some() {
            Some(ContentKind::Image)
        } else if self.audio.is_some() {
            Some(ContentKind::Audio)
        } else if self.tool_call.is_some() {
            Some(ContentKind::ToolCall)
        } else if self.parsed.is_some() {
            Some(ContentKind::Parsed)
        } else if self.tool_result.is_some() {
            Some(ContentKind::ToolResult)
        } else {
            None
        }
    }

    pub fn is_empty(&self) -> bool {
        self.populated().is_empty()
    }

    fn populated(&self) -> Vec<&'static str> {
        let flags = [
            ("text", self.text.is_some()),
            ("image", self.image.is_some()),
            ("image_detail", self.image_detail.is_some()),
            ("audio", self.audio.is_some()),
            ("tool_call", self.tool_call.is_some()),
            ("parsed", self.parsed.is_some()),
            ("tool_result", self.tool_result.is_some()),
        ];
        flags
            .into_iter()
            .filter_map(|(name, set)| set.then_some(name))
            .collect()
    }
}

/// Loosely typed value accepted by [`ContentBlock::coerce`].
#[derive(Debug, Clone, PartialEq)]
pub enum ContentInput {
    Block(ContentBlock),
    Text(String),
    Image(ImageHandle),
    ToolCall(ToolCall),
    ToolResult(ToolResult),
    /// A schema-decoded object.
    Parsed(Value),
    /// An untyped JSON value; only strings and wire-shaped blocks are accepted.
    Raw(Value),
}

impl ContentInput {
    /// Marks a serializable value as a schema-decoded payload.
    ///
    /// # Errors
    ///
    /// Returns [`EllError::InvalidContent`] when `value` cannot be represented as JSON.
    pub fn parsed<T: Serialize>(value: &T) -> Result<Self, EllError> {
        serde_json::to_value(value)
            .map(Self::Parsed)
            .map_err(|err| EllError::invalid_content(format!("unserializable parsed value: {err}")))
    }

    fn is_blank(&self) -> bool {
        match self {
            Self::Text(text) => text.is_empty(),
            Self::Raw(Value::String(text)) => text.is_empty(),
            _ => false,
        }
    }
}

impl From<ContentBlock> for ContentInput {
    fn from(block: ContentBlock) -> Self {
        Self::Block(block)
    }
}

impl From<String> for ContentInput {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<&str> for ContentInput {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

impl From<ImageHandle> for ContentInput {
    fn from(image: ImageHandle) -> Self {
        Self::Image(image)
    }
}

impl From<ToolCall> for ContentInput {
    fn from(call: ToolCall) -> Self {
        Self::ToolCall(call)
    }
}

impl From<ToolResult> for ContentInput {
    fn from(result: ToolResult) -> Self {
        Self::ToolResult(result)
    }
}

/// Content handed to message constructors: one value or an ordered list.
#[derive(Debug, Clone, PartialEq)]
pub enum MessageContent {
    Single(ContentInput),
    Many(Vec<ContentInput>),
}

impl MessageContent {
    fn is_blank(&self) -> bool {
        match self {
            Self::Single(input) => input.is_blank(),
            Self::Many(inputs) => inputs.is_empty(),
        }
    }
}

impl From<ContentInput> for MessageContent {
    fn from(input: ContentInput) -> Self {
        Self::Single(input)
    }
}

impl From<&str> for MessageContent {
    fn from(text: &str) -> Self {
        Self::Single(text.into())
    }
}

impl From<String> for MessageContent {
    fn from(text: String) -> Self {
        Self::Single(text.into())
    }
}

impl From<ContentBlock> for MessageContent {
    fn from(block: ContentBlock) -> Self {
        Self::Single(block.into())
    }
}

impl From<ImageHandle> for MessageContent {
    fn from(image: ImageHandle) -> Self {
        Self::Single(image.into())
    }
}

impl From<ToolCall> for MessageContent {
    fn from(call: ToolCall) -> Self {
        Self::Single(call.into())
    }
}

impl From<ToolResult> for MessageContent {
    fn from(result: ToolResult) -> Self {
        Self::Single(result.into())
    }
}

impl From<Vec<ContentInput>> for MessageContent {
    fn from(inputs: Vec<ContentInput>) -> Self {
        Self::Many(inputs)
    }
}

impl From<Vec<ContentBlock>> for MessageContent {
    fn from(blocks: Vec<ContentBlock>) -> Self {
        Self::Many(blocks.into_iter().map(ContentInput::Block).collect())
    }
}

impl From<Vec<&str>> for MessageContent {
    fn from(texts: Vec<&str>) -> Self {
        Self::Many(texts.into_iter().map(ContentInput::from).collect())
    }
}

impl From<Vec<String>> for MessageContent {
    fn from(texts: Vec<String>) -> Self {
        Self::Many(texts.into_iter().map(ContentInput::Text).collect())
    }
}

/// Normalizes message content into an ordered, non-empty block sequence.
///
/// Absent or blank content (`None`, an empty list, or the empty string) yields a
/// single block built from `defaults`. Otherwise every element is coerced in order.
///
/// # Examples
///
/// ```
/// use ell_core::types::{coerce_content_list, ContentBlock, ContentBlockFields, ContentInput, ImageHandle};
///
/// let blocks = coerce_content_list(
///     Some(vec![ContentInput::from("describe:"), ImageHandle::url("https://x/y.png").into()].into()),
///     ContentBlockFields::default(),
/// )
/// .unwrap();
/// assert_eq!(blocks[0], ContentBlock::text("describe:"));
/// assert_eq!(blocks.len(), 2);
///
/// let fallback = coerce_content_list(
///     None,
///     ContentBlockFields { text: Some("default".into()), ..Default::default() },
/// )
/// .unwrap();
/// assert_eq!(fallback, vec![ContentBlock::text("default")]);
/// ```
///
/// # Errors
///
/// Returns [`EllError::InvalidContent`] naming the offending element index, or when
/// `defaults` is used and does not describe exactly one payload.
pub fn coerce_content_list(
    input: Option<MessageContent>,
    defaults: ContentBlockFields,
) -> Result<Vec<ContentBlock>, EllError> {
    let inputs = match input {
        Some(content) if !content.is_blank() => match content {
            MessageContent::Single(input) => vec![input],
            MessageContent::Many(inputs) => inputs,
        },
        _ => return ContentBlock::from_fields(defaults).map(|block| vec![block]),
    };

    inputs
        .into_iter()
        .enumerate()
        .map(|(index, input)| {
            ContentBlock::coerce(input).map_err(|err| match err {
                EllError::InvalidContent { message } => {
                    EllError::invalid_content(format!("content[{index}]: {message}"))
                }
                other => other,
            })
        })
        .collect()
}

#[derive(Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum WireBlock {
    Text {
        text: String,
    },
    ImageUrl {
        image_url: WireImageUrl,
    },
    InputAudio {
        audio: WireAudio,
    },
    ToolUse {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<String>,
        name: String,
        #[serde(default)]
        arguments: Value,
    },
    ToolResult {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        tool_use_id: Option<String>,
        content: Vec<ContentBlock>,
    },
    Parsed {
        value: Value,
    },
}

#[derive(Serialize, Deserialize)]
struct WireImageUrl {
    url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    detail: Option<ImageDetail>,
}

#[derive(Serialize, Deserialize)]
struct WireAudio {
    data: Vec<f32>,
    format: String,
}

impl From<ContentBlock> for WireBlock {
    fn from(block: ContentBlock) -> Self {
        match block {
            ContentBlock::Text(text) => Self::Text { text },
            ContentBlock::Image { image, detail } => Self::ImageUrl {
                image_url: WireImageUrl {
                    url: image.to_url(),
                    detail,
                },
            },
            ContentBlock::Audio(data) => Self::InputAudio {
                audio: WireAudio {
                    data,
                    format: AUDIO_FORMAT_PCM_F32.to_string(),
                },
            },
            ContentBlock::ToolCall(call) => Self::ToolUse {
                id: call.tool_call_id,
                name: call.tool,
                arguments: call.params,
            },
            ContentBlock::ToolResult(result) => Self::ToolResult {
                tool_use_id: result.tool_call_id,
                content: result.result,
            },
            ContentBlock::Parsed(value) => Self::Parsed { value },
        }
    }
}

impl TryFrom<WireBlock> for ContentBlock {
    type Error = EllError;

    fn try_from(wire: WireBlock) -> Result<Self, Self::Error> {
        Ok(match wire {
            WireBlock::Text { text } => Self::Text(text),
            WireBlock::ImageUrl { image_url } => Self::Image {
                image: ImageHandle::from_url(&image_url.url),
                detail: image_url.detail,
            },
            WireBlock::InputAudio { audio } => {
                if audio.format != AUDIO_FORMAT_PCM_F32 {
                    return Err(EllError::invalid_content(format!(
                        "unsupported audio format {}",
                        audio.format
                    )));
                }
                Self::Audio(audio.data)
            }
            WireBlock::ToolUse {
                id,
                name,
                arguments,
            } => Self::ToolCall(ToolCall {
                tool: name,
                params: arguments,
                tool_call_id: id,
            }),
            WireBlock::ToolResult {
                tool_use_id,
                content,
            } => Self::ToolResult(ToolResult {
                tool_call_id: tool_use_id,
                result: content,
            }),
            WireBlock::Parsed { value } => Self::Parsed(value),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn from_fields_rejects_text_with_audio() {
        let err = ContentBlock::from_fields(ContentBlockFields {
            text: Some("hi".into()),
            audio: Some(vec![0.1, 0.2]),
            ..Default::default()
        })
        .expect_err("two payloads must be rejected");
        assert!(matches!(err, EllError::InvalidContent { .. }));
    }

    #[test]
    fn from_fields_accepts_image_with_detail() {
        let block = ContentBlock::from_fields(ContentBlockFields {
            image: Some(ImageHandle::url("https://example.com/cat.png")),
            image_detail: Some(ImageDetail::Low),
            ..Default::default()
        })
        .expect("image with detail is valid");
        assert_eq!(block.kind(), ContentKind::Image);
        assert_eq!(block.as_image().and_then(|(_, detail)| detail), Some(ImageDetail::Low));
    }

    #[test]
    fn from_fields_rejects_empty_and_dangling_detail() {
        assert!(ContentBlock::from_fields(ContentBlockFields::default()).is_err());
        assert!(
            ContentBlock::from_fields(ContentBlockFields {
                image_detail: Some(ImageDetail::Auto),
                ..Default::default()
            })
            .is_err()
        );
    }

    #[test]
    fn fields_kind_follows_precedence() {
        let fields = ContentBlockFields {
            audio: Some(vec![]),
            tool_result: Some(ToolResult::new(None, vec![])),
            parsed: Some(json!({})),
            ..Default::default()
        };
        assert_eq!(fields.kind(), Some(ContentKind::Audio));
        assert_eq!(ContentBlockFields::default().kind(), None);
    }

    #[test]
    fn coerce_is_idempotent() {
        let inputs = vec![
            ContentInput::from("text"),
            ContentInput::from(ImageHandle::url("https://example.com/a.png")),
            ContentInput::from(ToolCall::new("add", json!({"a": 1}))),
            ContentInput::Parsed(json!({"name": "ell"})),
            ContentInput::Raw(json!({"type": "text", "text": "wire"})),
        ];
        for input in inputs {
            let once = ContentBlock::coerce(input).expect("coerce");
            let twice = ContentBlock::coerce(once.clone()).expect("coerce again");
            assert_eq!(once, twice);
        }
    }

    #[test]
    fn coerce_rejects_untyped_values() {
        for value in [json!(1), json!(null), json!([1, 2]), json!({"foo": "bar"})] {
            let err = ContentBlock::coerce(ContentInput::Raw(value)).expect_err("must fail");
            assert!(matches!(err, EllError::InvalidContent { .. }));
        }
    }

    #[test]
    fn list_coercion_matches_elementwise_coercion() {
        let a = ContentInput::from("a");
        let b = ContentInput::from(ImageHandle::url("https://example.com/b.png"));
        let c = ContentInput::from(ToolResult::text(Some("call_1".into()), "c"));
        let expected = vec![
            ContentBlock::coerce(a.clone()).unwrap(),
            ContentBlock::coerce(b.clone()).unwrap(),
            ContentBlock::coerce(c.clone()).unwrap(),
        ];
        let blocks = coerce_content_list(
            Some(MessageContent::Many(vec![a, b, c])),
            ContentBlockFields::default(),
        )
        .expect("coerce list");
        assert_eq!(blocks, expected);
    }

    #[test]
    fn list_coercion_reports_failing_index() {
        let err = coerce_content_list(
            Some(MessageContent::Many(vec![
                ContentInput::from("ok"),
                ContentInput::Raw(json!(3)),
            ])),
            ContentBlockFields::default(),
        )
        .expect_err("second element is invalid");
        assert!(err.to_string().contains("content[1]"), "{err}");
    }

    #[test]
    fn blank_content_uses_defaults() {
        let defaults = ContentBlockFields {
            text: Some("fallback".into()),
            ..Default::default()
        };
        for input in [None, Some(MessageContent::from("")), Some(MessageContent::Many(vec![]))] {
            let blocks = coerce_content_list(input, defaults.clone()).expect("defaults");
            assert_eq!(blocks, vec![ContentBlock::text("fallback")]);
        }
        assert!(coerce_content_list(None, ContentBlockFields::default()).is_err());
    }

    #[test]
    fn wire_shape_round_trips_tool_blocks() {
        let call = ContentBlock::ToolCall(
            ToolCall::new("add", json!({"a": 2, "b": 3})).with_id("call_1"),
        );
        let wire = serde_json::to_value(&call).unwrap();
        assert_eq!(
            wire,
            json!({"type": "tool_use", "id": "call_1", "name": "add", "arguments": {"a": 2, "b": 3}})
        );
        assert_eq!(serde_json::from_value::<ContentBlock>(wire).unwrap(), call);

        let result = ContentBlock::ToolResult(ToolResult::text(Some("call_1".into()), "5"));
        let wire = serde_json::to_value(&result).unwrap();
        assert_eq!(
            wire,
            json!({"type": "tool_result", "tool_use_id": "call_1", "content": [{"type": "text", "text": "5"}]})
        );
        assert_eq!(serde_json::from_value::<ContentBlock>(wire).unwrap(), result);
    }

    #[test]
    fn wire_shape_keeps_inline_images_and_audio() {
        let image = ContentBlock::image(ImageHandle::base64("AAAA", "image/jpeg"));
        let wire = serde_json::to_value(&image).unwrap();
        assert_eq!(wire["image_url"]["url"], json!("data:image/jpeg;base64,AAAA"));
        assert!(wire["image_url"].get("detail").is_none());
        assert_eq!(serde_json::from_value::<ContentBlock>(wire).unwrap(), image);

        let audio = ContentBlock::audio(vec![0.5, -0.25]);
        let wire = serde_json::to_value(&audio).unwrap();
        assert_eq!(wire["audio"]["format"], json!(AUDIO_FORMAT_PCM_F32));
        assert_eq!(serde_json::from_value::<ContentBlock>(wire).unwrap(), audio);
    }

    #[test]
    fn wire_shape_rejects_unknown_audio_format() {
        let wire = json!({"type": "input_audio", "audio": {"data": [0.0], "format": "mp3"}});
        assert!(serde_json::from_value::<ContentBlock>(wire).is_err());
    }

    #[test]
    fn render_blocks_uses_placeholders() {
        let blocks = vec![
            ContentBlock::text("look:"),
            ContentBlock::image(ImageHandle::url("https://example.com/a.png")),
            ContentBlock::Parsed(json!({})),
        ];
        assert_eq!(render_blocks(&blocks), "look:\n<image>\n<parsed>");
    }
}
