//! Role-tagged messages and their derived views.

use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::EllError;
use crate::tools::{ToolExecution, ToolRegistry, orchestrate};

use super::content::{
    ContentBlock, ContentBlockFields, ContentKind, ImageHandle, MessageContent,
    coerce_content_list, render_blocks,
};
use super::tool::{ToolCall, ToolResult};

/// Author of a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Normalized chat message: a role plus an ordered, non-empty list of content blocks.
///
/// Messages are immutable once built. Every constructor enforces that the content is
/// non-empty, that `tool_call` blocks only appear in assistant messages, and that
/// `tool_result` blocks only appear in user messages. Deserialization applies the same
/// checks.
///
/// # Examples
///
/// ```
/// use ell_core::types::{ImageHandle, Message, ContentInput};
///
/// let msg = ell_core::user(vec![
///     ContentInput::from("describe:"),
///     ImageHandle::url("https://example.com/cat.png").into(),
/// ])
/// .unwrap();
/// assert_eq!(msg.images().map(|images| images.len()), Some(1));
/// assert_eq!(msg.text(), "describe:\n<image>");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawMessage")]
pub struct Message {
    role: Role,
    content: Vec<ContentBlock>,
}

#[derive(Deserialize)]
struct RawMessage {
    role: Role,
    content: Vec<ContentBlock>,
}

impl TryFrom<RawMessage> for Message {
    type Error = EllError;

    fn try_from(raw: RawMessage) -> Result<Self, Self::Error> {
        Message::from_blocks(raw.role, raw.content)
    }
}

/// Result of [`Message::parsed`].
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedView<'a> {
    /// Exactly one parsed block exists.
    One(&'a Value),
    /// Zero or several parsed blocks, in block order.
    Many(Vec<&'a Value>),
}

impl Message {
    /// Builds a message, coercing `content` into blocks.
    ///
    /// # Errors
    ///
    /// Returns [`EllError::InvalidContent`] when coercion fails, the content is blank,
    /// or a block is not allowed for `role`.
    pub fn new(role: Role, content: impl Into<MessageContent>) -> Result<Self, EllError> {
        Self::with_defaults(role, Some(content.into()), ContentBlockFields::default())
    }

    /// Builds a message whose blank content falls back to a block built from `defaults`.
    pub fn with_defaults(
        role: Role,
        content: Option<MessageContent>,
        defaults: ContentBlockFields,
    ) -> Result<Self, EllError> {
        let blocks = coerce_content_list(content, defaults)?;
        Self::from_blocks(role, blocks)
    }

    /// Builds a message from already normalized blocks.
    pub fn from_blocks(role: Role, content: Vec<ContentBlock>) -> Result<Self, EllError> {
        let message = Self { role, content };
        message.validate()?;
        Ok(message)
    }

    /// Re-checks the non-empty and role placement rules.
    ///
    /// Adapters call this on messages decoded from vendor responses.
    pub fn validate(&self) -> Result<(), EllError> {
        if self.content.is_empty() {
            return Err(EllError::invalid_content(format!(
                "{} message must contain at least one content block",
                self.role
            )));
        }
        for (index, block) in self.content.iter().enumerate() {
            let allowed = match block.kind() {
                ContentKind::ToolCall => self.role == Role::Assistant,
                ContentKind::ToolResult => self.role == Role::User,
                _ => true,
            };
            if !allowed {
                return Err(EllError::invalid_content(format!(
                    "content[{index}]: {} blocks are not allowed in {} messages",
                    block.kind(),
                    self.role
                )));
            }
        }
        Ok(())
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn content(&self) -> &[ContentBlock] {
        &self.content
    }

    pub fn into_content(self) -> Vec<ContentBlock> {
        self.content
    }

    /// All blocks joined with newlines; non-text blocks render as `<kind>`.
    pub fn text(&self) -> String {
        render_blocks(&self.content)
    }

    /// Text blocks only, joined with newlines.
    pub fn text_only(&self) -> Option<String> {
        let texts: Vec<&str> = self
            .content
            .iter()
            .filter_map(ContentBlock::as_text)
            .collect();
        (!texts.is_empty()).then(|| texts.join("\n"))
    }

    pub fn images(&self) -> Option<Vec<&ImageHandle>> {
        non_empty(
            self.content
                .iter()
                .filter_map(|block| block.as_image().map(|(image, _)| image))
                .collect(),
        )
    }

    pub fn audios(&self) -> Option<Vec<&[f32]>> {
        non_empty(self.content.iter().filter_map(ContentBlock::as_audio).collect())
    }

    pub fn tool_calls(&self) -> Option<Vec<&ToolCall>> {
        non_empty(
            self.content
                .iter()
                .filter_map(ContentBlock::as_tool_call)
                .collect(),
        )
    }

    pub fn tool_results(&self) -> Option<Vec<&ToolResult>> {
        non_empty(
            self.content
                .iter()
                .filter_map(ContentBlock::as_tool_result)
                .collect(),
        )
    }

    /// The single parsed object, or every parsed object when there is not exactly one.
    pub fn parsed(&self) -> ParsedView<'_> {
        let mut values: Vec<&Value> = self
            .content
            .iter()
            .filter_map(ContentBlock::as_parsed)
            .collect();
        if values.len() == 1 {
            ParsedView::One(values.remove(0))
        } else {
            ParsedView::Many(values)
        }
    }

    /// Decodes the single parsed block into `T`.
    ///
    /// # Errors
    ///
    /// Returns [`EllError::InvalidContent`] when the message does not hold exactly one
    /// parsed block or the value does not match `T`.
    pub fn parsed_as<T: DeserializeOwned>(&self) -> Result<T, EllError> {
        match self.parsed() {
            ParsedView::One(value) => T::deserialize(value).map_err(|err| {
                EllError::invalid_content(format!("parsed value does not match target type: {err}"))
            }),
            ParsedView::Many(values) => Err(EllError::invalid_content(format!(
                "expected exactly one parsed block, found {}",
                values.len()
            ))),
        }
    }

    /// Runs every tool call in this message and collects the results into a new
    /// `user` message, preserving block order.
    ///
    /// # Errors
    ///
    /// Returns [`EllError::InvalidRequest`] when the message carries no tool calls.
    /// Individual tool failures are captured in their result blocks.
    pub async fn call_tools_and_collect_as_message(
        &self,
        registry: &ToolRegistry,
        parallel: bool,
    ) -> Result<Message, EllError> {
        let execution = if parallel {
            ToolExecution::parallel()
        } else {
            ToolExecution::sequential()
        };
        self.call_tools_with(registry, &execution).await
    }

    /// Same as [`Message::call_tools_and_collect_as_message`] with explicit execution
    /// settings (worker bound, cancellation).
    ///
    /// # Errors
    ///
    /// Additionally returns [`EllError::Cancelled`] when the execution's token fires
    /// before every tool finished.
    pub async fn call_tools_with(
        &self,
        registry: &ToolRegistry,
        execution: &ToolExecution,
    ) -> Result<Message, EllError> {
        let calls = self.tool_calls().ok_or_else(|| {
            EllError::invalid_request(format!("{} message contains no tool calls", self.role))
        })?;
        let blocks = orchestrate::run_tool_calls(&calls, registry, execution).await?;
        Message::from_blocks(Role::User, blocks)
    }
}

fn non_empty<T>(items: Vec<T>) -> Option<Vec<T>> {
    (!items.is_empty()).then_some(items)
}

/// Builds a `system` message.
pub fn system(content: impl Into<MessageContent>) -> Result<Message, EllError> {
    Message::new(Role::System, content)
}

/// Builds a `user` message.
///
/// # Examples
///
/// ```
/// let msg = ell_core::user("hello").unwrap();
/// assert_eq!(msg.text(), "hello");
/// assert!(msg.images().is_none());
/// ```
pub fn user(content: impl Into<MessageContent>) -> Result<Message, EllError> {
    Message::new(Role::User, content)
}

/// Builds an `assistant` message.
pub fn assistant(content: impl Into<MessageContent>) -> Result<Message, EllError> {
    Message::new(Role::Assistant, content)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ContentInput;
    use serde::Deserialize;
    use serde_json::json;

    #[test]
    fn user_text_message_views() {
        let msg = user("hello").unwrap();
        assert_eq!(msg.role(), Role::User);
        assert_eq!(msg.content(), &[ContentBlock::text("hello")]);
        assert_eq!(msg.text(), "hello");
        assert_eq!(msg.text_only().as_deref(), Some("hello"));
        assert!(msg.images().is_none());
        assert!(msg.audios().is_none());
        assert!(msg.tool_calls().is_none());
        assert!(msg.tool_results().is_none());
        assert_eq!(msg.parsed(), ParsedView::Many(vec![]));
    }

    #[test]
    fn text_only_equals_text_for_all_text_messages() {
        let msg = system(vec!["be terse", "answer in English"]).unwrap();
        assert_eq!(msg.text_only(), Some(msg.text()));
    }

    #[test]
    fn text_only_skips_non_text_blocks() {
        let msg = user(vec![
            ContentInput::from("a"),
            ContentInput::from(ImageHandle::url("https://example.com/x.png")),
            ContentInput::from("b"),
        ])
        .unwrap();
        assert_eq!(msg.text(), "a\n<image>\nb");
        assert_eq!(msg.text_only().as_deref(), Some("a\nb"));
    }

    #[test]
    fn audio_view_collects_samples() {
        let msg = user(ContentBlock::audio(vec![0.1, 0.2])).unwrap();
        assert_eq!(msg.audios(), Some(vec![&[0.1f32, 0.2][..]]));
        assert_eq!(msg.text(), "<audio>");
        assert!(msg.text_only().is_none());
    }

    #[test]
    fn tool_calls_only_in_assistant_messages() {
        let call = ToolCall::new("add", json!({"a": 1})).with_id("call_1");
        assert!(assistant(call.clone()).is_ok());
        let err = user(call).expect_err("tool calls are assistant-only");
        assert!(err.to_string().contains("tool_call"), "{err}");
    }

    #[test]
    fn tool_results_only_in_user_messages() {
        let result = ToolResult::text(Some("call_1".into()), "5");
        assert!(user(result.clone()).is_ok());
        assert!(assistant(result.clone()).is_err());
        assert!(system(result).is_err());
    }

    #[test]
    fn empty_content_without_defaults_is_rejected() {
        assert!(user("").is_err());
        assert!(Message::from_blocks(Role::User, vec![]).is_err());
        let msg = Message::with_defaults(
            Role::Assistant,
            None,
            ContentBlockFields {
                text: Some("(no content)".into()),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(msg.text(), "(no content)");
    }

    #[test]
    fn parsed_view_distinguishes_single_and_many() {
        let one = assistant(ContentInput::Parsed(json!({"name": "ell"}))).unwrap();
        assert_eq!(one.parsed(), ParsedView::One(&json!({"name": "ell"})));

        let two = assistant(vec![
            ContentInput::Parsed(json!(1)),
            ContentInput::Parsed(json!(2)),
        ])
        .unwrap();
        assert_eq!(two.parsed(), ParsedView::Many(vec![&json!(1), &json!(2)]));
    }

    #[test]
    fn parsed_as_decodes_typed_value() {
        #[derive(Debug, Deserialize, PartialEq)]
        struct Person {
            name: String,
            age: u32,
        }
        let msg = assistant(ContentInput::Parsed(json!({"name": "Ada", "age": 36}))).unwrap();
        let person: Person = msg.parsed_as().unwrap();
        assert_eq!(
            person,
            Person {
                name: "Ada".into(),
                age: 36
            }
        );
        assert!(user("no parsed").unwrap().parsed_as::<Person>().is_err());
    }

    #[test]
    fn serde_round_trip_and_validation() {
        let msg = assistant(vec![
            ContentInput::from("calling"),
            ContentInput::from(ToolCall::new("add", json!({"a": 2, "b": 3})).with_id("call_1")),
        ])
        .unwrap();
        let wire = serde_json::to_value(&msg).unwrap();
        assert_eq!(wire["role"], json!("assistant"));
        assert_eq!(wire["content"][1]["type"], json!("tool_use"));
        assert_eq!(serde_json::from_value::<Message>(wire).unwrap(), msg);

        let bad = json!({"role": "user", "content": [{"type": "tool_use", "name": "add", "arguments": {}}]});
        assert!(serde_json::from_value::<Message>(bad).is_err());
        let empty = json!({"role": "user", "content": []});
        assert!(serde_json::from_value::<Message>(empty).is_err());
    }
}
