use ell_core::{
    ContentBlock, ContentBlockFields, ContentInput, EllError, ImageDetail, ImageHandle, Message,
    MessageContent, ParsedView, Role, assistant, coerce_content_list, user,
};
use serde::Deserialize;
use serde_json::json;

#[test]
fn text_message_round_trip() {
    let message = user("hello").expect("user message");
    assert_eq!(message.role(), Role::User);
    assert_eq!(message.content(), &[ContentBlock::text("hello")]);
    assert_eq!(message.text(), "hello");
    assert!(message.images().is_none());

    let wire = serde_json::to_value(&message).unwrap();
    assert_eq!(
        wire,
        json!({"role": "user", "content": [{"type": "text", "text": "hello"}]})
    );
    let decoded: Message = serde_json::from_value(wire).unwrap();
    assert_eq!(decoded, message);
}

#[test]
fn mixed_content_keeps_order_and_placeholders() {
    let image = ImageHandle::url("https://example.com/cat.png");
    let message = user(vec![
        ContentInput::from("describe:"),
        ContentInput::from(image.clone()),
    ])
    .expect("mixed message");

    assert_eq!(message.content().len(), 2);
    assert_eq!(message.content()[0], ContentBlock::text("describe:"));
    assert_eq!(message.images(), Some(vec![&image]));
    assert_eq!(message.text(), "describe:\n<image>");
    assert_eq!(message.text_only().as_deref(), Some("describe:"));
}

#[test]
fn image_with_detail_survives_the_wire() {
    let message = Message::from_blocks(
        Role::User,
        vec![ContentBlock::image_with_detail(
            ImageHandle::base64("iVBORw0KGgo=", "image/png"),
            ImageDetail::High,
        )],
    )
    .unwrap();
    let wire = serde_json::to_string(&message).unwrap();
    let decoded: Message = serde_json::from_str(&wire).unwrap();
    assert_eq!(decoded, message);
}

#[test]
fn multi_field_assignment_is_rejected() {
    let fields = ContentBlockFields {
        text: Some("hi".into()),
        audio: Some(vec![0.0, 0.5]),
        ..Default::default()
    };
    let err = ContentBlock::from_fields(fields).unwrap_err();
    assert!(matches!(err, EllError::InvalidContent { .. }));
}

#[test]
fn empty_content_falls_back_to_defaults() {
    let defaults = ContentBlockFields {
        text: Some("(no input)".into()),
        ..Default::default()
    };
    let message =
        Message::with_defaults(Role::User, Some(MessageContent::Many(Vec::new())), defaults)
            .unwrap();
    assert_eq!(message.text(), "(no input)");

    let blocks = coerce_content_list(None, ContentBlockFields::default());
    assert!(matches!(blocks, Err(EllError::InvalidContent { .. })));
}

#[test]
fn list_coercion_is_elementwise() {
    let inputs = vec![
        ContentInput::from("a"),
        ContentInput::from(ImageHandle::url("https://example.com/b.png")),
        ContentInput::Parsed(json!({"c": 3})),
    ];
    let list = coerce_content_list(
        Some(MessageContent::Many(inputs.clone())),
        ContentBlockFields::default(),
    )
    .unwrap();
    let each: Vec<ContentBlock> = inputs
        .into_iter()
        .map(|input| ContentBlock::coerce(input).unwrap())
        .collect();
    assert_eq!(list, each);
}

#[derive(Debug, Deserialize, PartialEq)]
struct Person {
    name: String,
    age: u8,
}

#[test]
fn parsed_payloads_decode_into_caller_types() {
    let message = assistant(ContentBlock::parsed(&json!({"name": "Ada", "age": 36})).unwrap())
        .unwrap();
    assert!(matches!(message.parsed(), ParsedView::One(_)));
    assert_eq!(
        message.parsed_as::<Person>().unwrap(),
        Person {
            name: "Ada".into(),
            age: 36
        }
    );
}
