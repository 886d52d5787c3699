//! Turns transcript entries into display text.
//!
//! Bot replies that look like a JSON object are shown as an indented
//! `Label: value` tree; everything else is printed verbatim.

use std::fmt;

use color_print::cformat;
use serde_json::{Map, Number, Value};
use tracing::debug;

use super::conversation_state::{Message, Sender};

const INDENT: &str = "  ";

/// A leaf of a structured payload.
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    Text(String),
    Number(Number),
    Bool(bool),
    Null,
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Text(s) => f.write_str(s),
            Scalar::Number(n) => f.write_str(&number_text(n)),
            Scalar::Bool(b) => write!(f, "{}", b),
            Scalar::Null => f.write_str("null"),
        }
    }
}

/// Integral floats print without a fraction (`1.0` -> `1`, `1e3` -> `1000`)
/// and negative zero prints as `0`.
fn number_text(n: &Number) -> String {
    match n.as_f64() {
        Some(value) if n.is_f64() => {
            if value == 0.0 {
                "0".to_string()
            } else if value.fract() == 0.0 && value.abs() < i64::MAX as f64 {
                (value as i64).to_string()
            } else {
                value.to_string()
            }
        }
        _ => n.to_string(),
    }
}

/// A parsed structured payload. Mapping entries keep the order they had on
/// the wire.
#[derive(Debug, Clone, PartialEq)]
pub enum StructuredValue {
    Scalar(Scalar),
    List(Vec<StructuredValue>),
    Mapping(Vec<(String, StructuredValue)>),
}

impl From<Value> for StructuredValue {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => StructuredValue::Scalar(Scalar::Null),
            Value::Bool(b) => StructuredValue::Scalar(Scalar::Bool(b)),
            Value::Number(n) => StructuredValue::Scalar(Scalar::Number(n)),
            Value::String(s) => StructuredValue::Scalar(Scalar::Text(s)),
            Value::Array(items) => {
                StructuredValue::List(items.into_iter().map(StructuredValue::from).collect())
            }
            Value::Object(map) => StructuredValue::Mapping(mapping_entries(map)),
        }
    }
}

fn mapping_entries(map: Map<String, Value>) -> Vec<(String, StructuredValue)> {
    map.into_iter()
        .map(|(key, value)| (key, StructuredValue::from(value)))
        .collect()
}

/// Parse `raw` as a JSON object. Any other document shape is an error.
pub fn parse_mapping(raw: &str) -> serde_json::Result<Vec<(String, StructuredValue)>> {
    let map: Map<String, Value> = serde_json::from_str(raw)?;
    Ok(mapping_entries(map))
}

/// One `Label: value` row of a rendered mapping.
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub label: String,
    pub value: FieldValue,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Inline(String),
    Nested(Vec<Field>),
    Items(Vec<Item>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Item {
    Text(String),
    Block(Vec<Field>),
    List(Vec<Item>),
}

/// Display tree for one message.
#[derive(Debug, Clone, PartialEq)]
pub enum Rendered {
    Plain(String),
    Block(Vec<Field>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Style {
    Plain,
    Color,
}

impl Rendered {
    pub fn to_text(&self) -> String {
        self.format(Style::Plain)
    }

    pub fn format(&self, style: Style) -> String {
        match self {
            Rendered::Plain(text) => text.clone(),
            Rendered::Block(fields) => field_lines(fields, style).join("\n"),
        }
    }

    pub fn is_structured(&self) -> bool {
        matches!(self, Rendered::Block(_))
    }
}

/// User messages are always verbatim; bot messages go through
/// [`render_payload`].
pub fn render_content(message: &Message) -> Rendered {
    match message.sender() {
        Sender::User => Rendered::Plain(message.content().to_string()),
        Sender::Bot => render_payload(message.content()),
    }
}

pub fn render_payload(raw: &str) -> Rendered {
    if !raw.starts_with('{') {
        return Rendered::Plain(raw.to_string());
    }

    match parse_mapping(raw) {
        Ok(entries) => Rendered::Block(render_mapping(entries)),
        Err(e) => {
            debug!("Payload looked structured but did not parse: {}", e);
            Rendered::Plain(raw.to_string())
        }
    }
}

pub fn render_mapping(entries: Vec<(String, StructuredValue)>) -> Vec<Field> {
    entries
        .into_iter()
        .map(|(key, value)| Field {
            label: label_for(&key),
            value: render_value(value),
        })
        .collect()
}

fn render_value(value: StructuredValue) -> FieldValue {
    match value {
        StructuredValue::Scalar(scalar) => FieldValue::Inline(scalar.to_string()),
        StructuredValue::Mapping(entries) => FieldValue::Nested(render_mapping(entries)),
        StructuredValue::List(items) => FieldValue::Items(render_items(items)),
    }
}

fn render_items(items: Vec<StructuredValue>) -> Vec<Item> {
    items
        .into_iter()
        .map(|item| match item {
            StructuredValue::Scalar(scalar) => Item::Text(scalar.to_string()),
            StructuredValue::Mapping(entries) => Item::Block(render_mapping(entries)),
            StructuredValue::List(inner) => Item::List(render_items(inner)),
        })
        .collect()
}

/// `duration_minutes` -> `Duration Minutes`.
pub fn label_for(key: &str) -> String {
    let spaced = key.replace('_', " ");
    let mut label = String::with_capacity(spaced.len());
    let mut word_start = true;

    for c in spaced.chars() {
        if word_start {
            label.extend(c.to_uppercase());
        } else {
            label.push(c);
        }
        word_start = c.is_whitespace();
    }

    label
}

fn styled_label(label: &str, style: Style) -> String {
    match style {
        Style::Plain => format!("{}:", label),
        Style::Color => cformat!("<bold>{}:</bold>", label),
    }
}

fn field_lines(fields: &[Field], style: Style) -> Vec<String> {
    let mut lines = Vec::new();

    for field in fields {
        let label = styled_label(&field.label, style);
        match &field.value {
            FieldValue::Inline(text) => {
                let mut rest = text.lines();
                let first = rest.next().unwrap_or("");
                lines.push(format!("{} {}", label, first));
                lines.extend(rest.map(|line| format!("{}{}", INDENT, line)));
            }
            FieldValue::Nested(inner) => {
                lines.push(label);
                lines.extend(indented(field_lines(inner, style)));
            }
            FieldValue::Items(items) => {
                lines.push(label);
                lines.extend(indented(item_lines(items, style)));
            }
        }
    }

    lines
}

fn item_lines(items: &[Item], style: Style) -> Vec<String> {
    let mut lines = Vec::new();

    for item in items {
        let body: Vec<String> = match item {
            Item::Text(text) => text.lines().map(str::to_string).collect(),
            Item::Block(fields) => field_lines(fields, style),
            Item::List(inner) => item_lines(inner, style),
        };

        if body.is_empty() {
            lines.push("-".to_string());
            continue;
        }

        for (i, line) in body.into_iter().enumerate() {
            let marker = if i == 0 { "- " } else { INDENT };
            lines.push(format!("{}{}", marker, line));
        }
    }

    lines
}

fn indented(lines: Vec<String>) -> impl Iterator<Item = String> {
    lines.into_iter().map(|line| format!("{}{}", INDENT, line))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::chat::conversation_state::ConversationState;

    #[test]
    fn plain_payload_is_verbatim() {
        let rendered = render_payload("not json at all");
        assert_eq!(rendered, Rendered::Plain("not json at all".to_string()));
        assert_eq!(rendered.to_text(), "not json at all");
    }

    #[test]
    fn unparsable_structured_payload_is_verbatim() {
        assert_eq!(render_payload("{invalid").to_text(), "{invalid");
        assert_eq!(render_payload("{\"a\": 1} trailing").to_text(), "{\"a\": 1} trailing");
    }

    #[test]
    fn leading_whitespace_is_not_structured() {
        let raw = "  {\"a\": 1}";
        assert!(!render_payload(raw).is_structured());
        assert_eq!(render_payload(raw).to_text(), raw);
    }

    #[test]
    fn flat_mapping_scenario() {
        let rendered = render_payload(r#"{"activity":"hiking","duration_minutes":60}"#);
        assert!(rendered.is_structured());
        assert_eq!(rendered.to_text(), "Activity: hiking\nDuration Minutes: 60");
    }

    #[test]
    fn key_order_follows_payload() {
        let rendered = render_payload(r#"{"zeta":1,"alpha":2,"mid":3}"#);
        assert_eq!(rendered.to_text(), "Zeta: 1\nAlpha: 2\nMid: 3");
    }

    #[test]
    fn every_top_level_key_appears_with_spaces() {
        let raw = r#"{"best_time_to_visit":"Feb","local_food":["laksa"],"tips":{"carry_umbrella":true}}"#;
        let text = render_payload(raw).to_text().to_lowercase();

        for key in ["best_time_to_visit", "local_food", "tips"] {
            assert!(text.contains(&key.replace('_', " ")), "missing {}", key);
        }
    }

    #[test]
    fn nested_values_are_indented() {
        let raw = r#"{
            "itinerary": {"day_one": "Gardens by the Bay", "budget": 120.5},
            "places": ["Chinatown", {"name": "Sentosa", "open": true}, [1, 2]],
            "note": null
        }"#;
        let expected = [
            "Itinerary:",
            "  Day One: Gardens by the Bay",
            "  Budget: 120.5",
            "Places:",
            "  - Chinatown",
            "  - Name: Sentosa",
            "    Open: true",
            "  - - 1",
            "    - 2",
            "Note: null",
        ]
        .join("\n");

        assert_eq!(render_payload(raw).to_text(), expected);
    }

    #[test]
    fn integral_floats_print_like_integers() {
        let rendered = render_payload(r#"{"price":1.0,"big":1e3,"n":-0.0,"half":2.5,"id":42}"#);
        assert_eq!(
            rendered.to_text(),
            "Price: 1\nBig: 1000\nN: 0\nHalf: 2.5\nId: 42"
        );
    }

    #[test]
    fn multi_line_strings_stay_under_their_label() {
        let rendered = render_payload(r#"{"plan":{"tips":"line one\nline two\n"}}"#);
        assert_eq!(
            rendered.to_text(),
            "Plan:\n  Tips: line one\n    line two"
        );
    }

    #[test]
    fn empty_containers_render_as_empty_blocks() {
        assert_eq!(render_payload("{}").to_text(), "");
        assert_eq!(
            render_payload(r#"{"list":[],"map":{}}"#).to_text(),
            "List:\nMap:"
        );
    }

    #[test]
    fn labels_capitalize_each_word() {
        assert_eq!(label_for("duration_minutes"), "Duration Minutes");
        assert_eq!(label_for("already Fine"), "Already Fine");
        assert_eq!(label_for("__x"), "  X");
        assert_eq!(label_for(""), "");
    }

    #[test]
    fn user_messages_are_never_parsed() {
        let mut state = ConversationState::new();
        let message = state.add_user_message(r#"{"a":1}"#);
        assert_eq!(render_content(message), Rendered::Plain(r#"{"a":1}"#.to_string()));
    }

    #[test]
    fn bot_messages_are_parsed() {
        let mut state = ConversationState::new();
        let message = state.add_bot_message(r#"{"a":1}"#);
        assert!(render_content(message).is_structured());
    }

    #[test]
    fn colored_output_keeps_labels_and_values() {
        let text = render_payload(r#"{"activity":"hiking"}"#).format(Style::Color);
        assert!(text.contains("Activity:"));
        assert!(text.contains("hiking"));
    }
}
