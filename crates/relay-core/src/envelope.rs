//! The generic wire envelope and null-safe accessors over its body.
//!
//! Every accessor walks the body with `Option` chaining and returns `None`
//! (or an empty collection) as soon as any intermediate key is missing or has
//! an unexpected type. The avatar engine adds fields over time, so absent
//! substructures are normal input, not errors.

use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::ParseError;

/// A wire message: `{"category", "kind", "name", "body", ...}`.
///
/// Unknown top-level fields are kept verbatim in `extra` and written back on
/// serialization.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Envelope {
    pub category: String,
    pub kind: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Envelope {
    pub fn new(
        category: impl Into<String>,
        kind: impl Into<String>,
        name: impl Into<String>,
        body: Option<Value>,
    ) -> Self {
        Self {
            category: category.into(),
            kind: kind.into(),
            name: name.into(),
            body,
            extra: Map::new(),
        }
    }

    /// Parse raw text into an envelope without looking at the variant.
    pub fn parse(raw: &str) -> Result<Self, ParseError> {
        let value: Value = serde_json::from_str(raw)?;
        Self::from_value(value)
    }

    pub fn from_value(value: Value) -> Result<Self, ParseError> {
        let mut map = match value {
            Value::Object(map) => map,
            other => return Err(ParseError::NotAnObject(json_type_name(&other))),
        };

        let category = take_tag(&mut map, "category")?;
        let kind = take_tag(&mut map, "kind")?;
        let name = take_tag(&mut map, "name")?;
        let body = map.remove("body").filter(|b| !b.is_null());

        Ok(Self {
            category,
            kind,
            name,
            body,
            extra: map,
        })
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Optional top-level `timestamp` (added by some recorders, not the engine).
    pub fn timestamp(&self) -> Option<&str> {
        self.extra.get("timestamp").and_then(Value::as_str)
    }

    /// Walk `body.<path...>`; `None` if any step is missing.
    pub fn body_path(&self, path: &[&str]) -> Option<&Value> {
        path.iter()
            .try_fold(self.body.as_ref()?, |node, key| node.get(*key))
    }

    fn body_str(&self, path: &[&str]) -> Option<&str> {
        self.body_path(path).and_then(Value::as_str)
    }

    fn body_bool(&self, path: &[&str]) -> Option<bool> {
        self.body_path(path).and_then(Value::as_bool)
    }

    fn body_array(&self, path: &[&str]) -> &[Value] {
        self.body_path(path)
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Persona entries under `body.persona` (keyed by persona id).
    fn personas(&self) -> impl Iterator<Item = &Value> + '_ {
        self.body_path(&["persona"])
            .and_then(Value::as_object)
            .into_iter()
            .flat_map(|m| m.values())
    }

    /// First persona's first user's `conversation` object.
    fn first_conversation(&self) -> Option<&Value> {
        self.personas().find_map(|persona| {
            persona
                .get("users")
                .and_then(Value::as_array)
                .and_then(|users| users.first())
                .and_then(|user| user.get("conversation"))
        })
    }

    // --- conversation ---

    /// `body.input.text`.
    pub fn input_text(&self) -> Option<&str> {
        self.body_str(&["input", "text"])
    }

    /// `body.output.text`.
    pub fn output_text(&self) -> Option<&str> {
        self.body_str(&["output", "text"])
    }

    /// `body.optionalArgs.kind`.
    pub fn optional_args_kind(&self) -> Option<&str> {
        self.body_str(&["optionalArgs", "kind"])
    }

    pub fn is_init_request(&self) -> bool {
        self.optional_args_kind() == Some("init")
    }

    // --- speech recognition ---

    /// Transcript of the first finalized result, choosing the alternative
    /// with the highest confidence (missing confidence counts as 0, ties keep
    /// the earliest alternative). `None` when no result is final or the
    /// final result has no alternatives.
    pub fn user_text(&self) -> Option<&str> {
        let result = self
            .body_array(&["results"])
            .iter()
            .find(|r| r.get("final").and_then(Value::as_bool) == Some(true))?;
        let alternatives = result.get("alternatives").and_then(Value::as_array)?;

        let confidence = |alt: &Value| alt.get("confidence").and_then(Value::as_f64).unwrap_or(0.0);
        let best = alternatives.iter().reduce(|best, alt| {
            if confidence(alt) > confidence(best) {
                alt
            } else {
                best
            }
        })?;
        best.get("transcript").and_then(Value::as_str)
    }

    fn first_alternative(&self) -> Option<&Value> {
        self.body_array(&["results"])
            .first()
            .and_then(|r| r.get("alternatives"))
            .and_then(Value::as_array)
            .and_then(|alts| alts.first())
    }

    /// First alternative of the first result, final or not.
    pub fn recognition_transcript(&self) -> Option<&str> {
        self.first_alternative()
            .and_then(|a| a.get("transcript"))
            .and_then(Value::as_str)
    }

    pub fn recognition_confidence(&self) -> Option<f64> {
        self.first_alternative()
            .and_then(|a| a.get("confidence"))
            .and_then(Value::as_f64)
    }

    pub fn is_final_recognition(&self) -> bool {
        self.body_array(&["results"])
            .first()
            .and_then(|r| r.get("final"))
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    /// `body.recognizing`.
    pub fn recognizing(&self) -> Option<bool> {
        self.body_bool(&["recognizing"])
    }

    // --- session / state ---

    /// `body.session.sessionId`.
    pub fn session_id(&self) -> Option<&str> {
        self.body_str(&["session", "sessionId"])
    }

    /// `body.session.state`.
    pub fn session_state(&self) -> Option<&str> {
        self.body_str(&["session", "state"])
    }

    /// First persona reporting a `speechState`.
    pub fn speech_state(&self) -> Option<&str> {
        self.personas()
            .find_map(|p| p.get("speechState"))
            .and_then(Value::as_str)
    }

    /// First persona reporting `cameraAnimating`.
    pub fn camera_state(&self) -> Option<&Value> {
        self.personas().find_map(|p| p.get("cameraAnimating"))
    }

    /// Whose turn it is, from the first persona with users.
    pub fn conversation_turn(&self) -> Option<&str> {
        self.first_conversation()
            .and_then(|c| c.get("turn"))
            .and_then(Value::as_str)
    }

    pub fn conversation_context(&self) -> Option<&Map<String, Value>> {
        self.first_conversation()
            .and_then(|c| c.get("context"))
            .and_then(Value::as_object)
    }

    /// `Turn_Id` from the conversation context.
    pub fn turn_id(&self) -> Option<&str> {
        self.conversation_context()
            .and_then(|c| c.get("Turn_Id"))
            .and_then(Value::as_str)
    }

    // --- persona response / provider ---

    pub fn persona_id(&self) -> Option<&str> {
        self.body_str(&["personaId"])
    }

    pub fn provider_kind(&self) -> Option<&str> {
        self.body_str(&["provider", "kind"])
    }

    pub fn end_conversation(&self) -> Option<bool> {
        self.body_bool(&["provider", "meta", "endConversation"])
    }

    /// `body.provider.trace`, empty when absent.
    pub fn traces(&self) -> &[Value] {
        self.body_array(&["provider", "trace"])
    }

    /// Sum of `latency_ms` over provider trace entries, integer or
    /// fractional; entries without a numeric latency count as 0.
    pub fn total_latency_ms(&self) -> f64 {
        self.traces()
            .iter()
            .filter_map(|t| t.get("latency_ms").and_then(Value::as_f64))
            .sum()
    }

    pub fn current_speech(&self) -> Option<&str> {
        self.body_str(&["currentSpeech"])
    }

    pub fn data_collector(&self) -> Option<&str> {
        self.body_str(&["dataCollector"])
    }

    pub fn user_input(&self) -> Option<&str> {
        self.body_str(&["userInput"])
    }

    pub fn speech_markers(&self) -> &[Value] {
        self.body_array(&["speechMarkers"])
    }

    // --- scene ---

    pub fn scene_id(&self) -> Option<&str> {
        self.body_str(&["scene", "sceneId"])
    }

    pub fn feature_flags(&self) -> Vec<&str> {
        self.body_array(&["scene", "featureFlags"])
            .iter()
            .filter_map(Value::as_str)
            .collect()
    }
}

fn take_tag(map: &mut Map<String, Value>, field: &'static str) -> Result<String, ParseError> {
    match map.remove(field) {
        Some(Value::String(s)) if !s.is_empty() => Ok(s),
        _ => Err(ParseError::MissingField(field)),
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
