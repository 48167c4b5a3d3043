//! Typed envelope variants, selected by the `name` discriminant.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::envelope::Envelope;
use crate::error::ParseError;

/// Discriminant values understood by the gateway.
pub mod names {
    pub const CONVERSATION_REQUEST: &str = "conversationRequest";
    pub const CONVERSATION_RESULT: &str = "conversationResult";
    pub const CONVERSATION_RESPONSE: &str = "conversationResponse";
    pub const PERSONA_RESPONSE: &str = "personaResponse";
    pub const RECOGNIZE_RESULTS: &str = "recognizeResults";
    pub const STATE: &str = "state";
}

/// A parsed wire message.
///
/// Unknown names land in [`Message::Generic`] with the envelope untouched.
#[derive(Clone, Debug, PartialEq)]
pub enum Message {
    ConversationRequest(ConversationRequest),
    ConversationResult(ConversationResult),
    ConversationResponse(ConversationResponse),
    PersonaResponse(PersonaResponse),
    RecognizeResults(RecognizeResults),
    State(StateUpdate),
    Generic(Envelope),
}

impl Message {
    /// Parse raw wire text. Malformed JSON, non-objects, a missing base tag,
    /// or a known variant missing its required body fields are errors;
    /// an unknown `name` is not.
    pub fn parse(raw: &str) -> Result<Self, ParseError> {
        Self::from_envelope(Envelope::parse(raw)?)
    }

    pub fn from_envelope(envelope: Envelope) -> Result<Self, ParseError> {
        let message = match envelope.name.as_str() {
            names::CONVERSATION_REQUEST => {
                Self::ConversationRequest(ConversationRequest::try_from(envelope)?)
            }
            names::CONVERSATION_RESPONSE => {
                Self::ConversationResponse(ConversationResponse::try_from(envelope)?)
            }
            names::CONVERSATION_RESULT => Self::ConversationResult(ConversationResult(envelope)),
            names::PERSONA_RESPONSE => Self::PersonaResponse(PersonaResponse(envelope)),
            names::RECOGNIZE_RESULTS => Self::RecognizeResults(RecognizeResults(envelope)),
            names::STATE => Self::State(StateUpdate(envelope)),
            _ => Self::Generic(envelope),
        };
        Ok(message)
    }

    pub fn envelope(&self) -> &Envelope {
        match self {
            Self::ConversationRequest(m) => &m.envelope,
            Self::ConversationResponse(m) => &m.envelope,
            Self::ConversationResult(m) => &m.0,
            Self::PersonaResponse(m) => &m.0,
            Self::RecognizeResults(m) => &m.0,
            Self::State(m) => &m.0,
            Self::Generic(e) => e,
        }
    }

    pub fn name(&self) -> &str {
        &self.envelope().name
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        self.envelope().to_json()
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let env = self.envelope();
        let opt = |v: Option<&str>| v.unwrap_or("").to_owned();
        write!(f, "Message(name={}", env.name)?;
        match self {
            Self::ConversationRequest(m) => write!(f, " input='{}'", m.text())?,
            Self::ConversationResponse(m) => write!(f, " output='{}'", m.body().output.text)?,
            Self::ConversationResult(_) => write!(
                f,
                " input='{}' output='{}'",
                opt(env.input_text()),
                opt(env.output_text())
            )?,
            Self::PersonaResponse(_) => write!(f, " speech='{}'", opt(env.current_speech()))?,
            Self::RecognizeResults(_) => {
                write!(f, " transcript='{}'", opt(env.recognition_transcript()))?
            }
            Self::State(_) => {
                if let Some(state) = env.session_state() {
                    write!(f, " session={state}")?;
                }
                if let Some(speech) = env.speech_state() {
                    write!(f, " speech={speech}")?;
                }
                if let Some(turn) = env.conversation_turn() {
                    write!(f, " turn={turn}")?;
                }
            }
            Self::Generic(_) => {}
        }
        f.write_str(")")
    }
}

// --- conversationRequest ---

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConversationInput {
    pub text: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConversationOutput {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<Map<String, Value>>,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct OptionalArgs {
    #[serde(default)]
    pub kind: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationRequestBody {
    pub input: ConversationInput,
    #[serde(default)]
    pub optional_args: Option<OptionalArgs>,
    #[serde(default)]
    pub context: Option<Map<String, Value>>,
}

/// The engine asking us what the persona should say.
#[derive(Clone, Debug, PartialEq)]
pub struct ConversationRequest {
    envelope: Envelope,
    body: ConversationRequestBody,
}

impl ConversationRequest {
    pub fn envelope(&self) -> &Envelope {
        &self.envelope
    }

    pub fn body(&self) -> &ConversationRequestBody {
        &self.body
    }

    pub fn text(&self) -> &str {
        &self.body.input.text
    }

    /// `optionalArgs.kind == "init"`: the greeting request sent when a
    /// session opens.
    pub fn is_init(&self) -> bool {
        self.body
            .optional_args
            .as_ref()
            .and_then(|args| args.kind.as_deref())
            == Some("init")
    }
}

impl TryFrom<Envelope> for ConversationRequest {
    type Error = ParseError;

    fn try_from(envelope: Envelope) -> Result<Self, Self::Error> {
        let body = typed_body(&envelope)?;
        Ok(Self { envelope, body })
    }
}

// --- conversationResponse ---

/// A content card attached to a response under `variables`.
#[derive(Clone, Debug, PartialEq)]
pub struct Attachment {
    pub component: String,
    pub alt: String,
    pub url: String,
}

impl Attachment {
    pub fn image(alt: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            component: "image".into(),
            alt: alt.into(),
            url: url.into(),
        }
    }

    pub fn to_value(&self) -> Value {
        json!({
            "component": self.component,
            "data": { "alt": self.alt, "url": self.url },
        })
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConversationResponseBody {
    pub input: ConversationInput,
    pub output: ConversationOutput,
    #[serde(default)]
    pub variables: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback: Option<bool>,
}

impl ConversationResponseBody {
    pub fn new(input: impl Into<String>, output: impl Into<String>) -> Self {
        Self {
            input: ConversationInput { text: input.into() },
            output: ConversationOutput {
                text: output.into(),
                context: None,
            },
            variables: Map::new(),
            fallback: None,
        }
    }

    pub fn attach(&mut self, key: impl Into<String>, attachment: &Attachment) {
        self.variables.insert(key.into(), attachment.to_value());
    }

    pub fn to_value(&self) -> Result<Value, serde_json::Error> {
        serde_json::to_value(self)
    }
}

/// Our reply to a request or a matched result.
#[derive(Clone, Debug, PartialEq)]
pub struct ConversationResponse {
    envelope: Envelope,
    body: ConversationResponseBody,
}

impl ConversationResponse {
    pub const CATEGORY: &'static str = "scene";
    pub const KIND: &'static str = "request";

    pub fn new(body: ConversationResponseBody) -> Result<Self, serde_json::Error> {
        let envelope = Envelope::new(
            Self::CATEGORY,
            Self::KIND,
            names::CONVERSATION_RESPONSE,
            Some(body.to_value()?),
        );
        Ok(Self { envelope, body })
    }

    pub fn envelope(&self) -> &Envelope {
        &self.envelope
    }

    pub fn body(&self) -> &ConversationResponseBody {
        &self.body
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        self.envelope.to_json()
    }
}

impl TryFrom<Envelope> for ConversationResponse {
    type Error = ParseError;

    fn try_from(envelope: Envelope) -> Result<Self, Self::Error> {
        let body = typed_body(&envelope)?;
        Ok(Self { envelope, body })
    }
}

// --- loosely typed variants ---

macro_rules! envelope_variant {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Clone, Debug, PartialEq)]
        pub struct $name(pub Envelope);

        impl $name {
            pub fn envelope(&self) -> &Envelope {
                &self.0
            }
        }
    };
}

envelope_variant!(
    /// What the engine heard and what the persona answered.
    ConversationResult
);
envelope_variant!(
    /// Speech the persona is about to deliver.
    PersonaResponse
);
envelope_variant!(
    /// Speech-to-text results for the user's utterance.
    RecognizeResults
);
envelope_variant!(
    /// Session/persona state snapshot.
    StateUpdate
);

impl ConversationResult {
    pub fn input_text(&self) -> Option<&str> {
        self.0.input_text()
    }
}

fn typed_body<T: serde::de::DeserializeOwned>(envelope: &Envelope) -> Result<T, ParseError> {
    let invalid = |reason: String| ParseError::InvalidBody {
        name: envelope.name.clone(),
        reason,
    };
    let body = envelope
        .body
        .clone()
        .ok_or_else(|| invalid("missing body".into()))?;
    serde_json::from_value(body).map_err(|e| invalid(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn semantic(raw: &str) -> Value {
        serde_json::from_str(raw).unwrap()
    }

    fn assert_round_trip(raw: &str) {
        let msg = Message::parse(raw).unwrap();
        let again = Message::parse(&msg.to_json().unwrap()).unwrap();
        assert_eq!(msg, again);
        assert_eq!(semantic(&msg.to_json().unwrap()), semantic(raw));
    }

    #[test]
    fn conversation_request_is_typed() {
        let msg = Message::parse(
            r#"{"category":"scene","kind":"event","name":"conversationRequest",
                "body":{"input":{"text":"hello"},"optionalArgs":{"kind":"init"},"context":{"a":1}}}"#,
        )
        .unwrap();
        let Message::ConversationRequest(req) = msg else {
            panic!("expected conversationRequest");
        };
        assert_eq!(req.text(), "hello");
        assert!(req.is_init());
        assert_eq!(req.body().context.as_ref().unwrap()["a"], 1);
    }

    #[test]
    fn conversation_request_without_input_text_is_rejected() {
        let err = Message::parse(
            r#"{"category":"scene","kind":"event","name":"conversationRequest","body":{"input":{}}}"#,
        )
        .unwrap_err();
        assert!(matches!(err, ParseError::InvalidBody { ref name, .. } if name == "conversationRequest"));

        let err = Message::parse(
            r#"{"category":"scene","kind":"event","name":"conversationRequest"}"#,
        )
        .unwrap_err();
        assert_eq!(err.error_kind(), "invalid_body");
    }

    #[test]
    fn unknown_name_is_generic() {
        let raw = r#"{"category":"scene","kind":"event","name":"somethingNew","body":{"x":[1,2]},"extra":true}"#;
        let msg = Message::parse(raw).unwrap();
        assert!(matches!(msg, Message::Generic(_)));
        assert_eq!(msg.name(), "somethingNew");
        assert_eq!(msg.envelope().extra["extra"], true);
    }

    #[test]
    fn each_name_selects_its_variant() {
        let make = |name: &str| {
            Message::parse(&format!(
                r#"{{"category":"scene","kind":"event","name":"{name}","body":{{}}}}"#
            ))
            .unwrap()
        };
        assert!(matches!(make("conversationResult"), Message::ConversationResult(_)));
        assert!(matches!(make("personaResponse"), Message::PersonaResponse(_)));
        assert!(matches!(make("recognizeResults"), Message::RecognizeResults(_)));
        assert!(matches!(make("state"), Message::State(_)));
    }

    #[test]
    fn round_trip_every_variant() {
        assert_round_trip(
            r#"{"category":"scene","kind":"event","name":"conversationRequest","body":{"input":{"text":"hi"},"optionalArgs":{"kind":"init","extra":1}}}"#,
        );
        assert_round_trip(
            r#"{"category":"scene","kind":"event","name":"conversationResult","body":{"input":{"text":"Hi there"},"output":{"text":"ok"},"provider":{"trace":[{"latency_ms":12.5}]}}}"#,
        );
        assert_round_trip(
            r#"{"category":"scene","kind":"request","name":"conversationResponse","body":{"input":{"text":"a"},"output":{"text":"b"},"variables":{},"fallback":true}}"#,
        );
        assert_round_trip(
            r#"{"category":"scene","kind":"event","name":"personaResponse","body":{"currentSpeech":"Hi","dataCollector":"abc"}}"#,
        );
        assert_round_trip(
            r#"{"category":"scene","kind":"event","name":"recognizeResults","body":{"results":[{"alternatives":[{"confidence":0.79,"transcript":"Hello?"}],"final":true}],"status":0}}"#,
        );
        assert_round_trip(r#"{"category":"scene","kind":"event","name":"state","body":{"session":{"state":"idle"}}}"#);
        assert_round_trip(r#"{"category":"x","kind":"y","name":"z","body":"opaque","v":2}"#);
    }

    #[test]
    fn response_wire_shape() {
        let mut body = ConversationResponseBody::new("cat", "Here is a cat @showcards(cat)");
        body.attach("public-cat", &Attachment::image("A cute kitten", "https://i.imgur.com/s7Erio7.jpeg"));
        let json = ConversationResponse::new(body).unwrap().to_json().unwrap();
        assert_eq!(
            semantic(&json),
            json!({
                "category": "scene",
                "kind": "request",
                "name": "conversationResponse",
                "body": {
                    "input": {"text": "cat"},
                    "output": {"text": "Here is a cat @showcards(cat)"},
                    "variables": {
                        "public-cat": {
                            "component": "image",
                            "data": {"alt": "A cute kitten", "url": "https://i.imgur.com/s7Erio7.jpeg"}
                        }
                    }
                }
            })
        );
    }

    #[test]
    fn fallback_only_serialized_when_set() {
        let mut body = ConversationResponseBody::new("why", "I do not know how to answer that");
        assert!(body.to_value().unwrap().get("fallback").is_none());
        body.fallback = Some(true);
        assert_eq!(body.to_value().unwrap()["fallback"], true);
    }

    #[test]
    fn response_body_survives_parse_and_reserialize() {
        let mut body = ConversationResponseBody::new("hi", "Echo: hi");
        let mut context = Map::new();
        context.insert("turn".into(), json!(3));
        body.output.context = Some(context);
        body.attach("q1", &Attachment::image("Question q1", "https://cards.test/q1.png"));

        let json = ConversationResponse::new(body.clone()).unwrap().to_json().unwrap();
        assert_eq!(semantic(&json)["body"]["output"]["context"], json!({"turn": 3}));
        match Message::parse(&json).unwrap() {
            Message::ConversationResponse(parsed) => assert_eq!(parsed.body(), &body),
            other => panic!("unexpected variant: {other}"),
        }
    }

    #[test]
    fn display_summaries() {
        let msg = Message::parse(
            r#"{"category":"scene","kind":"event","name":"conversationResult","body":{"input":{"text":"a"},"output":{"text":"b"}}}"#,
        )
        .unwrap();
        assert_eq!(msg.to_string(), "Message(name=conversationResult input='a' output='b')");

        let state = Message::parse(
            r#"{"category":"scene","kind":"event","name":"state","body":{"session":{"state":"idle"}}}"#,
        )
        .unwrap();
        assert_eq!(state.to_string(), "Message(name=state session=idle)");
    }
}
