//! Conversation rule engine: one dispatch on message name, two reactions.
//!
//! - `conversationRequest` → scripted reply (always exactly one response)
//! - `conversationResult`  → question card when the input matches the catalog
//!
//! Everything else is acknowledged with a debug log only.

use std::sync::Arc;

use relay_core::{
    Attachment, ConversationRequest, ConversationResponse, ConversationResponseBody,
    ConversationResult, Message, Responder,
};
use relay_settings::RulesSettings;
use tracing::{debug, info, warn};

use crate::catalog::ReferenceCatalog;
use crate::matcher::{self, DEFAULT_THRESHOLD};

const GREETING: &str = "Hello there!";
const FALLBACK: &str = "I do not know how to answer that";
const CAT_REPLY: &str = "Here is a cat @showcards(cat)";
const CAT_VARIABLE: &str = "public-cat";
const CAT_ALT: &str = "A cute kitten";
const CAT_URL: &str = "https://i.imgur.com/s7Erio7.jpeg";

/// Tunables for the matching reaction.
#[derive(Clone, Debug, PartialEq)]
pub struct RuleConfig {
    pub match_threshold: f64,
    pub card_base_url: String,
}

impl Default for RuleConfig {
    fn default() -> Self {
        let settings = RulesSettings::default();
        Self {
            match_threshold: DEFAULT_THRESHOLD,
            card_base_url: settings.card_base_url,
        }
    }
}

impl From<&RulesSettings> for RuleConfig {
    fn from(settings: &RulesSettings) -> Self {
        Self {
            match_threshold: settings.match_threshold,
            card_base_url: settings.card_base_url.clone(),
        }
    }
}

/// Stateless responder shared by every session.
#[derive(Clone, Debug)]
pub struct RuleEngine {
    catalog: Arc<ReferenceCatalog>,
    config: RuleConfig,
}

impl RuleEngine {
    pub fn new(catalog: Arc<ReferenceCatalog>, config: RuleConfig) -> Self {
        Self { catalog, config }
    }

    pub fn from_settings(settings: &RulesSettings) -> Self {
        let catalog = ReferenceCatalog::from_settings(settings.catalog.as_deref());
        Self::new(Arc::new(catalog), RuleConfig::from(settings))
    }

    pub fn catalog(&self) -> &ReferenceCatalog {
        &self.catalog
    }

    /// React to one parsed message.
    pub fn respond(&self, message: &Message) -> Option<ConversationResponse> {
        match message {
            Message::ConversationRequest(request) => self.reply_to_request(request),
            Message::ConversationResult(result) => self.reply_to_result(result),
            other => {
                debug!(name = other.name(), "no rule for message");
                None
            }
        }
    }

    /// Parse, react and serialize. Unparsable input is logged and dropped.
    pub fn handle_raw(&self, raw: &str) -> Option<String> {
        let message = match Message::parse(raw) {
            Ok(message) => message,
            Err(e) => {
                warn!(kind = e.error_kind(), error = %e, "dropping unparsable message");
                return None;
            }
        };
        debug!(%message, "received");

        let response = self.respond(&message)?;
        match response.to_json() {
            Ok(json) => Some(json),
            Err(e) => {
                warn!(error = %e, "failed to serialize response");
                None
            }
        }
    }

    fn reply_to_request(&self, request: &ConversationRequest) -> Option<ConversationResponse> {
        let text = request.text();
        let mut body = ConversationResponseBody::new(text, format!("Echo: {text}"));
        let lowered = text.to_lowercase();

        if request.is_init() {
            body.output.text = GREETING.into();
        } else if lowered.starts_with("why") {
            body.output.text = FALLBACK.into();
            body.fallback = Some(true);
        } else if lowered == "cat" {
            body.output.text = CAT_REPLY.into();
            body.attach(CAT_VARIABLE, &Attachment::image(CAT_ALT, CAT_URL));
        }

        info!(input = text, output = %body.output.text, "conversation reply");
        build_response(body)
    }

    fn reply_to_result(&self, result: &ConversationResult) -> Option<ConversationResponse> {
        let Some(text) = result.input_text() else {
            debug!("conversationResult without input text");
            return None;
        };

        let Some(found) = matcher::best_match(text, &self.catalog, self.config.match_threshold)
        else {
            debug!(input = text, "no reference phrase matched");
            return None;
        };
        info!(
            question_id = found.question_id,
            score = found.score,
            "matched reference phrase"
        );

        let mut body = ConversationResponseBody::new(text, "");
        body.attach(found.question_id, &self.question_card(found.question_id));
        build_response(body)
    }

    fn question_card(&self, question_id: &str) -> Attachment {
        let base = self.config.card_base_url.trim_end_matches('/');
        Attachment::image(
            format!("Question {question_id}"),
            format!("{base}/{question_id}.png"),
        )
    }
}

fn build_response(body: ConversationResponseBody) -> Option<ConversationResponse> {
    match ConversationResponse::new(body) {
        Ok(response) => Some(response),
        Err(e) => {
            warn!(error = %e, "failed to encode response body");
            None
        }
    }
}

impl Responder for RuleEngine {
    fn respond_raw(&self, raw: &str) -> Option<String> {
        self.handle_raw(raw)
    }
}
