//! # relay-core
//!
//! Wire envelope model shared by the gateway crates: parsing with a generic
//! fallback for unknown message names, typed variants for the messages the
//! gateway reacts to, null-safe body accessors, and session/connection ids.

pub mod envelope;
pub mod error;
pub mod ids;
pub mod message;
pub mod responder;

pub use envelope::Envelope;
pub use error::ParseError;
pub use ids::{ConnectionId, SessionId};
pub use responder::Responder;
pub use message::{
    names, Attachment, ConversationInput, ConversationOutput, ConversationRequest,
    ConversationRequestBody, ConversationResponse, ConversationResponseBody, ConversationResult,
    Message, OptionalArgs, PersonaResponse, RecognizeResults, StateUpdate,
};
