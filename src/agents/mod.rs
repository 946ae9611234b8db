//! The two cooperating HTTP agents.
//!
//! The responder answers route queries through the ASI1 gateway; the
//! requester bridges local callers to the responder over the envelope
//! transport and waits for the asynchronous reply.

pub mod requester;
pub mod responder;
