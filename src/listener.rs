//! Message-listener contract for the embedding runtime.
//!
//! This crate defines the two-callback shape a runtime message listener is
//! expected to have; it implements no dispatcher and no message environment.
//! A driver wires a concrete listener up to whatever transport it uses and
//! looks passes up by their [`crate::skew::EVENT_HANDLER_ID`]-style handler
//! identifiers.

/// A one-shot reply channel for a request/response message exchange. The
/// embedding runtime supplies the concrete implementation (e.g. a channel
/// sender); this crate only names the shape.
pub trait OneShotReply<T> {
    fn reply(self: Box<Self>, response: T);
}

/// A listener for messages of type `T`, registered under a unique
/// message-type id within a message environment owned by the embedding
/// runtime.
pub trait MessageListener<T> {
    /// Fire-and-forget delivery.
    fn on_send(&self, msg: T);

    /// Request/response delivery; `ctx` offers a one-shot reply channel back
    /// to the sender.
    fn on_request(&self, msg: T, ctx: Box<dyn OneShotReply<T>>);
}
