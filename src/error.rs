//! Error types raised inside bus subscriptions.
//!
//! The bus is infallible from the producer side (`post` never fails); faults
//! happen inside subscriber pipelines. [`HandlerError`] describes one such
//! fault and [`Stage`] names where in the pipeline it was raised.
//!
//! Both types provide helper methods (`as_label`, `as_message`) for logging.

use std::any::Any;
use std::fmt;

use thiserror::Error;

/// Pipeline stage in which a subscriber fault was raised.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// A `map`/`filter`/`compose`d transform.
    Transform,
    /// The terminal value handler.
    OnNext,
    /// The staged error callback itself.
    OnError,
    /// The completion callback.
    OnComplete,
}

impl Stage {
    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            Stage::Transform => "transform",
            Stage::OnNext => "on_next",
            Stage::OnError => "on_error",
            Stage::OnComplete => "on_complete",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_label())
    }
}

/// # Faults raised inside a subscription.
///
/// These never propagate to `post` callers: they are caught at the
/// subscription boundary, routed to the subscription's error callback
/// (or the default log reporter when none was staged), and terminate
/// that one subscription. Other subscriptions, including others owned
/// by the same owner, keep running.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum HandlerError {
    /// A transform or handler panicked while processing an event.
    #[error("handler panicked in {stage}: {message}")]
    Panic {
        /// Pipeline stage that panicked.
        stage: Stage,
        /// Extracted panic payload (best effort).
        message: String,
    },
}

impl HandlerError {
    /// Returns a short stable label (snake_case) for use in logs.
    ///
    /// # Example
    /// ```
    /// use typebus::{HandlerError, Stage};
    ///
    /// let err = HandlerError::Panic { stage: Stage::OnNext, message: "boom".into() };
    /// assert_eq!(err.as_label(), "handler_panic");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            HandlerError::Panic { .. } => "handler_panic",
        }
    }

    /// Returns a human-readable message with details about the error.
    ///
    /// # Example
    /// ```
    /// use typebus::{HandlerError, Stage};
    ///
    /// let err = HandlerError::Panic { stage: Stage::Transform, message: "boom".into() };
    /// assert_eq!(err.as_message(), "panic in transform: boom");
    /// ```
    pub fn as_message(&self) -> String {
        match self {
            HandlerError::Panic { stage, message } => format!("panic in {stage}: {message}"),
        }
    }

    /// The stage the fault was raised in.
    pub fn stage(&self) -> Stage {
        match self {
            HandlerError::Panic { stage, .. } => *stage,
        }
    }

    /// Builds a [`HandlerError::Panic`] from a caught unwind payload,
    /// extracting the message when the payload is a `&str` or `String`.
    pub(crate) fn from_panic(stage: Stage, payload: &(dyn Any + Send)) -> Self {
        let message = if let Some(msg) = payload.downcast_ref::<&'static str>() {
            (*msg).to_string()
        } else if let Some(msg) = payload.downcast_ref::<String>() {
            msg.clone()
        } else {
            "unknown panic".to_string()
        };
        HandlerError::Panic { stage, message }
    }
}
