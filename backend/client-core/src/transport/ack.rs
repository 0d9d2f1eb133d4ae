use crate::error::transport::TransportError;

use common::ErrorLocation;

use std::fmt::{Debug, Formatter, Result as FormatResult};
use std::panic::Location;
use std::time::Duration;

use serde_json::Value;
use tokio::sync::oneshot;

/// Reply handle for an inbound event that requested acknowledgement.
///
/// Consumed on use, so at most one ACK is ever written per event.
pub struct Acknowledger {
    respond: Box<dyn FnOnce(Vec<Value>) + Send>,
}

impl Acknowledger {
    pub fn new(respond: impl FnOnce(Vec<Value>) + Send + 'static) -> Self {
        Self {
            respond: Box::new(respond),
        }
    }

    pub fn send(self, args: Vec<Value>) {
        (self.respond)(args)
    }
}

impl Debug for Acknowledger {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> FormatResult {
        formatter.write_str("Acknowledger")
    }
}

/// Pending response to an outbound request.
///
/// Resolves with the argument array of the server's ACK. Fails with
/// [`TransportError::AckDropped`] when the request never reached the wire.
#[derive(Debug)]
pub struct AckFuture {
    event: String,
    receiver: oneshot::Receiver<Vec<Value>>,
}

impl AckFuture {
    pub fn new(event: impl Into<String>, receiver: oneshot::Receiver<Vec<Value>>) -> Self {
        Self {
            event: event.into(),
            receiver,
        }
    }

    /// Wait for the acknowledgement with no deadline.
    pub async fn response(self) -> Result<Vec<Value>, TransportError> {
        let event = self.event;
        self.receiver
            .await
            .map_err(|_| TransportError::AckDropped {
                message: format!("Request '{event}' was dropped before it was acknowledged"),
                location: ErrorLocation::from(Location::caller()),
            })
    }

    pub async fn response_within(self, timeout: Duration) -> Result<Vec<Value>, TransportError> {
        let event = self.event.clone();
        match tokio::time::timeout(timeout, self.response()).await {
            Ok(result) => result,
            Err(_) => Err(TransportError::AckTimeout {
                message: format!("Request '{event}' not acknowledged within {timeout:?}"),
                location: ErrorLocation::from(Location::caller()),
            }),
        }
    }
}
