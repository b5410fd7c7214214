//! Connection handler that runs one request/reply exchange.
//!
//! The handler reads the whole request (the client half-closes to mark its
//! end), dispatches it against the shared registry, writes the encoded reply
//! and shuts the connection down. Transport and protocol problems only abort
//! the current exchange.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use btrmount_protocol::{MAX_MESSAGE_BYTES, Request};

use crate::transport::{
    ConnectionHandler, ConnectionStream, HandlerFault, MessageRead, read_message, write_message,
};

use super::registry_manager::RegistryManager;
use super::router::{CommandDispatcher, DISPATCH_TARGET};

/// Connection handler that decodes and dispatches one request per connection.
pub(crate) struct DispatchConnectionHandler {
    dispatcher: Arc<CommandDispatcher>,
    registry: RegistryManager,
    exchange_timeout: Duration,
}

impl DispatchConnectionHandler {
    pub(crate) fn new(
        dispatcher: Arc<CommandDispatcher>,
        registry: RegistryManager,
        exchange_timeout: Duration,
    ) -> Self {
        Self {
            dispatcher,
            registry,
            exchange_timeout,
        }
    }

    fn exchange(&self, mut stream: ConnectionStream) -> Result<(), HandlerFault> {
        if let Err(error) = stream.set_timeouts(Some(self.exchange_timeout)) {
            warn!(target: DISPATCH_TARGET, %error, "failed to apply exchange timeout");
        }

        let bytes = match read_message(&mut stream, MAX_MESSAGE_BYTES) {
            Ok(MessageRead::Complete(bytes)) => bytes,
            Ok(MessageRead::Oversized { received }) => {
                warn!(
                    target: DISPATCH_TARGET,
                    received,
                    limit = MAX_MESSAGE_BYTES,
                    "message larger than 100K arrived; discarding"
                );
                close(&stream);
                return Ok(());
            }
            Err(error) => {
                warn!(target: DISPATCH_TARGET, %error, "failed to read request");
                return Ok(());
            }
        };

        let text = String::from_utf8_lossy(&bytes);
        let decoded = Request::decode(&text);
        if decoded.had_unintelligible_lines() {
            warn!(
                target: DISPATCH_TARGET,
                kind = decoded.message.kind(),
                skipped = decoded.issues.len(),
                "request contained unintelligible lines"
            );
        }
        let request = decoded.into_message();

        let reply = self
            .registry
            .with_registry(|registry| self.dispatcher.dispatch(request, registry))
            .map_err(|error| HandlerFault::new(error.to_string()))?;

        if let Err(error) = write_message(&mut stream, &reply.encode()) {
            warn!(target: DISPATCH_TARGET, %error, "failed to write reply");
            return Ok(());
        }
        close(&stream);
        Ok(())
    }
}

impl ConnectionHandler for DispatchConnectionHandler {
    fn handle(&self, stream: ConnectionStream) -> Result<(), HandlerFault> {
        self.exchange(stream)
    }
}

fn close(stream: &ConnectionStream) {
    if let Err(error) = stream.shutdown() {
        debug!(target: DISPATCH_TARGET, %error, "failed to shut down connection");
    }
}
