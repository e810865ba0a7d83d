//! Ordered endpoint fallback.
//!
//! The bus may be reachable through more than one endpoint. This module
//! tries each configured transport in priority order when opening a
//! connection. It does not retry a connection that later fails.

use crate::traits::{Connection, Transport, TransportError};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, warn};

/// Opens through the first endpoint that answers.
pub struct FallbackTransport {
    transports: Vec<Arc<dyn Transport>>,
}

impl FallbackTransport {
    /// Highest priority first.
    #[must_use]
    pub fn new(transports: Vec<Arc<dyn Transport>>) -> Self {
        Self { transports }
    }

    pub fn push(&mut self, transport: Arc<dyn Transport>) {
        self.transports.push(transport);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.transports.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.transports.is_empty()
    }
}

#[async_trait]
impl Transport for FallbackTransport {
    async fn open(&self) -> Result<Box<dyn Connection>, TransportError> {
        let mut last_error = None;

        for (index, transport) in self.transports.iter().enumerate() {
            if !transport.is_healthy() {
                debug!(index, transport = transport.name(), "Skipping unhealthy endpoint");
                continue;
            }
            match transport.open().await {
                Ok(conn) => {
                    debug!(index, transport = transport.name(), "Endpoint selected");
                    return Ok(conn);
                }
                Err(e) => {
                    warn!(index, transport = transport.name(), error = %e, "Endpoint failed");
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| {
            TransportError::Other("No healthy transports available".into())
        }))
    }

    fn name(&self) -> &'static str {
        "fallback"
    }

    fn is_healthy(&self) -> bool {
        self.transports.iter().any(|t| t.is_healthy())
    }
}
