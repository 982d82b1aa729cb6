// SPDX-License-Identifier: MIT OR Apache-2.0
//! In-process transport answering from a closure, for offline runs and tests.

use async_trait::async_trait;
use std::sync::Mutex;
use std::time::Duration;

use crate::{Envelope, ProxyRequest, ProxyTransport};

/// [`ProxyTransport`] whose replies come from `respond`.
///
/// Every request is recorded and can be inspected with
/// [`calls`](Self::calls).
pub struct ScriptedTransport<F> {
    respond: F,
    delay: Option<Duration>,
    calls: Mutex<Vec<ProxyRequest>>,
}

impl<F> ScriptedTransport<F>
where
    F: Fn(&ProxyRequest) -> Envelope + Send + Sync,
{
    /// Transport answering every request with `respond(request)`.
    pub fn new(respond: F) -> Self {
        Self {
            respond,
            delay: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Sleep before each reply.
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Requests received so far, in arrival order.
    pub fn calls(&self) -> Vec<ProxyRequest> {
        self.calls
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

impl<F> std::fmt::Debug for ScriptedTransport<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptedTransport")
            .field("delay", &self.delay)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl<F> ProxyTransport for ScriptedTransport<F>
where
    F: Fn(&ProxyRequest) -> Envelope + Send + Sync,
{
    async fn send(&self, request: &ProxyRequest) -> Envelope {
        self.calls
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(request.clone());
        if let Some(d) = self.delay {
            tokio::time::sleep(d).await;
        }
        (self.respond)(request)
    }
}
