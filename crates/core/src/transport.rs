//! Rate-limited transport decorator

use async_trait::async_trait;
use tracing::{debug, trace};
use vkrelay_common::resilience::{PermitError, PermitPool, PermitPoolConfig};
use vkrelay_domain::{Result, TransportRequest, TransportResponse, VkRelayError};

use crate::ports::Transport;

/// Gates every request of the inner transport through a [`PermitPool`]
///
/// One permit is consumed per request; permits come back only through the
/// pool's periodic refill, so at most `capacity` requests start per period.
/// The request timeout covers the inner exchange only, not the permit wait.
#[derive(Debug)]
pub struct RateLimitedTransport<T> {
    inner: T,
    permits: PermitPool,
}

impl<T: Transport> RateLimitedTransport<T> {
    /// Wrap `inner`, starting the refill task on the current runtime.
    ///
    /// # Errors
    ///
    /// Returns `VkRelayError::Config` when the pool configuration is
    /// invalid or no Tokio runtime is running.
    pub fn new(inner: T, config: PermitPoolConfig) -> Result<Self> {
        let permits = PermitPool::start(config).map_err(|err| VkRelayError::Config(err.to_string()))?;
        Ok(Self { inner, permits })
    }

    pub fn inner(&self) -> &T {
        &self.inner
    }

    pub fn permits(&self) -> &PermitPool {
        &self.permits
    }
}

#[async_trait]
impl<T: Transport> Transport for RateLimitedTransport<T> {
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse> {
        trace!(url = %request.url, available = self.permits.available(), "waiting for permit");
        self.permits.acquire().await.map_err(|err| match err {
            PermitError::Closed => VkRelayError::Closed,
            other => VkRelayError::Internal(other.to_string()),
        })?;

        // The call timeout starts once the request may actually go out
        let timeout = request.timeout;
        tokio::time::timeout(timeout, self.inner.send(request))
            .await
            .map_err(|_| VkRelayError::Timeout(timeout))?
    }

    async fn close(&self) {
        debug!("closing rate-limited transport");
        self.permits.shutdown().await;
        self.inner.close().await;
    }
}
