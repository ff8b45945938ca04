//! Network seam used by the routing policy and the precache step.

use crate::Error;
use crate::http::{Request, ResponseSnapshot};

/// Issues a request over the network.
///
/// Implementations return `Err(Error::Network)` only when no response was
/// received at all. HTTP error statuses come back as `Ok` so callers can
/// decide whether to cache them.
#[async_trait::async_trait]
pub trait Fetch: Send + Sync {
    async fn fetch(&self, request: &Request) -> Result<ResponseSnapshot, Error>;
}

#[async_trait::async_trait]
impl<T: Fetch + ?Sized> Fetch for std::sync::Arc<T> {
    async fn fetch(&self, request: &Request) -> Result<ResponseSnapshot, Error> {
        (**self).fetch(request).await
    }
}
