//! Byte stream sources.
//!
//! A [`StreamSource`] opens one long-lived response body per call. The
//! production source is [`HttpSource`]; tests substitute scripted sources.

// ============================================================================
// Imports
// ============================================================================

use std::pin::Pin;

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::{Stream, TryStreamExt};
use reqwest::Client;
use tracing::debug;
use url::Url;

use crate::error::{Error, Result};

// ============================================================================
// Types
// ============================================================================

/// Chunked body of an open stream. Chunk boundaries carry no meaning.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes>> + Send>>;

// ============================================================================
// StreamSource
// ============================================================================

/// Opens the frame stream.
#[async_trait]
pub trait StreamSource: Send + Sync + 'static {
    /// Issues the streaming request and returns the response body.
    ///
    /// # Errors
    ///
    /// Returns a transport error if the connection cannot be established or
    /// the server does not answer with a success status.
    async fn open(&self) -> Result<ByteStream>;
}

// ============================================================================
// HttpSource
// ============================================================================

/// Streams the body of a plain `GET` to a fixed endpoint.
///
/// No request timeout is applied; the body is expected to stay open
/// indefinitely.
#[derive(Debug, Clone)]
pub struct HttpSource {
    client: Client,
    endpoint: Url,
}

impl HttpSource {
    /// Creates a source with a default client.
    #[must_use]
    pub fn new(endpoint: Url) -> Self {
        Self::with_client(Client::new(), endpoint)
    }

    /// Creates a source using an existing client.
    #[must_use]
    pub fn with_client(client: Client, endpoint: Url) -> Self {
        Self { client, endpoint }
    }

    /// Returns the stream endpoint.
    #[inline]
    #[must_use]
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

#[async_trait]
impl StreamSource for HttpSource {
    async fn open(&self) -> Result<ByteStream> {
        let response = self.client.get(self.endpoint.clone()).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::http_status(status.as_u16()));
        }

        debug!(endpoint = %self.endpoint, status = status.as_u16(), "Stream opened");

        Ok(Box::pin(response.bytes_stream().map_err(Error::from)))
    }
}

// ============================================================================
// Tests
// ============================================================================
