//! Stream management for the durable-stream engine.
//!
//! [`StreamManager`] is a thin facade over a [`StreamApi`]: it logs each
//! call, passes configuration through unchanged, and treats deleting a
//! stream that does not exist as success.
//!
//! ## Example
//!
//! ```rust,no_run
//! use busprobe_adapters::stream::{StreamApi, StreamManager, StreamSpec};
//! use busprobe_adapters::StreamError;
//!
//! async fn reset_orders<A: StreamApi>(streams: &StreamManager<A>) -> Result<(), StreamError> {
//!     // Succeeds whether or not the stream exists yet
//!     streams.delete_stream("ORDERS").await?;
//!     streams
//!         .create_stream(&StreamSpec::new("ORDERS", ["orders.>"]))
//!         .await
//! }
//! ```

use async_trait::async_trait;
use tracing::{debug, error};

use crate::StreamError;

/// Name and subjects of a stream to create.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StreamSpec {
    /// Stream name.
    pub name: String,
    /// Subjects captured by the stream.
    pub subjects: Vec<String>,
}

impl StreamSpec {
    /// Create a spec from a name and its subjects.
    pub fn new<I, S>(name: impl Into<String>, subjects: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            subjects: subjects.into_iter().map(Into::into).collect(),
        }
    }
}

/// Stream operations offered by a durable-stream engine client.
///
/// Implementations report a missing stream as [`StreamError::NotFound`].
#[async_trait]
pub trait StreamApi: Send + Sync {
    /// Engine-native stream configuration, passed through unchanged.
    type Config: Send + Sync;

    /// Handle to an existing stream.
    type Stream: Send;

    /// Name of the stream a configuration describes.
    fn config_name(config: &Self::Config) -> &str;

    /// Create a stream.
    async fn create_stream(&self, spec: &StreamSpec) -> Result<Self::Stream, StreamError>;

    /// Create a stream, or update it if one with the same name exists.
    async fn create_or_update_stream(
        &self,
        config: &Self::Config,
    ) -> Result<Self::Stream, StreamError>;

    /// Delete a stream.
    async fn delete_stream(&self, name: &str) -> Result<(), StreamError>;

    /// Look up a stream by name.
    async fn get_stream(&self, name: &str) -> Result<Self::Stream, StreamError>;
}

/// Logging facade over a [`StreamApi`].
#[derive(Debug, Clone)]
pub struct StreamManager<A> {
    api: A,
}

impl<A: StreamApi> StreamManager<A> {
    /// Wrap a stream API client.
    pub fn new(api: A) -> Self {
        Self { api }
    }

    /// The wrapped client.
    pub fn api(&self) -> &A {
        &self.api
    }

    /// Create a stream with the given name and subjects.
    pub async fn create_stream(&self, spec: &StreamSpec) -> Result<(), StreamError> {
        debug!(stream = %spec.name, "creating stream");

        self.api.create_stream(spec).await.map(drop).map_err(|err| {
            error!(stream = %spec.name, error = %err, "failed to create stream");
            err
        })
    }

    /// Create or update a stream from an engine-native configuration.
    pub async fn create_or_update_stream(
        &self,
        config: &A::Config,
    ) -> Result<A::Stream, StreamError> {
        let name = A::config_name(config);
        debug!(stream = %name, "creating or updating stream");

        self.api
            .create_or_update_stream(config)
            .await
            .map_err(|err| {
                error!(stream = %name, error = %err, "failed to create or update stream");
                err
            })
    }

    /// Delete a stream. Deleting a stream that does not exist succeeds.
    pub async fn delete_stream(&self, name: &str) -> Result<(), StreamError> {
        debug!(stream = %name, "deleting stream");

        match self.api.delete_stream(name).await {
            Ok(()) => {
                debug!(stream = %name, "deleted stream");
                Ok(())
            }
            Err(err) if err.is_not_found() => {
                debug!(stream = %name, "stream not found, considering delete successful");
                Ok(())
            }
            Err(err) => {
                error!(stream = %name, error = %err, "failed to delete stream");
                Err(err)
            }
        }
    }

    /// Look up a stream by name.
    pub async fn get_stream(&self, name: &str) -> Result<A::Stream, StreamError> {
        debug!(stream = %name, "getting stream");

        self.api.get_stream(name).await.map_err(|err| {
            if err.is_not_found() {
                debug!(stream = %name, "stream not found");
            } else {
                error!(stream = %name, error = %err, "failed to get stream");
            }
            err
        })
    }
}
