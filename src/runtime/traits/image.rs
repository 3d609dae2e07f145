// ABOUTME: Image operations trait for container runtimes.
// ABOUTME: Build from a streamed tar context, list by label, and remove images.

use super::sealed::Sealed;
use crate::types::ImageId;
use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;
use std::collections::HashMap;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::mpsc;

/// Consumer end of a bounded, back-pressured byte pipe carrying a tar build
/// context. The producer feeds chunks through the paired sender, so the
/// full archive is never buffered in memory and a slow consumer suspends
/// the producer.
pub struct BuildContext {
    rx: mpsc::Receiver<Bytes>,
}

impl BuildContext {
    /// Create a pipe of the given depth (in chunks). The producer writes
    /// into the sender; dropping the sender ends the stream.
    pub fn pipe(depth: usize) -> (mpsc::Sender<Bytes>, BuildContext) {
        let (tx, rx) = mpsc::channel(depth);
        (tx, BuildContext { rx })
    }

    /// A context carrying a single pre-built archive. Mainly for tests.
    pub fn from_bytes(bytes: Bytes) -> BuildContext {
        let (tx, context) = Self::pipe(1);
        tx.try_send(bytes).expect("fresh pipe has capacity");
        context
    }

    /// A context carrying nothing at all. Mainly for tests.
    pub fn empty() -> BuildContext {
        let (tx, context) = Self::pipe(1);
        drop(tx);
        context
    }
}

impl Stream for BuildContext {
    type Item = Bytes;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Bytes>> {
        self.rx.poll_recv(cx)
    }
}

/// Lazy sequence of build log lines, surfaced as the daemon emits them.
pub type BuildLogStream<'a> = Pin<Box<dyn Stream<Item = Result<String, ImageError>> + Send + 'a>>;

/// Image operations: build, list, remove.
#[async_trait]
pub trait ImageOps: Sealed + Send + Sync {
    /// Build an image from a streamed tar context, tagging it and attaching
    /// the given labels at build time.
    ///
    /// The returned stream yields human-readable log lines as the build
    /// progresses and terminates with an `ImageError::BuildFailed` item on
    /// failure. Tagging-on-success is the runtime's own guarantee; a failed
    /// build leaves no partial image under the target tag.
    fn build_image(
        &self,
        context: BuildContext,
        tag: &str,
        labels: &HashMap<String, String>,
    ) -> BuildLogStream<'_>;

    /// List images carrying the given labels.
    async fn list_images(
        &self,
        labels: &HashMap<String, String>,
    ) -> Result<Vec<ImageSummary>, ImageError>;

    /// Remove an image.
    async fn remove_image(&self, id: &ImageId, force: bool) -> Result<(), ImageError>;
}

/// Summary information about an image.
#[derive(Debug, Clone)]
pub struct ImageSummary {
    /// Image ID.
    pub id: ImageId,
    /// Repository tags.
    pub repo_tags: Vec<String>,
    /// Labels.
    pub labels: HashMap<String, String>,
}

/// Errors from image operations.
#[derive(Debug, thiserror::Error)]
pub enum ImageError {
    #[error("image not found: {0}")]
    NotFound(String),

    #[error("build failed: {0}")]
    BuildFailed(String),

    #[error("image in use, cannot remove: {0}")]
    InUse(String),

    #[error("runtime error: {0}")]
    Runtime(String),
}
