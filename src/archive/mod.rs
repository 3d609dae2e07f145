// ABOUTME: Revision resolution and streamed tar archives of a git tree.
// ABOUTME: The producer walks the object database; nothing is checked out to disk.

use std::path::{Path, PathBuf};

use bytes::Bytes;
use chrono::Utc;
use tokio::sync::mpsc;
use tokio::task::{self, JoinHandle};
use tracing::{debug, warn};

use crate::runtime::BuildContext;
use crate::types::Revision;

/// Depth of the producer/consumer pipe, in chunks. The producer suspends
/// once this many chunks are unread, which bounds memory to a handful of
/// tar blocks regardless of tree size.
const PIPE_DEPTH: usize = 8;

/// Errors from revision resolution and archive streaming.
#[derive(Debug, thiserror::Error)]
pub enum ArchiveError {
    /// The branch does not exist or the repository cannot be opened.
    #[error("revision not found: {0}")]
    RevisionNotFound(String),

    /// Reading objects or writing archive entries failed.
    #[error("archive I/O error: {0}")]
    Io(String),

    /// The consumer stopped reading before the archive was fully written.
    /// Usually secondary to a build failure, never the root cause.
    #[error("archive consumer closed the stream early")]
    ConsumerClosed,
}

impl From<std::io::Error> for ArchiveError {
    fn from(e: std::io::Error) -> Self {
        if e.kind() == std::io::ErrorKind::BrokenPipe {
            ArchiveError::ConsumerClosed
        } else {
            ArchiveError::Io(e.to_string())
        }
    }
}

/// Resolve a branch name to an immutable revision identifier.
///
/// # Errors
///
/// Returns `ArchiveError::RevisionNotFound` if the repository cannot be
/// opened or the branch does not exist.
pub fn resolve_branch(repo_path: &Path, branch: &str) -> Result<Revision, ArchiveError> {
    let repo = gix::open(repo_path).map_err(|e| {
        ArchiveError::RevisionNotFound(format!(
            "cannot open repository at {}: {}",
            repo_path.display(),
            e
        ))
    })?;

    let reference = repo
        .find_reference(branch)
        .map_err(|e| ArchiveError::RevisionNotFound(format!("branch {}: {}", branch, e)))?;

    let id = reference
        .into_fully_peeled_id()
        .map_err(|e| ArchiveError::RevisionNotFound(format!("branch {}: {}", branch, e)))?
        .detach();

    let revision = Revision::new(&id.to_string())
        .map_err(|e| ArchiveError::RevisionNotFound(e.to_string()))?;

    debug!(branch = %branch, revision = %revision, "resolved branch");
    Ok(revision)
}

/// Handle on the archive producer task. Join it after the consumer is done
/// to learn whether the tree was streamed completely.
pub struct ArchiveWorker(JoinHandle<Result<(), ArchiveError>>);

impl ArchiveWorker {
    /// Wait for the producer to finish and surface its result.
    pub async fn finish(self) -> Result<(), ArchiveError> {
        self.0
            .await
            .map_err(|e| ArchiveError::Io(format!("archive task failed: {}", e)))?
    }
}

/// Stream a revision's file tree as a tar archive.
///
/// The producer runs on a blocking task, writing one entry per file into a
/// bounded pipe as it iterates the tree; the returned stream is the consumer
/// end. The pipe is closed after the last entry and on error, so a reader
/// never deadlocks on a failed producer. The repository is only read.
pub fn stream_archive(repo_path: &Path, revision: &Revision) -> (BuildContext, ArchiveWorker) {
    let (tx, context) = BuildContext::pipe(PIPE_DEPTH);

    let repo_path: PathBuf = repo_path.to_path_buf();
    let revision = revision.clone();
    let worker = task::spawn_blocking(move || write_archive(&repo_path, &revision, tx));

    (context, ArchiveWorker(worker))
}

/// Bridges the synchronous tar writer onto the bounded async pipe.
/// `blocking_send` is what provides the back-pressure: the producer thread
/// parks until the consumer has drained a slot.
struct PipeWriter {
    tx: mpsc::Sender<Bytes>,
}

impl std::io::Write for PipeWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        self.tx
            .blocking_send(Bytes::copy_from_slice(buf))
            .map_err(|_| {
                std::io::Error::new(std::io::ErrorKind::BrokenPipe, "archive consumer dropped")
            })?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

/// Synchronous producer: open the repository, find the revision's tree, and
/// append every reachable file as a tar entry.
fn write_archive(
    repo_path: &Path,
    revision: &Revision,
    tx: mpsc::Sender<Bytes>,
) -> Result<(), ArchiveError> {
    let repo = gix::open(repo_path).map_err(|e| {
        ArchiveError::RevisionNotFound(format!(
            "cannot open repository at {}: {}",
            repo_path.display(),
            e
        ))
    })?;

    let id = gix::ObjectId::from_hex(revision.as_str().as_bytes())
        .map_err(|e| ArchiveError::RevisionNotFound(format!("{}: {}", revision, e)))?;

    let commit = repo
        .find_commit(id)
        .map_err(|e| ArchiveError::RevisionNotFound(format!("{}: {}", revision, e)))?;

    let tree = commit
        .tree()
        .map_err(|e| ArchiveError::Io(format!("failed to read commit tree: {}", e)))?;

    // One synthetic timestamp for the whole archive. Per-file times are not
    // recoverable from the object database and no consumer depends on them.
    let mtime = Utc::now().timestamp().max(0) as u64;

    let mut builder = tar::Builder::new(PipeWriter { tx });
    append_tree(&repo, &tree, Path::new(""), &mut builder, mtime)?;
    builder.finish()?;

    Ok(())
}

/// Recursively append a tree's blobs to the archive.
fn append_tree(
    repo: &gix::Repository,
    tree: &gix::Tree<'_>,
    prefix: &Path,
    builder: &mut tar::Builder<PipeWriter>,
    mtime: u64,
) -> Result<(), ArchiveError> {
    for entry in tree.iter() {
        let entry =
            entry.map_err(|e| ArchiveError::Io(format!("failed to read tree entry: {}", e)))?;

        let name = std::str::from_utf8(entry.filename())
            .map_err(|_| ArchiveError::Io("invalid filename encoding".to_string()))?;

        let entry_path = prefix.join(name);

        match entry.mode().kind() {
            gix::object::tree::EntryKind::Tree => {
                let subtree = repo
                    .find_tree(entry.oid())
                    .map_err(|e| ArchiveError::Io(format!("failed to find subtree: {}", e)))?;
                append_tree(repo, &subtree, &entry_path, builder, mtime)?;
            }
            gix::object::tree::EntryKind::Blob | gix::object::tree::EntryKind::BlobExecutable => {
                let object = repo
                    .find_object(entry.oid())
                    .map_err(|e| ArchiveError::Io(format!("failed to find blob: {}", e)))?;

                let executable = matches!(
                    entry.mode().kind(),
                    gix::object::tree::EntryKind::BlobExecutable
                );

                let mut header = tar::Header::new_gnu();
                header.set_size(object.data.len() as u64);
                header.set_mode(if executable { 0o755 } else { 0o644 });
                header.set_mtime(mtime);
                builder.append_data(&mut header, &entry_path, object.data.as_slice())?;
            }
            gix::object::tree::EntryKind::Link => {
                warn!(path = %entry_path.display(), "skipping symlink in repository");
            }
            gix::object::tree::EntryKind::Commit => {
                warn!(path = %entry_path.display(), "skipping submodule");
            }
        }
    }

    Ok(())
}
