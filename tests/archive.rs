// ABOUTME: Integration tests for revision resolution and archive streaming.
// ABOUTME: Builds real git repositories in temp dirs and parses the tar output.

use std::io::Cursor;
use std::path::Path;
use std::process::Command;

use futures::StreamExt;
use slipway::archive::{ArchiveError, resolve_branch, stream_archive};
use slipway::types::Revision;

fn git(repo: &Path, args: &[&str]) {
    let status = Command::new("git")
        .arg("-C")
        .arg(repo)
        .args(args)
        .env("GIT_AUTHOR_NAME", "test")
        .env("GIT_AUTHOR_EMAIL", "test@example.com")
        .env("GIT_COMMITTER_NAME", "test")
        .env("GIT_COMMITTER_EMAIL", "test@example.com")
        .status()
        .expect("git should be runnable");
    assert!(status.success(), "git {:?} failed", args);
}

/// Create a repository on branch `master` with the given files committed.
fn repo_with_files(files: &[(&str, &[u8])]) -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path();

    let status = Command::new("git")
        .args(["init", "-q", "-b", "master"])
        .arg(path)
        .status()
        .expect("git should be runnable");
    assert!(status.success());

    for (name, contents) in files {
        let file_path = path.join(name);
        if let Some(parent) = file_path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(&file_path, contents).unwrap();
    }

    git(path, &["add", "-A"]);
    git(path, &["commit", "-q", "-m", "init"]);

    dir
}

async fn collect_archive(repo: &Path, revision: &Revision) -> (Vec<u8>, Result<(), ArchiveError>) {
    let (mut chunks, worker) = stream_archive(repo, revision);
    let mut bytes = Vec::new();
    while let Some(chunk) = chunks.next().await {
        bytes.extend_from_slice(&chunk);
    }
    (bytes, worker.finish().await)
}

fn entry_sizes(bytes: &[u8]) -> Vec<(String, u64)> {
    let mut archive = tar::Archive::new(Cursor::new(bytes));
    archive
        .entries()
        .unwrap()
        .map(|e| {
            let e = e.unwrap();
            let path = e.path().unwrap().to_string_lossy().into_owned();
            (path, e.header().size().unwrap())
        })
        .collect()
}

#[test]
fn resolve_branch_returns_full_object_id() {
    let repo = repo_with_files(&[("app.conf", b"0123456789")]);

    let revision = resolve_branch(repo.path(), "master").unwrap();
    assert_eq!(revision.as_str().len(), 40);
    assert!(revision.as_str().chars().all(|c| c.is_ascii_hexdigit()));
}

#[test]
fn resolve_branch_fails_for_unknown_branch() {
    let repo = repo_with_files(&[("app.conf", b"0123456789")]);

    let err = resolve_branch(repo.path(), "release").unwrap_err();
    assert!(matches!(err, ArchiveError::RevisionNotFound(_)));
}

#[tokio::test]
async fn archive_contains_every_file_with_matching_sizes() {
    let repo = repo_with_files(&[
        ("app.conf", b"0123456789" as &[u8]),
        ("Dockerfile", b"FROM scratch\nCOPY app.conf /\n"),
        ("src/main.py", b"print('hi')\n"),
    ]);

    let revision = resolve_branch(repo.path(), "master").unwrap();
    let (bytes, result) = collect_archive(repo.path(), &revision).await;
    result.unwrap();

    let mut entries = entry_sizes(&bytes);
    entries.sort();

    assert_eq!(
        entries,
        vec![
            ("Dockerfile".to_string(), 29),
            ("app.conf".to_string(), 10),
            ("src/main.py".to_string(), 12),
        ]
    );
}

#[tokio::test]
async fn archive_is_consumable_by_a_slow_reader() {
    // Large enough that the producer has to wait on the bounded pipe.
    let payload = vec![b'x'; 256 * 1024];
    let repo = repo_with_files(&[("blob.bin", payload.as_slice())]);

    let revision = resolve_branch(repo.path(), "master").unwrap();
    let (mut chunks, worker) = stream_archive(repo.path(), &revision);

    let mut bytes = Vec::new();
    while let Some(chunk) = chunks.next().await {
        bytes.extend_from_slice(&chunk);
        tokio::time::sleep(std::time::Duration::from_millis(2)).await;
    }
    worker.finish().await.unwrap();

    let entries = entry_sizes(&bytes);
    assert_eq!(entries, vec![("blob.bin".to_string(), 256 * 1024)]);
}

#[tokio::test]
async fn producer_closes_pipe_on_error() {
    let repo = repo_with_files(&[("app.conf", b"0123456789")]);

    // Valid shape, but no such object in the repository.
    let missing = Revision::new("00000000000000000000000000000000000000aa").unwrap();
    let (mut chunks, worker) = stream_archive(repo.path(), &missing);

    // The stream must end rather than deadlock the reader.
    let mut total = 0;
    while let Some(chunk) = chunks.next().await {
        total += chunk.len();
    }
    assert_eq!(total, 0);

    let err = worker.finish().await.unwrap_err();
    assert!(matches!(err, ArchiveError::RevisionNotFound(_)));
}

#[tokio::test]
async fn dropping_the_consumer_does_not_hang_the_producer() {
    let payload = vec![b'y'; 256 * 1024];
    let repo = repo_with_files(&[("blob.bin", payload.as_slice())]);

    let revision = resolve_branch(repo.path(), "master").unwrap();
    let (chunks, worker) = stream_archive(repo.path(), &revision);
    drop(chunks);

    // Producer sees the broken pipe and finishes instead of blocking.
    let err = worker.finish().await.unwrap_err();
    assert!(matches!(err, ArchiveError::ConsumerClosed));
}
