//! Mock content engine for testing.

use async_trait::async_trait;
use bytes::Bytes;
use futures::{stream, StreamExt};
use std::collections::HashMap;
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{watch, RwLock};

use crate::engine::{ByteStream, ContentEngine, ContentFile, ContentPointer, EngineError};

const CHUNK_SIZE: u64 = 64;

/// A recorded range read for test assertions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedRead {
    pub info_hash: String,
    pub file_index: usize,
    pub start: u64,
    pub end: u64,
}

/// Decrements the live-read counter when a read stream is dropped.
struct ReadGuard(Arc<AtomicUsize>);

impl Drop for ReadGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// State of one range read, advanced one chunk per poll.
struct LazyRead {
    start: u64,
    end: u64,
    offset: u64,
    fail_after: Option<u64>,
    produced: Arc<AtomicUsize>,
    _guard: ReadGuard,
}

impl LazyRead {
    fn next_chunk(&mut self) -> Option<io::Result<Bytes>> {
        if self.offset > self.end {
            return None;
        }
        self.produced.fetch_add(1, Ordering::SeqCst);

        if self
            .fail_after
            .is_some_and(|limit| self.offset - self.start >= limit)
        {
            // Ends the stream after the error.
            self.offset = self.end + 1;
            return Some(Err(io::Error::new(
                io::ErrorKind::ConnectionReset,
                "simulated peer loss",
            )));
        }

        let len = CHUNK_SIZE.min(self.end - self.offset + 1);
        let chunk = Bytes::from(MockContentEngine::pattern(self.offset, len));
        self.offset += len;
        Some(Ok(chunk))
    }
}

/// Mock implementation of the ContentEngine trait.
///
/// Provides controllable behavior for testing:
/// - Register file lists per info hash
/// - Hold readiness until released
/// - Simulate session failures and mid-stream read errors
/// - Track sessions and range reads for assertions
///
/// File contents are synthetic: the byte at offset `n` of every file is
/// `n % 251`, see [`MockContentEngine::pattern`].
#[derive(Debug)]
pub struct MockContentEngine {
    /// File lists by info hash.
    contents: Arc<RwLock<HashMap<String, Vec<ContentFile>>>>,
    /// Sessions started per info hash.
    sessions: Arc<RwLock<HashMap<String, u32>>>,
    /// If set, every session fails with this reason.
    session_failure: Arc<RwLock<Option<String>>>,
    /// Readiness gate; `false` holds every wait_ready call.
    ready_gate: watch::Sender<bool>,
    /// If set, reads fail after this many bytes.
    fail_reads_after: Arc<RwLock<Option<u64>>>,
    /// Recorded range reads.
    reads: Arc<RwLock<Vec<RecordedRead>>>,
    /// Read streams not yet dropped.
    live_reads: Arc<AtomicUsize>,
    /// Chunks pulled from all reads so far.
    chunks_produced: Arc<AtomicUsize>,
}

impl Default for MockContentEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl MockContentEngine {
    /// Create a new mock engine with no content and readiness open.
    pub fn new() -> Self {
        Self {
            contents: Arc::new(RwLock::new(HashMap::new())),
            sessions: Arc::new(RwLock::new(HashMap::new())),
            session_failure: Arc::new(RwLock::new(None)),
            ready_gate: watch::Sender::new(true),
            fail_reads_after: Arc::new(RwLock::new(None)),
            reads: Arc::new(RwLock::new(Vec::new())),
            live_reads: Arc::new(AtomicUsize::new(0)),
            chunks_produced: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Synthetic file bytes for `offset..offset + len`.
    pub fn pattern(offset: u64, len: u64) -> Vec<u8> {
        (offset..offset + len).map(|i| (i % 251) as u8).collect()
    }

    /// Register the file list served for `info_hash`.
    pub async fn add_content(&self, info_hash: &str, files: Vec<ContentFile>) {
        self.contents
            .write()
            .await
            .insert(info_hash.to_lowercase(), files);
    }

    /// Make wait_ready suspend until [`release_readiness`](Self::release_readiness).
    pub async fn hold_readiness(&self) {
        self.ready_gate.send_replace(false);
    }

    /// Let every held and future wait_ready call proceed.
    pub async fn release_readiness(&self) {
        self.ready_gate.send_replace(true);
    }

    /// Fail every session with `reason`.
    pub async fn fail_sessions_with(&self, reason: &str) {
        *self.session_failure.write().await = Some(reason.to_string());
    }

    /// Clear any session failure.
    pub async fn clear_session_failure(&self) {
        *self.session_failure.write().await = None;
    }

    /// Make range reads fail with a connection error after `bytes` bytes.
    pub async fn fail_reads_after(&self, bytes: u64) {
        *self.fail_reads_after.write().await = Some(bytes);
    }

    /// Number of sessions started for `info_hash`.
    pub async fn sessions_started(&self, info_hash: &str) -> u32 {
        self.sessions
            .read()
            .await
            .get(&info_hash.to_lowercase())
            .copied()
            .unwrap_or(0)
    }

    /// Get recorded range reads.
    pub async fn recorded_reads(&self) -> Vec<RecordedRead> {
        self.reads.read().await.clone()
    }

    /// Number of range reads opened.
    pub async fn reads_opened(&self) -> usize {
        self.reads.read().await.len()
    }

    /// Range read streams that are still alive.
    pub fn live_reads(&self) -> usize {
        self.live_reads.load(Ordering::SeqCst)
    }

    /// Chunks produced across all range reads; each is 64 bytes or less.
    pub fn chunks_produced(&self) -> usize {
        self.chunks_produced.load(Ordering::SeqCst)
    }

    async fn files_for(&self, pointer: &ContentPointer) -> Result<Vec<ContentFile>, EngineError> {
        self.contents
            .read()
            .await
            .get(pointer.info_hash())
            .cloned()
            .ok_or_else(|| {
                EngineError::SessionFailed(format!("no metadata for {}", pointer.info_hash()))
            })
    }
}

#[async_trait]
impl ContentEngine for MockContentEngine {
    fn name(&self) -> &str {
        "mock"
    }

    async fn start_session(&self, pointer: &ContentPointer) -> Result<(), EngineError> {
        *self
            .sessions
            .write()
            .await
            .entry(pointer.info_hash().to_string())
            .or_insert(0) += 1;

        match self.session_failure.read().await.as_ref() {
            Some(reason) => Err(EngineError::SessionFailed(reason.clone())),
            None => Ok(()),
        }
    }

    async fn wait_ready(&self, pointer: &ContentPointer) -> Result<Vec<ContentFile>, EngineError> {
        let mut gate = self.ready_gate.subscribe();
        gate.wait_for(|open| *open)
            .await
            .map_err(|_| EngineError::SessionFailed("engine shut down".to_string()))?;

        self.files_for(pointer).await
    }

    async fn open_range(
        &self,
        pointer: &ContentPointer,
        file_index: usize,
        start: u64,
        end: u64,
    ) -> Result<ByteStream, EngineError> {
        let files = self.files_for(pointer).await?;
        if file_index >= files.len() {
            return Err(EngineError::FileOutOfRange {
                index: file_index,
                count: files.len(),
            });
        }

        self.reads.write().await.push(RecordedRead {
            info_hash: pointer.info_hash().to_string(),
            file_index,
            start,
            end,
        });

        let fail_after = *self.fail_reads_after.read().await;
        self.live_reads.fetch_add(1, Ordering::SeqCst);
        let read = LazyRead {
            start,
            end,
            offset: start,
            fail_after,
            produced: self.chunks_produced.clone(),
            _guard: ReadGuard(self.live_reads.clone()),
        };

        // Chunks are built only when the consumer polls for them.
        Ok(stream::unfold(read, |mut read| async move {
            read.next_chunk().map(|chunk| (chunk, read))
        })
        .boxed())
    }
}
