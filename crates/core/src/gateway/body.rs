//! Response body for a byte-range stream.

use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Bytes;
use futures::Stream;
use tracing::{info, warn};

use crate::engine::ByteStream;
use crate::metrics::{STREAMS_TOTAL, STREAM_BYTES_TOTAL};

/// How a stream ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamOutcome {
    /// Every byte of the window was delivered.
    Completed,
    /// The consumer went away or the engine read failed first.
    Aborted,
}

impl StreamOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::Aborted => "aborted",
        }
    }
}

/// Wraps an engine read so it yields exactly the window length.
///
/// Chunks past the window are truncated, and an engine stream that ends
/// early is turned into an `UnexpectedEof` error. The outcome is logged and
/// counted when the body is dropped, which also drops the engine read.
pub struct RangeBody {
    inner: ByteStream,
    info_hash: String,
    expected: u64,
    delivered: u64,
    failed: bool,
    done: bool,
}

impl RangeBody {
    pub fn new(inner: ByteStream, info_hash: impl Into<String>, expected: u64) -> Self {
        Self {
            inner,
            info_hash: info_hash.into(),
            expected,
            delivered: 0,
            failed: false,
            done: expected == 0,
        }
    }

    fn remaining(&self) -> u64 {
        self.expected - self.delivered
    }

    pub fn outcome(&self) -> StreamOutcome {
        if !self.failed && self.delivered == self.expected {
            StreamOutcome::Completed
        } else {
            StreamOutcome::Aborted
        }
    }
}

impl Stream for RangeBody {
    type Item = io::Result<Bytes>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.done {
            return Poll::Ready(None);
        }

        match this.inner.as_mut().poll_next(cx) {
            Poll::Pending => Poll::Pending,
            Poll::Ready(Some(Ok(mut chunk))) => {
                let remaining = this.remaining();
                if chunk.len() as u64 > remaining {
                    chunk.truncate(remaining as usize);
                }
                this.delivered += chunk.len() as u64;
                if this.remaining() == 0 {
                    this.done = true;
                }
                Poll::Ready(Some(Ok(chunk)))
            }
            Poll::Ready(Some(Err(e))) => {
                this.failed = true;
                this.done = true;
                Poll::Ready(Some(Err(e)))
            }
            Poll::Ready(None) => {
                this.failed = true;
                this.done = true;
                Poll::Ready(Some(Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    format!(
                        "content ended after {} of {} bytes",
                        this.delivered, this.expected
                    ),
                ))))
            }
        }
    }
}

impl Drop for RangeBody {
    fn drop(&mut self) {
        let outcome = self.outcome();
        STREAMS_TOTAL.with_label_values(&[outcome.as_str()]).inc();
        STREAM_BYTES_TOTAL.inc_by(self.delivered);

        match outcome {
            StreamOutcome::Completed => info!(
                info_hash = %self.info_hash,
                bytes = self.delivered,
                "Stream completed"
            ),
            StreamOutcome::Aborted => warn!(
                info_hash = %self.info_hash,
                bytes = self.delivered,
                expected = self.expected,
                "Stream aborted"
            ),
        }
    }
}
