//! Media segment relay
//!
//! Streams one upstream segment back to the client without buffering it.
//! The upstream connection lives exactly as long as the returned
//! [`SegmentStream`]; when the client goes away the HTTP server drops the
//! body, which drops the stream and closes the upstream connection.

use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Bytes;
use futures::{Stream, StreamExt};
use reqwest::header::{ACCEPT_RANGES, CONTENT_LENGTH, CONTENT_RANGE, CONTENT_TYPE, IF_RANGE, RANGE};
use reqwest::StatusCode;
use tracing::{debug, warn};

use streamgate_core::{Error, Result};

use crate::upstream::Upstream;
use crate::DEFAULT_SEGMENT_CONTENT_TYPE;

type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes>> + Send>>;

/// Body of a relayed segment.
pub struct SegmentStream {
    inner: ByteStream,
    item_id: String,
    bytes_sent: u64,
    finished: bool,
}

impl SegmentStream {
    pub fn new<S, E>(item_id: impl Into<String>, inner: S) -> Self
    where
        S: Stream<Item = std::result::Result<Bytes, E>> + Send + 'static,
        E: Into<Error>,
    {
        Self {
            inner: Box::pin(inner.map(|chunk| chunk.map_err(Into::into))),
            item_id: item_id.into(),
            bytes_sent: 0,
            finished: false,
        }
    }

    #[must_use]
    pub const fn bytes_sent(&self) -> u64 {
        self.bytes_sent
    }
}

impl Stream for SegmentStream {
    type Item = Result<Bytes>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        match this.inner.as_mut().poll_next(cx) {
            Poll::Ready(Some(Ok(chunk))) => {
                this.bytes_sent += chunk.len() as u64;
                Poll::Ready(Some(Ok(chunk)))
            }
            Poll::Ready(Some(Err(e))) => {
                this.finished = true;
                warn!(item_id = %this.item_id, bytes_sent = this.bytes_sent, error = %e, "Segment stream failed");
                Poll::Ready(Some(Err(e)))
            }
            Poll::Ready(None) => {
                this.finished = true;
                debug!(item_id = %this.item_id, bytes_sent = this.bytes_sent, "Segment relayed");
                Poll::Ready(None)
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

impl Drop for SegmentStream {
    fn drop(&mut self) {
        if !self.finished {
            debug!(
                item_id = %self.item_id,
                bytes_sent = self.bytes_sent,
                "Client went away, closing upstream segment stream"
            );
        }
    }
}

impl std::fmt::Debug for SegmentStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SegmentStream")
            .field("item_id", &self.item_id)
            .field("bytes_sent", &self.bytes_sent)
            .field("finished", &self.finished)
            .finish_non_exhaustive()
    }
}

/// Byte-range headers forwarded from the player.
///
/// Byte-range playlists (`#EXT-X-BYTERANGE`) address slices of one file, so
/// the player's `Range` must reach upstream untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RangeRequest {
    pub range: Option<String>,
    pub if_range: Option<String>,
}

impl RangeRequest {
    #[must_use]
    pub fn new(range: Option<&str>, if_range: Option<&str>) -> Self {
        let clean = |v: Option<&str>| {
            v.map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        };
        Self {
            range: clean(range),
            if_range: clean(if_range),
        }
    }
}

/// A segment ready to be sent to the client.
#[derive(Debug)]
pub struct RelayedSegment {
    /// Upstream answered `206` with a slice of the segment
    pub partial: bool,
    pub content_type: String,
    pub content_length: Option<u64>,
    pub content_range: Option<String>,
    pub accept_ranges: Option<String>,
    pub body: SegmentStream,
}

#[derive(Debug, Clone)]
pub struct SegmentRelay {
    upstream: Upstream,
}

impl SegmentRelay {
    #[must_use]
    pub const fn new(upstream: Upstream) -> Self {
        Self { upstream }
    }

    /// Open the upstream segment and hand back its streaming body.
    ///
    /// There is no retry here; players already retry failed segments.
    pub async fn relay_segment(
        &self,
        item_id: &str,
        segment_path: &str,
        range: &RangeRequest,
    ) -> Result<RelayedSegment> {
        let item_id = streamgate_core::error::require("itemId", Some(item_id))?;
        let segment_path = streamgate_core::error::require("path", Some(segment_path))?;
        let url = self.upstream.segment_url(item_id, segment_path)?;

        debug!(
            item_id,
            url = %self.upstream.redact(&url),
            range = range.range.as_deref().unwrap_or("-"),
            "Relaying segment"
        );

        let mut request = self.upstream.client().get(url);
        if let Some(value) = range.range.as_deref() {
            request = request.header(RANGE, value);
        }
        if let Some(value) = range.if_range.as_deref() {
            request = request.header(IF_RANGE, value);
        }

        let response = request.send().await?;
        let status = response.status();
        if status == StatusCode::RANGE_NOT_SATISFIABLE {
            return Err(Error::InvalidParameter(format!(
                "range {} not satisfiable for segment {segment_path}",
                range.range.as_deref().unwrap_or_default()
            )));
        }
        if !status.is_success() {
            return Err(Error::UpstreamUnavailable(format!(
                "segment {segment_path} of {item_id} returned {status}"
            )));
        }

        let header = |name| {
            response
                .headers()
                .get(name)
                .and_then(|v| v.to_str().ok())
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        };
        let content_type =
            header(CONTENT_TYPE).unwrap_or_else(|| DEFAULT_SEGMENT_CONTENT_TYPE.to_string());
        let content_length = header(CONTENT_LENGTH).and_then(|v| v.parse().ok());
        let content_range = header(CONTENT_RANGE);
        let accept_ranges = header(ACCEPT_RANGES);

        Ok(RelayedSegment {
            partial: status == StatusCode::PARTIAL_CONTENT,
            content_type,
            content_length,
            content_range,
            accept_ranges,
            body: SegmentStream::new(item_id, response.bytes_stream()),
        })
    }
}
