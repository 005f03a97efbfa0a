//! HLS playlist rewriting
//!
//! Every media segment reference in an upstream playlist is replaced by a URL
//! that routes back through this proxy. Rewriting is strictly line-by-line:
//! line count, order and line terminators are preserved, and only segment
//! lines change.

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use tracing::{debug, info};

use streamgate_core::{Error, Result};

use crate::upstream::Upstream;

/// Everything except RFC 3986 unreserved characters is escaped in query values
const QUERY_VALUE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Classification of a single playlist line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineKind {
    Blank,
    /// `#EXT...` directive
    Tag,
    /// Any other `#` line
    Comment,
    /// Relative URI naming a media segment
    SegmentRef,
    /// Any other URI: absolute URLs, nested playlists
    OtherUri,
}

/// Classify `line` (without its terminator).
///
/// A segment reference is a relative URI whose path, ignoring any query or
/// fragment, ends in one of `extensions` (compared case-insensitively).
#[must_use]
pub fn classify_line(line: &str, extensions: &[String]) -> LineKind {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return LineKind::Blank;
    }
    if trimmed.starts_with("#EXT") {
        return LineKind::Tag;
    }
    if trimmed.starts_with('#') {
        return LineKind::Comment;
    }
    if trimmed.contains("://") || trimmed.starts_with("//") {
        return LineKind::OtherUri;
    }

    let path = trimmed
        .split(['?', '#'])
        .next()
        .unwrap_or_default()
        .to_ascii_lowercase();
    let is_segment = extensions.iter().any(|ext| {
        let ext = ext.trim().trim_start_matches('.').to_ascii_lowercase();
        !ext.is_empty()
            && path
                .strip_suffix(ext.as_str())
                .is_some_and(|stem| stem.ends_with('.') && stem.len() > 1)
    });

    if is_segment {
        LineKind::SegmentRef
    } else {
        LineKind::OtherUri
    }
}

/// Proxy URL that asks the relay for `segment_path` of `item_id`.
#[must_use]
pub fn segment_proxy_url(public_path: &str, item_id: &str, segment_path: &str) -> String {
    format!(
        "{public_path}?k=segment&itemId={}&path={}",
        utf8_percent_encode(item_id, QUERY_VALUE),
        utf8_percent_encode(segment_path, QUERY_VALUE),
    )
}

/// Rewrite every segment line of `manifest` into a proxy URL.
#[must_use]
pub fn rewrite_manifest(
    manifest: &str,
    item_id: &str,
    public_path: &str,
    extensions: &[String],
) -> String {
    let mut output = String::with_capacity(manifest.len() * 2);

    for chunk in manifest.split_inclusive('\n') {
        let (line, terminator) = split_terminator(chunk);
        match classify_line(line, extensions) {
            LineKind::SegmentRef => {
                output.push_str(&segment_proxy_url(public_path, item_id, line.trim()));
            }
            LineKind::Blank | LineKind::Tag | LineKind::Comment | LineKind::OtherUri => {
                output.push_str(line);
            }
        }
        output.push_str(terminator);
    }

    output
}

fn split_terminator(chunk: &str) -> (&str, &str) {
    if let Some(line) = chunk.strip_suffix("\r\n") {
        (line, "\r\n")
    } else if let Some(line) = chunk.strip_suffix('\n') {
        (line, "\n")
    } else {
        (chunk, "")
    }
}

/// Fetches upstream playlists and rewrites them to point at the relay.
///
/// Playlists are never cached, they describe live stream state.
#[derive(Debug, Clone)]
pub struct ManifestRewriter {
    upstream: Upstream,
    public_path: String,
}

impl ManifestRewriter {
    #[must_use]
    pub fn new(upstream: Upstream, public_path: impl Into<String>) -> Self {
        Self {
            upstream,
            public_path: public_path.into(),
        }
    }

    pub async fn rewrite_playlist(&self, item_id: &str) -> Result<String> {
        let item_id = streamgate_core::error::require("itemId", Some(item_id))?;
        let url = self.upstream.playlist_url(item_id)?;
        let redacted = self.upstream.redact(&url);

        debug!(item_id, url = %redacted, "Fetching upstream playlist");

        let response = self.upstream.client().get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::UpstreamUnavailable(format!(
                "playlist for {item_id} returned {status}"
            )));
        }

        let manifest = response.text().await?;
        let rewritten = rewrite_manifest(
            &manifest,
            item_id,
            &self.public_path,
            self.upstream.segment_extensions(),
        );

        info!(item_id, bytes = rewritten.len(), "Playlist rewritten");
        Ok(rewritten)
    }
}
