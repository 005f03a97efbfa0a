//! HLS proxying against the self-hosted media server
//!
//! [`ManifestRewriter`] fetches a playlist and points its segments back at
//! the proxy endpoint; [`SegmentRelay`] answers those rewritten URLs by
//! streaming the upstream segment with the credential attached server-side.

pub mod manifest;
pub mod relay;
pub mod upstream;

pub use manifest::{classify_line, rewrite_manifest, segment_proxy_url, LineKind, ManifestRewriter};
pub use relay::{RangeRequest, RelayedSegment, SegmentRelay, SegmentStream};
pub use upstream::Upstream;

/// Media type players expect for HLS playlists
pub const HLS_CONTENT_TYPE: &str = "application/vnd.apple.mpegurl";

/// Used when upstream does not say what a segment is
pub const DEFAULT_SEGMENT_CONTENT_TYPE: &str = "video/mp2t";
