//! HTTP byte-range parsing and resolution.
//!
//! The orchestrator parses the `Range` header and resolves it against the
//! object size before asking the data path for bytes. Resolution follows
//! the S3 rules: an open-ended `start-` runs to the last byte, a suffix
//! `-N` returns the final `N` bytes, and a start beyond the last byte is
//! unsatisfiable.

/// A parsed `Range: bytes=...` header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeSpec {
    /// `bytes=a-b`, both ends inclusive.
    FromTo(u64, u64),
    /// `bytes=a-`, from `a` to the end.
    From(u64),
    /// `bytes=-n`, the final `n` bytes.
    Suffix(u64),
}

/// Parse a `Range` header value. Only single `bytes=` ranges are
/// supported; anything else returns `None` and the caller serves the whole
/// object.
#[must_use]
pub fn parse_range_header(value: &str) -> Option<RangeSpec> {
    let spec = value.trim().strip_prefix("bytes=")?;
    if spec.contains(',') {
        return None;
    }
    let (start, end) = spec.split_once('-')?;
    let start = start.trim();
    let end = end.trim();

    match (start.is_empty(), end.is_empty()) {
        (true, false) => end.parse().ok().map(RangeSpec::Suffix),
        (false, true) => start.parse().ok().map(RangeSpec::From),
        (false, false) => {
            let a: u64 = start.parse().ok()?;
            let b: u64 = end.parse().ok()?;
            Some(RangeSpec::FromTo(a, b))
        }
        (true, true) => None,
    }
}

/// Resolve a range against the object size into inclusive `(start, end)`
/// offsets.
///
/// Returns `None` when the range is unsatisfiable (`start > size-1`, an
/// inverted range, or an empty suffix); the caller answers 416 with
/// `Content-Range: bytes */<size>`.
#[must_use]
pub fn resolve_range(spec: RangeSpec, size: u64) -> Option<(u64, u64)> {
    if size == 0 {
        return None;
    }
    let last = size - 1;
    match spec {
        RangeSpec::FromTo(start, end) => {
            if start > last || start > end {
                return None;
            }
            Some((start, end.min(last)))
        }
        RangeSpec::From(start) => {
            if start > last {
                return None;
            }
            Some((start, last))
        }
        RangeSpec::Suffix(n) => {
            if n == 0 {
                return None;
            }
            Some((size.saturating_sub(n), last))
        }
    }
}
