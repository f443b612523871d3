//! `Range` header parsing.

/// An inclusive byte range within a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub start: u64,
    pub end: u64,
}

impl ByteRange {
    /// Number of bytes covered.
    pub fn byte_count(&self) -> u64 {
        self.end - self.start + 1
    }

    /// `Content-Range` value for a file of `size` bytes.
    pub fn content_range(&self, size: u64) -> String {
        format!("bytes {}-{}/{}", self.start, self.end, size)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RangeError {
    /// Not a single `bytes=<start>-<end>` range.
    #[error("malformed range header: {0:?}")]
    Malformed(String),

    /// Syntactically fine but outside the file.
    #[error("range not satisfiable for {size} byte file")]
    Unsatisfiable { size: u64 },
}

const UNIT_PREFIX: &str = "bytes=";

/// Parse a `Range` header against a file of `size` bytes.
///
/// Supports one `bytes=<start>-<end>` range. An absent end means the last
/// byte of the file, an absent start means byte 0. An end past the file is
/// clamped to the last byte.
///
/// # Examples
///
/// ```
/// use nepenthe::streaming::{parse_range, ByteRange};
///
/// assert_eq!(
///     parse_range("bytes=100-199", 1000).unwrap(),
///     ByteRange { start: 100, end: 199 }
/// );
/// assert!(parse_range("bytes=2000-", 1000).is_err());
/// ```
pub fn parse_range(header: &str, size: u64) -> Result<ByteRange, RangeError> {
    let malformed = || RangeError::Malformed(header.to_string());

    // The unit name is case-insensitive.
    let header_value = header.trim();
    let spec = header_value
        .get(..UNIT_PREFIX.len())
        .filter(|unit| unit.eq_ignore_ascii_case(UNIT_PREFIX))
        .map(|_| &header_value[UNIT_PREFIX.len()..])
        .ok_or_else(malformed)?;
    let (start, end) = spec.split_once('-').ok_or_else(malformed)?;
    let (start, end) = (start.trim(), end.trim());

    let start: u64 = if start.is_empty() {
        0
    } else {
        start.parse().map_err(|_| malformed())?
    };
    let end: Option<u64> = if end.is_empty() {
        None
    } else {
        Some(end.parse().map_err(|_| malformed())?)
    };

    if size == 0 || start >= size {
        return Err(RangeError::Unsatisfiable { size });
    }
    let end = end.map_or(size - 1, |e| e.min(size - 1));
    if start > end {
        return Err(RangeError::Unsatisfiable { size });
    }

    Ok(ByteRange { start, end })
}
