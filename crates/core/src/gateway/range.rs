//! `Range` header handling for single byte ranges.

use super::GatewayError;

/// A syntactically valid `Range` request, not yet checked against a length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeRequest {
    /// `bytes=start-` or `bytes=start-end`.
    From { start: u64, end: Option<u64> },
    /// `bytes=-n`: the last `n` bytes.
    Suffix(u64),
}

impl RangeRequest {
    /// Parse a `Range` header value.
    ///
    /// Only a single `bytes` range is accepted; lists of ranges are rejected.
    pub fn parse(header: &str) -> Result<Self, GatewayError> {
        let malformed = || GatewayError::MalformedRange(header.to_string());

        let (unit, spec) = header.trim().split_once('=').ok_or_else(malformed)?;
        if !unit.trim().eq_ignore_ascii_case("bytes") {
            return Err(malformed());
        }
        if spec.contains(',') {
            return Err(malformed());
        }

        let (start, end) = spec.trim().split_once('-').ok_or_else(malformed)?;
        let (start, end) = (start.trim(), end.trim());

        match (start.is_empty(), end.is_empty()) {
            (true, true) => Err(malformed()),
            (true, false) => Ok(Self::Suffix(parse_offset(end).ok_or_else(malformed)?)),
            (false, true) => Ok(Self::From {
                start: parse_offset(start).ok_or_else(malformed)?,
                end: None,
            }),
            (false, false) => Ok(Self::From {
                start: parse_offset(start).ok_or_else(malformed)?,
                end: Some(parse_offset(end).ok_or_else(malformed)?),
            }),
        }
    }

    /// Resolve against the file length.
    ///
    /// An omitted end means the last byte. Ranges that start past the end,
    /// reach past it, or run backwards are not satisfiable; they are not
    /// clamped.
    pub fn resolve(self, total: u64) -> Result<ByteRange, GatewayError> {
        let unsatisfiable = GatewayError::RangeNotSatisfiable { total };

        let (start, end) = match self {
            Self::From { start, end } => (start, end.unwrap_or(total.saturating_sub(1))),
            Self::Suffix(0) => return Err(unsatisfiable),
            Self::Suffix(n) => (total.saturating_sub(n), total.saturating_sub(1)),
        };

        if total == 0 || start >= total || end >= total || end < start {
            return Err(unsatisfiable);
        }

        Ok(ByteRange { start, end, total })
    }
}

fn parse_offset(value: &str) -> Option<u64> {
    if value.is_empty() || !value.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    value.parse().ok()
}

/// An inclusive byte window inside a file of known length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub start: u64,
    pub end: u64,
    pub total: u64,
}

impl ByteRange {
    /// Number of bytes in the window.
    pub fn len(&self) -> u64 {
        self.end - self.start + 1
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// `Content-Range` value for a 206 response.
    pub fn content_range(&self) -> String {
        format!("bytes {}-{}/{}", self.start, self.end, self.total)
    }
}

/// `Content-Range` value for a 416 response.
pub fn unsatisfiable_content_range(total: u64) -> String {
    format!("bytes */{}", total)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolve(header: &str, total: u64) -> Result<ByteRange, GatewayError> {
        RangeRequest::parse(header)?.resolve(total)
    }

    #[test]
    fn test_bounded_range() {
        let range = resolve("bytes=0-499", 1000).unwrap();
        assert_eq!((range.start, range.end, range.len()), (0, 499, 500));
        assert_eq!(range.content_range(), "bytes 0-499/1000");
    }

    #[test]
    fn test_open_ended_range() {
        let range = resolve("bytes=500-", 1000).unwrap();
        assert_eq!((range.start, range.end, range.len()), (500, 999, 500));
        assert_eq!(range.content_range(), "bytes 500-999/1000");
    }

    #[test]
    fn test_single_byte_ranges() {
        assert_eq!(resolve("bytes=0-0", 1000).unwrap().len(), 1);
        let last = resolve("bytes=999-999", 1000).unwrap();
        assert_eq!(last.len(), 1);
        assert_eq!(last.content_range(), "bytes 999-999/1000");
    }

    #[test]
    fn test_suffix_range() {
        let range = resolve("bytes=-100", 1000).unwrap();
        assert_eq!((range.start, range.end), (900, 999));

        let whole = resolve("bytes=-5000", 1000).unwrap();
        assert_eq!((whole.start, whole.end), (0, 999));
    }

    #[test]
    fn test_start_past_end_not_satisfiable() {
        let err = resolve("bytes=1000-1005", 1000).unwrap_err();
        assert!(matches!(err, GatewayError::RangeNotSatisfiable { total: 1000 }));
        assert!(matches!(
            resolve("bytes=1000-", 1000),
            Err(GatewayError::RangeNotSatisfiable { .. })
        ));
    }

    #[test]
    fn test_end_past_total_not_clamped() {
        assert!(matches!(
            resolve("bytes=0-1000", 1000),
            Err(GatewayError::RangeNotSatisfiable { total: 1000 })
        ));
    }

    #[test]
    fn test_backwards_range_not_satisfiable() {
        assert!(matches!(
            resolve("bytes=500-100", 1000),
            Err(GatewayError::RangeNotSatisfiable { .. })
        ));
    }

    #[test]
    fn test_zero_suffix_and_empty_file_not_satisfiable() {
        assert!(matches!(
            resolve("bytes=-0", 1000),
            Err(GatewayError::RangeNotSatisfiable { .. })
        ));
        assert!(matches!(
            resolve("bytes=0-", 0),
            Err(GatewayError::RangeNotSatisfiable { total: 0 })
        ));
    }

    #[test]
    fn test_malformed_headers() {
        for header in [
            "",
            "bytes",
            "bytes=",
            "bytes=-",
            "bytes=abc-10",
            "bytes=10-xyz",
            "bytes=+5-10",
            "items=0-10",
            "bytes=0-10,20-30",
            "bytes=0_10",
        ] {
            assert!(
                matches!(RangeRequest::parse(header), Err(GatewayError::MalformedRange(_))),
                "expected malformed: {:?}",
                header
            );
        }
    }

    #[test]
    fn test_parse_tolerates_whitespace_and_unit_case() {
        assert_eq!(
            RangeRequest::parse(" Bytes=10 - 20 ").unwrap(),
            RangeRequest::From {
                start: 10,
                end: Some(20)
            }
        );
    }

    #[test]
    fn test_unsatisfiable_content_range() {
        assert_eq!(unsatisfiable_content_range(1000), "bytes */1000");
    }
}
