//! Single byte-range requests (`Range: bytes=...`).

use crate::traits::{StorageError, StorageResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteRange {
    /// `bytes=a-b`, inclusive.
    FromTo(u64, u64),
    /// `bytes=a-`
    From(u64),
    /// `bytes=-n`: the last `n` bytes.
    Suffix(u64),
}

impl ByteRange {
    /// Parse a `Range` header value. Multi-range requests are rejected.
    pub fn parse(header: &str) -> StorageResult<Self> {
        let spec = header
            .trim()
            .strip_prefix("bytes=")
            .ok_or_else(|| StorageError::InvalidRange(format!("unsupported range unit: {}", header)))?;

        if spec.contains(',') {
            return Err(StorageError::InvalidRange(
                "multiple ranges are not supported".to_string(),
            ));
        }

        let (start, end) = spec
            .split_once('-')
            .ok_or_else(|| StorageError::InvalidRange(format!("malformed range: {}", header)))?;
        let start = start.trim();
        let end = end.trim();

        let parse = |v: &str| {
            v.parse::<u64>()
                .map_err(|_| StorageError::InvalidRange(format!("malformed range: {}", header)))
        };

        match (start.is_empty(), end.is_empty()) {
            (true, true) => Err(StorageError::InvalidRange(format!(
                "malformed range: {}",
                header
            ))),
            (true, false) => Ok(ByteRange::Suffix(parse(end)?)),
            (false, true) => Ok(ByteRange::From(parse(start)?)),
            (false, false) => {
                let (a, b) = (parse(start)?, parse(end)?);
                if b < a {
                    return Err(StorageError::InvalidRange(format!(
                        "range end before start: {}",
                        header
                    )));
                }
                Ok(ByteRange::FromTo(a, b))
            }
        }
    }

    /// Resolve against an object of `size` bytes into inclusive offsets.
    pub fn resolve(&self, size: u64) -> StorageResult<(u64, u64)> {
        let unsatisfiable = || StorageError::RangeNotSatisfiable(format!("bytes */{}", size));
        if size == 0 {
            return Err(unsatisfiable());
        }
        match *self {
            ByteRange::FromTo(a, b) => {
                if a >= size {
                    return Err(unsatisfiable());
                }
                Ok((a, b.min(size - 1)))
            }
            ByteRange::From(a) => {
                if a >= size {
                    return Err(unsatisfiable());
                }
                Ok((a, size - 1))
            }
            ByteRange::Suffix(n) => {
                if n == 0 {
                    return Err(unsatisfiable());
                }
                Ok((size.saturating_sub(n), size - 1))
            }
        }
    }

    /// Render back into a `Range` header value.
    pub fn to_header(&self) -> String {
        match *self {
            ByteRange::FromTo(a, b) => format!("bytes={}-{}", a, b),
            ByteRange::From(a) => format!("bytes={}-", a),
            ByteRange::Suffix(n) => format!("bytes=-{}", n),
        }
    }
}

/// `Content-Range` value for a resolved range.
pub fn content_range(start: u64, end: u64, size: u64) -> String {
    format!("bytes {}-{}/{}", start, end, size)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_forms() {
        assert_eq!(ByteRange::parse("bytes=0-99").unwrap(), ByteRange::FromTo(0, 99));
        assert_eq!(ByteRange::parse("bytes=100-").unwrap(), ByteRange::From(100));
        assert_eq!(ByteRange::parse("bytes=-5").unwrap(), ByteRange::Suffix(5));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        for header in ["items=0-1", "bytes=-", "bytes=a-b", "bytes=0-1,3-4", "bytes=5-2"] {
            assert!(
                matches!(ByteRange::parse(header), Err(StorageError::InvalidRange(_))),
                "{} should be rejected",
                header
            );
        }
    }

    #[test]
    fn test_resolve_clamps_end() {
        assert_eq!(ByteRange::FromTo(2, 1000).resolve(10).unwrap(), (2, 9));
        assert_eq!(ByteRange::From(4).resolve(10).unwrap(), (4, 9));
        assert_eq!(ByteRange::Suffix(3).resolve(10).unwrap(), (7, 9));
        assert_eq!(ByteRange::Suffix(30).resolve(10).unwrap(), (0, 9));
    }

    #[test]
    fn test_resolve_past_end_is_unsatisfiable() {
        assert!(matches!(
            ByteRange::From(10).resolve(10),
            Err(StorageError::RangeNotSatisfiable(_))
        ));
        assert!(matches!(
            ByteRange::FromTo(0, 1).resolve(0),
            Err(StorageError::RangeNotSatisfiable(_))
        ));
    }

    #[test]
    fn test_header_rendering() {
        assert_eq!(ByteRange::FromTo(1, 2).to_header(), "bytes=1-2");
        assert_eq!(content_range(0, 9, 12), "bytes 0-9/12");
    }
}
