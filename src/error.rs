/// Error types for the mapsforge reader
use std::fmt;
use std::io;

/// Result type alias for map file operations
pub type Result<T> = std::result::Result<T, MapError>;

/// Main error type for map file operations
#[derive(Debug)]
pub enum MapError {
    /// I/O errors from the backing byte source, including short reads
    Io(io::Error),

    /// Header violations detected while opening a file
    Format(String),

    /// Buffer underruns, invalid counts and invalid offsets inside blocks and records
    Decode(String),

    /// Geometry buffer misuse, such as mixing geometry kinds before a clear
    Geometry(String),

    /// Caller supplied an unusable argument
    InvalidArgument(String),

    /// The query was cancelled before it finished
    Cancelled,
}

impl MapError {
    pub(crate) fn format(msg: impl Into<String>) -> Self {
        MapError::Format(msg.into())
    }

    pub(crate) fn decode(msg: impl Into<String>) -> Self {
        MapError::Decode(msg.into())
    }

    pub(crate) fn short_read(wanted: usize, got: usize, offset: u64) -> Self {
        MapError::Io(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            format!(
                "short read at offset {}: wanted {} bytes, got {}",
                offset, wanted, got
            ),
        ))
    }
}

impl fmt::Display for MapError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MapError::Io(e) => write!(f, "I/O error: {}", e),
            MapError::Format(msg) => write!(f, "Format error: {}", msg),
            MapError::Decode(msg) => write!(f, "Decode error: {}", msg),
            MapError::Geometry(msg) => write!(f, "Geometry error: {}", msg),
            MapError::InvalidArgument(msg) => write!(f, "Invalid argument: {}", msg),
            MapError::Cancelled => write!(f, "Query cancelled"),
        }
    }
}

impl std::error::Error for MapError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            MapError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for MapError {
    fn from(err: io::Error) -> Self {
        MapError::Io(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn test_display_prefixes() {
        assert_eq!(
            MapError::format("invalid magic").to_string(),
            "Format error: invalid magic"
        );
        assert_eq!(
            MapError::decode("buffer underrun").to_string(),
            "Decode error: buffer underrun"
        );
        assert_eq!(MapError::Cancelled.to_string(), "Query cancelled");
    }

    #[test]
    fn test_short_read_is_io_with_source() {
        let err = MapError::short_read(640, 10, 1024);
        assert!(matches!(err, MapError::Io(_)));
        assert!(err.source().is_some());
        assert!(err.to_string().contains("wanted 640 bytes, got 10"));
    }
}
