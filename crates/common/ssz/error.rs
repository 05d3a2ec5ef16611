use thiserror::Error;

/// Decoding failures. Offsets are absolute positions in the buffer handed to
/// the outermost decode call.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SSZDecodeError {
    #[error("expected {expected} bytes at offset {offset}, found {actual}")]
    InvalidLength {
        offset: usize,
        expected: usize,
        actual: usize,
    },
    #[error("invalid offset value {value} at offset {offset}")]
    InvalidOffset { offset: usize, value: usize },
    #[error("list at offset {offset} holds {len} elements, limit is {max}")]
    ListTooLong { offset: usize, len: usize, max: usize },
    #[error("container at offset {offset} has no field '{name}'")]
    MissingField { offset: usize, name: String },
    #[error("container at offset {offset} has {count} undecoded fields")]
    TrailingFields { offset: usize, count: usize },
    #[error("field '{name}': {source}")]
    Field {
        name: String,
        source: Box<SSZDecodeError>,
    },
}

impl SSZDecodeError {
    /// Absolute offset of the innermost failure.
    pub fn offset(&self) -> usize {
        match self {
            Self::InvalidLength { offset, .. }
            | Self::InvalidOffset { offset, .. }
            | Self::ListTooLong { offset, .. }
            | Self::MissingField { offset, .. }
            | Self::TrailingFields { offset, .. } => *offset,
            Self::Field { source, .. } => source.offset(),
        }
    }
}
