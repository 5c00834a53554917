use thiserror::Error;

/// Which part of the decoder produced an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeStage {
    /// Protobuf framing: varints, tags, lengths.
    Wire,
    /// Tile/layer/feature structure and property tables.
    Tile,
    /// Geometry command streams and numeric scaling.
    Geometry,
    /// Geographic reprojection.
    Projection,
    /// Caller-supplied options or payload preparation.
    Config,
}

/// Errors that can occur while decoding a vector tile.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum DecodeError {
    /// No terminating byte within the 64-bit varint width.
    #[error("Malformed varint at byte {offset}")]
    MalformedVarint { offset: usize },

    /// Varint wider than the integer it is read into.
    #[error("Varint {value} at byte {offset} does not fit in {bits} bits")]
    VarintOverflow { value: u64, bits: u8, offset: usize },

    /// Field tag is zero, reserved, or wider than 32 bits.
    #[error("Field tag {tag} at byte {offset} is out of range")]
    TagOutOfRange { tag: u64, offset: usize },

    /// Skip requested for a wire type this format does not use.
    #[error("Undefined wire type {wire_type} at byte {offset}")]
    UndefinedWireType { wire_type: u8, offset: usize },

    /// Feature, key or value index beyond its table.
    #[error("{table} index {index} out of range (len {len})")]
    IndexOutOfRange {
        table: &'static str,
        index: usize,
        len: usize,
    },

    /// A read or skip would run past the end of the buffer.
    #[error("Read of {requested} bytes at byte {offset} overruns buffer of {len} bytes")]
    BufferOverrun {
        offset: usize,
        requested: usize,
        len: usize,
    },

    /// Projected coordinate outside the Web Mercator envelope.
    #[error("Projected coordinate ({lng}, {lat}) is outside the Web Mercator bounds")]
    OutOfRange { lng: f64, lat: f64 },

    /// Scale target that is not int, long or float.
    #[error("Unsupported scale type '{0}' (expected int, long or float)")]
    UnsupportedScaleType(String),

    #[error("Invalid UTF-8 in string field at byte {offset}")]
    InvalidUtf8 { offset: usize },

    #[error("Layer '{layer}' has invalid extent {extent}")]
    InvalidExtent { layer: String, extent: u64 },

    #[error("Layer '{layer}' has invalid version {version}")]
    InvalidVersion { layer: String, version: u64 },

    #[error("Feature tag list has odd length {len}")]
    OddTagCount { len: usize },

    #[error("Value {index} in layer '{layer}' carries no scalar")]
    MissingValue { layer: String, index: usize },

    #[error("Geometry command at position {position} needs {needed} parameters, {available} left")]
    TruncatedGeometry {
        position: usize,
        needed: usize,
        available: usize,
    },

    #[error("Failed to inflate tile payload: {0}")]
    Decompress(String),

    #[error("Invalid decode options: {0}")]
    InvalidOptions(String),
}

impl DecodeError {
    pub fn stage(&self) -> DecodeStage {
        match self {
            DecodeError::MalformedVarint { .. }
            | DecodeError::VarintOverflow { .. }
            | DecodeError::TagOutOfRange { .. }
            | DecodeError::UndefinedWireType { .. }
            | DecodeError::BufferOverrun { .. }
            | DecodeError::InvalidUtf8 { .. } => DecodeStage::Wire,
            DecodeError::IndexOutOfRange { .. }
            | DecodeError::InvalidExtent { .. }
            | DecodeError::InvalidVersion { .. }
            | DecodeError::OddTagCount { .. }
            | DecodeError::MissingValue { .. } => DecodeStage::Tile,
            DecodeError::TruncatedGeometry { .. }
            | DecodeError::UnsupportedScaleType(_) => DecodeStage::Geometry,
            DecodeError::OutOfRange { .. } => DecodeStage::Projection,
            DecodeError::Decompress(_) | DecodeError::InvalidOptions(_) => DecodeStage::Config,
        }
    }
}

pub type DecodeResult<T> = Result<T, DecodeError>;
