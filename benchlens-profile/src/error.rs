use thiserror::Error;

/// Errors from decoding or validating a sample set
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AnalysisError {
    /// The gzip envelope could not be inflated.
    #[error("failed to decompress profile: {0}")]
    Decompress(#[from] std::io::Error),

    /// The payload is not a valid `profile.proto` message.
    #[error("failed to decode profile: {0}")]
    Decode(#[from] prost::DecodeError),

    /// A sample carries a different number of values than the profile declares.
    #[error("sample {index} has {got} values, profile declares {expected} sample types")]
    ValueCountMismatch {
        /// Position of the sample in the profile
        index: usize,
        /// Number of declared sample types
        expected: usize,
        /// Number of values the sample carries
        got: usize,
    },

    /// A sample references a location id that is not in the location table.
    #[error("sample references unknown location id {0}")]
    UnknownLocation(u64),

    /// A location line references a function id that is not in the function table.
    #[error("location references unknown function id {0}")]
    UnknownFunction(u64),

    /// A string-table index is out of range.
    #[error("string table index {0} out of range")]
    UnknownString(i64),
}
