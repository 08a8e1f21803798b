use thiserror::Error;

/// The error type for this library.
///
/// Errors are deliberately rare: operational misses (a descriptor that does
/// not resolve, a rule that matches nothing) are reported through results
/// and the log rather than through this enum, because the system must keep
/// operating in a degraded-but-safe mode. What remains is genuine API
/// misuse detected up front.
#[derive(Error, Debug)]
pub enum Error {
    /// An instruction stream was constructed from an empty body.
    #[error("Instruction stream is empty")]
    EmptyStream,

    /// A branch operand points past the end of its stream.
    #[error("Branch at index {index} targets {target}, but the stream has {len} instructions")]
    TargetOutOfBounds {
        /// Index of the offending branch instruction.
        index: usize,
        /// The out-of-range target.
        target: usize,
        /// Length of the stream.
        len: usize,
    },

    /// A method was registered twice under the same descriptor.
    #[error("A method is already registered for '{0}'")]
    DuplicateMethod(String),

    /// A configuration setting was bound twice under the same key.
    #[error("A setting named '{0}' is already bound")]
    DuplicateSetting(String),

    /// A configuration setting was read or written before being bound.
    #[error("No setting named '{0}' is bound")]
    UnknownSetting(String),

    /// A rewrite rule was constructed with a negative tolerance.
    #[error("Rewrite rule tolerance must be non-negative, got {0}")]
    NegativeTolerance(f64),
}
