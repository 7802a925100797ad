//! Error types

use thiserror::Error;

/// Local precondition failures, raised before the SDK is contacted
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// `user_id` is empty
    #[error("Enter room params: user id is empty")]
    MissingUserId,

    /// `user_signature` is empty
    #[error("Enter room params: user signature is empty")]
    MissingUserSignature,

    /// Neither the numeric nor the string room id is set
    #[error("Enter room params: room id is empty")]
    MissingRoomId,

    /// A string cannot be handed to C because it contains a NUL byte
    #[error("{field} contains an interior NUL byte")]
    InteriorNul {
        /// Offending field
        field: &'static str,
    },

    /// A path is not valid UTF-8
    #[error("{field} is not valid UTF-8")]
    NonUtf8 {
        /// Offending field
        field: &'static str,
    },

    /// A custom video frame without pixel data
    #[error("Video frame buffer is empty")]
    EmptyFrame,

    /// Declared frame length differs from the buffer's
    #[error("Video frame length mismatch: declared {declared}, buffer holds {actual}")]
    FrameLengthMismatch {
        /// Length the caller declared
        declared: usize,
        /// Length of the buffer
        actual: usize,
    },

    /// A frame dimension or length does not fit the native `int`
    #[error("Video frame {field} {value} is out of range")]
    OutOfRange {
        /// Offending field
        field: &'static str,
        /// Value supplied
        value: u64,
    },
}

/// Errors returned by cloud operations
#[derive(Error, Debug)]
pub enum CloudError {
    /// Parameters rejected locally
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The instance was already torn down
    #[error("Cloud instance already destroyed")]
    Destroyed,

    /// The handler is already registered on this instance
    #[error("Callback handler already registered on this instance")]
    AlreadyRegistered,

    /// The SDK returned no callback table
    #[error("Native engine failed to allocate a callback table")]
    CallbackAllocation,

    /// The SDK returned a null instance
    #[error("Native engine returned a null {0} instance")]
    NullInstance(&'static str),

    /// The SDK library could not be loaded
    #[error(transparent)]
    Library(#[from] trtc_sys::LoadError),

    /// Configuration could not be read
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result alias for cloud operations
pub type Result<T> = std::result::Result<T, CloudError>;
