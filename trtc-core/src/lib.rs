//! Safe Rust binding for the TRTC real-time communication SDK
//!
//! The SDK is a native library reached through a C API. This crate wraps it
//! with:
//!
//! - **Session handles**: [`TrtcCloud`] for the process-wide main instance
//!   and for independent sub-instances, with teardown that cannot be misused
//! - **Callback bridge**: implement [`TrtcCallback`] and register it; native
//!   events are decoded into owned Rust values before your handler sees them
//! - **Type mirror**: Rust enums and records for the SDK's constants and
//!   parameter structs, validated before anything crosses into C
//! - **Async events**: [`EventChannel`] republishes events on a tokio
//!   broadcast channel
//!
//! # Examples
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use trtc_core::{EventChannel, RoomParams, RoleType};
//!
//! # async fn example() -> trtc_core::Result<()> {
//! let cloud = trtc_core::shared()?.instance()?;
//!
//! let events = Arc::new(EventChannel::default());
//! let mut rx = events.subscribe();
//! cloud.add_callback(events)?;
//!
//! let params = RoomParams::new(1400000000, "alice", "<user sig>")
//!     .with_str_room_id("room1")
//!     .with_role(RoleType::Anchor);
//! cloud.enter_room(&params)?;
//!
//! while let Ok(event) = rx.recv().await {
//!     println!("{}", event);
//! }
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![deny(unsafe_op_in_unsafe_fn)]
#![deny(clippy::panic)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

/// Mirrors of the SDK's constants and records
pub mod types;

/// Error types
pub mod error;

/// Event handler interface
pub mod callback;

/// Native engine abstraction
pub mod engine;

/// Configuration file support
pub mod config;

/// Async event stream
pub mod events;

/// Cloud instance handles
pub mod cloud;

/// Process-wide main instance
pub mod shared;

/// Native argument marshalling
pub mod marshal;

mod bridge;

/// In-process engine double for tests
#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

// Re-export main types at crate root
pub use bridge::dropped_native_events;
pub use callback::{CallbackToken, ExtraInfo, TrtcCallback};
pub use cloud::{CloudKind, SessionState, TrtcCloud};
pub use config::{CloudConfig, LogConfig, RecvConfig};
pub use engine::{CloudPtr, DylibEngine, NativeEngine, LIBRARY_ENV};
pub use error::{CloudError, Result, ValidationError};
pub use events::{EventChannel, TrtcEvent};
pub use shared::{init_shared, shared, SharedCloud};
pub use types::*;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::callback::{ExtraInfo, TrtcCallback};
    pub use crate::cloud::{SessionState, TrtcCloud};
    pub use crate::config::CloudConfig;
    pub use crate::error::{CloudError, ValidationError};
    pub use crate::events::{EventChannel, TrtcEvent};
    pub use crate::shared::{shared, SharedCloud};
    pub use crate::types::{
        AppScene, LogLevel, RoleType, RoomParams, VideoEncoderParam, VideoFrame,
        VideoResolution, VideoStreamType,
    };
}
