//! Event handler interface
//!
//! Implement [`TrtcCallback`] and register it with
//! [`TrtcCloud::add_callback`](crate::TrtcCloud::add_callback). Methods are
//! invoked synchronously on whichever SDK thread delivers the event, so they
//! should return quickly and must not block on the SDK.

use std::ffi::c_void;
use std::marker::PhantomData;
use std::sync::Arc;

/// Opaque extra payload attached to error and warning events
///
/// Owned by the SDK and valid only while the handler method runs; the
/// binding neither copies nor frees it.
#[derive(Debug, Clone, Copy)]
pub struct ExtraInfo<'a> {
    ptr: *mut c_void,
    _call: PhantomData<&'a c_void>,
}

impl ExtraInfo<'_> {
    pub(crate) fn new(ptr: *mut c_void) -> Self {
        Self {
            ptr,
            _call: PhantomData,
        }
    }

    /// Raw payload pointer
    pub fn as_ptr(&self) -> *mut c_void {
        self.ptr
    }

    /// Whether the SDK attached anything
    pub fn is_null(&self) -> bool {
        self.ptr.is_null()
    }
}

/// Handler for SDK events
///
/// Every method has an empty default body.
#[allow(unused_variables)]
pub trait TrtcCallback: Send + Sync {
    /// Unrecoverable SDK error
    fn on_error(&self, err_code: i32, err_msg: &str, extra_info: ExtraInfo<'_>) {}

    /// Recoverable SDK warning
    fn on_warning(&self, warning_code: i32, warning_msg: &str, extra_info: ExtraInfo<'_>) {}

    /// Outcome of `enter_room`: elapsed milliseconds if positive, error code if negative
    fn on_enter_room(&self, result: i32) {}

    /// Left the room: 0 on request, 1 kicked out, 2 room dismissed
    fn on_exit_room(&self, reason: i32) {}

    /// First local video frame went out on `stream_type`
    fn on_send_first_local_video_frame(&self, stream_type: i32) {}

    /// First local audio frame went out
    fn on_send_first_local_audio_frame(&self) {}

    /// A remote user joined the room
    fn on_remote_user_enter_room(&self, user_id: &str) {}

    /// A remote user left the room
    fn on_remote_user_leave_room(&self, user_id: &str, reason: i32) {}

    /// Connection to the server was lost
    fn on_connection_lost(&self) {}

    /// The SDK is trying to reconnect
    fn on_try_to_reconnect(&self) {}

    /// Connection restored
    fn on_connection_recovery(&self) {}
}

/// Handle for a registered callback, used to remove it
///
/// Derived from the handler's identity, so registering the same `Arc` on
/// another instance yields an equal token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CallbackToken(usize);

impl CallbackToken {
    pub(crate) fn of(handler: &Arc<dyn TrtcCallback>) -> Self {
        Self(Arc::as_ptr(handler).cast::<()>() as usize)
    }
}
