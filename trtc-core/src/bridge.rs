//! Native event dispatch
//!
//! Each registered handler owns one native callback table. The table's `ctx`
//! points at a boxed [`BridgeContext`]; the `extern "C"` trampolines below
//! turn that pointer back into the handler and forward the event.
//!
//! Events the SDK delivers with a null context or a null string argument are
//! dropped. Drops are logged at debug level and counted, see
//! [`dropped_native_events`].

use crate::callback::{ExtraInfo, TrtcCallback};
use crate::cloud::SessionStateCell;
use crate::engine::NativeEngine;
use crate::error::{CloudError, Result};
use std::ffi::c_void;
use std::os::raw::{c_char, c_int};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::ptr::NonNull;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use trtc_sys::{self as sys, TrtcCloudCallback};

static DROPPED_EVENTS: AtomicU64 = AtomicU64::new(0);

/// Number of native events dropped for null arguments since process start
pub fn dropped_native_events() -> u64 {
    DROPPED_EVENTS.load(Ordering::Relaxed)
}

/// What a trampoline needs to deliver an event
#[derive(Clone)]
pub(crate) struct BridgeContext {
    handler: Arc<dyn TrtcCallback>,
    state: Arc<SessionStateCell>,
}

/// One handler's native callback table and the context it points at
pub(crate) struct Registration {
    table: NonNull<TrtcCloudCallback>,
    context: NonNull<BridgeContext>,
}

// SAFETY: the table is only touched by the engine and the context is only read
// through shared references from trampolines; both are freed by `release`.
unsafe impl Send for Registration {}

impl Registration {
    /// Allocate a table and point every entry at a trampoline
    pub(crate) fn install(
        engine: &dyn NativeEngine,
        handler: Arc<dyn TrtcCallback>,
        state: Arc<SessionStateCell>,
    ) -> Result<Self> {
        let table = engine
            .create_callback()
            .ok_or(CloudError::CallbackAllocation)?;
        let context = NonNull::from(Box::leak(Box::new(BridgeContext { handler, state })));

        // SAFETY: the table was just allocated and is not yet registered, so
        // nothing else reads it while it is filled.
        unsafe { fill_table(&mut *table.as_ptr(), context.as_ptr().cast()) };

        Ok(Self { table, context })
    }

    pub(crate) fn table(&self) -> NonNull<TrtcCloudCallback> {
        self.table
    }

    /// Free the table and the context
    ///
    /// The table must already be unregistered from its cloud.
    pub(crate) fn release(self, engine: &dyn NativeEngine) {
        engine.destroy_callback(self.table);
        // SAFETY: leaked from a Box in `install`; the only table pointing at
        // it was destroyed above.
        drop(unsafe { Box::from_raw(self.context.as_ptr()) });
    }
}

fn fill_table(table: &mut TrtcCloudCallback, ctx: *mut c_void) {
    table.ctx = ctx;
    table.on_error = Some(on_error);
    table.on_warning = Some(on_warning);
    table.on_enter_room = Some(on_enter_room);
    table.on_exit_room = Some(on_exit_room);
    table.on_remote_user_enter_room = Some(on_remote_user_enter_room);
    table.on_remote_user_leave_room = Some(on_remote_user_leave_room);
    table.on_send_first_local_video_frame = Some(on_send_first_local_video_frame);
    table.on_send_first_local_audio_frame = Some(on_send_first_local_audio_frame);
    table.on_connection_lost = Some(on_connection_lost);
    table.on_try_to_reconnect = Some(on_try_to_reconnect);
    table.on_connection_recovery = Some(on_connection_recovery);
}

fn note_dropped(event: &'static str, reason: &'static str) {
    DROPPED_EVENTS.fetch_add(1, Ordering::Relaxed);
    tracing::debug!(event, reason, "Dropped native event");
}

/// Resolve the context pointer of a table
///
/// Returns a copy: a handler may unregister itself while it runs, which frees
/// the boxed context, so nothing may borrow from it during delivery.
///
/// # Safety
/// `ctx` must be null or the context of a live [`Registration`].
unsafe fn context(ctx: *mut c_void, event: &'static str) -> Option<BridgeContext> {
    match NonNull::new(ctx.cast::<BridgeContext>()) {
        // SAFETY: guaranteed by the caller
        Some(ptr) => Some(unsafe { ptr.as_ref() }.clone()),
        None => {
            note_dropped(event, "null context");
            None
        }
    }
}

/// Copy a string argument the event cannot do without
///
/// # Safety
/// `ptr` must be null or a valid null-terminated string.
unsafe fn required_str(ptr: *const c_char, event: &'static str) -> Option<String> {
    // SAFETY: guaranteed by the caller
    let value = unsafe { sys::c_char_to_string(ptr) };
    if value.is_none() {
        note_dropped(event, "null string");
    }
    value
}

/// Run a handler method without letting a panic unwind into native frames
fn deliver(event: &'static str, f: impl FnOnce()) {
    if catch_unwind(AssertUnwindSafe(f)).is_err() {
        tracing::error!(event, "Callback handler panicked");
    }
}

unsafe extern "C" fn on_error(
    ctx: *mut c_void,
    err_code: c_int,
    err_msg: *const c_char,
    extra_info: *mut c_void,
) {
    let Some(cx) = (unsafe { context(ctx, "error") }) else {
        return;
    };
    let Some(msg) = (unsafe { required_str(err_msg, "error") }) else {
        return;
    };
    let extra = ExtraInfo::new(extra_info);
    deliver("error", || cx.handler.on_error(err_code, &msg, extra));
}

unsafe extern "C" fn on_warning(
    ctx: *mut c_void,
    warning_code: c_int,
    warning_msg: *const c_char,
    extra_info: *mut c_void,
) {
    let Some(cx) = (unsafe { context(ctx, "warning") }) else {
        return;
    };
    let Some(msg) = (unsafe { required_str(warning_msg, "warning") }) else {
        return;
    };
    let extra = ExtraInfo::new(extra_info);
    deliver("warning", || cx.handler.on_warning(warning_code, &msg, extra));
}

unsafe extern "C" fn on_enter_room(ctx: *mut c_void, result: c_int) {
    let Some(cx) = (unsafe { context(ctx, "enter_room") }) else {
        return;
    };
    cx.state.enter_result(result);
    deliver("enter_room", || cx.handler.on_enter_room(result));
}

unsafe extern "C" fn on_exit_room(ctx: *mut c_void, reason: c_int) {
    let Some(cx) = (unsafe { context(ctx, "exit_room") }) else {
        return;
    };
    cx.state.exited();
    deliver("exit_room", || cx.handler.on_exit_room(reason));
}

unsafe extern "C" fn on_remote_user_enter_room(ctx: *mut c_void, user_id: *const c_char) {
    let Some(cx) = (unsafe { context(ctx, "remote_user_enter_room") }) else {
        return;
    };
    let Some(user_id) = (unsafe { required_str(user_id, "remote_user_enter_room") }) else {
        return;
    };
    deliver("remote_user_enter_room", || {
        cx.handler.on_remote_user_enter_room(&user_id)
    });
}

unsafe extern "C" fn on_remote_user_leave_room(
    ctx: *mut c_void,
    user_id: *const c_char,
    reason: c_int,
) {
    let Some(cx) = (unsafe { context(ctx, "remote_user_leave_room") }) else {
        return;
    };
    let Some(user_id) = (unsafe { required_str(user_id, "remote_user_leave_room") }) else {
        return;
    };
    deliver("remote_user_leave_room", || {
        cx.handler.on_remote_user_leave_room(&user_id, reason)
    });
}

unsafe extern "C" fn on_send_first_local_video_frame(ctx: *mut c_void, stream_type: c_int) {
    let Some(cx) = (unsafe { context(ctx, "send_first_local_video_frame") }) else {
        return;
    };
    deliver("send_first_local_video_frame", || {
        cx.handler.on_send_first_local_video_frame(stream_type)
    });
}

unsafe extern "C" fn on_send_first_local_audio_frame(ctx: *mut c_void) {
    let Some(cx) = (unsafe { context(ctx, "send_first_local_audio_frame") }) else {
        return;
    };
    deliver("send_first_local_audio_frame", || {
        cx.handler.on_send_first_local_audio_frame()
    });
}

unsafe extern "C" fn on_connection_lost(ctx: *mut c_void) {
    let Some(cx) = (unsafe { context(ctx, "connection_lost") }) else {
        return;
    };
    deliver("connection_lost", || cx.handler.on_connection_lost());
}

unsafe extern "C" fn on_try_to_reconnect(ctx: *mut c_void) {
    let Some(cx) = (unsafe { context(ctx, "try_to_reconnect") }) else {
        return;
    };
    deliver("try_to_reconnect", || cx.handler.on_try_to_reconnect());
}

unsafe extern "C" fn on_connection_recovery(ctx: *mut c_void) {
    let Some(cx) = (unsafe { context(ctx, "connection_recovery") }) else {
        return;
    };
    deliver("connection_recovery", || cx.handler.on_connection_recovery());
}
