//! C layouts shared with the native SDK

use std::ffi::{c_void, CStr};
use std::os::raw::{c_char, c_int};

/// Opaque native cloud instance
#[repr(C)]
pub struct TrtcCloudHandle {
    _address: u8,
}

pub type TrtcRoleType = c_int;
pub const TRTC_ROLE_ANCHOR: TrtcRoleType = 20;
pub const TRTC_ROLE_AUDIENCE: TrtcRoleType = 21;

pub type TrtcAppScene = c_int;
pub const TRTC_APP_SCENE_VIDEO_CALL: TrtcAppScene = 0;
pub const TRTC_APP_SCENE_LIVE: TrtcAppScene = 1;
pub const TRTC_APP_SCENE_AUDIO_CALL: TrtcAppScene = 2;
pub const TRTC_APP_SCENE_VOICE_CHAT_ROOM: TrtcAppScene = 3;

pub type TrtcVideoStreamType = c_int;
pub const TRTC_VIDEO_STREAM_TYPE_BIG: TrtcVideoStreamType = 0;
pub const TRTC_VIDEO_STREAM_TYPE_SMALL: TrtcVideoStreamType = 1;
pub const TRTC_VIDEO_STREAM_TYPE_SUB: TrtcVideoStreamType = 2;

pub type TrtcVideoRotation = c_int;
pub const TRTC_VIDEO_ROTATION_0: TrtcVideoRotation = 0;
pub const TRTC_VIDEO_ROTATION_90: TrtcVideoRotation = 1;
pub const TRTC_VIDEO_ROTATION_180: TrtcVideoRotation = 2;
pub const TRTC_VIDEO_ROTATION_270: TrtcVideoRotation = 3;

pub type TrtcVideoResolutionMode = c_int;
pub const TRTC_VIDEO_RESOLUTION_MODE_LANDSCAPE: TrtcVideoResolutionMode = 0;
pub const TRTC_VIDEO_RESOLUTION_MODE_PORTRAIT: TrtcVideoResolutionMode = 1;

/// Room entry request (`CTRTCParams`)
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct TrtcParams {
    pub sdk_app_id: u32,
    pub room_id: u32,
    pub user_id: *const c_char,
    pub user_sig: *const c_char,
    pub str_room_id: *const c_char,
    pub private_map_key: *const c_char,
    pub role: TrtcRoleType,
}

/// Video encoder settings (`CTRTCVideoEncParam`)
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrtcVideoEncParam {
    pub video_resolution: c_int,
    pub res_mode: TrtcVideoResolutionMode,
    pub video_fps: u32,
    pub video_bitrate: u32,
    pub min_video_bitrate: u32,
    pub enable_adjust_res: bool,
}

pub type OnErrorFn = unsafe extern "C" fn(
    ctx: *mut c_void,
    err_code: c_int,
    err_msg: *const c_char,
    extra_info: *mut c_void,
);
pub type OnWarningFn = unsafe extern "C" fn(
    ctx: *mut c_void,
    warning_code: c_int,
    warning_msg: *const c_char,
    extra_info: *mut c_void,
);
pub type OnEnterRoomFn = unsafe extern "C" fn(ctx: *mut c_void, result: c_int);
pub type OnExitRoomFn = unsafe extern "C" fn(ctx: *mut c_void, reason: c_int);
pub type OnSendFirstLocalVideoFrameFn = unsafe extern "C" fn(ctx: *mut c_void, stream_type: c_int);
pub type OnRemoteUserEnterRoomFn = unsafe extern "C" fn(ctx: *mut c_void, user_id: *const c_char);
pub type OnRemoteUserLeaveRoomFn =
    unsafe extern "C" fn(ctx: *mut c_void, user_id: *const c_char, reason: c_int);
/// Events without arguments: first audio frame, connection lost/retry/recovered
pub type OnNotifyFn = unsafe extern "C" fn(ctx: *mut c_void);

/// Callback table (`CTrtcCloudCallback`)
///
/// The native side hands `ctx` back as the first argument of every entry.
/// A `None` entry means the event is not subscribed.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct TrtcCloudCallback {
    pub ctx: *mut c_void,
    pub on_error: Option<OnErrorFn>,
    pub on_warning: Option<OnWarningFn>,
    pub on_enter_room: Option<OnEnterRoomFn>,
    pub on_exit_room: Option<OnExitRoomFn>,
    pub on_remote_user_enter_room: Option<OnRemoteUserEnterRoomFn>,
    pub on_remote_user_leave_room: Option<OnRemoteUserLeaveRoomFn>,
    pub on_send_first_local_video_frame: Option<OnSendFirstLocalVideoFrameFn>,
    pub on_send_first_local_audio_frame: Option<OnNotifyFn>,
    pub on_connection_lost: Option<OnNotifyFn>,
    pub on_try_to_reconnect: Option<OnNotifyFn>,
    pub on_connection_recovery: Option<OnNotifyFn>,
}

impl Default for TrtcCloudCallback {
    fn default() -> Self {
        Self {
            ctx: std::ptr::null_mut(),
            on_error: None,
            on_warning: None,
            on_enter_room: None,
            on_exit_room: None,
            on_remote_user_enter_room: None,
            on_remote_user_leave_room: None,
            on_send_first_local_video_frame: None,
            on_send_first_local_audio_frame: None,
            on_connection_lost: None,
            on_try_to_reconnect: None,
            on_connection_recovery: None,
        }
    }
}

/// Copy a C string into an owned Rust string
///
/// Invalid UTF-8 is replaced with U+FFFD rather than rejected, so the copy
/// never depends on the native buffer after this call returns.
///
/// # Safety
/// `ptr` must be a valid null-terminated C string or null
pub unsafe fn c_char_to_string(ptr: *const c_char) -> Option<String> {
    if ptr.is_null() {
        return None;
    }

    Some(CStr::from_ptr(ptr).to_string_lossy().into_owned())
}
