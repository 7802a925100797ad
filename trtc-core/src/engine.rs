//! Native engine abstraction
//!
//! [`NativeEngine`] has one method per SDK entry point. [`DylibEngine`] is the
//! production implementation over the run-time loaded SDK; tests and tools
//! that have no SDK at hand substitute their own implementation.

use crate::error::{CloudError, Result};
use crate::marshal::FrameData;
use std::ffi::{CStr, OsString};
use std::os::raw::c_int;
use std::path::Path;
use std::ptr::NonNull;
use trtc_sys::{self as sys, TrtcApi, TrtcCloudCallback, TrtcCloudHandle};

/// Environment variable naming the SDK library to load
pub const LIBRARY_ENV: &str = "TRTC_LIBRARY_PATH";

/// Opaque handle to one native cloud instance
///
/// Only meaningful to the engine that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CloudPtr(NonNull<TrtcCloudHandle>);

// SAFETY: the SDK's cloud objects are internally synchronised; the handle is
// only an address and is never dereferenced on this side.
unsafe impl Send for CloudPtr {}
unsafe impl Sync for CloudPtr {}

impl CloudPtr {
    /// Wrap a raw instance pointer, `None` if it is null
    pub fn new(ptr: *mut TrtcCloudHandle) -> Option<Self> {
        NonNull::new(ptr).map(Self)
    }

    /// Raw instance pointer
    pub fn as_ptr(self) -> *mut TrtcCloudHandle {
        self.0.as_ptr()
    }
}

/// Entry points of the native SDK
///
/// Pointer arguments (the request in `enter_room`, the table in the callback
/// methods) are valid for the duration of the call only, except callback
/// tables, which live from `create_callback` until `destroy_callback`.
pub trait NativeEngine: Send + Sync + 'static {
    /// Get or create the process-wide instance
    fn share_instance(&self) -> Option<CloudPtr>;
    /// Destroy the process-wide instance
    fn destroy_share_instance(&self);
    /// Create an independent instance
    fn create_sub_cloud(&self) -> Option<CloudPtr>;
    /// Destroy an independent instance
    fn destroy_sub_cloud(&self, cloud: CloudPtr);

    /// SDK version string
    fn sdk_version(&self, cloud: CloudPtr) -> String;
    /// Toggle SDK console logging
    fn set_console_enabled(&self, cloud: CloudPtr, enabled: bool);
    /// Toggle SDK log file compression
    fn set_log_compress_enabled(&self, cloud: CloudPtr, enabled: bool);
    /// Set SDK log verbosity
    fn set_log_level(&self, cloud: CloudPtr, level: c_int);
    /// Set SDK log directory
    fn set_log_dir_path(&self, cloud: CloudPtr, path: &CStr);

    /// Pause or resume sending local video
    fn mute_local_video(&self, cloud: CloudPtr, stream_type: c_int, mute: bool);
    /// Pause or resume sending local audio
    fn mute_local_audio(&self, cloud: CloudPtr, mute: bool);

    /// Allocate an empty callback table
    fn create_callback(&self) -> Option<NonNull<TrtcCloudCallback>>;
    /// Free a callback table
    fn destroy_callback(&self, table: NonNull<TrtcCloudCallback>);
    /// Start delivering events to a table
    fn add_callback(&self, cloud: CloudPtr, table: NonNull<TrtcCloudCallback>);
    /// Stop delivering events to a table
    fn remove_callback(&self, cloud: CloudPtr, table: NonNull<TrtcCloudCallback>);

    /// Request to join a room; the outcome arrives as an enter-room event
    fn enter_room(&self, cloud: CloudPtr, params: &sys::TrtcParams, scene: c_int);
    /// Leave the current room
    fn exit_room(&self, cloud: CloudPtr);
    /// Whether remote streams are pulled automatically
    fn set_default_stream_recv_mode(&self, cloud: CloudPtr, auto_audio: bool, auto_video: bool);
    /// Switch a video stream to caller-supplied frames
    fn enable_custom_video_capture(&self, cloud: CloudPtr, stream_type: c_int, enable: bool);
    /// Switch audio to caller-supplied frames
    fn enable_custom_audio_capture(&self, cloud: CloudPtr, enable: bool);
    /// Update encoder settings
    fn set_video_encoder_param(&self, cloud: CloudPtr, param: &sys::TrtcVideoEncParam);
    /// Next presentation timestamp for custom frames
    fn generate_custom_pts(&self, cloud: CloudPtr) -> u64;
    /// Inject one custom video frame
    fn send_custom_video_data(&self, cloud: CloudPtr, frame: &FrameData<'_>);
    /// Start the local capture self-test
    fn start_local_test(&self, cloud: CloudPtr);
}

/// Engine backed by the SDK shared library
#[derive(Debug)]
pub struct DylibEngine {
    api: TrtcApi,
}

impl DylibEngine {
    /// Load the SDK
    ///
    /// Uses `library` if given, else `TRTC_LIBRARY_PATH`, else the platform
    /// file name for `ctrtc` on the default search path.
    ///
    /// # Errors
    ///
    /// Returns [`CloudError::Library`] if the library or one of its symbols
    /// cannot be found
    pub fn load(library: Option<&Path>) -> Result<Self> {
        let path = resolve_library_path(library);
        tracing::info!("Loading TRTC SDK from {:?}", path);
        // SAFETY: the path names the TRTC C SDK, whose exports match the
        // signatures declared in trtc-sys.
        let api = unsafe { TrtcApi::load(&path) }.map_err(CloudError::from)?;
        Ok(Self { api })
    }
}

fn resolve_library_path(library: Option<&Path>) -> OsString {
    if let Some(path) = library {
        return path.as_os_str().to_os_string();
    }
    match std::env::var_os(LIBRARY_ENV) {
        Some(path) if !path.is_empty() => path,
        _ => sys::default_library_name(),
    }
}

// SAFETY (all methods): `CloudPtr`s and table pointers passed in were produced
// by this engine's own `share_instance`/`create_sub_cloud`/`create_callback`,
// and callers stop using them before the matching destroy call.
impl NativeEngine for DylibEngine {
    fn share_instance(&self) -> Option<CloudPtr> {
        CloudPtr::new(unsafe { (self.api.get_share_instance)() })
    }

    fn destroy_share_instance(&self) {
        unsafe { (self.api.destroy_share_instance)() }
    }

    fn create_sub_cloud(&self) -> Option<CloudPtr> {
        CloudPtr::new(unsafe { (self.api.create_sub_cloud)() })
    }

    fn destroy_sub_cloud(&self, cloud: CloudPtr) {
        unsafe { (self.api.destroy_sub_cloud)(cloud.as_ptr()) }
    }

    fn sdk_version(&self, cloud: CloudPtr) -> String {
        let version = unsafe { (self.api.get_sdk_version)(cloud.as_ptr()) };
        unsafe { sys::c_char_to_string(version) }.unwrap_or_default()
    }

    fn set_console_enabled(&self, cloud: CloudPtr, enabled: bool) {
        unsafe { (self.api.set_console_enabled)(cloud.as_ptr(), enabled) }
    }

    fn set_log_compress_enabled(&self, cloud: CloudPtr, enabled: bool) {
        unsafe { (self.api.set_log_compress_enabled)(cloud.as_ptr(), enabled) }
    }

    fn set_log_level(&self, cloud: CloudPtr, level: c_int) {
        unsafe { (self.api.set_log_level)(cloud.as_ptr(), level) }
    }

    fn set_log_dir_path(&self, cloud: CloudPtr, path: &CStr) {
        unsafe { (self.api.set_log_dir_path)(cloud.as_ptr(), path.as_ptr()) }
    }

    fn mute_local_video(&self, cloud: CloudPtr, stream_type: c_int, mute: bool) {
        unsafe { (self.api.mute_local_video)(cloud.as_ptr(), stream_type, mute) }
    }

    fn mute_local_audio(&self, cloud: CloudPtr, mute: bool) {
        unsafe { (self.api.mute_local_audio)(cloud.as_ptr(), mute) }
    }

    fn create_callback(&self) -> Option<NonNull<TrtcCloudCallback>> {
        NonNull::new(unsafe { (self.api.create_callback)(std::ptr::null_mut()) })
    }

    fn destroy_callback(&self, table: NonNull<TrtcCloudCallback>) {
        unsafe { (self.api.destroy_callback)(table.as_ptr()) }
    }

    fn add_callback(&self, cloud: CloudPtr, table: NonNull<TrtcCloudCallback>) {
        unsafe { (self.api.add_callback)(cloud.as_ptr(), table.as_ptr()) }
    }

    fn remove_callback(&self, cloud: CloudPtr, table: NonNull<TrtcCloudCallback>) {
        unsafe { (self.api.remove_callback)(cloud.as_ptr(), table.as_ptr()) }
    }

    fn enter_room(&self, cloud: CloudPtr, params: &sys::TrtcParams, scene: c_int) {
        unsafe { (self.api.enter_room)(cloud.as_ptr(), params, scene) }
    }

    fn exit_room(&self, cloud: CloudPtr) {
        unsafe { (self.api.exit_room)(cloud.as_ptr()) }
    }

    fn set_default_stream_recv_mode(&self, cloud: CloudPtr, auto_audio: bool, auto_video: bool) {
        unsafe { (self.api.set_default_stream_recv_mode)(cloud.as_ptr(), auto_audio, auto_video) }
    }

    fn enable_custom_video_capture(&self, cloud: CloudPtr, stream_type: c_int, enable: bool) {
        unsafe { (self.api.enable_custom_video_capture)(cloud.as_ptr(), stream_type, enable) }
    }

    fn enable_custom_audio_capture(&self, cloud: CloudPtr, enable: bool) {
        unsafe { (self.api.enable_custom_audio_capture)(cloud.as_ptr(), enable) }
    }

    fn set_video_encoder_param(&self, cloud: CloudPtr, param: &sys::TrtcVideoEncParam) {
        unsafe { (self.api.set_video_encoder_param)(cloud.as_ptr(), param) }
    }

    fn generate_custom_pts(&self, cloud: CloudPtr) -> u64 {
        unsafe { (self.api.generate_custom_pts)(cloud.as_ptr()) }
    }

    fn send_custom_video_data(&self, cloud: CloudPtr, frame: &FrameData<'_>) {
        unsafe {
            (self.api.send_custom_video_data)(
                cloud.as_ptr(),
                frame.stream_type,
                frame.width,
                frame.height,
                frame.data.as_ptr().cast(),
                frame.length,
                frame.timestamp,
                frame.rotation,
            )
        }
    }

    fn start_local_test(&self, cloud: CloudPtr) {
        unsafe { (self.api.start_local_test)(cloud.as_ptr()) }
    }
}
