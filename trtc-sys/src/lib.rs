//! Raw bindings for the TRTC native SDK
//!
//! The SDK is a prebuilt shared library (`ctrtc`) exposing a C API. Instead of
//! linking it at build time, [`TrtcApi::load`] opens the library at run time
//! and resolves every entry point, so crates depending on this one build and
//! test on machines without the SDK installed.

#![deny(clippy::panic)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

mod types;

use libloading::Library;
use std::ffi::{c_void, OsStr, OsString};
use std::os::raw::{c_char, c_int};
use thiserror::Error;

pub use types::*;

type Cloud = *mut TrtcCloudHandle;

/// Errors raised while opening the SDK
#[derive(Error, Debug)]
pub enum LoadError {
    /// The shared library could not be opened
    #[error("Failed to open {path:?}: {source}")]
    Library {
        /// Path or file name handed to the loader
        path: OsString,
        /// Loader error
        source: libloading::Error,
    },

    /// An entry point is missing from the library
    #[error("Missing symbol {name}: {source}")]
    Symbol {
        /// Symbol name without terminator
        name: &'static str,
        /// Loader error
        source: libloading::Error,
    },
}

/// Platform file name of the SDK (`libctrtc.so`, `ctrtc.dll`, `libctrtc.dylib`)
pub fn default_library_name() -> OsString {
    libloading::library_filename("ctrtc")
}

/// Entry points of the native SDK
///
/// Holds the library open for as long as the table lives; the function
/// pointers are only valid while it does.
pub struct TrtcApi {
    pub get_share_instance: unsafe extern "C" fn() -> Cloud,
    pub destroy_share_instance: unsafe extern "C" fn(),
    pub create_sub_cloud: unsafe extern "C" fn() -> Cloud,
    pub destroy_sub_cloud: unsafe extern "C" fn(Cloud),
    pub get_sdk_version: unsafe extern "C" fn(Cloud) -> *const c_char,
    pub set_console_enabled: unsafe extern "C" fn(Cloud, bool),
    pub set_log_compress_enabled: unsafe extern "C" fn(Cloud, bool),
    pub set_log_level: unsafe extern "C" fn(Cloud, c_int),
    pub set_log_dir_path: unsafe extern "C" fn(Cloud, *const c_char),
    pub mute_local_video: unsafe extern "C" fn(Cloud, TrtcVideoStreamType, bool),
    pub mute_local_audio: unsafe extern "C" fn(Cloud, bool),
    pub create_callback: unsafe extern "C" fn(*mut c_void) -> *mut TrtcCloudCallback,
    pub destroy_callback: unsafe extern "C" fn(*mut TrtcCloudCallback),
    pub add_callback: unsafe extern "C" fn(Cloud, *mut TrtcCloudCallback),
    pub remove_callback: unsafe extern "C" fn(Cloud, *mut TrtcCloudCallback),
    pub enter_room: unsafe extern "C" fn(Cloud, *const TrtcParams, TrtcAppScene),
    pub exit_room: unsafe extern "C" fn(Cloud),
    pub set_default_stream_recv_mode: unsafe extern "C" fn(Cloud, bool, bool),
    pub enable_custom_video_capture: unsafe extern "C" fn(Cloud, TrtcVideoStreamType, bool),
    pub enable_custom_audio_capture: unsafe extern "C" fn(Cloud, bool),
    pub set_video_encoder_param: unsafe extern "C" fn(Cloud, *const TrtcVideoEncParam),
    pub generate_custom_pts: unsafe extern "C" fn(Cloud) -> u64,
    pub send_custom_video_data: unsafe extern "C" fn(
        Cloud,
        TrtcVideoStreamType,
        c_int,
        c_int,
        *const c_char,
        c_int,
        u64,
        TrtcVideoRotation,
    ),
    pub start_local_test: unsafe extern "C" fn(Cloud),
    _library: Library,
}

impl TrtcApi {
    /// Open the SDK and resolve every entry point
    ///
    /// # Safety
    /// Opening a library runs its initialisers; `path` must name a build of
    /// the TRTC C SDK whose symbols match the signatures above.
    pub unsafe fn load(path: impl AsRef<OsStr>) -> Result<Self, LoadError> {
        let path = path.as_ref();
        let library = Library::new(path).map_err(|source| LoadError::Library {
            path: path.to_os_string(),
            source,
        })?;

        Ok(Self {
            get_share_instance: resolve(&library, "getTrtcGlobalShareInstance")?,
            destroy_share_instance: resolve(&library, "destroyTrtcGlobalShareInstance")?,
            create_sub_cloud: resolve(&library, "createTrtcSubCloud")?,
            destroy_sub_cloud: resolve(&library, "destroyTrtcSubCloud")?,
            get_sdk_version: resolve(&library, "getTrtcSDKVersion")?,
            set_console_enabled: resolve(&library, "setTrtcConsoleEnabled")?,
            set_log_compress_enabled: resolve(&library, "setTrtcLogCompressEnabled")?,
            set_log_level: resolve(&library, "setTrtcLogLevel")?,
            set_log_dir_path: resolve(&library, "setTrtcLogDirPath")?,
            mute_local_video: resolve(&library, "muteTrtcLocalVideo")?,
            mute_local_audio: resolve(&library, "muteTrtcLocalAudio")?,
            create_callback: resolve(&library, "createTrtcCallback")?,
            destroy_callback: resolve(&library, "destroyTrtcCallback")?,
            add_callback: resolve(&library, "addTrtcCallback")?,
            remove_callback: resolve(&library, "removeTrtcCallback")?,
            enter_room: resolve(&library, "enterTrtcRoom")?,
            exit_room: resolve(&library, "exitTrtcRoom")?,
            set_default_stream_recv_mode: resolve(&library, "setTrtcDefaultStreamRecvMode")?,
            enable_custom_video_capture: resolve(&library, "enableTrtcCustomVideoCapture")?,
            enable_custom_audio_capture: resolve(&library, "enableTrtcCustomAudioCapture")?,
            set_video_encoder_param: resolve(&library, "setTrtcVideoEncoderParam")?,
            generate_custom_pts: resolve(&library, "generateTrtcCustomPTS")?,
            send_custom_video_data: resolve(&library, "sendTrtcCustomVideoData")?,
            start_local_test: resolve(&library, "startTrtcLocalTest")?,
            _library: library,
        })
    }
}

impl std::fmt::Debug for TrtcApi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrtcApi").finish_non_exhaustive()
    }
}

/// Look up one entry point and copy the function pointer out of the symbol
///
/// # Safety
/// `T` must be the exact function pointer type of the exported symbol.
unsafe fn resolve<T: Copy>(library: &Library, name: &'static str) -> Result<T, LoadError> {
    let symbol: libloading::Symbol<'_, T> = library
        .get(name.as_bytes())
        .map_err(|source| LoadError::Symbol { name, source })?;
    Ok(*symbol)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_library_name_mentions_ctrtc() {
        let name = default_library_name();
        assert!(name.to_string_lossy().contains("ctrtc"));
    }

    #[test]
    fn test_load_missing_library_fails() {
        let result = unsafe { TrtcApi::load("/nonexistent/libctrtc-missing.so") };
        assert!(matches!(result, Err(LoadError::Library { .. })));
    }
}
