//! Conversion of caller-side records into native argument shapes
//!
//! Everything here owns the memory the raw layouts point into; the raw views
//! are only valid while the owner is alive, which in practice means for the
//! duration of one engine call.

use crate::error::ValidationError;
use crate::types::{AppScene, RoleType, RoomParams, VideoFrame};
use std::ffi::CString;
use std::os::raw::c_int;
use std::path::Path;
use trtc_sys as sys;

pub(crate) fn c_string(field: &'static str, value: &str) -> Result<CString, ValidationError> {
    CString::new(value).map_err(|_| ValidationError::InteriorNul { field })
}

/// Path bytes as the SDK receives them; unix paths need not be UTF-8
#[cfg(unix)]
pub(crate) fn path_c_string(field: &'static str, path: &Path) -> Result<CString, ValidationError> {
    use std::os::unix::ffi::OsStrExt;

    let bytes = path.as_os_str().as_bytes();
    CString::new(bytes).map_err(|_| ValidationError::InteriorNul { field })
}

#[cfg(not(unix))]
pub(crate) fn path_c_string(field: &'static str, path: &Path) -> Result<CString, ValidationError> {
    let path = path.to_str().ok_or(ValidationError::NonUtf8 { field })?;
    c_string(field, path)
}

/// Validated room request with its strings copied into C buffers
pub(crate) struct RoomRequest {
    app_id: u32,
    room_id: u32,
    user_id: CString,
    user_sig: CString,
    str_room_id: CString,
    private_map_key: CString,
    role: RoleType,
    scene: AppScene,
}

impl RoomRequest {
    pub(crate) fn new(params: &RoomParams) -> Result<Self, ValidationError> {
        params.validate()?;
        Ok(Self {
            app_id: params.app_id,
            room_id: params.room_id,
            user_id: c_string("user_id", &params.user_id)?,
            user_sig: c_string("user_signature", &params.user_signature)?,
            str_room_id: c_string("str_room_id", &params.str_room_id)?,
            private_map_key: c_string("private_map_key", &params.private_map_key)?,
            role: params.effective_role(),
            scene: params.scene,
        })
    }

    pub(crate) fn role(&self) -> RoleType {
        self.role
    }

    pub(crate) fn scene(&self) -> AppScene {
        self.scene
    }

    /// Raw view borrowing this request's buffers
    pub(crate) fn as_raw(&self) -> sys::TrtcParams {
        sys::TrtcParams {
            sdk_app_id: self.app_id,
            room_id: self.room_id,
            user_id: self.user_id.as_ptr(),
            user_sig: self.user_sig.as_ptr(),
            str_room_id: self.str_room_id.as_ptr(),
            private_map_key: self.private_map_key.as_ptr(),
            role: self.role.as_raw(),
        }
    }
}

/// Custom video frame checked against the native argument types
#[derive(Debug, Clone, Copy)]
pub struct FrameData<'a> {
    /// Native stream type
    pub stream_type: sys::TrtcVideoStreamType,
    /// Width in pixels
    pub width: c_int,
    /// Height in pixels
    pub height: c_int,
    /// Pixel data, exactly `length` bytes
    pub data: &'a [u8],
    /// Length passed to the SDK
    pub length: c_int,
    /// Presentation timestamp
    pub timestamp: u64,
    /// Native rotation
    pub rotation: sys::TrtcVideoRotation,
}

impl<'a> FrameData<'a> {
    pub(crate) fn new(frame: &VideoFrame<'a>) -> Result<Self, ValidationError> {
        if frame.buffer.is_empty() {
            return Err(ValidationError::EmptyFrame);
        }
        if frame.buffer_len != frame.buffer.len() {
            return Err(ValidationError::FrameLengthMismatch {
                declared: frame.buffer_len,
                actual: frame.buffer.len(),
            });
        }
        Ok(Self {
            stream_type: frame.stream_type.as_raw(),
            width: native_int("width", frame.width as u64)?,
            height: native_int("height", frame.height as u64)?,
            data: frame.buffer,
            length: native_int("buffer_len", frame.buffer_len as u64)?,
            timestamp: frame.timestamp,
            rotation: frame.rotation.as_raw(),
        })
    }
}

fn native_int(field: &'static str, value: u64) -> Result<c_int, ValidationError> {
    c_int::try_from(value).map_err(|_| ValidationError::OutOfRange { field, value })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::types::{VideoRotation, VideoStreamType};
    use std::ffi::CStr;

    #[cfg(unix)]
    #[test]
    fn test_path_keeps_non_utf8_bytes() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let path = Path::new(OsStr::from_bytes(b"/tmp/\xfflogs"));
        let c_path = path_c_string("log_dir_path", path).unwrap();
        assert_eq!(c_path.as_bytes(), b"/tmp/\xfflogs");

        let nul = Path::new(OsStr::from_bytes(b"/tmp/a\0b"));
        assert_eq!(
            path_c_string("log_dir_path", nul),
            Err(ValidationError::InteriorNul {
                field: "log_dir_path"
            })
        );
    }

    #[test]
    fn test_room_request_resolves_role_and_copies_strings() {
        let params = RoomParams::new(12345, "alice", "sig").with_str_room_id("room1");
        let request = RoomRequest::new(&params).unwrap();
        let raw = request.as_raw();

        assert_eq!(raw.sdk_app_id, 12345);
        assert_eq!(raw.room_id, 0);
        assert_eq!(raw.role, RoleType::Anchor.as_raw());
        assert_eq!(request.scene(), AppScene::VideoCall);
        let user_id = unsafe { CStr::from_ptr(raw.user_id) };
        assert_eq!(user_id.to_str().unwrap(), "alice");
        let room = unsafe { CStr::from_ptr(raw.str_room_id) };
        assert_eq!(room.to_str().unwrap(), "room1");
        let key = unsafe { CStr::from_ptr(raw.private_map_key) };
        assert!(key.to_bytes().is_empty());
    }

    #[test]
    fn test_room_request_rejects_interior_nul() {
        let params = RoomParams::new(1, "al\0ice", "sig").with_room_id(3);
        assert!(matches!(
            RoomRequest::new(&params),
            Err(ValidationError::InteriorNul { field: "user_id" })
        ));
    }

    #[test]
    fn test_frame_data_checks_length() {
        let data = [1u8; 12];
        let mut frame = VideoFrame::new(&data, 4, 2);
        frame.buffer_len = 16;
        assert_eq!(
            FrameData::new(&frame).unwrap_err(),
            ValidationError::FrameLengthMismatch {
                declared: 16,
                actual: 12
            }
        );
    }

    #[test]
    fn test_frame_data_rejects_empty_buffer() {
        let frame = VideoFrame::new(&[], 4, 2);
        assert_eq!(FrameData::new(&frame).unwrap_err(), ValidationError::EmptyFrame);
    }

    #[test]
    fn test_frame_data_rejects_oversized_dimensions() {
        let data = [0u8; 4];
        let frame = VideoFrame::new(&data, u32::MAX, 2);
        assert!(matches!(
            FrameData::new(&frame),
            Err(ValidationError::OutOfRange { field: "width", .. })
        ));
    }

    #[test]
    fn test_frame_data_maps_enums() {
        let data = [0u8; 6];
        let frame = VideoFrame::new(&data, 2, 2)
            .with_rotation(VideoRotation::Rotation90)
            .with_stream_type(VideoStreamType::Sub)
            .with_timestamp(99);
        let raw = FrameData::new(&frame).unwrap();
        assert_eq!(raw.length, 6);
        assert_eq!(raw.rotation, 1);
        assert_eq!(raw.stream_type, 2);
        assert_eq!(raw.timestamp, 99);
    }
}
