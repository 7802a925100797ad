//! Mirrors of the native SDK's constants and records
//!
//! Every enum maps one-to-one onto the integer the C API expects; use
//! `as_raw` to marshal and `TryFrom<i32>` to decode.

use crate::error::ValidationError;
use serde::{Deserialize, Serialize};
use std::os::raw::c_int;
use thiserror::Error;
use trtc_sys as sys;

/// An integer the native SDK sent that has no mirror on this side
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("Unknown {kind} value: {value}")]
pub struct UnknownValue {
    /// Name of the mirrored type
    pub kind: &'static str,
    /// Raw value received
    pub value: i32,
}

/// Participant role inside a live room
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(i32)]
pub enum RoleType {
    /// Publisher: local media is sent
    #[default]
    Anchor = sys::TRTC_ROLE_ANCHOR,
    /// Subscriber: media is only received
    Audience = sys::TRTC_ROLE_AUDIENCE,
}

impl RoleType {
    /// Native integer value
    pub fn as_raw(self) -> c_int {
        self as c_int
    }
}

impl TryFrom<i32> for RoleType {
    type Error = UnknownValue;

    fn try_from(value: i32) -> Result<Self, UnknownValue> {
        match value {
            sys::TRTC_ROLE_ANCHOR => Ok(Self::Anchor),
            sys::TRTC_ROLE_AUDIENCE => Ok(Self::Audience),
            _ => Err(UnknownValue {
                kind: "role",
                value,
            }),
        }
    }
}

/// Application scene, selects the SDK's internal tuning
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(i32)]
pub enum AppScene {
    /// One-to-one or small group video calls
    #[default]
    VideoCall = sys::TRTC_APP_SCENE_VIDEO_CALL,
    /// Interactive live streaming
    Live = sys::TRTC_APP_SCENE_LIVE,
    /// Audio-only calls
    AudioCall = sys::TRTC_APP_SCENE_AUDIO_CALL,
    /// Audio-only live streaming
    VoiceChatRoom = sys::TRTC_APP_SCENE_VOICE_CHAT_ROOM,
}

impl AppScene {
    /// Native integer value
    pub fn as_raw(self) -> c_int {
        self as c_int
    }
}

impl TryFrom<i32> for AppScene {
    type Error = UnknownValue;

    fn try_from(value: i32) -> Result<Self, UnknownValue> {
        match value {
            sys::TRTC_APP_SCENE_VIDEO_CALL => Ok(Self::VideoCall),
            sys::TRTC_APP_SCENE_LIVE => Ok(Self::Live),
            sys::TRTC_APP_SCENE_AUDIO_CALL => Ok(Self::AudioCall),
            sys::TRTC_APP_SCENE_VOICE_CHAT_ROOM => Ok(Self::VoiceChatRoom),
            _ => Err(UnknownValue {
                kind: "app scene",
                value,
            }),
        }
    }
}

/// Video stream slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(i32)]
pub enum VideoStreamType {
    /// Main (high definition) stream
    #[default]
    Big = sys::TRTC_VIDEO_STREAM_TYPE_BIG,
    /// Low definition stream
    Small = sys::TRTC_VIDEO_STREAM_TYPE_SMALL,
    /// Auxiliary stream, usually screen sharing
    Sub = sys::TRTC_VIDEO_STREAM_TYPE_SUB,
}

impl VideoStreamType {
    /// Native integer value
    pub fn as_raw(self) -> c_int {
        self as c_int
    }
}

impl TryFrom<i32> for VideoStreamType {
    type Error = UnknownValue;

    fn try_from(value: i32) -> Result<Self, UnknownValue> {
        match value {
            sys::TRTC_VIDEO_STREAM_TYPE_BIG => Ok(Self::Big),
            sys::TRTC_VIDEO_STREAM_TYPE_SMALL => Ok(Self::Small),
            sys::TRTC_VIDEO_STREAM_TYPE_SUB => Ok(Self::Sub),
            _ => Err(UnknownValue {
                kind: "video stream type",
                value,
            }),
        }
    }
}

/// Clockwise frame rotation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[repr(i32)]
pub enum VideoRotation {
    /// No rotation
    #[default]
    #[serde(rename = "0")]
    Rotation0 = sys::TRTC_VIDEO_ROTATION_0,
    /// 90 degrees
    #[serde(rename = "90")]
    Rotation90 = sys::TRTC_VIDEO_ROTATION_90,
    /// 180 degrees
    #[serde(rename = "180")]
    Rotation180 = sys::TRTC_VIDEO_ROTATION_180,
    /// 270 degrees
    #[serde(rename = "270")]
    Rotation270 = sys::TRTC_VIDEO_ROTATION_270,
}

impl VideoRotation {
    /// Native integer value
    pub fn as_raw(self) -> c_int {
        self as c_int
    }

    /// Rotation in degrees
    pub fn degrees(self) -> u32 {
        match self {
            Self::Rotation0 => 0,
            Self::Rotation90 => 90,
            Self::Rotation180 => 180,
            Self::Rotation270 => 270,
        }
    }
}

impl TryFrom<i32> for VideoRotation {
    type Error = UnknownValue;

    fn try_from(value: i32) -> Result<Self, UnknownValue> {
        match value {
            sys::TRTC_VIDEO_ROTATION_0 => Ok(Self::Rotation0),
            sys::TRTC_VIDEO_ROTATION_90 => Ok(Self::Rotation90),
            sys::TRTC_VIDEO_ROTATION_180 => Ok(Self::Rotation180),
            sys::TRTC_VIDEO_ROTATION_270 => Ok(Self::Rotation270),
            _ => Err(UnknownValue {
                kind: "video rotation",
                value,
            }),
        }
    }
}

/// Encoder resolution presets
///
/// The SDK only accepts these discrete codes. Suggested bitrates are for the
/// video call scene; live streaming needs roughly half as much again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[repr(i32)]
pub enum VideoResolution {
    /// 4:3, 480x360, ~400 kbps
    #[serde(rename = "480x360")]
    Res480x360 = 60,
    /// 4:3, 640x480, ~600 kbps
    #[serde(rename = "640x480")]
    Res640x480 = 62,
    /// 4:3, 960x720, ~1000 kbps
    #[serde(rename = "960x720")]
    Res960x720 = 64,
    /// 16:9, 480x270, ~350 kbps
    #[serde(rename = "480x270")]
    Res480x270 = 106,
    /// 16:9, 640x360, ~500 kbps
    #[default]
    #[serde(rename = "640x360")]
    Res640x360 = 108,
    /// 16:9, 960x540, ~850 kbps
    #[serde(rename = "960x540")]
    Res960x540 = 110,
    /// 16:9, 1280x720, ~1200 kbps
    #[serde(rename = "1280x720")]
    Res1280x720 = 112,
    /// 16:9, 1920x1080, ~2000 kbps
    #[serde(rename = "1920x1080")]
    Res1920x1080 = 114,
}

impl VideoResolution {
    /// Native integer value
    pub fn as_raw(self) -> c_int {
        self as c_int
    }

    /// Get width in pixels
    pub fn width(self) -> u32 {
        match self {
            Self::Res480x360 | Self::Res480x270 => 480,
            Self::Res640x480 | Self::Res640x360 => 640,
            Self::Res960x720 | Self::Res960x540 => 960,
            Self::Res1280x720 => 1280,
            Self::Res1920x1080 => 1920,
        }
    }

    /// Get height in pixels
    pub fn height(self) -> u32 {
        match self {
            Self::Res480x270 => 270,
            Self::Res480x360 | Self::Res640x360 => 360,
            Self::Res640x480 => 480,
            Self::Res960x540 => 540,
            Self::Res960x720 | Self::Res1280x720 => 720,
            Self::Res1920x1080 => 1080,
        }
    }
}

impl TryFrom<i32> for VideoResolution {
    type Error = UnknownValue;

    fn try_from(value: i32) -> Result<Self, UnknownValue> {
        match value {
            60 => Ok(Self::Res480x360),
            62 => Ok(Self::Res640x480),
            64 => Ok(Self::Res960x720),
            106 => Ok(Self::Res480x270),
            108 => Ok(Self::Res640x360),
            110 => Ok(Self::Res960x540),
            112 => Ok(Self::Res1280x720),
            114 => Ok(Self::Res1920x1080),
            _ => Err(UnknownValue {
                kind: "video resolution",
                value,
            }),
        }
    }
}

/// Orientation the resolution preset is applied in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(i32)]
pub enum VideoResolutionMode {
    /// Width is the long edge
    #[default]
    Landscape = sys::TRTC_VIDEO_RESOLUTION_MODE_LANDSCAPE,
    /// Height is the long edge
    Portrait = sys::TRTC_VIDEO_RESOLUTION_MODE_PORTRAIT,
}

impl VideoResolutionMode {
    /// Native integer value
    pub fn as_raw(self) -> c_int {
        self as c_int
    }
}

impl TryFrom<i32> for VideoResolutionMode {
    type Error = UnknownValue;

    fn try_from(value: i32) -> Result<Self, UnknownValue> {
        match value {
            sys::TRTC_VIDEO_RESOLUTION_MODE_LANDSCAPE => Ok(Self::Landscape),
            sys::TRTC_VIDEO_RESOLUTION_MODE_PORTRAIT => Ok(Self::Portrait),
            _ => Err(UnknownValue {
                kind: "video resolution mode",
                value,
            }),
        }
    }
}

/// SDK log verbosity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(i32)]
pub enum LogLevel {
    /// Everything
    Verbose = 0,
    /// Debug and above
    Debug = 1,
    /// Info and above
    #[default]
    Info = 2,
    /// Warnings and above
    Warn = 3,
    /// Errors and above
    Error = 4,
    /// Fatal errors only
    Fatal = 5,
    /// Logging disabled
    None = 6,
}

impl LogLevel {
    /// Native integer value
    pub fn as_raw(self) -> c_int {
        self as c_int
    }
}

impl TryFrom<i32> for LogLevel {
    type Error = UnknownValue;

    fn try_from(value: i32) -> Result<Self, UnknownValue> {
        match value {
            0 => Ok(Self::Verbose),
            1 => Ok(Self::Debug),
            2 => Ok(Self::Info),
            3 => Ok(Self::Warn),
            4 => Ok(Self::Error),
            5 => Ok(Self::Fatal),
            6 => Ok(Self::None),
            _ => Err(UnknownValue {
                kind: "log level",
                value,
            }),
        }
    }
}

/// Video encoder settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VideoEncoderParam {
    /// Resolution preset
    pub resolution: VideoResolution,
    /// Landscape or portrait
    pub resolution_mode: VideoResolutionMode,
    /// Frames per second
    pub fps: u32,
    /// Target bitrate in kbps
    pub bitrate: u32,
    /// Floor the SDK may lower the bitrate to under congestion, in kbps
    pub min_bitrate: u32,
    /// Let the SDK lower the resolution under congestion
    pub enable_adjust_res: bool,
}

impl Default for VideoEncoderParam {
    fn default() -> Self {
        Self {
            resolution: VideoResolution::Res640x360,
            resolution_mode: VideoResolutionMode::Landscape,
            fps: 15,
            bitrate: 550,
            min_bitrate: 0,
            enable_adjust_res: false,
        }
    }
}

impl VideoEncoderParam {
    /// Native layout
    pub fn to_raw(&self) -> sys::TrtcVideoEncParam {
        sys::TrtcVideoEncParam {
            video_resolution: self.resolution.as_raw(),
            res_mode: self.resolution_mode.as_raw(),
            video_fps: self.fps,
            video_bitrate: self.bitrate,
            min_video_bitrate: self.min_bitrate,
            enable_adjust_res: self.enable_adjust_res,
        }
    }
}

/// One frame of caller-produced video
///
/// The buffer is borrowed for the duration of a single injection call; the
/// SDK copies what it needs before the call returns. `buffer_len` is the
/// length the caller claims and must equal `buffer.len()`.
#[derive(Debug, Clone, Copy)]
pub struct VideoFrame<'a> {
    /// Target stream
    pub stream_type: VideoStreamType,
    /// Frame rotation
    pub rotation: VideoRotation,
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// Raw pixel data
    pub buffer: &'a [u8],
    /// Declared buffer length
    pub buffer_len: usize,
    /// Presentation timestamp, see `TrtcCloud::generate_custom_pts`
    pub timestamp: u64,
}

impl<'a> VideoFrame<'a> {
    /// Frame for the big stream, unrotated, declared length taken from the buffer
    pub fn new(buffer: &'a [u8], width: u32, height: u32) -> Self {
        Self {
            stream_type: VideoStreamType::Big,
            rotation: VideoRotation::Rotation0,
            width,
            height,
            buffer,
            buffer_len: buffer.len(),
            timestamp: 0,
        }
    }

    /// Set the presentation timestamp
    #[must_use]
    pub fn with_timestamp(mut self, timestamp: u64) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Set the rotation
    #[must_use]
    pub fn with_rotation(mut self, rotation: VideoRotation) -> Self {
        self.rotation = rotation;
        self
    }

    /// Set the target stream
    #[must_use]
    pub fn with_stream_type(mut self, stream_type: VideoStreamType) -> Self {
        self.stream_type = stream_type;
        self
    }
}

/// Room entry parameters
///
/// Exactly one of `room_id` (non-zero) and `str_room_id` (non-empty) is
/// normally set; when both are, the SDK uses the numeric id. An unset role
/// enters as [`RoleType::Anchor`].
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoomParams {
    /// Application id issued by the service console
    pub app_id: u32,
    /// Local user id
    pub user_id: String,
    /// Signature authorising `user_id`
    pub user_signature: String,
    /// Numeric room id, 0 when unused
    pub room_id: u32,
    /// String room id, empty when unused
    pub str_room_id: String,
    /// Optional room permission ticket
    pub private_map_key: String,
    /// Role to enter as
    pub role: Option<RoleType>,
    /// Scene handed to the SDK alongside the request
    pub scene: AppScene,
}

impl RoomParams {
    /// Parameters for `user_id` in application `app_id`; a room id is still needed
    pub fn new(app_id: u32, user_id: impl Into<String>, user_signature: impl Into<String>) -> Self {
        Self {
            app_id,
            user_id: user_id.into(),
            user_signature: user_signature.into(),
            ..Self::default()
        }
    }

    /// Use a numeric room id
    #[must_use]
    pub fn with_room_id(mut self, room_id: u32) -> Self {
        self.room_id = room_id;
        self
    }

    /// Use a string room id
    #[must_use]
    pub fn with_str_room_id(mut self, room_id: impl Into<String>) -> Self {
        self.str_room_id = room_id.into();
        self
    }

    /// Set the role
    #[must_use]
    pub fn with_role(mut self, role: RoleType) -> Self {
        self.role = Some(role);
        self
    }

    /// Set the private map key
    #[must_use]
    pub fn with_private_map_key(mut self, key: impl Into<String>) -> Self {
        self.private_map_key = key.into();
        self
    }

    /// Set the scene
    #[must_use]
    pub fn with_scene(mut self, scene: AppScene) -> Self {
        self.scene = scene;
        self
    }

    /// Role that will actually be sent
    pub fn effective_role(&self) -> RoleType {
        self.role.unwrap_or_default()
    }

    /// Check the fields the SDK cannot do without
    ///
    /// # Errors
    ///
    /// Returns the first missing field: user id, then signature, then room id
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.user_id.is_empty() {
            return Err(ValidationError::MissingUserId);
        }
        if self.user_signature.is_empty() {
            return Err(ValidationError::MissingUserSignature);
        }
        if self.room_id == 0 && self.str_room_id.is_empty() {
            return Err(ValidationError::MissingRoomId);
        }
        Ok(())
    }
}

impl std::fmt::Debug for RoomParams {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RoomParams")
            .field("app_id", &self.app_id)
            .field("user_id", &self.user_id)
            .field("user_signature", &"<redacted>")
            .field("room_id", &self.room_id)
            .field("str_room_id", &self.str_room_id)
            .field("private_map_key", &"<redacted>")
            .field("role", &self.role)
            .field("scene", &self.scene)
            .finish()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_role_codes() {
        assert_eq!(RoleType::Anchor.as_raw(), 20);
        assert_eq!(RoleType::Audience.as_raw(), 21);
        assert_eq!(RoleType::try_from(21), Ok(RoleType::Audience));
        assert!(RoleType::try_from(0).is_err());
    }

    #[test]
    fn test_unknown_value_names_kind() {
        let err = VideoStreamType::try_from(7).unwrap_err();
        assert_eq!(err.to_string(), "Unknown video stream type value: 7");
    }

    #[test]
    fn test_video_resolution() {
        let hd720 = VideoResolution::Res1280x720;
        assert_eq!(hd720.as_raw(), 112);
        assert_eq!(hd720.width(), 1280);
        assert_eq!(hd720.height(), 720);

        let sd = VideoResolution::try_from(62).unwrap();
        assert_eq!(sd, VideoResolution::Res640x480);
        assert_eq!((sd.width(), sd.height()), (640, 480));

        assert!(VideoResolution::try_from(61).is_err());
    }

    #[test]
    fn test_log_levels_cover_zero_to_six() {
        for raw in 0..=6 {
            assert_eq!(LogLevel::try_from(raw).unwrap().as_raw(), raw);
        }
        assert_eq!(LogLevel::try_from(4), Ok(LogLevel::Error));
        assert_eq!(
            LogLevel::try_from(7),
            Err(UnknownValue {
                kind: "log level",
                value: 7
            })
        );
        assert!(LogLevel::Verbose < LogLevel::None);
    }

    #[test]
    fn test_rotation_degrees() {
        assert_eq!(VideoRotation::Rotation90.as_raw(), 1);
        assert_eq!(VideoRotation::Rotation270.degrees(), 270);
    }

    #[test]
    fn test_encoder_param_to_raw() {
        let param = VideoEncoderParam {
            resolution: VideoResolution::Res960x540,
            resolution_mode: VideoResolutionMode::Portrait,
            fps: 20,
            bitrate: 900,
            min_bitrate: 300,
            enable_adjust_res: true,
        };
        let raw = param.to_raw();
        assert_eq!(raw.video_resolution, 110);
        assert_eq!(raw.res_mode, 1);
        assert_eq!(raw.video_fps, 20);
        assert_eq!(raw.video_bitrate, 900);
        assert_eq!(raw.min_video_bitrate, 300);
        assert!(raw.enable_adjust_res);
    }

    #[test]
    fn test_room_params_role_defaults_to_anchor() {
        let params = RoomParams::new(12345, "alice", "sig").with_str_room_id("room1");
        assert_eq!(params.role, None);
        assert_eq!(params.effective_role(), RoleType::Anchor);
        assert!(params.validate().is_ok());
    }

    #[test]
    fn test_room_params_validation_order() {
        let params = RoomParams::default();
        assert_eq!(params.validate(), Err(ValidationError::MissingUserId));

        let params = RoomParams::new(1, "alice", "");
        assert_eq!(params.validate(), Err(ValidationError::MissingUserSignature));

        let params = RoomParams::new(1, "alice", "sig");
        assert_eq!(params.validate(), Err(ValidationError::MissingRoomId));

        let params = RoomParams::new(1, "alice", "sig").with_room_id(9);
        assert_eq!(params.validate(), Ok(()));
    }

    #[test]
    fn test_room_params_debug_hides_signature() {
        let params = RoomParams::new(1, "alice", "very-secret").with_room_id(1);
        let debug = format!("{:?}", params);
        assert!(debug.contains("alice"));
        assert!(!debug.contains("very-secret"));
    }

    #[test]
    fn test_video_frame_builder() {
        let data = [0u8; 6];
        let frame = VideoFrame::new(&data, 2, 2)
            .with_timestamp(42)
            .with_rotation(VideoRotation::Rotation180)
            .with_stream_type(VideoStreamType::Sub);
        assert_eq!(frame.buffer_len, 6);
        assert_eq!(frame.timestamp, 42);
        assert_eq!(frame.rotation, VideoRotation::Rotation180);
        assert_eq!(frame.stream_type, VideoStreamType::Sub);
    }

    #[test]
    fn test_enum_serialization() {
        let json = serde_json::to_string(&VideoResolution::Res1920x1080).unwrap();
        assert_eq!(json, "\"1920x1080\"");
        let role: RoleType = serde_json::from_str("\"audience\"").unwrap();
        assert_eq!(role, RoleType::Audience);
    }
}
