//! In-process engine double
//!
//! [`RecordingEngine`] stands in for the SDK: it hands out fake instance
//! handles, allocates real callback tables, records every call it receives,
//! and can fire events through the registered tables the way the SDK's own
//! threads would.

use crate::engine::{CloudPtr, NativeEngine};
use crate::marshal::FrameData;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::ffi::CStr;
use std::os::raw::{c_char, c_int};
use std::ptr::NonNull;
use trtc_sys::{self as sys, TrtcCloudCallback, TrtcCloudHandle};

/// Room request as the engine received it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedRoomRequest {
    /// SDK application id
    pub app_id: u32,
    /// Numeric room id
    pub room_id: u32,
    /// Local user id
    pub user_id: String,
    /// User signature
    pub user_sig: String,
    /// String room id
    pub str_room_id: String,
    /// Private map key
    pub private_map_key: String,
    /// Native role value
    pub role: c_int,
}

/// One call received by [`RecordingEngine`]
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq)]
pub enum EngineCall {
    ShareInstance,
    DestroyShareInstance,
    CreateSubCloud { cloud: CloudPtr },
    DestroySubCloud { cloud: CloudPtr },
    SetConsoleEnabled { cloud: CloudPtr, enabled: bool },
    SetLogCompressEnabled { cloud: CloudPtr, enabled: bool },
    SetLogLevel { cloud: CloudPtr, level: c_int },
    SetLogDirPath { cloud: CloudPtr, path: String },
    MuteLocalVideo {
        cloud: CloudPtr,
        stream_type: c_int,
        mute: bool,
    },
    MuteLocalAudio { cloud: CloudPtr, mute: bool },
    AddCallback { cloud: CloudPtr },
    RemoveCallback { cloud: CloudPtr },
    EnterRoom {
        cloud: CloudPtr,
        request: RecordedRoomRequest,
        scene: c_int,
    },
    ExitRoom { cloud: CloudPtr },
    SetDefaultStreamRecvMode {
        cloud: CloudPtr,
        auto_audio: bool,
        auto_video: bool,
    },
    EnableCustomVideoCapture {
        cloud: CloudPtr,
        stream_type: c_int,
        enable: bool,
    },
    EnableCustomAudioCapture { cloud: CloudPtr, enable: bool },
    SetVideoEncoderParam {
        cloud: CloudPtr,
        param: sys::TrtcVideoEncParam,
    },
    SendCustomVideoData {
        cloud: CloudPtr,
        stream_type: c_int,
        width: c_int,
        height: c_int,
        length: c_int,
        timestamp: u64,
        rotation: c_int,
    },
    StartLocalTest { cloud: CloudPtr },
}

impl EngineCall {
    /// Instance the call targeted, if any
    pub fn cloud(&self) -> Option<CloudPtr> {
        match self {
            Self::ShareInstance | Self::DestroyShareInstance => None,
            Self::CreateSubCloud { cloud }
            | Self::DestroySubCloud { cloud }
            | Self::SetConsoleEnabled { cloud, .. }
            | Self::SetLogCompressEnabled { cloud, .. }
            | Self::SetLogLevel { cloud, .. }
            | Self::SetLogDirPath { cloud, .. }
            | Self::MuteLocalVideo { cloud, .. }
            | Self::MuteLocalAudio { cloud, .. }
            | Self::AddCallback { cloud }
            | Self::RemoveCallback { cloud }
            | Self::EnterRoom { cloud, .. }
            | Self::ExitRoom { cloud }
            | Self::SetDefaultStreamRecvMode { cloud, .. }
            | Self::EnableCustomVideoCapture { cloud, .. }
            | Self::EnableCustomAudioCapture { cloud, .. }
            | Self::SetVideoEncoderParam { cloud, .. }
            | Self::SendCustomVideoData { cloud, .. }
            | Self::StartLocalTest { cloud } => Some(*cloud),
        }
    }
}

#[derive(Default)]
struct EngineState {
    next_handle: usize,
    main: Option<CloudPtr>,
    subs: HashSet<CloudPtr>,
    /// Addresses of tables allocated and not yet destroyed
    tables: HashSet<usize>,
    /// Tables receiving events, per instance, in registration order
    registered: HashMap<CloudPtr, Vec<usize>>,
    calls: Vec<EngineCall>,
    fail_callback_allocation: bool,
    /// Result to report from inside `enter_room`, before it returns
    enter_room_result: Option<c_int>,
    pts: u64,
}

impl EngineState {
    fn fake_handle(&mut self) -> Option<CloudPtr> {
        self.next_handle += 1;
        CloudPtr::new((self.next_handle * 0x100) as *mut TrtcCloudHandle)
    }

    fn assert_live(&self, cloud: CloudPtr) {
        assert!(
            self.main == Some(cloud) || self.subs.contains(&cloud),
            "call on a destroyed cloud {:?}",
            cloud
        );
    }

    fn record(&mut self, call: EngineCall) {
        if let Some(cloud) = call.cloud() {
            if !matches!(call, EngineCall::CreateSubCloud { .. }) {
                self.assert_live(cloud);
            }
        }
        self.calls.push(call);
    }
}

/// Engine double recording every call
#[derive(Default)]
pub struct RecordingEngine {
    state: Mutex<EngineState>,
}

impl RecordingEngine {
    /// Version string reported by [`NativeEngine::sdk_version`]
    pub const VERSION: &'static str = "11.0.0-recording";

    /// Fresh engine with no instances
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `create_callback` calls return null
    pub fn set_fail_callback_allocation(&self, fail: bool) {
        self.state.lock().fail_callback_allocation = fail;
    }

    /// Report this enter-room result synchronously, from inside `enter_room`
    pub fn set_enter_room_result(&self, result: Option<c_int>) {
        self.state.lock().enter_room_result = result;
    }

    /// Every call received so far
    pub fn calls(&self) -> Vec<EngineCall> {
        self.state.lock().calls.clone()
    }

    /// Forget recorded calls
    pub fn clear_calls(&self) {
        self.state.lock().calls.clear();
    }

    /// Callback tables allocated and not yet destroyed
    pub fn outstanding_callbacks(&self) -> usize {
        self.state.lock().tables.len()
    }

    /// Tables currently receiving events from `cloud`
    pub fn registered_callbacks(&self, cloud: CloudPtr) -> usize {
        self.state
            .lock()
            .registered
            .get(&cloud)
            .map_or(0, Vec::len)
    }

    /// Current main instance, if created
    pub fn main_instance(&self) -> Option<CloudPtr> {
        self.state.lock().main
    }

    /// Sub-instances not yet destroyed
    pub fn live_sub_clouds(&self) -> usize {
        self.state.lock().subs.len()
    }

    /// Run `f` on a copy of every table registered with `cloud`
    ///
    /// The engine lock is released first, so handlers may call back into the
    /// engine. Must not race with removal of the same tables.
    pub fn fire(&self, cloud: CloudPtr, mut f: impl FnMut(&TrtcCloudCallback)) {
        let tables: Vec<TrtcCloudCallback> = {
            let state = self.state.lock();
            state
                .registered
                .get(&cloud)
                .map(|tables| {
                    tables
                        .iter()
                        // SAFETY: registered tables are allocated until
                        // `destroy_callback`, which requires removal first.
                        .map(|addr| unsafe { *(*addr as *const TrtcCloudCallback) })
                        .collect()
                })
                .unwrap_or_default()
        };
        for table in &tables {
            f(table);
        }
    }

    /// Deliver an error event
    pub fn fire_error(&self, cloud: CloudPtr, code: c_int, msg: Option<&CStr>) {
        let msg = opt_ptr(msg);
        self.fire(cloud, |t| {
            if let Some(cb) = t.on_error {
                unsafe { cb(t.ctx, code, msg, std::ptr::null_mut()) }
            }
        });
    }

    /// Deliver a warning event
    pub fn fire_warning(&self, cloud: CloudPtr, code: c_int, msg: Option<&CStr>) {
        let msg = opt_ptr(msg);
        self.fire(cloud, |t| {
            if let Some(cb) = t.on_warning {
                unsafe { cb(t.ctx, code, msg, std::ptr::null_mut()) }
            }
        });
    }

    /// Deliver the outcome of `enter_room`
    pub fn fire_enter_room(&self, cloud: CloudPtr, result: c_int) {
        self.fire(cloud, |t| {
            if let Some(cb) = t.on_enter_room {
                unsafe { cb(t.ctx, result) }
            }
        });
    }

    /// Deliver a room exit
    pub fn fire_exit_room(&self, cloud: CloudPtr, reason: c_int) {
        self.fire(cloud, |t| {
            if let Some(cb) = t.on_exit_room {
                unsafe { cb(t.ctx, reason) }
            }
        });
    }

    /// Deliver a remote user joining
    pub fn fire_remote_user_enter_room(&self, cloud: CloudPtr, user_id: Option<&CStr>) {
        let user_id = opt_ptr(user_id);
        self.fire(cloud, |t| {
            if let Some(cb) = t.on_remote_user_enter_room {
                unsafe { cb(t.ctx, user_id) }
            }
        });
    }

    /// Deliver a remote user leaving
    pub fn fire_remote_user_leave_room(
        &self,
        cloud: CloudPtr,
        user_id: Option<&CStr>,
        reason: c_int,
    ) {
        let user_id = opt_ptr(user_id);
        self.fire(cloud, |t| {
            if let Some(cb) = t.on_remote_user_leave_room {
                unsafe { cb(t.ctx, user_id, reason) }
            }
        });
    }

    /// Deliver the first local video frame notice
    pub fn fire_send_first_local_video_frame(&self, cloud: CloudPtr, stream_type: c_int) {
        self.fire(cloud, |t| {
            if let Some(cb) = t.on_send_first_local_video_frame {
                unsafe { cb(t.ctx, stream_type) }
            }
        });
    }

    /// Deliver the first local audio frame notice
    pub fn fire_send_first_local_audio_frame(&self, cloud: CloudPtr) {
        self.fire(cloud, |t| {
            if let Some(cb) = t.on_send_first_local_audio_frame {
                unsafe { cb(t.ctx) }
            }
        });
    }

    /// Deliver a connection loss
    pub fn fire_connection_lost(&self, cloud: CloudPtr) {
        self.fire(cloud, |t| {
            if let Some(cb) = t.on_connection_lost {
                unsafe { cb(t.ctx) }
            }
        });
    }

    /// Deliver a reconnect attempt
    pub fn fire_try_to_reconnect(&self, cloud: CloudPtr) {
        self.fire(cloud, |t| {
            if let Some(cb) = t.on_try_to_reconnect {
                unsafe { cb(t.ctx) }
            }
        });
    }

    /// Deliver a connection recovery
    pub fn fire_connection_recovery(&self, cloud: CloudPtr) {
        self.fire(cloud, |t| {
            if let Some(cb) = t.on_connection_recovery {
                unsafe { cb(t.ctx) }
            }
        });
    }
}

fn opt_ptr(value: Option<&CStr>) -> *const c_char {
    value.map_or(std::ptr::null(), CStr::as_ptr)
}

fn decode(ptr: *const c_char) -> String {
    // SAFETY: pointers in a room request come from live CStrings
    unsafe { sys::c_char_to_string(ptr) }.unwrap_or_default()
}

impl NativeEngine for RecordingEngine {
    fn share_instance(&self) -> Option<CloudPtr> {
        let mut state = self.state.lock();
        state.calls.push(EngineCall::ShareInstance);
        if state.main.is_none() {
            state.main = state.fake_handle();
        }
        state.main
    }

    fn destroy_share_instance(&self) {
        let mut state = self.state.lock();
        state.calls.push(EngineCall::DestroyShareInstance);
        if let Some(main) = state.main.take() {
            state.registered.remove(&main);
        }
    }

    fn create_sub_cloud(&self) -> Option<CloudPtr> {
        let mut state = self.state.lock();
        let cloud = state.fake_handle()?;
        state.subs.insert(cloud);
        state.record(EngineCall::CreateSubCloud { cloud });
        Some(cloud)
    }

    fn destroy_sub_cloud(&self, cloud: CloudPtr) {
        let mut state = self.state.lock();
        state.record(EngineCall::DestroySubCloud { cloud });
        state.subs.remove(&cloud);
        state.registered.remove(&cloud);
    }

    fn sdk_version(&self, cloud: CloudPtr) -> String {
        self.state.lock().assert_live(cloud);
        Self::VERSION.to_string()
    }

    fn set_console_enabled(&self, cloud: CloudPtr, enabled: bool) {
        self.state
            .lock()
            .record(EngineCall::SetConsoleEnabled { cloud, enabled });
    }

    fn set_log_compress_enabled(&self, cloud: CloudPtr, enabled: bool) {
        self.state
            .lock()
            .record(EngineCall::SetLogCompressEnabled { cloud, enabled });
    }

    fn set_log_level(&self, cloud: CloudPtr, level: c_int) {
        self.state
            .lock()
            .record(EngineCall::SetLogLevel { cloud, level });
    }

    fn set_log_dir_path(&self, cloud: CloudPtr, path: &CStr) {
        let path = path.to_string_lossy().into_owned();
        self.state
            .lock()
            .record(EngineCall::SetLogDirPath { cloud, path });
    }

    fn mute_local_video(&self, cloud: CloudPtr, stream_type: c_int, mute: bool) {
        self.state.lock().record(EngineCall::MuteLocalVideo {
            cloud,
            stream_type,
            mute,
        });
    }

    fn mute_local_audio(&self, cloud: CloudPtr, mute: bool) {
        self.state
            .lock()
            .record(EngineCall::MuteLocalAudio { cloud, mute });
    }

    fn create_callback(&self) -> Option<NonNull<TrtcCloudCallback>> {
        let mut state = self.state.lock();
        if state.fail_callback_allocation {
            return None;
        }
        let table = NonNull::from(Box::leak(Box::new(TrtcCloudCallback::default())));
        state.tables.insert(table.as_ptr() as usize);
        Some(table)
    }

    fn destroy_callback(&self, table: NonNull<TrtcCloudCallback>) {
        let mut state = self.state.lock();
        let addr = table.as_ptr() as usize;
        assert!(state.tables.remove(&addr), "callback table freed twice");
        assert!(
            state.registered.values().all(|t| !t.contains(&addr)),
            "callback table freed while still registered"
        );
        // SAFETY: allocated by `create_callback` and removed from the live set
        // above, so this is the only free.
        drop(unsafe { Box::from_raw(table.as_ptr()) });
    }

    fn add_callback(&self, cloud: CloudPtr, table: NonNull<TrtcCloudCallback>) {
        let mut state = self.state.lock();
        state.record(EngineCall::AddCallback { cloud });
        let addr = table.as_ptr() as usize;
        let registered = state.registered.entry(cloud).or_default();
        if !registered.contains(&addr) {
            registered.push(addr);
        }
    }

    fn remove_callback(&self, cloud: CloudPtr, table: NonNull<TrtcCloudCallback>) {
        let mut state = self.state.lock();
        state.record(EngineCall::RemoveCallback { cloud });
        let addr = table.as_ptr() as usize;
        if let Some(registered) = state.registered.get_mut(&cloud) {
            registered.retain(|t| *t != addr);
        }
    }

    fn enter_room(&self, cloud: CloudPtr, params: &sys::TrtcParams, scene: c_int) {
        let request = RecordedRoomRequest {
            app_id: params.sdk_app_id,
            room_id: params.room_id,
            user_id: decode(params.user_id),
            user_sig: decode(params.user_sig),
            str_room_id: decode(params.str_room_id),
            private_map_key: decode(params.private_map_key),
            role: params.role,
        };
        let result = {
            let mut state = self.state.lock();
            state.record(EngineCall::EnterRoom {
                cloud,
                request,
                scene,
            });
            state.enter_room_result
        };
        if let Some(result) = result {
            self.fire_enter_room(cloud, result);
        }
    }

    fn exit_room(&self, cloud: CloudPtr) {
        self.state.lock().record(EngineCall::ExitRoom { cloud });
    }

    fn set_default_stream_recv_mode(&self, cloud: CloudPtr, auto_audio: bool, auto_video: bool) {
        self.state.lock().record(EngineCall::SetDefaultStreamRecvMode {
            cloud,
            auto_audio,
            auto_video,
        });
    }

    fn enable_custom_video_capture(&self, cloud: CloudPtr, stream_type: c_int, enable: bool) {
        self.state.lock().record(EngineCall::EnableCustomVideoCapture {
            cloud,
            stream_type,
            enable,
        });
    }

    fn enable_custom_audio_capture(&self, cloud: CloudPtr, enable: bool) {
        self.state
            .lock()
            .record(EngineCall::EnableCustomAudioCapture { cloud, enable });
    }

    fn set_video_encoder_param(&self, cloud: CloudPtr, param: &sys::TrtcVideoEncParam) {
        self.state.lock().record(EngineCall::SetVideoEncoderParam {
            cloud,
            param: *param,
        });
    }

    fn generate_custom_pts(&self, cloud: CloudPtr) -> u64 {
        let mut state = self.state.lock();
        state.assert_live(cloud);
        state.pts += 33;
        state.pts
    }

    fn send_custom_video_data(&self, cloud: CloudPtr, frame: &FrameData<'_>) {
        assert_eq!(
            frame.data.len(),
            usize::try_from(frame.length).unwrap_or(usize::MAX),
            "frame length does not match its buffer"
        );
        self.state.lock().record(EngineCall::SendCustomVideoData {
            cloud,
            stream_type: frame.stream_type,
            width: frame.width,
            height: frame.height,
            length: frame.length,
            timestamp: frame.timestamp,
            rotation: frame.rotation,
        });
    }

    fn start_local_test(&self, cloud: CloudPtr) {
        self.state.lock().record(EngineCall::StartLocalTest { cloud });
    }
}

impl Drop for RecordingEngine {
    fn drop(&mut self) {
        for addr in self.state.get_mut().tables.drain() {
            // SAFETY: still-allocated tables from `create_callback`
            drop(unsafe { Box::from_raw(addr as *mut TrtcCloudCallback) });
        }
    }
}

impl std::fmt::Debug for RecordingEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("RecordingEngine")
            .field("main", &state.main)
            .field("subs", &state.subs.len())
            .field("tables", &state.tables.len())
            .field("calls", &state.calls.len())
            .finish()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_share_instance_is_stable() {
        let engine = RecordingEngine::new();
        let a = engine.share_instance().unwrap();
        let b = engine.share_instance().unwrap();
        assert_eq!(a, b);
        engine.destroy_share_instance();
        assert!(engine.main_instance().is_none());
    }

    #[test]
    fn test_tables_are_tracked() {
        let engine = RecordingEngine::new();
        let cloud = engine.share_instance().unwrap();
        let table = engine.create_callback().unwrap();
        engine.add_callback(cloud, table);
        assert_eq!(engine.registered_callbacks(cloud), 1);
        engine.remove_callback(cloud, table);
        engine.destroy_callback(table);
        assert_eq!(engine.outstanding_callbacks(), 0);
    }

    #[test]
    #[should_panic(expected = "freed twice")]
    fn test_double_free_is_caught() {
        let engine = RecordingEngine::new();
        let table = engine.create_callback().unwrap();
        engine.destroy_callback(table);
        engine.destroy_callback(table);
    }

    #[test]
    #[should_panic(expected = "destroyed cloud")]
    fn test_call_on_destroyed_sub_is_caught() {
        let engine = RecordingEngine::new();
        engine.share_instance();
        let sub = engine.create_sub_cloud().unwrap();
        engine.destroy_sub_cloud(sub);
        engine.exit_room(sub);
    }
}
