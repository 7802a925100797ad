//! Handler registration and event delivery through the recording engine

use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use serial_test::serial;
use std::ffi::CString;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use trtc_core::testing::RecordingEngine;
use trtc_core::{
    dropped_native_events, CallbackToken, CloudError, EventChannel, ExtraInfo, NativeEngine,
    RoomParams, SessionState, SharedCloud, TrtcCallback, TrtcCloud, TrtcEvent,
};

#[derive(Default)]
struct Recorder {
    events: Mutex<Vec<String>>,
}

impl Recorder {
    fn events(&self) -> Vec<String> {
        self.events.lock().clone()
    }

    fn push(&self, event: String) {
        self.events.lock().push(event);
    }
}

impl TrtcCallback for Recorder {
    fn on_error(&self, err_code: i32, err_msg: &str, _extra_info: ExtraInfo<'_>) {
        self.push(format!("error:{}:{}", err_code, err_msg));
    }

    fn on_warning(&self, warning_code: i32, warning_msg: &str, _extra_info: ExtraInfo<'_>) {
        self.push(format!("warning:{}:{}", warning_code, warning_msg));
    }

    fn on_enter_room(&self, result: i32) {
        self.push(format!("enter:{}", result));
    }

    fn on_exit_room(&self, reason: i32) {
        self.push(format!("exit:{}", reason));
    }

    fn on_remote_user_enter_room(&self, user_id: &str) {
        self.push(format!("join:{}", user_id));
    }

    fn on_remote_user_leave_room(&self, user_id: &str, reason: i32) {
        self.push(format!("leave:{}:{}", user_id, reason));
    }

    fn on_send_first_local_video_frame(&self, stream_type: i32) {
        self.push(format!("first_video:{}", stream_type));
    }

    fn on_send_first_local_audio_frame(&self) {
        self.push("first_audio".to_string());
    }

    fn on_connection_lost(&self) {
        self.push("lost".to_string());
    }

    fn on_try_to_reconnect(&self) {
        self.push("reconnecting".to_string());
    }

    fn on_connection_recovery(&self) {
        self.push("recovered".to_string());
    }
}

fn setup() -> (Arc<RecordingEngine>, SharedCloud) {
    let engine = Arc::new(RecordingEngine::new());
    let shared = SharedCloud::new(Arc::clone(&engine) as Arc<dyn NativeEngine>);
    (engine, shared)
}

#[test]
fn test_register_then_remove_frees_table() {
    let (engine, shared) = setup();
    let cloud = shared.instance().unwrap();
    let raw = cloud.raw().unwrap();

    let token = cloud.add_callback(Arc::new(Recorder::default())).unwrap();
    assert_eq!(engine.outstanding_callbacks(), 1);
    assert_eq!(engine.registered_callbacks(raw), 1);
    assert_eq!(cloud.callback_count(), 1);

    assert!(cloud.remove_callback(token));
    assert_eq!(engine.outstanding_callbacks(), 0);
    assert_eq!(engine.registered_callbacks(raw), 0);

    assert!(!cloud.remove_callback(token));
    assert_eq!(engine.outstanding_callbacks(), 0);
}

#[test]
fn test_remove_by_handler_identity() {
    let (engine, shared) = setup();
    let cloud = shared.instance().unwrap();
    let handler: Arc<dyn TrtcCallback> = Arc::new(Recorder::default());
    let other: Arc<dyn TrtcCallback> = Arc::new(Recorder::default());

    cloud.add_callback(Arc::clone(&handler)).unwrap();

    assert!(!cloud.remove_handler(&other));
    assert!(cloud.remove_handler(&handler));
    assert_eq!(engine.outstanding_callbacks(), 0);
}

#[test]
fn test_duplicate_registration_is_rejected() {
    let (engine, shared) = setup();
    let cloud = shared.instance().unwrap();
    let handler: Arc<dyn TrtcCallback> = Arc::new(Recorder::default());

    cloud.add_callback(Arc::clone(&handler)).unwrap();
    let second = cloud.add_callback(Arc::clone(&handler));

    assert!(matches!(second, Err(CloudError::AlreadyRegistered)));
    assert_eq!(engine.outstanding_callbacks(), 1);
}

#[test]
fn test_allocation_failure_surfaces() {
    let (engine, shared) = setup();
    let cloud = shared.instance().unwrap();
    engine.set_fail_callback_allocation(true);

    let result = cloud.add_callback(Arc::new(Recorder::default()));

    assert!(matches!(result, Err(CloudError::CallbackAllocation)));
    assert_eq!(cloud.callback_count(), 0);
}

#[test]
fn test_every_event_kind_is_delivered() {
    let (engine, shared) = setup();
    let cloud = shared.instance().unwrap();
    let raw = cloud.raw().unwrap();
    let recorder = Arc::new(Recorder::default());
    cloud.add_callback(recorder.clone()).unwrap();

    let msg = CString::new("token expired").unwrap();
    let user = CString::new("dave").unwrap();

    engine.fire_enter_room(raw, 310);
    engine.fire_warning(raw, 1102, Some(&msg));
    engine.fire_error(raw, -3308, Some(&msg));
    engine.fire_remote_user_enter_room(raw, Some(&user));
    engine.fire_remote_user_leave_room(raw, Some(&user), 1);
    engine.fire_send_first_local_video_frame(raw, 0);
    engine.fire_send_first_local_audio_frame(raw);
    engine.fire_connection_lost(raw);
    engine.fire_try_to_reconnect(raw);
    engine.fire_connection_recovery(raw);
    engine.fire_exit_room(raw, 0);

    assert_eq!(
        recorder.events(),
        vec![
            "enter:310",
            "warning:1102:token expired",
            "error:-3308:token expired",
            "join:dave",
            "leave:dave:1",
            "first_video:0",
            "first_audio",
            "lost",
            "reconnecting",
            "recovered",
            "exit:0",
        ]
    );
}

#[test]
fn test_events_stay_on_their_instance() {
    let (engine, shared) = setup();
    let main = shared.instance().unwrap();
    let sub = main.create_sub_cloud().unwrap();
    let on_main = Arc::new(Recorder::default());
    let on_sub = Arc::new(Recorder::default());
    main.add_callback(on_main.clone()).unwrap();
    sub.add_callback(on_sub.clone()).unwrap();

    engine.fire_enter_room(sub.raw().unwrap(), 50);

    assert!(on_main.events().is_empty());
    assert_eq!(on_sub.events(), vec!["enter:50"]);
    assert_eq!(main.state(), SessionState::Created);
    assert_eq!(sub.state(), SessionState::RoomJoined);
}

#[test]
fn test_same_handler_on_two_instances() {
    let (engine, shared) = setup();
    let main = shared.instance().unwrap();
    let sub = main.create_sub_cloud().unwrap();
    let handler: Arc<dyn TrtcCallback> = Arc::new(Recorder::default());

    let a = main.add_callback(Arc::clone(&handler)).unwrap();
    let b = sub.add_callback(Arc::clone(&handler)).unwrap();
    assert_eq!(a, b);
    assert_eq!(engine.outstanding_callbacks(), 2);

    assert!(sub.remove_callback(b));
    assert_eq!(engine.outstanding_callbacks(), 1);
    assert_eq!(main.callback_count(), 1);
}

#[test]
fn test_removed_handler_receives_nothing() {
    let (engine, shared) = setup();
    let cloud = shared.instance().unwrap();
    let raw = cloud.raw().unwrap();
    let recorder = Arc::new(Recorder::default());
    let token = cloud.add_callback(recorder.clone()).unwrap();

    cloud.remove_callback(token);
    engine.fire_connection_lost(raw);

    assert!(recorder.events().is_empty());
}

#[test]
fn test_state_follows_room_events() {
    let (engine, shared) = setup();
    let cloud = shared.instance().unwrap();
    let raw = cloud.raw().unwrap();
    cloud.add_callback(Arc::new(Recorder::default())).unwrap();
    let params = RoomParams::new(12345, "alice", "sig").with_str_room_id("room1");

    assert_eq!(cloud.state(), SessionState::Created);
    cloud.enter_room(&params).unwrap();
    assert_eq!(cloud.state(), SessionState::RoomJoining);

    engine.fire_enter_room(raw, -100018);
    assert_eq!(cloud.state(), SessionState::Created);

    cloud.enter_room(&params).unwrap();
    engine.fire_enter_room(raw, 420);
    assert_eq!(cloud.state(), SessionState::RoomJoined);

    cloud.exit_room().unwrap();
    assert_eq!(cloud.state(), SessionState::RoomJoined);
    engine.fire_exit_room(raw, 0);
    assert_eq!(cloud.state(), SessionState::RoomExited);

    shared.destroy();
    assert_eq!(cloud.state(), SessionState::Destroyed);
}

#[test]
fn test_join_result_reported_before_enter_room_returns() {
    let (engine, shared) = setup();
    let cloud = shared.instance().unwrap();
    let recorder = Arc::new(Recorder::default());
    cloud.add_callback(recorder.clone()).unwrap();
    let params = RoomParams::new(12345, "alice", "sig").with_room_id(7);

    engine.set_enter_room_result(Some(-3308));
    cloud.enter_room(&params).unwrap();
    assert_eq!(cloud.state(), SessionState::Created);

    engine.set_enter_room_result(Some(150));
    cloud.enter_room(&params).unwrap();
    assert_eq!(cloud.state(), SessionState::RoomJoined);
    assert_eq!(recorder.events(), vec!["enter:-3308", "enter:150"]);
}

/// Handler that unregisters itself from inside an event
struct RemovesItself {
    cloud: Weak<TrtcCloud>,
    token: Mutex<Option<CallbackToken>>,
    calls: Arc<AtomicUsize>,
    dropped: Arc<AtomicBool>,
}

impl TrtcCallback for RemovesItself {
    fn on_connection_lost(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let token = *self.token.lock();
        if let (Some(cloud), Some(token)) = (self.cloud.upgrade(), token) {
            assert!(cloud.remove_callback(token));
        }
        // Still alive until delivery returns
        assert!(!self.dropped.load(Ordering::SeqCst));
    }
}

impl Drop for RemovesItself {
    fn drop(&mut self) {
        self.dropped.store(true, Ordering::SeqCst);
    }
}

#[test]
fn test_handler_can_remove_itself_while_running() {
    let (engine, shared) = setup();
    let cloud = shared.instance().unwrap();
    let raw = cloud.raw().unwrap();
    let calls = Arc::new(AtomicUsize::new(0));
    let dropped = Arc::new(AtomicBool::new(false));

    let handler = Arc::new(RemovesItself {
        cloud: Arc::downgrade(&cloud),
        token: Mutex::new(None),
        calls: Arc::clone(&calls),
        dropped: Arc::clone(&dropped),
    });
    let token = cloud.add_callback(handler.clone()).unwrap();
    *handler.token.lock() = Some(token);
    // The registration holds the only strong reference from here on
    drop(handler);

    engine.fire_connection_lost(raw);

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(dropped.load(Ordering::SeqCst));
    assert_eq!(cloud.callback_count(), 0);
    assert_eq!(engine.outstanding_callbacks(), 0);
    assert_eq!(engine.registered_callbacks(raw), 0);

    engine.fire_connection_lost(raw);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn test_teardown_frees_remaining_registrations() {
    let (engine, shared) = setup();
    let sub = shared.create_sub_cloud().unwrap();
    for _ in 0..3 {
        sub.add_callback(Arc::new(Recorder::default())).unwrap();
    }
    let main = shared.instance().unwrap();
    main.add_callback(Arc::new(Recorder::default())).unwrap();
    assert_eq!(engine.outstanding_callbacks(), 4);

    sub.destroy();
    assert_eq!(engine.outstanding_callbacks(), 1);
    assert_eq!(sub.callback_count(), 0);

    shared.destroy();
    assert_eq!(engine.outstanding_callbacks(), 0);
    assert_eq!(main.callback_count(), 0);
}

#[test]
#[serial]
fn test_null_strings_are_dropped_and_counted() {
    let (engine, shared) = setup();
    let cloud = shared.instance().unwrap();
    let raw = cloud.raw().unwrap();
    let recorder = Arc::new(Recorder::default());
    cloud.add_callback(recorder.clone()).unwrap();
    let before = dropped_native_events();

    engine.fire_remote_user_enter_room(raw, None);
    engine.fire_remote_user_leave_room(raw, None, 0);
    engine.fire_error(raw, -1, None);
    engine.fire_warning(raw, 1, None);

    assert!(recorder.events().is_empty());
    assert_eq!(dropped_native_events() - before, 4);
}

#[test]
#[serial]
fn test_null_context_is_dropped_and_counted() {
    let (engine, shared) = setup();
    let cloud = shared.instance().unwrap();
    let raw = cloud.raw().unwrap();
    let recorder = Arc::new(Recorder::default());
    cloud.add_callback(recorder.clone()).unwrap();
    let before = dropped_native_events();

    engine.fire(raw, |t| {
        if let Some(cb) = t.on_enter_room {
            unsafe { cb(std::ptr::null_mut(), 120) }
        }
        if let Some(cb) = t.on_connection_recovery {
            unsafe { cb(std::ptr::null_mut()) }
        }
    });

    assert!(recorder.events().is_empty());
    assert_eq!(cloud.state(), SessionState::Created);
    assert_eq!(dropped_native_events() - before, 2);
}

#[test]
fn test_non_utf8_is_decoded_lossily() {
    let (engine, shared) = setup();
    let cloud = shared.instance().unwrap();
    let raw = cloud.raw().unwrap();
    let recorder = Arc::new(Recorder::default());
    cloud.add_callback(recorder.clone()).unwrap();

    let user = CString::new(vec![b'e', 0xff, b'v', b'e']).unwrap();
    engine.fire_remote_user_enter_room(raw, Some(&user));

    assert_eq!(recorder.events(), vec!["join:e\u{fffd}ve"]);
}

#[tokio::test]
async fn test_event_channel_end_to_end() {
    let (engine, shared) = setup();
    let cloud = shared.instance().unwrap();
    let raw = cloud.raw().unwrap();
    let channel = Arc::new(EventChannel::default());
    let mut rx = channel.subscribe();
    cloud.add_callback(channel).unwrap();

    let user = CString::new("erin").unwrap();
    let fire = Arc::clone(&engine);
    tokio::task::spawn_blocking(move || {
        fire.fire_enter_room(raw, 90);
        fire.fire_remote_user_enter_room(raw, Some(&user));
    })
    .await
    .unwrap();

    assert_eq!(rx.recv().await.unwrap(), TrtcEvent::EnterRoom { result: 90 });
    assert_eq!(
        rx.recv().await.unwrap(),
        TrtcEvent::RemoteUserEnterRoom {
            user_id: "erin".to_string()
        }
    );
}
