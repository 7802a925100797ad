//! Property tests for local validation

use proptest::prelude::*;
use std::sync::Arc;
use trtc_core::testing::{EngineCall, RecordingEngine};
use trtc_core::{
    CloudError, NativeEngine, RoleType, RoomParams, SharedCloud, ValidationError, VideoFrame,
};

fn role_strategy() -> impl Strategy<Value = Option<RoleType>> {
    prop_oneof![
        Just(None),
        Just(Some(RoleType::Anchor)),
        Just(Some(RoleType::Audience)),
    ]
}

fn enter_room_calls(engine: &RecordingEngine) -> Vec<EngineCall> {
    engine
        .calls()
        .into_iter()
        .filter(|c| matches!(c, EngineCall::EnterRoom { .. }))
        .collect()
}

proptest! {
    #[test]
    fn prop_empty_user_id_never_reaches_engine(
        app_id in any::<u32>(),
        sig in "[A-Za-z0-9+/=]{0,32}",
        room_id in any::<u32>(),
        str_room_id in "[a-z0-9_]{0,16}",
    ) {
        let engine = Arc::new(RecordingEngine::new());
        let shared = SharedCloud::new(Arc::clone(&engine) as Arc<dyn NativeEngine>);
        let cloud = shared.instance()?;

        let params = RoomParams {
            app_id,
            user_id: String::new(),
            user_signature: sig,
            room_id,
            str_room_id,
            ..RoomParams::default()
        };
        let result = cloud.enter_room(&params);

        prop_assert!(matches!(
            result,
            Err(CloudError::Validation(ValidationError::MissingUserId))
        ));
        prop_assert!(enter_room_calls(&engine).is_empty());
    }

    #[test]
    fn prop_valid_params_are_marshalled_verbatim(
        app_id in any::<u32>(),
        user_id in "[A-Za-z0-9_@.-]{1,32}",
        sig in "[A-Za-z0-9+/=]{1,64}",
        room_id in 1u32..,
        str_room_id in "[a-z0-9_]{0,16}",
        role in role_strategy(),
    ) {
        let engine = Arc::new(RecordingEngine::new());
        let shared = SharedCloud::new(Arc::clone(&engine) as Arc<dyn NativeEngine>);
        let cloud = shared.instance()?;

        let params = RoomParams {
            app_id,
            user_id: user_id.clone(),
            user_signature: sig.clone(),
            room_id,
            str_room_id: str_room_id.clone(),
            role,
            ..RoomParams::default()
        };
        cloud.enter_room(&params)?;

        let calls = enter_room_calls(&engine);
        prop_assert_eq!(calls.len(), 1);
        if let EngineCall::EnterRoom { request, .. } = &calls[0] {
            prop_assert_eq!(request.app_id, app_id);
            prop_assert_eq!(&request.user_id, &user_id);
            prop_assert_eq!(&request.user_sig, &sig);
            prop_assert_eq!(request.room_id, room_id);
            prop_assert_eq!(&request.str_room_id, &str_room_id);
            prop_assert_eq!(request.role, role.unwrap_or(RoleType::Anchor).as_raw());
        }
    }

    #[test]
    fn prop_missing_room_id_is_rejected(
        user_id in "[a-z]{1,8}",
        sig in "[a-z]{1,8}",
    ) {
        let params = RoomParams::new(1, user_id, sig);
        prop_assert_eq!(params.validate(), Err(ValidationError::MissingRoomId));
    }

    #[test]
    fn prop_frame_length_must_match_buffer(
        len in 1usize..4096,
        declared in 0usize..8192,
    ) {
        let engine = Arc::new(RecordingEngine::new());
        let shared = SharedCloud::new(Arc::clone(&engine) as Arc<dyn NativeEngine>);
        let cloud = shared.instance()?;
        engine.clear_calls();

        let data = vec![0u8; len];
        let mut frame = VideoFrame::new(&data, 16, 16);
        frame.buffer_len = declared;
        let result = cloud.send_custom_video_data(&frame);

        if declared == len {
            prop_assert!(result.is_ok());
            prop_assert_eq!(engine.calls().len(), 1);
        } else {
            let rejected = matches!(
                result,
                Err(CloudError::Validation(ValidationError::FrameLengthMismatch { .. }))
            );
            prop_assert!(rejected);
            prop_assert!(engine.calls().is_empty());
        }
    }
}
