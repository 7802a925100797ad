//! Cloud instance handle
//!
//! A [`TrtcCloud`] wraps one native instance: the process-wide main instance
//! handed out by [`SharedCloud`](crate::SharedCloud), or an independent
//! sub-instance from [`TrtcCloud::create_sub_cloud`].
//!
//! # Room lifecycle
//!
//! ```text
//!   Created ──enter_room──► RoomJoining ──enter result > 0──► RoomJoined
//!      ▲                        │                                 │
//!      └──enter result < 0──────┘                          exit-room event
//!                                                                 ▼
//!   Destroyed ◄──────────── destroy / teardown ────────────── RoomExited
//! ```
//!
//! Joining is asynchronous: `enter_room` returning `Ok` only means the request
//! reached the SDK. The result and room exits arrive as events, and update
//! [`TrtcCloud::state`] only while at least one handler is registered.

use crate::bridge::Registration;
use crate::callback::{CallbackToken, TrtcCallback};
use crate::config::{CloudConfig, LogConfig};
use crate::engine::{CloudPtr, NativeEngine};
use crate::error::{CloudError, Result};
use crate::marshal::{path_c_string, FrameData, RoomRequest};
use crate::types::{LogLevel, RoomParams, VideoEncoderParam, VideoFrame, VideoStreamType};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

/// Which kind of native instance a handle wraps
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CloudKind {
    /// The process-wide instance
    Main,
    /// An independently created instance
    Sub,
}

/// Room state as observed through SDK events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionState {
    /// No room requested yet, or the last join failed
    Created,
    /// `enter_room` issued, waiting for the result
    RoomJoining,
    /// The SDK reported a successful join
    RoomJoined,
    /// The SDK reported leaving the room
    RoomExited,
    /// The native instance is gone
    Destroyed,
}

/// State shared between a handle and the trampolines of its handlers
#[derive(Debug)]
pub(crate) struct SessionStateCell(Mutex<SessionState>);

impl Default for SessionStateCell {
    fn default() -> Self {
        Self(Mutex::new(SessionState::Created))
    }
}

impl SessionStateCell {
    pub(crate) fn get(&self) -> SessionState {
        *self.0.lock()
    }

    fn update(&self, f: impl FnOnce(SessionState) -> SessionState) {
        let mut state = self.0.lock();
        if *state != SessionState::Destroyed {
            *state = f(*state);
        }
    }

    pub(crate) fn begin_join(&self) {
        self.update(|_| SessionState::RoomJoining);
    }

    pub(crate) fn enter_result(&self, result: i32) {
        self.update(|current| match result {
            r if r > 0 => SessionState::RoomJoined,
            r if r < 0 => SessionState::Created,
            _ => current,
        });
    }

    pub(crate) fn exited(&self) {
        self.update(|_| SessionState::RoomExited);
    }

    pub(crate) fn destroyed(&self) {
        *self.0.lock() = SessionState::Destroyed;
    }
}

/// Handle to one native cloud instance
pub struct TrtcCloud {
    engine: Arc<dyn NativeEngine>,
    kind: CloudKind,
    /// `None` once torn down; operations hold the read lock for the duration
    /// of the native call so teardown cannot overlap them
    raw: RwLock<Option<CloudPtr>>,
    callbacks: Mutex<HashMap<CallbackToken, Registration>>,
    state: Arc<SessionStateCell>,
}

impl TrtcCloud {
    pub(crate) fn new(engine: Arc<dyn NativeEngine>, kind: CloudKind, raw: CloudPtr) -> Self {
        Self {
            engine,
            kind,
            raw: RwLock::new(Some(raw)),
            callbacks: Mutex::new(HashMap::new()),
            state: Arc::new(SessionStateCell::default()),
        }
    }

    /// Main or sub-instance
    pub fn kind(&self) -> CloudKind {
        self.kind
    }

    /// Whether this is the process-wide instance
    pub fn is_main_cloud(&self) -> bool {
        self.kind == CloudKind::Main
    }

    /// Native handle, `None` after teardown
    pub fn raw(&self) -> Option<CloudPtr> {
        *self.raw.read()
    }

    /// Whether the native instance has been released
    pub fn is_destroyed(&self) -> bool {
        self.raw.read().is_none()
    }

    /// Room state as last reported by the SDK
    pub fn state(&self) -> SessionState {
        self.state.get()
    }

    /// Number of handlers currently registered
    pub fn callback_count(&self) -> usize {
        self.callbacks.lock().len()
    }

    fn with_raw<T>(&self, f: impl FnOnce(&dyn NativeEngine, CloudPtr) -> T) -> Result<T> {
        let raw = self.raw.read();
        let cloud = (*raw).ok_or(CloudError::Destroyed)?;
        Ok(f(self.engine.as_ref(), cloud))
    }

    /// SDK version string
    ///
    /// # Errors
    ///
    /// Returns [`CloudError::Destroyed`] after teardown
    pub fn sdk_version(&self) -> Result<String> {
        self.with_raw(|engine, cloud| engine.sdk_version(cloud))
    }

    /// Toggle SDK console logging
    ///
    /// # Errors
    ///
    /// Returns [`CloudError::Destroyed`] after teardown
    pub fn set_console_enabled(&self, enabled: bool) -> Result<()> {
        self.with_raw(|engine, cloud| engine.set_console_enabled(cloud, enabled))
    }

    /// Toggle SDK log compression
    ///
    /// # Errors
    ///
    /// Returns [`CloudError::Destroyed`] after teardown
    pub fn set_log_compress_enabled(&self, enabled: bool) -> Result<()> {
        self.with_raw(|engine, cloud| engine.set_log_compress_enabled(cloud, enabled))
    }

    /// Set SDK log verbosity
    ///
    /// # Errors
    ///
    /// Returns [`CloudError::Destroyed`] after teardown
    pub fn set_log_level(&self, level: LogLevel) -> Result<()> {
        self.with_raw(|engine, cloud| engine.set_log_level(cloud, level.as_raw()))
    }

    /// Set the directory the SDK writes its logs to
    ///
    /// # Errors
    ///
    /// Returns a validation error if the path contains a NUL byte (or, off
    /// unix, is not UTF-8), [`CloudError::Destroyed`] after teardown
    pub fn set_log_dir_path(&self, path: &Path) -> Result<()> {
        let path = path_c_string("log_dir_path", path)?;
        self.with_raw(|engine, cloud| engine.set_log_dir_path(cloud, &path))
    }

    /// Push every SDK logging setting at once
    ///
    /// # Errors
    ///
    /// Same as the individual setters
    pub fn apply_log_config(&self, config: &LogConfig) -> Result<()> {
        self.set_console_enabled(config.console_enabled)?;
        self.set_log_compress_enabled(config.compress_enabled)?;
        self.set_log_level(config.level)?;
        if let Some(dir) = &config.dir {
            self.set_log_dir_path(dir)?;
        }
        Ok(())
    }

    /// Push a whole configuration: logging, receive mode, encoder
    ///
    /// # Errors
    ///
    /// Same as the individual setters
    pub fn apply_config(&self, config: &CloudConfig) -> Result<()> {
        self.apply_log_config(&config.log)?;
        self.set_default_stream_recv_mode(config.recv.auto_audio, config.recv.auto_video)?;
        if let Some(encoder) = &config.encoder {
            self.set_video_encoder_param(encoder)?;
        }
        tracing::debug!("Applied configuration to {:?} cloud", self.kind);
        Ok(())
    }

    /// Pause or resume sending local video on a stream
    ///
    /// # Errors
    ///
    /// Returns [`CloudError::Destroyed`] after teardown
    pub fn mute_local_video(&self, stream_type: VideoStreamType, mute: bool) -> Result<()> {
        self.with_raw(|engine, cloud| engine.mute_local_video(cloud, stream_type.as_raw(), mute))
    }

    /// Pause or resume sending local audio
    ///
    /// # Errors
    ///
    /// Returns [`CloudError::Destroyed`] after teardown
    pub fn mute_local_audio(&self, mute: bool) -> Result<()> {
        self.with_raw(|engine, cloud| engine.mute_local_audio(cloud, mute))
    }

    /// Register an event handler
    ///
    /// Allocates one native callback table for the handler. Keep the token to
    /// remove it again; tables still registered at teardown are freed then.
    ///
    /// # Errors
    ///
    /// Returns [`CloudError::AlreadyRegistered`] if this exact handler is
    /// already registered here, [`CloudError::CallbackAllocation`] if the SDK
    /// returns no table, [`CloudError::Destroyed`] after teardown
    pub fn add_callback(&self, handler: Arc<dyn TrtcCallback>) -> Result<CallbackToken> {
        let raw = self.raw.read();
        let cloud = (*raw).ok_or(CloudError::Destroyed)?;
        let token = CallbackToken::of(&handler);

        let mut callbacks = self.callbacks.lock();
        if callbacks.contains_key(&token) {
            return Err(CloudError::AlreadyRegistered);
        }

        let registration =
            Registration::install(self.engine.as_ref(), handler, Arc::clone(&self.state))?;
        self.engine.add_callback(cloud, registration.table());
        callbacks.insert(token, registration);

        tracing::debug!(
            "Registered callback {:?} on {:?} cloud ({} total)",
            token,
            self.kind,
            callbacks.len()
        );
        Ok(token)
    }

    /// Remove a handler by token
    ///
    /// Returns `false` if the token is not (or no longer) registered, in which
    /// case nothing is touched.
    pub fn remove_callback(&self, token: CallbackToken) -> bool {
        let raw = self.raw.read();
        let Some(registration) = self.callbacks.lock().remove(&token) else {
            tracing::debug!("Callback {:?} not registered, nothing to remove", token);
            return false;
        };

        if let Some(cloud) = *raw {
            self.engine.remove_callback(cloud, registration.table());
        }
        registration.release(self.engine.as_ref());
        tracing::debug!("Removed callback {:?} from {:?} cloud", token, self.kind);
        true
    }

    /// Remove a handler by identity
    pub fn remove_handler(&self, handler: &Arc<dyn TrtcCallback>) -> bool {
        self.remove_callback(CallbackToken::of(handler))
    }

    /// Create an independent instance
    ///
    /// # Errors
    ///
    /// Returns [`CloudError::NullInstance`] if the SDK cannot create one,
    /// [`CloudError::Destroyed`] if this handle was torn down
    pub fn create_sub_cloud(&self) -> Result<TrtcCloud> {
        let raw = self.with_raw(|engine, _| engine.create_sub_cloud())?;
        let raw = raw.ok_or(CloudError::NullInstance("sub"))?;
        tracing::info!("Created sub cloud {:?}", raw);
        Ok(TrtcCloud::new(
            Arc::clone(&self.engine),
            CloudKind::Sub,
            raw,
        ))
    }

    /// Destroy a sub-instance
    ///
    /// Registered handlers are removed and freed first. Calling this again is
    /// a no-op.
    ///
    /// # Panics
    ///
    /// Panics when called on the main instance, which must be torn down
    /// through [`SharedCloud::destroy`](crate::SharedCloud::destroy).
    #[allow(clippy::panic)]
    pub fn destroy(&self) {
        if self.kind == CloudKind::Main {
            panic!("the main cloud must be destroyed through SharedCloud::destroy");
        }
        self.teardown(|engine, cloud| engine.destroy_sub_cloud(cloud));
    }

    /// Global teardown of the main instance
    ///
    /// # Panics
    ///
    /// Panics when called on a sub-instance.
    #[allow(clippy::panic)]
    pub(crate) fn release_main(&self) {
        if self.kind == CloudKind::Sub {
            panic!("a sub cloud must be destroyed through its own destroy");
        }
        self.teardown(|engine, _| engine.destroy_share_instance());
    }

    fn teardown(&self, release: impl FnOnce(&dyn NativeEngine, CloudPtr)) {
        let mut raw = self.raw.write();
        let Some(cloud) = raw.take() else {
            return;
        };
        self.drain_callbacks(cloud);
        release(self.engine.as_ref(), cloud);
        self.state.destroyed();
        tracing::info!("Destroyed {:?} cloud {:?}", self.kind, cloud);
    }

    fn drain_callbacks(&self, cloud: CloudPtr) {
        let registrations: Vec<_> = self.callbacks.lock().drain().collect();
        for (token, registration) in registrations {
            tracing::warn!(
                "Callback {:?} still registered at teardown, removing it",
                token
            );
            self.engine.remove_callback(cloud, registration.table());
            registration.release(self.engine.as_ref());
        }
    }

    /// Request to join a room
    ///
    /// Parameters are validated locally first; on failure the SDK is not
    /// contacted. An unset role enters as anchor. The join itself completes
    /// asynchronously and is reported through `on_enter_room`, possibly before
    /// this returns.
    ///
    /// # Errors
    ///
    /// Returns [`CloudError::Validation`] for missing fields,
    /// [`CloudError::Destroyed`] after teardown
    pub fn enter_room(&self, params: &RoomParams) -> Result<()> {
        let request = RoomRequest::new(params)?;
        self.with_raw(|engine, cloud| {
            // The SDK may report the result before returning
            self.state.begin_join();
            engine.enter_room(cloud, &request.as_raw(), request.scene().as_raw())
        })?;
        tracing::info!(
            "Entering room (user {}, room {}/{:?}) as {:?}",
            params.user_id,
            params.room_id,
            params.str_room_id,
            request.role()
        );
        Ok(())
    }

    /// Leave the current room; completion is reported through `on_exit_room`
    ///
    /// # Errors
    ///
    /// Returns [`CloudError::Destroyed`] after teardown
    pub fn exit_room(&self) -> Result<()> {
        self.with_raw(|engine, cloud| engine.exit_room(cloud))
    }

    /// Whether remote audio and video are pulled automatically
    ///
    /// # Errors
    ///
    /// Returns [`CloudError::Destroyed`] after teardown
    pub fn set_default_stream_recv_mode(&self, auto_audio: bool, auto_video: bool) -> Result<()> {
        self.with_raw(|engine, cloud| {
            engine.set_default_stream_recv_mode(cloud, auto_audio, auto_video)
        })
    }

    /// Switch the big stream to caller-supplied frames
    ///
    /// # Errors
    ///
    /// Returns [`CloudError::Destroyed`] after teardown
    pub fn enable_custom_video_capture(&self, enable: bool) -> Result<()> {
        self.enable_custom_video_capture_on(VideoStreamType::Big, enable)
    }

    /// Switch a given stream to caller-supplied frames
    ///
    /// # Errors
    ///
    /// Returns [`CloudError::Destroyed`] after teardown
    pub fn enable_custom_video_capture_on(
        &self,
        stream_type: VideoStreamType,
        enable: bool,
    ) -> Result<()> {
        self.with_raw(|engine, cloud| {
            engine.enable_custom_video_capture(cloud, stream_type.as_raw(), enable)
        })
    }

    /// Switch audio to caller-supplied frames
    ///
    /// # Errors
    ///
    /// Returns [`CloudError::Destroyed`] after teardown
    pub fn enable_custom_audio_capture(&self, enable: bool) -> Result<()> {
        self.with_raw(|engine, cloud| engine.enable_custom_audio_capture(cloud, enable))
    }

    /// Update encoder settings
    ///
    /// # Errors
    ///
    /// Returns [`CloudError::Destroyed`] after teardown
    pub fn set_video_encoder_param(&self, param: &VideoEncoderParam) -> Result<()> {
        let raw_param = param.to_raw();
        self.with_raw(|engine, cloud| engine.set_video_encoder_param(cloud, &raw_param))
    }

    /// Next monotonically increasing timestamp for custom frames
    ///
    /// # Errors
    ///
    /// Returns [`CloudError::Destroyed`] after teardown
    pub fn generate_custom_pts(&self) -> Result<u64> {
        self.with_raw(|engine, cloud| engine.generate_custom_pts(cloud))
    }

    /// Inject one custom video frame
    ///
    /// # Errors
    ///
    /// Returns a validation error for an empty buffer, a declared length that
    /// differs from the buffer's, or values beyond the native `int`;
    /// [`CloudError::Destroyed`] after teardown
    pub fn send_custom_video_data(&self, frame: &VideoFrame<'_>) -> Result<()> {
        let data = FrameData::new(frame)?;
        self.with_raw(|engine, cloud| engine.send_custom_video_data(cloud, &data))
    }

    /// Start the local capture self-test
    ///
    /// # Errors
    ///
    /// Returns [`CloudError::Destroyed`] after teardown
    pub fn start_local_test(&self) -> Result<()> {
        self.with_raw(|engine, cloud| engine.start_local_test(cloud))
    }
}

impl Drop for TrtcCloud {
    fn drop(&mut self) {
        match self.kind {
            CloudKind::Sub => self.teardown(|engine, cloud| engine.destroy_sub_cloud(cloud)),
            // The native main instance outlives this handle until the global
            // teardown; only the tables owned by this handle go.
            CloudKind::Main => {
                if let Some(cloud) = *self.raw.read() {
                    self.drain_callbacks(cloud);
                }
            }
        }
    }
}

impl std::fmt::Debug for TrtcCloud {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrtcCloud")
            .field("kind", &self.kind)
            .field("raw", &self.raw())
            .field("state", &self.state())
            .field("callbacks", &self.callback_count())
            .finish()
    }
}
