//! Async event stream
//!
//! [`EventChannel`] is a ready-made [`TrtcCallback`] that republishes every SDK
//! event on a tokio broadcast channel, for callers that would rather await
//! events than implement the trait.

use crate::callback::{ExtraInfo, TrtcCallback};
use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::broadcast;

/// Default number of events buffered per receiver
pub const DEFAULT_EVENT_CAPACITY: usize = 100;

/// One SDK event as an owned value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum TrtcEvent {
    /// Unrecoverable SDK error
    Error {
        /// SDK error code
        code: i32,
        /// Error text
        message: String,
    },
    /// Recoverable SDK warning
    Warning {
        /// SDK warning code
        code: i32,
        /// Warning text
        message: String,
    },
    /// Outcome of a join request
    EnterRoom {
        /// Elapsed milliseconds if positive, error code if negative
        result: i32,
    },
    /// Left the room
    ExitRoom {
        /// 0 on request, 1 kicked out, 2 room dismissed
        reason: i32,
    },
    /// First local video frame sent
    SendFirstLocalVideoFrame {
        /// Native stream type
        stream_type: i32,
    },
    /// First local audio frame sent
    SendFirstLocalAudioFrame,
    /// Remote user joined
    RemoteUserEnterRoom {
        /// Remote user id
        user_id: String,
    },
    /// Remote user left
    RemoteUserLeaveRoom {
        /// Remote user id
        user_id: String,
        /// 0 left, 1 timed out, 2 kicked out
        reason: i32,
    },
    /// Connection to the server lost
    ConnectionLost,
    /// Reconnecting
    TryToReconnect,
    /// Connection restored
    ConnectionRecovery,
}

impl TrtcEvent {
    /// Whether the event ends the room session
    pub fn is_terminal(&self) -> bool {
        match self {
            Self::ExitRoom { .. } | Self::Error { .. } => true,
            Self::EnterRoom { result } => *result < 0,
            _ => false,
        }
    }
}

impl fmt::Display for TrtcEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Error { code, message } => write!(f, "error {}: {}", code, message),
            Self::Warning { code, message } => write!(f, "warning {}: {}", code, message),
            Self::EnterRoom { result } if *result > 0 => {
                write!(f, "entered room in {} ms", result)
            }
            Self::EnterRoom { result } => write!(f, "failed to enter room: {}", result),
            Self::ExitRoom { reason } => write!(f, "exited room (reason {})", reason),
            Self::SendFirstLocalVideoFrame { stream_type } => {
                write!(f, "first local video frame sent on stream {}", stream_type)
            }
            Self::SendFirstLocalAudioFrame => write!(f, "first local audio frame sent"),
            Self::RemoteUserEnterRoom { user_id } => write!(f, "{} joined", user_id),
            Self::RemoteUserLeaveRoom { user_id, reason } => {
                write!(f, "{} left (reason {})", user_id, reason)
            }
            Self::ConnectionLost => write!(f, "connection lost"),
            Self::TryToReconnect => write!(f, "reconnecting"),
            Self::ConnectionRecovery => write!(f, "connection recovered"),
        }
    }
}

/// Handler publishing events on a broadcast channel
///
/// Receivers that fall more than the channel capacity behind lose the oldest
/// events and see [`broadcast::error::RecvError::Lagged`].
#[derive(Debug, Clone)]
pub struct EventChannel {
    sender: broadcast::Sender<TrtcEvent>,
}

impl Default for EventChannel {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_CAPACITY)
    }
}

impl EventChannel {
    /// Channel buffering `capacity` events per receiver
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Receive events published from now on
    pub fn subscribe(&self) -> broadcast::Receiver<TrtcEvent> {
        self.sender.subscribe()
    }

    /// Number of live receivers
    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }

    fn publish(&self, event: TrtcEvent) {
        tracing::trace!(?event, "Publishing event");
        // No receivers is fine
        let _ = self.sender.send(event);
    }
}

impl TrtcCallback for EventChannel {
    fn on_error(&self, err_code: i32, err_msg: &str, _extra_info: ExtraInfo<'_>) {
        self.publish(TrtcEvent::Error {
            code: err_code,
            message: err_msg.to_string(),
        });
    }

    fn on_warning(&self, warning_code: i32, warning_msg: &str, _extra_info: ExtraInfo<'_>) {
        self.publish(TrtcEvent::Warning {
            code: warning_code,
            message: warning_msg.to_string(),
        });
    }

    fn on_enter_room(&self, result: i32) {
        self.publish(TrtcEvent::EnterRoom { result });
    }

    fn on_exit_room(&self, reason: i32) {
        self.publish(TrtcEvent::ExitRoom { reason });
    }

    fn on_send_first_local_video_frame(&self, stream_type: i32) {
        self.publish(TrtcEvent::SendFirstLocalVideoFrame { stream_type });
    }

    fn on_send_first_local_audio_frame(&self) {
        self.publish(TrtcEvent::SendFirstLocalAudioFrame);
    }

    fn on_remote_user_enter_room(&self, user_id: &str) {
        self.publish(TrtcEvent::RemoteUserEnterRoom {
            user_id: user_id.to_string(),
        });
    }

    fn on_remote_user_leave_room(&self, user_id: &str, reason: i32) {
        self.publish(TrtcEvent::RemoteUserLeaveRoom {
            user_id: user_id.to_string(),
            reason,
        });
    }

    fn on_connection_lost(&self) {
        self.publish(TrtcEvent::ConnectionLost);
    }

    fn on_try_to_reconnect(&self) {
        self.publish(TrtcEvent::TryToReconnect);
    }

    fn on_connection_recovery(&self) {
        self.publish(TrtcEvent::ConnectionRecovery);
    }
}
