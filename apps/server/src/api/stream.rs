//! WebSocket 消息解码与分发
//!
//! 每个文本帧解码为一个 [`Envelope`]，分发后恰好产生一个 [`OutboundEvent`]。
//! 本模块不接触 socket，连接循环见 [`super::websocket`]。
//!
//! 判别字段优先取 `command`（必须是字符串），否则取 `type`：
//!
//! ```text
//! {"command": "move_motor", "motor": 0, "direction": "forward", "speed": 60}
//! {"type": "get_status"}
//! ```

use roboarm_session::{MotorCommand, SessionError, ValidationError};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use super::AppState;

/// 解码后的入站消息
#[derive(Debug, Clone, PartialEq)]
pub enum Envelope {
    Connect,
    Disconnect,
    /// 字段校验结果；连接检查先于校验执行
    MoveMotor(Result<MotorCommand, ValidationError>),
    StopMotor(Result<MotorCommand, ValidationError>),
    StopAll,
    GetStatus,
    Unknown(String),
    /// 既没有字符串 `command` 也没有字符串 `type`
    NoDiscriminator,
    /// 判别字段为空字符串
    EmptyDiscriminator,
}

/// 无法继续处理的帧（连接循环据此退出）
#[derive(Error, Debug)]
pub enum FrameError {
    #[error("Malformed JSON frame: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("Frame is not a JSON object")]
    NotAnObject,
}

impl Envelope {
    pub fn decode(text: &str) -> Result<Self, FrameError> {
        let Value::Object(raw) = serde_json::from_str::<Value>(text)? else {
            return Err(FrameError::NotAnObject);
        };
        Ok(Self::from_object(&raw))
    }

    pub fn from_object(raw: &Map<String, Value>) -> Self {
        let discriminator = match (raw.get("command"), raw.get("type")) {
            (Some(Value::String(command)), _) => command.as_str(),
            (_, Some(Value::String(kind))) => kind.as_str(),
            _ => return Envelope::NoDiscriminator,
        };

        match discriminator {
            "" => Envelope::EmptyDiscriminator,
            "connect" => Envelope::Connect,
            "disconnect" => Envelope::Disconnect,
            "move_motor" => Envelope::MoveMotor(MotorCommand::validate(raw)),
            "stop_motor" => Envelope::StopMotor(MotorCommand::validate_stop(raw)),
            "stop_all" => Envelope::StopAll,
            "get_status" => Envelope::GetStatus,
            other => Envelope::Unknown(other.to_string()),
        }
    }
}

/// 出站事件类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventKind {
    #[serde(rename = "connection_status")]
    ConnectionStatus,
    #[serde(rename = "motor_command")]
    MotorCommandResult,
    #[serde(rename = "status")]
    StatusReport,
    #[serde(rename = "error")]
    ErrorReport,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionStatus {
    pub connected: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MotorCommandResult {
    pub success: bool,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusReport {
    pub robot_connected: bool,
    pub active_connections: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EventData {
    Connection(ConnectionStatus),
    Motor(MotorCommandResult),
    Status(StatusReport),
}

/// 出站事件 `{type, message?, data?}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundEvent {
    #[serde(rename = "type")]
    pub kind: EventKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<EventData>,
}

impl OutboundEvent {
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            kind: EventKind::ErrorReport,
            message: Some(message.into()),
            data: None,
        }
    }

    fn connection(connected: bool, message: &str) -> Self {
        Self {
            kind: EventKind::ConnectionStatus,
            message: None,
            data: Some(EventData::Connection(ConnectionStatus {
                connected,
                message: Some(message.to_string()),
            })),
        }
    }

    fn motor_success(message: &str) -> Self {
        Self {
            kind: EventKind::MotorCommandResult,
            message: None,
            data: Some(EventData::Motor(MotorCommandResult {
                success: true,
                message: message.to_string(),
            })),
        }
    }

    fn status(report: StatusReport) -> Self {
        Self {
            kind: EventKind::StatusReport,
            message: None,
            data: Some(EventData::Status(report)),
        }
    }

    pub fn is_error(&self) -> bool {
        self.kind == EventKind::ErrorReport
    }
}

const NOT_CONNECTED: &str = "Not connected to robot";

/// 执行一条会话操作，成功时返回 `success`，失败时前缀 `context`
async fn run<F>(state: &AppState, f: F, success: OutboundEvent, context: &str) -> OutboundEvent
where
    F: FnOnce(&roboarm_session::DeviceSession) -> Result<(), SessionError> + Send + 'static,
{
    match state.with_session(f).await {
        Ok(Ok(())) => success,
        Ok(Err(e)) => OutboundEvent::error(format!("{}{}", context, e)),
        Err(e) => OutboundEvent::error(e.to_string()),
    }
}

/// 分发一个入站消息
pub async fn dispatch(state: &AppState, envelope: Envelope) -> OutboundEvent {
    match envelope {
        Envelope::NoDiscriminator => OutboundEvent::error("No command or type field found"),
        Envelope::EmptyDiscriminator => OutboundEvent::error("Empty command received"),
        Envelope::Unknown(command) => {
            tracing::debug!("Unknown WebSocket command: '{}'", command);
            OutboundEvent::error(format!("Unknown command: '{}'", command))
        },

        Envelope::Connect => {
            let result = state.with_session(|s| s.connect_discovered()).await;
            match result {
                Ok(Ok(_)) => OutboundEvent::connection(true, "Connected to robot"),
                Ok(Err(SessionError::NotFound(e))) => {
                    OutboundEvent::error(format!("Device not found: {}", e))
                },
                Ok(Err(SessionError::Connection(e))) => {
                    OutboundEvent::error(format!("Connection failed: {}", e))
                },
                Ok(Err(e)) => OutboundEvent::error(format!("Connection failed: {}", e)),
                Err(e) => OutboundEvent::error(format!("Connection failed: {}", e)),
            }
        },

        Envelope::Disconnect => {
            let result = state.with_session(|s| s.disconnect()).await;
            match result {
                Ok(Ok(())) => OutboundEvent::connection(false, "Disconnected from robot"),
                Ok(Err(SessionError::Disconnect(e))) => {
                    OutboundEvent::error(format!("Disconnect failed: {}", e))
                },
                Ok(Err(e)) => OutboundEvent::error(format!("Disconnect failed: {}", e)),
                Err(e) => OutboundEvent::error(format!("Disconnect failed: {}", e)),
            }
        },

        Envelope::GetStatus => OutboundEvent::status(StatusReport {
            robot_connected: state.session.is_connected(),
            active_connections: state.active_connections(),
        }),

        // 以下操作要求已连接，未连接时不调用会话
        _ if !state.session.is_connected() => OutboundEvent::error(NOT_CONNECTED),

        Envelope::MoveMotor(Err(e)) => {
            OutboundEvent::error(format!("Invalid motor command parameters: {}", e))
        },
        Envelope::MoveMotor(Ok(cmd)) => {
            run(
                state,
                move |s| s.send_command(&cmd),
                OutboundEvent::motor_success("Motor command sent"),
                "Failed to send command: ",
            )
            .await
        },

        Envelope::StopMotor(Err(_)) => OutboundEvent::error("Invalid motor parameter"),
        Envelope::StopMotor(Ok(cmd)) => {
            run(
                state,
                move |s| s.send_command(&cmd),
                OutboundEvent::motor_success("Motor stopped"),
                "Failed to stop motor: ",
            )
            .await
        },

        Envelope::StopAll => {
            run(
                state,
                |s| s.stop_all(),
                OutboundEvent::motor_success("All motors stopped"),
                "Failed to stop all motors: ",
            )
            .await
        },
    }
}

/// 处理一个文本帧
///
/// 返回 `Err` 时调用方应结束连接循环。
pub async fn process_frame(state: &AppState, text: &str) -> Result<OutboundEvent, FrameError> {
    let envelope = Envelope::decode(text)?;
    tracing::debug!("WebSocket frame: {:?}", envelope);
    Ok(dispatch(state, envelope).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::test_support::{connected_state, mock_state};
    use roboarm_link::mock::LinkCall;
    use roboarm_session::Direction;
    use serde_json::json;

    fn error_message(event: &OutboundEvent) -> &str {
        assert!(event.is_error(), "Expected error event, got {:?}", event);
        event.message.as_deref().unwrap()
    }

    #[test]
    fn test_decode_discriminator() {
        assert_eq!(Envelope::decode(r#"{"command":"connect"}"#).unwrap(), Envelope::Connect);
        assert_eq!(Envelope::decode(r#"{"type":"stop_all"}"#).unwrap(), Envelope::StopAll);
        // command 优先
        assert_eq!(
            Envelope::decode(r#"{"command":"get_status","type":"connect"}"#).unwrap(),
            Envelope::GetStatus
        );
        // 非字符串的 command 退回到 type
        assert_eq!(
            Envelope::decode(r#"{"command":5,"type":"disconnect"}"#).unwrap(),
            Envelope::Disconnect
        );
        assert_eq!(Envelope::decode("{}").unwrap(), Envelope::NoDiscriminator);
        assert_eq!(Envelope::decode(r#"{"type":null}"#).unwrap(), Envelope::NoDiscriminator);
        assert_eq!(
            Envelope::decode(r#"{"command":"","type":"connect"}"#).unwrap(),
            Envelope::EmptyDiscriminator
        );
    }

    #[test]
    fn test_decode_rejects_non_objects() {
        assert!(matches!(Envelope::decode("[1,2]"), Err(FrameError::NotAnObject)));
        assert!(matches!(Envelope::decode("\"connect\""), Err(FrameError::NotAnObject)));
        assert!(matches!(Envelope::decode("{not json"), Err(FrameError::Malformed(_))));
    }

    #[test]
    fn test_decode_move_motor_fields() {
        let envelope =
            Envelope::decode(r#"{"command":"move_motor","motor":1,"direction":"forward","speed":40}"#)
                .unwrap();
        let Envelope::MoveMotor(Ok(cmd)) = envelope else {
            panic!("Expected valid move_motor, got {:?}", envelope);
        };
        assert_eq!(cmd.motor_index(), 1);
        assert_eq!(cmd.direction(), Direction::Forward);
        assert_eq!(cmd.speed(), 40);

        let envelope =
            Envelope::decode(r#"{"command":"move_motor","motor":1,"direction":"up","speed":40}"#)
                .unwrap();
        assert!(matches!(
            envelope,
            Envelope::MoveMotor(Err(ValidationError::UnknownDirection(_)))
        ));
    }

    #[test]
    fn test_event_wire_shape() {
        let event = OutboundEvent::connection(true, "Connected to robot");
        assert_eq!(
            serde_json::to_value(&event).unwrap(),
            json!({"type": "connection_status", "data": {"connected": true, "message": "Connected to robot"}})
        );

        let event = OutboundEvent::error("Empty command received");
        assert_eq!(
            serde_json::to_value(&event).unwrap(),
            json!({"type": "error", "message": "Empty command received"})
        );

        let event = OutboundEvent::status(StatusReport {
            robot_connected: false,
            active_connections: 2,
        });
        let text = serde_json::to_string(&event).unwrap();
        let back: OutboundEvent = serde_json::from_str(&text).unwrap();
        assert_eq!(back, event);
    }

    #[tokio::test]
    async fn test_discriminator_errors_keep_session_untouched() {
        let (state, probe) = mock_state();

        let event = process_frame(&state, "{}").await.unwrap();
        assert_eq!(error_message(&event), "No command or type field found");

        let event = process_frame(&state, r#"{"command":""}"#).await.unwrap();
        assert_eq!(error_message(&event), "Empty command received");

        let event = process_frame(&state, r#"{"type":"frobnicate"}"#).await.unwrap();
        assert_eq!(error_message(&event), "Unknown command: 'frobnicate'");

        assert_eq!(probe.call_count(), 0);
    }

    #[tokio::test]
    async fn test_move_motor_connected() {
        let (state, probe) = connected_state();
        let frame = r#"{"command":"move_motor","motor":0,"direction":"forward","speed":60}"#;

        let event = process_frame(&state, frame).await.unwrap();
        assert_eq!(event, OutboundEvent::motor_success("Motor command sent"));

        let frames = probe.sent_frames();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].motor, 0);
        assert_eq!(frames[0].direction, Direction::Forward);
    }

    #[tokio::test]
    async fn test_move_motor_disconnected() {
        let (state, probe) = mock_state();
        let frame = r#"{"command":"move_motor","motor":0,"direction":"forward","speed":60}"#;

        let event = process_frame(&state, frame).await.unwrap();
        assert_eq!(error_message(&event), "Not connected to robot");
        assert_eq!(probe.call_count(), 0);
    }

    #[tokio::test]
    async fn test_connection_check_precedes_validation() {
        let (state, probe) = mock_state();
        let frame = r#"{"command":"move_motor","motor":"zero"}"#;

        let event = process_frame(&state, frame).await.unwrap();
        assert_eq!(error_message(&event), "Not connected to robot");
        assert_eq!(probe.call_count(), 0);
    }

    #[tokio::test]
    async fn test_move_motor_invalid_parameters() {
        let (state, probe) = connected_state();

        let frame = r#"{"command":"move_motor","motor":0,"direction":"forward","speed":150}"#;
        let event = process_frame(&state, frame).await.unwrap();
        let message = error_message(&event);
        assert!(message.starts_with("Invalid motor command parameters"));
        assert!(message.contains("150"));

        let frame = r#"{"command":"move_motor","motor":0,"speed":10}"#;
        let event = process_frame(&state, frame).await.unwrap();
        assert!(error_message(&event).contains("direction"));

        assert_eq!(probe.call_count(), 0);
    }

    #[tokio::test]
    async fn test_move_motor_send_failure() {
        let (state, probe) = connected_state();
        probe.fail_send(true);

        let frame = r#"{"command":"move_motor","motor":2,"direction":"backward","speed":20}"#;
        let event = process_frame(&state, frame).await.unwrap();
        assert!(error_message(&event).starts_with("Failed to send command: "));
        assert!(state.session.is_connected());
    }

    #[tokio::test]
    async fn test_stop_motor() {
        let (state, probe) = connected_state();

        let event = process_frame(&state, r#"{"command":"stop_motor","motor":1}"#)
            .await
            .unwrap();
        assert_eq!(event, OutboundEvent::motor_success("Motor stopped"));
        let frames = probe.sent_frames();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].motor, 1);
        assert_eq!(frames[0].direction, Direction::Stop);

        let event = process_frame(&state, r#"{"command":"stop_motor"}"#).await.unwrap();
        assert_eq!(error_message(&event), "Invalid motor parameter");
    }

    #[tokio::test]
    async fn test_stop_all() {
        let (state, probe) = connected_state();

        let event = process_frame(&state, r#"{"type":"stop_all"}"#).await.unwrap();
        assert_eq!(event, OutboundEvent::motor_success("All motors stopped"));
        let motors: Vec<u8> = probe.sent_frames().iter().map(|f| f.motor).collect();
        assert_eq!(motors, vec![0, 1, 2]);

        probe.clear();
        probe.fail_send_at(0);
        let event = process_frame(&state, r#"{"type":"stop_all"}"#).await.unwrap();
        assert!(error_message(&event).starts_with("Failed to stop all motors: Failed to stop motor 0"));
        assert_eq!(probe.sent_frames().len(), 1);
    }

    #[tokio::test]
    async fn test_stop_all_disconnected() {
        let (state, probe) = mock_state();
        let event = process_frame(&state, r#"{"type":"stop_all"}"#).await.unwrap();
        assert_eq!(error_message(&event), "Not connected to robot");
        assert_eq!(probe.call_count(), 0);
    }

    #[tokio::test]
    async fn test_connect_and_disconnect() {
        let (state, probe) = mock_state();

        let event = process_frame(&state, r#"{"command":"connect"}"#).await.unwrap();
        assert_eq!(event, OutboundEvent::connection(true, "Connected to robot"));
        assert!(state.session.is_connected());

        let event = process_frame(&state, r#"{"command":"disconnect"}"#).await.unwrap();
        assert_eq!(event, OutboundEvent::connection(false, "Disconnected from robot"));
        assert!(!state.session.is_connected());

        assert_eq!(probe.calls().last(), Some(&LinkCall::Disconnect));
    }

    #[tokio::test]
    async fn test_connect_failures() {
        let (state, probe) = mock_state();

        probe.fail_scan(true);
        let event = process_frame(&state, r#"{"command":"connect"}"#).await.unwrap();
        assert_eq!(
            error_message(&event),
            "Device not found: no matching device advertised"
        );

        probe.fail_scan(false);
        probe.fail_connect(true);
        let event = process_frame(&state, r#"{"command":"connect"}"#).await.unwrap();
        assert!(error_message(&event).starts_with("Connection failed: "));
        assert!(!state.session.is_connected());
    }

    #[tokio::test]
    async fn test_connect_timeout_keeps_prefix() {
        use roboarm_link::{SimulatedConfig, SimulatedLink};
        use roboarm_session::{BoxedLink, DeviceSession, SessionConfig};
        use std::sync::Arc;
        use std::time::Duration;

        let link: BoxedLink = Box::new(SimulatedLink::new(SimulatedConfig {
            latency: Duration::from_millis(50),
            ..SimulatedConfig::default()
        }));
        let session = DeviceSession::new(
            link,
            SessionConfig {
                link_timeout: Duration::from_millis(5),
                ..SessionConfig::default()
            },
        );
        let state = AppState::new(Arc::new(session));

        let event = process_frame(&state, r#"{"command":"connect"}"#).await.unwrap();
        assert_eq!(error_message(&event), "Device not found: Operation timeout");
        assert!(!state.session.is_connected());
    }

    #[tokio::test]
    async fn test_disconnect_failure_still_disconnects() {
        let (state, probe) = connected_state();
        probe.fail_disconnect(true);

        let event = process_frame(&state, r#"{"command":"disconnect"}"#).await.unwrap();
        assert!(error_message(&event).starts_with("Disconnect failed: "));
        assert!(!state.session.is_connected());
    }

    #[tokio::test]
    async fn test_get_status_counts_connections() {
        let (state, _probe) = connected_state();
        let _a = state.register_connection();
        let _b = state.register_connection();

        let event = process_frame(&state, r#"{"command":"get_status"}"#).await.unwrap();
        assert_eq!(
            event,
            OutboundEvent::status(StatusReport {
                robot_connected: true,
                active_connections: 2,
            })
        );
    }

    #[tokio::test]
    async fn test_error_does_not_end_stream() {
        let (state, _probe) = mock_state();

        for frame in ["{}", r#"{"type":"frobnicate"}"#, r#"{"command":"connect"}"#] {
            assert!(process_frame(&state, frame).await.is_ok());
        }
        assert!(state.session.is_connected());
    }
}
