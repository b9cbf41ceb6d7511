//! 电机指令定义模块
//!
//! `MotorCommand` 是所有入口（REST 请求体、WebSocket 帧、会话内部的急停）
//! 共用的规范化指令形式。
//!
//! # 校验规则
//!
//! - `motor`、`direction`、`speed` 必填，类型错误返回对应字段的错误
//! - `speed` 超出 [0, 100] 直接报错，**不做截断**
//! - `direction` 区分大小写，只接受 `forward` / `backward` / `stop`
//! - `duration`（毫秒）可选，`null` 视为未提供

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{MAX_SPEED, ValidationError};

/// 电机转动方向
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Forward,
    Backward,
    Stop,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Forward => "forward",
            Direction::Backward => "backward",
            Direction::Stop => "stop",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Direction {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "forward" => Ok(Direction::Forward),
            "backward" => Ok(Direction::Backward),
            "stop" => Ok(Direction::Stop),
            other => Err(ValidationError::UnknownDirection(other.to_string())),
        }
    }
}

/// 规范化的电机指令
///
/// 字段私有，只能通过校验过的构造器创建，因此 `speed <= 100` 恒成立。
///
/// 序列化字段名与 REST 请求体一致（`motor` / `direction` / `speed` / `duration`），
/// 反序列化走 [`MotorCommand::validate`]，REST 层可以直接绑定 `Json<MotorCommand>`。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Map<String, Value>")]
pub struct MotorCommand {
    #[serde(rename = "motor")]
    motor_index: u8,
    direction: Direction,
    speed: u8,
    #[serde(rename = "duration", skip_serializing_if = "Option::is_none")]
    duration_ms: Option<u32>,
}

impl MotorCommand {
    /// 创建指令（校验速度范围）
    pub fn new(
        motor_index: u8,
        direction: Direction,
        speed: u8,
        duration_ms: Option<u32>,
    ) -> Result<Self, ValidationError> {
        if speed > MAX_SPEED {
            return Err(ValidationError::SpeedOutOfRange(i128::from(speed)));
        }
        Ok(Self {
            motor_index,
            direction,
            speed,
            duration_ms,
        })
    }

    /// 停止指定电机
    ///
    /// 速度固定为 0，无需经过速度校验。
    pub fn stop(motor_index: u8) -> Self {
        Self {
            motor_index,
            direction: Direction::Stop,
            speed: 0,
            duration_ms: None,
        }
    }

    /// 从松散类型的 JSON 对象解析并校验指令
    ///
    /// 字段检查顺序：`motor` → `direction` → `speed` → `duration`，
    /// 返回遇到的第一个错误。
    pub fn validate(raw: &Map<String, Value>) -> Result<Self, ValidationError> {
        let motor_index = require_motor_index(raw)?;

        let direction = match raw.get("direction") {
            None | Some(Value::Null) => return Err(ValidationError::Missing { field: "direction" }),
            Some(Value::String(s)) => s.parse::<Direction>()?,
            Some(_) => {
                return Err(ValidationError::WrongType {
                    field: "direction",
                    expected: "a string",
                });
            },
        };

        let speed = require_integer(raw, "speed")?;
        if !(0..=i128::from(MAX_SPEED)).contains(&speed) {
            return Err(ValidationError::SpeedOutOfRange(speed));
        }

        let duration_ms = match optional_integer(raw, "duration")? {
            None => None,
            Some(ms) => Some(u32::try_from(ms).map_err(|_| ValidationError::OutOfRange {
                field: "duration",
                value: ms,
            })?),
        };

        // speed 已在 [0, 100] 内
        Self::new(motor_index, direction, speed as u8, duration_ms)
    }

    /// 停止指令的快捷校验：只读取 `motor` 字段
    pub fn validate_stop(raw: &Map<String, Value>) -> Result<Self, ValidationError> {
        Ok(Self::stop(require_motor_index(raw)?))
    }

    /// 电机索引
    pub fn motor_index(&self) -> u8 {
        self.motor_index
    }

    /// 转动方向
    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// 速度（百分比）
    pub fn speed(&self) -> u8 {
        self.speed
    }

    /// 持续时间（毫秒），`None` 表示持续转动直到下一条指令
    pub fn duration_ms(&self) -> Option<u32> {
        self.duration_ms
    }

    /// 是否为停止语义
    ///
    /// `direction == Stop` 与 `speed == 0` 等价。
    pub fn is_stop(&self) -> bool {
        self.direction == Direction::Stop || self.speed == 0
    }

    /// 归一化：所有停止语义的指令都变为 `MotorCommand::stop(index)`
    pub fn normalized(self) -> Self {
        if self.is_stop() {
            Self::stop(self.motor_index)
        } else {
            self
        }
    }

    /// 检查电机索引是否小于电机数量
    pub fn ensure_motor_index(&self, motor_count: u8) -> Result<(), ValidationError> {
        if self.motor_index >= motor_count {
            return Err(ValidationError::MotorOutOfRange {
                index: self.motor_index,
                count: motor_count,
            });
        }
        Ok(())
    }
}

impl TryFrom<Map<String, Value>> for MotorCommand {
    type Error = ValidationError;

    fn try_from(raw: Map<String, Value>) -> Result<Self, Self::Error> {
        Self::validate(&raw)
    }
}

impl fmt::Display for MotorCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "M{} {} speed={}",
            u16::from(self.motor_index) + 1,
            self.direction,
            self.speed
        )?;
        if let Some(ms) = self.duration_ms {
            write!(f, " for {}ms", ms)?;
        }
        Ok(())
    }
}

/// 读取电机索引（0-255）
fn require_motor_index(raw: &Map<String, Value>) -> Result<u8, ValidationError> {
    let motor = require_integer(raw, "motor")?;
    u8::try_from(motor).map_err(|_| ValidationError::OutOfRange {
        field: "motor",
        value: motor,
    })
}

/// 读取必填整数字段
fn require_integer(raw: &Map<String, Value>, field: &'static str) -> Result<i128, ValidationError> {
    optional_integer(raw, field)?.ok_or(ValidationError::Missing { field })
}

/// 读取可选整数字段（`null` 视为缺失）
///
/// 小数和非数字都算类型错误。
fn optional_integer(
    raw: &Map<String, Value>,
    field: &'static str,
) -> Result<Option<i128>, ValidationError> {
    match raw.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => n
            .as_i64()
            .map(i128::from)
            .or_else(|| n.as_u64().map(i128::from))
            .map(Some)
            .ok_or(ValidationError::WrongType {
                field,
                expected: "an integer",
            }),
        Some(_) => Err(ValidationError::WrongType {
            field,
            expected: "an integer",
        }),
    }
}
