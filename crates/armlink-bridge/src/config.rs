//! 桥接配置
//!
//! 从 TOML 文件加载，所有字段都有默认值，文件里只需写要覆盖的部分：
//!
//! ```toml
//! [robot]
//! host = "192.168.58.2"
//!
//! [telemetry]
//! mode = "poll"
//! rate_hz = 50.0
//! ```

use crate::error::ConfigError;
use crate::publisher::PublishOptions;
use armlink_driver::{PipelineConfig, RateLimits};
use armlink_protocol::{ChecksumPolicy, DecoderConfig};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

/// 遥测来源
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TelemetryMode {
    /// 控制器实时状态推送流（TCP）
    #[default]
    Stream,
    /// 按节拍查询控制器
    Poll,
}

/// 控制器连接配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RobotConfig {
    /// 控制器地址
    pub host: String,
    /// 实时状态推送端口
    pub state_port: u16,
    /// 建立推送流连接的超时（毫秒）
    pub connect_timeout_ms: u64,
    /// 推送流断开后的重连间隔（毫秒）
    pub reconnect_interval_ms: u64,
}

impl Default for RobotConfig {
    fn default() -> Self {
        Self {
            host: "192.168.58.2".to_string(),
            state_port: 20004,
            connect_timeout_ms: 1000,
            reconnect_interval_ms: 2000,
        }
    }
}

/// 消息总线配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BusConfig {
    /// 命令监听地址
    pub listen: SocketAddr,
    /// 遥测发送目标
    pub send_to: SocketAddr,
    /// 命令接收超时（毫秒），也是命令线程响应停止信号的上限
    pub receive_timeout_ms: u64,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            listen: SocketAddr::from(([0, 0, 0, 0], 9000)),
            send_to: SocketAddr::from(([127, 0, 0, 1], 8000)),
            receive_timeout_ms: 50,
        }
    }
}

/// 遥测配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    pub mode: TelemetryMode,
    /// 初始发布频率（Hz），可通过 `/telemetry/hz` 运行时修改
    pub rate_hz: f64,
    pub min_rate_hz: f64,
    pub max_rate_hz: f64,
    /// 活性统计周期（毫秒）
    pub liveness_interval_ms: u64,
    /// 推送流允许的最大载荷长度
    pub max_payload_len: usize,
    pub checksum: ChecksumPolicy,
    /// 推送流读超时（毫秒）
    pub read_timeout_ms: u64,
    /// 两次调度之间的最长空闲睡眠（微秒）
    pub idle_sleep_us: u64,
    /// 发布 `/telemetry/stats`
    pub publish_stats: bool,
    /// 发布 `/ft_base`
    pub wrench_in_base: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        let pipeline = PipelineConfig::default();
        let limits = RateLimits::default();
        Self {
            mode: TelemetryMode::default(),
            rate_hz: 20.0,
            min_rate_hz: limits.min_hz,
            max_rate_hz: limits.max_hz,
            liveness_interval_ms: pipeline.liveness_interval.as_millis() as u64,
            max_payload_len: pipeline.decoder.max_payload_len,
            checksum: pipeline.decoder.checksum,
            read_timeout_ms: pipeline.read_timeout.as_millis() as u64,
            idle_sleep_us: pipeline.idle_sleep.as_micros() as u64,
            publish_stats: true,
            wrench_in_base: false,
        }
    }
}

/// 桥接程序完整配置
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    pub robot: RobotConfig,
    pub bus: BusConfig,
    pub telemetry: TelemetryConfig,
}

impl BridgeConfig {
    /// 从 TOML 文件加载并校验
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// 从 TOML 文本解析并校验
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// 序列化为 TOML（用于生成示例配置）
    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Invalid(e.to_string()))
    }

    /// 检查字段之间的约束
    pub fn validate(&self) -> Result<(), ConfigError> {
        let t = &self.telemetry;

        if self.robot.host.trim().is_empty() {
            return Err(ConfigError::Invalid("robot.host must not be empty".into()));
        }
        if self.robot.state_port == 0 {
            return Err(ConfigError::Invalid("robot.state_port must not be 0".into()));
        }
        self.rate_limits()
            .validate()
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        if !t.rate_hz.is_finite() {
            return Err(ConfigError::Invalid(format!(
                "telemetry.rate_hz must be finite, got {}",
                t.rate_hz
            )));
        }
        if t.max_payload_len == 0 || t.max_payload_len > usize::from(u16::MAX) {
            return Err(ConfigError::Invalid(format!(
                "telemetry.max_payload_len must be in 1..=65535, got {}",
                t.max_payload_len
            )));
        }
        if t.read_timeout_ms == 0 || self.bus.receive_timeout_ms == 0 {
            // 0 会让 socket 变成无限阻塞，停止信号无法被发现
            return Err(ConfigError::Invalid("timeouts must be non-zero".into()));
        }
        if t.liveness_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "telemetry.liveness_interval_ms must be non-zero".into(),
            ));
        }
        Ok(())
    }

    pub fn rate_limits(&self) -> RateLimits {
        RateLimits {
            min_hz: self.telemetry.min_rate_hz,
            max_hz: self.telemetry.max_rate_hz,
        }
    }

    /// 转换为驱动层的管线配置
    pub fn pipeline_config(&self) -> PipelineConfig {
        let t = &self.telemetry;
        PipelineConfig {
            read_timeout: Duration::from_millis(t.read_timeout_ms),
            idle_sleep: Duration::from_micros(t.idle_sleep_us),
            liveness_interval: Duration::from_millis(t.liveness_interval_ms),
            decoder: DecoderConfig {
                max_payload_len: t.max_payload_len,
                checksum: t.checksum,
            },
            ..PipelineConfig::default()
        }
    }

    pub fn publish_options(&self) -> PublishOptions {
        PublishOptions {
            publish_stats: self.telemetry.publish_stats,
            wrench_in_base: self.telemetry.wrench_in_base,
        }
    }

    pub fn receive_timeout(&self) -> Duration {
        Duration::from_millis(self.bus.receive_timeout_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.robot.connect_timeout_ms)
    }

    pub fn reconnect_interval(&self) -> Duration {
        Duration::from_millis(self.robot.reconnect_interval_ms)
    }

    /// 推送流地址 `host:port`
    pub fn state_stream_addr(&self) -> String {
        format!("{}:{}", self.robot.host, self.robot.state_port)
    }
}
