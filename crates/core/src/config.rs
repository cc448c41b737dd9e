use anyhow::{Context, Result};
use config::{Config as ConfigBuilder, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// 应用配置
///
/// 加载顺序：显式路径 > 默认路径探测 > 内置默认值，
/// 环境变量（`DIALER_` 前缀）最后覆盖。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub engine: EngineConfig,
    pub executor: ExecutorConfig,
    pub observability: ObservabilityConfig,
}

/// 调度引擎配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// 调度轮询间隔（秒）
    pub tick_interval_seconds: u64,
    /// 派发工作协程数
    pub worker_count: usize,
    /// 全局并发呼叫上限
    pub max_concurrent_calls: usize,
    /// 单轮单活动最多派发的线索数
    pub max_batch_size: usize,
    /// 认领后无呼叫记录的回收宽限期（秒）
    pub claim_grace_seconds: i64,
    /// 超出通话时长上限后判定供应商失联的宽限期（秒）
    pub provider_grace_seconds: i64,
    /// 事件队列空转时的轮询间隔（毫秒）
    pub event_poll_interval_ms: u64,
}

/// 呼叫执行器配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutorConfig {
    /// 执行器类型，目前支持 "simulated"
    pub kind: String,
    /// 模拟执行器的呼叫成功率（0.0 - 1.0）
    pub simulated_success_rate: f64,
    /// 模拟执行器的事件延迟上限（毫秒）
    pub simulated_max_latency_ms: u64,
}

/// 可观测性配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    pub log_level: String,
    /// 日志格式："json" 或 "pretty"
    pub log_format: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            engine: EngineConfig {
                tick_interval_seconds: 10,
                worker_count: 4,
                max_concurrent_calls: 50,
                max_batch_size: 20,
                claim_grace_seconds: 120,
                provider_grace_seconds: 60,
                event_poll_interval_ms: 200,
            },
            executor: ExecutorConfig {
                kind: "simulated".to_string(),
                simulated_success_rate: 0.4,
                simulated_max_latency_ms: 500,
            },
            observability: ObservabilityConfig {
                log_level: "info".to_string(),
                log_format: "pretty".to_string(),
            },
        }
    }
}

impl AppConfig {
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let mut builder = ConfigBuilder::builder();

        if let Some(path) = config_path {
            if Path::new(path).exists() {
                builder = builder.add_source(File::new(path, FileFormat::Toml));
            } else {
                return Err(anyhow::anyhow!("配置文件不存在: {}", path));
            }
        } else {
            let default_paths = ["config/dialer.toml", "dialer.toml", "/etc/dialer/config.toml"];

            let mut config_file_found = false;
            for path in &default_paths {
                if Path::new(path).exists() {
                    builder = builder.add_source(File::new(path, FileFormat::Toml));
                    config_file_found = true;
                    break;
                }
            }

            if !config_file_found {
                builder = builder
                    .set_default("engine.tick_interval_seconds", 10)?
                    .set_default("engine.worker_count", 4)?
                    .set_default("engine.max_concurrent_calls", 50)?
                    .set_default("engine.max_batch_size", 20)?
                    .set_default("engine.claim_grace_seconds", 120)?
                    .set_default("engine.provider_grace_seconds", 60)?
                    .set_default("engine.event_poll_interval_ms", 200)?
                    .set_default("executor.kind", "simulated")?
                    .set_default("executor.simulated_success_rate", 0.4)?
                    .set_default("executor.simulated_max_latency_ms", 500)?
                    .set_default("observability.log_level", "info")?
                    .set_default("observability.log_format", "pretty")?;
            }
        }

        builder = builder.add_source(
            Environment::with_prefix("DIALER")
                .separator("_")
                .try_parsing(true),
        );

        let config: AppConfig = builder
            .build()
            .context("构建配置失败")?
            .try_deserialize()
            .context("反序列化配置失败")?;

        config.validate()?;

        Ok(config)
    }

    pub fn from_toml(toml_str: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(toml_str).context("解析TOML配置失败")?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.engine.worker_count == 0 {
            anyhow::bail!("engine.worker_count 必须大于 0");
        }
        if self.engine.max_concurrent_calls == 0 {
            anyhow::bail!("engine.max_concurrent_calls 必须大于 0");
        }
        if self.engine.max_batch_size == 0 {
            anyhow::bail!("engine.max_batch_size 必须大于 0");
        }
        if self.engine.tick_interval_seconds == 0 {
            anyhow::bail!("engine.tick_interval_seconds 必须大于 0");
        }
        if !(0.0..=1.0).contains(&self.executor.simulated_success_rate) {
            anyhow::bail!("executor.simulated_success_rate 必须在 0.0 到 1.0 之间");
        }
        match self.observability.log_format.as_str() {
            "json" | "pretty" => {}
            other => anyhow::bail!("不支持的日志格式: {}", other),
        }
        Ok(())
    }
}
