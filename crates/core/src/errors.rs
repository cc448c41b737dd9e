use thiserror::Error;

/// 拨号引擎错误类型定义
#[derive(Debug, Error)]
pub enum DialerError {
    #[error("活动未找到: {id}")]
    CampaignNotFound { id: i64 },

    #[error("线索未找到: {id}")]
    LeadNotFound { id: i64 },

    #[error("呼叫记录未找到: {id}")]
    CallAttemptNotFound { id: i64 },

    #[error("无效的时区: {name}")]
    InvalidTimeZone { name: String },

    #[error("无效的拨打时段: {message}")]
    InvalidCallingWindow { message: String },

    #[error("非法的状态转换: {entity} {id} 从 {from} 到 {to}")]
    InvalidStateTransition {
        entity: &'static str,
        id: i64,
        from: String,
        to: String,
    },

    #[error("线索 {lead_id} 已存在未结束的呼叫记录")]
    OpenAttemptExists { lead_id: i64 },

    #[error("呼叫记录 {id} 已终态，禁止修改")]
    AttemptFinalized { id: i64 },

    #[error("呼叫执行器不可用: {0}")]
    ExecutorUnavailable(String),

    #[error("队列错误: {0}")]
    Queue(String),

    #[error("配置错误: {0}")]
    Configuration(String),

    #[error("内部错误: {0}")]
    Internal(String),
}

/// 统一的Result类型
pub type DialerResult<T> = std::result::Result<T, DialerError>;
