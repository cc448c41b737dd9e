use async_trait::async_trait;

use crate::errors::DialerResult;

/// 发起呼叫的请求参数
#[derive(Debug, Clone)]
pub struct CallRequest {
    pub phone: String,
    pub prompt_ref: String,
    pub language: Option<String>,
    pub max_duration_seconds: i32,
}

/// 呼叫执行器接口
///
/// 对接语音供应商的唯一出口。`place_call` 只负责发起呼叫并返回
/// 关联ID，后续进展通过事件队列异步上报。
#[async_trait]
pub trait CallExecutor: Send + Sync {
    /// 发起呼叫，成功时返回供应商的关联ID
    async fn place_call(&self, request: &CallRequest) -> DialerResult<String>;
}
