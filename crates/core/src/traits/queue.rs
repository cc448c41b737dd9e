use async_trait::async_trait;

use crate::errors::DialerResult;
use crate::models::{CallEvent, DispatchCommand};

/// 拨号指令队列接口
///
/// 调度器生产、派发工作池消费。
#[async_trait]
pub trait DispatchQueue: Send + Sync {
    async fn publish(&self, command: DispatchCommand) -> DialerResult<()>;

    /// 拉取一条指令，队列为空时返回 `None`
    async fn consume(&self) -> DialerResult<Option<DispatchCommand>>;
}

/// 呼叫事件队列接口
///
/// 执行器侧生产、结果处理器消费。
#[async_trait]
pub trait CallEventQueue: Send + Sync {
    async fn publish(&self, event: CallEvent) -> DialerResult<()>;

    async fn consume(&self) -> DialerResult<Option<CallEvent>>;
}
