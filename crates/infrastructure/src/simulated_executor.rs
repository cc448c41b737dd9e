use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use tracing::{debug, error};
use uuid::Uuid;

use dialer_core::models::{CallErrorKind, CallEvent, CallStatus};
use dialer_core::traits::{CallEventQueue, CallExecutor, CallRequest};
use dialer_core::DialerResult;

/// 模拟呼叫执行器
///
/// 嵌入式部署和本地联调用的执行器实现：立即返回关联ID，
/// 在后台按配置的成功率和延迟异步上报振铃与终态事件，
/// 行为上与真实语音供应商的回调时序一致。
pub struct SimulatedCallExecutor {
    event_queue: Arc<dyn CallEventQueue>,
    success_rate: f64,
    max_latency_ms: u64,
}

impl SimulatedCallExecutor {
    pub fn new(event_queue: Arc<dyn CallEventQueue>, success_rate: f64, max_latency_ms: u64) -> Self {
        Self {
            event_queue,
            success_rate,
            max_latency_ms,
        }
    }

    /// 掷骰决定本次呼叫的终态
    fn roll_outcome(&self) -> (CallStatus, Option<CallErrorKind>, Option<i32>) {
        let mut rng = rand::rng();
        if rng.random::<f64>() < self.success_rate {
            let duration = rng.random_range(15..180);
            return (CallStatus::Completed, None, Some(duration));
        }
        // 未成功的结果按大致真实的比例分布
        match rng.random_range(0..10) {
            0..=4 => (CallStatus::NoAnswer, None, None),
            5..=7 => (CallStatus::Busy, None, None),
            8 => (
                CallStatus::Failed,
                Some(CallErrorKind::Transient),
                None,
            ),
            _ => (
                CallStatus::Failed,
                Some(CallErrorKind::InvalidNumber),
                None,
            ),
        }
    }
}

#[async_trait]
impl CallExecutor for SimulatedCallExecutor {
    async fn place_call(&self, request: &CallRequest) -> DialerResult<String> {
        let correlation_id = Uuid::new_v4().to_string();
        debug!(
            "模拟呼叫 {} 发起，关联ID {}",
            request.phone, correlation_id
        );

        let (status, error_kind, duration) = self.roll_outcome();
        let latency = {
            let mut rng = rand::rng();
            rng.random_range(0..=self.max_latency_ms)
        };

        let event_queue = self.event_queue.clone();
        let id = correlation_id.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(latency / 2)).await;
            let ringing = CallEvent::new(id.clone(), CallStatus::Ringing);
            if let Err(e) = event_queue.publish(ringing).await {
                error!("模拟呼叫 {} 上报振铃事件失败: {}", id, e);
                return;
            }

            tokio::time::sleep(Duration::from_millis(latency / 2)).await;
            let mut terminal = CallEvent::new(id.clone(), status);
            terminal.duration_seconds = duration;
            terminal.error_kind = error_kind;
            terminal.metadata = serde_json::json!({ "simulated": true });
            if let Err(e) = event_queue.publish(terminal).await {
                error!("模拟呼叫 {} 上报终态事件失败: {}", id, e);
            }
        });

        Ok(correlation_id)
    }
}
