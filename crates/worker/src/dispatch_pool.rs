use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use dialer_core::models::{CallAttempt, DispatchCommand};
use dialer_core::traits::{
    CallAttemptRepository, CallExecutor, CallRequest, CampaignRepository, DispatchQueue,
    LeadRepository,
};
use dialer_core::DialerResult;
use dialer_dispatcher::RateLimiter;

/// 派发工作池
///
/// 固定数量的工作协程并发消费拨号指令队列，向执行器发起呼叫并
/// 落盘呼叫记录。执行器故障时按快照释放线索并归还放行额度，
/// 该次尝试不计入线索的拨打次数。
pub struct DispatchWorkerPool {
    campaign_repo: Arc<dyn CampaignRepository>,
    lead_repo: Arc<dyn LeadRepository>,
    attempt_repo: Arc<dyn CallAttemptRepository>,
    dispatch_queue: Arc<dyn DispatchQueue>,
    executor: Arc<dyn CallExecutor>,
    limiter: Arc<RateLimiter>,
    worker_count: usize,
    poll_interval: Duration,
}

impl DispatchWorkerPool {
    pub fn new(
        campaign_repo: Arc<dyn CampaignRepository>,
        lead_repo: Arc<dyn LeadRepository>,
        attempt_repo: Arc<dyn CallAttemptRepository>,
        dispatch_queue: Arc<dyn DispatchQueue>,
        executor: Arc<dyn CallExecutor>,
        limiter: Arc<RateLimiter>,
        worker_count: usize,
        poll_interval: Duration,
    ) -> Self {
        Self {
            campaign_repo,
            lead_repo,
            attempt_repo,
            dispatch_queue,
            executor,
            limiter,
            worker_count,
            poll_interval,
        }
    }

    /// 启动所有工作协程，返回各协程的句柄
    pub fn spawn(self: &Arc<Self>, shutdown_tx: &broadcast::Sender<()>) -> Vec<JoinHandle<()>> {
        info!("派发工作池启动，工作协程数 {}", self.worker_count);
        (0..self.worker_count)
            .map(|worker_id| {
                let pool = self.clone();
                let shutdown_rx = shutdown_tx.subscribe();
                tokio::spawn(async move {
                    pool.worker_loop(worker_id, shutdown_rx).await;
                })
            })
            .collect()
    }

    async fn worker_loop(&self, worker_id: usize, mut shutdown_rx: broadcast::Receiver<()>) {
        debug!("派发工作协程 {} 启动", worker_id);

        loop {
            tokio::select! {
                _ = shutdown_rx.recv() => {
                    debug!("派发工作协程 {} 收到关停信号，退出", worker_id);
                    break;
                }
                result = self.dispatch_queue.consume() => {
                    match result {
                        Ok(Some(command)) => {
                            if let Err(e) = self.handle_command(&command).await {
                                error!(
                                    "工作协程 {} 处理线索 {} 的拨号指令出错: {}",
                                    worker_id, command.lead_id, e
                                );
                            }
                        }
                        Ok(None) => {
                            tokio::time::sleep(self.poll_interval).await;
                        }
                        Err(e) => {
                            error!("工作协程 {} 消费拨号指令出错: {}", worker_id, e);
                            tokio::time::sleep(Duration::from_secs(1)).await;
                        }
                    }
                }
            }
        }
    }

    /// 处理一条拨号指令
    pub async fn handle_command(&self, command: &DispatchCommand) -> DialerResult<()> {
        let request = CallRequest {
            phone: command.phone.clone(),
            prompt_ref: command.prompt_ref.clone(),
            language: command.preferred_language.clone(),
            max_duration_seconds: command.max_duration_seconds,
        };

        match self.executor.place_call(&request).await {
            Ok(correlation_id) => {
                let attempt = CallAttempt::new(
                    command.campaign_id,
                    command.lead_id,
                    correlation_id.clone(),
                    command.attempt_number,
                );
                if let Err(e) = self.attempt_repo.create(&attempt).await {
                    // 记录落盘失败时结果事件无处挂靠，线索和槽位
                    // 不能等它们永远不会到来的终态
                    error!(
                        "线索 {} 的呼叫记录创建失败，按快照释放: {}",
                        command.lead_id, e
                    );
                    self.release_dispatch(command).await?;
                    return Err(e);
                }
                debug!(
                    "线索 {} 第 {} 次呼叫已发起，关联ID {}",
                    command.lead_id, command.attempt_number, correlation_id
                );
                Ok(())
            }
            Err(e) => {
                // 执行器故障属于基础设施问题，线索按快照恢复原状，
                // 不消耗拨打次数和当日预算
                error!(
                    "线索 {} 发起呼叫失败，按快照释放: {}",
                    command.lead_id, e
                );
                self.release_dispatch(command).await?;
                Err(e)
            }
        }
    }

    /// 按快照恢复线索并归还放行额度
    async fn release_dispatch(&self, command: &DispatchCommand) -> DialerResult<()> {
        self.lead_repo.release(&command.claim).await?;
        if let Some(campaign) = self.campaign_repo.get_by_id(command.campaign_id).await? {
            self.limiter
                .release_admission(&campaign, 1, Utc::now())
                .await?;
        }
        Ok(())
    }
}
