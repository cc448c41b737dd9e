use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use chrono::Utc;
use tokio::sync::broadcast;
use tracing::info;

use chrono::{NaiveTime, Weekday};
use dialer_core::models::{Campaign, CampaignStatus, CounterDelta, Lead, LeadStatus};
use dialer_core::traits::{
    CallAttemptRepository, CallEventQueue, CallExecutor, CampaignRepository, DispatchQueue,
    LeadRepository,
};
use dialer_core::AppConfig;
use dialer_dispatcher::{CampaignScheduler, OutcomeProcessor, RateLimiter, Watchdog};
use dialer_infrastructure::{
    InMemoryCallEventQueue, InMemoryDispatchQueue, MemoryCallAttemptRepository,
    MemoryCampaignRepository, MemoryLeadRepository, SimulatedCallExecutor,
};
use dialer_worker::DispatchWorkerPool;

/// 主应用程序
///
/// 嵌入式单进程部署：内存存储、内存队列加模拟执行器，
/// 调度器、结果处理器、看门狗和派发工作池在同一运行时内协作。
pub struct Application {
    config: AppConfig,
    campaign_repo: Arc<dyn CampaignRepository>,
    lead_repo: Arc<dyn LeadRepository>,
    attempt_repo: Arc<dyn CallAttemptRepository>,
    dispatch_queue: Arc<dyn DispatchQueue>,
    event_queue: Arc<dyn CallEventQueue>,
    executor: Arc<dyn CallExecutor>,
    limiter: Arc<RateLimiter>,
}

impl Application {
    /// 创建新的应用实例
    pub async fn new(config: AppConfig) -> Result<Self> {
        info!("初始化外呼调度引擎");

        let campaign_repo: Arc<dyn CampaignRepository> = Arc::new(MemoryCampaignRepository::new());
        let lead_repo: Arc<dyn LeadRepository> = Arc::new(MemoryLeadRepository::new());
        let attempt_repo: Arc<dyn CallAttemptRepository> =
            Arc::new(MemoryCallAttemptRepository::new());
        let dispatch_queue: Arc<dyn DispatchQueue> = Arc::new(InMemoryDispatchQueue::new());
        let event_queue: Arc<dyn CallEventQueue> = Arc::new(InMemoryCallEventQueue::new());

        let executor: Arc<dyn CallExecutor> = Arc::new(SimulatedCallExecutor::new(
            event_queue.clone(),
            config.executor.simulated_success_rate,
            config.executor.simulated_max_latency_ms,
        ));

        let limiter = Arc::new(RateLimiter::new(config.engine.max_concurrent_calls));

        Ok(Self {
            config,
            campaign_repo,
            lead_repo,
            attempt_repo,
            dispatch_queue,
            event_queue,
            executor,
            limiter,
        })
    }

    /// 运行全部引擎组件，直到收到关闭信号
    pub async fn run(&self, shutdown_tx: broadcast::Sender<()>) -> Result<()> {
        info!("启动引擎组件");

        let scheduler = Arc::new(CampaignScheduler::new(
            self.campaign_repo.clone(),
            self.lead_repo.clone(),
            self.limiter.clone(),
            self.dispatch_queue.clone(),
            Duration::from_secs(self.config.engine.tick_interval_seconds),
            self.config.engine.max_batch_size,
        ));

        let outcome_processor = Arc::new(OutcomeProcessor::new(
            self.campaign_repo.clone(),
            self.lead_repo.clone(),
            self.attempt_repo.clone(),
            self.event_queue.clone(),
            self.limiter.clone(),
            Duration::from_millis(self.config.engine.event_poll_interval_ms),
        ));

        let watchdog = Arc::new(Watchdog::new(
            self.campaign_repo.clone(),
            self.lead_repo.clone(),
            self.attempt_repo.clone(),
            self.event_queue.clone(),
            self.limiter.clone(),
            self.config.engine.claim_grace_seconds,
            self.config.engine.provider_grace_seconds,
            Duration::from_secs(self.config.engine.tick_interval_seconds * 3),
        ));

        let worker_pool = Arc::new(DispatchWorkerPool::new(
            self.campaign_repo.clone(),
            self.lead_repo.clone(),
            self.attempt_repo.clone(),
            self.dispatch_queue.clone(),
            self.executor.clone(),
            self.limiter.clone(),
            self.config.engine.worker_count,
            Duration::from_millis(self.config.engine.event_poll_interval_ms),
        ));

        let mut handles = Vec::new();

        handles.push({
            let scheduler = scheduler.clone();
            let shutdown_rx = shutdown_tx.subscribe();
            tokio::spawn(async move {
                scheduler.run(shutdown_rx).await;
            })
        });

        handles.push({
            let outcome_processor = outcome_processor.clone();
            let shutdown_rx = shutdown_tx.subscribe();
            tokio::spawn(async move {
                outcome_processor.run(shutdown_rx).await;
            })
        });

        handles.push({
            let watchdog = watchdog.clone();
            let shutdown_rx = shutdown_tx.subscribe();
            tokio::spawn(async move {
                watchdog.run(shutdown_rx).await;
            })
        });

        handles.extend(worker_pool.spawn(&shutdown_tx));

        // 等待所有组件退出
        for handle in handles {
            let _ = handle.await;
        }

        info!("所有引擎组件已停止");
        Ok(())
    }

    /// 写入演示活动与线索，便于本地观察引擎行为
    pub async fn seed_demo_data(&self) -> Result<()> {
        let now = Utc::now();
        let campaign = self
            .campaign_repo
            .create(&Campaign {
                id: 0,
                tenant_id: 1,
                name: "demo_campaign".to_string(),
                status: CampaignStatus::Active,
                prompt_ref: "demo-prompt".to_string(),
                calls_per_day: 50,
                max_attempts_per_lead: 3,
                retry_delay_minutes: 1,
                call_duration_limit_seconds: 300,
                calling_hours_start: NaiveTime::from_hms_opt(0, 0, 0)
                    .expect("合法的时间常量"),
                calling_hours_end: NaiveTime::from_hms_opt(23, 59, 59)
                    .expect("合法的时间常量"),
                time_zone: "UTC".to_string(),
                working_days: vec![
                    Weekday::Mon,
                    Weekday::Tue,
                    Weekday::Wed,
                    Weekday::Thu,
                    Weekday::Fri,
                    Weekday::Sat,
                    Weekday::Sun,
                ],
                total_leads: 0,
                completed_calls: 0,
                successful_calls: 0,
                failed_calls: 0,
                created_at: now,
                updated_at: now,
            })
            .await?;

        let phones = [
            "+15550000001",
            "+15550000002",
            "+15550000003",
            "+15550000004",
            "+15550000005",
        ];
        for (i, phone) in phones.iter().enumerate() {
            self.lead_repo
                .create(&Lead {
                    id: 0,
                    campaign_id: Some(campaign.id),
                    phone: phone.to_string(),
                    name: Some(format!("演示线索 {}", i + 1)),
                    time_zone: None,
                    preferred_language: None,
                    status: LeadStatus::Pending,
                    attempts_made: 0,
                    last_attempt_time: None,
                    next_attempt_time: None,
                    priority: i as i32,
                    lead_score: 50,
                    do_not_call: false,
                    blacklist_reason: None,
                    created_at: now,
                    updated_at: now,
                })
                .await?;
        }
        self.campaign_repo
            .apply_counter_delta(
                campaign.id,
                CounterDelta {
                    total_leads: phones.len() as i64,
                    ..Default::default()
                },
            )
            .await?;

        info!(
            "演示数据已写入: 活动 {} 和 {} 个线索",
            campaign.id,
            phones.len()
        );
        Ok(())
    }
}
