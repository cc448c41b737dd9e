use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{mpsc, Mutex};

use dialer_core::models::{CallEvent, DispatchCommand};
use dialer_core::traits::{CallEventQueue, DispatchQueue};
use dialer_core::{DialerError, DialerResult};

/// 基于 Tokio channel 的内存拨号指令队列
///
/// 接收端用互斥锁包装，多个工作协程可以共享消费。
/// 消费是非阻塞的，队列空时返回 `None` 由调用方决定轮询节奏。
pub struct InMemoryDispatchQueue {
    sender: mpsc::UnboundedSender<DispatchCommand>,
    receiver: Arc<Mutex<mpsc::UnboundedReceiver<DispatchCommand>>>,
}

impl InMemoryDispatchQueue {
    pub fn new() -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        Self {
            sender,
            receiver: Arc::new(Mutex::new(receiver)),
        }
    }
}

impl Default for InMemoryDispatchQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DispatchQueue for InMemoryDispatchQueue {
    async fn publish(&self, command: DispatchCommand) -> DialerResult<()> {
        self.sender
            .send(command)
            .map_err(|e| DialerError::Queue(format!("拨号指令队列已关闭: {}", e)))
    }

    async fn consume(&self) -> DialerResult<Option<DispatchCommand>> {
        let mut receiver = self.receiver.lock().await;
        match receiver.try_recv() {
            Ok(command) => Ok(Some(command)),
            Err(mpsc::error::TryRecvError::Empty) => Ok(None),
            Err(mpsc::error::TryRecvError::Disconnected) => {
                Err(DialerError::Queue("拨号指令队列已关闭".to_string()))
            }
        }
    }
}

/// 基于 Tokio channel 的内存呼叫事件队列
pub struct InMemoryCallEventQueue {
    sender: mpsc::UnboundedSender<CallEvent>,
    receiver: Arc<Mutex<mpsc::UnboundedReceiver<CallEvent>>>,
}

impl InMemoryCallEventQueue {
    pub fn new() -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        Self {
            sender,
            receiver: Arc::new(Mutex::new(receiver)),
        }
    }
}

impl Default for InMemoryCallEventQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CallEventQueue for InMemoryCallEventQueue {
    async fn publish(&self, event: CallEvent) -> DialerResult<()> {
        self.sender
            .send(event)
            .map_err(|e| DialerError::Queue(format!("呼叫事件队列已关闭: {}", e)))
    }

    async fn consume(&self) -> DialerResult<Option<CallEvent>> {
        let mut receiver = self.receiver.lock().await;
        match receiver.try_recv() {
            Ok(event) => Ok(Some(event)),
            Err(mpsc::error::TryRecvError::Empty) => Ok(None),
            Err(mpsc::error::TryRecvError::Disconnected) => {
                Err(DialerError::Queue("呼叫事件队列已关闭".to_string()))
            }
        }
    }
}
