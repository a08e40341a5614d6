//! 工作流编排器 - 编排层
//!
//! ## 职责
//!
//! 1. **状态所有者**：唯一持有并修改 `WorkflowState`
//! 2. **意图入口**：展示层只调用 `select_file` / `retry` / `dismiss_error`
//! 3. **取消管理**：同一时刻只有一个有效序列，新序列开始前同步取消旧序列
//! 4. **结果交付**：每个成功序列恰好交付一次 `Delivery`
//!
//! ## 过期响应
//!
//! 序列号单调递增。序列汇报的每次状态转移和交付都在锁内比较序列号，
//! 不是最新序列的一律丢弃，因此被取消的序列既不会进入 `Error`，也不会交付结果。

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::clients::JobApi;
use crate::models::{EvaluationResult, TranscriptFile};
use crate::workflow::{
    reduce, sequence_token, CancelHandle, JobFlow, PollPolicy, SequenceCtx, SequenceSink,
    WorkflowEvent, WorkflowState,
};

/// 交付给展示层的结果
#[derive(Debug, Clone)]
pub struct Delivery {
    pub result: EvaluationResult,
    pub file_name: String,
}

/// 结果接收端
pub type DeliveryReceiver = mpsc::UnboundedReceiver<Delivery>;

/// 工作流编排器
pub struct Orchestrator {
    flow: Arc<JobFlow>,
    shared: Arc<Shared>,
}

/// 锁保护的可变部分
struct Inner {
    state: WorkflowState,
    active_seq: u64,
    cancel: Option<CancelHandle>,
    last_file: Option<TranscriptFile>,
}

/// 编排器与运行中序列共享的状态容器
struct Shared {
    inner: Mutex<Inner>,
    state_tx: watch::Sender<WorkflowState>,
    delivery_tx: mpsc::UnboundedSender<Delivery>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// 在已持有锁的情况下应用事件并发布快照
    fn apply(&self, inner: &mut Inner, event: &WorkflowEvent) {
        let next = reduce(&inner.state, event);
        if next != inner.state {
            debug!("状态转移: {} -> {} ({:?})", inner.state.phase, next.phase, event);
            inner.state = next.clone();
            self.state_tx.send_replace(next);
        }
    }
}

impl SequenceSink for Shared {
    fn transition(&self, seq: u64, event: WorkflowEvent) -> bool {
        let mut inner = self.lock();
        if inner.active_seq != seq {
            debug!("丢弃过期序列 {} 的事件 {:?}", seq, event);
            return false;
        }
        self.apply(&mut inner, &event);
        true
    }

    fn deliver(&self, seq: u64, result: EvaluationResult) -> bool {
        let mut inner = self.lock();
        if inner.active_seq != seq {
            debug!("丢弃过期序列 {} 的结果", seq);
            return false;
        }
        let delivery = Delivery {
            result,
            file_name: inner.state.file_name.clone(),
        };
        if self.delivery_tx.send(delivery).is_err() {
            warn!("结果接收端已关闭，序列 {} 的结果被丢弃", seq);
        }
        // 序列完成，释放取消句柄
        inner.cancel = None;
        self.apply(&mut inner, &WorkflowEvent::Delivered);
        true
    }
}

impl Orchestrator {
    /// 创建编排器，同时返回结果接收端
    pub fn new(api: Arc<dyn JobApi>, policy: PollPolicy) -> (Self, DeliveryReceiver) {
        let (delivery_tx, delivery_rx) = mpsc::unbounded_channel();
        let (state_tx, _) = watch::channel(WorkflowState::default());

        let shared = Arc::new(Shared {
            inner: Mutex::new(Inner {
                state: WorkflowState::default(),
                active_seq: 0,
                cancel: None,
                last_file: None,
            }),
            state_tx,
            delivery_tx,
        });

        let orchestrator = Self {
            flow: Arc::new(JobFlow::new(api, policy)),
            shared,
        };
        (orchestrator, delivery_rx)
    }

    /// 当前状态快照
    pub fn snapshot(&self) -> WorkflowState {
        self.shared.lock().state.clone()
    }

    /// 订阅状态变化
    pub fn subscribe(&self) -> watch::Receiver<WorkflowState> {
        self.shared.state_tx.subscribe()
    }

    /// 选择文件：取消旧序列，进入 Uploading 并启动新序列
    ///
    /// 必须在 tokio 运行时内调用。
    pub fn select_file(&self, file: TranscriptFile) -> JoinHandle<()> {
        let (seq, token) = {
            let mut inner = self.shared.lock();

            // 同步取消旧序列，先于新序列的任何操作
            if let Some(previous) = inner.cancel.take() {
                info!("⏹ 取消进行中的序列 {}", previous.seq());
                previous.cancel();
            }

            inner.active_seq += 1;
            let seq = inner.active_seq;
            let (handle, token) = sequence_token(seq);
            inner.cancel = Some(handle);
            inner.last_file = Some(file.clone());

            self.shared.apply(
                &mut inner,
                &WorkflowEvent::FileSelected {
                    file_name: file.name.clone(),
                },
            );
            (seq, token)
        };

        info!("🚀 启动序列 {}: {}", seq, file.name);

        let flow = Arc::clone(&self.flow);
        let sink: Arc<dyn SequenceSink> = self.shared.clone();
        let mut ctx = SequenceCtx::new(file.name.clone(), token, sink);

        tokio::spawn(async move {
            match flow.run(&file, &mut ctx).await {
                Ok(result) => {
                    if ctx.deliver(result) {
                        info!("{} ✅ 结果已交付", ctx);
                    } else {
                        debug!("{} 序列已过期，结果被丢弃", ctx);
                    }
                }
                Err(e) if e.is_cancelled() => {
                    debug!("{} 序列已放弃", ctx);
                }
                Err(e) => {
                    if ctx.transition(WorkflowEvent::Failed {
                        message: e.to_string(),
                    }) {
                        error!("{} ❌ {}", ctx, e);
                    }
                }
            }
        })
    }

    /// 使用上次选择的文件重新执行完整序列
    ///
    /// 没有选择过文件时返回 `None`。
    pub fn retry(&self) -> Option<JoinHandle<()>> {
        let file = self.shared.lock().last_file.clone()?;
        info!("🔁 重试: {}", file.name);
        Some(self.select_file(file))
    }

    /// 关闭错误提示，回到 Idle
    pub fn dismiss_error(&self) {
        let mut inner = self.shared.lock();
        self.shared.apply(&mut inner, &WorkflowEvent::Dismissed);
    }

    /// 放弃进行中的序列，不产生任何状态转移
    pub fn cancel(&self) {
        let mut inner = self.shared.lock();
        if let Some(handle) = inner.cancel.take() {
            info!("⏹ 放弃序列 {}", handle.seq());
            handle.cancel();
        }
        // 让序列号前进，使已发出但未完成的响应全部过期
        inner.active_seq += 1;
    }

    pub fn last_file_name(&self) -> Option<String> {
        self.shared.lock().last_file.as_ref().map(|f| f.name.clone())
    }
}

impl Drop for Orchestrator {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ProcessedText;
    use crate::workflow::Phase;
    use std::collections::BTreeMap;

    fn empty_result() -> EvaluationResult {
        EvaluationResult {
            processed: ProcessedText {
                full_text: String::new(),
                sentences: Vec::new(),
            },
            regex_hits: Vec::new(),
            llm_hits: Vec::new(),
            summary: BTreeMap::new(),
        }
    }

    /// 当前有效序列为 2，状态为 b.txt 的 Processing
    fn shared_at_seq_two() -> (Shared, DeliveryReceiver, watch::Receiver<WorkflowState>) {
        let state = WorkflowState {
            phase: Phase::Processing,
            file_name: "b.txt".to_string(),
            error: None,
        };
        let (delivery_tx, delivery_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(state.clone());
        let shared = Shared {
            inner: Mutex::new(Inner {
                state,
                active_seq: 2,
                cancel: None,
                last_file: None,
            }),
            state_tx,
            delivery_tx,
        };
        (shared, delivery_rx, state_rx)
    }

    #[test]
    fn test_stale_sequence_cannot_transition() {
        let (shared, _deliveries, state_rx) = shared_at_seq_two();
        let before = shared.lock().state.clone();

        let applied = shared.transition(
            1,
            WorkflowEvent::Failed {
                message: "状态查询失败 (500): boom".to_string(),
            },
        );

        assert!(!applied);
        assert_eq!(shared.lock().state, before);
        assert!(!state_rx.has_changed().unwrap());
    }

    #[test]
    fn test_stale_sequence_cannot_deliver() {
        let (shared, mut deliveries, _state_rx) = shared_at_seq_two();
        let before = shared.lock().state.clone();

        assert!(!shared.deliver(1, empty_result()));
        assert!(deliveries.try_recv().is_err());
        assert_eq!(shared.lock().state, before);
    }

    #[test]
    fn test_active_sequence_is_applied() {
        let (shared, mut deliveries, _state_rx) = shared_at_seq_two();

        assert!(shared.transition(2, WorkflowEvent::ResultReady));
        assert_eq!(shared.lock().state.phase, Phase::Fetching);

        assert!(shared.deliver(2, empty_result()));
        let delivery = deliveries.try_recv().unwrap();
        assert_eq!(delivery.file_name, "b.txt");
        assert_eq!(shared.lock().state.phase, Phase::Idle);
    }
}
