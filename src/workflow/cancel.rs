//! 序列取消令牌
//!
//! 每个序列在开始时拿到一个 `SequenceToken`，编排层持有对应的 `CancelHandle`。
//! 取消是协作式的：每个挂起点都与 `cancelled()` 竞争。

use tokio::sync::watch;

/// 取消句柄（编排层持有）
#[derive(Debug)]
pub struct CancelHandle {
    seq: u64,
    tx: watch::Sender<bool>,
}

/// 序列令牌（序列持有）
#[derive(Debug, Clone)]
pub struct SequenceToken {
    seq: u64,
    rx: watch::Receiver<bool>,
}

/// 为序列号 `seq` 创建一对句柄与令牌
pub fn sequence_token(seq: u64) -> (CancelHandle, SequenceToken) {
    let (tx, rx) = watch::channel(false);
    (CancelHandle { seq, tx }, SequenceToken { seq, rx })
}

impl CancelHandle {
    pub fn seq(&self) -> u64 {
        self.seq
    }

    /// 取消序列，幂等
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }
}

impl Drop for CancelHandle {
    fn drop(&mut self) {
        self.cancel();
    }
}

impl SequenceToken {
    pub fn seq(&self) -> u64 {
        self.seq
    }

    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// 等待取消信号
    ///
    /// 句柄被丢弃同样视为取消。
    pub async fn cancelled(&mut self) {
        loop {
            if *self.rx.borrow_and_update() {
                return;
            }
            if self.rx.changed().await.is_err() {
                return;
            }
        }
    }
}
