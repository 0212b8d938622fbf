//! 单工作者优先级任务队列
//!
//! 所有秘密存储操作经由此队列逐个执行：
//! 高优先级（写/删）先于低优先级（读）出队，同一优先级内严格 FIFO。

use std::cmp::Ordering as CmpOrdering;
use std::collections::BinaryHeap;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use futures::FutureExt;
use futures::future::BoxFuture;
use parking_lot::Mutex;
use tokio::sync::{Notify, oneshot};

/// 任务优先级
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Priority {
    /// 读取
    Read,
    /// 写入/删除
    Write,
}

struct Job {
    priority: Priority,
    seq: u64,
    task: BoxFuture<'static, ()>,
}

impl PartialEq for Job {
    fn eq(&self, other: &Self) -> bool {
        self.priority == other.priority && self.seq == other.seq
    }
}

impl Eq for Job {}

impl PartialOrd for Job {
    fn partial_cmp(&self, other: &Self) -> Option<CmpOrdering> {
        Some(self.cmp(other))
    }
}

impl Ord for Job {
    // BinaryHeap 为大顶堆：优先级高者在前，同优先级序号小者在前
    fn cmp(&self, other: &Self) -> CmpOrdering {
        self.priority
            .cmp(&other.priority)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

struct Shared {
    pending: Mutex<BinaryHeap<Job>>,
    notify: Notify,
    closed: AtomicBool,
}

/// 任务结果句柄
///
/// 丢弃句柄不会取消任务，任务仍会执行完毕
pub struct TaskHandle<T> {
    rx: oneshot::Receiver<T>,
}

impl<T> TaskHandle<T> {
    /// 等待任务完成并取回结果
    pub async fn join(self) -> anyhow::Result<T> {
        self.rx
            .await
            .map_err(|_| anyhow::anyhow!("队列任务未正常完成"))
    }
}

/// 单工作者优先级任务队列
///
/// 必须在 tokio 运行时内创建
pub struct TaskQueue {
    shared: Arc<Shared>,
    next_seq: AtomicU64,
}

impl TaskQueue {
    pub fn new() -> Self {
        let shared = Arc::new(Shared {
            pending: Mutex::new(BinaryHeap::new()),
            notify: Notify::new(),
            closed: AtomicBool::new(false),
        });

        tokio::spawn(run_worker(shared.clone()));

        Self {
            shared,
            next_seq: AtomicU64::new(0),
        }
    }

    /// 入队任务，立即返回
    pub fn add<F, T>(&self, priority: Priority, task: F) -> TaskHandle<T>
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
        let job = Job {
            priority,
            seq,
            task: Box::pin(async move {
                let _ = tx.send(task.await);
            }),
        };

        self.shared.pending.lock().push(job);
        self.shared.notify.notify_one();

        TaskHandle { rx }
    }

    /// 等待当前已入队的任务全部完成
    pub async fn flush(&self) {
        let _ = self.add(Priority::Read, async {}).join().await;
    }
}

impl Default for TaskQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for TaskQueue {
    fn drop(&mut self) {
        // 已入队任务仍会执行完毕，随后工作者退出
        self.shared.closed.store(true, Ordering::Release);
        self.shared.notify.notify_one();
    }
}

async fn run_worker(shared: Arc<Shared>) {
    loop {
        let next = shared.pending.lock().pop();
        match next {
            Some(job) => {
                if AssertUnwindSafe(job.task).catch_unwind().await.is_err() {
                    tracing::error!(
                        "队列任务 panic (priority={:?}, seq={})",
                        job.priority,
                        job.seq
                    );
                }
            }
            None => {
                if shared.closed.load(Ordering::Acquire) {
                    tracing::debug!("任务队列已关闭");
                    break;
                }
                shared.notify.notified().await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    type Log = Arc<Mutex<Vec<&'static str>>>;

    fn record(log: Log, name: &'static str) -> impl Future<Output = ()> + Send + 'static {
        async move {
            log.lock().push(name);
        }
    }

    #[tokio::test]
    async fn test_fifo_within_priority() {
        let queue = TaskQueue::new();
        let log: Log = Arc::default();

        for name in ["a", "b", "c", "d"] {
            queue.add(Priority::Write, record(log.clone(), name));
        }
        queue.flush().await;

        assert_eq!(*log.lock(), vec!["a", "b", "c", "d"]);
    }

    #[tokio::test]
    async fn test_writes_drain_before_reads() {
        let queue = TaskQueue::new();
        let log: Log = Arc::default();

        // 先用一个阻塞任务占住工作者
        let (gate_tx, gate_rx) = oneshot::channel::<()>();
        queue.add(Priority::Write, async move {
            let _ = gate_rx.await;
        });

        queue.add(Priority::Read, record(log.clone(), "r1"));
        queue.add(Priority::Write, record(log.clone(), "w1"));
        queue.add(Priority::Read, record(log.clone(), "r2"));
        queue.add(Priority::Write, record(log.clone(), "w2"));

        gate_tx.send(()).unwrap();
        queue.flush().await;

        assert_eq!(*log.lock(), vec!["w1", "w2", "r1", "r2"]);
    }

    #[tokio::test]
    async fn test_handle_returns_result() {
        let queue = TaskQueue::new();
        let value = queue.add(Priority::Read, async { 42 }).join().await.unwrap();
        assert_eq!(value, 42);
    }

    #[tokio::test]
    async fn test_one_task_at_a_time() {
        let queue = TaskQueue::new();
        let running = Arc::new(AtomicUsize::new(0));
        let max_seen = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let running = running.clone();
                let max_seen = max_seen.clone();
                let priority = if i % 2 == 0 { Priority::Write } else { Priority::Read };
                queue.add(priority, async move {
                    let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                    max_seen.fetch_max(now, Ordering::SeqCst);
                    tokio::task::yield_now().await;
                    tokio::task::yield_now().await;
                    running.fetch_sub(1, Ordering::SeqCst);
                })
            })
            .collect();

        for handle in handles {
            handle.join().await.unwrap();
        }
        assert_eq!(max_seen.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_panicking_task_does_not_stop_worker() {
        let queue = TaskQueue::new();

        let failed = queue
            .add(Priority::Write, async {
                panic!("boom");
            })
            .join()
            .await;
        assert!(failed.is_err());

        let ok = queue.add(Priority::Write, async { "after" }).join().await.unwrap();
        assert_eq!(ok, "after");
    }

    #[tokio::test]
    async fn test_dropped_queue_still_runs_pending() {
        let queue = TaskQueue::new();
        let log: Log = Arc::default();

        let handle = queue.add(Priority::Write, record(log.clone(), "w"));
        drop(queue);

        handle.join().await.unwrap();
        assert_eq!(*log.lock(), vec!["w"]);
    }
}
