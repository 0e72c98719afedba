//! Bounded priority queue between the chat source and the pipeline handler.
//!
//! Min-heap keyed by `100 - channel reputation score` (50 for unknown
//! channels), ties broken by enqueue time. Priority is computed once at
//! enqueue from a reputation snapshot and never while a message dwells in
//! the heap. A full queue drops the incoming message; that is the
//! backpressure mechanism. One consumer drains the heap under a global
//! messages-per-second limit; a failed handler gets exactly one retry at
//! `priority + 100`.

use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use signal_core::{MessageEvent, ReputationView};
use tokio::sync::{watch, Notify};
use tokio::task::JoinHandle;
use tokio::time::Instant;

const RETRY_PRIORITY_PENALTY: i64 = 100_000;
const MAX_RETRIES: u32 = 1;
const FINAL_DRAIN_BUDGET: Duration = Duration::from_secs(10);

#[derive(Debug, Clone)]
struct PrioritizedMessage {
    /// Priority in thousandths; lower dequeues first.
    priority_millis: i64,
    enqueue_ts: DateTime<Utc>,
    seq: u64,
    retry_count: u32,
    event: MessageEvent,
}

impl PartialEq for PrioritizedMessage {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == std::cmp::Ordering::Equal
    }
}
impl Eq for PrioritizedMessage {}
impl PartialOrd for PrioritizedMessage {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for PrioritizedMessage {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        (self.priority_millis, self.enqueue_ts, self.seq).cmp(&(
            other.priority_millis,
            other.enqueue_ts,
            other.seq,
        ))
    }
}

#[derive(Debug, Default)]
pub struct QueueStats {
    pub total_enqueued: AtomicU64,
    pub total_processed: AtomicU64,
    pub total_dropped: AtomicU64,
    pub total_retried: AtomicU64,
    pub queue_full_count: AtomicU64,
}

#[derive(Debug, Clone, Copy)]
pub struct QueueStatsSnapshot {
    pub total_enqueued: u64,
    pub total_processed: u64,
    pub total_dropped: u64,
    pub total_retried: u64,
    pub queue_full_count: u64,
    pub queue_size: usize,
}

#[derive(Debug, Clone)]
pub struct QueueConfig {
    pub max_queue_size: usize,
    pub messages_per_second: f64,
    pub drain_timeout: Duration,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_queue_size: 1000,
            messages_per_second: 2.0,
            drain_timeout: Duration::from_secs(30),
        }
    }
}

/// Paces the consumer at a global messages-per-second rate.
struct Pacer {
    min_interval: Duration,
    last: tokio::sync::Mutex<Option<Instant>>,
}

impl Pacer {
    fn new(messages_per_second: f64) -> Self {
        let rate = if messages_per_second > 0.0 {
            messages_per_second
        } else {
            1.0
        };
        Self {
            min_interval: Duration::from_secs_f64(1.0 / rate),
            last: tokio::sync::Mutex::new(None),
        }
    }

    async fn acquire(&self) {
        let mut last = self.last.lock().await;
        let now = Instant::now();
        if let Some(prev) = *last {
            let next_allowed = prev + self.min_interval;
            if next_allowed > now {
                tokio::time::sleep(next_allowed - now).await;
            }
        }
        *last = Some(Instant::now());
    }
}

pub struct PriorityMessageQueue {
    heap: Mutex<BinaryHeap<Reverse<PrioritizedMessage>>>,
    notify: Notify,
    seq: AtomicU64,
    config: QueueConfig,
    pacer: Pacer,
    reputation: Arc<dyn ReputationView>,
    stats: QueueStats,
    shutdown: watch::Sender<bool>,
}

impl PriorityMessageQueue {
    pub fn new(config: QueueConfig, reputation: Arc<dyn ReputationView>) -> Arc<Self> {
        let (shutdown, _) = watch::channel(false);
        tracing::info!(
            "Priority message queue initialized: max_size={}, rate={:.1} msg/s",
            config.max_queue_size,
            config.messages_per_second
        );
        Arc::new(Self {
            heap: Mutex::new(BinaryHeap::new()),
            notify: Notify::new(),
            seq: AtomicU64::new(0),
            pacer: Pacer::new(config.messages_per_second),
            config,
            reputation,
            stats: QueueStats::default(),
            shutdown,
        })
    }

    /// Priority for a channel: `100 - reputation score` when known, 50
    /// otherwise. Computed only at enqueue time.
    fn channel_priority(&self, channel_name: &str) -> f64 {
        match self.reputation.snapshot(channel_name) {
            Some(snapshot) => 100.0 - snapshot.reputation_score,
            None => 50.0,
        }
    }

    /// Enqueue a message; returns false when the queue is full and the
    /// message was dropped.
    pub fn enqueue(&self, event: MessageEvent) -> bool {
        let priority = self.channel_priority(&event.channel_name);
        self.enqueue_with_priority(event, (priority * 1000.0) as i64, 0)
    }

    fn enqueue_with_priority(&self, event: MessageEvent, priority_millis: i64, retry_count: u32) -> bool {
        let message = PrioritizedMessage {
            priority_millis,
            enqueue_ts: event.timestamp,
            seq: self.seq.fetch_add(1, Ordering::Relaxed),
            retry_count,
            event,
        };

        let mut heap = self.heap.lock().unwrap_or_else(|e| e.into_inner());
        if heap.len() >= self.config.max_queue_size {
            drop(heap);
            self.stats.total_dropped.fetch_add(1, Ordering::Relaxed);
            self.stats.queue_full_count.fetch_add(1, Ordering::Relaxed);
            tracing::warn!(
                "Queue full ({}), dropped message from {}. Total dropped: {}",
                self.config.max_queue_size,
                message.event.channel_name,
                self.stats.total_dropped.load(Ordering::Relaxed)
            );
            return false;
        }

        tracing::debug!(
            "Enqueued message from {} (priority={:.1}, queue_size={})",
            message.event.channel_name,
            priority_millis as f64 / 1000.0,
            heap.len() + 1
        );
        heap.push(Reverse(message));
        drop(heap);

        self.stats.total_enqueued.fetch_add(1, Ordering::Relaxed);
        self.notify.notify_one();
        true
    }

    fn pop_now(&self) -> Option<PrioritizedMessage> {
        let mut heap = self.heap.lock().unwrap_or_else(|e| e.into_inner());
        heap.pop().map(|Reverse(m)| m)
    }

    pub fn len(&self) -> usize {
        self.heap.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> QueueStatsSnapshot {
        QueueStatsSnapshot {
            total_enqueued: self.stats.total_enqueued.load(Ordering::Relaxed),
            total_processed: self.stats.total_processed.load(Ordering::Relaxed),
            total_dropped: self.stats.total_dropped.load(Ordering::Relaxed),
            total_retried: self.stats.total_retried.load(Ordering::Relaxed),
            queue_full_count: self.stats.queue_full_count.load(Ordering::Relaxed),
            queue_size: self.len(),
        }
    }

    /// Spawn the single consumer task. `handler` failures get one retry at a
    /// demoted priority, then the message is dropped with a warning.
    pub fn start_consumer<F, Fut>(self: &Arc<Self>, handler: F) -> JoinHandle<()>
    where
        F: Fn(MessageEvent) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), signal_core::SignalError>> + Send,
    {
        let queue = Arc::clone(self);
        let mut shutdown = self.shutdown.subscribe();

        tokio::spawn(async move {
            tracing::info!("Consumer loop started");

            loop {
                let message = tokio::select! {
                    _ = shutdown.changed() => break,
                    message = queue.wait_for_message() => message,
                };

                queue.pacer.acquire().await;
                queue.process_one(message, &handler).await;
            }

            // Cancellation: best-effort drain of whatever is left, bounded.
            let deadline = Instant::now() + FINAL_DRAIN_BUDGET;
            let mut drained = 0usize;
            while let Some(message) = queue.pop_now() {
                if Instant::now() >= deadline {
                    break;
                }
                queue.process_one(message, &handler).await;
                drained += 1;
            }
            let remaining = queue.len();
            if drained > 0 {
                tracing::info!("Drained {} messages during shutdown", drained);
            }
            if remaining > 0 {
                tracing::warn!("Shutdown with {} messages unprocessed", remaining);
            }
            tracing::info!("Consumer loop stopped");
        })
    }

    async fn wait_for_message(&self) -> PrioritizedMessage {
        loop {
            if let Some(message) = self.pop_now() {
                return message;
            }
            self.notify.notified().await;
        }
    }

    async fn process_one<F, Fut>(&self, message: PrioritizedMessage, handler: &F)
    where
        F: Fn(MessageEvent) -> Fut + Send + Sync,
        Fut: Future<Output = Result<(), signal_core::SignalError>> + Send,
    {
        let channel = message.event.channel_name.clone();
        let message_id = message.event.message_id;

        match handler(message.event.clone()).await {
            Ok(()) => {
                self.stats.total_processed.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(
                    "Processed message from {} (priority={:.1})",
                    channel,
                    message.priority_millis as f64 / 1000.0
                );
            }
            Err(e) => {
                tracing::error!("Error processing message from {}: {}", channel, e);
                if message.retry_count < MAX_RETRIES {
                    let demoted = message.priority_millis + RETRY_PRIORITY_PENALTY;
                    let requeued = self.enqueue_with_priority(
                        message.event,
                        demoted,
                        message.retry_count + 1,
                    );
                    if requeued {
                        self.stats.total_retried.fetch_add(1, Ordering::Relaxed);
                        tracing::info!(
                            "Requeued message for retry ({}, id {})",
                            channel,
                            message_id
                        );
                    } else {
                        tracing::warn!("Queue full, cannot retry message {}", message_id);
                    }
                } else {
                    self.stats.total_dropped.fetch_add(1, Ordering::Relaxed);
                    tracing::warn!(
                        "Message failed after {} retries, giving up: {} (id {})",
                        MAX_RETRIES,
                        channel,
                        message_id
                    );
                }
            }
        }
    }

    /// Stop the consumer: wait up to `drain_timeout` for the queue to empty,
    /// then cancel and let the consumer finish its bounded final drain.
    pub async fn stop(&self, consumer: JoinHandle<()>) {
        tracing::info!("Stopping consumer...");

        let deadline = Instant::now() + self.config.drain_timeout;
        while !self.is_empty() && Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        if self.is_empty() {
            tracing::info!("Queue drained successfully");
        } else {
            tracing::warn!(
                "Queue drain timeout ({:?}), {} messages remaining",
                self.config.drain_timeout,
                self.len()
            );
        }

        let _ = self.shutdown.send(true);
        // Wake the consumer if it is parked on an empty queue.
        self.notify.notify_one();
        let _ = consumer.await;
        tracing::info!("Consumer stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use signal_core::{ReputationSnapshot, ReputationTier};
    use std::collections::HashMap;

    struct StaticReputation(HashMap<String, f64>);

    impl ReputationView for StaticReputation {
        fn snapshot(&self, channel_name: &str) -> Option<ReputationSnapshot> {
            self.0.get(channel_name).map(|score| ReputationSnapshot {
                reputation_score: *score,
                reputation_tier: ReputationTier::Good,
                sharpe_ratio: 1.0,
                expected_roi: 2.0,
            })
        }
    }

    fn event(channel: &str, message_id: i64, ts_offset_secs: i64) -> MessageEvent {
        MessageEvent {
            channel_id: 1,
            channel_name: channel.to_string(),
            message_id,
            text: "gm".to_string(),
            timestamp: Utc::now() + chrono::Duration::seconds(ts_offset_secs),
            sender_id: None,
            engagement: Default::default(),
        }
    }

    fn queue_with(
        max_size: usize,
        scores: &[(&str, f64)],
    ) -> Arc<PriorityMessageQueue> {
        let map: HashMap<String, f64> = scores
            .iter()
            .map(|(k, v)| (k.to_string(), *v))
            .collect();
        PriorityMessageQueue::new(
            QueueConfig {
                max_queue_size: max_size,
                messages_per_second: 1000.0,
                drain_timeout: Duration::from_millis(200),
            },
            Arc::new(StaticReputation(map)),
        )
    }

    #[tokio::test]
    async fn backpressure_drops_when_full() {
        let queue = queue_with(2, &[]);
        assert!(queue.enqueue(event("a", 1, 0)));
        assert!(queue.enqueue(event("a", 2, 1)));
        assert!(!queue.enqueue(event("a", 3, 2)));

        let stats = queue.stats();
        assert_eq!(stats.queue_size, 2);
        assert_eq!(stats.queue_full_count, 1);
        assert_eq!(stats.total_dropped, 1);
    }

    #[tokio::test]
    async fn high_reputation_dequeues_first() {
        let queue = queue_with(10, &[("elite", 92.0), ("poor", 25.0)]);

        // Enqueue order: unknown, poor, elite.
        queue.enqueue(event("mystery", 1, 0));
        queue.enqueue(event("poor", 2, 1));
        queue.enqueue(event("elite", 3, 2));

        // Dequeue order: elite (8), mystery (50), poor (75).
        assert_eq!(queue.pop_now().unwrap().event.message_id, 3);
        assert_eq!(queue.pop_now().unwrap().event.message_id, 1);
        assert_eq!(queue.pop_now().unwrap().event.message_id, 2);
    }

    #[tokio::test]
    async fn ties_break_by_older_timestamp() {
        let queue = queue_with(10, &[]);
        queue.enqueue(event("a", 1, 10));
        queue.enqueue(event("a", 2, -10));
        queue.enqueue(event("a", 3, 0));

        assert_eq!(queue.pop_now().unwrap().event.message_id, 2);
        assert_eq!(queue.pop_now().unwrap().event.message_id, 3);
        assert_eq!(queue.pop_now().unwrap().event.message_id, 1);
    }

    #[tokio::test]
    async fn consumer_processes_and_drains_on_stop() {
        let queue = queue_with(10, &[]);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = Arc::clone(&seen);

        let consumer = queue.start_consumer(move |event| {
            let seen = Arc::clone(&seen_clone);
            async move {
                seen.lock().unwrap().push(event.message_id);
                Ok(())
            }
        });

        for i in 0..5 {
            queue.enqueue(event("a", i, i));
        }

        tokio::time::sleep(Duration::from_millis(100)).await;
        queue.stop(consumer).await;

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 5);
        assert_eq!(queue.stats().total_processed, 5);
    }

    #[tokio::test]
    async fn failed_handler_retries_once_then_drops() {
        let queue = queue_with(10, &[]);
        let attempts = Arc::new(AtomicU64::new(0));
        let attempts_clone = Arc::clone(&attempts);

        let consumer = queue.start_consumer(move |_event| {
            let attempts = Arc::clone(&attempts_clone);
            async move {
                attempts.fetch_add(1, Ordering::Relaxed);
                Err(signal_core::SignalError::Api("boom".to_string()))
            }
        });

        queue.enqueue(event("a", 1, 0));
        tokio::time::sleep(Duration::from_millis(200)).await;
        queue.stop(consumer).await;

        // Original attempt + exactly one retry.
        assert_eq!(attempts.load(Ordering::Relaxed), 2);
        assert_eq!(queue.stats().total_retried, 1);
        assert!(queue.stats().total_dropped >= 1);
    }
}
