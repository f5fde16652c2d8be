//! Bounded in-memory retry buffer in front of a [`PointWriter`].
//!
//! [`ResilientSink::write`] tries the writer once inline. A failed point goes
//! to the back of a FIFO queue; a background task owned by the sink replays
//! the queue oldest-first, backing off exponentially while the writer keeps
//! failing. When the queue is full the oldest point is evicted and counted.
//!
//! The queue lock is only held to mutate or copy the queue, never across a
//! write, so a hanging sink cannot block producers. Nothing is persisted:
//! points still queued when the sink stops are lost.

use super::{BufferedPoint, PointWriter, SinkError};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// Queue capacity used when none is configured.
pub const DEFAULT_MAX_SIZE: usize = 500_000;
/// Base retry interval used when none is configured.
pub const DEFAULT_RETRY_INTERVAL: Duration = Duration::from_secs(30);
/// Ceiling for the backoff interval.
pub const MAX_RETRY_INTERVAL: Duration = Duration::from_secs(5 * 60);
/// How often queue statistics are logged while the queue is non-empty.
const STATS_LOG_INTERVAL: Duration = Duration::from_secs(5 * 60);

/// Buffer settings for one sink. Zero values fall back to the defaults.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BufferConfig {
    pub max_size: usize,
    pub retry_interval: Duration,
}

impl BufferConfig {
    fn max_size(&self) -> usize {
        if self.max_size > 0 {
            self.max_size
        } else {
            DEFAULT_MAX_SIZE
        }
    }

    fn retry_interval(&self) -> Duration {
        if self.retry_interval.is_zero() {
            DEFAULT_RETRY_INTERVAL
        } else {
            self.retry_interval
        }
    }
}

/// FIFO of pending points.
///
/// `head` is the sequence number of the front point: the count of points
/// that ever left the front, whether delivered or evicted. A flush remembers
/// `head` at snapshot time so that evictions racing with it are not mistaken
/// for delivered points.
struct Queue<T> {
    points: VecDeque<Arc<BufferedPoint<T>>>,
    head: u64,
    total_dropped: u64,
}

impl<T> Queue<T> {
    fn new() -> Self {
        Self {
            points: VecDeque::new(),
            head: 0,
            total_dropped: 0,
        }
    }

    fn push(&mut self, point: BufferedPoint<T>, max_size: usize) {
        while self.points.len() >= max_size {
            self.points.pop_front();
            self.head += 1;
            self.total_dropped += 1;
        }
        self.points.push_back(Arc::new(point));
    }

    /// Drop every point with a sequence number below `end`.
    fn remove_until(&mut self, end: u64) {
        while self.head < end && self.points.pop_front().is_some() {
            self.head += 1;
        }
    }

    fn snapshot(&self) -> (u64, Vec<Arc<BufferedPoint<T>>>) {
        (self.head, self.points.iter().cloned().collect())
    }
}

struct Shared<T> {
    name: String,
    max_size: usize,
    base_interval: Duration,
    writer: Box<dyn PointWriter<T>>,
    queue: Mutex<Queue<T>>,
}

impl<T> Shared<T> {
    fn queue(&self) -> MutexGuard<'_, Queue<T>> {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append a failed point, returning the new queue length.
    fn enqueue(&self, point: BufferedPoint<T>) -> usize {
        let mut queue = self.queue();
        queue.push(point, self.max_size);
        queue.points.len()
    }

    /// Replay a snapshot of the queue in order, stopping at the first failure.
    ///
    /// The delivered prefix is removed from the live queue either way.
    /// Returns how many points went out.
    async fn flush(&self) -> Result<usize, SinkError> {
        let (start, snapshot) = self.queue().snapshot();

        let mut flushed = 0;
        let mut outcome = Ok(());
        for point in &snapshot {
            if let Err(error) = self.writer.write(point).await {
                outcome = Err(error);
                break;
            }
            flushed += 1;
        }

        self.queue().remove_until(start + flushed as u64);
        outcome.map(|()| flushed)
    }
}

/// A sink with an in-memory retry queue and a background replay task.
///
/// Stops its task when dropped.
pub struct ResilientSink<T> {
    shared: Arc<Shared<T>>,
    stop: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl<T: Send + Sync + 'static> ResilientSink<T> {
    /// Wrap `writer` and start the retry task.
    ///
    /// # Panics
    /// Must be called from within a tokio runtime.
    pub fn new<W>(name: impl Into<String>, config: BufferConfig, writer: W) -> Self
    where
        W: PointWriter<T> + 'static,
    {
        Self::new_boxed(name, config, Box::new(writer))
    }

    /// Like [`ResilientSink::new`] for a writer that is already boxed.
    pub fn new_boxed(
        name: impl Into<String>,
        config: BufferConfig,
        writer: Box<dyn PointWriter<T>>,
    ) -> Self {
        let shared = Arc::new(Shared {
            name: name.into(),
            max_size: config.max_size(),
            base_interval: config.retry_interval(),
            writer,
            queue: Mutex::new(Queue::new()),
        });
        let (stop, stopped) = watch::channel(false);
        let task = tokio::spawn(retry_loop(Arc::clone(&shared), stopped));

        tracing::info!(
            sink = %shared.name,
            max_size = shared.max_size,
            retry_interval = ?shared.base_interval,
            "started buffered writer"
        );

        Self { shared, stop, task }
    }

    /// Deliver `point`, or queue it for retry if the writer fails.
    ///
    /// Failures are logged and absorbed; they never reach the caller.
    pub async fn write(&self, point: BufferedPoint<T>) {
        let result = self.shared.writer.write(&point).await;
        if let Err(error) = result {
            let buffer_size = self.shared.enqueue(point);
            tracing::warn!(
                sink = %self.shared.name,
                buffer_size,
                %error,
                "write failed, point buffered for retry"
            );
        }
    }
}

impl<T> ResilientSink<T> {
    /// Ask the retry task to exit. Queued points are discarded, not flushed.
    ///
    /// Calling it more than once is harmless.
    pub fn stop(&self) {
        self.stop.send_replace(true);
    }

    /// Whether the retry task is still alive.
    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }

    pub fn name(&self) -> &str {
        &self.shared.name
    }

    /// Number of points waiting for retry.
    pub fn len(&self) -> usize {
        self.shared.queue().points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Points evicted because the queue was full, since creation.
    pub fn dropped(&self) -> u64 {
        self.shared.queue().total_dropped
    }

    pub fn max_size(&self) -> usize {
        self.shared.max_size
    }

    pub fn base_interval(&self) -> Duration {
        self.shared.base_interval
    }
}

impl<T> Drop for ResilientSink<T> {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn retry_loop<T>(shared: Arc<Shared<T>>, mut stopped: watch::Receiver<bool>)
where
    T: Send + Sync + 'static,
{
    let base = shared.base_interval;
    let ceiling = MAX_RETRY_INTERVAL.max(base);
    let mut interval = base;
    let mut last_stats = Instant::now();

    loop {
        tokio::select! {
            // A closed channel means the sink is gone.
            _ = stopped.changed() => break,
            () = tokio::time::sleep(interval) => {}
        }

        let (buffer_size, total_dropped) = {
            let queue = shared.queue();
            (queue.points.len(), queue.total_dropped)
        };
        if buffer_size == 0 {
            interval = base;
            continue;
        }

        if last_stats.elapsed() >= STATS_LOG_INTERVAL {
            tracing::info!(
                sink = %shared.name,
                buffer_size,
                total_dropped,
                "buffer status"
            );
            last_stats = Instant::now();
        }

        match shared.flush().await {
            Ok(flushed) => {
                interval = base;
                tracing::info!(sink = %shared.name, flushed, "buffer flushed successfully");
            }
            Err(error) => {
                interval = interval.saturating_mul(2).min(ceiling);
                tracing::warn!(
                    sink = %shared.name,
                    next_retry_in = ?interval,
                    buffer_size = shared.queue().points.len(),
                    %error,
                    "buffer flush failed, backing off"
                );
            }
        }
    }

    tracing::debug!(sink = %shared.name, "retry loop stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::WriteFuture;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    /// Writer that records delivered values and fails on demand.
    #[derive(Clone, Default)]
    struct Recorder {
        failing: Arc<AtomicBool>,
        poisoned: Arc<Mutex<Option<u32>>>,
        attempts: Arc<AtomicUsize>,
        written: Arc<Mutex<Vec<u32>>>,
    }

    impl Recorder {
        fn failing() -> Self {
            let recorder = Self::default();
            recorder.failing.store(true, Ordering::SeqCst);
            recorder
        }

        fn recover(&self) {
            self.failing.store(false, Ordering::SeqCst);
        }

        /// Keep rejecting one specific value even after recovery.
        fn poison(&self, value: u32) {
            *self.poisoned.lock().unwrap() = Some(value);
        }

        fn attempts(&self) -> usize {
            self.attempts.load(Ordering::SeqCst)
        }

        fn written(&self) -> Vec<u32> {
            self.written.lock().unwrap().clone()
        }
    }

    impl PointWriter<u32> for Recorder {
        fn write<'a>(&'a self, point: &'a BufferedPoint<u32>) -> WriteFuture<'a> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            let rejected = self.failing.load(Ordering::SeqCst)
                || *self.poisoned.lock().unwrap() == Some(point.data);
            let result = if rejected {
                Err(SinkError::Unavailable("connection refused".into()))
            } else {
                self.written.lock().unwrap().push(point.data);
                Ok(())
            };
            Box::pin(std::future::ready(result))
        }
    }

    fn config(max_size: usize, retry_interval: Duration) -> BufferConfig {
        BufferConfig {
            max_size,
            retry_interval,
        }
    }

    fn queued(sink: &ResilientSink<u32>) -> Vec<u32> {
        sink.shared.queue().points.iter().map(|p| p.data).collect()
    }

    #[tokio::test(start_paused = true)]
    async fn test_pass_through_when_healthy() {
        let recorder = Recorder::default();
        let sink = ResilientSink::new("test", config(100, Duration::from_secs(10)), recorder.clone());

        for i in 0..10 {
            sink.write(BufferedPoint::new(i)).await;
        }

        assert_eq!(recorder.attempts(), 10);
        assert_eq!(recorder.written(), (0..10).collect::<Vec<_>>());
        assert!(sink.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_buffers_on_failure() {
        let sink = ResilientSink::new(
            "test",
            config(100, Duration::from_secs(10)),
            Recorder::failing(),
        );

        for i in 0..5 {
            sink.write(BufferedPoint::new(i)).await;
        }

        assert_eq!(sink.len(), 5);
        assert_eq!(sink.dropped(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_evicts_oldest_when_full() {
        let sink = ResilientSink::new(
            "test",
            config(3, Duration::from_secs(10)),
            Recorder::failing(),
        );

        for i in 0..5 {
            sink.write(BufferedPoint::new(i)).await;
        }

        assert_eq!(sink.len(), 3);
        assert_eq!(sink.dropped(), 2);
        assert_eq!(queued(&sink), vec![2, 3, 4]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_replays_in_order_after_recovery() {
        let recorder = Recorder::failing();
        let sink = ResilientSink::new(
            "test",
            config(100, Duration::from_millis(100)),
            recorder.clone(),
        );

        for i in 0..3 {
            sink.write(BufferedPoint::new(i)).await;
        }
        assert_eq!(sink.len(), 3);

        recorder.recover();
        tokio::time::sleep(Duration::from_millis(500)).await;

        assert!(sink.is_empty());
        assert_eq!(recorder.written(), vec![0, 1, 2]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_backoff_doubles_while_failing() {
        let recorder = Recorder::failing();
        let sink = ResilientSink::new(
            "test",
            config(100, Duration::from_millis(100)),
            recorder.clone(),
        );
        sink.write(BufferedPoint::new(1)).await;
        sink.write(BufferedPoint::new(2)).await;
        assert_eq!(recorder.attempts(), 2);

        // Retries at 100ms, 300ms, 700ms, 1500ms; each stops at the first point.
        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(recorder.attempts(), 3);
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(recorder.attempts(), 4);
        tokio::time::sleep(Duration::from_millis(300)).await;
        assert_eq!(recorder.attempts(), 4);
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(recorder.attempts(), 5);
        assert_eq!(queued(&sink), vec![1, 2]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_backoff_is_capped() {
        let recorder = Recorder::failing();
        let sink = ResilientSink::new(
            "test",
            config(100, Duration::from_secs(60)),
            recorder.clone(),
        );
        sink.write(BufferedPoint::new(1)).await;

        // 60s, 120s, 240s, then the 300s ceiling: attempts at 60, 180, 420, 720, 1020.
        tokio::time::sleep(Duration::from_secs(1030)).await;
        assert_eq!(recorder.attempts(), 1 + 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_point_blocks_the_rest() {
        let recorder = Recorder::failing();
        let sink = ResilientSink::new(
            "test",
            config(100, Duration::from_millis(100)),
            recorder.clone(),
        );
        for i in 0..3 {
            sink.write(BufferedPoint::new(i)).await;
        }

        recorder.poison(1);
        recorder.recover();
        tokio::time::sleep(Duration::from_millis(150)).await;

        assert_eq!(recorder.written(), vec![0]);
        assert_eq!(queued(&sink), vec![1, 2]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_points_written_during_outage_join_next_flush() {
        let recorder = Recorder::failing();
        let sink = ResilientSink::new(
            "test",
            config(100, Duration::from_millis(100)),
            recorder.clone(),
        );
        sink.write(BufferedPoint::new(0)).await;
        tokio::time::sleep(Duration::from_millis(150)).await;
        sink.write(BufferedPoint::new(1)).await;
        assert_eq!(queued(&sink), vec![0, 1]);

        recorder.recover();
        tokio::time::sleep(Duration::from_millis(300)).await;
        assert!(sink.is_empty());
        assert_eq!(recorder.written(), vec![0, 1]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_default_config() {
        let sink: ResilientSink<u32> =
            ResilientSink::new("test", BufferConfig::default(), Recorder::default());
        assert_eq!(sink.max_size(), DEFAULT_MAX_SIZE);
        assert_eq!(sink.base_interval(), DEFAULT_RETRY_INTERVAL);
        assert_eq!(sink.name(), "test");
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_is_idempotent_and_ends_task() {
        let sink = ResilientSink::new(
            "test",
            config(10, Duration::from_millis(100)),
            Recorder::failing(),
        );
        assert!(sink.is_running());

        sink.stop();
        sink.stop();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!sink.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_discards_queue_without_flushing() {
        let recorder = Recorder::failing();
        let sink = ResilientSink::new(
            "test",
            config(10, Duration::from_millis(100)),
            recorder.clone(),
        );
        sink.write(BufferedPoint::new(7)).await;
        sink.stop();

        recorder.recover();
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(recorder.attempts(), 1);
        assert!(recorder.written().is_empty());
    }

    /// Writer that takes 50ms per point. Values in `reject_once` fail on
    /// their first attempt only.
    #[derive(Clone, Default)]
    struct SlowWriter {
        failing: Arc<AtomicBool>,
        reject_once: Arc<Mutex<Vec<u32>>>,
        written: Arc<Mutex<Vec<u32>>>,
    }

    const WRITE_LATENCY: Duration = Duration::from_millis(50);

    impl PointWriter<u32> for SlowWriter {
        fn write<'a>(&'a self, point: &'a BufferedPoint<u32>) -> WriteFuture<'a> {
            Box::pin(async move {
                tokio::time::sleep(WRITE_LATENCY).await;
                let rejected = {
                    let mut reject_once = self.reject_once.lock().unwrap();
                    let hit = reject_once.contains(&point.data);
                    reject_once.retain(|v| *v != point.data);
                    hit
                };
                if rejected || self.failing.load(Ordering::SeqCst) {
                    return Err(SinkError::Unavailable("connection refused".into()));
                }
                self.written.lock().unwrap().push(point.data);
                Ok(())
            })
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_points_appended_during_flush_wait_for_next_flush() {
        let start = Instant::now();
        let writer = SlowWriter::default();
        writer.failing.store(true, Ordering::SeqCst);
        *writer.reject_once.lock().unwrap() = vec![10, 11];
        let sink = ResilientSink::new(
            "test",
            config(100, Duration::from_secs(1)),
            writer.clone(),
        );

        for i in 0..3 {
            sink.write(BufferedPoint::new(i)).await;
        }
        assert_eq!(queued(&sink), vec![0, 1, 2]);
        writer.failing.store(false, Ordering::SeqCst);

        // The flush starting at 1s writes 0, 1, 2 until 1.15s. Two producer
        // writes fail inline in the meantime and land behind the snapshot.
        tokio::time::sleep_until(start + Duration::from_millis(1025)).await;
        sink.write(BufferedPoint::new(10)).await;
        sink.write(BufferedPoint::new(11)).await;
        assert_eq!(queued(&sink), vec![0, 1, 2, 10, 11]);
        assert_eq!(*writer.written.lock().unwrap(), vec![0, 1]);

        tokio::time::sleep_until(start + Duration::from_millis(1175)).await;
        assert_eq!(queued(&sink), vec![10, 11]);
        assert_eq!(*writer.written.lock().unwrap(), vec![0, 1, 2]);

        // Next flush at 2.15s picks them up in order.
        tokio::time::sleep_until(start + Duration::from_millis(2300)).await;
        assert!(sink.is_empty());
        assert_eq!(*writer.written.lock().unwrap(), vec![0, 1, 2, 10, 11]);
        assert_eq!(sink.dropped(), 0);
    }

    #[test]
    fn test_eviction_during_flush_is_not_double_removed() {
        let mut queue = Queue::new();
        for i in 0..3u32 {
            queue.push(BufferedPoint::new(i), 3);
        }
        let (start, snapshot) = queue.snapshot();
        assert_eq!(snapshot.len(), 3);

        // A producer evicts point 0 while the flush delivers 0 and 1.
        queue.push(BufferedPoint::new(3), 3);
        queue.remove_until(start + 2);

        let left: Vec<u32> = queue.points.iter().map(|p| p.data).collect();
        assert_eq!(left, vec![2, 3]);
        assert_eq!(queue.total_dropped, 1);
    }
}
