//! Display-side collaborators
//!
//! The windowing shell is not part of this crate; what it needs from the core
//! is defined here:
//!
//! - [`StatusSink`]: an append-only text log
//! - [`LabelSink`]: a single replaceable line of text
//! - [`SharedTotal`]: running total shared by every consumer
//! - [`BalanceConsumer`]: a named thread that drains the output channel into
//!   the shared total while enabled
//!
//! Each consumer receives its own label handles at construction; there is no
//! lookup of labels by name.

use crate::core::CancellationToken;
use crate::queue::BlockingQueue;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::info;

/// Output channel of per-account balance snapshots
pub type OutputChannel = Arc<BlockingQueue<i64>>;

/// Append-only log of status lines
pub trait StatusSink: Send + Sync {
    fn append_line(&self, line: &str);
}

/// A label whose text is replaced wholesale
pub trait LabelSink: Send + Sync {
    fn set_label(&self, text: &str);
}

/// Status sink that forwards every line to `tracing` at info level
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingStatusSink;

impl StatusSink for TracingStatusSink {
    fn append_line(&self, line: &str) {
        info!(target: "bank_sim_core::display", "{}", line);
    }
}

/// Status sink collecting lines in memory
#[derive(Debug, Default)]
pub struct MemoryStatusSink {
    lines: Mutex<Vec<String>>,
}

impl MemoryStatusSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().clone()
    }
}

impl StatusSink for MemoryStatusSink {
    fn append_line(&self, line: &str) {
        self.lines.lock().push(line.to_string());
    }
}

/// Label holding its latest text in memory
#[derive(Debug, Default)]
pub struct MemoryLabel {
    text: Mutex<String>,
}

impl MemoryLabel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(&self) -> String {
        self.text.lock().clone()
    }
}

impl LabelSink for MemoryLabel {
    fn set_label(&self, text: &str) {
        *self.text.lock() = text.to_string();
    }
}

/// Label that discards everything
#[derive(Debug, Clone, Copy, Default)]
pub struct NullLabel;

impl LabelSink for NullLabel {
    fn set_label(&self, _text: &str) {}
}

/// Lock-free running total
///
/// # Example
/// ```
/// use bank_sim_core::display::SharedTotal;
///
/// let total = SharedTotal::new();
/// total.add(1000);
/// assert_eq!(total.add(501), 1501);
/// ```
#[derive(Debug, Default)]
pub struct SharedTotal {
    value: AtomicI64,
}

impl SharedTotal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `value` and return the new total
    pub fn add(&self, value: i64) -> i64 {
        self.value.fetch_add(value, Ordering::SeqCst) + value
    }

    pub fn get(&self) -> i64 {
        self.value.load(Ordering::SeqCst)
    }
}

/// Handles one consumer publishes to
#[derive(Clone)]
pub struct ConsumerSinks {
    /// Shows the output channel contents every poll
    pub queue_label: Arc<dyn LabelSink>,
    /// Shows the last value this consumer took
    pub value_label: Arc<dyn LabelSink>,
    /// Receives one line per value taken
    pub status: Arc<dyn StatusSink>,
}

impl Default for ConsumerSinks {
    fn default() -> Self {
        Self {
            queue_label: Arc::new(NullLabel),
            value_label: Arc::new(NullLabel),
            status: Arc::new(TracingStatusSink),
        }
    }
}

/// Named consumer of the output channel
///
/// Starts disabled. While enabled, each poll takes at most one balance, adds
/// it to the shared total and reports it; while disabled it only refreshes
/// the queue label. Polls never block on an empty channel, so `stop` takes
/// effect by the next poll.
pub struct BalanceConsumer {
    name: String,
    running: Arc<AtomicBool>,
    token: CancellationToken,
    thread: Option<JoinHandle<()>>,
}

impl BalanceConsumer {
    /// Spawn the consumer thread
    pub fn spawn(
        name: impl Into<String>,
        channel: OutputChannel,
        total: Arc<SharedTotal>,
        sinks: ConsumerSinks,
        poll_interval: Duration,
    ) -> std::io::Result<Self> {
        let name = name.into();
        let running = Arc::new(AtomicBool::new(false));
        let token = CancellationToken::new();

        let worker = ConsumerLoop {
            name: name.clone(),
            channel,
            total,
            sinks,
            running: Arc::clone(&running),
            token: token.clone(),
            poll_interval,
        };
        let thread = std::thread::Builder::new()
            .name(name.clone())
            .spawn(move || worker.run())?;

        Ok(Self {
            name,
            running,
            token,
            thread: Some(thread),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Enable consumption
    pub fn start(&self) {
        self.running.store(true, Ordering::SeqCst);
    }

    /// Disable consumption; the thread keeps refreshing its queue label
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// End the thread and wait for it
    pub fn shutdown(mut self) {
        self.token.cancel();
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

impl Drop for BalanceConsumer {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

impl std::fmt::Debug for BalanceConsumer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BalanceConsumer")
            .field("name", &self.name)
            .field("running", &self.is_running())
            .finish()
    }
}

struct ConsumerLoop {
    name: String,
    channel: OutputChannel,
    total: Arc<SharedTotal>,
    sinks: ConsumerSinks,
    running: Arc<AtomicBool>,
    token: CancellationToken,
    poll_interval: Duration,
}

impl ConsumerLoop {
    fn run(self) {
        while !self.token.is_cancelled() {
            self.publish_queue();

            if self.running.load(Ordering::SeqCst) {
                if let Some(value) = self.channel.try_take() {
                    self.consume(value);
                }
            }

            if !self.token.sleep(self.poll_interval) {
                break;
            }
        }
    }

    fn publish_queue(&self) {
        let contents: Vec<String> = self
            .channel
            .snapshot()
            .iter()
            .map(i64::to_string)
            .collect();
        self.sinks
            .queue_label
            .set_label(&format!("{} acc_queue: {}", self.name, contents.join(" ")));
    }

    fn consume(&self, value: i64) {
        self.sinks.value_label.set_label(&value.to_string());
        let total = self.total.add(value);
        self.sinks
            .status
            .append_line(&format!("{} added: {} -> new total: {}", self.name, value, total));
        self.channel.task_done();
    }
}
