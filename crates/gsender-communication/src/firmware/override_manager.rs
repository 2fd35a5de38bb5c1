//! Feed, rapid and spindle overrides
//!
//! GRBL changes override percentages through realtime bytes in fixed steps
//! of 10% and 1%. A requested delta is decomposed into those steps by
//! [`encode_override`] and written one byte per timer tick by the
//! [`OverrideDispatcher`]. Nothing here checks the firmware's 10%-200%
//! window; the controller clamps and the next status report shows the
//! result.

use super::realtime::RealtimeCommand;
use gsender_core::{AppEvent, EventBus, OverrideEvent, Result, SenderError, StepOrderSetting};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Default spacing between consecutive override bytes
pub const DEFAULT_STEP_DELAY: Duration = Duration::from_millis(50);

/// Which override a delta applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverrideKind {
    Feed,
    Spindle,
}

impl OverrideKind {
    fn reset(self) -> RealtimeCommand {
        match self {
            Self::Feed => RealtimeCommand::FeedOverrideReset,
            Self::Spindle => RealtimeCommand::SpindleOverrideReset,
        }
    }

    fn coarse(self, increase: bool) -> RealtimeCommand {
        match (self, increase) {
            (Self::Feed, true) => RealtimeCommand::FeedOverridePlusTen,
            (Self::Feed, false) => RealtimeCommand::FeedOverrideMinusTen,
            (Self::Spindle, true) => RealtimeCommand::SpindleOverridePlusTen,
            (Self::Spindle, false) => RealtimeCommand::SpindleOverrideMinusTen,
        }
    }

    fn fine(self, increase: bool) -> RealtimeCommand {
        match (self, increase) {
            (Self::Feed, true) => RealtimeCommand::FeedOverridePlusOne,
            (Self::Feed, false) => RealtimeCommand::FeedOverrideMinusOne,
            (Self::Spindle, true) => RealtimeCommand::SpindleOverridePlusOne,
            (Self::Spindle, false) => RealtimeCommand::SpindleOverrideMinusOne,
        }
    }
}

impl std::fmt::Display for OverrideKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Feed => write!(f, "feed"),
            Self::Spindle => write!(f, "spindle"),
        }
    }
}

impl std::str::FromStr for OverrideKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "feed" => Ok(Self::Feed),
            "spindle" => Ok(Self::Spindle),
            other => Err(format!("unknown override kind: {}", other)),
        }
    }
}

/// Decompose a signed percentage delta into realtime override bytes
///
/// A zero delta resets the override to 100%. Otherwise `|delta| / 10`
/// coarse steps and `|delta| % 10` fine steps are emitted in the direction
/// of the sign, grouped according to `order`.
pub fn encode_override(
    delta: i32,
    kind: OverrideKind,
    order: StepOrderSetting,
) -> Vec<RealtimeCommand> {
    if delta == 0 {
        return vec![kind.reset()];
    }

    let increase = delta > 0;
    let magnitude = delta.unsigned_abs() as usize;
    let coarse = std::iter::repeat(kind.coarse(increase)).take(magnitude / 10);
    let fine = std::iter::repeat(kind.fine(increase)).take(magnitude % 10);

    match order {
        StepOrderSetting::FineFirst => fine.chain(coarse).collect(),
        StepOrderSetting::CoarseFirst => coarse.chain(fine).collect(),
    }
}

/// Rapid override levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RapidOverrideLevel {
    /// 25%
    Quarter,
    /// 50%
    Half,
    /// 100%
    Full,
}

impl RapidOverrideLevel {
    /// Realtime byte selecting this level
    pub fn command(self) -> RealtimeCommand {
        match self {
            Self::Quarter => RealtimeCommand::RapidOverrideQuarter,
            Self::Half => RealtimeCommand::RapidOverrideHalf,
            Self::Full => RealtimeCommand::RapidOverrideReset,
        }
    }

    /// Level matching a reported percentage
    pub fn from_percent(percent: u16) -> Self {
        match percent {
            0..=25 => Self::Quarter,
            26..=50 => Self::Half,
            _ => Self::Full,
        }
    }
}

/// Override percentages last reported by the firmware (`Ov:` field)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverrideState {
    pub feed: u16,
    pub rapid: u16,
    pub spindle: u16,
}

impl Default for OverrideState {
    fn default() -> Self {
        Self {
            feed: 100,
            rapid: 100,
            spindle: 100,
        }
    }
}

impl OverrideState {
    /// Percentage for `kind`
    pub fn get(&self, kind: OverrideKind) -> u16 {
        match kind {
            OverrideKind::Feed => self.feed,
            OverrideKind::Spindle => self.spindle,
        }
    }

    /// Rapid level
    pub fn rapid_level(&self) -> RapidOverrideLevel {
        RapidOverrideLevel::from_percent(self.rapid)
    }

    /// Delta that moves `kind` from its reported value to `target`
    pub fn delta_to(&self, kind: OverrideKind, target: u16) -> i32 {
        i32::from(target) - i32::from(self.get(kind))
    }
}

/// Writes override bytes on spaced timer ticks
///
/// Bytes go into a channel drained by whoever owns the transport, so the
/// connection stays exclusively owned. Each dispatch runs as its own tokio
/// task; `cancel_all` aborts every task that has not finished.
pub struct OverrideDispatcher {
    sink: mpsc::UnboundedSender<RealtimeCommand>,
    step_delay: Duration,
    order: StepOrderSetting,
    tasks: Arc<Mutex<Vec<JoinHandle<()>>>>,
    events: Option<Arc<EventBus>>,
}

impl OverrideDispatcher {
    /// Create a dispatcher writing into `sink`
    pub fn new(sink: mpsc::UnboundedSender<RealtimeCommand>) -> Self {
        Self {
            sink,
            step_delay: DEFAULT_STEP_DELAY,
            order: StepOrderSetting::default(),
            tasks: Arc::new(Mutex::new(Vec::new())),
            events: None,
        }
    }

    /// Create a dispatcher and the receiving end of its channel
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<RealtimeCommand>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(tx), rx)
    }

    /// Set the spacing between bytes
    pub fn with_step_delay(mut self, step_delay: Duration) -> Self {
        self.step_delay = step_delay;
        self
    }

    /// Set the coarse/fine ordering
    pub fn with_order(mut self, order: StepOrderSetting) -> Self {
        self.order = order;
        self
    }

    /// Publish dispatch events on `bus`
    pub fn with_events(mut self, bus: Arc<EventBus>) -> Self {
        self.events = Some(bus);
        self
    }

    /// Schedule the bytes for `delta`, returning how many were scheduled
    ///
    /// Must be called from within a tokio runtime.
    pub fn dispatch(&self, delta: i32, kind: OverrideKind) -> Result<usize> {
        let runtime = tokio::runtime::Handle::try_current().map_err(|e| {
            SenderError::DispatchUnavailable {
                reason: e.to_string(),
            }
        })?;

        let commands = encode_override(delta, kind, self.order);
        let steps = commands.len();
        tracing::debug!("Scheduling {} {} override step(s) for {:+}%", steps, kind, delta);

        let sink = self.sink.clone();
        let step_delay = self.step_delay;
        let handle = runtime.spawn(async move {
            for (i, command) in commands.into_iter().enumerate() {
                if i > 0 {
                    tokio::time::sleep(step_delay).await;
                }
                if sink.send(command).is_err() {
                    tracing::debug!("Override sink closed, dropping remaining steps");
                    return;
                }
            }
        });

        let mut tasks = self.tasks.lock();
        tasks.retain(|task| !task.is_finished());
        tasks.push(handle);
        drop(tasks);

        self.publish(OverrideEvent::Scheduled {
            kind: kind.to_string(),
            delta,
            steps,
        });
        Ok(steps)
    }

    /// Abort every dispatch still in progress, returning how many were aborted
    pub fn cancel_all(&self) -> usize {
        let tasks: Vec<_> = self.tasks.lock().drain(..).collect();
        let mut aborted = 0;
        for task in tasks {
            if !task.is_finished() {
                task.abort();
                aborted += 1;
            }
        }
        if aborted > 0 {
            tracing::info!("Flushed {} pending override dispatch(es)", aborted);
        }
        self.publish(OverrideEvent::Flushed { aborted });
        aborted
    }

    /// Number of dispatches still running
    pub fn pending(&self) -> usize {
        self.tasks.lock().iter().filter(|t| !t.is_finished()).count()
    }

    fn publish(&self, event: OverrideEvent) {
        if let Some(bus) = &self.events {
            let _ = bus.publish(AppEvent::Override(event));
        }
    }
}

impl std::fmt::Debug for OverrideDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OverrideDispatcher")
            .field("step_delay", &self.step_delay)
            .field("order", &self.order)
            .field("pending", &self.pending())
            .finish()
    }
}
