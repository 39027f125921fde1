//! Periodic ticker scheduling.
//!
//! One timing loop owns a priority queue of next-fire deadlines for every
//! running ticker, instead of one platform timer per rule. The loop is
//! driven by the tokio clock, so tests run against simulated time.
//!
//! Cancellation is synchronous from the caller's perspective: stopping a
//! ticker removes it from the shared schedule before the call returns, and
//! stale heap entries are discarded by generation check. Command dispatch
//! from a tick that already fired still completes.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};
use std::sync::{Arc, Mutex};

use tokio::sync::{mpsc, watch, Notify};
use tokio::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::common::error::{SchedulerError, SchedulerResult};
use crate::common::messages::OutboundCommand;
use crate::common::types::{Rule, RuleId, RuleKind};

/// A running ticker.
#[derive(Debug, Clone)]
struct TickerEntry {
    commands: Vec<String>,
    interval: Duration,
    /// Bumped on every (re)start; heap entries from older generations are
    /// stale and get discarded when popped.
    generation: u64,
}

#[derive(Debug, Default)]
struct Schedule {
    tickers: HashMap<RuleId, TickerEntry>,
    /// Min-heap of (deadline, rule id, generation).
    heap: BinaryHeap<Reverse<(Instant, RuleId, u64)>>,
    next_generation: u64,
}

impl Schedule {
    /// Earliest live deadline, discarding stale heap entries.
    fn next_deadline(&mut self) -> Option<Instant> {
        while let Some(Reverse((deadline, id, generation))) = self.heap.peek().copied() {
            match self.tickers.get(&id) {
                Some(entry) if entry.generation == generation => return Some(deadline),
                _ => {
                    self.heap.pop();
                }
            }
        }
        None
    }
}

/// Shared state between the scheduler loop and its handles.
#[derive(Debug)]
struct Shared {
    schedule: Mutex<Schedule>,
    changed: Notify,
}

/// Control handle for starting and stopping tickers.
///
/// All mutations take effect before the call returns; the scheduler loop
/// is nudged to re-read the schedule.
#[derive(Debug, Clone)]
pub struct TickerHandle {
    shared: Arc<Shared>,
}

impl TickerHandle {
    /// Start (or restart) a ticker with a fresh phase.
    ///
    /// A non-positive or non-finite interval is refused: the validation
    /// layer should have rejected it, so an already-stored bad interval is
    /// surfaced as a configuration error instead of spinning a timer.
    pub fn start_ticker(
        &self,
        rule_id: RuleId,
        interval_secs: f64,
        commands: Vec<String>,
    ) -> SchedulerResult<()> {
        if !interval_secs.is_finite() || interval_secs <= 0.0 {
            return Err(SchedulerError::InvalidInterval {
                rule_id,
                interval: interval_secs,
            });
        }

        let interval = Duration::from_secs_f64(interval_secs);
        let mut schedule = self.shared.schedule.lock().expect("scheduler lock");
        let generation = schedule.next_generation;
        schedule.next_generation += 1;

        schedule.tickers.insert(
            rule_id,
            TickerEntry {
                commands,
                interval,
                generation,
            },
        );
        schedule
            .heap
            .push(Reverse((Instant::now() + interval, rule_id, generation)));
        drop(schedule);

        debug!("Ticker {} started ({}s)", rule_id, interval_secs);
        self.shared.changed.notify_one();
        Ok(())
    }

    /// Start every enabled, non-hidden ticker from a rule snapshot.
    ///
    /// Returns the configuration errors for tickers that could not be
    /// started; valid tickers are unaffected by invalid siblings.
    pub fn start_session_tickers(&self, rules: &[Rule]) -> Vec<SchedulerError> {
        let mut errors = Vec::new();

        for rule in rules {
            let interval_secs = match rule.kind {
                RuleKind::Ticker { interval_secs } => interval_secs,
                _ => continue,
            };
            if !rule.options.enabled || rule.options.hidden {
                continue;
            }
            if let Err(e) = self.start_ticker(rule.id, interval_secs, rule.commands.clone()) {
                warn!("{}", e);
                errors.push(e);
            }
        }

        errors
    }

    /// Stop a ticker. No firing happens after this returns.
    pub fn stop_ticker(&self, rule_id: RuleId) {
        let removed = {
            let mut schedule = self.shared.schedule.lock().expect("scheduler lock");
            schedule.tickers.remove(&rule_id).is_some()
        };
        if removed {
            debug!("Ticker {} stopped", rule_id);
            self.shared.changed.notify_one();
        }
    }

    /// Change a running ticker's interval: cancel and restart with the new
    /// period. The phase resets; there is no drift correction.
    pub fn set_interval(&self, rule_id: RuleId, interval_secs: f64) -> SchedulerResult<()> {
        let commands = {
            let schedule = self.shared.schedule.lock().expect("scheduler lock");
            match schedule.tickers.get(&rule_id) {
                Some(entry) => entry.commands.clone(),
                None => return Err(SchedulerError::NotRunning { rule_id }),
            }
        };
        self.start_ticker(rule_id, interval_secs, commands)
    }

    /// Stop every running ticker (session disconnect).
    pub fn stop_all(&self) {
        let mut schedule = self.shared.schedule.lock().expect("scheduler lock");
        schedule.tickers.clear();
        schedule.heap.clear();
        drop(schedule);
        self.shared.changed.notify_one();
    }
}

/// The scheduler loop.
pub struct TickerScheduler {
    shared: Arc<Shared>,
    command_tx: mpsc::UnboundedSender<OutboundCommand>,
    shutdown_rx: watch::Receiver<bool>,
}

impl TickerScheduler {
    pub fn new(
        command_tx: mpsc::UnboundedSender<OutboundCommand>,
        shutdown_rx: watch::Receiver<bool>,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                schedule: Mutex::new(Schedule::default()),
                changed: Notify::new(),
            }),
            command_tx,
            shutdown_rx,
        }
    }

    pub fn handle(&self) -> TickerHandle {
        TickerHandle {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Run until shutdown. Fires due tickers in deadline order and
    /// dispatches their command lists, in stored order, to the shared
    /// outbound queue.
    pub async fn run(mut self) {
        loop {
            let deadline = {
                let mut schedule = self.shared.schedule.lock().expect("scheduler lock");
                schedule.next_deadline()
            };

            let sleep = async {
                match deadline {
                    Some(deadline) => tokio::time::sleep_until(deadline).await,
                    None => std::future::pending().await,
                }
            };

            tokio::select! {
                changed = self.shutdown_rx.changed() => {
                    // A closed channel means the control side is gone
                    if changed.is_err() || *self.shutdown_rx.borrow() {
                        info!("Ticker scheduler shutting down");
                        return;
                    }
                }
                _ = self.shared.changed.notified() => {
                    // Schedule changed; recompute the next deadline.
                }
                _ = sleep => {
                    self.fire_due();
                }
            }
        }
    }

    /// Pop and dispatch every entry whose deadline has passed, then
    /// reschedule each for one interval from now.
    fn fire_due(&self) {
        let now = Instant::now();
        let mut fired: Vec<Vec<String>> = Vec::new();

        {
            let mut schedule = self.shared.schedule.lock().expect("scheduler lock");
            while let Some(Reverse((deadline, id, generation))) = schedule.heap.peek().copied() {
                if deadline > now {
                    break;
                }
                schedule.heap.pop();

                let entry = match schedule.tickers.get(&id) {
                    Some(entry) if entry.generation == generation => entry.clone(),
                    _ => continue, // stopped or restarted since this was queued
                };

                fired.push(entry.commands.clone());
                schedule
                    .heap
                    .push(Reverse((now + entry.interval, id, generation)));
            }
        }

        for commands in fired {
            for command in commands {
                if let Err(e) = self.command_tx.send(OutboundCommand::ticker(command)) {
                    debug!("Outbound channel closed: {}", e);
                    return;
                }
            }
        }
    }
}
