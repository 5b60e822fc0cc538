//! # Outbox
//!
//! Findings, flags and end-of-session levels leave the engine through a
//! bounded channel drained by a single delivery thread:
//!
//! ```text
//!   worker 1 ──┐
//!   worker 2 ──┼──> [bounded channel] ──> [delivery thread] ──> persistence
//!   worker N ──┘        (try_send)                           ├─> alerts
//!                                                            └─> punishment
//! ```
//!
//! Detection never waits on a collaborator. A full channel drops the event
//! and counts it; a failing collaborator is logged and counted.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use warden_shared::PlayerId;

use crate::detector::{DetectorId, Finding};
use crate::error::SinkError;
use crate::violation::FlagEvent;

/// Persisted form of a finding. Append-only, keyed by player and timestamp.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ViolationRecord {
    /// Offending player.
    pub player: PlayerId,
    /// Detector that produced the finding.
    pub detector: DetectorId,
    /// Finding weight.
    pub severity: f64,
    /// Human-readable evidence.
    pub evidence: String,
    /// Observation time.
    pub timestamp_ms: u64,
    /// Observation sequence.
    pub sequence: u64,
}

impl ViolationRecord {
    /// Builds the record for `finding`.
    #[must_use]
    pub fn from_finding(player: PlayerId, finding: &Finding) -> Self {
        Self {
            player,
            detector: finding.detector,
            severity: finding.severity,
            evidence: finding.evidence.clone(),
            timestamp_ms: finding.source.timestamp_ms,
            sequence: finding.source.sequence,
        }
    }
}

/// Everything the engine hands to collaborators.
#[derive(Clone, Debug, PartialEq)]
pub enum OutboundEvent {
    /// A detector finding, for persistence.
    Finding(ViolationRecord),
    /// An accumulator crossed its ceiling, for alerting.
    Flag(FlagEvent),
    /// A flag that reached the punishment ceiling.
    Punish(FlagEvent),
    /// Final levels of a leaving player.
    Flush {
        /// Leaving player.
        player: PlayerId,
        /// Non-zero levels at leave time.
        levels: Vec<(DetectorId, f64)>,
    },
}

/// Long-term storage.
pub trait PersistenceSink: Send + Sync {
    /// Appends one record.
    ///
    /// # Errors
    ///
    /// Returns [`SinkError`] when the record could not be stored.
    fn append(&self, record: &ViolationRecord) -> Result<(), SinkError>;

    /// Stores a leaving player's final levels.
    ///
    /// # Errors
    ///
    /// Returns [`SinkError`] when the levels could not be stored.
    fn flush_player(&self, _player: PlayerId, _levels: &[(DetectorId, f64)]) -> Result<(), SinkError> {
        Ok(())
    }
}

/// Live notification of flags, e.g. to online staff.
pub trait AlertBroadcaster: Send + Sync {
    /// Broadcasts one flag.
    ///
    /// # Errors
    ///
    /// Returns [`SinkError`] when delivery failed.
    fn broadcast(&self, flag: &FlagEvent) -> Result<(), SinkError>;
}

/// Administrative action once a punishment ceiling is reached.
pub trait PunishmentHandler: Send + Sync {
    /// Acts on one flag.
    ///
    /// # Errors
    ///
    /// Returns [`SinkError`] when the action could not be taken.
    fn punish(&self, flag: &FlagEvent) -> Result<(), SinkError>;
}

/// Collaborators the delivery thread calls. Missing ones are skipped.
#[derive(Clone, Default)]
pub struct Collaborators {
    /// Storage for findings and final levels.
    pub persistence: Option<Arc<dyn PersistenceSink>>,
    /// Flag notification.
    pub alerts: Option<Arc<dyn AlertBroadcaster>>,
    /// Punishment execution.
    pub punishment: Option<Arc<dyn PunishmentHandler>>,
}

impl Collaborators {
    /// Routes every concern to one in-memory sink.
    #[must_use]
    pub fn memory(sink: &Arc<MemorySink>) -> Self {
        Self {
            persistence: Some(Arc::clone(sink) as Arc<dyn PersistenceSink>),
            alerts: Some(Arc::clone(sink) as Arc<dyn AlertBroadcaster>),
            punishment: Some(Arc::clone(sink) as Arc<dyn PunishmentHandler>),
        }
    }

    fn deliver(&self, event: OutboundEvent) -> Result<(), SinkError> {
        match event {
            OutboundEvent::Finding(record) => match &self.persistence {
                Some(sink) => sink.append(&record),
                None => Ok(()),
            },
            OutboundEvent::Flag(flag) => match &self.alerts {
                Some(alerts) => alerts.broadcast(&flag),
                None => Ok(()),
            },
            OutboundEvent::Punish(flag) => match &self.punishment {
                Some(handler) => handler.punish(&flag),
                None => Ok(()),
            },
            OutboundEvent::Flush { player, levels } => match &self.persistence {
                Some(sink) => sink.flush_player(player, &levels),
                None => Ok(()),
            },
        }
    }
}

impl std::fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collaborators")
            .field("persistence", &self.persistence.is_some())
            .field("alerts", &self.alerts.is_some())
            .field("punishment", &self.punishment.is_some())
            .finish()
    }
}

/// Outbox counters.
#[derive(Debug, Default)]
pub struct OutboxStats {
    /// Events accepted into the channel.
    pub sent: AtomicU64,
    /// Events dropped because the channel was full or closed.
    pub dropped: AtomicU64,
    /// Events delivered to collaborators.
    pub delivered: AtomicU64,
    /// Collaborator calls that returned an error.
    pub failed: AtomicU64,
}

/// Sending half of the outbox. Cheap to clone.
#[derive(Clone, Debug)]
pub struct Outbox {
    sender: Option<Sender<OutboundEvent>>,
    stats: Arc<OutboxStats>,
}

impl Outbox {
    /// An outbox that discards everything without counting drops.
    #[must_use]
    pub fn disconnected() -> Self {
        Self {
            sender: None,
            stats: Arc::new(OutboxStats::default()),
        }
    }

    /// A bounded outbox whose receiving half the caller drains.
    #[must_use]
    pub fn channel(capacity: usize) -> (Self, Receiver<OutboundEvent>) {
        let (sender, receiver) = bounded(capacity);
        let outbox = Self {
            sender: Some(sender),
            stats: Arc::new(OutboxStats::default()),
        };
        (outbox, receiver)
    }

    /// A bounded outbox drained by a dedicated delivery thread.
    ///
    /// The thread exits once every clone of the returned [`Outbox`] is
    /// dropped and the channel is empty.
    #[must_use]
    pub fn spawn(capacity: usize, collaborators: Collaborators) -> (Self, OutboxWorker) {
        let (outbox, receiver) = Self::channel(capacity);
        let stats = Arc::clone(&outbox.stats);
        let handle = thread::spawn(move || delivery_loop(&receiver, &collaborators, &stats));
        (outbox, OutboxWorker { handle: Some(handle) })
    }

    /// Enqueues an event without blocking. Returns whether it was accepted.
    pub fn send(&self, event: OutboundEvent) -> bool {
        let Some(sender) = &self.sender else {
            return false;
        };
        match sender.try_send(event) {
            Ok(()) => {
                self.stats.sent.fetch_add(1, Ordering::Relaxed);
                true
            }
            Err(TrySendError::Full(event) | TrySendError::Disconnected(event)) => {
                self.stats.dropped.fetch_add(1, Ordering::Relaxed);
                debug!(?event, "outbox saturated, event dropped");
                false
            }
        }
    }

    /// Counters shared with the delivery thread.
    #[must_use]
    pub fn stats(&self) -> &OutboxStats {
        &self.stats
    }
}

fn delivery_loop(receiver: &Receiver<OutboundEvent>, collaborators: &Collaborators, stats: &OutboxStats) {
    while let Ok(event) = receiver.recv() {
        match collaborators.deliver(event) {
            Ok(()) => {
                stats.delivered.fetch_add(1, Ordering::Relaxed);
            }
            Err(error) => {
                stats.failed.fetch_add(1, Ordering::Relaxed);
                warn!(%error, "collaborator delivery failed");
            }
        }
    }
}

/// Handle to the delivery thread.
#[derive(Debug)]
pub struct OutboxWorker {
    handle: Option<JoinHandle<()>>,
}

impl OutboxWorker {
    /// Waits for the delivery thread to drain and exit.
    ///
    /// Every [`Outbox`] clone, including the one inside the engine, must be
    /// dropped first or this blocks forever.
    pub fn join(mut self) {
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!("outbox delivery thread panicked");
            }
        }
    }
}

/// In-memory collaborator for tests and trace replay.
#[derive(Debug, Default)]
pub struct MemorySink {
    records: Mutex<Vec<ViolationRecord>>,
    flags: Mutex<Vec<FlagEvent>>,
    punishments: Mutex<Vec<FlagEvent>>,
    flushes: Mutex<Vec<(PlayerId, Vec<(DetectorId, f64)>)>>,
}

impl MemorySink {
    /// Empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records appended so far.
    #[must_use]
    pub fn records(&self) -> Vec<ViolationRecord> {
        self.records.lock().clone()
    }

    /// Flags broadcast so far.
    #[must_use]
    pub fn flags(&self) -> Vec<FlagEvent> {
        self.flags.lock().clone()
    }

    /// Punishments requested so far.
    #[must_use]
    pub fn punishments(&self) -> Vec<FlagEvent> {
        self.punishments.lock().clone()
    }

    /// Final levels flushed so far.
    #[must_use]
    pub fn flushes(&self) -> Vec<(PlayerId, Vec<(DetectorId, f64)>)> {
        self.flushes.lock().clone()
    }
}

impl PersistenceSink for MemorySink {
    fn append(&self, record: &ViolationRecord) -> Result<(), SinkError> {
        self.records.lock().push(record.clone());
        Ok(())
    }

    fn flush_player(&self, player: PlayerId, levels: &[(DetectorId, f64)]) -> Result<(), SinkError> {
        self.flushes.lock().push((player, levels.to_vec()));
        Ok(())
    }
}

impl AlertBroadcaster for MemorySink {
    fn broadcast(&self, flag: &FlagEvent) -> Result<(), SinkError> {
        self.flags.lock().push(flag.clone());
        Ok(())
    }
}

impl PunishmentHandler for MemorySink {
    fn punish(&self, flag: &FlagEvent) -> Result<(), SinkError> {
        self.punishments.lock().push(flag.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flag(player: u64) -> FlagEvent {
        FlagEvent {
            player: PlayerId(player),
            detector: DetectorId::Gravity,
            score: 10.0,
            flag_count: 1,
            evidence: "hover".into(),
            timestamp_ms: 1_000,
            punish: false,
        }
    }

    struct Failing;

    impl AlertBroadcaster for Failing {
        fn broadcast(&self, _flag: &FlagEvent) -> Result<(), SinkError> {
            Err(SinkError::Unavailable("offline".into()))
        }
    }

    #[test]
    fn test_delivery_thread_routes_events() {
        let sink = Arc::new(MemorySink::new());
        let (outbox, worker) = Outbox::spawn(16, Collaborators::memory(&sink));
        assert!(outbox.send(OutboundEvent::Flag(flag(1))));
        assert!(outbox.send(OutboundEvent::Punish(flag(2))));
        assert!(outbox.send(OutboundEvent::Flush {
            player: PlayerId(1),
            levels: vec![(DetectorId::Speed, 2.5)],
        }));
        let stats = Arc::clone(&outbox.stats);
        drop(outbox);
        worker.join();

        assert_eq!(sink.flags(), vec![flag(1)]);
        assert_eq!(sink.punishments(), vec![flag(2)]);
        assert_eq!(sink.flushes(), vec![(PlayerId(1), vec![(DetectorId::Speed, 2.5)])]);
        assert_eq!(stats.delivered.load(Ordering::Relaxed), 3);
    }

    #[test]
    fn test_full_channel_drops_and_counts() {
        let (outbox, receiver) = Outbox::channel(1);
        assert!(outbox.send(OutboundEvent::Flag(flag(1))));
        assert!(!outbox.send(OutboundEvent::Flag(flag(2))));
        assert_eq!(outbox.stats().dropped.load(Ordering::Relaxed), 1);
        assert_eq!(receiver.try_recv().ok(), Some(OutboundEvent::Flag(flag(1))));
    }

    #[test]
    fn test_collaborator_failure_is_counted() {
        let collaborators = Collaborators {
            alerts: Some(Arc::new(Failing)),
            ..Collaborators::default()
        };
        let (outbox, worker) = Outbox::spawn(4, collaborators);
        outbox.send(OutboundEvent::Flag(flag(1)));
        let stats = Arc::clone(&outbox.stats);
        drop(outbox);
        worker.join();
        assert_eq!(stats.failed.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_disconnected_outbox_discards() {
        let outbox = Outbox::disconnected();
        assert!(!outbox.send(OutboundEvent::Flag(flag(1))));
        assert_eq!(outbox.stats().dropped.load(Ordering::Relaxed), 0);
    }
}
