//! # Observation Pool
//!
//! Fixed set of worker threads in front of an [`Engine`]. Each worker owns a
//! bounded queue; a player is pinned to one worker by id, so its join,
//! observations and leave are applied in submission order.
//!
//! ```text
//!  submit(id, obs) ──► shard(id) ──► [queue 0] ──► worker 0 ──┐
//!                                    [queue 1] ──► worker 1 ──┼──► Engine
//!                                    [queue N] ──► worker N ──┘
//! ```
//!
//! Observations use `try_send`: a saturated queue drops the observation and
//! counts it. Lifecycle jobs block until queued, so a join or leave is never
//! lost.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use tracing::{debug, info, warn};
use warden_shared::PlayerId;

use crate::engine::Engine;
use crate::error::PoolError;
use crate::exemption::ExemptionReason;
use crate::observation::Observation;

/// Work for one player.
#[derive(Debug)]
enum Job {
    Join(PlayerId, u64),
    Leave(PlayerId),
    Observe(PlayerId, Observation),
    Exempt {
        player: PlayerId,
        reason: ExemptionReason,
        duration_ms: u64,
    },
}

/// Pool counters.
#[derive(Debug, Default)]
pub struct PoolStats {
    /// Jobs queued.
    pub submitted: AtomicU64,
    /// Observations dropped on a full queue.
    pub dropped: AtomicU64,
    /// Jobs completed.
    pub processed: AtomicU64,
}

/// Sharded worker pool.
pub struct ObservationPool {
    engine: Arc<Engine>,
    senders: Vec<Sender<Job>>,
    handles: Vec<JoinHandle<()>>,
    stats: Arc<PoolStats>,
}

impl std::fmt::Debug for ObservationPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObservationPool")
            .field("workers", &self.handles.len())
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}

/// SplitMix64 finalizer. Spreads sequential ids across shards.
fn mix(mut x: u64) -> u64 {
    x = x.wrapping_add(0x9E37_79B9_7F4A_7C15);
    x = (x ^ (x >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    x = (x ^ (x >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    x ^ (x >> 31)
}

impl ObservationPool {
    /// Starts `engine.config().workers` threads with
    /// `engine.config().queue_capacity` slots each.
    #[must_use]
    pub fn spawn(engine: Arc<Engine>) -> Self {
        let workers = engine.config().workers.max(1);
        let capacity = engine.config().queue_capacity.max(1);
        let stats = Arc::new(PoolStats::default());

        let mut senders = Vec::with_capacity(workers);
        let mut handles = Vec::with_capacity(workers);
        for index in 0..workers {
            let (sender, receiver) = bounded(capacity);
            let worker_engine = Arc::clone(&engine);
            let worker_stats = Arc::clone(&stats);
            handles.push(thread::spawn(move || {
                worker_loop(index, &receiver, &worker_engine, &worker_stats);
            }));
            senders.push(sender);
        }
        info!(workers, capacity, "Observation pool started");

        Self {
            engine,
            senders,
            handles,
            stats,
        }
    }

    fn shard(&self, id: PlayerId) -> Result<&Sender<Job>, PoolError> {
        if self.senders.is_empty() {
            return Err(PoolError::Closed);
        }
        let index = (mix(id.0) % self.senders.len() as u64) as usize;
        self.senders.get(index).ok_or(PoolError::Closed)
    }

    fn send_blocking(&self, id: PlayerId, job: Job) -> Result<(), PoolError> {
        self.shard(id)?.send(job).map_err(|_| PoolError::Closed)?;
        self.stats.submitted.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Queues an observation. Returns `Ok(false)` if the player's queue was
    /// full and the observation was dropped.
    ///
    /// # Errors
    ///
    /// [`PoolError::Closed`] if the worker has exited.
    pub fn submit(&self, id: PlayerId, obs: Observation) -> Result<bool, PoolError> {
        match self.shard(id)?.try_send(Job::Observe(id, obs)) {
            Ok(()) => {
                self.stats.submitted.fetch_add(1, Ordering::Relaxed);
                Ok(true)
            }
            Err(TrySendError::Full(_)) => {
                self.stats.dropped.fetch_add(1, Ordering::Relaxed);
                warn!(player = %id, "Worker queue saturated, observation dropped");
                Ok(false)
            }
            Err(TrySendError::Disconnected(_)) => Err(PoolError::Closed),
        }
    }

    /// Queues a join, stamped with the engine clock now.
    ///
    /// # Errors
    ///
    /// [`PoolError::Closed`] if the worker has exited.
    pub fn join(&self, id: PlayerId) -> Result<(), PoolError> {
        let at_ms = self.engine.clock().now_ms();
        self.send_blocking(id, Job::Join(id, at_ms))
    }

    /// Queues a leave.
    ///
    /// # Errors
    ///
    /// [`PoolError::Closed`] if the worker has exited.
    pub fn leave(&self, id: PlayerId) -> Result<(), PoolError> {
        self.send_blocking(id, Job::Leave(id))
    }

    /// Queues an exemption mark, ordered with the player's observations.
    ///
    /// # Errors
    ///
    /// [`PoolError::Closed`] if the worker has exited.
    pub fn mark_exception(&self, id: PlayerId, reason: ExemptionReason, duration_ms: u64) -> Result<(), PoolError> {
        self.send_blocking(
            id,
            Job::Exempt {
                player: id,
                reason,
                duration_ms,
            },
        )
    }

    /// Engine behind the pool.
    #[must_use]
    pub fn engine(&self) -> &Arc<Engine> {
        &self.engine
    }

    /// Counters.
    #[must_use]
    pub fn stats(&self) -> &PoolStats {
        &self.stats
    }

    /// Drains every queue and stops the workers.
    pub fn shutdown(mut self) {
        self.close();
    }

    fn close(&mut self) {
        self.senders.clear();
        for handle in self.handles.drain(..) {
            if handle.join().is_err() {
                warn!("Pool worker panicked");
            }
        }
    }
}

impl Drop for ObservationPool {
    fn drop(&mut self) {
        self.close();
    }
}

fn worker_loop(index: usize, receiver: &Receiver<Job>, engine: &Engine, stats: &PoolStats) {
    debug!(worker = index, "Pool worker started");
    while let Ok(job) = receiver.recv() {
        match job {
            Job::Join(id, at_ms) => {
                engine.on_player_join_at(id, at_ms);
            }
            Job::Leave(id) => {
                engine.on_player_leave(id);
            }
            Job::Observe(id, obs) => {
                engine.on_observation(id, obs);
            }
            Job::Exempt {
                player,
                reason,
                duration_ms,
            } => {
                engine.mark_exception(player, reason, duration_ms);
            }
        }
        stats.processed.fetch_add(1, Ordering::Relaxed);
    }
    debug!(worker = index, "Pool worker stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::{Clock, ManualClock};
    use crate::config::EngineConfig;
    use crate::environment::VoxelGrid;
    use crate::outbox::Outbox;
    use warden_shared::Vec3;

    fn engine() -> Arc<Engine> {
        let clock: Arc<dyn Clock> = Arc::new(ManualClock::new(0));
        let engine = Engine::new(
            EngineConfig::default(),
            Arc::new(VoxelGrid::flat(64)),
            clock,
            Outbox::disconnected(),
        )
        .expect("valid config");
        Arc::new(engine)
    }

    #[test]
    fn test_shards_spread_sequential_ids() {
        let mut counts = [0usize; 4];
        for id in 0..4_000u64 {
            counts[(mix(id) % 4) as usize] += 1;
        }
        assert!(counts.iter().all(|&c| c > 800), "{counts:?}");
    }

    #[test]
    fn test_jobs_for_one_player_stay_ordered() {
        let engine = engine();
        let pool = ObservationPool::spawn(Arc::clone(&engine));
        let id = PlayerId(3);
        pool.join(id).expect("open");
        let mut pos = Vec3::new(0.5, 64.0, 0.5);
        for seq in 1..=100 {
            let next = Vec3::new(pos.x + 0.2, 64.0, pos.z);
            let obs = Observation::builder(seq, 10_000 + seq * 50).moved(pos, next).build();
            pos = next;
            assert!(pool.submit(id, obs).expect("open"));
        }
        pool.shutdown();

        // Every observation was processed in order, so none was a duplicate.
        let stats = engine.stats();
        assert_eq!(stats.processed, 100);
        assert_eq!(stats.ignored, 0);
        assert_eq!(engine.with_player(id, |s| s.last_sequence()), Some(Some(100)));
    }

    #[test]
    fn test_join_is_stamped_when_queued() {
        let clock = Arc::new(ManualClock::new(1_000));
        let engine = Arc::new(
            Engine::new(
                EngineConfig::default(),
                Arc::new(VoxelGrid::flat(64)),
                Arc::clone(&clock) as Arc<dyn Clock>,
                Outbox::disconnected(),
            )
            .expect("valid config"),
        );
        let pool = ObservationPool::spawn(Arc::clone(&engine));
        pool.join(PlayerId(4)).expect("open");
        // The worker may run the join after the clock has moved on.
        clock.set(1_040);
        let obs = Observation::builder(1, 1_010).kind(crate::observation::ObservationKind::Flying).build();
        assert!(pool.submit(PlayerId(4), obs).expect("open"));
        pool.shutdown();
        assert_eq!(engine.with_player(PlayerId(4), crate::player::PlayerState::joined_at_ms), Some(1_000));
        assert_eq!(engine.stats().processed, 1);
        assert_eq!(engine.stats().ignored, 0);
    }

    #[test]
    fn test_leave_after_observations_flushes_state() {
        let engine = engine();
        let pool = ObservationPool::spawn(Arc::clone(&engine));
        for id in 0..16 {
            pool.join(PlayerId(id)).expect("open");
            let obs = Observation::builder(1, 10_000).build();
            pool.submit(PlayerId(id), obs).expect("open");
            pool.leave(PlayerId(id)).expect("open");
        }
        pool.shutdown();
        assert_eq!(engine.player_count(), 0);
        assert_eq!(engine.stats().processed, 16);
    }
}
