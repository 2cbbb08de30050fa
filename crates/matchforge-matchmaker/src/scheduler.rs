//! The pairing loop.
//!
//! Handlers enqueue requests; one background task sweeps the queues,
//! takes the oldest full party of each mode, and asks the registry for a
//! room. When a sweep forms no room the loop sleeps for the poll
//! interval. Enqueue does not wake it.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use matchforge_protocol::{GameMode, PlayerId, RoomAssignment, Slot};
use matchforge_room::{RoomRegistry, RoomSink};
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use crate::queue::ModeQueue;
use crate::{MatchError, MatchOutcome, MatchRequest, SchedulerConfig, Ticket};

struct Shared<S: RoomSink> {
    registry: RoomRegistry<S>,
    /// Sweep order.
    modes: Vec<GameMode>,
    queues: HashMap<GameMode, Mutex<ModeQueue>>,
    next_ticket: AtomicU64,
    poll_interval: Duration,
}

/// Matchmaking queues plus the loop that drains them.
///
/// Cheap to clone: every handler holds one to enqueue and cancel.
pub struct Scheduler<S: RoomSink> {
    shared: Arc<Shared<S>>,
}

impl<S: RoomSink> Clone for Scheduler<S> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<S: RoomSink> Scheduler<S> {
    /// Creates the queues. Nothing is paired until [`spawn`](Self::spawn).
    pub fn new(config: SchedulerConfig, registry: RoomRegistry<S>) -> Self {
        let config = config.validated();
        let modes = config.modes.iter().map(|entry| entry.mode).collect();
        let queues = config
            .modes
            .iter()
            .map(|entry| (entry.mode, Mutex::new(ModeQueue::new(entry.party_size))))
            .collect();
        Self {
            shared: Arc::new(Shared {
                registry,
                modes,
                queues,
                next_ticket: AtomicU64::new(0),
                poll_interval: config.poll_interval,
            }),
        }
    }

    pub fn registry(&self) -> &RoomRegistry<S> {
        &self.shared.registry
    }

    /// Queues `request` for a match in `mode`.
    ///
    /// The in-game check happens here only; a player seated between this
    /// call and pairing is not caught.
    pub fn enqueue(
        &self,
        mode: GameMode,
        request: MatchRequest,
    ) -> Result<Ticket, MatchError> {
        let queue = self
            .shared
            .queues
            .get(&mode)
            .ok_or(MatchError::UnknownMode(mode))?;
        if self.shared.registry.is_in_game(request.player_id()) {
            return Err(MatchError::AlreadyInGame(request.player_id().clone()));
        }

        let id = self.shared.next_ticket.fetch_add(1, Ordering::Relaxed);
        let player_id = request.player_id().clone();
        queue.lock().push(id, request).map_err(|_| MatchError::Stopped)?;

        debug!(%player_id, %mode, ticket = id, "match request queued");
        Ok(Ticket { mode, id })
    }

    /// Drops the request behind `ticket` if it is still queued.
    ///
    /// Returns `false` when it was already paired (or cancelled); that is
    /// not an error.
    pub fn cancel(&self, ticket: Ticket) -> bool {
        let removed = self
            .shared
            .queues
            .get(&ticket.mode)
            .and_then(|queue| queue.lock().remove(ticket.id));
        match removed {
            Some(request) => {
                debug!(player_id = %request.player_id(), mode = %ticket.mode, "match request cancelled");
                true
            }
            None => false,
        }
    }

    /// Number of requests waiting in `mode`, or `None` for an unknown mode.
    pub fn queue_depth(&self, mode: GameMode) -> Option<usize> {
        self.shared.queues.get(&mode).map(|queue| queue.lock().len())
    }

    /// Waiting requests per mode, in configuration order.
    pub fn queue_depths(&self) -> Vec<(GameMode, usize)> {
        self.shared
            .modes
            .iter()
            .filter_map(|mode| Some((*mode, self.queue_depth(*mode)?)))
            .collect()
    }

    /// Starts the pairing loop on the current runtime.
    pub fn spawn(&self) -> SchedulerHandle {
        let token = CancellationToken::new();
        let task = tokio::spawn(self.clone().run(token.clone()));
        SchedulerHandle { token, task }
    }

    /// Runs the pairing loop until `shutdown` is cancelled, then closes
    /// the queues. Requests still waiting are dropped, which closes their
    /// outcome channels.
    pub async fn run(self, shutdown: CancellationToken) {
        info!(
            modes = self.shared.modes.len(),
            poll_interval_ms = self.shared.poll_interval.as_millis() as u64,
            "scheduler running"
        );

        while !shutdown.is_cancelled() {
            let formed = self.sweep();
            if formed > 0 {
                tokio::task::yield_now().await;
                continue;
            }
            trace!("no party ready");
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(self.shared.poll_interval) => {}
            }
        }

        let dropped = self.close_queues();
        info!(dropped, "scheduler stopped");
    }

    /// One pass over every mode, forming as many rooms as possible.
    fn sweep(&self) -> usize {
        let mut formed = 0;
        for mode in &self.shared.modes {
            let Some(queue) = self.shared.queues.get(mode) else {
                continue;
            };
            loop {
                // The queue lock is released before the registry is touched.
                let party = queue.lock().take_party();
                let Some(party) = party else { break };
                self.form_room(*mode, party);
                formed += 1;
            }
        }
        formed
    }

    fn form_room(&self, mode: GameMode, party: Vec<MatchRequest>) {
        let players: Vec<PlayerId> = party
            .iter()
            .map(|request| request.player_id().clone())
            .collect();

        match self.shared.registry.create_room(players) {
            Ok(room) => {
                info!(room_id = %room.id(), %mode, players = party.len(), "match formed");
                for (index, request) in party.into_iter().enumerate() {
                    request.resolve(MatchOutcome::Matched(RoomAssignment {
                        room_id: room.id(),
                        slot: Slot(index as u32),
                    }));
                }
            }
            Err(e) => {
                error!(%mode, error = %e, "could not create room for paired players");
                for request in party {
                    request.resolve(MatchOutcome::Unavailable);
                }
            }
        }
    }

    fn close_queues(&self) -> usize {
        let mut dropped = 0;
        for (mode, queue) in &self.shared.queues {
            let waiting = queue.lock().close();
            if !waiting.is_empty() {
                warn!(%mode, waiting = waiting.len(), "dropping unmatched requests");
            }
            dropped += waiting.len();
        }
        dropped
    }
}

/// Join handle for a running pairing loop.
#[derive(Debug)]
pub struct SchedulerHandle {
    token: CancellationToken,
    task: JoinHandle<()>,
}

impl SchedulerHandle {
    /// A token that stops the loop when cancelled.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.token.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Stops the loop and waits for it to finish draining.
    pub async fn stop(self) {
        self.token.cancel();
        if let Err(e) = self.task.await {
            error!(error = %e, "scheduler task failed");
        }
    }
}
