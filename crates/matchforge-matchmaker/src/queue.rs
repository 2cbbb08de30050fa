//! Match requests and the per-mode FIFO queue.

use std::collections::VecDeque;

use matchforge_protocol::{GameMode, PlayerId, RoomAssignment};
use tokio::sync::oneshot;

/// How a queued request ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchOutcome {
    /// Seated in a new room.
    Matched(RoomAssignment),
    /// Paired, but the room could not be created. Not retried.
    Unavailable,
}

/// A player waiting for a match.
///
/// The outcome is sent once on `notify`. A request dropped without an
/// outcome (cancelled, or the scheduler stopped) closes the channel.
#[derive(Debug)]
pub struct MatchRequest {
    player_id: PlayerId,
    notify: oneshot::Sender<MatchOutcome>,
}

impl MatchRequest {
    /// Creates a request and the receiver its outcome arrives on.
    pub fn new(player_id: PlayerId) -> (Self, oneshot::Receiver<MatchOutcome>) {
        let (notify, rx) = oneshot::channel();
        (Self { player_id, notify }, rx)
    }

    pub fn player_id(&self) -> &PlayerId {
        &self.player_id
    }

    pub(crate) fn resolve(self, outcome: MatchOutcome) {
        if self.notify.send(outcome).is_err() {
            tracing::debug!(
                player_id = %self.player_id,
                "requester left before the match result"
            );
        }
    }
}

/// Identifies one queued request, for [`Scheduler::cancel`](crate::Scheduler::cancel).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Ticket {
    pub(crate) mode: GameMode,
    pub(crate) id: u64,
}

impl Ticket {
    pub fn mode(&self) -> GameMode {
        self.mode
    }
}

/// The waiting requests of one mode, oldest first.
#[derive(Debug)]
pub(crate) struct ModeQueue {
    party_size: usize,
    entries: VecDeque<(u64, MatchRequest)>,
    closed: bool,
}

impl ModeQueue {
    pub(crate) fn new(party_size: usize) -> Self {
        Self {
            party_size,
            entries: VecDeque::new(),
            closed: false,
        }
    }

    /// Appends a request. Hands it back if the queue is closed.
    pub(crate) fn push(
        &mut self,
        id: u64,
        request: MatchRequest,
    ) -> Result<(), MatchRequest> {
        if self.closed {
            return Err(request);
        }
        self.entries.push_back((id, request));
        Ok(())
    }

    /// Removes the request with ticket `id`, if still queued.
    pub(crate) fn remove(&mut self, id: u64) -> Option<MatchRequest> {
        let index = self.entries.iter().position(|(entry, _)| *entry == id)?;
        self.entries.remove(index).map(|(_, request)| request)
    }

    /// Takes the oldest `party_size` requests, or nothing.
    pub(crate) fn take_party(&mut self) -> Option<Vec<MatchRequest>> {
        if self.entries.len() < self.party_size {
            return None;
        }
        Some(
            self.entries
                .drain(..self.party_size)
                .map(|(_, request)| request)
                .collect(),
        )
    }

    /// Refuses further pushes and returns everything still waiting.
    pub(crate) fn close(&mut self) -> Vec<MatchRequest> {
        self.closed = true;
        self.entries.drain(..).map(|(_, request)| request).collect()
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}
