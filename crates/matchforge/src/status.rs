//! Periodic status file.
//!
//! Operators `cat` the file to see whether the service is up and how
//! busy it is. It is rewritten every interval and once more, marked OFF,
//! when the server stops. Write failures are logged and retried on the
//! next interval.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::time::Duration;

use matchforge_matchmaker::Scheduler;
use matchforge_protocol::{GameMode, RoomId};
use matchforge_room::{RoomRegistry, RoomSink};
use tokio_util::sync::CancellationToken;

/// Where and how often to write the status file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusConfig {
    pub path: PathBuf,
    pub interval: Duration,
}

impl Default for StatusConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("/tmp/matchforge_status"),
            interval: Duration::from_secs(1),
        }
    }
}

/// The counters shown in the status file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusSnapshot {
    pub running: bool,
    pub in_game_players: usize,
    pub active_rooms: usize,
    pub next_room_id: RoomId,
    /// Waiting requests per mode.
    pub queues: Vec<(GameMode, usize)>,
}

impl StatusSnapshot {
    pub fn capture<S: RoomSink>(
        running: bool,
        registry: &RoomRegistry<S>,
        scheduler: &Scheduler<S>,
    ) -> Self {
        let stats = registry.stats();
        Self {
            running,
            in_game_players: stats.in_game_players,
            active_rooms: stats.active_rooms,
            next_room_id: stats.next_room_id,
            queues: scheduler.queue_depths(),
        }
    }

    /// Renders the boxed text table written to the status file.
    pub fn render(&self) -> String {
        const SEPARATOR: &str = "-------------------------------\n";

        let mut out = String::new();
        out.push_str(SEPARATOR);
        out.push_str("|   Matchforge server status  |\n");
        out.push_str(SEPARATOR);
        let service = if self.running { "ON" } else { "OFF" };
        row(&mut out, "Service", service);
        out.push_str(SEPARATOR);
        row(&mut out, "In game players", self.in_game_players);
        row(&mut out, "Active rooms", self.active_rooms);
        row(&mut out, "Next room ID", self.next_room_id.0);
        out.push_str(SEPARATOR);
        for (mode, waiting) in &self.queues {
            row(&mut out, &format!("Awaiting ({mode})"), waiting);
        }
        out.push_str(SEPARATOR);
        out
    }
}

fn row(out: &mut String, label: &str, value: impl std::fmt::Display) {
    let _ = writeln!(out, "| {label:<18} : {value:>6} |");
}

/// Rewrites the status file until `shutdown` is cancelled, then writes a
/// final OFF snapshot.
pub(crate) async fn run_status_reporter<S: RoomSink>(
    config: StatusConfig,
    registry: RoomRegistry<S>,
    scheduler: Scheduler<S>,
    shutdown: CancellationToken,
) {
    tracing::info!(path = %config.path.display(), "status reporter running");
    loop {
        let snapshot = StatusSnapshot::capture(true, &registry, &scheduler);
        write_status(&config.path, &snapshot).await;
        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = tokio::time::sleep(config.interval) => {}
        }
    }
    let snapshot = StatusSnapshot::capture(false, &registry, &scheduler);
    write_status(&config.path, &snapshot).await;
}

async fn write_status(path: &Path, snapshot: &StatusSnapshot) {
    if let Err(e) = tokio::fs::write(path, snapshot.render()).await {
        tracing::warn!(path = %path.display(), error = %e, "failed to write status file");
    }
}
