//! Session Process Registry
//!
//! Tracks every worker process the server has spawned, keyed by the worker's process
//! id, together with the room it was launched for. Each registered session gets a
//! supervising task that owns the child process, publishes its exit status and kills
//! it on request, so liveness can be polled without blocking and awaited without
//! polling.
//!
//! A worker's stdin and stdout carry its tool-call transport. The registry holds
//! them from registration until something attaches with
//! [`SessionRegistry::take_pipes`], so the worker never sees end-of-file on stdin
//! while nobody is listening.
//!
//! Admission is a single step: [`SessionRegistry::reserve`] checks the per-room cap
//! and claims a slot under the registry lock. The slot is either converted into a
//! session by [`SessionRegistry::register`] or released when the reservation is
//! dropped.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::process::ExitStatus;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::process::{Child, ChildStdin, ChildStdout};
use tokio::sync::{oneshot, watch};
use tracing::{Instrument, info, info_span, warn};
use utoipa::ToSchema;

/// Identifies a session by its worker's OS process id.
///
/// Process ids are unique only while the process is alive and may be reused later.
pub type SessionId = u32;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Bot with process ID: {0} not found")]
    NotFound(SessionId),
    #[error("Max bot limit ({max}) reached for room: {room_url}")]
    CapacityExceeded { room_url: String, max: usize },
    #[error("Spawned worker exited before it could be registered")]
    ProcessGone,
    #[error("Bot with process ID: {0} has no transport to attach to")]
    NoTransport(SessionId),
}

/// How long a finished session stays visible to status queries by default.
pub const DEFAULT_FINISHED_RETENTION: Duration = Duration::from_secs(300);

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Running,
    Finished,
}

/// How a worker process ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionExit {
    /// `None` when the process was terminated by a signal.
    pub code: Option<i32>,
    pub finished_at: DateTime<Utc>,
}

impl SessionExit {
    fn unknown() -> Self {
        Self {
            code: None,
            finished_at: Utc::now(),
        }
    }
}

impl From<ExitStatus> for SessionExit {
    fn from(status: ExitStatus) -> Self {
        Self {
            code: status.code(),
            finished_at: Utc::now(),
        }
    }
}

/// The worker's end of its tool-call transport.
#[derive(Debug)]
pub struct WorkerPipes {
    /// Read side for the worker's output.
    pub stdout: ChildStdout,
    /// Write side for the worker's input. Dropping it ends the worker's session.
    pub stdin: ChildStdin,
}

/// A point-in-time view of one registered session.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionInfo {
    pub session_id: SessionId,
    pub room_url: String,
    pub created_at: DateTime<Utc>,
    pub status: SessionStatus,
}

struct SessionEntry {
    room_url: String,
    created_at: DateTime<Utc>,
    exit_rx: watch::Receiver<Option<SessionExit>>,
    kill_tx: Option<oneshot::Sender<()>>,
    pipes: Option<WorkerPipes>,
}

impl SessionEntry {
    fn status(&self) -> SessionStatus {
        match *self.exit_rx.borrow() {
            Some(_) => SessionStatus::Finished,
            None => SessionStatus::Running,
        }
    }

    fn finished_before(&self, cutoff: DateTime<Utc>) -> bool {
        matches!(*self.exit_rx.borrow(), Some(exit) if exit.finished_at <= cutoff)
    }
}

#[derive(Default)]
struct RegistryInner {
    sessions: HashMap<SessionId, SessionEntry>,
    /// Slots claimed by launches that have not registered yet, per room.
    pending: HashMap<String, usize>,
}

impl RegistryInner {
    fn registered_in(&self, room_url: &str) -> usize {
        self.sessions
            .values()
            .filter(|entry| entry.room_url == room_url)
            .count()
    }

    fn release(&mut self, room_url: &str) {
        if let Some(count) = self.pending.get_mut(room_url) {
            *count = count.saturating_sub(1);
            if *count == 0 {
                self.pending.remove(room_url);
            }
        }
    }
}

/// The server-wide table of worker processes.
///
/// Cloning is cheap and every clone refers to the same table.
#[derive(Clone)]
pub struct SessionRegistry {
    max_per_room: usize,
    retention: Duration,
    inner: Arc<Mutex<RegistryInner>>,
}

/// A claimed slot in a room, released on drop unless it was registered.
pub struct SlotReservation {
    inner: Arc<Mutex<RegistryInner>>,
    room_url: String,
    registered: bool,
}

impl SlotReservation {
    pub fn room_url(&self) -> &str {
        &self.room_url
    }
}

impl Drop for SlotReservation {
    fn drop(&mut self) {
        if !self.registered {
            lock(&self.inner).release(&self.room_url);
        }
    }
}

fn lock(inner: &Mutex<RegistryInner>) -> MutexGuard<'_, RegistryInner> {
    // Every critical section leaves the table consistent, so a poisoned lock is still usable.
    inner.lock().unwrap_or_else(PoisonError::into_inner)
}

impl SessionRegistry {
    pub fn new(max_per_room: usize) -> Self {
        Self {
            max_per_room,
            retention: DEFAULT_FINISHED_RETENTION,
            inner: Arc::new(Mutex::new(RegistryInner::default())),
        }
    }

    /// Sets how long finished sessions outside the admitted room are kept.
    pub fn with_retention(mut self, retention: Duration) -> Self {
        self.retention = retention;
        self
    }

    pub fn max_per_room(&self) -> usize {
        self.max_per_room
    }

    /// Number of sessions in the table, finished ones included.
    pub fn session_count(&self) -> usize {
        lock(&self.inner).sessions.len()
    }

    /// Number of registered sessions for `room_url`, whether or not their process
    /// has exited since.
    pub fn count_for_room(&self, room_url: &str) -> usize {
        lock(&self.inner).registered_in(room_url)
    }

    /// Atomically checks the room's cap and claims one slot in it.
    ///
    /// Registered sessions and outstanding reservations both count toward the cap.
    pub fn reserve(&self, room_url: &str) -> Result<SlotReservation, RegistryError> {
        let mut inner = lock(&self.inner);
        let pending = inner.pending.get(room_url).copied().unwrap_or(0);
        if inner.registered_in(room_url) + pending >= self.max_per_room {
            return Err(RegistryError::CapacityExceeded {
                room_url: room_url.to_string(),
                max: self.max_per_room,
            });
        }
        *inner.pending.entry(room_url.to_string()).or_insert(0) += 1;

        Ok(SlotReservation {
            inner: self.inner.clone(),
            room_url: room_url.to_string(),
            registered: false,
        })
    }

    /// Turns a reserved slot into a session for `child` and starts supervising it.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn register(
        &self,
        mut reservation: SlotReservation,
        mut child: Child,
    ) -> Result<SessionId, RegistryError> {
        let session_id = child.id().ok_or(RegistryError::ProcessGone)?;
        let room_url = reservation.room_url.clone();

        // `Child::wait` closes a stdin it still owns.
        let pipes = match (child.stdin.is_some(), child.stdout.is_some()) {
            (true, true) => child
                .stdin
                .take()
                .zip(child.stdout.take())
                .map(|(stdin, stdout)| WorkerPipes { stdout, stdin }),
            _ => None,
        };

        let (exit_tx, exit_rx) = watch::channel(None);
        let (kill_tx, kill_rx) = oneshot::channel();
        let span = info_span!("session", session_id, room_url = %room_url);
        tokio::spawn(supervise(child, exit_tx, kill_rx).instrument(span));

        let mut inner = lock(&self.inner);
        inner.release(&room_url);
        let replaced = inner.sessions.insert(
            session_id,
            SessionEntry {
                room_url,
                created_at: Utc::now(),
                exit_rx,
                kill_tx: Some(kill_tx),
                pipes,
            },
        );
        if let Some(stale) = replaced {
            warn!(session_id, room_url = %stale.room_url, "Process id reused, dropped stale session");
        }
        reservation.registered = true;

        Ok(session_id)
    }

    /// Reports whether the session's process is still running. Never blocks.
    pub fn status(&self, session_id: SessionId) -> Result<SessionStatus, RegistryError> {
        lock(&self.inner)
            .sessions
            .get(&session_id)
            .map(SessionEntry::status)
            .ok_or(RegistryError::NotFound(session_id))
    }

    pub fn info(&self, session_id: SessionId) -> Result<SessionInfo, RegistryError> {
        lock(&self.inner)
            .sessions
            .get(&session_id)
            .map(|entry| SessionInfo {
                session_id,
                room_url: entry.room_url.clone(),
                created_at: entry.created_at,
                status: entry.status(),
            })
            .ok_or(RegistryError::NotFound(session_id))
    }

    /// Hands over the worker's stdio transport. Succeeds once per session.
    pub fn take_pipes(&self, session_id: SessionId) -> Result<WorkerPipes, RegistryError> {
        lock(&self.inner)
            .sessions
            .get_mut(&session_id)
            .ok_or(RegistryError::NotFound(session_id))?
            .pipes
            .take()
            .ok_or(RegistryError::NoTransport(session_id))
    }

    /// Resolves once the session's process has exited.
    pub async fn wait_for_exit(&self, session_id: SessionId) -> Result<SessionExit, RegistryError> {
        let mut exit_rx = lock(&self.inner)
            .sessions
            .get(&session_id)
            .map(|entry| entry.exit_rx.clone())
            .ok_or(RegistryError::NotFound(session_id))?;
        Ok(wait_exit(&mut exit_rx).await)
    }

    /// Removes the sessions of `room_url` whose process has exited.
    pub fn prune_finished(&self, room_url: &str) -> usize {
        let mut inner = lock(&self.inner);
        let before = inner.sessions.len();
        inner.sessions.retain(|_, entry| {
            entry.room_url != room_url || entry.status() == SessionStatus::Running
        });
        before - inner.sessions.len()
    }

    /// Removes sessions in any room whose process exited longer ago than the
    /// retention window.
    pub fn prune_expired(&self) -> usize {
        let Some(cutoff) = chrono::Duration::from_std(self.retention)
            .ok()
            .and_then(|retention| Utc::now().checked_sub_signed(retention))
        else {
            return 0;
        };
        let mut inner = lock(&self.inner);
        let before = inner.sessions.len();
        inner.sessions.retain(|_, entry| !entry.finished_before(cutoff));
        before - inner.sessions.len()
    }

    /// Kills every registered worker and waits for all of them to exit.
    ///
    /// The table is drained under the lock first, so sessions registered while this
    /// runs are left alone.
    pub async fn shutdown_all(&self) {
        let drained: Vec<(SessionId, SessionEntry)> = lock(&self.inner).sessions.drain().collect();
        if drained.is_empty() {
            return;
        }
        info!(count = drained.len(), "Terminating all worker processes...");

        let mut waiting = Vec::with_capacity(drained.len());
        for (session_id, mut entry) in drained {
            if let Some(kill_tx) = entry.kill_tx.take() {
                // The supervisor is gone once the process has exited on its own.
                let _ = kill_tx.send(());
            }
            waiting.push((session_id, entry.exit_rx));
        }

        for (session_id, mut exit_rx) in waiting {
            let exit = wait_exit(&mut exit_rx).await;
            info!(session_id, code = ?exit.code, "Worker process stopped");
        }
    }
}

async fn wait_exit(exit_rx: &mut watch::Receiver<Option<SessionExit>>) -> SessionExit {
    match exit_rx.wait_for(Option::is_some).await {
        Ok(exit) => (*exit).unwrap_or_else(SessionExit::unknown),
        // The supervisor always publishes before it finishes.
        Err(_) => SessionExit::unknown(),
    }
}

/// Owns one worker process until it exits, killing it if asked to.
async fn supervise(
    mut child: Child,
    exit_tx: watch::Sender<Option<SessionExit>>,
    kill_rx: oneshot::Receiver<()>,
) {
    let exited = tokio::select! {
        status = child.wait() => Some(status),
        _ = kill_rx => None,
    };

    let status = match exited {
        Some(status) => status,
        None => {
            if let Err(e) = child.start_kill() {
                warn!(error = %e, "Failed to kill worker process");
            }
            child.wait().await
        }
    };

    let exit = match status {
        Ok(status) => SessionExit::from(status),
        Err(e) => {
            warn!(error = %e, "Failed to wait on worker process");
            SessionExit::unknown()
        }
    };
    info!(code = ?exit.code, "Worker process exited");
    exit_tx.send_replace(Some(exit));
}
