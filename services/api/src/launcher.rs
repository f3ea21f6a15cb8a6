//! Session Launcher
//!
//! Starts one worker process per practice session: acquires a room and token,
//! claims a slot in that room, spawns the worker with the room's credentials and
//! prompt, and records it in the [`SessionRegistry`].

use crate::registry::{RegistryError, SessionId, SessionRegistry};
use crate::room::{RoomService, RoomServiceError, create_room_and_token};
use std::path::PathBuf;
use std::process::Stdio;
use tokio::process::Command;
use tracing::{error, info, instrument};

#[derive(Debug, thiserror::Error)]
pub enum LaunchError {
    #[error(transparent)]
    RoomService(#[from] RoomServiceError),
    #[error("Max bot limit ({max}) reached for room: {room_url}")]
    CapacityExceeded { room_url: String, max: usize },
    #[error("Failed to start subprocess: {0}")]
    LaunchFailed(#[source] std::io::Error),
    #[error(transparent)]
    Registry(RegistryError),
}

impl From<RegistryError> for LaunchError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::CapacityExceeded { room_url, max } => {
                LaunchError::CapacityExceeded { room_url, max }
            }
            other => LaunchError::Registry(other),
        }
    }
}

/// How to start a worker process.
///
/// The worker receives `<args...> -u <room_url> -t <token> -p <prompt>` as discrete
/// arguments. Its stdin and stdout are piped and carry its tool-call transport; the
/// registry holds them until a caller attaches with
/// [`SessionRegistry::take_pipes`].
#[derive(Clone, Debug)]
pub struct WorkerCommand {
    pub program: PathBuf,
    pub args: Vec<String>,
    pub working_dir: Option<PathBuf>,
}

impl WorkerCommand {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            working_dir: None,
        }
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_working_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.working_dir = dir;
        self
    }

    fn build(&self, room_url: &str, token: &str, prompt: &str) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .arg("-u")
            .arg(room_url)
            .arg("-t")
            .arg(token)
            .arg("-p")
            .arg(prompt)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true);
        if let Some(dir) = &self.working_dir {
            cmd.current_dir(dir);
        }
        cmd
    }
}

/// A session that was started together with its room.
#[derive(Debug, Clone, PartialEq)]
pub struct LaunchedSession {
    pub session_id: SessionId,
    pub room_url: String,
    pub token: String,
}

#[derive(Clone)]
pub struct SessionLauncher {
    registry: SessionRegistry,
    worker: WorkerCommand,
}

impl SessionLauncher {
    pub fn new(registry: SessionRegistry, worker: WorkerCommand) -> Self {
        Self { registry, worker }
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    /// Spawns a worker for an existing room.
    ///
    /// An empty `prompt` tells the worker to use its default persona. On any failure
    /// the registry is left as it was and no worker is left running.
    #[instrument(skip(self, token, prompt), fields(session_id))]
    pub fn launch(&self, room_url: &str, token: &str, prompt: &str) -> Result<SessionId, LaunchError> {
        let pruned = self.registry.prune_finished(room_url) + self.registry.prune_expired();
        if pruned > 0 {
            info!(pruned, "Pruned finished sessions before admission");
        }

        let reservation = self.registry.reserve(room_url)?;

        let child = self
            .worker
            .build(room_url, token, prompt)
            .spawn()
            .map_err(|e| {
                error!(program = %self.worker.program.display(), error = %e, "Failed to spawn worker");
                LaunchError::LaunchFailed(e)
            })?;

        let session_id = self.registry.register(reservation, child)?;
        tracing::Span::current().record("session_id", session_id);
        info!(custom_prompt = !prompt.is_empty(), "Worker started");
        Ok(session_id)
    }

    /// Creates a room and token, then spawns a worker for it.
    pub async fn start_session(
        &self,
        rooms: &dyn RoomService,
        prompt: &str,
    ) -> Result<LaunchedSession, LaunchError> {
        info!("Creating room...");
        let (room_url, token) = create_room_and_token(rooms).await?;
        info!(%room_url, "Room created");

        let session_id = self.launch(&room_url, &token, prompt)?;
        Ok(LaunchedSession {
            session_id,
            room_url,
            token,
        })
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::registry::SessionStatus;
    use crate::room::MockRoomService;

    /// A worker that ignores its arguments and sleeps.
    fn sleeper() -> WorkerCommand {
        WorkerCommand::new("sh").with_args(["-c", "sleep 30", "parley-bot"])
    }

    /// A worker that checks it received the expected arguments, then exits.
    fn arg_checker() -> WorkerCommand {
        WorkerCommand::new("sh").with_args([
            "-c",
            r#"[ "$1" = "-u" ] && [ "$2" = "https://r/1" ] && [ "$4" = "tok" ] && [ "$6" = "it's a 'prompt'" ]"#,
            "parley-bot",
        ])
    }

    fn rooms_returning(url: &'static str) -> MockRoomService {
        let mut rooms = MockRoomService::new();
        rooms.expect_create_room().returning(move || Ok(url.to_string()));
        rooms.expect_get_token().returning(|_| Ok("tok".to_string()));
        rooms
    }

    #[tokio::test]
    async fn test_launch_registers_worker() {
        let launcher = SessionLauncher::new(SessionRegistry::new(1), sleeper());
        let id = launcher.launch("https://r/1", "tok", "").unwrap();

        assert_eq!(launcher.registry().count_for_room("https://r/1"), 1);
        assert_eq!(launcher.registry().status(id).unwrap(), SessionStatus::Running);
        launcher.registry().shutdown_all().await;
    }

    #[tokio::test]
    async fn test_second_launch_for_same_room_is_rejected() {
        let launcher = SessionLauncher::new(SessionRegistry::new(1), sleeper());
        launcher.launch("https://r/1", "tok", "").unwrap();

        let err = launcher.launch("https://r/1", "tok", "").unwrap_err();
        assert!(matches!(err, LaunchError::CapacityExceeded { max: 1, .. }));
        assert_eq!(launcher.registry().count_for_room("https://r/1"), 1);
        launcher.registry().shutdown_all().await;
    }

    #[tokio::test]
    async fn test_spawn_failure_leaves_registry_unchanged() {
        let launcher = SessionLauncher::new(
            SessionRegistry::new(1),
            WorkerCommand::new("/nonexistent/parley-bot"),
        );

        let err = launcher.launch("https://r/1", "tok", "").unwrap_err();
        assert!(matches!(err, LaunchError::LaunchFailed(_)));
        assert_eq!(launcher.registry().count_for_room("https://r/1"), 0);
        // The slot was released, so a later launch may still use it.
        assert!(launcher.registry().reserve("https://r/1").is_ok());
    }

    #[tokio::test]
    async fn test_prompt_is_passed_as_a_single_argument() {
        let launcher = SessionLauncher::new(SessionRegistry::new(1), arg_checker());
        let id = launcher.launch("https://r/1", "tok", "it's a 'prompt'").unwrap();

        let exit = launcher.registry().wait_for_exit(id).await.unwrap();
        assert_eq!(exit.code, Some(0));
    }

    #[tokio::test]
    async fn test_finished_session_does_not_hold_capacity() {
        let launcher = SessionLauncher::new(
            SessionRegistry::new(1),
            WorkerCommand::new("sh").with_args(["-c", "exit 0", "parley-bot"]),
        );
        let first = launcher.launch("https://r/1", "tok", "").unwrap();
        launcher.registry().wait_for_exit(first).await.unwrap();

        assert!(launcher.launch("https://r/1", "tok", "").is_ok());
    }

    #[tokio::test]
    async fn test_finished_sessions_in_fresh_rooms_are_pruned() {
        let registry = SessionRegistry::new(1).with_retention(std::time::Duration::ZERO);
        let launcher = SessionLauncher::new(
            registry,
            WorkerCommand::new("sh").with_args(["-c", "exit 0", "parley-bot"]),
        );

        for n in 0..20 {
            let id = launcher.launch(&format!("https://r/{n}"), "tok", "").unwrap();
            launcher.registry().wait_for_exit(id).await.unwrap();
        }

        // Only the latest session is left; every earlier one was pruned on admission.
        assert_eq!(launcher.registry().session_count(), 1);
        assert_eq!(launcher.registry().count_for_room("https://r/19"), 1);
    }

    #[tokio::test]
    async fn test_start_session_uses_room_service() {
        let launcher = SessionLauncher::new(SessionRegistry::new(1), sleeper());
        let rooms = rooms_returning("https://acme.daily.co/fresh");

        let session = launcher.start_session(&rooms, "").await.unwrap();

        assert_eq!(session.room_url, "https://acme.daily.co/fresh");
        assert_eq!(session.token, "tok");
        assert_eq!(
            launcher.registry().status(session.session_id).unwrap(),
            SessionStatus::Running
        );
        launcher.registry().shutdown_all().await;
    }

    #[tokio::test]
    async fn test_room_service_failure_spawns_nothing() {
        let launcher = SessionLauncher::new(SessionRegistry::new(1), sleeper());
        let rooms = rooms_returning("");

        let err = launcher.start_session(&rooms, "").await.unwrap_err();
        assert!(matches!(err, LaunchError::RoomService(RoomServiceError::EmptyRoomUrl)));
        assert_eq!(launcher.registry().count_for_room(""), 0);
    }
}
