//! Pausing and resuming desktop media players around the lock session
//!
//! Players following the MPRIS naming convention (`org.mpris.MediaPlayer2.*`)
//! are driven through a [`MediaBus`]. Only players that were `Playing` at lock
//! time are paused, and only those are resumed at unlock.

use std::io;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info_span, warn, Span};

/// MPRIS playback status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackStatus {
    Playing,
    Paused,
    Stopped,
}

impl PlaybackStatus {
    /// Parse the MPRIS `PlaybackStatus` string
    pub fn parse(status: &str) -> Option<Self> {
        match status.trim() {
            "Playing" => Some(Self::Playing),
            "Paused" => Some(Self::Paused),
            "Stopped" => Some(Self::Stopped),
            _ => None,
        }
    }
}

/// Desktop media-control bus
#[async_trait]
pub trait MediaBus: Send + Sync {
    /// Names of the registered players
    async fn list_players(&self) -> io::Result<Vec<String>>;

    /// Current playback status of a player
    async fn status(&self, player: &str) -> io::Result<PlaybackStatus>;

    /// Pause a player
    async fn pause(&self, player: &str) -> io::Result<()>;

    /// Resume a player
    async fn play(&self, player: &str) -> io::Result<()>;
}

/// [`MediaBus`] backed by the `playerctl` tool
#[derive(Debug, Clone)]
pub struct PlayerctlBus {
    program: String,
}

impl Default for PlayerctlBus {
    fn default() -> Self {
        Self {
            program: "playerctl".to_string(),
        }
    }
}

impl PlayerctlBus {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    async fn run(&self, args: &[&str]) -> io::Result<String> {
        let output = Command::new(&self.program).args(args).output().await?;
        if !output.status.success() {
            return Err(io::Error::new(
                io::ErrorKind::Other,
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

#[async_trait]
impl MediaBus for PlayerctlBus {
    async fn list_players(&self) -> io::Result<Vec<String>> {
        match self.run(&["--list-all"]).await {
            Ok(stdout) => Ok(stdout
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .map(str::to_string)
                .collect()),
            // playerctl exits non-zero when no players are registered
            Err(e) if e.kind() == io::ErrorKind::Other => Ok(Vec::new()),
            Err(e) => Err(e),
        }
    }

    async fn status(&self, player: &str) -> io::Result<PlaybackStatus> {
        let stdout = self.run(&["--player", player, "status"]).await?;
        PlaybackStatus::parse(&stdout).ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("unknown playback status {:?}", stdout.trim()),
            )
        })
    }

    async fn pause(&self, player: &str) -> io::Result<()> {
        self.run(&["--player", player, "pause"]).await.map(|_| ())
    }

    async fn play(&self, player: &str) -> io::Result<()> {
        self.run(&["--player", player, "play"]).await.map(|_| ())
    }
}

/// Remembers which players it paused so unlock only resumes those
pub struct MediaBusController {
    bus: Arc<dyn MediaBus>,
    paused: Vec<String>,
    span: Span,
}

impl MediaBusController {
    pub fn new(bus: Arc<dyn MediaBus>) -> Self {
        Self::with_span(bus, info_span!("media_bus"))
    }

    /// Create a controller that logs under `span`
    pub fn with_span(bus: Arc<dyn MediaBus>, span: Span) -> Self {
        Self {
            bus,
            paused: Vec::new(),
            span,
        }
    }

    /// Pause every player that is currently playing. Returns how many were paused.
    pub async fn pause_all(&mut self) -> usize {
        let players = match self.bus.list_players().await {
            Ok(players) => players,
            Err(e) => {
                debug!(parent: &self.span, "Media bus unavailable: {}", e);
                return 0;
            }
        };

        debug!(parent: &self.span, "Found {} media players", players.len());

        for player in players {
            match self.bus.status(&player).await {
                Ok(PlaybackStatus::Playing) => match self.bus.pause(&player).await {
                    Ok(()) => {
                        debug!(parent: &self.span, "Paused {}", player);
                        self.paused.push(player);
                    }
                    Err(e) => warn!(parent: &self.span, "Failed to pause {}: {}", player, e),
                },
                Ok(status) => {
                    debug!(parent: &self.span, "Player {} is {:?}, skipping pause", player, status)
                }
                Err(e) => {
                    debug!(parent: &self.span, "Failed to get playback status for {}: {}", player, e)
                }
            }
        }

        self.paused.len()
    }

    /// Resume the players paused by [`pause_all`](Self::pause_all) that are
    /// still paused. Returns how many were resumed.
    pub async fn resume_all(&mut self) -> usize {
        let mut resumed = 0;

        for player in std::mem::take(&mut self.paused) {
            match self.bus.status(&player).await {
                Ok(PlaybackStatus::Paused) => match self.bus.play(&player).await {
                    Ok(()) => {
                        debug!(parent: &self.span, "Resumed {}", player);
                        resumed += 1;
                    }
                    Err(e) => warn!(parent: &self.span, "Failed to resume {}: {}", player, e),
                },
                Ok(status) => {
                    debug!(parent: &self.span, "Player {} is {:?}, skipping resume", player, status)
                }
                Err(e) => {
                    debug!(parent: &self.span, "Player {} went away: {}", player, e)
                }
            }
        }

        resumed
    }

    /// Players paused and not yet resumed
    pub fn paused_players(&self) -> &[String] {
        &self.paused
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[derive(Default)]
    struct FakeBus {
        players: Mutex<HashMap<String, PlaybackStatus>>,
    }

    impl FakeBus {
        fn with(players: &[(&str, PlaybackStatus)]) -> Arc<Self> {
            let bus = Self::default();
            {
                let mut map = bus.players.lock().unwrap();
                for (name, status) in players {
                    map.insert(name.to_string(), *status);
                }
            }
            Arc::new(bus)
        }

        fn set(&self, player: &str, status: PlaybackStatus) {
            self.players.lock().unwrap().insert(player.to_string(), status);
        }

        fn get(&self, player: &str) -> PlaybackStatus {
            self.players.lock().unwrap()[player]
        }
    }

    #[async_trait]
    impl MediaBus for FakeBus {
        async fn list_players(&self) -> io::Result<Vec<String>> {
            let mut names: Vec<_> = self.players.lock().unwrap().keys().cloned().collect();
            names.sort();
            Ok(names)
        }

        async fn status(&self, player: &str) -> io::Result<PlaybackStatus> {
            self.players
                .lock()
                .unwrap()
                .get(player)
                .copied()
                .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "gone"))
        }

        async fn pause(&self, player: &str) -> io::Result<()> {
            self.set(player, PlaybackStatus::Paused);
            Ok(())
        }

        async fn play(&self, player: &str) -> io::Result<()> {
            self.set(player, PlaybackStatus::Playing);
            Ok(())
        }
    }

    #[test]
    fn test_parse_status() {
        assert_eq!(PlaybackStatus::parse("Playing\n"), Some(PlaybackStatus::Playing));
        assert_eq!(PlaybackStatus::parse("Paused"), Some(PlaybackStatus::Paused));
        assert_eq!(PlaybackStatus::parse("Stopped"), Some(PlaybackStatus::Stopped));
        assert_eq!(PlaybackStatus::parse("No players found"), None);
    }

    #[tokio::test]
    async fn test_only_playing_players_paused() {
        let bus = FakeBus::with(&[
            ("spotify", PlaybackStatus::Playing),
            ("vlc", PlaybackStatus::Paused),
            ("mpv", PlaybackStatus::Stopped),
        ]);
        let mut controller = MediaBusController::new(bus.clone());

        assert_eq!(controller.pause_all().await, 1);
        assert_eq!(controller.paused_players(), ["spotify".to_string()]);
        assert_eq!(bus.get("spotify"), PlaybackStatus::Paused);
        assert_eq!(bus.get("vlc"), PlaybackStatus::Paused);
    }

    #[tokio::test]
    async fn test_resume_only_what_was_paused() {
        let bus = FakeBus::with(&[
            ("spotify", PlaybackStatus::Playing),
            ("vlc", PlaybackStatus::Paused),
        ]);
        let mut controller = MediaBusController::new(bus.clone());
        controller.pause_all().await;

        assert_eq!(controller.resume_all().await, 1);
        assert_eq!(bus.get("spotify"), PlaybackStatus::Playing);
        assert_eq!(bus.get("vlc"), PlaybackStatus::Paused);
        assert!(controller.paused_players().is_empty());
    }

    #[tokio::test]
    async fn test_user_stopped_player_not_resumed() {
        let bus = FakeBus::with(&[("spotify", PlaybackStatus::Playing)]);
        let mut controller = MediaBusController::new(bus.clone());
        controller.pause_all().await;

        bus.set("spotify", PlaybackStatus::Stopped);
        assert_eq!(controller.resume_all().await, 0);
        assert_eq!(bus.get("spotify"), PlaybackStatus::Stopped);
    }

    #[tokio::test]
    async fn test_missing_playerctl_is_not_an_error() {
        let mut controller =
            MediaBusController::new(Arc::new(PlayerctlBus::new("/nonexistent/playerctl")));
        assert_eq!(controller.pause_all().await, 0);
        assert_eq!(controller.resume_all().await, 0);
    }
}
