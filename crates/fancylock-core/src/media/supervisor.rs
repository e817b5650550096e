//! One media player process per monitor, each with a watcher task
//!
//! The process table and the now-playing map are the only state shared with
//! the watchers. Both sit behind a mutex that is never held across an await
//! or any I/O.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tempfile::NamedTempFile;
use tokio::process::{Child, Command};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, info_span, warn, Span};

use super::{assign_playlists, ipc, scan_media, MediaFile};
use crate::config::LockConfig;
use crate::display::MonitorGeometry;
use crate::error::MediaError;

/// Environment variable telling the player which monitor it covers
pub const MONITOR_INDEX_ENV: &str = "FANCYLOCK_MONITOR_IDX";

/// How player processes are launched and watched
#[derive(Debug, Clone)]
pub struct PlayerSettings {
    /// Player executable
    pub program: String,
    /// Seconds each still image is shown
    pub image_display_time: u64,
    /// Directory holding the per-monitor IPC sockets
    pub socket_dir: PathBuf,
    /// Delay before the first status poll
    pub startup_delay: Duration,
    /// Interval between status polls
    pub poll_interval: Duration,
    /// Deadline for one IPC query
    pub ipc_timeout: Duration,
    /// How long `stop` waits for each process after killing it
    pub stop_grace: Duration,
}

impl Default for PlayerSettings {
    fn default() -> Self {
        Self {
            program: "mpv".to_string(),
            image_display_time: 30,
            socket_dir: default_socket_dir(),
            startup_delay: Duration::from_millis(500),
            poll_interval: Duration::from_secs(1),
            ipc_timeout: Duration::from_millis(100),
            stop_grace: Duration::from_millis(100),
        }
    }
}

impl PlayerSettings {
    pub fn from_config(config: &LockConfig) -> Self {
        Self {
            program: config.media_player_cmd.clone(),
            image_display_time: config.image_display_time,
            ..Self::default()
        }
    }

    /// IPC socket for one monitor
    pub fn socket_path(&self, monitor: usize) -> PathBuf {
        self.socket_dir
            .join(format!("fancylock-mpv-socket-{}", monitor))
    }

    /// Player arguments for one monitor
    pub fn player_args(
        &self,
        monitor: usize,
        geometry: &MonitorGeometry,
        playlist: &Path,
        socket: &Path,
    ) -> Vec<String> {
        vec![
            "--no-input-default-bindings".to_string(),
            "--really-quiet".to_string(),
            "--no-stop-screensaver".to_string(),
            "--no-osc".to_string(),
            "--osd-level=0".to_string(),
            "--no-terminal".to_string(),
            "--loop-playlist=inf".to_string(),
            "--no-border".to_string(),
            "--ontop".to_string(),
            "--fullscreen=yes".to_string(),
            format!("--fs-screen={}", monitor),
            "--no-keepaspect".to_string(),
            "--no-keepaspect-window".to_string(),
            "--panscan=1.0".to_string(),
            "--hwdec=auto".to_string(),
            format!("--geometry={}", geometry),
            format!("--autofit={}x{}", geometry.width, geometry.height),
            "--force-window=yes".to_string(),
            format!("--image-display-duration={}", self.image_display_time),
            format!("--playlist={}", playlist.display()),
            format!("--input-ipc-server={}", socket.display()),
        ]
    }
}

/// `$XDG_RUNTIME_DIR`, falling back to `/tmp`
fn default_socket_dir() -> PathBuf {
    std::env::var_os("XDG_RUNTIME_DIR")
        .filter(|dir| !dir.is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("/tmp"))
}

/// Launch counter, distinguishes a monitor's current player from a stale one
static NEXT_LAUNCH_ID: AtomicU64 = AtomicU64::new(1);

/// A tracked player
struct PlayerHandle {
    launch_id: u64,
    pid: Option<u32>,
    kill: Option<oneshot::Sender<()>>,
    watcher: JoinHandle<()>,
}

type ProcessTable = Arc<Mutex<HashMap<usize, PlayerHandle>>>;
type NowPlaying = Arc<Mutex<HashMap<usize, PathBuf>>>;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Supervises background media players for a lock session
pub struct MediaProcessSupervisor {
    media_dir: PathBuf,
    extensions: Vec<String>,
    include_images: bool,
    settings: PlayerSettings,
    media: Vec<MediaFile>,
    processes: ProcessTable,
    now_playing: NowPlaying,
    /// What each monitor showed when the last session stopped
    last_played: HashMap<usize, PathBuf>,
    span: Span,
}

impl MediaProcessSupervisor {
    pub fn new(config: &LockConfig) -> Self {
        Self::with_settings(config, PlayerSettings::from_config(config))
    }

    pub fn with_settings(config: &LockConfig, settings: PlayerSettings) -> Self {
        Self {
            media_dir: config.media_dir.clone(),
            extensions: config.supported_extensions.clone(),
            include_images: config.include_images,
            settings,
            media: Vec::new(),
            processes: Arc::new(Mutex::new(HashMap::new())),
            now_playing: Arc::new(Mutex::new(HashMap::new())),
            last_played: HashMap::new(),
            span: info_span!("media"),
        }
    }

    /// Log under `span` instead of the default
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    /// Scan the media directory and launch one player per monitor.
    ///
    /// Fails with `NoMediaFound` (and launches nothing) when the directory
    /// holds no playable file. A monitor whose player cannot be started
    /// stays dark; the others are unaffected. Returns the number of players
    /// launched. Calling `start` while players are running is a no-op.
    pub fn start(&mut self, monitors: &[MonitorGeometry]) -> Result<usize, MediaError> {
        let running = lock(&self.processes).len();
        if running > 0 {
            debug!(parent: &self.span, "Media already running on {} monitors", running);
            return Ok(running);
        }

        let default_monitor = [MonitorGeometry::default()];
        let monitors = if monitors.is_empty() {
            &default_monitor[..]
        } else {
            monitors
        };

        self.rescan()?;
        if self.media.is_empty() {
            return Err(MediaError::NoMediaFound(self.media_dir.clone()));
        }

        let mut playing = self.last_played.clone();
        playing.extend(lock(&self.now_playing).iter().map(|(k, v)| (*k, v.clone())));

        let playlists = assign_playlists(
            &self.media,
            monitors.len(),
            &playing,
            &mut rand::thread_rng(),
        );

        let mut launched = 0;
        for (index, (geometry, playlist)) in monitors.iter().zip(playlists).enumerate() {
            match self.launch(index, geometry, &playlist) {
                Ok(()) => launched += 1,
                Err(e) => error!(parent: &self.span, "{}", e),
            }
        }

        info!(
            parent: &self.span,
            "Started media on {} of {} monitors ({} files)",
            launched,
            monitors.len(),
            self.media.len()
        );
        Ok(launched)
    }

    fn launch(
        &self,
        monitor: usize,
        geometry: &MonitorGeometry,
        playlist: &[MediaFile],
    ) -> Result<(), MediaError> {
        let playlist_file = write_playlist(monitor, playlist)
            .map_err(|source| MediaError::Playlist { monitor, source })?;

        let socket = self.settings.socket_path(monitor);
        let _ = std::fs::remove_file(&socket);

        let args = self
            .settings
            .player_args(monitor, geometry, playlist_file.path(), &socket);

        let mut command = Command::new(&self.settings.program);
        command
            .args(&args)
            .env(MONITOR_INDEX_ENV, monitor.to_string())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true);
        #[cfg(unix)]
        command.process_group(0);

        let child = command
            .spawn()
            .map_err(|source| MediaError::Spawn { monitor, source })?;

        let pid = child.id();
        let launch_id = NEXT_LAUNCH_ID.fetch_add(1, Ordering::Relaxed);
        let (kill_tx, kill_rx) = oneshot::channel();

        // Held until the handle is inserted so a player that exits at once
        // cannot be reaped before it is tracked
        let mut table = lock(&self.processes);
        let watcher = tokio::spawn(watch_player(Watch {
            monitor,
            launch_id,
            child,
            playlist: playlist_file,
            socket,
            kill: kill_rx,
            processes: Arc::clone(&self.processes),
            now_playing: Arc::clone(&self.now_playing),
            settings: self.settings.clone(),
            span: self.span.clone(),
        }));

        table.insert(
            monitor,
            PlayerHandle {
                launch_id,
                pid,
                kill: Some(kill_tx),
                watcher,
            },
        );
        drop(table);

        debug!(
            parent: &self.span,
            "Started player on monitor {} (pid {:?}, {} files, {})",
            monitor,
            pid,
            playlist.len(),
            geometry
        );
        Ok(())
    }

    /// Kill every player and empty the process table.
    ///
    /// Waits at most the grace period per process; failures are logged.
    /// A second call is a no-op. Returns the number of players stopped.
    pub async fn stop(&mut self) -> usize {
        let handles: Vec<(usize, PlayerHandle)> = lock(&self.processes).drain().collect();
        if handles.is_empty() {
            return 0;
        }

        self.last_played = lock(&self.now_playing).clone();

        let mut handles: Vec<_> = handles
            .into_iter()
            .map(|(monitor, mut handle)| {
                if let Some(kill) = handle.kill.take() {
                    // Err means the watcher already finished
                    let _ = kill.send(());
                }
                (monitor, handle)
            })
            .collect();

        let count = handles.len();
        for (monitor, handle) in handles.iter_mut() {
            match tokio::time::timeout(self.settings.stop_grace, &mut handle.watcher).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!(parent: &self.span, "Watcher for monitor {} failed: {}", monitor, e),
                Err(_) => {
                    warn!(
                        parent: &self.span,
                        "Player on monitor {} (pid {:?}) did not exit within {:?}",
                        monitor,
                        handle.pid,
                        self.settings.stop_grace
                    );
                    // Dropping the child inside the aborted task kills it again
                    handle.watcher.abort();
                    let _ = std::fs::remove_file(self.settings.socket_path(*monitor));
                    lock(&self.now_playing).remove(monitor);
                }
            }
        }

        info!(parent: &self.span, "Stopped {} media players", count);
        count
    }

    /// Re-read the media directory. Returns the number of files found.
    pub fn rescan(&mut self) -> Result<usize, MediaError> {
        self.media = scan_media(&self.media_dir, &self.extensions, self.include_images, &self.span)?;
        Ok(self.media.len())
    }

    /// Files found by the last scan
    pub fn media_count(&self) -> usize {
        self.media.len()
    }

    /// Number of tracked player processes
    pub fn running(&self) -> usize {
        lock(&self.processes).len()
    }

    /// Monitors with a tracked player, ascending
    pub fn running_monitors(&self) -> Vec<usize> {
        let mut monitors: Vec<usize> = lock(&self.processes).keys().copied().collect();
        monitors.sort_unstable();
        monitors
    }

    /// File the player on `monitor` last reported
    pub fn now_playing(&self, monitor: usize) -> Option<PathBuf> {
        lock(&self.now_playing).get(&monitor).cloned()
    }

    pub fn settings(&self) -> &PlayerSettings {
        &self.settings
    }
}

impl Drop for MediaProcessSupervisor {
    fn drop(&mut self) {
        // Watchers kill their players; children are also kill_on_drop
        for (_, mut handle) in lock(&self.processes).drain() {
            if let Some(kill) = handle.kill.take() {
                let _ = kill.send(());
            }
        }
    }
}

fn write_playlist(monitor: usize, playlist: &[MediaFile]) -> std::io::Result<NamedTempFile> {
    use std::io::Write;

    let mut file = tempfile::Builder::new()
        .prefix(&format!("fancylock-playlist-{}-", monitor))
        .suffix(".txt")
        .tempfile()?;

    for media in playlist {
        writeln!(file, "{}", media.path.display())?;
    }
    file.flush()?;
    Ok(file)
}

struct Watch {
    monitor: usize,
    launch_id: u64,
    child: Child,
    playlist: NamedTempFile,
    socket: PathBuf,
    kill: oneshot::Receiver<()>,
    processes: ProcessTable,
    now_playing: NowPlaying,
    settings: PlayerSettings,
    span: Span,
}

/// Poll the player for its current file until it exits or is killed, then
/// clean up its playlist, socket and bookkeeping.
async fn watch_player(watch: Watch) {
    let Watch {
        monitor,
        launch_id,
        mut child,
        playlist,
        socket,
        mut kill,
        processes,
        now_playing,
        settings,
        span,
    } = watch;

    let first_poll = tokio::time::Instant::now() + settings.startup_delay;
    let mut poll = tokio::time::interval_at(first_poll, settings.poll_interval);
    poll.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            status = child.wait() => {
                match status {
                    Ok(status) if status.success() => {
                        debug!(parent: &span, "Player on monitor {} exited", monitor)
                    }
                    Ok(status) => {
                        error!(parent: &span, "Player on monitor {} exited with {}", monitor, status)
                    }
                    Err(e) => error!(parent: &span, "Failed to wait for player on monitor {}: {}", monitor, e),
                }
                break;
            }
            _ = &mut kill => {
                if let Err(e) = child.kill().await {
                    warn!(parent: &span, "Failed to kill player on monitor {}: {}", monitor, e);
                }
                break;
            }
            _ = poll.tick() => {
                if let Some(path) = ipc::query_current_path(&socket, settings.ipc_timeout).await {
                    lock(&now_playing).insert(monitor, path);
                }
            }
        }
    }

    if let Err(e) = playlist.close() {
        debug!(parent: &span, "Failed to remove playlist for monitor {}: {}", monitor, e);
    }
    let _ = std::fs::remove_file(&socket);

    // A newer launch may already own this monitor
    let stale = {
        let mut table = lock(&processes);
        match table.get(&monitor) {
            Some(handle) if handle.launch_id == launch_id => {
                table.remove(&monitor);
                false
            }
            Some(_) => true,
            None => false,
        }
    };
    if !stale {
        lock(&now_playing).remove(&monitor);
    }

    debug!(parent: &span, "Cleaned up player for monitor {}", monitor);
}
