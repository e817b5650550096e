//! End-to-end lock session tests
//!
//! These tests drive a complete session: a scripted display adapter, real
//! child processes standing in for the media player, shell hooks and a
//! counting authenticator.

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use fancylock_core::{
    AuthResult, Authenticator, DisplayAdapter, DisplayError, EventSender, KeyCode, KeyEvent,
    LockConfig, LockError, LockSessionController, LockoutConfig, MediaProcessSupervisor,
    MonitorGeometry, PlayerSettings, SessionEvent, SessionState,
};
use tempfile::TempDir;

/// Sessions are process-wide, so these tests run one at a time
static SERIAL: tokio::sync::Mutex<()> = tokio::sync::Mutex::const_new(());

// ============================================
// Test collaborators
// ============================================

#[derive(Default)]
struct DisplayLog {
    acquired: bool,
    released: usize,
    dots: Vec<usize>,
    lockouts: Vec<Duration>,
    denied: usize,
}

struct ScriptedDisplay {
    monitors: Vec<MonitorGeometry>,
    refuse: bool,
    log: Arc<Mutex<DisplayLog>>,
}

impl ScriptedDisplay {
    fn new(monitors: Vec<MonitorGeometry>) -> (Self, Arc<Mutex<DisplayLog>>) {
        let log = Arc::new(Mutex::new(DisplayLog::default()));
        (
            Self {
                monitors,
                refuse: false,
                log: log.clone(),
            },
            log,
        )
    }
}

impl DisplayAdapter for ScriptedDisplay {
    fn acquire(&mut self, _events: EventSender) -> Result<Vec<MonitorGeometry>, DisplayError> {
        if self.refuse {
            return Err(DisplayError::MissingResource("lock manager".to_string()));
        }
        self.log.lock().unwrap().acquired = true;
        Ok(self.monitors.clone())
    }

    fn release(&mut self) {
        self.log.lock().unwrap().released += 1;
    }

    fn render_password_dots(&mut self, count: usize) {
        self.log.lock().unwrap().dots.push(count);
    }

    fn render_lockout_message(&mut self, remaining: Duration) {
        self.log.lock().unwrap().lockouts.push(remaining);
    }

    fn render_denied(&mut self) {
        self.log.lock().unwrap().denied += 1;
    }

    fn clear_overlay(&mut self) {}
}

struct CountingAuth {
    password: &'static str,
    calls: AtomicUsize,
}

impl CountingAuth {
    fn new(password: &'static str) -> Arc<Self> {
        Arc::new(Self {
            password,
            calls: AtomicUsize::new(0),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Authenticator for CountingAuth {
    fn verify(&self, credential: &[u8]) -> AuthResult {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if credential == self.password.as_bytes() {
            AuthResult::success("ok")
        } else {
            AuthResult::failure("Authentication failure")
        }
    }
}

// ============================================
// Helpers
// ============================================

/// A stand-in player that records its pid, monitor and playlist, then sleeps
fn fake_player(dir: &Path) -> PathBuf {
    let path = dir.join("fake-mpv");
    let script = format!(
        r#"#!/bin/sh
for arg in "$@"; do
  case "$arg" in
    --playlist=*) playlist="${{arg#--playlist=}}" ;;
  esac
done
echo "$$ $playlist" > "{dir}/player-$FANCYLOCK_MONITOR_IDX"
exec sleep 60
"#,
        dir = dir.display()
    );
    fs::write(&path, script).unwrap();
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
    path
}

fn media_dir(files: &[&str]) -> TempDir {
    let dir = TempDir::new().unwrap();
    for file in files {
        fs::write(dir.path().join(file), b"").unwrap();
    }
    dir
}

fn base_config(media: &Path) -> LockConfig {
    LockConfig {
        media_dir: media.to_path_buf(),
        lockout: LockoutConfig {
            threshold: 3,
            base_secs: 1,
            max_secs: 5,
            debug_base_secs: 1,
        },
        ..LockConfig::default()
    }
}

fn supervisor(config: &LockConfig, player: &Path, sockets: &Path) -> MediaProcessSupervisor {
    let settings = PlayerSettings {
        program: player.display().to_string(),
        socket_dir: sockets.to_path_buf(),
        stop_grace: Duration::from_secs(2),
        ..PlayerSettings::default()
    };
    MediaProcessSupervisor::with_settings(config, settings)
}

fn send_text(sender: &EventSender, text: &str) {
    for c in text.chars() {
        sender
            .send(SessionEvent::Key(KeyEvent::press(KeyCode::Char(c))))
            .unwrap();
    }
}

async fn submit(sender: &EventSender, text: &str) {
    send_text(sender, text);
    sender
        .send(SessionEvent::Key(KeyEvent::press(KeyCode::Enter)))
        .unwrap();
    // Keys are ignored while a verification is in flight
    tokio::time::sleep(Duration::from_millis(150)).await;
}

async fn wait_for(path: &Path) -> String {
    for _ in 0..250 {
        if let Ok(contents) = fs::read_to_string(path) {
            if !contents.trim().is_empty() {
                return contents;
            }
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("timed out waiting for {:?}", path);
}

fn process_alive(pid: &str) -> bool {
    Path::new("/proc").join(pid.trim()).exists()
}

// ============================================
// Sessions
// ============================================

/// Full session: two monitors with players, three failures, a refused
/// attempt during the lockout, then a successful unlock that tears
/// everything down
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_full_lock_session() {
    let _serial = SERIAL.lock().await;

    // ==========================================
    // STEP 1: Media, fake player and hooks
    // ==========================================
    let media = media_dir(&["a.mp4", "b.mkv", "c.webm"]);
    let work = TempDir::new().unwrap();
    let player = fake_player(work.path());
    let pre_marker = work.path().join("pre-lock");
    let post_marker = work.path().join("post-lock");

    let config = LockConfig {
        pre_lock_command: format!("touch {}", pre_marker.display()),
        post_lock_command: format!("touch {}", post_marker.display()),
        ..base_config(media.path())
    };

    let monitors = vec![
        MonitorGeometry::new(0, 0, 1920, 1080),
        MonitorGeometry::new(1920, 0, 2560, 1440),
    ];
    let (display, log) = ScriptedDisplay::new(monitors);
    let auth = CountingAuth::new("correct horse");

    let media_supervisor = supervisor(&config, &player, work.path());
    let mut controller = LockSessionController::new(config, Box::new(display), auth.clone())
        .with_media(media_supervisor)
        .with_tick_interval(Duration::from_millis(50));
    let sender = controller.event_sender();

    // ==========================================
    // STEP 2: Lock
    // ==========================================
    let session = tokio::spawn(async move {
        let result = controller.lock().await;
        (controller, result)
    });

    let first = wait_for(&work.path().join("player-0")).await;
    let second = wait_for(&work.path().join("player-1")).await;
    assert!(pre_marker.exists());
    assert!(log.lock().unwrap().acquired);

    let (pid0, playlist0) = first.trim().split_once(' ').unwrap();
    let (pid1, playlist1) = second.trim().split_once(' ').unwrap();
    assert!(process_alive(pid0));
    assert!(process_alive(pid1));
    assert!(Path::new(playlist0).exists());
    assert!(Path::new(playlist1).exists());

    // ==========================================
    // STEP 3: Three failures trigger a lockout
    // ==========================================
    for _ in 0..3 {
        submit(&sender, "wrong").await;
    }
    assert_eq!(auth.calls(), 3);
    assert_eq!(log.lock().unwrap().lockouts.first(), Some(&Duration::from_secs(1)));

    // ==========================================
    // STEP 4: The right password is refused during the lockout
    // ==========================================
    submit(&sender, "correct horse").await;
    assert_eq!(auth.calls(), 3);

    // ==========================================
    // STEP 5: Unlock after the lockout expires
    // ==========================================
    tokio::time::sleep(Duration::from_millis(1100)).await;
    submit(&sender, "correct horse").await;

    let (controller, result) = tokio::time::timeout(Duration::from_secs(10), session)
        .await
        .unwrap()
        .unwrap();
    result.unwrap();

    // ==========================================
    // STEP 6: Everything was torn down
    // ==========================================
    assert_eq!(controller.state(), SessionState::Unlocked);
    assert_eq!(controller.credential_len(), 0);
    assert_eq!(controller.failed_attempts(), 0);
    assert_eq!(auth.calls(), 4);
    assert_eq!(controller.media().map(|m| m.running()), Some(0));
    assert!(post_marker.exists());

    let log = log.lock().unwrap();
    assert_eq!(log.released, 1);
    assert!(log.denied >= 4);
    assert!(log.dots.iter().all(|dots| *dots <= 20));

    assert!(!Path::new(playlist0).exists());
    assert!(!Path::new(playlist1).exists());
    assert!(!process_alive(pid0));
    assert!(!process_alive(pid1));
}

/// Debug exit works during a lockout and still runs teardown
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_debug_exit_during_lockout() {
    let _serial = SERIAL.lock().await;

    let media = media_dir(&[]);
    let work = TempDir::new().unwrap();
    let post_marker = work.path().join("post-lock");
    let config = LockConfig {
        debug_exit: true,
        post_lock_command: format!("touch {}", post_marker.display()),
        ..base_config(media.path())
    };

    let (display, log) = ScriptedDisplay::new(vec![]);
    let auth = CountingAuth::new("pw");
    let mut controller = LockSessionController::new(config, Box::new(display), auth.clone());
    let sender = controller.event_sender();

    let session = tokio::spawn(async move {
        let result = controller.lock().await;
        (controller, result)
    });

    // Typed passwords avoid the debug exit keys
    for _ in 0..3 {
        submit(&sender, "nope").await;
    }
    sender
        .send(SessionEvent::Key(KeyEvent::press(KeyCode::Escape)))
        .unwrap();

    let (controller, result) = tokio::time::timeout(Duration::from_secs(10), session)
        .await
        .unwrap()
        .unwrap();
    result.unwrap();

    assert!(controller.exit_requested());
    assert_eq!(controller.state(), SessionState::Unlocked);
    assert_eq!(auth.calls(), 3);
    assert_eq!(log.lock().unwrap().released, 1);
    assert!(post_marker.exists());
}

/// Without media the session still locks and unlocks
#[tokio::test]
async fn test_lock_without_media() {
    let _serial = SERIAL.lock().await;

    let media = media_dir(&["notes.txt"]);
    let config = base_config(media.path());
    let (display, _log) = ScriptedDisplay::new(vec![MonitorGeometry::default()]);
    let auth = CountingAuth::new("pw");
    let mut controller = LockSessionController::new(config, Box::new(display), auth.clone());
    let sender = controller.event_sender();

    send_text(&sender, "pw");
    sender
        .send(SessionEvent::Key(KeyEvent::press(KeyCode::Enter)))
        .unwrap();

    tokio::time::timeout(Duration::from_secs(5), controller.lock())
        .await
        .unwrap()
        .unwrap();

    assert_eq!(controller.state(), SessionState::Unlocked);
    assert_eq!(controller.media().map(|m| m.running()), Some(0));
    assert_eq!(auth.calls(), 1);
}

/// A refused grab aborts before anything is marked locked
#[tokio::test]
async fn test_input_capture_failure() {
    let _serial = SERIAL.lock().await;

    let media = media_dir(&["a.mp4"]);
    let work = TempDir::new().unwrap();
    let player = fake_player(work.path());
    let config = base_config(media.path());

    let (mut display, log) = ScriptedDisplay::new(vec![MonitorGeometry::default()]);
    display.refuse = true;
    let media_supervisor = supervisor(&config, &player, work.path());
    let mut controller =
        LockSessionController::new(config, Box::new(display), CountingAuth::new("pw"))
            .with_media(media_supervisor);

    let result = controller.lock().await;

    assert!(matches!(result, Err(LockError::InputCapture(_))));
    assert_eq!(controller.state(), SessionState::Unlocked);
    assert_eq!(controller.media().map(|m| m.running()), Some(0));
    assert!(!work.path().join("player-0").exists());
    assert_eq!(log.lock().unwrap().released, 0);
}
