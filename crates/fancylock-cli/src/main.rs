//! fancylock - a screen locker that plays media while locked
//!
//! The binary wires the session engine from `fancylock-core` to a terminal
//! display, the Argon2 hash authenticator and an instance lock file.

use std::io::{self, IsTerminal, Read, Write};
use std::panic;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use crossterm::event::{self, Event, KeyCode, KeyEventKind, KeyModifiers};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use fancylock_core::{hash_password, HashAuthenticator, LockConfig, LockSessionController};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use zeroize::Zeroizing;

mod instance;
mod screens;
mod terminal;
mod theme;

use instance::InstanceLock;
use terminal::TerminalDisplay;

#[derive(Parser)]
#[command(name = "fancylock")]
#[command(about = "A media-playing screen locker", long_about = None)]
#[command(version)]
struct Cli {
    /// Enable debug logging (to stderr)
    #[arg(long, global = true)]
    log: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Lock the screen now
    Lock {
        /// Path to configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Allow Esc or Q to end the session (for debugging)
        #[arg(long)]
        debug_exit: bool,
    },

    /// Read a password and print its Argon2 hash for `password_hash`
    HashPassword,

    /// Configuration commands
    #[command(subcommand)]
    Config(ConfigCommands),
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Write the default configuration file if none exists
    Init,

    /// Print the effective configuration
    Show {
        /// Path to configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Restore the terminal before the default hook prints anything
    let original_hook = panic::take_hook();
    panic::set_hook(Box::new(move |panic_info| {
        terminal::restore_terminal();
        original_hook(panic_info);
    }));

    let cli = Cli::parse();
    init_logging(cli.log)?;

    match cli.command {
        Commands::Lock { config, debug_exit } => lock(config, debug_exit).await,
        Commands::HashPassword => print_hash(),
        Commands::Config(ConfigCommands::Init) => config_init(),
        Commands::Config(ConfigCommands::Show { config }) => config_show(config),
    }
}

fn init_logging(debug: bool) -> Result<()> {
    let default = if debug {
        "fancylock=debug,fancylock_core=debug"
    } else {
        "fancylock=warn,fancylock_core=warn"
    };
    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(default))?;

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(debug).with_writer(io::stderr))
        .with(filter)
        .init();
    Ok(())
}

fn load_config(path: Option<PathBuf>) -> LockConfig {
    match path {
        Some(path) => LockConfig::load_from(&path).unwrap_or_else(|e| {
            tracing::warn!("Error loading config {:?}: {}; using defaults", path, e);
            LockConfig::default()
        }),
        None => LockConfig::load(),
    }
}

async fn lock(config: Option<PathBuf>, debug_exit: bool) -> Result<()> {
    let mut config = load_config(config);
    config.debug_exit |= debug_exit;

    let hash = config.password_hash.clone().unwrap_or_default();
    let authenticator = HashAuthenticator::new(config.auth_service.clone(), hash)
        .context("No usable password_hash in the config; create one with `fancylock hash-password`")?;

    let instance = InstanceLock::acquire(&InstanceLock::default_path())?;

    let span = tracing::info_span!("fancylock", pid = std::process::id());
    let mut controller = LockSessionController::new(
        config,
        Box::new(TerminalDisplay::new()),
        Arc::new(authenticator),
    )
    .with_span(span);

    controller.lock().await.context("Failed to lock screen")?;

    if controller.exit_requested() {
        tracing::warn!("Session ended through debug exit");
    }
    drop(instance);
    Ok(())
}

fn print_hash() -> Result<()> {
    let password = if io::stdin().is_terminal() {
        read_password_tty()?
    } else {
        let mut input = Zeroizing::new(String::new());
        io::stdin()
            .read_to_string(&mut input)
            .context("Failed to read password from stdin")?;
        Zeroizing::new(input.trim_end_matches(['\r', '\n']).to_string())
    };

    if password.is_empty() {
        bail!("Refusing to hash an empty password");
    }

    let hash = hash_password(password.as_bytes())?;
    println!("{}", hash);
    Ok(())
}

/// Prompt on the terminal without echo
fn read_password_tty() -> Result<Zeroizing<String>> {
    eprint!("Password: ");
    io::stderr().flush()?;

    enable_raw_mode()?;
    let result = read_hidden_line();
    disable_raw_mode()?;
    eprintln!();
    result
}

fn read_hidden_line() -> Result<Zeroizing<String>> {
    let mut password = Zeroizing::new(String::new());
    loop {
        let Event::Key(key) = event::read()? else {
            continue;
        };
        if key.kind == KeyEventKind::Release {
            continue;
        }
        match key.code {
            KeyCode::Enter => return Ok(password),
            KeyCode::Backspace => {
                password.pop();
            }
            KeyCode::Esc => bail!("Cancelled"),
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                bail!("Cancelled")
            }
            KeyCode::Char(c) => password.push(c),
            _ => {}
        }
    }
}

fn config_init() -> Result<()> {
    let (path, created) = LockConfig::generate_default().context("Failed to write default config")?;
    if created {
        println!("Wrote default configuration to {}", path.display());
    } else {
        println!("Configuration already exists at {}", path.display());
    }
    Ok(())
}

fn config_show(path: Option<PathBuf>) -> Result<()> {
    let config = load_config(path);
    println!("{}", serde_json::to_string_pretty(&config)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_lock() {
        let cli = Cli::parse_from(["fancylock", "lock", "-c", "/tmp/x.json", "--debug-exit", "--log"]);
        assert!(cli.log);
        match cli.command {
            Commands::Lock { config, debug_exit } => {
                assert_eq!(config, Some(PathBuf::from("/tmp/x.json")));
                assert!(debug_exit);
            }
            _ => panic!("expected lock"),
        }
    }

    #[test]
    fn test_missing_config_falls_back() {
        let dir = tempfile::TempDir::new().unwrap();
        let config = load_config(Some(dir.path().join("absent.json")));
        assert!(!config.debug_exit);
        assert_eq!(config.max_password_dots, LockConfig::default().max_password_dots);
    }
}
