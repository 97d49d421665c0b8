//! wstelnet - telnet terminal for the console
//!
//! Connects to a telnet peer over TCP, negotiates echo and terminal type,
//! and forwards keystrokes as VT100 sequences.
//!
//! # Quick Start
//!
//! ```text
//! wstelnet bbs.example.org          # Port 23
//! wstelnet bbs.example.org 2323     # Explicit port
//! wstelnet -t XTERM localhost 23    # Report a different terminal type
//! wstelnet telnet://localhost:2323  # URI form
//! wstelnet --save bbs.example.org   # Store as defaults in config.toml
//! ```
//!
//! Press `Ctrl+]` to close the connection.

use std::env;
use std::process;
use std::sync::mpsc::{self, Receiver};
use std::time::Duration;

use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use tracing::{debug, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use wstelnet::{
    Config, ConnectUri, ConnectionEvent, ConsoleRenderer, KeyDisposition, KeyPress, Session,
    TcpConnector,
};

type ConsoleSession = Session<TcpConnector, ConsoleRenderer>;

/// Version string from Cargo.toml
const VERSION: &str = env!("CARGO_PKG_VERSION");

fn print_version() {
    eprintln!("wstelnet {}", VERSION);
}

fn print_help() {
    eprintln!("wstelnet {} - telnet terminal", VERSION);
    eprintln!();
    eprintln!("Usage: wstelnet [OPTIONS] [HOST [PORT] | URI]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  -H, --host <HOST>     Remote host (default from config, else localhost)");
    eprintln!("  -p, --port <PORT>     Remote port (default from config, else 23)");
    eprintln!("  -e, --encrypt         Use the encrypted scheme (telnets://)");
    eprintln!("  -t, --term <TYPE>     Terminal type to report (default VT100)");
    eprintln!("  -s, --save            Save the resulting settings to the config and exit");
    eprintln!("  -v, --version         Show version");
    eprintln!("  -h, --help            Show this help");
    eprintln!();
    eprintln!("Press Ctrl+] to close the connection.");
    eprintln!();
    eprintln!("Configuration: ~/.wstelnet/config.toml");
    eprintln!("Log file:      ~/.wstelnet/wstelnet.log");
}

/// Parsed command line
struct Args {
    config: Config,
    save: bool,
}

/// Apply command line arguments on top of the loaded config
fn parse_args(mut config: Config) -> Result<Args, String> {
    let args: Vec<String> = env::args().collect();
    let mut positional = Vec::new();
    let mut save = false;
    let mut i = 1;

    let value = |i: usize, name: &str| -> Result<String, String> {
        args.get(i)
            .cloned()
            .ok_or_else(|| format!("Missing {} argument", name))
    };

    while i < args.len() {
        match args[i].as_str() {
            "-h" | "--help" => {
                print_help();
                process::exit(0);
            }
            "-v" | "--version" => {
                print_version();
                process::exit(0);
            }
            "-H" | "--host" => {
                i += 1;
                config.host = value(i, "host")?;
            }
            "-p" | "--port" => {
                i += 1;
                config.port = parse_port(&value(i, "port")?)?;
            }
            "-e" | "--encrypt" => {
                config.encrypt = true;
            }
            "-s" | "--save" => {
                save = true;
            }
            "-t" | "--term" => {
                i += 1;
                config.terminal_type = value(i, "terminal type")?;
            }
            arg if arg.starts_with('-') => {
                return Err(format!("Unknown argument: {}. Use -h for help.", arg));
            }
            arg => positional.push(arg.to_string()),
        }
        i += 1;
    }

    let mut positional = positional.into_iter();
    if let Some(target) = positional.next() {
        if target.contains("://") {
            let uri = ConnectUri::parse(&target).map_err(|e| e.to_string())?;
            config.host = uri.host;
            config.port = uri.port;
            config.encrypt = uri.secure;
        } else {
            config.host = target;
        }
    }
    if let Some(port) = positional.next() {
        config.port = parse_port(&port)?;
    }
    if let Some(extra) = positional.next() {
        return Err(format!("Unexpected argument: {}", extra));
    }

    Ok(Args { config, save })
}

fn parse_port(text: &str) -> Result<u16, String> {
    text.parse()
        .map_err(|_| format!("Invalid port: {}", text))
}

/// Log to a file; the console belongs to the remote session
fn init_logging(config: &Config) {
    let log_path = Config::config_dir()
        .map(|dir| dir.join("wstelnet.log"))
        .unwrap_or_else(|| std::path::PathBuf::from("wstelnet.log"));

    if let Some(parent) = log_path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }

    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .ok();

    if let Some(file) = log_file {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(&config.log_level));
        let subscriber = FmtSubscriber::builder()
            .with_env_filter(filter)
            .with_writer(std::sync::Mutex::new(file))
            .with_ansi(false)
            .finish();
        let _ = tracing::subscriber::set_global_default(subscriber);
    }
}

fn main() -> anyhow::Result<()> {
    let Args { config, save } = match parse_args(Config::load()) {
        Ok(args) => args,
        Err(e) => {
            eprintln!("Error: {}", e);
            eprintln!("Use --help for usage information");
            process::exit(1);
        }
    };

    if save {
        if let Err(e) = config.save() {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
        eprintln!("Saved defaults to ~/.wstelnet/config.toml");
        return Ok(());
    }

    init_logging(&config);
    info!("wstelnet starting...");

    let (tx, rx) = mpsc::channel();
    let mut session = Session::new(
        TcpConnector::new(tx),
        ConsoleRenderer::new(),
        &config.terminal_type,
    )
    .on_connect(|| info!("connect callback"))
    .on_disconnect(|| info!("disconnect callback"));

    if let Err(e) = session.connect(&config.host, config.port, config.encrypt) {
        eprintln!("Error: {}", e);
        process::exit(1);
    }

    let result = run_main_loop(&mut session, &rx);
    session.disconnect();
    eprintln!("\r\nConnection closed.");
    result
}

/// Ctrl+] leaves the session, as in classic telnet clients
fn is_escape_key(key_event: &KeyEvent) -> bool {
    key_event.code == KeyCode::Char(']') && key_event.modifiers.contains(KeyModifiers::CONTROL)
}

fn run_main_loop(
    session: &mut ConsoleSession,
    events: &Receiver<ConnectionEvent>,
) -> anyhow::Result<()> {
    let poll_timeout = Duration::from_millis(10);

    loop {
        // Transport events first so replies are not held behind input
        while let Ok(transport_event) = events.try_recv() {
            session.handle_event(transport_event);
        }

        if !session.is_connected() {
            info!("Session ended");
            break;
        }

        if !event::poll(poll_timeout)? {
            continue;
        }

        if let Event::Key(key_event) = event::read()? {
            if is_escape_key(&key_event) {
                info!("Escape key pressed, closing");
                break;
            }

            let press = KeyPress::from(&key_event);
            let disposition = match key_event.kind {
                KeyEventKind::Press | KeyEventKind::Repeat => session.key_press(&press),
                KeyEventKind::Release => session.key_release(press.key),
            };
            if disposition == KeyDisposition::Ignored {
                debug!("Key event before input capture: {:?}", key_event);
            }
        }
    }

    Ok(())
}
