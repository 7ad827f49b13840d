use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::time::Duration;

use aliboard::hooks::{NoopHooks, NoopSignals};
use aliboard::session::{EVENT_CLOSE, EVENT_OPEN};
use aliboard::{CallbackResult, ConnectionState, GridState, RealtimeConfig, RealtimeHandle, Session};
use clap::{Args, Parser, Subcommand};
use serde_json::{Map, Value, json};
use tokio::io::AsyncBufReadExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod input;
mod output;

use input::{HELP, InputCommand, InputError, parse_command, parse_jsonl_element_line};
use output::{PrintHooks, emit};

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("realtime disabled: no room id; pass --room or set ALIBOARD_ROOM_ID")]
    Disabled,
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("invalid JSON payload: {0}")]
    InvalidJson(#[from] serde_json::Error),
    #[error("invalid input: {0}")]
    Input(#[from] InputError),
    #[error("realtime session stopped")]
    Stopped,
    #[error("timed out waiting for {0}")]
    Timeout(&'static str),
    #[error("session task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

#[derive(Parser, Debug)]
#[command(name = "aliboard-cli", about = "Aliboard realtime room client")]
struct Cli {
    /// Board server base URL (`http(s)://host[:port]`).
    #[arg(long, env = "ALIBOARD_BASE_URL")]
    base_url: Option<String>,

    #[arg(long, env = "ALIBOARD_ROOM_ID")]
    room: Option<String>,

    /// Page URL whose `room_id`/`room` query parameter names the room.
    #[arg(long)]
    page_url: Option<String>,

    #[arg(long)]
    client_id: Option<String>,

    #[arg(long)]
    user_id: Option<String>,

    #[arg(long)]
    role: Option<String>,

    /// Cursor label.
    #[arg(long)]
    label: Option<String>,

    /// Cursor color.
    #[arg(long)]
    color: Option<String>,

    /// Apply and send grid state.
    #[arg(long, default_value_t = false)]
    grid_sync: bool,

    #[command(subcommand)]
    command: Command,
}

impl Cli {
    /// Environment configuration with command-line overrides on top.
    fn config(&self) -> RealtimeConfig {
        let mut config = RealtimeConfig::from_env();
        if let Some(base_url) = &self.base_url {
            config.base_url.clone_from(base_url);
        }
        if self.room.is_some() {
            config.room.explicit.clone_from(&self.room);
        }
        if self.page_url.is_some() {
            config.room.page_url.clone_from(&self.page_url);
        }
        if self.client_id.is_some() {
            config.client_id.clone_from(&self.client_id);
        }
        if self.user_id.is_some() {
            config.user.user_id.clone_from(&self.user_id);
        }
        if let Some(role) = &self.role {
            config.user.role.clone_from(role);
        }
        if let Some(label) = &self.label {
            config.user.label.clone_from(label);
        }
        if let Some(color) = &self.color {
            config.user.color.clone_from(color);
        }
        config.grid_sync |= self.grid_sync;
        config
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Join a room, print remote activity, and read commands from stdin.
    Join,
    /// Broadcast elements read from a JSONL file.
    Stream(StreamArgs),
    /// Print the room snapshot and exit.
    Snapshot {
        #[arg(long, default_value_t = 10)]
        timeout_secs: u64,
    },
}

#[derive(Args, Debug)]
struct StreamArgs {
    #[arg(long, default_value = "-", help = "Input file path, or - for stdin")]
    input: String,

    #[arg(long, help = "Stop after this many elements")]
    max_elements: Option<usize>,

    #[arg(long, default_value_t = 1000)]
    progress_every: usize,

    #[arg(long, default_value_t = 30)]
    timeout_secs: u64,
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    let config = cli.config();

    match cli.command {
        Command::Join => run_join(&config).await,
        Command::Stream(args) => run_stream(&config, args).await,
        Command::Snapshot { timeout_secs } => run_snapshot(&config, Duration::from_secs(timeout_secs)).await,
    }
}

async fn run_join(config: &RealtimeConfig) -> Result<(), CliError> {
    let (handle, task) = aliboard::start(config, PrintHooks, PrintHooks).ok_or(CliError::Disabled)?;
    handle.with(|session| {
        for event in [EVENT_OPEN, EVENT_CLOSE] {
            session.on(event, move |payload: &Value| -> CallbackResult {
                emit(event, payload);
                Ok(())
            });
        }
        session.send_presence("online");
    });
    info!("type `help` for commands");

    let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        match parse_command(&line) {
            Ok(None) => {}
            Ok(Some(InputCommand::Quit)) => break,
            Ok(Some(command)) => execute(&handle, command).await?,
            Err(error) => eprintln!("{error}"),
        }
    }

    leave(&handle, task).await
}

async fn execute(handle: &RealtimeHandle, command: InputCommand) -> Result<(), CliError> {
    let accepted = match command {
        InputCommand::Chat(text) => handle.with(move |session| {
            session.send_chat_message(&text);
        }),
        InputCommand::Cursor { x, y } => {
            let mut fields = Map::new();
            fields.insert("x".to_owned(), json!(x));
            fields.insert("y".to_owned(), json!(y));
            handle.send_cursor(fields)
        }
        InputCommand::Add(element) => handle.with(move |session| {
            session.broadcast_element_add(element);
        }),
        InputCommand::Update(element) => handle.with(move |session| {
            session.broadcast_element_update(element);
        }),
        InputCommand::Remove(id) => handle.with(move |session| {
            session.broadcast_element_remove(&id);
        }),
        InputCommand::Patch(patch) => handle.with(move |session| {
            session.send_patch(patch);
        }),
        InputCommand::Stroke(stroke) => handle.with(move |session| {
            session.send_stroke(stroke);
        }),
        InputCommand::Ring(to_id) => handle.with(move |session| session.voice_ring(to_id.as_deref())),
        InputCommand::End(to_id) => handle.with(move |session| session.voice_end(to_id.as_deref())),
        InputCommand::Presence(status) => handle.with(move |session| {
            session.send_presence(&status);
        }),
        InputCommand::Grid { size, kind } => handle.with(move |session| {
            if !session.send_grid_state(GridState { grid_size: size, kind }) {
                warn!("grid sync is disabled; pass --grid-sync");
            }
        }),
        InputCommand::Snapshot => handle.with(|session| {
            session.request_snapshot();
        }),
        InputCommand::Publish => handle.with(|session| {
            session.publish_state();
        }),
        InputCommand::Elements => {
            let elements = handle
                .query(|session| session.store().get_elements_array())
                .await
                .ok_or(CliError::Stopped)?;
            for element in elements {
                emit("element", &element.to_value());
            }
            true
        }
        InputCommand::Log => {
            let log = handle
                .query(|session| session.patch_log().to_vec())
                .await
                .ok_or(CliError::Stopped)?;
            emit("patch_log", &Value::Array(log));
            true
        }
        InputCommand::Help => {
            println!("{HELP}");
            true
        }
        InputCommand::Quit => true,
    };

    if accepted { Ok(()) } else { Err(CliError::Stopped) }
}

async fn run_stream(config: &RealtimeConfig, args: StreamArgs) -> Result<(), CliError> {
    let reader: Box<dyn BufRead> = if args.input == "-" {
        Box::new(BufReader::new(io::stdin()))
    } else {
        Box::new(BufReader::new(File::open(&args.input)?))
    };
    let (handle, task) = aliboard::start(config, NoopHooks, NoopSignals).ok_or(CliError::Disabled)?;

    let progress_every = args.progress_every.max(1);
    let mut sent = 0_usize;
    for line in reader.lines() {
        let line = line?;
        let Some(element) = parse_jsonl_element_line(&line)? else {
            continue;
        };
        let accepted = handle.with(move |session| {
            session.broadcast_element_add(element);
        });
        if !accepted {
            return Err(CliError::Stopped);
        }
        sent += 1;
        if sent % progress_every == 0 {
            info!(sent, "streaming elements");
        }
        if args.max_elements.is_some_and(|max| sent >= max) {
            break;
        }
    }

    wait_until_flushed(&handle, Duration::from_secs(args.timeout_secs)).await?;
    info!(sent, "elements broadcast");
    leave(&handle, task).await
}

async fn run_snapshot(config: &RealtimeConfig, wait: Duration) -> Result<(), CliError> {
    let (handle, task) = aliboard::start(config, NoopHooks, NoopSignals).ok_or(CliError::Disabled)?;
    let (tx, mut rx) = mpsc::unbounded_channel::<Value>();
    handle.with(move |session| {
        session.on("snapshot", move |payload: &Value| -> CallbackResult {
            tx.send(payload.clone())?;
            Ok(())
        });
        session.request_snapshot();
    });

    let snapshot = tokio::time::timeout(wait, rx.recv())
        .await
        .map_err(|_| CliError::Timeout("snapshot"))?
        .ok_or(CliError::Stopped)?;
    println!("{}", serde_json::to_string_pretty(&snapshot)?);

    leave(&handle, task).await
}

/// Poll until the session is open with nothing left in its queue.
async fn wait_until_flushed(handle: &RealtimeHandle, wait: Duration) -> Result<(), CliError> {
    let poll = async {
        loop {
            let (state, queued) = handle
                .query(|session| (session.state(), session.queued()))
                .await
                .ok_or(CliError::Stopped)?;
            if state == ConnectionState::Open && queued == 0 {
                return Ok::<(), CliError>(());
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    };
    tokio::time::timeout(wait, poll)
        .await
        .map_err(|_| CliError::Timeout("outbound queue to drain"))?
}

async fn leave(handle: &RealtimeHandle, task: JoinHandle<Session>) -> Result<(), CliError> {
    handle.close();
    let session = task.await?;
    if session.queued() > 0 {
        warn!(queued = session.queued(), "left room with unsent frames");
    }
    info!(room_id = session.room_id(), "left room");
    Ok(())
}
