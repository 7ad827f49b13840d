//! Async WebSocket driver for a [`Session`].
//!
//! The driver task owns the session and is the only code that touches it.
//! Callers talk to it through a cloneable [`RealtimeHandle`], which ships
//! closures over a channel; each closure runs to completion before the next
//! socket event is processed, so session state is never shared.
//!
//! LOOP
//! ====
//! dial → serve (select over outbound frames, inbound frames, commands) →
//! on close, requeue anything the socket never wrote → idle for the backoff
//! delay while still serving commands → dial again. A `Shutdown` command or
//! dropping every handle ends the loop and hands the session back.

use std::time::Duration;

use frames::Frame;
use futures_util::{SinkExt, StreamExt};
use serde_json::{Map, Value};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, warn};

use crate::config::RealtimeConfig;
use crate::error::RealtimeError;
use crate::hooks::{BoardHooks, SignalHandler};
use crate::session::Session;
use crate::transport::ChannelTransport;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

type Apply = Box<dyn FnOnce(&mut Session) + Send>;

enum Command {
    Apply(Apply),
    Shutdown,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Shutdown,
}

enum Exit {
    Closed(String),
    Shutdown,
}

/// Cloneable handle to a running session.
#[derive(Clone, Debug)]
pub struct RealtimeHandle {
    tx: mpsc::UnboundedSender<Command>,
}

impl RealtimeHandle {
    /// Run `f` against the session on the driver task. Returns `false` when
    /// the driver has stopped.
    pub fn with<F>(&self, f: F) -> bool
    where
        F: FnOnce(&mut Session) + Send + 'static,
    {
        self.tx.send(Command::Apply(Box::new(f))).is_ok()
    }

    /// Run `f` against the session and wait for its result.
    pub async fn query<T, F>(&self, f: F) -> Option<T>
    where
        F: FnOnce(&mut Session) -> T + Send + 'static,
        T: Send + 'static,
    {
        let (reply_tx, reply_rx) = oneshot::channel();
        let queued = self.with(move |session| {
            if reply_tx.send(f(session)).is_err() {
                debug!("query caller went away");
            }
        });
        if !queued {
            return None;
        }
        match reply_rx.await {
            Ok(value) => Some(value),
            Err(_) => None,
        }
    }

    /// Send a frame (queued while disconnected). Returns `false` only when
    /// the driver has stopped.
    pub fn send(&self, frame: Frame) -> bool {
        self.with(move |session| {
            session.send(frame);
        })
    }

    /// Throttled cursor broadcast. The `bool` says whether the driver took
    /// the command, not whether the cursor passed the throttle; use
    /// [`Self::query`] with [`Session::send_cursor`] for that.
    pub fn send_cursor(&self, fields: Map<String, Value>) -> bool {
        self.with(move |session| {
            session.send_cursor(fields);
        })
    }

    /// Ask the driver to close the socket and stop.
    pub fn close(&self) -> bool {
        self.tx.send(Command::Shutdown).is_ok()
    }

    /// Whether the driver task is still accepting commands.
    #[must_use]
    pub fn is_running(&self) -> bool {
        !self.tx.is_closed()
    }
}

/// Start driving `session` on the current tokio runtime.
///
/// The join handle resolves to the session once the driver stops, with any
/// unsent frames still in its queue.
pub fn spawn(session: Session) -> (RealtimeHandle, JoinHandle<Session>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let task = tokio::spawn(run(session, rx));
    (RealtimeHandle { tx }, task)
}

/// Build a session from `config` and start it. Returns `None`, with a
/// warning, when the configuration leaves the layer disabled.
pub fn start(
    config: &RealtimeConfig,
    hooks: impl BoardHooks + 'static,
    signals: impl SignalHandler + 'static,
) -> Option<(RealtimeHandle, JoinHandle<Session>)> {
    match Session::new(config) {
        Ok(session) => Some(spawn(session.with_hooks(hooks).with_signals(signals))),
        Err(error) => {
            warn!(error = %error, "realtime disabled");
            None
        }
    }
}

async fn run(mut session: Session, mut commands: mpsc::UnboundedReceiver<Command>) -> Session {
    loop {
        let url = session.connect().to_owned();

        let dialing = connect_async(url);
        tokio::pin!(dialing);
        let dialed = loop {
            tokio::select! {
                result = &mut dialing => break result,
                command = commands.recv() => {
                    if apply(&mut session, command) == Flow::Shutdown {
                        session.on_shutdown();
                        return session;
                    }
                }
            }
        };

        let delay = match dialed {
            Ok((stream, _response)) => match serve(&mut session, stream, &mut commands).await {
                Exit::Closed(reason) => session.on_close(&reason),
                Exit::Shutdown => {
                    session.on_shutdown();
                    return session;
                }
            },
            Err(error) => session.on_transport_error(&RealtimeError::from(Box::new(error))),
        };

        let delay = delay.unwrap_or(Duration::ZERO);
        if idle(&mut session, &mut commands, delay).await == Flow::Shutdown {
            session.on_shutdown();
            return session;
        }
    }
}

async fn serve(
    session: &mut Session,
    stream: WsStream,
    commands: &mut mpsc::UnboundedReceiver<Command>,
) -> Exit {
    let (mut sink, mut source) = stream.split();
    let (out_tx, mut out_rx) = mpsc::unbounded_channel::<String>();
    session.on_open(Box::new(ChannelTransport::new(out_tx)));

    let mut unsent = Vec::new();
    let exit = loop {
        tokio::select! {
            Some(text) = out_rx.recv() => {
                if let Err(error) = sink.send(Message::Text(text.clone().into())).await {
                    warn!(error = %error, "websocket send failed");
                    unsent.push(text);
                    break Exit::Closed(error.to_string());
                }
            }
            message = source.next() => match message {
                Some(Ok(Message::Text(text))) => {
                    session.on_frame(text.as_str());
                }
                Some(Ok(Message::Close(frame))) => {
                    let reason = frame.map_or_else(
                        || "closed by server".to_owned(),
                        |frame| format!("{} {}", frame.code, frame.reason.as_str()),
                    );
                    break Exit::Closed(reason);
                }
                Some(Ok(_)) => {}
                Some(Err(error)) => {
                    warn!(error = %error, "websocket receive failed");
                    break Exit::Closed(error.to_string());
                }
                None => break Exit::Closed("stream ended".to_owned()),
            },
            command = commands.recv() => {
                if apply(session, command) == Flow::Shutdown {
                    while let Ok(text) = out_rx.try_recv() {
                        if let Err(error) = sink.send(Message::Text(text.clone().into())).await {
                            debug!(error = %error, "frame not delivered before shutdown");
                            unsent.push(text);
                            break;
                        }
                    }
                    if let Err(error) = sink.send(Message::Close(None)).await {
                        debug!(error = %error, "close frame not delivered");
                    }
                    break Exit::Shutdown;
                }
            }
        }
    };

    out_rx.close();
    while let Ok(text) = out_rx.try_recv() {
        unsent.push(text);
    }
    session.requeue_unsent(unsent);
    exit
}

/// Wait out a reconnect delay while still running commands.
async fn idle(
    session: &mut Session,
    commands: &mut mpsc::UnboundedReceiver<Command>,
    delay: Duration,
) -> Flow {
    let sleep = tokio::time::sleep(delay);
    tokio::pin!(sleep);
    loop {
        tokio::select! {
            () = &mut sleep => return Flow::Continue,
            command = commands.recv() => {
                if apply(session, command) == Flow::Shutdown {
                    return Flow::Shutdown;
                }
            }
        }
    }
}

fn apply(session: &mut Session, command: Option<Command>) -> Flow {
    match command {
        Some(Command::Apply(f)) => {
            f(session);
            Flow::Continue
        }
        Some(Command::Shutdown) => Flow::Shutdown,
        None => {
            debug!("every realtime handle dropped");
            Flow::Shutdown
        }
    }
}

#[cfg(test)]
#[path = "connection_test.rs"]
mod connection_test;
