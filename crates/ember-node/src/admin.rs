//! Admin console -- line commands typed at the relay's terminal.
//!
//!   /quit                  graceful shutdown
//!   /w <peer-id> <text>    private message from "server"
//!   /peers                 log connected identities
//!   <text>                 broadcast "[SERVER BROADCAST] <text>"

use ember_protocol::{messages, PeerId};
use futures::{Stream, StreamExt};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::mpsc;

use crate::router::{Origin, Router};
use crate::server::ShutdownHandle;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdminCommand {
    Quit,
    Whisper { destination: PeerId, text: String },
    Peers,
    Broadcast(String),
    Unknown(String),
    /// Recognised command with bad arguments.
    Invalid(&'static str),
}

impl AdminCommand {
    /// Parse one console line. Blank lines give `None`.
    pub fn parse(line: &str) -> Option<Self> {
        let line = line.trim_end_matches(['\r', '\n']);
        if line.trim().is_empty() {
            return None;
        }

        let Some(command) = line.strip_prefix('/') else {
            return Some(AdminCommand::Broadcast(line.to_string()));
        };

        // Message text after the destination is kept verbatim
        let mut args = command.splitn(3, ' ');
        let name = args.next().unwrap_or_default().to_lowercase();
        let cmd = match name.as_str() {
            "quit" => AdminCommand::Quit,
            "peers" => AdminCommand::Peers,
            "w" => {
                let Some(destination) = args.next().filter(|a| !a.is_empty()) else {
                    return Some(AdminCommand::Invalid("usage: /w <peer-id> <message>"));
                };
                let Ok(destination) = destination.parse::<PeerId>() else {
                    return Some(AdminCommand::Invalid("invalid peer id"));
                };
                let text = args.next().unwrap_or_default().to_string();
                if text.trim().is_empty() {
                    return Some(AdminCommand::Invalid("please specify a message"));
                }
                AdminCommand::Whisper { destination, text }
            }
            _ => AdminCommand::Unknown(name),
        };
        Some(cmd)
    }
}

pub struct AdminConsole {
    router: Router,
    shutdown: ShutdownHandle,
}

impl AdminConsole {
    pub fn new(router: Router, shutdown: ShutdownHandle) -> Self {
        Self { router, shutdown }
    }

    /// Read commands until end of input, `/quit`, or shutdown.
    pub async fn run<S>(self, mut lines: S) -> std::io::Result<()>
    where
        S: Stream<Item = std::io::Result<String>> + Unpin,
    {
        loop {
            let line = tokio::select! {
                line = lines.next() => line,
                _ = self.shutdown.triggered() => break,
            };
            let Some(line) = line.transpose()? else {
                tracing::debug!("admin: input closed");
                break;
            };
            let Some(cmd) = AdminCommand::parse(&line) else {
                continue;
            };
            if !self.execute(cmd).await {
                break;
            }
        }
        Ok(())
    }

    /// Run one command. Returns false once the console should stop.
    pub async fn execute(&self, cmd: AdminCommand) -> bool {
        tracing::info!(?cmd, "admin: processing command");
        match cmd {
            AdminCommand::Quit => {
                self.shutdown.trigger();
                return false;
            }
            AdminCommand::Whisper { destination, text } => {
                self.router
                    .send_private(Origin::Server, destination, &text)
                    .await;
            }
            AdminCommand::Peers => {
                let peers = self.router.registry().peer_ids().await;
                tracing::info!(count = peers.len(), "admin: connected peers");
                for peer in peers {
                    tracing::info!(%peer, "admin: peer");
                }
            }
            AdminCommand::Broadcast(text) => {
                self.router.broadcast(&messages::server_broadcast(&text)).await;
            }
            AdminCommand::Unknown(name) => {
                tracing::warn!(command = %name, "admin: unknown command");
            }
            AdminCommand::Invalid(reason) => {
                tracing::warn!("admin: {reason}");
            }
        }
        true
    }
}

/// Lines of an async reader as a stream.
pub fn reader_lines<R>(input: R) -> impl Stream<Item = std::io::Result<String>> + Unpin
where
    R: AsyncBufRead + Unpin,
{
    Box::pin(futures::stream::unfold(input.lines(), |mut lines| async move {
        lines.next_line().await.transpose().map(|line| (line, lines))
    }))
}

/// Lines of the process's stdin as a stream.
///
/// Reads on a plain OS thread rather than `tokio::io::stdin`, whose blocking
/// read cannot be cancelled and would hold the runtime open at exit.
pub fn stdin_lines() -> impl Stream<Item = std::io::Result<String>> + Unpin {
    let (tx, rx) = mpsc::channel(16);
    std::thread::spawn(move || {
        for line in std::io::stdin().lines() {
            let failed = line.is_err();
            if tx.blocking_send(line).is_err() || failed {
                break;
            }
        }
    });
    Box::pin(futures::stream::unfold(rx, |mut rx| async move {
        rx.recv().await.map(|line| (line, rx))
    }))
}
