// Copyright (C) 2025 Ryan Daum <ryan.daum@gmail.com> This program is free
// software: you can redistribute it and/or modify it under the terms of the GNU
// General Public License as published by the Free Software Foundation, version
// 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//

//! Client side of the game server's telnet console.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use horde_relay::classify::password_prompt;
use horde_relay::{CommandError, EventSender, RelayEvent, RemoteShell, TransportEvent};
use thiserror::Error;
use tokio::net::TcpStream;
use tokio::select;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_util::codec::Framed;
use tracing::{debug, info, trace};

use crate::shell_codec::{ShellCodec, ShellCodecError};

pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(15);
/// How long a command may go without the console answering.
pub const EXEC_TIMEOUT: Duration = Duration::from_secs(2);

const PASSWORD_REQUEST: &str = "Please enter password:";
const PASSWORD_REJECTED: &str = "Password incorrect";
const LOGON_SUCCESSFUL: &str = "Logon successful";

#[derive(Debug, Error)]
enum SessionError {
    #[error("connection timed out")]
    ConnectTimeout,
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Codec(#[from] ShellCodecError),
}

struct Request {
    command: String,
    answered: oneshot::Sender<()>,
}

struct Session {
    id: u64,
    requests: mpsc::UnboundedSender<Request>,
    task: JoinHandle<()>,
}

type SessionSlot = Arc<Mutex<Option<Session>>>;

pub struct TelnetShell {
    address: String,
    password: String,
    events: EventSender,
    session: SessionSlot,
    next_id: AtomicU64,
}

impl TelnetShell {
    pub fn new(ip: &str, port: u16, password: String, events: EventSender) -> Self {
        Self {
            address: format!("{ip}:{port}"),
            password,
            events,
            session: Arc::new(Mutex::new(None)),
            next_id: AtomicU64::new(0),
        }
    }
}

#[async_trait]
impl RemoteShell for TelnetShell {
    fn connect(&self) {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let (requests, requests_rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(run_session(
            id,
            self.address.clone(),
            self.password.clone(),
            self.events.clone(),
            requests_rx,
            self.session.clone(),
        ));

        let replaced = self
            .session
            .lock()
            .unwrap()
            .replace(Session { id, requests, task });
        if let Some(old) = replaced {
            old.task.abort();
        }
    }

    fn terminate(&self) {
        let Some(session) = self.session.lock().unwrap().take() else {
            return;
        };
        debug!(session = session.id, "Terminating console session");
        session.task.abort();
        let _ = self
            .events
            .send(RelayEvent::Transport(TransportEvent::Closed));
    }

    async fn execute(&self, command: &str) -> Result<(), CommandError> {
        let requests = self
            .session
            .lock()
            .unwrap()
            .as_ref()
            .map(|s| s.requests.clone())
            .ok_or(CommandError::NotConnected)?;

        let (answered, answer) = oneshot::channel();
        requests
            .send(Request {
                command: command.to_string(),
                answered,
            })
            .map_err(|_| CommandError::NotConnected)?;

        match timeout(EXEC_TIMEOUT, answer).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(_)) => Err(CommandError::NotConnected),
            Err(_) => Err(CommandError::NotResponding),
        }
    }
}

async fn run_session(
    id: u64,
    address: String,
    password: String,
    events: EventSender,
    requests: mpsc::UnboundedReceiver<Request>,
    slot: SessionSlot,
) {
    let result = session_loop(&address, &password, &events, requests).await;
    if let Err(e) = result {
        let _ = events.send(RelayEvent::Transport(TransportEvent::Error(e.to_string())));
    }

    // A terminated session has already been taken out of the slot and reported.
    let mut current = slot.lock().unwrap();
    if current.as_ref().is_some_and(|s| s.id == id) {
        current.take();
        let _ = events.send(RelayEvent::Transport(TransportEvent::Closed));
    }
}

async fn session_loop(
    address: &str,
    password: &str,
    events: &EventSender,
    mut requests: mpsc::UnboundedReceiver<Request>,
) -> Result<(), SessionError> {
    info!("Connecting to game console at {address}");
    let stream = timeout(CONNECT_TIMEOUT, TcpStream::connect(address))
        .await
        .map_err(|_| SessionError::ConnectTimeout)??;
    let mut framed = Framed::new(stream, ShellCodec::new());

    let mut logged_in = false;
    let mut waiting: Option<oneshot::Sender<()>> = None;
    loop {
        select! {
            chunk = framed.next() => {
                let Some(chunk) = chunk else {
                    debug!("Console closed the connection");
                    return Ok(());
                };
                let chunk = chunk?;
                trace!(length = chunk.len(), "console chunk");

                if !logged_in {
                    if chunk.contains(PASSWORD_REJECTED) {
                        let _ = events.send(RelayEvent::Transport(TransportEvent::FailedLogin));
                        return Ok(());
                    }
                    if chunk.contains(PASSWORD_REQUEST) {
                        framed.send(password.to_string()).await?;
                    } else if chunk.contains(LOGON_SUCCESSFUL) {
                        logged_in = true;
                        let _ = events.send(RelayEvent::Transport(TransportEvent::Ready));
                    }
                    continue;
                }

                // Re-prompts always go to the relay as data, which treats them as fatal.
                // A caller that gave up waiting gets its late answer relayed as data too.
                let answered = match waiting.take() {
                    Some(answered) if password_prompt(&chunk).is_none() => {
                        answered.send(()).is_ok()
                    }
                    _ => false,
                };
                let event = if answered {
                    TransportEvent::Response(chunk)
                } else {
                    TransportEvent::Data(chunk)
                };
                let _ = events.send(RelayEvent::Transport(event));
            }
            Some(request) = requests.recv(), if logged_in && waiting.is_none() => {
                debug!(command = %request.command, "Sending console command");
                framed.send(request.command).await?;
                waiting = Some(request.answered);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use horde_relay::event_channel;
    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
    use tokio::net::TcpListener;

    async fn next_transport(rx: &mut horde_relay::EventReceiver) -> TransportEvent {
        match timeout(Duration::from_secs(5), rx.recv()).await {
            Ok(Some(RelayEvent::Transport(event))) => event,
            other => panic!("expected a transport event, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_login_execute_and_close() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let server = tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            let (read, mut write) = socket.into_split();
            let mut lines = BufReader::new(read).lines();

            write
                .write_all(b"Please enter password:\r\n\0\0")
                .await
                .unwrap();
            assert_eq!(lines.next_line().await.unwrap().as_deref(), Some("hunter2"));
            write
                .write_all(b"Logon successful.\r\n")
                .await
                .unwrap();
            // Separate chunks: output sharing a chunk with the logon banner is not relayed.
            tokio::time::sleep(Duration::from_millis(100)).await;
            write
                .write_all(b"2024-01-01T00:00:00 1.2 INF GMSG: Player 'Ann' left the game\r\n")
                .await
                .unwrap();

            assert_eq!(lines.next_line().await.unwrap().as_deref(), Some("lp"));
            write
                .write_all(b"Total of 0 in the game\r\n")
                .await
                .unwrap();

            // Leave "version" unanswered until the client has given up on it.
            assert_eq!(lines.next_line().await.unwrap().as_deref(), Some("version"));
            tokio::time::sleep(EXEC_TIMEOUT + Duration::from_millis(500)).await;
            write
                .write_all(b"2024-01-01T00:00:00 1.4 INF GMSG: Player 'Bob' joined the game\r\n")
                .await
                .unwrap();
        });

        let (tx, mut rx) = event_channel();
        let shell = TelnetShell::new("127.0.0.1", port, "hunter2".to_string(), tx);
        assert!(matches!(
            shell.execute("lp").await,
            Err(CommandError::NotConnected)
        ));

        shell.connect();
        assert!(matches!(next_transport(&mut rx).await, TransportEvent::Ready));
        match next_transport(&mut rx).await {
            TransportEvent::Data(chunk) => assert!(chunk.contains("left the game")),
            other => panic!("expected data, got {other:?}"),
        }
        shell.execute("lp").await.unwrap();
        match next_transport(&mut rx).await {
            TransportEvent::Response(chunk) => assert_eq!(chunk, "Total of 0 in the game\r\n"),
            other => panic!("expected the answer, got {other:?}"),
        }
        assert!(matches!(
            shell.execute("version").await,
            Err(CommandError::NotResponding)
        ));
        match next_transport(&mut rx).await {
            TransportEvent::Data(chunk) => assert!(chunk.contains("joined the game")),
            other => panic!("expected data, got {other:?}"),
        }

        server.await.unwrap();
        assert!(matches!(next_transport(&mut rx).await, TransportEvent::Closed));
        assert!(matches!(
            shell.execute("lp").await,
            Err(CommandError::NotConnected)
        ));
    }

    #[tokio::test]
    async fn test_wrong_password_fails_login() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            socket
                .write_all(b"Please enter password:\r\n\0\0")
                .await
                .unwrap();
            let mut buf = [0u8; 64];
            let _ = tokio::io::AsyncReadExt::read(&mut socket, &mut buf).await;
            socket
                .write_all(b"Password incorrect, please enter password:\r\n")
                .await
                .unwrap();
        });

        let (tx, mut rx) = event_channel();
        let shell = TelnetShell::new("127.0.0.1", port, "wrong".to_string(), tx);
        shell.connect();
        assert!(matches!(
            next_transport(&mut rx).await,
            TransportEvent::FailedLogin
        ));
    }

    #[tokio::test]
    async fn test_terminate_reports_close_once() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let (tx, mut rx) = event_channel();
        let shell = TelnetShell::new("127.0.0.1", port, "hunter2".to_string(), tx);

        shell.connect();
        let _held = listener.accept().await.unwrap();
        shell.terminate();
        shell.terminate();

        assert!(matches!(next_transport(&mut rx).await, TransportEvent::Closed));
        assert!(
            timeout(Duration::from_millis(200), rx.recv())
                .await
                .is_err()
        );
    }
}
