//! Transport driver.
//!
//! Splits a duplex stream into a read path (framer, parser, dispatch) and a
//! write path (outbound queue, flood delay, codec). The two run concurrently,
//! so a flood delay never holds up inbound processing. Either side stopping
//! cancels the other.

use std::future::Future;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_util::codec::{FramedRead, FramedWrite};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::client::{Client, ClientEvent, Outgoing};
use crate::config::ClientConfig;
use crate::error::ClientError;
use crate::flood::FloodPreventer;
use crate::irc::LineCodec;

/// Connect over TCP and run the session until it ends.
///
/// Returns the disconnect reason. No reconnection is attempted.
pub async fn connect(client: &Client, config: &ClientConfig) -> Result<String, ClientError> {
    client.begin_connect()?;
    let addr = config.server.address();
    info!(%addr, "connecting");
    let stream = match TcpStream::connect(&addr).await {
        Ok(stream) => stream,
        Err(e) => {
            client.on_transport_closed(&format!("connect to {} failed: {}", addr, e));
            return Err(e.into());
        }
    };
    if let Err(e) = stream.set_nodelay(true) {
        debug!(error = %e, "could not set TCP_NODELAY");
    }
    run_session(
        client,
        stream,
        config.flood.build(),
        config.server.max_line_length,
    )
    .await
}

/// Drive `session` until it ends or `shutdown` resolves.
///
/// On shutdown the client sends `QUIT` and the server gets `grace` to close
/// the link. After that the session is cancelled. Either way the session
/// runs to completion, so `Disconnected` is always emitted.
pub async fn run_until<S, F>(
    client: &Client,
    session: S,
    shutdown: F,
    quit_reason: Option<&str>,
    grace: Duration,
) -> Result<String, ClientError>
where
    S: Future<Output = Result<String, ClientError>>,
    F: Future<Output = ()>,
{
    tokio::pin!(session);
    tokio::select! {
        result = &mut session => result,
        _ = shutdown => {
            info!("shutting down");
            if let Err(e) = client.quit(quit_reason) {
                debug!(error = %e, "cannot quit, cancelling");
                client.disconnect();
            }
            match tokio::time::timeout(grace, session.as_mut()).await {
                Ok(result) => result,
                Err(_) => {
                    warn!(?grace, "server did not close the link");
                    client.disconnect();
                    session.as_mut().await
                }
            }
        }
    }
}

/// Drive one session over an already connected stream.
///
/// The client must be in `Connecting`. Ends in `Disconnected` whatever
/// happens, and returns the reason.
pub async fn run_session<S>(
    client: &Client,
    stream: S,
    flood: Box<dyn FloodPreventer>,
    max_line: usize,
) -> Result<String, ClientError>
where
    S: AsyncRead + AsyncWrite,
{
    let outgoing = match client.take_outgoing() {
        Ok(rx) => rx,
        Err(e) => {
            client.on_transport_closed("no outbound queue");
            return Err(e);
        }
    };
    if let Err(e) = client.on_transport_connected() {
        client.restore_outgoing(outgoing);
        client.on_transport_closed("registration could not start");
        return Err(e);
    }

    let cancel = client.cancellation();
    let (reader, writer) = tokio::io::split(stream);
    let lines = FramedRead::new(reader, LineCodec::with_max_len(max_line));
    let sink = FramedWrite::new(writer, LineCodec::new());

    let (reason, outgoing) = tokio::join!(
        read_loop(client, lines, cancel.clone()),
        write_loop(client, sink, outgoing, flood, cancel),
    );
    client.restore_outgoing(outgoing);
    client.on_transport_closed(&reason);
    Ok(reason)
}

async fn read_loop<R>(
    client: &Client,
    mut lines: FramedRead<R, LineCodec>,
    cancel: CancellationToken,
) -> String
where
    R: AsyncRead + Unpin,
{
    let reason = loop {
        tokio::select! {
            _ = cancel.cancelled() => break "session cancelled".to_string(),
            next = lines.next() => match next {
                Some(Ok(line)) => client.handle_line(&line),
                Some(Err(e)) => {
                    warn!(error = %e, "read failed");
                    break format!("read error: {}", e);
                }
                None => break "connection closed by server".to_string(),
            },
        }
    };
    cancel.cancel();
    reason
}

async fn write_loop<W>(
    client: &Client,
    mut sink: FramedWrite<W, LineCodec>,
    mut queue: mpsc::UnboundedReceiver<Outgoing>,
    mut flood: Box<dyn FloodPreventer>,
    cancel: CancellationToken,
) -> mpsc::UnboundedReceiver<Outgoing>
where
    W: AsyncWrite + Unpin,
{
    loop {
        let out = tokio::select! {
            _ = cancel.cancelled() => break,
            next = queue.recv() => match next {
                Some(out) => out,
                None => break,
            },
        };

        let delay = flood.send_delay();
        if !delay.is_zero() {
            debug!(?delay, "flood delay");
            tokio::select! {
                _ = cancel.cancelled() => {
                    client.discard_outgoing(out);
                    break;
                }
                _ = tokio::time::sleep(delay) => {}
            }
        }

        debug!(line = %out.line, "send");
        if let Err(e) = sink.send(out.line.clone()).await {
            warn!(error = %e, "write failed");
            cancel.cancel();
            client.discard_outgoing(out);
            break;
        }
        flood.message_sent();
        client.events().emit(ClientEvent::RawMessageSent(out.line));
        client
            .events()
            .emit(ClientEvent::MessageSent { token: out.token });
    }
    queue
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{ConnectionState, SendToken};
    use crate::config::{RegistrationInfo, UserRegistration};
    use crate::flood::{NoFloodPrevention, StandardFloodPreventer};
    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
    use tokio::sync::oneshot;

    fn client() -> Client {
        let config = ClientConfig {
            registration: RegistrationInfo::User(UserRegistration {
                password: None,
                nickname: "crab".into(),
                user_name: "crab".into(),
                real_name: "Crab".into(),
                user_modes: vec![],
            }),
            ..ClientConfig::default()
        };
        Client::new(&config)
    }

    #[tokio::test]
    async fn test_session_registers_and_closes() {
        let client = client();
        client.begin_connect().unwrap();
        let (local, remote) = tokio::io::duplex(4096);
        let session = {
            let client = client.clone();
            tokio::spawn(async move {
                run_session(&client, local, Box::new(NoFloodPrevention), 512).await
            })
        };

        let (server_read, mut server_write) = tokio::io::split(remote);
        let mut server_lines = BufReader::new(server_read).lines();
        assert_eq!(server_lines.next_line().await.unwrap().unwrap(), "NICK crab");
        assert_eq!(
            server_lines.next_line().await.unwrap().unwrap(),
            "USER crab 0 * :Crab"
        );

        server_write
            .write_all(b":srv 001 crab :Welcome\r\nPING :tok\r\n")
            .await
            .unwrap();
        assert_eq!(server_lines.next_line().await.unwrap().unwrap(), "PONG :tok");
        assert_eq!(client.connection_state(), ConnectionState::Registered);

        client.send("PRIVMSG #rust :hi", Some(SendToken(9))).unwrap();
        assert_eq!(
            server_lines.next_line().await.unwrap().unwrap(),
            "PRIVMSG #rust :hi"
        );

        drop(server_write);
        drop(server_lines);
        let reason = session.await.unwrap().unwrap();
        assert_eq!(reason, "connection closed by server");
        assert_eq!(client.connection_state(), ConnectionState::Disconnected);
        // The queue is available to the next session.
        assert!(client.take_outgoing().is_ok());
    }

    #[tokio::test]
    async fn test_cancel_interrupts_flood_delay() {
        let client = client();
        client.begin_connect().unwrap();
        let (local, _remote) = tokio::io::duplex(4096);
        // Burst of zero: every line past the first waits a full period.
        let flood = Box::new(StandardFloodPreventer::new(0, Duration::from_secs(3600)));
        let session = {
            let client = client.clone();
            tokio::spawn(async move { run_session(&client, local, flood, 512).await })
        };
        tokio::task::yield_now().await;
        client.disconnect();
        let reason = session.await.unwrap().unwrap();
        assert_eq!(reason, "session cancelled");
        assert_eq!(client.connection_state(), ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn test_shutdown_quits_and_waits_for_close() {
        let client = client();
        client.begin_connect().unwrap();
        let mut events = client.subscribe();
        let (local, remote) = tokio::io::duplex(4096);
        let (stop, stopped) = oneshot::channel::<()>();
        let session = {
            let client = client.clone();
            tokio::spawn(async move {
                let session = run_session(&client, local, Box::new(NoFloodPrevention), 512);
                let shutdown = async {
                    let _ = stopped.await;
                };
                run_until(&client, session, shutdown, Some("bye"), Duration::from_secs(5)).await
            })
        };

        let (server_read, mut server_write) = tokio::io::split(remote);
        let mut server_lines = BufReader::new(server_read).lines();
        assert_eq!(server_lines.next_line().await.unwrap().unwrap(), "NICK crab");
        assert_eq!(
            server_lines.next_line().await.unwrap().unwrap(),
            "USER crab 0 * :Crab"
        );
        server_write
            .write_all(b":srv 001 crab :Welcome\r\n")
            .await
            .unwrap();

        stop.send(()).unwrap();
        assert_eq!(server_lines.next_line().await.unwrap().unwrap(), "QUIT :bye");
        drop(server_write);
        drop(server_lines);

        let reason = session.await.unwrap().unwrap();
        assert_eq!(reason, "connection closed by server");
        assert_eq!(client.connection_state(), ConnectionState::Disconnected);
        let disconnected = std::iter::from_fn(|| events.try_recv().ok())
            .any(|e| matches!(e, ClientEvent::Disconnected { .. }));
        assert!(disconnected);
    }

    #[tokio::test]
    async fn test_shutdown_cancels_after_grace() {
        let client = client();
        client.begin_connect().unwrap();
        let (local, _remote) = tokio::io::duplex(4096);
        let session = run_session(&client, local, Box::new(NoFloodPrevention), 512);
        let reason = run_until(
            &client,
            session,
            tokio::time::sleep(Duration::from_millis(10)),
            Some("bye"),
            Duration::from_millis(50),
        )
        .await
        .unwrap();
        assert_eq!(reason, "session cancelled");
        assert_eq!(client.connection_state(), ConnectionState::Disconnected);
    }
}
