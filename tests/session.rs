//! End-to-end sessions over an in-memory duplex stream.

use std::time::Duration;

use crabirc::client::{Client, ClientEvent, ConnectionState, Diagnostic, SendToken};
use crabirc::config::{ClientConfig, DialectKind, RegistrationInfo, UserRegistration};
use crabirc::error::ClientError;
use crabirc::client::Outgoing;
use crabirc::flood::{FloodPreventer, NoFloodPrevention, StandardFloodPreventer};
use crabirc::irc::connection::run_session;
use tokio::io::{
    AsyncBufReadExt, AsyncWriteExt, BufReader, DuplexStream, Lines, ReadHalf, WriteHalf,
};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

struct FakeServer {
    lines: Lines<BufReader<ReadHalf<DuplexStream>>>,
    writer: WriteHalf<DuplexStream>,
    pings: u32,
}

impl FakeServer {
    async fn expect(&mut self, line: &str) {
        let got = tokio::time::timeout(Duration::from_secs(5), self.lines.next_line())
            .await
            .expect("timed out waiting for a line")
            .unwrap();
        assert_eq!(got.as_deref(), Some(line));
    }

    async fn send(&mut self, line: &str) {
        self.writer.write_all(line.as_bytes()).await.unwrap();
        self.writer.write_all(b"\r\n").await.unwrap();
    }

    /// Round-trip a PING so every earlier line has been dispatched.
    async fn sync(&mut self) {
        self.pings += 1;
        let token = format!("sync{}", self.pings);
        self.send(&format!("PING :{}", token)).await;
        self.expect(&format!("PONG :{}", token)).await;
    }
}

fn config(dialect: DialectKind) -> ClientConfig {
    ClientConfig {
        registration: RegistrationInfo::User(UserRegistration {
            password: Some("secret".into()),
            nickname: "crab".into(),
            user_name: "crab".into(),
            real_name: "Crab Client".into(),
            user_modes: vec!['i'],
        }),
        dialect,
        ..ClientConfig::default()
    }
}

fn start(client: &Client) -> (FakeServer, JoinHandle<Result<String, ClientError>>) {
    start_with(client, Box::new(NoFloodPrevention))
}

fn start_with(
    client: &Client,
    flood: Box<dyn FloodPreventer>,
) -> (FakeServer, JoinHandle<Result<String, ClientError>>) {
    client.begin_connect().unwrap();
    let (local, remote) = tokio::io::duplex(8192);
    let session = {
        let client = client.clone();
        tokio::spawn(async move { run_session(&client, local, flood, 512).await })
    };
    let (read, writer) = tokio::io::split(remote);
    let server = FakeServer {
        lines: BufReader::new(read).lines(),
        writer,
        pings: 0,
    };
    (server, session)
}

async fn register(server: &mut FakeServer) {
    server.expect("PASS secret").await;
    server.expect("NICK crab").await;
    server.expect("USER crab 8 * :Crab Client").await;
    server.send(":irc.test 001 crab :Welcome to the test network").await;
    server
        .send(":irc.test 005 crab CHANTYPES=# PREFIX=(ov)@+ CHANMODES=b,k,l,imnst :are supported")
        .await;
    server.sync().await;
}

fn drain(events: &mut mpsc::UnboundedReceiver<ClientEvent>) -> Vec<ClientEvent> {
    std::iter::from_fn(|| events.try_recv().ok()).collect()
}

#[tokio::test]
async fn test_channel_lifecycle() {
    let client = Client::new(&config(DialectKind::Standard));
    let (mut server, session) = start(&client);
    register(&mut server).await;
    assert_eq!(client.connection_state(), ConnectionState::Registered);

    client.send("JOIN #rust", None).unwrap();
    server.expect("JOIN #rust").await;
    server.send(":crab!crab@host JOIN #rust").await;
    server.send(":irc.test 353 crab = #rust :@crab bob").await;
    server.send(":irc.test 366 crab #rust :End of /NAMES list.").await;
    server.send(":crab!crab@host MODE #rust +o bob").await;
    server.sync().await;

    let channel = client.channel("#rust").unwrap();
    assert_eq!(channel.members.len(), 2);
    assert!(channel.member("crab").unwrap().modes.contains(&'o'));
    assert!(channel.member("bob").unwrap().modes.contains(&'o'));

    server.send(":bob!b@host PART #rust :later").await;
    server.sync().await;
    let channel = client.channel("#rust").unwrap();
    assert!(channel.member("bob").is_none());
    assert!(client.user("bob").is_some());

    server.send(":crab!crab@host PART #rust").await;
    server.sync().await;
    assert!(client.channel("#rust").is_none());

    client.quit(Some("done")).unwrap();
    server.expect("QUIT :done").await;
    drop(server);
    assert_eq!(session.await.unwrap().unwrap(), "connection closed by server");
    assert_eq!(client.connection_state(), ConnectionState::Disconnected);
}

#[tokio::test]
async fn test_message_sent_carries_token() {
    let client = Client::new(&config(DialectKind::Standard));
    let mut events = client.subscribe();
    let (mut server, session) = start(&client);
    register(&mut server).await;

    client.send("PRIVMSG #rust :hello", Some(SendToken(42))).unwrap();
    server.expect("PRIVMSG #rust :hello").await;
    server.sync().await;

    let sent: Vec<_> = drain(&mut events)
        .into_iter()
        .filter_map(|e| match e {
            ClientEvent::MessageSent { token } => token,
            _ => None,
        })
        .collect();
    assert_eq!(sent, vec![SendToken(42)]);

    client.disconnect();
    assert_eq!(session.await.unwrap().unwrap(), "session cancelled");
}

#[tokio::test]
async fn test_unknown_command_is_reported() {
    let client = Client::new(&config(DialectKind::Standard));
    let mut events = client.subscribe();
    let (mut server, session) = start(&client);
    register(&mut server).await;

    server.send(":irc.test FROBNICATE crab :what").await;
    server.sync().await;
    let unhandled: Vec<_> = drain(&mut events)
        .into_iter()
        .filter_map(|e| match e {
            ClientEvent::Diagnostic(Diagnostic::Unhandled(msg)) => Some(msg.command),
            _ => None,
        })
        .collect();
    assert_eq!(unhandled, vec!["FROBNICATE".to_string()]);

    client.disconnect();
    session.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_motd_dialect_registers_on_end_of_motd() {
    let client = Client::new(&config(DialectKind::MotdRegistration));
    let (mut server, session) = start(&client);
    server.expect("PASS secret").await;
    server.expect("NICK crab").await;
    server.expect("USER crab 8 * :Crab Client").await;

    server.send(":irc.test 375 crab :- irc.test Message of the day -").await;
    server.send(":irc.test 372 crab :- be nice").await;
    server.sync().await;
    assert_eq!(client.connection_state(), ConnectionState::Registering);

    server.send(":irc.test 376 crab :End of /MOTD command.").await;
    server.sync().await;
    assert_eq!(client.connection_state(), ConnectionState::Registered);
    let motd = client.with_state(|s| s.motd().to_vec());
    assert_eq!(motd, vec!["be nice".to_string()]);

    client.disconnect();
    session.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_reconnect_starts_with_fresh_handshake() {
    let client = Client::new(&config(DialectKind::Standard));
    let mut events = client.subscribe();

    // Burst of zero holds everything after PASS in the queue.
    let flood = Box::new(StandardFloodPreventer::new(0, Duration::from_secs(3600)));
    let (mut server, session) = start_with(&client, flood);
    server.expect("PASS secret").await;
    client.send("PRIVMSG #old :stale", Some(SendToken(7))).unwrap();
    client.quit(Some("bye")).unwrap();
    client.disconnect();
    assert_eq!(session.await.unwrap().unwrap(), "session cancelled");
    drop(server);

    let unsent: Vec<Outgoing> = drain(&mut events)
        .into_iter()
        .filter_map(|e| match e {
            ClientEvent::Diagnostic(Diagnostic::Unsent(out)) => Some(out),
            _ => None,
        })
        .collect();
    let lines: Vec<&str> = unsent.iter().map(|o| o.line.as_str()).collect();
    assert_eq!(
        lines,
        vec![
            "NICK crab",
            "USER crab 8 * :Crab Client",
            "PRIVMSG #old :stale",
            "QUIT :bye"
        ]
    );
    assert_eq!(unsent[2].token, Some(SendToken(7)));
    assert!(matches!(
        client.send("PRIVMSG #old :late", None),
        Err(ClientError::Disconnected)
    ));

    let (mut server, session) = start(&client);
    register(&mut server).await;
    assert_eq!(client.connection_state(), ConnectionState::Registered);
    let sent: Vec<_> = drain(&mut events)
        .into_iter()
        .filter_map(|e| match e {
            ClientEvent::MessageSent { token } => token,
            _ => None,
        })
        .collect();
    assert!(sent.is_empty());

    client.disconnect();
    session.await.unwrap().unwrap();
}
