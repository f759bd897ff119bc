//! Events raised by the client and the subscriber fan-out.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::client::action::{Outgoing, SendToken};
use crate::client::info::{
    ChannelInfo, NetworkInfo, Server, ServerInfo, StatisticalEntry, WhoEntry, WhoisInfo,
};
use crate::client::Topic;
use crate::error::{MalformedMessage, ProtocolViolation};
use crate::irc::{Message, ModeChange, Prefix};

/// Where a PRIVMSG or NOTICE was addressed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageTarget {
    Channel(String),
    LocalUser,
    /// A mask (`$*.fi`, `#*.edu`) or a nick that is not ours.
    Other(String),
}

/// Something the client could not act on. Never fatal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Diagnostic {
    /// The line did not parse and was dropped.
    Malformed {
        line: String,
        error: MalformedMessage,
    },
    /// A handler rejected the message; state was left untouched.
    ProtocolViolation(ProtocolViolation),
    /// No dispatch entry matched.
    Unhandled(Message),
    /// A non-registration command arrived before registration completed.
    NotRegistered(Message),
    /// A queued line was discarded because the session ended first.
    Unsent(Outgoing),
}

#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
    /// Transport is up and the handshake has been queued.
    Connected,
    Registered {
        nick: String,
    },
    Disconnected {
        reason: String,
    },

    UserJoinedChannel {
        channel: String,
        nick: String,
    },
    UserPartedChannel {
        channel: String,
        nick: String,
        reason: Option<String>,
    },
    UserKicked {
        channel: String,
        nick: String,
        by: Option<String>,
        reason: Option<String>,
    },
    UserQuit {
        nick: String,
        reason: Option<String>,
        channels: Vec<String>,
    },
    NickChanged {
        old: String,
        new: String,
    },
    TopicChanged {
        channel: String,
        topic: Option<Topic>,
    },
    ChannelModeChanged {
        channel: String,
        by: Option<Prefix>,
        changes: Vec<ModeChange>,
    },
    UserModeChanged {
        nick: String,
        changes: Vec<ModeChange>,
    },
    MessageReceived {
        source: Option<Prefix>,
        targets: Vec<MessageTarget>,
        text: String,
    },
    NoticeReceived {
        source: Option<Prefix>,
        targets: Vec<MessageTarget>,
        text: String,
    },
    Invited {
        by: Option<String>,
        channel: String,
    },
    Wallops {
        source: Option<Prefix>,
        text: String,
    },
    Ping {
        token: String,
    },
    Pong {
        server: Option<String>,
        token: Option<String>,
    },

    MotdReceived {
        lines: Vec<String>,
    },
    InfoReceived {
        lines: Vec<String>,
    },
    ServerInfoReceived(ServerInfo),
    ServerFeaturesReceived {
        tokens: Vec<String>,
    },
    NetworkInfoReceived(NetworkInfo),
    ChannelListReceived(Vec<ChannelInfo>),
    LinksReceived(Vec<Server>),
    StatsReceived(Vec<StatisticalEntry>),
    WhoReceived {
        mask: String,
        entries: Vec<WhoEntry>,
    },
    WhoisReceived(WhoisInfo),
    NamesReceived {
        channel: String,
        nicks: Vec<String>,
    },
    BanListReceived {
        channel: String,
        masks: Vec<String>,
    },
    AwayReply {
        nick: String,
        message: String,
    },
    IsOn {
        nicks: Vec<String>,
    },
    LocalAwayChanged {
        away: bool,
    },
    YoureOper,
    ServerTime {
        server: String,
        time: String,
    },
    ChannelCreated {
        channel: String,
        at: DateTime<Utc>,
    },
    /// A 4xx/5xx numeric.
    ErrorReply {
        code: u16,
        params: Vec<String>,
    },
    /// `ERROR` from the server, usually just before it closes the link.
    ServerError {
        message: String,
    },
    /// The local user was removed from the network by `KILL`.
    Killed {
        by: Option<String>,
        reason: Option<String>,
    },

    RawMessageReceived(Message),
    RawMessageSent(String),
    MessageSent {
        token: Option<SendToken>,
    },

    Diagnostic(Diagnostic),
}

/// Fan-out of [`ClientEvent`]s to any number of subscribers.
///
/// Subscribers that have dropped their receiver are pruned on the next emit.
#[derive(Debug, Clone, Default)]
pub struct EventBus {
    subscribers: Arc<Mutex<Vec<mpsc::UnboundedSender<ClientEvent>>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<ClientEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.lock().push(tx);
        rx
    }

    pub fn emit(&self, event: ClientEvent) {
        let mut subs = self.subscribers.lock();
        match subs.len() {
            0 => {}
            1 => {
                if subs[0].send(event).is_err() {
                    subs.clear();
                }
            }
            _ => subs.retain(|tx| tx.send(event.clone()).is_ok()),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().len()
    }
}
