//! The client: state graph, dispatch, events and the outbound queue.
//!
//! A [`Client`] is cheap to clone; clones share one connection. Inbound lines
//! go through [`Client::handle_line`], which parses, dispatches under the
//! state lock, then emits events and queues replies once the lock is
//! released. Outbound lines queue through [`Client::send`] and are drained
//! by the single writer in [`crate::irc::connection`].

pub mod action;
pub mod channel;
pub mod dialect;
pub mod dispatch;
pub mod event;
pub mod features;
pub(crate) mod handler;
pub mod info;
pub mod registration;
pub mod state;
pub mod user;

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

pub use action::{Outgoing, SendToken};
pub use channel::{Channel, ChannelUser, Topic};
pub use dialect::{Dialect, MotdRegistrationDialect, StandardDialect};
pub use dispatch::{DispatchTable, Phase};
pub use event::{ClientEvent, Diagnostic, EventBus, MessageTarget};
pub use features::ServerFeatures;
pub use registration::ConnectionState;
pub use state::{ChannelSnapshot, ClientState, MemberSnapshot};
pub use user::{LocalUser, User, UserId};

use crate::config::{ClientConfig, RegistrationInfo};
use crate::error::ClientError;
use crate::irc::Message;

struct Inner {
    state: Mutex<ClientState>,
    dialect: Arc<dyn Dialect>,
    table: Arc<DispatchTable>,
    events: EventBus,
    outbox: mpsc::UnboundedSender<Outgoing>,
    outbox_rx: Mutex<Option<mpsc::UnboundedReceiver<Outgoing>>>,
    registration: RegistrationInfo,
    /// Replaced when a new session begins.
    cancel: Mutex<CancellationToken>,
}

#[derive(Clone)]
pub struct Client {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("dialect", &self.inner.dialect.name())
            .field("state", &self.connection_state())
            .finish()
    }
}

impl Client {
    pub fn new(config: &ClientConfig) -> Self {
        let dialect = dialect::dialect_for(config.dialect);
        Self::with_dialect(config, dialect)
    }

    /// Build a client for a custom dialect.
    pub fn with_dialect(config: &ClientConfig, dialect: Arc<dyn Dialect>) -> Self {
        let registration = config.registration.clone();
        let state = ClientState::new(registration.nickname(), config.tracking);
        let table = dialect::build_table(dialect.as_ref());
        let (outbox, outbox_rx) = mpsc::unbounded_channel();
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(state),
                dialect,
                table,
                events: EventBus::new(),
                outbox,
                outbox_rx: Mutex::new(Some(outbox_rx)),
                registration,
                cancel: Mutex::new(CancellationToken::new()),
            }),
        }
    }

    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<ClientEvent> {
        self.inner.events.subscribe()
    }

    pub fn events(&self) -> &EventBus {
        &self.inner.events
    }

    pub fn dialect(&self) -> &dyn Dialect {
        self.inner.dialect.as_ref()
    }

    /// Token cancelled when the session ends; the transport watches it.
    pub fn cancellation(&self) -> CancellationToken {
        self.inner.cancel.lock().clone()
    }

    // ----- inbound -----

    /// Parse and dispatch one line. Malformed lines become diagnostics.
    pub fn handle_line(&self, line: &str) {
        match Message::parse(line) {
            Ok(msg) => self.dispatch(msg),
            Err(error) => {
                warn!(%line, %error, "malformed line");
                self.inner
                    .events
                    .emit(ClientEvent::Diagnostic(Diagnostic::Malformed {
                        line: line.to_string(),
                        error,
                    }));
            }
        }
    }

    pub fn dispatch(&self, msg: Message) {
        debug!(line = %msg, "recv");
        let out = {
            let mut state = self.inner.state.lock();
            self.inner
                .table
                .run(&mut state, self.inner.dialect.as_ref(), &msg)
        };
        self.inner.events.emit(ClientEvent::RawMessageReceived(msg));
        for line in out.replies {
            self.enqueue(Outgoing::new(line));
        }
        for event in out.events {
            self.inner.events.emit(event);
        }
    }

    // ----- outbound -----

    /// Queue a fully formatted line. `MessageSent { token }` follows once it
    /// has been written.
    pub fn send(
        &self,
        line: impl Into<String>,
        token: Option<SendToken>,
    ) -> Result<(), ClientError> {
        // Held across the enqueue so the line cannot slip in after the
        // session has closed and drained the queue.
        let state = self.inner.state.lock();
        match state.connection_state() {
            s if s.accepts_sends() => {}
            ConnectionState::Disconnected => return Err(ClientError::Disconnected),
            s => return Err(ClientError::NotReady(s)),
        }
        self.enqueue(Outgoing {
            line: line.into(),
            token,
        });
        Ok(())
    }

    fn enqueue(&self, out: Outgoing) {
        if self.inner.outbox.send(out).is_err() {
            debug!("outbound queue closed");
        }
    }

    /// The receiving end of the outbound queue. There is one writer per client.
    pub fn take_outgoing(&self) -> Result<mpsc::UnboundedReceiver<Outgoing>, ClientError> {
        self.inner
            .outbox_rx
            .lock()
            .take()
            .ok_or(ClientError::WriterTaken)
    }

    /// Hand the queue back once a writer is done with it.
    pub fn restore_outgoing(&self, rx: mpsc::UnboundedReceiver<Outgoing>) {
        *self.inner.outbox_rx.lock() = Some(rx);
    }

    /// Report a line that will never be written.
    pub fn discard_outgoing(&self, out: Outgoing) {
        debug!(line = %out.line, token = ?out.token, "discarding unsent line");
        self.inner
            .events
            .emit(ClientEvent::Diagnostic(Diagnostic::Unsent(out)));
    }

    /// Empty the queue if no writer holds it. Lines are returned in order.
    fn drain_outgoing(&self) -> Vec<Outgoing> {
        let mut drained = Vec::new();
        if let Some(rx) = self.inner.outbox_rx.lock().as_mut() {
            while let Ok(out) = rx.try_recv() {
                drained.push(out);
            }
        }
        drained
    }

    // ----- lifecycle -----

    pub fn begin_connect(&self) -> Result<(), ClientError> {
        self.inner
            .state
            .lock()
            .set_connection(ConnectionState::Connecting)?;
        let mut cancel = self.inner.cancel.lock();
        if cancel.is_cancelled() {
            *cancel = CancellationToken::new();
        }
        Ok(())
    }

    /// Transport is up: enter Registering and queue the credentials.
    pub fn on_transport_connected(&self) -> Result<(), ClientError> {
        {
            let mut state = self.inner.state.lock();
            state.set_connection(ConnectionState::Registering)?;
            state.set_local_nick(self.inner.registration.nickname());
            state.local.is_service = self.inner.registration.is_service();
        }
        for line in registration::handshake_lines(&self.inner.registration) {
            self.enqueue(Outgoing::new(line));
        }
        self.inner.events.emit(ClientEvent::Connected);
        Ok(())
    }

    /// Send `QUIT` and enter Disconnecting. The transport finishes the
    /// session once the server closes the link.
    pub fn quit(&self, reason: Option<&str>) -> Result<(), ClientError> {
        self.inner
            .state
            .lock()
            .set_connection(ConnectionState::Disconnecting)?;
        let line = match reason {
            Some(r) => format!("QUIT :{}", r),
            None => "QUIT".to_string(),
        };
        self.enqueue(Outgoing::new(line));
        info!("quitting");
        Ok(())
    }

    /// Transport is gone. Enters Disconnected exactly once; later calls are
    /// no-ops and return false.
    ///
    /// Lines still queued belong to the dead session and are discarded, each
    /// reported as [`Diagnostic::Unsent`]. Call it after the writer has handed
    /// the queue back.
    pub fn on_transport_closed(&self, reason: &str) -> bool {
        let unsent = {
            let mut state = self.inner.state.lock();
            if state.set_connection(ConnectionState::Disconnected).is_err() {
                return false;
            }
            state.reset_session();
            self.drain_outgoing()
        };
        self.inner.cancel.lock().cancel();
        for out in unsent {
            self.discard_outgoing(out);
        }
        info!(%reason, "disconnected");
        self.inner.events.emit(ClientEvent::Disconnected {
            reason: reason.to_string(),
        });
        true
    }

    /// Ask the transport to stop without waiting for the server.
    pub fn disconnect(&self) {
        self.inner.cancel.lock().cancel();
    }

    // ----- reads -----

    pub fn connection_state(&self) -> ConnectionState {
        self.inner.state.lock().connection_state()
    }

    pub fn local_nick(&self) -> String {
        self.inner.state.lock().local_nick().to_string()
    }

    pub fn channel(&self, name: &str) -> Option<ChannelSnapshot> {
        self.inner.state.lock().snapshot_channel(name)
    }

    pub fn channel_names(&self) -> Vec<String> {
        let state = self.inner.state.lock();
        let mut names: Vec<String> = state.channels().map(|c| c.name.clone()).collect();
        names.sort();
        names
    }

    pub fn user(&self, nick: &str) -> Option<User> {
        self.inner.state.lock().user_by_nick(nick).cloned()
    }

    /// Run `f` with the state locked. Keep it short: inbound dispatch waits.
    pub fn with_state<R>(&self, f: impl FnOnce(&ClientState) -> R) -> R {
        f(&self.inner.state.lock())
    }
}
