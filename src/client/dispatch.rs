//! Command dispatch.
//!
//! A [`DispatchTable`] maps command names and numeric codes to handlers. The
//! base table is built once per process; a dialect gets its own table that
//! overlays entries on top of the base and falls back to it for everything
//! else.

use std::collections::HashMap;
use std::fmt;
use std::ops::RangeInclusive;
use std::sync::{Arc, OnceLock};

use tracing::{debug, trace, warn};

use crate::client::dialect::Dialect;
use crate::client::event::{ClientEvent, Diagnostic};
use crate::client::handler;
use crate::client::state::ClientState;
use crate::error::ProtocolViolation;
use crate::irc::message::parse_numeric;
use crate::irc::Message;

pub type HandlerResult = Result<(), ProtocolViolation>;

/// A handler validates the message, then mutates state through the context.
/// It must not touch state before it knows it will return `Ok`.
pub type Handler = fn(&mut Context<'_>, &Message) -> HandlerResult;

/// When an entry may run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Runs at any time, including during the registration handshake.
    Registration,
    /// Runs only once the dialect reports the client registered.
    Registered,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CommandKey {
    Numeric(u16),
    /// Uppercased command name.
    Named(String),
}

impl CommandKey {
    pub fn of(command: &str) -> Self {
        match parse_numeric(command) {
            Some(code) => CommandKey::Numeric(code),
            None => CommandKey::Named(command.to_ascii_uppercase()),
        }
    }
}

impl From<u16> for CommandKey {
    fn from(code: u16) -> Self {
        CommandKey::Numeric(code)
    }
}

impl From<&str> for CommandKey {
    fn from(command: &str) -> Self {
        CommandKey::of(command)
    }
}

#[derive(Clone, Copy)]
pub struct Entry {
    pub phase: Phase,
    pub handler: Handler,
}

impl fmt::Debug for Entry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Entry").field("phase", &self.phase).finish()
    }
}

#[derive(Debug, Default)]
pub struct DispatchTable {
    entries: HashMap<CommandKey, Entry>,
    ranges: Vec<(RangeInclusive<u16>, Entry)>,
    parent: Option<Arc<DispatchTable>>,
}

impl DispatchTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// An empty table consulted before `parent`.
    pub fn overlay(parent: Arc<DispatchTable>) -> Self {
        Self {
            parent: Some(parent),
            ..Self::default()
        }
    }

    /// Add or replace an entry in this table. The parent is never modified.
    pub fn register(
        &mut self,
        command: impl Into<CommandKey>,
        phase: Phase,
        handler: Handler,
    ) -> &mut Self {
        self.entries.insert(command.into(), Entry { phase, handler });
        self
    }

    /// Handle every numeric in `range` not matched by an exact entry.
    /// Later ranges take precedence over earlier ones.
    pub fn register_range(
        &mut self,
        range: RangeInclusive<u16>,
        phase: Phase,
        handler: Handler,
    ) -> &mut Self {
        self.ranges.push((range, Entry { phase, handler }));
        self
    }

    pub fn lookup(&self, key: &CommandKey) -> Option<Entry> {
        if let Some(entry) = self.entries.get(key) {
            return Some(*entry);
        }
        if let CommandKey::Numeric(code) = key {
            if let Some((_, entry)) = self.ranges.iter().rev().find(|(r, _)| r.contains(code)) {
                return Some(*entry);
            }
        }
        self.parent.as_ref().and_then(|p| p.lookup(key))
    }

    /// Entries in this table only, excluding the parent.
    pub fn own_len(&self) -> usize {
        self.entries.len() + self.ranges.len()
    }

    /// Run the matching handler for `msg` against `state`.
    ///
    /// Events and replies are collected, not emitted, so the caller can
    /// release the state lock first. A handler error discards whatever the
    /// handler queued and reports a single diagnostic instead.
    pub fn run(&self, state: &mut ClientState, dialect: &dyn Dialect, msg: &Message) -> Dispatched {
        let key = CommandKey::of(&msg.command);
        let Some(entry) = self.lookup(&key) else {
            debug!(command = %msg.command, "unhandled command");
            return Dispatched::diagnostic(Diagnostic::Unhandled(msg.clone()));
        };

        if entry.phase == Phase::Registered {
            if !dialect.is_registered(state) {
                debug!(command = %msg.command, state = ?state.connection_state(), "ignored before registration");
                return Dispatched::diagnostic(Diagnostic::NotRegistered(msg.clone()));
            }
            if let Err(v) = check_numeric_target(state, msg) {
                warn!(error = %v, "protocol violation");
                return Dispatched::diagnostic(Diagnostic::ProtocolViolation(v));
            }
        }

        trace!(command = %msg.command, "dispatch");
        let mut ctx = Context::new(state);
        let result = (entry.handler)(&mut ctx, msg);
        ctx.state.collect_unplaced();
        match result {
            Ok(()) => ctx.finish(),
            Err(v) => {
                warn!(error = %v, "protocol violation");
                Dispatched::diagnostic(Diagnostic::ProtocolViolation(v))
            }
        }
    }
}

/// Numeric replies name their recipient first; it must be us (or `*`).
fn check_numeric_target(state: &ClientState, msg: &Message) -> HandlerResult {
    if msg.numeric().is_none() {
        return Ok(());
    }
    match msg.arg(0) {
        Some("*") => Ok(()),
        Some(target) if state.is_local_nick(target) => Ok(()),
        Some(target) => Err(ProtocolViolation::new(
            &msg.command,
            format!(
                "reply addressed to {} but local nickname is {}",
                target,
                state.local_nick()
            ),
        )),
        None => Err(ProtocolViolation::new(&msg.command, "missing target")),
    }
}

/// What a handler asks for while it holds the state.
pub struct Context<'a> {
    pub state: &'a mut ClientState,
    events: Vec<ClientEvent>,
    replies: Vec<String>,
}

impl<'a> Context<'a> {
    pub fn new(state: &'a mut ClientState) -> Self {
        Self {
            state,
            events: Vec::new(),
            replies: Vec::new(),
        }
    }

    /// Queue an event; emitted after the handler returns.
    pub fn emit(&mut self, event: ClientEvent) {
        self.events.push(event);
    }

    /// Queue a line to send back to the server.
    pub fn reply(&mut self, line: impl Into<String>) {
        self.replies.push(line.into());
    }

    fn finish(self) -> Dispatched {
        Dispatched {
            events: self.events,
            replies: self.replies,
        }
    }
}

/// Output of one dispatch, to be flushed outside the lock.
#[derive(Debug, Default)]
pub struct Dispatched {
    pub events: Vec<ClientEvent>,
    pub replies: Vec<String>,
}

impl Dispatched {
    fn diagnostic(d: Diagnostic) -> Self {
        Self {
            events: vec![ClientEvent::Diagnostic(d)],
            replies: Vec::new(),
        }
    }
}

/// The shared base table with every standard handler.
pub fn base_table() -> Arc<DispatchTable> {
    static BASE: OnceLock<Arc<DispatchTable>> = OnceLock::new();
    BASE.get_or_init(|| {
        let mut table = DispatchTable::new();
        handler::register_base(&mut table);
        Arc::new(table)
    })
    .clone()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::dialect::StandardDialect;
    use crate::client::registration::ConnectionState;
    use crate::config::UserTracking;

    fn registered_state() -> ClientState {
        let mut s = ClientState::new("me", UserTracking::RetainUntilQuit);
        s.set_connection(ConnectionState::Connecting).unwrap();
        s.set_connection(ConnectionState::Registering).unwrap();
        s.set_connection(ConnectionState::Registered).unwrap();
        s
    }

    fn marker_a(ctx: &mut Context<'_>, _: &Message) -> HandlerResult {
        ctx.emit(ClientEvent::ServerError {
            message: "a".into(),
        });
        Ok(())
    }

    fn marker_b(ctx: &mut Context<'_>, _: &Message) -> HandlerResult {
        ctx.emit(ClientEvent::ServerError {
            message: "b".into(),
        });
        Ok(())
    }

    fn failing(ctx: &mut Context<'_>, msg: &Message) -> HandlerResult {
        ctx.emit(ClientEvent::YoureOper);
        Err(ProtocolViolation::new(&msg.command, "nope"))
    }

    fn msg(line: &str) -> Message {
        Message::parse(line).unwrap()
    }

    #[test]
    fn test_overlay_wins_over_parent() {
        let mut base = DispatchTable::new();
        base.register("FOO", Phase::Registration, marker_a);
        base.register("BAR", Phase::Registration, marker_a);
        let base = Arc::new(base);

        let mut variant = DispatchTable::overlay(base.clone());
        variant.register("foo", Phase::Registration, marker_b);

        let mut s = registered_state();
        let out = variant.run(&mut s, &StandardDialect, &msg("FOO"));
        assert_eq!(
            out.events,
            vec![ClientEvent::ServerError {
                message: "b".into()
            }]
        );
        let out = variant.run(&mut s, &StandardDialect, &msg("bar"));
        assert_eq!(
            out.events,
            vec![ClientEvent::ServerError {
                message: "a".into()
            }]
        );
        // The parent is untouched.
        let out = base.run(&mut s, &StandardDialect, &msg("FOO"));
        assert_eq!(
            out.events,
            vec![ClientEvent::ServerError {
                message: "a".into()
            }]
        );
    }

    #[test]
    fn test_unmatched_yields_one_unhandled() {
        let table = DispatchTable::new();
        let mut s = registered_state();
        let m = msg(":srv XYZZY a b");
        let out = table.run(&mut s, &StandardDialect, &m);
        assert_eq!(out.events, vec![ClientEvent::Diagnostic(Diagnostic::Unhandled(m))]);
        assert!(out.replies.is_empty());
    }

    #[test]
    fn test_exact_entry_beats_range() {
        let mut table = DispatchTable::new();
        table.register_range(400..=599, Phase::Registration, marker_a);
        table.register(433u16, Phase::Registration, marker_b);
        let mut s = registered_state();
        let out = table.run(&mut s, &StandardDialect, &msg(":srv 433 me x :in use"));
        assert_eq!(
            out.events,
            vec![ClientEvent::ServerError {
                message: "b".into()
            }]
        );
        let out = table.run(&mut s, &StandardDialect, &msg(":srv 401 me x :no such nick"));
        assert_eq!(
            out.events,
            vec![ClientEvent::ServerError {
                message: "a".into()
            }]
        );
    }

    #[test]
    fn test_registered_phase_gated() {
        let mut table = DispatchTable::new();
        table.register("JOIN", Phase::Registered, marker_a);
        let mut s = ClientState::new("me", UserTracking::RetainUntilQuit);
        let m = msg(":a!b@c JOIN #x");
        let out = table.run(&mut s, &StandardDialect, &m);
        assert_eq!(out.events, vec![ClientEvent::Diagnostic(Diagnostic::NotRegistered(m))]);
    }

    #[test]
    fn test_numeric_for_someone_else_is_violation() {
        let mut table = DispatchTable::new();
        table.register(332u16, Phase::Registered, marker_a);
        let mut s = registered_state();
        let out = table.run(&mut s, &StandardDialect, &msg(":srv 332 notme #x :topic"));
        assert!(matches!(
            out.events.as_slice(),
            [ClientEvent::Diagnostic(Diagnostic::ProtocolViolation(_))]
        ));
        let out = table.run(&mut s, &StandardDialect, &msg(":srv 332 ME #x :topic"));
        assert_eq!(out.events.len(), 1);
        assert!(matches!(out.events[0], ClientEvent::ServerError { .. }));
    }

    #[test]
    fn test_failed_handler_discards_queued_output() {
        let mut table = DispatchTable::new();
        table.register("OOPS", Phase::Registration, failing);
        let mut s = registered_state();
        let out = table.run(&mut s, &StandardDialect, &msg("OOPS"));
        assert_eq!(
            out.events,
            vec![ClientEvent::Diagnostic(Diagnostic::ProtocolViolation(
                ProtocolViolation::new("OOPS", "nope")
            ))]
        );
    }

    #[test]
    fn test_base_table_is_shared() {
        let a = base_table();
        let b = base_table();
        assert!(Arc::ptr_eq(&a, &b));
        assert!(a.lookup(&CommandKey::of("privmsg")).is_some());
        assert!(a.lookup(&CommandKey::Numeric(482)).is_some());
        assert!(a.lookup(&CommandKey::of("NOSUCHCOMMAND")).is_none());
    }
}
