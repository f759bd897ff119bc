//! Server dialects.
//!
//! A dialect adjusts the dispatch table and the registration gate for servers
//! that deviate from RFC 2812, reusing every other handler unchanged.

use std::fmt;
use std::sync::Arc;

use crate::client::dispatch::{base_table, Context, DispatchTable, HandlerResult, Phase};
use crate::client::handler::{query, registration};
use crate::client::registration::ConnectionState;
use crate::client::state::ClientState;
use crate::config::DialectKind;
use crate::irc::numeric::*;
use crate::irc::Message;

pub trait Dialect: Send + Sync + fmt::Debug {
    fn name(&self) -> &'static str;

    /// Add or replace entries. The table already falls back to the base.
    fn overlay(&self, _table: &mut DispatchTable) {}

    /// Whether registered-phase handlers may run.
    fn is_registered(&self, state: &ClientState) -> bool {
        state.connection_state() == ConnectionState::Registered
    }
}

/// RFC 2812 behaviour: registration completes on RPL_WELCOME or RPL_YOURESERVICE.
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardDialect;

impl Dialect for StandardDialect {
    fn name(&self) -> &'static str {
        "standard"
    }
}

/// For servers that never send RPL_WELCOME. Registration completes when the
/// MOTD ends (or the server reports there is none).
#[derive(Debug, Clone, Copy, Default)]
pub struct MotdRegistrationDialect;

impl Dialect for MotdRegistrationDialect {
    fn name(&self) -> &'static str {
        "motd_registration"
    }

    fn overlay(&self, table: &mut DispatchTable) {
        table
            .register(RPL_MOTDSTART, Phase::Registration, query::motd_start)
            .register(RPL_MOTD, Phase::Registration, query::motd_line)
            .register(RPL_ENDOFMOTD, Phase::Registration, end_of_motd)
            .register(ERR_NOMOTD, Phase::Registration, end_of_motd);
    }
}

fn end_of_motd(ctx: &mut Context<'_>, msg: &Message) -> HandlerResult {
    if ctx.state.connection_state() == ConnectionState::Registering {
        registration::complete_registration(ctx, msg)?;
    }
    query::motd_end(ctx, msg)
}

/// Build the dispatch table for `dialect`: an overlay on the shared base.
pub fn build_table(dialect: &dyn Dialect) -> Arc<DispatchTable> {
    let mut table = DispatchTable::overlay(base_table());
    dialect.overlay(&mut table);
    if table.own_len() == 0 {
        return base_table();
    }
    Arc::new(table)
}

pub fn dialect_for(kind: DialectKind) -> Arc<dyn Dialect> {
    match kind {
        DialectKind::Standard => Arc::new(StandardDialect),
        DialectKind::MotdRegistration => Arc::new(MotdRegistrationDialect),
    }
}
