//! Replies to queries: LUSERS, WHOIS, WHO, LIST, LINKS, INFO, MOTD and STATS.
//!
//! Multi-line replies accumulate in the state's pending buffers and are
//! handed out as one event on the end marker.

use chrono::DateTime;
use tracing::debug;

use super::{require, violation};
use crate::client::dispatch::{Context, HandlerResult};
use crate::client::info::{ChannelInfo, NetworkInfo, Server, StatisticalEntry, WhoEntry, WhoisInfo};
use crate::client::ClientEvent;
use crate::irc::Message;

fn parse_count(msg: &Message, index: usize) -> Result<u32, crate::error::ProtocolViolation> {
    let raw = require(msg, index, "count")?;
    raw.parse()
        .map_err(|_| violation(msg, format!("bad count {}", raw)))
}

// ----- LUSERS -----

pub(crate) fn luser_client(ctx: &mut Context<'_>, msg: &Message) -> HandlerResult {
    let text = require(msg, 1, "summary")?;
    ctx.state
        .pending
        .network
        .get_or_insert_with(NetworkInfo::default)
        .summary = Some(text.to_string());
    Ok(())
}

/// 252, 253 and 254 all carry a single count.
pub(crate) fn luser_count(ctx: &mut Context<'_>, msg: &Message) -> HandlerResult {
    let count = parse_count(msg, 1)?;
    let info = ctx
        .state
        .pending
        .network
        .get_or_insert_with(NetworkInfo::default);
    match msg.numeric() {
        Some(252) => info.operators = Some(count),
        Some(253) => info.unknown_connections = Some(count),
        _ => info.channels = Some(count),
    }
    Ok(())
}

/// RPL_LUSERME closes the sequence.
pub(crate) fn luser_me(ctx: &mut Context<'_>, msg: &Message) -> HandlerResult {
    let text = require(msg, 1, "summary")?;
    let mut info = ctx.state.pending.network.take().unwrap_or_default();
    info.local_summary = Some(text.to_string());
    ctx.state.network_info = Some(info.clone());
    ctx.emit(ClientEvent::NetworkInfoReceived(info));
    Ok(())
}

// ----- WHOIS -----

fn whois_entry<'s>(ctx: &'s mut Context<'_>, nick: &str) -> &'s mut WhoisInfo {
    let key = ctx.state.fold(nick);
    ctx.state
        .pending
        .whois
        .entry(key)
        .or_insert_with(|| WhoisInfo {
            nick: nick.to_string(),
            ..WhoisInfo::default()
        })
}

pub(crate) fn whois_user(ctx: &mut Context<'_>, msg: &Message) -> HandlerResult {
    let nick = require(msg, 1, "nickname")?;
    let user = require(msg, 2, "user name")?;
    let host = require(msg, 3, "host name")?;
    let real = msg.arg(5).or_else(|| msg.last_arg()).unwrap_or_default();

    // WHOIS names a live user, so it gets an entry.
    let id = ctx.state.ensure_user(nick);
    if let Some(u) = ctx.state.user_mut(id) {
        u.observe(Some(user), Some(host), Some(real));
    }
    let entry = whois_entry(ctx, nick);
    entry.user_name = Some(user.to_string());
    entry.host_name = Some(host.to_string());
    entry.real_name = Some(real.to_string());
    Ok(())
}

pub(crate) fn whois_server(ctx: &mut Context<'_>, msg: &Message) -> HandlerResult {
    let nick = require(msg, 1, "nickname")?;
    let server = require(msg, 2, "server")?;
    if let Some(id) = ctx.state.user_id(nick) {
        if let Some(u) = ctx.state.user_mut(id) {
            u.server_name = Some(server.to_string());
        }
    }
    let entry = whois_entry(ctx, nick);
    entry.server = Some(server.to_string());
    entry.server_info = msg.arg(3).map(str::to_string);
    Ok(())
}

pub(crate) fn whois_operator(ctx: &mut Context<'_>, msg: &Message) -> HandlerResult {
    let nick = require(msg, 1, "nickname")?;
    if let Some(id) = ctx.state.user_id(nick) {
        if let Some(u) = ctx.state.user_mut(id) {
            u.is_operator = true;
        }
    }
    whois_entry(ctx, nick).is_operator = true;
    Ok(())
}

pub(crate) fn whois_idle(ctx: &mut Context<'_>, msg: &Message) -> HandlerResult {
    let nick = require(msg, 1, "nickname")?;
    let raw = require(msg, 2, "idle seconds")?;
    let idle: u64 = raw
        .parse()
        .map_err(|_| violation(msg, format!("bad idle time {}", raw)))?;
    // Sign-on time is an optional extension; the last argument is prose.
    let signed_on = (msg.arg_count() > 4)
        .then(|| msg.arg(3))
        .flatten()
        .and_then(|s| s.parse::<i64>().ok())
        .and_then(|secs| DateTime::from_timestamp(secs, 0));

    if let Some(id) = ctx.state.user_id(nick) {
        if let Some(u) = ctx.state.user_mut(id) {
            u.idle_seconds = Some(idle);
        }
    }
    let entry = whois_entry(ctx, nick);
    entry.idle_seconds = Some(idle);
    entry.signed_on = signed_on;
    Ok(())
}

pub(crate) fn whois_channels(ctx: &mut Context<'_>, msg: &Message) -> HandlerResult {
    let nick = require(msg, 1, "nickname")?;
    let channels = require(msg, 2, "channels")?;
    whois_entry(ctx, nick)
        .channels
        .extend(channels.split_whitespace().map(str::to_string));
    Ok(())
}

pub(crate) fn end_of_whois(ctx: &mut Context<'_>, msg: &Message) -> HandlerResult {
    let nick = require(msg, 1, "nickname")?;
    let key = ctx.state.fold(nick);
    let info = ctx
        .state
        .pending
        .whois
        .remove(&key)
        .unwrap_or_else(|| WhoisInfo {
            nick: nick.to_string(),
            ..WhoisInfo::default()
        });
    ctx.emit(ClientEvent::WhoisReceived(info));
    Ok(())
}

// ----- WHO -----

/// `<me> <channel> <user> <host> <server> <nick> <H|G>[*][@|+] :<hops> <real name>`
pub(crate) fn who_reply(ctx: &mut Context<'_>, msg: &Message) -> HandlerResult {
    let channel = require(msg, 1, "channel")?;
    let user = require(msg, 2, "user name")?;
    let host = require(msg, 3, "host name")?;
    let server = require(msg, 4, "server")?;
    let nick = require(msg, 5, "nickname")?;
    let flags = require(msg, 6, "flags")?;
    let trailing = msg.arg(7).unwrap_or_default();
    let (hops, real) = trailing.split_once(' ').unwrap_or((trailing, ""));
    let hop_count = hops.parse::<u32>().ok();

    let mut status = flags.chars();
    let is_away = status.next() == Some('G');
    let rest: String = status.collect();
    let is_operator = rest.starts_with('*');
    let (modes, _) = ctx
        .state
        .features
        .split_symbols(rest.trim_start_matches('*'));
    let channel = (channel != "*").then(|| channel.to_string());

    let id = ctx.state.ensure_user(nick);
    if let Some(u) = ctx.state.user_mut(id) {
        u.observe(Some(user), Some(host), Some(real));
        u.server_name = Some(server.to_string());
        u.hop_count = hop_count;
        u.is_away = is_away;
        u.is_operator = is_operator;
    }
    if let Some(name) = &channel {
        if let Some(cu) = ctx
            .state
            .channel_mut(name)
            .and_then(|ch| ch.member_mut(id))
        {
            cu.modes.extend(modes);
        }
    }
    ctx.state.pending.who.push(WhoEntry {
        channel,
        nick: nick.to_string(),
        user_name: user.to_string(),
        host_name: host.to_string(),
        server: server.to_string(),
        is_away,
        is_operator,
        hop_count,
        real_name: real.to_string(),
    });
    Ok(())
}

pub(crate) fn end_of_who(ctx: &mut Context<'_>, msg: &Message) -> HandlerResult {
    let mask = msg.arg(1).unwrap_or("*").to_string();
    let entries = ctx.state.pending.who.finish();
    ctx.emit(ClientEvent::WhoReceived { mask, entries });
    Ok(())
}

// ----- LIST -----

pub(crate) fn list_start(ctx: &mut Context<'_>, _msg: &Message) -> HandlerResult {
    ctx.state.pending.list.begin();
    Ok(())
}

pub(crate) fn list_entry(ctx: &mut Context<'_>, msg: &Message) -> HandlerResult {
    let name = require(msg, 1, "channel")?;
    let visible_users = parse_count(msg, 2)?;
    let topic = msg.arg(3).unwrap_or_default().to_string();
    ctx.state.pending.list.push(ChannelInfo {
        name: name.to_string(),
        visible_users,
        topic,
    });
    Ok(())
}

pub(crate) fn list_end(ctx: &mut Context<'_>, _msg: &Message) -> HandlerResult {
    let channels = ctx.state.pending.list.finish();
    ctx.emit(ClientEvent::ChannelListReceived(channels));
    Ok(())
}

// ----- LINKS -----

/// `<me> <mask> <server> :<hopcount> <server info>`
pub(crate) fn links(ctx: &mut Context<'_>, msg: &Message) -> HandlerResult {
    let name = require(msg, 1, "server")?;
    let hub = require(msg, 2, "hub")?;
    let trailing = msg.arg(3).unwrap_or_default();
    let (hops, info) = trailing.split_once(' ').unwrap_or((trailing, ""));
    let hop_count = hops
        .parse()
        .map_err(|_| violation(msg, format!("bad hop count {}", hops)))?;
    ctx.state.pending.links.push(Server {
        name: name.to_string(),
        hub: hub.to_string(),
        hop_count,
        info: info.to_string(),
    });
    Ok(())
}

pub(crate) fn end_of_links(ctx: &mut Context<'_>, _msg: &Message) -> HandlerResult {
    let servers = ctx.state.pending.links.finish();
    ctx.state.servers = servers.clone();
    ctx.emit(ClientEvent::LinksReceived(servers));
    Ok(())
}

// ----- INFO and MOTD -----

pub(crate) fn info_start(ctx: &mut Context<'_>, _msg: &Message) -> HandlerResult {
    ctx.state.pending.info.begin();
    Ok(())
}

pub(crate) fn info_line(ctx: &mut Context<'_>, msg: &Message) -> HandlerResult {
    let line = msg.arg(1).unwrap_or_default().to_string();
    ctx.state.pending.info.push(line);
    Ok(())
}

pub(crate) fn end_of_info(ctx: &mut Context<'_>, _msg: &Message) -> HandlerResult {
    let lines = ctx.state.pending.info.finish();
    ctx.emit(ClientEvent::InfoReceived { lines });
    Ok(())
}

pub(crate) fn motd_start(ctx: &mut Context<'_>, _msg: &Message) -> HandlerResult {
    ctx.state.pending.motd.begin();
    Ok(())
}

pub(crate) fn motd_line(ctx: &mut Context<'_>, msg: &Message) -> HandlerResult {
    let raw = msg.arg(1).unwrap_or_default();
    let line = raw
        .strip_prefix("- ")
        .or_else(|| raw.strip_prefix('-'))
        .unwrap_or(raw);
    ctx.state.pending.motd.push(line.to_string());
    Ok(())
}

/// RPL_ENDOFMOTD or ERR_NOMOTD.
pub(crate) fn motd_end(ctx: &mut Context<'_>, _msg: &Message) -> HandlerResult {
    if !ctx.state.pending.motd.is_open() {
        debug!("end of MOTD with no MOTD lines");
    }
    let lines = ctx.state.pending.motd.finish();
    ctx.state.motd = lines.clone();
    ctx.emit(ClientEvent::MotdReceived { lines });
    Ok(())
}

// ----- STATS -----

pub(crate) fn stats_line(ctx: &mut Context<'_>, msg: &Message) -> HandlerResult {
    let code = msg
        .numeric()
        .ok_or_else(|| violation(msg, "not a numeric reply"))?;
    let params = msg.args().skip(1).map(str::to_string).collect();
    ctx.state
        .pending
        .stats
        .push(StatisticalEntry { code, params });
    Ok(())
}

pub(crate) fn end_of_stats(ctx: &mut Context<'_>, _msg: &Message) -> HandlerResult {
    let entries = ctx.state.pending.stats.finish();
    ctx.emit(ClientEvent::StatsReceived(entries));
    Ok(())
}
