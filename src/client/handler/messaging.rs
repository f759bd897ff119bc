//! PRIVMSG/NOTICE delivery and presence replies.

use super::{require, violation};
use crate::client::dispatch::{Context, HandlerResult};
use crate::client::event::MessageTarget;
use crate::client::state::ClientState;
use crate::client::ClientEvent;
use crate::error::ProtocolViolation;
use crate::irc::Message;

fn classify_targets(state: &ClientState, targets: &str) -> Vec<MessageTarget> {
    targets
        .split(',')
        .filter(|t| !t.is_empty())
        .map(|t| {
            if state.is_channel_name(t) {
                MessageTarget::Channel(t.to_string())
            } else if state.is_local_nick(t) {
                MessageTarget::LocalUser
            } else {
                MessageTarget::Other(t.to_string())
            }
        })
        .collect()
}

/// Shared by PRIVMSG and NOTICE: targets, then text.
fn delivery(
    ctx: &mut Context<'_>,
    msg: &Message,
) -> Result<(Vec<MessageTarget>, String), ProtocolViolation> {
    let targets = require(msg, 0, "target")?;
    let text = require(msg, 1, "text")?;
    let targets = classify_targets(ctx.state, targets);
    if targets.is_empty() {
        return Err(violation(msg, "empty target list"));
    }
    ctx.state.observe_source(msg.source.as_ref());
    Ok((targets, text.to_string()))
}

pub(crate) fn privmsg(ctx: &mut Context<'_>, msg: &Message) -> HandlerResult {
    let (targets, text) = delivery(ctx, msg)?;
    ctx.emit(ClientEvent::MessageReceived {
        source: msg.source.clone(),
        targets,
        text,
    });
    Ok(())
}

/// Runs before registration too, where servers address `*` or `AUTH`.
pub(crate) fn notice(ctx: &mut Context<'_>, msg: &Message) -> HandlerResult {
    let (targets, text) = delivery(ctx, msg)?;
    ctx.emit(ClientEvent::NoticeReceived {
        source: msg.source.clone(),
        targets,
        text,
    });
    Ok(())
}

pub(crate) fn invite(ctx: &mut Context<'_>, msg: &Message) -> HandlerResult {
    let channel = require(msg, 1, "channel")?;
    ctx.state.observe_source(msg.source.as_ref());
    ctx.emit(ClientEvent::Invited {
        by: msg.source_nick().map(str::to_string),
        channel: channel.to_string(),
    });
    Ok(())
}

pub(crate) fn pong(ctx: &mut Context<'_>, msg: &Message) -> HandlerResult {
    ctx.emit(ClientEvent::Pong {
        server: msg.arg(0).map(str::to_string),
        token: msg.arg(1).map(str::to_string),
    });
    Ok(())
}

pub(crate) fn wallops(ctx: &mut Context<'_>, msg: &Message) -> HandlerResult {
    let text = msg
        .last_arg()
        .ok_or_else(|| violation(msg, "missing text"))?;
    ctx.emit(ClientEvent::Wallops {
        source: msg.source.clone(),
        text: text.to_string(),
    });
    Ok(())
}

/// RPL_AWAY, either after a PRIVMSG or inside a WHOIS reply.
pub(crate) fn away(ctx: &mut Context<'_>, msg: &Message) -> HandlerResult {
    let nick = require(msg, 1, "nickname")?;
    let message = msg.arg(2).unwrap_or_default().to_string();

    if let Some(id) = ctx.state.user_id(nick) {
        if let Some(user) = ctx.state.user_mut(id) {
            user.is_away = true;
            user.away_message = Some(message.clone());
        }
    }
    let key = ctx.state.fold(nick);
    if let Some(whois) = ctx.state.pending.whois.get_mut(&key) {
        whois.away_message = Some(message.clone());
    }
    ctx.emit(ClientEvent::AwayReply {
        nick: nick.to_string(),
        message,
    });
    Ok(())
}

pub(crate) fn ison(ctx: &mut Context<'_>, msg: &Message) -> HandlerResult {
    let nicks = msg
        .args()
        .skip(1)
        .flat_map(str::split_whitespace)
        .map(str::to_string)
        .collect();
    ctx.emit(ClientEvent::IsOn { nicks });
    Ok(())
}

fn set_local_away(ctx: &mut Context<'_>, away: bool) {
    ctx.state.local.is_away = away;
    let id = ctx.state.local.id;
    if let Some(user) = ctx.state.user_mut(id) {
        user.is_away = away;
        if !away {
            user.away_message = None;
        }
    }
    ctx.emit(ClientEvent::LocalAwayChanged { away });
}

pub(crate) fn unaway(ctx: &mut Context<'_>, _msg: &Message) -> HandlerResult {
    set_local_away(ctx, false);
    Ok(())
}

pub(crate) fn now_away(ctx: &mut Context<'_>, _msg: &Message) -> HandlerResult {
    set_local_away(ctx, true);
    Ok(())
}

pub(crate) fn youre_oper(ctx: &mut Context<'_>, _msg: &Message) -> HandlerResult {
    ctx.state.local.is_operator = true;
    ctx.state.local.modes.insert('o');
    let id = ctx.state.local.id;
    if let Some(user) = ctx.state.user_mut(id) {
        user.is_operator = true;
    }
    ctx.emit(ClientEvent::YoureOper);
    Ok(())
}

pub(crate) fn time(ctx: &mut Context<'_>, msg: &Message) -> HandlerResult {
    let server = require(msg, 1, "server")?;
    let time = msg.last_arg().unwrap_or_default();
    ctx.emit(ClientEvent::ServerTime {
        server: server.to_string(),
        time: time.to_string(),
    });
    Ok(())
}
