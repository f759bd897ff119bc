//! Membership, mode and topic handlers.

use chrono::{DateTime, Utc};
use tracing::debug;

use super::{require, require_source_nick, violation};
use crate::client::channel::Topic;
use crate::client::dispatch::{Context, HandlerResult};
use crate::client::ClientEvent;
use crate::error::ProtocolViolation;
use crate::irc::mode::parse_mode_changes;
use crate::irc::{Message, ModeChange, ModeKind, Prefix};

pub(crate) fn nick(ctx: &mut Context<'_>, msg: &Message) -> HandlerResult {
    let old = require_source_nick(msg)?;
    let new = require(msg, 0, "new nickname")?;

    if ctx.state.user_id(old).is_some() {
        if ctx.state.rename_user(old, new).is_none() {
            return Err(violation(
                msg,
                format!("{} cannot take the local nickname", old),
            ));
        }
    } else {
        ctx.state.ensure_user(new);
    }
    if let Some(id) = ctx.state.user_id(new) {
        if let Some(Prefix::User { user, host, .. }) = &msg.source {
            if let Some(u) = ctx.state.user_mut(id) {
                u.observe(user.as_deref(), host.as_deref(), None);
            }
        }
    }
    ctx.emit(ClientEvent::NickChanged {
        old: old.to_string(),
        new: new.to_string(),
    });
    Ok(())
}

pub(crate) fn join(ctx: &mut Context<'_>, msg: &Message) -> HandlerResult {
    let nick = require_source_nick(msg)?;
    let channels = require(msg, 0, "channel")?;
    // extended-join carries the real name as the third argument.
    let real_name = msg.arg(2);

    let id = ctx
        .state
        .observe_source(msg.source.as_ref())
        .unwrap_or_else(|| ctx.state.ensure_user(nick));
    if let Some(u) = ctx.state.user_mut(id) {
        u.observe(None, None, real_name);
    }
    for channel in channels.split(',').filter(|c| !c.is_empty()) {
        if ctx.state.join(channel, id) {
            ctx.emit(ClientEvent::UserJoinedChannel {
                channel: channel.to_string(),
                nick: nick.to_string(),
            });
        } else {
            debug!(channel, nick, "duplicate join");
        }
    }
    Ok(())
}

pub(crate) fn part(ctx: &mut Context<'_>, msg: &Message) -> HandlerResult {
    let nick = require_source_nick(msg)?;
    let channels = require(msg, 0, "channel")?;
    let reason = msg.arg(1).map(str::to_string);
    let id = ctx
        .state
        .user_id(nick)
        .ok_or_else(|| violation(msg, format!("unknown user {}", nick)))?;

    for channel in channels.split(',').filter(|c| !c.is_empty()) {
        if ctx.state.part(channel, id) {
            ctx.emit(ClientEvent::UserPartedChannel {
                channel: channel.to_string(),
                nick: nick.to_string(),
                reason: reason.clone(),
            });
        } else {
            debug!(channel, nick, "part from channel not tracked");
        }
    }
    Ok(())
}

pub(crate) fn kick(ctx: &mut Context<'_>, msg: &Message) -> HandlerResult {
    let channel = require(msg, 0, "channel")?;
    let target = require(msg, 1, "kicked nickname")?;
    let reason = msg.arg(2).map(str::to_string);
    let id = ctx
        .state
        .user_id(target)
        .ok_or_else(|| violation(msg, format!("unknown user {}", target)))?;

    ctx.state.observe_source(msg.source.as_ref());
    ctx.state.part(channel, id);
    ctx.emit(ClientEvent::UserKicked {
        channel: channel.to_string(),
        nick: target.to_string(),
        by: msg.source_nick().map(str::to_string),
        reason,
    });
    Ok(())
}

pub(crate) fn quit(ctx: &mut Context<'_>, msg: &Message) -> HandlerResult {
    let nick = require_source_nick(msg)?;
    let reason = msg.arg(0).map(str::to_string);
    let channels = match ctx.state.user_id(nick) {
        Some(id) => ctx.state.remove_user(id),
        None => Vec::new(),
    };
    ctx.emit(ClientEvent::UserQuit {
        nick: nick.to_string(),
        reason,
        channels,
    });
    Ok(())
}

pub(crate) fn kill(ctx: &mut Context<'_>, msg: &Message) -> HandlerResult {
    let target = require(msg, 0, "target")?;
    let reason = msg.arg(1).map(str::to_string);
    let by = msg.source.as_ref().map(|p| p.name().to_string());

    if ctx.state.is_local_nick(target) {
        ctx.emit(ClientEvent::Killed { by, reason });
        return Ok(());
    }
    let channels = match ctx.state.user_id(target) {
        Some(id) => ctx.state.remove_user(id),
        None => Vec::new(),
    };
    ctx.emit(ClientEvent::UserQuit {
        nick: target.to_string(),
        reason,
        channels,
    });
    Ok(())
}

pub(crate) fn mode(ctx: &mut Context<'_>, msg: &Message) -> HandlerResult {
    let target = require(msg, 0, "target")?;
    let modes = require(msg, 1, "mode string")?;
    let args = msg.args().skip(2);

    if ctx.state.is_channel_name(target) {
        let features = &ctx.state.features;
        let changes = parse_mode_changes(modes, args, |c| features.mode_kind(c))?;
        apply_channel_modes(ctx, target, &changes);
        ctx.state.observe_source(msg.source.as_ref());
        ctx.emit(ClientEvent::ChannelModeChanged {
            channel: target.to_string(),
            by: msg.source.clone(),
            changes,
        });
    } else {
        if !ctx.state.is_local_nick(target) {
            return Err(violation(msg, format!("user mode for {}", target)));
        }
        let changes = parse_mode_changes(modes, args, |_| ModeKind::Flag)?;
        apply_user_modes(ctx, &changes);
        ctx.emit(ClientEvent::UserModeChanged {
            nick: target.to_string(),
            changes,
        });
    }
    Ok(())
}

/// Apply parsed changes to a known channel. Unknown channels and members
/// are skipped; the server is authoritative.
fn apply_channel_modes(ctx: &mut Context<'_>, channel: &str, changes: &[ModeChange]) {
    let member_ids: Vec<_> = changes
        .iter()
        .map(|c| match (c.kind, c.arg.as_deref()) {
            (ModeKind::Membership, Some(nick)) => ctx.state.user_id(nick),
            _ => None,
        })
        .collect();

    let Some(ch) = ctx.state.channel_mut(channel) else {
        debug!(channel, "mode change for channel not tracked");
        return;
    };
    for (change, member) in changes.iter().zip(member_ids) {
        match change.kind {
            ModeKind::Membership => {
                let Some(cu) = member.and_then(|id| ch.member_mut(id)) else {
                    debug!(channel, %change, "membership mode for non-member");
                    continue;
                };
                if change.adding {
                    cu.modes.insert(change.mode);
                } else {
                    cu.modes.remove(&change.mode);
                }
            }
            ModeKind::List => {
                let Some(mask) = &change.arg else { continue };
                let list = ch.lists.entry(change.mode).or_default();
                if change.adding {
                    list.insert(mask.clone());
                } else {
                    list.remove(mask);
                }
            }
            ModeKind::AlwaysArg | ModeKind::ArgOnSet | ModeKind::Flag => {
                if change.adding {
                    ch.modes.insert(change.mode, change.arg.clone());
                } else {
                    ch.modes.remove(&change.mode);
                }
            }
        }
    }
}

fn apply_user_modes(ctx: &mut Context<'_>, changes: &[ModeChange]) {
    let local = &mut ctx.state.local;
    for change in changes {
        if change.adding {
            local.modes.insert(change.mode);
        } else {
            local.modes.remove(&change.mode);
        }
    }
    local.is_operator = local.modes.contains(&'o') || local.modes.contains(&'O');
}

pub(crate) fn topic(ctx: &mut Context<'_>, msg: &Message) -> HandlerResult {
    let channel = require(msg, 0, "channel")?;
    let text = msg.arg(1).unwrap_or_default();
    let topic = (!text.is_empty()).then(|| Topic {
        text: text.to_string(),
        set_by: msg.source.as_ref().map(|p| p.name().to_string()),
        set_at: Some(Utc::now()),
    });

    ctx.state.observe_source(msg.source.as_ref());
    if let Some(ch) = ctx.state.channel_mut(channel) {
        ch.topic = topic.clone();
    }
    ctx.emit(ClientEvent::TopicChanged {
        channel: channel.to_string(),
        topic,
    });
    Ok(())
}

pub(crate) fn user_mode_is(ctx: &mut Context<'_>, msg: &Message) -> HandlerResult {
    let modes = require(msg, 1, "mode string")?;
    let local = &mut ctx.state.local;
    local.modes = modes.chars().filter(|c| *c != '+').collect();
    local.is_operator = local.modes.contains(&'o') || local.modes.contains(&'O');
    Ok(())
}

/// RPL_CHANNELMODEIS replaces the channel's non-list modes.
pub(crate) fn channel_mode_is(ctx: &mut Context<'_>, msg: &Message) -> HandlerResult {
    let channel = require(msg, 1, "channel")?;
    let modes = require(msg, 2, "mode string")?;
    let features = &ctx.state.features;
    let changes = parse_mode_changes(modes, msg.args().skip(3), |c| features.mode_kind(c))?;

    if let Some(ch) = ctx.state.channel_mut(channel) {
        ch.modes = changes
            .iter()
            .filter(|c| c.adding && !matches!(c.kind, ModeKind::List | ModeKind::Membership))
            .map(|c| (c.mode, c.arg.clone()))
            .collect();
    }
    ctx.emit(ClientEvent::ChannelModeChanged {
        channel: channel.to_string(),
        by: None,
        changes,
    });
    Ok(())
}

fn parse_timestamp(msg: &Message, raw: &str) -> Result<DateTime<Utc>, ProtocolViolation> {
    raw.parse::<i64>()
        .ok()
        .and_then(|secs| DateTime::from_timestamp(secs, 0))
        .ok_or_else(|| violation(msg, format!("bad timestamp {}", raw)))
}

pub(crate) fn creation_time(ctx: &mut Context<'_>, msg: &Message) -> HandlerResult {
    let channel = require(msg, 1, "channel")?;
    let at = parse_timestamp(msg, require(msg, 2, "timestamp")?)?;
    if let Some(ch) = ctx.state.channel_mut(channel) {
        ch.created_at = Some(at);
    }
    ctx.emit(ClientEvent::ChannelCreated {
        channel: channel.to_string(),
        at,
    });
    Ok(())
}

pub(crate) fn no_topic(ctx: &mut Context<'_>, msg: &Message) -> HandlerResult {
    let channel = require(msg, 1, "channel")?;
    if let Some(ch) = ctx.state.channel_mut(channel) {
        ch.topic = None;
    }
    ctx.emit(ClientEvent::TopicChanged {
        channel: channel.to_string(),
        topic: None,
    });
    Ok(())
}

pub(crate) fn topic_reply(ctx: &mut Context<'_>, msg: &Message) -> HandlerResult {
    let channel = require(msg, 1, "channel")?;
    let text = require(msg, 2, "topic")?;
    let topic = Topic {
        text: text.to_string(),
        set_by: None,
        set_at: None,
    };
    if let Some(ch) = ctx.state.channel_mut(channel) {
        ch.topic = Some(topic.clone());
    }
    ctx.emit(ClientEvent::TopicChanged {
        channel: channel.to_string(),
        topic: Some(topic),
    });
    Ok(())
}

pub(crate) fn topic_who_time(ctx: &mut Context<'_>, msg: &Message) -> HandlerResult {
    let channel = require(msg, 1, "channel")?;
    let setter = require(msg, 2, "setter")?;
    let at = parse_timestamp(msg, require(msg, 3, "timestamp")?)?;

    let Some(ch) = ctx.state.channel_mut(channel) else {
        return Ok(());
    };
    let Some(topic) = ch.topic.as_mut() else {
        return Ok(());
    };
    topic.set_by = Some(setter.to_string());
    topic.set_at = Some(at);
    let topic = topic.clone();
    ctx.emit(ClientEvent::TopicChanged {
        channel: channel.to_string(),
        topic: Some(topic),
    });
    Ok(())
}

/// RPL_NAMREPLY, with multi-prefix and userhost-in-names entries.
pub(crate) fn names_reply(ctx: &mut Context<'_>, msg: &Message) -> HandlerResult {
    // RFC 2812 puts a visibility symbol before the channel; RFC 1459 does not.
    let (channel, names) = if msg.arg_count() >= 4 {
        (require(msg, 2, "channel")?, require(msg, 3, "names")?)
    } else {
        (require(msg, 1, "channel")?, require(msg, 2, "names")?)
    };

    let mut entries = Vec::new();
    for entry in names.split_whitespace() {
        let (modes, rest) = ctx.state.features.split_symbols(entry);
        let (nick, user, host) = match Prefix::parse(rest) {
            Prefix::User { nick, user, host } => (nick, user, host),
            Prefix::Server(name) => (name, None, None),
        };
        let id = ctx.state.ensure_user(&nick);
        if let Some(u) = ctx.state.user_mut(id) {
            u.observe(user.as_deref(), host.as_deref(), None);
        }
        let ch = ctx.state.ensure_channel(channel);
        ch.add_member(id);
        if let Some(cu) = ch.member_mut(id) {
            cu.modes.extend(modes);
        }
        entries.push(nick);
    }

    let key = ctx.state.fold(channel);
    let (_, pending) = ctx
        .state
        .pending
        .names
        .entry(key)
        .or_insert_with(|| (channel.to_string(), Default::default()));
    for nick in entries {
        pending.push(nick);
    }
    Ok(())
}

pub(crate) fn end_of_names(ctx: &mut Context<'_>, msg: &Message) -> HandlerResult {
    let channel = require(msg, 1, "channel")?;
    let key = ctx.state.fold(channel);
    let nicks = ctx
        .state
        .pending
        .names
        .remove(&key)
        .map(|(_, mut lines)| lines.finish())
        .unwrap_or_default();
    ctx.emit(ClientEvent::NamesReceived {
        channel: channel.to_string(),
        nicks,
    });
    Ok(())
}

pub(crate) fn ban_list(ctx: &mut Context<'_>, msg: &Message) -> HandlerResult {
    let channel = require(msg, 1, "channel")?;
    let mask = require(msg, 2, "ban mask")?;
    let key = ctx.state.fold(channel);
    let (_, pending) = ctx
        .state
        .pending
        .bans
        .entry(key)
        .or_insert_with(|| (channel.to_string(), Default::default()));
    pending.push(mask.to_string());
    Ok(())
}

/// RPL_ENDOFBANLIST replaces the channel's `b` list wholesale.
pub(crate) fn end_of_ban_list(ctx: &mut Context<'_>, msg: &Message) -> HandlerResult {
    let channel = require(msg, 1, "channel")?;
    let key = ctx.state.fold(channel);
    let masks = ctx
        .state
        .pending
        .bans
        .remove(&key)
        .map(|(_, mut lines)| lines.finish())
        .unwrap_or_default();
    if let Some(ch) = ctx.state.channel_mut(channel) {
        ch.lists.insert('b', masks.iter().cloned().collect());
    }
    ctx.emit(ClientEvent::BanListReceived {
        channel: channel.to_string(),
        masks,
    });
    Ok(())
}
