//! Handlers for the base dispatch table.
//!
//! Each handler reads what it needs from the message first and returns a
//! [`ProtocolViolation`] before touching state if anything is missing.

pub(crate) mod channel;
pub(crate) mod messaging;
pub(crate) mod query;
pub(crate) mod registration;

use crate::client::dispatch::{DispatchTable, Phase};
use crate::error::ProtocolViolation;
use crate::irc::numeric::*;
use crate::irc::Message;

/// Argument `index`, or a violation naming `what` is missing.
pub(crate) fn require<'m>(
    msg: &'m Message,
    index: usize,
    what: &str,
) -> Result<&'m str, ProtocolViolation> {
    msg.arg(index)
        .ok_or_else(|| ProtocolViolation::new(&msg.command, format!("missing {}", what)))
}

/// Nick of a user source, or a violation.
pub(crate) fn require_source_nick(msg: &Message) -> Result<&str, ProtocolViolation> {
    msg.source_nick()
        .ok_or_else(|| ProtocolViolation::new(&msg.command, "missing user source"))
}

pub(crate) fn violation(msg: &Message, reason: impl Into<String>) -> ProtocolViolation {
    ProtocolViolation::new(&msg.command, reason)
}

pub(crate) fn register_base(table: &mut DispatchTable) {
    use Phase::{Registered, Registration};

    // Handshake and anything the server may send before welcoming us.
    table
        .register("PING", Registration, registration::ping)
        .register("ERROR", Registration, registration::error)
        .register("NOTICE", Registration, messaging::notice)
        .register(RPL_WELCOME, Registration, registration::welcome)
        .register(RPL_YOURHOST, Registration, registration::your_host)
        .register(RPL_CREATED, Registration, registration::created)
        .register(RPL_MYINFO, Registration, registration::my_info)
        .register(RPL_ISUPPORT, Registration, registration::isupport)
        .register(RPL_YOURESERVICE, Registration, registration::youre_service)
        .register(ERR_ERRONEUSNICKNAME, Registration, registration::nick_rejected)
        .register(ERR_NICKNAMEINUSE, Registration, registration::nick_rejected)
        .register(ERR_NICKCOLLISION, Registration, registration::nick_rejected)
        .register(ERR_UNAVAILRESOURCE, Registration, registration::nick_rejected)
        .register(ERR_NOSUCHCHANNEL, Registration, registration::no_such_channel)
        .register_range(ERR_FIRST..=ERR_LAST, Registration, registration::error_reply);

    // Membership and channel state.
    table
        .register("NICK", Registered, channel::nick)
        .register("JOIN", Registered, channel::join)
        .register("PART", Registered, channel::part)
        .register("KICK", Registered, channel::kick)
        .register("QUIT", Registered, channel::quit)
        .register("KILL", Registered, channel::kill)
        .register("MODE", Registered, channel::mode)
        .register("TOPIC", Registered, channel::topic)
        .register(RPL_UMODEIS, Registered, channel::user_mode_is)
        .register(RPL_CHANNELMODEIS, Registered, channel::channel_mode_is)
        .register(RPL_CREATIONTIME, Registered, channel::creation_time)
        .register(RPL_NOTOPIC, Registered, channel::no_topic)
        .register(RPL_TOPIC, Registered, channel::topic_reply)
        .register(RPL_TOPICWHOTIME, Registered, channel::topic_who_time)
        .register(RPL_NAMREPLY, Registered, channel::names_reply)
        .register(RPL_ENDOFNAMES, Registered, channel::end_of_names)
        .register(RPL_BANLIST, Registered, channel::ban_list)
        .register(RPL_ENDOFBANLIST, Registered, channel::end_of_ban_list);

    // Messages and presence.
    table
        .register("PRIVMSG", Registered, messaging::privmsg)
        .register("INVITE", Registered, messaging::invite)
        .register("PONG", Registered, messaging::pong)
        .register("WALLOPS", Registered, messaging::wallops)
        .register(RPL_AWAY, Registered, messaging::away)
        .register(RPL_ISON, Registered, messaging::ison)
        .register(RPL_UNAWAY, Registered, messaging::unaway)
        .register(RPL_NOWAWAY, Registered, messaging::now_away)
        .register(RPL_YOUREOPER, Registered, messaging::youre_oper)
        .register(RPL_TIME, Registered, messaging::time);

    // Query replies.
    table
        .register(RPL_LUSERCLIENT, Registered, query::luser_client)
        .register(RPL_LUSEROP, Registered, query::luser_count)
        .register(RPL_LUSERUNKNOWN, Registered, query::luser_count)
        .register(RPL_LUSERCHANNELS, Registered, query::luser_count)
        .register(RPL_LUSERME, Registered, query::luser_me)
        .register(RPL_WHOISUSER, Registered, query::whois_user)
        .register(RPL_WHOISSERVER, Registered, query::whois_server)
        .register(RPL_WHOISOPERATOR, Registered, query::whois_operator)
        .register(RPL_WHOISIDLE, Registered, query::whois_idle)
        .register(RPL_WHOISCHANNELS, Registered, query::whois_channels)
        .register(RPL_ENDOFWHOIS, Registered, query::end_of_whois)
        .register(RPL_WHOREPLY, Registered, query::who_reply)
        .register(RPL_ENDOFWHO, Registered, query::end_of_who)
        .register(RPL_LISTSTART, Registered, query::list_start)
        .register(RPL_LIST, Registered, query::list_entry)
        .register(RPL_LISTEND, Registered, query::list_end)
        .register(RPL_LINKS, Registered, query::links)
        .register(RPL_ENDOFLINKS, Registered, query::end_of_links)
        .register(RPL_INFOSTART, Registered, query::info_start)
        .register(RPL_INFO, Registered, query::info_line)
        .register(RPL_ENDOFINFO, Registered, query::end_of_info)
        .register(RPL_MOTDSTART, Registered, query::motd_start)
        .register(RPL_MOTD, Registered, query::motd_line)
        .register(RPL_ENDOFMOTD, Registered, query::motd_end)
        .register(ERR_NOMOTD, Registered, query::motd_end)
        .register_range(RPL_STATSLINKINFO..=RPL_STATSYLINE, Registered, query::stats_line)
        .register_range(RPL_STATSVLINE..=RPL_STATSHLINE, Registered, query::stats_line)
        .register(RPL_ENDOFSTATS, Registered, query::end_of_stats);
}

#[cfg(test)]
pub(crate) mod test_support {
    use crate::client::dialect::{Dialect, StandardDialect};
    use crate::client::dispatch::{base_table, Dispatched};
    use crate::client::registration::ConnectionState;
    use crate::client::state::ClientState;
    use crate::client::ClientEvent;
    use crate::config::UserTracking;
    use crate::irc::Message;

    pub(crate) fn registered(tracking: UserTracking) -> ClientState {
        let mut s = ClientState::new("me", tracking);
        s.set_connection(ConnectionState::Connecting).unwrap();
        s.set_connection(ConnectionState::Registering).unwrap();
        s.set_connection(ConnectionState::Registered).unwrap();
        s
    }

    pub(crate) fn feed_with(state: &mut ClientState, dialect: &dyn Dialect, line: &str) -> Dispatched {
        let msg = Message::parse(line).unwrap();
        crate::client::dialect::build_table(dialect).run(state, dialect, &msg)
    }

    pub(crate) fn feed(state: &mut ClientState, line: &str) -> Vec<ClientEvent> {
        let table = base_table();
        let msg = Message::parse(line).unwrap();
        table.run(state, &StandardDialect, &msg).events
    }

    pub(crate) fn is_violation(events: &[ClientEvent]) -> bool {
        matches!(
            events,
            [ClientEvent::Diagnostic(crate::client::Diagnostic::ProtocolViolation(_))]
        )
    }
}
