//! Handshake-phase handlers. These run before and after registration.

use tracing::{info, warn};

use super::{require, violation};
use crate::client::dispatch::{Context, HandlerResult};
use crate::client::info::ServerInfo;
use crate::client::registration::ConnectionState;
use crate::client::ClientEvent;
use crate::config::nickname::alternate_nickname;
use crate::irc::Message;

pub(crate) fn ping(ctx: &mut Context<'_>, msg: &Message) -> HandlerResult {
    let token = msg
        .last_arg()
        .ok_or_else(|| violation(msg, "missing ping token"))?;
    ctx.reply(format!("PONG :{}", token));
    ctx.emit(ClientEvent::Ping {
        token: token.to_string(),
    });
    Ok(())
}

pub(crate) fn error(ctx: &mut Context<'_>, msg: &Message) -> HandlerResult {
    let message = msg.last_arg().unwrap_or_default().to_string();
    warn!(%message, "server error");
    ctx.emit(ClientEvent::ServerError { message });
    Ok(())
}

/// Move from Registering to Registered under the nickname the server used.
pub(crate) fn complete_registration(ctx: &mut Context<'_>, msg: &Message) -> HandlerResult {
    let nick = require(msg, 0, "nickname")?;
    let from = ctx.state.connection_state();
    if !from.can_transition_to(ConnectionState::Registered) {
        return Err(violation(
            msg,
            format!("registration reply while {:?}", from),
        ));
    }
    if nick != "*" {
        ctx.state.set_local_nick(nick);
    }
    ctx.state
        .set_connection(ConnectionState::Registered)
        .map_err(|e| violation(msg, e.to_string()))?;
    let nick = ctx.state.local_nick().to_string();
    info!(%nick, "registered");
    ctx.emit(ClientEvent::Registered { nick });
    Ok(())
}

pub(crate) fn welcome(ctx: &mut Context<'_>, msg: &Message) -> HandlerResult {
    complete_registration(ctx, msg)?;
    ctx.state.welcome = msg.arg(1).map(str::to_string);
    Ok(())
}

pub(crate) fn youre_service(ctx: &mut Context<'_>, msg: &Message) -> HandlerResult {
    complete_registration(ctx, msg)?;
    ctx.state.local.is_service = true;
    ctx.state.welcome = msg.last_arg().map(str::to_string);
    Ok(())
}

pub(crate) fn your_host(ctx: &mut Context<'_>, msg: &Message) -> HandlerResult {
    ctx.state.your_host = msg.arg(1).map(str::to_string);
    Ok(())
}

pub(crate) fn created(ctx: &mut Context<'_>, msg: &Message) -> HandlerResult {
    ctx.state.created = msg.arg(1).map(str::to_string);
    Ok(())
}

pub(crate) fn my_info(ctx: &mut Context<'_>, msg: &Message) -> HandlerResult {
    let name = require(msg, 1, "server name")?;
    let info = ServerInfo {
        name: name.to_string(),
        version: msg.arg(2).unwrap_or_default().to_string(),
        user_modes: msg.arg(3).unwrap_or_default().to_string(),
        channel_modes: msg.arg(4).unwrap_or_default().to_string(),
    };
    ctx.state.server_info = Some(info.clone());
    ctx.emit(ClientEvent::ServerInfoReceived(info));
    Ok(())
}

pub(crate) fn isupport(ctx: &mut Context<'_>, msg: &Message) -> HandlerResult {
    // Skip our nick; the closing ":are supported by this server" has spaces.
    let tokens: Vec<String> = msg
        .args()
        .skip(1)
        .filter(|t| !t.is_empty() && !t.contains(' '))
        .map(str::to_string)
        .collect();
    if tokens.is_empty() {
        return Err(violation(msg, "no feature tokens"));
    }

    for token in &tokens {
        ctx.state.apply_feature(token);
    }
    ctx.emit(ClientEvent::ServerFeaturesReceived { tokens });
    Ok(())
}

/// 432/433/436/437. While registering, try another nickname.
pub(crate) fn nick_rejected(ctx: &mut Context<'_>, msg: &Message) -> HandlerResult {
    let code = msg.numeric().unwrap_or_default();
    let params: Vec<String> = msg.args().skip(1).map(str::to_string).collect();

    // 437 also covers channels held by a netsplit delay.
    let rejected = msg.arg(1).filter(|n| !ctx.state.is_channel_name(n));
    if let (ConnectionState::Registering, Some(rejected)) = (ctx.state.connection_state(), rejected)
    {
        let next = alternate_nickname(rejected);
        info!(%rejected, %next, "nickname refused, retrying");
        ctx.state.set_local_nick(&next);
        ctx.reply(format!("NICK {}", next));
    }
    ctx.emit(ClientEvent::ErrorReply { code, params });
    Ok(())
}

/// 403: forget the channel if we thought it existed.
pub(crate) fn no_such_channel(ctx: &mut Context<'_>, msg: &Message) -> HandlerResult {
    if let Some(name) = msg.arg(1) {
        if ctx.state.remove_channel(name).is_some() {
            info!(channel = name, "server reports channel gone");
        }
    }
    error_reply(ctx, msg)
}

pub(crate) fn error_reply(ctx: &mut Context<'_>, msg: &Message) -> HandlerResult {
    let code = msg
        .numeric()
        .ok_or_else(|| violation(msg, "not a numeric reply"))?;
    let params: Vec<String> = msg.args().skip(1).map(str::to_string).collect();
    ctx.emit(ClientEvent::ErrorReply { code, params });
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use crate::client::dialect::MotdRegistrationDialect;
    use crate::client::registration::ConnectionState;
    use crate::client::state::ClientState;
    use crate::client::ClientEvent;
    use crate::config::UserTracking;
    use crate::irc::CaseMapping;

    fn registering() -> ClientState {
        let mut s = ClientState::new("crab", UserTracking::RetainUntilQuit);
        s.set_connection(ConnectionState::Connecting).unwrap();
        s.set_connection(ConnectionState::Registering).unwrap();
        s
    }

    #[test]
    fn test_ping_answers_pong() {
        let mut s = registering();
        let out = crate::client::dispatch::base_table().run(
            &mut s,
            &crate::client::dialect::StandardDialect,
            &crate::irc::Message::parse("PING :irc.example.net").unwrap(),
        );
        assert_eq!(out.replies, vec!["PONG :irc.example.net"]);
    }

    #[test]
    fn test_welcome_registers_with_server_nick() {
        let mut s = registering();
        let events = feed(&mut s, ":srv 001 Crab_ :Welcome to the network");
        assert_eq!(
            events,
            vec![ClientEvent::Registered {
                nick: "Crab_".into()
            }]
        );
        assert_eq!(s.connection_state(), ConnectionState::Registered);
        assert_eq!(s.local_nick(), "Crab_");
        assert_eq!(s.welcome(), Some("Welcome to the network"));
    }

    #[test]
    fn test_second_welcome_is_violation() {
        let mut s = registered(UserTracking::RetainUntilQuit);
        let events = feed(&mut s, ":srv 001 me :Welcome");
        assert!(is_violation(&events));
    }

    #[test]
    fn test_nick_in_use_retries_while_registering() {
        let mut s = registering();
        let out = feed_with(
            &mut s,
            &crate::client::dialect::StandardDialect,
            ":srv 433 * crab :Nickname is already in use",
        );
        assert_eq!(out.replies, vec!["NICK crab_"]);
        assert_eq!(s.local_nick(), "crab_");
        assert!(matches!(
            out.events.as_slice(),
            [ClientEvent::ErrorReply { code: 433, .. }]
        ));
    }

    #[test]
    fn test_nick_in_use_after_registration_only_reports() {
        let mut s = registered(UserTracking::RetainUntilQuit);
        let out = feed_with(
            &mut s,
            &crate::client::dialect::StandardDialect,
            ":srv 433 me taken :Nickname is already in use",
        );
        assert!(out.replies.is_empty());
        assert_eq!(s.local_nick(), "me");
    }

    #[test]
    fn test_isupport_changes_casemapping() {
        let mut s = registering();
        let events = feed(
            &mut s,
            ":srv 005 crab CHANTYPES=# CASEMAPPING=ascii PREFIX=(ohv)@%+ :are supported by this server",
        );
        assert_eq!(
            events,
            vec![ClientEvent::ServerFeaturesReceived {
                tokens: vec![
                    "CHANTYPES=#".into(),
                    "CASEMAPPING=ascii".into(),
                    "PREFIX=(ohv)@%+".into()
                ]
            }]
        );
        assert_eq!(s.casemapping(), CaseMapping::Ascii);
        assert_eq!(s.features().mode_for_symbol('%'), Some('h'));
    }

    #[test]
    fn test_error_range_before_registration() {
        let mut s = registering();
        let events = feed(&mut s, ":srv 464 crab :Password incorrect");
        assert_eq!(
            events,
            vec![ClientEvent::ErrorReply {
                code: 464,
                params: vec!["Password incorrect".into()]
            }]
        );
    }

    #[test]
    fn test_join_before_registration_not_dispatched() {
        let mut s = registering();
        let events = feed(&mut s, ":a!b@c JOIN #x");
        assert!(matches!(
            events.as_slice(),
            [ClientEvent::Diagnostic(crate::client::Diagnostic::NotRegistered(_))]
        ));
        assert!(s.channel("#x").is_none());
    }

    #[test]
    fn test_motd_dialect_registers_on_end_of_motd() {
        let mut s = registering();
        let dialect = MotdRegistrationDialect;
        feed_with(&mut s, &dialect, ":srv 375 crab :- srv Message of the day -");
        feed_with(&mut s, &dialect, ":srv 372 crab :- hello");
        let out = feed_with(&mut s, &dialect, ":srv 376 crab :End of MOTD");
        assert_eq!(s.connection_state(), ConnectionState::Registered);
        assert_eq!(
            out.events,
            vec![
                ClientEvent::Registered {
                    nick: "crab".into()
                },
                ClientEvent::MotdReceived {
                    lines: vec!["hello".into()]
                }
            ]
        );
        let out = feed_with(&mut s, &dialect, ":crab!u@h JOIN #x");
        assert!(matches!(
            out.events.as_slice(),
            [ClientEvent::UserJoinedChannel { .. }]
        ));
    }

    #[test]
    fn test_standard_dialect_ignores_motd_before_welcome() {
        let mut s = registering();
        let events = feed(&mut s, ":srv 376 crab :End of MOTD");
        assert_eq!(s.connection_state(), ConnectionState::Registering);
        assert!(matches!(
            events.as_slice(),
            [ClientEvent::Diagnostic(crate::client::Diagnostic::NotRegistered(_))]
        ));
    }
}
