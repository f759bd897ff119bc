//! Message source prefix (`nick[!user][@host]` or a server name).

use std::fmt;

/// The origin of a received message.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Prefix {
    /// A server name such as `irc.example.net`.
    Server(String),
    /// A user mask. User and host are absent when the server omits them.
    User {
        nick: String,
        user: Option<String>,
        host: Option<String>,
    },
}

impl Prefix {
    /// Decompose a raw prefix token (without the leading `:`).
    ///
    /// A bare name containing a dot is a server; anything carrying `!` or `@`
    /// is a user mask.
    pub fn parse(raw: &str) -> Self {
        let (rest, host) = match raw.split_once('@') {
            Some((rest, host)) => (rest, Some(host.to_string())),
            None => (raw, None),
        };
        let (nick, user) = match rest.split_once('!') {
            Some((nick, user)) => (nick, Some(user.to_string())),
            None => (rest, None),
        };

        if user.is_none() && host.is_none() && nick.contains('.') {
            return Prefix::Server(nick.to_string());
        }

        Prefix::User {
            nick: nick.to_string(),
            user,
            host,
        }
    }

    /// The nickname, if this is a user prefix.
    pub fn nick(&self) -> Option<&str> {
        match self {
            Prefix::User { nick, .. } => Some(nick),
            Prefix::Server(_) => None,
        }
    }

    pub fn user(&self) -> Option<&str> {
        match self {
            Prefix::User { user, .. } => user.as_deref(),
            Prefix::Server(_) => None,
        }
    }

    pub fn host(&self) -> Option<&str> {
        match self {
            Prefix::User { host, .. } => host.as_deref(),
            Prefix::Server(_) => None,
        }
    }

    /// Nick for users, server name for servers.
    pub fn name(&self) -> &str {
        match self {
            Prefix::User { nick, .. } => nick,
            Prefix::Server(name) => name,
        }
    }
}

impl fmt::Display for Prefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Prefix::Server(name) => f.write_str(name),
            Prefix::User { nick, user, host } => {
                f.write_str(nick)?;
                if let Some(user) = user {
                    write!(f, "!{}", user)?;
                }
                if let Some(host) = host {
                    write!(f, "@{}", host)?;
                }
                Ok(())
            }
        }
    }
}
