//! Structured IRC messages and the line parser.
//!
//! Grammar, in priority order:
//!
//! 1. an optional `@tags` block (kept raw),
//! 2. an optional `:prefix` token,
//! 3. the command token (letters, or exactly three digits for a numeric reply),
//! 4. space-delimited middle parameters; a token starting with `:` starts the
//!    trailing parameter, which runs to the end of the line.
//!
//! At most [`MAX_PARAMS`] parameters are recognised. Once the fourteenth
//! middle parameter is read, whatever remains becomes the trailing one.

use std::fmt;
use std::str::FromStr;

use crate::error::MalformedMessage;
use crate::irc::prefix::Prefix;

/// Maximum number of parameters (middle plus trailing) in one message.
pub const MAX_PARAMS: usize = 15;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Raw IRCv3 tag block without the leading `@`.
    pub tags: Option<String>,
    pub source: Option<Prefix>,
    pub command: String,
    pub params: Vec<String>,
    pub trailing: Option<String>,
}

impl Message {
    /// Build an outgoing-style message with no source.
    pub fn new(command: impl Into<String>, params: Vec<String>, trailing: Option<String>) -> Self {
        Self {
            tags: None,
            source: None,
            command: command.into(),
            params,
            trailing,
        }
    }

    /// Parse one complete line. Terminators, if still present, are ignored.
    pub fn parse(line: &str) -> Result<Self, MalformedMessage> {
        let mut rest = line.trim_end_matches(['\r', '\n']).trim_start_matches(' ');
        if rest.is_empty() {
            return Err(MalformedMessage::Empty);
        }

        let mut tags = None;
        if let Some(tagged) = rest.strip_prefix('@') {
            let (block, after) = split_token(tagged);
            tags = Some(block.to_string());
            rest = after;
        }

        let mut source = None;
        if let Some(prefixed) = rest.strip_prefix(':') {
            let (raw, after) = split_token(prefixed);
            source = Some(Prefix::parse(raw));
            rest = after;
        }

        let (command, mut rest) = split_token(rest);
        if command.is_empty() {
            return Err(MalformedMessage::MissingCommand);
        }

        let mut params = Vec::new();
        let mut trailing = None;
        while !rest.is_empty() {
            if let Some(text) = rest.strip_prefix(':') {
                trailing = Some(text.to_string());
                break;
            }
            if params.len() == MAX_PARAMS - 1 {
                trailing = Some(rest.to_string());
                break;
            }
            let (token, after) = split_token(rest);
            params.push(token.to_string());
            rest = after;
        }

        Ok(Self {
            tags,
            source,
            command: command.to_string(),
            params,
            trailing,
        })
    }

    /// The numeric reply code, if the command is exactly three ASCII digits.
    pub fn numeric(&self) -> Option<u16> {
        parse_numeric(&self.command)
    }

    /// Nick of the sender, if the source is a user.
    pub fn source_nick(&self) -> Option<&str> {
        self.source.as_ref().and_then(Prefix::nick)
    }

    /// Number of arguments, counting the trailing parameter.
    pub fn arg_count(&self) -> usize {
        self.params.len() + usize::from(self.trailing.is_some())
    }

    /// Argument `index` over middle parameters followed by the trailing one.
    ///
    /// Servers are free to send the last parameter with or without a colon,
    /// so handlers address arguments positionally through this.
    pub fn arg(&self, index: usize) -> Option<&str> {
        match self.params.get(index) {
            Some(p) => Some(p),
            None if index == self.params.len() => self.trailing.as_deref(),
            None => None,
        }
    }

    /// The final argument, trailing or not.
    pub fn last_arg(&self) -> Option<&str> {
        self.trailing
            .as_deref()
            .or_else(|| self.params.last().map(String::as_str))
    }

    /// All arguments in order.
    pub fn args(&self) -> impl Iterator<Item = &str> {
        self.params
            .iter()
            .map(String::as_str)
            .chain(self.trailing.as_deref())
    }
}

impl FromStr for Message {
    type Err = MalformedMessage;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Message::parse(s)
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(tags) = &self.tags {
            write!(f, "@{} ", tags)?;
        }
        if let Some(source) = &self.source {
            write!(f, ":{} ", source)?;
        }
        f.write_str(&self.command)?;
        for p in &self.params {
            write!(f, " {}", p)?;
        }
        if let Some(t) = &self.trailing {
            write!(f, " :{}", t)?;
        }
        Ok(())
    }
}

/// Three ASCII digits → reply code.
pub fn parse_numeric(command: &str) -> Option<u16> {
    if command.len() == 3 && command.bytes().all(|b| b.is_ascii_digit()) {
        command.parse().ok()
    } else {
        None
    }
}

fn split_token(s: &str) -> (&str, &str) {
    match s.split_once(' ') {
        Some((token, rest)) => (token, rest.trim_start_matches(' ')),
        None => (s, ""),
    }
}
