//! Server feature negotiation (RPL_ISUPPORT tokens).

use std::collections::BTreeMap;

use crate::irc::{CaseMapping, ModeKind};

/// What the server has told us about its dialect, with RFC defaults until then.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerFeatures {
    /// Membership modes paired with their NAMES/WHO symbols, highest rank first.
    pub prefixes: Vec<(char, char)>,
    /// `CHANMODES` classes A, B, C, D.
    pub chanmodes: [String; 4],
    pub chantypes: String,
    pub casemapping: CaseMapping,
    /// Every token seen, `-TOKEN` removals applied.
    pub tokens: BTreeMap<String, Option<String>>,
}

impl Default for ServerFeatures {
    fn default() -> Self {
        Self {
            prefixes: vec![('o', '@'), ('v', '+')],
            chanmodes: [
                "beI".to_string(),
                "k".to_string(),
                "l".to_string(),
                "imnpst".to_string(),
            ],
            chantypes: "#&+!".to_string(),
            casemapping: CaseMapping::default(),
            tokens: BTreeMap::new(),
        }
    }
}

impl ServerFeatures {
    /// Apply one `TOKEN[=value]` or `-TOKEN`.
    pub fn apply_token(&mut self, token: &str) {
        if let Some(name) = token.strip_prefix('-') {
            self.tokens.remove(name);
            return;
        }
        let (name, value) = match token.split_once('=') {
            Some((n, v)) => (n, Some(v)),
            None => (token, None),
        };

        match (name, value) {
            ("PREFIX", Some(v)) => {
                if let Some(prefixes) = parse_prefix(v) {
                    self.prefixes = prefixes;
                }
            }
            ("CHANMODES", Some(v)) => {
                let mut classes = v.splitn(4, ',').map(str::to_string);
                for slot in self.chanmodes.iter_mut() {
                    *slot = classes.next().unwrap_or_default();
                }
            }
            ("CHANTYPES", Some(v)) => self.chantypes = v.to_string(),
            ("CASEMAPPING", Some(v)) => {
                if let Some(cm) = CaseMapping::from_token(v) {
                    self.casemapping = cm;
                }
            }
            _ => {}
        }
        self.tokens
            .insert(name.to_string(), value.map(str::to_string));
    }

    pub fn mode_kind(&self, mode: char) -> ModeKind {
        if self.prefixes.iter().any(|(m, _)| *m == mode) {
            return ModeKind::Membership;
        }
        let [a, b, c, _] = &self.chanmodes;
        if a.contains(mode) {
            ModeKind::List
        } else if b.contains(mode) {
            ModeKind::AlwaysArg
        } else if c.contains(mode) {
            ModeKind::ArgOnSet
        } else {
            ModeKind::Flag
        }
    }

    /// Membership mode for a NAMES/WHO symbol such as `@`.
    pub fn mode_for_symbol(&self, symbol: char) -> Option<char> {
        self.prefixes
            .iter()
            .find(|(_, s)| *s == symbol)
            .map(|(m, _)| *m)
    }

    pub fn is_channel_name(&self, name: &str) -> bool {
        name.chars()
            .next()
            .map(|c| self.chantypes.contains(c))
            .unwrap_or(false)
    }

    /// Split leading membership symbols off a NAMES entry (`@+nick`).
    pub fn split_symbols<'a>(&self, entry: &'a str) -> (Vec<char>, &'a str) {
        let mut modes = Vec::new();
        let mut rest = entry;
        while let Some(c) = rest.chars().next() {
            match self.mode_for_symbol(c) {
                Some(m) => {
                    modes.push(m);
                    rest = &rest[c.len_utf8()..];
                }
                None => break,
            }
        }
        (modes, rest)
    }
}

/// `(qaohv)~&@%+` → `[('q','~'), ...]`.
fn parse_prefix(value: &str) -> Option<Vec<(char, char)>> {
    if value.is_empty() {
        return Some(Vec::new());
    }
    let inner = value.strip_prefix('(')?;
    let (modes, symbols) = inner.split_once(')')?;
    if modes.chars().count() != symbols.chars().count() {
        return None;
    }
    Some(modes.chars().zip(symbols.chars()).collect())
}
