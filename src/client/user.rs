use std::collections::BTreeSet;
use std::fmt;

/// Stable identity of a known user. Survives nickname changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UserId(pub(crate) u64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "u{}", self.0)
    }
}

/// A user the client has observed.
///
/// User name, host name and real name are recorded the first time they are
/// seen and never overwritten afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: UserId,
    pub nick: String,
    user_name: Option<String>,
    host_name: Option<String>,
    real_name: Option<String>,
    pub server_name: Option<String>,
    pub away_message: Option<String>,
    pub is_away: bool,
    pub is_operator: bool,
    pub idle_seconds: Option<u64>,
    pub hop_count: Option<u32>,
}

impl User {
    pub(crate) fn new(id: UserId, nick: impl Into<String>) -> Self {
        Self {
            id,
            nick: nick.into(),
            user_name: None,
            host_name: None,
            real_name: None,
            server_name: None,
            away_message: None,
            is_away: false,
            is_operator: false,
            idle_seconds: None,
            hop_count: None,
        }
    }

    pub fn user_name(&self) -> Option<&str> {
        self.user_name.as_deref()
    }

    pub fn host_name(&self) -> Option<&str> {
        self.host_name.as_deref()
    }

    pub fn real_name(&self) -> Option<&str> {
        self.real_name.as_deref()
    }

    /// Fill in identity fields that are still unknown.
    pub(crate) fn observe(&mut self, user: Option<&str>, host: Option<&str>, real: Option<&str>) {
        fill_once(&mut self.user_name, user);
        fill_once(&mut self.host_name, host);
        fill_once(&mut self.real_name, real);
    }

    /// `nick!user@host`, with `*` for unknown parts.
    pub fn mask(&self) -> String {
        format!(
            "{}!{}@{}",
            self.nick,
            self.user_name.as_deref().unwrap_or("*"),
            self.host_name.as_deref().unwrap_or("*")
        )
    }
}

fn fill_once(slot: &mut Option<String>, value: Option<&str>) {
    if slot.is_none() {
        if let Some(v) = value.filter(|v| !v.is_empty()) {
            *slot = Some(v.to_string());
        }
    }
}

/// The client's own identity. Its [`User`] entry lives in the known-users
/// collection like any other; this holds what only the local user has.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalUser {
    pub id: UserId,
    pub modes: BTreeSet<char>,
    pub is_away: bool,
    pub is_operator: bool,
    pub is_service: bool,
}

impl LocalUser {
    pub(crate) fn new(id: UserId) -> Self {
        Self {
            id,
            modes: BTreeSet::new(),
            is_away: false,
            is_operator: false,
            is_service: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_fields_set_once() {
        let mut u = User::new(UserId(1), "alice");
        u.observe(Some("al"), None, None);
        u.observe(Some("other"), Some("host.example"), Some("Alice A."));
        u.observe(None, Some("elsewhere"), Some("Someone"));
        assert_eq!(u.user_name(), Some("al"));
        assert_eq!(u.host_name(), Some("host.example"));
        assert_eq!(u.real_name(), Some("Alice A."));
        assert_eq!(u.mask(), "alice!al@host.example");
    }

    #[test]
    fn test_mask_with_unknowns() {
        let u = User::new(UserId(2), "bob");
        assert_eq!(u.mask(), "bob!*@*");
    }
}
