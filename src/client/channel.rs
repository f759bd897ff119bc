use std::collections::{BTreeMap, BTreeSet, HashMap};

use chrono::{DateTime, Utc};

use crate::client::user::UserId;

/// The relation binding a user to a channel, with that user's per-channel
/// modes. Owned by the [`Channel`]; refers to the user by id only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelUser {
    pub user: UserId,
    pub modes: BTreeSet<char>,
}

impl ChannelUser {
    fn new(user: UserId) -> Self {
        Self {
            user,
            modes: BTreeSet::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topic {
    pub text: String,
    pub set_by: Option<String>,
    pub set_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct Channel {
    pub name: String,
    pub topic: Option<Topic>,
    /// Channel-wide modes with their argument, if any (`k`, `l`, flags).
    pub modes: BTreeMap<char, Option<String>>,
    /// List modes (`b`, `e`, `I`) and their masks.
    pub lists: BTreeMap<char, BTreeSet<String>>,
    pub created_at: Option<DateTime<Utc>>,
    members: HashMap<UserId, ChannelUser>,
}

impl Channel {
    pub(crate) fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            topic: None,
            modes: BTreeMap::new(),
            lists: BTreeMap::new(),
            created_at: None,
            members: HashMap::new(),
        }
    }

    /// Add a member with an empty mode set. Returns false if already present.
    pub(crate) fn add_member(&mut self, user: UserId) -> bool {
        if self.members.contains_key(&user) {
            return false;
        }
        self.members.insert(user, ChannelUser::new(user));
        true
    }

    pub(crate) fn remove_member(&mut self, user: UserId) -> Option<ChannelUser> {
        self.members.remove(&user)
    }

    pub fn member(&self, user: UserId) -> Option<&ChannelUser> {
        self.members.get(&user)
    }

    pub(crate) fn member_mut(&mut self, user: UserId) -> Option<&mut ChannelUser> {
        self.members.get_mut(&user)
    }

    pub fn contains(&self, user: UserId) -> bool {
        self.members.contains_key(&user)
    }

    pub fn members(&self) -> impl Iterator<Item = &ChannelUser> {
        self.members.values()
    }

    pub fn member_count(&self) -> usize {
        self.members.len()
    }

    /// Fold another channel's state into this one. Existing topic, creation
    /// time and mode arguments take precedence.
    pub(crate) fn absorb(&mut self, other: Channel) {
        for (id, cu) in other.members {
            self.members
                .entry(id)
                .or_insert_with(|| ChannelUser::new(id))
                .modes
                .extend(cu.modes);
        }
        for (mode, arg) in other.modes {
            self.modes.entry(mode).or_insert(arg);
        }
        for (mode, masks) in other.lists {
            self.lists.entry(mode).or_default().extend(masks);
        }
        if self.topic.is_none() {
            self.topic = other.topic;
        }
        if self.created_at.is_none() {
            self.created_at = other.created_at;
        }
    }
}
