//! The client-side state graph.
//!
//! Channels own their [`ChannelUser`] relations; relations refer to users by
//! [`UserId`]; users know nothing about channels. Nicknames and channel names
//! are looked up through case-folded keys that follow the server's
//! `CASEMAPPING`.
//!
//! Everything here is mutated only by dispatch handlers and a few local
//! actions on [`Client`](crate::client::Client), always under its lock.

use std::collections::hash_map::Entry;
use std::collections::{BTreeMap, BTreeSet, HashMap};

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::client::channel::{Channel, Topic};
use crate::client::features::ServerFeatures;
use crate::client::info::{
    ChannelInfo, NetworkInfo, Server, ServerInfo, StatisticalEntry, WhoEntry, WhoisInfo,
};
use crate::client::registration::ConnectionState;
use crate::client::user::{LocalUser, User, UserId};
use crate::config::UserTracking;
use crate::error::ClientError;
use crate::irc::{CaseMapping, Prefix};

/// Buffer for a start/line/end reply sequence.
///
/// Lines that arrive without the start marker open the buffer implicitly.
#[derive(Debug)]
pub(crate) struct MultiLine<T> {
    buf: Option<Vec<T>>,
}

impl<T> Default for MultiLine<T> {
    fn default() -> Self {
        Self { buf: None }
    }
}

impl<T> MultiLine<T> {
    pub(crate) fn begin(&mut self) {
        self.buf = Some(Vec::new());
    }

    pub(crate) fn push(&mut self, item: T) {
        self.buf.get_or_insert_with(Vec::new).push(item);
    }

    /// Close the buffer and hand back what it collected.
    pub(crate) fn finish(&mut self) -> Vec<T> {
        self.buf.take().unwrap_or_default()
    }

    pub(crate) fn is_open(&self) -> bool {
        self.buf.is_some()
    }
}

/// Accumulators for replies that span several numerics.
#[derive(Debug, Default)]
pub(crate) struct PendingReplies {
    pub motd: MultiLine<String>,
    pub info: MultiLine<String>,
    pub list: MultiLine<ChannelInfo>,
    pub links: MultiLine<Server>,
    pub stats: MultiLine<StatisticalEntry>,
    pub who: MultiLine<WhoEntry>,
    pub network: Option<NetworkInfo>,
    /// Keyed by folded channel name; holds the display name and the entries.
    pub names: HashMap<String, (String, MultiLine<String>)>,
    pub bans: HashMap<String, (String, MultiLine<String>)>,
    /// Keyed by folded nickname.
    pub whois: HashMap<String, WhoisInfo>,
}

/// A consistent copy of one channel, taken under the state lock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelSnapshot {
    pub name: String,
    pub topic: Option<Topic>,
    pub modes: BTreeMap<char, Option<String>>,
    pub lists: BTreeMap<char, BTreeSet<String>>,
    pub created_at: Option<DateTime<Utc>>,
    /// Sorted by nickname.
    pub members: Vec<MemberSnapshot>,
}

impl ChannelSnapshot {
    pub fn member(&self, nick: &str) -> Option<&MemberSnapshot> {
        self.members.iter().find(|m| m.nick == nick)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberSnapshot {
    pub nick: String,
    pub modes: BTreeSet<char>,
}

#[derive(Debug)]
pub struct ClientState {
    connection: ConnectionState,
    pub(crate) features: ServerFeatures,
    tracking: UserTracking,
    /// Users created during the current dispatch, checked for visibility
    /// once it completes.
    unplaced: Vec<UserId>,
    next_user_id: u64,
    users: HashMap<UserId, User>,
    nicks: HashMap<String, UserId>,
    channels: HashMap<String, Channel>,
    pub(crate) local: LocalUser,

    pub(crate) welcome: Option<String>,
    pub(crate) your_host: Option<String>,
    pub(crate) created: Option<String>,
    pub(crate) server_info: Option<ServerInfo>,
    pub(crate) network_info: Option<NetworkInfo>,
    pub(crate) servers: Vec<Server>,
    pub(crate) motd: Vec<String>,
    pub(crate) pending: PendingReplies,
}

impl ClientState {
    pub(crate) fn new(nickname: &str, tracking: UserTracking) -> Self {
        let local_id = UserId(0);
        let features = ServerFeatures::default();
        let mut users = HashMap::new();
        users.insert(local_id, User::new(local_id, nickname));
        let mut nicks = HashMap::new();
        nicks.insert(features.casemapping.fold(nickname), local_id);

        Self {
            connection: ConnectionState::Disconnected,
            features,
            tracking,
            unplaced: Vec::new(),
            next_user_id: 1,
            users,
            nicks,
            channels: HashMap::new(),
            local: LocalUser::new(local_id),
            welcome: None,
            your_host: None,
            created: None,
            server_info: None,
            network_info: None,
            servers: Vec::new(),
            motd: Vec::new(),
            pending: PendingReplies::default(),
        }
    }

    // ----- connection state -----

    pub fn connection_state(&self) -> ConnectionState {
        self.connection
    }

    pub(crate) fn set_connection(&mut self, next: ConnectionState) -> Result<(), ClientError> {
        let from = self.connection;
        if !from.can_transition_to(next) {
            return Err(ClientError::InvalidTransition { from, to: next });
        }
        info!(?from, to = ?next, "connection state");
        self.connection = next;
        Ok(())
    }

    // ----- lookups -----

    pub fn features(&self) -> &ServerFeatures {
        &self.features
    }

    pub fn casemapping(&self) -> CaseMapping {
        self.features.casemapping
    }

    pub fn fold(&self, name: &str) -> String {
        self.features.casemapping.fold(name)
    }

    pub fn is_channel_name(&self, name: &str) -> bool {
        self.features.is_channel_name(name)
    }

    pub fn local_user(&self) -> &LocalUser {
        &self.local
    }

    pub fn local_nick(&self) -> &str {
        self.users
            .get(&self.local.id)
            .map(|u| u.nick.as_str())
            .unwrap_or_default()
    }

    pub fn is_local_nick(&self, nick: &str) -> bool {
        self.casemapping().eq(nick, self.local_nick())
    }

    pub fn user(&self, id: UserId) -> Option<&User> {
        self.users.get(&id)
    }

    pub(crate) fn user_mut(&mut self, id: UserId) -> Option<&mut User> {
        self.users.get_mut(&id)
    }

    pub fn user_id(&self, nick: &str) -> Option<UserId> {
        self.nicks.get(&self.fold(nick)).copied()
    }

    pub fn user_by_nick(&self, nick: &str) -> Option<&User> {
        self.user_id(nick).and_then(|id| self.users.get(&id))
    }

    pub fn users(&self) -> impl Iterator<Item = &User> {
        self.users.values()
    }

    pub fn user_count(&self) -> usize {
        self.users.len()
    }

    pub fn channel(&self, name: &str) -> Option<&Channel> {
        self.channels.get(&self.fold(name))
    }

    pub(crate) fn channel_mut(&mut self, name: &str) -> Option<&mut Channel> {
        let key = self.fold(name);
        self.channels.get_mut(&key)
    }

    pub fn channels(&self) -> impl Iterator<Item = &Channel> {
        self.channels.values()
    }

    pub fn server_info(&self) -> Option<&ServerInfo> {
        self.server_info.as_ref()
    }

    pub fn network_info(&self) -> Option<&NetworkInfo> {
        self.network_info.as_ref()
    }

    pub fn servers(&self) -> &[Server] {
        &self.servers
    }

    pub fn motd(&self) -> &[String] {
        &self.motd
    }

    pub fn welcome(&self) -> Option<&str> {
        self.welcome.as_deref()
    }

    /// Channel names the user is a member of.
    pub fn channels_of(&self, id: UserId) -> Vec<String> {
        let mut names: Vec<String> = self
            .channels
            .values()
            .filter(|ch| ch.contains(id))
            .map(|ch| ch.name.clone())
            .collect();
        names.sort();
        names
    }

    pub fn snapshot_channel(&self, name: &str) -> Option<ChannelSnapshot> {
        let ch = self.channel(name)?;
        let mut members: Vec<MemberSnapshot> = ch
            .members()
            .filter_map(|cu| {
                self.users.get(&cu.user).map(|u| MemberSnapshot {
                    nick: u.nick.clone(),
                    modes: cu.modes.clone(),
                })
            })
            .collect();
        members.sort_by(|a, b| a.nick.cmp(&b.nick));
        Some(ChannelSnapshot {
            name: ch.name.clone(),
            topic: ch.topic.clone(),
            modes: ch.modes.clone(),
            lists: ch.lists.clone(),
            created_at: ch.created_at,
            members,
        })
    }

    // ----- users -----

    /// Look up a user by nickname, creating the entry on first observation.
    pub(crate) fn ensure_user(&mut self, nick: &str) -> UserId {
        let key = self.fold(nick);
        if let Some(id) = self.nicks.get(&key) {
            return *id;
        }
        let id = UserId(self.next_user_id);
        self.next_user_id += 1;
        debug!(%id, nick, "new user");
        self.users.insert(id, User::new(id, nick));
        self.nicks.insert(key, id);
        if self.tracking == UserTracking::CollectUnseen {
            self.unplaced.push(id);
        }
        id
    }

    /// Record the sender of a message. Server prefixes are ignored.
    pub(crate) fn observe_source(&mut self, source: Option<&Prefix>) -> Option<UserId> {
        let Some(Prefix::User { nick, user, host }) = source else {
            return None;
        };
        let id = self.ensure_user(nick);
        if let Some(u) = self.users.get_mut(&id) {
            u.observe(user.as_deref(), host.as_deref(), None);
        }
        Some(id)
    }

    /// Atomically move `old`'s identity to `new`.
    ///
    /// A different, non-local user still registered under `new` is stale and
    /// is dropped in the same step. Returns `None` when `old` is unknown or
    /// the new name is held by the local user.
    pub(crate) fn rename_user(&mut self, old: &str, new: &str) -> Option<UserId> {
        let old_key = self.fold(old);
        let new_key = self.fold(new);
        let id = *self.nicks.get(&old_key)?;

        if new_key != old_key {
            if let Some(stale) = self.nicks.get(&new_key).copied() {
                if stale == self.local.id {
                    return None;
                }
                debug!(%stale, nick = new, "dropping stale holder of nickname");
                self.forget_user(stale);
            }
            self.nicks.remove(&old_key);
            self.nicks.insert(new_key, id);
        }
        if let Some(user) = self.users.get_mut(&id) {
            user.nick = new.to_string();
        }
        Some(id)
    }

    /// Set the local nickname, whether or not the server has confirmed it.
    pub(crate) fn set_local_nick(&mut self, nick: &str) {
        let current = self.local_nick().to_string();
        if current != nick {
            self.rename_user(&current, nick);
        }
    }

    /// Remove a user who is gone from the network. Returns the channels it
    /// was on. The local user keeps its entry but leaves every channel.
    pub(crate) fn remove_user(&mut self, id: UserId) -> Vec<String> {
        if id == self.local.id {
            let names = self.channels_of(id);
            for name in &names {
                self.remove_channel(name);
            }
            return names;
        }
        let names = self.channels_of(id);
        self.forget_user(id);
        names
    }

    fn forget_user(&mut self, id: UserId) {
        for ch in self.channels.values_mut() {
            ch.remove_member(id);
        }
        if let Some(user) = self.users.remove(&id) {
            let key = self.features.casemapping.fold(&user.nick);
            if self.nicks.get(&key) == Some(&id) {
                self.nicks.remove(&key);
            }
        }
    }

    /// Under [`UserTracking::CollectUnseen`], drop a user no channel references.
    fn collect_if_unseen(&mut self, id: UserId) {
        if self.tracking != UserTracking::CollectUnseen || id == self.local.id {
            return;
        }
        if self.channels.values().any(|ch| ch.contains(id)) {
            return;
        }
        debug!(%id, "collecting user no longer on any channel");
        self.forget_user(id);
    }

    /// Collect users created by the last dispatch that ended up on no
    /// channel. Senders of private messages, WHO and WHOIS subjects and
    /// renamed strangers land here under [`UserTracking::CollectUnseen`].
    pub(crate) fn collect_unplaced(&mut self) {
        for id in std::mem::take(&mut self.unplaced) {
            self.collect_if_unseen(id);
        }
    }

    // ----- channels -----

    pub(crate) fn ensure_channel(&mut self, name: &str) -> &mut Channel {
        let key = self.fold(name);
        self.channels.entry(key).or_insert_with(|| {
            debug!(channel = name, "new channel");
            Channel::new(name)
        })
    }

    /// Forget a channel and every relation it owned.
    pub(crate) fn remove_channel(&mut self, name: &str) -> Option<Channel> {
        let key = self.fold(name);
        let channel = self.channels.remove(&key)?;
        let members: Vec<UserId> = channel.members().map(|cu| cu.user).collect();
        for id in members {
            self.collect_if_unseen(id);
        }
        Some(channel)
    }

    /// Add `id` to `channel`, creating the channel if needed. Returns false
    /// if the relation already existed.
    pub(crate) fn join(&mut self, channel: &str, id: UserId) -> bool {
        self.ensure_channel(channel).add_member(id)
    }

    /// Remove the relation between `channel` and `id`. When `id` is the local
    /// user the whole channel goes away.
    pub(crate) fn part(&mut self, channel: &str, id: UserId) -> bool {
        if id == self.local.id {
            return self.remove_channel(channel).is_some();
        }
        let removed = self
            .channel_mut(channel)
            .and_then(|ch| ch.remove_member(id))
            .is_some();
        if removed {
            self.collect_if_unseen(id);
        }
        removed
    }

    /// Apply one `RPL_ISUPPORT` token. A `CASEMAPPING` change re-keys every
    /// folded lookup.
    pub(crate) fn apply_feature(&mut self, token: &str) {
        let before = self.features.casemapping;
        self.features.apply_token(token);
        let mapping = self.features.casemapping;
        if mapping != before {
            info!(?mapping, "case mapping changed");
            self.rekey();
        }
    }

    /// Rebuild every folded key under the current case mapping.
    ///
    /// Names that were distinct before may now fold together. Colliding
    /// users keep the local user, else the oldest entry; the others are
    /// forgotten. Colliding channels are merged into one.
    fn rekey(&mut self) {
        let cm = self.features.casemapping;
        let local = self.local.id;

        let mut ids: Vec<UserId> = self.users.keys().copied().collect();
        ids.sort_by_key(|id| (*id != local, *id));
        let mut nicks = HashMap::with_capacity(ids.len());
        let mut dropped = Vec::new();
        for id in ids {
            let Some(user) = self.users.get(&id) else {
                continue;
            };
            match nicks.entry(cm.fold(&user.nick)) {
                Entry::Vacant(e) => {
                    e.insert(id);
                }
                Entry::Occupied(e) => {
                    warn!(nick = %user.nick, kept = %e.get(), dropped = %id, "nicknames collide after case mapping change");
                    dropped.push(id);
                }
            }
        }
        self.nicks = nicks;
        for id in dropped {
            self.forget_user(id);
        }

        let mut channels: HashMap<String, Channel> = HashMap::with_capacity(self.channels.len());
        for ch in std::mem::take(&mut self.channels).into_values() {
            match channels.entry(cm.fold(&ch.name)) {
                Entry::Vacant(e) => {
                    e.insert(ch);
                }
                Entry::Occupied(mut e) => {
                    warn!(channel = %ch.name, into = %e.get().name, "channel names collide after case mapping change, merging");
                    e.get_mut().absorb(ch);
                }
            }
        }
        self.channels = channels;

        for map in [&mut self.pending.names, &mut self.pending.bans] {
            refold(map, cm, |(name, _)| name.as_str());
        }
        refold(&mut self.pending.whois, cm, |w| w.nick.as_str());
    }

    /// Drop everything learned during a session. The local identity stays.
    pub(crate) fn reset_session(&mut self) {
        let local_id = self.local.id;
        let local = self.users.remove(&local_id);
        self.users.clear();
        self.channels.clear();
        self.nicks.clear();
        if let Some(user) = local {
            let key = self.fold(&user.nick);
            self.nicks.insert(key, local_id);
            self.users.insert(local_id, user);
        }
        let mut fresh = LocalUser::new(local_id);
        fresh.is_service = self.local.is_service;
        self.local = fresh;
        self.pending = PendingReplies::default();
        self.unplaced.clear();
    }
}

/// Re-key a pending reply map. On a collision the first entry wins.
fn refold<V>(map: &mut HashMap<String, V>, cm: CaseMapping, name: impl Fn(&V) -> &str) {
    let old = std::mem::take(map);
    for value in old.into_values() {
        match map.entry(cm.fold(name(&value))) {
            Entry::Vacant(e) => {
                e.insert(value);
            }
            Entry::Occupied(e) => {
                debug!(key = %e.key(), "dropping pending reply for colliding name");
            }
        }
    }
}
