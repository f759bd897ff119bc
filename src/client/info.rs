//! Read-only snapshots built from reply sequences.
//!
//! None of these are part of the live channel/user graph. Each query response
//! rebuilds them wholesale.

use chrono::{DateTime, Utc};

/// RPL_MYINFO (004).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServerInfo {
    pub name: String,
    pub version: String,
    pub user_modes: String,
    pub channel_modes: String,
}

/// Network size from RPL_LUSERCLIENT..RPL_LUSERME (251-255).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NetworkInfo {
    pub summary: Option<String>,
    pub operators: Option<u32>,
    pub unknown_connections: Option<u32>,
    pub channels: Option<u32>,
    pub local_summary: Option<String>,
}

/// One RPL_LIST (322) entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelInfo {
    pub name: String,
    pub visible_users: u32,
    pub topic: String,
}

/// One RPL_LINKS (364) entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Server {
    pub name: String,
    pub hub: String,
    pub hop_count: u32,
    pub info: String,
}

/// One line of a STATS reply, kept as its code and raw arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatisticalEntry {
    pub code: u16,
    pub params: Vec<String>,
}

/// One RPL_WHOREPLY (352) entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WhoEntry {
    pub channel: Option<String>,
    pub nick: String,
    pub user_name: String,
    pub host_name: String,
    pub server: String,
    pub is_away: bool,
    pub is_operator: bool,
    pub hop_count: Option<u32>,
    pub real_name: String,
}

/// Accumulated WHOIS reply (311-319, ended by 318).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WhoisInfo {
    pub nick: String,
    pub user_name: Option<String>,
    pub host_name: Option<String>,
    pub real_name: Option<String>,
    pub server: Option<String>,
    pub server_info: Option<String>,
    pub is_operator: bool,
    pub idle_seconds: Option<u64>,
    pub signed_on: Option<DateTime<Utc>>,
    pub channels: Vec<String>,
    pub away_message: Option<String>,
}
