//! Connection/registration state machine and the registration handshake lines.

use crate::config::RegistrationInfo;

/// `Disconnected → Connecting → Registering → Registered → Disconnecting → Disconnected`.
///
/// Any live state may drop to `Disconnecting` or `Disconnected` on quit or
/// transport loss.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Registering,
    Registered,
    Disconnecting,
}

impl ConnectionState {
    pub fn can_transition_to(self, next: ConnectionState) -> bool {
        use ConnectionState::*;
        matches!(
            (self, next),
            (Disconnected, Connecting)
                | (Connecting, Registering)
                | (Registering, Registered)
                | (Connecting | Registering | Registered, Disconnecting)
                | (Connecting | Registering | Registered | Disconnecting, Disconnected)
        )
    }

    /// Whether caller lines may be queued. Before the handshake is queued
    /// they would go out ahead of it; after `QUIT` nothing should follow.
    pub fn accepts_sends(self) -> bool {
        matches!(self, ConnectionState::Registering | ConnectionState::Registered)
    }
}

/// Lines sent once the transport is up: `PASS`, `NICK`, then `USER` or `SERVICE`.
pub fn handshake_lines(info: &RegistrationInfo) -> Vec<String> {
    let mut lines = Vec::with_capacity(3);
    match info {
        RegistrationInfo::User(u) => {
            if let Some(pass) = u.password.as_deref().filter(|p| !p.is_empty()) {
                lines.push(format!("PASS {}", pass));
            }
            lines.push(format!("NICK {}", u.nickname));
            lines.push(format!(
                "USER {} {} * :{}",
                u.user_name,
                user_mode_mask(&u.user_modes),
                u.real_name
            ));
        }
        RegistrationInfo::Service(s) => {
            if let Some(pass) = s.password.as_deref().filter(|p| !p.is_empty()) {
                lines.push(format!("PASS {}", pass));
            }
            lines.push(format!(
                "SERVICE {} * {} 0 0 :{}",
                s.nickname, s.distribution, s.description
            ));
        }
    }
    lines
}

/// RFC 2812 `USER` mode bitmask: bit 2 is `w`, bit 3 is `i`.
fn user_mode_mask(modes: &[char]) -> u8 {
    modes.iter().fold(0, |mask, m| match m {
        'w' => mask | 0b0100,
        'i' => mask | 0b1000,
        _ => mask,
    })
}
