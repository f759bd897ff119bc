//! Nickname generation.
//!
//! Default nicknames look like `CrabFox42` and fit within the 9-character
//! limit RFC 2812 servers enforce. When the server rejects a nickname during
//! registration, [`alternate_nickname`] derives the next one to try.

use rand::RngExt;

const ADJECTIVES: &[&str] = &[
    "Crab", "Neon", "Nova", "Onyx", "Hex", "Zero", "Rust", "Salt", "Iron", "Reef", "Tide", "Byte",
    "Moss", "Dusk", "Jade", "Ruby",
];

const NOUNS: &[&str] = &[
    "Fox", "Owl", "Eel", "Ray", "Elk", "Yak", "Cod", "Emu", "Bat", "Ant", "Orc", "Imp",
];

/// Maximum nickname length RFC 2812 guarantees servers accept.
pub const NICK_LIMIT: usize = 9;

/// Generate a random nickname like `RustOwl42`.
pub fn generate_nickname() -> String {
    let mut rng = rand::rng();
    let adj = ADJECTIVES[rng.random_range(0..ADJECTIVES.len())];
    let noun = NOUNS[rng.random_range(0..NOUNS.len())];
    let num: u8 = rng.random_range(0..100);
    format!("{}{}{}", adj, noun, num)
}

/// Next nickname to try after `nick` was refused.
///
/// Appends `_` while there is room, otherwise replaces the last character
/// with a random digit.
pub fn alternate_nickname(nick: &str) -> String {
    if nick.chars().count() < NICK_LIMIT {
        return format!("{}_", nick);
    }
    let mut rng = rand::rng();
    let digit = char::from(b'0' + rng.random_range(0..10u8));
    let mut base: String = nick.chars().take(NICK_LIMIT - 1).collect();
    base.push(digit);
    base
}
