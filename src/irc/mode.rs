//! Mode-change string parsing (`+o-v nick1 nick2`, `+kl key 10`, ...).
//!
//! Each `+`/`-` segment applies to the letters that follow it. Letters that
//! take an argument consume the next parameter token in order; letters that
//! take none consume nothing. Unknown letters are passed through as flags.

use std::fmt;

use crate::error::ProtocolViolation;

/// How a mode letter uses its argument. Mirrors the four `CHANMODES`
/// classes plus the membership (`PREFIX`) modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeKind {
    /// Type A: list modes (`b`, `e`, `I`). Argument always; may be absent on a query.
    List,
    /// Type B: argument on set and unset (`k`).
    AlwaysArg,
    /// Type C: argument on set only (`l`).
    ArgOnSet,
    /// Type D: plain flag.
    Flag,
    /// Channel membership modes (`o`, `v`, ...). Argument is a nickname.
    Membership,
}

impl ModeKind {
    fn takes_arg(self, adding: bool) -> bool {
        match self {
            ModeKind::List | ModeKind::AlwaysArg | ModeKind::Membership => true,
            ModeKind::ArgOnSet => adding,
            ModeKind::Flag => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModeChange {
    pub adding: bool,
    pub mode: char,
    pub kind: ModeKind,
    pub arg: Option<String>,
}

impl fmt::Display for ModeChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", if self.adding { '+' } else { '-' }, self.mode)?;
        if let Some(arg) = &self.arg {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

/// Parse a mode string and its argument tokens.
///
/// `classify` maps a letter to its [`ModeKind`]. A letter that needs an
/// argument with none left is a protocol violation, except for list modes,
/// where a bare `+b` is a list query and yields a change without argument.
pub fn parse_mode_changes<'a, F>(
    modes: &str,
    args: impl IntoIterator<Item = &'a str>,
    classify: F,
) -> Result<Vec<ModeChange>, ProtocolViolation>
where
    F: Fn(char) -> ModeKind,
{
    let mut args = args.into_iter();
    let mut adding = true;
    let mut changes = Vec::new();

    for c in modes.chars() {
        match c {
            '+' => adding = true,
            '-' => adding = false,
            _ => {
                let kind = classify(c);
                let arg = if kind.takes_arg(adding) {
                    match args.next() {
                        Some(a) => Some(a.to_string()),
                        None if kind == ModeKind::List => None,
                        None => {
                            return Err(ProtocolViolation::new(
                                "MODE",
                                format!("mode '{}' needs an argument", c),
                            ))
                        }
                    }
                } else {
                    None
                };
                changes.push(ModeChange {
                    adding,
                    mode: c,
                    kind,
                    arg,
                });
            }
        }
    }

    Ok(changes)
}
