/// Caller-chosen correlation token, echoed back in
/// [`ClientEvent::MessageSent`](crate::client::ClientEvent::MessageSent)
/// once the line has actually been written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SendToken(pub u64);

/// A line queued for the writer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outgoing {
    pub line: String,
    pub token: Option<SendToken>,
}

impl Outgoing {
    pub fn new(line: impl Into<String>) -> Self {
        Self {
            line: line.into(),
            token: None,
        }
    }
}
