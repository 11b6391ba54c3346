use std::fmt;

/// Identifier of a process's current connection to the notification channel.
///
/// For the PostgreSQL transport this is the backend process id of the
/// publishing connection. The tag is only valid for the lifetime of that
/// connection; a reconnect gets a fresh tag. Tags are compared, never
/// interpreted, so the inner value stays opaque to everything but the
/// transport that minted it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionTag(u32);

impl SessionTag {
    /// Wrap a raw channel-session identifier.
    #[must_use]
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    /// Build a tag from a PostgreSQL backend pid (`pg_backend_pid()` returns
    /// a signed integer; notifications carry the same value unsigned).
    #[must_use]
    #[allow(clippy::cast_sign_loss)]
    pub const fn from_backend_pid(pid: i32) -> Self {
        Self(pid as u32)
    }

    /// The raw identifier.
    #[must_use]
    pub const fn raw(self) -> u32 {
        self.0
    }
}

impl fmt::Display for SessionTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
