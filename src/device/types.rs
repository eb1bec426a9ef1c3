// Core types shared by the device operations and the restart workflow

use std::fmt;

/// Remote calls the restart workflow makes, in happy-path order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    /// GET the root page and pick up the session cookie
    FetchRoot,
    /// Open the session on the device
    InitializeSession,
    /// Log in with the configured credentials
    Authenticate,
    /// Post the configuration change
    ApplyConfiguration,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Operation::FetchRoot => "fetch_root",
            Operation::InitializeSession => "initialize_session",
            Operation::Authenticate => "authenticate",
            Operation::ApplyConfiguration => "apply_configuration",
        };
        f.write_str(name)
    }
}

/// Opaque session value taken from the device's `Set-Cookie` header.
///
/// May be empty when the header had no `=`; later steps treat an empty token
/// as missing.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct SessionToken(String);

impl SessionToken {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

// Session cookies are credentials; keep them out of logs.
impl fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            f.write_str("SessionToken(<empty>)")
        } else {
            f.write_str("SessionToken(<redacted>)")
        }
    }
}
