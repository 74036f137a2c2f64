//! Core types for pbview

use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque server identifier (usually the server's own address)
#[derive(Clone, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ServerId(String);

impl ServerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// An empty identifier never names a server
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for ServerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ServerId({:?})", self.0)
    }
}

impl fmt::Display for ServerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ServerId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for ServerId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// View number (0 means "no view yet")
pub type ViewNumber = u64;

/// Assignment of the primary and backup roles
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct View {
    pub viewnum: ViewNumber,
    pub primary: Option<ServerId>,
    pub backup: Option<ServerId>,
}

impl View {
    /// The view handed out before any server has ever reported
    pub fn uninitialized() -> Self {
        Self::default()
    }

    /// The very first view, with `primary` as the only member
    pub fn initial(primary: ServerId) -> Self {
        Self {
            viewnum: 1,
            primary: Some(primary),
            backup: None,
        }
    }

    /// Build the view following this one
    pub fn successor(&self, primary: Option<ServerId>, backup: Option<ServerId>) -> Self {
        Self {
            viewnum: self.viewnum + 1,
            primary,
            backup,
        }
    }

    pub fn is_primary(&self, server: &ServerId) -> bool {
        self.primary.as_ref() == Some(server)
    }

    pub fn is_backup(&self, server: &ServerId) -> bool {
        self.backup.as_ref() == Some(server)
    }

    /// Same role assignment, ignoring the view number
    pub fn same_roles(&self, other: &View) -> bool {
        self.primary == other.primary && self.backup == other.backup
    }
}

impl fmt::Display for View {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let role = |s: &Option<ServerId>| s.as_ref().map_or("-", |id| id.as_str()).to_string();
        write!(
            f,
            "view {}: primary={} backup={}",
            self.viewnum,
            role(&self.primary),
            role(&self.backup)
        )
    }
}
