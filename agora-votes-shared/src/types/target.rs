use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifier of a discussion or reply row.
pub type TargetId = i64;

/// The kind of record a vote applies to.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum TargetType {
    /// A top-level discussion.
    Discussion,
    /// A reply posted inside a discussion.
    Reply,
}

impl TargetType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TargetType::Discussion => "discussion",
            TargetType::Reply => "reply",
        }
    }
}

impl fmt::Display for TargetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Typed reference to a vote target.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct TargetRef {
    pub target_type: TargetType,
    pub target_id: TargetId,
}

impl TargetRef {
    pub fn discussion(target_id: TargetId) -> Self {
        Self {
            target_type: TargetType::Discussion,
            target_id,
        }
    }

    pub fn reply(target_id: TargetId) -> Self {
        Self {
            target_type: TargetType::Reply,
            target_id,
        }
    }
}

impl fmt::Display for TargetRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.target_type, self.target_id)
    }
}

/// What the voting subsystem needs to know about a target it does not own.
///
/// `discussion_id` is the id of the containing discussion: the target itself
/// for a discussion, the parent for a reply. It names the real-time room the
/// target's score changes are broadcast to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetInfo {
    pub target: TargetRef,
    pub discussion_id: TargetId,
    pub created_at: DateTime<Utc>,
}
