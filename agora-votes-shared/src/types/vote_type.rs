use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Represents the stance a user takes on a target.
///
/// Removal is not a vote type: re-casting the current type toggles the vote
/// off, so only the two directions are ever stored.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum VoteType {
    /// Indicates an upvote or positive endorsement.
    Upvote,
    /// Indicates a downvote or negative endorsement.
    Downvote,
}

/// Returned when a vote type string is neither `upvote` nor `downvote`.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Vote type must be \"upvote\" or \"downvote\", got {0:?}")]
pub struct InvalidVoteType(pub String);

impl VoteType {
    pub fn as_str(&self) -> &'static str {
        match self {
            VoteType::Upvote => "upvote",
            VoteType::Downvote => "downvote",
        }
    }

    /// Storage encoding, matching the `vote_type` smallint column.
    pub fn as_i16(&self) -> i16 {
        match self {
            VoteType::Upvote => 0,
            VoteType::Downvote => 1,
        }
    }

    pub fn from_i16(value: i16) -> Option<Self> {
        match value {
            0 => Some(VoteType::Upvote),
            1 => Some(VoteType::Downvote),
            _ => None,
        }
    }
}

impl fmt::Display for VoteType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VoteType {
    type Err = InvalidVoteType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "upvote" => Ok(VoteType::Upvote),
            "downvote" => Ok(VoteType::Downvote),
            other => Err(InvalidVoteType(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_known_vote_types() {
        assert_eq!("upvote".parse::<VoteType>(), Ok(VoteType::Upvote));
        assert_eq!("downvote".parse::<VoteType>(), Ok(VoteType::Downvote));
    }

    #[test]
    fn test_parse_rejects_other_strings() {
        assert_eq!(
            "Upvote".parse::<VoteType>(),
            Err(InvalidVoteType("Upvote".to_string()))
        );
        assert!("remove".parse::<VoteType>().is_err());
        assert!("".parse::<VoteType>().is_err());
    }

    #[test]
    fn test_storage_encoding() {
        for vote_type in [VoteType::Upvote, VoteType::Downvote] {
            assert_eq!(VoteType::from_i16(vote_type.as_i16()), Some(vote_type));
        }
        assert_eq!(VoteType::from_i16(2), None);
    }

    #[test]
    fn test_serde_uses_lowercase_names() {
        assert_eq!(
            serde_json::to_string(&VoteType::Downvote).unwrap(),
            "\"downvote\""
        );
    }
}
