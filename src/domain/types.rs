//! Shared domain enumerations aligned with persisted columns.

use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Kind of bearer credential, stored in `auth_tokens.kind`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenKind {
    Access,
    Refresh,
}

impl TokenKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Access => "access",
            Self::Refresh => "refresh",
        }
    }

    /// Leading segment of the opaque token string.
    pub fn token_tag(self) -> &'static str {
        match self {
            Self::Access => "acc",
            Self::Refresh => "ref",
        }
    }

    pub fn from_token_tag(tag: &str) -> Option<Self> {
        match tag {
            "acc" => Some(Self::Access),
            "ref" => Some(Self::Refresh),
            _ => None,
        }
    }
}

impl Display for TokenKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TokenKind {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "access" => Ok(Self::Access),
            "refresh" => Ok(Self::Refresh),
            _ => Err(()),
        }
    }
}

/// Result of a bookmark toggle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BookmarkChange {
    Added,
    Removed,
}

impl BookmarkChange {
    pub fn detail(self) -> &'static str {
        match self {
            Self::Added => "Bookmark Added.",
            Self::Removed => "Bookmark Removed.",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_kind_round_trips_through_column_and_tag() {
        for kind in [TokenKind::Access, TokenKind::Refresh] {
            assert_eq!(kind.as_str().parse::<TokenKind>(), Ok(kind));
            assert_eq!(TokenKind::from_token_tag(kind.token_tag()), Some(kind));
        }
        assert!("bearer".parse::<TokenKind>().is_err());
        assert_eq!(TokenKind::from_token_tag("sk"), None);
    }

    #[test]
    fn bookmark_change_details() {
        assert_eq!(BookmarkChange::Added.detail(), "Bookmark Added.");
        assert_eq!(BookmarkChange::Removed.detail(), "Bookmark Removed.");
    }
}
