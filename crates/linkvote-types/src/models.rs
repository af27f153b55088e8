use thiserror::Error;

/// Direction of a single user's vote on a post.
///
/// Stored as the signed integer it contributes to a post's point tally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VoteType {
    Up,
    Down,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("vote value must be 1 or -1, got {0}")]
pub struct InvalidVoteType(pub i64);

impl VoteType {
    pub fn value(self) -> i64 {
        match self {
            Self::Up => 1,
            Self::Down => -1,
        }
    }
}

impl TryFrom<i64> for VoteType {
    type Error = InvalidVoteType;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::Up),
            -1 => Ok(Self::Down),
            other => Err(InvalidVoteType(other)),
        }
    }
}

impl From<VoteType> for i64 {
    fn from(vote: VoteType) -> Self {
        vote.value()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vote_type_accepts_only_unit_values() {
        assert_eq!(VoteType::try_from(1), Ok(VoteType::Up));
        assert_eq!(VoteType::try_from(-1), Ok(VoteType::Down));
        assert_eq!(VoteType::try_from(0), Err(InvalidVoteType(0)));
        assert_eq!(VoteType::try_from(2), Err(InvalidVoteType(2)));
    }
}
