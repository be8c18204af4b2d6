use serde::{Deserialize, Serialize};

/// Side of the leveraged trade.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    /// Long the output token.
    #[default]
    Long,
    /// Short the output token.
    Short,
}

impl Direction {
    /// Returns the opposite side.
    #[must_use]
    pub fn toggled(self) -> Self {
        match self {
            Self::Long => Self::Short,
            Self::Short => Self::Long,
        }
    }
}

/// Which side of the trade form a token is selected for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TokenRole {
    /// Token being sold.
    From,
    /// Token being bought.
    To,
}
