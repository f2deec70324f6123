use std::fmt;
use std::str::FromStr;

use crate::CorpusError;

/// Which stage a test program is expected to reach.
///
/// Each class is a subdirectory of a chapter. Only [`ValidityClass::Valid`]
/// programs are expected to compile and run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub enum ValidityClass {
    /// Programs the lexer must reject.
    InvalidLex,
    /// Programs the parser must reject.
    InvalidParse,
    /// Programs that compile and run.
    #[default]
    Valid,
}

impl ValidityClass {
    /// All validity classes, in directory-name order.
    pub const ALL: &'static [Self] = &[Self::InvalidLex, Self::InvalidParse, Self::Valid];

    /// Directory name of this class inside a chapter.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::InvalidLex => "invalid_lex",
            Self::InvalidParse => "invalid_parse",
            Self::Valid => "valid",
        }
    }

    /// Whether programs in this class are expected to run.
    #[must_use]
    pub const fn is_valid(self) -> bool {
        matches!(self, Self::Valid)
    }
}

impl fmt::Display for ValidityClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ValidityClass {
    type Err = CorpusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|class| class.as_str() == s)
            .ok_or_else(|| CorpusError::UnknownClass(s.to_string()))
    }
}
