//! Native-style integer status codes.
//!
//! Two conventions live side by side at the adapter boundary:
//!
//! | Operation                              | Code        | Meaning   |
//! |----------------------------------------|-------------|-----------|
//! | tool, cp, rm, mv, mkdir, rmdir         | `0`         | success   |
//! | is_persistent, console enable/disable  | non-zero    | true      |
//!
//! Inside the crate everything is `Result` or `bool`. This module is the
//! only place where the two meet.

use std::fmt;

use crate::error::Result;

/// Raw integer status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ReturnCode(pub i32);

impl ReturnCode {
    /// Success of an effecting operation.
    pub const SUCCESS: Self = Self(0);
    /// Failure of an effecting operation.
    pub const FAILURE: Self = Self(1);

    /// Status of an effecting operation: `0` on success.
    pub fn from_result<T>(result: &Result<T>) -> Self {
        match result {
            Ok(_) => Self::SUCCESS,
            Err(_) => Self::FAILURE,
        }
    }

    /// Status of a predicate: non-zero when true.
    pub const fn from_bool(value: bool) -> Self {
        Self(value as i32)
    }

    /// Read as an effecting-operation status.
    pub const fn succeeded(self) -> bool {
        self.0 == 0
    }

    /// Read as a predicate status.
    pub const fn truthy(self) -> bool {
        self.0 != 0
    }

    /// The raw code.
    pub const fn code(self) -> i32 {
        self.0
    }
}

impl From<ReturnCode> for i32 {
    fn from(code: ReturnCode) -> Self {
        code.0
    }
}

impl fmt::Display for ReturnCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    #[test]
    fn test_effecting_polarity() {
        let ok: Result<()> = Ok(());
        let err: Result<()> = Err(Error::not_found("$:x"));

        assert_eq!(ReturnCode::from_result(&ok).code(), 0);
        assert!(ReturnCode::from_result(&ok).succeeded());
        assert_ne!(ReturnCode::from_result(&err).code(), 0);
        assert!(!ReturnCode::from_result(&err).succeeded());
    }

    #[test]
    fn test_predicate_polarity() {
        assert_ne!(ReturnCode::from_bool(true).code(), 0);
        assert!(ReturnCode::from_bool(true).truthy());
        assert_eq!(ReturnCode::from_bool(false).code(), 0);
        assert!(!ReturnCode::from_bool(false).truthy());
    }

    #[test]
    fn test_conventions_are_opposite() {
        // The same raw zero means success for one and false for the other.
        let zero = ReturnCode(0);
        assert!(zero.succeeded());
        assert!(!zero.truthy());
        assert_eq!(i32::from(ReturnCode::SUCCESS), 0);
    }
}
