//! Configurable handling of programmer-error assertions

use serde::{Deserialize, Serialize};

use crate::error::ReflectError;

/// How a failed assertion is escalated
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AssertMode {
    /// Panic immediately
    Fatal,
    /// Log the failure and return an error
    #[default]
    Silent,
    /// Return an error without logging
    Disabled,
}

impl AssertMode {
    /// Escalate a failed assertion according to the mode.
    ///
    /// Panics in [`AssertMode::Fatal`], otherwise returns the error for the
    /// caller to propagate.
    pub fn fail(self, message: impl Into<String>) -> ReflectError {
        let message = message.into();
        match self {
            AssertMode::Fatal => panic!("assertion failed: {}", message),
            AssertMode::Silent => {
                log::error!("Assertion failed: {}", message);
                ReflectError::Assertion(message)
            }
            AssertMode::Disabled => ReflectError::Assertion(message),
        }
    }

    /// Check a condition, escalating when it does not hold
    pub fn check(self, condition: bool, message: impl FnOnce() -> String) -> Result<(), ReflectError> {
        if condition {
            Ok(())
        } else {
            Err(self.fail(message()))
        }
    }
}
