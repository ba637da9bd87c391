//! Application error type.
//!
//! Every fallible operation in the crate reports an `AppError`, which carries
//! the process exit code used by the `crs` binary:
//!
//! - `2`: invalid input or configuration (missing files/columns, bad flags)
//! - `3`: not enough usable data to proceed
//! - `4`: numeric or internal failure
//! - `5`: network / server failure

#[derive(Clone)]
pub struct AppError {
    exit_code: u8,
    message: String,
}

impl AppError {
    pub fn new(exit_code: u8, message: impl Into<String>) -> Self {
        Self {
            exit_code,
            message: message.into(),
        }
    }

    pub fn exit_code(&self) -> u8 {
        self.exit_code
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Prefix the message with extra context, keeping the exit code.
    pub fn context(self, ctx: impl std::fmt::Display) -> Self {
        Self {
            exit_code: self.exit_code,
            message: format!("{ctx}: {}", self.message),
        }
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::fmt::Debug for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppError")
            .field("exit_code", &self.exit_code)
            .field("message", &self.message)
            .finish()
    }
}

impl std::error::Error for AppError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn context_keeps_exit_code() {
        let err = AppError::new(3, "not enough rows").context("train");
        assert_eq!(err.exit_code(), 3);
        assert_eq!(err.to_string(), "train: not enough rows");
    }
}
