use std::fmt;

use restscript_core::error::{ConfigError, PlanError};

#[derive(Debug)]
pub enum AutoError {
    Parse { message: String, line: usize },
    Plan(PlanError),
    Runtime { message: String, line: Option<usize> },
    AssertionFailed { message: String, line: usize },
    SuiteFailed { failed: usize, errored: usize },
    Config(ConfigError),
    InvalidArgument(String),
    Io(std::io::Error),
}

impl AutoError {
    pub fn exit_code(&self) -> i32 {
        match self {
            AutoError::AssertionFailed { .. } => 1,
            AutoError::SuiteFailed { errored, .. } => {
                if *errored > 0 {
                    3
                } else {
                    1
                }
            }
            AutoError::Parse { .. } | AutoError::InvalidArgument(_) => 2,
            AutoError::Plan(PlanError::Io { .. } | PlanError::ScriptIo { .. }) => 4,
            AutoError::Plan(_) => 2,
            AutoError::Runtime { .. } => 3,
            AutoError::Config(_) | AutoError::Io(_) => 4,
        }
    }
}

impl fmt::Display for AutoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AutoError::Parse { message, line } => write!(f, "Parse error at line {}: {}", line, message),
            AutoError::Plan(e) => write!(f, "{}", e),
            AutoError::Runtime { message, line: Some(line) } => {
                write!(f, "Runtime error at line {}: {}", line, message)
            }
            AutoError::Runtime { message, line: None } => write!(f, "Runtime error: {}", message),
            AutoError::AssertionFailed { message, line } => {
                write!(f, "Assertion failed at line {}: {}", line, message)
            }
            AutoError::SuiteFailed { failed, errored } => {
                write!(f, "Suite failed: {} failed, {} errored", failed, errored)
            }
            AutoError::Config(e) => write!(f, "{}", e),
            AutoError::InvalidArgument(message) => write!(f, "Invalid argument: {}", message),
            AutoError::Io(e) => write!(f, "IO error: {}", e),
        }
    }
}

impl std::error::Error for AutoError {}

impl From<std::io::Error> for AutoError {
    fn from(e: std::io::Error) -> Self {
        AutoError::Io(e)
    }
}

impl From<PlanError> for AutoError {
    fn from(e: PlanError) -> Self {
        match e {
            PlanError::Parse { source, .. } => AutoError::Parse {
                message: source.reason,
                line: source.line,
            },
            other => AutoError::Plan(other),
        }
    }
}

impl From<ConfigError> for AutoError {
    fn from(e: ConfigError) -> Self {
        AutoError::Config(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use restscript_core::error::ParseError;

    #[test]
    fn test_exit_codes() {
        assert_eq!(AutoError::AssertionFailed { message: String::new(), line: 1 }.exit_code(), 1);
        assert_eq!(AutoError::Parse { message: String::new(), line: 1 }.exit_code(), 2);
        assert_eq!(AutoError::Runtime { message: String::new(), line: None }.exit_code(), 3);
        assert_eq!(AutoError::SuiteFailed { failed: 2, errored: 0 }.exit_code(), 1);
        assert_eq!(AutoError::SuiteFailed { failed: 0, errored: 1 }.exit_code(), 3);
        assert_eq!(AutoError::Plan(PlanError::UnresolvedScripts(vec!["x".into()])).exit_code(), 2);
        assert_eq!(
            AutoError::Io(std::io::Error::new(std::io::ErrorKind::NotFound, "gone")).exit_code(),
            4
        );
    }

    #[test]
    fn test_plan_parse_error_becomes_parse() {
        let err = AutoError::from(PlanError::Parse {
            script: "a.req".to_string(),
            source: ParseError::new(3, "unrecognized statement"),
        });
        assert_eq!(err.exit_code(), 2);
        assert_eq!(err.to_string(), "Parse error at line 3: unrecognized statement");
    }
}
