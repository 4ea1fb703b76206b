//! Domain error types.
//!
//! Conditions and the engine never fail; only the edges that ingest data or
//! configuration return these.

/// A parse error with position information for condition parsing.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("parse error at position {position}: {message}")]
pub struct ParseError {
    pub message: String,
    pub position: usize,
}

impl ParseError {
    /// Format the error with a caret pointing at the error position in the input.
    pub fn display_with_context(&self, input: &str) -> String {
        // position is a byte offset; the caret column counts characters
        let column = input
            .get(..self.position)
            .map_or(self.position, |prefix| prefix.chars().count());
        let caret = " ".repeat(column) + "^";
        format!(
            "{input}\n{caret}\n{err}",
            input = input,
            caret = caret,
            err = self
        )
    }
}

/// Top-level error type for stratprobe.
#[derive(Debug, thiserror::Error)]
pub enum ProbeError {
    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error(transparent)]
    ConditionParse(#[from] ParseError),

    #[error("invalid condition in [{section}] {key}:\n{detail}")]
    InvalidCondition {
        section: String,
        key: String,
        detail: String,
    },

    #[error("column {column} has {found} values, table has {expected} rows")]
    TableShape {
        column: String,
        expected: usize,
        found: usize,
    },

    #[error("timestamps must be strictly increasing (row {index})")]
    NonMonotonicTimestamps { index: usize },

    #[error("data error for {symbol}: {reason}")]
    Data { symbol: String, reason: String },

    #[error("duplicate strategy id {id}: '{name}' collides with '{existing}'")]
    DuplicateStrategyId {
        id: u32,
        name: String,
        existing: String,
    },

    #[error("duplicate strategy name '{name}': id {id} collides with id {existing}")]
    DuplicateStrategyName { name: String, id: u32, existing: u32 },

    #[error("unknown risk profile '{name}'")]
    UnknownRiskProfile { name: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<&ProbeError> for std::process::ExitCode {
    fn from(err: &ProbeError) -> Self {
        let code: u8 = match err {
            ProbeError::Io(_) => 1,
            ProbeError::ConfigParse { .. }
            | ProbeError::ConfigMissing { .. }
            | ProbeError::ConfigInvalid { .. }
            | ProbeError::UnknownRiskProfile { .. } => 2,
            ProbeError::TableShape { .. }
            | ProbeError::NonMonotonicTimestamps { .. }
            | ProbeError::Data { .. } => 3,
            ProbeError::ConditionParse(_) | ProbeError::InvalidCondition { .. } => 4,
            ProbeError::DuplicateStrategyId { .. } | ProbeError::DuplicateStrategyName { .. } => 5,
        };
        std::process::ExitCode::from(code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_with_context_places_caret() {
        let err = ParseError {
            message: "expected ')'".into(),
            position: 6,
        };
        let rendered = err.display_with_context("above(close");
        let lines: Vec<&str> = rendered.lines().collect();
        assert_eq!(lines[0], "above(close");
        assert_eq!(lines[1], "      ^");
        assert!(lines[2].contains("position 6"));
    }

    #[test]
    fn caret_counts_characters_not_bytes() {
        let input = "above(prix_é, 1) extra";
        let err = crate::domain::condition_parser::parse(input).unwrap_err();
        assert_eq!(err.position, input.find("extra").unwrap());
        let rendered = err.display_with_context(input);
        let caret = rendered.lines().nth(1).unwrap();
        assert_eq!(caret, format!("{}^", " ".repeat(17)));
    }

    #[test]
    fn parse_error_converts_into_probe_error() {
        let err: ProbeError = ParseError {
            message: "bad".into(),
            position: 0,
        }
        .into();
        assert!(matches!(err, ProbeError::ConditionParse(_)));
    }

    #[test]
    fn duplicate_id_message_names_both_strategies() {
        let err = ProbeError::DuplicateStrategyId {
            id: 7,
            name: "b".into(),
            existing: "a".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("7"));
        assert!(msg.contains("'a'"));
        assert!(msg.contains("'b'"));
    }
}
