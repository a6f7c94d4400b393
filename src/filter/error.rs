use thiserror::Error;

/// Rejected constraint lists. Raised before any backend is contacted.
#[derive(Error, Debug)]
pub enum FilterError {
    #[error("Invalid documents table name: {0}")]
    InvalidTableName(String),

    #[error("Invalid field path: {0}")]
    InvalidField(String),

    #[error("Invalid where condition: {0}")]
    InvalidWhereClause(String),

    #[error("Unsupported operator: {0}")]
    UnsupportedOperator(String),

    #[error("Invalid operand for operator: {0}")]
    InvalidOperatorData(String),

    #[error("Invalid order entry: {0}")]
    InvalidOrder(String),

    #[error("Invalid limit: {0}")]
    InvalidLimit(String),

    #[error("Invalid offset: {0}")]
    InvalidOffset(String),
}
