pub mod types;
pub mod filter;
pub mod filter_where;
pub mod filter_order;
pub mod constraint;
pub mod matcher;
pub mod error;

pub use types::*;
pub use filter::Filter;
pub use constraint::{fold_constraints, Constraint};
pub use matcher::DocumentQuery;
pub use error::FilterError;
