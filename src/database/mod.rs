pub mod store;
pub mod memory;
pub mod postgres;
pub mod record;

pub use store::{Document, DocumentStore, StoreError};
pub use memory::MemoryStore;
pub use postgres::PgStore;
pub use record::{Partial, Record, RecordError};
