pub mod collections;
pub mod data;
pub mod permission;
pub mod store;
