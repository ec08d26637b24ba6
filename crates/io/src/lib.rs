// File I/O - CSV persistence for the five weather relations

pub mod codec;
pub mod error;
pub mod store;

pub use error::{CodecError, StoreError};
pub use store::{CsvStore, RelationStore};
