//! Core module: keys, values, codec, identifiers and the store seam

pub mod codec;
pub mod error;
pub mod ids;
pub mod keys;
pub mod store;
pub mod value;

pub use codec::{AttributeValue, Item};
pub use error::{BillingError, BillingResult, StoreError};
pub use ids::SortableId;
pub use keys::{EntityKeys, EntityType, IndexKey, PrimaryKey};
pub use store::{StoreGateway, WriteOp};
pub use value::{Document, Number, Value};
