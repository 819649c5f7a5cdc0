//! Store gateway implementations for different backends

#[cfg(feature = "dynamodb")]
pub mod dynamodb;
#[cfg(feature = "in-memory")]
pub mod in_memory;

#[cfg(feature = "dynamodb")]
pub use dynamodb::DynamoDbGateway;
#[cfg(feature = "in-memory")]
pub use in_memory::InMemoryGateway;
