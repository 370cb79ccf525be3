pub mod accounts;
pub mod error;
pub mod messages;
pub mod relationships;

pub use error::{DomainError, DomainResult};
