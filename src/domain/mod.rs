pub mod account;
pub mod message;
pub mod relationship;
