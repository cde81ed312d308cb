pub mod credential;
pub mod hash;
pub mod identifier;
pub mod message;
pub mod query;
pub mod signals;
pub mod token;
