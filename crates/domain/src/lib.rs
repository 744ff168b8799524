pub mod collaborators;
pub mod errors;
pub mod models;
pub mod services;

pub use errors::{DomainError, DomainResult};
