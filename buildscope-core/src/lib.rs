pub mod errors;

pub type Result<T> = std::result::Result<T, errors::BuildScopeError>;

pub mod aggregator;
pub mod config;
pub mod invoker;
pub mod provider;
pub mod report;
pub mod tools;
pub mod types;

pub mod prelude {
    pub use super::errors::BuildScopeError;
    pub use super::Result;
}
