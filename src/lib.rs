pub mod config;
pub mod domain;
pub mod error;
pub mod factory;
pub mod store;
pub mod ui;

pub use domain::{BumpSpec, SemanticVersion};
pub use error::{Operation, ParseError, Result, StoreError};
pub use factory::StoreFactory;
pub use store::VersionStore;
