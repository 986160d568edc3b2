//! Domain logic - version values and bumps, independent of any storage

pub mod bump;
pub mod version;

pub use bump::BumpSpec;
pub use version::SemanticVersion;
