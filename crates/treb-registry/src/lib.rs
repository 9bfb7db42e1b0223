//! The registry store (C1): a content-addressed, idempotent ledger of deployments,
//! transactions, Safe batches, and Governor proposals.

pub mod changeset;
pub mod indices;
pub mod model;
mod registry_json;
pub mod store;

pub use changeset::{Changeset, EntityChangeset};
pub use indices::Indices;
pub use store::{DeploymentFilter, RegistryStore, TagOutcome};
