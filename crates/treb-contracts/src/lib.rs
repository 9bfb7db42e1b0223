//! The contract repository (C2): lazily indexes forge-style compiler artifacts and resolves
//! `path:name` queries, delegating build-on-miss to an injected driver.

pub mod model;
pub mod repository;
pub mod selector;

pub use model::{Contract, ContractQuery};
pub use repository::{ContractRepository, ForgeDriver};
pub use selector::{NonInteractiveSelector, Selector};
