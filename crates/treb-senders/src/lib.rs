//! The sender resolver (C3): turns a namespace's declared `role -> Sender` map into the packed
//! configuration blob the deployment script consumes.

pub mod model;
pub mod resolver;

pub use model::{HardwareKind, ResolvedSender, Sender, SenderScriptConfig};
pub use resolver::{resolve, HardwareWalletResolver};
