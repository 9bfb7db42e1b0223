//! The deployment-run pipeline: parameter resolution (C4), script execution (C5), hydration
//! (C6), proxy tracking (C7), and changeset building plus the deployment reference resolver
//! (C8).

pub mod changeset_builder;
pub mod deployment_ref;
pub mod events;
pub mod executor;
pub mod hydration;
pub mod model;
pub mod params;
pub mod proxy;
mod selector_util;

pub use changeset_builder::{build as build_changeset, BuildContext};
pub use deployment_ref::{parse as parse_deployment_reference, resolve as resolve_deployment_reference, ReferenceContext};
pub use executor::{ForgeScriptDriver, ScriptExecutionOutput, ScriptInvocation, SystemForgeScriptDriver};
pub use hydration::{hydrate, NoTraceFetcher, TraceFetcher};
pub use params::{pack as pack_parameters, resolve as resolve_parameters, EncodedValue, NonInteractivePrompter, ParameterDecl, ParameterPrompter, ParameterType, ResolutionContext};
pub use proxy::{infer as infer_proxies, ProxyRelationship};
