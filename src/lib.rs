//! Apstra Provider
//!
//! A provider for managing Juniper Apstra datacenter connectivity templates
//! declaratively. Resource configuration is planned against prior state and
//! applied through the Apstra REST API.
//!
//! # Overview
//!
//! - **ProviderService trait**: the operations a host drives ([`server`])
//! - **ProviderServer**: an in-process dispatcher speaking JSON-encoded messages
//! - **ApstraProvider**: the provider itself ([`provider`])
//! - **Connectivity templates**: the primitive tree, its wire form and the
//!   five template resources ([`connectivity_template`])
//! - **API client**: a thin `reqwest` client for the Apstra API ([`client`])
//! - **Attribute values**: tri-state values, IP types with semantic
//!   equality, validators and plan modifiers
//! - **Logging**: `tracing` output to stderr and optionally `APSTRA_LOG`
//!
//! # Quick Start
//!
//! ```ignore
//! use apstra_provider::server::{ApplyRequest, PlanRequest, ProviderConfigRequest};
//! use apstra_provider::{init_logging, ApstraProvider, ProviderServer};
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() {
//!     init_logging();
//!     let server = ProviderServer::new(ApstraProvider::new());
//!
//!     let configured = server
//!         .configure(ProviderConfigRequest {
//!             config: serde_json::to_vec(&json!({"url": "https://apstra.example.com"})).unwrap(),
//!         })
//!         .await;
//!     assert!(configured.diagnostics.is_empty());
//!
//!     let proposed = json!({
//!         "blueprint_id": "bp-1",
//!         "name": "routing-policy",
//!         "routing_policies": {"rp": {"routing_policy_id": "rp-1"}}
//!     });
//!     let plan = server
//!         .plan(PlanRequest {
//!             type_name: "apstra_datacenter_connectivity_template_protocol_endpoint".into(),
//!             proposed_new_state: serde_json::to_vec(&proposed).unwrap(),
//!             ..Default::default()
//!         })
//!         .await;
//!
//!     server
//!         .apply(ApplyRequest {
//!             type_name: "apstra_datacenter_connectivity_template_protocol_endpoint".into(),
//!             planned_state: plan.planned_state,
//!             ..Default::default()
//!         })
//!         .await;
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod authentication;
pub mod client;
pub mod compatibility;
pub mod config;
pub mod connectivity_template;
pub mod customtypes;
pub mod error;
pub mod logging;
pub mod plan_modifier;
pub mod private_state;
pub mod provider;
pub mod schema;
pub mod server;
pub mod testing;
pub mod types;
pub mod validation;
pub mod value;

// Re-export main types at crate root
pub use client::ApstraClient;
pub use config::ProviderConfig;
pub use error::ProviderError;
pub use logging::{init_logging, init_logging_with_default, try_init_logging};
pub use provider::ApstraProvider;
pub use schema::{Diagnostic, Diagnostics, ProviderSchema};
pub use server::{ProviderServer, ProviderService};
pub use types::{
    ApplyResult, AttributeChange, ImportResult, ImportedResource, OpenResult, PlanResult,
    ProviderMetadata, ReadResult, RenewResult, ServerCapabilities,
};
pub use validation::{is_valid, validate, validate_result};
pub use value::AttrValue;

// Re-export async_trait for convenience
pub use async_trait::async_trait;

// Re-export commonly used external types
pub use serde_json;
pub use tracing;
