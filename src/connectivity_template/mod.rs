//! Connectivity templates: the primitive tree, its wire form and the
//! resources built on it.

pub mod kinds;
pub mod policy;
pub mod primitives;
pub mod resource;

pub use kinds::{
    InterfaceConnectivityTemplate, InterfacePrimitives, LoopbackConnectivityTemplate,
    LoopbackPrimitives, ProtocolEndpointConnectivityTemplate, ProtocolEndpointPrimitives,
    SviConnectivityTemplate, SviPrimitives, SystemConnectivityTemplate, SystemPrimitives,
};
pub use policy::{ConnectivityTemplate, Policy, Primitive, PrimitiveAttributes};
pub use resource::{parse_import_id, ConnectivityTemplateResource, CtKind};
