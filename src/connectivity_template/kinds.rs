//! The five connectivity template resource flavors.

use serde::{Deserialize, Serialize};

use super::policy::Primitive;
use super::primitives::{
    from_subpolicies, load_ids_into_map, map_block, plan_map, subpolicies, validate_map,
    BgpPeeringGenericSystem, BgpPeeringIpEndpoint, CustomStaticRoute, DynamicBgpPeering, IpLink,
    PrimitiveMap, RoutingPolicy, RoutingZoneConstraint, VirtualNetworkMultiple,
    VirtualNetworkSingle,
};
use super::resource::{ConnectivityTemplateResource, CtKind};
use crate::schema::{Diagnostics, Schema};

macro_rules! ct_kind {
    (
        $(#[$meta:meta])*
        $name:ident, $alias:ident, $type_name:literal, $description:literal,
        { $($field:ident: $prim:ty => $doc:literal),+ $(,)? }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
        #[serde(default)]
        pub struct $name {
            $(
                #[doc = $doc]
                pub $field: PrimitiveMap<$prim>,
            )+
        }

        #[doc = concat!("State of the `", $type_name, "` resource.")]
        pub type $alias = ConnectivityTemplateResource<$name>;

        impl CtKind for $name {
            const TYPE_NAME: &'static str = $type_name;
            const DESCRIPTION: &'static str = $description;

            fn with_blocks(schema: Schema) -> Schema {
                schema
                    $(.with_block(stringify!($field), map_block::<$prim>($doc)))+
            }

            fn validate(&self, diags: &mut Diagnostics) {
                $(validate_map("", stringify!($field), &self.$field, diags);)+
            }

            fn subpolicies(&self, diags: &mut Diagnostics) -> Vec<Primitive> {
                let mut result = Vec::new();
                $(result.extend(subpolicies(&self.$field, diags));)+
                result
            }

            fn from_subpolicies(subpolicies: &[Primitive], diags: &mut Diagnostics) -> Self {
                Self {
                    $($field: from_subpolicies(subpolicies, diags),)+
                }
            }

            fn load_ids(&mut self, subpolicies: &[Primitive], diags: &mut Diagnostics) {
                $(load_ids_into_map(subpolicies, &mut self.$field, diags);)+
            }

            fn plan(&mut self, state: Option<&Self>, diags: &mut Diagnostics) {
                $(plan_map(&mut self.$field, state.map(|s| &s.$field), diags);)+
            }
        }
    };
}

ct_kind! {
    /// Primitives attached to switch interfaces.
    InterfacePrimitives, InterfaceConnectivityTemplate,
    "apstra_datacenter_connectivity_template_interface",
    "This resource creates a Connectivity Template suitable for use with Application Points of type *Interface* within a Datacenter Blueprint.",
    {
        ip_links: IpLink => "Map of *IP Link* Primitives",
        routing_zone_constraints: RoutingZoneConstraint => "Map of *Routing Zone Constraint* Primitives",
        virtual_network_multiples: VirtualNetworkMultiple => "Map of *Virtual Network (Multiple)* Primitives",
        virtual_network_singles: VirtualNetworkSingle => "Map of *Virtual Network (Single)* Primitives",
    }
}

ct_kind! {
    /// Primitives attached to systems.
    SystemPrimitives, SystemConnectivityTemplate,
    "apstra_datacenter_connectivity_template_system",
    "This resource creates a Connectivity Template suitable for use with Application Points of type *System* within a Datacenter Blueprint.",
    {
        custom_static_routes: CustomStaticRoute => "Map of *Custom Static Route* Primitives",
    }
}

ct_kind! {
    /// Primitives attached to loopback interfaces.
    LoopbackPrimitives, LoopbackConnectivityTemplate,
    "apstra_datacenter_connectivity_template_loopback",
    "This resource creates a Connectivity Template suitable for use with Application Points of type *Loopback* within a Datacenter Blueprint.",
    {
        bgp_peering_ip_endpoints: BgpPeeringIpEndpoint => "Map of *BGP Peering (IP Endpoint)* Primitives",
        routing_policies: RoutingPolicy => "Map of *Routing Policy* Primitives",
    }
}

ct_kind! {
    /// Primitives attached to SVIs.
    SviPrimitives, SviConnectivityTemplate,
    "apstra_datacenter_connectivity_template_svi",
    "This resource creates a Connectivity Template suitable for use with Application Points of type *SVI* within a Datacenter Blueprint.",
    {
        bgp_peering_generic_systems: BgpPeeringGenericSystem => "Map of *BGP Peering (Generic System)* Primitives",
        bgp_peering_ip_endpoints: BgpPeeringIpEndpoint => "Map of *BGP Peering (IP Endpoint)* Primitives",
        dynamic_bgp_peerings: DynamicBgpPeering => "Map of *Dynamic BGP Peering* Primitives",
        routing_policies: RoutingPolicy => "Map of *Routing Policy* Primitives",
    }
}

ct_kind! {
    /// Primitives attached to protocol endpoints.
    ProtocolEndpointPrimitives, ProtocolEndpointConnectivityTemplate,
    "apstra_datacenter_connectivity_template_protocol_endpoint",
    "This resource creates a Connectivity Template suitable for use with Application Points of type *Protocol Endpoint* within a Datacenter Blueprint.",
    {
        routing_policies: RoutingPolicy => "Map of *Routing Policy* Primitives",
    }
}
