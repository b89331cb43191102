use serde::{Deserialize, Serialize};

use super::{
    from_subpolicies, load_ids_into_map, map_block, map_len, plan_map, subpolicies, validate_map,
    BgpPeeringGenericSystem, BgpPeeringIpEndpoint, DynamicBgpPeering, PrimitiveMap, StaticRoute,
};
use crate::connectivity_template::policy::Primitive;
use crate::plan_modifier::count_children;
use crate::schema::{Block, Diagnostics};
use crate::value::AttrValue;

/// Child primitives of an IP link or a single-VLAN attachment.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PeeringChildren {
    /// BGP sessions with generic systems.
    pub bgp_peering_generic_systems: PrimitiveMap<BgpPeeringGenericSystem>,
    /// BGP sessions with IP endpoints.
    pub bgp_peering_ip_endpoints: PrimitiveMap<BgpPeeringIpEndpoint>,
    /// Dynamic BGP peerings.
    pub dynamic_bgp_peerings: PrimitiveMap<DynamicBgpPeering>,
    /// Static routes.
    pub static_routes: PrimitiveMap<StaticRoute>,
}

impl PeeringChildren {
    pub(crate) fn with_blocks(block: Block) -> Block {
        block
            .with_block(
                "bgp_peering_generic_systems",
                map_block::<BgpPeeringGenericSystem>("Map of BGP Peering (Generic System) primitives"),
            )
            .with_block(
                "bgp_peering_ip_endpoints",
                map_block::<BgpPeeringIpEndpoint>("Map of *BGP Peering (IP Endpoint)* Primitives"),
            )
            .with_block(
                "dynamic_bgp_peerings",
                map_block::<DynamicBgpPeering>("Map of *Dynamic BGP Peering* Primitives"),
            )
            .with_block(
                "static_routes",
                map_block::<StaticRoute>("Map of network IPv4 or IPv6 destination prefixes"),
            )
    }

    pub(crate) fn validate(&self, path: &str, diags: &mut Diagnostics) {
        validate_map(path, "bgp_peering_generic_systems", &self.bgp_peering_generic_systems, diags);
        validate_map(path, "bgp_peering_ip_endpoints", &self.bgp_peering_ip_endpoints, diags);
        validate_map(path, "dynamic_bgp_peerings", &self.dynamic_bgp_peerings, diags);
        validate_map(path, "static_routes", &self.static_routes, diags);
    }

    pub(crate) fn count(&self) -> AttrValue<usize> {
        count_children(&[
            map_len(&self.bgp_peering_generic_systems),
            map_len(&self.bgp_peering_ip_endpoints),
            map_len(&self.dynamic_bgp_peerings),
            map_len(&self.static_routes),
        ])
    }

    pub(crate) fn subpolicies(&self, diags: &mut Diagnostics) -> Vec<Primitive> {
        let mut result = subpolicies(&self.bgp_peering_generic_systems, diags);
        result.extend(subpolicies(&self.bgp_peering_ip_endpoints, diags));
        result.extend(subpolicies(&self.dynamic_bgp_peerings, diags));
        result.extend(subpolicies(&self.static_routes, diags));
        result
    }

    pub(crate) fn from_subpolicies(subpolicies: &[Primitive], diags: &mut Diagnostics) -> Self {
        Self {
            bgp_peering_generic_systems: from_subpolicies(subpolicies, diags),
            bgp_peering_ip_endpoints: from_subpolicies(subpolicies, diags),
            dynamic_bgp_peerings: from_subpolicies(subpolicies, diags),
            static_routes: from_subpolicies(subpolicies, diags),
        }
    }

    pub(crate) fn load_ids(&mut self, subpolicies: &[Primitive], diags: &mut Diagnostics) {
        load_ids_into_map(subpolicies, &mut self.bgp_peering_generic_systems, diags);
        load_ids_into_map(subpolicies, &mut self.bgp_peering_ip_endpoints, diags);
        load_ids_into_map(subpolicies, &mut self.dynamic_bgp_peerings, diags);
        load_ids_into_map(subpolicies, &mut self.static_routes, diags);
    }

    pub(crate) fn plan(&mut self, state: Option<&Self>, diags: &mut Diagnostics) {
        plan_map(
            &mut self.bgp_peering_generic_systems,
            state.map(|s| &s.bgp_peering_generic_systems),
            diags,
        );
        plan_map(
            &mut self.bgp_peering_ip_endpoints,
            state.map(|s| &s.bgp_peering_ip_endpoints),
            diags,
        );
        plan_map(&mut self.dynamic_bgp_peerings, state.map(|s| &s.dynamic_bgp_peerings), diags);
        plan_map(&mut self.static_routes, state.map(|s| &s.static_routes), diags);
    }
}
