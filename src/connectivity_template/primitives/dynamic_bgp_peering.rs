use serde::{Deserialize, Serialize};

use super::{
    from_subpolicies, known_string, load_ids_into_map, map_block, map_len, narrow, plan_map,
    subpolicies, validate_map, with_bgp_attributes, with_id_attributes, BgpSession, CtPrimitive,
    PrimitiveIds, PrimitiveMap, RoutingPolicy,
};
use crate::connectivity_template::policy::{
    AttachBgpWithPrefixPeeringForSviOrSubinterface, Primitive, PrimitiveAttributes,
};
use crate::customtypes::{keep_semantically_equal, Ipv46Prefix};
use crate::schema::{Attribute, Block, Diagnostics};
use crate::validation::join_path;
use crate::value::AttrValue;

/// BGP sessions accepted from any neighbor within a prefix.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DynamicBgpPeering {
    /// Node and pipeline ids.
    #[serde(flatten)]
    pub ids: PrimitiveIds,
    /// Child batch id; null without routing policies.
    pub batch_id: AttrValue<String>,
    /// Session settings.
    #[serde(flatten)]
    pub session: BgpSession,
    /// Enable the IPv4 address family.
    pub ipv4_enabled: AttrValue<bool>,
    /// Enable the IPv6 address family.
    pub ipv6_enabled: AttrValue<bool>,
    /// IPv4 prefix neighbors are accepted from.
    pub ipv4_peer_prefix: AttrValue<Ipv46Prefix>,
    /// IPv6 prefix neighbors are accepted from.
    pub ipv6_peer_prefix: AttrValue<Ipv46Prefix>,
    /// Child routing policy primitives.
    pub routing_policies: PrimitiveMap<RoutingPolicy>,
}

impl CtPrimitive for DynamicBgpPeering {
    fn block() -> Block {
        with_bgp_attributes(with_id_attributes(Block::new(), true))
            .with_attribute("ipv4_enabled", Attribute::required_bool().with_description("Enable IPv4"))
            .with_attribute("ipv6_enabled", Attribute::required_bool().with_description("Enable IPv6"))
            .with_attribute(
                "ipv4_peer_prefix",
                Attribute::optional_string().with_description(
                    "IPv4 Subnet for BGP Prefix Dynamic Neighbors. Leave blank to derive subnet from application point.",
                ),
            )
            .with_attribute(
                "ipv6_peer_prefix",
                Attribute::optional_string().with_description(
                    "IPv6 Subnet for BGP Prefix Dynamic Neighbors. Leave blank to derive subnet from application point.",
                ),
            )
            .with_block(
                "routing_policies",
                map_block::<RoutingPolicy>("Map of Routing Policy Primitives to be used with this BGP session."),
            )
    }

    fn validate(&self, path: &str, diags: &mut Diagnostics) {
        self.session.validate(path, diags);
        for (name, prefix, want_v6) in [
            ("ipv4_peer_prefix", &self.ipv4_peer_prefix, false),
            ("ipv6_peer_prefix", &self.ipv6_peer_prefix, true),
        ] {
            let Some(prefix) = prefix.as_known() else {
                continue;
            };
            let attr_path = join_path(path, name);
            let before = diags.error_count();
            prefix.validate(&attr_path, diags);
            if diags.error_count() == before && prefix.is_ipv6() != want_v6 {
                diags.add_attribute_error(
                    attr_path,
                    "Invalid Attribute Value",
                    format!(
                        "{} is not an {} prefix",
                        prefix,
                        if want_v6 { "IPv6" } else { "IPv4" }
                    ),
                );
            }
        }
        validate_map(path, "routing_policies", &self.routing_policies, diags);
    }

    fn matches(attributes: &PrimitiveAttributes) -> bool {
        matches!(attributes, PrimitiveAttributes::BgpWithPrefixPeering(_))
    }

    fn from_attributes(attributes: &PrimitiveAttributes) -> Option<Self> {
        let PrimitiveAttributes::BgpWithPrefixPeering(a) = attributes else {
            return None;
        };
        Some(Self {
            session: BgpSession::from_wire(
                a.ttl,
                a.bfd,
                a.password.clone(),
                a.keepalive_timer,
                a.holdtime_timer,
                a.local_asn,
            ),
            ipv4_enabled: AttrValue::Known(a.ipv4_safi),
            ipv6_enabled: AttrValue::Known(a.ipv6_safi),
            ipv4_peer_prefix: AttrValue::from_option(a.prefix_neighbor_ipv4.clone().map(Ipv46Prefix::new)),
            ipv6_peer_prefix: AttrValue::from_option(a.prefix_neighbor_ipv6.clone().map(Ipv46Prefix::new)),
            ..Default::default()
        })
    }

    fn attributes(&self, diags: &mut Diagnostics) -> Option<PrimitiveAttributes> {
        let attrs = AttachBgpWithPrefixPeeringForSviOrSubinterface {
            bfd: self.session.bfd(),
            holdtime_timer: narrow("hold_time", &self.session.hold_time, diags),
            ipv4_safi: self.ipv4_enabled.known_or(false),
            ipv6_safi: self.ipv6_enabled.known_or(false),
            keepalive_timer: narrow("keepalive_time", &self.session.keepalive_time, diags),
            local_asn: narrow("local_asn", &self.session.local_asn, diags),
            password: self.session.password.as_known().cloned(),
            prefix_neighbor_ipv4: known_string(&self.ipv4_peer_prefix),
            prefix_neighbor_ipv6: known_string(&self.ipv6_peer_prefix),
            ttl: self.session.wire_ttl(diags),
        };
        if diags.has_error() {
            return None;
        }
        Some(PrimitiveAttributes::BgpWithPrefixPeering(attrs))
    }

    fn ids(&self) -> &PrimitiveIds {
        &self.ids
    }

    fn ids_mut(&mut self) -> &mut PrimitiveIds {
        &mut self.ids
    }

    fn batch_id(&self) -> Option<&AttrValue<String>> {
        Some(&self.batch_id)
    }

    fn batch_id_mut(&mut self) -> Option<&mut AttrValue<String>> {
        Some(&mut self.batch_id)
    }

    fn child_count(&self) -> AttrValue<usize> {
        map_len(&self.routing_policies)
    }

    fn children(&self, diags: &mut Diagnostics) -> Vec<Primitive> {
        subpolicies(&self.routing_policies, diags)
    }

    fn load_children(&mut self, subpolicies: &[Primitive], diags: &mut Diagnostics) {
        self.routing_policies = from_subpolicies(subpolicies, diags);
    }

    fn load_child_ids(&mut self, subpolicies: &[Primitive], diags: &mut Diagnostics) {
        load_ids_into_map(subpolicies, &mut self.routing_policies, diags);
    }

    fn plan_values(&mut self, state: Option<&Self>, diags: &mut Diagnostics) {
        self.ipv4_peer_prefix = keep_semantically_equal(
            state.map(|s| &s.ipv4_peer_prefix),
            std::mem::take(&mut self.ipv4_peer_prefix),
            diags,
        );
        self.ipv6_peer_prefix = keep_semantically_equal(
            state.map(|s| &s.ipv6_peer_prefix),
            std::mem::take(&mut self.ipv6_peer_prefix),
            diags,
        );
    }

    fn plan_children(&mut self, state: Option<&Self>, diags: &mut Diagnostics) {
        plan_map(&mut self.routing_policies, state.map(|s| &s.routing_policies), diags);
    }
}
