use serde::{Deserialize, Serialize};

use super::{
    from_subpolicies, load_ids_into_map, map_block, map_len, narrow, parse_enum, plan_map,
    subpolicies, validate_map, with_bgp_attributes, with_id_attributes, BgpSession, CtPrimitive,
    PrimitiveIds, PrimitiveMap, RoutingPolicy,
};
use crate::connectivity_template::policy::{
    AttachBgpOverSubinterfacesOrSvi, NeighborAsnType, PeerFrom, PeerTo, Primitive,
    PrimitiveAttributes, SessionAddressingIpv4, SessionAddressingIpv6,
};
use crate::schema::{Attribute, Block, Diagnostics};
use crate::validation::{join_path, one_of};
use crate::value::AttrValue;

/// BGP session with a generic system over a sub-interface or SVI.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BgpPeeringGenericSystem {
    /// Node and pipeline ids.
    #[serde(flatten)]
    pub ids: PrimitiveIds,
    /// Child batch id; null without routing policies.
    pub batch_id: AttrValue<String>,
    /// Session settings.
    #[serde(flatten)]
    pub session: BgpSession,
    /// `none` or `addressed`.
    pub ipv4_addressing_type: AttrValue<String>,
    /// `none`, `addressed` or `link_local`.
    pub ipv6_addressing_type: AttrValue<String>,
    /// Accept connections from any peer AS.
    pub neighbor_asn_dynamic: AttrValue<bool>,
    /// Peer from the loopback instead of the physical interface.
    pub peer_from_loopback: AttrValue<bool>,
    /// Far end of the session.
    pub peer_to: AttrValue<String>,
    /// Child routing policy primitives.
    pub routing_policies: PrimitiveMap<RoutingPolicy>,
}

impl CtPrimitive for BgpPeeringGenericSystem {
    fn block() -> Block {
        with_bgp_attributes(with_id_attributes(Block::new(), true))
            .with_attribute(
                "ipv4_addressing_type",
                Attribute::required_string().with_description(format!(
                    "Must be one of: {}",
                    SessionAddressingIpv4::VALUES.join(", ")
                )),
            )
            .with_attribute(
                "ipv6_addressing_type",
                Attribute::required_string().with_description(format!(
                    "Must be one of: {}",
                    SessionAddressingIpv6::VALUES.join(", ")
                )),
            )
            .with_attribute(
                "neighbor_asn_dynamic",
                Attribute::required_bool()
                    .with_description("When `true`, the BGP process will accept connections from any peer AS."),
            )
            .with_attribute(
                "peer_from_loopback",
                Attribute::required_bool().with_description(
                    "Enable to peer from loopback interface. Default behavior peers from physical interface.",
                ),
            )
            .with_attribute(
                "peer_to",
                Attribute::required_string()
                    .with_description(format!("Must be one of: {}", PeerTo::VALUES.join(", "))),
            )
            .with_block(
                "routing_policies",
                map_block::<RoutingPolicy>("Map of Routing Policy Primitives to be used with this BGP session."),
            )
    }

    fn validate(&self, path: &str, diags: &mut Diagnostics) {
        self.session.validate(path, diags);
        one_of(
            &join_path(path, "ipv4_addressing_type"),
            &self.ipv4_addressing_type,
            SessionAddressingIpv4::VALUES,
            diags,
        );
        one_of(
            &join_path(path, "ipv6_addressing_type"),
            &self.ipv6_addressing_type,
            SessionAddressingIpv6::VALUES,
            diags,
        );
        one_of(&join_path(path, "peer_to"), &self.peer_to, PeerTo::VALUES, diags);
        validate_map(path, "routing_policies", &self.routing_policies, diags);
    }

    fn matches(attributes: &PrimitiveAttributes) -> bool {
        matches!(attributes, PrimitiveAttributes::BgpOverSubinterfacesOrSvi(_))
    }

    fn from_attributes(attributes: &PrimitiveAttributes) -> Option<Self> {
        let PrimitiveAttributes::BgpOverSubinterfacesOrSvi(a) = attributes else {
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
            ipv4_addressing_type: AttrValue::Known(a.session_addressing_ipv4.to_string()),
            ipv6_addressing_type: AttrValue::Known(a.session_addressing_ipv6.to_string()),
            neighbor_asn_dynamic: AttrValue::Known(a.neighbor_asn_type == NeighborAsnType::Dynamic),
            peer_from_loopback: AttrValue::Known(a.peer_from == PeerFrom::Loopback),
            peer_to: AttrValue::Known(a.peer_to.to_string()),
            ..Default::default()
        })
    }

    fn attributes(&self, diags: &mut Diagnostics) -> Option<PrimitiveAttributes> {
        let peer_to: PeerTo = parse_enum("peer_to", &self.peer_to, diags)?;
        let ipv4: SessionAddressingIpv4 =
            parse_enum("ipv4_addressing_type", &self.ipv4_addressing_type, diags)?;
        let ipv6: SessionAddressingIpv6 =
            parse_enum("ipv6_addressing_type", &self.ipv6_addressing_type, diags)?;

        let attrs = AttachBgpOverSubinterfacesOrSvi {
            bfd: self.session.bfd(),
            holdtime_timer: narrow("hold_time", &self.session.hold_time, diags),
            ipv4_safi: ipv4 != SessionAddressingIpv4::None,
            ipv6_safi: ipv6 != SessionAddressingIpv6::None,
            keepalive_timer: narrow("keepalive_time", &self.session.keepalive_time, diags),
            local_asn: narrow("local_asn", &self.session.local_asn, diags),
            neighbor_asn_type: if self.neighbor_asn_dynamic.known_or(false) {
                NeighborAsnType::Dynamic
            } else {
                NeighborAsnType::Static
            },
            password: self.session.password.as_known().cloned(),
            peer_from: if self.peer_from_loopback.known_or(false) {
                PeerFrom::Loopback
            } else {
                PeerFrom::Interface
            },
            peer_to,
            session_addressing_ipv4: ipv4,
            session_addressing_ipv6: ipv6,
            ttl: self.session.wire_ttl(diags),
        };
        if diags.has_error() {
            return None;
        }
        Some(PrimitiveAttributes::BgpOverSubinterfacesOrSvi(attrs))
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

    fn plan_children(&mut self, state: Option<&Self>, diags: &mut Diagnostics) {
        plan_map(&mut self.routing_policies, state.map(|s| &s.routing_policies), diags);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn sample() -> BgpPeeringGenericSystem {
        serde_json::from_value(json!({
            "bfd_enabled": true,
            "ttl": 2,
            "keepalive_time": 10,
            "hold_time": 30,
            "ipv4_addressing_type": "addressed",
            "ipv6_addressing_type": "none",
            "neighbor_asn_dynamic": true,
            "peer_from_loopback": false,
            "peer_to": "interface_or_ip_endpoint",
            "routing_policies": {
                "rp": {"routing_policy_id": "rp1"}
            }
        }))
        .unwrap()
    }

    #[test]
    fn test_wire_attributes() {
        let mut diags = Diagnostics::new();
        let attrs = sample().attributes(&mut diags).unwrap();
        assert!(diags.is_empty());
        assert_eq!(
            attrs.to_value().unwrap(),
            json!({
                "bfd": true,
                "holdtime_timer": 30,
                "ipv4_safi": true,
                "ipv6_safi": false,
                "keepalive_timer": 10,
                "local_asn": null,
                "neighbor_asn_type": "dynamic",
                "password": null,
                "peer_from": "interface",
                "peer_to": "interface_or_ip_endpoint",
                "session_addressing_ipv4": "addressed",
                "session_addressing_ipv6": "none",
                "ttl": 2,
            })
        );

        let back = BgpPeeringGenericSystem::from_attributes(&attrs).unwrap();
        assert_eq!(back.session, sample().session);
        assert_eq!(back.peer_to, sample().peer_to);
        assert_eq!(back.neighbor_asn_dynamic, AttrValue::Known(true));
    }

    #[test]
    fn test_primitive_has_children() {
        let mut diags = Diagnostics::new();
        let p = sample().primitive("bgp", &mut diags).unwrap();
        assert_eq!(p.label, "bgp");
        assert_eq!(p.subpolicies.len(), 1);
        assert_eq!(p.subpolicies[0].label, "rp");
        assert!(p.batch_id.is_none());
    }

    #[test]
    fn test_bad_peer_to() {
        let mut bgp = sample();
        bgp.peer_to = AttrValue::Known("somewhere".into());

        let mut diags = Diagnostics::new();
        bgp.validate("x", &mut diags);
        assert_eq!(diags.error_count(), 1);
        assert_eq!(diags[0].attribute.as_deref(), Some("x.peer_to"));

        let mut diags = Diagnostics::new();
        assert!(bgp.attributes(&mut diags).is_none());
        assert!(diags.has_error());
    }

    #[test]
    fn test_plan_batch_id() {
        let mut state = sample();
        state.ids.id = AttrValue::Known("p".into());
        state.ids.pipeline_id = AttrValue::Known("pp".into());
        state.batch_id = AttrValue::Known("b".into());

        let mut diags = Diagnostics::new();

        let mut plan = sample();
        plan.plan(Some(&state), &mut diags);
        assert_eq!(plan.batch_id, AttrValue::Known("b".to_string()));
        assert_eq!(plan.ids.id, AttrValue::Known("p".to_string()));

        let mut plan = sample();
        plan.routing_policies = AttrValue::Null;
        plan.plan(Some(&state), &mut diags);
        assert!(plan.batch_id.is_null());

        let mut plan = sample();
        plan.plan(None, &mut diags);
        assert!(plan.batch_id.is_unknown());
        assert!(plan.ids.id.is_unknown());
    }
}
