use serde::{Deserialize, Serialize};

use super::peering_children::PeeringChildren;
use super::{
    known_string, narrow, parse_enum, with_id_attributes, CtPrimitive, PrimitiveIds, L3_MTU_MAX,
    L3_MTU_MIN, VLAN_MAX_USABLE, VLAN_MIN_USABLE,
};
use crate::connectivity_template::policy::{
    AttachLogicalLink, Ipv4AddressingType, Ipv6AddressingType, Primitive, PrimitiveAttributes,
};
use crate::schema::{Attribute, Block, Diagnostics};
use crate::validation::{between, join_path, length_at_least, must_be_even_or_odd, one_of};
use crate::value::AttrValue;

/// Routed (layer 3) link into a routing zone, tagged or untagged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IpLink {
    /// Node and pipeline ids.
    #[serde(flatten)]
    pub ids: PrimitiveIds,
    /// Child batch id; null without children.
    pub batch_id: AttrValue<String>,
    /// Routing zone node id.
    pub routing_zone_id: AttrValue<String>,
    /// 802.1Q tag; null for an untagged link.
    pub vlan_id: AttrValue<i64>,
    /// L3 MTU; null uses the virtual network policy default.
    pub l3_mtu: AttrValue<i64>,
    /// `none` or `numbered`.
    pub ipv4_addressing_type: AttrValue<String>,
    /// `none`, `link_local` or `numbered`.
    pub ipv6_addressing_type: AttrValue<String>,
    /// Child primitives.
    #[serde(flatten)]
    pub children: PeeringChildren,
}

impl CtPrimitive for IpLink {
    fn block() -> Block {
        let block = with_id_attributes(Block::new(), true)
            .with_attribute(
                "routing_zone_id",
                Attribute::required_string()
                    .with_description("Node ID of the Routing Zone to which this IP Link should belong."),
            )
            .with_attribute(
                "vlan_id",
                Attribute::optional_int64().with_description(
                    "802.1Q tag number to use for tagged IP Link. Omit for untagged IP Link.",
                ),
            )
            .with_attribute(
                "l3_mtu",
                Attribute::optional_int64().with_description(format!(
                    "L3 MTU for sub-interfaces on the leaf side and generic side. Must be an even \
                     number from {} to {}. When omitted the Virtual Network Policy default is used.",
                    L3_MTU_MIN, L3_MTU_MAX
                )),
            )
            .with_attribute(
                "ipv4_addressing_type",
                Attribute::required_string()
                    .with_description(format!("One of `{}`", Ipv4AddressingType::VALUES.join("`, `"))),
            )
            .with_attribute(
                "ipv6_addressing_type",
                Attribute::required_string()
                    .with_description(format!("One of `{}`", Ipv6AddressingType::VALUES.join("`, `"))),
            );
        PeeringChildren::with_blocks(block)
    }

    fn validate(&self, path: &str, diags: &mut Diagnostics) {
        length_at_least(&join_path(path, "routing_zone_id"), &self.routing_zone_id, 1, diags);
        between(&join_path(path, "vlan_id"), &self.vlan_id, VLAN_MIN_USABLE, VLAN_MAX_USABLE, diags);

        let mtu_path = join_path(path, "l3_mtu");
        between(&mtu_path, &self.l3_mtu, L3_MTU_MIN, L3_MTU_MAX, diags);
        must_be_even_or_odd(&mtu_path, &self.l3_mtu, true, diags);

        one_of(
            &join_path(path, "ipv4_addressing_type"),
            &self.ipv4_addressing_type,
            Ipv4AddressingType::VALUES,
            diags,
        );
        one_of(
            &join_path(path, "ipv6_addressing_type"),
            &self.ipv6_addressing_type,
            Ipv6AddressingType::VALUES,
            diags,
        );

        self.children.validate(path, diags);
    }

    fn matches(attributes: &PrimitiveAttributes) -> bool {
        matches!(attributes, PrimitiveAttributes::LogicalLink(_))
    }

    fn from_attributes(attributes: &PrimitiveAttributes) -> Option<Self> {
        let PrimitiveAttributes::LogicalLink(a) = attributes else {
            return None;
        };
        Some(Self {
            routing_zone_id: AttrValue::from_option(a.security_zone.clone()),
            vlan_id: AttrValue::from_option(a.vlan_id.map(i64::from)),
            l3_mtu: AttrValue::from_option(a.l3_mtu.map(i64::from)),
            ipv4_addressing_type: AttrValue::Known(a.ipv4_addressing_type.to_string()),
            ipv6_addressing_type: AttrValue::Known(a.ipv6_addressing_type.to_string()),
            ..Default::default()
        })
    }

    fn attributes(&self, diags: &mut Diagnostics) -> Option<PrimitiveAttributes> {
        let ipv4_addressing_type =
            parse_enum("ipv4_addressing_type", &self.ipv4_addressing_type, diags)?;
        let ipv6_addressing_type =
            parse_enum("ipv6_addressing_type", &self.ipv6_addressing_type, diags)?;

        let attrs = AttachLogicalLink {
            security_zone: known_string(&self.routing_zone_id),
            tagged: !self.vlan_id.is_null(),
            vlan_id: narrow("vlan_id", &self.vlan_id, diags),
            ipv4_addressing_type,
            ipv6_addressing_type,
            l3_mtu: narrow("l3_mtu", &self.l3_mtu, diags),
        };
        if diags.has_error() {
            return None;
        }
        Some(PrimitiveAttributes::LogicalLink(attrs))
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
        self.children.count()
    }

    fn children(&self, diags: &mut Diagnostics) -> Vec<Primitive> {
        self.children.subpolicies(diags)
    }

    fn load_children(&mut self, subpolicies: &[Primitive], diags: &mut Diagnostics) {
        self.children = PeeringChildren::from_subpolicies(subpolicies, diags);
    }

    fn load_child_ids(&mut self, subpolicies: &[Primitive], diags: &mut Diagnostics) {
        self.children.load_ids(subpolicies, diags);
    }

    fn plan_children(&mut self, state: Option<&Self>, diags: &mut Diagnostics) {
        self.children.plan(state.map(|s| &s.children), diags);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connectivity_template::primitives::{from_subpolicies, PrimitiveMap};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn sample() -> IpLink {
        serde_json::from_value(json!({
            "routing_zone_id": "rz1",
            "vlan_id": 10,
            "ipv4_addressing_type": "numbered",
            "ipv6_addressing_type": "link_local",
            "static_routes": {
                "default": {"network": "0.0.0.0/0", "share_ip_endpoint": false}
            },
            "bgp_peering_ip_endpoints": {
                "peer": {"bfd_enabled": true, "ipv4_address": "192.0.2.1"}
            }
        }))
        .unwrap()
    }

    #[test]
    fn test_validate() {
        let mut diags = Diagnostics::new();
        sample().validate("ip_links.l", &mut diags);
        assert!(diags.is_empty(), "{:?}", diags);

        let mut link = sample();
        link.vlan_id = AttrValue::Known(1);
        link.l3_mtu = AttrValue::Known(1501);
        link.ipv6_addressing_type = AttrValue::Known("addressed".into());
        let mut diags = Diagnostics::new();
        link.validate("ip_links.l", &mut diags);
        assert_eq!(diags.error_count(), 3);
    }

    #[test]
    fn test_tagged_follows_vlan() {
        let mut diags = Diagnostics::new();
        let PrimitiveAttributes::LogicalLink(wire) = sample().attributes(&mut diags).unwrap() else {
            panic!("wrong variant");
        };
        assert!(wire.tagged);
        assert_eq!(wire.vlan_id, Some(10));
        assert_eq!(wire.security_zone.as_deref(), Some("rz1"));

        let mut untagged = sample();
        untagged.vlan_id = AttrValue::Null;
        let PrimitiveAttributes::LogicalLink(wire) = untagged.attributes(&mut diags).unwrap() else {
            panic!("wrong variant");
        };
        assert!(!wire.tagged);
        assert_eq!(wire.vlan_id, None);
    }

    #[test]
    fn test_children_round_trip_through_wire() {
        let mut diags = Diagnostics::new();
        let mut wire = sample().primitive("link", &mut diags).unwrap();
        assert_eq!(wire.subpolicies.len(), 2);

        wire.id = Some("id-1".into());
        wire.pipeline_id = Some("pl-1".into());
        wire.batch_id = Some("b-1".into());

        let map: PrimitiveMap<IpLink> = from_subpolicies(&[wire], &mut diags);
        let link = &map.as_known().unwrap()["link"];
        assert_eq!(link.batch_id, AttrValue::Known("b-1".to_string()));
        assert_eq!(link.children.static_routes.as_known().unwrap().len(), 1);
        assert_eq!(link.children.bgp_peering_ip_endpoints.as_known().unwrap().len(), 1);
        assert!(link.children.dynamic_bgp_peerings.is_null());
    }

    #[test]
    fn test_plan_batch_id_when_children_removed() {
        let mut state = sample();
        state.ids.id = AttrValue::Known("id".into());
        state.batch_id = AttrValue::Known("b".into());

        let mut plan = sample();
        plan.children = PeeringChildren::default();
        let mut diags = Diagnostics::new();
        plan.plan(Some(&state), &mut diags);
        assert!(plan.batch_id.is_null());

        let mut plan = sample();
        plan.children.static_routes = AttrValue::Unknown;
        plan.plan(Some(&state), &mut diags);
        assert!(plan.batch_id.is_unknown());
    }

    #[test]
    fn test_plan_recurses_into_children() {
        let mut state = sample();
        state.ids.id = AttrValue::Known("id".into());
        state.batch_id = AttrValue::Known("b".into());
        if let Some(routes) = state.children.static_routes.as_known_mut() {
            for r in routes.values_mut() {
                r.ids.id = AttrValue::Known("route-id".into());
            }
        }

        let mut plan = sample();
        let mut diags = Diagnostics::new();
        plan.plan(Some(&state), &mut diags);
        let route = &plan.children.static_routes.as_known().unwrap()["default"];
        assert_eq!(route.ids.id, AttrValue::Known("route-id".to_string()));
        let peer = &plan.children.bgp_peering_ip_endpoints.as_known().unwrap()["peer"];
        assert!(peer.ids.id.is_unknown(), "no prior id for this peer");
    }
}
