use serde::{Deserialize, Serialize};

use super::{
    from_subpolicies, known_string, load_ids_into_map, map_block, map_len, narrow, plan_map,
    subpolicies, validate_map, with_bgp_attributes, with_id_attributes, BgpSession, CtPrimitive,
    PrimitiveIds, PrimitiveMap, RoutingPolicy, ASN_MAX, ASN_MIN,
};
use crate::connectivity_template::policy::{
    AttachIpEndpointWithBgpNsxt, NeighborAsnType, Primitive, PrimitiveAttributes,
};
use crate::customtypes::{keep_semantically_equal, Ipv46Address};
use crate::schema::{Attribute, Block, Diagnostics};
use crate::validation::{at_least_one_of, between, join_path};
use crate::value::AttrValue;

/// BGP session with an IP endpoint.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BgpPeeringIpEndpoint {
    /// Node and pipeline ids.
    #[serde(flatten)]
    pub ids: PrimitiveIds,
    /// Child batch id; null without routing policies.
    pub batch_id: AttrValue<String>,
    /// Session settings.
    #[serde(flatten)]
    pub session: BgpSession,
    /// Neighbor ASN; null means the neighbor ASN is learned.
    pub neighbor_asn: AttrValue<i64>,
    /// IPv4 address of the endpoint.
    pub ipv4_address: AttrValue<Ipv46Address>,
    /// IPv6 address of the endpoint.
    pub ipv6_address: AttrValue<Ipv46Address>,
    /// Child routing policy primitives.
    pub routing_policies: PrimitiveMap<RoutingPolicy>,
}

impl CtPrimitive for BgpPeeringIpEndpoint {
    fn block() -> Block {
        with_bgp_attributes(with_id_attributes(Block::new(), true))
            .with_attribute(
                "neighbor_asn",
                Attribute::optional_int64()
                    .with_description("Neighbor ASN. Omit for *Neighbor ASN Type Dynamic*."),
            )
            .with_attribute(
                "ipv4_address",
                Attribute::optional_string().with_description("IPv4 address of peer"),
            )
            .with_attribute(
                "ipv6_address",
                Attribute::optional_string().with_description("IPv6 address of peer"),
            )
            .with_block(
                "routing_policies",
                map_block::<RoutingPolicy>("Map of Routing Policy Primitives to be used with this BGP session."),
            )
    }

    fn validate(&self, path: &str, diags: &mut Diagnostics) {
        self.session.validate(path, diags);
        between(&join_path(path, "neighbor_asn"), &self.neighbor_asn, ASN_MIN, ASN_MAX, diags);

        at_least_one_of(
            path,
            &[
                (join_path(path, "ipv4_address").as_str(), self.ipv4_address.is_null()),
                (join_path(path, "ipv6_address").as_str(), self.ipv6_address.is_null()),
            ],
            diags,
        );
        if let Some(addr) = self.ipv4_address.as_known() {
            validate_family(&join_path(path, "ipv4_address"), addr, false, diags);
        }
        if let Some(addr) = self.ipv6_address.as_known() {
            validate_family(&join_path(path, "ipv6_address"), addr, true, diags);
        }

        validate_map(path, "routing_policies", &self.routing_policies, diags);
    }

    fn matches(attributes: &PrimitiveAttributes) -> bool {
        matches!(attributes, PrimitiveAttributes::IpEndpointWithBgpNsxt(_))
    }

    fn from_attributes(attributes: &PrimitiveAttributes) -> Option<Self> {
        let PrimitiveAttributes::IpEndpointWithBgpNsxt(a) = attributes else {
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
            neighbor_asn: AttrValue::from_option(a.asn.map(i64::from)),
            ipv4_address: AttrValue::from_option(a.ipv4_addr.clone().map(Ipv46Address::new)),
            ipv6_address: AttrValue::from_option(a.ipv6_addr.clone().map(Ipv46Address::new)),
            ..Default::default()
        })
    }

    fn attributes(&self, diags: &mut Diagnostics) -> Option<PrimitiveAttributes> {
        let attrs = AttachIpEndpointWithBgpNsxt {
            asn: narrow("neighbor_asn", &self.neighbor_asn, diags),
            bfd: self.session.bfd(),
            holdtime_timer: narrow("hold_time", &self.session.hold_time, diags),
            ipv4_addr: known_string(&self.ipv4_address),
            ipv6_addr: known_string(&self.ipv6_address),
            keepalive_timer: narrow("keepalive_time", &self.session.keepalive_time, diags),
            local_asn: narrow("local_asn", &self.session.local_asn, diags),
            neighbor_asn_type: if self.neighbor_asn.is_null() {
                NeighborAsnType::Dynamic
            } else {
                NeighborAsnType::Static
            },
            password: self.session.password.as_known().cloned(),
            ttl: self.session.wire_ttl(diags),
            ipv4_safi: !self.ipv4_address.is_null(),
            ipv6_safi: !self.ipv6_address.is_null(),
        };
        if diags.has_error() {
            return None;
        }
        Some(PrimitiveAttributes::IpEndpointWithBgpNsxt(attrs))
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
        self.ipv4_address = keep_semantically_equal(
            state.map(|s| &s.ipv4_address),
            std::mem::take(&mut self.ipv4_address),
            diags,
        );
        self.ipv6_address = keep_semantically_equal(
            state.map(|s| &s.ipv6_address),
            std::mem::take(&mut self.ipv6_address),
            diags,
        );
    }

    fn plan_children(&mut self, state: Option<&Self>, diags: &mut Diagnostics) {
        plan_map(&mut self.routing_policies, state.map(|s| &s.routing_policies), diags);
    }
}

fn validate_family(path: &str, addr: &Ipv46Address, want_v6: bool, diags: &mut Diagnostics) {
    let before = diags.error_count();
    addr.validate(path, diags);
    if diags.error_count() > before {
        return;
    }
    if addr.is_ipv6() != want_v6 {
        diags.add_attribute_error(
            path,
            "Invalid Attribute Value",
            format!(
                "{} is not an {} address",
                addr,
                if want_v6 { "IPv6" } else { "IPv4" }
            ),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn endpoint(v4: Option<&str>, v6: Option<&str>) -> BgpPeeringIpEndpoint {
        BgpPeeringIpEndpoint {
            session: BgpSession {
                bfd_enabled: AttrValue::Known(false),
                ..Default::default()
            },
            ipv4_address: AttrValue::from_option(v4.map(Ipv46Address::new)),
            ipv6_address: AttrValue::from_option(v6.map(Ipv46Address::new)),
            ..Default::default()
        }
    }

    #[test]
    fn test_safi_follows_addresses() {
        let mut diags = Diagnostics::new();
        let attrs = endpoint(Some("10.0.0.1"), None)
            .attributes(&mut diags)
            .unwrap()
            .to_value()
            .unwrap();
        assert_eq!(attrs["ipv4_safi"], json!(true));
        assert_eq!(attrs["ipv6_safi"], json!(false));
        assert_eq!(attrs["ipv4_addr"], json!("10.0.0.1"));
        assert_eq!(attrs["neighbor_asn_type"], json!("dynamic"));
        assert_eq!(attrs["ttl"], json!(0));
    }

    #[test]
    fn test_static_neighbor_asn() {
        let mut ep = endpoint(None, Some("2001:db8::1"));
        ep.neighbor_asn = AttrValue::Known(4_200_000_000);
        let mut diags = Diagnostics::new();
        let attrs = ep.attributes(&mut diags).unwrap();
        let PrimitiveAttributes::IpEndpointWithBgpNsxt(wire) = &attrs else {
            panic!("wrong variant");
        };
        assert_eq!(wire.asn, Some(4_200_000_000));
        assert_eq!(wire.neighbor_asn_type, NeighborAsnType::Static);

        let back = BgpPeeringIpEndpoint::from_attributes(&attrs).unwrap();
        assert_eq!(back.neighbor_asn, AttrValue::Known(4_200_000_000));
        assert!(back.ipv4_address.is_null());
    }

    #[test]
    fn test_validate_addresses() {
        let cases = [
            (Some("10.0.0.1"), None, 0),
            (None, Some("fe80::1"), 0),
            (None, None, 1),
            (Some("fe80::1"), None, 1),
            (None, Some("10.0.0.1"), 1),
            (Some("bogus"), None, 1),
        ];
        for (v4, v6, errors) in cases {
            let mut diags = Diagnostics::new();
            endpoint(v4, v6).validate("ep", &mut diags);
            assert_eq!(diags.error_count(), errors, "{:?} {:?}", v4, v6);
        }
    }

    #[test]
    fn test_plan_keeps_ipv6_spelling() {
        let mut state = endpoint(None, Some("2001:db8::1"));
        state.ids.id = AttrValue::Known("x".into());
        let mut plan = endpoint(None, Some("2001:0db8:0:0:0:0:0:1"));
        let mut diags = Diagnostics::new();
        plan.plan(Some(&state), &mut diags);
        assert_eq!(plan.ipv6_address, state.ipv6_address);
        assert!(plan.batch_id.is_null());
    }
}
