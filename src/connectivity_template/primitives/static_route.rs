use serde::{Deserialize, Serialize};

use super::{known_string, with_id_attributes, CtPrimitive, PrimitiveIds};
use crate::connectivity_template::policy::{AttachStaticRoute, PrimitiveAttributes};
use crate::customtypes::{keep_semantically_equal, Ipv46Prefix};
use crate::schema::{Attribute, Block, Diagnostics};
use crate::validation::{join_path, valid_ipv46_prefix};
use crate::value::AttrValue;

/// Static route to a destination prefix, reachable via the parent primitive.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StaticRoute {
    /// Node and pipeline ids.
    #[serde(flatten)]
    pub ids: PrimitiveIds,
    /// Destination network (IPv4 or IPv6 base prefix).
    pub network: AttrValue<Ipv46Prefix>,
    /// Share the IP endpoint between multiple remote systems.
    pub share_ip_endpoint: AttrValue<bool>,
}

impl CtPrimitive for StaticRoute {
    fn block() -> Block {
        with_id_attributes(Block::new(), false)
            .with_attribute(
                "network",
                Attribute::required_string()
                    .with_description("Destination network in CIDR notation."),
            )
            .with_attribute(
                "share_ip_endpoint",
                Attribute::required_bool().with_description(
                    "Indicates whether the next-hop IP address is shared across \
                     multiple remote systems.",
                ),
            )
    }

    fn validate(&self, path: &str, diags: &mut Diagnostics) {
        valid_ipv46_prefix(&join_path(path, "network"), &self.network, diags);
    }

    fn matches(attributes: &PrimitiveAttributes) -> bool {
        matches!(attributes, PrimitiveAttributes::StaticRoute(_))
    }

    fn from_attributes(attributes: &PrimitiveAttributes) -> Option<Self> {
        let PrimitiveAttributes::StaticRoute(a) = attributes else {
            return None;
        };
        Some(Self {
            ids: PrimitiveIds::default(),
            network: AttrValue::from_option(a.network.clone().map(Ipv46Prefix::new)),
            share_ip_endpoint: AttrValue::Known(a.share_ip_endpoint),
        })
    }

    fn attributes(&self, _diags: &mut Diagnostics) -> Option<PrimitiveAttributes> {
        Some(PrimitiveAttributes::StaticRoute(AttachStaticRoute {
            network: known_string(&self.network),
            share_ip_endpoint: self.share_ip_endpoint.known_or(false),
        }))
    }

    fn ids(&self) -> &PrimitiveIds {
        &self.ids
    }

    fn ids_mut(&mut self) -> &mut PrimitiveIds {
        &mut self.ids
    }

    fn plan_values(&mut self, state: Option<&Self>, diags: &mut Diagnostics) {
        self.network = keep_semantically_equal(
            state.map(|s| &s.network),
            std::mem::take(&mut self.network),
            diags,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_state_json() {
        let route: StaticRoute = serde_json::from_value(json!({
            "id": null,
            "pipeline_id": null,
            "network": "10.1.0.0/16",
            "share_ip_endpoint": true,
        }))
        .unwrap();
        assert_eq!(route.network, AttrValue::Known(Ipv46Prefix::new("10.1.0.0/16")));
        assert!(route.ids.id.is_null());

        let mut diags = Diagnostics::new();
        let PrimitiveAttributes::StaticRoute(wire) = route.attributes(&mut diags).unwrap() else {
            panic!("wrong variant");
        };
        assert_eq!(wire.network.as_deref(), Some("10.1.0.0/16"));
        assert!(wire.share_ip_endpoint);
    }

    #[test]
    fn test_validate_rejects_host_bits() {
        let route = StaticRoute {
            network: AttrValue::Known(Ipv46Prefix::new("10.1.2.3/16")),
            share_ip_endpoint: AttrValue::Known(false),
            ..Default::default()
        };
        let mut diags = Diagnostics::new();
        route.validate("static_routes.r1", &mut diags);
        assert!(diags.has_error());
        assert_eq!(diags[0].attribute.as_deref(), Some("static_routes.r1.network"));
    }

    #[test]
    fn test_plan_keeps_state_spelling() {
        let state = StaticRoute {
            network: AttrValue::Known(Ipv46Prefix::new("2001:db8::/32")),
            ..Default::default()
        };
        let mut plan = StaticRoute {
            network: AttrValue::Known(Ipv46Prefix::new("2001:0DB8:0:0::/32")),
            ..Default::default()
        };
        let mut diags = Diagnostics::new();
        plan.plan(Some(&state), &mut diags);
        assert_eq!(plan.network, state.network);
        assert!(plan.ids.id.is_unknown());
    }
}
