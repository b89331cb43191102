use serde::{Deserialize, Serialize};

use super::{known_string, with_id_attributes, CtPrimitive, PrimitiveIds};
use crate::connectivity_template::policy::{AttachCustomStaticRoute, PrimitiveAttributes};
use crate::customtypes::{keep_semantically_equal, Ipv46Address, Ipv46Prefix};
use crate::schema::{Attribute, Block, Diagnostics};
use crate::validation::{join_path, length_at_least, valid_ipv46_address, valid_ipv46_prefix};
use crate::value::AttrValue;

/// Static route with an explicit next hop inside a routing zone.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CustomStaticRoute {
    /// Node and pipeline ids.
    #[serde(flatten)]
    pub ids: PrimitiveIds,
    /// Routing zone (security zone) node id.
    pub routing_zone_id: AttrValue<String>,
    /// Destination prefix.
    pub network: AttrValue<Ipv46Prefix>,
    /// Next hop address, same family as `network`.
    pub next_hop: AttrValue<Ipv46Address>,
}

impl CtPrimitive for CustomStaticRoute {
    fn block() -> Block {
        with_id_attributes(Block::new(), false)
            .with_attribute(
                "routing_zone_id",
                Attribute::required_string()
                    .with_description("Routing Zone ID where this route should be installed"),
            )
            .with_attribute(
                "network",
                Attribute::required_string()
                    .with_description("Destination network in CIDR notation"),
            )
            .with_attribute(
                "next_hop",
                Attribute::required_string().with_description(
                    "Next-hop router address. Must be the same address family as `network`.",
                ),
            )
    }

    fn validate(&self, path: &str, diags: &mut Diagnostics) {
        length_at_least(&join_path(path, "routing_zone_id"), &self.routing_zone_id, 1, diags);

        let network_path = join_path(path, "network");
        let next_hop_path = join_path(path, "next_hop");
        let errors = diags.error_count();
        valid_ipv46_prefix(&network_path, &self.network, diags);
        valid_ipv46_address(&next_hop_path, &self.next_hop, diags);
        if diags.error_count() > errors {
            return;
        }

        if let (Some(network), Some(next_hop)) = (self.network.as_known(), self.next_hop.as_known()) {
            if network.is_ipv4() != next_hop.is_ipv4() {
                diags.add_attribute_error(
                    next_hop_path,
                    "Invalid Attribute Combination",
                    format!(
                        "next_hop {} and network {} must be the same address family",
                        next_hop, network
                    ),
                );
            }
        }
    }

    fn matches(attributes: &PrimitiveAttributes) -> bool {
        matches!(attributes, PrimitiveAttributes::CustomStaticRoute(_))
    }

    fn from_attributes(attributes: &PrimitiveAttributes) -> Option<Self> {
        let PrimitiveAttributes::CustomStaticRoute(a) = attributes else {
            return None;
        };
        Some(Self {
            ids: PrimitiveIds::default(),
            routing_zone_id: AttrValue::from_option(a.security_zone.clone()),
            network: AttrValue::from_option(a.network.clone().map(Ipv46Prefix::new)),
            next_hop: AttrValue::from_option(a.next_hop.clone().map(Ipv46Address::new)),
        })
    }

    fn attributes(&self, _diags: &mut Diagnostics) -> Option<PrimitiveAttributes> {
        Some(PrimitiveAttributes::CustomStaticRoute(AttachCustomStaticRoute {
            network: known_string(&self.network),
            next_hop: known_string(&self.next_hop),
            security_zone: known_string(&self.routing_zone_id),
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
        self.next_hop = keep_semantically_equal(
            state.map(|s| &s.next_hop),
            std::mem::take(&mut self.next_hop),
            diags,
        );
    }
}
