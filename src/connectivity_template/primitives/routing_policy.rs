use serde::{Deserialize, Serialize};

use super::{known_string, with_id_attributes, CtPrimitive, PrimitiveIds};
use crate::connectivity_template::policy::{AttachExistingRoutingPolicy, PrimitiveAttributes};
use crate::schema::{Attribute, Block, Diagnostics};
use crate::validation::{join_path, length_at_least};
use crate::value::AttrValue;

/// Attach an existing routing policy.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoutingPolicy {
    /// Node and pipeline ids.
    #[serde(flatten)]
    pub ids: PrimitiveIds,
    /// Routing policy node id.
    pub routing_policy_id: AttrValue<String>,
}

impl CtPrimitive for RoutingPolicy {
    fn block() -> Block {
        with_id_attributes(Block::new(), false).with_attribute(
            "routing_policy_id",
            Attribute::required_string()
                .with_description("Routing Policy ID to be applied"),
        )
    }

    fn validate(&self, path: &str, diags: &mut Diagnostics) {
        length_at_least(&join_path(path, "routing_policy_id"), &self.routing_policy_id, 1, diags);
    }

    fn matches(attributes: &PrimitiveAttributes) -> bool {
        matches!(attributes, PrimitiveAttributes::ExistingRoutingPolicy(_))
    }

    fn from_attributes(attributes: &PrimitiveAttributes) -> Option<Self> {
        let PrimitiveAttributes::ExistingRoutingPolicy(a) = attributes else {
            return None;
        };
        Some(Self {
            ids: PrimitiveIds::default(),
            routing_policy_id: AttrValue::from_option(a.rp_to_attach.clone()),
        })
    }

    fn attributes(&self, _diags: &mut Diagnostics) -> Option<PrimitiveAttributes> {
        Some(PrimitiveAttributes::ExistingRoutingPolicy(AttachExistingRoutingPolicy {
            rp_to_attach: known_string(&self.routing_policy_id),
        }))
    }

    fn ids(&self) -> &PrimitiveIds {
        &self.ids
    }

    fn ids_mut(&mut self) -> &mut PrimitiveIds {
        &mut self.ids
    }
}
