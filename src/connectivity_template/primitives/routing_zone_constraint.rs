use serde::{Deserialize, Serialize};

use super::{known_string, with_id_attributes, CtPrimitive, PrimitiveIds};
use crate::connectivity_template::policy::{AttachRoutingZoneConstraint, PrimitiveAttributes};
use crate::schema::{Attribute, Block, Diagnostics};
use crate::validation::{join_path, length_at_least};
use crate::value::AttrValue;

/// Restrict the interface to routing zones allowed by a constraint.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoutingZoneConstraint {
    /// Node and pipeline ids.
    #[serde(flatten)]
    pub ids: PrimitiveIds,
    /// Routing zone constraint node id.
    pub routing_zone_constraint_id: AttrValue<String>,
}

impl CtPrimitive for RoutingZoneConstraint {
    fn block() -> Block {
        with_id_attributes(Block::new(), false).with_attribute(
            "routing_zone_constraint_id",
            Attribute::required_string()
                .with_description("Routing Zone Constraint ID to be applied"),
        )
    }

    fn validate(&self, path: &str, diags: &mut Diagnostics) {
        length_at_least(
            &join_path(path, "routing_zone_constraint_id"),
            &self.routing_zone_constraint_id,
            1,
            diags,
        );
    }

    fn matches(attributes: &PrimitiveAttributes) -> bool {
        matches!(attributes, PrimitiveAttributes::RoutingZoneConstraint(_))
    }

    fn from_attributes(attributes: &PrimitiveAttributes) -> Option<Self> {
        let PrimitiveAttributes::RoutingZoneConstraint(a) = attributes else {
            return None;
        };
        Some(Self {
            ids: PrimitiveIds::default(),
            routing_zone_constraint_id: AttrValue::from_option(a.routing_zone_constraint.clone()),
        })
    }

    fn attributes(&self, _diags: &mut Diagnostics) -> Option<PrimitiveAttributes> {
        Some(PrimitiveAttributes::RoutingZoneConstraint(AttachRoutingZoneConstraint {
            routing_zone_constraint: known_string(&self.routing_zone_constraint_id),
        }))
    }

    fn ids(&self) -> &PrimitiveIds {
        &self.ids
    }

    fn ids_mut(&mut self) -> &mut PrimitiveIds {
        &mut self.ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_id_rejected() {
        let c = RoutingZoneConstraint {
            routing_zone_constraint_id: AttrValue::Known(String::new()),
            ..Default::default()
        };
        let mut diags = Diagnostics::new();
        c.validate("routing_zone_constraints.c", &mut diags);
        assert!(diags.has_error());
    }
}
