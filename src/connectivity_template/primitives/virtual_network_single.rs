use serde::{Deserialize, Serialize};

use super::peering_children::PeeringChildren;
use super::{known_string, with_id_attributes, CtPrimitive, PrimitiveIds};
use crate::connectivity_template::policy::{AttachSingleVlan, Primitive, PrimitiveAttributes, TagType};
use crate::schema::{Attribute, Block, Diagnostics};
use crate::validation::{join_path, length_at_least};
use crate::value::AttrValue;

/// Attach one virtual network, tagged or untagged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VirtualNetworkSingle {
    /// Node and pipeline ids.
    #[serde(flatten)]
    pub ids: PrimitiveIds,
    /// Child batch id; null without children.
    pub batch_id: AttrValue<String>,
    /// Virtual network node id.
    pub virtual_network_id: AttrValue<String>,
    /// Deliver the virtual network with an 802.1Q tag.
    pub tagged: AttrValue<bool>,
    /// Child primitives.
    #[serde(flatten)]
    pub children: PeeringChildren,
}

impl CtPrimitive for VirtualNetworkSingle {
    fn block() -> Block {
        let block = with_id_attributes(Block::new(), true)
            .with_attribute(
                "virtual_network_id",
                Attribute::required_string().with_description("Virtual Network ID"),
            )
            .with_attribute(
                "tagged",
                Attribute::required_bool()
                    .with_description("Indicates whether the VN should be presented with an 802.1Q tag"),
            );
        PeeringChildren::with_blocks(block)
    }

    fn validate(&self, path: &str, diags: &mut Diagnostics) {
        length_at_least(&join_path(path, "virtual_network_id"), &self.virtual_network_id, 1, diags);
        self.children.validate(path, diags);
    }

    fn matches(attributes: &PrimitiveAttributes) -> bool {
        matches!(attributes, PrimitiveAttributes::SingleVlan(_))
    }

    fn from_attributes(attributes: &PrimitiveAttributes) -> Option<Self> {
        let PrimitiveAttributes::SingleVlan(a) = attributes else {
            return None;
        };
        Some(Self {
            virtual_network_id: AttrValue::from_option(a.vn_node_id.clone()),
            tagged: AttrValue::Known(a.tag_type == TagType::VlanTagged),
            ..Default::default()
        })
    }

    fn attributes(&self, _diags: &mut Diagnostics) -> Option<PrimitiveAttributes> {
        Some(PrimitiveAttributes::SingleVlan(AttachSingleVlan {
            vn_node_id: known_string(&self.virtual_network_id),
            tag_type: if self.tagged.known_or(false) {
                TagType::VlanTagged
            } else {
                TagType::Untagged
            },
        }))
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
