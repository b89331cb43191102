use serde::{Deserialize, Serialize};

use super::{known_string, with_id_attributes, CtPrimitive, PrimitiveIds};
use crate::connectivity_template::policy::{AttachMultipleVlan, PrimitiveAttributes};
use crate::schema::{Attribute, Block, Diagnostics};
use crate::validation::{join_path, size_at_least};
use crate::value::{vec_value_or_null, AttrValue};

/// Attach one untagged and any number of tagged virtual networks.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VirtualNetworkMultiple {
    /// Node and pipeline ids.
    #[serde(flatten)]
    pub ids: PrimitiveIds,
    /// Virtual network delivered untagged.
    pub untagged_vn_id: AttrValue<String>,
    /// Virtual networks delivered tagged (a set).
    pub tagged_vn_ids: AttrValue<Vec<String>>,
}

impl CtPrimitive for VirtualNetworkMultiple {
    fn block() -> Block {
        with_id_attributes(Block::new(), false)
            .with_attribute(
                "untagged_vn_id",
                Attribute::optional_string()
                    .with_description("Virtual Network ID which should be presented without VLAN tags"),
            )
            .with_attribute(
                "tagged_vn_ids",
                Attribute::optional_string_set()
                    .with_description("Virtual Network IDs which should be presented with VLAN tags"),
            )
    }

    fn validate(&self, path: &str, diags: &mut Diagnostics) {
        size_at_least(
            &join_path(path, "tagged_vn_ids"),
            self.tagged_vn_ids.as_known().map(Vec::len),
            1,
            diags,
        );
    }

    fn matches(attributes: &PrimitiveAttributes) -> bool {
        matches!(attributes, PrimitiveAttributes::MultipleVlan(_))
    }

    fn from_attributes(attributes: &PrimitiveAttributes) -> Option<Self> {
        let PrimitiveAttributes::MultipleVlan(a) = attributes else {
            return None;
        };
        let mut tagged = a.tagged_vn_node_ids.clone();
        tagged.sort();
        Some(Self {
            ids: PrimitiveIds::default(),
            untagged_vn_id: AttrValue::from_option(a.untagged_vn_node_id.clone()),
            tagged_vn_ids: vec_value_or_null(tagged),
        })
    }

    fn attributes(&self, _diags: &mut Diagnostics) -> Option<PrimitiveAttributes> {
        Some(PrimitiveAttributes::MultipleVlan(AttachMultipleVlan {
            untagged_vn_node_id: known_string(&self.untagged_vn_id),
            tagged_vn_node_ids: self.tagged_vn_ids.value_or_default(),
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
    fn test_null_tagged_sent_as_empty() {
        let vn = VirtualNetworkMultiple {
            untagged_vn_id: AttrValue::Known("vn1".into()),
            ..Default::default()
        };
        let mut diags = Diagnostics::new();
        let attrs = vn.attributes(&mut diags).unwrap();
        assert_eq!(attrs.to_value().unwrap()["tagged_vn_node_ids"], serde_json::json!([]));

        let back = VirtualNetworkMultiple::from_attributes(&attrs).unwrap();
        assert!(back.tagged_vn_ids.is_null());
        assert_eq!(back.untagged_vn_id, AttrValue::Known("vn1".to_string()));
    }

    #[test]
    fn test_tagged_sorted_on_read() {
        let attrs = PrimitiveAttributes::MultipleVlan(AttachMultipleVlan {
            untagged_vn_node_id: None,
            tagged_vn_node_ids: vec!["b".into(), "a".into()],
        });
        let vn = VirtualNetworkMultiple::from_attributes(&attrs).unwrap();
        assert_eq!(vn.tagged_vn_ids, AttrValue::Known(vec!["a".to_string(), "b".to_string()]));
        assert!(vn.untagged_vn_id.is_null());
    }

    #[test]
    fn test_empty_tagged_set_rejected() {
        let vn = VirtualNetworkMultiple {
            tagged_vn_ids: AttrValue::Known(Vec::new()),
            ..Default::default()
        };
        let mut diags = Diagnostics::new();
        vn.validate("virtual_network_multiples.x", &mut diags);
        assert!(diags.has_error());
    }
}
