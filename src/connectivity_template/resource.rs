//! Resource state shared by every connectivity template flavor.
//!
//! The flavors differ only in which primitive maps sit at the root of the
//! template. [`CtKind`] describes those maps and
//! [`ConnectivityTemplateResource`] implements the common fields and the
//! resource lifecycle on top of it.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::policy::{ConnectivityTemplate, Primitive};
use crate::client::ApstraClient;
use crate::error::ProviderError;
use crate::plan_modifier::use_state_for_unknown;
use crate::schema::{Attribute, Diagnostics, Schema, PROVIDER_BUG};
use crate::validation::{length_at_least, size_at_least};
use crate::value::{string_value_or_null, vec_value_or_null, AttrValue};

/// The root-level primitive maps of one connectivity template flavor.
pub trait CtKind:
    std::fmt::Debug + Clone + Default + PartialEq + Serialize + DeserializeOwned + Send + Sync + 'static
{
    /// Resource type name.
    const TYPE_NAME: &'static str;

    /// Resource description.
    const DESCRIPTION: &'static str;

    /// Add the primitive map blocks to the resource schema.
    fn with_blocks(schema: Schema) -> Schema;

    /// Validate every primitive map.
    fn validate(&self, diags: &mut Diagnostics);

    /// Root-level primitives in wire form.
    fn subpolicies(&self, diags: &mut Diagnostics) -> Vec<Primitive>;

    /// Root-level primitive maps from wire primitives.
    fn from_subpolicies(subpolicies: &[Primitive], diags: &mut Diagnostics) -> Self;

    /// Copy generated ids into the primitive maps.
    fn load_ids(&mut self, subpolicies: &[Primitive], diags: &mut Diagnostics);

    /// Plan the primitive maps against prior state.
    fn plan(&mut self, state: Option<&Self>, diags: &mut Diagnostics);
}

/// State of a connectivity template resource.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectivityTemplateResource<K> {
    /// Root batch id.
    pub id: AttrValue<String>,
    /// Blueprint the template lives in.
    pub blueprint_id: AttrValue<String>,
    /// Template name (the root label).
    pub name: AttrValue<String>,
    /// Template description.
    pub description: AttrValue<String>,
    /// Template tags (a set).
    pub tags: AttrValue<Vec<String>>,
    /// Root-level primitive maps.
    #[serde(flatten)]
    pub primitives: K,
}

impl<K: CtKind> ConnectivityTemplateResource<K> {
    /// Resource schema.
    pub fn schema() -> Schema {
        let mut schema = Schema::v0()
            .with_attribute(
                "id",
                Attribute::computed_string()
                    .with_description("Apstra graph node ID of the Connectivity Template root."),
            )
            .with_attribute(
                "blueprint_id",
                Attribute::required_string()
                    .with_force_new()
                    .with_description("Apstra Blueprint ID."),
            )
            .with_attribute(
                "name",
                Attribute::required_string()
                    .with_description("Name displayed in the Apstra web UI."),
            )
            .with_attribute(
                "description",
                Attribute::optional_string()
                    .with_description("Description displayed in the Apstra web UI."),
            )
            .with_attribute(
                "tags",
                Attribute::optional_string_set()
                    .with_description("Set of Tags to apply to the Connectivity Template."),
            );
        schema.block = schema.block.with_description(K::DESCRIPTION);
        K::with_blocks(schema)
    }

    /// Validators beyond the schema's type checks.
    pub fn validate(&self, diags: &mut Diagnostics) {
        length_at_least("blueprint_id", &self.blueprint_id, 1, diags);
        length_at_least("name", &self.name, 1, diags);
        size_at_least("tags", self.tags.as_known().map(Vec::len), 1, diags);
        self.primitives.validate(diags);
    }

    /// Fill computed values from prior state. `state` is `None` on create.
    pub fn plan(&mut self, state: Option<&Self>, diags: &mut Diagnostics) {
        self.id = use_state_for_unknown(AttrValue::Unknown, state.map(|s| &s.id));
        self.primitives.plan(state.map(|s| &s.primitives), diags);
    }

    /// Build the template tree for this state.
    pub fn request(&self, diags: &mut Diagnostics) -> Option<ConnectivityTemplate> {
        let subpolicies = self.primitives.subpolicies(diags);
        if diags.has_error() {
            return None;
        }

        let mut tags = self.tags.value_or_default();
        tags.sort();

        Some(ConnectivityTemplate {
            id: self.id.as_known().cloned(),
            label: self.name.value_or_default(),
            description: self.description.value_or_default(),
            tags,
            user_data: None,
            subpolicies,
        })
    }

    /// Replace state with what the API reports.
    pub fn load_api_data(&mut self, ct: &ConnectivityTemplate, diags: &mut Diagnostics) {
        let mut tags = ct.tags.clone();
        tags.sort();

        self.id = AttrValue::from_option(ct.id.clone());
        self.name = AttrValue::Known(ct.label.clone());
        self.description = string_value_or_null(ct.description.clone());
        self.tags = vec_value_or_null(tags);
        self.primitives = K::from_subpolicies(&ct.subpolicies, diags);
    }

    /// Copy ids assigned in `ct` into the primitive maps.
    pub fn load_ids(&mut self, ct: &ConnectivityTemplate, diags: &mut Diagnostics) {
        self.id = AttrValue::from_option(ct.id.clone());
        self.primitives.load_ids(&ct.subpolicies, diags);
    }

    fn blueprint(&self, diags: &mut Diagnostics) -> Option<String> {
        let bp = self.blueprint_id.as_known().cloned();
        if bp.is_none() {
            diags.add_error(PROVIDER_BUG, "blueprint_id is not known");
        }
        bp
    }

    /// Create the template. On success `self` becomes the new state.
    pub async fn create(
        &mut self,
        client: &ApstraClient,
        diags: &mut Diagnostics,
    ) -> Result<(), ProviderError> {
        let Some(bp) = self.blueprint(diags) else {
            return Ok(());
        };

        if !client.blueprint_exists(&bp).await? {
            diags.add_attribute_error(
                "blueprint_id",
                "Blueprint not found",
                format!("Blueprint {:?} not found", bp),
            );
            return Ok(());
        }

        self.id = AttrValue::Null;
        self.apply(client, &bp, diags).await?;
        if !diags.has_error() {
            info!(resource_type = K::TYPE_NAME, blueprint_id = %bp, id = ?self.id, "connectivity template created");
        }
        Ok(())
    }

    /// Update the template in place, keeping the root id.
    pub async fn update(
        &mut self,
        client: &ApstraClient,
        diags: &mut Diagnostics,
    ) -> Result<(), ProviderError> {
        let Some(bp) = self.blueprint(diags) else {
            return Ok(());
        };
        if !self.id.is_known() {
            diags.add_error(PROVIDER_BUG, "update called without a known id");
            return Ok(());
        }

        self.apply(client, &bp, diags).await?;
        if !diags.has_error() {
            info!(resource_type = K::TYPE_NAME, blueprint_id = %bp, id = ?self.id, "connectivity template updated");
        }
        Ok(())
    }

    async fn apply(
        &mut self,
        client: &ApstraClient,
        blueprint_id: &str,
        diags: &mut Diagnostics,
    ) -> Result<(), ProviderError> {
        let Some(mut ct) = self.request(diags) else {
            return Ok(());
        };
        ct.set_ids();
        ct.set_user_data()?;

        let policies = ct.to_policies()?;
        debug!(
            resource_type = K::TYPE_NAME,
            blueprint_id = %blueprint_id,
            policies = policies.len(),
            "importing connectivity template"
        );
        client.import_policies(blueprint_id, &policies).await?;

        self.load_ids(&ct, diags);
        Ok(())
    }

    /// Refresh state from the API.
    ///
    /// Returns `false` when the blueprint or the template no longer exists.
    pub async fn read(
        &mut self,
        client: &ApstraClient,
        diags: &mut Diagnostics,
    ) -> Result<bool, ProviderError> {
        let Some(bp) = self.blueprint(diags) else {
            return Ok(true);
        };
        let Some(id) = self.id.as_known().cloned() else {
            diags.add_error(PROVIDER_BUG, "read called without a known id");
            return Ok(true);
        };

        let policies = match client.export_policies(&bp, &id).await {
            Ok(p) => p,
            Err(err) if err.is_not_found() => {
                info!(resource_type = K::TYPE_NAME, blueprint_id = %bp, id = %id, "connectivity template gone");
                return Ok(false);
            },
            Err(err) => return Err(err),
        };

        let Some(ct) = ConnectivityTemplate::from_policies(&id, &policies, diags) else {
            return Ok(true);
        };
        self.load_api_data(&ct, diags);
        Ok(true)
    }

    /// Delete the template. A template that is already gone is not an error.
    pub async fn delete(&self, client: &ApstraClient, diags: &mut Diagnostics) -> Result<(), ProviderError> {
        let Some(bp) = self.blueprint(diags) else {
            return Ok(());
        };
        let Some(id) = self.id.as_known() else {
            return Ok(());
        };

        match client.delete_connectivity_template(&bp, id).await {
            Ok(()) => {
                info!(resource_type = K::TYPE_NAME, blueprint_id = %bp, id = %id, "connectivity template deleted");
                Ok(())
            },
            Err(err) if err.is_not_found() => Ok(()),
            Err(err) => Err(err),
        }
    }
}

/// Split an import id of the form `<blueprint_id>:<template_id>`.
pub fn parse_import_id(id: &str) -> Result<(String, String), ProviderError> {
    match id.split_once(':') {
        Some((bp, ct)) if !bp.is_empty() && !ct.is_empty() && !ct.contains(':') => {
            Ok((bp.to_string(), ct.to_string()))
        },
        _ => Err(ProviderError::InvalidRequest(format!(
            "import id {:?} must have the form <blueprint_id>:<connectivity_template_id>",
            id
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connectivity_template::InterfacePrimitives;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    type Interface = ConnectivityTemplateResource<InterfacePrimitives>;

    fn sample() -> Interface {
        serde_json::from_value(json!({
            "blueprint_id": "bp",
            "name": "ct",
            "tags": ["b", "a"],
            "ip_links": {
                "link": {
                    "routing_zone_id": "rz",
                    "ipv4_addressing_type": "numbered",
                    "ipv6_addressing_type": "none",
                    "static_routes": {
                        "r": {"network": "10.0.0.0/8", "share_ip_endpoint": false}
                    }
                }
            }
        }))
        .unwrap()
    }

    #[test]
    fn test_parse_import_id() {
        assert_eq!(
            parse_import_id("bp1:ct1").unwrap(),
            ("bp1".to_string(), "ct1".to_string())
        );
        for bad in ["bp1", ":ct1", "bp1:", "a:b:c"] {
            assert!(parse_import_id(bad).is_err(), "{}", bad);
        }
    }

    #[test]
    fn test_validate_common_fields() {
        let mut ct = sample();
        ct.name = AttrValue::Known(String::new());
        ct.tags = AttrValue::Known(Vec::new());
        let mut diags = Diagnostics::new();
        ct.validate(&mut diags);
        assert_eq!(diags.error_count(), 2);
    }

    #[test]
    fn test_request_and_load_ids() {
        let state = sample();
        let mut diags = Diagnostics::new();
        let mut tree = state.request(&mut diags).unwrap();
        assert_eq!(tree.label, "ct");
        assert_eq!(tree.tags, vec!["a".to_string(), "b".to_string()]);
        assert_eq!(tree.subpolicies.len(), 1);

        tree.set_ids();
        let mut applied = state.clone();
        applied.load_ids(&tree, &mut diags);
        assert!(applied.id.is_known());

        let link = &applied.primitives.ip_links.as_known().unwrap()["link"];
        assert_eq!(link.ids.id.as_known(), tree.subpolicies[0].id.as_ref());
        assert_eq!(link.batch_id.as_known(), tree.subpolicies[0].batch_id.as_ref());
        let route = &link.children.static_routes.as_known().unwrap()["r"];
        assert!(route.ids.pipeline_id.is_known());
    }

    #[test]
    fn test_load_api_data() {
        let state = sample();
        let mut diags = Diagnostics::new();
        let mut tree = state.request(&mut diags).unwrap();
        tree.set_ids();
        let policies = tree.to_policies().unwrap();
        let read_back =
            ConnectivityTemplate::from_policies(tree.id.as_deref().unwrap(), &policies, &mut diags)
                .unwrap();

        let mut loaded = Interface::default();
        loaded.blueprint_id = AttrValue::Known("bp".into());
        loaded.load_api_data(&read_back, &mut diags);
        assert!(diags.is_empty());
        assert!(loaded.description.is_null());
        assert_eq!(loaded.tags, AttrValue::Known(vec!["a".to_string(), "b".to_string()]));

        let mut expected = state.clone();
        expected.load_ids(&tree, &mut diags);
        expected.tags = loaded.tags.clone();
        assert_eq!(loaded, expected);
    }

    #[test]
    fn test_plan() {
        let mut diags = Diagnostics::new();

        let mut create = sample();
        create.plan(None, &mut diags);
        assert!(create.id.is_unknown());

        let mut state = sample();
        let mut tree = state.request(&mut diags).unwrap();
        tree.set_ids();
        state.load_ids(&tree, &mut diags);

        let mut update = sample();
        update.plan(Some(&state), &mut diags);
        assert_eq!(update.id, state.id);
        assert_eq!(update, state);
    }

    #[test]
    fn test_schema() {
        let schema = Interface::schema();
        assert!(schema.block.attributes["blueprint_id"].force_new);
        assert!(schema.block.blocks.contains_key("ip_links"));
        assert!(schema.block.blocks.contains_key("virtual_network_singles"));
    }
}
