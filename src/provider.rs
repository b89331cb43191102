//! The Apstra provider.
//!
//! [`ApstraProvider`] implements [`ProviderService`]: it owns the configured
//! API client and routes each resource operation to the matching
//! connectivity template flavor.

use std::sync::Arc;

use chrono::Utc;
use semver::Version;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::authentication::{ApiToken, EphemeralApiToken, API_TOKEN_TYPE};
use crate::client::ApstraClient;
use crate::compatibility::check_server_version;
use crate::config::{redact_url, Environment, ProviderBlock, ProviderConfig, SystemEnvironment};
use crate::connectivity_template::{
    parse_import_id, ConnectivityTemplateResource, CtKind, InterfacePrimitives,
    LoopbackPrimitives, ProtocolEndpointPrimitives, SviPrimitives, SystemPrimitives,
};
use crate::error::ProviderError;
use crate::logging::try_init_logging_with_file;
use crate::private_state::PrivateState;
use crate::schema::{Diagnostic, Diagnostics, ProviderSchema, PROVIDER_BUG};
use crate::server::ProviderService;
use crate::types::{
    diff_attributes, ApplyResult, ImportResult, ImportedResource, OpenResult, PlanResult,
    ReadResult, RenewResult,
};
use crate::value::AttrValue;

/// Routes `$call::<K>(args)` to the connectivity template flavor named by
/// `$resource_type`.
macro_rules! dispatch {
    ($self:ident, $resource_type:expr, $call:ident ( $($arg:expr),* )) => {{
        let resource_type: &str = $resource_type;
        if resource_type == InterfacePrimitives::TYPE_NAME {
            $self.$call::<InterfacePrimitives>($($arg),*).await
        } else if resource_type == SystemPrimitives::TYPE_NAME {
            $self.$call::<SystemPrimitives>($($arg),*).await
        } else if resource_type == LoopbackPrimitives::TYPE_NAME {
            $self.$call::<LoopbackPrimitives>($($arg),*).await
        } else if resource_type == SviPrimitives::TYPE_NAME {
            $self.$call::<SviPrimitives>($($arg),*).await
        } else if resource_type == ProtocolEndpointPrimitives::TYPE_NAME {
            $self.$call::<ProtocolEndpointPrimitives>($($arg),*).await
        } else {
            Err(ProviderError::UnknownResource(resource_type.to_string()))
        }
    }};
}

#[derive(Default)]
struct Configured {
    config: Option<ProviderConfig>,
    client: Option<Arc<ApstraClient>>,
    version: Option<Version>,
}

/// The Apstra provider.
pub struct ApstraProvider {
    env: Box<dyn Environment + Send + Sync>,
    state: RwLock<Configured>,
}

impl Default for ApstraProvider {
    fn default() -> Self {
        Self::new()
    }
}

/// Deserialize `value`, treating `null` as the type's default.
fn from_json<T: DeserializeOwned + Default>(value: Value) -> Result<T, ProviderError> {
    if value.is_null() {
        return Ok(T::default());
    }
    Ok(serde_json::from_value(value)?)
}

type Ct<K> = ConnectivityTemplateResource<K>;

impl ApstraProvider {
    /// A provider reading settings from the process environment.
    pub fn new() -> Self {
        Self::with_environment(SystemEnvironment)
    }

    /// A provider reading settings from `env`.
    pub fn with_environment(env: impl Environment + Send + Sync + 'static) -> Self {
        Self {
            env: Box::new(env),
            state: RwLock::new(Configured::default()),
        }
    }

    /// Apstra version reported at configure time.
    pub async fn server_version(&self) -> Option<Version> {
        self.state.read().await.version.clone()
    }

    /// The configured API client.
    pub async fn client(&self) -> Result<Arc<ApstraClient>, ProviderError> {
        self.state.read().await.client.clone().ok_or_else(|| {
            ProviderError::FailedPrecondition("provider has not been configured".to_string())
        })
    }

    async fn credentials(&self) -> Result<(String, secrecy::SecretString), ProviderError> {
        let state = self.state.read().await;
        let config = state.config.as_ref().ok_or_else(|| {
            ProviderError::FailedPrecondition("provider has not been configured".to_string())
        })?;
        Ok((config.username.clone(), config.password.clone()))
    }

    // ── Connectivity templates ───────────────────────────────────────

    async fn ct_validate<K: CtKind>(&self, config: Value) -> Result<Vec<Diagnostic>, ProviderError> {
        let ct: Ct<K> = from_json(config)?;
        let mut diags = Diagnostics::new();
        ct.validate(&mut diags);
        Ok(diags.into_vec())
    }

    async fn ct_plan<K: CtKind>(
        &self,
        prior_state: Option<Value>,
        proposed_state: Value,
    ) -> Result<PlanResult, ProviderError> {
        let prior: Option<Ct<K>> = prior_state.clone().map(from_json).transpose()?;
        let mut plan: Ct<K> = from_json(proposed_state)?;

        let mut diags = Diagnostics::new();
        plan.plan(prior.as_ref(), &mut diags);

        let planned_state = serde_json::to_value(&plan)?;
        let changes = diff_attributes(prior_state.as_ref(), &planned_state);
        Ok(PlanResult::with_changes(planned_state, changes, Vec::new())
            .with_diagnostics(diags.into_vec()))
    }

    async fn ct_create<K: CtKind>(&self, planned_state: Value) -> Result<ApplyResult, ProviderError> {
        let client = self.client().await?;
        let mut ct: Ct<K> = from_json(planned_state)?;
        let mut diags = Diagnostics::new();
        ct.create(&client, &mut diags).await?;

        let new_state = if diags.has_error() {
            Value::Null
        } else {
            serde_json::to_value(&ct)?
        };
        Ok(ApplyResult::new(new_state, diags.into_vec()))
    }

    async fn ct_read<K: CtKind>(&self, current_state: Value) -> Result<ReadResult, ProviderError> {
        let client = self.client().await?;
        let mut ct: Ct<K> = from_json(current_state.clone())?;
        let mut diags = Diagnostics::new();
        match ct.read(&client, &mut diags).await {
            Ok(true) => {},
            Ok(false) => return Ok(ReadResult::gone()),
            Err(err) => {
                warn!(resource_type = K::TYPE_NAME, error = %err, "connectivity template refresh failed");
                diags.append(Diagnostics::from_error(err.summary(), &err));
                return Ok(ReadResult::found(current_state, diags.into_vec()));
            },
        }
        if diags.has_error() {
            return Ok(ReadResult::found(current_state, diags.into_vec()));
        }
        Ok(ReadResult::found(serde_json::to_value(&ct)?, diags.into_vec()))
    }

    async fn ct_update<K: CtKind>(
        &self,
        prior_state: Value,
        planned_state: Value,
    ) -> Result<ApplyResult, ProviderError> {
        let client = self.client().await?;
        let prior: Ct<K> = from_json(prior_state.clone())?;
        let mut ct: Ct<K> = from_json(planned_state)?;
        if !ct.id.is_known() {
            ct.id = prior.id;
        }

        let mut diags = Diagnostics::new();
        if let Err(err) = ct.update(&client, &mut diags).await {
            warn!(resource_type = K::TYPE_NAME, error = %err, "connectivity template update failed");
            diags.append(Diagnostics::from_error(err.summary(), &err));
        }
        let new_state = if diags.has_error() {
            prior_state
        } else {
            serde_json::to_value(&ct)?
        };
        Ok(ApplyResult::new(new_state, diags.into_vec()))
    }

    async fn ct_delete<K: CtKind>(&self, current_state: Value) -> Result<Vec<Diagnostic>, ProviderError> {
        let client = self.client().await?;
        let ct: Ct<K> = from_json(current_state)?;
        let mut diags = Diagnostics::new();
        if let Err(err) = ct.delete(&client, &mut diags).await {
            warn!(resource_type = K::TYPE_NAME, error = %err, "connectivity template delete failed");
            diags.append(Diagnostics::from_error(err.summary(), &err));
        }
        Ok(diags.into_vec())
    }

    async fn ct_import<K: CtKind>(&self, id: &str) -> Result<ImportResult, ProviderError> {
        let (blueprint_id, ct_id) = parse_import_id(id)?;
        let client = self.client().await?;

        let mut ct = Ct::<K> {
            id: AttrValue::Known(ct_id.clone()),
            blueprint_id: AttrValue::Known(blueprint_id.clone()),
            ..Default::default()
        };
        let mut diags = Diagnostics::new();
        if !ct.read(&client, &mut diags).await? {
            return Err(ProviderError::NotFound(format!(
                "connectivity template {} not found in blueprint {}",
                ct_id, blueprint_id
            )));
        }

        let imported = if diags.has_error() {
            Vec::new()
        } else {
            vec![ImportedResource::new(K::TYPE_NAME, serde_json::to_value(&ct)?)]
        };
        Ok(ImportResult {
            imported,
            diagnostics: diags.into_vec(),
        })
    }
}

fn api_token_private(private: &[u8]) -> Result<Option<EphemeralApiToken>, ProviderError> {
    PrivateState::from_bytes(private)?.get_key::<EphemeralApiToken>()
}

fn require_api_token_type(type_name: &str) -> Result<(), ProviderError> {
    if type_name == API_TOKEN_TYPE {
        Ok(())
    } else {
        Err(ProviderError::UnknownResource(format!(
            "Unknown ephemeral resource type: {}",
            type_name
        )))
    }
}

#[async_trait::async_trait]
impl ProviderService for ApstraProvider {
    fn schema(&self) -> ProviderSchema {
        ProviderSchema::new()
            .with_provider_config(ProviderBlock::schema())
            .with_resource(InterfacePrimitives::TYPE_NAME, Ct::<InterfacePrimitives>::schema())
            .with_resource(SystemPrimitives::TYPE_NAME, Ct::<SystemPrimitives>::schema())
            .with_resource(LoopbackPrimitives::TYPE_NAME, Ct::<LoopbackPrimitives>::schema())
            .with_resource(SviPrimitives::TYPE_NAME, Ct::<SviPrimitives>::schema())
            .with_resource(
                ProtocolEndpointPrimitives::TYPE_NAME,
                Ct::<ProtocolEndpointPrimitives>::schema(),
            )
            .with_ephemeral_resource(API_TOKEN_TYPE, ApiToken::schema())
    }

    async fn validate_provider_config(&self, config: Value) -> Result<Vec<Diagnostic>, ProviderError> {
        let block: ProviderBlock = from_json(config)?;
        let mut diags = Diagnostics::new();
        if let Some(timeout) = block.api_timeout.as_known() {
            if *timeout < 0 {
                diags.add_attribute_error(
                    "api_timeout",
                    "Invalid API timeout",
                    format!("api_timeout must be zero or greater, got {}", timeout),
                );
            }
        }
        Ok(diags.into_vec())
    }

    async fn configure(&self, config: Value) -> Result<Vec<Diagnostic>, ProviderError> {
        let block: ProviderBlock = from_json(config)?;
        let mut diags = Diagnostics::new();

        let Some(config) = ProviderConfig::resolve(&block, self.env.as_ref(), &mut diags) else {
            return Ok(diags.into_vec());
        };
        let url = redact_url(config.url.as_str());

        if let Some(path) = &config.log_file {
            match try_init_logging_with_file("info", path) {
                Ok(true) => debug!(path = %path.display(), "logging to file"),
                Ok(false) => debug!("logging already initialized, APSTRA_LOG ignored"),
                Err(err) => diags.add_warning("Cannot open log file", err.to_string()),
            }
        }

        let client = match ApstraClient::new(&config) {
            Ok(c) => c,
            Err(err) => {
                diags.add_error("Failed to create Apstra client", err.to_string());
                return Ok(diags.into_vec());
            },
        };

        if let Err(err) = client.login(&config.username, &config.password).await {
            diags.add_error(
                "Failed to log in to Apstra",
                format!("login to {} failed: {}", url, err),
            );
            return Ok(diags.into_vec());
        }

        let raw_version = match client.api_version().await {
            Ok(v) => v,
            Err(err) => {
                diags.add_error("Failed to fetch Apstra version", err.to_string());
                return Ok(diags.into_vec());
            },
        };
        let version = check_server_version(&raw_version, config.experimental, &mut diags);
        if diags.has_error() {
            return Ok(diags.into_vec());
        }

        info!(url = %url, version = %raw_version, "provider configured");
        let mut state = self.state.write().await;
        state.client = Some(Arc::new(client));
        state.config = Some(config);
        state.version = version;
        Ok(diags.into_vec())
    }

    async fn stop(&self) -> Result<(), ProviderError> {
        let client = self.state.write().await.client.take();
        let Some(client) = client else {
            return Ok(());
        };
        if client.token().is_none() {
            return Ok(());
        }

        debug!("logging out provider session");
        match client.logout().await {
            Ok(()) => Ok(()),
            Err(err) if err.is_unauthorized() => Ok(()),
            Err(err) => {
                warn!(error = %err, "logout failed");
                Err(err)
            },
        }
    }

    async fn validate_resource_config(
        &self,
        resource_type: &str,
        config: Value,
    ) -> Result<Vec<Diagnostic>, ProviderError> {
        dispatch!(self, resource_type, ct_validate(config))
    }

    async fn plan(
        &self,
        resource_type: &str,
        prior_state: Option<Value>,
        proposed_state: Value,
        _config: Value,
    ) -> Result<PlanResult, ProviderError> {
        dispatch!(self, resource_type, ct_plan(prior_state, proposed_state))
    }

    async fn create(&self, resource_type: &str, planned_state: Value) -> Result<ApplyResult, ProviderError> {
        dispatch!(self, resource_type, ct_create(planned_state))
    }

    async fn read(&self, resource_type: &str, current_state: Value) -> Result<ReadResult, ProviderError> {
        dispatch!(self, resource_type, ct_read(current_state))
    }

    async fn update(
        &self,
        resource_type: &str,
        prior_state: Value,
        planned_state: Value,
    ) -> Result<ApplyResult, ProviderError> {
        dispatch!(self, resource_type, ct_update(prior_state, planned_state))
    }

    async fn delete(&self, resource_type: &str, current_state: Value) -> Result<Vec<Diagnostic>, ProviderError> {
        dispatch!(self, resource_type, ct_delete(current_state))
    }

    async fn import_resource(&self, resource_type: &str, id: &str) -> Result<ImportResult, ProviderError> {
        dispatch!(self, resource_type, ct_import(id))
    }

    async fn validate_ephemeral_resource_config(
        &self,
        type_name: &str,
        config: Value,
    ) -> Result<Vec<Diagnostic>, ProviderError> {
        require_api_token_type(type_name)?;
        let token: ApiToken = from_json(config)?;
        let mut diags = Diagnostics::new();
        token.validate(&mut diags);
        Ok(diags.into_vec())
    }

    async fn open_ephemeral(&self, type_name: &str, config: Value) -> Result<OpenResult, ProviderError> {
        require_api_token_type(type_name)?;
        let client = self.client().await?;
        let (username, password) = self.credentials().await?;

        let mut token: ApiToken = from_json(config)?;
        token.set_defaults();

        let mut diags = Diagnostics::new();
        token.validate(&mut diags);

        if !diags.has_error() {
            // A separate session, so closing it leaves the provider's own session alone.
            let session = client.new_session();
            match session.login(&username, &password).await {
                Ok(login) => token.load_api_data(&login.token, &mut diags),
                Err(err) => diags.add_error("Error creating API token", err.to_string()),
            }
        }

        if diags.has_error() {
            return Ok(OpenResult {
                result: Value::Null,
                private: Vec::new(),
                renew_at: None,
                diagnostics: diags.into_vec(),
            });
        }

        let ephemeral = token.private_state();
        ephemeral.check_lifetime(Utc::now(), &mut diags);

        let mut private = PrivateState::new();
        private.set_key(&ephemeral)?;

        info!(session_id = ?token.session_id, expires_at = %ephemeral.expires_at, "api token opened");
        Ok(OpenResult {
            result: serde_json::to_value(&token)?,
            private: private.to_bytes()?,
            renew_at: Some(ephemeral.renew_at()),
            diagnostics: diags.into_vec(),
        })
    }

    async fn renew_ephemeral(&self, type_name: &str, private: &[u8]) -> Result<RenewResult, ProviderError> {
        require_api_token_type(type_name)?;
        let mut diags = Diagnostics::new();

        let Some(token) = api_token_private(private)? else {
            diags.add_error(PROVIDER_BUG, "private state does not hold an API token");
            return Ok(RenewResult {
                private: private.to_vec(),
                renew_at: None,
                diagnostics: diags.into_vec(),
            });
        };

        let renew_at = token.renew(Utc::now(), &mut diags);
        Ok(RenewResult {
            private: private.to_vec(),
            renew_at,
            diagnostics: diags.into_vec(),
        })
    }

    async fn close_ephemeral(&self, type_name: &str, private: &[u8]) -> Result<Vec<Diagnostic>, ProviderError> {
        require_api_token_type(type_name)?;
        let Some(token) = api_token_private(private)? else {
            debug!("api token close: no private state");
            return Ok(Vec::new());
        };

        let client = self.client().await?;
        token.close(&client.new_session(), Utc::now()).await?;
        Ok(Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashMap;

    fn provider() -> ApstraProvider {
        ApstraProvider::with_environment(HashMap::<String, String>::new())
    }

    #[test]
    fn test_schema_lists_everything() {
        let metadata = provider().metadata();
        assert_eq!(metadata.resources.len(), 5);
        assert!(metadata
            .resources
            .contains(&"apstra_datacenter_connectivity_template_svi".to_string()));
        assert_eq!(metadata.ephemeral_resources, vec![API_TOKEN_TYPE.to_string()]);
    }

    #[tokio::test]
    async fn test_unknown_resource_type() {
        let p = provider();
        let err = p.read("apstra_nope", json!({})).await.unwrap_err();
        assert!(matches!(err, ProviderError::UnknownResource(_)));

        let err = p.open_ephemeral("apstra_nope", json!({})).await.unwrap_err();
        assert!(matches!(err, ProviderError::UnknownResource(_)));
    }

    #[tokio::test]
    async fn test_configure_without_url() {
        let diags = provider().configure(json!({})).await.unwrap();
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].summary, "Missing Apstra URL");
    }

    #[tokio::test]
    async fn test_operations_require_configure() {
        let err = provider()
            .create(
                InterfacePrimitives::TYPE_NAME,
                json!({"blueprint_id": "bp", "name": "x"}),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::FailedPrecondition(_)));
    }

    #[tokio::test]
    async fn test_plan_create_and_update() {
        let p = provider();
        let proposed = json!({
            "blueprint_id": "bp",
            "name": "rp",
            "routing_policies": {"a": {"routing_policy_id": "rp1"}}
        });

        let plan = p
            .plan(ProtocolEndpointPrimitives::TYPE_NAME, None, proposed.clone(), json!({}))
            .await
            .unwrap();
        assert!(plan.diagnostics.is_empty());
        assert!(crate::value::is_unknown_json(&plan.planned_state["id"]));

        let mut prior = proposed.clone();
        prior["id"] = json!("ct-1");
        prior["routing_policies"]["a"]["id"] = json!("p-1");
        prior["routing_policies"]["a"]["pipeline_id"] = json!("pl-1");

        let plan = p
            .plan(ProtocolEndpointPrimitives::TYPE_NAME, Some(prior.clone()), proposed, json!({}))
            .await
            .unwrap();
        assert_eq!(plan.planned_state["id"], "ct-1");
        assert_eq!(plan.planned_state["routing_policies"]["a"]["pipeline_id"], "pl-1");
        assert!(plan.changes.is_empty(), "{:?}", plan.changes);
    }

    #[tokio::test]
    async fn test_validate_resource_config() {
        let diags = provider()
            .validate_resource_config(
                SystemPrimitives::TYPE_NAME,
                json!({"blueprint_id": "bp", "name": "", "custom_static_routes": {}}),
            )
            .await
            .unwrap();
        assert_eq!(diags.len(), 2);
    }

    #[tokio::test]
    async fn test_renew_without_private_state() {
        let result = provider().renew_ephemeral(API_TOKEN_TYPE, &[]).await.unwrap();
        assert_eq!(result.diagnostics[0].summary, PROVIDER_BUG);
        assert!(provider().close_ephemeral(API_TOKEN_TYPE, &[]).await.unwrap().is_empty());
    }
}
