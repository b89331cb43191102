//! The provider protocol surface.
//!
//! [`ProviderService`] is the trait a provider implements, in ergonomic Rust
//! types. [`ProviderServer`] sits in front of it and speaks the host's
//! message shapes: every request carries JSON-encoded bytes and every
//! response carries diagnostics instead of a transport error.
//!
//! The server also does the work every provider would otherwise repeat:
//!
//! 1. Checks configuration against the schema before the provider's own
//!    validators run
//! 2. Marks `force_new` attribute changes as requiring replacement
//! 3. Routes an apply to create, update or delete
//! 4. Turns [`ProviderError`]s into error diagnostics

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, error, info, instrument, warn};

use crate::error::ProviderError;
use crate::plan_modifier;
use crate::schema::{Diagnostic, DiagnosticSeverity, Diagnostics, ProviderSchema};
use crate::types::{
    ApplyResult, AttributeChange, ImportResult, ImportedResource, OpenResult, PlanResult,
    ProviderMetadata, ReadResult, RenewResult,
};
use crate::validation;

/// Trait that provider implementations must implement.
///
/// # Example
///
/// ```ignore
/// use apstra_provider::{ProviderService, ProviderError, PlanResult, ProviderSchema};
/// use apstra_provider::schema::Diagnostic;
///
/// struct MyProvider;
///
/// #[async_trait::async_trait]
/// impl ProviderService for MyProvider {
///     fn schema(&self) -> ProviderSchema {
///         ProviderSchema::new()
///     }
///
///     async fn configure(&self, config: serde_json::Value) -> Result<Vec<Diagnostic>, ProviderError> {
///         Ok(vec![])
///     }
///
///     // ... implement other methods
/// }
/// ```
#[async_trait::async_trait]
pub trait ProviderService: Send + Sync + 'static {
    // =========================================================================
    // Schema & Metadata
    // =========================================================================

    /// Return the provider's schema including all resources and ephemeral resources.
    fn schema(&self) -> ProviderSchema;

    /// Return provider metadata. By default, this is derived from the schema.
    fn metadata(&self) -> ProviderMetadata {
        let schema = self.schema();
        let mut resources: Vec<String> = schema.resources.keys().cloned().collect();
        let mut ephemeral_resources: Vec<String> =
            schema.ephemeral_resources.keys().cloned().collect();
        resources.sort();
        ephemeral_resources.sort();
        ProviderMetadata {
            resources,
            ephemeral_resources,
            capabilities: Default::default(),
        }
    }

    // =========================================================================
    // Provider Lifecycle
    // =========================================================================

    /// Validate the provider configuration before configuring.
    async fn validate_provider_config(
        &self,
        config: serde_json::Value,
    ) -> Result<Vec<Diagnostic>, ProviderError> {
        let _ = config;
        Ok(vec![])
    }

    /// Configure the provider with credentials and settings.
    async fn configure(&self, config: serde_json::Value) -> Result<Vec<Diagnostic>, ProviderError>;

    /// Stop the provider gracefully.
    async fn stop(&self) -> Result<(), ProviderError> {
        Ok(())
    }

    // =========================================================================
    // Resource Operations
    // =========================================================================

    /// Validate a resource's configuration before planning.
    async fn validate_resource_config(
        &self,
        resource_type: &str,
        config: serde_json::Value,
    ) -> Result<Vec<Diagnostic>, ProviderError> {
        let _ = (resource_type, config);
        Ok(vec![])
    }

    /// Plan changes for a resource. `prior_state` is `None` on create.
    async fn plan(
        &self,
        resource_type: &str,
        prior_state: Option<serde_json::Value>,
        proposed_state: serde_json::Value,
        config: serde_json::Value,
    ) -> Result<PlanResult, ProviderError>;

    /// Create a new resource.
    async fn create(
        &self,
        resource_type: &str,
        planned_state: serde_json::Value,
    ) -> Result<ApplyResult, ProviderError>;

    /// Read the current state of a resource.
    async fn read(
        &self,
        resource_type: &str,
        current_state: serde_json::Value,
    ) -> Result<ReadResult, ProviderError>;

    /// Update an existing resource.
    async fn update(
        &self,
        resource_type: &str,
        prior_state: serde_json::Value,
        planned_state: serde_json::Value,
    ) -> Result<ApplyResult, ProviderError>;

    /// Delete a resource.
    async fn delete(
        &self,
        resource_type: &str,
        current_state: serde_json::Value,
    ) -> Result<Vec<Diagnostic>, ProviderError>;

    /// Import existing infrastructure into management.
    async fn import_resource(
        &self,
        resource_type: &str,
        _id: &str,
    ) -> Result<ImportResult, ProviderError> {
        Err(ProviderError::Unimplemented(format!(
            "Import not supported for resource type: {}",
            resource_type
        )))
    }

    // =========================================================================
    // Ephemeral Resource Operations
    // =========================================================================

    /// Validate an ephemeral resource's configuration.
    async fn validate_ephemeral_resource_config(
        &self,
        type_name: &str,
        config: serde_json::Value,
    ) -> Result<Vec<Diagnostic>, ProviderError> {
        let _ = (type_name, config);
        Ok(vec![])
    }

    /// Open an ephemeral resource.
    async fn open_ephemeral(
        &self,
        type_name: &str,
        _config: serde_json::Value,
    ) -> Result<OpenResult, ProviderError> {
        Err(ProviderError::UnknownResource(format!(
            "Unknown ephemeral resource type: {}",
            type_name
        )))
    }

    /// Renew an ephemeral resource using the private state from open.
    async fn renew_ephemeral(
        &self,
        type_name: &str,
        _private: &[u8],
    ) -> Result<RenewResult, ProviderError> {
        Err(ProviderError::UnknownResource(format!(
            "Unknown ephemeral resource type: {}",
            type_name
        )))
    }

    /// Close an ephemeral resource.
    async fn close_ephemeral(
        &self,
        type_name: &str,
        private: &[u8],
    ) -> Result<Vec<Diagnostic>, ProviderError> {
        let _ = (type_name, private);
        Ok(vec![])
    }
}

// =========================================================================
// Messages
// =========================================================================

/// Diagnostics-only response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DiagnosticsResponse {
    /// Diagnostics raised by the operation.
    pub diagnostics: Vec<Diagnostic>,
}

/// Provider configuration request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProviderConfigRequest {
    /// JSON-encoded provider block.
    pub config: Vec<u8>,
}

/// Stop response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StopResponse {
    /// Error text, empty on success.
    pub error: String,
}

/// Resource or ephemeral resource configuration check.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidateConfigRequest {
    /// Resource type name.
    pub type_name: String,
    /// JSON-encoded configuration.
    pub config: Vec<u8>,
}

/// Plan request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlanRequest {
    /// Resource type name.
    pub type_name: String,
    /// JSON-encoded prior state. Empty or `null` on create.
    pub prior_state: Vec<u8>,
    /// JSON-encoded proposed state. Empty or `null` on destroy.
    pub proposed_new_state: Vec<u8>,
    /// JSON-encoded configuration.
    pub config: Vec<u8>,
}

/// Plan response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlanResponse {
    /// JSON-encoded planned state. Empty on destroy or error.
    pub planned_state: Vec<u8>,
    /// Attribute changes.
    pub changes: Vec<AttributeChange>,
    /// Attributes whose change forces replacement.
    pub requires_replace: Vec<String>,
    /// Diagnostics raised while planning.
    pub diagnostics: Vec<Diagnostic>,
}

/// Apply request. Empty prior state creates; empty planned state deletes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ApplyRequest {
    /// Resource type name.
    pub type_name: String,
    /// JSON-encoded prior state.
    pub prior_state: Vec<u8>,
    /// JSON-encoded planned state.
    pub planned_state: Vec<u8>,
}

/// Apply response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ApplyResponse {
    /// JSON-encoded new state. Empty after delete or a failed create; a failed
    /// update or delete carries the prior state.
    pub new_state: Vec<u8>,
    /// Diagnostics raised by the operation.
    pub diagnostics: Vec<Diagnostic>,
}

/// Read request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReadRequest {
    /// Resource type name.
    pub type_name: String,
    /// JSON-encoded current state.
    pub current_state: Vec<u8>,
}

/// Read response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReadResponse {
    /// JSON-encoded refreshed state. Empty when the object is gone; a failed
    /// read carries the current state.
    pub new_state: Vec<u8>,
    /// Diagnostics raised by the read.
    pub diagnostics: Vec<Diagnostic>,
}

/// Import request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImportRequest {
    /// Resource type name.
    pub type_name: String,
    /// Import id supplied by the user.
    pub id: String,
}

/// Import response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImportResponse {
    /// Imported resources.
    pub imported: Vec<ImportedResource>,
    /// Diagnostics raised by the import.
    pub diagnostics: Vec<Diagnostic>,
}

/// Ephemeral open request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OpenEphemeralRequest {
    /// Ephemeral resource type name.
    pub type_name: String,
    /// JSON-encoded configuration.
    pub config: Vec<u8>,
}

/// Ephemeral open response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OpenEphemeralResponse {
    /// JSON-encoded result object.
    pub result: Vec<u8>,
    /// Opaque private state.
    pub private: Vec<u8>,
    /// When to call renew.
    pub renew_at: Option<DateTime<Utc>>,
    /// Diagnostics raised by the open.
    pub diagnostics: Vec<Diagnostic>,
}

/// Ephemeral renew or close request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EphemeralPrivateRequest {
    /// Ephemeral resource type name.
    pub type_name: String,
    /// Private state from open or the last renew.
    pub private: Vec<u8>,
}

/// Ephemeral renew response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RenewEphemeralResponse {
    /// Updated private state.
    pub private: Vec<u8>,
    /// When to call renew next.
    pub renew_at: Option<DateTime<Utc>>,
    /// Diagnostics raised by the renewal.
    pub diagnostics: Vec<Diagnostic>,
}

// =========================================================================
// Server
// =========================================================================

/// In-process front end for a [`ProviderService`].
pub struct ProviderServer<P: ProviderService> {
    provider: P,
    schema: ProviderSchema,
}

fn has_errors(diagnostics: &[Diagnostic]) -> bool {
    diagnostics
        .iter()
        .any(|d| matches!(d.severity, DiagnosticSeverity::Error))
}

fn error_to_diagnostics(err: ProviderError) -> Vec<Diagnostic> {
    Diagnostics::from_error(err.summary(), &err).into_vec()
}

/// Decode a JSON payload. Empty input is `null`.
fn decode(bytes: &[u8]) -> Result<Value, ProviderError> {
    if bytes.is_empty() {
        return Ok(Value::Null);
    }
    Ok(serde_json::from_slice(bytes)?)
}

/// Decode a JSON payload where `null` means absent.
fn decode_optional(bytes: &[u8]) -> Result<Option<Value>, ProviderError> {
    Ok(Some(decode(bytes)?).filter(|v| !v.is_null()))
}

fn encode(value: &Value) -> Result<Vec<u8>, ProviderError> {
    Ok(serde_json::to_vec(value)?)
}

impl<P: ProviderService> ProviderServer<P> {
    /// Wrap `provider`. Its schema is read once here.
    pub fn new(provider: P) -> Self {
        let schema = provider.schema();
        Self { provider, schema }
    }

    /// The wrapped provider.
    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// Provider metadata.
    #[instrument(skip(self), name = "provider.get_metadata")]
    pub fn get_metadata(&self) -> ProviderMetadata {
        let metadata = self.provider.metadata();
        debug!(
            resources = metadata.resources.len(),
            ephemeral_resources = metadata.ephemeral_resources.len(),
            "GetMetadata completed"
        );
        metadata
    }

    /// Full provider schema.
    pub fn get_schema(&self) -> &ProviderSchema {
        &self.schema
    }

    /// Check the provider block against its schema, then the provider's validators.
    #[instrument(skip(self, request), name = "provider.validate_provider_config")]
    pub async fn validate_provider_config(
        &self,
        request: ProviderConfigRequest,
    ) -> DiagnosticsResponse {
        debug!("ValidateProviderConfig called");
        let result = async {
            let config = decode(&request.config)?;
            let mut diagnostics = validation::validate(&self.schema.provider, &config);
            if has_errors(&diagnostics) {
                return Ok(diagnostics);
            }
            diagnostics.extend(self.provider.validate_provider_config(config).await?);
            Ok::<_, ProviderError>(diagnostics)
        }
        .await;

        match result {
            Ok(diagnostics) => {
                if has_errors(&diagnostics) {
                    warn!(
                        diagnostics = diagnostics.len(),
                        "ValidateProviderConfig completed with errors"
                    );
                } else {
                    info!("ValidateProviderConfig completed successfully");
                }
                DiagnosticsResponse { diagnostics }
            },
            Err(e) => {
                error!(error = %e, "ValidateProviderConfig failed");
                DiagnosticsResponse {
                    diagnostics: error_to_diagnostics(e),
                }
            },
        }
    }

    /// Configure the provider.
    #[instrument(skip(self, request), name = "provider.configure")]
    pub async fn configure(&self, request: ProviderConfigRequest) -> DiagnosticsResponse {
        debug!("Configure called");
        let result = match decode(&request.config) {
            Ok(config) => self.provider.configure(config).await,
            Err(e) => Err(e),
        };

        match result {
            Ok(diagnostics) => {
                if has_errors(&diagnostics) {
                    warn!(diagnostics = diagnostics.len(), "Configure completed with errors");
                } else {
                    info!("Configure completed successfully");
                }
                DiagnosticsResponse { diagnostics }
            },
            Err(e) => {
                error!(error = %e, "Configure failed");
                DiagnosticsResponse {
                    diagnostics: error_to_diagnostics(e),
                }
            },
        }
    }

    /// Stop the provider.
    #[instrument(skip(self), name = "provider.stop")]
    pub async fn stop(&self) -> StopResponse {
        info!("Stop called");
        match self.provider.stop().await {
            Ok(()) => {
                info!("Stop completed successfully");
                StopResponse::default()
            },
            Err(e) => {
                error!(error = %e, "Stop failed");
                StopResponse {
                    error: e.to_string(),
                }
            },
        }
    }

    /// Check a resource configuration against its schema, then the
    /// provider's validators.
    #[instrument(skip(self, request), fields(resource_type = %request.type_name), name = "provider.validate_resource_config")]
    pub async fn validate_resource_config(
        &self,
        request: ValidateConfigRequest,
    ) -> DiagnosticsResponse {
        debug!("ValidateResourceConfig called");
        let result = async {
            let schema = self.schema.resources.get(&request.type_name).ok_or_else(|| {
                ProviderError::UnknownResource(request.type_name.clone())
            })?;
            let config = decode(&request.config)?;
            let mut diagnostics = validation::validate(schema, &config);
            if has_errors(&diagnostics) {
                return Ok(diagnostics);
            }
            diagnostics.extend(
                self.provider
                    .validate_resource_config(&request.type_name, config)
                    .await?,
            );
            Ok::<_, ProviderError>(diagnostics)
        }
        .await;

        match result {
            Ok(diagnostics) => {
                if has_errors(&diagnostics) {
                    warn!(diagnostics = diagnostics.len(), "ValidateResourceConfig completed with errors");
                } else {
                    info!("ValidateResourceConfig completed successfully");
                }
                DiagnosticsResponse { diagnostics }
            },
            Err(e) => {
                error!(error = %e, "ValidateResourceConfig failed");
                DiagnosticsResponse {
                    diagnostics: error_to_diagnostics(e),
                }
            },
        }
    }

    /// Plan a resource change. A null proposed state plans a destroy
    /// without consulting the provider.
    #[instrument(skip(self, request), fields(resource_type = %request.type_name), name = "provider.plan")]
    pub async fn plan(&self, request: PlanRequest) -> PlanResponse {
        let result = async {
            let prior_state = decode_optional(&request.prior_state)?;
            let Some(proposed) = decode_optional(&request.proposed_new_state)? else {
                debug!("Plan called for destroy");
                return Ok(PlanResponse::default());
            };
            debug!(is_create = prior_state.is_none(), "Plan called");
            let config = decode(&request.config)?;

            let mut result = self
                .provider
                .plan(&request.type_name, prior_state.clone(), proposed, config)
                .await?;

            if let (Some(prior), Some(schema)) =
                (&prior_state, self.schema.resources.get(&request.type_name))
            {
                for name in plan_modifier::requires_replace(schema, prior, &result.planned_state) {
                    if !result.requires_replace.contains(&name) {
                        result.requires_replace.push(name);
                    }
                }
            }

            let planned_state = if has_errors(&result.diagnostics) {
                Vec::new()
            } else {
                encode(&result.planned_state)?
            };
            Ok::<_, ProviderError>(PlanResponse {
                planned_state,
                changes: result.changes,
                requires_replace: result.requires_replace,
                diagnostics: result.diagnostics,
            })
        }
        .await;

        match result {
            Ok(response) => {
                info!(
                    changes = response.changes.len(),
                    requires_replace = ?response.requires_replace,
                    diagnostics = response.diagnostics.len(),
                    "Plan completed"
                );
                response
            },
            Err(e) => {
                error!(error = %e, "Plan failed");
                PlanResponse {
                    diagnostics: error_to_diagnostics(e),
                    ..Default::default()
                }
            },
        }
    }

    /// Apply a planned change: create, update or delete.
    #[instrument(skip(self, request), fields(resource_type = %request.type_name), name = "provider.apply")]
    pub async fn apply(&self, request: ApplyRequest) -> ApplyResponse {
        let result = async {
            let prior = decode_optional(&request.prior_state)?;
            let planned = decode_optional(&request.planned_state)?;
            let type_name = request.type_name.as_str();

            let applied = match (prior, planned) {
                (None, Some(planned)) => {
                    info!("Create called");
                    self.provider.create(type_name, planned).await?
                },
                (Some(prior), Some(planned)) => {
                    info!("Update called");
                    self.provider.update(type_name, prior, planned).await?
                },
                (Some(prior), None) => {
                    info!("Delete called");
                    let diagnostics = self.provider.delete(type_name, prior.clone()).await?;
                    if has_errors(&diagnostics) {
                        ApplyResult::new(prior, diagnostics)
                    } else {
                        ApplyResult::new(Value::Null, diagnostics)
                    }
                },
                (None, None) => {
                    return Err(ProviderError::InvalidRequest(
                        "apply needs a prior or a planned state".to_string(),
                    ))
                },
            };

            let new_state = if applied.new_state.is_null() {
                Vec::new()
            } else {
                encode(&applied.new_state)?
            };
            Ok::<_, ProviderError>(ApplyResponse {
                new_state,
                diagnostics: applied.diagnostics,
            })
        }
        .await;

        match result {
            Ok(response) => {
                if has_errors(&response.diagnostics) {
                    warn!(diagnostics = response.diagnostics.len(), "Apply completed with errors");
                } else {
                    info!("Apply completed successfully");
                }
                response
            },
            Err(e) => {
                error!(error = %e, "Apply failed");
                // The object is left as it was; a failed create has nothing to keep.
                ApplyResponse {
                    new_state: request.prior_state,
                    diagnostics: error_to_diagnostics(e),
                }
            },
        }
    }

    /// Refresh a resource.
    #[instrument(skip(self, request), fields(resource_type = %request.type_name), name = "provider.read")]
    pub async fn read(&self, request: ReadRequest) -> ReadResponse {
        debug!("Read called");
        let result = async {
            let current = decode(&request.current_state)?;
            let read = self.provider.read(&request.type_name, current).await?;
            let new_state = match &read.new_state {
                Some(state) => encode(state)?,
                None => Vec::new(),
            };
            Ok::<_, ProviderError>(ReadResponse {
                new_state,
                diagnostics: read.diagnostics,
            })
        }
        .await;

        match result {
            Ok(response) => {
                debug!(gone = response.new_state.is_empty(), "Read completed");
                response
            },
            Err(e) => {
                error!(error = %e, "Read failed");
                ReadResponse {
                    new_state: request.current_state,
                    diagnostics: error_to_diagnostics(e),
                }
            },
        }
    }

    /// Import an existing object.
    #[instrument(skip(self, request), fields(resource_type = %request.type_name, id = %request.id), name = "provider.import_resource_state")]
    pub async fn import_resource_state(&self, request: ImportRequest) -> ImportResponse {
        info!("ImportResourceState called");
        match self
            .provider
            .import_resource(&request.type_name, &request.id)
            .await
        {
            Ok(result) => {
                info!(
                    imported_count = result.imported.len(),
                    "ImportResourceState completed"
                );
                ImportResponse {
                    imported: result.imported,
                    diagnostics: result.diagnostics,
                }
            },
            Err(e) => {
                error!(error = %e, "ImportResourceState failed");
                ImportResponse {
                    imported: Vec::new(),
                    diagnostics: error_to_diagnostics(e),
                }
            },
        }
    }

    /// Check an ephemeral resource configuration against its schema, then
    /// the provider's validators.
    #[instrument(skip(self, request), fields(type_name = %request.type_name), name = "provider.validate_ephemeral_resource_config")]
    pub async fn validate_ephemeral_resource_config(
        &self,
        request: ValidateConfigRequest,
    ) -> DiagnosticsResponse {
        let result = async {
            let schema = self
                .schema
                .ephemeral_resources
                .get(&request.type_name)
                .ok_or_else(|| ProviderError::UnknownResource(request.type_name.clone()))?;
            let config = decode(&request.config)?;
            let mut diagnostics = validation::validate(schema, &config);
            if has_errors(&diagnostics) {
                return Ok(diagnostics);
            }
            diagnostics.extend(
                self.provider
                    .validate_ephemeral_resource_config(&request.type_name, config)
                    .await?,
            );
            Ok::<_, ProviderError>(diagnostics)
        }
        .await;

        match result {
            Ok(diagnostics) => DiagnosticsResponse { diagnostics },
            Err(e) => {
                error!(error = %e, "ValidateEphemeralResourceConfig failed");
                DiagnosticsResponse {
                    diagnostics: error_to_diagnostics(e),
                }
            },
        }
    }

    /// Open an ephemeral resource.
    #[instrument(skip(self, request), fields(type_name = %request.type_name), name = "provider.open_ephemeral_resource")]
    pub async fn open_ephemeral_resource(
        &self,
        request: OpenEphemeralRequest,
    ) -> OpenEphemeralResponse {
        debug!("OpenEphemeralResource called");
        let result = async {
            let config = decode(&request.config)?;
            let opened = self.provider.open_ephemeral(&request.type_name, config).await?;
            let result = if has_errors(&opened.diagnostics) {
                Vec::new()
            } else {
                encode(&opened.result)?
            };
            Ok::<_, ProviderError>(OpenEphemeralResponse {
                result,
                private: opened.private,
                renew_at: opened.renew_at,
                diagnostics: opened.diagnostics,
            })
        }
        .await;

        match result {
            Ok(response) => {
                info!(renew_at = ?response.renew_at, "OpenEphemeralResource completed");
                response
            },
            Err(e) => {
                error!(error = %e, "OpenEphemeralResource failed");
                OpenEphemeralResponse {
                    diagnostics: error_to_diagnostics(e),
                    ..Default::default()
                }
            },
        }
    }

    /// Renew an ephemeral resource.
    #[instrument(skip(self, request), fields(type_name = %request.type_name), name = "provider.renew_ephemeral_resource")]
    pub async fn renew_ephemeral_resource(
        &self,
        request: EphemeralPrivateRequest,
    ) -> RenewEphemeralResponse {
        match self
            .provider
            .renew_ephemeral(&request.type_name, &request.private)
            .await
        {
            Ok(renewed) => {
                debug!(renew_at = ?renewed.renew_at, "RenewEphemeralResource completed");
                RenewEphemeralResponse {
                    private: renewed.private,
                    renew_at: renewed.renew_at,
                    diagnostics: renewed.diagnostics,
                }
            },
            Err(e) => {
                error!(error = %e, "RenewEphemeralResource failed");
                RenewEphemeralResponse {
                    diagnostics: error_to_diagnostics(e),
                    ..Default::default()
                }
            },
        }
    }

    /// Close an ephemeral resource.
    #[instrument(skip(self, request), fields(type_name = %request.type_name), name = "provider.close_ephemeral_resource")]
    pub async fn close_ephemeral_resource(
        &self,
        request: EphemeralPrivateRequest,
    ) -> DiagnosticsResponse {
        match self
            .provider
            .close_ephemeral(&request.type_name, &request.private)
            .await
        {
            Ok(diagnostics) => {
                info!("CloseEphemeralResource completed");
                DiagnosticsResponse { diagnostics }
            },
            Err(e) => {
                error!(error = %e, "CloseEphemeralResource failed");
                DiagnosticsResponse {
                    diagnostics: error_to_diagnostics(e),
                }
            },
        }
    }
}
