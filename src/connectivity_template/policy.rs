//! Connectivity template trees and their flattened wire form.
//!
//! Apstra stores a connectivity template as a flat list of policy nodes:
//!
//! ```text
//! batch (root, visible)
//!  └─ pipeline ── first_subpolicy ─> primitive (AttachLogicalLink, ...)
//!              └─ second_subpolicy ─> batch ─> pipeline ─> ...
//! ```
//!
//! [`ConnectivityTemplate`] is the nested view used by resources.
//! [`ConnectivityTemplate::to_policies`] and [`ConnectivityTemplate::from_policies`]
//! convert between the two.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::error::ProviderError;
use crate::schema::Diagnostics;

/// `policy_type_name` of batch nodes.
pub const POLICY_TYPE_BATCH: &str = "batch";
/// `policy_type_name` of pipeline nodes.
pub const POLICY_TYPE_PIPELINE: &str = "pipeline";

/// Summary used for nil subpolicies in API responses.
pub const NIL_SUBPOLICY: &str = "API response contains nil subpolicy";

/// One node of the flattened wire form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Policy {
    /// Node id.
    pub id: String,
    /// Label shown in the UI. Primitives use their map key.
    #[serde(default)]
    pub label: String,
    /// Free-form description.
    #[serde(default)]
    pub description: String,
    /// Tags. Only the root carries any.
    #[serde(default)]
    pub tags: Vec<String>,
    /// `batch`, `pipeline` or a primitive wire name.
    pub policy_type_name: String,
    /// Type-specific attributes.
    #[serde(default)]
    pub attributes: Value,
    /// UI layout, JSON encoded. Root only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_data: Option<String>,
    /// Only the root is visible.
    #[serde(default)]
    pub visible: bool,
}

macro_rules! wire_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $wire:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(
                #[allow(missing_docs)]
                #[serde(rename = $wire)]
                $variant,
            )+
        }

        impl $name {
            /// Every accepted string form.
            pub const VALUES: &'static [&'static str] = &[$($wire),+];

            /// The string form used in state and on the wire.
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $wire,)+
                }
            }
        }

        impl std::str::FromStr for $name {
            type Err = ProviderError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($wire => Ok(Self::$variant),)+
                    other => Err(ProviderError::Validation(format!(
                        "{:?} is not a valid {}, expected one of {:?}",
                        other,
                        stringify!($name),
                        Self::VALUES
                    ))),
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

wire_enum!(
    /// IPv4 addressing on an IP link.
    Ipv4AddressingType { None => "none", Numbered => "numbered" }
);
wire_enum!(
    /// IPv6 addressing on an IP link.
    Ipv6AddressingType { None => "none", LinkLocal => "link_local", Numbered => "numbered" }
);
wire_enum!(
    /// IPv4 BGP session addressing.
    SessionAddressingIpv4 { None => "none", Addressed => "addressed" }
);
wire_enum!(
    /// IPv6 BGP session addressing.
    SessionAddressingIpv6 { None => "none", Addressed => "addressed", LinkLocal => "link_local" }
);
wire_enum!(
    /// Far end of a BGP session to a generic system.
    PeerTo {
        Loopback => "loopback",
        InterfaceOrIpEndpoint => "interface_or_ip_endpoint",
        InterfaceOrSharedIpEndpoint => "interface_or_shared_ip_endpoint",
    }
);
wire_enum!(
    /// Local end of a BGP session to a generic system.
    PeerFrom { Loopback => "loopback", Interface => "interface" }
);
wire_enum!(
    /// Whether the neighbor ASN is fixed or learned.
    NeighborAsnType { Static => "static", Dynamic => "dynamic" }
);
wire_enum!(
    /// VLAN tagging of a single virtual network attachment.
    TagType { VlanTagged => "vlan_tagged", Untagged => "untagged" }
);

/// `AttachLogicalLink` attributes.
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttachLogicalLink {
    pub security_zone: Option<String>,
    #[serde(default)]
    pub tagged: bool,
    #[serde(default)]
    pub vlan_id: Option<u16>,
    pub ipv4_addressing_type: Ipv4AddressingType,
    pub ipv6_addressing_type: Ipv6AddressingType,
    #[serde(default)]
    pub l3_mtu: Option<u16>,
}

/// `AttachSingleVLAN` attributes.
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttachSingleVlan {
    pub vn_node_id: Option<String>,
    pub tag_type: TagType,
}

/// `AttachMultipleVLAN` attributes.
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttachMultipleVlan {
    #[serde(default)]
    pub untagged_vn_node_id: Option<String>,
    // the API rejects null here
    #[serde(default, deserialize_with = "null_as_empty")]
    pub tagged_vn_node_ids: Vec<String>,
}

/// `AttachStaticRoute` attributes.
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttachStaticRoute {
    pub network: Option<String>,
    #[serde(default)]
    pub share_ip_endpoint: bool,
}

/// `AttachCustomStaticRoute` attributes.
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttachCustomStaticRoute {
    pub network: Option<String>,
    pub next_hop: Option<String>,
    pub security_zone: Option<String>,
}

/// `AttachIpEndpointWithBgpNsxt` attributes.
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttachIpEndpointWithBgpNsxt {
    #[serde(default)]
    pub asn: Option<u32>,
    #[serde(default)]
    pub bfd: bool,
    #[serde(default)]
    pub holdtime_timer: Option<u16>,
    #[serde(default)]
    pub ipv4_addr: Option<String>,
    #[serde(default)]
    pub ipv6_addr: Option<String>,
    #[serde(default)]
    pub keepalive_timer: Option<u16>,
    #[serde(default)]
    pub local_asn: Option<u32>,
    pub neighbor_asn_type: NeighborAsnType,
    #[serde(default)]
    pub password: Option<String>,
    /// Zero means the device default.
    #[serde(default)]
    pub ttl: u8,
    #[serde(default)]
    pub ipv4_safi: bool,
    #[serde(default)]
    pub ipv6_safi: bool,
}

/// `AttachBgpOverSubinterfacesOrSvi` attributes.
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttachBgpOverSubinterfacesOrSvi {
    #[serde(default)]
    pub bfd: bool,
    #[serde(default)]
    pub holdtime_timer: Option<u16>,
    #[serde(default)]
    pub ipv4_safi: bool,
    #[serde(default)]
    pub ipv6_safi: bool,
    #[serde(default)]
    pub keepalive_timer: Option<u16>,
    #[serde(default)]
    pub local_asn: Option<u32>,
    pub neighbor_asn_type: NeighborAsnType,
    #[serde(default)]
    pub password: Option<String>,
    pub peer_from: PeerFrom,
    pub peer_to: PeerTo,
    pub session_addressing_ipv4: SessionAddressingIpv4,
    pub session_addressing_ipv6: SessionAddressingIpv6,
    /// Zero means the device default.
    #[serde(default)]
    pub ttl: u8,
}

/// `AttachBgpWithPrefixPeeringForSviOrSubinterface` attributes.
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttachBgpWithPrefixPeeringForSviOrSubinterface {
    #[serde(default)]
    pub bfd: bool,
    #[serde(default)]
    pub holdtime_timer: Option<u16>,
    #[serde(default)]
    pub ipv4_safi: bool,
    #[serde(default)]
    pub ipv6_safi: bool,
    #[serde(default)]
    pub keepalive_timer: Option<u16>,
    #[serde(default)]
    pub local_asn: Option<u32>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub prefix_neighbor_ipv4: Option<String>,
    #[serde(default)]
    pub prefix_neighbor_ipv6: Option<String>,
    /// Zero means the device default.
    #[serde(default)]
    pub ttl: u8,
}

/// `AttachExistingRoutingPolicy` attributes.
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttachExistingRoutingPolicy {
    pub rp_to_attach: Option<String>,
}

/// `AttachRoutingZoneConstraint` attributes.
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttachRoutingZoneConstraint {
    pub routing_zone_constraint: Option<String>,
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Option::<Vec<String>>::deserialize(deserializer)?.unwrap_or_default())
}

/// Typed attributes of a primitive node.
#[derive(Debug, Clone, PartialEq)]
pub enum PrimitiveAttributes {
    /// IP link on a tagged or untagged interface.
    LogicalLink(AttachLogicalLink),
    /// One virtual network.
    SingleVlan(AttachSingleVlan),
    /// Several virtual networks, tagged and untagged.
    MultipleVlan(AttachMultipleVlan),
    /// Static route toward the shared or local IP endpoint.
    StaticRoute(AttachStaticRoute),
    /// Static route with an explicit next hop.
    CustomStaticRoute(AttachCustomStaticRoute),
    /// BGP session to a fixed neighbor address.
    IpEndpointWithBgpNsxt(AttachIpEndpointWithBgpNsxt),
    /// BGP session to a generic system over its link.
    BgpOverSubinterfacesOrSvi(AttachBgpOverSubinterfacesOrSvi),
    /// Dynamic BGP accepting peers from a prefix.
    BgpWithPrefixPeering(AttachBgpWithPrefixPeeringForSviOrSubinterface),
    /// Reference to an existing routing policy.
    ExistingRoutingPolicy(AttachExistingRoutingPolicy),
    /// Reference to a routing zone constraint.
    RoutingZoneConstraint(AttachRoutingZoneConstraint),
}

impl PrimitiveAttributes {
    /// The `policy_type_name` of this primitive.
    pub fn policy_type_name(&self) -> &'static str {
        match self {
            Self::LogicalLink(_) => "AttachLogicalLink",
            Self::SingleVlan(_) => "AttachSingleVLAN",
            Self::MultipleVlan(_) => "AttachMultipleVLAN",
            Self::StaticRoute(_) => "AttachStaticRoute",
            Self::CustomStaticRoute(_) => "AttachCustomStaticRoute",
            Self::IpEndpointWithBgpNsxt(_) => "AttachIpEndpointWithBgpNsxt",
            Self::BgpOverSubinterfacesOrSvi(_) => "AttachBgpOverSubinterfacesOrSvi",
            Self::BgpWithPrefixPeering(_) => "AttachBgpWithPrefixPeeringForSviOrSubinterface",
            Self::ExistingRoutingPolicy(_) => "AttachExistingRoutingPolicy",
            Self::RoutingZoneConstraint(_) => "AttachRoutingZoneConstraint",
        }
    }

    /// Wire JSON for the `attributes` field.
    pub fn to_value(&self) -> Result<Value, ProviderError> {
        let v = match self {
            Self::LogicalLink(a) => serde_json::to_value(a)?,
            Self::SingleVlan(a) => serde_json::to_value(a)?,
            Self::MultipleVlan(a) => serde_json::to_value(a)?,
            Self::StaticRoute(a) => serde_json::to_value(a)?,
            Self::CustomStaticRoute(a) => serde_json::to_value(a)?,
            Self::IpEndpointWithBgpNsxt(a) => serde_json::to_value(a)?,
            Self::BgpOverSubinterfacesOrSvi(a) => serde_json::to_value(a)?,
            Self::BgpWithPrefixPeering(a) => serde_json::to_value(a)?,
            Self::ExistingRoutingPolicy(a) => serde_json::to_value(a)?,
            Self::RoutingZoneConstraint(a) => serde_json::to_value(a)?,
        };
        Ok(v)
    }

    /// Decode wire attributes for the given `policy_type_name`.
    pub fn from_wire(policy_type_name: &str, attributes: Value) -> Result<Self, ProviderError> {
        let parsed = match policy_type_name {
            "AttachLogicalLink" => Self::LogicalLink(serde_json::from_value(attributes)?),
            "AttachSingleVLAN" => Self::SingleVlan(serde_json::from_value(attributes)?),
            "AttachMultipleVLAN" => Self::MultipleVlan(serde_json::from_value(attributes)?),
            "AttachStaticRoute" => Self::StaticRoute(serde_json::from_value(attributes)?),
            "AttachCustomStaticRoute" => {
                Self::CustomStaticRoute(serde_json::from_value(attributes)?)
            },
            "AttachIpEndpointWithBgpNsxt" => {
                Self::IpEndpointWithBgpNsxt(serde_json::from_value(attributes)?)
            },
            "AttachBgpOverSubinterfacesOrSvi" => {
                Self::BgpOverSubinterfacesOrSvi(serde_json::from_value(attributes)?)
            },
            "AttachBgpWithPrefixPeeringForSviOrSubinterface" => {
                Self::BgpWithPrefixPeering(serde_json::from_value(attributes)?)
            },
            "AttachExistingRoutingPolicy" => {
                Self::ExistingRoutingPolicy(serde_json::from_value(attributes)?)
            },
            "AttachRoutingZoneConstraint" => {
                Self::RoutingZoneConstraint(serde_json::from_value(attributes)?)
            },
            other => {
                return Err(ProviderError::Unimplemented(format!(
                    "unsupported connectivity template primitive type {:?}",
                    other
                )))
            },
        };
        Ok(parsed)
    }
}

/// A primitive and the IDs of the nodes that attach it to its parent.
#[derive(Debug, Clone, PartialEq)]
pub struct Primitive {
    /// Primitive node id.
    pub id: Option<String>,
    /// Map key of the primitive in resource state.
    pub label: String,
    /// Upstream pipeline node id.
    pub pipeline_id: Option<String>,
    /// Downstream batch node id, present only with children.
    pub batch_id: Option<String>,
    /// Type and settings.
    pub attributes: PrimitiveAttributes,
    /// Children, in declaration order.
    pub subpolicies: Vec<Primitive>,
}

impl Primitive {
    /// A primitive with no ids and no children.
    pub fn new(attributes: PrimitiveAttributes) -> Self {
        Self {
            id: None,
            label: String::new(),
            pipeline_id: None,
            batch_id: None,
            attributes,
            subpolicies: Vec::new(),
        }
    }

    fn set_ids(&mut self) {
        self.id.get_or_insert_with(new_id);
        self.pipeline_id.get_or_insert_with(new_id);
        if self.subpolicies.is_empty() {
            self.batch_id = None;
        } else {
            self.batch_id.get_or_insert_with(new_id);
        }
        for child in &mut self.subpolicies {
            child.set_ids();
        }
    }

    fn push_policies(&self, out: &mut Vec<Policy>) -> Result<(), ProviderError> {
        let id = require_id(&self.id, "primitive", &self.label)?;
        let pipeline_id = require_id(&self.pipeline_id, "pipeline", &self.label)?;
        let batch_id = if self.subpolicies.is_empty() {
            None
        } else {
            Some(require_id(&self.batch_id, "batch", &self.label)?)
        };

        out.push(Policy {
            id: pipeline_id.to_string(),
            label: format!("{} (pipeline)", self.label),
            description: String::new(),
            tags: Vec::new(),
            policy_type_name: POLICY_TYPE_PIPELINE.to_string(),
            attributes: json!({
                "first_subpolicy": id,
                "second_subpolicy": batch_id,
            }),
            user_data: None,
            visible: false,
        });

        out.push(Policy {
            id: id.to_string(),
            label: self.label.clone(),
            description: String::new(),
            tags: Vec::new(),
            policy_type_name: self.attributes.policy_type_name().to_string(),
            attributes: self.attributes.to_value()?,
            user_data: None,
            visible: false,
        });

        if let Some(batch_id) = batch_id {
            out.push(Policy {
                id: batch_id.to_string(),
                label: format!("{} (batch)", self.label),
                description: String::new(),
                tags: Vec::new(),
                policy_type_name: POLICY_TYPE_BATCH.to_string(),
                attributes: json!({ "subpolicies": pipeline_ids(&self.subpolicies) }),
                user_data: None,
                visible: false,
            });
            for child in &self.subpolicies {
                child.push_policies(out)?;
            }
        }

        Ok(())
    }

    fn collect_positions(&self, depth: usize, row: &mut usize, positions: &mut serde_json::Map<String, Value>) {
        if let Some(id) = &self.id {
            positions.insert(
                id.clone(),
                json!([290 + depth * 300, 80 + *row * 120, 1]),
            );
            *row += 1;
        }
        for child in &self.subpolicies {
            child.collect_positions(depth + 1, row, positions);
        }
    }
}

/// A connectivity template as a tree of primitives.
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectivityTemplate {
    /// Root batch id.
    pub id: Option<String>,
    /// Template name.
    pub label: String,
    /// Template description.
    pub description: String,
    /// Tags, sorted.
    pub tags: Vec<String>,
    /// Layout hints for the web UI (a JSON string).
    pub user_data: Option<String>,
    /// Top-level primitives.
    pub subpolicies: Vec<Primitive>,
}

impl ConnectivityTemplate {
    /// An empty template with the given label.
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            id: None,
            label: label.into(),
            description: String::new(),
            tags: Vec::new(),
            user_data: None,
            subpolicies: Vec::new(),
        }
    }

    /// Assign random ids to the root and every primitive node that lacks one.
    pub fn set_ids(&mut self) {
        self.id.get_or_insert_with(new_id);
        for p in &mut self.subpolicies {
            p.set_ids();
        }
    }

    /// Generate web UI layout hints. Requires [`ConnectivityTemplate::set_ids`].
    pub fn set_user_data(&mut self) -> Result<(), ProviderError> {
        let mut positions = serde_json::Map::new();
        let mut row = 0;
        for p in &self.subpolicies {
            p.collect_positions(0, &mut row, &mut positions);
        }
        let user_data = json!({
            "isSausage": true,
            "positions": positions,
        });
        self.user_data = Some(serde_json::to_string(&user_data)?);
        Ok(())
    }

    /// Flatten into wire policies, root first. Every id must be set.
    pub fn to_policies(&self) -> Result<Vec<Policy>, ProviderError> {
        let root_id = require_id(&self.id, "connectivity template", &self.label)?;

        let mut out = vec![Policy {
            id: root_id.to_string(),
            label: self.label.clone(),
            description: self.description.clone(),
            tags: self.tags.clone(),
            policy_type_name: POLICY_TYPE_BATCH.to_string(),
            attributes: json!({ "subpolicies": pipeline_ids(&self.subpolicies) }),
            user_data: self.user_data.clone(),
            visible: true,
        }];

        for p in &self.subpolicies {
            p.push_policies(&mut out)?;
        }
        Ok(out)
    }

    /// Rebuild a template from exported wire policies.
    ///
    /// Problems are reported in `diags`; `None` is returned if any were found.
    pub fn from_policies(
        root_id: &str,
        policies: &[Policy],
        diags: &mut Diagnostics,
    ) -> Option<Self> {
        let index: HashMap<&str, &Policy> = policies.iter().map(|p| (p.id.as_str(), p)).collect();

        let Some(root) = index.get(root_id).copied() else {
            diags.add_error(
                "Failed to parse connectivity template",
                format!("root policy {:?} not found in API response", root_id),
            );
            return None;
        };

        if root.policy_type_name != POLICY_TYPE_BATCH {
            diags.add_error(
                "Failed to parse connectivity template",
                format!(
                    "root policy {:?} has type {:?}, expected {:?}",
                    root_id, root.policy_type_name, POLICY_TYPE_BATCH
                ),
            );
            return None;
        }

        let mut visited = HashSet::from([root.id.as_str()]);
        let subpolicies = primitives_from_batch(&index, root, &mut visited, diags);
        if diags.has_error() {
            return None;
        }

        Some(Self {
            id: Some(root.id.clone()),
            label: root.label.clone(),
            description: root.description.clone(),
            tags: root.tags.clone(),
            user_data: root.user_data.clone(),
            subpolicies,
        })
    }
}

fn new_id() -> String {
    Uuid::new_v4().to_string()
}

fn require_id<'a>(id: &'a Option<String>, kind: &str, label: &str) -> Result<&'a str, ProviderError> {
    id.as_deref().ok_or_else(|| {
        ProviderError::Sdk(format!("{} id not set for {:?}", kind, label))
    })
}

fn pipeline_ids(primitives: &[Primitive]) -> Vec<Option<&str>> {
    primitives.iter().map(|p| p.pipeline_id.as_deref()).collect()
}

/// Record `id` as part of the tree. A policy reached twice is a cycle or a
/// shared subtree, neither of which a template can hold.
fn visit<'a>(visited: &mut HashSet<&'a str>, id: &'a str, diags: &mut Diagnostics) -> bool {
    if visited.insert(id) {
        return true;
    }
    diags.add_error(
        "Failed to parse connectivity template",
        format!("policy {:?} is referenced more than once", id),
    );
    false
}

fn primitives_from_batch<'a>(
    index: &HashMap<&'a str, &'a Policy>,
    batch: &'a Policy,
    visited: &mut HashSet<&'a str>,
    diags: &mut Diagnostics,
) -> Vec<Primitive> {
    let entries = match batch.attributes.get("subpolicies") {
        None | Some(Value::Null) => return Vec::new(),
        Some(Value::Array(entries)) => entries,
        Some(other) => {
            diags.add_error(
                "Failed to parse connectivity template",
                format!("batch {:?} has non-list subpolicies: {}", batch.id, other),
            );
            return Vec::new();
        },
    };

    let mut result = Vec::with_capacity(entries.len());
    for (i, entry) in entries.iter().enumerate() {
        let Some(pipeline_id) = entry.as_str() else {
            diags.add_error(
                NIL_SUBPOLICY,
                format!("batch {:?} subpolicy at index {} is {}", batch.id, i, entry),
            );
            continue;
        };
        if let Some(p) = primitive_from_pipeline(index, pipeline_id, visited, diags) {
            result.push(p);
        }
    }
    result
}

fn primitive_from_pipeline<'a>(
    index: &HashMap<&'a str, &'a Policy>,
    pipeline_id: &str,
    visited: &mut HashSet<&'a str>,
    diags: &mut Diagnostics,
) -> Option<Primitive> {
    let pipeline = lookup(index, pipeline_id, POLICY_TYPE_PIPELINE, diags)?;
    if !visit(visited, &pipeline.id, diags) {
        return None;
    }

    let Some(first) = pipeline.attributes.get("first_subpolicy").and_then(Value::as_str) else {
        diags.add_error(
            NIL_SUBPOLICY,
            format!("pipeline {:?} has no first_subpolicy", pipeline_id),
        );
        return None;
    };

    let node = index.get(first).copied().or_else(|| {
        diags.add_error(
            "Failed to parse connectivity template",
            format!("primitive {:?} not found in API response", first),
        );
        None
    })?;
    if !visit(visited, &node.id, diags) {
        return None;
    }

    let attributes = match PrimitiveAttributes::from_wire(&node.policy_type_name, node.attributes.clone()) {
        Ok(a) => a,
        Err(err) => {
            diags.add_error(
                "Failed to parse connectivity template primitive",
                format!("policy {:?}: {}", node.id, err),
            );
            return None;
        },
    };

    let (batch_id, subpolicies) = match pipeline.attributes.get("second_subpolicy").and_then(Value::as_str) {
        Some(batch_id) => {
            let batch = lookup(index, batch_id, POLICY_TYPE_BATCH, diags)?;
            if !visit(visited, &batch.id, diags) {
                return None;
            }
            (Some(batch_id.to_string()), primitives_from_batch(index, batch, visited, diags))
        },
        None => (None, Vec::new()),
    };

    Some(Primitive {
        id: Some(node.id.clone()),
        label: node.label.clone(),
        pipeline_id: Some(pipeline_id.to_string()),
        batch_id,
        attributes,
        subpolicies,
    })
}

fn lookup<'a>(
    index: &HashMap<&str, &'a Policy>,
    id: &str,
    expected_type: &str,
    diags: &mut Diagnostics,
) -> Option<&'a Policy> {
    match index.get(id) {
        Some(p) if p.policy_type_name == expected_type => Some(p),
        Some(p) => {
            diags.add_error(
                "Failed to parse connectivity template",
                format!(
                    "policy {:?} has type {:?}, expected {:?}",
                    id, p.policy_type_name, expected_type
                ),
            );
            None
        },
        None => {
            diags.add_error(
                "Failed to parse connectivity template",
                format!("{} policy {:?} not found in API response", expected_type, id),
            );
            None
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn ip_link() -> PrimitiveAttributes {
        PrimitiveAttributes::LogicalLink(AttachLogicalLink {
            security_zone: Some("rz1".into()),
            tagged: true,
            vlan_id: Some(100),
            ipv4_addressing_type: Ipv4AddressingType::Numbered,
            ipv6_addressing_type: Ipv6AddressingType::None,
            l3_mtu: None,
        })
    }

    fn static_route(network: &str) -> PrimitiveAttributes {
        PrimitiveAttributes::StaticRoute(AttachStaticRoute {
            network: Some(network.into()),
            share_ip_endpoint: false,
        })
    }

    fn sample() -> ConnectivityTemplate {
        let mut link = Primitive::new(ip_link());
        link.label = "link".into();
        let mut route = Primitive::new(static_route("10.0.0.0/8"));
        route.label = "route".into();
        link.subpolicies.push(route);

        let mut ct = ConnectivityTemplate::new("ct");
        ct.description = "desc".into();
        ct.tags = vec!["a".into()];
        ct.subpolicies.push(link);
        ct
    }

    #[test]
    fn test_set_ids() {
        let mut ct = sample();
        ct.subpolicies[0].subpolicies[0].batch_id = Some("stale".into());
        ct.subpolicies[0].id = Some("keep-me".into());
        ct.set_ids();

        assert!(ct.id.is_some());
        let link = &ct.subpolicies[0];
        assert_eq!(link.id.as_deref(), Some("keep-me"));
        assert!(link.pipeline_id.is_some());
        assert!(link.batch_id.is_some());

        // childless primitives never carry a batch
        let route = &link.subpolicies[0];
        assert!(route.batch_id.is_none());
        assert!(route.id.is_some());
    }

    #[test]
    fn test_to_policies_shape() {
        let mut ct = sample();
        ct.set_ids();
        let policies = ct.to_policies().unwrap();

        // root, link pipeline + primitive + batch, route pipeline + primitive
        assert_eq!(policies.len(), 6);

        let root = &policies[0];
        assert_eq!(root.policy_type_name, POLICY_TYPE_BATCH);
        assert!(root.visible);
        let link = &ct.subpolicies[0];
        assert_eq!(root.attributes, json!({"subpolicies": [link.pipeline_id]}));

        let pipeline = &policies[1];
        assert_eq!(pipeline.policy_type_name, POLICY_TYPE_PIPELINE);
        assert_eq!(
            pipeline.attributes,
            json!({"first_subpolicy": link.id, "second_subpolicy": link.batch_id})
        );
        assert_eq!(policies[2].policy_type_name, "AttachLogicalLink");
        assert_eq!(policies[2].attributes["vlan_id"], 100);
        assert_eq!(policies[3].id, link.batch_id.clone().unwrap());

        let route_pipeline = &policies[4];
        assert_eq!(route_pipeline.attributes["second_subpolicy"], Value::Null);
    }

    #[test]
    fn test_to_policies_requires_ids() {
        assert!(sample().to_policies().is_err());
    }

    #[test]
    fn test_from_policies_rebuilds_tree() {
        let mut ct = sample();
        ct.set_ids();
        ct.set_user_data().unwrap();
        let policies = ct.to_policies().unwrap();

        let mut diags = Diagnostics::new();
        let rebuilt =
            ConnectivityTemplate::from_policies(ct.id.as_deref().unwrap(), &policies, &mut diags)
                .unwrap();
        assert!(diags.is_empty());
        assert_eq!(rebuilt, ct);
    }

    #[test]
    fn test_from_policies_missing_root() {
        let mut diags = Diagnostics::new();
        assert!(ConnectivityTemplate::from_policies("nope", &[], &mut diags).is_none());
        assert!(diags.has_error());
    }

    #[test]
    fn test_from_policies_nil_subpolicy() {
        let policies = vec![Policy {
            id: "root".into(),
            label: "ct".into(),
            description: String::new(),
            tags: vec![],
            policy_type_name: POLICY_TYPE_BATCH.into(),
            attributes: json!({"subpolicies": [null]}),
            user_data: None,
            visible: true,
        }];
        let mut diags = Diagnostics::new();
        assert!(ConnectivityTemplate::from_policies("root", &policies, &mut diags).is_none());
        assert_eq!(diags[0].summary, NIL_SUBPOLICY);
    }

    #[test]
    fn test_from_policies_unknown_type() {
        let mut ct = sample();
        ct.set_ids();
        let mut policies = ct.to_policies().unwrap();
        policies[2].policy_type_name = "AttachSomethingNew".into();

        let mut diags = Diagnostics::new();
        assert!(
            ConnectivityTemplate::from_policies(ct.id.as_deref().unwrap(), &policies, &mut diags)
                .is_none()
        );
        assert_eq!(diags[0].summary, "Failed to parse connectivity template primitive");
    }

    #[test]
    fn test_from_policies_cycle() {
        let mut ct = sample();
        ct.set_ids();
        let mut policies = ct.to_policies().unwrap();
        let root_id = ct.id.clone().unwrap();
        // link pipeline points its children back at the root batch
        policies[1].attributes["second_subpolicy"] = json!(root_id);

        let mut diags = Diagnostics::new();
        assert!(ConnectivityTemplate::from_policies(&root_id, &policies, &mut diags).is_none());
        assert_eq!(diags.error_count(), 1);
        assert!(diags[0]
            .detail
            .as_deref()
            .is_some_and(|d| d.contains("referenced more than once")));
    }

    #[test]
    fn test_from_policies_dangling_subpolicy() {
        let mut ct = sample();
        ct.set_ids();
        let mut policies = ct.to_policies().unwrap();
        policies[1].attributes["second_subpolicy"] = json!("missing-batch");

        let mut diags = Diagnostics::new();
        assert!(
            ConnectivityTemplate::from_policies(ct.id.as_deref().unwrap(), &policies, &mut diags)
                .is_none()
        );
        assert_eq!(diags[0].summary, "Failed to parse connectivity template");
        assert!(diags[0]
            .detail
            .as_deref()
            .is_some_and(|d| d.contains("missing-batch")));
    }

    #[test]
    fn test_user_data_positions() {
        let mut ct = sample();
        ct.set_ids();
        ct.set_user_data().unwrap();
        let ud: Value = serde_json::from_str(ct.user_data.as_deref().unwrap()).unwrap();
        assert_eq!(ud["isSausage"], true);
        assert_eq!(ud["positions"].as_object().unwrap().len(), 2);
    }

    #[test]
    fn test_multiple_vlan_null_tagged_ids() {
        let attrs = PrimitiveAttributes::from_wire(
            "AttachMultipleVLAN",
            json!({"untagged_vn_node_id": null, "tagged_vn_node_ids": null}),
        )
        .unwrap();
        let PrimitiveAttributes::MultipleVlan(a) = &attrs else {
            panic!("wrong variant");
        };
        assert!(a.tagged_vn_node_ids.is_empty());
        assert_eq!(attrs.to_value().unwrap()["tagged_vn_node_ids"], json!([]));
    }

    #[test]
    fn test_wire_enum() {
        use std::str::FromStr;
        assert_eq!(PeerTo::from_str("loopback").unwrap(), PeerTo::Loopback);
        assert_eq!(PeerTo::InterfaceOrSharedIpEndpoint.as_str(), "interface_or_shared_ip_endpoint");
        assert!(TagType::from_str("tagged").is_err());
        assert_eq!(Ipv6AddressingType::VALUES, &["none", "link_local", "numbered"]);
    }
}
