//! Connectivity template primitives as they appear in resource state.
//!
//! Each primitive type is a state struct stored in a map keyed by its label.
//! The [`CtPrimitive`] trait connects a state struct to the wire
//! [`Primitive`], and the free functions in this module work on whole maps of
//! one primitive type:
//!
//! - [`subpolicies`]: state to API
//! - [`from_subpolicies`]: API to state
//! - [`load_ids_into_map`]: copy generated ids into planned state
//! - [`plan_map`]: fill computed ids from prior state

mod bgp_peering_generic_system;
mod bgp_peering_ip_endpoint;
mod custom_static_route;
mod dynamic_bgp_peering;
mod ip_link;
mod peering_children;
mod routing_policy;
mod routing_zone_constraint;
mod static_route;
mod virtual_network_multiple;
mod virtual_network_single;

pub use bgp_peering_generic_system::BgpPeeringGenericSystem;
pub use bgp_peering_ip_endpoint::BgpPeeringIpEndpoint;
pub use custom_static_route::CustomStaticRoute;
pub use dynamic_bgp_peering::DynamicBgpPeering;
pub use ip_link::IpLink;
pub use peering_children::PeeringChildren;
pub use routing_policy::RoutingPolicy;
pub use routing_zone_constraint::RoutingZoneConstraint;
pub use static_route::StaticRoute;
pub use virtual_network_multiple::VirtualNetworkMultiple;
pub use virtual_network_single::VirtualNetworkSingle;

use std::collections::BTreeMap;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::policy::{Primitive, PrimitiveAttributes};
use crate::error::ProviderError;
use crate::plan_modifier;
use crate::schema::{Attribute, Block, Diagnostics, NestedBlock};
use crate::validation;
use crate::value::{map_value_or_null, AttrValue};

/// Lowest VLAN id usable on a primitive.
pub const VLAN_MIN_USABLE: i64 = 2;
/// Highest VLAN id usable on a primitive.
pub const VLAN_MAX_USABLE: i64 = 4094;
/// Smallest IP link L3 MTU.
pub const L3_MTU_MIN: i64 = 1280;
/// Largest IP link L3 MTU.
pub const L3_MTU_MAX: i64 = 9216;
/// Smallest BGP TTL.
pub const TTL_MIN: i64 = 1;
/// Largest BGP TTL.
pub const TTL_MAX: i64 = 255;
/// Smallest ASN.
pub const ASN_MIN: i64 = 1;
/// Largest (4-byte) ASN.
pub const ASN_MAX: i64 = 4_294_967_295;
/// Smallest BGP keepalive time (seconds).
pub const BGP_KEEPALIVE_MIN: i64 = 1;
/// Largest BGP keepalive time (seconds).
pub const BGP_KEEPALIVE_MAX: i64 = 65_535;
/// Smallest BGP hold time (seconds).
pub const BGP_HOLD_MIN: i64 = 3;
/// Largest BGP hold time (seconds).
pub const BGP_HOLD_MAX: i64 = 65_535;

/// A map of primitives keyed by label.
pub type PrimitiveMap<T> = AttrValue<BTreeMap<String, T>>;

/// Node and pipeline ids carried by every primitive.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PrimitiveIds {
    /// Primitive node id.
    pub id: AttrValue<String>,
    /// Upstream pipeline node id.
    pub pipeline_id: AttrValue<String>,
}

/// A connectivity template primitive held in resource state.
pub trait CtPrimitive: Clone + Sized {
    /// Schema of one map element.
    fn block() -> Block;

    /// Attribute validators. `path` addresses this map element.
    fn validate(&self, path: &str, diags: &mut Diagnostics);

    /// Returns `true` when `attributes` is this primitive's wire variant.
    fn matches(attributes: &PrimitiveAttributes) -> bool;

    /// Build state from wire attributes of the matching variant.
    fn from_attributes(attributes: &PrimitiveAttributes) -> Option<Self>;

    /// Wire attributes for this primitive.
    fn attributes(&self, diags: &mut Diagnostics) -> Option<PrimitiveAttributes>;

    /// Node and pipeline ids.
    fn ids(&self) -> &PrimitiveIds;

    /// Mutable node and pipeline ids.
    fn ids_mut(&mut self) -> &mut PrimitiveIds;

    /// The child batch id, for primitives that can own children.
    fn batch_id(&self) -> Option<&AttrValue<String>> {
        None
    }

    /// Mutable child batch id, for primitives that can own children.
    fn batch_id_mut(&mut self) -> Option<&mut AttrValue<String>> {
        None
    }

    /// Number of planned children. Unknown when any child map is unknown.
    fn child_count(&self) -> AttrValue<usize> {
        AttrValue::Known(0)
    }

    /// Children in wire form.
    fn children(&self, _diags: &mut Diagnostics) -> Vec<Primitive> {
        Vec::new()
    }

    /// Populate child maps from wire children.
    fn load_children(&mut self, _subpolicies: &[Primitive], _diags: &mut Diagnostics) {}

    /// Copy wire ids into child maps.
    fn load_child_ids(&mut self, _subpolicies: &[Primitive], _diags: &mut Diagnostics) {}

    /// Plan child maps against prior state.
    fn plan_children(&mut self, _state: Option<&Self>, _diags: &mut Diagnostics) {}

    /// Plan non-id attributes against prior state.
    fn plan_values(&mut self, _state: Option<&Self>, _diags: &mut Diagnostics) {}

    /// State to API. Ids are copied only when known.
    fn primitive(&self, label: &str, diags: &mut Diagnostics) -> Option<Primitive> {
        let attributes = self.attributes(diags)?;
        let subpolicies = self.children(diags);
        if diags.has_error() {
            return None;
        }

        let ids = self.ids();
        Some(Primitive {
            id: ids.id.as_known().cloned(),
            label: label.to_string(),
            pipeline_id: ids.pipeline_id.as_known().cloned(),
            batch_id: self.batch_id().and_then(|b| b.as_known().cloned()),
            attributes,
            subpolicies,
        })
    }

    /// API to state, including ids and children.
    fn from_primitive(primitive: &Primitive, diags: &mut Diagnostics) -> Option<Self> {
        let mut result = Self::from_attributes(&primitive.attributes)?;
        result.set_ids_from(primitive);
        result.load_children(&primitive.subpolicies, diags);
        Some(result)
    }

    /// Copy ids from a wire primitive with the same label, then recurse.
    fn load_ids(&mut self, primitive: &Primitive, diags: &mut Diagnostics) {
        self.set_ids_from(primitive);
        self.load_child_ids(&primitive.subpolicies, diags);
    }

    /// Copy this primitive's own ids from a wire primitive.
    fn set_ids_from(&mut self, primitive: &Primitive) {
        let ids = self.ids_mut();
        ids.id = AttrValue::from_option(primitive.id.clone());
        ids.pipeline_id = AttrValue::from_option(primitive.pipeline_id.clone());
        if let Some(batch_id) = self.batch_id_mut() {
            *batch_id = AttrValue::from_option(primitive.batch_id.clone());
        }
    }

    /// Plan this primitive. `state` is the prior element with the same label.
    fn plan(&mut self, state: Option<&Self>, diags: &mut Diagnostics) {
        let prior_ids = state.map(|s| s.ids());
        let ids = self.ids_mut();
        ids.id = plan_modifier::use_state_for_unknown(AttrValue::Unknown, prior_ids.map(|p| &p.id));
        ids.pipeline_id = plan_modifier::use_state_for_unknown(
            AttrValue::Unknown,
            prior_ids.map(|p| &p.pipeline_id),
        );

        let children = self.child_count();
        let prior_batch = state.and_then(|s| s.batch_id());
        if let Some(batch_id) = self.batch_id_mut() {
            *batch_id = plan_modifier::batch_id(children, state.is_none(), prior_batch);
        }

        self.plan_values(state, diags);
        self.plan_children(state, diags);
    }
}

/// Wire form of every primitive in `map`, each labeled with its key.
pub fn subpolicies<T: CtPrimitive>(map: &PrimitiveMap<T>, diags: &mut Diagnostics) -> Vec<Primitive> {
    let Some(map) = map.as_known() else {
        return Vec::new();
    };

    let mut result = Vec::with_capacity(map.len());
    for (label, element) in map {
        match element.primitive(label, diags) {
            Some(p) => result.push(p),
            None => return Vec::new(),
        }
    }
    result
}

/// State map of the `T` primitives found in `subpolicies`. Empty is null.
pub fn from_subpolicies<T: CtPrimitive>(
    subpolicies: &[Primitive],
    diags: &mut Diagnostics,
) -> PrimitiveMap<T> {
    let mut result = BTreeMap::new();
    for subpolicy in subpolicies.iter().filter(|p| T::matches(&p.attributes)) {
        if let Some(element) = T::from_primitive(subpolicy, diags) {
            result.insert(subpolicy.label.clone(), element);
        }
    }

    if diags.has_error() {
        return AttrValue::Null;
    }
    map_value_or_null(result)
}

/// Copy ids from `subpolicies` into the elements of `map` with matching
/// labels. Unmatched labels and other primitive types are left alone.
pub fn load_ids_into_map<T: CtPrimitive>(
    subpolicies: &[Primitive],
    map: &mut PrimitiveMap<T>,
    diags: &mut Diagnostics,
) {
    let Some(map) = map.as_known_mut() else {
        return;
    };

    for subpolicy in subpolicies.iter().filter(|p| T::matches(&p.attributes)) {
        if let Some(element) = map.get_mut(&subpolicy.label) {
            element.load_ids(subpolicy, diags);
        }
    }
}

/// Plan every element of `plan` against the prior element with the same label.
pub fn plan_map<T: CtPrimitive>(
    plan: &mut PrimitiveMap<T>,
    state: Option<&PrimitiveMap<T>>,
    diags: &mut Diagnostics,
) {
    let Some(plan) = plan.as_known_mut() else {
        return;
    };
    let prior = state.and_then(AttrValue::as_known);
    for (label, element) in plan.iter_mut() {
        element.plan(prior.and_then(|m| m.get(label)), diags);
    }
}

/// Run validators on a primitive map attribute named `name` under `path`.
pub fn validate_map<T: CtPrimitive>(
    path: &str,
    name: &str,
    map: &PrimitiveMap<T>,
    diags: &mut Diagnostics,
) {
    let map_path = validation::join_path(path, name);
    let Some(map) = map.as_known() else {
        return;
    };
    validation::size_at_least(&map_path, Some(map.len()), 1, diags);
    for (label, element) in map {
        element.validate(&format!("{}.{}", map_path, label), diags);
    }
}

/// Element count of a primitive map: null is zero.
pub fn map_len<T>(map: &PrimitiveMap<T>) -> AttrValue<usize> {
    match map {
        AttrValue::Null => AttrValue::Known(0),
        AttrValue::Unknown => AttrValue::Unknown,
        AttrValue::Known(m) => AttrValue::Known(m.len()),
    }
}

/// A map-nested block of `T` primitives.
pub fn map_block<T: CtPrimitive>(description: &str) -> NestedBlock {
    NestedBlock::map(T::block().with_description(description))
}

// ── Shared schema pieces ─────────────────────────────────────────────

pub(crate) fn with_id_attributes(block: Block, with_batch: bool) -> Block {
    let block = block
        .with_attribute(
            "id",
            Attribute::computed_string()
                .with_description("Unique identifier for this CT Primitive element"),
        )
        .with_attribute(
            "pipeline_id",
            Attribute::computed_string()
                .with_description("Unique identifier for this CT Primitive Element's upstream pipeline"),
        );
    if with_batch {
        block.with_attribute(
            "batch_id",
            Attribute::computed_string().with_description(
                "Unique identifier for this CT Primitive Element's downstream collection",
            ),
        )
    } else {
        block
    }
}

pub(crate) fn with_bgp_attributes(block: Block) -> Block {
    block
        .with_attribute(
            "ttl",
            Attribute::optional_int64()
                .with_description("BGP Time To Live. Omit to use device defaults."),
        )
        .with_attribute(
            "bfd_enabled",
            Attribute::required_bool().with_description("Enable BFD."),
        )
        .with_attribute(
            "password",
            Attribute::optional_string()
                .sensitive()
                .with_description("Password used to secure the BGP session."),
        )
        .with_attribute(
            "keepalive_time",
            Attribute::optional_int64().with_description("BGP keepalive time (seconds)."),
        )
        .with_attribute(
            "hold_time",
            Attribute::optional_int64().with_description("BGP hold time (seconds)."),
        )
        .with_attribute(
            "local_asn",
            Attribute::optional_int64().with_description(
                "Local ASN. Allows the router to appear to be a member of a second \
                 autonomous system by prepending the local AS to announcements.",
            ),
        )
}

/// BGP session settings shared by the peering primitives.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BgpSession {
    /// BGP TTL; null means the device default.
    pub ttl: AttrValue<i64>,
    /// Enable BFD.
    pub bfd_enabled: AttrValue<bool>,
    /// Session password.
    pub password: AttrValue<String>,
    /// Keepalive time in seconds.
    pub keepalive_time: AttrValue<i64>,
    /// Hold time in seconds.
    pub hold_time: AttrValue<i64>,
    /// Local ASN.
    pub local_asn: AttrValue<i64>,
}

impl BgpSession {
    pub(crate) fn validate(&self, path: &str, diags: &mut Diagnostics) {
        let p = |name: &str| validation::join_path(path, name);

        validation::between(&p("ttl"), &self.ttl, TTL_MIN, TTL_MAX, diags);
        validation::length_at_least(&p("password"), &self.password, 1, diags);
        validation::between(&p("local_asn"), &self.local_asn, ASN_MIN, ASN_MAX, diags);

        validation::between(
            &p("keepalive_time"),
            &self.keepalive_time,
            BGP_KEEPALIVE_MIN,
            BGP_KEEPALIVE_MAX,
            diags,
        );
        validation::also_requires(
            &p("keepalive_time"),
            !self.keepalive_time.is_null(),
            &[(p("hold_time").as_str(), self.hold_time.is_null())],
            diags,
        );

        validation::between(&p("hold_time"), &self.hold_time, BGP_HOLD_MIN, BGP_HOLD_MAX, diags);
        validation::also_requires(
            &p("hold_time"),
            !self.hold_time.is_null(),
            &[(p("keepalive_time").as_str(), self.keepalive_time.is_null())],
            diags,
        );
        validation::at_least_product_of(
            &p("hold_time"),
            &self.hold_time,
            3,
            &p("keepalive_time"),
            &self.keepalive_time,
            diags,
        );
    }

    pub(crate) fn bfd(&self) -> bool {
        self.bfd_enabled.known_or(false)
    }

    /// Wire TTL: zero stands for null.
    pub(crate) fn wire_ttl(&self, diags: &mut Diagnostics) -> u8 {
        narrow("ttl", &self.ttl, diags).unwrap_or(0)
    }

    pub(crate) fn from_wire(
        ttl: u8,
        bfd: bool,
        password: Option<String>,
        keepalive: Option<u16>,
        hold: Option<u16>,
        local_asn: Option<u32>,
    ) -> Self {
        Self {
            ttl: if ttl > 0 {
                AttrValue::Known(i64::from(ttl))
            } else {
                AttrValue::Null
            },
            bfd_enabled: AttrValue::Known(bfd),
            password: AttrValue::from_option(password),
            keepalive_time: AttrValue::from_option(keepalive.map(i64::from)),
            hold_time: AttrValue::from_option(hold.map(i64::from)),
            local_asn: AttrValue::from_option(local_asn.map(i64::from)),
        }
    }
}

// ── Conversion helpers ───────────────────────────────────────────────

/// Parse a known string attribute into a wire enum.
pub(crate) fn parse_enum<E>(name: &str, value: &AttrValue<String>, diags: &mut Diagnostics) -> Option<E>
where
    E: FromStr<Err = ProviderError>,
{
    let raw = value.as_known().map(String::as_str).unwrap_or_default();
    match raw.parse() {
        Ok(v) => Some(v),
        Err(err) => {
            diags.add_error(
                format!("failed to parse {} value {:?}", name, raw),
                err.to_string(),
            );
            None
        },
    }
}

/// Narrow a known integer attribute to a wire integer type. Null is `None`.
pub(crate) fn narrow<T: TryFrom<i64>>(
    name: &str,
    value: &AttrValue<i64>,
    diags: &mut Diagnostics,
) -> Option<T> {
    let v = *value.as_known()?;
    match T::try_from(v) {
        Ok(n) => Some(n),
        Err(_) => {
            diags.add_error(
                crate::schema::PROVIDER_BUG,
                format!("{} value {} is out of range", name, v),
            );
            None
        },
    }
}

/// Known string attribute, or `None`.
pub(crate) fn known_string<T: ToString>(value: &AttrValue<T>) -> Option<String> {
    value.as_known().map(ToString::to_string)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::connectivity_template::policy::{AttachStaticRoute, Primitive, PrimitiveAttributes};
    use crate::customtypes::Ipv46Prefix;
    use pretty_assertions::assert_eq;

    pub(crate) fn static_route(network: &str) -> StaticRoute {
        StaticRoute {
            network: AttrValue::Known(Ipv46Prefix::new(network)),
            share_ip_endpoint: AttrValue::Known(false),
            ..Default::default()
        }
    }

    fn wire_route(label: &str, id: &str) -> Primitive {
        Primitive {
            id: Some(id.to_string()),
            label: label.to_string(),
            pipeline_id: Some(format!("{}-pipeline", id)),
            batch_id: None,
            attributes: PrimitiveAttributes::StaticRoute(AttachStaticRoute {
                network: Some("10.0.0.0/8".into()),
                share_ip_endpoint: false,
            }),
            subpolicies: Vec::new(),
        }
    }

    #[test]
    fn test_subpolicies_labels() {
        let map = AttrValue::Known(BTreeMap::from([
            ("a".to_string(), static_route("10.0.0.0/8")),
            ("b".to_string(), static_route("192.168.0.0/16")),
        ]));
        let mut diags = Diagnostics::new();
        let wire = subpolicies(&map, &mut diags);
        assert!(diags.is_empty());
        let labels: Vec<&str> = wire.iter().map(|p| p.label.as_str()).collect();
        assert_eq!(labels, vec!["a", "b"]);
        assert!(wire[0].id.is_none());

        assert!(subpolicies::<StaticRoute>(&AttrValue::Null, &mut diags).is_empty());
    }

    #[test]
    fn test_from_subpolicies_empty_is_null() {
        let mut diags = Diagnostics::new();
        let map: PrimitiveMap<StaticRoute> = from_subpolicies(&[], &mut diags);
        assert!(map.is_null());

        let map: PrimitiveMap<RoutingPolicy> = from_subpolicies(&[wire_route("r", "1")], &mut diags);
        assert!(map.is_null(), "other primitive types are filtered out");
    }

    #[test]
    fn test_from_subpolicies_keys_by_label() {
        let mut diags = Diagnostics::new();
        let map: PrimitiveMap<StaticRoute> =
            from_subpolicies(&[wire_route("r1", "1"), wire_route("r2", "2")], &mut diags);
        let map = map.into_known().unwrap();
        assert_eq!(map.len(), 2);
        assert_eq!(map["r2"].ids.id, AttrValue::Known("2".to_string()));
        assert_eq!(map["r2"].ids.pipeline_id, AttrValue::Known("2-pipeline".to_string()));
    }

    #[test]
    fn test_load_ids_into_map() {
        let mut map = AttrValue::Known(BTreeMap::from([
            ("r1".to_string(), static_route("10.0.0.0/8")),
            ("unmatched".to_string(), static_route("10.0.0.0/8")),
        ]));
        let mut diags = Diagnostics::new();
        load_ids_into_map(&[wire_route("r1", "1"), wire_route("other", "9")], &mut map, &mut diags);

        let map = map.into_known().unwrap();
        assert_eq!(map["r1"].ids.id, AttrValue::Known("1".to_string()));
        assert!(map["unmatched"].ids.id.is_null());
    }

    #[test]
    fn test_plan_map_ids() {
        let mut prior = static_route("10.0.0.0/8");
        prior.ids.id = AttrValue::Known("1".into());
        prior.ids.pipeline_id = AttrValue::Known("p1".into());
        let state = AttrValue::Known(BTreeMap::from([("old".to_string(), prior)]));

        let mut plan = AttrValue::Known(BTreeMap::from([
            ("old".to_string(), static_route("10.0.0.0/8")),
            ("new".to_string(), static_route("10.0.0.0/8")),
        ]));
        let mut diags = Diagnostics::new();
        plan_map(&mut plan, Some(&state), &mut diags);

        let plan = plan.into_known().unwrap();
        assert_eq!(plan["old"].ids.id, AttrValue::Known("1".to_string()));
        assert_eq!(plan["old"].ids.pipeline_id, AttrValue::Known("p1".to_string()));
        assert!(plan["new"].ids.id.is_unknown());
        assert!(plan["new"].ids.pipeline_id.is_unknown());
    }

    #[test]
    fn test_validate_map_size() {
        let empty: PrimitiveMap<StaticRoute> = AttrValue::Known(BTreeMap::new());
        let mut diags = Diagnostics::new();
        validate_map("", "static_routes", &empty, &mut diags);
        assert!(diags.has_error());
        assert_eq!(diags[0].attribute.as_deref(), Some("static_routes"));
    }

    #[test]
    fn test_bgp_session_validation() {
        let cases = [
            (Some(10), Some(30), 0),
            (Some(10), Some(29), 1),
            (Some(10), None, 1),
            (None, Some(30), 1),
            (Some(0), Some(30), 1),
            (None, None, 0),
        ];
        for (keepalive, hold, errors) in cases {
            let session = BgpSession {
                keepalive_time: AttrValue::from_option(keepalive),
                hold_time: AttrValue::from_option(hold),
                bfd_enabled: AttrValue::Known(false),
                ..Default::default()
            };
            let mut diags = Diagnostics::new();
            session.validate("x", &mut diags);
            assert_eq!(diags.error_count(), errors, "{:?} {:?}", keepalive, hold);
        }

        let session = BgpSession {
            ttl: AttrValue::Known(0),
            local_asn: AttrValue::Known(ASN_MAX + 1),
            password: AttrValue::Known(String::new()),
            ..Default::default()
        };
        let mut diags = Diagnostics::new();
        session.validate("x", &mut diags);
        assert_eq!(diags.error_count(), 3);
    }

    #[test]
    fn test_bgp_session_ttl_zero_is_null() {
        let session = BgpSession::from_wire(0, true, None, Some(10), Some(30), None);
        assert!(session.ttl.is_null());
        assert_eq!(session.hold_time, AttrValue::Known(30));

        let mut diags = Diagnostics::new();
        assert_eq!(session.wire_ttl(&mut diags), 0);
        let session = BgpSession::from_wire(5, true, None, None, None, Some(65000));
        assert_eq!(session.wire_ttl(&mut diags), 5);
        assert_eq!(session.local_asn, AttrValue::Known(65000));
    }

    #[test]
    fn test_narrow_out_of_range() {
        let mut diags = Diagnostics::new();
        assert_eq!(narrow::<u16>("vlan_id", &AttrValue::Known(100), &mut diags), Some(100));
        assert_eq!(narrow::<u16>("vlan_id", &AttrValue::Null, &mut diags), None);
        assert!(diags.is_empty());
        assert_eq!(narrow::<u8>("ttl", &AttrValue::Known(300), &mut diags), None);
        assert!(diags.has_error());
    }
}
