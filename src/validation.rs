//! Configuration validation.
//!
//! Two layers live here. [`validate`] checks a JSON document against a
//! [`Schema`]: presence of required attributes, attribute types, and nested
//! block item counts. The attribute validators further down (`between`,
//! `one_of`, `at_least_product_of`, ...) check typed values and are called by
//! each resource's own `validate` method.
//!
//! Values carrying the unknown marker are accepted everywhere; they are
//! checked again once known.
//!
//! # Example
//!
//! ```
//! use apstra_provider::schema::{Schema, Attribute};
//! use apstra_provider::validation::validate;
//! use serde_json::json;
//!
//! let schema = Schema::v0()
//!     .with_attribute("name", Attribute::required_string())
//!     .with_attribute("vlan_id", Attribute::optional_int64());
//!
//! let input = json!({
//!     "name": "ct-1",
//!     "vlan_id": 10
//! });
//! assert!(validate(&schema, &input).is_empty());
//!
//! let input = json!({
//!     "name": "ct-1",
//!     "vlan_id": "ten"
//! });
//! let diagnostics = validate(&schema, &input);
//! assert_eq!(diagnostics.len(), 1);
//! assert_eq!(diagnostics[0].attribute, Some("vlan_id".to_string()));
//! ```

use crate::customtypes::{Ipv46Address, Ipv46Prefix};
use crate::schema::{
    Attribute, AttributeType, Block, Diagnostic, DiagnosticSeverity, Diagnostics, NestedBlock,
    Schema,
};
use crate::value::{is_unknown_json, AttrValue};
use serde_json::Value;

/// Validate a JSON value against a schema.
///
/// Returns a list of diagnostics for any validation errors found.
/// An empty list means the value is valid.
///
/// # Validation Rules
///
/// - Required attributes must be present and non-null
/// - Optional attributes may be absent or null
/// - Computed attributes are skipped (provider sets these)
/// - Attribute types must match the schema
/// - Nested blocks are maps of blocks, validated recursively
pub fn validate(schema: &Schema, value: &Value) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();
    validate_block(&schema.block, value, "", &mut diagnostics);
    diagnostics
}

/// Validate a JSON value against a schema, returning Ok if valid or Err with diagnostics.
///
/// This is a convenience wrapper around [`validate`] that returns a Result.
pub fn validate_result(schema: &Schema, value: &Value) -> Result<(), Vec<Diagnostic>> {
    let diagnostics = validate(schema, value);
    if diagnostics.is_empty() {
        Ok(())
    } else {
        Err(diagnostics)
    }
}

/// Check if a JSON value is valid against a schema.
///
/// Returns `true` if valid, `false` otherwise.
/// Use [`validate`] to get detailed error information.
pub fn is_valid(schema: &Schema, value: &Value) -> bool {
    validate(schema, value).is_empty()
}

fn validate_block(block: &Block, value: &Value, path: &str, diagnostics: &mut Vec<Diagnostic>) {
    let obj = match value {
        Value::Object(map) => map,
        Value::Null => {
            // Null is valid for optional blocks, but we can't validate further
            return;
        },
        v if is_unknown_json(v) => return,
        _ => {
            diagnostics.push(
                Diagnostic::error("Expected object")
                    .with_detail(format!("Got {}", value_type_name(value)))
                    .with_attribute_if_not_empty(path),
            );
            return;
        },
    };

    // Validate attributes
    for (name, attr) in &block.attributes {
        let attr_path = join_path(path, name);
        let attr_value = obj.get(name);
        validate_attribute(attr, attr_value, &attr_path, diagnostics);
    }

    // Validate nested blocks
    for (name, nested_block) in &block.blocks {
        let block_path = join_path(path, name);
        let block_value = obj.get(name);
        validate_map_block(nested_block, block_value, &block_path, diagnostics);
    }
}

fn validate_attribute(
    attr: &Attribute,
    value: Option<&Value>,
    path: &str,
    diagnostics: &mut Vec<Diagnostic>,
) {
    // Skip computed-only attributes (provider sets these)
    if attr.flags.computed && !attr.flags.optional && !attr.flags.required {
        return;
    }

    match value {
        None | Some(Value::Null) => {
            // Check if required
            if attr.flags.required {
                diagnostics.push(
                    Diagnostic::error(format!("Missing required attribute '{}'", path))
                        .with_detail("This attribute is required and must be provided")
                        .with_attribute(path),
                );
            }
            // Optional attributes can be missing/null
        },
        Some(v) if is_unknown_json(v) => {},
        Some(v) => {
            // Validate type
            validate_attribute_type(&attr.attr_type, v, path, diagnostics);
        },
    }
}

fn validate_attribute_type(
    attr_type: &AttributeType,
    value: &Value,
    path: &str,
    diagnostics: &mut Vec<Diagnostic>,
) {
    if is_unknown_json(value) {
        return;
    }
    match attr_type {
        AttributeType::String => {
            if !value.is_string() {
                diagnostics.push(type_error(path, "string", value));
            }
        },
        AttributeType::Int64 => {
            if !is_int64(value) {
                diagnostics.push(type_error(path, "int64", value));
            }
        },
        AttributeType::Bool => {
            if !value.is_boolean() {
                diagnostics.push(type_error(path, "bool", value));
            }
        },
        AttributeType::Set(element_type) => {
            // Sets are represented as arrays in JSON
            if let Some(arr) = value.as_array() {
                for (i, elem) in arr.iter().enumerate() {
                    let elem_path = format!("{}.{}", path, i);
                    validate_attribute_type(element_type, elem, &elem_path, diagnostics);
                }
            } else {
                diagnostics.push(type_error(path, "set", value));
            }
        },
    }
}

fn validate_map_block(
    nested: &NestedBlock,
    value: Option<&Value>,
    path: &str,
    diagnostics: &mut Vec<Diagnostic>,
) {
    match value {
        None | Some(Value::Null) => {},
        Some(v) if is_unknown_json(v) => {},
        Some(Value::Object(obj)) => {
            for (key, item) in obj {
                let item_path = format!("{}.{}", path, key);
                validate_block(&nested.block, item, &item_path, diagnostics);
            }
        },
        Some(v) => {
            diagnostics.push(
                Diagnostic::error(format!("Expected map for block '{}'", path))
                    .with_detail(format!("Got {}", value_type_name(v)))
                    .with_attribute(path),
            );
        },
    }
}

// Attribute validators

/// Require a string of at least `min` characters.
pub fn length_at_least(path: &str, value: &AttrValue<String>, min: usize, diags: &mut Diagnostics) {
    if let AttrValue::Known(v) = value {
        if v.chars().count() < min {
            diags.add_attribute_error(
                path,
                "Invalid Attribute Value Length",
                format!(
                    "Attribute {} string length must be at least {}, got: {}",
                    path,
                    min,
                    v.chars().count()
                ),
            );
        }
    }
}

/// Require a string to be one of `allowed`.
pub fn one_of(path: &str, value: &AttrValue<String>, allowed: &[&str], diags: &mut Diagnostics) {
    if let AttrValue::Known(v) = value {
        if !allowed.contains(&v.as_str()) {
            let quoted: Vec<String> = allowed.iter().map(|a| format!("{:?}", a)).collect();
            diags.add_attribute_error(
                path,
                "Invalid Attribute Value Match",
                format!(
                    "Attribute {} value must be one of: [{}], got: {:?}",
                    path,
                    quoted.join(" "),
                    v
                ),
            );
        }
    }
}

/// Require an integer within `min..=max`.
pub fn between(path: &str, value: &AttrValue<i64>, min: i64, max: i64, diags: &mut Diagnostics) {
    if let AttrValue::Known(v) = value {
        if *v < min || *v > max {
            diags.add_attribute_error(
                path,
                "Invalid Attribute Value",
                format!(
                    "Attribute {} value must be between {} and {}, got: {}",
                    path, min, max, v
                ),
            );
        }
    }
}

/// Require an even (`even == true`) or odd integer.
pub fn must_be_even_or_odd(path: &str, value: &AttrValue<i64>, even: bool, diags: &mut Diagnostics) {
    if let AttrValue::Known(v) = value {
        if (v % 2 == 0) != even {
            diags.add_attribute_error(
                path,
                "Invalid Attribute Value",
                format!(
                    "Attribute {} value must be {}, got: {}",
                    path,
                    if even { "even" } else { "odd" },
                    v
                ),
            );
        }
    }
}

/// Require `value >= multiplier * other` when both are known.
pub fn at_least_product_of(
    path: &str,
    value: &AttrValue<i64>,
    multiplier: i64,
    other_path: &str,
    other: &AttrValue<i64>,
    diags: &mut Diagnostics,
) {
    if let (AttrValue::Known(v), AttrValue::Known(o)) = (value, other) {
        let floor = o.saturating_mul(multiplier);
        if *v < floor {
            diags.add_attribute_error(
                path,
                "Invalid Attribute Value",
                format!(
                    "Attribute {} value must be at least {} * {} ({}), got: {}",
                    path, multiplier, other_path, floor, v
                ),
            );
        }
    }
}

/// When the attribute at `path` is set, every attribute in `others` must be set too.
///
/// `others` pairs each sibling path with whether that sibling is null.
pub fn also_requires(path: &str, is_set: bool, others: &[(&str, bool)], diags: &mut Diagnostics) {
    if !is_set {
        return;
    }
    for (other_path, other_is_null) in others {
        if *other_is_null {
            diags.add_attribute_error(
                path,
                "Invalid Attribute Combination",
                format!(
                    "Attribute {:?} must be specified when {:?} is specified",
                    other_path, path
                ),
            );
        }
    }
}

/// Require at least one of the named attributes to be set.
///
/// `candidates` pairs each path with whether it is null.
pub fn at_least_one_of(path: &str, candidates: &[(&str, bool)], diags: &mut Diagnostics) {
    if candidates.iter().all(|(_, is_null)| *is_null) {
        let names: Vec<&str> = candidates.iter().map(|(n, _)| *n).collect();
        diags.add_attribute_error(
            path,
            "Invalid Attribute Combination",
            format!(
                "At least one attribute out of [{}] must be specified",
                names.join(",")
            ),
        );
    }
}

/// Require a map or set with at least `min` elements. `None` means null or unknown.
pub fn size_at_least(path: &str, len: Option<usize>, min: usize, diags: &mut Diagnostics) {
    if let Some(len) = len {
        if len < min {
            diags.add_attribute_error(
                path,
                "Invalid Attribute Value",
                format!(
                    "Attribute {} must contain at least {} elements, got: {}",
                    path, min, len
                ),
            );
        }
    }
}

/// Require a valid IPv4 or IPv6 address.
pub fn valid_ipv46_address(path: &str, value: &AttrValue<Ipv46Address>, diags: &mut Diagnostics) {
    if let AttrValue::Known(v) = value {
        v.validate(path, diags);
    }
}

/// Require a valid IPv4 or IPv6 prefix with no host bits set.
pub fn valid_ipv46_prefix(path: &str, value: &AttrValue<Ipv46Prefix>, diags: &mut Diagnostics) {
    if let AttrValue::Known(v) = value {
        v.validate(path, diags);
    }
}

// Helper functions

pub(crate) fn join_path(base: &str, name: &str) -> String {
    if base.is_empty() {
        name.to_string()
    } else {
        format!("{}.{}", base, name)
    }
}

fn value_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn is_int64(value: &Value) -> bool {
    match value {
        Value::Number(n) if n.is_i64() => true,
        // 1.0 is an integer; a u64 beyond i64::MAX is not
        Value::Number(n) => n
            .as_f64()
            .is_some_and(|f| f.fract() == 0.0 && f >= i64::MIN as f64 && f <= i64::MAX as f64),
        _ => false,
    }
}

fn type_error(path: &str, expected: &str, got: &Value) -> Diagnostic {
    Diagnostic {
        severity: DiagnosticSeverity::Error,
        summary: format!("Invalid type for attribute '{}'", path),
        detail: Some(format!(
            "Expected {}, got {}",
            expected,
            value_type_name(got)
        )),
        attribute: Some(path.to_string()),
    }
}

trait DiagnosticExt {
    fn with_attribute_if_not_empty(self, path: &str) -> Self;
}

impl DiagnosticExt for Diagnostic {
    fn with_attribute_if_not_empty(self, path: &str) -> Self {
        if path.is_empty() {
            self
        } else {
            self.with_attribute(path)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Attribute, AttributeFlags, Block, NestedBlock, Schema};
    use crate::value::UNKNOWN_VALUE;
    use serde_json::json;

    fn ct_schema() -> Schema {
        Schema::v0()
            .with_attribute("blueprint_id", Attribute::required_string())
            .with_attribute("id", Attribute::computed_string())
            .with_attribute("tags", Attribute::optional_string_set())
            .with_block(
                "routing_policies",
                NestedBlock::map(
                    Block::new()
                        .with_attribute("routing_policy_id", Attribute::required_string())
                        .with_attribute("id", Attribute::computed_string()),
                ),
            )
    }

    #[test]
    fn test_validate_required_string() {
        let schema = ct_schema();

        assert!(validate(&schema, &json!({"blueprint_id": "bp"})).is_empty());

        let diagnostics = validate(&schema, &json!({}));
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].attribute, Some("blueprint_id".to_string()));

        let diagnostics = validate(&schema, &json!({"blueprint_id": 123}));
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0].summary.contains("Invalid type"));
    }

    #[test]
    fn test_validate_unknown_values_accepted() {
        let schema = ct_schema();
        let diagnostics = validate(
            &schema,
            &json!({
                "blueprint_id": UNKNOWN_VALUE,
                "tags": UNKNOWN_VALUE,
                "routing_policies": UNKNOWN_VALUE,
            }),
        );
        assert!(diagnostics.is_empty());

        let diagnostics = validate(
            &schema,
            &json!({
                "blueprint_id": "bp",
                "routing_policies": {"a": {"routing_policy_id": UNKNOWN_VALUE}},
            }),
        );
        assert!(diagnostics.is_empty());
    }

    #[test]
    fn test_validate_computed_attribute_skipped() {
        let diagnostics = validate(&ct_schema(), &json!({"blueprint_id": "bp", "id": 5}));
        assert!(diagnostics.is_empty());
    }

    #[test]
    fn test_validate_int64() {
        let schema = Schema::v0().with_attribute(
            "vlan_id",
            Attribute::new(AttributeType::Int64, AttributeFlags::required()),
        );

        assert!(validate(&schema, &json!({"vlan_id": 42})).is_empty());
        assert!(validate(&schema, &json!({"vlan_id": 42.0})).is_empty());
        assert_eq!(validate(&schema, &json!({"vlan_id": 42.5})).len(), 1);
        assert_eq!(validate(&schema, &json!({"vlan_id": "42"})).len(), 1);
    }

    #[test]
    fn test_validate_set_elements() {
        let diagnostics = validate(
            &ct_schema(),
            &json!({"blueprint_id": "bp", "tags": ["a", 1]}),
        );
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].attribute, Some("tags.1".to_string()));
    }

    #[test]
    fn test_validate_map_block() {
        let diagnostics = validate(
            &ct_schema(),
            &json!({
                "blueprint_id": "bp",
                "routing_policies": {
                    "good": {"routing_policy_id": "rp1"},
                    "bad": {}
                }
            }),
        );
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(
            diagnostics[0].attribute,
            Some("routing_policies.bad.routing_policy_id".to_string())
        );

        let diagnostics = validate(
            &ct_schema(),
            &json!({"blueprint_id": "bp", "routing_policies": ["x"]}),
        );
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0].summary.contains("Expected map"));
    }

    #[test]
    fn test_validate_root_not_object() {
        let diagnostics = validate(&ct_schema(), &json!("nope"));
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0].attribute.is_none());
    }

    #[test]
    fn test_result_helpers() {
        assert!(is_valid(&ct_schema(), &json!({"blueprint_id": "bp"})));
        assert!(validate_result(&ct_schema(), &json!({})).is_err());
    }

    #[test]
    fn test_length_at_least() {
        let mut diags = Diagnostics::new();
        length_at_least("name", &AttrValue::Known("x".into()), 1, &mut diags);
        length_at_least("name", &AttrValue::Null, 1, &mut diags);
        length_at_least("name", &AttrValue::Unknown, 1, &mut diags);
        assert!(diags.is_empty());

        length_at_least("name", &AttrValue::Known(String::new()), 1, &mut diags);
        assert_eq!(diags.error_count(), 1);
    }

    #[test]
    fn test_one_of() {
        let mut diags = Diagnostics::new();
        let allowed = ["none", "numbered"];
        one_of("t", &AttrValue::Known("numbered".into()), &allowed, &mut diags);
        assert!(diags.is_empty());

        one_of("t", &AttrValue::Known("link_local".into()), &allowed, &mut diags);
        assert!(diags.has_error());
        assert!(diags[0].detail.as_deref().unwrap().contains("\"none\" \"numbered\""));
    }

    #[test]
    fn test_between_and_parity() {
        let mut diags = Diagnostics::new();
        between("l3_mtu", &AttrValue::Known(9000), 1280, 9216, &mut diags);
        must_be_even_or_odd("l3_mtu", &AttrValue::Known(9000), true, &mut diags);
        assert!(diags.is_empty());

        between("l3_mtu", &AttrValue::Known(1000), 1280, 9216, &mut diags);
        must_be_even_or_odd("l3_mtu", &AttrValue::Known(9001), true, &mut diags);
        must_be_even_or_odd("x", &AttrValue::Known(2), false, &mut diags);
        assert_eq!(diags.error_count(), 3);
    }

    #[test]
    fn test_at_least_product_of() {
        let mut diags = Diagnostics::new();
        let keepalive = AttrValue::Known(10);
        at_least_product_of("hold_time", &AttrValue::Known(30), 3, "keepalive_time", &keepalive, &mut diags);
        at_least_product_of("hold_time", &AttrValue::Known(1), 3, "keepalive_time", &AttrValue::Null, &mut diags);
        assert!(diags.is_empty());

        at_least_product_of("hold_time", &AttrValue::Known(29), 3, "keepalive_time", &keepalive, &mut diags);
        assert_eq!(diags.error_count(), 1);
        assert_eq!(diags[0].attribute.as_deref(), Some("hold_time"));
    }

    #[test]
    fn test_also_requires_and_at_least_one_of() {
        let mut diags = Diagnostics::new();
        also_requires("keepalive_time", true, &[("hold_time", false)], &mut diags);
        also_requires("keepalive_time", false, &[("hold_time", true)], &mut diags);
        assert!(diags.is_empty());

        also_requires("keepalive_time", true, &[("hold_time", true)], &mut diags);
        assert_eq!(diags.error_count(), 1);

        let mut diags = Diagnostics::new();
        at_least_one_of("ep", &[("ipv4_address", true), ("ipv6_address", false)], &mut diags);
        assert!(diags.is_empty());
        at_least_one_of("ep", &[("ipv4_address", true), ("ipv6_address", true)], &mut diags);
        assert!(diags.has_error());
    }

    #[test]
    fn test_size_at_least() {
        let mut diags = Diagnostics::new();
        size_at_least("tags", Some(1), 1, &mut diags);
        size_at_least("tags", None, 1, &mut diags);
        assert!(diags.is_empty());
        size_at_least("tags", Some(0), 1, &mut diags);
        assert!(diags.has_error());
    }

    #[test]
    fn test_ipv46_validators() {
        let mut diags = Diagnostics::new();
        valid_ipv46_address("next_hop", &AttrValue::Known(Ipv46Address::new("fe80::1")), &mut diags);
        valid_ipv46_address("next_hop", &AttrValue::Unknown, &mut diags);
        valid_ipv46_prefix("network", &AttrValue::Known(Ipv46Prefix::new("10.0.0.0/8")), &mut diags);
        valid_ipv46_prefix("network", &AttrValue::Null, &mut diags);
        assert!(diags.is_empty());

        valid_ipv46_address("next_hop", &AttrValue::Known(Ipv46Address::new("10.0.0.256")), &mut diags);
        valid_ipv46_prefix("network", &AttrValue::Known(Ipv46Prefix::new("10.0.0.1/8")), &mut diags);
        assert_eq!(diags.error_count(), 2);
        assert_eq!(diags[1].attribute.as_deref(), Some("network"));
    }
}
