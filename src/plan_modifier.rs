//! Plan-time value inference.
//!
//! During plan, computed attributes arrive as unknown. These helpers decide
//! which of them can be filled in from prior state so the plan shows only real
//! changes.

use serde_json::Value;

use crate::schema::Schema;
use crate::value::AttrValue;

/// Keep the prior state value for an attribute that plans as unknown.
///
/// Has no effect when the resource is being created (`state` is `None`) or
/// when the prior value is null.
pub fn use_state_for_unknown<T: Clone>(
    plan: AttrValue<T>,
    state: Option<&AttrValue<T>>,
) -> AttrValue<T> {
    match (plan, state) {
        (AttrValue::Unknown, Some(prior)) if !prior.is_null() => prior.clone(),
        (plan, _) => plan,
    }
}

/// Sum the sizes of a primitive's child collections.
///
/// Null collections count as empty; any unknown collection makes the total unknown.
pub fn count_children(collections: &[AttrValue<usize>]) -> AttrValue<usize> {
    let mut total = 0;
    for c in collections {
        match c {
            AttrValue::Unknown => return AttrValue::Unknown,
            AttrValue::Null => {},
            AttrValue::Known(n) => total += n,
        }
    }
    AttrValue::Known(total)
}

/// Plan the `batch_id` of a primitive that may own child primitives.
///
/// - no children: null
/// - children unknown, or the parent primitive is new: unknown
/// - otherwise: the prior state value, or unknown when the prior batch was
///   null (the batch is created on apply)
pub fn batch_id(
    children: AttrValue<usize>,
    parent_is_new: bool,
    state: Option<&AttrValue<String>>,
) -> AttrValue<String> {
    match children {
        AttrValue::Known(0) | AttrValue::Null => return AttrValue::Null,
        AttrValue::Unknown => return AttrValue::Unknown,
        AttrValue::Known(_) => {},
    }

    if parent_is_new {
        return AttrValue::Unknown;
    }

    match state {
        Some(AttrValue::Known(id)) => AttrValue::Known(id.clone()),
        _ => AttrValue::Unknown,
    }
}

/// Names of top-level `force_new` attributes whose value differs between
/// prior state and the proposed new state.
pub fn requires_replace(schema: &Schema, prior: &Value, planned: &Value) -> Vec<String> {
    let mut changed: Vec<String> = schema
        .block
        .attributes
        .iter()
        .filter(|(_, attr)| attr.force_new)
        .filter(|(name, _)| {
            let before = prior.get(name.as_str()).unwrap_or(&Value::Null);
            let after = planned.get(name.as_str()).unwrap_or(&Value::Null);
            !crate::value::is_unknown_json(after) && before != after
        })
        .map(|(name, _)| name.clone())
        .collect();
    changed.sort();
    changed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Attribute;
    use crate::value::UNKNOWN_VALUE;
    use serde_json::json;

    fn known(s: &str) -> AttrValue<String> {
        AttrValue::Known(s.to_string())
    }

    #[test]
    fn test_use_state_for_unknown() {
        assert_eq!(use_state_for_unknown(AttrValue::Unknown, Some(&known("a"))), known("a"));
        assert!(use_state_for_unknown::<String>(AttrValue::Unknown, None).is_unknown());
        assert!(use_state_for_unknown::<String>(AttrValue::Unknown, Some(&AttrValue::Null)).is_unknown());
        assert_eq!(use_state_for_unknown(known("b"), Some(&known("a"))), known("b"));
    }

    #[test]
    fn test_count_children() {
        assert_eq!(
            count_children(&[AttrValue::Known(2), AttrValue::Null, AttrValue::Known(1)]),
            AttrValue::Known(3)
        );
        assert!(count_children(&[AttrValue::Known(2), AttrValue::Unknown]).is_unknown());
        assert_eq!(count_children(&[]), AttrValue::Known(0));
    }

    #[test]
    fn test_batch_id_tri_state() {
        // no children -> null, regardless of prior state
        assert!(batch_id(AttrValue::Known(0), false, Some(&known("b1"))).is_null());
        assert!(batch_id(AttrValue::Known(0), true, None).is_null());

        // unknown child set -> unknown
        assert!(batch_id(AttrValue::Unknown, false, Some(&known("b1"))).is_unknown());

        // new parent -> unknown
        assert!(batch_id(AttrValue::Known(2), true, None).is_unknown());

        // existing parent keeps its batch
        assert_eq!(batch_id(AttrValue::Known(2), false, Some(&known("b1"))), known("b1"));

        // first child added to an existing parent -> batch created on apply
        assert!(batch_id(AttrValue::Known(1), false, Some(&AttrValue::Null)).is_unknown());
    }

    #[test]
    fn test_requires_replace() {
        let schema = Schema::v0()
            .with_attribute("blueprint_id", Attribute::required_string().with_force_new())
            .with_attribute("name", Attribute::required_string());

        let prior = json!({"blueprint_id": "bp1", "name": "a"});
        assert!(requires_replace(&schema, &prior, &json!({"blueprint_id": "bp1", "name": "b"})).is_empty());
        assert_eq!(
            requires_replace(&schema, &prior, &json!({"blueprint_id": "bp2", "name": "a"})),
            vec!["blueprint_id".to_string()]
        );
        assert!(requires_replace(&schema, &prior, &json!({"blueprint_id": UNKNOWN_VALUE})).is_empty());
    }
}
