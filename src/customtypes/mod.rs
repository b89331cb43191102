//! Custom string-backed attribute types with semantic equality.
//!
//! Terraform compares attribute values byte-for-byte. These types let the
//! provider recognise two spellings of the same value (for example `::/0` and
//! `0:0:0:0:0:0:0:0/0`) so that a plan keeps the spelling already in state
//! instead of reporting a spurious change.

mod ipv46_address;
mod ipv46_prefix;

pub use ipv46_address::Ipv46Address;
pub use ipv46_prefix::Ipv46Prefix;

use crate::schema::Diagnostics;
use crate::value::AttrValue;

pub(crate) const SEMANTIC_EQUALITY_ERROR: &str = "Semantic Equality Check Error";

/// Semantic comparison between a value and a candidate replacement.
///
/// Comparing against a value of a different kind is a provider bug and is
/// reported as an error diagnostic.
pub trait SemanticEquals<Rhs: ?Sized = Self> {
    /// Returns `true` when `other` represents the same value as `self`.
    fn semantic_equals(&self, other: &Rhs, diags: &mut Diagnostics) -> bool;
}

pub(crate) fn type_mismatch(diags: &mut Diagnostics, expected: &str, got: &str) {
    diags.add_error(
        SEMANTIC_EQUALITY_ERROR,
        format!(
            "An unexpected value type was received while performing semantic equality checks. \
             Please report this to the provider developers.\n\n\
             Expected Value Type: {}\nGot Value Type: {}",
            expected, got
        ),
    );
}

impl<T: SemanticEquals> SemanticEquals for AttrValue<T> {
    fn semantic_equals(&self, other: &Self, diags: &mut Diagnostics) -> bool {
        match (self, other) {
            (AttrValue::Null, AttrValue::Null) => true,
            (AttrValue::Unknown, AttrValue::Unknown) => true,
            (AttrValue::Known(a), AttrValue::Known(b)) => a.semantic_equals(b, diags),
            _ => false,
        }
    }
}

/// Choose the planned value for a semantically-typed attribute.
///
/// Returns the prior state value when it is semantically equal to the plan,
/// otherwise the plan value unchanged.
pub fn keep_semantically_equal<T>(
    state: Option<&AttrValue<T>>,
    plan: AttrValue<T>,
    diags: &mut Diagnostics,
) -> AttrValue<T>
where
    T: SemanticEquals + Clone,
{
    match state {
        Some(prior @ AttrValue::Known(_)) if plan.is_known() => {
            if prior.semantic_equals(&plan, diags) {
                prior.clone()
            } else {
                plan
            }
        },
        _ => plan,
    }
}
