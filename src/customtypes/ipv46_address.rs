use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::IpAddr;

use super::{type_mismatch, SemanticEquals};
use crate::schema::Diagnostics;

/// An IPv4 or IPv6 address held in the spelling the user wrote.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Ipv46Address(String);

impl Ipv46Address {
    /// Wrap a string without validating it.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// The string as written.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Parse the string into an address.
    pub fn value_ip_addr(&self) -> Result<IpAddr, std::net::AddrParseError> {
        self.0.parse()
    }

    /// Returns `true` when the value parses as an IPv4 address.
    pub fn is_ipv4(&self) -> bool {
        matches!(self.value_ip_addr(), Ok(IpAddr::V4(_)))
    }

    /// Returns `true` when the value parses as an IPv6 address.
    pub fn is_ipv6(&self) -> bool {
        matches!(self.value_ip_addr(), Ok(IpAddr::V6(_)))
    }

    /// Add an attribute error at `path` unless the value is a valid address.
    pub fn validate(&self, path: &str, diags: &mut Diagnostics) {
        if let Err(err) = self.value_ip_addr() {
            diags.add_attribute_error(
                path,
                "Invalid IPv46 Address String Value",
                format!(
                    "A string value was provided that is not valid IPv4 or IPv6 string format.\n\n\
                     Given Value: {}\nError: {}",
                    self.0, err
                ),
            );
        }
    }
}

impl fmt::Display for Ipv46Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<IpAddr> for Ipv46Address {
    fn from(addr: IpAddr) -> Self {
        Self(addr.to_string())
    }
}

impl SemanticEquals for Ipv46Address {
    fn semantic_equals(&self, other: &Self, _diags: &mut Diagnostics) -> bool {
        match (self.value_ip_addr(), other.value_ip_addr()) {
            (Ok(a), Ok(b)) => a == b,
            _ => self.0 == other.0,
        }
    }
}

impl SemanticEquals<String> for Ipv46Address {
    fn semantic_equals(&self, _other: &String, diags: &mut Diagnostics) -> bool {
        type_mismatch(diags, "Ipv46Address", "String");
        false
    }
}

impl SemanticEquals<super::Ipv46Prefix> for Ipv46Address {
    fn semantic_equals(&self, _other: &super::Ipv46Prefix, diags: &mut Diagnostics) -> bool {
        type_mismatch(diags, "Ipv46Address", "Ipv46Prefix");
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn equal(a: &str, b: &str) -> bool {
        let mut diags = Diagnostics::new();
        let result = Ipv46Address::new(a).semantic_equals(&Ipv46Address::new(b), &mut diags);
        assert!(diags.is_empty());
        result
    }

    #[test]
    fn test_semantic_equality() {
        let cases = [
            ("0:0:0:0:0:0:0:0", "0:0:0:0:0:0:0:1", false),
            ("FF01::", "FF01::1", false),
            ("::FFFF:192.168.255.255", "::FFFF:192.168.255.254", false),
            ("::ffff:192.168.1.1", "192.168.1.1", false),
            ("0:0:0:0:0:0:0:0", "::", true),
            ("2001:0DB8:0000:0000:0008:0800:200C:417A", "2001:db8::8:800:200c:417a", true),
            ("::101", "0:0:0:0:0:0:0:101", true),
            ("FF01:0:0:0:0:0:0:0", "FF01::", true),
            ("0:0:0:0:0:FFFF:192.168.255.255", "::FFFF:192.168.255.255", true),
            ("192.168.1.1", "192.168.1.1", true),
            ("192.168.1.1", "192.168.1.2", false),
        ];
        for (a, b, expected) in cases {
            assert_eq!(equal(a, b), expected, "{} vs {}", a, b);
        }
    }

    #[test]
    fn test_mismatched_type_is_error() {
        let mut diags = Diagnostics::new();
        let matched = Ipv46Address::new("::").semantic_equals(&"::".to_string(), &mut diags);
        assert!(!matched);
        assert!(diags.has_error());
        assert_eq!(diags[0].summary, "Semantic Equality Check Error");
    }

    #[test]
    fn test_validate() {
        let mut diags = Diagnostics::new();
        Ipv46Address::new("10.0.0.1").validate("a", &mut diags);
        Ipv46Address::new("fe80::1").validate("b", &mut diags);
        assert!(diags.is_empty());

        Ipv46Address::new("10.0.0.256").validate("c", &mut diags);
        Ipv46Address::new("10.0.0.0/8").validate("d", &mut diags);
        assert_eq!(diags.error_count(), 2);
        assert_eq!(diags[0].summary, "Invalid IPv46 Address String Value");
        assert_eq!(diags[0].attribute.as_deref(), Some("c"));
    }

    #[test]
    fn test_family() {
        assert!(Ipv46Address::new("1.2.3.4").is_ipv4());
        assert!(!Ipv46Address::new("1.2.3.4").is_ipv6());
        assert!(Ipv46Address::new("::1").is_ipv6());
        assert!(!Ipv46Address::new("garbage").is_ipv4());
        assert!(!Ipv46Address::new("garbage").is_ipv6());
    }
}
