use ipnet::IpNet;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::{type_mismatch, SemanticEquals};
use crate::schema::Diagnostics;

const INVALID_PREFIX: &str = "Invalid IPv46 Prefix String Value";

/// An IPv4 or IPv6 prefix in CIDR notation, held in the spelling the user wrote.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Ipv46Prefix(String);

impl Ipv46Prefix {
    /// Wrap a string without validating it.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// The string as written.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Parse the string into a network.
    pub fn value_ip_net(&self) -> Result<IpNet, ipnet::AddrParseError> {
        self.0.parse()
    }

    /// Returns `true` when the value parses as an IPv4 prefix.
    pub fn is_ipv4(&self) -> bool {
        matches!(self.value_ip_net(), Ok(IpNet::V4(_)))
    }

    /// Returns `true` when the value parses as an IPv6 prefix.
    pub fn is_ipv6(&self) -> bool {
        matches!(self.value_ip_net(), Ok(IpNet::V6(_)))
    }

    /// Add an attribute error at `path` unless the value is a valid base prefix.
    pub fn validate(&self, path: &str, diags: &mut Diagnostics) {
        let net = match self.value_ip_net() {
            Ok(net) => net,
            Err(err) => {
                diags.add_attribute_error(
                    path,
                    INVALID_PREFIX,
                    format!(
                        "A string value was provided that is not valid IPv4 or IPv6 prefix string format.\n\n\
                         Given Value: {}\nError: {}",
                        self.0, err
                    ),
                );
                return;
            },
        };

        if net.addr() != net.network() {
            diags.add_attribute_error(
                path,
                INVALID_PREFIX,
                format!(
                    "A string value was provided that does not represent a base address of an IPv4 or IPv6 prefix.\n\n\
                     Given Value: {}\nBase Address: {}",
                    self.0,
                    net.trunc()
                ),
            );
        }
    }
}

impl fmt::Display for Ipv46Prefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<IpNet> for Ipv46Prefix {
    fn from(net: IpNet) -> Self {
        Self(net.to_string())
    }
}

impl SemanticEquals for Ipv46Prefix {
    fn semantic_equals(&self, other: &Self, _diags: &mut Diagnostics) -> bool {
        match (self.value_ip_net(), other.value_ip_net()) {
            (Ok(a), Ok(b)) => a.addr() == b.addr() && a.prefix_len() == b.prefix_len(),
            _ => self.0 == other.0,
        }
    }
}

impl SemanticEquals<String> for Ipv46Prefix {
    fn semantic_equals(&self, _other: &String, diags: &mut Diagnostics) -> bool {
        type_mismatch(diags, "Ipv46Prefix", "String");
        false
    }
}

impl SemanticEquals<super::Ipv46Address> for Ipv46Prefix {
    fn semantic_equals(&self, _other: &super::Ipv46Address, diags: &mut Diagnostics) -> bool {
        type_mismatch(diags, "Ipv46Prefix", "Ipv46Address");
        false
    }
}
