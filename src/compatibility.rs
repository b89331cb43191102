//! Apstra API version handling.
//!
//! Apstra reports versions such as `4.2.1.1` or `5.0.0-a-12`, which are not
//! strict semver. [`parse_version`] normalises them so that release checks can
//! be written as ordinary [`semver::VersionReq`] constraints.

use semver::{BuildMetadata, Prerelease, Version, VersionReq};
use std::fmt;

use crate::schema::Diagnostics;

/// Apstra releases this provider has been tested against.
pub const SUPPORTED_API_VERSIONS: &[&str] = &[
    "4.2.0", "4.2.1", "4.2.1.1", "4.2.2", "5.0.0", "5.1.0", "6.0.0",
];

/// A named version requirement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Constraint {
    name: &'static str,
    req: &'static str,
}

impl Constraint {
    /// Define a constraint from a semver requirement string.
    pub const fn new(name: &'static str, req: &'static str) -> Self {
        Self { name, req }
    }

    /// The constraint's name, used in diagnostics.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// The requirement string, e.g. `>=4.1.1`.
    pub fn requirement(&self) -> &'static str {
        self.req
    }

    /// Returns `true` when `version` satisfies the constraint.
    pub fn check(&self, version: &Version) -> bool {
        match VersionReq::parse(self.req) {
            Ok(req) => req.matches(&strip_prerelease(version)),
            Err(_) => false,
        }
    }

    /// Like [`Constraint::check`], but for an unparsed version string.
    ///
    /// Unparsable versions never satisfy a constraint.
    pub fn check_str(&self, version: &str) -> bool {
        parse_version(version)
            .map(|v| self.check(&v))
            .unwrap_or(false)
    }
}

impl fmt::Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.req)
    }
}

/// Server version `=4.1.0`.
pub const EQ_410: Constraint = Constraint::new("Eq410", "=4.1.0");
/// Server version `=4.1.1`.
pub const EQ_411: Constraint = Constraint::new("Eq411", "=4.1.1");
/// Server version `=4.1.2`.
pub const EQ_412: Constraint = Constraint::new("Eq412", "=4.1.2");
/// Server version `>=4.1.1`.
pub const GE_411: Constraint = Constraint::new("Ge411", ">=4.1.1");
/// Server version `>=4.2.0`.
pub const GE_420: Constraint = Constraint::new("Ge420", ">=4.2.0");
/// Server version `>=4.2.1`.
pub const GE_421: Constraint = Constraint::new("Ge421", ">=4.2.1");
/// Server version `>=4.2.2`.
pub const GE_422: Constraint = Constraint::new("Ge422", ">=4.2.2");
/// Server version `>=5.0.0`.
pub const GE_500: Constraint = Constraint::new("Ge500", ">=5.0.0");
/// Server version `>=5.1.0`.
pub const GE_510: Constraint = Constraint::new("Ge510", ">=5.1.0");
/// Server version `<5.0.0`.
pub const LT_500: Constraint = Constraint::new("Lt500", "<5.0.0");

/// Parse an Apstra version string.
///
/// Accepts a leading `v`, surrounding whitespace and missing minor/patch
/// components. Numeric components beyond the third are kept as build
/// metadata (`4.2.1.1` becomes `4.2.1+1`).
pub fn parse_version(raw: &str) -> Result<Version, semver::Error> {
    let trimmed = raw.trim();
    let trimmed = trimmed.strip_prefix('v').unwrap_or(trimmed);

    let (release, suffix) = match trimmed.find(&['-', '+'][..]) {
        Some(idx) => trimmed.split_at(idx),
        None => (trimmed, ""),
    };

    let parts: Vec<&str> = release.split('.').collect();
    let (core, extra) = if parts.len() > 3 {
        (parts[..3].to_vec(), parts[3..].join("."))
    } else {
        (parts, String::new())
    };

    let mut normalized = core.join(".");
    for _ in core.len()..3 {
        normalized.push_str(".0");
    }

    let mut version = Version::parse(&format!("{}{}", normalized, suffix))?;
    if !extra.is_empty() {
        version.build = BuildMetadata::new(&extra)?;
    }
    Ok(version)
}

/// Returns `true` when the release (ignoring prerelease/build) is listed in
/// [`SUPPORTED_API_VERSIONS`].
pub fn is_supported(version: &Version) -> bool {
    SUPPORTED_API_VERSIONS
        .iter()
        .filter_map(|s| parse_version(s).ok())
        .any(|s| {
            s.major == version.major
                && s.minor == version.minor
                && s.patch == version.patch
                && s.build == version.build
        })
}

/// Validate the version reported by an Apstra server.
///
/// An unparsable version is always an error. An unsupported version is an
/// error unless `experimental` is set, in which case it is a warning.
pub fn check_server_version(
    raw: &str,
    experimental: bool,
    diags: &mut Diagnostics,
) -> Option<Version> {
    let version = match parse_version(raw) {
        Ok(v) => v,
        Err(err) => {
            diags.add_error(
                "Failed to parse Apstra version",
                format!("Apstra reported version {:?}: {}", raw, err),
            );
            return None;
        },
    };

    if !is_supported(&version) {
        let detail = format!(
            "Apstra version {} is not supported by this provider. Supported versions: {}",
            raw,
            SUPPORTED_API_VERSIONS.join(", ")
        );
        if experimental {
            diags.add_warning("Unsupported Apstra version", detail);
        } else {
            diags.add_error(
                "Unsupported Apstra version",
                format!(
                    "{}. Set `experimental = true` (or APSTRA_EXPERIMENTAL) to continue anyway.",
                    detail
                ),
            );
            return None;
        }
    }

    Some(version)
}

fn strip_prerelease(version: &Version) -> Version {
    let mut v = version.clone();
    v.pre = Prerelease::EMPTY;
    v
}
