//! Requested-spec descriptors and `name@range` parsing.
//!
//! A requested spec records how a package was asked for: an exact version
//! (`1.2.3`) or a range (`^1.0.0`, `>=2`, `1.x`). When two requesters both
//! resolve to the same installed node the node's spec widens: the raw
//! literals are concatenated with a space and the kind becomes a range.
//! A widened literal is satisfied only when every whitespace-separated part
//! is satisfied, so widening never loosens what an installed version must
//! honor.

use semver::{Version, VersionReq};
use serde::{Deserialize, Serialize};

/// How a version was requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SpecKind {
    /// An exact version literal, e.g. `1.2.3`.
    ExactVersion,
    /// A range literal, e.g. `^1.0.0` or `1.x`.
    Range,
}

/// The originally-requested range or version for a package.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestedSpec {
    pub kind: SpecKind,
    /// The literal as requested. May hold several space-joined parts after
    /// widening.
    pub raw: String,
}

impl RequestedSpec {
    /// Classify a raw version-or-range literal. An empty literal means
    /// "any version".
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        if Version::parse(raw).is_ok() {
            RequestedSpec {
                kind: SpecKind::ExactVersion,
                raw: raw.to_string(),
            }
        } else {
            RequestedSpec {
                kind: SpecKind::Range,
                raw: if raw.is_empty() {
                    "*".to_string()
                } else {
                    raw.to_string()
                },
            }
        }
    }

    /// An exact-version spec for an already-installed version.
    pub fn exact(version: &Version) -> Self {
        RequestedSpec {
            kind: SpecKind::ExactVersion,
            raw: version.to_string(),
        }
    }

    /// Whether `version` satisfies this spec.
    ///
    /// Each whitespace-separated part must be satisfied independently.
    /// Parts that fail to parse as a range satisfy nothing.
    pub fn satisfied_by(&self, version: &Version) -> bool {
        self.raw.split_whitespace().all(|part| {
            if let Ok(exact) = Version::parse(part) {
                exact == *version
            } else {
                VersionReq::parse(part)
                    .map(|req| req.matches(version))
                    .unwrap_or(false)
            }
        })
    }

    /// Widen this spec to also cover `other`'s request.
    ///
    /// Identical raw literals are left alone; anything else concatenates and
    /// demotes the kind to a range. The result is monotonically narrower in
    /// what it accepts, never wider.
    pub fn widen(&mut self, other: &RequestedSpec) {
        if self.raw == other.raw {
            return;
        }
        self.raw.push(' ');
        self.raw.push_str(&other.raw);
        self.kind = SpecKind::Range;
    }
}

impl std::fmt::Display for RequestedSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.raw)
    }
}

/// A parsed `name@rangeOrVersion` literal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencySpec {
    pub name: String,
    pub requested: RequestedSpec,
}

impl DependencySpec {
    pub fn new(name: impl Into<String>, range: &str) -> Self {
        DependencySpec {
            name: name.into(),
            requested: RequestedSpec::parse(range),
        }
    }

    /// Parse a literal like `lodash@^4.0.0` or `@scope/pkg@1.2.3`.
    ///
    /// A bare name requests any version. Scoped names keep their leading
    /// `@`; only an `@` past position zero splits name from range.
    pub fn parse(literal: &str) -> Result<Self, crate::error::ResolveError> {
        let literal = literal.trim();
        if literal.is_empty() {
            return Err(crate::error::ResolveError::InvalidSpec {
                spec: literal.to_string(),
                reason: "empty specifier".to_string(),
            });
        }
        let split_at = literal[1..].find('@').map(|ix| ix + 1);
        let (name, range) = match split_at {
            Some(ix) => (&literal[..ix], &literal[ix + 1..]),
            None => (literal, ""),
        };
        if name.is_empty() {
            return Err(crate::error::ResolveError::InvalidSpec {
                spec: literal.to_string(),
                reason: "missing package name".to_string(),
            });
        }
        Ok(DependencySpec::new(name, range))
    }
}

impl std::fmt::Display for DependencySpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}", self.name, self.requested.raw)
    }
}
