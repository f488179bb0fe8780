// crates/requiem-core/src/identifiers.rs
// ============================================================================
// Module: Requiem Identifiers
// Description: Canonical opaque identifiers threaded through the runtime.
// Purpose: Provide strongly typed, serializable identifiers with stable wire
//          forms for tenants, users, requests, traces, and correlations.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! Identifiers are opaque newtypes over `String`. None of them are
//! normalized or validated beyond non-emptiness at the boundary that
//! constructs them (see [`crate::context::InvocationContext`]); the types
//! here exist to keep tenant, user, and correlation values from being
//! accidentally interchanged at call sites.

use std::fmt;

use serde::Deserialize;
use serde::Serialize;

/// Declares an opaque, string-backed identifier type.
macro_rules! opaque_id {
    ($name:ident, $doc:literal) => {
        #[doc = $doc]
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Creates a new identifier from any string-like value.
            #[must_use]
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Returns the identifier as a string slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Returns true when the identifier is the empty string.
            #[must_use]
            pub fn is_empty(&self) -> bool {
                self.0.is_empty()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self::new(value)
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self::new(value)
            }
        }
    };
}

opaque_id!(TenantId, "Tenant identifier; opaque, non-empty by invariant at context construction.");
opaque_id!(UserId, "User identifier within a tenant.");
opaque_id!(RequestId, "Request identifier stamped onto a single invocation.");
opaque_id!(TraceId, "Distributed trace identifier spanning an invocation chain.");
opaque_id!(CorrelationId, "Caller-supplied correlation identifier, opaque to the runtime.");
opaque_id!(RunId, "Run identifier for a single skill or tool execution lifecycle.");
opaque_id!(ToolName, "Registered tool name, paired with a `SemVer` for lookup.");
opaque_id!(SkillName, "Registered skill name, paired with a `SemVer` for lookup.");

#[cfg(test)]
mod tests {
    use super::TenantId;

    #[test]
    fn round_trips_through_display_and_as_str() {
        let id = TenantId::new("tenant-1");
        assert_eq!(id.as_str(), "tenant-1");
        assert_eq!(id.to_string(), "tenant-1");
    }

    #[test]
    fn empty_identifier_is_detectable() {
        assert!(TenantId::new("").is_empty());
        assert!(!TenantId::new("t1").is_empty());
    }
}
