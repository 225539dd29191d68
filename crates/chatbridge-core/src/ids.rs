//! Identifier utilities (C1).
//!
//! Every entity ID is an opaque string carrying a type prefix (`j_`, `psm_`,
//! `a_`, `org_`, `itg_`, ...) followed by a ULID. The prefix makes IDs
//! self-describing in logs; the ULID body keeps them lexically sortable by
//! creation time, which the queue drainer relies on implicitly since
//! `createdAt` ordering and ID ordering agree.

use ulid::Ulid;

use crate::error::{Error, Result};

macro_rules! prefixed_id {
    ($name:ident, $prefix:literal) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub const PREFIX: &'static str = $prefix;

            /// Generate a new, time-ordered identifier.
            pub fn new() -> Self {
                Self(format!("{}{}", $prefix, Ulid::new()))
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Parse and validate an identifier carrying this type's prefix.
            pub fn parse(raw: &str) -> Result<Self> {
                let body = raw.strip_prefix($prefix).ok_or_else(|| {
                    Error::Validation(format!(
                        "expected id with prefix '{}', got '{}'",
                        $prefix, raw
                    ))
                })?;
                Ulid::from_string(body).map_err(|e| {
                    Error::Validation(format!("invalid ULID in id '{}': {}", raw, e))
                })?;
                Ok(Self(raw.to_string()))
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> String {
                id.0
            }
        }

        impl sqlx::Type<sqlx::Sqlite> for $name {
            fn type_info() -> <sqlx::Sqlite as sqlx::Database>::TypeInfo {
                <String as sqlx::Type<sqlx::Sqlite>>::type_info()
            }
        }

        impl<'r> sqlx::Decode<'r, sqlx::Sqlite> for $name {
            fn decode(
                value: <sqlx::Sqlite as sqlx::database::HasValueRef<'r>>::ValueRef,
            ) -> std::result::Result<Self, sqlx::error::BoxDynError> {
                let raw = <String as sqlx::Decode<sqlx::Sqlite>>::decode(value)?;
                Ok(Self(raw))
            }
        }

        impl<'q> sqlx::Encode<'q, sqlx::Sqlite> for $name {
            fn encode_by_ref(
                &self,
                buf: &mut Vec<sqlx::sqlite::SqliteArgumentValue<'q>>,
            ) -> sqlx::encode::IsNull {
                <String as sqlx::Encode<sqlx::Sqlite>>::encode_by_ref(&self.0, buf)
            }
        }
    };
}

prefixed_id!(OrgId, "org_");
prefixed_id!(IntegrationId, "itg_");
prefixed_id!(JobId, "j_");
prefixed_id!(ProcessedMessageId, "psm_");
prefixed_id!(AgentId, "a_");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_display_and_parse() {
        let id = JobId::new();
        let parsed = JobId::parse(&id.to_string()).unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn rejects_wrong_prefix() {
        let agent_id = AgentId::new();
        assert!(JobId::parse(&agent_id.to_string()).is_err());
    }

    #[test]
    fn rejects_malformed_ulid_body() {
        assert!(JobId::parse("j_not-a-ulid").is_err());
    }

    #[test]
    fn new_ids_sort_by_creation_order() {
        let a = JobId::new();
        std::thread::sleep(std::time::Duration::from_millis(2));
        let b = JobId::new();
        assert!(a < b);
    }
}
