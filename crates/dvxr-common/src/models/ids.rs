//! Identifier normalization for service payloads.
//!
//! The service and the login popup send ids as either JSON strings or
//! numbers. Everything downstream compares them as strings.

use serde::{Deserialize, Deserializer};

#[derive(Deserialize)]
#[serde(untagged)]
enum RawId {
    Text(String),
    Number(i64),
}

impl From<RawId> for String {
    fn from(raw: RawId) -> Self {
        match raw {
            RawId::Text(s) => s,
            RawId::Number(n) => n.to_string(),
        }
    }
}

/// `deserialize_with` for a required id.
pub fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    RawId::deserialize(deserializer).map(String::from)
}

/// `deserialize_with` for an optional id. Pair with `#[serde(default)]`.
pub fn opt_string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<RawId>::deserialize(deserializer)?.map(String::from))
}

#[cfg(test)]
mod tests {
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Deserialize)]
    struct Ids {
        #[serde(deserialize_with = "super::string_or_number")]
        id: String,
        #[serde(default, deserialize_with = "super::opt_string_or_number")]
        other: Option<String>,
    }

    #[test]
    fn numbers_and_strings_become_strings() {
        let a: Ids = serde_json::from_value(json!({ "id": 42, "other": "7" })).unwrap();
        assert_eq!(a.id, "42");
        assert_eq!(a.other.as_deref(), Some("7"));

        let b: Ids = serde_json::from_value(json!({ "id": "x", "other": 9 })).unwrap();
        assert_eq!(b.other.as_deref(), Some("9"));
    }

    #[test]
    fn missing_or_null_optional_id_is_none() {
        let a: Ids = serde_json::from_value(json!({ "id": "x" })).unwrap();
        assert!(a.other.is_none());
        let b: Ids = serde_json::from_value(json!({ "id": "x", "other": null })).unwrap();
        assert!(b.other.is_none());
    }

    #[test]
    fn other_types_are_rejected() {
        assert!(serde_json::from_value::<Ids>(json!({ "id": true })).is_err());
    }
}
