//! Remote computers the authenticated user can stream.

use serde::{Deserialize, Serialize};

use super::ids::string_or_number;

/// One discoverable remote computer. Identity is `id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComputerDescriptor {
    /// The directory sends numeric ids for some accounts.
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    #[serde(rename = "computerName")]
    pub display_name: String,
    /// Streaming endpoint handed to the connect API.
    pub channel_name: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_directory_entry_and_ignores_extras() {
        let computers: Vec<ComputerDescriptor> = serde_json::from_str(
            r#"[{"id": 42, "computerName": "Home PC", "channel_name": "ch1", "online": true},
                {"id": "a7", "computerName": "Office", "channel_name": "ch2"}]"#,
        )
        .unwrap();

        assert_eq!(computers[0].id, "42");
        assert_eq!(computers[0].display_name, "Home PC");
        assert_eq!(computers[1].channel_name, "ch2");
    }
}
