//! Property-based tests for the `many` CLI

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use crate::config::{CliOverrides, Config};
    use crate::output::{OutputFormat, OutputFormatter};
    use crate::value;
    use many_identity::cbor::{self, Value};

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        // CLI flags always win over the file, and applying them twice changes nothing.
        #[test]
        fn test_overrides_take_precedence(
            port in 1u16..,
            timeout in 1u64..3600,
            deadline in proptest::option::of(1u64..3600),
        ) {
            let overrides = CliOverrides {
                server_url: Some(format!("http://localhost:{port}")),
                timeout_seconds: Some(timeout),
                poll_deadline_seconds: deadline,
                output_format: Some("json".into()),
                debug: None,
            };
            let once = Config::default().with_overrides(&overrides);
            prop_assert_eq!(&once.server.url, &format!("http://localhost:{port}"));
            prop_assert_eq!(once.server.timeout_seconds, timeout);
            prop_assert_eq!(once.poll.deadline_seconds, deadline);
            prop_assert!(once.validate().is_ok());
            prop_assert_eq!(once.clone().with_overrides(&overrides), once);
        }

        #[test]
        fn test_bytes_render_as_hex(bytes in prop::collection::vec(any::<u8>(), 0..64)) {
            let v = Value::Bytes(bytes.clone());
            prop_assert_eq!(value::to_json(&v), serde_json::Value::String(hex::encode(&bytes)));
            prop_assert_eq!(value::to_diagnostic(&v), format!("h'{}'", hex::encode(&bytes)));
        }

        #[test]
        fn test_integers_render_exactly(n in any::<i64>()) {
            prop_assert_eq!(value::to_json(&cbor::int(n)), serde_json::json!(n));
            prop_assert_eq!(value::to_diagnostic(&cbor::int(n)), n.to_string());
        }

        // JSON output is always a parseable envelope.
        #[test]
        fn test_json_output_parses(text in ".*", n in any::<u64>()) {
            let formatter = OutputFormatter::new(OutputFormat::Json, false);
            let v = Value::Array(vec![Value::Text(text.clone()), cbor::uint(n)]);
            let output = formatter.format_value(Some(&v), "call");
            let parsed: serde_json::Value = serde_json::from_str(&output).unwrap();
            prop_assert_eq!(&parsed["data"][0], &serde_json::Value::String(text));
            prop_assert_eq!(&parsed["data"][1], &serde_json::json!(n));
        }
    }
}
