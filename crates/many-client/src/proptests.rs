//! Property-based tests for many-client

#[cfg(test)]
mod tests {
    use proptest::prelude::*;
    use std::time::Duration;

    use crate::poller::{AsyncStatus, PollConfig, StatusReply};
    use many_identity::cbor::{self, MapBuilder, Value};

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        // Pauses never shrink and never exceed the cap.
        #[test]
        fn test_delays_are_monotonic_and_capped(
            initial_ms in 1u64..10_000,
            multiplier in 1.0f64..4.0,
            cap_ms in proptest::option::of(1u64..120_000),
        ) {
            let config = PollConfig {
                initial_delay: Duration::from_millis(initial_ms),
                multiplier,
                max_delay: cap_ms.map(Duration::from_millis),
                deadline: None,
            };
            let mut previous = Duration::ZERO;
            for attempt in 0..40 {
                let delay = config.delay_for(attempt);
                prop_assert!(delay >= previous);
                if let Some(cap) = config.max_delay {
                    prop_assert!(delay <= cap);
                }
                previous = delay;
            }
        }

        #[test]
        fn test_default_delays_follow_one_and_a_half(attempt in 0u32..20) {
            let expected = 0.5 * 1.5f64.powi(attempt as i32);
            let actual = PollConfig::default().delay_for(attempt).as_secs_f64();
            prop_assert!((actual - expected).abs() < 1e-6);
        }

        #[test]
        fn test_status_codes(code in any::<u64>()) {
            let payload = MapBuilder::new().insert(0, cbor::uint(code)).build();
            match AsyncStatus::from_code(code) {
                Some(status) => {
                    prop_assert_eq!(status.code(), code);
                    let reply = StatusReply::from_value(&payload).unwrap();
                    prop_assert_eq!(reply.status, status);
                    prop_assert!(reply.value.is_none());
                }
                None => {
                    prop_assert!(code > 4);
                    prop_assert!(matches!(
                        StatusReply::from_value(&payload),
                        Err(crate::ClientError::UnknownStatus(c)) if c == i128::from(code)
                    ));
                }
            }
        }

        #[test]
        fn test_status_reply_keeps_value(code in 0u64..5, bytes in prop::collection::vec(any::<u8>(), 0..32)) {
            let Some(status) = AsyncStatus::from_code(code) else {
                return Err(TestCaseError::fail("codes 0-4 are defined"));
            };
            let reply = StatusReply { status, value: Some(Value::Bytes(bytes)) };
            prop_assert_eq!(StatusReply::from_value(&reply.to_value()).unwrap(), reply);
        }
    }
}
