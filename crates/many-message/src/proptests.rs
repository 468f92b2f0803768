#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use many_identity::cbor::{self, Value};
    use many_identity::{AnonymousIdentity, Ed25519Identity, Identity};

    use crate::attributes::PendingToken;
    use crate::envelope::encode_request;
    use crate::many_error::ManyError;
    use crate::request::{Request, RequestOptions};
    use crate::response::{Response, ResponseResult};

    fn payload() -> impl Strategy<Value = Value> {
        prop_oneof![
            Just(Value::Null),
            any::<u64>().prop_map(cbor::uint),
            any::<i64>().prop_map(cbor::int),
            ".{0,32}".prop_map(Value::Text),
            proptest::collection::vec(any::<u8>(), 0..64).prop_map(Value::Bytes),
            (any::<i64>(), ".{0,16}")
                .prop_map(|(k, v)| Value::Map(vec![(cbor::int(k), Value::Text(v))])),
        ]
    }

    proptest! {
        #[test]
        fn test_request_round_trip(
            seed in any::<[u8; 32]>(),
            method in "[a-z]{1,12}\\.[a-zA-Z]{1,16}",
            data in payload(),
            timestamp in any::<u32>(),
            id in proptest::option::of(any::<u64>()),
        ) {
            let identity = Ed25519Identity::from_seed(&seed);
            let options = RequestOptions {
                timestamp: Some(u64::from(timestamp)),
                id,
                ..Default::default()
            };
            let req = Request::build(method, &identity, data, options);

            let bare = Request::decode(&req.to_cbor()).unwrap();
            prop_assert_eq!(&bare, &req);

            let signed = Request::decode(&encode_request(&req, &identity).unwrap()).unwrap();
            prop_assert_eq!(signed, req);
        }

        #[test]
        fn test_request_encoding_is_stable(
            data in payload(),
            nonce in proptest::collection::vec(any::<u8>(), 16),
        ) {
            let options = || RequestOptions {
                timestamp: Some(1_000),
                nonce: Some(nonce.clone()),
                ..Default::default()
            };
            let a = Request::build("status", &AnonymousIdentity, data.clone(), options());
            let b = Request::build("status", &AnonymousIdentity, data, options());
            prop_assert_eq!(a.to_cbor(), b.to_cbor());
        }

        #[test]
        fn test_response_round_trip(
            seed in any::<[u8; 32]>(),
            value in payload(),
            token in proptest::option::of(proptest::collection::vec(any::<u8>(), 1..32)),
        ) {
            let server = Ed25519Identity::from_seed(&seed);
            let mut resp = Response::ok(server.address(), value);
            if let ResponseResult::Ok { token: slot, .. } = &mut resp.result {
                *slot = token.map(PendingToken::new);
            }
            prop_assert_eq!(Response::decode(&resp.to_cbor()).unwrap(), resp.clone());
            let signed = resp.to_signed_cbor(&server).unwrap();
            prop_assert_eq!(Response::decode(&signed).unwrap(), resp);
        }

        #[test]
        fn test_render_is_total(template in ".{0,64}", field in ".{0,8}") {
            let err = ManyError::new(1, template).with_field("0", field);
            let _ = err.render();
        }

        #[test]
        fn test_render_without_braces_is_identity(template in "[^{}]{0,64}") {
            let err = ManyError::new(1, template.clone());
            prop_assert_eq!(err.render(), template);
        }
    }
}
