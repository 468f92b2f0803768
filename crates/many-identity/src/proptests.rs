#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use crate::address::Address;
    use crate::cose::CoseKey;
    use crate::identity::{verify, Ed25519Identity, Identity};

    proptest! {
        #[test]
        fn test_identity_signature_round_trip(
            seed in any::<[u8; 32]>(),
            message in any::<Vec<u8>>()
        ) {
            let identity = Ed25519Identity::from_seed(&seed);
            let sig = identity.sign_bytes(&message);
            prop_assert!(verify(&message, &sig, &identity.public_key_bytes()));
        }

        #[test]
        fn test_tampered_message_fails(
            seed in any::<[u8; 32]>(),
            message in proptest::collection::vec(any::<u8>(), 1..256),
            index in any::<prop::sample::Index>()
        ) {
            let identity = Ed25519Identity::from_seed(&seed);
            let sig = identity.sign_bytes(&message);

            let mut tampered = message.clone();
            let i = index.index(tampered.len());
            tampered[i] ^= 0x01;
            prop_assert!(!verify(&tampered, &sig, &identity.public_key_bytes()));
        }

        #[test]
        fn test_seed_determines_address(seed in any::<[u8; 32]>()) {
            let a = Ed25519Identity::from_seed(&seed);
            let b = Ed25519Identity::from_seed(&seed);
            prop_assert_eq!(a.address(), b.address());
        }

        #[test]
        fn test_address_text_round_trip(x in any::<[u8; 32]>()) {
            let addr = Address::from_public_key(&CoseKey::ed25519(x));
            let parsed: Address = addr.to_string().parse().unwrap();
            prop_assert_eq!(parsed, addr);
        }
    }
}
