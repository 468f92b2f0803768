use sha3::{Digest, Sha3_224};

pub fn sha3_224(data: &[u8]) -> [u8; 28] {
    let mut h = Sha3_224::new();
    h.update(data);
    let out = h.finalize();
    let mut arr = [0u8; 28];
    arr.copy_from_slice(&out);
    arr
}

/// Public key address derivation: id = sha3_224(cose_key_bytes).
pub fn derive_key_id(cose_key_bytes: &[u8]) -> [u8; 28] {
    sha3_224(cose_key_bytes)
}
