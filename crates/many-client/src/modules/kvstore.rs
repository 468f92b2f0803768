//! `kvstore.*` calls.

use many_identity::cbor::{self, MapBuilder, Value};
use many_identity::Address;

use super::{payload_map, ModuleError};
use crate::client::{CallOutcome, Caller};
use crate::errors::Result;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KvStoreInfo {
    /// Hex of the store's root hash.
    pub hash: String,
}

pub async fn info(caller: &Caller<'_>) -> Result<KvStoreInfo> {
    const METHOD: &str = "kvstore.info";
    let value = match caller.call(METHOD, Value::Null).await? {
        CallOutcome::Value(v) => v,
        CallOutcome::NoResult => return Err(ModuleError::MissingPayload { method: METHOD }.into()),
    };
    let map = payload_map(METHOD, &value)?;
    let hash = cbor::map_get(map, 0)
        .and_then(cbor::as_bytes)
        .map(hex::encode)
        .ok_or_else(|| ModuleError::UnexpectedPayload {
            method: METHOD,
            reason: "missing hash".into(),
        })?;
    Ok(KvStoreInfo { hash })
}

/// Value stored under `key`, if any.
pub async fn get(caller: &Caller<'_>, key: &[u8]) -> Result<Option<Vec<u8>>> {
    const METHOD: &str = "kvstore.get";
    let args = MapBuilder::new().insert(0, Value::Bytes(key.to_vec())).build();
    let value = match caller.call(METHOD, args).await? {
        CallOutcome::Value(v) => v,
        CallOutcome::NoResult => return Ok(None),
    };
    let map = payload_map(METHOD, &value)?;
    Ok(cbor::map_get(map, 0)
        .and_then(cbor::as_bytes)
        .map(<[u8]>::to_vec))
}

pub async fn put(caller: &Caller<'_>, key: &[u8], value: &[u8], owner: Option<&Address>) -> Result<()> {
    const METHOD: &str = "kvstore.put";
    let args = MapBuilder::new()
        .insert(0, Value::Bytes(key.to_vec()))
        .insert(1, Value::Bytes(value.to_vec()))
        .insert_opt(2, owner.map(Address::to_value))
        .build();
    caller.call(METHOD, args).await?;
    Ok(())
}
