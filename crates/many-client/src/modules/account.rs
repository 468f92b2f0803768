//! `account.*` calls: account info, features and multisig transactions.

use std::collections::BTreeMap;
use std::fmt;

use many_identity::cbor::{self, MapBuilder, Value, TAG_EPOCH_TIME};
use many_identity::Address;
use tracing::warn;

use super::{payload_map, ModuleError};
use crate::client::{CallOutcome, Caller};
use crate::errors::Result;

/// Ledger transaction kinds that can be submitted through a multisig
/// account.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionType {
    Send,
    AccountCreate,
    AccountSetDescription,
    AccountAddRoles,
    AccountRemoveRoles,
    AccountAddFeatures,
    AccountMultisigApprove,
}

impl TransactionType {
    pub const fn name(self) -> &'static str {
        match self {
            TransactionType::Send => "send",
            TransactionType::AccountCreate => "accountCreate",
            TransactionType::AccountSetDescription => "accountSetDescription",
            TransactionType::AccountAddRoles => "accountAddRoles",
            TransactionType::AccountRemoveRoles => "accountRemoveRoles",
            TransactionType::AccountAddFeatures => "accountAddFeatures",
            TransactionType::AccountMultisigApprove => "accountMultisigApprove",
        }
    }

    /// Wire indices of the transaction kind, for the kinds this client can
    /// build.
    fn indices(self) -> Option<Value> {
        match self {
            TransactionType::Send => Some(Value::Array(vec![cbor::uint(0)])),
            _ => None,
        }
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Arguments of the multisig account feature. Absent values take the
/// server's defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MultisigArguments {
    pub threshold: Option<u64>,
    pub timeout_in_secs: Option<u64>,
    pub execute_automatically: Option<bool>,
}

impl MultisigArguments {
    fn to_value(&self) -> Value {
        MapBuilder::new()
            .insert_opt(0, self.threshold.map(cbor::uint))
            .insert_opt(1, self.timeout_in_secs.map(cbor::uint))
            .insert_opt(2, self.execute_automatically.map(Value::Bool))
            .build()
    }

    fn from_value(value: &Value) -> Self {
        let mut args = Self::default();
        for (label, value) in cbor::as_map(value).unwrap_or_default() {
            match cbor::as_i64(label) {
                Some(0) => args.threshold = cbor::as_u64(value),
                Some(1) => args.timeout_in_secs = cbor::as_u64(value),
                Some(2) => args.execute_automatically = value.as_bool(),
                other => warn!(label = ?other, "skipping unknown multisig argument"),
            }
        }
        args
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccountFeature {
    Ledger,
    Multisig(MultisigArguments),
}

impl AccountFeature {
    pub const LEDGER: i64 = 0;
    pub const MULTISIG: i64 = 1;

    pub fn label(&self) -> i64 {
        match self {
            AccountFeature::Ledger => Self::LEDGER,
            AccountFeature::Multisig(_) => Self::MULTISIG,
        }
    }

    pub fn to_value(&self) -> Value {
        match self {
            AccountFeature::Ledger => cbor::int(Self::LEDGER),
            AccountFeature::Multisig(args) => Value::Array(vec![cbor::int(Self::MULTISIG), args.to_value()]),
        }
    }

    /// A feature is either a bare label or `[label, arguments]`.
    pub fn from_value(value: &Value) -> std::result::Result<Self, ModuleError> {
        let (label, args) = match value {
            Value::Array(items) => (items.first().and_then(cbor::as_i64), items.get(1)),
            other => (cbor::as_i64(other), None),
        };
        let label = label.ok_or_else(|| ModuleError::UnexpectedPayload {
            method: "account feature",
            reason: "missing feature label".into(),
        })?;
        match label {
            Self::LEDGER => Ok(AccountFeature::Ledger),
            Self::MULTISIG => Ok(AccountFeature::Multisig(
                args.map(MultisigArguments::from_value).unwrap_or_default(),
            )),
            other => Err(ModuleError::UnimplementedFeature(other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountInfo {
    pub name: Option<String>,
    pub roles: BTreeMap<Address, Vec<String>>,
    pub features: Vec<AccountFeature>,
}

pub async fn info(caller: &Caller<'_>, account: &Address) -> Result<AccountInfo> {
    const METHOD: &str = "account.info";
    let args = MapBuilder::new().insert(0, account.to_value()).build();
    let value = match caller.call(METHOD, args).await? {
        CallOutcome::Value(v) => v,
        CallOutcome::NoResult => return Err(ModuleError::MissingPayload { method: METHOD }.into()),
    };
    let map = payload_map(METHOD, &value)?;

    let name = cbor::map_get(map, 0).and_then(cbor::as_text).map(str::to_string);

    let mut roles = BTreeMap::new();
    for (identity, list) in cbor::map_get(map, 1).and_then(cbor::as_map).unwrap_or_default() {
        let address = Address::from_value(identity).map_err(|e| ModuleError::UnexpectedPayload {
            method: METHOD,
            reason: e.to_string(),
        })?;
        let list = cbor::as_array(list)
            .unwrap_or_default()
            .iter()
            .filter_map(cbor::as_text)
            .map(str::to_string)
            .collect();
        roles.insert(address, list);
    }

    let mut features = Vec::new();
    for raw in cbor::map_get(map, 2).and_then(cbor::as_array).unwrap_or_default() {
        match AccountFeature::from_value(raw) {
            Ok(feature) => features.push(feature),
            Err(e) => warn!(error = %e, "skipping account feature"),
        }
    }

    Ok(AccountInfo { name, roles, features })
}

/// Enable features on `account`. Every entry must be a known feature.
pub async fn add_features(caller: &Caller<'_>, account: &Address, features: &[Value]) -> Result<()> {
    for feature in features {
        AccountFeature::from_value(feature)?;
    }
    let args = MapBuilder::new()
        .insert(0, account.to_value())
        .insert(2, Value::Array(features.to_vec()))
        .build();
    caller.call("account.addFeatures", args).await?;
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendParams {
    pub from: Address,
    pub to: Address,
    pub amount: u64,
    pub symbol: Address,
    pub memo: Option<String>,
}

/// Submit a transaction for multisig approval. Returns the transaction
/// token, if the server issued one.
pub async fn submit_multisig_transaction(
    caller: &Caller<'_>,
    txn_type: TransactionType,
    params: &SendParams,
) -> Result<Option<Vec<u8>>> {
    const METHOD: &str = "account.multisigSubmitTransaction";
    let indices = txn_type
        .indices()
        .ok_or_else(|| ModuleError::UnimplementedTransactionType(txn_type.to_string()))?;

    let send = MapBuilder::new()
        .insert(0, params.from.to_value())
        .insert(1, params.to.to_value())
        .insert(2, cbor::uint(params.amount))
        .insert(3, params.symbol.to_value())
        .build();
    let transaction = MapBuilder::new().insert(0, indices).insert(1, send).build();
    let args = MapBuilder::new()
        .insert(0, params.from.to_value())
        .insert_opt(1, params.memo.clone().map(Value::Text))
        .insert(2, transaction)
        .build();

    let value = match caller.call(METHOD, args).await? {
        CallOutcome::Value(v) => v,
        CallOutcome::NoResult => return Ok(None),
    };
    let map = payload_map(METHOD, &value)?;
    Ok(cbor::map_get(map, 0)
        .and_then(cbor::as_bytes)
        .map(<[u8]>::to_vec))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Approver {
    pub address: Address,
    pub approved: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MultisigTransactionInfo {
    pub memo: Option<String>,
    /// Transaction as submitted, undecoded.
    pub transaction: Option<Value>,
    pub submitter: Address,
    pub approvers: Vec<Approver>,
    pub threshold: u64,
    pub execute_automatically: bool,
    /// Expiry, seconds since the Unix epoch.
    pub timeout: Option<u64>,
    pub data: Option<Value>,
}

pub async fn multisig_info(caller: &Caller<'_>, token: &[u8]) -> Result<Option<MultisigTransactionInfo>> {
    const METHOD: &str = "account.multisigInfo";
    let args = MapBuilder::new().insert(0, Value::Bytes(token.to_vec())).build();
    let value = match caller.call(METHOD, args).await? {
        CallOutcome::Value(v) => v,
        CallOutcome::NoResult => return Ok(None),
    };
    let map = payload_map(METHOD, &value)?;
    let unexpected = |reason: String| ModuleError::UnexpectedPayload { method: METHOD, reason };

    let submitter = cbor::map_get(map, 2)
        .ok_or_else(|| unexpected("missing submitter".into()))
        .and_then(|v| Address::from_value(v).map_err(|e| unexpected(e.to_string())))?;

    let mut approvers = Vec::new();
    for entry in cbor::map_get(map, 3).and_then(cbor::as_array).unwrap_or_default() {
        let (identity, state) = match cbor::as_array(entry) {
            Some([identity, state, ..]) => (identity, state),
            _ => return Err(unexpected("malformed approver".into()).into()),
        };
        let address = Address::from_value(identity).map_err(|e| unexpected(e.to_string()))?;
        let approved = cbor::as_map(state)
            .and_then(|m| cbor::map_get(m, 0))
            .and_then(Value::as_bool)
            .unwrap_or(false);
        approvers.push(Approver { address, approved });
    }

    let timeout = cbor::map_get(map, 6)
        .map(|v| cbor::untag(v, TAG_EPOCH_TIME).unwrap_or(v))
        .and_then(cbor::as_u64);

    Ok(Some(MultisigTransactionInfo {
        memo: cbor::map_get(map, 0).and_then(cbor::as_text).map(str::to_string),
        transaction: cbor::map_get(map, 1).cloned(),
        submitter,
        approvers,
        threshold: cbor::map_get(map, 4).and_then(cbor::as_u64).unwrap_or(0),
        execute_automatically: cbor::map_get(map, 5)
            .and_then(Value::as_bool)
            .unwrap_or(false),
        timeout,
        data: cbor::map_get(map, 7).cloned(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use many_identity::{Ed25519Identity, Identity};
    use many_message::Response;

    use crate::errors::ClientError;
    use crate::testing::MockTransport;
    use crate::Client;

    fn addr(seed: u8) -> Address {
        Ed25519Identity::from_seed(&[seed; 32]).address()
    }

    fn send_params() -> SendParams {
        SendParams {
            from: addr(1),
            to: addr(2),
            amount: 100,
            symbol: addr(3),
            memo: Some("rent".into()),
        }
    }

    #[tokio::test]
    async fn test_info_decodes_roles_and_features() {
        let mock = Arc::new(MockTransport::new());
        let payload = MapBuilder::new()
            .insert(0, Value::Text("shared".into()))
            .insert(
                1,
                Value::Map(vec![(
                    addr(1).to_value(),
                    Value::Array(vec![Value::Text("owner".into())]),
                )]),
            )
            .insert(
                2,
                Value::Array(vec![
                    cbor::int(0),
                    Value::Array(vec![
                        cbor::int(1),
                        MapBuilder::new().insert(0, cbor::uint(2)).build(),
                    ]),
                    cbor::int(99),
                ]),
            )
            .build();
        mock.push_response(&Response::ok(addr(9), payload));
        let client = Client::from_arc(mock.clone());
        let id = Ed25519Identity::generate();

        let info = info(&client.as_identity(&id), &addr(5)).await.unwrap();
        assert_eq!(info.name.as_deref(), Some("shared"));
        assert_eq!(info.roles.get(&addr(1)), Some(&vec!["owner".to_string()]));
        assert_eq!(
            info.features,
            vec![
                AccountFeature::Ledger,
                AccountFeature::Multisig(MultisigArguments {
                    threshold: Some(2),
                    ..Default::default()
                }),
            ]
        );

        let sent = &mock.sent_requests()[0];
        assert_eq!(sent.method, "account.info");
        let args = cbor::as_map(&sent.data).unwrap();
        assert_eq!(Address::from_value(cbor::map_get(args, 0).unwrap()).unwrap(), addr(5));
    }

    #[tokio::test]
    async fn test_unimplemented_transaction_type_is_local() {
        let mock = Arc::new(MockTransport::new());
        let client = Client::from_arc(mock.clone());
        let id = Ed25519Identity::generate();

        let err = submit_multisig_transaction(&client.as_identity(&id), TransactionType::AccountCreate, &send_params())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ClientError::Module(ModuleError::UnimplementedTransactionType(ref t)) if t == "accountCreate"
        ));
        assert!(mock.sent().is_empty());
    }

    #[tokio::test]
    async fn test_submit_send() {
        let mock = Arc::new(MockTransport::new());
        let payload = MapBuilder::new().insert(0, Value::Bytes(vec![7, 7])).build();
        mock.push_response(&Response::ok(addr(9), payload));
        let client = Client::from_arc(mock.clone());
        let id = Ed25519Identity::from_seed(&[1u8; 32]);

        let token = submit_multisig_transaction(&client.as_identity(&id), TransactionType::Send, &send_params())
            .await
            .unwrap();
        assert_eq!(token, Some(vec![7, 7]));

        let sent = &mock.sent_requests()[0];
        let args = cbor::as_map(&sent.data).unwrap();
        assert_eq!(cbor::map_get(args, 1).and_then(cbor::as_text), Some("rent"));
        let txn = cbor::map_get(args, 2).and_then(cbor::as_map).unwrap();
        assert_eq!(cbor::map_get(txn, 0), Some(&Value::Array(vec![cbor::uint(0)])));
        let send = cbor::map_get(txn, 1).and_then(cbor::as_map).unwrap();
        assert_eq!(cbor::map_get(send, 2).and_then(cbor::as_u64), Some(100));
    }

    #[tokio::test]
    async fn test_unknown_feature_is_local() {
        let mock = Arc::new(MockTransport::new());
        let client = Client::from_arc(mock.clone());
        let id = Ed25519Identity::generate();

        let err = add_features(&client.as_identity(&id), &addr(4), &[cbor::int(0), cbor::int(42)])
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ClientError::Module(ModuleError::UnimplementedFeature(42))
        ));
        assert!(mock.sent().is_empty());
    }

    #[tokio::test]
    async fn test_multisig_info() {
        let mock = Arc::new(MockTransport::new());
        let payload = MapBuilder::new()
            .insert(0, Value::Text("memo".into()))
            .insert(2, addr(1).to_value())
            .insert(
                3,
                Value::Array(vec![Value::Array(vec![
                    addr(2).to_value(),
                    MapBuilder::new().insert(0, Value::Bool(true)).build(),
                ])]),
            )
            .insert(4, cbor::uint(2))
            .insert(5, Value::Bool(false))
            .insert(6, Value::Tag(TAG_EPOCH_TIME, Box::new(cbor::uint(1_700_000_000))))
            .build();
        mock.push_response(&Response::ok(addr(9), payload));
        let client = Client::from_arc(mock);
        let id = Ed25519Identity::generate();

        let info = multisig_info(&client.as_identity(&id), &[1, 2])
            .await
            .unwrap()
            .unwrap();
        assert_eq!(info.memo.as_deref(), Some("memo"));
        assert_eq!(info.submitter, addr(1));
        assert_eq!(
            info.approvers,
            vec![Approver {
                address: addr(2),
                approved: true
            }]
        );
        assert_eq!(info.threshold, 2);
        assert!(!info.execute_automatically);
        assert_eq!(info.timeout, Some(1_700_000_000));
    }

    #[test]
    fn test_feature_values() {
        let multisig = AccountFeature::Multisig(MultisigArguments {
            threshold: Some(3),
            timeout_in_secs: Some(60),
            execute_automatically: Some(true),
        });
        assert_eq!(AccountFeature::from_value(&multisig.to_value()).unwrap(), multisig);
        assert_eq!(AccountFeature::Ledger.label(), 0);
        assert_eq!(multisig.label(), 1);
    }
}
