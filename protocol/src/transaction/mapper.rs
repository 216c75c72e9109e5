//! Clause list → operation list.
//!
//! Each clause yields, in order of precedence:
//!
//! 1. a token `Transfer` pair (debit origin, credit recipient) when its data
//!    is a `transfer(address,uint256)` call to a resolvable token with a
//!    non-zero amount. The credit is dropped when the recipient word does
//!    not hold an address;
//! 2. a native `Transfer` pair when it moves VET. Contract creation has no
//!    credit side;
//! 3. a single `ContractCall` when it carries data or a destination;
//! 4. nothing.
//!
//! A positive gas amount adds one trailing `Fee` (or `FeeDelegation`)
//! operation debiting the origin. Indexes are contiguous from 0, and the
//! first error aborts the mapping with no partial output.

use primitive_types::U256;
use tracing::debug;

use super::abi::decode_transfer;
use super::clause::ClauseLike;
use super::currency::CurrencyResolver;
use super::types::{
    encode_hex_bytes, Amount, Operation, OperationStatus, OperationType, FEE_DELEGATOR_ACCOUNT,
};
use crate::address::Address;
use crate::client::types::ApiTransaction;
use crate::config::{vet_currency, vtho_currency};
use crate::error::{MeshError, Result};

/// Metadata key holding a `ContractCall` destination.
pub const CONTRACT_CALL_TO: &str = "to";
/// Metadata key holding `ContractCall` calldata.
pub const CONTRACT_CALL_DATA: &str = "data";
/// Metadata key holding the gas of a fee operation.
pub const FEE_GAS: &str = "gas";

/// What a clause list contains, computed in one pass before mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ClauseAnalysis {
    /// Some clause moves VET or looks like a token transfer.
    pub has_value_transfer: bool,
    /// Some clause carries calldata or deployment code.
    pub has_contract_interaction: bool,
    /// Gas is declared, so a fee operation follows the clause operations.
    pub has_fee: bool,
}

pub fn analyze_clauses<C: ClauseLike>(clauses: &[C], gas: u64) -> Result<ClauseAnalysis> {
    let mut analysis = ClauseAnalysis {
        has_fee: gas > 0,
        ..Default::default()
    };
    for clause in clauses {
        let value = clause.value()?;
        let data = clause.data()?;
        clause.to()?;
        if !value.is_zero() || decode_transfer(&data).is_some() {
            analysis.has_value_transfer = true;
        }
        if !data.is_empty() {
            analysis.has_contract_interaction = true;
        }
    }
    Ok(analysis)
}

/// Maps clauses to operations.
///
/// `status` is copied onto every operation unchanged.
pub async fn map_clauses<C: ClauseLike + Sync>(
    resolver: &dyn CurrencyResolver,
    clauses: &[C],
    origin: &Address,
    delegator: Option<&Address>,
    gas: u64,
    status: Option<OperationStatus>,
) -> Result<Vec<Operation>> {
    let analysis = analyze_clauses(clauses, gas)?;
    debug!(
        clauses = clauses.len(),
        value_transfer = analysis.has_value_transfer,
        contract_interaction = analysis.has_contract_interaction,
        fee = analysis.has_fee,
        "mapping clauses"
    );

    let mut ops: Vec<Operation> = Vec::with_capacity(clauses.len() * 2 + 1);

    for clause in clauses {
        let to = clause.to()?;
        let value = clause.value()?;
        let data = clause.data()?;

        if let (Some(contract), Some(transfer)) = (to, decode_transfer(&data)) {
            if !transfer.amount.is_zero() {
                if let Some(currency) = resolver.resolve(&contract).await? {
                    push(
                        &mut ops,
                        OperationType::Transfer,
                        status,
                        origin,
                        Amount::debit(transfer.amount, currency.clone()),
                    );
                    if let Some(recipient) = transfer.recipient {
                        push(
                            &mut ops,
                            OperationType::Transfer,
                            status,
                            &recipient,
                            Amount::credit(transfer.amount, currency),
                        );
                    }
                    continue;
                }
            }
        }

        if !value.is_zero() {
            push(
                &mut ops,
                OperationType::Transfer,
                status,
                origin,
                Amount::debit(value, vet_currency()),
            );
            if let Some(to) = to {
                push(
                    &mut ops,
                    OperationType::Transfer,
                    status,
                    &to,
                    Amount::credit(value, vet_currency()),
                );
            }
            continue;
        }

        let has_destination = to.map_or(false, |a| !a.is_zero());
        if !data.is_empty() || has_destination {
            let mut op = Operation::new(
                ops.len(),
                OperationType::ContractCall,
                status,
                origin,
                Amount::credit(U256::zero(), vet_currency()),
            )
            .with_metadata(CONTRACT_CALL_DATA, encode_hex_bytes(&data));
            if let Some(to) = to {
                op = op.with_metadata(CONTRACT_CALL_TO, to.to_string());
            }
            ops.push(op);
        }
    }

    if analysis.has_fee {
        let op_type = if delegator.is_some() {
            OperationType::FeeDelegation
        } else {
            OperationType::Fee
        };
        let mut fee = Operation::new(
            ops.len(),
            op_type,
            status,
            origin,
            Amount::debit(U256::from(gas), vtho_currency()),
        )
        .with_metadata(FEE_GAS, gas.to_string());
        if let Some(delegator) = delegator {
            fee = fee.with_metadata(FEE_DELEGATOR_ACCOUNT, delegator.to_string());
        }
        ops.push(fee);
    }

    Ok(ops)
}

fn push(
    ops: &mut Vec<Operation>,
    op_type: OperationType,
    status: Option<OperationStatus>,
    account: &Address,
    amount: Amount,
) {
    let index = ops.len();
    ops.push(Operation::new(index, op_type, status, account, amount));
}

/// Maps a transaction as rendered by the node (mempool or block) through
/// the same rules.
pub async fn operations_for_api_transaction(
    resolver: &dyn CurrencyResolver,
    tx: &ApiTransaction,
    status: Option<OperationStatus>,
) -> Result<Vec<Operation>> {
    let origin: Address = tx.origin.parse()?;
    let delegator = match tx.delegator.as_deref() {
        None | Some("") => None,
        Some(d) => Some(d.parse::<Address>()?),
    };
    map_clauses(
        resolver,
        &tx.clauses,
        &origin,
        delegator.as_ref(),
        tx.gas,
        status,
    )
    .await
    .map_err(|e| match e {
        MeshError::InvalidValue(msg) => {
            MeshError::InvalidValue(format!("transaction {}: {}", tx.id, msg))
        }
        other => other,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::types::ApiClause;
    use crate::config::vtho_contract;
    use crate::transaction::abi::encode_transfer;
    use crate::transaction::clause::Clause;
    use crate::transaction::currency::TokenRegistry;
    use crate::transaction::types::Currency;

    fn origin() -> Address {
        Address::from_bytes([0x0a; 20])
    }

    fn recipient() -> Address {
        Address::from_bytes([0x0b; 20])
    }

    fn one_vet() -> U256 {
        U256::exp10(18)
    }

    fn registry() -> TokenRegistry {
        TokenRegistry::new(vec![])
    }

    async fn map(
        clauses: &[Clause],
        delegator: Option<&Address>,
        gas: u64,
    ) -> Result<Vec<Operation>> {
        map_clauses(&registry(), clauses, &origin(), delegator, gas, None).await
    }

    fn net(ops: &[Operation]) -> (U256, U256) {
        let mut debit = U256::zero();
        let mut credit = U256::zero();
        for op in ops {
            let (neg, mag) = op.amount.signed_value().unwrap();
            if neg {
                debit += mag;
            } else {
                credit += mag;
            }
        }
        (debit, credit)
    }

    #[tokio::test]
    async fn native_transfer_without_gas() {
        let ops = map(&[Clause::transfer(recipient(), one_vet())], None, 0)
            .await
            .unwrap();
        assert_eq!(ops.len(), 2);
        assert_eq!(ops[0].op_type, OperationType::Transfer);
        assert_eq!(ops[0].account.address, origin().to_string());
        assert_eq!(ops[0].amount.value, "-1000000000000000000");
        assert_eq!(ops[0].amount.currency, vet_currency());
        assert_eq!(ops[1].account.address, recipient().to_string());
        assert_eq!(ops[1].amount.value, "1000000000000000000");
        let (d, c) = net(&ops);
        assert_eq!(d, c);
    }

    #[tokio::test]
    async fn native_transfer_with_fee() {
        let ops = map(&[Clause::transfer(recipient(), one_vet())], None, 21_000)
            .await
            .unwrap();
        assert_eq!(ops.len(), 3);
        let fee = &ops[2];
        assert_eq!(fee.op_type, OperationType::Fee);
        assert_eq!(fee.index(), 2);
        assert_eq!(fee.amount.value, "-21000");
        assert_eq!(fee.amount.currency, vtho_currency());
        assert_eq!(fee.metadata_str(FEE_GAS), Some("21000"));
        assert!(fee.metadata.get(FEE_DELEGATOR_ACCOUNT).is_none());
    }

    #[tokio::test]
    async fn delegated_fee_still_debits_origin() {
        let delegator = Address::from_bytes([0x0d; 20]);
        let ops = map(
            &[Clause::transfer(recipient(), one_vet())],
            Some(&delegator),
            21_000,
        )
        .await
        .unwrap();
        assert_eq!(ops.len(), 3);
        let fee = &ops[2];
        assert_eq!(fee.op_type, OperationType::FeeDelegation);
        assert_eq!(fee.account.address, origin().to_string());
        assert_eq!(
            fee.metadata_str(FEE_DELEGATOR_ACCOUNT),
            Some(delegator.to_string().as_str())
        );
    }

    #[tokio::test]
    async fn deployment_is_contract_call() {
        let ops = map(&[Clause::new(None, U256::zero(), vec![0x60, 0x80])], None, 0)
            .await
            .unwrap();
        assert_eq!(ops.len(), 1);
        assert_eq!(ops[0].op_type, OperationType::ContractCall);
        assert_eq!(ops[0].amount.value, "0");
        assert_eq!(ops[0].metadata_str(CONTRACT_CALL_DATA), Some("0x6080"));
        assert!(ops[0].metadata.get(CONTRACT_CALL_TO).is_none());
    }

    #[tokio::test]
    async fn token_transfer_uses_token_currency() {
        let amount = U256::from(5_000u64);
        let clause = Clause::new(
            Some(vtho_contract()),
            U256::zero(),
            encode_transfer(&recipient(), &amount),
        );
        let ops = map(&[clause], None, 0).await.unwrap();
        assert_eq!(ops.len(), 2);
        assert!(ops.iter().all(|o| o.amount.currency == vtho_currency()));
        assert_eq!(ops[0].amount.value, "-5000");
        assert_eq!(ops[1].account.address, recipient().to_string());
        let (d, c) = net(&ops);
        assert_eq!(d, c);
    }

    #[tokio::test]
    async fn unknown_token_contract_is_contract_call() {
        let clause = Clause::new(
            Some(Address::from_bytes([0xee; 20])),
            U256::zero(),
            encode_transfer(&recipient(), &U256::one()),
        );
        let ops = map(&[clause], None, 0).await.unwrap();
        assert_eq!(ops.len(), 1);
        assert_eq!(ops[0].op_type, OperationType::ContractCall);
    }

    #[tokio::test]
    async fn zero_amount_token_transfer_is_contract_call() {
        let clause = Clause::new(
            Some(vtho_contract()),
            U256::zero(),
            encode_transfer(&recipient(), &U256::zero()),
        );
        let ops = map(&[clause], None, 0).await.unwrap();
        assert_eq!(ops.len(), 1);
        assert_eq!(ops[0].op_type, OperationType::ContractCall);
    }

    #[tokio::test]
    async fn bad_recipient_word_emits_debit_only() {
        let mut data = encode_transfer(&recipient(), &U256::from(9u64));
        data[4] = 0x01;
        let ops = map(&[Clause::new(Some(vtho_contract()), U256::zero(), data)], None, 0)
            .await
            .unwrap();
        assert_eq!(ops.len(), 1);
        assert!(ops[0].amount.is_negative());
    }

    #[tokio::test]
    async fn noop_clause_produces_nothing() {
        let ops = map(&[Clause::new(None, U256::zero(), vec![])], None, 0)
            .await
            .unwrap();
        assert!(ops.is_empty());
    }

    #[tokio::test]
    async fn indexes_are_contiguous_across_clauses() {
        let clauses = vec![
            Clause::transfer(recipient(), one_vet()),
            Clause::new(Some(recipient()), U256::zero(), vec![0x01]),
            Clause::transfer(origin(), U256::one()),
        ];
        let ops = map(&clauses, None, 50_000).await.unwrap();
        assert_eq!(ops.len(), 6);
        for (i, op) in ops.iter().enumerate() {
            assert_eq!(op.index(), i as i64);
        }
    }

    #[tokio::test]
    async fn status_is_copied_verbatim() {
        let ops = map_clauses(
            &registry(),
            &[Clause::transfer(recipient(), one_vet())],
            &origin(),
            None,
            21_000,
            Some(OperationStatus::Reverted),
        )
        .await
        .unwrap();
        assert!(ops
            .iter()
            .all(|o| o.status == Some(OperationStatus::Reverted)));
    }

    #[tokio::test]
    async fn mapping_is_deterministic() {
        let clauses = vec![
            Clause::transfer(recipient(), one_vet()),
            Clause::new(None, U256::zero(), vec![0x60]),
        ];
        let a = map(&clauses, None, 30_000).await.unwrap();
        let b = map(&clauses, None, 30_000).await.unwrap();
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn malformed_api_clause_aborts_everything() {
        let clauses = vec![
            ApiClause {
                to: Some(recipient().to_string()),
                value: "0x10".into(),
                data: "0x".into(),
            },
            ApiClause {
                to: None,
                value: "not_a_number".into(),
                data: "0x".into(),
            },
        ];
        let res = map_clauses(&registry(), &clauses, &origin(), None, 0, None).await;
        assert!(res.is_err());
    }

    #[tokio::test]
    async fn api_transaction_mapping() {
        let tx = ApiTransaction {
            id: format!("0x{}", "11".repeat(32)),
            chain_tag: 0x27,
            block_ref: "0x0000000000000000".into(),
            expiration: 720,
            clauses: vec![ApiClause {
                to: Some(recipient().to_string()),
                value: "0xde0b6b3a7640000".into(),
                data: "0x".into(),
            }],
            gas_price_coef: Some(0),
            max_fee_per_gas: None,
            max_priority_fee_per_gas: None,
            gas: 21_000,
            origin: origin().to_string(),
            delegator: Some(Address::from_bytes([0x0d; 20]).to_string()),
            nonce: "0x1".into(),
            depends_on: None,
        };
        let ops = operations_for_api_transaction(&registry(), &tx, Some(OperationStatus::Pending))
            .await
            .unwrap();
        assert_eq!(ops.len(), 3);
        assert_eq!(ops[2].op_type, OperationType::FeeDelegation);
        assert_eq!(ops[0].status, Some(OperationStatus::Pending));
    }

    #[tokio::test]
    async fn custom_token_resolved_through_registry() {
        let contract = Address::from_bytes([0xaa; 20]);
        let registry = TokenRegistry::new(vec![Currency::token("OCE", 18, &contract)]);
        let clause = Clause::new(
            Some(contract),
            U256::zero(),
            encode_transfer(&recipient(), &U256::from(77u64)),
        );
        let ops = map_clauses(&registry, &[clause], &origin(), None, 0, None)
            .await
            .unwrap();
        assert_eq!(ops[0].amount.currency.symbol, "OCE");
    }
}
