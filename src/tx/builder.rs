//! Transfer construction and signing

use super::fees::FeeParams;
use crate::error::{PingPongError, PingPongResult};

use ethers::prelude::*;
use ethers::signers::LocalWallet;
use ethers::types::transaction::eip2718::TypedTransaction;
use ethers::utils::keccak256;

/// Fully determined transfer, ready to sign
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferRequest {
    pub from: Address,
    pub to: Address,
    /// Amount in wei
    pub value: U256,
    pub nonce: u64,
    pub chain_id: u64,
    pub gas_limit: U256,
    pub fees: FeeParams,
}

/// Signed transfer bytes plus the fields logged on submission
#[derive(Debug, Clone)]
pub struct SignedTransfer {
    pub raw: Bytes,
    pub tx_hash: H256,
    pub from: Address,
    pub to: Address,
    pub nonce: u64,
    pub gas_limit: U256,
}

impl TransferRequest {
    /// Typed transaction for this request; the envelope follows the fee regime
    pub fn to_typed_transaction(&self) -> TypedTransaction {
        match self.fees {
            FeeParams::Eip1559 {
                max_fee_per_gas,
                max_priority_fee_per_gas,
            } => Eip1559TransactionRequest::new()
                .from(self.from)
                .to(self.to)
                .value(self.value)
                .nonce(self.nonce)
                .gas(self.gas_limit)
                .max_fee_per_gas(max_fee_per_gas)
                .max_priority_fee_per_gas(max_priority_fee_per_gas)
                .chain_id(self.chain_id)
                .into(),
            FeeParams::Legacy { gas_price } => TransactionRequest::new()
                .from(self.from)
                .to(self.to)
                .value(self.value)
                .nonce(self.nonce)
                .gas(self.gas_limit)
                .gas_price(gas_price)
                .chain_id(self.chain_id)
                .into(),
        }
    }

    /// Sign with `wallet`, which must hold the key for `from`
    pub fn sign(&self, wallet: &LocalWallet) -> PingPongResult<SignedTransfer> {
        if wallet.address() != self.from {
            return Err(PingPongError::Wallet(format!(
                "Signer {:?} does not match sender {:?}",
                wallet.address(),
                self.from
            )));
        }

        let tx = self.to_typed_transaction();
        let signature = wallet
            .sign_transaction_sync(&tx)
            .map_err(|e| PingPongError::Wallet(e.to_string()))?;
        let raw = tx.rlp_signed(&signature);
        let tx_hash = H256::from(keccak256(&raw));

        Ok(SignedTransfer {
            raw,
            tx_hash,
            from: self.from,
            to: self.to,
            nonce: self.nonce,
            gas_limit: self.gas_limit,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY_A: &str = "ac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
    const KEY_B: &str = "59c6995e998f97a5a0044966f0945389dc9e86dae88c7a8412f4603b6b78690d";

    fn request(fees: FeeParams) -> TransferRequest {
        let wallet_a: LocalWallet = KEY_A.parse().unwrap();
        let wallet_b: LocalWallet = KEY_B.parse().unwrap();
        TransferRequest {
            from: wallet_a.address(),
            to: wallet_b.address(),
            value: U256::from(10_000_000_000_000_000u64),
            nonce: 7,
            chain_id: 31337,
            gas_limit: U256::from(23_100u64),
            fees,
        }
    }

    fn dynamic() -> FeeParams {
        FeeParams::Eip1559 {
            max_fee_per_gas: U256::from(260),
            max_priority_fee_per_gas: U256::from(10),
        }
    }

    #[test]
    fn test_eip1559_fields() {
        let req = request(dynamic());
        let tx = req.to_typed_transaction();

        match &tx {
            TypedTransaction::Eip1559(inner) => {
                assert_eq!(inner.max_fee_per_gas, Some(U256::from(260)));
                assert_eq!(inner.max_priority_fee_per_gas, Some(U256::from(10)));
            }
            other => panic!("expected EIP-1559 envelope, got {:?}", other),
        }
        assert_eq!(tx.nonce(), Some(&U256::from(7)));
        assert_eq!(tx.gas(), Some(&U256::from(23_100u64)));
        assert_eq!(tx.value(), Some(&req.value));
        assert_eq!(tx.to_addr(), Some(&req.to));
        assert_eq!(tx.chain_id(), Some(U64::from(31337)));
    }

    #[test]
    fn test_legacy_fields() {
        let tx = request(FeeParams::Legacy {
            gas_price: U256::from(5_000_000_000u64),
        })
        .to_typed_transaction();

        assert!(matches!(tx, TypedTransaction::Legacy(_)));
        assert_eq!(tx.gas_price(), Some(U256::from(5_000_000_000u64)));
    }

    #[test]
    fn test_signature_recovers_sender() {
        let wallet: LocalWallet = KEY_A.parse().unwrap();
        let req = request(dynamic());
        let signed = req.sign(&wallet).unwrap();

        let tx = req.to_typed_transaction();
        let signature = wallet.sign_transaction_sync(&tx).unwrap();
        assert!(signature.verify(tx.sighash(), wallet.address()).is_ok());

        // Type-2 envelope
        assert_eq!(signed.raw[0], 0x02);
        assert_eq!(signed.tx_hash, H256::from(keccak256(&signed.raw)));
        assert_eq!(signed.nonce, 7);
        assert_eq!(signed.from, wallet.address());
    }

    #[test]
    fn test_signing_is_deterministic() {
        let wallet: LocalWallet = KEY_A.parse().unwrap();
        let first = request(dynamic()).sign(&wallet).unwrap();
        let second = request(dynamic()).sign(&wallet).unwrap();
        assert_eq!(first.raw, second.raw);
        assert_eq!(first.tx_hash, second.tx_hash);

        let mut bumped = request(dynamic());
        bumped.nonce += 1;
        assert_ne!(bumped.sign(&wallet).unwrap().tx_hash, first.tx_hash);
    }

    #[test]
    fn test_wrong_signer_rejected() {
        let wallet_b: LocalWallet = KEY_B.parse().unwrap();
        let err = request(dynamic()).sign(&wallet_b).unwrap_err();
        assert!(matches!(err, PingPongError::Wallet(_)));
    }
}
