/// Validation logic for transactions separated from type definitions
use crate::crypto::{check_signature, CanonicalHash};
use crate::error::ChainError;
use crate::transaction::types::Transaction;

impl Transaction {
    /// Stateless validation: size bound, and every input carries a signature
    /// that verifies against the transaction hash under its declared key.
    pub fn validate(&self) -> Result<(), ChainError> {
        self.validate_size()?;

        let hash = self.hash();
        for (i, input) in self.inputs.iter().enumerate() {
            let signature = input.signature.as_ref().ok_or_else(|| {
                ChainError::InvalidTransaction(format!("Input {} not signed", i))
            })?;
            check_signature(&input.public_key, &hash, signature)
                .map_err(|e| ChainError::InvalidTransaction(format!("Input {}: {}", i, e)))?;
        }
        Ok(())
    }

    /// Returns true when every input signature verifies.
    pub fn verify(&self) -> bool {
        self.validate().is_ok()
    }
}
