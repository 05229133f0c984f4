//! EIP-1559 (type 2) transaction serialization

use crate::error::EvmError;
use crate::rlp::{encode_bytes, encode_list, encode_scalar, encode_uint};
use crate::signer::{EvmSigner, RecoverableSignature};
use chain_clients_common::{keccak256, Bytes32, EvmAddress};

const EIP1559_TX_TYPE: u8 = 0x02;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Eip1559Transaction {
    pub chain_id: u64,
    pub nonce: u64,
    pub max_priority_fee_per_gas: u128,
    pub max_fee_per_gas: u128,
    pub gas_limit: u64,
    pub to: EvmAddress,
    pub value: u128,
    pub data: Vec<u8>,
}

impl Eip1559Transaction {
    /// [chainId, nonce, maxPriorityFeePerGas, maxFeePerGas, gasLimit, to, value, data, accessList]
    fn payload_fields(&self) -> Vec<Vec<u8>> {
        vec![
            encode_uint(self.chain_id as u128),
            encode_uint(self.nonce as u128),
            encode_uint(self.max_priority_fee_per_gas),
            encode_uint(self.max_fee_per_gas),
            encode_uint(self.gas_limit as u128),
            encode_bytes(self.to.as_bytes()),
            encode_uint(self.value),
            encode_bytes(&self.data),
            encode_list(&[]),
        ]
    }

    /// keccak256(0x02 || rlp(payload))
    pub fn signing_hash(&self) -> Bytes32 {
        let mut buf = vec![EIP1559_TX_TYPE];
        buf.extend(encode_list(&self.payload_fields()));
        keccak256(&buf)
    }

    /// 0x02 || rlp(payload ++ [yParity, r, s])
    pub fn encode_signed(&self, signature: &RecoverableSignature) -> Vec<u8> {
        let mut fields = self.payload_fields();
        fields.push(encode_uint(signature.y_parity as u128));
        fields.push(encode_scalar(&signature.r));
        fields.push(encode_scalar(&signature.s));

        let mut out = vec![EIP1559_TX_TYPE];
        out.extend(encode_list(&fields));
        out
    }

    pub fn sign(&self, signer: &EvmSigner) -> Result<Vec<u8>, EvmError> {
        let signature = signer.sign_hash(&self.signing_hash())?;
        Ok(self.encode_signed(&signature))
    }
}
