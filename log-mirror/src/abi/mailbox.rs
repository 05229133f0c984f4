//! Mailbox (dispatch-and-deliver transport) ABI

use super::codec::{encode_call, Token};
use chain_clients_common::Bytes32;

pub const QUOTE_DISPATCH: &str = "quoteDispatch(uint32,bytes32,bytes)";
pub const DELIVERED: &str = "delivered(bytes32)";

pub fn encode_quote_dispatch(destination_domain: u32, recipient: &Bytes32, body: &[u8]) -> Vec<u8> {
    encode_call(
        QUOTE_DISPATCH,
        &[
            Token::Uint(destination_domain as u128),
            Token::Bytes32(*recipient),
            Token::Bytes(body.to_vec()),
        ],
    )
}

pub fn encode_delivered(message_id: &Bytes32) -> Vec<u8> {
    encode_call(DELIVERED, &[Token::Bytes32(*message_id)])
}
