//! Direct-transport (OApp) quote and send

use super::codec::{encode_call, Decoder, Token};
use crate::error::MirrorError;

pub const QUOTE: &str = "quote(uint32,bytes,bytes,bool)";
pub const SEND: &str = "send(uint32,bytes,bytes)";

/// `(nativeFee, lzTokenFee)` returned by `quote`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransportFee {
    pub native_fee: u128,
    pub token_fee: u128,
}

pub fn encode_quote(destination_domain: u32, payload: &[u8], options: &[u8]) -> Vec<u8> {
    encode_call(
        QUOTE,
        &[
            Token::Uint(destination_domain as u128),
            Token::Bytes(payload.to_vec()),
            Token::Bytes(options.to_vec()),
            Token::Bool(false),
        ],
    )
}

pub fn decode_quote(data: &[u8]) -> Result<TransportFee, MirrorError> {
    let d = Decoder::new(data, QUOTE);
    Ok(TransportFee {
        native_fee: d.uint(0)?,
        token_fee: d.uint(1)?,
    })
}

pub fn encode_send(destination_domain: u32, payload: &[u8], options: &[u8]) -> Vec<u8> {
    encode_call(
        SEND,
        &[
            Token::Uint(destination_domain as u128),
            Token::Bytes(payload.to_vec()),
            Token::Bytes(options.to_vec()),
        ],
    )
}
