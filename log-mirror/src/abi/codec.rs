//! Solidity ABI word encoding and bounds-checked decoding

use crate::error::MirrorError;
use chain_clients_common::{keccak256, Bytes32, EvmAddress};
use chain_clients_evm::EvmLog;

const WORD: usize = 32;

/// Function selector: keccak256(signature)[..4]
pub fn selector(signature: &str) -> [u8; 4] {
    let hash = keccak256(signature.as_bytes());
    [hash.0[0], hash.0[1], hash.0[2], hash.0[3]]
}

/// Event topic0: keccak256(signature)
pub fn event_topic(signature: &str) -> Bytes32 {
    keccak256(signature.as_bytes())
}

// ============================================================================
// ENCODING
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    Address(EvmAddress),
    Bytes32(Bytes32),
    Uint(u128),
    Bool(bool),
    String(String),
    Bytes(Vec<u8>),
}

impl Token {
    fn is_dynamic(&self) -> bool {
        matches!(self, Token::String(_) | Token::Bytes(_))
    }

    fn static_word(&self) -> [u8; 32] {
        let mut word = [0u8; 32];
        match self {
            Token::Address(a) => word[12..].copy_from_slice(a.as_bytes()),
            Token::Bytes32(b) => word.copy_from_slice(b.as_bytes()),
            Token::Uint(v) => word[16..].copy_from_slice(&v.to_be_bytes()),
            Token::Bool(b) => word[31] = u8::from(*b),
            Token::String(_) | Token::Bytes(_) => {}
        }
        word
    }
}

fn uint_word(value: usize) -> [u8; 32] {
    Token::Uint(value as u128).static_word()
}

/// Head/tail encoding of a parameter tuple.
pub fn encode(tokens: &[Token]) -> Vec<u8> {
    let mut head = Vec::with_capacity(tokens.len() * WORD);
    let mut tail = Vec::new();

    for token in tokens {
        if token.is_dynamic() {
            head.extend_from_slice(&uint_word(tokens.len() * WORD + tail.len()));
            let data: &[u8] = match token {
                Token::String(s) => s.as_bytes(),
                Token::Bytes(b) => b,
                _ => &[],
            };
            tail.extend_from_slice(&uint_word(data.len()));
            tail.extend_from_slice(data);
            let padding = (WORD - data.len() % WORD) % WORD;
            tail.extend(std::iter::repeat(0u8).take(padding));
        } else {
            head.extend_from_slice(&token.static_word());
        }
    }

    head.extend(tail);
    head
}

/// Selector followed by the encoded arguments.
pub fn encode_call(signature: &str, tokens: &[Token]) -> Vec<u8> {
    let mut out = selector(signature).to_vec();
    out.extend(encode(tokens));
    out
}

// ============================================================================
// DECODING
// ============================================================================

/// Reads typed values out of ABI-encoded data by head index.
///
/// Every accessor validates bounds and padding; nothing is returned from a
/// word that does not have the exact shape of its declared type.
pub struct Decoder<'a> {
    data: &'a [u8],
    context: &'a str,
}

impl<'a> Decoder<'a> {
    pub fn new(data: &'a [u8], context: &'a str) -> Self {
        Self { data, context }
    }

    fn err(&self, reason: impl Into<String>) -> MirrorError {
        MirrorError::abi(self.context, reason)
    }

    fn word_at(&self, offset: usize) -> Result<&'a [u8], MirrorError> {
        offset
            .checked_add(WORD)
            .and_then(|end| self.data.get(offset..end))
            .ok_or_else(|| {
                self.err(format!(
                    "word at byte {} out of bounds (data is {} bytes)",
                    offset,
                    self.data.len()
                ))
            })
    }

    fn word(&self, index: usize) -> Result<&'a [u8], MirrorError> {
        self.word_at(index * WORD)
    }

    pub fn bytes32(&self, index: usize) -> Result<Bytes32, MirrorError> {
        let mut out = [0u8; 32];
        out.copy_from_slice(self.word(index)?);
        Ok(Bytes32(out))
    }

    pub fn address(&self, index: usize) -> Result<EvmAddress, MirrorError> {
        let word = self.bytes32(index)?;
        if word.0[..12].iter().any(|b| *b != 0) {
            return Err(self.err(format!("word {} is not a padded address", index)));
        }
        Ok(EvmAddress::from_word(&word.0))
    }

    pub fn uint(&self, index: usize) -> Result<u128, MirrorError> {
        let word = self.word(index)?;
        self.uint_from(word, index)
    }

    fn uint_from(&self, word: &[u8], index: usize) -> Result<u128, MirrorError> {
        if word[..16].iter().any(|b| *b != 0) {
            return Err(self.err(format!("uint at word {} exceeds 128 bits", index)));
        }
        let mut buf = [0u8; 16];
        buf.copy_from_slice(&word[16..]);
        Ok(u128::from_be_bytes(buf))
    }

    pub fn uint_u64(&self, index: usize) -> Result<u64, MirrorError> {
        let value = self.uint(index)?;
        u64::try_from(value).map_err(|_| self.err(format!("word {} exceeds uint64", index)))
    }

    pub fn uint_u32(&self, index: usize) -> Result<u32, MirrorError> {
        let value = self.uint(index)?;
        u32::try_from(value).map_err(|_| self.err(format!("word {} exceeds uint32", index)))
    }

    pub fn bool(&self, index: usize) -> Result<bool, MirrorError> {
        match self.uint(index)? {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(self.err(format!("word {} is not a bool ({})", index, other))),
        }
    }

    fn to_usize(&self, value: u128, what: &str, index: usize) -> Result<usize, MirrorError> {
        usize::try_from(value).map_err(|_| {
            self.err(format!(
                "{} of word {} does not fit in memory ({})",
                what, index, value
            ))
        })
    }

    pub fn bytes(&self, index: usize) -> Result<Vec<u8>, MirrorError> {
        let offset = self.to_usize(self.uint(index)?, "offset", index)?;
        let len_word = self.word_at(offset)?;
        let len = self.to_usize(self.uint_from(len_word, index)?, "length", index)?;
        let start = offset
            .checked_add(WORD)
            .ok_or_else(|| self.err(format!("offset of word {} overflows", index)))?;
        start
            .checked_add(len)
            .and_then(|end| self.data.get(start..end))
            .map(|b| b.to_vec())
            .ok_or_else(|| self.err(format!("dynamic value at word {} overruns data", index)))
    }

    pub fn string(&self, index: usize) -> Result<String, MirrorError> {
        String::from_utf8(self.bytes(index)?)
            .map_err(|_| self.err(format!("string at word {} is not UTF-8", index)))
    }
}

// ============================================================================
// EVENT HELPERS
// ============================================================================

/// True when `log`'s topic0 equals `topic`.
pub fn matches_event(log: &EvmLog, topic: &Bytes32) -> bool {
    log.topics.first() == Some(topic)
}

/// Indexed topic `index` (1-based after topic0).
pub fn indexed_topic(log: &EvmLog, index: usize, context: &str) -> Result<Bytes32, MirrorError> {
    log.topics
        .get(index)
        .copied()
        .ok_or_else(|| MirrorError::abi(context, format!("missing indexed topic {}", index)))
}

pub fn log_data(log: &EvmLog, context: &str) -> Result<Vec<u8>, MirrorError> {
    log.data_bytes()
        .map_err(|e| MirrorError::abi(context, e.to_string()))
}

/// Decodes a topic word that holds a uint into a u128.
pub fn topic_uint(word: &Bytes32, context: &str) -> Result<u128, MirrorError> {
    Decoder::new(word.as_bytes(), context).uint(0)
}

/// Decodes a topic word that holds an address.
pub fn topic_address(word: &Bytes32, context: &str) -> Result<EvmAddress, MirrorError> {
    Decoder::new(word.as_bytes(), context).address(0)
}
