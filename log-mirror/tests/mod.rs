//! Test module organization
//!
//! This module re-exports test helpers for use in test files.

mod helpers;

#[allow(unused_imports)]
pub use helpers::{
    addr, build_chain_config, build_test_config, decode_raw_tx, temp_state_path, unique_key_env,
    word, ChainState, CompanyEntry, FakeChain, SentTx, TestEnv, DUMMY_AUTHOR_ADDR,
    DUMMY_HUB_CONTRACT_ADDR, DUMMY_HUB_MAILBOX_ADDR, DUMMY_SPOKE_CONTRACT_ADDR,
    DUMMY_SPOKE_MAILBOX_ADDR, DUMMY_TX_HASH, GWEI, HARDHAT_ADDR, HARDHAT_KEY, TEST_BASE_FEE,
    TEST_HUB_CHAIN_ID, TEST_HUB_DOMAIN, TEST_HUB_NAME, TEST_PRIORITY_FEE, TEST_SPOKE_CHAIN_ID,
    TEST_SPOKE_DOMAIN, TEST_SPOKE_NAME,
};
