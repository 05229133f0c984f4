//! Signer Addresses
//!
//! Reads the log-mirror configuration and prints the admin address derived
//! from each chain's private key environment variable.
//!
//! ## Usage
//!
//! ```bash
//! LOG_MIRROR_CONFIG_PATH=config/log-mirror.toml \
//!   cargo run --bin signer_addresses
//! ```

use anyhow::Result;
use chain_clients_evm::EvmSigner;
use log_mirror::config::Config;

fn main() -> Result<()> {
    let config = Config::load()?;

    println!("Admin addresses derived from configured keys:");
    println!();
    for chain in config.chains() {
        match chain.get_private_key() {
            Ok(key) => {
                let signer = EvmSigner::from_hex(&key)?;
                println!("{} ({}): {}", chain.name, chain.private_key_env, signer.address());
            }
            Err(_) => println!("{} ({}): not set", chain.name, chain.private_key_env),
        }
    }
    println!();
    println!("Fund each address on its chain before running wire or push commands.");

    Ok(())
}
