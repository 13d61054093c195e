use anyhow::{Context, Result};
use ethers::signers::LocalWallet;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};

/// Create wallet from private key (with or without 0x)
///
/// # Errors
/// Returns error if private key format is invalid
pub fn create_wallet_from_private_key(private_key: &str) -> Result<LocalWallet> {
    let key = private_key.strip_prefix("0x").unwrap_or(private_key);

    LocalWallet::from_str(key).context("Failed to create wallet from private key")
}

/// Signing identity for live orders.
pub struct WalletConfig {
    /// Master account address (42-character hex with 0x prefix)
    pub account_address: String,
    pub wallet: LocalWallet,
    nonce: AtomicU64,
}

impl WalletConfig {
    /// # Errors
    /// Returns error if the address or key is malformed.
    pub fn new(account_address: &str, api_wallet_private_key: &str) -> Result<Self> {
        if !account_address.starts_with("0x") || account_address.len() != 42 {
            anyhow::bail!("Invalid account address format: must be 0x-prefixed 42-char hex");
        }
        let wallet = create_wallet_from_private_key(api_wallet_private_key)?;
        Ok(Self {
            account_address: account_address.to_string(),
            wallet,
            nonce: AtomicU64::new(0),
        })
    }

    /// Load wallet from environment variables
    ///
    /// Expected env vars:
    /// - `HYPERLIQUID_ACCOUNT_ADDRESS`: Master account address
    /// - `HYPERLIQUID_API_WALLET_KEY`: API wallet private key
    ///
    /// # Errors
    /// Returns error if environment variables are missing or invalid format
    pub fn from_env() -> Result<Self> {
        let account_address = std::env::var("HYPERLIQUID_ACCOUNT_ADDRESS")
            .context("Missing HYPERLIQUID_ACCOUNT_ADDRESS env var")?;
        let api_wallet_private_key = std::env::var("HYPERLIQUID_API_WALLET_KEY")
            .context("Missing HYPERLIQUID_API_WALLET_KEY env var")?;

        Self::new(&account_address, &api_wallet_private_key)
    }

    /// Millisecond timestamp nonce, strictly increasing even within one millisecond.
    pub fn next_nonce(&self) -> u64 {
        let now = u64::try_from(chrono::Utc::now().timestamp_millis()).unwrap_or(0);
        let mut current = self.nonce.load(Ordering::SeqCst);
        loop {
            let next = now.max(current + 1);
            match self
                .nonce
                .compare_exchange(current, next, Ordering::SeqCst, Ordering::SeqCst)
            {
                Ok(_) => return next,
                Err(observed) => current = observed,
            }
        }
    }
}

impl std::fmt::Debug for WalletConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WalletConfig")
            .field("account_address", &self.account_address)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: &str = "0123456789abcdef0123456789abcdef0123456789abcdef0123456789abcdef";

    #[test]
    fn test_key_with_or_without_prefix() {
        let a = create_wallet_from_private_key(KEY).unwrap();
        let b = create_wallet_from_private_key(&format!("0x{KEY}")).unwrap();
        assert_eq!(ethers::signers::Signer::address(&a), ethers::signers::Signer::address(&b));
        assert!(create_wallet_from_private_key("not-a-key").is_err());
    }

    #[test]
    fn test_rejects_short_address() {
        assert!(WalletConfig::new("0x1234", KEY).is_err());
    }

    #[test]
    fn test_nonces_strictly_increase() {
        let config =
            WalletConfig::new("0x0000000000000000000000000000000000000001", KEY).unwrap();
        let mut last = 0;
        for _ in 0..100 {
            let n = config.next_nonce();
            assert!(n > last);
            last = n;
        }
    }

    #[test]
    fn test_debug_hides_key() {
        let config =
            WalletConfig::new("0x0000000000000000000000000000000000000001", KEY).unwrap();
        assert!(!format!("{config:?}").contains("0123456789abcdef0123"));
    }
}
