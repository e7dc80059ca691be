//! Bech32 address codec.
//!
//! External feeds refer to accounts by their human-readable bech32 form
//! (`celestia1...`) while the store keys addresses by the raw hash. This
//! module converts between the two.

use bech32::{Bech32, Hrp};
use thiserror::Error;

/// Human-readable prefix of account addresses.
pub const ACCOUNT_PREFIX: &str = "celestia";

/// Errors returned when an address string cannot be decoded.
#[derive(Debug, Error)]
pub enum AddressError {
    /// Not valid bech32 (bad charset, checksum or length).
    #[error("invalid bech32 address '{address}': {message}")]
    Malformed { address: String, message: String },

    /// Valid bech32 but with an unexpected prefix.
    #[error("unexpected address prefix '{prefix}' in '{address}'")]
    Prefix { address: String, prefix: String },
}

/// Decode a bech32 address into its prefix and raw hash.
pub fn decode(address: &str) -> Result<(String, Vec<u8>), AddressError> {
    let (hrp, hash) = bech32::decode(address).map_err(|e| AddressError::Malformed {
        address: address.to_string(),
        message: e.to_string(),
    })?;
    Ok((hrp.to_string(), hash))
}

/// Decode an account address, requiring the [`ACCOUNT_PREFIX`] prefix.
pub fn decode_account(address: &str) -> Result<Vec<u8>, AddressError> {
    let (prefix, hash) = decode(address)?;
    if prefix != ACCOUNT_PREFIX {
        return Err(AddressError::Prefix {
            address: address.to_string(),
            prefix,
        });
    }
    Ok(hash)
}

/// Encode a raw hash with the given prefix.
pub fn encode(prefix: &str, hash: &[u8]) -> Result<String, AddressError> {
    let malformed = |message: String| AddressError::Malformed {
        address: prefix.to_string(),
        message,
    };
    let hrp = Hrp::parse(prefix).map_err(|e| malformed(e.to_string()))?;
    bech32::encode::<Bech32>(hrp, hash).map_err(|e| malformed(e.to_string()))
}
