use alloy::network::EthereumWallet;
use alloy::providers::{Provider, ProviderBuilder};
use alloy::signers::local::PrivateKeySigner;
use eyre::{Result, WrapErr};
use url::Url;

/// Read-only HTTP provider with the default fillers
pub fn http_provider(url: Url) -> impl Provider + Clone {
    ProviderBuilder::new().on_http(url)
}

/// HTTP provider that signs with `private_key`
///
/// # Errors
/// * If the key is not a valid hex secp256k1 key
pub fn signing_provider(url: Url, private_key: &str) -> Result<impl Provider + Clone> {
    let signer: PrivateKeySigner = private_key
        .trim()
        .parse()
        .wrap_err("FLASHROUTE_PRIVATE_KEY is not a valid private key")?;
    Ok(ProviderBuilder::new()
        .wallet(EthereumWallet::from(signer))
        .on_http(url))
}
