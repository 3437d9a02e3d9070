use anyhow::Result;
use openssl::pkey::PKey;
use openssl::rsa::Rsa;

/// Generates a 2048-bit RSA key pair for signing session tokens.
///
/// Returns `(public_key, private_key)`, both PEM encoded. The private key uses
/// PKCS#8, which is what `jsonwebtoken` expects for `EncodingKey::from_rsa_pem`.
pub fn generate_rsa_keys() -> Result<(Vec<u8>, Vec<u8>)> {
    let rsa = Rsa::generate(2048)?;
    let pkey = PKey::from_rsa(rsa)?;

    let private_key = pkey.private_key_to_pem_pkcs8()?;
    let public_key = pkey.public_key_to_pem()?;

    Ok((public_key, private_key))
}
