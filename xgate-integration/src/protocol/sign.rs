use crate::error::SocketError;
use hmac::{Hmac, Mac};

/// Encodes bytes data.
pub trait Encoder {
    /// Encodes the bytes data into some `String` format.
    fn encode<Bytes>(&self, data: Bytes) -> String
    where
        Bytes: AsRef<[u8]>;
}

/// Encodes bytes data as a hex `String` using lowercase characters.
#[derive(Debug, Copy, Clone)]
pub struct HexEncoder;

impl Encoder for HexEncoder {
    fn encode<Bytes>(&self, data: Bytes) -> String
    where
        Bytes: AsRef<[u8]>,
    {
        hex::encode(data)
    }
}

/// Sign `payload` with HMAC-SHA256 keyed by `secret`, encoding the digest via the [`Encoder`].
pub fn hmac_sha256<E>(encoder: &E, secret: &str, payload: &str) -> Result<String, SocketError>
where
    E: Encoder,
{
    let mut mac = Hmac::<sha2::Sha256>::new_from_slice(secret.as_bytes())
        .map_err(|error| SocketError::Signature(error.to_string()))?;
    mac.update(payload.as_bytes());
    Ok(encoder.encode(mac.finalize().into_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hmac_sha256_hex() {
        // RFC 4231 test case 2
        let signature = hmac_sha256(&HexEncoder, "Jefe", "what do ya want for nothing?").unwrap();

        assert_eq!(
            signature,
            "5bdcc146bf60754e6a042426089575c75a003f089d2739839dec58b964ec3843"
        );
    }
}
