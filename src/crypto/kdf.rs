use std::convert::TryFrom;

use sha2::{Digest, Sha256};

use crate::Error;

/// Concatenation key derivation function (NIST SP 800-56A, single step, SHA-256).
///
/// `OtherInfo` is built the JOSE way: `AlgorithmID || PartyUInfo || PartyVInfo ||
/// SuppPubInfo`, every info field length prefixed and `SuppPubInfo` set to the
/// derived key length in bits.
///
/// # Arguments
///
/// * `secret` - shared secret `Z`
///
/// * `alg` - algorithm identifier the key is derived for
///
/// * `producer_info` - optional `apu`
///
/// * `consumer_info` - optional `apv`
///
/// * `key_len` - length of the derived key in bytes
pub fn concat_kdf(
    secret: &[u8],
    alg: &str,
    producer_info: Option<&[u8]>,
    consumer_info: Option<&[u8]>,
    key_len: usize,
) -> Result<Vec<u8>, Error> {
    let mut value = get_length_and_input(alg.as_bytes())?;
    value.extend(get_length_and_input(producer_info.unwrap_or_default())?);
    value.extend(get_length_and_input(consumer_info.unwrap_or_default())?);
    let key_bits = u32::try_from(key_len * 8).map_err(|err| Error::Generic(err.to_string()))?;
    value.extend(key_bits.to_be_bytes());

    let mut derived = Vec::with_capacity(key_len);
    let mut round: u32 = 1;
    while derived.len() < key_len {
        let mut hasher = Sha256::new();
        hasher.update(round.to_be_bytes());
        hasher.update(secret);
        hasher.update(&value);
        derived.extend(hasher.finalize());
        round += 1;
    }
    derived.truncate(key_len);

    Ok(derived)
}

/// Combines length of array and its its length into a vector.
fn get_length_and_input(vector: &[u8]) -> Result<Vec<u8>, Error> {
    let mut collected: Vec<u8> = u32::try_from(vector.len())
        .map_err(|err| Error::Generic(err.to_string()))?
        .to_be_bytes()
        .to_vec();
    collected.extend(vector);
    Ok(collected)
}

#[cfg(test)]
mod tests {
    use super::*;

    // RFC 7518 appendix C, ECDH-ES key agreement example.
    #[test]
    fn derives_rfc7518_example_key() -> Result<(), Error> {
        let z: [u8; 32] = [
            158, 86, 217, 29, 129, 113, 53, 211, 114, 131, 66, 131, 191, 132, 38, 156, 251, 49,
            110, 163, 218, 128, 106, 72, 246, 218, 167, 121, 140, 254, 144, 196,
        ];
        let key = concat_kdf(&z, "A128GCM", Some(&b"Alice"[..]), Some(&b"Bob"[..]), 16)?;
        assert_eq!(
            key,
            vec![86, 170, 141, 234, 248, 35, 109, 32, 92, 34, 40, 205, 113, 167, 16, 26]
        );
        Ok(())
    }

    #[test]
    fn longer_keys_span_several_rounds() -> Result<(), Error> {
        let short = concat_kdf(b"secret", "ECDH-ES+A256KW", None, None, 32)?;
        let long = concat_kdf(b"secret", "ECDH-ES+A256KW", None, None, 48)?;
        assert_eq!(long.len(), 48);
        // bits are part of OtherInfo, so prefixes differ
        assert_ne!(&long[..32], &short[..]);
        Ok(())
    }
}
