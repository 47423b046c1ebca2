use base58::{FromBase58, ToBase58};
use x25519_dalek::{PublicKey, StaticSecret};

/// Fixed X25519 key pairs shared by the integration tests.
pub struct KeyPairSet {
    pub alice_public: [u8; 32],
    pub alice_private: [u8; 32],
    pub bobs_public: [u8; 32],
    pub bobs_private: [u8; 32],
    pub mediators_public: [u8; 32],
    pub mediators_private: [u8; 32],
}

impl KeyPairSet {
    pub fn alice_verkey(&self) -> String {
        self.alice_public.to_base58()
    }

    pub fn bobs_verkey(&self) -> String {
        self.bobs_public.to_base58()
    }

    pub fn mediators_verkey(&self) -> String {
        self.mediators_public.to_base58()
    }
}

fn key_pair(encoded_private: &str) -> ([u8; 32], [u8; 32]) {
    let bytes = encoded_private.from_base58().unwrap();
    let mut private = [0u8; 32];
    private.copy_from_slice(&bytes[..32]);
    let secret = StaticSecret::from(private);
    (PublicKey::from(&secret).to_bytes(), secret.to_bytes())
}

pub fn get_keypair_set() -> KeyPairSet {
    let (alice_public, alice_private) = key_pair("6QN8DfuN9hjgHgPvLXqgzqYE3jRRGRrmJQZkd5tL8paR");
    let (bobs_public, bobs_private) = key_pair("HBTcN2MrXNRj9xF9oi8QqYyuEPv3JLLjQKuEgW9oxVKP");
    let (mediators_public, mediators_private) = key_pair("ACa4PPJ1LnPNq1iwS33V3Akh7WtnC71WkKFZ9ccM6sX2");

    KeyPairSet {
        alice_public,
        alice_private,
        bobs_public,
        bobs_private,
        mediators_public,
        mediators_private,
    }
}
