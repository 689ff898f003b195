//! Credential material: key generation for a fresh session and partial updates.

use crate::types::Jid;
use ed25519_dalek::{Signer, SigningKey};
use rand::{Rng, RngCore};
use serde::{Deserialize, Serialize};
use x25519_dalek::{PublicKey, StaticSecret};

/// A 32-byte public/private key pair.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyPair {
    #[serde(with = "crate::b64::key32")]
    pub public: [u8; 32],
    #[serde(with = "crate::b64::key32")]
    pub private: [u8; 32],
}

impl KeyPair {
    /// Fresh X25519 key pair.
    pub fn generate_x25519() -> Self {
        let mut private = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut private);
        let secret = StaticSecret::from(private);
        Self {
            public: PublicKey::from(&secret).to_bytes(),
            private: secret.to_bytes(),
        }
    }

    /// Fresh Ed25519 key pair (used as the signed identity key).
    pub fn generate_ed25519() -> Self {
        let signing = SigningKey::generate(&mut rand::thread_rng());
        Self {
            public: signing.verifying_key().to_bytes(),
            private: signing.to_bytes(),
        }
    }
}

/// Pre-key signed by the identity key.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignedKeyPair {
    pub key_pair: KeyPair,
    #[serde(with = "crate::b64::sig64")]
    pub signature: [u8; 64],
    pub key_id: u32,
}

impl SignedKeyPair {
    fn generate(identity: &KeyPair, key_id: u32) -> Self {
        let key_pair = KeyPair::generate_x25519();
        let signing = SigningKey::from_bytes(&identity.private);
        let signature = signing.sign(&key_pair.public).to_bytes();
        Self {
            key_pair,
            signature,
            key_id,
        }
    }

    /// Whether `signature` was produced by `identity` over this pre-key.
    pub fn verify(&self, identity: &KeyPair) -> bool {
        let Ok(verifying) = ed25519_dalek::VerifyingKey::from_bytes(&identity.public) else {
            return false;
        };
        let sig = ed25519_dalek::Signature::from_bytes(&self.signature);
        verifying.verify_strict(&self.key_pair.public, &sig).is_ok()
    }
}

/// Session credentials. Opaque to the bridge apart from `me` and `registered`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthCreds {
    pub noise_key: KeyPair,
    pub signed_identity_key: KeyPair,
    pub signed_pre_key: SignedKeyPair,
    pub registration_id: u16,
    #[serde(with = "crate::b64::key32")]
    pub adv_secret_key: [u8; 32],
    #[serde(default)]
    pub next_pre_key_id: u32,
    #[serde(default)]
    pub first_unuploaded_pre_key_id: u32,
    /// Own JID once paired.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub me: Option<Jid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub push_name: Option<String>,
    #[serde(default)]
    pub registered: bool,
}

impl AuthCreds {
    /// Fresh, unpaired credentials.
    pub fn generate() -> Self {
        let noise_key = KeyPair::generate_x25519();
        let signed_identity_key = KeyPair::generate_ed25519();
        let signed_pre_key = SignedKeyPair::generate(&signed_identity_key, 1);
        let mut adv_secret_key = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut adv_secret_key);
        Self {
            noise_key,
            signed_identity_key,
            signed_pre_key,
            registration_id: rand::thread_rng().gen::<u16>() & 16383,
            adv_secret_key,
            next_pre_key_id: 1,
            first_unuploaded_pre_key_id: 1,
            me: None,
            platform: None,
            push_name: None,
            registered: false,
        }
    }

    /// Merge a partial update emitted by the client.
    pub fn apply(&mut self, update: &CredsUpdate) {
        if let Some(me) = &update.me {
            self.me = Some(me.clone());
        }
        if let Some(platform) = &update.platform {
            self.platform = Some(platform.clone());
        }
        if let Some(push_name) = &update.push_name {
            self.push_name = Some(push_name.clone());
        }
        if let Some(registered) = update.registered {
            self.registered = registered;
        }
        if let Some(id) = update.next_pre_key_id {
            self.next_pre_key_id = id;
        }
        if let Some(id) = update.first_unuploaded_pre_key_id {
            self.first_unuploaded_pre_key_id = id;
        }
    }

    /// QR payload for pairing: `ref,noiseKey,identityKey,advSecret` (base64 keys).
    pub fn qr_payload(&self, reference: &str) -> String {
        format!(
            "{},{},{},{}",
            reference,
            crate::b64::encode(&self.noise_key.public),
            crate::b64::encode(&self.signed_identity_key.public),
            crate::b64::encode(&self.adv_secret_key)
        )
    }
}

/// Partial credential update carried by `creds.update`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CredsUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub me: Option<Jid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub push_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registered: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_pre_key_id: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_unuploaded_pre_key_id: Option<u32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generate_produces_unpaired_creds_with_valid_prekey_signature() {
        let creds = AuthCreds::generate();
        assert!(!creds.registered);
        assert!(creds.me.is_none());
        assert!(creds.registration_id <= 16383);
        assert!(creds.signed_pre_key.verify(&creds.signed_identity_key));
        assert_ne!(creds.noise_key.public, [0u8; 32]);
    }

    #[test]
    fn tampered_prekey_signature_fails() {
        let mut creds = AuthCreds::generate();
        creds.signed_pre_key.signature[0] ^= 0xff;
        assert!(!creds.signed_pre_key.verify(&creds.signed_identity_key));
    }

    #[test]
    fn apply_only_touches_present_fields() {
        let mut creds = AuthCreds::generate();
        let before = creds.clone();
        creds.apply(&CredsUpdate {
            me: Some(Jid::new("5511", "s.whatsapp.net")),
            registered: Some(true),
            ..Default::default()
        });
        assert_eq!(creds.me.as_ref().map(|j| j.user.as_str()), Some("5511"));
        assert!(creds.registered);
        assert_eq!(creds.noise_key, before.noise_key);
        assert_eq!(creds.platform, None);
    }

    #[test]
    fn qr_payload_has_four_parts() {
        let creds = AuthCreds::generate();
        let qr = creds.qr_payload("2@abc");
        let parts: Vec<_> = qr.split(',').collect();
        assert_eq!(parts.len(), 4);
        assert_eq!(parts[0], "2@abc");
    }
}
