use std::fmt::{Display, Formatter};

use cryptoxide::chacha20poly1305::ChaCha20Poly1305;
use data_encoding::{BASE64, HEXLOWER};
use hmac::{Hmac, Mac};
use rand::Rng;
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use crate::error::{Error, Result};

pub type HmacSha256 = Hmac<Sha256>;

/// Length in bytes of the key used to encrypt voter names.
pub const NAME_KEY_LENGTH: usize = 32;

const NONCE_LENGTH: usize = 12;
const TAG_LENGTH: usize = 16;
const NAME_AAD: &[u8] = b"voter-name";

/// Strip the separators people commonly type into a national ID.
pub fn sanitize_national_id(national_id: &str) -> String {
    national_id.replace(['-', ' '], "").trim().to_string()
}

/// A voter as presented for registration. This carries sensitive data and
/// is never stored directly; see [`VoterRecord`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Voter {
    pub first_name: String,
    pub last_name: String,
    pub national_id: String,
}

impl Voter {
    pub fn new(
        first_name: impl Into<String>,
        last_name: impl Into<String>,
        national_id: impl Into<String>,
    ) -> Self {
        Self {
            first_name: first_name.into(),
            last_name: last_name.into(),
            national_id: national_id.into(),
        }
    }
}

/// A name encrypted with the server's name key. Each encryption uses a
/// fresh nonce, so equal names do not produce equal ciphertexts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedName {
    pub nonce: String,
    pub ciphertext: String,
    pub tag: String,
}

/// A registered voter, as stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoterRecord {
    /// Voter unique ID: the HMAC of their sanitised national ID.
    pub national_id: String,
    pub first_name: EncryptedName,
    pub last_name: EncryptedName,
    pub voted: bool,
    pub fraud_committed: bool,
}

/// The registration state of a voter, from the registry's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VoterStatus {
    NotRegistered,
    RegisteredNotVoted,
    BallotCounted,
    FraudCommitted,
}

impl VoterStatus {
    pub fn of(record: Option<&VoterRecord>) -> Self {
        match record {
            None => Self::NotRegistered,
            Some(voter) if voter.fraud_committed => Self::FraudCommitted,
            Some(voter) if voter.voted => Self::BallotCounted,
            Some(_) => Self::RegisteredNotVoted,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotRegistered => "not registered",
            Self::RegisteredNotVoted => "registered, but no ballot received",
            Self::BallotCounted => "ballot counted",
            Self::FraudCommitted => "fraud committed",
        }
    }
}

impl Display for VoterStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Secrets used to keep voter data out of the store in plaintext.
pub struct VoterKeys {
    hmac_secret: Vec<u8>,
    name_key: [u8; NAME_KEY_LENGTH],
}

impl VoterKeys {
    pub fn new(hmac_secret: impl Into<Vec<u8>>, name_key: [u8; NAME_KEY_LENGTH]) -> Self {
        Self {
            hmac_secret: hmac_secret.into(),
            name_key,
        }
    }

    /// Generate a random name key.
    pub fn random_name_key() -> [u8; NAME_KEY_LENGTH] {
        let mut key = [0_u8; NAME_KEY_LENGTH];
        rand::thread_rng().fill(&mut key);
        key
    }

    /// Minimise a national ID to a stable, unique, irreversible identifier.
    pub fn obfuscate_national_id(&self, national_id: &str) -> String {
        let mut hmac = HmacSha256::new_from_slice(&self.hmac_secret)
            .expect("HMAC can take key of any size");
        hmac.update(sanitize_national_id(national_id).as_bytes());
        HEXLOWER.encode(&hmac.finalize().into_bytes())
    }

    pub fn encrypt_name(&self, name: &str) -> EncryptedName {
        let mut nonce = [0_u8; NONCE_LENGTH];
        rand::thread_rng().fill(&mut nonce);

        let plaintext = name.as_bytes();
        let mut ciphertext = vec![0_u8; plaintext.len()];
        let mut tag = [0_u8; TAG_LENGTH];
        let mut cipher = ChaCha20Poly1305::new(&self.name_key, &nonce, NAME_AAD);
        cipher.encrypt(plaintext, &mut ciphertext, &mut tag);

        EncryptedName {
            nonce: BASE64.encode(&nonce),
            ciphertext: BASE64.encode(&ciphertext),
            tag: BASE64.encode(&tag),
        }
    }

    pub fn decrypt_name(&self, name: &EncryptedName) -> Result<String> {
        let decode = |field: &str| {
            BASE64
                .decode(field.as_bytes())
                .map_err(|e| Error::NameDecryption(e.to_string()))
        };
        let nonce = decode(&name.nonce)?;
        let ciphertext = decode(&name.ciphertext)?;
        let tag = decode(&name.tag)?;
        if nonce.len() != NONCE_LENGTH || tag.len() != TAG_LENGTH {
            return Err(Error::NameDecryption("malformed nonce or tag".to_string()));
        }

        let mut plaintext = vec![0_u8; ciphertext.len()];
        let mut cipher = ChaCha20Poly1305::new(&self.name_key, &nonce, NAME_AAD);
        if !cipher.decrypt(&ciphertext, &mut plaintext, &tag) {
            return Err(Error::NameDecryption(
                "authentication tag mismatch".to_string(),
            ));
        }
        String::from_utf8(plaintext).map_err(|e| Error::NameDecryption(e.to_string()))
    }

    /// Build the storable form of a newly registered voter.
    pub fn record_for(&self, voter: &Voter) -> VoterRecord {
        VoterRecord {
            national_id: self.obfuscate_national_id(&voter.national_id),
            first_name: self.encrypt_name(voter.first_name.trim()),
            last_name: self.encrypt_name(voter.last_name.trim()),
            voted: false,
            fraud_committed: false,
        }
    }
}

/// Example data for tests.
#[cfg(test)]
mod examples {
    use super::*;

    impl Voter {
        pub fn example() -> Self {
            Self::new("Adam", "Smith", "111111111")
        }

        pub fn example2() -> Self {
            Self::new("Thien", "Huynh", "222222222")
        }
    }

    impl VoterKeys {
        pub fn example() -> Self {
            Self::new("test-hmac-secret", [7; NAME_KEY_LENGTH])
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitization() {
        assert_eq!(sanitize_national_id("111-11-1111"), "111111111");
        assert_eq!(sanitize_national_id(" 111 11 1111 "), "111111111");
        assert_eq!(sanitize_national_id("abc"), "abc");
    }

    #[test]
    fn obfuscation_is_stable_and_sanitised() {
        let keys = VoterKeys::example();
        let plain = keys.obfuscate_national_id("111111111");
        assert_eq!(plain, keys.obfuscate_national_id("111-11-1111"));
        assert_ne!(plain, keys.obfuscate_national_id("222222222"));
        assert_eq!(plain.len(), 64);
        assert!(!plain.contains("111111111"));

        // A different secret gives a different identifier.
        let other = VoterKeys::new("another-secret", [7; NAME_KEY_LENGTH]);
        assert_ne!(plain, other.obfuscate_national_id("111111111"));
    }

    #[test]
    fn name_encryption() {
        let keys = VoterKeys::example();
        let first = keys.encrypt_name("Adam");
        let second = keys.encrypt_name("Adam");
        assert_ne!(first, second);
        assert_eq!(keys.decrypt_name(&first).unwrap(), "Adam");
        assert_eq!(keys.decrypt_name(&second).unwrap(), "Adam");

        // The wrong key cannot read it.
        let wrong = VoterKeys::new("test-hmac-secret", [8; NAME_KEY_LENGTH]);
        assert!(matches!(
            wrong.decrypt_name(&first),
            Err(Error::NameDecryption(_))
        ));

        // Tampering is detected.
        let mut tampered = first.clone();
        tampered.tag = BASE64.encode(&[0; TAG_LENGTH]);
        assert!(keys.decrypt_name(&tampered).is_err());
        tampered.nonce = "not base64!".to_string();
        assert!(keys.decrypt_name(&tampered).is_err());
    }

    #[test]
    fn status_priority() {
        let keys = VoterKeys::example();
        let mut record = keys.record_for(&Voter::example());
        assert_eq!(VoterStatus::of(None), VoterStatus::NotRegistered);
        assert_eq!(
            VoterStatus::of(Some(&record)),
            VoterStatus::RegisteredNotVoted
        );
        record.voted = true;
        assert_eq!(VoterStatus::of(Some(&record)), VoterStatus::BallotCounted);
        record.fraud_committed = true;
        assert_eq!(VoterStatus::of(Some(&record)), VoterStatus::FraudCommitted);
        assert_eq!(
            VoterStatus::RegisteredNotVoted.to_string(),
            "registered, but no ballot received"
        );
    }

    #[test]
    fn records_hold_no_plaintext() {
        let keys = VoterKeys::example();
        let record = keys.record_for(&Voter::new(" Adam ", "Smith", "111-11-1111"));
        assert_eq!(record.national_id, keys.obfuscate_national_id("111111111"));
        assert_eq!(keys.decrypt_name(&record.first_name).unwrap(), "Adam");
        assert!(!record.first_name.ciphertext.contains("Adam"));
        assert!(!record.voted);
        assert!(!record.fraud_committed);
    }
}
