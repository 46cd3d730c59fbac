use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use pbkdf2::pbkdf2_hmac;
use sha2::Sha256;
use subtle::ConstantTimeEq;

pub const HASH_SCHEME: &str = "pbkdf2_sha256";
pub const HASH_LENGTH: usize = 32;
pub const SALT_LENGTH: usize = 16;

/// Salted PBKDF2-SHA256 password hashing.
///
/// Encoded as `pbkdf2_sha256$<iterations>$<salt b64>$<hash b64>` so stored
/// hashes keep verifying after the configured iteration count changes.
#[derive(Debug, Clone, Copy)]
pub struct PasswordHasher {
    iterations: u32,
}

impl PasswordHasher {
    pub fn new(iterations: u32) -> Self {
        Self {
            iterations: iterations.max(1),
        }
    }

    pub fn iterations(&self) -> u32 {
        self.iterations
    }

    pub fn hash(&self, password: &str) -> String {
        let salt = generate_salt();
        let digest = derive(password, &salt, self.iterations);
        format!(
            "{HASH_SCHEME}${}${}${}",
            self.iterations,
            BASE64.encode(salt),
            BASE64.encode(digest)
        )
    }

    /// Constant-time check. Malformed stored hashes never verify.
    pub fn verify(&self, password: &str, stored: &str) -> bool {
        let Some((iterations, salt, expected)) = parse(stored) else {
            tracing::warn!("Stored password hash has an unrecognised format");
            return false;
        };
        let digest = derive(password, &salt, iterations);
        digest.ct_eq(expected.as_slice()).into()
    }
}

fn derive(password: &str, salt: &[u8], iterations: u32) -> [u8; HASH_LENGTH] {
    let mut out = [0u8; HASH_LENGTH];
    pbkdf2_hmac::<Sha256>(password.as_bytes(), salt, iterations, &mut out);
    out
}

fn parse(stored: &str) -> Option<(u32, Vec<u8>, Vec<u8>)> {
    let mut parts = stored.split('$');
    if parts.next()? != HASH_SCHEME {
        return None;
    }
    let iterations: u32 = parts.next()?.parse().ok().filter(|n| *n > 0)?;
    let salt = BASE64.decode(parts.next()?).ok()?;
    let hash = BASE64.decode(parts.next()?).ok()?;
    if parts.next().is_some() || hash.len() != HASH_LENGTH {
        return None;
    }
    Some((iterations, salt, hash))
}

/// Generate a cryptographically random salt
pub fn generate_salt() -> [u8; SALT_LENGTH] {
    use rand::RngCore;
    let mut salt = [0u8; SALT_LENGTH];
    rand::thread_rng().fill_bytes(&mut salt);
    salt
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hasher() -> PasswordHasher {
        PasswordHasher::new(1_000)
    }

    #[test]
    fn hash_verifies_with_same_password() {
        let stored = hasher().hash("correct horse");
        assert!(hasher().verify("correct horse", &stored));
        assert!(!hasher().verify("wrong horse", &stored));
    }

    #[test]
    fn hash_is_salted() {
        assert_ne!(hasher().hash("same"), hasher().hash("same"));
    }

    #[test]
    fn stored_iterations_win_over_configured() {
        let stored = PasswordHasher::new(500).hash("pw");
        assert!(PasswordHasher::new(2_000).verify("pw", &stored));
    }

    #[test]
    fn encoded_form_has_four_parts() {
        let stored = hasher().hash("pw");
        let parts: Vec<_> = stored.split('$').collect();
        assert_eq!(parts.len(), 4);
        assert_eq!(parts[0], HASH_SCHEME);
        assert_eq!(parts[1], "1000");
    }

    #[test]
    fn malformed_hashes_never_verify() {
        for stored in ["", "plaintext", "pbkdf2_sha256$0$AA==$AA==", "md5$1$AA==$AA==", "pbkdf2_sha256$10$!!$??"] {
            assert!(!hasher().verify("plaintext", stored), "{stored}");
        }
    }

    #[test]
    fn generate_salt_is_random() {
        assert_ne!(generate_salt(), generate_salt());
    }
}
