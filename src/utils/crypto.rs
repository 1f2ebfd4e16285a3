use sha2::{Digest, Sha256};

/// One-way key for duplicate lookups: SHA-256 of the trimmed, lowercased email.
pub fn email_hash(email: &str) -> String {
    let normalized = email.trim().to_lowercase();
    let digest = Sha256::digest(normalized.as_bytes());
    hex::encode(digest)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_ignores_case_and_surrounding_whitespace() {
        assert_eq!(email_hash("Jane@Example.com "), email_hash("jane@example.com"));
        assert_ne!(email_hash("jane@example.com"), email_hash("john@example.com"));
        assert_eq!(email_hash("a@b.c").len(), 64);
    }
}
