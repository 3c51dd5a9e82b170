use super::*;

fn bare_entry() -> DirectoryEntry {
    DirectoryEntry { user: seed_users().remove(0), password_hash: None }
}

// =============================================================================
// SharedSecretVerifier
// =============================================================================

#[test]
fn shared_secret_accepts_exact_secret() {
    let verifier = SharedSecretVerifier::new("password");
    assert!(verifier.verify(&bare_entry(), "password"));
}

#[test]
fn shared_secret_rejects_anything_else() {
    let verifier = SharedSecretVerifier::new("password");
    for attempt in ["wrong", "", "Password", "password ", "passwor"] {
        assert!(!verifier.verify(&bare_entry(), attempt), "accepted {attempt:?}");
    }
}

#[test]
fn shared_secret_stores_no_hash() {
    let verifier = SharedSecretVerifier::new("password");
    assert_eq!(verifier.hash("anything").unwrap(), None);
}

#[test]
fn shared_secret_compares_whole_secret() {
    let verifier = SharedSecretVerifier::new("abc");
    assert!(verifier.verify(&bare_entry(), "abc"));
    assert!(!verifier.verify(&bare_entry(), "abd"));
    assert!(!verifier.verify(&bare_entry(), "abcd"));
    assert!(!verifier.verify(&bare_entry(), "ab"));
}

#[test]
fn empty_shared_secret_matches_only_empty_password() {
    let verifier = SharedSecretVerifier::new("");
    assert!(verifier.verify(&bare_entry(), ""));
    assert!(!verifier.verify(&bare_entry(), "x"));
}

// =============================================================================
// Argon2Verifier
// =============================================================================

#[test]
fn argon2_verifies_its_own_hash() {
    let verifier = Argon2Verifier::new();
    let hash = verifier.hash("s3cret-pass").unwrap().unwrap();
    assert!(hash.starts_with("$argon2"));

    let entry = DirectoryEntry { password_hash: Some(hash), ..bare_entry() };
    assert!(verifier.verify(&entry, "s3cret-pass"));
    assert!(!verifier.verify(&entry, "s3cret-pasS"));
}

#[test]
fn argon2_salts_differ_per_hash() {
    let verifier = Argon2Verifier::new();
    let a = verifier.hash("same").unwrap().unwrap();
    let b = verifier.hash("same").unwrap().unwrap();
    assert_ne!(a, b);
}

#[test]
fn argon2_rejects_entries_without_or_with_malformed_hash() {
    let verifier = Argon2Verifier::new();
    assert!(!verifier.verify(&bare_entry(), "password"));

    let garbage = DirectoryEntry { password_hash: Some("not-a-phc-string".to_owned()), ..bare_entry() };
    assert!(!verifier.verify(&garbage, "password"));
}

// =============================================================================
// seed_entries
// =============================================================================

#[test]
fn seed_entries_follow_verifier() {
    let shared = seed_entries(&SharedSecretVerifier::new("pw"), "pw").unwrap();
    assert!(shared.iter().all(|e| e.password_hash.is_none()));

    let argon = Argon2Verifier::new();
    let hashed = seed_entries(&argon, "initial-pw").unwrap();
    assert_eq!(hashed.len(), seed_users().len());
    assert!(hashed.iter().all(|e| argon.verify(e, "initial-pw")));
}
