use latchkey_core::testing::test_hasher;

#[test]
fn test_hash_and_verify_password() {
    let hasher = test_hasher();
    let hashed = hasher.hash("correct horse battery staple").expect("Failed to hash");

    assert!(hasher.verify("correct horse battery staple", &hashed.hash, &hashed.salt));
}

#[test]
fn test_wrong_password_fails() {
    let hasher = test_hasher();
    let hashed = hasher.hash("pw1").expect("Failed to hash");

    assert!(!hasher.verify("pw2", &hashed.hash, &hashed.salt));
    assert!(!hasher.verify("", &hashed.hash, &hashed.salt));
    assert!(!hasher.verify("PW1", &hashed.hash, &hashed.salt));
}

#[test]
fn test_salt_is_bound_to_hash() {
    let hasher = test_hasher();
    let a = hasher.hash("pw1").expect("Failed to hash");
    let b = hasher.hash("pw1").expect("Failed to hash");

    assert!(!hasher.verify("pw1", &a.hash, &b.salt));
}

#[test]
fn test_unicode_passwords() {
    let hasher = test_hasher();
    let hashed = hasher.hash("pässwörd🔐").expect("Failed to hash");

    assert!(hasher.verify("pässwörd🔐", &hashed.hash, &hashed.salt));
    assert!(!hasher.verify("passwörd🔐", &hashed.hash, &hashed.salt));
}

#[test]
fn test_debug_hides_secret_material() {
    let hashed = test_hasher().hash("pw1").expect("Failed to hash");
    assert_eq!(format!("{:?}", hashed), "HashedSecret { .. }");
}
