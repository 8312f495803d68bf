use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use rand::{rngs::OsRng, Rng, RngCore};

pub const TOKEN_CHARSET: [char; 62] = [
    'a', 'b', 'c', 'd', 'e', 'f', 'g', 'h', 'i', 'j', 'k', 'l', 'm', 'n', 'o', 'p', 'q', 'r', 's',
    't', 'u', 'v', 'w', 'x', 'y', 'z', 'A', 'B', 'C', 'D', 'E', 'F', 'G', 'H', 'I', 'J', 'K', 'L',
    'M', 'N', 'O', 'P', 'Q', 'R', 'S', 'T', 'U', 'V', 'W', 'X', 'Y', 'Z', '0', '1', '2', '3', '4',
    '5', '6', '7', '8', '9',
];

/// Digits then uppercase letters, the alphabet of invite code suffixes.
pub const BASE36_UPPER_CHARSET: [char; 36] = [
    '0', '1', '2', '3', '4', '5', '6', '7', '8', '9', 'A', 'B', 'C', 'D', 'E', 'F', 'G', 'H', 'I',
    'J', 'K', 'L', 'M', 'N', 'O', 'P', 'Q', 'R', 'S', 'T', 'U', 'V', 'W', 'X', 'Y', 'Z',
];

pub fn generate_from_charset(charset: &[char], length: usize) -> String {
    let mut rng = rand::thread_rng();
    let mut key = String::with_capacity(length);
    for _ in 0..length {
        key.push(charset[rng.gen_range(0..charset.len())]);
    }
    key
}

pub fn generate_token(length: usize) -> String {
    generate_from_charset(&TOKEN_CHARSET, length)
}

///32 bytes from the OS rng, base64url encoded. Only the blake3 hash of this is persisted.
pub fn generate_session_token() -> String {
    let mut bytes = [0u8; 32];
    OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

pub fn hash_password(password: &str) -> Result<String, argon2::Error> {
    let salt = generate_token(32);
    argon2::hash_encoded(
        password.as_bytes(),
        salt.as_bytes(),
        &argon2::Config::default(),
    )
}

pub fn verify_password(encoded: &str, password: &str) -> Result<bool, argon2::Error> {
    argon2::verify_encoded(encoded, password.as_bytes())
}
