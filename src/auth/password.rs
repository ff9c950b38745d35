use pbkdf2::pbkdf2_hmac;
use sha2::Sha256;
use uuid::Uuid;

/// PBKDF2 iteration count for newly stored passwords.
pub const DEFAULT_ROUNDS: u32 = 100_000;

const SCHEME: &str = "pbkdf2-sha256";
const KEY_LEN: usize = 32;

/// Random per-user salt, hex encoded.
pub fn new_salt() -> String {
    Uuid::new_v4().simple().to_string()
}

/// PBKDF2-HMAC-SHA256 of the password, stored as `pbkdf2-sha256$<rounds>$<hex>`.
pub fn hash_password(password: &str, salt: &str, rounds: u32) -> String {
    let rounds = rounds.max(1);
    format!(
        "{}${}${}",
        SCHEME,
        rounds,
        hex::encode(derive(password, salt, rounds))
    )
}

/// Constant-time check of `password` against a stored hash. The round count
/// is read from the stored value.
pub fn verify_password(password: &str, salt: &str, stored: &str) -> bool {
    let Some((rounds, expected)) = parse_stored(stored) else {
        return false;
    };
    constant_time_eq(&derive(password, salt, rounds), &expected)
}

fn parse_stored(stored: &str) -> Option<(u32, Vec<u8>)> {
    let mut parts = stored.splitn(3, '$');
    if parts.next()? != SCHEME {
        return None;
    }
    let rounds = parts.next()?.parse::<u32>().ok().filter(|r| *r > 0)?;
    let hash = hex::decode(parts.next()?).ok()?;
    Some((rounds, hash))
}

fn derive(password: &str, salt: &str, rounds: u32) -> [u8; KEY_LEN] {
    let mut key = [0u8; KEY_LEN];
    pbkdf2_hmac::<Sha256>(password.as_bytes(), salt.as_bytes(), rounds, &mut key);
    key
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.len() == b.len() && a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
