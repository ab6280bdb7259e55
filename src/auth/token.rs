use chrono::{DateTime, Utc};
use rand::Rng;

/// Constant tag every session token starts with.
pub const TOKEN_PREFIX: &str = "session_";

const BASE36: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
const FRAGMENT_LEN: usize = 13;

fn base36_fragment<R: Rng + ?Sized>(rng: &mut R, len: usize) -> String {
    (0..len)
        .map(|_| BASE36[rng.gen_range(0..BASE36.len())] as char)
        .collect()
}

/// Builds an opaque session token: tag, millisecond timestamp and two
/// independent random base-36 fragments. Unguessable in practice, not signed.
pub fn generate_session_token(now: DateTime<Utc>) -> String {
    let mut rng = rand::thread_rng();
    let first = base36_fragment(&mut rng, FRAGMENT_LEN);
    let second = base36_fragment(&mut rng, FRAGMENT_LEN);
    format!("{}{}_{}{}", TOKEN_PREFIX, now.timestamp_millis(), first, second)
}
