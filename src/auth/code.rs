// One-time email verification codes

use rand::Rng;

use crate::validation::VERIFICATION_CODE_LENGTH;

const CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Generate a random verification code of upper case letters and digits
pub fn generate_code() -> String {
    let mut rng = rand::thread_rng();
    (0..VERIFICATION_CODE_LENGTH)
        .map(|_| CHARSET[rng.gen_range(0..CHARSET.len())] as char)
        .collect()
}
