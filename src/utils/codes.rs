use rand::{thread_rng, Rng};

const CODE_CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

pub const POSITION_CODE_LEN: usize = 6;
pub const SECRET_CODE_LEN: usize = 8;

/// Random uppercase alphanumeric code of `length` characters.
pub fn generate_code(length: usize) -> String {
    let mut rng = thread_rng();
    (0..length)
        .map(|_| CODE_CHARSET[rng.gen_range(0..CODE_CHARSET.len())] as char)
        .collect()
}

pub fn generate_position_code() -> String {
    generate_code(POSITION_CODE_LEN)
}

pub fn generate_secret_code() -> String {
    generate_code(SECRET_CODE_LEN)
}
