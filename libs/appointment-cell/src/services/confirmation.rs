use rand::Rng;

pub const CONFIRMATION_PREFIX: &str = "HC";
const CONFIRMATION_SUFFIX_LEN: usize = 6;
const ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// `HC` followed by six upper-case letters or digits.
pub fn generate_confirmation_id() -> String {
    let mut rng = rand::thread_rng();
    let suffix: String = (0..CONFIRMATION_SUFFIX_LEN)
        .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
        .collect();
    format!("{}{}", CONFIRMATION_PREFIX, suffix)
}

/// Lookup input as it is stored: trimmed and upper-cased.
pub fn normalize_confirmation_id(input: &str) -> String {
    input.trim().to_ascii_uppercase()
}

pub fn is_well_formed(id: &str) -> bool {
    id.len() == CONFIRMATION_PREFIX.len() + CONFIRMATION_SUFFIX_LEN
        && id.starts_with(CONFIRMATION_PREFIX)
        && id[CONFIRMATION_PREFIX.len()..]
            .bytes()
            .all(|b| b.is_ascii_uppercase() || b.is_ascii_digit())
}
