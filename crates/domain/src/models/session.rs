use rand::Rng;

/// Alphabet for human-typed session aliases. Ambiguous glyphs (0/O, 1/I)
/// are excluded so codes survive being read out loud.
const CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

pub const SHORT_CODE_LEN: usize = 8;

/// Generate an 8-character short code for a lobby or draft room.
pub fn generate_short_code() -> String {
    let mut rng = rand::rng();
    (0..SHORT_CODE_LEN)
        .map(|_| {
            let idx = rng.random_range(0..CODE_ALPHABET.len());
            CODE_ALPHABET[idx] as char
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_code_shape() {
        let code = generate_short_code();
        assert_eq!(code.len(), SHORT_CODE_LEN);
        assert!(code.bytes().all(|b| CODE_ALPHABET.contains(&b)));
    }

    #[test]
    fn test_short_codes_vary() {
        let a = generate_short_code();
        let b = generate_short_code();
        let c = generate_short_code();
        // Three identical draws would mean the generator is broken.
        assert!(!(a == b && b == c));
    }
}
