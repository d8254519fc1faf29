use rand::rngs::OsRng;
use rand::Rng;
use std::collections::HashSet;

/// Characters allowed in voucher codes. Visually confusable characters
/// (0/O, 1/I) are excluded so a code printed on a receipt can be typed
/// back without ambiguity.
pub const ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

/// Default length for raw (ungrouped) codes.
pub const DEFAULT_LENGTH: usize = 5;

const GROUP_LEN: usize = 4;
const GROUP_COUNT: usize = 3;

/// Generates voucher codes. Codes are credentials (a guessed code grants
/// free network access), so every draw comes from the OS CSPRNG.
pub struct VoucherGenerator;

impl VoucherGenerator {
    /// Generate a single raw code of `length` alphabet characters.
    pub fn generate(length: usize) -> String {
        let mut rng = OsRng;
        (0..length)
            .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
            .collect()
    }

    /// Generate a raw code of the default length.
    pub fn generate_default() -> String {
        Self::generate(DEFAULT_LENGTH)
    }

    /// Generate exactly `count` distinct codes of `length` characters,
    /// looping on the (negligibly likely) in-batch collision until the
    /// set is full.
    pub fn generate_bulk(count: usize, length: usize) -> Vec<String> {
        let mut codes = HashSet::with_capacity(count);
        while codes.len() < count {
            codes.insert(Self::generate(length));
        }
        codes.into_iter().collect()
    }

    /// Generate a code in the canonical customer-facing format
    /// `XXXX-XXXX-XXXX`. This is the format stored on tickets, pushed to
    /// the device, and accepted by the portal.
    pub fn generate_voucher() -> String {
        let mut grouped = String::with_capacity(GROUP_LEN * GROUP_COUNT + GROUP_COUNT - 1);
        for i in 0..GROUP_COUNT {
            if i > 0 {
                grouped.push('-');
            }
            grouped.push_str(&Self::generate(GROUP_LEN));
        }
        grouped
    }

    /// Whether `code` is in the canonical `XXXX-XXXX-XXXX` form, with every
    /// character drawn from the voucher alphabet.
    pub fn is_canonical(code: &str) -> bool {
        let groups: Vec<&str> = code.split('-').collect();
        groups.len() == GROUP_COUNT
            && groups.iter().all(|group| {
                group.len() == GROUP_LEN
                    && group.bytes().all(|b| ALPHABET.contains(&b))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generate_draws_only_from_alphabet() {
        let code = VoucherGenerator::generate(5);
        assert_eq!(code.len(), 5);
        assert!(code.bytes().all(|b| ALPHABET.contains(&b)));
    }

    #[test]
    fn generate_default_uses_default_length() {
        assert_eq!(VoucherGenerator::generate_default().len(), DEFAULT_LENGTH);
    }

    #[test]
    fn alphabet_excludes_confusable_characters() {
        for confusable in [b'0', b'O', b'1', b'I'] {
            assert!(!ALPHABET.contains(&confusable));
        }
        assert_eq!(ALPHABET.len(), 32);
    }

    #[test]
    fn generate_bulk_returns_exactly_count_distinct_codes() {
        let codes = VoucherGenerator::generate_bulk(100, 5);
        assert_eq!(codes.len(), 100);
        let unique: HashSet<&String> = codes.iter().collect();
        assert_eq!(unique.len(), 100);
    }

    #[test]
    fn generate_voucher_is_canonical() {
        for _ in 0..50 {
            let code = VoucherGenerator::generate_voucher();
            assert_eq!(code.len(), 14);
            assert!(VoucherGenerator::is_canonical(&code), "{code}");
        }
    }

    #[test]
    fn is_canonical_accepts_grouped_alphabet_codes() {
        assert!(VoucherGenerator::is_canonical("ABCD-EFGH-JKMN"));
        assert!(VoucherGenerator::is_canonical("2345-6789-WXYZ"));
    }

    #[test]
    fn is_canonical_rejects_malformed_codes() {
        // wrong grouping
        assert!(!VoucherGenerator::is_canonical("ABCDEFGHJKMN"));
        assert!(!VoucherGenerator::is_canonical("ABCD-EFGH"));
        assert!(!VoucherGenerator::is_canonical("AB-CDEFGH-JKMN"));
        // characters outside the alphabet
        assert!(!VoucherGenerator::is_canonical("abcd-efgh-jkmn"));
        assert!(!VoucherGenerator::is_canonical("ABC0-EFGH-JKMN"));
        assert!(!VoucherGenerator::is_canonical("ABCO-EFGH-JKMN"));
        assert!(!VoucherGenerator::is_canonical("ABC1-EFGH-JKMN"));
        assert!(!VoucherGenerator::is_canonical("ABCI-EFGH-JKMN"));
    }
}
