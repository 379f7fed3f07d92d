//! Swiss IBAN shape rules and ISO 13616 checksum.

use super::patterns::IBAN_CANDIDATE;

/// Length of a canonical Swiss IBAN (`CH` + 2 check digits + 17 BBAN characters).
pub const SWISS_IBAN_LEN: usize = 21;

/// Length window accepted for noisy sources when the canonical shape fails.
pub const LOOSE_LEN_MIN: usize = 19;
pub const LOOSE_LEN_MAX: usize = 25;

/// Strip everything but ASCII letters and digits, then uppercase.
pub fn clean_token(raw: &str) -> String {
    raw.chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect::<String>()
        .to_ascii_uppercase()
}

/// Whether a cleaned token is accepted as a Swiss account identifier.
///
/// Canonical rule: starts with `CH`, exactly 21 characters, check digits at
/// positions 3-4. Loose rule: same prefix and check digits, length 19-25.
pub fn is_swiss_iban_like(clean: &str) -> bool {
    if !clean.starts_with("CH") {
        return false;
    }
    let check_digits = clean
        .get(2..4)
        .is_some_and(|d| d.chars().all(|c| c.is_ascii_digit()));
    if !check_digits {
        return false;
    }
    clean.len() == SWISS_IBAN_LEN || (LOOSE_LEN_MIN..=LOOSE_LEN_MAX).contains(&clean.len())
}

/// First accepted Swiss IBAN-like token in `text`, cleaned.
pub fn extract_swiss_iban(text: &str) -> Option<String> {
    IBAN_CANDIDATE
        .find_iter(text)
        .map(|m| clean_token(m.as_str()))
        .find(|clean| is_swiss_iban_like(clean))
}

/// Validate an IBAN using the checksum algorithm.
///
/// Algorithm:
/// 1. Move first 4 characters to the end
/// 2. Replace letters with numbers (A=10, B=11, ..., Z=35)
/// 3. The resulting number mod 97 should equal 1
pub fn validate_iban(iban: &str) -> bool {
    let iban = clean_token(iban);
    if iban.len() < 5 {
        return false;
    }

    let (head, tail) = iban.split_at(4);
    if !head[..2].chars().all(|c| c.is_ascii_alphabetic())
        || !head[2..].chars().all(|c| c.is_ascii_digit())
    {
        return false;
    }

    // Running remainder keeps the number within u32.
    let mut remainder: u32 = 0;
    for c in tail.chars().chain(head.chars()) {
        let value = match c.to_digit(36) {
            Some(v) => v,
            None => return false,
        };
        remainder = if value >= 10 {
            (remainder * 100 + value) % 97
        } else {
            (remainder * 10 + value) % 97
        };
    }

    remainder == 1
}

/// Format IBAN in groups of 4 characters.
pub fn format_iban(iban: &str) -> String {
    clean_token(iban)
        .chars()
        .collect::<Vec<char>>()
        .chunks(4)
        .map(|chunk| chunk.iter().collect::<String>())
        .collect::<Vec<String>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_accepts_spaced_iban() {
        let token = extract_swiss_iban("IBAN: CH93 0076 2011 6238 5295 7 |").unwrap();
        assert_eq!(token, "CH9300762011623852957");
        assert_eq!(token.len(), SWISS_IBAN_LEN);
    }

    #[test]
    fn test_accepts_case_noise() {
        let token = extract_swiss_iban("konto: ch93 0076 2011 6238 5295 7.").unwrap();
        assert_eq!(token, "CH9300762011623852957");
    }

    #[test]
    fn test_rejects_short_token() {
        // 17 characters once cleaned
        assert!(!is_swiss_iban_like("CH930076201162385"));
        assert_eq!(extract_swiss_iban("Ref CH93 0076 2011 6238 5 |"), None);
    }

    #[test]
    fn test_loose_length_window() {
        assert!(is_swiss_iban_like("CH93007620116238529"));
        assert!(!is_swiss_iban_like("CH930076201162385"));
        assert!(is_swiss_iban_like("CH93007620116238529570000"));
        assert!(!is_swiss_iban_like("CH930076201162385295700000"));
        assert!(!is_swiss_iban_like("CHXX00762011623852957"));
        assert!(!is_swiss_iban_like("DE9300762011623852957"));
    }

    #[test]
    fn test_no_match_returns_none() {
        assert_eq!(extract_swiss_iban("no account here"), None);
        assert_eq!(extract_swiss_iban(""), None);
    }

    #[test]
    fn test_validate_iban() {
        assert!(validate_iban("CH9300762011623852957"));
        assert!(validate_iban("CH93 0076 2011 6238 5295 7"));
        assert!(validate_iban("CH4431999123000889012"));
        assert!(!validate_iban("CH0000762011623852957"));
        assert!(!validate_iban("CH9"));
    }

    #[test]
    fn test_format_iban() {
        assert_eq!(
            format_iban("CH9300762011623852957"),
            "CH93 0076 2011 6238 5295 7"
        );
    }
}
