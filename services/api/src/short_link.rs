//! Short link codes

use rand::{Rng, distributions::Alphanumeric};

pub const CODE_LENGTH: usize = 6;

/// Random alphanumeric code
pub fn generate_code() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(CODE_LENGTH)
        .map(char::from)
        .collect()
}

/// Public short URL for a code
pub fn short_url(public_url: &str, code: &str) -> String {
    format!("{}/s/{}/", public_url.trim_end_matches('/'), code)
}

/// Frontend page a short code resolves to
pub fn recipe_page_url(public_url: &str, recipe_id: i64) -> String {
    format!("{}/recipes/{}/", public_url.trim_end_matches('/'), recipe_id)
}

/// Accept only codes this module could have produced
pub fn is_valid_code(code: &str) -> bool {
    code.len() == CODE_LENGTH && code.chars().all(|c| c.is_ascii_alphanumeric())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_codes_are_valid() {
        for _ in 0..100 {
            let code = generate_code();
            assert!(is_valid_code(&code), "bad code {}", code);
        }
    }

    #[test]
    fn test_rejects_foreign_codes() {
        assert!(!is_valid_code("abc"));
        assert!(!is_valid_code("abc-12"));
        assert!(!is_valid_code("abcdefg"));
    }

    #[test]
    fn test_urls() {
        assert_eq!(
            short_url("https://foodgram.example/", "Ab3xYz"),
            "https://foodgram.example/s/Ab3xYz/"
        );
        assert_eq!(
            recipe_page_url("https://foodgram.example", 12),
            "https://foodgram.example/recipes/12/"
        );
    }
}
