//! Name comparison helpers used by the matcher.

use rand::distr::Alphanumeric;
use rand::Rng;
use std::collections::HashSet;
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Strips accents, upper-cases and collapses runs of whitespace.
pub fn normalize_text(text: &str) -> String {
    text.split_whitespace()
        .map(|word| {
            word.nfd()
                .filter(|c| !is_combining_mark(*c))
                .flat_map(char::to_uppercase)
                .collect::<String>()
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Drops leading zeros but never returns an empty string for a non-empty input.
pub fn normalize_account(account: &str) -> &str {
    let trimmed = account.trim_start_matches('0');
    if trimmed.is_empty() && !account.is_empty() {
        &account[account.len() - 1..]
    } else {
        trimmed
    }
}

pub fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0; b.len() + 1];

    for (i, ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cost = usize::from(ca != cb);
            curr[j + 1] = (prev[j + 1] + 1).min(curr[j] + 1).min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[b.len()]
}

/// `1 - distance / longest`, with two empty strings counting as identical.
pub fn text_similarity(a: &str, b: &str) -> f64 {
    let longest = a.chars().count().max(b.chars().count());
    if longest == 0 {
        return 1.0;
    }
    1.0 - levenshtein(a, b) as f64 / longest as f64
}

/// Best of edit-distance similarity and shared-word coverage, so that
/// reordered names ("PEREZ JUAN" / "JUAN PEREZ") still score high.
pub fn name_similarity(a: &str, b: &str) -> f64 {
    let a = normalize_text(a);
    let b = normalize_text(b);

    let direct = text_similarity(&a, &b);

    let words_a: HashSet<&str> = a.split(' ').collect();
    let words_b: HashSet<&str> = b.split(' ').collect();
    let common = words_a.intersection(&words_b).count();
    let coverage = common as f64 / words_a.len().max(words_b.len()) as f64;

    direct.max(coverage)
}

/// Percentage with two decimals, e.g. `87.50%`.
pub fn format_similarity(similarity: f64) -> String {
    format!("{:.2}%", similarity * 100.0)
}

/// Similarity as a percentage rounded to two decimals, matching what
/// [`format_similarity`] prints.
pub fn rounded_percentage(similarity: f64) -> f64 {
    (similarity * 10_000.0).round() / 100.0
}

pub fn generate_password<R: Rng>(rng: &mut R, length: usize) -> String {
    rng.sample_iter(Alphanumeric)
        .take(length)
        .map(char::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_normalize_text() {
        assert_eq!(normalize_text("  José   Muñoz\tpérez "), "JOSE MUNOZ PEREZ");
        assert_eq!(normalize_text("   "), "");
    }

    #[test]
    fn test_normalize_text_folds_letters_outside_latin1() {
        assert_eq!(normalize_text("Erdős Šimić"), "ERDOS SIMIC");
        assert_eq!(name_similarity("Dvořák Antonín", "DVORAK ANTONIN"), 1.0);
    }

    #[test]
    fn test_normalize_account() {
        assert_eq!(normalize_account("000123"), "123");
        assert_eq!(normalize_account("0000"), "0");
        assert_eq!(normalize_account("1020"), "1020");
        assert_eq!(normalize_account(""), "");
    }

    #[test]
    fn test_levenshtein() {
        assert_eq!(levenshtein("kitten", "sitting"), 3);
        assert_eq!(levenshtein("", "abc"), 3);
        assert_eq!(levenshtein("same", "same"), 0);
    }

    #[test]
    fn test_text_similarity_bounds() {
        assert_eq!(text_similarity("", ""), 1.0);
        assert_eq!(text_similarity("abc", ""), 0.0);
        assert!((text_similarity("abcd", "abce") - 0.75).abs() < 1e-9);
    }

    #[test]
    fn test_name_similarity_word_order() {
        assert_eq!(name_similarity("Pérez Juan", "JUAN PEREZ"), 1.0);
    }

    #[test]
    fn test_name_similarity_partial_words() {
        let sim = name_similarity("GOMEZ MARIA LAURA", "GOMEZ MARIA");
        assert!(sim >= 2.0 / 3.0 - 1e-9);
        assert!(sim < 1.0);
    }

    #[test]
    fn test_format_similarity() {
        assert_eq!(format_similarity(0.875), "87.50%");
        assert_eq!(rounded_percentage(0.50996), 51.0);
    }

    #[test]
    fn test_generate_password() {
        let mut rng = StdRng::seed_from_u64(7);
        let password = generate_password(&mut rng, 9);
        assert_eq!(password.len(), 9);
        assert!(password.chars().all(|c| c.is_ascii_alphanumeric()));
    }
}
