//! Search result ranking by name similarity

use regex::Regex;
use std::sync::LazyLock;

use super::types::Pool;

/// Default number of search options offered
pub const DEFAULT_TOP_N: usize = 5;

/// Parenthesized run of digits, as in `Night Shift (1234)`
static OPTION_ID: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"\((\d+)\)").ok());

/// Similarity of two strings in `[0, 1]`
///
/// Ratcliff/Obershelp: twice the number of matching characters over the
/// total length, where matches are found by repeatedly taking the longest
/// common block and recursing on either side of it.
pub fn similarity(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let total = a.len() + b.len();
    if total == 0 {
        return 1.0;
    }
    2.0 * matching_chars(&a, &b) as f64 / total as f64
}

fn matching_chars(a: &[char], b: &[char]) -> usize {
    let (start_a, start_b, len) = longest_common_block(a, b);
    if len == 0 {
        return 0;
    }
    len + matching_chars(&a[..start_a], &b[..start_b])
        + matching_chars(&a[start_a + len..], &b[start_b + len..])
}

/// Earliest longest common substring as (start in a, start in b, length)
fn longest_common_block(a: &[char], b: &[char]) -> (usize, usize, usize) {
    let mut best = (0, 0, 0);
    let mut prev = vec![0usize; b.len() + 1];
    let mut curr = vec![0usize; b.len() + 1];

    for i in 1..=a.len() {
        for j in 1..=b.len() {
            curr[j] = if a[i - 1] == b[j - 1] { prev[j - 1] + 1 } else { 0 };
            if curr[j] > best.2 {
                best = (i - curr[j], j - curr[j], curr[j]);
            }
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    best
}

/// Name as shown to users: underscores become spaces, inactive marked
pub fn display_name(name: &str, is_active: bool) -> String {
    let name = name.replace('_', " ");
    if is_active { name } else { format!("(INACTIVE) {}", name) }
}

/// The `top_n` pools whose names best match `query`, best first
///
/// Comparison is case-insensitive on the display form of the name.
/// Ties keep the order the API returned them in.
pub fn closest_matches<'a>(query: &str, pools: &'a [Pool], top_n: usize) -> Vec<&'a Pool> {
    let query = query.to_lowercase();
    let mut scored: Vec<(f64, &Pool)> = pools
        .iter()
        .map(|pool| (similarity(&pool.name.replace('_', " ").to_lowercase(), &query), pool))
        .collect();

    scored.sort_by(|a, b| b.0.total_cmp(&a.0));
    scored.into_iter().take(top_n).map(|(_, pool)| pool).collect()
}

/// Pull the id out of an option label such as `Some Comic (1234)`
///
/// Uses the last parenthesized number, so names that contain their own
/// parenthesized numbers still resolve. A bare number is accepted too.
pub fn parse_option_id(text: &str) -> Option<u64> {
    if let Ok(id) = text.trim().parse() {
        return Some(id);
    }
    OPTION_ID
        .as_ref()?
        .captures_iter(text)
        .last()
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pool(id: u64, name: &str) -> Pool {
        Pool {
            id,
            name: name.to_string(),
            post_ids: vec![],
            is_active: true,
        }
    }

    #[test]
    fn test_similarity_bounds() {
        assert_eq!(similarity("", ""), 1.0);
        assert_eq!(similarity("abc", "abc"), 1.0);
        assert_eq!(similarity("abc", "xyz"), 0.0);
        assert_eq!(similarity("abc", ""), 0.0);
    }

    #[test]
    fn test_similarity_known_values() {
        // 2 * 3 matching / 8 total
        assert!((similarity("abcd", "bcde") - 0.75).abs() < 1e-9);
        // Matches "ab" then "d" on the right side: 2 * 3 / 8
        assert!((similarity("abxd", "abyd") - 0.75).abs() < 1e-9);
    }

    #[test]
    fn test_display_name() {
        assert_eq!(display_name("Night_Shift", true), "Night Shift");
        assert_eq!(display_name("Night_Shift", false), "(INACTIVE) Night Shift");
    }

    #[test]
    fn test_closest_matches_orders_by_similarity() {
        let pools = vec![
            pool(1, "Moon_Garden"),
            pool(2, "Night_Shift"),
            pool(3, "Night_Shift_Extra"),
            pool(4, "Daylight"),
        ];
        let ranked = closest_matches("night shift", &pools, 2);
        let ids: Vec<u64> = ranked.iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![2, 3]);
    }

    #[test]
    fn test_closest_matches_truncates_and_keeps_ties_stable() {
        let pools = vec![pool(1, "aaa"), pool(2, "aaa"), pool(3, "aaa")];
        let ids: Vec<u64> = closest_matches("aaa", &pools, DEFAULT_TOP_N).iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);

        let ids: Vec<u64> = closest_matches("aaa", &pools, 1).iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![1]);
    }

    #[test]
    fn test_option_id_pattern_compiles_once() {
        assert!(OPTION_ID.is_some());
        let first: *const Regex = OPTION_ID.as_ref().unwrap();
        let second: *const Regex = OPTION_ID.as_ref().unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_parse_option_id() {
        assert_eq!(parse_option_id("Night Shift (1234)"), Some(1234));
        assert_eq!(parse_option_id("Chapter (2) Redux (77)"), Some(77));
        assert_eq!(parse_option_id("  42 "), Some(42));
        assert_eq!(parse_option_id("no id here"), None);
    }
}
