//! Fuzzy name matching for catalog search results

/// Ratcliff/Obershelp similarity of two strings, case-insensitive, in `[0, 1]`.
///
/// Twice the number of matching characters over the total length, where
/// matches are found by repeatedly taking the longest common block and
/// recursing on both sides of it.
pub fn similarity_ratio(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.to_lowercase().chars().collect();
    let b: Vec<char> = b.to_lowercase().chars().collect();
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

/// Earliest longest common substring as `(start_a, start_b, len)`
fn longest_common_block(a: &[char], b: &[char]) -> (usize, usize, usize) {
    let mut best = (0, 0, 0);
    // lengths[j + 1] = length of the common suffix ending at a[i], b[j]
    let mut lengths = vec![0usize; b.len() + 1];
    for (i, ca) in a.iter().enumerate() {
        let mut next = vec![0usize; b.len() + 1];
        for (j, cb) in b.iter().enumerate() {
            if ca == cb {
                let len = lengths[j] + 1;
                next[j + 1] = len;
                if len > best.2 {
                    best = (i + 1 - len, j + 1 - len, len);
                }
            }
        }
        lengths = next;
    }
    best
}

/// Index of the candidate most similar to `query`; ties keep the first
pub fn best_match<'a, I>(query: &str, candidates: I) -> Option<usize>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut best: Option<(usize, f64)> = None;
    for (idx, candidate) in candidates.into_iter().enumerate() {
        let score = similarity_ratio(query, candidate);
        match best {
            Some((_, top)) if score <= top => {}
            _ => best = Some((idx, score)),
        }
    }
    best.map(|(idx, _)| idx)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identical_and_disjoint() {
        assert_eq!(similarity_ratio("Spotify", "spotify"), 1.0);
        assert_eq!(similarity_ratio("abc", "xyz"), 0.0);
        assert_eq!(similarity_ratio("", ""), 1.0);
    }

    #[test]
    fn test_partial_match() {
        // "abcd" vs "bcde": block "bcd" -> 2 * 3 / 8
        assert!((similarity_ratio("abcd", "bcde") - 0.75).abs() < 1e-9);
    }

    #[test]
    fn test_best_match_prefers_closest_name() {
        let names = ["Spotify Kids", "Spotify: Music and Podcasts", "Spotify"];
        assert_eq!(best_match("spotify", names), Some(2));
    }

    #[test]
    fn test_best_match_ties_keep_first() {
        assert_eq!(best_match("ab", ["xa", "xb", "ab", "ab"]), Some(2));
        assert_eq!(best_match("q", std::iter::empty()), None);
    }
}
