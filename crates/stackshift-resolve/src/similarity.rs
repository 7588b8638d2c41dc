//! Edit-distance string similarity

/// Levenshtein distance over Unicode scalar values
#[must_use]
pub fn levenshtein(a: &str, b: &str) -> usize {
    if a == b {
        return 0;
    }

    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();

    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0usize; b.len() + 1];

    for (i, &ac) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, &bc) in b.iter().enumerate() {
            let cost = usize::from(ac != bc);
            curr[j + 1] = (prev[j + 1] + 1).min(curr[j] + 1).min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[b.len()]
}

/// Normalized similarity in `[0, 1]`
///
/// `1 - distance / max(len)`; two empty strings are identical.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn similarity(a: &str, b: &str) -> f64 {
    let longest = a.chars().count().max(b.chars().count());
    if longest == 0 {
        return 1.0;
    }
    1.0 - levenshtein(a, b) as f64 / longest as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn distance_basics() {
        assert_eq!(levenshtein("", ""), 0);
        assert_eq!(levenshtein("abc", ""), 3);
        assert_eq!(levenshtein("kitten", "sitting"), 3);
        assert_eq!(levenshtein("flaw", "lawn"), 2);
    }

    #[test]
    fn counts_chars_not_bytes() {
        assert_eq!(levenshtein("café", "cafe"), 1);
        assert!((similarity("café", "cafe") - 0.75).abs() < f64::EPSILON);
    }

    #[test]
    fn similarity_edges() {
        assert!((similarity("", "") - 1.0).abs() < f64::EPSILON);
        assert!(similarity("abc", "").abs() < f64::EPSILON);
        assert!((similarity("orders-dev", "orders-dev") - 1.0).abs() < f64::EPSILON);
        assert!((similarity("orders-dev", "orders-prd") - 0.7).abs() < 1e-9);
    }

    #[test]
    fn unrelated_names_score_low() {
        for candidate in ["user-data", "users-legacy", "user-profiles"] {
            assert!(similarity("userstable", candidate) < 0.7, "{candidate}");
        }
    }

    proptest! {
        #[test]
        fn similarity_is_bounded_and_symmetric(a in "[a-z-]{0,12}", b in "[a-z-]{0,12}") {
            let s = similarity(&a, &b);
            prop_assert!((0.0..=1.0).contains(&s));
            prop_assert!((s - similarity(&b, &a)).abs() < 1e-12);
        }

        #[test]
        fn identical_strings_are_fully_similar(a in "\\PC{0,16}") {
            prop_assert!((similarity(&a, &a) - 1.0).abs() < f64::EPSILON);
        }
    }
}
