//! Ratcliff/Obershelp similarity over characters.
//!
//! `ratio` returns `2 * M / T` where `M` is the total size of the matching
//! blocks and `T` the combined length of both inputs, so identical strings
//! score 1.0 and strings with nothing in common score 0.0.

/// Case-folds and trims both names before comparing them.
pub fn name_ratio(a: &str, b: &str) -> f64 {
    ratio(&a.trim().to_lowercase(), &b.trim().to_lowercase())
}

pub fn ratio(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let total = a.len() + b.len();
    if total == 0 {
        return 1.0;
    }
    let matches = matching_chars(&a, &b);
    2.0 * matches as f64 / total as f64
}

fn matching_chars(a: &[char], b: &[char]) -> usize {
    let mut matched = 0;
    let mut pending = vec![(0, a.len(), 0, b.len())];
    while let Some((alo, ahi, blo, bhi)) = pending.pop() {
        let (i, j, size) = longest_match(a, b, alo, ahi, blo, bhi);
        if size == 0 {
            continue;
        }
        matched += size;
        if alo < i && blo < j {
            pending.push((alo, i, blo, j));
        }
        if i + size < ahi && j + size < bhi {
            pending.push((i + size, ahi, j + size, bhi));
        }
    }
    matched
}

/// Longest common block in `a[alo..ahi]` x `b[blo..bhi]`; ties go to the
/// earliest start in `a`, then in `b`.
fn longest_match(
    a: &[char],
    b: &[char],
    alo: usize,
    ahi: usize,
    blo: usize,
    bhi: usize,
) -> (usize, usize, usize) {
    let (mut best_i, mut best_j, mut best_size) = (alo, blo, 0);
    // run[j + 1] is the length of the common run ending at (i - 1, j).
    let mut prev = vec![0usize; b.len() + 1];
    for i in alo..ahi {
        let mut cur = vec![0usize; b.len() + 1];
        for j in blo..bhi {
            if a[i] == b[j] {
                let k = prev[j] + 1;
                cur[j + 1] = k;
                if k > best_size {
                    best_i = i + 1 - k;
                    best_j = j + 1 - k;
                    best_size = k;
                }
            }
        }
        prev = cur;
    }
    (best_i, best_j, best_size)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(actual: f64, expected: f64) -> bool {
        (actual - expected).abs() < 1e-9
    }

    #[test]
    fn identical_and_disjoint_strings() {
        assert!(close(ratio("jane doe", "jane doe"), 1.0));
        assert!(close(ratio("abc", "xyz"), 0.0));
        assert!(close(ratio("", ""), 1.0));
        assert!(close(ratio("abc", ""), 0.0));
    }

    #[test]
    fn known_ratios() {
        assert!(close(ratio("jane doe", "john doe"), 0.75));
        assert!(close(ratio("mary jones", "marie jones"), 18.0 / 21.0));
        assert!(close(ratio("anna smith", "anne smyth"), 0.8));
        assert!(close(ratio("jonathan smith", "jonathon smith"), 26.0 / 28.0));
        assert!(close(ratio("john smith", "jon smyth"), 16.0 / 19.0));
        assert!(close(ratio("peter obi", "peter okafor"), 14.0 / 21.0));
    }

    #[test]
    fn name_ratio_folds_case_and_whitespace() {
        assert!(close(name_ratio("  Jane DOE ", "jane doe"), 1.0));
    }
}
