/// Prefixes stripped before a second comparison, so `F-1001` and `1001`
/// still line up.
const STRIP_PREFIXES: &[&str] = &["INV", "F", "FAC", "#"];

/// Levenshtein edit distance over characters, using the two-row algorithm.
pub fn levenshtein_distance(s1: &str, s2: &str) -> usize {
    let a: Vec<char> = s1.chars().collect();
    let b: Vec<char> = s2.chars().collect();
    let (m, n) = (a.len(), b.len());

    if m == 0 {
        return n;
    }
    if n == 0 {
        return m;
    }

    // Keep the shorter string in the inner loop to minimise allocation.
    let (a, b, m, n) = if m <= n { (a, b, m, n) } else { (b, a, n, m) };

    let mut prev: Vec<usize> = (0..=n).collect();
    let mut curr = vec![0usize; n + 1];

    for i in 1..=m {
        curr[0] = i;
        for j in 1..=n {
            let cost = usize::from(a[i - 1] != b[j - 1]);
            curr[j] = (prev[j] + 1).min(curr[j - 1] + 1).min(prev[j - 1] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[n]
}

/// `1 - distance / longest`, in [0.0, 1.0].
pub fn similarity(a: &str, b: &str) -> f64 {
    let max_len = a.chars().count().max(b.chars().count());
    if max_len == 0 {
        return 1.0;
    }
    1.0 - levenshtein_distance(a, b) as f64 / max_len as f64
}

fn strip_prefix<'a>(s: &'a str, prefix: &str) -> &'a str {
    s.strip_prefix(prefix)
        .unwrap_or(s)
        .trim_matches(|c| matches!(c, '-' | '/' | ' '))
}

/// Similarity of two reference strings, or 0.0 when below `threshold`.
/// Equal strings score 1.0 and containment 0.9.
pub fn score(a: &str, b: &str, threshold: f64) -> f64 {
    let a = a.trim().to_uppercase();
    let b = b.trim().to_uppercase();
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    if a == b {
        return 1.0;
    }
    if a.contains(&b) || b.contains(&a) {
        return 0.9;
    }

    let mut ratio = similarity(&a, &b);
    for prefix in STRIP_PREFIXES {
        let (ca, cb) = (strip_prefix(&a, prefix), strip_prefix(&b, prefix));
        if !ca.is_empty() && !cb.is_empty() {
            ratio = ratio.max(similarity(ca, cb));
        }
    }

    if ratio >= threshold {
        ratio
    } else {
        0.0
    }
}
