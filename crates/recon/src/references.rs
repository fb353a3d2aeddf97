use regex::Regex;
use std::collections::HashSet;
use std::sync::OnceLock;

/// Longest run a range like `1000 A 1003` is expanded to.
const MAX_RANGE_EXPANSION: u64 = 10;

re!(re_prefixed_range, r"(?:FACT|FRA|FAC|INV)?\.?\s*(\d+)\s*[-A]\s*(\d+)");
re!(re_plain_range, r"(\d+)\s*[-/]\s*(\d+)(?:\s*Y\s*(\d+))?");
re!(re_comma_list, r"(?:FACT|FRA|FAC|INV)?\.?\s*((?:\d+\s*,\s*)+\d+)");
re!(re_digits, r"\d+");
re!(re_separators, r"[\s,;/\-]+");

const REFERENCE_PATTERNS: &[&str] = &[
    r"A/(\d+)",
    r"INV[-/\s]?(\d+)",
    r"F[-/\s]?(\d+)",
    r"FAC[-/\s]?(\d+)",
    r"FRA\.?\s*(\d+)",
    r"FACTURA\s+(\d+)",
    r"(\d+)[-/]\d{4}",
    r"(\d{5,})",
    r"[A-Z]{1,3}[-/](\d+)",
    r"#(\d+)",
];

fn reference_patterns() -> &'static [Regex] {
    static R: OnceLock<Vec<Regex>> = OnceLock::new();
    R.get_or_init(|| {
        REFERENCE_PATTERNS
            .iter()
            .map(|p| Regex::new(p).expect("invalid regex"))
            .collect()
    })
}

/// `1234`..`36` reads as `1234..1236`: a shorter end borrows the start's
/// leading digits.
fn expand_range(start: &str, end: &str, out: &mut Vec<String>) -> Option<()> {
    let start: u64 = start.parse().ok()?;
    let end_num: u64 = end.parse().ok()?;
    let (start_s, end_s) = (start.to_string(), end_num.to_string());
    let end = if end_s.len() < start_s.len() {
        let prefix = &start_s[..start_s.len() - end_s.len()];
        format!("{prefix}{end_s}").parse().ok()?
    } else {
        end_num
    };

    if end > start && end - start <= MAX_RANGE_EXPANSION {
        out.extend((start..=end).map(|n| n.to_string()));
    } else {
        out.push(start.to_string());
        out.push(end.to_string());
    }
    Some(())
}

fn collect_ranges(re: &Regex, text: &str, out: &mut Vec<String>) {
    for caps in re.captures_iter(text) {
        let (Some(start), Some(end)) = (caps.get(1), caps.get(2)) else {
            continue;
        };
        let third = caps.get(3).map(|m| m.as_str());
        if expand_range(start.as_str(), end.as_str(), out).is_some() {
            if let Some(third) = third {
                out.push(third.to_string());
            }
        } else {
            out.push(start.as_str().to_string());
            out.push(end.as_str().to_string());
            out.extend(third.map(str::to_string));
        }
    }
}

/// Candidate invoice references found in free text, in discovery order and
/// without duplicates. Ranges and comma lists are expanded, the usual
/// `FAC 123` / `A/337748` style codes are captured, and finally every token
/// of two or more characters is kept for loose matching.
pub fn extract_references(text: &str) -> Vec<String> {
    if text.trim().is_empty() {
        return Vec::new();
    }
    let text = text.to_uppercase();
    let mut refs = Vec::new();

    collect_ranges(re_prefixed_range(), &text, &mut refs);
    collect_ranges(re_plain_range(), &text, &mut refs);

    for caps in re_comma_list().captures_iter(&text) {
        let Some(list) = caps.get(1) else { continue };
        refs.extend(
            list.as_str()
                .split(',')
                .filter_map(|part| re_digits().find(part))
                .map(|m| m.as_str().to_string()),
        );
    }

    for re in reference_patterns() {
        refs.extend(
            re.captures_iter(&text)
                .filter_map(|caps| caps.get(1))
                .map(|m| m.as_str().to_string()),
        );
    }

    refs.extend(
        re_separators()
            .split(&text)
            .filter(|t| t.chars().count() >= 2)
            .map(str::to_string),
    );

    let mut seen = HashSet::new();
    refs.retain(|r| !r.is_empty() && seen.insert(r.clone()));
    refs
}
