use crate::normalize::normalize;
use crate::schema::Category;
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Minimum score for a link suggestion to be surfaced.
pub const DEFAULT_LINK_THRESHOLD: f64 = 0.65;

/// Bonus applied when one normalized name contains the other.
const CONTAINMENT_BONUS: f64 = 0.15;

/// Ratcliff/Obershelp similarity between two strings: 2·M/(m+n) where M is
/// the total number of matched characters across recursively found longest
/// common substrings.
pub fn sequence_ratio(a: &str, b: &str) -> f64 {
    let ac: Vec<char> = a.chars().collect();
    let bc: Vec<char> = b.chars().collect();
    if ac.is_empty() && bc.is_empty() {
        return 1.0;
    }
    if ac.is_empty() || bc.is_empty() {
        return 0.0;
    }
    let matched = matching_chars(&ac, &bc);
    2.0 * matched as f64 / (ac.len() + bc.len()) as f64
}

/// Total matched characters: find the longest common substring, then recurse
/// into the unmatched prefixes and suffixes.
fn matching_chars(a: &[char], b: &[char]) -> usize {
    if a.is_empty() || b.is_empty() {
        return 0;
    }
    let (a_start, b_start, len) = longest_common_substring(a, b);
    if len == 0 {
        return 0;
    }
    len + matching_chars(&a[..a_start], &b[..b_start])
        + matching_chars(&a[a_start + len..], &b[b_start + len..])
}

fn longest_common_substring(a: &[char], b: &[char]) -> (usize, usize, usize) {
    let mut best = (0usize, 0usize, 0usize);
    // lengths[j] = length of common suffix ending at a[i], b[j]
    let mut prev = vec![0usize; b.len() + 1];
    for (i, &ca) in a.iter().enumerate() {
        let mut current = vec![0usize; b.len() + 1];
        for (j, &cb) in b.iter().enumerate() {
            if ca == cb {
                let len = prev[j] + 1;
                current[j + 1] = len;
                if len > best.2 {
                    best = (i + 1 - len, j + 1 - len, len);
                }
            }
        }
        prev = current;
    }
    best
}

/// Scores the equivalence of two raw product names in [0, 1]: the sequence
/// ratio of their normalized essences, plus a containment bonus when both
/// essences are longer than 3 characters and one contains the other.
pub fn score(name_a: &str, name_b: &str) -> f64 {
    let essence_a = normalize(name_a);
    let essence_b = normalize(name_b);
    let base = sequence_ratio(&essence_a, &essence_b);
    let mut bonus = 0.0;
    // length gate counts characters, not bytes: accented species names like
    // "IPÊ" are still 3 characters long
    if essence_a.chars().count() > 3
        && essence_b.chars().count() > 3
        && (essence_a.contains(&essence_b) || essence_b.contains(&essence_a))
    {
        bonus = CONTAINMENT_BONUS;
    }
    (base + bonus).min(1.0)
}

/// A proposed link from an ERP group to its best regulatory match.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LinkSuggestion {
    pub erp_group: String,
    pub regulatory_group: String,
    pub score: f64,
    pub category: Category,
}

/// Sweeps every ERP group against the regulatory groups and proposes the
/// best category-compatible match scoring above `threshold`. An exact score
/// tie between two regulatory candidates is ambiguous and yields no
/// suggestion for that group.
pub fn suggest_links(
    erp_groups: &[String],
    regulatory_groups: &[String],
    erp_categories: &BTreeMap<String, Category>,
    regulatory_categories: &BTreeMap<String, Category>,
    threshold: f64,
) -> Vec<LinkSuggestion> {
    let mut suggestions = Vec::new();

    for erp_group in erp_groups {
        let cat_erp = erp_categories
            .get(erp_group)
            .copied()
            .unwrap_or(Category::Other);

        let mut best: Option<(String, f64)> = None;
        let mut tied = false;

        for reg_group in regulatory_groups {
            let cat_reg = regulatory_categories
                .get(reg_group)
                .copied()
                .unwrap_or(Category::Other);
            if cat_erp != cat_reg {
                continue;
            }

            let s = score(erp_group, reg_group);
            if s <= threshold {
                continue;
            }
            match &best {
                Some((_, best_score)) if s == *best_score => tied = true,
                Some((_, best_score)) if s > *best_score => {
                    best = Some((reg_group.clone(), s));
                    tied = false;
                }
                None => best = Some((reg_group.clone(), s)),
                _ => {}
            }
        }

        match best {
            Some((reg_group, s)) if !tied => suggestions.push(LinkSuggestion {
                erp_group: erp_group.clone(),
                regulatory_group: reg_group,
                score: s,
                category: cat_erp,
            }),
            Some((reg_group, s)) => {
                debug!(
                    "ambiguous link suggestion for '{}': tie at {:.2} (one candidate: '{}')",
                    erp_group, s, reg_group
                );
            }
            None => {}
        }
    }

    suggestions
}
