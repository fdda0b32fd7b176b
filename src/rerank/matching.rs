//! Map a free-text numbered list from the model back onto the candidates.
//!
//! The model is asked to echo the candidates in a new order, but replies drift:
//! items go missing, get paraphrased or decorated, get repeated, or come with
//! commentary. Whatever the reply looks like, the result here is a permutation
//! of the input candidates.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

static ITEM_MARKER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^[ \t]*\d+[.)]\s+").expect("Invalid item marker regex"));

/// Extract the items of a numbered list (`1. foo`, `2) bar`).
///
/// Each item runs from its marker to the next marker or the end of the reply.
/// Line breaks inside an item are collapsed to single spaces; empty items are
/// dropped.
pub fn parse_numbered_items(reply: &str) -> Vec<String> {
    let markers: Vec<(usize, usize)> = ITEM_MARKER
        .find_iter(reply)
        .map(|m| (m.start(), m.end()))
        .collect();

    markers
        .iter()
        .enumerate()
        .filter_map(|(i, &(_, body_start))| {
            let body_end = markers.get(i + 1).map_or(reply.len(), |&(next, _)| next);
            let item = collapse_lines(&reply[body_start..body_end]);
            (!item.is_empty()).then_some(item)
        })
        .collect()
}

fn collapse_lines(text: &str) -> String {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Result of matching reported items against the candidates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MatchedRanking {
    /// Full permutation of the candidates.
    pub ranking: Vec<String>,
    /// Items the model reported.
    pub reported: usize,
    /// Reported items that were placed.
    pub matched: usize,
    /// Candidates the model never echoed, appended in original order.
    pub appended: usize,
    /// Whether `ranking` differs from the original order.
    pub changed: bool,
}

/// Place candidates in the order the model reported them.
///
/// For each reported item: an exact match against an unplaced candidate wins;
/// otherwise the first unplaced candidate (in original order) that contains
/// the item or is contained by it, ignoring case; otherwise the item is
/// dropped. Unplaced candidates are appended in original order.
pub fn match_ranking<S: AsRef<str>>(reported: &[S], preds: &[String]) -> MatchedRanking {
    let lowered: Vec<String> = preds.iter().map(|p| p.to_lowercase()).collect();
    let mut placed = vec![false; preds.len()];
    let mut order: Vec<usize> = Vec::with_capacity(preds.len());

    for item in reported {
        let item = item.as_ref().trim();
        if item.is_empty() {
            continue;
        }

        let exact = (0..preds.len()).find(|&i| !placed[i] && preds[i] == item);
        let chosen = exact.or_else(|| {
            let item_lower = item.to_lowercase();
            (0..preds.len()).find(|&i| {
                !placed[i]
                    && !lowered[i].is_empty()
                    && (item_lower.contains(&lowered[i]) || lowered[i].contains(&item_lower))
            })
        });

        if let Some(i) = chosen {
            placed[i] = true;
            order.push(i);
        }
    }

    let matched = order.len();
    order.extend((0..preds.len()).filter(|&i| !placed[i]));
    let changed = order.iter().enumerate().any(|(pos, &i)| pos != i);

    MatchedRanking {
        ranking: order.into_iter().map(|i| preds[i].clone()).collect(),
        reported: reported.len(),
        matched,
        appended: preds.len() - matched,
        changed,
    }
}
