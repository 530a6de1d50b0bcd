//! Similarity scoring between an unknown node type and catalog entries.
//!
//! Scores are broken down per factor so callers can show and test why a
//! suggestion was made:
//!
//! | factor            | contribution |
//! |-------------------|--------------|
//! | name similarity   | 0..=70       |
//! | package match     | 0 or 10      |
//! | substring match   | 0 or 20      |
//! | known mistake     | 0 or 100     |
//!
//! The total is capped at 100.

use serde::{Deserialize, Serialize};

use crate::catalog::{NodeCatalog, base_name, normalize_node_type};

const NAME_WEIGHT: f64 = 70.0;
const PACKAGE_SCORE: u32 = 10;
const SUBSTRING_SCORE: u32 = 20;
const PATTERN_SCORE: u32 = 100;
/// Suggestions scoring below this are not reported at all.
const MIN_SUGGESTION_SCORE: u32 = 30;

/// Commonly mistyped node names and the base name they stand for.
const KNOWN_MISTAKES: &[(&str, &str)] = &[
    ("webhooktrigger", "webhook"),
    ("http", "httpRequest"),
    ("httpnode", "httpRequest"),
    ("httprequestnode", "httpRequest"),
    ("request", "httpRequest"),
    ("ifnode", "if"),
    ("condition", "if"),
    ("conditional", "if"),
    ("switchnode", "switch"),
    ("router", "switch"),
    ("function", "code"),
    ("functionitem", "code"),
    ("javascript", "code"),
    ("cron", "scheduleTrigger"),
    ("schedule", "scheduleTrigger"),
    ("interval", "scheduleTrigger"),
    ("start", "manualTrigger"),
    ("manual", "manualTrigger"),
    ("setnode", "set"),
    ("editfields", "set"),
    ("sendemail", "emailSend"),
    ("email", "emailSend"),
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimilarityScore {
    pub name_similarity: u32,
    pub package_match: u32,
    pub substring_match: u32,
    pub pattern_match: u32,
    pub total: u32,
}

impl SimilarityScore {
    pub fn is_pattern_match(&self) -> bool {
        self.pattern_match > 0
    }

    /// Human readable explanation of the non-zero factors.
    pub fn reasons(&self) -> Vec<String> {
        let mut reasons = Vec::new();
        if self.pattern_match > 0 {
            reasons.push("known naming mistake".to_string());
        }
        if self.name_similarity > 0 {
            reasons.push(format!("name similarity {}/{}", self.name_similarity, NAME_WEIGHT as u32));
        }
        if self.package_match > 0 {
            reasons.push("same package".to_string());
        }
        if self.substring_match > 0 {
            reasons.push("partial name match".to_string());
        }
        reasons
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeSuggestion {
    pub node_type: String,
    pub score: SimilarityScore,
}

fn package_of(node_type: &str) -> &str {
    node_type.rsplit_once('.').map(|(p, _)| p).unwrap_or("")
}

fn simplify(name: &str) -> String {
    name.chars().filter(|c| c.is_ascii_alphanumeric()).collect::<String>().to_lowercase()
}

/// Calculate Levenshtein distance
fn levenshtein_distance(
    a: &str,
    b: &str,
) -> usize {
    let a_chars: Vec<char> = a.chars().collect();
    let b_chars: Vec<char> = b.chars().collect();
    let m = a_chars.len();
    let n = b_chars.len();

    if m == 0 {
        return n;
    }
    if n == 0 {
        return m;
    }

    let mut dp = vec![vec![0; n + 1]; m + 1];
    for (i, row) in dp.iter_mut().enumerate() {
        row[0] = i;
    }
    for j in 0..=n {
        dp[0][j] = j;
    }

    for i in 1..=m {
        for j in 1..=n {
            let cost = if a_chars[i - 1] == b_chars[j - 1] { 0 } else { 1 };
            dp[i][j] = (dp[i - 1][j] + 1).min(dp[i][j - 1] + 1).min(dp[i - 1][j - 1] + cost);
        }
    }

    dp[m][n]
}

fn levenshtein_similarity(
    a: &str,
    b: &str,
) -> f64 {
    let max_len = a.chars().count().max(b.chars().count());
    if max_len == 0 {
        return 1.0;
    }
    1.0 - (levenshtein_distance(a, b) as f64 / max_len as f64)
}

/// Score how likely `candidate` is the node type meant by `input`.
pub fn score_candidate(
    input: &str,
    candidate: &str,
) -> SimilarityScore {
    let input_full = normalize_node_type(input);
    let candidate_full = normalize_node_type(candidate);
    let input_base = simplify(base_name(&input_full));
    let candidate_base_raw = base_name(&candidate_full);
    let candidate_base = simplify(candidate_base_raw);

    let name_similarity = (levenshtein_similarity(&input_base, &candidate_base) * NAME_WEIGHT).round() as u32;
    let package_match = if package_of(&input_full) == package_of(&candidate_full) { PACKAGE_SCORE } else { 0 };
    let substring_match = if input_base != candidate_base
        && input_base.len().min(candidate_base.len()) >= 3
        && (input_base.contains(&candidate_base) || candidate_base.contains(&input_base))
    {
        SUBSTRING_SCORE
    } else {
        0
    };
    let known_mistake = KNOWN_MISTAKES.iter().any(|(wrong, right)| *wrong == input_base && *right == candidate_base_raw);
    let case_mismatch = input_base == candidate_base && base_name(&input_full) != candidate_base_raw;
    let pattern_match = if known_mistake || case_mismatch { PATTERN_SCORE } else { 0 };

    let total = (name_similarity + package_match + substring_match + pattern_match).min(100);
    SimilarityScore {
        name_similarity,
        package_match,
        substring_match,
        pattern_match,
        total,
    }
}

/// Rank catalog node types by similarity to `input`, best first.
pub fn suggest_node_types(
    catalog: &dyn NodeCatalog,
    input: &str,
    limit: usize,
) -> Vec<NodeSuggestion> {
    let mut suggestions: Vec<NodeSuggestion> = catalog
        .node_types()
        .into_iter()
        .map(|node_type| {
            let score = score_candidate(input, &node_type);
            NodeSuggestion { node_type, score }
        })
        .filter(|s| s.score.total >= MIN_SUGGESTION_SCORE)
        .collect();
    suggestions.sort_by(|a, b| b.score.total.cmp(&a.score.total).then_with(|| a.node_type.cmp(&b.node_type)));
    suggestions.truncate(limit);
    suggestions
}
