//! Recovers the rank given to each patient's causative gene from an
//! interpretation report, and summarizes them.
//!
//! Reports are a sequence of sections:
//!
//! ```text
//! ## Patient 1 - <name>
//! ### Causative Gene: <symbol>
//! ...
//! ### Clinical Interpretation
//! <interpreter output>
//! ```

use std::collections::BTreeMap;
use std::sync::OnceLock;

use regex::{Regex, RegexBuilder};
use serde::Serialize;
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PatientRank {
    pub patient: String,
    pub causative_gene: String,
    pub rank: Option<u32>,
}

fn patient_header() -> &'static Regex {
    static HEADER: OnceLock<Regex> = OnceLock::new();
    HEADER.get_or_init(|| Regex::new(r"## Patient \d+ - ").expect("static regex"))
}

fn causative_line() -> &'static Regex {
    static CAUSATIVE: OnceLock<Regex> = OnceLock::new();
    CAUSATIVE.get_or_init(|| Regex::new(r"### Causative Gene: ([^\n]+)").expect("static regex"))
}

/// The ways interpreters have been seen to state a rank, most specific
/// first. `{g}` is the escaped gene symbol.
const RANK_PATTERNS: &[&str] = &[
    r"Rank:\s*(\d+)[^\n]*\n[^\n]*Gene:\s*{g}",
    r"Rank:\s*(\d+)\s*\nGene:\s*\*\*{g}\*\*",
    r"\*\*Rank:\s*(\d+)\*\*\s*\nGene:\s*\*\*{g}\*\*",
    r"\*\*Rank:\s*(\d+)\*\*\s*\nGene:\s*\*\*{g}\s*\(([^)]+)\)\*\*",
    r"Gene:\s*{g}[^\n]*\n[^\n]*Rank:\s*(\d+)",
    r"#(\d+)[^\n]*:\s*{g}",
    r"(\d+)\.\s*\*\*{g}\*\*",
    r"Rank\s*(\d+):\s*{g}",
    r"{g}[^\n]*ranked\s*#?(\d+)",
];

/// First rank stated for `gene` in `interpretation`, if any.
pub fn find_rank(interpretation: &str, gene: &str) -> Option<u32> {
    let escaped = regex::escape(gene);
    RANK_PATTERNS.iter().find_map(|pattern| {
        let re = RegexBuilder::new(&pattern.replace("{g}", &escaped))
            .case_insensitive(true)
            .build()
            .ok()?;
        re.captures(interpretation)?.get(1)?.as_str().parse().ok()
    })
}

pub fn parse_ranks(report: &str) -> Vec<PatientRank> {
    let mut results = Vec::new();

    for section in patient_header().split(report) {
        if section.trim().is_empty() {
            continue;
        }
        let patient = section.lines().next().unwrap_or_default().trim().to_string();
        let Some(gene) = causative_line()
            .captures(section)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().trim().to_string())
        else {
            continue;
        };

        let interpretation = section
            .rsplit_once("### Clinical Interpretation")
            .map(|(_, rest)| rest)
            .unwrap_or("");
        let rank = find_rank(interpretation, &gene);
        if rank.is_none() {
            warn!(patient = %patient, gene = %gene, "rank for causative gene not found");
        }

        results.push(PatientRank {
            patient,
            causative_gene: gene,
            rank,
        });
    }

    results
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankStats {
    pub total_patients: usize,
    pub patients_with_ranks: usize,
    pub patients_missing_ranks: usize,
    pub average_rank: Option<f64>,
    /// Upper median.
    pub median_rank: Option<u32>,
    pub rank_distribution: BTreeMap<u32, usize>,
}

impl RankStats {
    pub fn from_ranks(ranks: &[PatientRank]) -> Self {
        let mut found: Vec<u32> = ranks.iter().filter_map(|r| r.rank).collect();
        found.sort_unstable();

        let mut rank_distribution = BTreeMap::new();
        for &rank in &found {
            *rank_distribution.entry(rank).or_insert(0) += 1;
        }

        let average_rank = if found.is_empty() {
            None
        } else {
            Some(found.iter().map(|&r| r as f64).sum::<f64>() / found.len() as f64)
        };

        Self {
            total_patients: ranks.len(),
            patients_with_ranks: found.len(),
            patients_missing_ranks: ranks.len() - found.len(),
            average_rank,
            median_rank: found.get(found.len() / 2).copied(),
            rank_distribution,
        }
    }
}
