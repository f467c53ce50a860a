//! Pulls the market analysis and the verification prompt out of the meta answer.
//!
//! Models do not always honour the delimiters they were asked for, so the
//! extraction degrades in steps: complete marker pairs, unterminated markers,
//! a verification heading, and finally the raw text.

use serde::Serialize;

pub const ANALYSIS_START: &str = "---LEVEL9_START---";
pub const ANALYSIS_END: &str = "---LEVEL9_END---";
pub const VERIFY_START: &str = "---VERIFY_START---";
pub const VERIFY_END: &str = "---VERIFY_END---";

const MARKERS: [&str; 4] = [ANALYSIS_START, ANALYSIS_END, VERIFY_START, VERIFY_END];

const VERIFY_HEADING_KEYWORDS: [&str; 4] =
    ["verifikation", "verification", "gegenprüf", "prüf-prompt"];

/// How the blocks were found
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtractionMethod {
    /// Every block found was properly delimited
    Markers,
    /// Unterminated markers or a verification heading
    Heuristic,
    /// Nothing recognisable, the whole answer is the analysis
    Raw,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MetaAnalysis {
    pub market_analysis: String,
    pub verification_prompt: Option<String>,
    pub method: ExtractionMethod,
}

struct Block {
    text: String,
    terminated: bool,
}

fn find_block(raw: &str, start: &str, end: &str) -> Option<Block> {
    let begin = raw.find(start)? + start.len();
    let rest = &raw[begin..];

    if let Some(stop) = rest.find(end) {
        return Some(Block {
            text: rest[..stop].trim().to_string(),
            terminated: true,
        });
    }

    let stop = MARKERS
        .iter()
        .filter_map(|m| rest.find(m))
        .min()
        .unwrap_or(rest.len());
    Some(Block {
        text: rest[..stop].trim().to_string(),
        terminated: false,
    })
}

fn strip_markers(text: &str) -> String {
    MARKERS
        .iter()
        .fold(text.to_string(), |acc, m| acc.replace(m, ""))
        .trim()
        .to_string()
}

fn non_empty(text: String) -> Option<String> {
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

fn is_verify_heading(line: &str) -> bool {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.chars().count() > 100 {
        return false;
    }
    let looks_like_heading =
        trimmed.starts_with('#') || trimmed.starts_with("**") || trimmed.ends_with(':');
    let lower = trimmed.to_lowercase();
    looks_like_heading && VERIFY_HEADING_KEYWORDS.iter().any(|k| lower.contains(k))
}

/// Split at the first heading line that announces the verification part
fn split_at_heading(raw: &str) -> Option<(String, String)> {
    let mut offset = 0;
    for line in raw.split_inclusive('\n') {
        if is_verify_heading(line) {
            let before = raw[..offset].trim().to_string();
            let after = raw[offset + line.len()..].trim().to_string();
            if before.is_empty() {
                return None;
            }
            return Some((before, after));
        }
        offset += line.len();
    }
    None
}

/// Extract both blocks from a meta answer
pub fn extract(raw: &str) -> MetaAnalysis {
    let analysis = find_block(raw, ANALYSIS_START, ANALYSIS_END).filter(|b| !b.text.is_empty());
    let verify = find_block(raw, VERIFY_START, VERIFY_END).filter(|b| !b.text.is_empty());

    if let Some(analysis) = analysis {
        let terminated = analysis.terminated && verify.as_ref().map_or(true, |v| v.terminated);
        return MetaAnalysis {
            market_analysis: analysis.text,
            verification_prompt: verify.map(|v| v.text),
            method: if terminated {
                ExtractionMethod::Markers
            } else {
                ExtractionMethod::Heuristic
            },
        };
    }

    // Verification block present, analysis markers missing: the analysis is
    // whatever precedes the verification block.
    if let Some(verify) = verify {
        if let Some(pos) = raw.find(VERIFY_START) {
            if let Some(before) = non_empty(strip_markers(&raw[..pos])) {
                return MetaAnalysis {
                    market_analysis: before,
                    verification_prompt: Some(verify.text),
                    method: ExtractionMethod::Heuristic,
                };
            }
        }
    }

    let cleaned = strip_markers(raw);

    if let Some((before, after)) = split_at_heading(&cleaned) {
        return MetaAnalysis {
            market_analysis: before,
            verification_prompt: non_empty(after),
            method: ExtractionMethod::Heuristic,
        };
    }

    MetaAnalysis {
        market_analysis: cleaned,
        verification_prompt: None,
        method: ExtractionMethod::Raw,
    }
}
