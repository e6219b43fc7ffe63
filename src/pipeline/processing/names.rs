//! Surface-form country name standardization.
//!
//! Only whitespace, a leading "the" and letter case are touched; genuine
//! aliases such as "Ivory Coast" and "Côte d'Ivoire" stay distinct.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

static LEADING_THE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)^the\s+").expect("valid regex"));

/// A name that standardization changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NameCorrection {
    #[serde(rename = "Original")]
    pub original: String,
    #[serde(rename = "Standardized")]
    pub standardized: String,
}

/// Standardizes a single country name.
pub fn standardize_name(raw: &str) -> String {
    let trimmed = raw.trim();
    let without_article = LEADING_THE.replace(trimmed, "");
    title_case(&without_article)
}

/// Standardizes every name, returning the new names (same length and order)
/// and one correction per entry that changed.
pub fn standardize_names<S: AsRef<str>>(names: &[S]) -> (Vec<String>, Vec<NameCorrection>) {
    let mut corrections = Vec::new();
    let standardized = names
        .iter()
        .map(|name| {
            let original = name.as_ref();
            let new = standardize_name(original);
            if new != original {
                corrections.push(NameCorrection {
                    original: original.to_string(),
                    standardized: new.clone(),
                });
            }
            new
        })
        .collect();
    (standardized, corrections)
}

/// Uppercases the first letter of every run of letters and lowercases the
/// rest, so "guinea-bissau" becomes "Guinea-Bissau".
fn title_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut in_word = false;
    for c in s.chars() {
        if c.is_alphabetic() {
            if in_word {
                out.extend(c.to_lowercase());
            } else {
                out.extend(c.to_uppercase());
            }
            in_word = true;
        } else {
            out.push(c);
            in_word = false;
        }
    }
    out
}
