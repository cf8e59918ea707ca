//! Canonical HVDC code patterns and normalization.
//!
//! Every code that leaves the extraction engine has the canonical shape
//! `HVDC-<TOKEN>(-<TOKEN>)+`: uppercase, tokens of `[A-Z0-9]`, single `-`
//! separators. Raw spreadsheet text is far messier (`HVDC_ADOPT_SCT_0003`,
//! `hvdc adopt sct 0002`, bare `SCT-0001`), so matching and normalization
//! live together here and are shared by the extractor and the graph
//! validator.

use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

static CANONICAL_RX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^HVDC(?:-[A-Z0-9]+){2,}$").expect("canonical pattern compiles"));

/// Dash or underscore separated codes. Whitespace ends the code, so
/// quantities and descriptions after it in the same cell are not absorbed.
static DELIMITED_RX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\bHVDC(?:[-_]+[A-Z0-9]+){2,}\b").expect("delimited pattern compiles")
});

/// Codes ending in a 3-6 digit run are preferred over the general form.
static NUMTAIL_RX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\bHVDC(?:[-_\s]+[A-Z0-9]+){1,5}[-_\s]+\d{3,6}\b")
        .expect("numeric-tail pattern compiles")
});

static GENERAL_RX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\bHVDC(?:[-_\s]+[A-Z0-9]+){2,6}\b").expect("general pattern compiles")
});

static SCT_RX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bSCT[-_\s]*\d{1,6}\b").expect("SCT fragment pattern compiles"));

static ADOPT_RX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\bADOPT(?:[-_\s]+[A-Z0-9]+){0,4}[-_\s]+\d{1,6}\b")
        .expect("ADOPT fragment pattern compiles")
});

static SEPARATOR_RX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^A-Z0-9]+").expect("separator pattern compiles"));

/// A validated, canonical HVDC code.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct HvdcCode(String);

impl HvdcCode {
    /// Accept `s` only if it is already canonical. No normalization is applied.
    pub fn parse(s: &str) -> Option<Self> {
        if is_canonical(s) {
            Some(Self(s.to_string()))
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The dash-separated tokens after the `HVDC` prefix.
    pub fn tokens(&self) -> impl Iterator<Item = &str> {
        self.0.split('-').skip(1)
    }
}

impl fmt::Display for HvdcCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for HvdcCode {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        if is_canonical(&value) {
            Ok(Self(value))
        } else {
            Err(format!("not a canonical HVDC code: {value}"))
        }
    }
}

impl From<HvdcCode> for String {
    fn from(code: HvdcCode) -> Self {
        code.0
    }
}

/// Whether `s` matches `HVDC-<TOKEN>(-<TOKEN>)+` exactly.
pub fn is_canonical(s: &str) -> bool {
    CANONICAL_RX.is_match(s)
}

/// Which pattern produced a [`CodeMatch`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CodePattern {
    /// `HVDC-…` with dash or underscore separators only.
    Delimited,
    /// `HVDC …` ending in a 3-6 digit token.
    NumericTail,
    /// `HVDC` followed by 2-6 tokens.
    General,
    /// A bare `SCT-0001` style fragment.
    SctFragment,
    /// A bare `ADOPT … <digits>` fragment.
    AdoptFragment,
}

/// A code found inside free text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeMatch {
    /// The exact text the pattern matched.
    pub raw: String,
    /// The normalized code.
    pub code: HvdcCode,
    pub pattern: CodePattern,
}

/// Search `text` for a code fragment.
///
/// Patterns are tried in preference order: dash-delimited HVDC codes,
/// whitespace-separated codes ending in digits, general whitespace-separated
/// codes, then the partial `SCT`/`ADOPT` fragments. The first pattern
/// that yields a normalizable match wins.
pub fn find_code(text: &str) -> Option<CodeMatch> {
    let patterns: [(&Lazy<Regex>, CodePattern); 5] = [
        (&DELIMITED_RX, CodePattern::Delimited),
        (&NUMTAIL_RX, CodePattern::NumericTail),
        (&GENERAL_RX, CodePattern::General),
        (&SCT_RX, CodePattern::SctFragment),
        (&ADOPT_RX, CodePattern::AdoptFragment),
    ];

    for (rx, pattern) in patterns {
        if let Some(m) = rx.find(text) {
            if let Some(code) = normalize_code(m.as_str()) {
                return Some(CodeMatch {
                    raw: m.as_str().to_string(),
                    code,
                    pattern,
                });
            }
        }
    }

    None
}

/// Normalize raw code text into canonical form.
///
/// Trims, uppercases, collapses every run of non-alphanumeric characters
/// into a single `-` and strips leading/trailing dashes. Text that does not
/// already start with `HVDC-` is prefixed: bare `SCT-<digits>` becomes
/// `HVDC-ADOPT-SCT-<digits padded to 4>`, other `SCT-…` and `ADOPT-…`
/// fragments are promoted under `HVDC-ADOPT-`, anything else gets `HVDC-`.
///
/// Returns `None` when the result is not canonical (e.g. a single token).
pub fn normalize_code(raw: &str) -> Option<HvdcCode> {
    let upper = raw.trim().to_uppercase();
    let collapsed = SEPARATOR_RX.replace_all(&upper, "-");
    let s = collapsed.trim_matches('-');
    if s.is_empty() {
        return None;
    }

    let tokens: Vec<&str> = s.split('-').collect();
    let code = match tokens.as_slice() {
        ["HVDC", ..] => s.to_string(),
        [first, ..] if first.starts_with("HVDC") => format!("HVDC-{}", &s["HVDC".len()..]),
        ["SCT", digits] if digits.chars().all(|c| c.is_ascii_digit()) => {
            format!("HVDC-ADOPT-SCT-{digits:0>4}")
        }
        ["SCT", ..] => format!("HVDC-ADOPT-{s}"),
        ["ADOPT", ..] => format!("HVDC-{s}"),
        _ => format!("HVDC-{s}"),
    };

    HvdcCode::parse(&code)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn norm(s: &str) -> Option<String> {
        normalize_code(s).map(String::from)
    }

    #[test]
    fn canonical_code_is_unchanged() {
        assert_eq!(
            norm("HVDC-ADOPT-SCT-0001").as_deref(),
            Some("HVDC-ADOPT-SCT-0001")
        );
        let once = normalize_code("hvdc adopt sct 0001").unwrap();
        assert_eq!(normalize_code(once.as_str()).unwrap(), once);
    }

    #[test]
    fn separators_collapse_to_single_dash() {
        assert_eq!(
            norm(" hvdc__adopt - sct  0003 ").as_deref(),
            Some("HVDC-ADOPT-SCT-0003")
        );
        assert_eq!(norm("-HVDC-ADOPT-X1-").as_deref(), Some("HVDC-ADOPT-X1"));
    }

    #[test]
    fn bare_fragments_are_promoted() {
        assert_eq!(norm("SCT-0001").as_deref(), Some("HVDC-ADOPT-SCT-0001"));
        assert_eq!(norm("sct 7").as_deref(), Some("HVDC-ADOPT-SCT-0007"));
        assert_eq!(norm("ADOPT-PHASE-1").as_deref(), Some("HVDC-ADOPT-PHASE-1"));
        assert_eq!(norm("LSC-0042").as_deref(), Some("HVDC-LSC-0042"));
    }

    #[test]
    fn single_token_is_not_a_code() {
        assert_eq!(norm("HVDC"), None);
        assert_eq!(norm("FOO"), None);
        assert_eq!(norm("  --  "), None);
    }

    #[test]
    fn numeric_tail_is_preferred() {
        let m = find_code("Invoice for HVDC ADOPT SCT 0002 Cable System").unwrap();
        assert_eq!(m.pattern, CodePattern::NumericTail);
        assert_eq!(m.code.as_str(), "HVDC-ADOPT-SCT-0002");
    }

    #[test]
    fn general_pattern_without_numeric_tail() {
        let m = find_code("ref HVDC ADOPT PHASE").unwrap();
        assert_eq!(m.pattern, CodePattern::General);
        assert_eq!(m.code.as_str(), "HVDC-ADOPT-PHASE");
    }

    #[test]
    fn delimited_code_stops_at_whitespace() {
        let m = find_code("HVDC-ADOPT-SCT-0001 100 PCS").unwrap();
        assert_eq!(m.pattern, CodePattern::Delimited);
        assert_eq!(m.raw, "HVDC-ADOPT-SCT-0001");
        assert_eq!(m.code.as_str(), "HVDC-ADOPT-SCT-0001");

        let m = find_code("HVDC-ADOPT-PHASE Cable System").unwrap();
        assert_eq!(m.code.as_str(), "HVDC-ADOPT-PHASE");

        let m = find_code("see HVDC_ADOPT_SCT_0003, 2 cases").unwrap();
        assert_eq!(m.code.as_str(), "HVDC-ADOPT-SCT-0003");
    }

    #[test]
    fn sct_fragment_in_free_text() {
        let m = find_code("SCT-0002 Cable System").unwrap();
        assert_eq!(m.pattern, CodePattern::SctFragment);
        assert_eq!(m.raw, "SCT-0002");
        assert_eq!(m.code.as_str(), "HVDC-ADOPT-SCT-0002");
    }

    #[test]
    fn adopt_fragment_requires_digits() {
        let m = find_code("Project ADOPT Phase 1").unwrap();
        assert_eq!(m.code.as_str(), "HVDC-ADOPT-PHASE-1");
        assert!(find_code("we adopt the plan").is_none());
    }

    #[test]
    fn no_code_in_plain_text() {
        assert!(find_code("Random text without code").is_none());
        assert!(find_code("").is_none());
    }

    #[test]
    fn find_then_normalize_agrees_with_normalize() {
        for s in ["HVDC_ADOPT_SCT_0003", "hvdc-adopt-lsc-0042", "SCT-12"] {
            let found = find_code(s).unwrap().code;
            assert_eq!(Some(found), normalize_code(s), "input {s}");
        }
    }

    #[test]
    fn serde_rejects_non_canonical() {
        let ok: HvdcCode = serde_json::from_str("\"HVDC-ADOPT-SCT-0001\"").unwrap();
        assert_eq!(ok.tokens().collect::<Vec<_>>(), ["ADOPT", "SCT", "0001"]);
        assert!(serde_json::from_str::<HvdcCode>("\"hvdc-adopt\"").is_err());
    }
}
