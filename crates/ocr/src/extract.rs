use std::sync::OnceLock;

use cardscan_core::FieldSet;
use regex::Regex;

// ── Compiled regex cache ─────────────────────────────────────────────────────

macro_rules! re {
    ($name:ident, $pat:expr) => {
        fn $name() -> &'static Regex {
            static R: OnceLock<Regex> = OnceLock::new();
            R.get_or_init(|| Regex::new($pat).expect("invalid regex"))
        }
    };
}

// Exactly ten digits; neighbours must be non-digits or the text edge.
re!(re_mssv, r"(?:^|[^0-9])([0-9]{10})(?:[^0-9]|$)");

re!(re_dob, r"\b[0-9]{2}[-/][0-9]{2}[-/][0-9]{4}\b");

// Shortest run of letters/spaces (3+, spaces included) that reaches
// "Khoá học" or the end of text. Trimmed after matching.
re!(re_major, r"Ngành[:\s]*([A-ZÀ-Ỹa-zà-ỹ ]{3,}?)\s*(?:Khoá học|$)");

re!(re_course, r"(?i)Khoá học[:\s]*([0-9]{4}[-–][0-9]{4})");

re!(re_name_after_header,
    r"THẺ SINH VIÊN[\s:]*([A-ZÀ-Ỹ][a-zà-ỹ]+(?: [A-ZÀ-Ỹa-zà-ỹ]+)+)");
re!(re_name_any,
    r"\b([A-ZÀ-Ỹ][a-zà-ỹ]{1,15}(?: [A-ZÀ-Ỹa-zà-ỹ]{1,15})+)\b");

// The "date of birth" label often bleeds into the name line.
re!(re_dob_label_tail, r"(?s)\b(?:Ngày sinh|Ngày|sinh)\b.*");

// ── Public extraction API ─────────────────────────────────────────────────────

pub struct Extractor;

impl Extractor {
    /// Extract card fields from OCR tokens, joined with single spaces in the
    /// order the engine reported them.
    pub fn extract<S: AsRef<str>>(texts: &[S]) -> FieldSet {
        let joined = texts.iter().map(AsRef::as_ref).collect::<Vec<_>>().join(" ");
        Self::extract_text(&joined)
    }

    pub fn extract_text(text: &str) -> FieldSet {
        FieldSet {
            mssv: Self::extract_mssv(text),
            name: Self::extract_name(text),
            dob: Self::extract_dob(text),
            major: Self::extract_major(text),
            course: Self::extract_course(text),
        }
    }

    fn extract_mssv(text: &str) -> Option<String> {
        let c = re_mssv().captures(text)?;
        Some(c.get(1)?.as_str().to_string())
    }

    fn extract_dob(text: &str) -> Option<String> {
        re_dob().find(text).map(|m| m.as_str().to_string())
    }

    fn extract_major(text: &str) -> Option<String> {
        let c = re_major().captures(text)?;
        let major = c.get(1)?.as_str().trim();
        (!major.is_empty()).then(|| major.to_string())
    }

    fn extract_course(text: &str) -> Option<String> {
        let c = re_course().captures(text)?;
        Some(c.get(1)?.as_str().to_string())
    }

    // ── Name ─────────────────────────────────────────────────────────────────

    /// Header-anchored pattern first, then the first capitalized multi-word
    /// run anywhere. Each pattern gets one attempt at its first match.
    fn extract_name(text: &str) -> Option<String> {
        [re_name_after_header(), re_name_any()]
            .into_iter()
            .filter_map(|re| re.captures(text).and_then(|c| c.get(1)))
            .find_map(|m| clean_name(m.as_str()))
    }
}

/// Cut the trailing date-of-birth label; keep only candidates of 2+ words.
fn clean_name(candidate: &str) -> Option<String> {
    let name = re_dob_label_tail().replace(candidate, "");
    let name = name.trim();
    (name.split_whitespace().count() >= 2).then(|| name.to_string())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
