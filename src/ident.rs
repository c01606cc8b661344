use regex::Regex;
use std::sync::OnceLock;

static EXAM_IDENT_RE: OnceLock<Regex> = OnceLock::new();

/// True iff `s` is exactly 4 ASCII digits followed by 2 uppercase ASCII
/// letters (e.g. "2023AA"). No normalization is performed here; callers
/// uppercase user input before validating.
pub fn is_valid_exam_identifier(s: &str) -> bool {
    let re = EXAM_IDENT_RE
        .get_or_init(|| Regex::new(r"^[0-9]{4}[A-Z]{2}$").expect("exam identifier regex"));
    re.is_match(s)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_year_plus_two_letters() {
        assert!(is_valid_exam_identifier("2023AA"));
        assert!(is_valid_exam_identifier("2019BC"));
        assert!(is_valid_exam_identifier("0000ZZ"));
    }

    #[test]
    fn rejects_everything_else() {
        assert!(!is_valid_exam_identifier(""));
        assert!(!is_valid_exam_identifier("AA2023"));
        assert!(!is_valid_exam_identifier("202AAB"));
        assert!(!is_valid_exam_identifier("2023aa"));
        assert!(!is_valid_exam_identifier("2023AAA"));
        assert!(!is_valid_exam_identifier(" 2023AA"));
        assert!(!is_valid_exam_identifier("2023AA "));
        assert!(!is_valid_exam_identifier("20３3AA"));
    }
}
