//! extract.rs — Best-effort parameter extraction from a question.
//!
//! Pulls a creator id, numeric literals and one calendar date out of the raw
//! Russian text. Only the fallback generator consumes these; a miss simply
//! leaves the field empty.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref CREATOR_ID_RE: Regex = Regex::new(r"\bid\s+([\w-]+)").expect("creator id regex");
    static ref NUMBER_RE: Regex = Regex::new(r"\b\d[\d\s]*\d\b").expect("number regex");
    static ref DATE_RE: Regex = Regex::new(r"(\d{1,2})\s+(\w+)\s+(\d{4})").expect("date regex");
}

/// Genitive and nominative month names.
const MONTHS: &[(&str, &str)] = &[
    ("января", "01"),
    ("февраля", "02"),
    ("марта", "03"),
    ("апреля", "04"),
    ("мая", "05"),
    ("июня", "06"),
    ("июля", "07"),
    ("августа", "08"),
    ("сентября", "09"),
    ("октября", "10"),
    ("ноября", "11"),
    ("декабря", "12"),
    ("январь", "01"),
    ("февраль", "02"),
    ("март", "03"),
    ("апрель", "04"),
    ("май", "05"),
    ("июнь", "06"),
    ("июль", "07"),
    ("август", "08"),
    ("сентябрь", "09"),
    ("октябрь", "10"),
    ("ноябрь", "11"),
    ("декабрь", "12"),
];

/// Parameters recognised in a question. Empty fields mean "not found".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractedParams {
    pub creator_id: Option<String>,
    pub numbers: Vec<i64>,
    /// `YYYY-MM-DD`, not validated against the calendar.
    pub date: Option<String>,
}

impl ExtractedParams {
    pub fn is_empty(&self) -> bool {
        self.creator_id.is_none() && self.numbers.is_empty() && self.date.is_none()
    }

    pub fn first_number(&self) -> Option<i64> {
        self.numbers.first().copied()
    }
}

/// Extract parameters from `question`. Never fails.
pub fn extract(question: &str) -> ExtractedParams {
    let lowered = question.to_lowercase();

    ExtractedParams {
        creator_id: extract_creator_id(&lowered),
        numbers: extract_numbers(question),
        date: extract_date(&lowered),
    }
}

fn extract_creator_id(lowered: &str) -> Option<String> {
    CREATOR_ID_RE
        .captures(lowered)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

fn extract_numbers(question: &str) -> Vec<i64> {
    NUMBER_RE
        .find_iter(question)
        .filter_map(|m| {
            let digits: String = m
                .as_str()
                .chars()
                .filter(|c| !matches!(c, ' ' | ',' | '.'))
                .collect();
            if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
                return None;
            }
            digits.parse::<i64>().ok()
        })
        .collect()
}

fn extract_date(lowered: &str) -> Option<String> {
    let caps = DATE_RE.captures(lowered)?;
    let day = caps.get(1)?.as_str();
    let month_word = caps.get(2)?.as_str();
    let year = caps.get(3)?.as_str();

    let month = month_number(month_word)?;
    Some(format!("{year}-{month}-{day:0>2}"))
}

fn month_number(word: &str) -> Option<&'static str> {
    MONTHS
        .iter()
        .find(|(name, _)| *name == word)
        .map(|(_, number)| *number)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_creator_id() {
        assert_eq!(extract("id abc-123").creator_id.as_deref(), Some("abc-123"));
        assert_eq!(
            extract("Сколько видео у креатора с ID Creator_42?").creator_id.as_deref(),
            Some("creator_42")
        );
        assert_eq!(extract("Сколько всего видео?").creator_id, None);
    }

    #[test]
    fn test_grouped_number() {
        assert_eq!(extract("100 000").numbers, vec![100000]);
        assert_eq!(
            extract("больше 100000 просмотров").numbers,
            vec![100000]
        );
    }

    #[test]
    fn test_numbers_next_to_words() {
        let params = extract("Сколько видео набрало больше 250 000 просмотров к 28 ноября 2025?");
        assert_eq!(params.first_number(), Some(250000));
    }

    #[test]
    fn test_only_space_groups_digits() {
        assert_eq!(extract("больше 100 000 просмотров").numbers, vec![100000]);
        assert!(extract("100\t000").numbers.is_empty());
        assert!(extract("100\n000").numbers.is_empty());
        assert!(extract("100\u{a0}000").numbers.is_empty());
    }

    #[test]
    fn test_single_digits_are_not_numbers() {
        assert!(extract("с 1 по 5").numbers.is_empty());
    }

    #[test]
    fn test_date_genitive() {
        assert_eq!(extract("27 ноября 2025").date.as_deref(), Some("2025-11-27"));
        assert_eq!(extract("вышли 3 мая 2024").date.as_deref(), Some("2024-05-03"));
    }

    #[test]
    fn test_date_nominative_and_case() {
        assert_eq!(extract("5 НОЯБРЬ 2025").date.as_deref(), Some("2025-11-05"));
        assert_eq!(extract("1 Май 2023").date.as_deref(), Some("2023-05-01"));
    }

    #[test]
    fn test_date_is_not_calendar_checked() {
        assert_eq!(extract("31 февраля 2025").date.as_deref(), Some("2025-02-31"));
    }

    #[test]
    fn test_unknown_month_yields_no_date() {
        assert_eq!(extract("12 попугаев 2025").date, None);
    }

    #[test]
    fn test_nothing_found() {
        let params = extract("привет");
        assert!(params.is_empty());
        assert_eq!(params, ExtractedParams::default());
    }
}
