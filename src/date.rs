//! Normalization of the loose date strings found on scraped pages.

use crate::error::{AppError, Result};
use chrono::{DateTime, Duration, Local, NaiveDate, NaiveDateTime, NaiveTime};
use once_cell::sync::Lazy;
use regex::Regex;

/// Timezone abbreviations cut from the end of date strings. Only entries longer
/// than two characters are used, since single letters collide with words.
const TIMEZONES: &[&str] = &[
    "EET", "CET", "UTC", "EDT", "ULAT", "LHDT", "SAST", "EASST", "BRST", "ADT", "SST", "KRAT",
    "KST", "QYZT", "KGT", "AEST", "PMDT", "AKDT", "BNT", "MAGT", "LINT", "GET", "ANAST", "NCT",
    "TFT", "NFT", "ACDT", "SGT", "MUT", "CEST", "ORAT", "CLT", "VET", "KUYT", "ACWST", "AZT",
    "CCT", "CST", "AMT", "CHOST", "EEST", "IRDT", "CHUT", "MSD", "TOT", "TVT", "ChST", "MST",
    "CHADT", "PDT", "HST", "VLAST", "FKST", "GALT", "MHT", "AZOT", "WITA", "JST", "NZDT", "ART",
    "OMSST", "FNT", "TOST", "AFT", "GST", "PET", "HKT", "SRT", "PKT", "RET", "CIST", "WGST",
    "ANAT", "SYOT", "SAMT", "TKT", "GILT", "GYT", "PMST", "IRST", "NOVT", "IRKT", "CLST", "BST",
    "AWDT", "AEDT", "WAT", "WST", "SCT", "BOT", "KOST", "IOT", "AKST", "CDT", "CHOT", "TRT",
    "WAST", "WFT", "HDT", "WEST", "CXT", "TJT", "NOVST", "EAT", "UYST", "CHAST", "MSK", "ICT",
    "CKT", "ROTT", "AoE", "IST", "COT", "FKT", "WARST", "CVT", "FJT", "PETT", "TMT", "BTT",
    "PYST", "DAVT", "HOVT", "PST", "FET", "MART", "CAST", "TLT", "IDT", "VOST", "YEKST", "NFDT",
    "UYT", "AMST", "AST", "MVT", "NST", "TAHT", "PETST", "ACT", "EAST", "BRT", "YAKT", "SAKT",
    "SRET", "VUT", "DDUT", "NDT", "OMST", "PHT", "VLAT", "GMT", "LHST", "GAMT", "PGT", "EGST",
    "WAKT", "KRAST", "WIB", "AZST", "UZT", "MAWT", "ECT", "CIDST", "CAT", "NPT", "MDT", "WGT",
    "AQTT", "EGT", "PWT", "WET", "YAKST", "MYT", "GFT", "NZST", "AWST", "ALMT", "SBT", "WIT",
    "NUT", "YAPT", "MMT", "PONT", "YEKT", "IRKST", "MAGST", "PYT", "AET", "AZOST", "HOVST",
    "PHOT", "FJST", "ACST", "NRT", "EST", "ULAST",
];

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dt%H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M:%S",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
    "%m/%d/%Y %I:%M %p",
    "%d %B %Y %H:%M",
    "%d %b %Y %H:%M",
    "%B %d, %Y %H:%M",
    "%b %d, %Y %H:%M",
    "%B %d, %Y %I:%M %p",
    "%b %d, %Y %I:%M %p",
    "%B %d %Y %H:%M",
];

const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%m/%d/%Y",
    "%d.%m.%Y",
    "%d %B %Y",
    "%d %b %Y",
    "%B %d, %Y",
    "%b %d, %Y",
    "%B %d %Y",
    "%b %d %Y",
    "%a, %d %b %Y",
    "%A, %B %d, %Y",
];

const TIME_FORMATS: &[&str] = &["%H:%M:%S", "%H:%M", "%I:%M %p", "%I:%M%p", "%I %p", "%I%p"];

static ORDINAL_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b(\d{1,2})(st|nd|rd|th)\b").unwrap());

/// Current local time as `YYYYMMDD_HHMMSS`, handy for unique file names.
pub fn unique_timestamp() -> String {
    Local::now().format("%Y%m%d_%H%M%S").to_string()
}

/// Lowercases `date_string` and cuts it at a trailing timezone abbreviation.
pub fn remove_timezone(date_string: &str) -> String {
    let lowered = date_string.to_lowercase();
    let matched = TIMEZONES
        .iter()
        .map(|tz| format!(" {}", tz.to_lowercase()))
        .find(|tz| lowered.contains(tz.as_str()));

    match matched {
        Some(tz) => {
            tracing::debug!("Found time zone: {}", tz.trim());
            match lowered.rfind(tz.as_str()) {
                Some(index) => lowered[..index].trim().to_string(),
                None => lowered,
            }
        }
        None => lowered,
    }
}

/// Parses a scraped date string relative to `now`.
///
/// Handles leading/trailing dashes, timezone suffixes, ordinal day suffixes and
/// the words `today`, `tomorrow` and `yesterday`. A bare time is placed on
/// `now`'s date; an empty remainder means the start of that day.
pub fn parse_date_string(date_string: &str, now: NaiveDateTime) -> Result<NaiveDateTime> {
    let cleaned = date_string.trim().trim_matches('–').trim().to_lowercase();
    let cleaned = remove_timezone(&cleaned);
    let cleaned = cleaned.replace("today at ", "").replace("today", "");
    let cleaned = cleaned.trim();

    if cleaned.contains("tomorrow") {
        let rest = strip_phrases(cleaned, &["tomorrow at ", "by tomorrow", "tomorrow"]);
        return Ok(parse_absolute(&rest, now, date_string)? + Duration::days(1));
    }
    if cleaned.contains("yesterday") {
        let rest = strip_phrases(cleaned, &["yesterday at ", "yesterday"]);
        return Ok(parse_absolute(&rest, now, date_string)? - Duration::days(1));
    }
    parse_absolute(cleaned, now, date_string)
}

/// Formats a date input. All-digit input is a millisecond Unix epoch (UTC);
/// anything else goes through [`parse_date_string`].
pub fn format_date(input: &str, now: NaiveDateTime) -> Result<NaiveDateTime> {
    let trimmed = input.trim();
    if !trimmed.is_empty() && trimmed.chars().all(|c| c.is_ascii_digit()) {
        let millis: i64 = trimmed
            .parse()
            .map_err(|_| AppError::DateParse(format!("timestamp out of range: '{}'", input)))?;
        return DateTime::from_timestamp_millis(millis)
            .map(|dt| dt.naive_utc())
            .ok_or_else(|| AppError::DateParse(format!("timestamp out of range: '{}'", input)));
    }
    parse_date_string(trimmed, now)
}

/// [`format_date`] rendered as `YYYY-MM-DD`.
pub fn format_date_string(input: &str, now: NaiveDateTime) -> Result<String> {
    Ok(format_date(input, now)?.format("%Y-%m-%d").to_string())
}

fn strip_phrases(text: &str, phrases: &[&str]) -> String {
    phrases
        .iter()
        .fold(text.to_string(), |acc, phrase| acc.replace(phrase, "").trim().to_string())
}

fn parse_absolute(text: &str, now: NaiveDateTime, original: &str) -> Result<NaiveDateTime> {
    let text = ORDINAL_REGEX.replace_all(text.trim(), "$1");
    let text = text.trim();

    if text.is_empty() {
        return Ok(now.date().and_time(NaiveTime::MIN));
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(&text.to_uppercase()) {
        return Ok(dt.naive_local());
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(text) {
        return Ok(dt.naive_local());
    }
    for format in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(text, format) {
            return Ok(dt);
        }
    }
    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(text, format) {
            return Ok(date.and_time(NaiveTime::MIN));
        }
    }
    for format in TIME_FORMATS {
        if let Ok(time) = NaiveTime::parse_from_str(text, format) {
            return Ok(now.date().and_time(time));
        }
    }

    tracing::warn!("Unrecognised date string: '{}'", original);
    Err(AppError::DateParse(format!("unrecognised date: '{}'", original)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 10)
            .unwrap()
            .and_hms_opt(15, 0, 0)
            .unwrap()
    }

    fn ymd_hm(y: i32, m: u32, d: u32, h: u32, min: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, min, 0)
            .unwrap()
    }

    #[test]
    fn test_unique_timestamp_shape() {
        let ts = unique_timestamp();
        assert_eq!(ts.len(), 15);
        assert_eq!(&ts[8..9], "_");
    }

    #[test]
    fn test_remove_timezone() {
        assert_eq!(remove_timezone("March 5, 2024 10:00 EST"), "march 5, 2024 10:00");
        assert_eq!(remove_timezone("2024-03-05 10:00 GMT"), "2024-03-05 10:00");
        assert_eq!(remove_timezone("no zone here"), "no zone here");
    }

    #[test]
    fn test_parse_absolute_formats() {
        assert_eq!(
            parse_date_string("2024-03-05 10:30:00", now()).unwrap(),
            ymd_hm(2024, 3, 5, 10, 30)
        );
        assert_eq!(
            parse_date_string("March 5th, 2024", now()).unwrap(),
            ymd_hm(2024, 3, 5, 0, 0)
        );
        assert_eq!(
            parse_date_string("– 5 Mar 2024 –", now()).unwrap(),
            ymd_hm(2024, 3, 5, 0, 0)
        );
        assert_eq!(
            parse_date_string("03/05/2024 08:15 UTC", now()).unwrap(),
            ymd_hm(2024, 3, 5, 8, 15)
        );
        assert_eq!(
            parse_date_string("2024-03-05T10:30:00Z", now()).unwrap(),
            ymd_hm(2024, 3, 5, 10, 30)
        );
    }

    #[test]
    fn test_parse_relative_words() {
        assert_eq!(
            parse_date_string("Today at 10:30", now()).unwrap(),
            ymd_hm(2024, 3, 10, 10, 30)
        );
        assert_eq!(
            parse_date_string("Tomorrow at 09:00", now()).unwrap(),
            ymd_hm(2024, 3, 11, 9, 0)
        );
        assert_eq!(
            parse_date_string("yesterday", now()).unwrap(),
            ymd_hm(2024, 3, 9, 0, 0)
        );
        assert_eq!(
            parse_date_string("by tomorrow", now()).unwrap(),
            ymd_hm(2024, 3, 11, 0, 0)
        );
    }

    #[test]
    fn test_parse_rejects_garbage() {
        let err = parse_date_string("sometime soon-ish", now()).unwrap_err();
        assert!(matches!(err, AppError::DateParse(_)));
    }

    #[test]
    fn test_format_date_millis_and_string() {
        // 2024-03-05T12:00:00Z
        assert_eq!(
            format_date("1709640000000", now()).unwrap(),
            ymd_hm(2024, 3, 5, 12, 0)
        );
        assert_eq!(
            format_date_string("March 5, 2024", now()).unwrap(),
            "2024-03-05"
        );
    }
}
