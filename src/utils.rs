use chrono::{Datelike, Months, NaiveDate};

/// Offset between the Buddhist Era years used upstream and the Gregorian calendar.
pub const BUDDHIST_ERA_OFFSET: i32 = 543;

const THAI_MONTHS: [&str; 12] = [
    "มกราคม",
    "กุมภาพันธ์",
    "มีนาคม",
    "เมษายน",
    "พฤษภาคม",
    "มิถุนายน",
    "กรกฎาคม",
    "สิงหาคม",
    "กันยายน",
    "ตุลาคม",
    "พฤศจิกายน",
    "ธันวาคม",
];

const THAI_MONTHS_SHORT: [&str; 12] = [
    "ม.ค.", "ก.พ.", "มี.ค.", "เม.ย.", "พ.ค.", "มิ.ย.", "ก.ค.", "ส.ค.", "ก.ย.", "ต.ค.", "พ.ย.", "ธ.ค.",
];

/// Parses either an ISO date (`2024-01-16`) or the upstream Thai form
/// (`16 มกราคม 2567`, day / month name / Buddhist Era year).
pub fn parse_thai_date(input: &str) -> Option<NaiveDate> {
    let input = input.trim();
    if let Ok(date) = NaiveDate::parse_from_str(input, "%Y-%m-%d") {
        return Some(date);
    }

    let parts: Vec<&str> = input.split_whitespace().collect();
    if parts.len() < 3 {
        return None;
    }

    let day: u32 = parts[0].parse().ok()?;
    let month = THAI_MONTHS.iter().position(|m| *m == parts[1])? as u32 + 1;
    let year = parts[2].parse::<i32>().ok()? - BUDDHIST_ERA_OFFSET;
    NaiveDate::from_ymd_opt(year, month, day)
}

pub fn thai_date_to_iso(input: &str) -> Option<String> {
    parse_thai_date(input).map(|d| d.format("%Y-%m-%d").to_string())
}

/// `2024-01-16` -> `16 มกราคม 2567`
pub fn format_date_thai(date: NaiveDate) -> String {
    format!(
        "{} {} {}",
        date.day(),
        THAI_MONTHS[date.month0() as usize],
        date.year() + BUDDHIST_ERA_OFFSET
    )
}

/// `2024-01-16` -> `16 ม.ค. 2567`
pub fn format_date_short(date: NaiveDate) -> String {
    format!(
        "{} {} {}",
        date.day(),
        THAI_MONTHS_SHORT[date.month0() as usize],
        date.year() + BUDDHIST_ERA_OFFSET
    )
}

/// Every scheduled publication date (1st and 16th) of a year.
pub fn draw_dates_for_year(year: i32) -> Vec<NaiveDate> {
    let mut dates = Vec::new();

    for month in 1..=12 {
        for day in [1, 16] {
            if let Some(date) = NaiveDate::from_ymd_opt(year, month, day) {
                dates.push(date);
            }
        }
    }

    dates
}

/// First date still inside the main window ending at `today`.
pub fn window_cutoff(today: NaiveDate, years: u32) -> NaiveDate {
    today
        .checked_sub_months(Months::new(years.saturating_mul(12)))
        .unwrap_or(NaiveDate::MIN)
}
