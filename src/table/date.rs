use chrono::NaiveDate;

/// Accepted layouts for the date column, tried in order.
pub const DATE_FORMATS: [&str; 4] = ["%Y/%m/%d", "%Y-%m-%d", "%Y.%m.%d", "%m/%d/%Y"];

/// Lenient date parse of a timestamp cell. Only the first whitespace token
/// (and the part before an ISO `T`) is considered; anything unparseable is
/// `None`, the explicit "no date" marker.
pub fn parse_lenient(raw: &str) -> Option<NaiveDate> {
    let token = raw.split_whitespace().next()?;
    let token = token.split('T').next()?;
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(token, fmt).ok())
}
