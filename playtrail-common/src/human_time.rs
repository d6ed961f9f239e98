//! Human-readable listening time formatting
//!
//! Totals are shown in the largest unit that applies, with hours never
//! rolled up into days: `"50h 3m 0s"`, `"4m 12s"`, `"9s"`.

/// Format a total listening time given in milliseconds.
///
/// `None` means the aggregate had no rows to sum.
///
/// # Examples
///
/// ```
/// use playtrail_common::human_time::format_listening_time;
///
/// assert_eq!(format_listening_time(None), "0 s");
/// assert_eq!(format_listening_time(Some(9_400)), "9s");
/// assert_eq!(format_listening_time(Some(252_000)), "4m 12s");
/// assert_eq!(format_listening_time(Some(180_180_000)), "50h 3m 0s");
/// ```
pub fn format_listening_time(ms: Option<i64>) -> String {
    let Some(ms) = ms else {
        return "0 s".to_string();
    };

    let total_seconds = ms.max(0) / 1000;
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;

    if hours > 0 {
        format!("{}h {}m {}s", hours, minutes, seconds)
    } else if minutes > 0 {
        format!("{}m {}s", minutes, seconds)
    } else {
        format!("{}s", seconds)
    }
}
