//! Listening statistics over the `history` table
//!
//! A [`StatsRequest`] is validated and compiled into a [`StatsQuery`]: SQL
//! text assembled from a fixed set of clauses plus the values to bind. User
//! input only ever travels as bound parameters.
//!
//! Every grouped query selects the same three columns (`artists`,
//! `track_name`, `value`) so one row type serves all groupings.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde::Serialize;
use sqlx::{Row, SqlitePool};
use std::str::FromStr;

use crate::db::models::MAX_ARTISTS;
use crate::human_time::format_listening_time;
use crate::time::to_db_timestamp;
use crate::{Error, Result};

/// A play counts as a stream once it reached this position
pub const COUNTED_STREAM_MIN_MS: i64 = 45_000;

const ARTISTS_JOINED: &str =
    "artist1 || COALESCE(', ' || artist2, '') || COALESCE(', ' || artist3, '')";

const ARTIST_UNION: &str = "(
    SELECT played_at, artist1 AS artist, track_name, progress FROM history
    UNION ALL
    SELECT played_at, artist2 AS artist, track_name, progress FROM history WHERE artist2 IS NOT NULL
    UNION ALL
    SELECT played_at, artist3 AS artist, track_name, progress FROM history WHERE artist3 IS NOT NULL
) AS per_artist";

/// What a grouped query aggregates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Metric {
    /// Number of plays that reached [`COUNTED_STREAM_MIN_MS`]
    Streams,
    /// Sum of progress over all plays
    Duration,
}

/// Top-list breakdown used when no artist is given
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Breakdown {
    Artists,
    Tracks,
}

impl FromStr for Breakdown {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "artists" => Ok(Self::Artists),
            "tracks" => Ok(Self::Tracks),
            _ => Err(Error::InvalidInput(
                "Invalid type selected. Allowed types: 'artists', 'tracks'.".to_string(),
            )),
        }
    }
}

/// Raw stats parameters as a user supplies them
#[derive(Debug, Clone, Default)]
pub struct StatsRequest {
    pub artists: Vec<String>,
    pub track: Option<String>,
    pub start: Option<String>,
    pub end: Option<String>,
    pub limit: Option<i64>,
    /// `"artists"` or `"tracks"`; ignored when artists are given
    pub breakdown: Option<String>,
}

/// A value bound into a compiled query
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatsParam {
    Text(String),
    Int(i64),
}

/// Compiled SQL plus its bind values, in order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatsQuery {
    pub sql: String,
    pub params: Vec<StatsParam>,
}

/// One aggregated row
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatsRow {
    /// Comma-joined artist names, or the single artist for an artist breakdown
    pub artists: Option<String>,
    pub track_name: Option<String>,
    /// Stream count or total milliseconds, depending on the metric
    pub value: i64,
}

impl StatsRow {
    /// Value as shown to a user
    pub fn display_value(&self, metric: Metric) -> String {
        match metric {
            Metric::Streams => self.value.to_string(),
            Metric::Duration => format_listening_time(Some(self.value)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Grouping {
    /// Several artists plus a track: one row per credited line-up
    ArtistsAndTrack,
    /// One artist: one row per track they appear on
    TracksOfArtist,
    /// Top artists, counting every credited position
    TopArtists,
    /// Top tracks across all artists
    TopTracks,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Clause {
    MinProgress(i64),
    ArtistIn(Vec<String>),
    ArtistIs(String),
    TrackPrefix(String),
    PlayedFrom(DateTime<Utc>),
    PlayedUntil(DateTime<Utc>),
}

impl Clause {
    fn push_sql(&self, sql: &mut Vec<String>, params: &mut Vec<StatsParam>) {
        match self {
            Clause::MinProgress(ms) => {
                sql.push("progress >= ?".to_string());
                params.push(StatsParam::Int(*ms));
            }
            Clause::ArtistIn(names) => {
                let placeholders = vec!["?"; names.len()].join(", ");
                let alternatives: Vec<String> = (1..=MAX_ARTISTS)
                    .map(|i| format!("artist{} IN ({})", i, placeholders))
                    .collect();
                sql.push(format!("({})", alternatives.join(" OR ")));
                for _ in 1..=MAX_ARTISTS {
                    params.extend(names.iter().cloned().map(StatsParam::Text));
                }
            }
            Clause::ArtistIs(name) => {
                sql.push("(artist1 = ? OR artist2 = ? OR artist3 = ?)".to_string());
                for _ in 1..=MAX_ARTISTS {
                    params.push(StatsParam::Text(name.clone()));
                }
            }
            Clause::TrackPrefix(prefix) => {
                sql.push(r"track_name LIKE ? ESCAPE '\'".to_string());
                params.push(StatsParam::Text(format!("{}%", escape_like(prefix))));
            }
            Clause::PlayedFrom(ts) => {
                sql.push("played_at >= ?".to_string());
                params.push(StatsParam::Text(to_db_timestamp(ts)));
            }
            Clause::PlayedUntil(ts) => {
                sql.push("played_at <= ?".to_string());
                params.push(StatsParam::Text(to_db_timestamp(ts)));
            }
        }
    }
}

fn escape_like(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Parse a user-supplied date or date-time as UTC
///
/// Accepts `-`, `/` or space as the date separator, zero-padded or not,
/// optionally followed by `T` or a space and `HH:MM[:SS[.f]]`. A bare date means the start of the
/// day, or its last microsecond when `end_of_day` is set.
pub fn parse_date_bound(input: &str, end_of_day: bool) -> Result<DateTime<Utc>> {
    let trimmed = input.trim();
    let invalid = || Error::InvalidInput(format!("Invalid date: '{}'", input));

    // The time part starts after the last `T` or space before its first colon
    let (date_str, time_str) = match trimmed.find(':') {
        Some(colon) => {
            let split = trimmed[..colon]
                .rfind(|c| c == 'T' || c == ' ')
                .ok_or_else(invalid)?;
            (&trimmed[..split], Some(&trimmed[split + 1..]))
        }
        None => (trimmed, None),
    };

    let date_part: String = date_str
        .chars()
        .map(|c| if c == '/' || c == ' ' { '-' } else { c })
        .collect();
    let date = NaiveDate::parse_from_str(&date_part, "%Y-%m-%d").map_err(|_| invalid())?;

    let time = match time_str {
        Some(rest) => NaiveTime::parse_from_str(rest, "%H:%M:%S%.f")
            .or_else(|_| NaiveTime::parse_from_str(rest, "%H:%M"))
            .map_err(|_| invalid())?,
        None if end_of_day => {
            NaiveTime::from_hms_micro_opt(23, 59, 59, 999_999).ok_or_else(invalid)?
        }
        None => NaiveTime::from_hms_opt(0, 0, 0).ok_or_else(invalid)?,
    };

    Ok(NaiveDateTime::new(date, time).and_utc())
}

/// Resolve optional start/end inputs, checking their order
fn date_clauses(start: Option<&str>, end: Option<&str>) -> Result<Vec<Clause>> {
    let start = start.map(|s| parse_date_bound(s, false)).transpose()?;
    let end = end.map(|s| parse_date_bound(s, true)).transpose()?;

    if let (Some(start), Some(end)) = (start, end) {
        if end < start {
            return Err(Error::InvalidInput(
                "The end date cannot be earlier than the start date.".to_string(),
            ));
        }
    }

    let mut clauses = Vec::new();
    if let Some(start) = start {
        clauses.push(Clause::PlayedFrom(start));
    }
    if let Some(end) = end {
        clauses.push(Clause::PlayedUntil(end));
    }
    Ok(clauses)
}

impl StatsRequest {
    fn has_no_parameters(&self) -> bool {
        self.artists.is_empty()
            && self.track.is_none()
            && self.start.is_none()
            && self.end.is_none()
            && self.limit.is_none()
            && self.breakdown.is_none()
    }

    fn has_only_limit(&self) -> bool {
        self.limit.is_some()
            && self.artists.is_empty()
            && self.track.is_none()
            && self.start.is_none()
            && self.end.is_none()
            && self.breakdown.is_none()
    }

    /// Apply the request rules and pick a grouping
    fn grouping(&self) -> Result<Grouping> {
        let reject = |msg: &str| Err(Error::InvalidInput(msg.to_string()));

        if self.has_no_parameters() {
            return reject("No parameters were selected.");
        }
        if self.has_only_limit() {
            return reject("Select additional parameters.");
        }
        if self.track.is_some() && self.artists.is_empty() {
            return reject("Missing data: enter at least one artist.");
        }
        if self.artists.len() > MAX_ARTISTS {
            return reject("Too many artists entered. The maximum allowed is 3.");
        }
        if self.artists.len() > 1 && self.track.is_none() {
            return reject("Missing data: enter a track name.");
        }

        // Breakdown only matters for top lists
        let breakdown = if self.artists.is_empty() {
            self.breakdown.as_deref().map(Breakdown::from_str).transpose()?
        } else {
            None
        };

        match (self.artists.is_empty(), self.track.is_some(), breakdown) {
            (false, true, _) => Ok(Grouping::ArtistsAndTrack),
            (false, false, _) => Ok(Grouping::TracksOfArtist),
            (true, _, Some(Breakdown::Artists)) => Ok(Grouping::TopArtists),
            (true, _, Some(Breakdown::Tracks)) => Ok(Grouping::TopTracks),
            (true, _, None) => reject("Select additional parameters."),
        }
    }

    /// Validate and compile into SQL for the given metric
    pub fn compile(&self, metric: Metric) -> Result<StatsQuery> {
        let grouping = self.grouping()?;

        let mut clauses = Vec::new();
        if metric == Metric::Streams {
            clauses.push(Clause::MinProgress(COUNTED_STREAM_MIN_MS));
        }
        match grouping {
            Grouping::ArtistsAndTrack => {
                clauses.push(Clause::ArtistIn(self.artists.clone()));
                if let Some(track) = &self.track {
                    clauses.push(Clause::TrackPrefix(track.clone()));
                }
            }
            Grouping::TracksOfArtist => {
                clauses.push(Clause::ArtistIs(self.artists[0].clone()));
            }
            Grouping::TopArtists | Grouping::TopTracks => {}
        }
        clauses.extend(date_clauses(self.start.as_deref(), self.end.as_deref())?);

        let aggregate = match metric {
            Metric::Streams => "COUNT(*)",
            Metric::Duration => "COALESCE(SUM(progress), 0)",
        };

        let (columns, from, group_by) = match grouping {
            Grouping::ArtistsAndTrack => (
                format!("{} AS artists, track_name", ARTISTS_JOINED),
                "history",
                "artist1, artist2, artist3, track_name",
            ),
            Grouping::TracksOfArtist => (
                "NULL AS artists, track_name".to_string(),
                "history",
                "track_name",
            ),
            Grouping::TopArtists => (
                "artist AS artists, NULL AS track_name".to_string(),
                ARTIST_UNION,
                "artist",
            ),
            Grouping::TopTracks => (
                format!("{} AS artists, track_name", ARTISTS_JOINED),
                "history",
                "artist1, artist2, artist3, track_name",
            ),
        };

        let mut params = Vec::new();
        let mut conditions = Vec::new();
        for clause in &clauses {
            clause.push_sql(&mut conditions, &mut params);
        }

        let mut sql = format!("SELECT {}, {} AS value FROM {}", columns, aggregate, from);
        if !conditions.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&conditions.join(" AND "));
        }
        sql.push_str(&format!(
            " GROUP BY {} ORDER BY value DESC, artists, track_name",
            group_by
        ));

        if let Some(limit) = self.limit.filter(|l| *l > 0) {
            sql.push_str(" LIMIT ?");
            params.push(StatsParam::Int(limit));
        }

        Ok(StatsQuery { sql, params })
    }
}

/// Compile a total-listening-time query over an optional date range
pub fn compile_total(start: Option<&str>, end: Option<&str>) -> Result<StatsQuery> {
    let mut conditions = Vec::new();
    let mut params = Vec::new();
    for clause in date_clauses(start, end)? {
        clause.push_sql(&mut conditions, &mut params);
    }

    let mut sql = "SELECT SUM(progress) AS value FROM history".to_string();
    if !conditions.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&conditions.join(" AND "));
    }
    Ok(StatsQuery { sql, params })
}

fn bind_all<'q>(
    mut query: sqlx::query::Query<'q, sqlx::Sqlite, sqlx::sqlite::SqliteArguments<'q>>,
    params: &'q [StatsParam],
) -> sqlx::query::Query<'q, sqlx::Sqlite, sqlx::sqlite::SqliteArguments<'q>> {
    for param in params {
        query = match param {
            StatsParam::Text(s) => query.bind(s.as_str()),
            StatsParam::Int(i) => query.bind(*i),
        };
    }
    query
}

/// Run a compiled grouped query
pub async fn run_stats(pool: &SqlitePool, query: &StatsQuery) -> Result<Vec<StatsRow>> {
    let rows = bind_all(sqlx::query(&query.sql), &query.params)
        .fetch_all(pool)
        .await?;

    rows.iter()
        .map(|row| -> Result<StatsRow> {
            Ok(StatsRow {
                artists: row.try_get("artists")?,
                track_name: row.try_get("track_name")?,
                value: row.try_get("value")?,
            })
        })
        .collect()
}

/// Run a compiled total query; `None` when no rows matched
pub async fn run_total(pool: &SqlitePool, query: &StatsQuery) -> Result<Option<i64>> {
    let row = bind_all(sqlx::query(&query.sql), &query.params)
        .fetch_one(pool)
        .await?;
    Ok(row.try_get("value")?)
}
