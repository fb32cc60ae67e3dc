//! Module defining the four record kinds read from the dataset

use std::hash::{Hash, Hasher};

use chrono::{NaiveDateTime, Utc};
use rust_decimal::Decimal;
use serde::{Serialize, Serializer};

use crate::domain::{FieldSpec, FieldType, Record, RecordKind};
use crate::error::Error;
use crate::input::Row;

const CAPTURE_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// A movie of the catalogue. Carries the time it was read since the source has no timestamp column.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MovieRecord {
    movie_id: String,
    title: String,
    genres: Option<String>,
    #[serde(rename = "timestamp", serialize_with = "serialize_capture_time")]
    captured_at: NaiveDateTime,
}

impl MovieRecord {
    pub fn new(movie_id: impl Into<String>, title: impl Into<String>, genres: Option<String>) -> Self {
        Self {
            movie_id: movie_id.into(),
            title: title.into(),
            genres,
            captured_at: Utc::now().naive_utc(),
        }
    }

    pub fn movie_id(&self) -> &str {
        &self.movie_id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn genres(&self) -> Option<&str> {
        self.genres.as_deref()
    }

    pub fn captured_at(&self) -> NaiveDateTime {
        self.captured_at
    }
}

impl Record for MovieRecord {
    const KIND: RecordKind = RecordKind::Movie;
    const SCHEMA: &'static [FieldSpec] = &[
        FieldSpec::required("movieId", FieldType::Text),
        FieldSpec::required("title", FieldType::Text),
        FieldSpec::optional("genres", FieldType::Text),
    ];

    fn from_row(row: &Row<'_>) -> Result<Self, Error> {
        let movie_id = row.required_text("movieId")?;
        let title = row.required_text("title")?;
        let genres = row.optional_text("genres");
        Ok(Self::new(movie_id, title, genres))
    }

    fn partition_key(&self) -> &str {
        &self.movie_id
    }
}

impl PartialEq for MovieRecord {
    fn eq(&self, other: &Self) -> bool {
        self.movie_id == other.movie_id
    }
}

impl Eq for MovieRecord {}

impl Hash for MovieRecord {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.movie_id.hash(state);
    }
}

fn serialize_capture_time<S: Serializer>(time: &NaiveDateTime, s: S) -> Result<S::Ok, S::Error> {
    s.collect_str(&time.format(CAPTURE_TIME_FORMAT))
}

/// A user's rating of a movie
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RatingRecord {
    user_id: String,
    movie_id: String,
    #[serde(with = "rust_decimal::serde::float")]
    rating: Decimal,
    timestamp: i64,
}

impl RatingRecord {
    pub fn new(
        user_id: impl Into<String>,
        movie_id: impl Into<String>,
        rating: Decimal,
        timestamp: i64,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            movie_id: movie_id.into(),
            rating,
            timestamp,
        }
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn movie_id(&self) -> &str {
        &self.movie_id
    }

    pub fn rating(&self) -> Decimal {
        self.rating
    }

    pub fn timestamp(&self) -> i64 {
        self.timestamp
    }
}

impl Record for RatingRecord {
    const KIND: RecordKind = RecordKind::Rating;
    const SCHEMA: &'static [FieldSpec] = &[
        FieldSpec::required("userId", FieldType::Text),
        FieldSpec::required("movieId", FieldType::Text),
        FieldSpec::required("rating", FieldType::Decimal),
        FieldSpec::required("timestamp", FieldType::Long),
    ];

    fn from_row(row: &Row<'_>) -> Result<Self, Error> {
        Ok(Self {
            user_id: row.required_text("userId")?,
            movie_id: row.required_text("movieId")?,
            rating: row.required_decimal("rating")?,
            timestamp: row.required_long("timestamp")?,
        })
    }

    fn partition_key(&self) -> &str {
        &self.movie_id
    }
}

// the rating value is not part of the identity: a user rates a movie once per timestamp
impl PartialEq for RatingRecord {
    fn eq(&self, other: &Self) -> bool {
        self.user_id == other.user_id
            && self.movie_id == other.movie_id
            && self.timestamp == other.timestamp
    }
}

impl Eq for RatingRecord {}

impl Hash for RatingRecord {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.user_id.hash(state);
        self.movie_id.hash(state);
        self.timestamp.hash(state);
    }
}

/// A free-text tag a user attached to a movie
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TagRecord {
    user_id: String,
    movie_id: String,
    tag: String,
    timestamp: i64,
}

impl TagRecord {
    pub fn new(
        user_id: impl Into<String>,
        movie_id: impl Into<String>,
        tag: impl Into<String>,
        timestamp: i64,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            movie_id: movie_id.into(),
            tag: tag.into(),
            timestamp,
        }
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn movie_id(&self) -> &str {
        &self.movie_id
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn timestamp(&self) -> i64 {
        self.timestamp
    }
}

impl Record for TagRecord {
    const KIND: RecordKind = RecordKind::Tag;
    const SCHEMA: &'static [FieldSpec] = &[
        FieldSpec::required("userId", FieldType::Text),
        FieldSpec::required("movieId", FieldType::Text),
        FieldSpec::required("tag", FieldType::Text),
        FieldSpec::required("timestamp", FieldType::Long),
    ];

    fn from_row(row: &Row<'_>) -> Result<Self, Error> {
        Ok(Self {
            user_id: row.required_text("userId")?,
            movie_id: row.required_text("movieId")?,
            tag: row.required_text("tag")?,
            timestamp: row.required_long("timestamp")?,
        })
    }

    fn partition_key(&self) -> &str {
        &self.movie_id
    }
}

/// Cross-reference of a movie to its IMDb and TMDb identifiers
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkRecord {
    movie_id: String,
    imdb_id: String,
    tmdb_id: String,
}

impl LinkRecord {
    pub fn new(
        movie_id: impl Into<String>,
        imdb_id: impl Into<String>,
        tmdb_id: impl Into<String>,
    ) -> Self {
        Self {
            movie_id: movie_id.into(),
            imdb_id: imdb_id.into(),
            tmdb_id: tmdb_id.into(),
        }
    }

    pub fn movie_id(&self) -> &str {
        &self.movie_id
    }

    pub fn imdb_id(&self) -> &str {
        &self.imdb_id
    }

    pub fn tmdb_id(&self) -> &str {
        &self.tmdb_id
    }
}

impl Record for LinkRecord {
    const KIND: RecordKind = RecordKind::Link;
    const SCHEMA: &'static [FieldSpec] = &[
        FieldSpec::required("movieId", FieldType::Text),
        FieldSpec::required("imdbId", FieldType::Text),
        FieldSpec::required("tmdbId", FieldType::Text),
    ];

    fn from_row(row: &Row<'_>) -> Result<Self, Error> {
        Ok(Self {
            movie_id: row.required_text("movieId")?,
            imdb_id: row.required_text("imdbId")?,
            tmdb_id: row.required_text("tmdbId")?,
        })
    }

    fn partition_key(&self) -> &str {
        &self.movie_id
    }
}
