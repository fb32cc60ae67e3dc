//! Integration tests for reading sources with a mix of valid and broken lines

use proptest::prelude::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tempfile::TempDir;

use movie_events_rs::{LinkRecord, RatingRecord, Record, TabularReader, TagRecord};

use crate::support::write_file;

/// The shapes a line of a ratings file can take
#[derive(Debug, Clone)]
enum Line {
    Valid { user: u32, movie: u32, tenths: u8, timestamp: i64 },
    BlankMovie { user: u32 },
    BadRating { movie: u32 },
    Short { user: u32 },
}

impl Line {
    fn is_valid(&self) -> bool {
        matches!(self, Line::Valid { .. })
    }

    fn render(&self) -> String {
        match self {
            Line::Valid { user, movie, tenths, timestamp } => {
                format!("{user},{movie},{},{timestamp}", Decimal::new(*tenths as i64, 1))
            }
            Line::BlankMovie { user } => format!("{user}, ,3.5,1112486027"),
            Line::BadRating { movie } => format!("1,{movie},3.5stars,1112486027"),
            Line::Short { user } => format!("{user},17"),
        }
    }
}

fn line() -> impl Strategy<Value = Line> {
    prop_oneof![
        4 => (1u32..200_000, 1u32..130_000, 1u8..=50, 789_652_009i64..1_427_784_002)
            .prop_map(|(user, movie, tenths, timestamp)| Line::Valid { user, movie, tenths, timestamp }),
        1 => (1u32..200_000).prop_map(|user| Line::BlankMovie { user }),
        1 => (1u32..130_000).prop_map(|movie| Line::BadRating { movie }),
        1 => (1u32..200_000).prop_map(|user| Line::Short { user }),
    ]
}

proptest! {
    #[test]
    fn every_line_is_either_read_or_skipped(lines in prop::collection::vec(line(), 0..200)) {
        let csv = std::iter::once("userId,movieId,rating,timestamp".to_string())
            .chain(lines.iter().map(Line::render))
            .collect::<Vec<_>>()
            .join("\n");

        let outcome = TabularReader::<RatingRecord>::new().read_from(csv.as_bytes()).unwrap();

        prop_assert_eq!(outcome.stats.total(), lines.len() as u64);
        prop_assert_eq!(outcome.stats.read, lines.iter().filter(|l| l.is_valid()).count() as u64);

        // valid lines come out in file order
        let expected_keys: Vec<String> = lines
            .iter()
            .filter_map(|l| match l {
                Line::Valid { movie, .. } => Some(movie.to_string()),
                _ => None,
            })
            .collect();
        let keys: Vec<&str> = outcome.records.iter().map(|r| r.partition_key()).collect();
        prop_assert_eq!(keys, expected_keys);
    }
}

#[test]
fn reads_a_file_with_unusual_header_casing_and_order() {
    let dir = TempDir::new().unwrap();
    write_file(
        dir.path(),
        "ratings.csv",
        "TIMESTAMP , Rating, movieid, USERID\n1112486027, 4.5 ,296, 1\n",
    );

    let outcome = TabularReader::<RatingRecord>::new()
        .read(dir.path().join("ratings.csv"))
        .unwrap();

    assert_eq!(outcome.records.len(), 1);
    let rating = &outcome.records[0];
    assert_eq!(rating.user_id(), "1");
    assert_eq!(rating.movie_id(), "296");
    assert_eq!(rating.rating(), dec!(4.5));
    assert_eq!(rating.timestamp(), 1112486027);
}

#[test]
fn tags_with_quoted_commas_keep_their_text() {
    let csv = "userId,movieId,tag,timestamp\n15,339,\"sandra 'boring' bullock, again\",1138537770";

    let outcome = TabularReader::<TagRecord>::new().read_from(csv.as_bytes()).unwrap();

    assert_eq!(outcome.records[0].tag(), "sandra 'boring' bullock, again");
}

#[test]
fn link_identifiers_keep_their_leading_zeros() {
    let csv = "movieId,imdbId,tmdbId\n1,0114709,862";

    let outcome = TabularReader::<LinkRecord>::new().read_from(csv.as_bytes()).unwrap();

    assert_eq!(outcome.records, [LinkRecord::new("1", "0114709", "862")]);
}
