//! Chat command parser.
//!
//! Accepted forms:
//! - `help`
//! - `<venue> <race>` (today's race day)
//! - `<venue> <race> <YYYYMMDD>`

use chrono::{DateTime, FixedOffset, NaiveDate, Utc};

use crate::error::InvalidCommand;
use crate::types::{CommandResult, RaceId};
use crate::venue;

/// Japan Standard Time, the race calendar's timezone
const JST_OFFSET_SECS: i32 = 9 * 3600;

/// Race day for a given instant
pub fn today_jst(now: DateTime<Utc>) -> NaiveDate {
    match FixedOffset::east_opt(JST_OFFSET_SECS) {
        Some(jst) => now.with_timezone(&jst).date_naive(),
        None => now.date_naive(),
    }
}

/// Parse a chat message into a command
pub fn parse_command(text: &str, today: NaiveDate) -> CommandResult {
    let normalized = normalize(text);
    let tokens: Vec<&str> = normalized.split_whitespace().collect();

    match tokens.as_slice() {
        [word] if is_help(word) => CommandResult::Help,
        [name, race] => match parse_race(name, race, today) {
            Ok(id) => CommandResult::Query(id),
            Err(e) => CommandResult::Invalid(e),
        },
        [name, race, hd] => {
            let date = match parse_date(hd) {
                Some(d) => d,
                None => {
                    // Report the venue/race problem first if there is one
                    if let Err(e) = parse_race(name, race, today) {
                        return CommandResult::Invalid(e);
                    }
                    return CommandResult::Invalid(InvalidCommand::Date(hd.to_string()));
                }
            };
            match parse_race(name, race, date) {
                Ok(id) => CommandResult::Query(id),
                Err(e) => CommandResult::Invalid(e),
            }
        }
        _ => CommandResult::Invalid(InvalidCommand::Shape),
    }
}

fn is_help(word: &str) -> bool {
    word.eq_ignore_ascii_case("help") || word == "ヘルプ"
}

/// Full-width spaces and digits to ASCII
fn normalize(text: &str) -> String {
    text.trim()
        .chars()
        .map(|c| match c {
            '\u{3000}' => ' ',
            '０'..='９' => char::from_u32(c as u32 - '０' as u32 + '0' as u32).unwrap_or(c),
            'Ｒ' => 'R',
            _ => c,
        })
        .collect()
}

fn parse_race(name: &str, race: &str, date: NaiveDate) -> Result<RaceId, InvalidCommand> {
    let venue = venue::code_of(name).ok_or_else(|| InvalidCommand::UnknownVenue(name.to_string()))?;

    let digits = race.strip_suffix(['R', 'r']).unwrap_or(race);
    let race_no: u8 = digits
        .parse()
        .map_err(|_| InvalidCommand::RaceNumber(race.to_string()))?;

    RaceId::new(venue, race_no, date).ok_or_else(|| InvalidCommand::RaceNumber(race.to_string()))
}

/// Strict YYYYMMDD, must be a real calendar date
pub(crate) fn parse_date(token: &str) -> Option<NaiveDate> {
    if token.len() != 8 || !token.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let year: i32 = token[0..4].parse().ok()?;
    let month: u32 = token[4..6].parse().ok()?;
    let day: u32 = token[6..8].parse().ok()?;
    NaiveDate::from_ymd_opt(year, month, day)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 8, 11).unwrap()
    }

    fn query(text: &str) -> RaceId {
        match parse_command(text, today()) {
            CommandResult::Query(id) => id,
            other => panic!("expected query for {text:?}, got {other:?}"),
        }
    }

    fn invalid(text: &str) -> InvalidCommand {
        match parse_command(text, today()) {
            CommandResult::Invalid(reason) => reason,
            other => panic!("expected invalid for {text:?}, got {other:?}"),
        }
    }

    #[test]
    fn test_help() {
        assert_eq!(parse_command("help", today()), CommandResult::Help);
        assert_eq!(parse_command("HELP", today()), CommandResult::Help);
        assert_eq!(parse_command("  Help ", today()), CommandResult::Help);
        assert_eq!(parse_command("ヘルプ", today()), CommandResult::Help);
    }

    #[test]
    fn test_venue_and_race_uses_today() {
        let id = query("丸亀 8");
        assert_eq!(id.venue(), 15);
        assert_eq!(id.race(), 8);
        assert_eq!(id.date(), today());
    }

    #[test]
    fn test_all_venues_and_races() {
        for code in 1..=24u8 {
            let name = venue::name_of(code).unwrap();
            for race in 1..=12u8 {
                let id = query(&format!("{name} {race}"));
                assert_eq!((id.venue(), id.race(), id.date()), (code, race, today()));
            }
        }
    }

    #[test]
    fn test_explicit_date() {
        let id = query("丸亀 8 20250812");
        assert_eq!(id.hd(), "20250812");
        assert_eq!(id.venue(), 15);
    }

    #[test]
    fn test_full_width_input() {
        let id = query("丸亀　１２　２０２５０８１２");
        assert_eq!(id.race(), 12);
        assert_eq!(id.hd(), "20250812");
    }

    #[test]
    fn test_race_suffix() {
        assert_eq!(query("常滑 6R").race(), 6);
        assert_eq!(query("常滑 6r").race(), 6);
    }

    #[test]
    fn test_unknown_venue() {
        assert_eq!(invalid("東京 8"), InvalidCommand::UnknownVenue("東京".into()));
        assert_eq!(invalid("東京 8 20250811"), InvalidCommand::UnknownVenue("東京".into()));
    }

    #[test]
    fn test_race_out_of_range() {
        assert_eq!(invalid("丸亀 0"), InvalidCommand::RaceNumber("0".into()));
        assert_eq!(invalid("丸亀 13"), InvalidCommand::RaceNumber("13".into()));
        assert_eq!(invalid("丸亀 -1"), InvalidCommand::RaceNumber("-1".into()));
        assert_eq!(invalid("丸亀 eight"), InvalidCommand::RaceNumber("eight".into()));
        assert_eq!(invalid("丸亀 300"), InvalidCommand::RaceNumber("300".into()));
    }

    #[test]
    fn test_bad_dates() {
        for hd in ["2025081", "202508111", "20251301", "20250230", "2025-8-1", "abcdefgh"] {
            assert_eq!(
                invalid(&format!("丸亀 8 {hd}")),
                InvalidCommand::Date(hd.to_string()),
                "date {hd}"
            );
        }
    }

    #[test]
    fn test_leap_day() {
        assert_eq!(query("丸亀 8 20240229").hd(), "20240229");
        assert_eq!(invalid("丸亀 8 20250229"), InvalidCommand::Date("20250229".into()));
    }

    #[test]
    fn test_bad_shape() {
        assert_eq!(invalid(""), InvalidCommand::Shape);
        assert_eq!(invalid("丸亀"), InvalidCommand::Shape);
        assert_eq!(invalid("丸亀 8 20250811 extra"), InvalidCommand::Shape);
    }

    #[test]
    fn test_today_jst_crosses_midnight() {
        // 2025-08-11 16:00 UTC is already 2025-08-12 in Japan
        let now = Utc.with_ymd_and_hms(2025, 8, 11, 16, 0, 0).unwrap();
        assert_eq!(today_jst(now), NaiveDate::from_ymd_opt(2025, 8, 12).unwrap());

        let now = Utc.with_ymd_and_hms(2025, 8, 11, 14, 59, 0).unwrap();
        assert_eq!(today_jst(now), NaiveDate::from_ymd_opt(2025, 8, 11).unwrap());
    }
}
