//! Text rendering of the roster and attendance history

use attendance_core::{CardUid, Person, UnixTime};
use chrono::DateTime;
use std::collections::BTreeSet;

const TIMESTAMP_FORMAT: &str = "%A %B %d %Y, %H:%M:%S";
const ROSTER_TITLES: [&str; 3] = ["Name", "Cards", "Attendance Count"];

/// Render a Unix timestamp the way the roster shows it, in UTC
pub fn format_timestamp(ts: UnixTime) -> String {
    match DateTime::from_timestamp(ts, 0) {
        Some(dt) => dt.format(TIMESTAMP_FORMAT).to_string(),
        None => format!("<invalid time {}>", ts),
    }
}

pub fn format_cards(cards: &BTreeSet<CardUid>) -> String {
    if cards.is_empty() {
        return "No cards".to_string();
    }
    cards
        .iter()
        .map(|c| c.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// One row per person: name, cards, attendance count; sorted by name
pub fn roster_rows(people: &[Person]) -> Vec<[String; 3]> {
    let mut rows: Vec<[String; 3]> = people
        .iter()
        .map(|p| {
            [
                p.name.clone(),
                format_cards(&p.cards),
                p.attendance.len().to_string(),
            ]
        })
        .collect();
    rows.sort_by(|a, b| a[0].cmp(&b[0]));
    rows
}

/// Plain-text table of everyone in the store
pub fn render_roster(people: &[Person]) -> String {
    if people.is_empty() {
        return "No people registered yet\n".to_string();
    }

    let rows = roster_rows(people);
    let mut widths = ROSTER_TITLES.map(|t| t.chars().count());
    for row in &rows {
        for (width, cell) in widths.iter_mut().zip(row.iter()) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let mut out = String::new();
    push_row(&mut out, &ROSTER_TITLES.map(String::from), &widths);
    let rule: Vec<String> = widths.iter().map(|w| "─".repeat(*w)).collect();
    out.push_str(&rule.join("  "));
    out.push('\n');
    for row in &rows {
        push_row(&mut out, row, &widths);
    }
    out
}

fn push_row(out: &mut String, cells: &[String; 3], widths: &[usize; 3]) {
    let padded: Vec<String> = cells
        .iter()
        .zip(widths.iter())
        .map(|(cell, width)| format!("{:<width$}", cell, width = *width))
        .collect();
    out.push_str(padded.join("  ").trim_end());
    out.push('\n');
}

/// Full attendance history of one person
pub fn render_history(person: &Person) -> String {
    let mut out = format!("Attendance for: {}\n", person.name);
    if person.attendance.is_empty() {
        out.push_str("<No attendance>\n");
        return out;
    }
    for ts in &person.attendance {
        out.push_str(&format_timestamp(*ts));
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use attendance_core::PersonId;

    fn person(name: &str, cards: &[u64], attendance: &[i64]) -> Person {
        Person {
            id: PersonId::generate(),
            name: name.to_string(),
            cards: cards.iter().copied().map(CardUid).collect(),
            attendance: attendance.to_vec(),
        }
    }

    #[test]
    fn test_format_timestamp() {
        assert_eq!(format_timestamp(0), "Thursday January 01 1970, 00:00:00");
        assert_eq!(format_timestamp(1_700_000_000), "Tuesday November 14 2023, 22:13:20");
    }

    #[test]
    fn test_format_cards() {
        assert_eq!(format_cards(&BTreeSet::new()), "No cards");
        let cards: BTreeSet<CardUid> = [CardUid(0xBEEF), CardUid(0x12)].into_iter().collect();
        assert_eq!(format_cards(&cards), "0x12, 0xbeef");
    }

    #[test]
    fn test_roster_sorted_by_name() {
        let people = vec![
            person("Grace", &[1], &[1, 2, 3]),
            person("Ada", &[], &[]),
        ];
        let rows = roster_rows(&people);
        assert_eq!(rows[0], ["Ada".to_string(), "No cards".to_string(), "0".to_string()]);
        assert_eq!(rows[1], ["Grace".to_string(), "0x1".to_string(), "3".to_string()]);

        let table = render_roster(&people);
        let lines: Vec<&str> = table.lines().collect();
        assert_eq!(lines.len(), 4);
        assert!(lines[0].starts_with("Name "));
        assert!(lines[2].starts_with("Ada "));
    }

    #[test]
    fn test_empty_roster() {
        assert_eq!(render_roster(&[]), "No people registered yet\n");
    }

    #[test]
    fn test_history() {
        assert_eq!(
            render_history(&person("Ada", &[], &[])),
            "Attendance for: Ada\n<No attendance>\n"
        );
        assert_eq!(
            render_history(&person("Ada", &[], &[0])),
            "Attendance for: Ada\nThursday January 01 1970, 00:00:00\n"
        );
    }
}
