//! Generic sort/filter engine.
//!
//! `project` is a pure function of its inputs: given rows, a filter text, and
//! an optional sort spec it returns the filtered, ordered view. All state
//! lives in the caller; re-running with the same inputs yields the same
//! output, which is what makes re-derivation from view state idempotent.

use serde::{Deserialize, Serialize};

use crate::query::types::{parse_epoch, TimestampField};

/// Comparison strategy for a sort column. Chosen explicitly by the caller
/// per column, never inferred from the data, because the same field name can
/// need different semantics across views.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueKind {
    Numeric,
    Text,
    Date,
}

impl ValueKind {
    /// Keyword form accepted on the command line.
    pub fn parse(word: &str) -> Option<ValueKind> {
        match word {
            "num" | "numeric" => Some(ValueKind::Numeric),
            "text" | "string" => Some(ValueKind::Text),
            "date" | "time" => Some(ValueKind::Date),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Ascending,
    #[default]
    Descending,
}

impl SortDirection {
    pub fn flipped(self) -> SortDirection {
        match self {
            SortDirection::Ascending => SortDirection::Descending,
            SortDirection::Descending => SortDirection::Ascending,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            SortDirection::Ascending => "asc",
            SortDirection::Descending => "desc",
        }
    }
}

/// Active sort: column key, its comparison strategy, and direction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SortSpec {
    pub column: String,
    pub kind: ValueKind,
    pub direction: SortDirection,
}

impl SortSpec {
    /// Selecting the already-active column flips direction; selecting a new
    /// column always starts descending regardless of the previous direction.
    pub fn toggled(current: Option<&SortSpec>, column: &str, kind: ValueKind) -> SortSpec {
        match current {
            Some(active) if active.column == column => SortSpec {
                column: column.to_string(),
                kind,
                direction: active.direction.flipped(),
            },
            _ => SortSpec {
                column: column.to_string(),
                kind,
                direction: SortDirection::Descending,
            },
        }
    }
}

/// A single cell as seen by the comparator. `Missing` compares equal to
/// itself under every strategy (it coerces to the strategy's zero value), so
/// unknown columns leave input order untouched.
#[derive(Debug, Clone, Copy)]
pub enum CellValue<'a> {
    Number(f64),
    Text(&'a str),
    Stamp(&'a TimestampField),
    Missing,
}

/// Implemented by every record type that can appear in a rendered table.
pub trait TableRecord {
    /// Cell for a column key; `Missing` for unknown columns.
    fn cell(&self, column: &str) -> CellValue<'_>;

    /// Fields searched by the text filter. Absent fields contribute an empty
    /// string rather than being omitted.
    fn identity_fields(&self) -> Vec<&str>;
}

/// Case-insensitive substring match over a record's identity fields.
pub fn matches_filter<R: TableRecord + ?Sized>(record: &R, needle_lower: &str) -> bool {
    if needle_lower.is_empty() {
        return true;
    }
    record
        .identity_fields()
        .iter()
        .any(|field| field.to_lowercase().contains(needle_lower))
}

#[derive(Debug, PartialEq)]
enum SortKey {
    Num(f64),
    Date(i64),
    Text(String),
}

impl SortKey {
    fn compare(&self, other: &SortKey) -> std::cmp::Ordering {
        match (self, other) {
            (SortKey::Num(a), SortKey::Num(b)) => a.total_cmp(b),
            (SortKey::Date(a), SortKey::Date(b)) => a.cmp(b),
            (SortKey::Text(a), SortKey::Text(b)) => a.cmp(b),
            // Keys are built from one SortSpec, so variants never mix.
            _ => std::cmp::Ordering::Equal,
        }
    }
}

fn make_key<R: TableRecord>(record: &R, spec: &SortSpec) -> SortKey {
    let cell = record.cell(&spec.column);
    match spec.kind {
        ValueKind::Numeric => SortKey::Num(match cell {
            CellValue::Number(n) => n,
            CellValue::Text(t) => t.trim().parse::<f64>().unwrap_or(0.0),
            CellValue::Stamp(s) => s.epoch_seconds().unwrap_or(0) as f64,
            CellValue::Missing => 0.0,
        }),
        ValueKind::Date => SortKey::Date(match cell {
            CellValue::Stamp(s) => s.epoch_seconds().unwrap_or(0),
            CellValue::Text(t) => parse_epoch(t).unwrap_or(0),
            CellValue::Number(n) => n as i64,
            CellValue::Missing => 0,
        }),
        ValueKind::Text => SortKey::Text(match cell {
            CellValue::Text(t) => t.to_lowercase(),
            CellValue::Stamp(s) => s.as_str().to_lowercase(),
            CellValue::Number(n) => n.to_string(),
            CellValue::Missing => String::new(),
        }),
    }
}

/// Filter then sort. The sort is stable: rows with equal keys keep their
/// input order, so repeated projection from the same inputs is
/// deterministic. With no sort spec the input order passes through.
pub fn project<R: TableRecord + Clone>(
    records: &[R],
    filter_text: &str,
    sort: Option<&SortSpec>,
) -> Vec<R> {
    let needle = filter_text.trim().to_lowercase();
    let filtered: Vec<R> = records
        .iter()
        .filter(|r| matches_filter(*r, &needle))
        .cloned()
        .collect();

    let spec = match sort {
        Some(spec) => spec,
        None => return filtered,
    };

    let mut keyed: Vec<(SortKey, R)> = filtered
        .into_iter()
        .map(|r| (make_key(&r, spec), r))
        .collect();
    keyed.sort_by(|a, b| {
        let ord = a.0.compare(&b.0);
        match spec.direction {
            SortDirection::Ascending => ord,
            SortDirection::Descending => ord.reverse(),
        }
    });
    keyed.into_iter().map(|(_, r)| r).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone)]
    struct Row {
        name: Option<String>,
        score: f64,
        score_text: String,
        when: TimestampField,
    }

    impl Row {
        fn new(name: Option<&str>, score: f64, when: &str) -> Row {
            Row {
                name: name.map(str::to_string),
                score,
                score_text: score.to_string(),
                when: TimestampField::new(when),
            }
        }
    }

    impl TableRecord for Row {
        fn cell(&self, column: &str) -> CellValue<'_> {
            match column {
                "name" => CellValue::Text(self.name.as_deref().unwrap_or("")),
                "score" => CellValue::Number(self.score),
                "score_text" => CellValue::Text(&self.score_text),
                "when" => CellValue::Stamp(&self.when),
                _ => CellValue::Missing,
            }
        }

        fn identity_fields(&self) -> Vec<&str> {
            vec![self.name.as_deref().unwrap_or("")]
        }
    }

    fn names(rows: &[Row]) -> Vec<&str> {
        rows.iter()
            .map(|r| r.name.as_deref().unwrap_or("<none>"))
            .collect()
    }

    fn sort(column: &str, kind: ValueKind, direction: SortDirection) -> SortSpec {
        SortSpec {
            column: column.to_string(),
            kind,
            direction,
        }
    }

    #[test]
    fn empty_filter_retains_all_rows() {
        let rows = vec![Row::new(Some("a"), 1.0, ""), Row::new(None, 2.0, "")];
        assert_eq!(project(&rows, "", None).len(), 2);
    }

    #[test]
    fn filter_is_case_insensitive_substring() {
        let rows = vec![
            Row::new(Some("Acme.Example.COM"), 1.0, ""),
            Row::new(Some("other.example.com"), 2.0, ""),
        ];
        let out = project(&rows, "ACME", None);
        assert_eq!(names(&out), vec!["Acme.Example.COM"]);
    }

    #[test]
    fn filter_on_absent_field_excludes_without_panic() {
        let rows = vec![Row::new(None, 1.0, ""), Row::new(Some("acme"), 2.0, "")];
        let out = project(&rows, "acme", None);
        assert_eq!(out.len(), 1);
    }

    #[test]
    fn numeric_descending_places_higher_first() {
        let rows = vec![
            Row::new(Some("low"), 1.0, ""),
            Row::new(Some("high"), 10.0, ""),
            Row::new(Some("mid"), 5.0, ""),
        ];
        let spec = sort("score", ValueKind::Numeric, SortDirection::Descending);
        let out = project(&rows, "", Some(&spec));
        assert_eq!(names(&out), vec!["high", "mid", "low"]);
    }

    #[test]
    fn numeric_kind_parses_text_cells_and_coerces_garbage_to_zero() {
        let mut rows = vec![
            Row::new(Some("seven"), 0.0, ""),
            Row::new(Some("garbage"), 0.0, ""),
            Row::new(Some("three"), 0.0, ""),
        ];
        rows[0].score_text = "7".into();
        rows[1].score_text = "n/a".into();
        rows[2].score_text = "3".into();
        let spec = sort("score_text", ValueKind::Numeric, SortDirection::Ascending);
        let out = project(&rows, "", Some(&spec));
        // "n/a" coerces to 0 and sorts as the numeric minimum
        assert_eq!(names(&out), vec!["garbage", "three", "seven"]);
    }

    #[test]
    fn date_kind_orders_by_instant() {
        let rows = vec![
            Row::new(Some("new"), 0.0, "2024-06-01T00:00:00Z"),
            Row::new(Some("old"), 0.0, "2024-01-01T00:00:00Z"),
            Row::new(Some("blank"), 0.0, ""),
        ];
        let spec = sort("when", ValueKind::Date, SortDirection::Ascending);
        let out = project(&rows, "", Some(&spec));
        // Blank parses to epoch 0 and sorts as the minimum
        assert_eq!(names(&out), vec!["blank", "old", "new"]);
    }

    #[test]
    fn text_kind_compares_case_insensitively() {
        let rows = vec![
            Row::new(Some("Zeta"), 0.0, ""),
            Row::new(Some("alpha"), 0.0, ""),
            Row::new(Some("Beta"), 0.0, ""),
        ];
        let spec = sort("name", ValueKind::Text, SortDirection::Ascending);
        let out = project(&rows, "", Some(&spec));
        assert_eq!(names(&out), vec!["alpha", "Beta", "Zeta"]);
    }

    #[test]
    fn equal_keys_preserve_input_order() {
        let rows = vec![
            Row::new(Some("first"), 5.0, ""),
            Row::new(Some("second"), 5.0, ""),
            Row::new(Some("third"), 5.0, ""),
        ];
        for direction in [SortDirection::Ascending, SortDirection::Descending] {
            let spec = sort("score", ValueKind::Numeric, direction);
            let out = project(&rows, "", Some(&spec));
            assert_eq!(names(&out), vec!["first", "second", "third"]);
        }
    }

    #[test]
    fn unknown_column_leaves_order_untouched() {
        let rows = vec![Row::new(Some("b"), 2.0, ""), Row::new(Some("a"), 1.0, "")];
        let spec = sort("nope", ValueKind::Numeric, SortDirection::Descending);
        let out = project(&rows, "", Some(&spec));
        assert_eq!(names(&out), vec!["b", "a"]);
    }

    #[test]
    fn projection_is_idempotent() {
        let rows = vec![
            Row::new(Some("acme"), 3.0, "2024-02-01T00:00:00Z"),
            Row::new(Some("acorn"), 3.0, "2024-01-01T00:00:00Z"),
            Row::new(Some("beta"), 9.0, "2024-03-01T00:00:00Z"),
        ];
        let spec = sort("score", ValueKind::Numeric, SortDirection::Descending);
        let once = project(&rows, "ac", Some(&spec));
        let twice = project(&rows, "ac", Some(&spec));
        assert_eq!(names(&once), names(&twice));
        assert_eq!(names(&once), vec!["acme", "acorn"]);
    }

    #[test]
    fn toggled_same_column_flips_direction() {
        let active = sort("score", ValueKind::Numeric, SortDirection::Descending);
        let next = SortSpec::toggled(Some(&active), "score", ValueKind::Numeric);
        assert_eq!(next.direction, SortDirection::Ascending);
        let back = SortSpec::toggled(Some(&next), "score", ValueKind::Numeric);
        assert_eq!(back.direction, SortDirection::Descending);
    }

    #[test]
    fn toggled_new_column_always_resets_to_descending() {
        let active = sort("score", ValueKind::Numeric, SortDirection::Ascending);
        let next = SortSpec::toggled(Some(&active), "name", ValueKind::Text);
        assert_eq!(next.column, "name");
        assert_eq!(next.direction, SortDirection::Descending);

        let fresh = SortSpec::toggled(None, "name", ValueKind::Text);
        assert_eq!(fresh.direction, SortDirection::Descending);
    }

    #[test]
    fn value_kind_keywords() {
        assert_eq!(ValueKind::parse("num"), Some(ValueKind::Numeric));
        assert_eq!(ValueKind::parse("string"), Some(ValueKind::Text));
        assert_eq!(ValueKind::parse("date"), Some(ValueKind::Date));
        assert_eq!(ValueKind::parse("bogus"), None);
    }
}
