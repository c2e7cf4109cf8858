//! Response ledger
//!
//! Append-only, ordered collection of per-round records for one session,
//! with the CSV table serialization offered at session end.

use crate::models::ResponseRecord;
use serde::{Deserialize, Serialize};

/// Artifact name offered for download at session end
pub const EXPORT_FILENAME: &str = "experiment_responses.csv";

/// CSV header row, one column per `ResponseRecord` field
pub const CSV_HEADER: &str =
    "Participant_ID,Age,Sex,Round,Choice_X,Choice_Y,P_X,P_Y,Total_Income,Time_Taken,Treatment_Group";

/// Append-only record collection, ordered by round ascending.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResponseLedger {
    records: Vec<ResponseRecord>,
}

impl ResponseLedger {
    pub fn new() -> Self {
        Self {
            records: Vec::new(),
        }
    }

    /// Append a completed round. Prior rows are never edited or removed.
    pub fn append(&mut self, record: ResponseRecord) {
        self.records.push(record);
    }

    /// Iterate over all records in round order
    pub fn records(&self) -> impl Iterator<Item = &ResponseRecord> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Rows belonging to one participant, in round order.
    ///
    /// The advice requester must only ever see the current participant's
    /// history, never another participant's rows.
    pub fn rows_for_participant<'a>(&'a self, participant_id: &str) -> Vec<&'a ResponseRecord> {
        self.records
            .iter()
            .filter(|r| r.participant_id == participant_id)
            .collect()
    }

    /// Render the full table as CSV, header row included.
    pub fn to_csv(&self) -> String {
        let mut out = String::new();
        out.push_str(CSV_HEADER);
        out.push('\n');

        for r in &self.records {
            out.push_str(&format!(
                "{},{},{},{},{},{},{},{},{},{},{}\n",
                csv_field(&r.participant_id),
                r.age,
                r.sex,
                r.round,
                r.choice_x,
                r.choice_y,
                r.price_x,
                r.price_y,
                r.income,
                r.elapsed_seconds,
                r.condition,
            ));
        }

        out
    }
}

/// Quote a free-text field when it carries CSV metacharacters
fn csv_field(value: &str) -> String {
    if value.contains(',') || value.contains('"') || value.contains('\n') {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Condition, Sex};

    fn record(participant_id: &str, round: u32) -> ResponseRecord {
        ResponseRecord {
            participant_id: participant_id.to_string(),
            age: 25,
            sex: Sex::Female,
            round,
            choice_x: 40,
            choice_y: 35.0,
            price_x: 2.0,
            price_y: 2.0,
            income: 150.0,
            elapsed_seconds: 4.2,
            condition: Condition::Treatment,
        }
    }

    #[test]
    fn test_append_preserves_round_order() {
        let mut ledger = ResponseLedger::new();
        for round in 1..=20 {
            ledger.append(record("p1", round));
        }

        assert_eq!(ledger.len(), 20);
        let rounds: Vec<u32> = ledger.records().map(|r| r.round).collect();
        assert_eq!(rounds, (1..=20).collect::<Vec<u32>>());
    }

    #[test]
    fn test_rows_for_participant_filters_others() {
        let mut ledger = ResponseLedger::new();
        ledger.append(record("p1", 1));
        ledger.append(record("p2", 1));
        ledger.append(record("p1", 2));

        let rows = ledger.rows_for_participant("p1");
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|r| r.participant_id == "p1"));
    }

    #[test]
    fn test_csv_has_header_and_one_row_per_round() {
        let mut ledger = ResponseLedger::new();
        for round in 1..=20 {
            ledger.append(record("p1", round));
        }

        let csv = ledger.to_csv();
        let lines: Vec<&str> = csv.trim_end().lines().collect();
        assert_eq!(lines.len(), 21);
        assert_eq!(lines[0], CSV_HEADER);
        assert!(lines[1].starts_with("p1,25,Female,1,40,"));
        assert!(lines[1].ends_with("Treatment"));
    }

    #[test]
    fn test_csv_quotes_delimiter_bearing_ids() {
        let mut ledger = ResponseLedger::new();
        ledger.append(record("kim, j.", 1));

        let csv = ledger.to_csv();
        assert!(csv.contains("\"kim, j.\",25,Female"));
    }
}
