use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

/// Number of peg rows on the board; every authoritative path has exactly this many steps.
pub const BOARD_ROWS: usize = 12;
/// Highest column index a ball can occupy (columns are `0..=MAX_COLUMN`).
pub const MAX_COLUMN: u8 = 12;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoundId(pub String);

impl RoundId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Display for RoundId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct DropColumn(u8);

impl DropColumn {
    pub const CENTER: DropColumn = DropColumn(MAX_COLUMN / 2);

    pub fn new(column: u8) -> Option<Self> {
        (column <= MAX_COLUMN).then_some(Self(column))
    }

    pub fn get(self) -> u8 {
        self.0
    }

    pub fn nudge_left(self) -> Self {
        Self(self.0.saturating_sub(1))
    }

    pub fn nudge_right(self) -> Self {
        Self((self.0 + 1).min(MAX_COLUMN))
    }
}

impl Default for DropColumn {
    fn default() -> Self {
        Self::CENTER
    }
}

impl TryFrom<u8> for DropColumn {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value).ok_or_else(|| format!("drop column {value} outside 0..={MAX_COLUMN}"))
    }
}

impl From<DropColumn> for u8 {
    fn from(value: DropColumn) -> Self {
        value.0
    }
}

impl fmt::Display for DropColumn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    #[serde(alias = "left", alias = "Left", alias = "L")]
    Left,
    #[serde(alias = "right", alias = "Right", alias = "R")]
    Right,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Left => f.write_str("LEFT"),
            Direction::Right => f.write_str("RIGHT"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathStep {
    pub row: u32,
    pub column: u32,
    pub direction: Direction,
}

impl fmt::Display for PathStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Row {}: Column {} \u{2192} {}",
            self.row, self.column, self.direction
        )
    }
}

/// Client-chosen parameters of one round, bound to the authority's round id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Round {
    pub round_id: RoundId,
    pub client_seed: String,
    pub bet_cents: u64,
    pub drop_column: DropColumn,
}

/// Authoritative outcome of a started round. Everything here is computed by the
/// remote authority and treated as opaque by the client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameResult {
    #[serde(default)]
    pub round_id: Option<RoundId>,
    #[serde(default)]
    pub peg_map: Vec<Vec<f64>>,
    pub path: Vec<PathStep>,
    pub bin_index: u32,
    pub payout_multiplier: f64,
    pub bet_cents: u64,
    pub win_amount: u64,
    #[serde(default)]
    pub client_seed: String,
    #[serde(default, deserialize_with = "string_or_number")]
    pub nonce: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub drop_column: Option<DropColumn>,
}

impl GameResult {
    pub fn won(&self) -> bool {
        self.win_amount > self.bet_cents
    }

    /// Checks the path against the board contract: exactly `BOARD_ROWS` steps in row
    /// order, all columns inside `0..=MAX_COLUMN`.
    pub fn path_violation(&self) -> Option<String> {
        if self.path.len() != BOARD_ROWS {
            return Some(format!(
                "path has {} steps, expected {BOARD_ROWS}",
                self.path.len()
            ));
        }
        self.path.iter().enumerate().find_map(|(index, step)| {
            if u32::try_from(index).ok() != Some(step.row) {
                Some(format!("path step {index} is labelled row {}", step.row))
            } else if step.column > u32::from(MAX_COLUMN) {
                Some(format!(
                    "path step at row {} has column {} outside 0..={MAX_COLUMN}",
                    step.row, step.column
                ))
            } else {
                None
            }
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VerificationField {
    ServerSeed,
    ClientSeed,
    Nonce,
    DropColumn,
}

impl VerificationField {
    pub const ALL: [VerificationField; 4] = [
        VerificationField::ServerSeed,
        VerificationField::ClientSeed,
        VerificationField::Nonce,
        VerificationField::DropColumn,
    ];

    pub fn name(self) -> &'static str {
        match self {
            VerificationField::ServerSeed => "serverSeed",
            VerificationField::ClientSeed => "clientSeed",
            VerificationField::Nonce => "nonce",
            VerificationField::DropColumn => "dropColumn",
        }
    }
}

/// Snapshot of the four values needed to ask the authority to re-derive a round.
/// An empty `server_seed` means the seed has not been resolved yet.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationInput {
    pub server_seed: String,
    pub client_seed: String,
    pub nonce: String,
    pub drop_column: String,
}

impl VerificationInput {
    pub fn field(&self, field: VerificationField) -> &str {
        match field {
            VerificationField::ServerSeed => &self.server_seed,
            VerificationField::ClientSeed => &self.client_seed,
            VerificationField::Nonce => &self.nonce,
            VerificationField::DropColumn => &self.drop_column,
        }
    }

    pub fn set_field(&mut self, field: VerificationField, value: impl Into<String>) {
        let slot = match field {
            VerificationField::ServerSeed => &mut self.server_seed,
            VerificationField::ClientSeed => &mut self.client_seed,
            VerificationField::Nonce => &mut self.nonce,
            VerificationField::DropColumn => &mut self.drop_column,
        };
        *slot = value.into();
    }

    pub fn missing_fields(&self) -> Vec<VerificationField> {
        VerificationField::ALL
            .into_iter()
            .filter(|field| self.field(*field).trim().is_empty())
            .collect()
    }
}

/// Accepts a JSON string or number (or null) and keeps it as text.
pub fn string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    match value {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(serde_json::Value::String(text)) => Ok(Some(text)),
        Some(serde_json::Value::Number(number)) => Ok(Some(number.to_string())),
        Some(other) => Err(serde::de::Error::custom(format!(
            "expected string or number, got {other}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_path() -> Vec<PathStep> {
        (0..BOARD_ROWS as u32)
            .map(|row| PathStep {
                row,
                column: 6,
                direction: if row % 2 == 0 {
                    Direction::Left
                } else {
                    Direction::Right
                },
            })
            .collect()
    }

    #[test]
    fn drop_column_clamps_when_nudged() {
        let left = DropColumn::new(0).expect("column");
        assert_eq!(left.nudge_left().get(), 0);
        let right = DropColumn::new(MAX_COLUMN).expect("column");
        assert_eq!(right.nudge_right().get(), MAX_COLUMN);
        assert_eq!(DropColumn::CENTER.nudge_right().get(), 7);
        assert!(DropColumn::new(13).is_none());
    }

    #[test]
    fn decodes_start_response_with_numeric_nonce() {
        let body = serde_json::json!({
            "roundId": "r1",
            "pegMap": [[0.5, 0.5], [0.4]],
            "path": sample_path(),
            "binIndex": 6,
            "payoutMultiplier": 2.5,
            "betCents": 100,
            "winAmount": 250,
            "clientSeed": "abc",
            "nonce": 42
        });

        let result: GameResult = serde_json::from_value(body).expect("decode");
        assert_eq!(result.round_id, Some(RoundId::new("r1")));
        assert_eq!(result.nonce.as_deref(), Some("42"));
        assert_eq!(result.drop_column, None);
        assert!(result.won());
        assert_eq!(result.path_violation(), None);
    }

    #[test]
    fn direction_accepts_lowercase_aliases() {
        let step: PathStep =
            serde_json::from_str(r#"{"row":0,"column":5,"direction":"left"}"#).expect("decode");
        assert_eq!(step.direction, Direction::Left);
        assert_eq!(step.to_string(), "Row 0: Column 5 \u{2192} LEFT");
    }

    #[test]
    fn path_violation_reports_short_path_bad_column_and_bad_row() {
        let mut result: GameResult = serde_json::from_value(serde_json::json!({
            "roundId": "r1",
            "path": sample_path(),
            "binIndex": 6,
            "payoutMultiplier": 1.0,
            "betCents": 100,
            "winAmount": 100
        }))
        .expect("decode");

        result.path.pop();
        assert!(result.path_violation().expect("short").contains("11 steps"));

        result.path = sample_path();
        result.path[3].column = 13;
        assert!(result.path_violation().expect("column").contains("row 3"));

        result.path = sample_path();
        result.path[11].row = u32::MAX;
        assert!(result
            .path_violation()
            .expect("row")
            .contains(&format!("step 11 is labelled row {}", u32::MAX)));

        result.path = sample_path();
        result.path.swap(2, 3);
        assert!(result.path_violation().is_some());
    }

    #[test]
    fn missing_fields_treat_whitespace_as_empty() {
        let input = VerificationInput {
            server_seed: "  ".into(),
            client_seed: "abc".into(),
            nonce: String::new(),
            drop_column: "6".into(),
        };
        assert_eq!(
            input.missing_fields(),
            vec![VerificationField::ServerSeed, VerificationField::Nonce]
        );
    }
}
