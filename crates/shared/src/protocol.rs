use serde::{Deserialize, Serialize};

use crate::domain::{string_or_number, DropColumn, PathStep, RoundId, VerificationInput};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitResponse {
    pub round_id: RoundId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartRoundRequest {
    pub client_seed: String,
    pub bet_cents: u64,
    pub drop_column: DropColumn,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RevealResponse {
    #[serde(default)]
    pub server_seed: Option<String>,
    #[serde(default)]
    pub client_seed: Option<String>,
    #[serde(default, deserialize_with = "string_or_number")]
    pub nonce: Option<String>,
}

/// Query string for `GET /api/verify`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyQuery {
    pub server_seed: String,
    pub client_seed: String,
    pub nonce: String,
    pub drop_column: String,
}

impl From<&VerificationInput> for VerifyQuery {
    fn from(value: &VerificationInput) -> Self {
        Self {
            server_seed: value.server_seed.trim().to_string(),
            client_seed: value.client_seed.trim().to_string(),
            nonce: value.nonce.trim().to_string(),
            drop_column: value.drop_column.trim().to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyResponse {
    #[serde(default)]
    pub commit_hex: Option<String>,
    #[serde(default)]
    pub combined_seed: Option<String>,
    #[serde(default)]
    pub peg_map_hash: Option<String>,
    #[serde(default)]
    pub bin_index: Option<u32>,
    #[serde(default)]
    pub payout_multiplier: Option<f64>,
    #[serde(default)]
    pub path: Option<Vec<PathStep>>,
}
