use serde::Serialize;
use serde_json::{Map, Value};
use std::fmt;
use thiserror::Error;

pub const PAPER_CLASS: &str = "org.papernet.commercialpaper";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("paper payload is missing required field '{field}'")]
    MissingField { field: &'static str },

    #[error("paper field '{field}' is invalid: {reason}")]
    InvalidField { field: &'static str, reason: String },

    #[error("paper payload is malformed: {reason}")]
    Malformed { reason: String },
}

impl DecodeError {
    pub fn field(&self) -> Option<&'static str> {
        match self {
            DecodeError::MissingField { field } | DecodeError::InvalidField { field, .. } => {
                Some(*field)
            }
            DecodeError::Malformed { .. } => None,
        }
    }
}

/// Lifecycle stage of a paper. Codes match the contract's wire values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PaperState {
    Issued = 1,
    Traded = 2,
    Redeemed = 3,
}

impl PaperState {
    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn from_code(code: u64) -> Option<Self> {
        match code {
            1 => Some(PaperState::Issued),
            2 => Some(PaperState::Traded),
            3 => Some(PaperState::Redeemed),
            _ => None,
        }
    }
}

impl fmt::Display for PaperState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PaperState::Issued => "ISSUED",
            PaperState::Traded => "TRADED",
            PaperState::Redeemed => "REDEEMED",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommercialPaper {
    pub issuer: String,
    pub paper_number: String,
    pub owner: String,
    pub owner_msp: Option<String>,
    pub issue_date: String,
    pub maturity_date: String,
    pub face_value: u64,
    pub state: PaperState,
    pub redeem_date: Option<String>,
}

impl CommercialPaper {
    pub fn make_key(issuer: &str, paper_number: &str) -> String {
        format!("{}:{}", issuer, paper_number)
    }

    pub fn key(&self) -> String {
        Self::make_key(&self.issuer, &self.paper_number)
    }

    pub fn is_redeemed(&self) -> bool {
        self.state == PaperState::Redeemed
    }
}

impl fmt::Display for CommercialPaper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} paper {} owned by {} [{}]",
            self.issuer, self.paper_number, self.owner, self.state
        )
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct WirePaper<'a> {
    class: &'static str,
    key: String,
    current_state: u8,
    issuer: &'a str,
    paper_number: &'a str,
    issue_date_time: &'a str,
    maturity_date_time: &'a str,
    face_value: u64,
    owner: &'a str,
    #[serde(rename = "ownerMSP", skip_serializing_if = "Option::is_none")]
    owner_msp: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    redeem_date_time: Option<&'a str>,
}

/// Serializes a paper into the contract's canonical JSON record.
pub fn encode(paper: &CommercialPaper) -> Result<Vec<u8>, serde_json::Error> {
    serde_json::to_vec(&WirePaper {
        class: PAPER_CLASS,
        key: paper.key(),
        current_state: paper.state.code(),
        issuer: &paper.issuer,
        paper_number: &paper.paper_number,
        issue_date_time: &paper.issue_date,
        maturity_date_time: &paper.maturity_date,
        face_value: paper.face_value,
        owner: &paper.owner,
        owner_msp: paper.owner_msp.as_deref(),
        redeem_date_time: paper.redeem_date.as_deref(),
    })
}

/// Strictly decodes a paper record. Every field a caller reports back
/// (issuer, number, owner, state) must be present; nothing is defaulted.
pub fn decode(bytes: &[u8]) -> Result<CommercialPaper, DecodeError> {
    let value: Value = serde_json::from_slice(bytes).map_err(|e| DecodeError::Malformed {
        reason: e.to_string(),
    })?;
    let Value::Object(record) = value else {
        return Err(DecodeError::Malformed {
            reason: "payload is not a JSON object".to_string(),
        });
    };

    let state_code = required(&record, "currentState")?
        .as_u64()
        .ok_or_else(|| DecodeError::InvalidField {
            field: "currentState",
            reason: "expected an unsigned integer".to_string(),
        })?;
    let state = PaperState::from_code(state_code).ok_or_else(|| DecodeError::InvalidField {
        field: "currentState",
        reason: format!("unknown lifecycle state {}", state_code),
    })?;

    let face_value = required(&record, "faceValue")?
        .as_u64()
        .ok_or_else(|| DecodeError::InvalidField {
            field: "faceValue",
            reason: "expected an unsigned integer".to_string(),
        })?;

    Ok(CommercialPaper {
        issuer: required_str(&record, "issuer")?,
        paper_number: required_str(&record, "paperNumber")?,
        owner: required_str(&record, "owner")?,
        owner_msp: optional_str(&record, "ownerMSP")?,
        issue_date: required_str(&record, "issueDateTime")?,
        maturity_date: required_str(&record, "maturityDateTime")?,
        face_value,
        state,
        redeem_date: optional_str(&record, "redeemDateTime")?,
    })
}

fn required<'a>(record: &'a Map<String, Value>, field: &'static str) -> Result<&'a Value, DecodeError> {
    match record.get(field) {
        None | Some(Value::Null) => Err(DecodeError::MissingField { field }),
        Some(value) => Ok(value),
    }
}

fn required_str(record: &Map<String, Value>, field: &'static str) -> Result<String, DecodeError> {
    match required(record, field)? {
        Value::String(s) if !s.is_empty() => Ok(s.clone()),
        Value::String(_) => Err(DecodeError::InvalidField {
            field,
            reason: "must not be empty".to_string(),
        }),
        other => Err(DecodeError::InvalidField {
            field,
            reason: format!("expected a string, got {}", other),
        }),
    }
}

fn optional_str(record: &Map<String, Value>, field: &'static str) -> Result<Option<String>, DecodeError> {
    match record.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(other) => Err(DecodeError::InvalidField {
            field,
            reason: format!("expected a string, got {}", other),
        }),
    }
}
