use serde::{Serialize, Serializer};

/// Everything a transaction wants to apply, plus the versions its reads depended on.
#[derive(Debug, Default, Serialize)]
pub struct CommitPlan {
    pub guards: Vec<VersionGuard>,
    pub writes: Vec<WriteCommand>,
}

impl CommitPlan {
    pub fn is_read_only(&self) -> bool {
        self.writes.is_empty()
    }
}

/// The version a key had when the transaction read it. Missing keys read as version 0.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VersionGuard {
    pub key: String,
    pub version: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum WriteCommand {
    Put {
        key: String,
        payload_json: String,
    },
    Delete {
        key: String,
    },
    IndexAdd {
        index: String,
        member: String,
        #[serde(serialize_with = "score_as_string")]
        score: i64,
    },
    IndexRemove {
        index: String,
        member: String,
    },
    IndexDrop {
        index: String,
    },
    /// Fails the whole commit when `key` is held by anyone other than `owner`.
    ClaimUnique {
        key: String,
        owner: String,
        field: String,
        value: String,
    },
}

impl WriteCommand {
    /// Key whose version counter this write bumps.
    pub fn target(&self) -> &str {
        match self {
            WriteCommand::Put { key, .. } | WriteCommand::Delete { key } | WriteCommand::ClaimUnique { key, .. } => key,
            WriteCommand::IndexAdd { index, .. }
            | WriteCommand::IndexRemove { index, .. }
            | WriteCommand::IndexDrop { index } => index,
        }
    }
}

// Lua numbers are doubles; passing the score as a string keeps every digit.
fn score_as_string<S: Serializer>(score: &i64, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&score.to_string())
}
