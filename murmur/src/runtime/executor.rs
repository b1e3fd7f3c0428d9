use std::borrow::Cow;

use redis::aio::ConnectionLike;
use serde_json::Value;

use crate::{
    errors::StoreError,
    runtime::{commands::CommitPlan, scripts::COMMIT_SCRIPT},
};

/// Runs the commit script for `plan`. Either every write lands or none does.
pub async fn execute_commit<C>(conn: &mut C, plan: &CommitPlan) -> Result<Value, StoreError>
where
    C: ConnectionLike + Send,
{
    let payload = serde_json::to_string(plan).map_err(|err| StoreError::Other {
        message: Cow::Owned(format!("failed to serialize commit plan: {err}")),
    })?;

    let mut invocation = COMMIT_SCRIPT.prepare_invoke();
    invocation.arg(payload);
    let raw: String = invocation.invoke_async(conn).await?;

    let value: Value = serde_json::from_str(&raw).map_err(|err| StoreError::Other {
        message: Cow::Owned(format!("failed to parse lua response: {err}")),
    })?;

    let Some(error) = value.get("error") else {
        return Ok(value);
    };

    match error.as_str() {
        Some("version_conflict") => Err(StoreError::Conflict {
            key: string_field(&value, "key"),
            expected: value.get("expected").and_then(Value::as_u64).unwrap_or_default(),
            actual: value.get("actual").and_then(Value::as_u64).unwrap_or_default(),
        }),
        Some("unique_constraint_violation") => Err(StoreError::UniqueViolation {
            fields: string_list(&value, "fields"),
            values: string_list(&value, "values"),
            existing_entity_id: string_field(&value, "existing_entity_id"),
        }),
        Some(other) => Err(StoreError::Other {
            message: Cow::Owned(other.to_string()),
        }),
        None => Err(StoreError::Other {
            message: Cow::Borrowed("lua_error"),
        }),
    }
}

fn string_field(value: &Value, name: &str) -> String {
    value
        .get(name)
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_default()
}

fn string_list(value: &Value, name: &str) -> Vec<String> {
    value
        .get(name)
        .and_then(Value::as_array)
        .map(|arr| {
            arr.iter()
                .map(|v| match v {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                })
                .collect()
        })
        .unwrap_or_default()
}

#[allow(async_fn_in_trait)]
pub trait CommitExecutor {
    async fn execute(&mut self, plan: &CommitPlan) -> Result<Value, StoreError>;
}

pub struct RedisExecutor<'a, C>
where
    C: ConnectionLike + Send,
{
    connection: &'a mut C,
}

impl<'a, C> RedisExecutor<'a, C>
where
    C: ConnectionLike + Send,
{
    pub fn new(connection: &'a mut C) -> Self {
        Self { connection }
    }
}

impl<C> CommitExecutor for RedisExecutor<'_, C>
where
    C: ConnectionLike + Send,
{
    async fn execute(&mut self, plan: &CommitPlan) -> Result<Value, StoreError> {
        execute_commit(self.connection, plan).await
    }
}
