use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A stored record together with its id
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Document {
    pub id: String,
    pub data: Value,
}

impl Document {
    pub fn parse<T: serde::de::DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_value(self.data.clone())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryRequest {
    pub field: String,
    pub value: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddResponse {
    pub id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecrementRequest {
    pub field: String,
}

/// `value` is the new count, or `None` when the field was already at or below zero
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecrementResponse {
    pub value: Option<i64>,
}
