use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const JSONRPC_VERSION: &str = "2.0";

#[derive(Serialize, Debug)]
pub struct RpcRequest<'a> {
    pub id: &'a str,
    pub method: &'a str,
    pub params: Value,
    pub jsonrpc: &'static str,
}

impl<'a> RpcRequest<'a> {
    pub fn new(id: &'a str, method: &'a str, params: Value) -> Self {
        Self {
            id,
            method,
            params,
            jsonrpc: JSONRPC_VERSION,
        }
    }
}

#[derive(Deserialize, Debug, Default)]
pub struct RpcResponse {
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub error: Option<RpcError>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct RpcError {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub code: i64,
}

/// `result` of a successful `authenticate` call
#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct AuthResult {
    pub session_id: Option<String>,
    #[serde(default)]
    pub person_id: i64,
    #[serde(default)]
    pub person_type: i64,
}
