// CmsVault — Gateway Module
//
// JSON-RPC 2.0 over stdio: the agent a dispatcher reaches through SSH, and
// the protocol types both ends share.

mod agent;
mod protocol;

pub use agent::Agent;
pub use protocol::{
    JsonRpcError, JsonRpcRequest, JsonRpcResponse, INTERNAL_ERROR, INVALID_PARAMS,
    INVALID_REQUEST, METHOD_NOT_FOUND, OPERATION_FAILED, PARSE_ERROR,
};
