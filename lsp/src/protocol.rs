//! JSON-RPC envelopes exchanged with the server.

use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::{Value, json};

/// JSON-RPC code for "method not found".
pub(crate) const METHOD_NOT_FOUND: i64 = -32601;

#[derive(Debug, thiserror::Error)]
#[error("cannot convert path to file URI: {}", path.display())]
pub(crate) struct PathToUriError {
    path: PathBuf,
}

#[derive(Debug, Serialize)]
pub(crate) struct Request<'a> {
    pub jsonrpc: &'static str,
    pub id: u64,
    pub method: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl<'a> Request<'a> {
    pub fn new(id: u64, method: &'a str, params: Option<Value>) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            method,
            params,
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct Notification<'a> {
    pub jsonrpc: &'static str,
    pub method: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl<'a> Notification<'a> {
    pub fn new(method: &'a str, params: Option<Value>) -> Self {
        Self {
            jsonrpc: "2.0",
            method,
            params,
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct ErrorResponse {
    pub jsonrpc: &'static str,
    pub id: Value,
    pub error: ResponseError,
}

#[derive(Debug, Serialize)]
pub(crate) struct ResponseError {
    pub code: i64,
    pub message: String,
}

impl ErrorResponse {
    pub fn method_not_found(id: Value, method: &str) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            error: ResponseError {
                code: METHOD_NOT_FOUND,
                message: format!("Method not found: {method}"),
            },
        }
    }
}

pub(crate) fn initialize_params(root_uri: &str, root_name: &str) -> Value {
    json!({
        "processId": std::process::id(),
        "clientInfo": {
            "name": "fsls",
            "version": env!("CARGO_PKG_VERSION")
        },
        "rootUri": root_uri,
        "capabilities": {
            "workspace": {
                "configuration": false,
                "didChangeWatchedFiles": { "dynamicRegistration": false }
            },
            "window": {
                "workDoneProgress": false
            }
        },
        "workspaceFolders": [{
            "uri": root_uri,
            "name": root_name
        }]
    })
}

pub(crate) fn path_to_file_uri(path: &Path) -> Result<url::Url, PathToUriError> {
    url::Url::from_file_path(path).map_err(|()| PathToUriError {
        path: path.to_path_buf(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initialize_params_name_the_workspace() {
        let params = initialize_params("file:///src/app", "app");
        assert!(params["processId"].is_number());
        assert_eq!(params["rootUri"], "file:///src/app");
        assert_eq!(params["workspaceFolders"][0]["name"], "app");
        assert_eq!(params["clientInfo"]["name"], "fsls");
    }

    #[test]
    fn request_omits_absent_params() {
        let json = serde_json::to_value(Request::new(1, "shutdown", None)).unwrap();
        assert_eq!(json["jsonrpc"], "2.0");
        assert_eq!(json["id"], 1);
        assert_eq!(json["method"], "shutdown");
        assert!(json.get("params").is_none(), "params must be omitted, not null");
    }

    #[test]
    fn notification_has_no_id() {
        let json =
            serde_json::to_value(Notification::new("initialized", Some(json!({})))).unwrap();
        assert_eq!(json["method"], "initialized");
        assert!(json.get("id").is_none());
        assert!(json["params"].is_object());
    }

    #[test]
    fn method_not_found_echoes_request_id() {
        let json = serde_json::to_value(ErrorResponse::method_not_found(
            json!("abc"),
            "workspace/configuration",
        ))
        .unwrap();
        assert_eq!(json["id"], "abc");
        assert_eq!(json["error"]["code"], METHOD_NOT_FOUND);
        assert!(
            json["error"]["message"]
                .as_str()
                .unwrap()
                .contains("workspace/configuration")
        );
    }

    #[test]
    fn file_uri_from_absolute_path() {
        #[cfg(windows)]
        let path = PathBuf::from(r"C:\work\app");
        #[cfg(not(windows))]
        let path = PathBuf::from("/work/app");

        let uri = path_to_file_uri(&path).unwrap();
        assert_eq!(uri.scheme(), "file");
        assert_eq!(uri.to_file_path().unwrap(), path);
    }

    #[test]
    fn relative_path_has_no_uri() {
        assert!(path_to_file_uri(Path::new("relative/dir")).is_err());
    }
}
