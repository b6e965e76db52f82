use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The version of this api.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Timeout used by `/api/command` when the request does not carry one.
pub const DEFAULT_COMMAND_TIMEOUT_MS: u64 = 30_000;

/// Maximum number of bytes captured per output stream of a command.
pub const MAX_OUTPUT_BYTES: usize = 10 * 1024 * 1024;

/// Message of the catch-all 404 response.
pub const ROUTE_NOT_FOUND: &str = "Route not found";

/// Index of a split document, always within [`SplitIndex::MIN`]`..=`[`SplitIndex::MAX`].
///
/// There is no other way to construct one than [`SplitIndex::new`],
/// so any split filename built from it refers to one of the twenty numbered files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "u8")]
pub struct SplitIndex(u8);

impl SplitIndex {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 20;

    /// Returns `None` if `index` lies outside of the split range.
    pub fn new(index: i64) -> Option<Self> {
        u8::try_from(index)
            .ok()
            .filter(|i| (Self::MIN..=Self::MAX).contains(i))
            .map(SplitIndex)
    }

    pub fn get(self) -> u8 {
        self.0
    }

    /// All valid split indices in ascending order.
    pub fn all() -> impl Iterator<Item = SplitIndex> {
        (Self::MIN..=Self::MAX).map(SplitIndex)
    }
}

impl TryFrom<i64> for SplitIndex {
    type Error = InvalidSplitIndex;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Self::new(value).ok_or(InvalidSplitIndex)
    }
}

impl From<SplitIndex> for u8 {
    fn from(value: SplitIndex) -> Self {
        value.0
    }
}

impl fmt::Display for SplitIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidSplitIndex;

impl fmt::Display for InvalidSplitIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Split number must be between {} and {}",
            SplitIndex::MIN,
            SplitIndex::MAX
        )
    }
}

impl std::error::Error for InvalidSplitIndex {}

/// Response of `GET /api/health`. Not wrapped in an [`Envelope`].
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Always `"ok"`.
    pub status: String,
    /// RFC 3339 time of the response.
    pub timestamp: String,
    /// Seconds since the server started.
    pub uptime: f64,
}

/// The uniform wrapper around every response body except the health probe.
///
/// # Serialized Example
/// ```
/// # let ser = r#"
/// {
///     "success": false,
///     "error": "Route not found"
/// }
/// # "#;
/// # let deser: json_depot_api::api::Envelope<json_depot_api::api::ErrorBody>
/// #    = serde_json::from_str(ser).expect("failed parsing");
/// # assert!(!deser.success);
/// # assert_eq!(deser.body.error, json_depot_api::api::ROUTE_NOT_FOUND);
/// ```
#[derive(Debug, Serialize, Deserialize)]
pub struct Envelope<T> {
    pub success: bool,
    #[serde(flatten)]
    pub body: T,
}

impl<T> Envelope<T> {
    pub fn ok(body: T) -> Self {
        Envelope {
            success: true,
            body,
        }
    }

    pub fn failed(body: T) -> Self {
        Envelope {
            success: false,
            body,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

/// Body of `GET /api/data` and `GET /api/data2`.
#[derive(Debug, Serialize, Deserialize)]
pub struct DataBody {
    pub data: Value,
}

/// Body of `GET /api/data/{n}`.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SplitBody {
    pub split_number: SplitIndex,
    /// See [`item_count`].
    pub item_count: usize,
    pub data: Value,
}

impl SplitBody {
    pub fn new(split_number: SplitIndex, data: Value) -> Self {
        SplitBody {
            split_number,
            item_count: item_count(&data),
            data,
        }
    }
}

/// Number of entries of a document: array length, object key count, or 1 for any scalar.
pub fn item_count(data: &Value) -> usize {
    match data {
        Value::Array(items) => items.len(),
        Value::Object(map) => map.len(),
        _ => 1,
    }
}

/// Body of `POST /api/data` and `POST /api/data2`.
#[derive(Debug, Serialize, Deserialize)]
pub struct MessageBody {
    pub message: String,
}

/// Request of `POST /api/command`.
///
/// The command is run by the host shell, so pipes, redirections and
/// variable expansion all work. Nothing is escaped or filtered.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct CommandRequest {
    /// Missing and empty commands are both rejected.
    #[serde(default)]
    pub command: Option<String>,
    /// Milliseconds until the command is killed, see [`DEFAULT_COMMAND_TIMEOUT_MS`].
    #[serde(default)]
    pub timeout: Option<u64>,
}

/// Body of a successful `POST /api/command`.
#[derive(Debug, Serialize, Deserialize)]
pub struct CommandBody {
    pub stdout: String,
    pub stderr: String,
    pub command: String,
}

/// Body of a failed `POST /api/command` which got as far as running the command.
///
/// `stdout` and `stderr` hold whatever was captured before the failure,
/// and are empty if the shell could not be launched at all.
#[derive(Debug, Serialize, Deserialize)]
pub struct CommandFailureBody {
    pub error: String,
    pub stdout: String,
    pub stderr: String,
    pub command: String,
}

/// Body of `GET /api/files`.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilesBody {
    pub total_files: usize,
    pub split_files: usize,
    /// Json file names in the data directory, sorted.
    pub files: Vec<String>,
    pub available_splits: Vec<SplitIndex>,
    pub info: FilesInfo,
}

/// Describes which files the server reads and writes.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilesInfo {
    pub primary: String,
    pub secondary: String,
    /// E.g. `riot-output_split_<n>.json`
    pub split_pattern: String,
    pub split_range: [u8; 2],
}
