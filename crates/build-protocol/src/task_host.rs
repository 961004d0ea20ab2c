//! The task-host sub-protocol: running a single task in a dedicated worker.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskHostMode {
    /// Spawned per task invocation; exits after the requesting build completes.
    Transient,
    /// Persists across task invocations within a session; shut down
    /// explicitly by session teardown.
    Sidecar,
}

/// The supported primitive parameter value set for task-host marshaling.
/// Single-dimensional arrays are transported as a semicolon-joined
/// canonical textual form; custom value types round-trip via `ToString`/
/// `TryParse` under an invariant locale, represented here as `Custom`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TaskHostValue {
    Bool(bool),
    I8(i8),
    U8(u8),
    I16(i16),
    U16(u16),
    I32(i32),
    U32(u32),
    I64(i64),
    U64(u64),
    F32(f32),
    F64(f64),
    Decimal(String),
    Char(char),
    String(String),
    Timestamp(String),
    Enum(String),
    Array(Vec<TaskHostValue>),
    Custom { type_name: String, round_tripped: String },
}

impl TaskHostValue {
    /// Canonical semicolon-joined textual form used on the wire for
    /// single-dimensional arrays of any supported primitive.
    pub fn array_to_wire(items: &[TaskHostValue]) -> String {
        items
            .iter()
            .map(TaskHostValue::scalar_to_wire)
            .collect::<Vec<_>>()
            .join(";")
    }

    fn scalar_to_wire(value: &TaskHostValue) -> String {
        match value {
            TaskHostValue::Bool(b) => b.to_string(),
            TaskHostValue::I8(v) => v.to_string(),
            TaskHostValue::U8(v) => v.to_string(),
            TaskHostValue::I16(v) => v.to_string(),
            TaskHostValue::U16(v) => v.to_string(),
            TaskHostValue::I32(v) => v.to_string(),
            TaskHostValue::U32(v) => v.to_string(),
            TaskHostValue::I64(v) => v.to_string(),
            TaskHostValue::U64(v) => v.to_string(),
            TaskHostValue::F32(v) => v.to_string(),
            TaskHostValue::F64(v) => v.to_string(),
            TaskHostValue::Decimal(v) => v.clone(),
            TaskHostValue::Char(v) => v.to_string(),
            TaskHostValue::String(v) => v.clone(),
            TaskHostValue::Timestamp(v) => v.clone(),
            TaskHostValue::Enum(v) => v.clone(),
            TaskHostValue::Array(items) => TaskHostValue::array_to_wire(items),
            TaskHostValue::Custom { round_tripped, .. } => round_tripped.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskHostTaskRequest {
    pub task_name: String,
    pub parameters: Vec<(String, TaskHostValue)>,
    /// Working directory for the invocation, resolved per the sole
    /// deterministic startup-directory rule (project directory when known
    /// and multi-threaded execution is enabled, otherwise the session's
    /// current directory).
    pub working_directory: std::path::PathBuf,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskHostTaskResult {
    pub succeeded: bool,
    pub output_parameters: Vec<(String, TaskHostValue)>,
    pub exception_message: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn array_joins_scalars_with_semicolons() {
        let arr = vec![TaskHostValue::I32(1), TaskHostValue::I32(2), TaskHostValue::I32(3)];
        assert_eq!(TaskHostValue::array_to_wire(&arr), "1;2;3");
    }

    #[test]
    fn custom_value_round_trips_its_string_form() {
        let v = TaskHostValue::Custom { type_name: "MyStruct".into(), round_tripped: "x=1,y=2".into() };
        assert_eq!(TaskHostValue::array_to_wire(&[v]), "x=1,y=2");
    }
}
