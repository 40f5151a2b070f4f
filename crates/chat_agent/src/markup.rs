//! Literal markers of the tagged tool-call format.

/// Opens an invocation batch; its appearance flips the streaming detector.
pub const INVOCATION_START: &str = "<function_calls>";
/// Closes an invocation batch. Also the stop sequence, so the provider never emits it.
pub const INVOCATION_END: &str = "</function_calls>";

pub const BATCH_TAG: &str = "function_calls";
pub const INVOKE_TAG: &str = "invoke";
pub const TOOL_NAME_TAG: &str = "tool_name";
pub const PARAMETERS_TAG: &str = "parameters";

pub const RESULTS_TAG: &str = "function_results";
pub const RESULT_TAG: &str = "result";
pub const STDOUT_TAG: &str = "stdout";
pub const ERROR_TAG: &str = "error";
