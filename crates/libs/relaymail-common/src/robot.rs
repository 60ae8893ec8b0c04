use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Schema version for the `--robot-help`/`--robot-examples`/`--robot-status`
/// machine-readable output family. Bump on breaking field changes.
pub const ROBOT_HELP_SCHEMA_VERSION: &str = "1.0.0";

/// Root structure for robot-friendly help output
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RobotHelp {
    /// The name of the program/binary
    pub program: String,
    /// Semantic version of the program
    pub version: String,
    /// Brief description of the program
    pub description: String,
    /// List of available subcommands
    pub commands: Vec<RobotCommand>,
}

/// Description of a single subcommand
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RobotCommand {
    /// The name of the subcommand (e.g., "server", "config")
    pub name: String,
    /// Brief description of what the command does
    pub about: String,
    /// List of arguments accepted by this command
    pub args: Vec<RobotArg>,
    /// List of sub-subcommands (nested commands)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub subcommands: Vec<RobotCommand>,
}

/// Description of a command argument
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RobotArg {
    /// The name of the argument (e.g., "port", "config")
    pub name: String,
    /// The long flag version (e.g., "--port")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub long: Option<String>,
    /// The short flag version (e.g., "-p")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub short: Option<char>, // Using char for single character short flags
    /// Description of the argument
    #[serde(default)]
    pub help: String,
    /// Whether the argument is required
    pub required: bool,
    /// Possible values if restricted (enum-like)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub possible_values: Vec<String>,
}

/// A single example invocation shown alongside a command or robot-* flag.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Example {
    /// The full command line to run.
    pub invocation: String,
    /// What the example demonstrates.
    pub description: String,
}

/// Description of a single command parameter for `--robot-help` output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParameterSchema {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub long: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub short: Option<char>,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub param_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
    pub required: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub possible_values: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub env_var: Option<String>,
}

/// Description of a command (and its subcommands) for `--robot-help` output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandSchema {
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub parameters: Vec<ParameterSchema>,
    #[serde(default)]
    pub exit_codes: HashMap<u32, String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub subcommands: Vec<CommandSchema>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub examples: Vec<Example>,
}

/// Description of one of the `--robot-*` discovery flags themselves.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RobotFlagSchema {
    pub name: String,
    pub description: String,
    pub output_format: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub examples: Vec<Example>,
}

/// Root structure returned by `--robot-help`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RobotHelpOutput {
    pub schema_version: String,
    pub tool: String,
    pub version: String,
    pub description: String,
    pub commands: Vec<CommandSchema>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub robot_flags: Vec<RobotFlagSchema>,
}
