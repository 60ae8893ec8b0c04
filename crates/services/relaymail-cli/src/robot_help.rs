//! Machine-readable self-description backing `--robot-help`,
//! `--robot-examples`, and `--robot-status`.
//!
//! Keep [`EXAMPLE_REGISTRY`]'s keys in sync with the actual `Commands` enum
//! in `main.rs`; a stale entry here just misleads an agent calling
//! `--robot-examples`.

use once_cell::sync::Lazy;
use relaymail_common::robot::Example;
use serde::Serialize;
use std::collections::HashMap;

/// One registry entry: the examples for a single command or `--robot-*` flag.
#[derive(Debug, Clone, Serialize)]
pub struct RegistryEntry {
    pub target_type: String,
    pub examples: Vec<Example>,
}

fn entry(target_type: &str, examples: Vec<(&str, &str)>) -> RegistryEntry {
    RegistryEntry {
        target_type: target_type.to_string(),
        examples: examples
            .into_iter()
            .map(|(invocation, description)| Example {
                invocation: invocation.to_string(),
                description: description.to_string(),
            })
            .collect(),
    }
}

pub static EXAMPLE_REGISTRY: Lazy<HashMap<&'static str, RegistryEntry>> = Lazy::new(|| {
    let mut m = HashMap::new();

    m.insert(
        "serve",
        entry(
            "command",
            vec![("relaymail serve http", "Start the HTTP/MCP-bridge server")],
        ),
    );
    m.insert(
        "serve http",
        entry(
            "command",
            vec![("relaymail serve http --port 8765", "Start the HTTP server on a custom port")],
        ),
    );
    m.insert(
        "serve mcp",
        entry(
            "command",
            vec![("relaymail serve mcp --transport stdio", "Start the MCP server over stdio")],
        ),
    );
    m.insert(
        "health",
        entry(
            "command",
            vec![("relaymail health", "Check whether a running server is reachable")],
        ),
    );
    m.insert(
        "config",
        entry(
            "command",
            vec![("relaymail config show-port", "Print the configured server port")],
        ),
    );
    m.insert(
        "schema",
        entry(
            "command",
            vec![("relaymail schema", "Dump the tool/command JSON schema")],
        ),
    );
    m.insert(
        "tools",
        entry("command", vec![("relaymail tools", "List available MCP tools")]),
    );
    m.insert(
        "install",
        entry(
            "command",
            vec![("relaymail install alias", "Install a shell alias for this binary")],
        ),
    );
    m.insert(
        "service",
        entry(
            "command",
            vec![("relaymail service start --background", "Start the server as a background service")],
        ),
    );
    m.insert(
        "archive",
        entry(
            "command",
            vec![("relaymail archive save --label checkpoint", "Snapshot the git archive")],
        ),
    );
    m.insert(
        "summarize",
        entry(
            "command",
            vec![("relaymail summarize", "Summarize recent project activity")],
        ),
    );
    m.insert(
        "version",
        entry("command", vec![("relaymail version", "Print the binary version")]),
    );
    m.insert(
        "products",
        entry(
            "command",
            vec![("relaymail products ensure --product-uid acme --name Acme", "Register a product")],
        ),
    );
    m.insert(
        "guard",
        entry(
            "command",
            vec![("relaymail guard status", "Show installed pre-commit/pre-push guard scripts")],
        ),
    );
    m.insert(
        "mail",
        entry("command", vec![("relaymail mail status", "Show mailbox status")]),
    );

    m.insert(
        "--robot-help",
        entry(
            "flag",
            vec![
                ("relaymail --robot-help", "Show all capabilities as JSON"),
                ("relaymail --robot-help --format yaml", "Show capabilities as YAML"),
            ],
        ),
    );
    m.insert(
        "--robot-examples",
        entry(
            "flag",
            vec![
                ("relaymail --robot-examples serve", "Examples for the serve command"),
                (
                    "relaymail --robot-examples --robot-examples",
                    "Self-documenting: show examples for robot-examples itself",
                ),
            ],
        ),
    );
    m.insert(
        "--robot-status",
        entry(
            "flag",
            vec![("relaymail --robot-status", "Machine-readable health check of DB/archive/config")],
        ),
    );

    m
});

/// Output of `--robot-status`.
#[derive(Debug, Clone, Serialize)]
pub struct RobotStatusOutput {
    pub schema_version: String,
    pub tool: String,
    pub version: String,
    pub timestamp: String,
    pub status: String,
    pub checks: HashMap<String, CheckResult>,
    pub exit_code: u8,
}

#[derive(Debug, Clone, Serialize)]
pub struct CheckResult {
    pub status: String,
    pub path: Option<String>,
    pub port: Option<u16>,
    pub details: Option<String>,
}

/// Output of `--robot-examples`.
#[derive(Debug, Clone, Serialize)]
pub struct RobotExamplesOutput {
    pub schema_version: String,
    pub target: String,
    pub target_type: String,
    pub examples: Vec<Example>,
}
