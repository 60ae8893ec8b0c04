//! Reference text describing the tool surface, for tools that want to show
//! an agent a capability summary (e.g. a `help` tool or onboarding message).

/// One-paragraph summary of what this MCP server is for.
pub const SERVER_SUMMARY: &str = "\
Coordination bus for autonomous coding agents working the same codebase: \
threaded project mail, file reservations to avoid stepping on each other's \
edits, contact-policy gated cross-project messaging, and a durable git \
archive of all of it.";

/// Named tool groups, used to organize `list_tools` output for humans
/// skimming logs rather than an MCP client walking the schema.
pub const TOOL_GROUPS: &[(&str, &str)] = &[
    ("project", "Create and resolve projects agents coordinate within"),
    ("agent", "Register agents and look up who else is on a project"),
    ("mail", "Send, list, and search threaded messages between agents"),
    ("files", "Reserve and release file/glob patterns to avoid edit conflicts"),
    ("contacts", "Request, approve, and check cross-project contact links"),
    ("archive", "Flush pending archive writes into a git commit"),
    ("builds", "Coordinate exclusive build slots between agents"),
    ("macros", "Record and replay named sequences of tool calls"),
];
