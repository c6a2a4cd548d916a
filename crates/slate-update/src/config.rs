use serde::{Deserialize, Serialize};

/// How aggressively field mutations are rewritten into literal assignments
/// when they are logged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogStrategy {
    /// Rewrite every modifier whose result depends on the prior value:
    /// bounded `$push`, `$bit` and `$inc`.
    #[default]
    Conservative,
    /// Like `Conservative`, but `$bit` and `$inc` are logged verbatim when the
    /// field was absent before, since their result then depends only on the
    /// operands.
    Minimal,
    /// Rewrite every change that leaves a value behind.
    RewriteAll,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateConfig {
    #[serde(default)]
    pub log_strategy: LogStrategy,
}
