use regex::Regex;
use std::sync::LazyLock;

static RULE_DECL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\brule\s+\w+").unwrap());
static RULE_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\brule\s+\w+\s*\{[\s\S]*\}").unwrap());

/// Shallow structural check on uploaded rule source: there must be at least
/// one `rule <name> { ... }` declaration. This is not a parser; the engine
/// does the real compilation and its failures score as non-matching.
pub fn validate_rule_source(source: &str) -> bool {
    if source.trim().is_empty() {
        return false;
    }
    if !RULE_DECL.is_match(source) {
        return false;
    }
    RULE_BLOCK.is_match(source)
}
