use thiserror::Error;

/// A wire token that is not part of a closed catalog.
///
/// Every catalog lookup returns this instead of an absent value, so an
/// unrecognized protocol, field or symbolic value always surfaces as a
/// reportable error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown {tag} token '{token}'")]
pub struct UnknownVariant {
    pub tag: &'static str,
    pub token: String,
}

impl UnknownVariant {
    pub fn new(tag: &'static str, token: impl Into<String>) -> Self {
        Self {
            tag,
            token: token.into(),
        }
    }
}

/// A name-based reference that does not resolve against the entities
/// seen so far in decode order.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind} '{key}' is not defined before its first use")]
pub struct UnresolvedReference {
    pub kind: &'static str,
    pub key: String,
}

/// An invariant of a statement or entity that its fields violate.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid {subject}: {reason}")]
pub struct InvariantViolation {
    pub subject: &'static str,
    pub reason: &'static str,
}

/// Root cause of a failed decode
#[derive(Debug, Error)]
pub enum DecodeCause {
    #[error("malformed JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("missing required field '{0}'")]
    MissingField(String),

    #[error("field '{field}' {reason}")]
    InvalidField { field: &'static str, reason: String },

    #[error(transparent)]
    UnknownVariant(#[from] UnknownVariant),

    #[error(transparent)]
    UnresolvedReference(#[from] UnresolvedReference),

    #[error("{kind} '{key}' is defined more than once")]
    Duplicate { kind: &'static str, key: String },

    #[error("unexpected node '{0}'")]
    UnexpectedNode(String),

    #[error(transparent)]
    Invariant(#[from] InvariantViolation),
}

/// A decode failure, carrying the raw text of the offending node.
#[derive(Debug, Error)]
#[error("cannot decode {node}: {cause}")]
pub struct DecodeError {
    pub node: String,
    #[source]
    pub cause: DecodeCause,
}

impl DecodeError {
    pub fn new(node: impl Into<String>, cause: impl Into<DecodeCause>) -> Self {
        Self {
            node: node.into(),
            cause: cause.into(),
        }
    }
}

/// Encoding failures. Only reachable through hand-built values that
/// bypass the checked constructors.
#[derive(Debug, Error)]
pub enum EncodeError {
    #[error(transparent)]
    Invariant(#[from] InvariantViolation),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Crate-level error type
#[derive(Debug, Error)]
pub enum Error {
    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Wire JSON did not decode into a ruleset
    #[error(transparent)]
    Decode(#[from] DecodeError),

    /// Ruleset could not be encoded
    #[error("Encode error: {0}")]
    Encode(#[from] EncodeError),

    /// nftables command execution failed
    #[error("nftables error: {message}")]
    Nftables {
        message: String,
        stderr: Option<String>,
        exit_code: Option<i32>,
    },

    /// Snapshot operation failed
    #[error("Snapshot error: {0}")]
    Snapshot(#[from] SnapshotError),

    /// Internal logic error
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Snapshot-specific errors
#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("Snapshot corrupted: {0}")]
    Corrupted(String),

    #[error("Snapshot checksum mismatch: expected {expected}, got {actual}")]
    ChecksumMismatch { expected: String, actual: String },

    #[error("Snapshot not found: {0}")]
    NotFound(String),
}

/// Represents a translated error with helpful context
#[derive(Debug, Clone)]
pub struct ErrorTranslation {
    pub user_message: String,
    pub suggestions: Vec<String>,
    pub help_url: Option<String>,
}

impl ErrorTranslation {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            user_message: message.into(),
            suggestions: Vec::new(),
            help_url: None,
        }
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestions.push(suggestion.into());
        self
    }

    pub fn with_help(mut self, url: impl Into<String>) -> Self {
        self.help_url = Some(url.into());
        self
    }
}

/// Database of nftables error patterns and their translations
pub struct NftablesErrorPattern;

impl NftablesErrorPattern {
    /// Matches an nft stderr message against known patterns and returns a
    /// user-friendly translation.
    pub fn match_error(msg: &str) -> ErrorTranslation {
        let lower = msg.to_lowercase();

        if lower.contains("permission denied") || lower.contains("operation not permitted") {
            return ErrorTranslation::new("Insufficient permissions to modify firewall rules")
                .with_suggestion("Run the command as root or through sudo")
                .with_suggestion("Check if CAP_NET_ADMIN capability is available")
                .with_help("https://wiki.nftables.org/wiki-nftables/index.php/Quick_reference-nftables_in_10_minutes");
        }

        if lower.contains("cache initialization failed") {
            return ErrorTranslation::new(
                "Failed to initialize nftables cache - insufficient privileges",
            )
            .with_suggestion("Listing or changing the ruleset requires CAP_NET_ADMIN")
            .with_suggestion("Run the command as root or through sudo");
        }

        if lower.contains("no such file") || lower.contains("command not found") {
            return ErrorTranslation::new("nftables is not installed or not found in PATH")
                .with_suggestion("Install nftables: sudo apt install nftables  (Debian/Ubuntu)")
                .with_suggestion("Or: sudo dnf install nftables  (Fedora/RHEL)")
                .with_suggestion("Or: sudo pacman -S nftables  (Arch)")
                .with_suggestion("Or point NFTKIT_NFT_COMMAND at the nft binary")
                .with_help("https://wiki.nftables.org/wiki-nftables/index.php/Main_Page");
        }

        if lower.contains("could not process rule") || lower.contains("syntax error") {
            return ErrorTranslation::new("Invalid firewall rule syntax")
                .with_suggestion("Check the rule's match fields against its table family")
                .with_suggestion("Verify port numbers are between 1 and 65535")
                .with_suggestion("Ensure IP addresses and network masks are valid")
                .with_help(
                    "https://wiki.nftables.org/wiki-nftables/index.php/Simple_rule_management",
                );
        }

        if lower.contains("unknown expression type") || lower.contains("invalid expression") {
            return ErrorTranslation::new("Invalid rule expression - protocol or match type error")
                .with_suggestion("Ensure the protocol of each match is valid in the table family")
                .with_suggestion("Check that ICMP rules don't specify port numbers");
        }

        if lower.contains("table") && lower.contains("does not exist") {
            return ErrorTranslation::new("Firewall table does not exist")
                .with_suggestion("Add the table to the ruleset before its chains and sets")
                .with_help("https://wiki.nftables.org/wiki-nftables/index.php/Configuring_tables");
        }

        if lower.contains("chain")
            && (lower.contains("does not exist") || lower.contains("not found"))
        {
            return ErrorTranslation::new("Firewall chain not found")
                .with_suggestion("Ensure the chain exists before adding rules or jumps to it")
                .with_help("https://wiki.nftables.org/wiki-nftables/index.php/Configuring_chains");
        }

        if lower.contains("resource busy") || lower.contains("device or resource busy") {
            return ErrorTranslation::new("Firewall resource is busy")
                .with_suggestion("Another process may be modifying nftables")
                .with_suggestion("Wait a moment and try again");
        }

        if lower.contains("conflict") || lower.contains("already exists") {
            return ErrorTranslation::new("Conflicting firewall rule or table")
                .with_suggestion("A similar table, chain or set already exists")
                .with_suggestion("Flush the table first or rename the new entity");
        }

        if lower.contains("netlink") {
            return ErrorTranslation::new("Communication error with kernel netlink interface")
                .with_suggestion("Check kernel modules: lsmod | grep nf_tables")
                .with_suggestion("Load nf_tables module: sudo modprobe nf_tables")
                .with_help("https://wiki.nftables.org/wiki-nftables/index.php/Troubleshooting");
        }

        ErrorTranslation::new(format!("Firewall error: {msg}"))
            .with_suggestion("Check the detailed error message for more information")
            .with_suggestion("Verify nftables is working: sudo nft list ruleset")
            .with_help("https://wiki.nftables.org/wiki-nftables/index.php/Troubleshooting")
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nftables_missing_command() {
        let translation = NftablesErrorPattern::match_error("command not found: nft");
        assert!(translation.user_message.contains("not installed"));
        assert!(
            translation
                .suggestions
                .iter()
                .any(|s| s.contains("NFTKIT_NFT_COMMAND"))
        );
    }

    #[test]
    fn test_nftables_syntax_error() {
        let translation = NftablesErrorPattern::match_error("could not process rule: syntax error");
        assert!(translation.user_message.contains("Invalid"));
        assert!(translation.help_url.is_some());
    }

    #[test]
    fn test_netlink_error() {
        let translation = NftablesErrorPattern::match_error("netlink error occurred");
        assert!(translation.user_message.contains("netlink"));
        assert!(
            translation
                .suggestions
                .iter()
                .any(|s| s.contains("modprobe"))
        );
    }

    #[test]
    fn test_unknown_variant_message() {
        let err = UnknownVariant::new("tcp field", "bogus");
        assert_eq!(err.to_string(), "unknown tcp field token 'bogus'");
    }

    #[test]
    fn test_decode_error_carries_node_and_cause() {
        let err = DecodeError::new(
            r#"{"table":{}}"#,
            DecodeCause::MissingField("family".to_string()),
        );
        let text = err.to_string();
        assert!(text.contains(r#"{"table":{}}"#));
        assert!(text.contains("missing required field 'family'"));
        assert!(std::error::Error::source(&err).is_some());
    }
}
