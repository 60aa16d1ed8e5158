/// Verification of rulesets before they are applied
///
/// Runs the encoded ruleset through `nft --json --check`, which parses and
/// evaluates the batch without committing it.
use crate::core::encode::encode_json;
use crate::core::error::Result;
use crate::core::nft_json::NftBackend;
use crate::core::ruleset::Ruleset;
use tracing::{info, warn};

/// Result of a ruleset verification operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifyResult {
    pub success: bool,
    /// Sets whose elements do not look like their declared type
    pub warnings: Vec<String>,
    pub errors: Vec<String>,
}

impl VerifyResult {
    /// Creates a successful verification result
    pub fn success() -> Self {
        Self {
            success: true,
            warnings: Vec::new(),
            errors: Vec::new(),
        }
    }

    /// Creates a failed verification result with errors
    pub fn failure(errors: Vec<String>) -> Self {
        Self {
            success: false,
            warnings: Vec::new(),
            errors,
        }
    }

    pub fn with_warnings(mut self, warnings: Vec<String>) -> Self {
        self.warnings = warnings;
        self
    }
}

/// Informal element type warnings for every set of the ruleset
pub fn element_warnings(ruleset: &Ruleset) -> Vec<String> {
    ruleset
        .sets
        .iter()
        .flat_map(|set| {
            set.mismatched_elements().into_iter().map(move |element| {
                format!(
                    "set {} {} {}: '{element}' does not look like {}",
                    set.family, set.table, set.name, set.element_type
                )
            })
        })
        .collect()
}

impl NftBackend {
    /// Verifies a ruleset without applying it.
    ///
    /// # Errors
    ///
    /// Returns `Err` if the ruleset does not encode or nft cannot be run. A
    /// ruleset nft rejects is a successful call with a failed [`VerifyResult`].
    pub async fn check(&self, ruleset: &Ruleset) -> Result<VerifyResult> {
        let payload = encode_json(ruleset)?;
        let warnings = element_warnings(ruleset);
        for warning in &warnings {
            warn!("{warning}");
        }

        info!("Verifying ruleset via nft --json --check");
        let output = self
            .run(&["--json", "--check", "-f", "-"], Some(&payload))
            .await?;

        if output.status.success() {
            info!("Ruleset verification passed");
            Ok(VerifyResult::success().with_warnings(warnings))
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            warn!("Ruleset verification failed: {}", stderr);
            Ok(VerifyResult::failure(parse_nft_errors(&stderr)).with_warnings(warnings))
        }
    }
}

/// Parses nft error output into user-friendly messages
///
/// Attempts to extract meaningful error information from nft's
/// stderr output, falling back to raw output if parsing fails.
pub fn parse_nft_errors(stderr: &str) -> Vec<String> {
    // JSON error format first
    if let Ok(json_err) = serde_json::from_str::<serde_json::Value>(stderr)
        && let Some(errors) = json_err.get("errors").and_then(|e| e.as_array())
    {
        return errors
            .iter()
            .filter_map(|e| e.get("message").and_then(|m| m.as_str()))
            .map(String::from)
            .collect();
    }

    stderr
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        // Caret lines point into the echoed input
        .filter(|line| !line.chars().all(|c| c == '^' || c == '~'))
        .map(|line| {
            line.trim_start_matches("Error: ")
                .trim_start_matches("nft: ")
                .to_string()
        })
        .collect()
}
