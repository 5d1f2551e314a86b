//! Error types.
//!
//! - `ProfileError`: typed failures raised by the analysis stages. The
//!   auto-tuning sweep matches on these to decide whether to keep going.
//! - `AppError`: what the binary reports (message + process exit code).

/// A failure of one `alpha` attempt inside the auto-tuning sweep.
#[derive(Debug, Clone, PartialEq)]
pub struct AttemptFailure {
    pub alpha: f64,
    pub error: ProfileError,
}

/// Failures raised by the profile analysis stages.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ProfileError {
    #[error("not enough data has been clipped ({clipped} of {total} bins)")]
    LittleClipped { clipped: usize, total: usize },

    #[error("a large portion of the data has been clipped ({clipped} of {total} bins)")]
    TooMuchClipped { clipped: usize, total: usize },

    #[error("no profile components have been found")]
    NoComponentsFound,

    #[error("no Gaussian mixture with up to {max_gaussians} components converged")]
    FitDivergence { max_gaussians: usize },

    #[error("found {crossings} crossing(s) of the {level:.3} threshold, at least 2 are required")]
    InsufficientCrossings { level: f64, crossings: usize },

    #[error("numerical degeneracy: {0}")]
    NumericalDegeneracy(&'static str),

    #[error("every alpha in the sweep failed ({} attempts)", attempts.len())]
    AllAttemptsFailed { attempts: Vec<AttemptFailure> },

    #[error("invalid profile: {0}")]
    InvalidProfile(String),
}

impl ProfileError {
    /// Failures the auto-tuning sweep absorbs before trying the next `alpha`.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            ProfileError::LittleClipped { .. }
                | ProfileError::TooMuchClipped { .. }
                | ProfileError::NoComponentsFound
        )
    }

    /// Short user-facing hint on what to try next.
    pub fn remediation(&self) -> &'static str {
        match self {
            ProfileError::LittleClipped { .. } => "try a smaller alpha, or --auto",
            ProfileError::TooMuchClipped { .. } => "try a larger alpha, or --auto",
            ProfileError::NoComponentsFound => {
                "try a different alpha or a smaller --min-comp-len"
            }
            ProfileError::FitDivergence { .. } => {
                "the profile may not be representable as a Gaussian mixture"
            }
            ProfileError::InsufficientCrossings { .. } => {
                "the fitted profile does not cross this level twice"
            }
            ProfileError::NumericalDegeneracy(_) => "check the profile for constant or empty data",
            ProfileError::AllAttemptsFailed { .. } => {
                "inspect the per-alpha failures with --debug-bundle"
            }
            ProfileError::InvalidProfile(_) => "check the input file",
        }
    }

    /// Process exit code used when this error ends a run.
    pub fn exit_code(&self) -> u8 {
        match self {
            ProfileError::InvalidProfile(_) => 2,
            ProfileError::LittleClipped { .. }
            | ProfileError::TooMuchClipped { .. }
            | ProfileError::NoComponentsFound => 3,
            ProfileError::FitDivergence { .. }
            | ProfileError::InsufficientCrossings { .. }
            | ProfileError::NumericalDegeneracy(_) => 4,
            ProfileError::AllAttemptsFailed { .. } => 5,
        }
    }
}

#[derive(Clone)]
pub struct AppError {
    exit_code: u8,
    message: String,
}

impl AppError {
    pub fn new(exit_code: u8, message: impl Into<String>) -> Self {
        Self {
            exit_code,
            message: message.into(),
        }
    }

    pub fn exit_code(&self) -> u8 {
        self.exit_code
    }
}

impl From<ProfileError> for AppError {
    fn from(err: ProfileError) -> Self {
        let mut message = format!("{err} ({})", err.remediation());
        if let ProfileError::AllAttemptsFailed { attempts } = &err {
            for attempt in attempts {
                message.push_str(&format!("\n  alpha={:.2}: {}", attempt.alpha, attempt.error));
            }
        }
        AppError::new(err.exit_code(), message)
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::fmt::Debug for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppError")
            .field("exit_code", &self.exit_code)
            .field("message", &self.message)
            .finish()
    }
}

impl std::error::Error for AppError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recoverable_subset_matches_sweep_policy() {
        assert!(ProfileError::LittleClipped { clipped: 0, total: 10 }.is_recoverable());
        assert!(ProfileError::TooMuchClipped { clipped: 9, total: 10 }.is_recoverable());
        assert!(ProfileError::NoComponentsFound.is_recoverable());
        assert!(!ProfileError::FitDivergence { max_gaussians: 6 }.is_recoverable());
        assert!(!ProfileError::NumericalDegeneracy("std").is_recoverable());
    }

    #[test]
    fn all_attempts_failed_lists_each_alpha() {
        let err = ProfileError::AllAttemptsFailed {
            attempts: vec![
                AttemptFailure {
                    alpha: 1.0,
                    error: ProfileError::TooMuchClipped { clipped: 9, total: 10 },
                },
                AttemptFailure {
                    alpha: 5.0,
                    error: ProfileError::NoComponentsFound,
                },
            ],
        };
        let app: AppError = err.into();
        assert_eq!(app.exit_code(), 5);
        let text = app.to_string();
        assert!(text.contains("alpha=1.00"));
        assert!(text.contains("alpha=5.00"));
    }
}
