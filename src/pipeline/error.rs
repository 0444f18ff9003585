use thiserror::Error;

use super::PipelineState;
use crate::profile::EncodeProfile;

/// Fatal pipeline failures.
///
/// Cleanup and descriptor-sanitize problems are not errors; they are logged
/// and the run still succeeds.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Missing tool or input file; nothing has run yet.
    #[error("setup failed: {0}")]
    Setup(String),

    #[error("stream analysis failed: {0}")]
    Analysis(String),

    /// Partially decoded artifacts are left in place.
    #[error("decode failed for {profile}: {message}")]
    Decode {
        profile: EncodeProfile,
        message: String,
    },

    #[error("failed to build descriptor for {profile}: {message}")]
    Descriptor {
        profile: EncodeProfile,
        message: String,
    },

    #[error("encode failed for {profile} (exit {exit_code}); last output:\n{}", .tail.join("\n"))]
    Encode {
        profile: EncodeProfile,
        exit_code: i32,
        tail: Vec<String>,
    },

    #[error("finalize failed for {profile}: {message}")]
    Finalize {
        profile: EncodeProfile,
        message: String,
    },

    /// Shutdown signal received while the run was in `state`.
    #[error("interrupted during {state}")]
    Interrupted {
        state: PipelineState,
        profile: Option<EncodeProfile>,
    },
}

impl PipelineError {
    /// State the run was in when it failed; `None` for setup failures.
    pub fn stage(&self) -> Option<PipelineState> {
        match self {
            PipelineError::Setup(_) => None,
            PipelineError::Analysis(_) => Some(PipelineState::Analyze),
            PipelineError::Decode { .. } => Some(PipelineState::Decode),
            PipelineError::Descriptor { .. } => Some(PipelineState::BuildConfig),
            PipelineError::Encode { .. } => Some(PipelineState::Encode),
            PipelineError::Finalize { .. } => Some(PipelineState::Finalize),
            PipelineError::Interrupted { state, .. } => Some(*state),
        }
    }

    /// Profile of the failing sub-run, if the failure belongs to one.
    pub fn profile(&self) -> Option<EncodeProfile> {
        match self {
            PipelineError::Setup(_) | PipelineError::Analysis(_) => None,
            PipelineError::Decode { profile, .. }
            | PipelineError::Descriptor { profile, .. }
            | PipelineError::Encode { profile, .. }
            | PipelineError::Finalize { profile, .. } => Some(*profile),
            PipelineError::Interrupted { profile, .. } => *profile,
        }
    }
}

impl From<ddpforge_av::Error> for PipelineError {
    fn from(e: ddpforge_av::Error) -> Self {
        PipelineError::Setup(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stages() {
        assert_eq!(PipelineError::Setup("x".into()).stage(), None);
        assert_eq!(
            PipelineError::Analysis("x".into()).stage(),
            Some(PipelineState::Analyze)
        );
        let err = PipelineError::Descriptor {
            profile: EncodeProfile::Ddp51,
            message: "disk full".into(),
        };
        assert_eq!(err.stage(), Some(PipelineState::BuildConfig));
        assert_eq!(err.profile(), Some(EncodeProfile::Ddp51));
    }

    #[test]
    fn interrupted_reports_its_state() {
        let err = PipelineError::Interrupted {
            state: PipelineState::Finalize,
            profile: Some(EncodeProfile::Atmos51Online),
        };
        assert_eq!(err.stage(), Some(PipelineState::Finalize));
        assert_eq!(err.profile(), Some(EncodeProfile::Atmos51Online));
        assert_eq!(err.to_string(), "interrupted during finalize");
    }

    #[test]
    fn encode_error_shows_tail() {
        let err = PipelineError::Encode {
            profile: EncodeProfile::Atmos71BluRay,
            exit_code: 2,
            tail: vec!["line one".into(), "ERROR: bad job".into()],
        };
        let text = err.to_string();
        assert!(text.contains("exit 2"));
        assert!(text.ends_with("line one\nERROR: bad job"));
    }
}
