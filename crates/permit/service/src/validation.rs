//! Creation-time checks on caller-supplied drafts

use chrono::Duration;
use permit_types::{PermitDraft, PermitError, PermitKind, PermitResult};

/// Longest allowed entry-to-exit span of a Permit to Work
pub const MAX_PERMIT_TO_WORK_DAYS: i64 = 5;

/// Validate a draft before the engine sees it
pub fn validate_draft(kind: PermitKind, draft: &PermitDraft) -> PermitResult<()> {
    if draft.title.trim().is_empty() {
        return Err(PermitError::InvalidArgument("title is required".into()));
    }
    if draft.department.as_str().trim().is_empty() {
        return Err(PermitError::InvalidArgument("department is required".into()));
    }

    let window = draft.window;
    match kind {
        PermitKind::JobPermit => {
            if window.start >= window.end {
                return Err(PermitError::InvalidArgument(format!(
                    "start {} must be before end {}",
                    window.start, window.end
                )));
            }
        }
        PermitKind::PermitToWork => {
            if window.start >= window.end {
                return Err(PermitError::InvalidArgument(format!(
                    "entry {} must be before exit {}",
                    window.start, window.end
                )));
            }
            if window.duration() > Duration::days(MAX_PERMIT_TO_WORK_DAYS) {
                return Err(PermitError::InvalidArgument(format!(
                    "a permit to work may span at most {} days",
                    MAX_PERMIT_TO_WORK_DAYS
                )));
            }
        }
    }
    Ok(())
}
