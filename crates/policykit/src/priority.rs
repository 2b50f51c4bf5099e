//! Priority reconciliation.
//!
//! The server does not reject an out-of-range priority; it stores a valid one
//! instead. Accepting that substitution would make every later pass see drift
//! and write again, so a mismatch is reported as [`Error::PriorityConflict`].
//! Callers record the policy identity before checking.

use crate::error::{Error, Result};

/// Compare the requested priority with the one the server stored.
pub fn validate(requested: u32, assigned: u32, id: &str) -> Result<()> {
    if requested == assigned {
        return Ok(());
    }
    Err(Error::PriorityConflict {
        requested,
        assigned,
        id: id.to_string(),
    })
}

/// Check a write result. Nothing to reconcile unless both sides carry a priority.
pub fn reconcile(requested: Option<u32>, assigned: Option<u32>, id: &str) -> Result<()> {
    match (requested, assigned) {
        (Some(requested), Some(assigned)) => validate(requested, assigned, id),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matching_priority_is_accepted() {
        assert!(validate(3, 3, "00p1").is_ok());
    }

    #[test]
    fn test_mismatch_carries_both_values() {
        match validate(2, 5, "00p1") {
            Err(Error::PriorityConflict {
                requested,
                assigned,
                id,
            }) => {
                assert_eq!(requested, 2);
                assert_eq!(assigned, 5);
                assert_eq!(id, "00p1");
            }
            other => panic!("Expected PriorityConflict, got {other:?}"),
        }
    }

    #[test]
    fn test_absent_priority_is_never_a_conflict() {
        assert!(reconcile(None, Some(7), "00p1").is_ok());
        assert!(reconcile(Some(7), None, "00p1").is_ok());
        assert!(reconcile(None, None, "00p1").is_ok());
        assert!(reconcile(Some(1), Some(2), "00p1").is_err());
    }
}
