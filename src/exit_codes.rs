//! Exit code constants for the buildlock CLI.
//!
//! - 0: Success
//! - 1: User error (bad args, invalid config, lock misuse)
//! - 2: Filesystem failure while preparing or taking a lock
//! - 3: Mode transition failure (upgrade/downgrade left nothing held)
//! - 4: Lock acquisition timed out
//! - 5: Internal error (a report could not be rendered)

/// Successful execution.
pub const SUCCESS: i32 = 0;

/// User error: bad arguments, invalid configuration, or a misused handle.
pub const USER_ERROR: i32 = 1;

/// Filesystem failure: permission denied, read-only filesystem, missing ancestor.
pub const FILESYSTEM_FAILURE: i32 = 2;

/// Upgrade or downgrade failed after the previous mode was released.
pub const TRANSITION_FAILURE: i32 = 3;

/// Lock acquisition failure: the requested mode was not obtained in time.
pub const LOCK_FAILURE: i32 = 4;

/// Internal error: output the tool produces itself could not be rendered.
pub const INTERNAL_ERROR: i32 = 5;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_are_distinct() {
        let codes = [
            SUCCESS,
            USER_ERROR,
            FILESYSTEM_FAILURE,
            TRANSITION_FAILURE,
            LOCK_FAILURE,
            INTERNAL_ERROR,
        ];
        for (i, &a) in codes.iter().enumerate() {
            for (j, &b) in codes.iter().enumerate() {
                if i != j {
                    assert_ne!(a, b, "Exit codes must be distinct");
                }
            }
        }
    }

    #[test]
    fn lock_failure_keeps_its_historic_value() {
        assert_eq!(SUCCESS, 0);
        assert_eq!(LOCK_FAILURE, 4);
    }
}
