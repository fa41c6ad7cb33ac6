//! Process exit codes for the `holo` binary.
//!
//! | Code | Meaning |
//! |------|---------|
//! | 0 | Completed (including searches with no known answer) |
//! | 1 | Configuration, I/O, or other errors |
//! | 2 | Invalid query or module path |
//! | 3 | Both curated mappings and the embedding index unavailable |
//! | 130 | Interrupted |

use holo_index_core::HoloError;

pub const OTHER_ERROR: u8 = 1;
pub const INVALID_INPUT: u8 = 2;
pub const INFRASTRUCTURE_FAILURE: u8 = 3;
pub const INTERRUPTED: u8 = 130;

/// Exit code for an error returned by a command.
pub fn exit_code(err: &anyhow::Error) -> u8 {
    let typed = err.chain().find_map(|cause| cause.downcast_ref::<HoloError>());
    match typed {
        Some(e) if e.is_input_error() => INVALID_INPUT,
        Some(HoloError::InfrastructureFailure { .. }) => INFRASTRUCTURE_FAILURE,
        _ => OTHER_ERROR,
    }
}
