use phototdt_rs::PhotoError;

pub const SUCCESS: i32 = 0;
pub const EXECUTION_ERROR: i32 = 1;
pub const INPUT_ERROR: i32 = 2;
/// Some files in a batch failed
pub const PARTIAL_FAILURE: i32 = 3;

/// Exit code for a library error: bad user input versus a failed run.
pub fn for_error(err: &PhotoError) -> i32 {
    match err {
        PhotoError::InvalidInput(_) | PhotoError::Parse(_) | PhotoError::Csv(_) | PhotoError::Json(_) => {
            INPUT_ERROR
        }
        PhotoError::Io(_) | PhotoError::LengthMismatch { .. } | PhotoError::SingularSystem(_) => {
            EXECUTION_ERROR
        }
    }
}
