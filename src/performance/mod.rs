//! Concurrency façade: bounded parallel validation of independent documents,
//! per spec.md Sec 5 ("independent invocations on independent byte buffers
//! are fully parallelisable").

pub mod batch_processor;

pub use batch_processor::{
    validate_many, BatchValidationContext, BatchValidationInput, BatchValidationOutput, DEFAULT_MAX_CONCURRENT,
};
