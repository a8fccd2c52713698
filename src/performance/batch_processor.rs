//! Concurrent batch validation: spec.md Sec 5 says independent invocations
//! on independent byte buffers are fully parallelisable. This is the thin
//! façade that takes advantage of that — one `tokio` task per document,
//! results folded back in input order so fetch/completion order never
//! changes what the caller sees.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::config::SignatureOptions;
use crate::error::Result;
use crate::policy::Lpa;
use crate::signature::{validate_all_signatures, SignatureReport};
use crate::traits::HttpTransport;
use crate::types::X509Certificate;

/// One document submitted to [`validate_many`].
pub struct BatchValidationInput {
    pub label: String,
    pub pdf: Vec<u8>,
}

/// Outcome for one [`BatchValidationInput`], positionally aligned with the
/// input slice regardless of completion order.
pub struct BatchValidationOutput {
    pub label: String,
    pub result: Result<Vec<SignatureReport>>,
}

/// Shared, read-only material every concurrent validation needs. Cloning a
/// certificate list per task is cheap relative to the network/crypto work
/// each task performs, so this is handed out as owned data rather than
/// threaded through a lock.
#[derive(Clone)]
pub struct BatchValidationContext {
    pub trust_anchors: Vec<X509Certificate>,
    pub tsa_trust_anchors: Vec<X509Certificate>,
    pub options: SignatureOptions,
    pub lpa: Option<Arc<Lpa>>,
    pub at_time: DateTime<Utc>,
}

/// Maximum number of documents validated at once. Unbounded concurrency
/// against a slow OCSP/CRL/TSA responder just moves the queueing from here
/// to the network stack; a bounded `tokio::task::JoinSet` keeps backpressure
/// visible to the caller instead.
pub const DEFAULT_MAX_CONCURRENT: usize = 8;

/// Validate every document in `inputs` concurrently (bounded by
/// `max_concurrent`), returning one output per input in the same order.
/// `transport` is cloned per task; pass `None` to validate offline
/// (revocation/LTV evidence only, no network fetches).
pub async fn validate_many(
    inputs: Vec<BatchValidationInput>,
    context: BatchValidationContext,
    transport: Option<Arc<dyn HttpTransport>>,
    max_concurrent: usize,
) -> Vec<BatchValidationOutput> {
    let max_concurrent = max_concurrent.max(1);
    let mut results: Vec<Option<BatchValidationOutput>> = (0..inputs.len()).map(|_| None).collect();
    let mut remaining: Vec<(usize, BatchValidationInput)> = inputs.into_iter().enumerate().collect();
    remaining.reverse();

    let mut in_flight = tokio::task::JoinSet::new();

    loop {
        while in_flight.len() < max_concurrent {
            let Some((index, input)) = remaining.pop() else { break };
            let context = context.clone();
            let transport = transport.clone();
            in_flight.spawn(async move {
                let result = validate_all_signatures(
                    &input.pdf,
                    &context.trust_anchors,
                    &context.tsa_trust_anchors,
                    &context.options,
                    transport.as_deref(),
                    context.lpa.as_deref(),
                    context.at_time,
                )
                .await;
                (index, input.label, result)
            });
        }

        let Some(joined) = in_flight.join_next().await else { break };
        match joined {
            Ok((index, label, result)) => results[index] = Some(BatchValidationOutput { label, result }),
            Err(join_err) => {
                // A task panicked; surface it as a per-document failure rather
                // than losing the whole batch.
                let index = results.iter().position(Option::is_none).unwrap_or(0);
                results[index] = Some(BatchValidationOutput {
                    label: String::new(),
                    result: Err(crate::error::PdfSignError::concurrency(format!(
                        "batch validation task failed: {join_err}"
                    ))),
                });
            }
        }
    }

    results.into_iter().flatten().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_concurrency_is_nonzero() {
        assert!(DEFAULT_MAX_CONCURRENT > 0);
    }
}
