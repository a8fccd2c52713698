//! ICP-Brasil signature policy engine (C11).
//!
//! A *Lista de Politicas de Assinatura* (LPA) is ITI's published catalog of
//! signature policy OIDs and the windows/digests/algorithm constraints each
//! one is valid under. Two on-the-wire forms exist: an XML artefact
//! (`LPAv2.xml`) and a DER-encoded one (`LPA_CAdES.der`); both parse into
//! the same [`Lpa`] so the evaluation functions below never need to know
//! which form the caller fetched.

pub mod der;
pub mod xml;

use chrono::{DateTime, Utc};

use crate::types::HashAlgorithm;

/// One algorithm the policy permits, with its minimum key length.
#[derive(Debug, Clone, PartialEq)]
pub struct AlgorithmConstraint {
    /// e.g. `"rsa-sha256"`, matched against the signature algorithm token
    /// the caller supplies (not an OID; LPA artefacts name algorithms by
    /// these short tokens rather than by OID).
    pub algorithm: String,
    pub min_key_length: u32,
}

#[derive(Debug, Clone)]
pub struct PolicyDigest {
    pub algorithm: HashAlgorithm,
    pub value: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct PolicyInfo {
    pub policy_oid: String,
    pub uri: Option<String>,
    pub signing_period: (DateTime<Utc>, DateTime<Utc>),
    pub digest: Option<PolicyDigest>,
    pub algorithm_constraints: Vec<AlgorithmConstraint>,
}

impl PolicyInfo {
    pub fn covers(&self, at_time: DateTime<Utc>) -> bool {
        let (not_before, not_after) = self.signing_period;
        at_time >= not_before && at_time <= not_after
    }
}

#[derive(Debug, Clone)]
pub struct Lpa {
    pub next_update: DateTime<Utc>,
    pub policy_infos: Vec<PolicyInfo>,
}

impl Lpa {
    pub fn find(&self, policy_oid: &str) -> Option<&PolicyInfo> {
        self.policy_infos.iter().find(|p| p.policy_oid == policy_oid)
    }

    /// True once the LPA's own refresh horizon has passed; callers should
    /// still use a stale LPA (with a warning) rather than fail outright,
    /// per spec.md Sec 4.7.
    pub fn is_outdated(&self, at_time: DateTime<Utc>) -> bool {
        self.next_update < at_time
    }
}

/// Severity of a policy evaluation issue, matching the report surface's
/// `issues[]` entries (spec.md Sec 6/7).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IssueSeverity {
    Warning,
    Error,
}

#[derive(Debug, Clone)]
pub struct PolicyIssue {
    pub code: &'static str,
    pub message: String,
    pub severity: IssueSeverity,
}

#[derive(Debug, Clone)]
pub struct PolicyEvaluation {
    pub valid: bool,
    pub oid: String,
    pub issues: Vec<PolicyIssue>,
}

impl PolicyEvaluation {
    fn ok(oid: &str) -> Self {
        Self { valid: true, oid: oid.to_string(), issues: Vec::new() }
    }

    fn fail(oid: &str, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            valid: false,
            oid: oid.to_string(),
            issues: vec![PolicyIssue { code, message: message.into(), severity: IssueSeverity::Error }],
        }
    }

    fn warn(mut self, code: &'static str, message: impl Into<String>) -> Self {
        self.issues.push(PolicyIssue { code, message: message.into(), severity: IssueSeverity::Warning });
        self
    }
}

/// `validatePolicy(oid, t)`: success iff `oid` is listed and `t` falls
/// within its declared signing period.
pub fn validate_policy(lpa: &Lpa, oid: &str, at_time: DateTime<Utc>) -> PolicyEvaluation {
    let mut eval = match lpa.find(oid) {
        None => return PolicyEvaluation::fail(oid, "policy_unknown", format!("policy {oid} is not present in the LPA")),
        Some(info) if !info.covers(at_time) => {
            return PolicyEvaluation::fail(
                oid,
                "policy_outside_signing_period",
                format!(
                    "signing time {at_time} is outside the policy's signing period {:?}",
                    info.signing_period
                ),
            )
        }
        Some(_) => PolicyEvaluation::ok(oid),
    };
    if lpa.is_outdated(at_time) {
        eval = eval.warn("lpa_outdated", "LPA is outdated");
    }
    eval
}

/// `validatePolicyWithDigest`: additionally requires the signature's
/// declared `signaturePolicyId` digest to match the LPA's declared digest
/// when `strict` is true. `digest` is the `(hashAlgorithm, hashValue)` the
/// signature itself carried in `sigPolicyHash`, if any; a signature that
/// omits `sigPolicyHash` passes `None` here, which is NOT the same as a
/// match — if the LPA declares a digest for this OID, an absent
/// `sigPolicyHash` is still a digest mismatch (spec.md Sec 8 scenario 4),
/// failing in strict mode and warning otherwise.
pub fn validate_policy_with_digest(
    lpa: &Lpa,
    oid: &str,
    at_time: DateTime<Utc>,
    digest: Option<(HashAlgorithm, &[u8])>,
    strict: bool,
) -> PolicyEvaluation {
    let base = validate_policy(lpa, oid, at_time);
    if !base.valid {
        return base;
    }
    let info = lpa.find(oid).expect("validate_policy already confirmed presence");
    match (&info.digest, digest) {
        (Some(expected), Some((algorithm, value))) if expected.algorithm == algorithm && expected.value == value => base,
        (Some(_), _) if strict => {
            PolicyEvaluation::fail(oid, "policy_digest_mismatch", "Policy digest does not match LPA")
        }
        (Some(_), _) => base.warn("policy_digest_mismatch", "Policy digest does not match LPA"),
        (None, Some(_)) if strict => {
            PolicyEvaluation::fail(oid, "policy_digest_missing", "LPA does not declare a policyDigest for this OID")
        }
        (None, Some(_)) => base.warn("policy_digest_missing", "LPA does not declare a policyDigest for this OID"),
        (None, None) => base,
    }
}

/// `validateAlgorithm`: the policy's algorithm whitelist, keyed by a short
/// token (e.g. `"rsa-sha256"`) rather than an OID, per the LPA artefact's
/// own convention.
pub fn validate_algorithm(lpa: &Lpa, oid: &str, algorithm_token: &str, key_length: u32) -> PolicyEvaluation {
    let Some(info) = lpa.find(oid) else {
        return PolicyEvaluation::fail(oid, "policy_unknown", format!("policy {oid} is not present in the LPA"));
    };
    if info.algorithm_constraints.is_empty() {
        return PolicyEvaluation::ok(oid);
    }
    match info.algorithm_constraints.iter().find(|c| c.algorithm == algorithm_token) {
        None => PolicyEvaluation::fail(
            oid,
            "policy_algorithm_not_allowed",
            format!("algorithm {algorithm_token} is not in the policy's whitelist"),
        ),
        Some(c) if key_length < c.min_key_length => PolicyEvaluation::fail(
            oid,
            "policy_key_too_short",
            format!("key length {key_length} is below the policy minimum {}", c.min_key_length),
        ),
        Some(_) => PolicyEvaluation::ok(oid),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample_lpa() -> Lpa {
        Lpa {
            next_update: Utc.with_ymd_and_hms(2030, 1, 1, 0, 0, 0).unwrap(),
            policy_infos: vec![PolicyInfo {
                policy_oid: "2.16.76.1.7.1.1.2.3".to_string(),
                uri: Some("http://iti.gov.br/AD-RB.der".to_string()),
                signing_period: (
                    Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap(),
                    Utc.with_ymd_and_hms(2030, 1, 1, 0, 0, 0).unwrap(),
                ),
                digest: Some(PolicyDigest { algorithm: HashAlgorithm::Sha256, value: vec![0xAB; 32] }),
                algorithm_constraints: vec![AlgorithmConstraint {
                    algorithm: "rsa-sha256".to_string(),
                    min_key_length: 2048,
                }],
            }],
        }
    }

    #[test]
    fn unknown_policy_fails() {
        let lpa = sample_lpa();
        let eval = validate_policy(&lpa, "9.9.9", Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap());
        assert!(!eval.valid);
        assert_eq!(eval.issues[0].code, "policy_unknown");
    }

    #[test]
    fn digest_mismatch_strict_fails_non_strict_warns() {
        let lpa = sample_lpa();
        let t = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let strict = validate_policy_with_digest(
            &lpa,
            "2.16.76.1.7.1.1.2.3",
            t,
            Some((HashAlgorithm::Sha256, &[0; 32])),
            true,
        );
        assert!(!strict.valid);
        assert_eq!(strict.issues[0].code, "policy_digest_mismatch");

        let lenient = validate_policy_with_digest(
            &lpa,
            "2.16.76.1.7.1.1.2.3",
            t,
            Some((HashAlgorithm::Sha256, &[0; 32])),
            false,
        );
        assert!(lenient.valid);
        assert_eq!(lenient.issues[0].severity, IssueSeverity::Warning);
    }

    #[test]
    fn missing_sig_policy_hash_against_lpa_declared_digest_is_a_mismatch() {
        // scenario 4: signature carries signaturePolicyId but no sigPolicyHash,
        // while the LPA declares a digest for the OID.
        let lpa = sample_lpa();
        let t = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let strict = validate_policy_with_digest(&lpa, "2.16.76.1.7.1.1.2.3", t, None, true);
        assert!(!strict.valid);
        assert_eq!(strict.issues[0].code, "policy_digest_mismatch");

        let lenient = validate_policy_with_digest(&lpa, "2.16.76.1.7.1.1.2.3", t, None, false);
        assert!(lenient.valid);
        assert_eq!(lenient.issues[0].severity, IssueSeverity::Warning);
    }

    #[test]
    fn algorithm_below_minimum_key_length_fails() {
        let lpa = sample_lpa();
        let eval = validate_algorithm(&lpa, "2.16.76.1.7.1.1.2.3", "rsa-sha256", 1024);
        assert!(!eval.valid);
        assert_eq!(eval.issues[0].code, "policy_key_too_short");
    }

    #[test]
    fn lpa_outdated_warns_but_does_not_fail() {
        let mut lpa = sample_lpa();
        lpa.next_update = Utc.with_ymd_and_hms(2021, 1, 1, 0, 0, 0).unwrap();
        let eval = validate_policy(&lpa, "2.16.76.1.7.1.1.2.3", Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap());
        assert!(eval.valid);
        assert_eq!(eval.issues[0].code, "lpa_outdated");
    }
}
