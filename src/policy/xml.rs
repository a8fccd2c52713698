//! Parses ITI's `LPAv2.xml` signature policy list.
//!
//! The schema (ETSI TS 119 612-flavoured) is a `signaturePolicyList` root
//! holding repeated `signaturePolicyInfo` elements, each with a `policyOid`,
//! `policyUri`, `signingPeriod` (`notBefore`/`notAfter`), an optional
//! `policyDigest` (`algorithm`/`value` in base64), and an `algorithms`
//! list of `algorithm`/`minKeyLength` pairs, plus a top-level `nextUpdate`.

use base64::Engine;
use chrono::{DateTime, Utc};
use roxmltree::{Document, Node};

use crate::error::{PdfSignError, Result};
use crate::types::HashAlgorithm;

use super::{AlgorithmConstraint, Lpa, PolicyDigest, PolicyInfo};

fn child_text<'a>(node: &Node<'a, 'a>, tag: &str) -> Option<String> {
    node.children()
        .find(|c| c.is_element() && c.tag_name().name() == tag)
        .and_then(|c| c.text())
        .map(|t| t.trim().to_string())
}

fn parse_time(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| PdfSignError::pdf_parse(format!("LPA XML: malformed timestamp '{s}': {e}")))
}

fn hash_algorithm_from_token(token: &str) -> Result<HashAlgorithm> {
    match token.to_ascii_lowercase().as_str() {
        "sha1" => Ok(HashAlgorithm::Sha1),
        "sha256" => Ok(HashAlgorithm::Sha256),
        "sha384" => Ok(HashAlgorithm::Sha384),
        "sha512" => Ok(HashAlgorithm::Sha512),
        other => Err(PdfSignError::unsupported_algorithm(format!("LPA digest algorithm token '{other}'"))),
    }
}

pub fn parse(xml: &str) -> Result<Lpa> {
    let doc = Document::parse(xml).map_err(|e| PdfSignError::pdf_parse(format!("malformed LPA XML: {e}")))?;
    let root = doc.root_element();

    let next_update = child_text(&root, "nextUpdate")
        .ok_or_else(|| PdfSignError::pdf_parse("LPA XML missing /nextUpdate"))
        .and_then(|s| parse_time(&s))?;

    let mut policy_infos = Vec::new();
    for entry in root.children().filter(|c| c.is_element() && c.tag_name().name() == "signaturePolicyInfo") {
        policy_infos.push(parse_policy_info(&entry)?);
    }

    Ok(Lpa { next_update, policy_infos })
}

fn parse_policy_info(entry: &Node) -> Result<PolicyInfo> {
    let policy_oid = child_text(entry, "policyOid")
        .ok_or_else(|| PdfSignError::pdf_parse("signaturePolicyInfo missing policyOid"))?;
    let uri = child_text(entry, "policyUri");

    let period_node = entry
        .children()
        .find(|c| c.is_element() && c.tag_name().name() == "signingPeriod")
        .ok_or_else(|| PdfSignError::pdf_parse(format!("policy {policy_oid} missing signingPeriod")))?;
    let not_before = child_text(&period_node, "notBefore")
        .ok_or_else(|| PdfSignError::pdf_parse(format!("policy {policy_oid} signingPeriod missing notBefore")))
        .and_then(|s| parse_time(&s))?;
    let not_after = child_text(&period_node, "notAfter")
        .ok_or_else(|| PdfSignError::pdf_parse(format!("policy {policy_oid} signingPeriod missing notAfter")))
        .and_then(|s| parse_time(&s))?;

    let digest = entry
        .children()
        .find(|c| c.is_element() && c.tag_name().name() == "policyDigest")
        .map(|d| parse_digest(&d))
        .transpose()?;

    let mut algorithm_constraints = Vec::new();
    if let Some(algs) = entry.children().find(|c| c.is_element() && c.tag_name().name() == "algorithms") {
        for alg in algs.children().filter(|c| c.is_element() && c.tag_name().name() == "algorithm") {
            let name = alg
                .attribute("name")
                .or_else(|| child_text(&alg, "name").as_deref())
                .ok_or_else(|| PdfSignError::pdf_parse(format!("policy {policy_oid} algorithm missing name")))?
                .to_string();
            let min_key_length = alg
                .attribute("minKeyLength")
                .map(str::to_string)
                .or_else(|| child_text(&alg, "minKeyLength"))
                .and_then(|s| s.parse::<u32>().ok())
                .unwrap_or(0);
            algorithm_constraints.push(AlgorithmConstraint { algorithm: name, min_key_length });
        }
    }

    Ok(PolicyInfo { policy_oid, uri, signing_period: (not_before, not_after), digest, algorithm_constraints })
}

fn parse_digest(node: &Node) -> Result<PolicyDigest> {
    let algorithm_token = child_text(node, "algorithm")
        .or_else(|| node.attribute("algorithm").map(str::to_string))
        .ok_or_else(|| PdfSignError::pdf_parse("policyDigest missing algorithm"))?;
    let algorithm = hash_algorithm_from_token(&algorithm_token)?;
    let value_b64 = child_text(node, "value")
        .or_else(|| node.text().map(str::to_string))
        .ok_or_else(|| PdfSignError::pdf_parse("policyDigest missing value"))?;
    let value = base64::engine::general_purpose::STANDARD
        .decode(value_b64.trim())
        .map_err(|e| PdfSignError::pdf_parse(format!("policyDigest value is not valid base64: {e}")))?;
    Ok(PolicyDigest { algorithm, value })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"<?xml version="1.0"?>
<signaturePolicyList>
  <nextUpdate>2030-01-01T00:00:00Z</nextUpdate>
  <signaturePolicyInfo>
    <policyOid>2.16.76.1.7.1.1.2.3</policyOid>
    <policyUri>http://iti.gov.br/AD-RB.der</policyUri>
    <signingPeriod>
      <notBefore>2020-01-01T00:00:00Z</notBefore>
      <notAfter>2030-01-01T00:00:00Z</notAfter>
    </signingPeriod>
    <policyDigest>
      <algorithm>sha256</algorithm>
      <value>q80=</value>
    </policyDigest>
    <algorithms>
      <algorithm name="rsa-sha256" minKeyLength="2048"/>
    </algorithms>
  </signaturePolicyInfo>
</signaturePolicyList>"#;

    #[test]
    fn parses_sample_lpa_xml() {
        let lpa = parse(SAMPLE).unwrap();
        assert_eq!(lpa.policy_infos.len(), 1);
        let info = &lpa.policy_infos[0];
        assert_eq!(info.policy_oid, "2.16.76.1.7.1.1.2.3");
        assert_eq!(info.algorithm_constraints[0].min_key_length, 2048);
        assert!(info.digest.is_some());
    }
}
