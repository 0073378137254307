//! AWS Signature Version 4 request signing
//!
//! Only what Route 53 needs: header-based signing of a single request with
//! long-term credentials. Query parameters must already be in canonical
//! form (see [`canonical_query`]).

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};

type HmacSha256 = Hmac<Sha256>;

/// Credentials and scope used to sign requests
pub(crate) struct SigningKey<'a> {
    pub access_key_id: &'a str,
    pub secret_access_key: &'a str,
    pub region: &'a str,
    pub service: &'a str,
}

/// Headers to attach to a signed request
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SignedRequest {
    pub authorization: String,
    pub amz_date: String,
}

/// Sign a request
///
/// `headers` must hold lower-case names and must include `host`. The
/// `x-amz-date` header is added here.
pub(crate) fn sign_request(
    key: &SigningKey<'_>,
    method: &str,
    path: &str,
    query: &str,
    headers: &[(&str, &str)],
    payload: &[u8],
    now: DateTime<Utc>,
) -> SignedRequest {
    let date_stamp = now.format("%Y%m%d").to_string();
    let amz_date = now.format("%Y%m%dT%H%M%SZ").to_string();
    let payload_hash = hex::encode(Sha256::digest(payload));

    let mut all_headers: Vec<(&str, &str)> = headers.to_vec();
    all_headers.push(("x-amz-date", &amz_date));
    all_headers.sort_by(|a, b| a.0.cmp(b.0));

    let signed_headers = all_headers
        .iter()
        .map(|(name, _)| *name)
        .collect::<Vec<_>>()
        .join(";");
    let canonical_headers: String = all_headers
        .iter()
        .map(|(name, value)| format!("{}:{}\n", name, value.trim()))
        .collect();

    let canonical_request = format!(
        "{}\n{}\n{}\n{}\n{}\n{}",
        method, path, query, canonical_headers, signed_headers, payload_hash
    );

    let credential_scope = format!(
        "{}/{}/{}/aws4_request",
        date_stamp, key.region, key.service
    );
    let string_to_sign = format!(
        "AWS4-HMAC-SHA256\n{}\n{}\n{}",
        amz_date,
        credential_scope,
        hex::encode(Sha256::digest(canonical_request.as_bytes()))
    );

    let signing_key = derive_signing_key(key, &date_stamp);
    let signature = hex::encode(hmac_sha256(&signing_key, &string_to_sign));

    SignedRequest {
        authorization: format!(
            "AWS4-HMAC-SHA256 Credential={}/{}, SignedHeaders={}, Signature={}",
            key.access_key_id, credential_scope, signed_headers, signature
        ),
        amz_date,
    }
}

/// Build a canonical query string: sorted by name, RFC 3986 encoded
pub(crate) fn canonical_query(params: &[(&str, &str)]) -> String {
    let mut encoded: Vec<(String, String)> = params
        .iter()
        .map(|(name, value)| {
            (
                urlencoding::encode(name).into_owned(),
                urlencoding::encode(value).into_owned(),
            )
        })
        .collect();
    encoded.sort();

    encoded
        .iter()
        .map(|(name, value)| format!("{}={}", name, value))
        .collect::<Vec<_>>()
        .join("&")
}

fn derive_signing_key(key: &SigningKey<'_>, date_stamp: &str) -> Vec<u8> {
    let k_date = hmac_sha256(
        format!("AWS4{}", key.secret_access_key).as_bytes(),
        date_stamp,
    );
    let k_region = hmac_sha256(&k_date, key.region);
    let k_service = hmac_sha256(&k_region, key.service);
    hmac_sha256(&k_service, "aws4_request")
}

fn hmac_sha256(key: &[u8], data: &str) -> Vec<u8> {
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC can take key of any size");
    mac.update(data.as_bytes());
    mac.finalize().into_bytes().to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const EXAMPLE_SECRET: &str = "wJalrXUtnFEMI/K7MDENG+bPxRfiCYEXAMPLEKEY";

    fn example_key() -> SigningKey<'static> {
        SigningKey {
            access_key_id: "AKIDEXAMPLE",
            secret_access_key: EXAMPLE_SECRET,
            region: "us-east-1",
            service: "iam",
        }
    }

    #[test]
    fn test_derived_signing_key_matches_reference() {
        let key = derive_signing_key(&example_key(), "20150830");

        assert_eq!(
            hex::encode(key),
            "c4afb1cc5771d871763a393e44b703571b55cc28424d1a5e86da6ed3c154a4b9"
        );
    }

    #[test]
    fn test_signature_matches_reference() {
        let now = Utc.with_ymd_and_hms(2015, 8, 30, 12, 36, 0).unwrap();

        let signed = sign_request(
            &example_key(),
            "GET",
            "/",
            "Action=ListUsers&Version=2010-05-08",
            &[
                (
                    "content-type",
                    "application/x-www-form-urlencoded; charset=utf-8",
                ),
                ("host", "iam.amazonaws.com"),
            ],
            b"",
            now,
        );

        assert_eq!(signed.amz_date, "20150830T123600Z");
        assert_eq!(
            signed.authorization,
            "AWS4-HMAC-SHA256 Credential=AKIDEXAMPLE/20150830/us-east-1/iam/aws4_request, \
             SignedHeaders=content-type;host;x-amz-date, \
             Signature=5d672d79c15b13162d9279b0855cfba6789a8edb4c82c400e06b5924a6f2b5d7"
        );
    }

    #[test]
    fn test_canonical_query_sorted_and_encoded() {
        let query = canonical_query(&[("type", "A"), ("name", "\\052.test.tld.")]);

        assert_eq!(query, "name=%5C052.test.tld.&type=A");
    }

    #[test]
    fn test_canonical_query_empty() {
        assert_eq!(canonical_query(&[]), "");
    }
}
