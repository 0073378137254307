//! Hostname validation and normalization
//!
//! Route 53 reports record names fully qualified, lower-case, with a
//! trailing dot and with `*` and `@` written as octal escapes. Configured
//! hostnames are brought into the same form so they compare equal to what
//! the provider returns.

use crate::error::{Error, Result};

/// Maximum length of a domain name in presentation form (RFC 1035)
const MAX_NAME_LEN: usize = 253;

/// Maximum length of a single label (RFC 1035)
const MAX_LABEL_LEN: usize = 63;

/// Validate a hostname and convert it to the provider's canonical form
///
/// # Examples
///
/// ```
/// use r53ddns_core::hostname::validate_normalize_hostname;
///
/// assert_eq!(validate_normalize_hostname("TEST.tld").unwrap(), "test.tld.");
/// assert_eq!(validate_normalize_hostname("*.test.tld.").unwrap(), "\\052.test.tld.");
/// assert!(validate_normalize_hostname("NotA,ValidRecord").is_err());
/// ```
pub fn validate_normalize_hostname(hostname: &str) -> Result<String> {
    let trimmed = hostname.trim();
    if trimmed.is_empty() {
        return Err(Error::config("Hostname cannot be empty"));
    }

    let fqdn = trimmed.strip_suffix('.').unwrap_or(trimmed);
    if fqdn.len() > MAX_NAME_LEN {
        return Err(Error::config(format!(
            "Hostname too long: {} chars (max {}). Got: {}",
            fqdn.len(),
            MAX_NAME_LEN,
            hostname
        )));
    }

    let mut labels = Vec::new();
    for label in fqdn.split('.') {
        if label.is_empty() {
            return Err(Error::config(format!(
                "Hostname has empty label: '{}'",
                hostname
            )));
        }

        if label.len() > MAX_LABEL_LEN {
            return Err(Error::config(format!(
                "Hostname label too long: {} chars (max {}). Label: '{}'",
                label.len(),
                MAX_LABEL_LEN,
                label
            )));
        }

        let escaped = match label {
            "*" => "\\052".to_string(),
            "@" => "\\100".to_string(),
            _ => {
                if !label
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
                {
                    return Err(Error::config(format!(
                        "Hostname label contains invalid characters. Label: '{}'. \
                        Valid: letters, digits, '-', '_', or a lone '*' / '@'.",
                        label
                    )));
                }
                label.to_ascii_lowercase()
            }
        };
        labels.push(escaped);
    }

    Ok(format!("{}.", labels.join(".")))
}

/// Validate and normalize every hostname, dropping duplicates
pub fn validate_normalize_hostnames<I, S>(hostnames: I) -> Result<Vec<String>>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut normalized: Vec<String> = Vec::new();
    for hostname in hostnames {
        let name = validate_normalize_hostname(hostname.as_ref())?;
        if !normalized.contains(&name) {
            normalized.push(name);
        }
    }
    Ok(normalized)
}

/// Strip the trailing dot, as IAM condition keys expect
pub fn strip_trailing_dot(name: &str) -> &str {
    name.strip_suffix('.').unwrap_or(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalizes_to_provider_format() {
        assert_eq!(validate_normalize_hostname("TEST.tld").unwrap(), "test.tld.");
        assert_eq!(
            validate_normalize_hostname("*.test.tld.").unwrap(),
            "\\052.test.tld."
        );
        assert_eq!(
            validate_normalize_hostname("@.test.tld.").unwrap(),
            "\\100.test.tld."
        );
    }

    #[test]
    fn test_rejects_invalid_hostnames() {
        assert!(validate_normalize_hostname("NotA,ValidRecord").is_err());
        assert!(validate_normalize_hostname("").is_err());
        assert!(validate_normalize_hostname("double..dot.tld").is_err());
        assert!(validate_normalize_hostname(&format!("{}.tld", "a".repeat(64))).is_err());
        assert!(validate_normalize_hostname("sub*.test.tld").is_err());
    }

    #[test]
    fn test_error_is_config_error() {
        let err = validate_normalize_hostname("bad name.tld").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_dedups_normalized_names() {
        let names = validate_normalize_hostnames(["a.tld", "A.tld.", "b.tld"]).unwrap();
        assert_eq!(names, vec!["a.tld.".to_string(), "b.tld.".to_string()]);
    }

    #[test]
    fn test_strip_trailing_dot() {
        assert_eq!(strip_trailing_dot("sub1.test1.tld."), "sub1.test1.tld");
        assert_eq!(strip_trailing_dot("\\100.test2.tld."), "\\100.test2.tld");
        assert_eq!(strip_trailing_dot("plain"), "plain");
    }
}
