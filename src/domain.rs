use anyhow::{Result, anyhow};

/// Normalizes a domain for use as an ACME identifier: trims whitespace and a
/// trailing dot, converts IDNs to their ASCII form and lowercases.
pub fn normalize_domain(input: &str) -> Result<String> {
    let trimmed = input.trim().trim_end_matches('.');
    if trimmed.is_empty() {
        return Err(anyhow!("domain name is required"));
    }
    if trimmed.starts_with("*.") || trimmed.contains('*') {
        return Err(anyhow!(
            "wildcard domain {trimmed} cannot be validated with http-01"
        ));
    }
    if trimmed.contains(|c: char| c.is_whitespace() || c == '/' || c == ':') {
        return Err(anyhow!("invalid domain name: {trimmed}"));
    }
    let ascii =
        idna::domain_to_ascii(trimmed).map_err(|err| anyhow!("invalid domain name: {err}"))?;
    if ascii.is_empty() || ascii.split('.').any(str::is_empty) {
        return Err(anyhow!("invalid domain name: {trimmed}"));
    }
    Ok(ascii.to_lowercase())
}

/// Unicode form of a normalized domain, for log output.
pub fn domain_for_display(input: &str) -> String {
    let trimmed = input.trim().trim_end_matches('.');
    let (unicode, _) = idna::domain_to_unicode(trimmed);
    unicode.to_lowercase()
}
