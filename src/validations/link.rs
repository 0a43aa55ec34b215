use url::Url;
use validator::ValidationError;

pub const ALIAS_MIN_LEN: usize = 3;
pub const ALIAS_MAX_LEN: usize = 32;

/// First path segments owned by other routes; a link under one could never
/// be reached.
pub const RESERVED_ALIASES: &[&str] = &["health", "api"];

/// Validates that a URL string is properly formatted and uses http/https
pub fn validate_url(url_str: &str) -> Result<(), ValidationError> {
    let url = Url::parse(url_str).map_err(|_| {
        let mut err = ValidationError::new("invalid_url");
        err.message = Some("Invalid URL format".into());
        err
    })?;

    // Only accept HTTP and HTTPS URLs
    if url.scheme() != "http" && url.scheme() != "https" {
        let mut err = ValidationError::new("invalid_scheme");
        err.message = Some("URL scheme must be http or https".into());
        return Err(err);
    }

    if url.host().is_none() {
        let mut err = ValidationError::new("missing_host");
        err.message = Some("URL must have a host".into());
        return Err(err);
    }

    Ok(())
}

/// Validates that a custom alias:
/// - is between 3 and 32 characters
/// - only contains ASCII letters, digits, hyphens and underscores
/// - is not a reserved route segment
pub fn validate_custom_alias(alias: &str) -> Result<(), ValidationError> {
    if alias.len() < ALIAS_MIN_LEN || alias.len() > ALIAS_MAX_LEN {
        let mut err = ValidationError::new("custom_alias_length");
        err.message = Some(
            format!(
                "Custom alias must be between {} and {} characters",
                ALIAS_MIN_LEN, ALIAS_MAX_LEN
            )
            .into(),
        );
        return Err(err);
    }

    if !alias
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        let mut err = ValidationError::new("custom_alias_charset");
        err.message = Some(
            "Custom alias can only contain letters, digits, hyphens, and underscores".into(),
        );
        return Err(err);
    }

    if RESERVED_ALIASES
        .iter()
        .any(|reserved| reserved.eq_ignore_ascii_case(alias))
    {
        let mut err = ValidationError::new("custom_alias_reserved");
        err.message = Some(format!("Custom alias '{}' is reserved", alias).into());
        return Err(err);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_url() {
        // Valid URLs
        assert!(validate_url("https://example.com").is_ok());
        assert!(validate_url("http://example.com/path?query=value").is_ok());

        // Invalid URLs
        assert!(validate_url("not-a-url").is_err());
        assert!(validate_url("://missing.scheme").is_err());
        assert!(validate_url("ftp://example.com").is_err());
        assert!(validate_url("file:///etc/passwd").is_err());
    }

    #[test]
    fn test_validate_custom_alias() {
        assert!(validate_custom_alias("valid-alias").is_ok());
        assert!(validate_custom_alias("brendan_123").is_ok());

        assert!(validate_custom_alias("ab").is_err());
        assert!(validate_custom_alias(&"x".repeat(33)).is_err());
        assert!(validate_custom_alias("bad space").is_err());
        assert!(validate_custom_alias("nope!").is_err());
        // Non-ASCII letters are not URL-safe
        assert!(validate_custom_alias("café").is_err());
    }

    #[test]
    fn route_segments_are_not_valid_aliases() {
        let err = validate_custom_alias("health").unwrap_err();
        assert_eq!(err.code, "custom_alias_reserved");
        assert!(validate_custom_alias("api").is_err());
        assert!(validate_custom_alias("Health").is_err());

        assert!(validate_custom_alias("healthy").is_ok());
        assert!(validate_custom_alias("api-docs").is_ok());
    }
}
