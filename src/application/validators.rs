use validator::ValidateEmail;

/// Validates that the input looks like a valid email address
pub fn is_valid_email(email: &str) -> bool {
    let email = email.trim();
    !email.is_empty() && email.validate_email()
}

/// Validates an identifier assigned by the payment provider (price ids,
/// subscription ids, ...).
/// Rules:
/// - 1-255 characters
/// - Only ASCII letters, numbers, and underscores
pub fn is_valid_provider_id(id: &str) -> bool {
    !id.is_empty() && id.len() <= 255 && id.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_emails() {
        assert!(is_valid_email("test@example.com"));
        assert!(is_valid_email("user.name@domain.co.uk"));
        assert!(is_valid_email("user+tag@example.org"));
    }

    #[test]
    fn test_invalid_emails() {
        assert!(!is_valid_email(""));
        assert!(!is_valid_email("   "));
        assert!(!is_valid_email("notanemail"));
        assert!(!is_valid_email("@nodomain.com"));
        assert!(!is_valid_email("spaces in@email.com"));
    }

    #[test]
    fn test_valid_provider_ids() {
        assert!(is_valid_provider_id("price_1NqGx2LkdIwHu7ix"));
        assert!(is_valid_provider_id("sub_123"));
        assert!(is_valid_provider_id(&"a".repeat(255)));
    }

    #[test]
    fn test_invalid_provider_ids() {
        assert!(!is_valid_provider_id(""));
        assert!(!is_valid_provider_id(&"a".repeat(256)));
        assert!(!is_valid_provider_id("price 1"));
        assert!(!is_valid_provider_id("price/../1"));
        assert!(!is_valid_provider_id("price-1"));
    }
}
