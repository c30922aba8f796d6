use super::method::ValidatorKind;
use super::patterns::{
    EMAIL_EXACT_RE, NAME_BLACKLIST, NAME_MAX_WORDS, NAME_MAX_WORD_LEN, PHONE_MAX_DIGITS,
    PHONE_MIN_DIGITS, URL_SCHEME_RE,
};

/// Per field-type acceptance predicate
pub struct FieldValidator;

impl FieldValidator {
    pub fn validate(kind: ValidatorKind, value: &str) -> bool {
        let value = value.trim();
        if value.is_empty() {
            return false;
        }
        match kind {
            ValidatorKind::Email => is_valid_email(value),
            ValidatorKind::Phone => is_valid_phone(value),
            ValidatorKind::Name => is_valid_name(value),
            ValidatorKind::Url => is_valid_url(value),
            ValidatorKind::Text => true,
        }
    }
}

pub fn is_valid_email(value: &str) -> bool {
    EMAIL_EXACT_RE.is_match(value)
}

/// 7-15 digits once everything else is stripped
pub fn is_valid_phone(value: &str) -> bool {
    let digits = value.chars().filter(|c| c.is_ascii_digit()).count();
    (PHONE_MIN_DIGITS..=PHONE_MAX_DIGITS).contains(&digits)
}

pub fn is_valid_name(value: &str) -> bool {
    let words: Vec<&str> = value.split_whitespace().collect();
    if words.is_empty() || words.len() > NAME_MAX_WORDS {
        return false;
    }
    if !value.chars().any(char::is_alphabetic) || value.contains('@') {
        return false;
    }
    if words.iter().any(|w| w.chars().count() > NAME_MAX_WORD_LEN) {
        return false;
    }
    let lowered = words.join(" ").to_lowercase();
    !NAME_BLACKLIST.contains(&lowered.as_str())
}

/// Absolute URL with a scheme, or a root-relative path
pub fn is_valid_url(value: &str) -> bool {
    value.starts_with('/') || URL_SCHEME_RE.is_match(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_email() {
        assert!(FieldValidator::validate(ValidatorKind::Email, "jane@firm.com"));
        assert!(FieldValidator::validate(ValidatorKind::Email, "  jane@firm.com "));
        assert!(!FieldValidator::validate(ValidatorKind::Email, "abc"));
        assert!(!FieldValidator::validate(ValidatorKind::Email, "jane@firm"));
    }

    #[test]
    fn test_phone_digit_bounds() {
        assert!(is_valid_phone("(555) 123-4567"));
        assert!(is_valid_phone("123-4567"));
        assert!(!is_valid_phone("123-456"));
        assert!(!is_valid_phone("+1 (555) 123-4567 ext 12345"));
    }

    #[test]
    fn test_name_rules() {
        assert!(is_valid_name("Jane Doe"));
        assert!(is_valid_name("María José de la Cruz"));
        assert!(!is_valid_name("Contact Us"));
        assert!(!is_valid_name("view   profile"));
        assert!(!is_valid_name("jane@firm.com"));
        assert!(!is_valid_name("1234"));
        assert!(!is_valid_name("one two three four five six seven"));
        assert!(!is_valid_name("Averyveryveryverylongsinglewordname"));
    }

    #[test]
    fn test_url() {
        assert!(is_valid_url("https://example.com/people/jane"));
        assert!(is_valid_url("/people/jane"));
        assert!(!is_valid_url("people/jane"));
        assert!(!FieldValidator::validate(ValidatorKind::Url, "   "));
    }
}
