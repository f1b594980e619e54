//! Phone Numbers
//!
//! Normalises user-entered phone numbers and derives gateway chat ids.

/// Suffix the gateway uses for one-to-one chats
pub const USER_CHAT_SUFFIX: &str = "@c.us";

const MIN_DIGITS: usize = 10;
const MAX_DIGITS: usize = 15;

/// Normalise a phone number to `+<digits>`.
///
/// Everything except digits and `+` is stripped first. Accepts a leading `+`
/// followed by 10-15 digits, or 10-15 bare digits.
pub fn normalize_phone(phone: &str) -> Option<String> {
    let cleaned: String = phone
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '+')
        .collect();

    let digits = cleaned.strip_prefix('+').unwrap_or(&cleaned);
    let valid = (MIN_DIGITS..=MAX_DIGITS).contains(&digits.len())
        && digits.chars().all(|c| c.is_ascii_digit());

    valid.then(|| format!("+{}", digits))
}

/// Turn a recipient into a gateway chat id.
///
/// Ids that already carry a domain (`...@c.us`, `...@g.us`) pass through.
pub fn chat_id(recipient: &str) -> Option<String> {
    let recipient = recipient.trim();
    if recipient.contains('@') {
        return Some(recipient.to_string());
    }

    normalize_phone(recipient)
        .map(|phone| format!("{}{}", phone.trim_start_matches('+'), USER_CHAT_SUFFIX))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_phone() {
        assert_eq!(normalize_phone("+1234567890").as_deref(), Some("+1234567890"));
        assert_eq!(normalize_phone("1234567890").as_deref(), Some("+1234567890"));
        assert_eq!(
            normalize_phone("+49 (151) 234-56789").as_deref(),
            Some("+4915123456789")
        );
    }

    #[test]
    fn test_normalize_phone_rejects_invalid() {
        assert_eq!(normalize_phone("invalid"), None);
        assert_eq!(normalize_phone("12345"), None);
        assert_eq!(normalize_phone("+1234567890123456"), None);
        assert_eq!(normalize_phone("12+34567890"), None);
    }

    #[test]
    fn test_chat_id() {
        assert_eq!(chat_id("+1234567890").as_deref(), Some("1234567890@c.us"));
        assert_eq!(
            chat_id("120363025246125486@g.us").as_deref(),
            Some("120363025246125486@g.us")
        );
        assert_eq!(chat_id("invalid"), None);
    }
}
