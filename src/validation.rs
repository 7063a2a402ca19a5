//! Recipient and body validation before anything reaches the modem

/// Validation errors with helpful messages
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Phone number is empty")]
    EmptyPhone,

    #[error("Phone number is too long (maximum {max} digits)")]
    PhoneTooLong { max: usize },

    #[error("Phone number contains invalid characters: {chars}")]
    InvalidPhoneCharacters { chars: String },

    #[error("Message body exceeds {max} bytes")]
    BodyTooLong { max: usize },
}

/// Longest international number under E.164 is 15 digits.
const MAX_PHONE_DIGITS: usize = 15;

/// Hard cap on outbound body size. Concatenated SMS tops out well below
/// this; anything larger is a corrupt or hostile queue record.
pub const MAX_BODY_BYTES: usize = 1024;

/// Validate a recipient phone number and return it in dialable form.
///
/// Accepts an optional leading `+`, digits, and common separator
/// characters (space, dash, dot, parentheses) which are stripped from
/// the returned value.
pub fn validate_phone(raw: &str) -> Result<String, ValidationError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::EmptyPhone);
    }

    let mut dialable = String::with_capacity(trimmed.len());
    let mut bad_chars = String::new();
    for (i, ch) in trimmed.chars().enumerate() {
        match ch {
            '+' if i == 0 => dialable.push('+'),
            '0'..='9' => dialable.push(ch),
            ' ' | '-' | '.' | '(' | ')' => {} // separator noise, drop it
            other => {
                if !bad_chars.contains(other) {
                    bad_chars.push(other);
                }
            }
        }
    }
    if !bad_chars.is_empty() {
        return Err(ValidationError::InvalidPhoneCharacters { chars: bad_chars });
    }

    let digits = dialable.trim_start_matches('+').len();
    if digits == 0 {
        return Err(ValidationError::EmptyPhone);
    }
    if digits > MAX_PHONE_DIGITS {
        return Err(ValidationError::PhoneTooLong {
            max: MAX_PHONE_DIGITS,
        });
    }

    Ok(dialable)
}

/// Validate a message body against the size cap. Empty bodies pass here;
/// the transport reports them as a null payload instead of sending.
pub fn validate_body(body: &str) -> Result<(), ValidationError> {
    if body.len() > MAX_BODY_BYTES {
        return Err(ValidationError::BodyTooLong {
            max: MAX_BODY_BYTES,
        });
    }
    Ok(())
}
