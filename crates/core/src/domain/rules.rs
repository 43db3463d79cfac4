//! Field-level format checks shared by the application entities.

pub fn digits_only(value: &str) -> String {
    value.chars().filter(char::is_ascii_digit).collect()
}

/// Ten-digit NANP number; a leading country code `1` is dropped.
pub fn normalize_phone(raw: &str) -> Option<String> {
    let digits = digits_only(raw);
    let digits = match digits.len() {
        11 if digits.starts_with('1') => digits[1..].to_string(),
        _ => digits,
    };
    (digits.len() == 10).then_some(digits)
}

/// EIN/SSN are both nine digits once separators are removed.
pub fn normalize_tax_id(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    let valid_chars = trimmed.chars().all(|ch| ch.is_ascii_digit() || ch == '-' || ch == ' ');
    let digits = digits_only(trimmed);
    (valid_chars && digits.len() == 9).then_some(digits)
}

/// `NNNNN` or `NNNNN-NNNN`, reduced to the five-digit zip. Anything else is kept
/// verbatim so `is_valid_zip` rejects it.
pub fn normalize_zip(raw: &str) -> String {
    let trimmed = raw.trim();
    let five = match trimmed.split_once('-') {
        Some((zip, plus4)) if plus4.len() == 4 && plus4.chars().all(|ch| ch.is_ascii_digit()) => {
            zip
        }
        Some(_) => return trimmed.to_owned(),
        None => trimmed,
    };
    if is_valid_zip(five) {
        five.to_owned()
    } else {
        trimmed.to_owned()
    }
}

pub fn is_valid_zip(zip: &str) -> bool {
    zip.len() == 5 && zip.chars().all(|ch| ch.is_ascii_digit())
}

pub fn is_valid_email(email: &str) -> bool {
    let email = email.trim();
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && !email.chars().any(char::is_whitespace)
}

pub fn is_valid_website(website: &str) -> bool {
    let website = website.trim();
    let host = website
        .strip_prefix("https://")
        .or_else(|| website.strip_prefix("http://"))
        .unwrap_or(website);
    let host = host.split('/').next().unwrap_or_default();
    host.contains('.')
        && !host.starts_with('.')
        && !host.ends_with('.')
        && host.chars().all(|ch| ch.is_ascii_alphanumeric() || ch == '.' || ch == '-')
}

/// Slash-separated limit tiers such as `1000000/2000000/1000000`.
pub fn parse_limits(limits: &str) -> Option<Vec<u64>> {
    let parts = limits
        .split('/')
        .map(|part| part.trim().parse::<u64>().ok().filter(|value| *value > 0))
        .collect::<Option<Vec<_>>>()?;
    (parts.len() == 3).then_some(parts)
}
