/// Normalises a local or international phone number to E.164, assuming
/// Ecuador (`593`) when no country code is present.
///
/// `0999123456`, `593999123456` and `+593 99 912 3456` all become
/// `+593999123456`.
pub fn to_e164(raw: &str) -> String {
    let digits: String = raw.chars().filter(char::is_ascii_digit).collect();
    if raw.trim_start().starts_with('+') {
        return format!("+{}", digits);
    }
    if digits.starts_with("593") {
        return format!("+{}", digits);
    }
    let local = digits.strip_prefix('0').unwrap_or(&digits);
    format!("+593{}", local)
}

pub fn whatsapp_address(raw: &str) -> String {
    format!("whatsapp:{}", to_e164(raw))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_number_gets_country_code() {
        assert_eq!(to_e164("0999123456"), "+593999123456");
    }

    #[test]
    fn bare_country_code_gets_plus() {
        assert_eq!(to_e164("593999123456"), "+593999123456");
    }

    #[test]
    fn international_number_is_kept() {
        assert_eq!(to_e164("+1 (415) 523-8886"), "+14155238886");
    }

    #[test]
    fn whatsapp_prefix() {
        assert_eq!(whatsapp_address("999123456"), "whatsapp:+593999123456");
    }
}
