use once_cell::sync::Lazy;
use regex::Regex;

use crate::mapper::MappedPayload;

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("static regex is valid"));

/// Output of validation: normalized, ready-for-persistence fields plus a
/// derived territory key. Construction is the only way to get one of
/// these, so a `ValidLead` in hand has already passed every rule.
#[derive(Debug, Clone)]
pub struct ValidLead {
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub zipcode: Option<String>,
    pub territory_key: String,
}

/// Runs every rule, collecting violations instead of short-circuiting so
/// the caller can report all of them at once.
pub fn validate(payload: &MappedPayload) -> Result<ValidLead, Vec<String>> {
    let mut violations = Vec::new();

    let name = payload.name.as_deref().unwrap_or("").trim().to_string();
    if name.is_empty() {
        violations.push("name_required".to_string());
    }

    let email = payload.email.clone().filter(|v| !v.is_empty());
    let phone = payload.phone.clone().filter(|v| !v.is_empty());

    if email.is_none() && phone.is_none() {
        violations.push("email_or_phone_required".to_string());
    }

    if let Some(email) = email.as_ref() {
        if !EMAIL_RE.is_match(email) {
            violations.push("email_invalid".to_string());
        }
    }

    if let Some(phone) = phone.as_ref() {
        let digit_count = phone.chars().filter(|c| c.is_ascii_digit()).count();
        if digit_count < 7 {
            violations.push("phone_too_short".to_string());
        }
    }

    let zipcode = payload.zipcode.clone().filter(|v| !v.trim().is_empty());
    let city = payload.city.clone().filter(|v| !v.trim().is_empty());
    let territory_key = zipcode.clone().or_else(|| city.clone());
    if territory_key.is_none() {
        violations.push("territory_undeterminable".to_string());
    }

    if !violations.is_empty() {
        return Err(violations);
    }

    let state = payload.state.clone().filter(|v| !v.is_empty());
    let territory_key = match zipcode.clone() {
        Some(z) => z.chars().take(5).collect(),
        None => match (&city, &state) {
            (Some(c), Some(s)) => format!("{c}, {s}"),
            (Some(c), None) => c.clone(),
            _ => unreachable!("territory_undeterminable would have already failed"),
        },
    };

    Ok(ValidLead {
        name,
        email,
        phone,
        city,
        state,
        zipcode,
        territory_key,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapper::MappedPayload;

    fn payload(name: &str, email: Option<&str>, phone: Option<&str>, zipcode: Option<&str>, city: Option<&str>) -> MappedPayload {
        MappedPayload {
            name: Some(name.to_string()),
            email: email.map(String::from),
            phone: phone.map(String::from),
            city: city.map(String::from),
            state: None,
            zipcode: zipcode.map(String::from),
            country: None,
            industry: None,
            extras: serde_json::json!({}),
        }
    }

    #[test]
    fn happy_path_passes() {
        let p = payload("Jane", Some("jane@x.io"), Some("5551112222"), Some("10001"), None);
        let valid = validate(&p).expect("should validate");
        assert_eq!(valid.territory_key, "10001");
    }

    #[test]
    fn missing_name_fails() {
        let mut p = payload("Jane", Some("jane@x.io"), None, Some("10001"), None);
        p.name = Some("   ".to_string());
        let err = validate(&p).unwrap_err();
        assert!(err.contains(&"name_required".to_string()));
    }

    #[test]
    fn requires_email_or_phone() {
        let p = payload("Jane", None, None, Some("10001"), None);
        let err = validate(&p).unwrap_err();
        assert!(err.contains(&"email_or_phone_required".to_string()));
    }

    #[test]
    fn rejects_malformed_email() {
        let p = payload("Jane", Some("not-an-email"), None, Some("10001"), None);
        let err = validate(&p).unwrap_err();
        assert!(err.contains(&"email_invalid".to_string()));
    }

    #[test]
    fn rejects_short_phone() {
        let p = payload("Jane", None, Some("12345"), Some("10001"), None);
        let err = validate(&p).unwrap_err();
        assert!(err.contains(&"phone_too_short".to_string()));
    }

    #[test]
    fn zip_plus_four_truncates_to_five_digit_territory() {
        let p = payload("Jane", Some("jane@x.io"), None, Some("10001-0042"), None);
        let valid = validate(&p).expect("should validate");
        assert_eq!(valid.territory_key, "10001");
        assert_eq!(valid.zipcode.as_deref(), Some("10001-0042"));
    }

    #[test]
    fn city_alone_derives_territory() {
        let p = payload("Jane", Some("jane@x.io"), None, None, Some("Austin"));
        let valid = validate(&p).expect("should validate");
        assert_eq!(valid.territory_key, "Austin");
    }

    #[test]
    fn no_zip_or_city_fails() {
        let p = payload("Jane", Some("jane@x.io"), None, None, None);
        let err = validate(&p).unwrap_err();
        assert!(err.contains(&"territory_undeterminable".to_string()));
    }
}
