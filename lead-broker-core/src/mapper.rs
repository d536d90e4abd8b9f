use std::collections::HashMap;

use serde_json::{Map, Value};

const CANONICAL_FIELDS: &[&str] = &["name", "email", "phone", "city", "state", "zipcode", "country", "industry"];

fn default_synonyms() -> HashMap<&'static str, Vec<&'static str>> {
    let mut m = HashMap::new();
    m.insert("name", vec!["name", "full_name", "contact_name"]);
    m.insert("email", vec!["email", "email_address", "contact_email"]);
    m.insert("phone", vec!["phone", "phone_number", "contact_phone", "mobile"]);
    m.insert("city", vec!["city", "contact_city"]);
    m.insert("state", vec!["state", "contact_state", "region"]);
    m.insert("zipcode", vec!["zipcode", "zip", "postal_code", "contact_zip"]);
    m.insert("country", vec!["country", "contact_country"]);
    m.insert("industry", vec!["industry", "vertical", "category"]);
    m
}

/// An immutable value built once per portal from the default synonym
/// table merged with the portal's override. Routing a payload through
/// it is a pure function: `(canonical, extras)`.
#[derive(Debug, Clone)]
pub struct Mapper {
    synonyms: HashMap<String, Vec<String>>,
}

impl Mapper {
    pub fn new(override_map: Option<&HashMap<String, Vec<String>>>) -> Self {
        let mut synonyms: HashMap<String, Vec<String>> = default_synonyms()
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.into_iter().map(String::from).collect()))
            .collect();

        if let Some(overrides) = override_map {
            for field in CANONICAL_FIELDS {
                if let Some(synonym_list) = overrides.get(*field) {
                    if synonym_list.is_empty() {
                        // An empty override synonym list falls through to the default.
                        continue;
                    }
                    let mut merged = synonym_list.clone();
                    if let Some(defaults) = synonyms.get(*field) {
                        for syn in defaults {
                            if !merged.contains(syn) {
                                merged.push(syn.clone());
                            }
                        }
                    }
                    synonyms.insert(field.to_string(), merged);
                }
            }
        }

        Self { synonyms }
    }

    fn first_present<'a>(&self, payload: &'a Map<String, Value>, field: &str) -> Option<&'a Value> {
        self.synonyms
            .get(field)
            .into_iter()
            .flatten()
            .find_map(|syn| payload.get(syn).filter(|v| !is_blank(v)))
    }

    /// Maps a raw webhook payload into canonical fields plus an `extras`
    /// bag of every key the mapping did not consume.
    pub fn map(&self, payload: &Value) -> MappedPayload {
        let obj = match payload.as_object() {
            Some(obj) => obj,
            None => return MappedPayload::default(),
        };

        let mut consumed: Vec<&str> = Vec::new();
        let mut fields: HashMap<&'static str, String> = HashMap::new();

        for field in CANONICAL_FIELDS {
            if let Some(value) = self.first_present(obj, field) {
                fields.insert(field, value_to_string(value));
                if let Some(syn) = self.synonyms.get(*field).into_iter().flatten().find(|syn| {
                    obj.get(syn.as_str()).map(|v| !is_blank(v)).unwrap_or(false)
                }) {
                    consumed.push(syn.as_str());
                }
            }
        }

        if !fields.contains_key("name") {
            let first = obj.get("first_name").filter(|v| !is_blank(v));
            let last = obj.get("last_name").filter(|v| !is_blank(v));
            if first.is_some() || last.is_some() {
                let combined = format!(
                    "{} {}",
                    first.map(value_to_string).unwrap_or_default(),
                    last.map(value_to_string).unwrap_or_default()
                );
                fields.insert("name", combined.trim().to_string());
                if first.is_some() {
                    consumed.push("first_name");
                }
                if last.is_some() {
                    consumed.push("last_name");
                }
            }
        }

        let mut extras = Map::new();
        for (key, value) in obj {
            if !consumed.contains(&key.as_str()) {
                extras.insert(key.clone(), value.clone());
            }
        }

        MappedPayload {
            name: fields.get("name").cloned(),
            email: fields.get("email").map(|v| normalize_email(v)),
            phone: fields.get("phone").map(|v| normalize_phone(v)),
            city: fields.get("city").cloned(),
            state: fields.get("state").map(|v| normalize_state(v)),
            zipcode: fields.get("zipcode").map(|v| normalize_zipcode(v)),
            country: fields.get("country").cloned(),
            industry: fields.get("industry").cloned(),
            extras: Value::Object(extras),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct MappedPayload {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub zipcode: Option<String>,
    pub country: Option<String>,
    pub industry: Option<String>,
    pub extras: Value,
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        _ => false,
    }
}

fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string().trim_matches('"').to_string(),
    }
}

fn normalize_email(raw: &str) -> String {
    raw.trim().to_lowercase()
}

fn normalize_phone(raw: &str) -> String {
    let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
    digits.chars().take(20).collect()
}

fn normalize_state(raw: &str) -> String {
    raw.trim().to_uppercase().chars().take(2).collect()
}

fn normalize_zipcode(raw: &str) -> String {
    raw.trim().chars().take(10).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn maps_default_synonyms_and_normalizes() {
        let mapper = Mapper::new(None);
        let mapped = mapper.map(&json!({
            "name": "Jane",
            "email": "JANE@X.io",
            "phone": "(555) 111-2222",
            "zipcode": "10001-0042",
        }));
        assert_eq!(mapped.name.as_deref(), Some("Jane"));
        assert_eq!(mapped.email.as_deref(), Some("jane@x.io"));
        assert_eq!(mapped.phone.as_deref(), Some("5551112222"));
        assert_eq!(mapped.zipcode.as_deref(), Some("10001-0042"));
    }

    #[test]
    fn falls_back_to_first_last_name() {
        let mapper = Mapper::new(None);
        let mapped = mapper.map(&json!({"first_name": "Jane", "last_name": "Doe", "email": "a@b.com"}));
        assert_eq!(mapped.name.as_deref(), Some("Jane Doe"));
    }

    #[test]
    fn preserves_unmapped_keys_as_extras() {
        let mapper = Mapper::new(None);
        let mapped = mapper.map(&json!({"name": "Jane", "favorite_color": "blue"}));
        assert_eq!(mapped.extras.get("favorite_color").and_then(|v| v.as_str()), Some("blue"));
        assert!(mapped.extras.get("name").is_none());
    }

    #[test]
    fn empty_override_synonym_list_falls_through_to_defaults() {
        let mut overrides = HashMap::new();
        overrides.insert("email".to_string(), vec![]);
        let mapper = Mapper::new(Some(&overrides));
        let mapped = mapper.map(&json!({"email": "a@b.com"}));
        assert_eq!(mapped.email.as_deref(), Some("a@b.com"));
    }

    #[test]
    fn single_custom_synonym_wins_over_default() {
        let mut overrides = HashMap::new();
        overrides.insert("email".to_string(), vec!["custom_email_field".to_string()]);
        let mapper = Mapper::new(Some(&overrides));
        let mapped = mapper.map(&json!({"email": "default@b.com", "custom_email_field": "custom@b.com"}));
        assert_eq!(mapped.email.as_deref(), Some("custom@b.com"));
    }
}
