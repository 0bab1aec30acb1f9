//! Decoding of registration requests
//!
//! Registrants send either a JSON object or URL/form-encoded key-value pairs,
//! in the body or, for GET requests, in the query string.

use crate::ApiError;
use registry_core::Endpoint;
use serde::Deserialize;

/// Form keys accepted for the endpoint name, in order of preference
const NAME_KEYS: [&str; 3] = ["name", "backend", "hostname"];
const TAG_KEYS: [&str; 2] = ["tags", "tag"];

#[derive(Deserialize)]
struct JsonRegistration {
    #[serde(alias = "Name")]
    name: Option<String>,
    #[serde(alias = "Address")]
    address: Option<String>,
    #[serde(default, alias = "Tags")]
    tags: Option<Vec<String>>,
}

/// Decode a registration from a request's content type, query string and body.
///
/// A non-empty body is parsed as JSON when declared as such or when it looks
/// like a JSON object, otherwise as form fields. An empty body falls back to
/// the query string. Only presence is checked here; the registry validates
/// the values.
pub fn parse_registration(
    content_type: Option<&str>,
    query: Option<&str>,
    body: &[u8],
) -> Result<Endpoint, ApiError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return parse_form(query.unwrap_or_default().as_bytes());
    }

    let declared_json = content_type
        .map(|ct| ct.trim().to_ascii_lowercase().starts_with("application/json"))
        .unwrap_or(false);
    let looks_like_json = body
        .iter()
        .find(|b| !b.is_ascii_whitespace())
        .is_some_and(|b| *b == b'{');

    if declared_json || looks_like_json {
        parse_json(body)
    } else {
        parse_form(body)
    }
}

fn parse_json(body: &[u8]) -> Result<Endpoint, ApiError> {
    let request: JsonRegistration = serde_json::from_slice(body)?;
    Ok(Endpoint::new(
        request.name.ok_or(ApiError::MissingField("name"))?,
        request.address.ok_or(ApiError::MissingField("address"))?,
        request.tags.unwrap_or_default(),
    ))
}

fn parse_form(input: &[u8]) -> Result<Endpoint, ApiError> {
    let pairs: Vec<(String, String)> = url::form_urlencoded::parse(input)
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    let field = |keys: &[&str]| {
        keys.iter().find_map(|key| {
            pairs
                .iter()
                .find(|(k, v)| k.as_str() == *key && !v.is_empty())
                .map(|(_, v)| v.clone())
        })
    };

    let name = field(&NAME_KEYS[..]).ok_or(ApiError::MissingField("name"))?;
    let address = field(&["address"][..]).ok_or(ApiError::MissingField("address"))?;
    let tags = pairs
        .iter()
        .filter(|(k, _)| TAG_KEYS.contains(&k.as_str()))
        .flat_map(|(_, v)| v.split(','))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect();

    Ok(Endpoint::new(name, address, tags))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_payload() {
        let body = br#"{"name":"svc-a","address":"10.0.0.5:34521","tags":["web","db"]}"#;
        let endpoint = parse_registration(Some("application/json"), None, body).unwrap();
        assert_eq!(
            endpoint,
            Endpoint::new("svc-a", "10.0.0.5:34521", vec!["web".to_string(), "db".to_string()])
        );
    }

    #[test]
    fn test_capitalised_json_without_content_type() {
        let body = br#"{"Name":"svc-a","Address":"10.0.0.5:34521","Tags":null}"#;
        let endpoint = parse_registration(None, None, body).unwrap();
        assert_eq!(endpoint.name, "svc-a");
        assert!(endpoint.tags.is_empty());
    }

    #[test]
    fn test_form_body() {
        let body = b"backend=svc-a&address=10.0.0.5%3A34521&tags=web,db&tag=edge";
        let endpoint =
            parse_registration(Some("application/x-www-form-urlencoded"), None, body).unwrap();
        assert_eq!(endpoint.name, "svc-a");
        assert_eq!(endpoint.address, "10.0.0.5:34521");
        assert_eq!(endpoint.tags, vec!["web", "db", "edge"]);
    }

    #[test]
    fn test_query_string_when_body_empty() {
        let endpoint =
            parse_registration(None, Some("hostname=pod-1&address=10.0.0.5:34521"), b"").unwrap();
        assert_eq!(endpoint.name, "pod-1");
        assert_eq!(endpoint.address, "10.0.0.5:34521");
    }

    #[test]
    fn test_missing_fields() {
        assert!(matches!(
            parse_registration(None, Some("address=10.0.0.5:1"), b""),
            Err(ApiError::MissingField("name"))
        ));
        assert!(matches!(
            parse_registration(Some("application/json"), None, br#"{"name":"svc-a"}"#),
            Err(ApiError::MissingField("address"))
        ));
        assert!(matches!(
            parse_registration(None, None, b""),
            Err(ApiError::MissingField("name"))
        ));
    }

    #[test]
    fn test_malformed_json() {
        assert!(matches!(
            parse_registration(Some("application/json"), None, b"{\"name\": "),
            Err(ApiError::MalformedJson(_))
        ));
        assert!(matches!(
            parse_registration(None, None, br#"{"name": 5, "address": "a:1"}"#),
            Err(ApiError::MalformedJson(_))
        ));
    }
}
