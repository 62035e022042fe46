// File: src/submission.rs
// Purpose: Normalize heterogeneous submission inputs into a uniform
// method/url/body triple

use crate::error::SubmissionError;
use crate::path::{encode_search, parse_search, split_path};
use serde_json::Value;

/// HTTP-ish methods a form submission may use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FormMethod {
    #[default]
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl FormMethod {
    /// Parses a method string, case-insensitively.
    pub fn parse(method: &str) -> Result<Self, SubmissionError> {
        match method.to_ascii_lowercase().as_str() {
            "get" => Ok(FormMethod::Get),
            "post" => Ok(FormMethod::Post),
            "put" => Ok(FormMethod::Put),
            "patch" => Ok(FormMethod::Patch),
            "delete" => Ok(FormMethod::Delete),
            other => Err(SubmissionError::UnsupportedMethod(other.to_string())),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FormMethod::Get => "GET",
            FormMethod::Post => "POST",
            FormMethod::Put => "PUT",
            FormMethod::Patch => "PATCH",
            FormMethod::Delete => "DELETE",
        }
    }

    /// Whether this method carries a request body. `GET` never does; its
    /// fields are encoded into the URL's query string instead.
    pub fn has_body(&self) -> bool {
        !matches!(self, FormMethod::Get)
    }
}

impl std::fmt::Display for FormMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Body encodings for submissions that carry one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EncType {
    #[default]
    UrlEncoded,
    Multipart,
    Json,
}

impl EncType {
    pub fn parse(enc_type: &str) -> Result<Self, SubmissionError> {
        match enc_type.to_ascii_lowercase().as_str() {
            "application/x-www-form-urlencoded" => Ok(EncType::UrlEncoded),
            "multipart/form-data" => Ok(EncType::Multipart),
            "application/json" | "text/json" => Ok(EncType::Json),
            other => Err(SubmissionError::UnsupportedEncType(other.to_string())),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EncType::UrlEncoded => "application/x-www-form-urlencoded",
            EncType::Multipart => "multipart/form-data",
            EncType::Json => "application/json",
        }
    }
}

/// A submission body, kept structural so loaders/actions can introspect
/// fields without re-parsing an encoded byte stream.
#[derive(Debug, Clone, PartialEq)]
pub enum SubmissionBody {
    /// `application/x-www-form-urlencoded` field pairs.
    FormFields(Vec<(String, String)>),
    /// `multipart/form-data` parts, field name to text value.
    Multipart(Vec<(String, String)>),
    /// `application/json` payload.
    Json(Value),
}

impl SubmissionBody {
    /// First value for a named field, across all encodings.
    pub fn field(&self, name: &str) -> Option<String> {
        match self {
            SubmissionBody::FormFields(pairs) | SubmissionBody::Multipart(pairs) => pairs
                .iter()
                .find(|(key, _)| key == name)
                .map(|(_, value)| value.clone()),
            SubmissionBody::Json(value) => value.get(name).map(|v| match v {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            }),
        }
    }

    /// All field pairs, flattening a JSON object into string pairs.
    pub fn fields(&self) -> Vec<(String, String)> {
        match self {
            SubmissionBody::FormFields(pairs) | SubmissionBody::Multipart(pairs) => pairs.clone(),
            SubmissionBody::Json(Value::Object(map)) => map
                .iter()
                .map(|(key, value)| {
                    let rendered = match value {
                        Value::String(s) => s.clone(),
                        other => other.to_string(),
                    };
                    (key.clone(), rendered)
                })
                .collect(),
            SubmissionBody::Json(_) => Vec::new(),
        }
    }
}

/// A point-in-time snapshot of a form-like element.
///
/// The rendering layer is expected to read its `<form>` (action, method,
/// enctype, serialized fields, and the submitter button's name/value pair)
/// into this struct before calling into the router.
#[derive(Debug, Clone, Default)]
pub struct FormSnapshot {
    pub action: Option<String>,
    pub method: Option<String>,
    pub enc_type: Option<String>,
    pub fields: Vec<(String, String)>,
    pub submitter: Option<(String, String)>,
}

impl FormSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_action(mut self, action: impl Into<String>) -> Self {
        self.action = Some(action.into());
        self
    }

    pub fn with_method(mut self, method: impl Into<String>) -> Self {
        self.method = Some(method.into());
        self
    }

    pub fn with_enc_type(mut self, enc_type: impl Into<String>) -> Self {
        self.enc_type = Some(enc_type.into());
        self
    }

    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.push((name.into(), value.into()));
        self
    }

    /// Records the button that triggered the submission; its name/value pair
    /// is appended to the serialized fields.
    pub fn with_submitter(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.submitter = Some((name.into(), value.into()));
        self
    }
}

/// The heterogeneous inputs a submission can start from.
#[derive(Debug, Clone)]
pub enum SubmitTarget {
    /// A form-like element snapshot.
    Form(FormSnapshot),
    /// Raw structured field pairs.
    Fields(Vec<(String, String)>),
    /// A JSON payload.
    Json(Value),
    /// An already URL-encoded payload (`a=1&b=2`).
    UrlEncoded(String),
    /// No payload at all.
    Empty,
}

/// Caller-supplied overrides for a submission.
#[derive(Debug, Clone, Default)]
pub struct SubmitOptions {
    pub method: Option<String>,
    pub action: Option<String>,
    pub enc_type: Option<String>,
    pub replace: bool,
}

impl SubmitOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_method(mut self, method: impl Into<String>) -> Self {
        self.method = Some(method.into());
        self
    }

    pub fn with_action(mut self, action: impl Into<String>) -> Self {
        self.action = Some(action.into());
        self
    }

    pub fn with_enc_type(mut self, enc_type: impl Into<String>) -> Self {
        self.enc_type = Some(enc_type.into());
        self
    }

    pub fn with_replace(mut self) -> Self {
        self.replace = true;
        self
    }
}

/// The uniform output of submission encoding.
#[derive(Debug, Clone, PartialEq)]
pub struct Submission {
    pub method: FormMethod,
    /// Target URL: pathname plus (for `GET`) the encoded field query string.
    pub url: String,
    pub enc_type: EncType,
    /// `None` for `GET`; populated per `enc_type` otherwise.
    pub body: Option<SubmissionBody>,
}

/// Normalizes a submission input into a uniform method/url/body triple.
///
/// Precedence for each attribute: explicit option, then the form snapshot's
/// own attribute, then the default. The default method is `GET` for form
/// targets (loader-only navigation) and `POST` for raw-data targets, which
/// are always explicit submissions. `GET` encodes fields into the URL's
/// query string (replacing any existing one) and never carries a body.
pub fn encode_submission(
    target: &SubmitTarget,
    default_action: &str,
    options: &SubmitOptions,
) -> Result<Submission, SubmissionError> {
    let mut form_action = None;
    let mut form_method = None;
    let mut form_enc_type = None;
    let mut json_payload = None;

    let mut fields: Vec<(String, String)> = match target {
        SubmitTarget::Form(snapshot) => {
            form_action = snapshot.action.clone();
            form_method = snapshot.method.clone();
            form_enc_type = snapshot.enc_type.clone();
            let mut fields = snapshot.fields.clone();
            if let Some((name, value)) = &snapshot.submitter {
                if !name.is_empty() {
                    fields.push((name.clone(), value.clone()));
                }
            }
            fields
        }
        SubmitTarget::Fields(pairs) => pairs.clone(),
        SubmitTarget::Json(value) => {
            json_payload = Some(value.clone());
            match value {
                Value::Object(map) => map
                    .iter()
                    .map(|(key, v)| {
                        let rendered = match v {
                            Value::String(s) => s.clone(),
                            other => other.to_string(),
                        };
                        (key.clone(), rendered)
                    })
                    .collect(),
                _ => Vec::new(),
            }
        }
        SubmitTarget::UrlEncoded(raw) => parse_search(raw),
        SubmitTarget::Empty => Vec::new(),
    };

    let default_method = match target {
        SubmitTarget::Form(_) | SubmitTarget::Empty => "get",
        _ => "post",
    };
    let method = FormMethod::parse(
        options
            .method
            .as_deref()
            .or(form_method.as_deref())
            .unwrap_or(default_method),
    )?;

    let default_enc = if matches!(target, SubmitTarget::Json(_)) {
        EncType::Json
    } else {
        EncType::UrlEncoded
    };
    let enc_type = match options.enc_type.as_deref().or(form_enc_type.as_deref()) {
        Some(raw) => EncType::parse(raw)?,
        None => default_enc,
    };

    let action = options
        .action
        .clone()
        .or(form_action)
        .unwrap_or_else(|| default_action.to_string());

    if method == FormMethod::Get {
        // Fields replace the action's existing query string.
        let parts = split_path(&action);
        let url = if fields.is_empty() {
            parts.to_path()
        } else {
            format!("{}?{}", parts.pathname, encode_search(&fields))
        };
        return Ok(Submission {
            method,
            url,
            enc_type,
            body: None,
        });
    }

    let body = match enc_type {
        EncType::UrlEncoded => SubmissionBody::FormFields(std::mem::take(&mut fields)),
        EncType::Multipart => SubmissionBody::Multipart(std::mem::take(&mut fields)),
        EncType::Json => {
            let payload = json_payload.unwrap_or_else(|| {
                Value::Object(
                    fields
                        .drain(..)
                        .map(|(key, value)| (key, Value::String(value)))
                        .collect(),
                )
            });
            SubmissionBody::Json(payload)
        }
    };

    Ok(Submission {
        method,
        url: split_path(&action).to_path(),
        enc_type,
        body: Some(body),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[rstest]
    #[case("get", FormMethod::Get)]
    #[case("GET", FormMethod::Get)]
    #[case("Post", FormMethod::Post)]
    #[case("DELETE", FormMethod::Delete)]
    fn test_method_parse_case_insensitive(#[case] raw: &str, #[case] expected: FormMethod) {
        assert_eq!(FormMethod::parse(raw).unwrap(), expected);
    }

    #[test]
    fn test_method_parse_rejects_unknown() {
        assert_eq!(
            FormMethod::parse("trace"),
            Err(SubmissionError::UnsupportedMethod("trace".to_string()))
        );
    }

    #[test]
    fn test_get_form_encodes_into_query_string() {
        let form = FormSnapshot::new().with_field("q", "vivian chou");
        let submission =
            encode_submission(&SubmitTarget::Form(form), "/contacts", &SubmitOptions::new())
                .unwrap();

        assert_eq!(submission.method, FormMethod::Get);
        assert_eq!(submission.url, "/contacts?q=vivian%20chou");
        assert_eq!(submission.body, None);
    }

    #[test]
    fn test_get_replaces_existing_query_string() {
        let form = FormSnapshot::new().with_field("q", "new");
        let submission = encode_submission(
            &SubmitTarget::Form(form),
            "/contacts?q=old&page=3",
            &SubmitOptions::new(),
        )
        .unwrap();

        assert_eq!(submission.url, "/contacts?q=new");
    }

    #[test]
    fn test_form_defaults_to_get_raw_data_defaults_to_post() {
        let form = encode_submission(
            &SubmitTarget::Form(FormSnapshot::new()),
            "/",
            &SubmitOptions::new(),
        )
        .unwrap();
        assert_eq!(form.method, FormMethod::Get);

        let raw = encode_submission(
            &SubmitTarget::Fields(vec![("name".into(), "x".into())]),
            "/",
            &SubmitOptions::new(),
        )
        .unwrap();
        assert_eq!(raw.method, FormMethod::Post);
    }

    #[test]
    fn test_post_form_body_is_form_encoded() {
        let form = FormSnapshot::new()
            .with_method("post")
            .with_field("first", "Vivian")
            .with_field("last", "Chou");
        let submission =
            encode_submission(&SubmitTarget::Form(form), "/contacts", &SubmitOptions::new())
                .unwrap();

        assert_eq!(submission.method, FormMethod::Post);
        assert_eq!(submission.url, "/contacts");
        assert_eq!(submission.enc_type, EncType::UrlEncoded);
        let body = submission.body.unwrap();
        assert_eq!(body.field("first"), Some("Vivian".to_string()));
        assert_eq!(body.field("last"), Some("Chou".to_string()));
    }

    #[test]
    fn test_submitter_pair_is_appended() {
        let form = FormSnapshot::new()
            .with_method("post")
            .with_field("name", "x")
            .with_submitter("taskId", "42");
        let submission =
            encode_submission(&SubmitTarget::Form(form), "/", &SubmitOptions::new()).unwrap();

        assert_eq!(
            submission.body.unwrap().field("taskId"),
            Some("42".to_string())
        );
    }

    #[test]
    fn test_options_override_form_attributes() {
        let form = FormSnapshot::new()
            .with_method("post")
            .with_action("/from-form");
        let submission = encode_submission(
            &SubmitTarget::Form(form),
            "/default",
            &SubmitOptions::new()
                .with_method("put")
                .with_action("/from-options"),
        )
        .unwrap();

        assert_eq!(submission.method, FormMethod::Put);
        assert_eq!(submission.url, "/from-options");
    }

    #[test]
    fn test_json_target_defaults_to_json_body() {
        let payload = serde_json::json!({"name": "Priya", "favorite": true});
        let submission = encode_submission(
            &SubmitTarget::Json(payload.clone()),
            "/contacts",
            &SubmitOptions::new(),
        )
        .unwrap();

        assert_eq!(submission.enc_type, EncType::Json);
        assert_eq!(submission.body, Some(SubmissionBody::Json(payload)));
    }

    #[test]
    fn test_fields_with_json_enc_type_become_object() {
        let submission = encode_submission(
            &SubmitTarget::Fields(vec![("name".into(), "Sam".into())]),
            "/contacts",
            &SubmitOptions::new().with_enc_type("application/json"),
        )
        .unwrap();

        match submission.body {
            Some(SubmissionBody::Json(Value::Object(map))) => {
                assert_eq!(map["name"], Value::String("Sam".into()));
            }
            other => panic!("unexpected body: {other:?}"),
        }
    }

    #[test]
    fn test_multipart_enc_type() {
        let submission = encode_submission(
            &SubmitTarget::Fields(vec![("avatar".into(), "blob".into())]),
            "/upload",
            &SubmitOptions::new().with_enc_type("multipart/form-data"),
        )
        .unwrap();

        assert_eq!(submission.enc_type, EncType::Multipart);
        assert!(matches!(
            submission.body,
            Some(SubmissionBody::Multipart(_))
        ));
    }

    #[test]
    fn test_url_encoded_target_round_trips() {
        let submission = encode_submission(
            &SubmitTarget::UrlEncoded("a=1&b=two%20words".to_string()),
            "/x",
            &SubmitOptions::new().with_method("post"),
        )
        .unwrap();

        let body = submission.body.unwrap();
        assert_eq!(body.field("a"), Some("1".to_string()));
        assert_eq!(body.field("b"), Some("two words".to_string()));
    }
}
