use regex::Regex;
use serde_json::Value;

use super::DisplayFormat;
use crate::core::errors::EngineError;

/// Validated delivery parameters of one report. The raw persisted bag is
/// loosely typed; this is the shape the rest of the engine works with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportParameters {
    pub email_me: bool,
    pub evolution_graph: bool,
    pub additional_emails: Vec<String>,
    pub display_format: DisplayFormat,
}

impl Default for ReportParameters {
    fn default() -> Self {
        Self {
            email_me: true,
            evolution_graph: false,
            additional_emails: Vec::new(),
            display_format: DisplayFormat::DEFAULT,
        }
    }
}

pub const EMAIL_ME_PARAMETER: &str = "emailMe";
pub const EVOLUTION_GRAPH_PARAMETER: &str = "evolutionGraph";
pub const ADDITIONAL_EMAILS_PARAMETER: &str = "additionalEmails";
pub const DISPLAY_FORMAT_PARAMETER: &str = "displayFormat";

/// Validate a raw parameter bag, applying defaults for the optional keys.
/// Rejecting invalid input here keeps dispatch-time code free of parameter
/// errors: a stored bag has always passed this check.
pub fn validate_parameters(raw: &Value) -> Result<ReportParameters, EngineError> {
    let display_format = match raw.get(DISPLAY_FORMAT_PARAMETER) {
        None => DisplayFormat::DEFAULT,
        Some(value) => parse_display_format(value)?,
    };

    let email_me = match raw.get(EMAIL_ME_PARAMETER) {
        None => true,
        Some(value) => value_is_true(value),
    };

    let evolution_graph = match raw.get(EVOLUTION_GRAPH_PARAMETER) {
        None => false,
        Some(value) => value_is_true(value),
    };

    let additional_emails = match raw.get(ADDITIONAL_EMAILS_PARAMETER) {
        None => Vec::new(),
        Some(value) => check_additional_emails(value)?,
    };

    Ok(ReportParameters {
        email_me,
        evolution_graph,
        additional_emails,
        display_format,
    })
}

fn parse_display_format(value: &Value) -> Result<DisplayFormat, EngineError> {
    let code = match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse::<u64>().ok(),
        _ => None,
    };

    code.and_then(|c| u8::try_from(c).ok())
        .and_then(DisplayFormat::from_code)
        .ok_or_else(|| EngineError::InvalidDisplayFormat {
            value: display_format_value_label(value),
            available: DisplayFormat::all()
                .iter()
                .map(|f| f.code().to_string())
                .collect::<Vec<_>>()
                .join(", "),
        })
}

fn display_format_value_label(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Loose boolean coercion for values arriving from forms or JSON:
/// `true`, `1` and `"1"`/`"true"` all count as true.
fn value_is_true(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_i64() == Some(1),
        Value::String(s) => s == "true" || s == "1",
        _ => false,
    }
}

/// Trim entries, drop the empty ones, and fail the whole update on the
/// first syntactically invalid address, citing it.
fn check_additional_emails(value: &Value) -> Result<Vec<String>, EngineError> {
    let entries = match value {
        Value::Array(entries) => entries.clone(),
        Value::String(single) => vec![Value::String(single.clone())],
        _ => Vec::new(),
    };

    let mut emails = Vec::new();
    for entry in entries {
        let email = match entry {
            Value::String(s) => s.trim().to_string(),
            _ => String::new(),
        };
        if email.is_empty() {
            continue;
        }
        if !is_valid_email(&email) {
            return Err(EngineError::InvalidRecipientAddress(email));
        }
        emails.push(email);
    }
    Ok(emails)
}

pub fn is_valid_email(email: &str) -> bool {
    let re = Regex::new(r"^[a-zA-Z0-9.!#$%&'*+/=?^_`{|}~-]+@[a-zA-Z0-9-]+(\.[a-zA-Z0-9-]+)+$")
        .unwrap();
    re.is_match(email)
}
