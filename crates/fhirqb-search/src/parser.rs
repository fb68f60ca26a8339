//! Request parameter extraction.
//!
//! `GET` searches read the query string, `POST` searches the form or JSON
//! body. Path parameters are merged last and win. A key repeated in the query
//! string keeps every value, which later compiles to an AND.

use fhirqb_core::{Result, ValidationError};
use indexmap::IndexMap;
use serde_json::Value;
use std::fmt;
use url::form_urlencoded;

/// One request parameter's value(s). `Many` values are ANDed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawValue {
    One(String),
    Many(Vec<String>),
}

impl RawValue {
    pub fn values(&self) -> &[String] {
        match self {
            Self::One(v) => std::slice::from_ref(v),
            Self::Many(vs) => vs,
        }
    }

    /// The value, or the first of several
    pub fn first(&self) -> Option<&str> {
        self.values().first().map(String::as_str)
    }

    fn push(self, value: String) -> Self {
        match self {
            Self::One(first) => Self::Many(vec![first, value]),
            Self::Many(mut vs) => {
                vs.push(value);
                Self::Many(vs)
            }
        }
    }
}

impl From<&str> for RawValue {
    fn from(value: &str) -> Self {
        Self::One(value.to_string())
    }
}

impl From<Vec<&str>> for RawValue {
    fn from(values: Vec<&str>) -> Self {
        Self::Many(values.into_iter().map(str::to_string).collect())
    }
}

/// Request parameters in request order.
pub type RawParameters = IndexMap<String, RawValue>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestMethod {
    Get,
    Post,
    Other(String),
}

impl RequestMethod {
    pub fn parse(s: &str) -> Self {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Self::Get,
            "POST" => Self::Post,
            _ => Self::Other(s.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Other(s) => s,
        }
    }
}

impl fmt::Display for RequestMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The parts of an HTTP search request the compiler reads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchRequest {
    pub method: RequestMethod,
    pub query: RawParameters,
    pub body: RawParameters,
    pub path: RawParameters,
}

impl SearchRequest {
    pub fn new(method: RequestMethod) -> Self {
        Self {
            method,
            query: RawParameters::new(),
            body: RawParameters::new(),
            path: RawParameters::new(),
        }
    }

    /// `GET [type]?<query>`
    pub fn get(query: &str) -> Self {
        let mut request = Self::new(RequestMethod::Get);
        request.query = parse_query(query);
        request
    }

    /// `POST [type]/_search` with a form-encoded body
    pub fn post_form(body: &str) -> Self {
        let mut request = Self::new(RequestMethod::Post);
        request.body = parse_query(body);
        request
    }

    /// `POST [type]/_search` with a JSON object body
    pub fn post_json(body: &Value) -> Result<Self> {
        let mut request = Self::new(RequestMethod::Post);
        request.body = parse_json_params(body)?;
        Ok(request)
    }

    #[must_use]
    pub fn with_path_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.path.insert(name.into(), RawValue::One(value.into()));
        self
    }

    /// Merge the parameters this method reads. Unsupported methods are fatal.
    pub fn parameters(&self) -> Result<RawParameters> {
        let mut params = match self.method {
            RequestMethod::Get => self.query.clone(),
            RequestMethod::Post => self.body.clone(),
            RequestMethod::Other(ref method) => {
                return Err(ValidationError::UnsupportedMethod {
                    method: method.clone(),
                });
            }
        };
        for (name, value) in &self.path {
            params.insert(name.clone(), value.clone());
        }
        Ok(params)
    }
}

/// Parse an application/x-www-form-urlencoded string.
/// Example: "name:exact=John&_lastUpdated=ge2020-01-01"
pub fn parse_query(query: &str) -> RawParameters {
    let mut params = RawParameters::new();
    for (key, value) in form_urlencoded::parse(query.trim_start_matches('?').as_bytes()) {
        let value = value.into_owned();
        match params.get_mut(key.as_ref()) {
            Some(existing) => {
                let previous = std::mem::replace(existing, RawValue::Many(Vec::new()));
                *existing = previous.push(value);
            }
            None => {
                params.insert(key.into_owned(), RawValue::One(value));
            }
        }
    }
    params
}

/// Read a JSON object of strings or string arrays.
pub fn parse_json_params(body: &Value) -> Result<RawParameters> {
    let object = body
        .as_object()
        .ok_or_else(|| ValidationError::type_mismatch("object", "body"))?;

    let mut params = RawParameters::new();
    for (key, value) in object {
        let raw = match value {
            Value::String(s) => RawValue::One(s.clone()),
            Value::Array(items) => RawValue::Many(
                items
                    .iter()
                    .map(|item| {
                        item.as_str()
                            .map(str::to_string)
                            .ok_or_else(|| ValidationError::type_mismatch("string", key.as_str()))
                    })
                    .collect::<Result<_>>()?,
            ),
            _ => return Err(ValidationError::type_mismatch("string", key.as_str())),
        };
        params.insert(key.clone(), raw);
    }
    Ok(params)
}

/// Split `name:modifier` on the first colon, keeping the rest for chains.
pub fn split_name_and_modifier(key: &str) -> (&str, Option<&str>) {
    match key.split_once(':') {
        Some((name, modifier)) => (name, Some(modifier)),
        None => (key, None),
    }
}
