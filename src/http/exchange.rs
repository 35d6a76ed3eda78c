//! Plain request/response values passed across the transport boundary.

use anyhow::Result;
use std::fmt;
use std::str::FromStr;

/// Standard HTTP request methods.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Method {
    #[default]
    Get,
    Head,
    Post,
    Put,
    Patch,
    Delete,
    Options,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Head => "HEAD",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
            Method::Options => "OPTIONS",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Method {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "GET" => Ok(Method::Get),
            "HEAD" => Ok(Method::Head),
            "POST" => Ok(Method::Post),
            "PUT" => Ok(Method::Put),
            "PATCH" => Ok(Method::Patch),
            "DELETE" => Ok(Method::Delete),
            "OPTIONS" => Ok(Method::Options),
            _ => anyhow::bail!("Unknown HTTP method: {}", s),
        }
    }
}

/// Ordered header list. Names compare case-insensitively and duplicates
/// keep their insertion order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Headers(Vec<(String, String)>);

impl Headers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.0.push((name.into(), value.into()));
    }

    /// First value for `name`, ignoring case.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Every value for `name`, in the order received.
    pub fn get_all<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.0
            .iter()
            .filter(move |(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<N: Into<String>, V: Into<String>> FromIterator<(N, V)> for Headers {
    fn from_iter<I: IntoIterator<Item = (N, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(n, v)| (n.into(), v.into()))
                .collect(),
        )
    }
}

impl<N: Into<String>, V: Into<String>> From<Vec<(N, V)>> for Headers {
    fn from(pairs: Vec<(N, V)>) -> Self {
        pairs.into_iter().collect()
    }
}

/// One logical request, replayed verbatim on every attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub path: String,
    pub method: Method,
    pub headers: Headers,
    pub body: Option<Vec<u8>>,
}

/// `(protocol version, status code, reason phrase)` of a response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusLine {
    pub version: String,
    pub status_code: u16,
    pub reason: String,
}

impl StatusLine {
    pub fn new(version: impl Into<String>, status_code: u16, reason: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            status_code,
            reason: reason.into(),
        }
    }
}

impl fmt::Display for StatusLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.version, self.status_code, self.reason)
    }
}

/// A completed HTTP exchange as returned by a transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawExchange {
    pub status_line: StatusLine,
    pub headers: Headers,
    pub body: Vec<u8>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_method_parse() {
        assert_eq!("GET".parse::<Method>().unwrap(), Method::Get);
        assert_eq!("post".parse::<Method>().unwrap(), Method::Post);
        assert_eq!("Delete".parse::<Method>().unwrap(), Method::Delete);
        assert!("FETCH".parse::<Method>().is_err());
        assert!("".parse::<Method>().is_err());
    }

    #[test]
    fn test_method_display() {
        assert_eq!(Method::Patch.to_string(), "PATCH");
        assert_eq!(Method::default().to_string(), "GET");
    }

    #[test]
    fn test_headers_case_insensitive_lookup() {
        let headers = Headers::from(vec![("Retry-After", "3"), ("content-type", "text/plain")]);
        assert_eq!(headers.get("retry-after"), Some("3"));
        assert_eq!(headers.get("RETRY-AFTER"), Some("3"));
        assert_eq!(headers.get("Content-Type"), Some("text/plain"));
        assert_eq!(headers.get("x-missing"), None);
    }

    #[test]
    fn test_headers_duplicates_keep_order() {
        let mut headers = Headers::new();
        headers.push("Set-Cookie", "a=1");
        headers.push("x-other", "y");
        headers.push("set-cookie", "b=2");

        assert_eq!(headers.len(), 3);
        assert_eq!(headers.get("set-cookie"), Some("a=1"));
        let all: Vec<&str> = headers.get_all("SET-COOKIE").collect();
        assert_eq!(all, vec!["a=1", "b=2"]);

        let names: Vec<&str> = headers.iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["Set-Cookie", "x-other", "set-cookie"]);
    }

    #[test]
    fn test_status_line_display() {
        let line = StatusLine::new("HTTP/1.1", 429, "CONFLICT");
        assert_eq!(line.to_string(), "HTTP/1.1 429 CONFLICT");
    }
}
