//! HTTP method as a typed enum.
//!
//! Unknown method strings are rejected at the server level with
//! `405 Method Not Allowed` before they ever reach a chain.

use std::fmt;
use std::str::FromStr;

/// A known HTTP method, plus the registration-only wildcard [`Method::All`].
///
/// `All` keys the method-independent middleware bucket of a route entry.
/// It is never parsed off the wire.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Method {
    All,
    Connect,
    Delete,
    Get,
    Options,
    Patch,
    Post,
    Put,
    Trace,
}

impl Method {
    /// Returns the uppercase wire representation (e.g. `"GET"`).
    pub fn as_str(self) -> &'static str {
        match self {
            Self::All     => "ALL",
            Self::Connect => "CONNECT",
            Self::Delete  => "DELETE",
            Self::Get     => "GET",
            Self::Options => "OPTIONS",
            Self::Patch   => "PATCH",
            Self::Post    => "POST",
            Self::Put     => "PUT",
            Self::Trace   => "TRACE",
        }
    }
}

/// Parses an uppercase wire method. `"ALL"` is rejected — the wildcard
/// exists only for registration.
impl FromStr for Method {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CONNECT" => Ok(Self::Connect),
            "DELETE"  => Ok(Self::Delete),
            "GET"     => Ok(Self::Get),
            "OPTIONS" => Ok(Self::Options),
            "PATCH"   => Ok(Self::Patch),
            "POST"    => Ok(Self::Post),
            "PUT"     => Ok(Self::Put),
            "TRACE"   => Ok(Self::Trace),
            _         => Err(()),
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
