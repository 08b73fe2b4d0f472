use std::{fmt, str::FromStr};

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use serde::{Deserialize, Serialize};

use crate::error::KeystoreError;

/// Opaque continuation token for a paginated listing.
///
/// Internally it is the first name not yet returned; its text form is
/// URL-safe base64 so it survives shells and query strings.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct Cursor(String);

impl Cursor {
    pub(crate) fn at(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    fn position(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&URL_SAFE_NO_PAD.encode(self.0.as_bytes()))
    }
}

impl FromStr for Cursor {
    type Err = KeystoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = URL_SAFE_NO_PAD
            .decode(s)
            .map_err(|e| KeystoreError::invalid_argument(format!("malformed cursor: {e}")))?;
        let name = String::from_utf8(bytes)
            .map_err(|_| KeystoreError::invalid_argument("malformed cursor: not utf-8"))?;
        Ok(Self(name))
    }
}

impl From<Cursor> for String {
    fn from(cursor: Cursor) -> Self {
        cursor.to_string()
    }
}

impl TryFrom<String> for Cursor {
    type Error = KeystoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Filter `names` by prefix, resume at `cursor`, sort, and cap at `limit`.
///
/// Shared by every backend so pagination behaves identically across them.
pub fn paginate<I>(
    names: I,
    prefix: &str,
    cursor: Option<&Cursor>,
    limit: usize,
) -> (Vec<String>, Option<Cursor>)
where
    I: IntoIterator<Item = String>,
{
    let mut matching: Vec<String> = names
        .into_iter()
        .filter(|name| name.starts_with(prefix))
        .filter(|name| cursor.is_none_or(|c| name.as_str() >= c.position()))
        .collect();
    matching.sort_unstable();
    matching.dedup();

    if limit == 0 || matching.len() <= limit {
        return (matching, None);
    }
    let next = Cursor::at(matching[limit].clone());
    matching.truncate(limit);
    (matching, Some(next))
}
