use std::fmt;
use thiserror::Error;

/// Uppercase alphanumeric text. The field is private to this module, so
/// every candidate has gone through [`normalize`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlateCandidate(String);

impl PlateCandidate {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for PlateCandidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("No license plate detected")]
pub struct NoCandidateError;

/// Uppercases `raw` and drops everything outside `[A-Z0-9]`.
pub fn normalize(raw: &str) -> PlateCandidate {
    PlateCandidate(
        raw.chars()
            .flat_map(char::to_uppercase)
            .filter(|c| c.is_ascii_uppercase() || c.is_ascii_digit())
            .collect(),
    )
}

/// Picks the first non-empty candidate in detection order.
pub fn select<I>(candidates: I) -> Result<PlateCandidate, NoCandidateError>
where
    I: IntoIterator<Item = PlateCandidate>,
{
    candidates
        .into_iter()
        .find(|candidate| !candidate.is_empty())
        .ok_or(NoCandidateError)
}
