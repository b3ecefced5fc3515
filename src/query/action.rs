//! Download actions and the filter expression each one maps to.

use std::fmt;
use std::str::FromStr;

use crate::validation::ValidationError;

/// Predefined downloads offered on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Every record in the index.
    All,
    /// Records owned by one institution (`serviceOrganization`).
    Institution,
    /// Records that carry geodata.
    GeodataExists,
    /// A caller-supplied filter expression.
    Query,
}

impl Action {
    /// All actions in help-text order.
    pub const ALL: [Self; 4] = [Self::GeodataExists, Self::All, Self::Institution, Self::Query];

    /// Stable command-line name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::All => "all",
            Self::Institution => "institution",
            Self::GeodataExists => "geodata-exists",
            Self::Query => "query",
        }
    }

    /// Comma separated list of accepted names, for help and error text.
    #[must_use]
    pub fn names() -> String {
        Self::ALL
            .iter()
            .map(|action| action.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Resolves the filter expression for this action.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::MissingInstitution`] or
    /// [`ValidationError::MissingQuery`] when the argument the action needs is
    /// absent or blank.
    pub fn filter_expression(
        self,
        institution: Option<&str>,
        query: Option<&str>,
    ) -> Result<String, ValidationError> {
        match self {
            Self::All => Ok("*".to_string()),
            Self::GeodataExists => Ok("geoDataExists=j".to_string()),
            Self::Institution => non_blank(institution)
                .map(|inst| format!("serviceOrganization={inst}"))
                .ok_or(ValidationError::MissingInstitution),
            Self::Query => non_blank(query)
                .map(str::to_string)
                .ok_or(ValidationError::MissingQuery),
        }
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Action {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|action| action.as_str() == s)
            .ok_or_else(|| ValidationError::UnknownAction {
                action: s.to_string(),
                expected: Self::names(),
            })
    }
}
