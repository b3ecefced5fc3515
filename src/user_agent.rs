//! Shared User-Agent string for probe and page traffic.

/// Product token the search API sees in every request.
const PRODUCT_COMMENT: &str = "SOCH Download CLI";

/// Default User-Agent sent with every request to the search API.
#[must_use]
pub(crate) fn default_user_agent() -> String {
    let version = env!("CARGO_PKG_VERSION");
    format!("soch-download/{version} ({PRODUCT_COMMENT})")
}

#[cfg(test)]
#[allow(clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_user_agent_contains_version() {
        let ua = default_user_agent();
        assert_eq!(
            env!("CARGO_PKG_VERSION"),
            ua.strip_prefix("soch-download/")
                .and_then(|s| s.split(' ').next())
                .expect("UA has version"),
        );
    }

    #[test]
    fn test_user_agent_identifies_cli() {
        assert!(default_user_agent().contains(PRODUCT_COMMENT));
    }
}
