use strum_macros::{Display, EnumIter, EnumString, IntoStaticStr};

/// The HTTP verbs a probe can use.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, IntoStaticStr, EnumIter,
)]
#[strum(serialize_all = "UPPERCASE", ascii_case_insensitive)]
pub enum HttpMethod {
    Get,
    Head,
    Post,
    Put,
    Delete,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        self.into()
    }

    /// Whether a response to this method never carries a body.
    pub fn is_head(&self) -> bool {
        matches!(self, HttpMethod::Head)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;
    use strum::IntoEnumIterator;

    #[test]
    fn test_method_round_trips_through_its_name() {
        for method in HttpMethod::iter() {
            assert_eq!(HttpMethod::from_str(method.as_str()), Ok(method));
        }
    }

    #[test]
    fn test_method_parsing_ignores_case() {
        assert_eq!(HttpMethod::from_str("post"), Ok(HttpMethod::Post));
        assert_eq!(HttpMethod::from_str("Delete"), Ok(HttpMethod::Delete));
    }

    #[test]
    fn test_unsupported_methods_are_rejected() {
        assert!(HttpMethod::from_str("PATCH").is_err());
        assert!(HttpMethod::from_str("OPTIONS").is_err());
        assert!(HttpMethod::from_str("").is_err());
    }
}
