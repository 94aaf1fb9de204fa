const BEARER_PREFIX: &str = "Bearer ";

/// How a credential was presented.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scheme {
    Bearer,
    Shared,
    None,
}

/// A per-call credential. `value` is already stripped of any `Bearer `
/// prefix and trimmed.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    pub scheme: Scheme,
    value: String,
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("scheme", &self.scheme)
            .field("value", &"[REDACTED]")
            .finish()
    }
}

impl Credential {
    pub fn none() -> Self {
        Self {
            scheme: Scheme::None,
            value: String::new(),
        }
    }

    /// Pick the credential for a call. The out-of-band channel (e.g. an
    /// `Authorization` header) wins over the in-band tool argument.
    pub fn extract(out_of_band: Option<&str>, in_band: Option<&str>) -> Self {
        let raw = [out_of_band, in_band]
            .into_iter()
            .flatten()
            .find(|v| !v.trim().is_empty());
        match raw {
            Some(raw) => Self::parse(raw),
            None => Self::none(),
        }
    }

    /// Classify a single raw value.
    pub fn parse(raw: &str) -> Self {
        if let Some(rest) = bearer_value(raw) {
            if rest.is_empty() {
                return Self::none();
            }
            return Self {
                scheme: Scheme::Bearer,
                value: rest.to_string(),
            };
        }
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Self::none();
        }
        Self {
            scheme: Scheme::Shared,
            value: trimmed.to_string(),
        }
    }

    pub fn is_present(&self) -> bool {
        self.scheme != Scheme::None
    }

    pub fn value(&self) -> &str {
        &self.value
    }
}

/// Extract a bearer value: only a literal, case-sensitive `"Bearer "`
/// prefix counts. Returns the trimmed remainder.
pub fn bearer_value(raw: &str) -> Option<&str> {
    raw.strip_prefix(BEARER_PREFIX).map(str::trim)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bearer_prefix_is_case_sensitive() {
        assert_eq!(bearer_value("Bearer abc "), Some("abc"));
        assert_eq!(bearer_value("bearer abc"), None);
        assert_eq!(bearer_value("BEARER abc"), None);
        assert_eq!(bearer_value("Bearerabc"), None);
    }

    #[test]
    fn test_parse_schemes() {
        let c = Credential::parse("Bearer  tok.en.sig ");
        assert_eq!(c.scheme, Scheme::Bearer);
        assert_eq!(c.value(), "tok.en.sig");

        let c = Credential::parse("  s3cret ");
        assert_eq!(c.scheme, Scheme::Shared);
        assert_eq!(c.value(), "s3cret");

        let c = Credential::parse("   ");
        assert_eq!(c.scheme, Scheme::None);
        assert!(!c.is_present());
    }

    #[test]
    fn test_out_of_band_takes_precedence() {
        let c = Credential::extract(Some("Bearer header-token"), Some("argument-secret"));
        assert_eq!(c.value(), "header-token");

        let c = Credential::extract(None, Some("argument-secret"));
        assert_eq!(c.value(), "argument-secret");

        let c = Credential::extract(Some("  "), Some("argument-secret"));
        assert_eq!(c.value(), "argument-secret");

        assert!(!Credential::extract(None, None).is_present());
    }

    #[test]
    fn test_debug_redacts_value() {
        let c = Credential::parse("Bearer super-secret");
        assert!(!format!("{:?}", c).contains("super-secret"));
    }
}
