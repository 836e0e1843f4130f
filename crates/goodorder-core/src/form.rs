//! Form types and the extracted/authoritative data shapes.

use serde::{Deserialize, Serialize};

/// Fields extracted from an uploaded form by OCR, keyed by field name.
///
/// A BTreeMap keeps field order stable across runs, which matters for
/// prompt construction and response rendering.
pub type FieldMap = std::collections::BTreeMap<String, String>;

/// Authoritative record fetched from the policy system. Arbitrary JSON
/// shape; the pipelines never interpret it beyond serialising it back out.
pub type Record = serde_json::Map<String, serde_json::Value>;

/// The kinds of form the pipelines know how to process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FormType {
    Renewals,
    Withdrawals,
    Generic,
}

impl FormType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Renewals => "renewals",
            Self::Withdrawals => "withdrawals",
            Self::Generic => "generic",
        }
    }

    /// Detect a form type from free text by keyword, defaulting to generic.
    pub fn from_keywords(text: &str) -> Self {
        let lower = text.to_lowercase();
        if lower.contains("renewal") {
            Self::Renewals
        } else if lower.contains("withdrawal") {
            Self::Withdrawals
        } else {
            Self::Generic
        }
    }

    /// Name of the field that carries the record identifier for this form
    /// type. Generic forms have no external record to look up.
    pub fn identifier_field(&self) -> Option<&'static str> {
        match self {
            Self::Renewals => Some("contractNumber"),
            Self::Withdrawals => Some("loanId"),
            Self::Generic => None,
        }
    }

    /// Look up the record identifier in extracted fields.
    ///
    /// OCR alias mapping emits lowerCamelCase names while test fixtures use
    /// UpperCamelCase, so the lookup tolerates a leading-case mismatch.
    pub fn identifier_in<'a>(&self, fields: &'a FieldMap) -> Option<&'a str> {
        let wanted = self.identifier_field()?;
        if let Some(v) = fields.get(wanted) {
            return Some(v.as_str());
        }
        fields
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(wanted))
            .map(|(_, v)| v.as_str())
    }
}

impl std::str::FromStr for FormType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "renewals" | "renewal" => Ok(Self::Renewals),
            "withdrawals" | "withdrawal" => Ok(Self::Withdrawals),
            "generic" => Ok(Self::Generic),
            other => Err(format!("unknown form type: {other}")),
        }
    }
}

impl std::fmt::Display for FormType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keyword_detection() {
        assert_eq!(
            FormType::from_keywords("please validate my renewal form"),
            FormType::Renewals
        );
        assert_eq!(
            FormType::from_keywords("Withdrawal request attached"),
            FormType::Withdrawals
        );
        assert_eq!(FormType::from_keywords("hello there"), FormType::Generic);
    }

    #[test]
    fn identifier_lookup_exact() {
        let mut fields = FieldMap::new();
        fields.insert("contractNumber".into(), "571003597".into());
        assert_eq!(
            FormType::Renewals.identifier_in(&fields),
            Some("571003597")
        );
    }

    #[test]
    fn identifier_lookup_tolerates_leading_case() {
        let mut fields = FieldMap::new();
        fields.insert("ContractNumber".into(), "571003597".into());
        assert_eq!(
            FormType::Renewals.identifier_in(&fields),
            Some("571003597")
        );
    }

    #[test]
    fn identifier_missing() {
        let fields = FieldMap::new();
        assert_eq!(FormType::Renewals.identifier_in(&fields), None);
        assert_eq!(FormType::Generic.identifier_in(&fields), None);
    }

    #[test]
    fn parse_roundtrip() {
        assert_eq!("renewals".parse::<FormType>().unwrap(), FormType::Renewals);
        assert_eq!(
            "Withdrawal".parse::<FormType>().unwrap(),
            FormType::Withdrawals
        );
        assert!("mortgage".parse::<FormType>().is_err());
    }
}
