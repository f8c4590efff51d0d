//! Normalized charge status and per-provider mapping tables.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The three settlement states every provider status collapses onto.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChargeStatus {
    Pending,
    Paid,
    #[serde(alias = "CANCELED")]
    Cancelled,
}

impl ChargeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Paid => "PAID",
            Self::Cancelled => "CANCELLED",
        }
    }

    #[inline]
    pub fn is_final(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}

impl fmt::Display for ChargeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Explicit native-status table for one provider endpoint.
///
/// Keys are lowercase. Lookups trim and lowercase the native value, and any
/// value missing from the table maps to [`ChargeStatus::Pending`].
#[derive(Debug, Clone, Copy)]
pub struct StatusTable {
    pub provider: &'static str,
    pub entries: &'static [(&'static str, ChargeStatus)],
}

impl StatusTable {
    pub const fn new(provider: &'static str, entries: &'static [(&'static str, ChargeStatus)]) -> Self {
        Self { provider, entries }
    }

    pub fn lookup(&self, native: &str) -> Option<ChargeStatus> {
        let key = native.trim().to_lowercase();
        self.entries
            .iter()
            .find(|(name, _)| *name == key)
            .map(|(_, status)| *status)
    }

    pub fn normalize(&self, native: Option<&str>) -> ChargeStatus {
        match native {
            Some(raw) => self.lookup(raw).unwrap_or_else(|| {
                tracing::debug!(provider = self.provider, status = raw, "Unmapped provider status, treating as pending");
                ChargeStatus::Pending
            }),
            None => ChargeStatus::Pending,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TABLE: StatusTable = StatusTable::new(
        "test",
        &[
            ("open", ChargeStatus::Pending),
            ("settled", ChargeStatus::Paid),
            ("void", ChargeStatus::Cancelled),
        ],
    );

    #[test]
    fn test_lookup_is_case_insensitive() {
        assert_eq!(TABLE.normalize(Some("SETTLED")), ChargeStatus::Paid);
        assert_eq!(TABLE.normalize(Some("  Void ")), ChargeStatus::Cancelled);
    }

    #[test]
    fn test_unknown_defaults_to_pending() {
        assert_eq!(TABLE.normalize(Some("refunded")), ChargeStatus::Pending);
        assert_eq!(TABLE.normalize(Some("")), ChargeStatus::Pending);
        assert_eq!(TABLE.normalize(None), ChargeStatus::Pending);
    }

    #[test]
    fn test_serde_spelling() {
        assert_eq!(
            serde_json::to_string(&ChargeStatus::Cancelled).unwrap(),
            "\"CANCELLED\""
        );
        let legacy: ChargeStatus = serde_json::from_str("\"CANCELED\"").unwrap();
        assert_eq!(legacy, ChargeStatus::Cancelled);
        assert!(legacy.is_final());
    }
}
