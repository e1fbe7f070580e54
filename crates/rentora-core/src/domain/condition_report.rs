//! Check-in and return condition reports.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{BookingId, ReportId};

/// When the report was taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReportKind {
    Checkin,
    Return,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DamageSeverity {
    Minor,
    Moderate,
    Severe,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DamageEntry {
    pub description: String,
    pub severity: DamageSeverity,
}

/// A condition report attached to a booking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConditionReport {
    pub id: ReportId,
    pub booking_id: BookingId,
    pub kind: ReportKind,
    pub completed: bool,
    pub damages: Vec<DamageEntry>,
    pub created_at: DateTime<Utc>,
}

impl ConditionReport {
    /// Returns true if any recorded damage is severe.
    #[must_use]
    pub fn has_severe_damage(&self) -> bool {
        self.damages
            .iter()
            .any(|d| d.severity == DamageSeverity::Severe)
    }

    /// Returns true for a completed return report with no severe damage.
    #[must_use]
    pub fn clears_for_completion(&self) -> bool {
        self.kind == ReportKind::Return && self.completed && !self.has_severe_damage()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(kind: ReportKind, completed: bool, severities: &[DamageSeverity]) -> ConditionReport {
        ConditionReport {
            id: ReportId::new(),
            booking_id: BookingId::new(),
            kind,
            completed,
            damages: severities
                .iter()
                .map(|s| DamageEntry {
                    description: "scratch".into(),
                    severity: *s,
                })
                .collect(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_completion_gate() {
        assert!(report(ReportKind::Return, true, &[]).clears_for_completion());
        assert!(report(ReportKind::Return, true, &[DamageSeverity::Minor, DamageSeverity::Moderate])
            .clears_for_completion());
        let severe = report(ReportKind::Return, true, &[DamageSeverity::Severe]);
        assert!(!severe.clears_for_completion());
        assert!(!report(ReportKind::Return, false, &[]).clears_for_completion());
        assert!(!report(ReportKind::Checkin, true, &[]).clears_for_completion());
    }
}
