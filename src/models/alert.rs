//! Change-detection feed and derived alerts.
//!
//! The monitoring service reports raw land-cover changes; the dashboard
//! shows them as alerts with a severity and an alert type. The raw feed
//! is what gets cached, so the derivation stays client-side and cheap to
//! re-run.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::DEFAULT_COORDINATES;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChangeType {
    Reforestation,
    Deforestation,
    #[serde(rename = "Water_Level_Change")]
    WaterLevelChange,
    #[serde(rename = "No_Change")]
    NoChange,
    Encroachment,
    #[serde(rename = "Forest_Fire")]
    ForestFire,
    #[serde(rename = "Land_Use_Change")]
    LandUseChange,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RiskCategory {
    Low,
    Medium,
    High,
}

/// One detected change from `/monitor-changes`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeDetection {
    pub change_id: String,
    pub change_type: ChangeType,
    pub detection_date: String,
    pub area_change_hectares: f64,
    pub confidence_score: f64,
    pub beneficiary_id: String,
    #[serde(default)]
    pub asset_id: Option<String>,
    #[serde(default)]
    pub title_id: Option<String>,
    #[serde(default)]
    pub village_id: Option<String>,
    pub village_name: String,
    #[serde(default)]
    pub gp_name: Option<String>,
    #[serde(default)]
    pub block_name: Option<String>,
    pub district: String,
    pub state: String,
    /// Polygon rings of `[lng, lat]` vertices.
    #[serde(default)]
    pub coordinates: Vec<Vec<[f64; 2]>>,
    pub risk_category: RiskCategory,
    pub description: String,
}

impl ChangeDetection {
    /// Centroid of the first polygon ring, as `[lat, lng]`.
    pub fn centroid(&self) -> Option<[f64; 2]> {
        let ring = self.coordinates.first()?;
        if ring.is_empty() {
            return None;
        }
        let n = ring.len() as f64;
        let (lng_sum, lat_sum) = ring
            .iter()
            .fold((0.0, 0.0), |(lng, lat), v| (lng + v[0], lat + v[1]));
        Some([lat_sum / n, lng_sum / n])
    }

    /// Detection date as an instant; the feed serializes either RFC 3339
    /// timestamps or plain dates.
    pub fn detected_at(&self) -> Option<DateTime<Utc>> {
        if let Ok(dt) = DateTime::parse_from_rfc3339(&self.detection_date) {
            return Some(dt.with_timezone(&Utc));
        }
        NaiveDate::parse_from_str(&self.detection_date, "%Y-%m-%d")
            .ok()
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map(|dt| dt.and_utc())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl From<RiskCategory> for Severity {
    fn from(risk: RiskCategory) -> Self {
        match risk {
            RiskCategory::Low => Severity::Low,
            RiskCategory::Medium => Severity::Medium,
            RiskCategory::High => Severity::High,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertType {
    Encroachment,
    Deforestation,
    ClaimUpdate,
    System,
    DssFlag,
    UrgentReview,
    Anomaly,
    ChangeDetection,
    FraudulentClaims,
}

/// A dashboard alert, usually derived from a change-detection record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
    pub id: String,
    #[serde(rename = "type")]
    pub alert_type: AlertType,
    pub location: String,
    pub coordinates: [f64; 2],
    pub timestamp: DateTime<Utc>,
    pub description: String,
    pub resolved: bool,
    pub severity: Severity,
    #[serde(default)]
    pub acknowledged_by: Option<String>,
    #[serde(default)]
    pub acknowledged_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub change: Option<ChangeDetection>,
}

impl Alert {
    /// Severity and alert-type derivation for the review queues:
    /// deforestation and encroachment scale with the risk category, fires
    /// always demand urgent review, reforestation is informational.
    pub fn from_change(change: ChangeDetection) -> Self {
        let (severity, alert_type) = match change.change_type {
            ChangeType::Deforestation => {
                (Severity::from(change.risk_category), AlertType::Deforestation)
            }
            ChangeType::Encroachment => {
                (Severity::from(change.risk_category), AlertType::Encroachment)
            }
            ChangeType::ForestFire => (Severity::High, AlertType::UrgentReview),
            ChangeType::Reforestation => (Severity::Low, AlertType::ClaimUpdate),
            _ => (Severity::Low, AlertType::ChangeDetection),
        };

        Self {
            id: change.change_id.clone(),
            alert_type,
            location: format!(
                "{}, {}, {}",
                change.village_name, change.district, change.state
            ),
            coordinates: change.centroid().unwrap_or(DEFAULT_COORDINATES),
            timestamp: change.detected_at().unwrap_or_else(Utc::now),
            description: change.description.clone(),
            resolved: false,
            severity,
            acknowledged_by: None,
            acknowledged_at: None,
            change: Some(change),
        }
    }

    pub fn acknowledge(&mut self, by: impl Into<String>, at: DateTime<Utc>) {
        self.resolved = true;
        self.acknowledged_by = Some(by.into());
        self.acknowledged_at = Some(at);
    }
}
