//! Claim and beneficiary models.
//!
//! `BeneficiaryRecord` mirrors the backend's record shape; `Claim` is the
//! flattened view the review queues and map render from.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::DEFAULT_COORDINATES;

/// Dashboard role. Wire values match the backend's role filter exactly:
/// Grama Sabha sees one gram panchayat, SDLC one block, DLC the district.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    GramaSabha,
    #[serde(rename = "SDLC")]
    Sdlc,
    #[serde(rename = "DLC")]
    Dlc,
}

impl Role {
    pub const ALL: [Role; 3] = [Role::GramaSabha, Role::Sdlc, Role::Dlc];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::GramaSabha => "GramaSabha",
            Role::Sdlc => "SDLC",
            Role::Dlc => "DLC",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
#[error("unknown role: {0}")]
pub struct UnknownRole(String);

impl std::str::FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "GramaSabha" => Ok(Role::GramaSabha),
            "SDLC" => Ok(Role::Sdlc),
            "DLC" => Ok(Role::Dlc),
            other => Err(UnknownRole(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClaimStatus {
    Pending,
    Approved,
    Rejected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClaimType {
    /// Individual Forest Rights
    #[serde(rename = "IFR")]
    Ifr,
    /// Community Rights
    #[serde(rename = "CR")]
    Cr,
    /// Community Forest Resource rights
    #[serde(rename = "CFR")]
    Cfr,
}

impl ClaimType {
    /// Records occasionally carry free-form right types; anything
    /// unrecognized reads as an individual claim.
    pub fn from_right_type(s: &str) -> Self {
        match s {
            "CR" => ClaimType::Cr,
            "CFR" => ClaimType::Cfr,
            _ => ClaimType::Ifr,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersonalInfo {
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub gender: Option<String>,
    #[serde(default)]
    pub tribal_community: Option<String>,
    #[serde(default)]
    pub aadhaar: Option<String>,
    #[serde(default)]
    pub income: Option<f64>,
}

impl PersonalInfo {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TitleInfo {
    pub right_type: String,
    #[serde(default)]
    pub status: Option<String>,
    pub claim_area_hectares: f64,
    /// Polygon rings of vertices, as the backend serializes them.
    #[serde(default)]
    pub polygon_coordinates: Vec<Vec<[f64; 2]>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminInfo {
    #[serde(default)]
    pub village_id: Option<String>,
    pub village: String,
    #[serde(default)]
    pub gp: Option<String>,
    #[serde(default)]
    pub block: Option<String>,
    #[serde(default)]
    pub district: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub forest_area_hectares: Option<f64>,
    #[serde(default)]
    pub block_id: Option<String>,
    #[serde(default)]
    pub gp_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetSummary {
    pub total_area_hectares: f64,
    #[serde(default)]
    pub asset_types: Vec<String>,
    #[serde(default)]
    pub assets_count: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Vulnerability {
    pub score: f64,
    #[serde(default)]
    pub category: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SdlcReview {
    #[serde(default)]
    pub review: bool,
    #[serde(default)]
    pub remarks: Vec<String>,
}

/// Per-level decision tracking. The Grama Sabha decision is the headline
/// status; SDLC and DLC layer their reviews on top.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClaimStatuses {
    #[serde(default)]
    pub gramasabha: Option<ClaimStatus>,
    #[serde(default)]
    pub sdlc: Option<SdlcReview>,
    #[serde(default)]
    pub dlc: Option<serde_json::Value>,
}

/// Beneficiary record as the backend returns it from `/get-beneficiaries`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BeneficiaryRecord {
    pub beneficiary_id: String,
    pub title_id: String,
    #[serde(default)]
    pub personal_info: Option<PersonalInfo>,
    #[serde(default)]
    pub title_info: Option<TitleInfo>,
    #[serde(default)]
    pub admin_info: Option<AdminInfo>,
    #[serde(default)]
    pub asset_summary: Option<AssetSummary>,
    #[serde(default)]
    pub vulnerability: Option<Vulnerability>,
    #[serde(default)]
    pub statuses: Option<ClaimStatuses>,
}

/// Flattened claim for tabular review queues and map pins.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claim {
    pub id: String,
    pub beneficiary_id: String,
    pub title_id: String,
    pub village: String,
    pub status: ClaimStatus,
    /// Representative point for the map pin.
    pub coordinates: [f64; 2],
    pub area_hectares: f64,
    pub applicant_name: String,
    pub claim_type: ClaimType,
    pub vulnerability: Option<Vulnerability>,
    pub statuses: ClaimStatuses,
}

impl Claim {
    pub fn from_record(record: BeneficiaryRecord) -> Self {
        let coordinates = record
            .title_info
            .as_ref()
            .and_then(|t| t.polygon_coordinates.first())
            .and_then(|ring| ring.first())
            .copied()
            .unwrap_or(DEFAULT_COORDINATES);

        let statuses = record.statuses.unwrap_or_default();
        let status = statuses.gramasabha.unwrap_or(ClaimStatus::Pending);

        Self {
            id: record.title_id.clone(),
            beneficiary_id: record.beneficiary_id,
            title_id: record.title_id,
            village: record
                .admin_info
                .as_ref()
                .map(|a| a.village.clone())
                .unwrap_or_else(|| "Unknown".to_string()),
            status,
            coordinates,
            area_hectares: record
                .title_info
                .as_ref()
                .map(|t| t.claim_area_hectares)
                .unwrap_or(0.0),
            applicant_name: record
                .personal_info
                .as_ref()
                .map(PersonalInfo::full_name)
                .unwrap_or_default(),
            claim_type: record
                .title_info
                .as_ref()
                .map(|t| ClaimType::from_right_type(&t.right_type))
                .unwrap_or(ClaimType::Ifr),
            vulnerability: record.vulnerability,
            statuses,
        }
    }
}

/// Payload for `POST /add-beneficiary`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewClaimSubmission {
    pub beneficiary_id: String,
    pub title_id: String,
    pub personal_info: PersonalInfo,
    pub title_info: TitleInfo,
    pub admin_info: AdminInfo,
    #[serde(default)]
    pub asset_summary: Option<AssetSummary>,
    #[serde(default)]
    pub vulnerability: Option<Vulnerability>,
    #[serde(default)]
    pub statuses: ClaimStatuses,
}

impl NewClaimSubmission {
    /// Stamp generated beneficiary/title identifiers and mark the claim
    /// pending at the Grama Sabha level, as the submission flow does
    /// before posting.
    pub fn assign_identifiers(&mut self, now: DateTime<Utc>) {
        let stamp = now.timestamp_millis();
        self.beneficiary_id = format!("FRA_{:08}", stamp);
        self.title_id = format!("FRA_TITLE_{:08}", stamp);
        self.statuses.gramasabha = Some(ClaimStatus::Pending);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RECORD_JSON: &str = r#"{
        "beneficiary_id": "FRA_00000001",
        "title_id": "FRA_TITLE_00000001",
        "personal_info": {
            "first_name": "Ram",
            "last_name": "Singh",
            "gender": "Male",
            "tribal_community": "Gond",
            "aadhaar": "XXXX-XXXX-1234",
            "income": 48000
        },
        "title_info": {
            "right_type": "CFR",
            "status": "Granted",
            "claim_area_hectares": 45.2,
            "polygon_coordinates": [[[78.65, 22.97], [78.66, 22.97], [78.66, 22.98]]]
        },
        "admin_info": {
            "village_id": "VIL_000001",
            "village": "Khargone",
            "gp": "Khargone GP",
            "block": "Bhagwanpura",
            "district": "Khargone",
            "state": "Madhya Pradesh",
            "forest_area_hectares": 1200.5,
            "block_id": "BLK_000001",
            "gp_id": "GP_000001"
        },
        "asset_summary": {
            "total_area_hectares": 45.2,
            "asset_types": ["farmland", "pond"],
            "assets_count": 3
        },
        "vulnerability": {"score": 0.72, "category": "High"},
        "statuses": {"gramasabha": "Approved", "sdlc": {"review": true, "remarks": ["verified"]}}
    }"#;

    #[test]
    fn test_record_parses_and_flattens() {
        let record: BeneficiaryRecord = serde_json::from_str(RECORD_JSON).expect("parse");
        let claim = Claim::from_record(record);

        assert_eq!(claim.id, "FRA_TITLE_00000001");
        assert_eq!(claim.village, "Khargone");
        assert_eq!(claim.status, ClaimStatus::Approved);
        assert_eq!(claim.claim_type, ClaimType::Cfr);
        assert_eq!(claim.applicant_name, "Ram Singh");
        assert_eq!(claim.coordinates, [78.65, 22.97]);
        assert!((claim.area_hectares - 45.2).abs() < 1e-9);
        assert!(claim.statuses.sdlc.as_ref().expect("sdlc").review);
    }

    #[test]
    fn test_sparse_record_uses_fallbacks() {
        let record: BeneficiaryRecord = serde_json::from_str(
            r#"{"beneficiary_id": "FRA_2", "title_id": "FRA_TITLE_2"}"#,
        )
        .expect("parse");
        let claim = Claim::from_record(record);

        assert_eq!(claim.village, "Unknown");
        assert_eq!(claim.status, ClaimStatus::Pending);
        assert_eq!(claim.claim_type, ClaimType::Ifr);
        assert_eq!(claim.coordinates, DEFAULT_COORDINATES);
        assert_eq!(claim.applicant_name, "");
    }

    #[test]
    fn test_unknown_right_type_reads_as_ifr() {
        assert_eq!(ClaimType::from_right_type("IFR"), ClaimType::Ifr);
        assert_eq!(ClaimType::from_right_type("CR"), ClaimType::Cr);
        assert_eq!(ClaimType::from_right_type("Unexpected"), ClaimType::Ifr);
    }

    #[test]
    fn test_role_wire_strings() {
        assert_eq!(Role::GramaSabha.as_str(), "GramaSabha");
        assert_eq!(Role::Sdlc.as_str(), "SDLC");
        assert_eq!(Role::Dlc.as_str(), "DLC");

        for role in Role::ALL {
            let parsed: Role = role.as_str().parse().expect("roundtrip");
            assert_eq!(parsed, role);
            assert_eq!(
                serde_json::to_string(&role).expect("serialize"),
                format!("\"{}\"", role.as_str())
            );
        }
        assert!("sdlc".parse::<Role>().is_err());
    }

    #[test]
    fn test_assign_identifiers() {
        let mut submission: NewClaimSubmission = serde_json::from_str(
            r#"{
                "beneficiary_id": "",
                "title_id": "",
                "personal_info": {"first_name": "Sita", "last_name": "Devi"},
                "title_info": {"right_type": "IFR", "claim_area_hectares": 2.5},
                "admin_info": {"village": "Khargone"}
            }"#,
        )
        .expect("parse");

        let now = Utc::now();
        submission.assign_identifiers(now);

        assert_eq!(
            submission.beneficiary_id,
            format!("FRA_{:08}", now.timestamp_millis())
        );
        assert!(submission.title_id.starts_with("FRA_TITLE_"));
        assert_eq!(submission.statuses.gramasabha, Some(ClaimStatus::Pending));
    }
}
