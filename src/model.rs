use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct UserModel {
    pub id: String,            //Char(36) primary key
    pub name: String,          //VarChar(100)
    pub email: String,         //VarChar(254) unique
    pub password_hash: String, //VarChar(255)
    pub is_admin: bool,
    pub created_at: DateTime<Utc>,
}

/// A user as it leaves the server. Never carries the password hash.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserModelResponse {
    pub id: String,
    pub name: String,
    pub email: String,
    pub is_admin: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct RegisterModel {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct LoginModel {
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct LoginResponse {
    pub id: String,
    pub email: String,
    pub token: String,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct UserIdModel {
    #[serde(rename = "userId")]
    pub user_id: Option<String>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct ScanIdModel {
    #[serde(rename = "scanId")]
    pub scan_id: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize, sqlx::Type)]
pub enum VehicleType {
    Bike,
    Car,
    Truck,
}

impl VehicleType {
    pub fn as_str(&self) -> &'static str {
        match self {
            VehicleType::Bike => "Bike",
            VehicleType::Car => "Car",
            VehicleType::Truck => "Truck",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize, sqlx::Type)]
pub enum NumberPlateType {
    White,
    Yellow,
    Red,
    Green,
    Black,
}

impl NumberPlateType {
    pub fn as_str(&self) -> &'static str {
        match self {
            NumberPlateType::White => "White",
            NumberPlateType::Yellow => "Yellow",
            NumberPlateType::Red => "Red",
            NumberPlateType::Green => "Green",
            NumberPlateType::Black => "Black",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownVariant {
    pub field: &'static str,
    pub value: String,
}

impl fmt::Display for UnknownVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Invalid {}: {}", self.field, self.value)
    }
}

impl std::error::Error for UnknownVariant {}

impl FromStr for VehicleType {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Bike" => Ok(VehicleType::Bike),
            "Car" => Ok(VehicleType::Car),
            "Truck" => Ok(VehicleType::Truck),
            _ => Err(UnknownVariant {
                field: "vehicle_type",
                value: s.to_string(),
            }),
        }
    }
}

impl FromStr for NumberPlateType {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "White" => Ok(NumberPlateType::White),
            "Yellow" => Ok(NumberPlateType::Yellow),
            "Red" => Ok(NumberPlateType::Red),
            "Green" => Ok(NumberPlateType::Green),
            "Black" => Ok(NumberPlateType::Black),
            _ => Err(UnknownVariant {
                field: "number_plate_type",
                value: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for VehicleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl fmt::Display for NumberPlateType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, sqlx::FromRow)]
pub struct DetectionModel {
    pub id: String, //Char(36) primary key
    #[serde(rename = "userId")]
    pub user_id: String, //Char(36), references users.id
    pub vehicle_number: String,
    pub vehicle_type: VehicleType,
    pub number_plate_type: NumberPlateType,
    pub helmet_detected: bool,
    pub helmet_detected_image_path: String,
    pub non_helmet_rider: bool,
    pub non_helmet_rider_image_path: String,
    pub passenger_with_helmet: bool,
    pub passenger_with_helmet_image_path: String,
    pub vehicle_speed: f64,
    pub location: String,
    pub image_path: String,
    pub timestamp: DateTime<Utc>,
}

/// The fixed projection served to the approval dashboard.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct DetectionSummary {
    pub id: String,
    #[serde(rename = "userId")]
    pub user_id: String,
    pub vehicle_number: String,
    pub vehicle_type: VehicleType,
    pub helmet_detected: bool,
    pub helmet_detected_image_path: String,
    pub non_helmet_rider: bool,
    pub non_helmet_rider_image_path: String,
    pub passenger_with_helmet: bool,
    pub passenger_with_helmet_image_path: String,
    pub image_path: String,
}

/// Raw data-form payload. Everything is optional so that a missing field
/// can be reported as such instead of as a parse failure.
#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct DetectionForm {
    #[serde(rename = "userId")]
    pub user_id: Option<String>,
    pub vehicle_number: Option<String>,
    pub vehicle_type: Option<String>,
    pub number_plate_type: Option<String>,
    pub helmet_detected: Option<bool>,
    pub helmet_detected_image_path: Option<String>,
    pub non_helmet_rider: Option<bool>,
    pub non_helmet_rider_image_path: Option<String>,
    pub passenger_with_helmet: Option<bool>,
    pub passenger_with_helmet_image_path: Option<String>,
    pub vehicle_speed: Option<f64>,
    pub location: Option<String>,
    pub image_path: Option<String>,
}

/// The review flags an admin may flip. Nothing else on a record is writable
/// after submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectionFlag {
    HelmetDetected,
    NonHelmetRider,
    PassengerWithHelmet,
}

impl DetectionFlag {
    pub const ALL: [DetectionFlag; 3] = [
        DetectionFlag::HelmetDetected,
        DetectionFlag::NonHelmetRider,
        DetectionFlag::PassengerWithHelmet,
    ];

    /// Column and JSON field name.
    pub fn column(&self) -> &'static str {
        match self {
            DetectionFlag::HelmetDetected => "helmet_detected",
            DetectionFlag::NonHelmetRider => "non_helmet_rider",
            DetectionFlag::PassengerWithHelmet => "passenger_with_helmet",
        }
    }

    pub fn apply(&self, record: &mut DetectionModel, value: bool) {
        match self {
            DetectionFlag::HelmetDetected => record.helmet_detected = value,
            DetectionFlag::NonHelmetRider => record.non_helmet_rider = value,
            DetectionFlag::PassengerWithHelmet => record.passenger_with_helmet = value,
        }
    }
}

impl FromStr for DetectionFlag {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DetectionFlag::ALL
            .into_iter()
            .find(|flag| flag.column() == s)
            .ok_or_else(|| UnknownVariant {
                field: "field",
                value: s.to_string(),
            })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlagUpdate {
    pub flag: DetectionFlag,
    pub value: bool,
}

/// `fields` object of an approval patch. Unknown keys are rejected while
/// parsing.
#[derive(Debug, Default, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct FlagFields {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub helmet_detected: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub non_helmet_rider: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub passenger_with_helmet: Option<bool>,
}

impl FlagFields {
    pub fn single(update: FlagUpdate) -> Self {
        let mut fields = FlagFields::default();
        match update.flag {
            DetectionFlag::HelmetDetected => fields.helmet_detected = Some(update.value),
            DetectionFlag::NonHelmetRider => fields.non_helmet_rider = Some(update.value),
            DetectionFlag::PassengerWithHelmet => {
                fields.passenger_with_helmet = Some(update.value)
            }
        }
        fields
    }

    pub fn updates(&self) -> Vec<FlagUpdate> {
        [
            (DetectionFlag::HelmetDetected, self.helmet_detected),
            (DetectionFlag::NonHelmetRider, self.non_helmet_rider),
            (DetectionFlag::PassengerWithHelmet, self.passenger_with_helmet),
        ]
        .into_iter()
        .filter_map(|(flag, value)| value.map(|value| FlagUpdate { flag, value }))
        .collect()
    }
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct UpdateDetectionModel {
    pub id: Option<String>,
    pub fields: Option<FlagFields>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_flag_fields_are_rejected() {
        let parsed = serde_json::from_str::<UpdateDetectionModel>(
            r#"{"id": "abc", "fields": {"vehicle_number": "X"}}"#,
        );
        assert!(parsed.is_err());

        let parsed = serde_json::from_str::<UpdateDetectionModel>(
            r#"{"id": "abc", "fields": {"helmet_detected": "yes"}}"#,
        );
        assert!(parsed.is_err());
    }

    #[test]
    fn flag_fields_keep_only_present_flags() {
        let parsed: UpdateDetectionModel = serde_json::from_str(
            r#"{"id": "abc", "fields": {"non_helmet_rider": true, "passenger_with_helmet": false}}"#,
        )
        .unwrap();

        let updates = parsed.fields.unwrap().updates();
        assert_eq!(
            updates,
            vec![
                FlagUpdate {
                    flag: DetectionFlag::NonHelmetRider,
                    value: true
                },
                FlagUpdate {
                    flag: DetectionFlag::PassengerWithHelmet,
                    value: false
                },
            ]
        );
    }

    #[test]
    fn enum_fields_accept_only_their_literals() {
        assert_eq!("Truck".parse::<VehicleType>(), Ok(VehicleType::Truck));
        assert!("truck".parse::<VehicleType>().is_err());
        assert!("Bus".parse::<VehicleType>().is_err());
        assert_eq!("Green".parse::<NumberPlateType>(), Ok(NumberPlateType::Green));
        assert_eq!(
            "Blue".parse::<NumberPlateType>().unwrap_err().to_string(),
            "Invalid number_plate_type: Blue"
        );
    }

    #[test]
    fn flag_names_round_through_columns() {
        for flag in DetectionFlag::ALL {
            assert_eq!(flag.column().parse::<DetectionFlag>(), Ok(flag));
        }
        assert!("location".parse::<DetectionFlag>().is_err());
    }

    #[test]
    fn user_response_is_camel_case_without_password() {
        let user = UserModelResponse {
            id: "1".into(),
            name: "Ada".into(),
            email: "ada@example.com".into(),
            is_admin: true,
            created_at: Utc::now(),
        };
        let value = serde_json::to_value(&user).unwrap();
        assert_eq!(value["isAdmin"], true);
        assert!(value.get("createdAt").is_some());
        assert!(value.get("password_hash").is_none());
        assert!(value.get("password").is_none());
    }
}
