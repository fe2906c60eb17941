use crate::model::{DetectionModel, DetectionSummary, UserModel, UserModelResponse};

pub fn filter_db_record(record: &UserModel) -> UserModelResponse {
    UserModelResponse {
        id: record.id.clone(),
        name: record.name.clone(),
        email: record.email.clone(),
        is_admin: record.is_admin,
        created_at: record.created_at,
    }
}

pub fn filter_detection_record(record: &DetectionModel) -> DetectionSummary {
    DetectionSummary {
        id: record.id.clone(),
        user_id: record.user_id.clone(),
        vehicle_number: record.vehicle_number.clone(),
        vehicle_type: record.vehicle_type,
        helmet_detected: record.helmet_detected,
        helmet_detected_image_path: record.helmet_detected_image_path.clone(),
        non_helmet_rider: record.non_helmet_rider,
        non_helmet_rider_image_path: record.non_helmet_rider_image_path.clone(),
        passenger_with_helmet: record.passenger_with_helmet,
        passenger_with_helmet_image_path: record.passenger_with_helmet_image_path.clone(),
        image_path: record.image_path.clone(),
    }
}

/// Escapes user-entered text before it is spliced into a page.
pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
