//! ID card layout and composition
//!
//! A template stores its layout as JSON: positioned elements for the front and
//! back of the card, in the template's design pixel space. Rendering resolves
//! every element against the employee and card data and scales it into the
//! requested output size.

use chrono::NaiveDate;
use std::fmt::Write;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::entity::id_generate::CardStatus;
use crate::error::{AppError, AppResult};

/// Largest accepted render scale
pub const MAX_SCALE: f64 = 10.0;

/// Data source of a layout element
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FieldKind {
    Name,
    EmployeeCode,
    Designation,
    Department,
    Category,
    Section,
    Phone,
    Email,
    BloodGroup,
    JoinDate,
    IssueDate,
    ExpiryDate,
    Photo,
    QrCode,
    /// Static label taken from `LayoutElement::text`
    Text,
}

impl FieldKind {
    fn render_kind(&self) -> ElementKind {
        match self {
            FieldKind::Photo => ElementKind::Image,
            FieldKind::QrCode => ElementKind::Qr,
            _ => ElementKind::Text,
        }
    }

    fn needs_box(&self) -> bool {
        matches!(self, FieldKind::Photo | FieldKind::QrCode)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementKind {
    Text,
    Image,
    Qr,
}

/// One positioned element as stored in the template
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutElement {
    pub field: FieldKind,
    pub x: f64,
    pub y: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_size: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_weight: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub align: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

/// Full template layout
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CardLayout {
    #[serde(default)]
    pub front: Vec<LayoutElement>,
    #[serde(default)]
    pub back: Vec<LayoutElement>,
}

impl CardLayout {
    /// Parse stored or submitted layout JSON
    pub fn parse(raw: &str) -> AppResult<Self> {
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_json::from_str(raw).map_err(|e| AppError::Validation(format!("invalid layout: {}", e)))
    }

    /// Check every element lies inside a `width` x `height` card
    pub fn validate(&self, width: i32, height: i32) -> AppResult<()> {
        if width <= 0 || height <= 0 {
            return Err(AppError::Validation("template width and height must be positive".to_string()));
        }
        let sides = [("front", &self.front), ("back", &self.back)];
        for (side, elements) in sides {
            for (index, element) in elements.iter().enumerate() {
                validate_element(element, width as f64, height as f64)
                    .map_err(|msg| AppError::Validation(format!("layout.{}[{}]: {}", side, index, msg)))?;
            }
        }
        Ok(())
    }

    pub fn to_json(&self) -> AppResult<String> {
        Ok(serde_json::to_string(self)?)
    }
}

fn validate_element(element: &LayoutElement, width: f64, height: f64) -> Result<(), String> {
    if !element.x.is_finite() || !element.y.is_finite() || element.x < 0.0 || element.y < 0.0 {
        return Err("coordinates must be non-negative".to_string());
    }
    if element.x >= width || element.y >= height {
        return Err("element starts outside the card".to_string());
    }
    for (name, value) in [("width", element.width), ("height", element.height), ("fontSize", element.font_size)] {
        if let Some(v) = value {
            if !v.is_finite() || v <= 0.0 {
                return Err(format!("{} must be positive", name));
            }
        }
    }
    if element.field.needs_box() && (element.width.is_none() || element.height.is_none()) {
        return Err("photo and qrCode elements need width and height".to_string());
    }
    if element.field == FieldKind::Text && element.text.as_deref().map_or(true, |t| t.trim().is_empty()) {
        return Err("text elements need a text value".to_string());
    }
    Ok(())
}

/// Employee and card values an element can resolve to
#[derive(Clone, Debug, Default)]
pub struct CardData {
    pub name: String,
    pub employee_code: String,
    pub designation: Option<String>,
    pub department: Option<String>,
    pub category: Option<String>,
    pub section: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub blood_group: Option<String>,
    pub join_date: Option<NaiveDate>,
    pub issue_date: NaiveDate,
    pub expiry_date: NaiveDate,
    pub photo_url: Option<String>,
    pub qr_payload: String,
}

impl CardData {
    fn resolve(&self, element: &LayoutElement, date_format: &str) -> Option<String> {
        // A format chrono rejects renders as ISO instead of panicking
        let fmt = |d: NaiveDate| {
            let mut out = String::new();
            match write!(out, "{}", d.format(date_format)) {
                Ok(()) => out,
                Err(_) => d.to_string(),
            }
        };
        match element.field {
            FieldKind::Name => Some(self.name.clone()),
            FieldKind::EmployeeCode => Some(self.employee_code.clone()),
            FieldKind::Designation => self.designation.clone(),
            FieldKind::Department => self.department.clone(),
            FieldKind::Category => self.category.clone(),
            FieldKind::Section => self.section.clone(),
            FieldKind::Phone => self.phone.clone(),
            FieldKind::Email => self.email.clone(),
            FieldKind::BloodGroup => self.blood_group.clone(),
            FieldKind::JoinDate => self.join_date.map(fmt),
            FieldKind::IssueDate => Some(fmt(self.issue_date)),
            FieldKind::ExpiryDate => Some(fmt(self.expiry_date)),
            FieldKind::Photo => self.photo_url.clone(),
            FieldKind::QrCode => Some(self.qr_payload.clone()),
            FieldKind::Text => element.text.clone(),
        }
    }
}

/// An element ready to draw, in output pixels
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderedElement {
    pub field: FieldKind,
    pub kind: ElementKind,
    pub value: String,
    pub x: f64,
    pub y: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub font_size: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub font_weight: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub align: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderedSide {
    pub background: Option<String>,
    pub elements: Vec<RenderedElement>,
}

/// Composed card, both sides
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CardDocument {
    pub width: f64,
    pub height: f64,
    pub scale: f64,
    pub front: RenderedSide,
    pub back: RenderedSide,
}

/// Template geometry and backgrounds used by `compose`
#[derive(Clone, Debug)]
pub struct TemplateFrame {
    pub width: i32,
    pub height: i32,
    pub front_background: Option<String>,
    pub back_background: Option<String>,
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

/// Scale one element and keep its box inside the card
fn place(element: &LayoutElement, value: String, card_w: f64, card_h: f64, scale: f64) -> RenderedElement {
    let width = element.width.map(|w| (w * scale).min(card_w));
    let height = element.height.map(|h| (h * scale).min(card_h));
    let x = (element.x * scale).min(card_w - width.unwrap_or(0.0)).max(0.0);
    let y = (element.y * scale).min(card_h - height.unwrap_or(0.0)).max(0.0);

    RenderedElement {
        field: element.field,
        kind: element.field.render_kind(),
        value,
        x: round2(x),
        y: round2(y),
        width: width.map(round2),
        height: height.map(round2),
        font_size: element.font_size.map(|f| round2(f * scale)),
        font_weight: element.font_weight.clone(),
        color: element.color.clone(),
        align: element.align.clone(),
    }
}

/// Compose the card document; elements without a value are left out
pub fn compose(
    layout: &CardLayout,
    frame: &TemplateFrame,
    data: &CardData,
    scale: f64,
    date_format: &str,
) -> AppResult<CardDocument> {
    if !scale.is_finite() || scale <= 0.0 || scale > MAX_SCALE {
        return Err(AppError::Validation(format!("scale must be in (0, {}]", MAX_SCALE)));
    }

    let card_w = frame.width as f64 * scale;
    let card_h = frame.height as f64 * scale;

    let render_side = |elements: &[LayoutElement], background: &Option<String>| RenderedSide {
        background: background.clone(),
        elements: elements
            .iter()
            .filter_map(|e| {
                data.resolve(e, date_format)
                    .filter(|v| !v.is_empty())
                    .map(|v| place(e, v, card_w, card_h, scale))
            })
            .collect(),
    };

    Ok(CardDocument {
        width: round2(card_w),
        height: round2(card_h),
        scale,
        front: render_side(&layout.front, &frame.front_background),
        back: render_side(&layout.back, &frame.back_background),
    })
}

/// New opaque QR token: 32 hex chars of SHA-256 over a random UUID and the staff code
pub fn qr_token(employee_code: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(uuid::Uuid::new_v4().as_bytes());
    hasher.update(employee_code.as_bytes());
    let digest = hex::encode(hasher.finalize());
    digest[..32].to_string()
}

/// URL encoded into the printed QR code
pub fn qr_payload(public_url: &str, token: &str) -> String {
    format!("{}/api/verify/{}", public_url.trim_end_matches('/'), token)
}

/// Why a scanned card is not valid
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InvalidReason {
    Cancelled,
    Expired,
    EmployeeInactive,
}

/// Validity of a card on `today`; None means valid
pub fn assess(
    status: CardStatus,
    expiry_date: NaiveDate,
    employee_active: bool,
    today: NaiveDate,
) -> Option<InvalidReason> {
    if status == CardStatus::Cancelled {
        Some(InvalidReason::Cancelled)
    } else if expiry_date < today {
        Some(InvalidReason::Expired)
    } else if !employee_active {
        Some(InvalidReason::EmployeeInactive)
    } else {
        None
    }
}

/// Expiry used when a card is generated without one
pub fn default_expiry(issue_date: NaiveDate, validity_days: i64) -> AppResult<NaiveDate> {
    issue_date
        .checked_add_signed(chrono::Duration::days(validity_days))
        .ok_or_else(|| AppError::Validation("expiry date out of range".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn sample_layout() -> CardLayout {
        CardLayout::parse(
            r#"{
                "front": [
                    {"field": "name", "x": 20, "y": 150, "fontSize": 14, "fontWeight": "bold"},
                    {"field": "photo", "x": 80, "y": 30, "width": 90, "height": 110},
                    {"field": "phone", "x": 20, "y": 200}
                ],
                "back": [
                    {"field": "qrCode", "x": 230, "y": 300, "width": 100, "height": 100},
                    {"field": "text", "x": 10, "y": 10, "text": "If found, return to HR"},
                    {"field": "expiryDate", "x": 10, "y": 40}
                ]
            }"#,
        )
        .unwrap()
    }

    fn sample_data() -> CardData {
        CardData {
            name: "Rina Das".to_string(),
            employee_code: "E-1001".to_string(),
            issue_date: date(2026, 1, 15),
            expiry_date: date(2027, 1, 15),
            photo_url: Some("/uploads/photos/p.jpg".to_string()),
            qr_payload: "http://cards.local/api/verify/abc".to_string(),
            ..Default::default()
        }
    }

    fn frame() -> TemplateFrame {
        TemplateFrame {
            width: 320,
            height: 400,
            front_background: Some("/uploads/templates/front.png".to_string()),
            back_background: None,
        }
    }

    #[test]
    fn test_layout_validate_ok() {
        sample_layout().validate(320, 400).unwrap();
    }

    #[test]
    fn test_layout_rejects_unknown_field() {
        let err = CardLayout::parse(r#"{"front":[{"field":"salary","x":1,"y":1}]}"#).unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn test_layout_rejects_out_of_bounds() {
        let layout = CardLayout::parse(r#"{"front":[{"field":"name","x":400,"y":1}]}"#).unwrap();
        assert!(layout.validate(320, 400).is_err());

        let layout = CardLayout::parse(r#"{"back":[{"field":"name","x":-1,"y":1}]}"#).unwrap();
        assert!(layout.validate(320, 400).is_err());
    }

    #[test]
    fn test_layout_requires_box_for_images() {
        let layout = CardLayout::parse(r#"{"front":[{"field":"qrCode","x":1,"y":1,"width":50}]}"#).unwrap();
        let err = layout.validate(320, 400).unwrap_err();
        assert!(err.to_string().contains("layout.front[0]"));
    }

    #[test]
    fn test_layout_requires_text_for_labels() {
        let layout = CardLayout::parse(r#"{"front":[{"field":"text","x":1,"y":1}]}"#).unwrap();
        assert!(layout.validate(320, 400).is_err());
    }

    #[test]
    fn test_empty_layout() {
        assert_eq!(CardLayout::parse("  ").unwrap(), CardLayout::default());
    }

    #[test]
    fn test_compose_scales_and_skips_missing() {
        let doc = compose(&sample_layout(), &frame(), &sample_data(), 2.0, "%d-%m-%Y").unwrap();
        assert_eq!(doc.width, 640.0);
        assert_eq!(doc.height, 800.0);

        // phone is None so only name and photo remain on the front
        assert_eq!(doc.front.elements.len(), 2);
        let name = &doc.front.elements[0];
        assert_eq!(name.value, "Rina Das");
        assert_eq!((name.x, name.y), (40.0, 300.0));
        assert_eq!(name.font_size, Some(28.0));

        let photo = &doc.front.elements[1];
        assert_eq!(photo.kind, ElementKind::Image);
        assert_eq!(photo.width, Some(180.0));
        assert_eq!(doc.front.background.as_deref(), Some("/uploads/templates/front.png"));

        let expiry = doc.back.elements.iter().find(|e| e.field == FieldKind::ExpiryDate).unwrap();
        assert_eq!(expiry.value, "15-01-2027");
    }

    #[test]
    fn test_compose_survives_bad_date_format() {
        let doc = compose(&sample_layout(), &frame(), &sample_data(), 1.0, "%d %").unwrap();
        let expiry = doc.back.elements.iter().find(|e| e.field == FieldKind::ExpiryDate).unwrap();
        assert_eq!(expiry.value, "2027-01-15");
    }

    #[test]
    fn test_compose_clamps_box_inside_card() {
        let doc = compose(&sample_layout(), &frame(), &sample_data(), 1.0, "%Y-%m-%d").unwrap();
        let qr = doc.back.elements.iter().find(|e| e.kind == ElementKind::Qr).unwrap();
        // 230 + 100 would overflow a 320 wide card
        assert_eq!(qr.x, 220.0);
        assert_eq!(qr.y, 300.0);
        assert_eq!(qr.value, "http://cards.local/api/verify/abc");
    }

    #[test]
    fn test_compose_rejects_bad_scale() {
        assert!(compose(&sample_layout(), &frame(), &sample_data(), 0.0, "%Y").is_err());
        assert!(compose(&sample_layout(), &frame(), &sample_data(), 11.0, "%Y").is_err());
    }

    #[test]
    fn test_qr_token_shape() {
        let a = qr_token("E-1");
        let b = qr_token("E-1");
        assert_eq!(a.len(), 32);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, b);
        assert_eq!(
            qr_payload("https://cards.example.com/", "abc"),
            "https://cards.example.com/api/verify/abc"
        );
    }

    #[test]
    fn test_assess() {
        let today = date(2026, 6, 1);
        assert_eq!(assess(CardStatus::Printed, date(2026, 6, 1), true, today), None);
        assert_eq!(
            assess(CardStatus::Printed, date(2026, 5, 31), true, today),
            Some(InvalidReason::Expired)
        );
        assert_eq!(
            assess(CardStatus::Created, date(2027, 1, 1), false, today),
            Some(InvalidReason::EmployeeInactive)
        );
        assert_eq!(
            assess(CardStatus::Cancelled, date(2020, 1, 1), false, today),
            Some(InvalidReason::Cancelled)
        );
    }

    #[test]
    fn test_default_expiry() {
        assert_eq!(default_expiry(date(2026, 1, 1), 365).unwrap(), date(2027, 1, 1));
    }
}
