use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;

// ============================================================================
// Provider Webhook Envelope
// ============================================================================
//
// {"type": "<event type>", "resource": {"id": ..., "data": {...}}}
//
// Parsed once at the boundary into `ProviderEvent`. Anything we cannot read,
// including known types with a malformed resource, becomes `Unknown` and is
// acknowledged without touching state.
//
// Money in provider payloads is integer cents of the provider currency.
//
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum ProviderEvent {
    OrderCreated { order_id: String, order: ProviderOrder },
    OrderUpdated { order_id: String, update: ProviderOrderUpdate },
    OrderSentToProduction { order_id: String },
    ShipmentCreated { order_id: String, shipment: ProviderShipment },
    ShipmentDelivered { order_id: String, shipment: ProviderShipment },
    ProductDeleted { product_id: String },
    ProductPublishStarted { product_id: String },
    Unknown {
        event_type: String,
        resource_id: Option<String>,
        reason: String,
    },
}

impl ProviderEvent {
    pub fn event_type(&self) -> &str {
        match self {
            ProviderEvent::OrderCreated { .. } => "order:created",
            ProviderEvent::OrderUpdated { .. } => "order:updated",
            ProviderEvent::OrderSentToProduction { .. } => "order:sent-to-production",
            ProviderEvent::ShipmentCreated { .. } => "shipment:created",
            ProviderEvent::ShipmentDelivered { .. } => "shipment:delivered",
            ProviderEvent::ProductDeleted { .. } => "product:deleted",
            ProviderEvent::ProductPublishStarted { .. } => "product:publish:started",
            ProviderEvent::Unknown { event_type, .. } => event_type,
        }
    }

    pub fn resource_id(&self) -> &str {
        match self {
            ProviderEvent::OrderCreated { order_id, .. }
            | ProviderEvent::OrderUpdated { order_id, .. }
            | ProviderEvent::OrderSentToProduction { order_id }
            | ProviderEvent::ShipmentCreated { order_id, .. }
            | ProviderEvent::ShipmentDelivered { order_id, .. } => order_id,
            ProviderEvent::ProductDeleted { product_id }
            | ProviderEvent::ProductPublishStarted { product_id } => product_id,
            ProviderEvent::Unknown { resource_id, .. } => resource_id.as_deref().unwrap_or(""),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ProviderAddress {
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub email: String,
    pub phone: Option<String>,
    #[serde(default)]
    pub country: String,
    pub region: Option<String>,
    #[serde(default)]
    pub address1: String,
    pub address2: Option<String>,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub zip: String,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct LineMetadata {
    pub sku: Option<String>,
    pub title: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ProviderLineItem {
    pub id: Option<String>,
    pub product_id: String,
    pub variant_id: Option<u64>,
    pub quantity: u32,
    /// Unit manufacturing cost; the catalog's cost applies when absent
    pub cost: Option<i64>,
    #[serde(default)]
    pub metadata: LineMetadata,
}

impl ProviderLineItem {
    pub fn line_id(&self) -> String {
        match (&self.id, self.variant_id) {
            (Some(id), _) => id.clone(),
            (None, Some(variant)) => format!("{}:{}", self.product_id, variant),
            (None, None) => self.product_id.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ProviderOrder {
    pub status: Option<String>,
    #[serde(default)]
    pub address_to: ProviderAddress,
    #[serde(default)]
    pub line_items: Vec<ProviderLineItem>,
    #[serde(default)]
    pub total_price: i64,
    #[serde(default)]
    pub total_shipping: i64,
    #[serde(default)]
    pub total_tax: i64,
    #[serde(default)]
    pub total_discount: i64,
    pub currency: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ProviderOrderUpdate {
    pub status: String,
    /// Cents refunded so far, when the provider reports one
    pub refunded_amount: Option<i64>,
    pub currency: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct CarrierInfo {
    pub code: Option<String>,
    pub tracking_number: Option<String>,
    pub tracking_url: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ProviderShipment {
    #[serde(default)]
    pub carrier: CarrierInfo,
    /// Lines in the parcel, by provider line id or SKU; empty means all
    #[serde(default)]
    pub line_items: Vec<String>,
    pub shipped_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
}

#[derive(Deserialize)]
struct RawEnvelope {
    #[serde(rename = "type")]
    event_type: String,
    resource: Option<RawResource>,
}

#[derive(Deserialize)]
struct RawResource {
    id: Option<Value>,
    #[serde(default)]
    data: Value,
}

/// Provider ids arrive as strings or numbers.
fn id_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn unknown(event_type: &str, resource_id: Option<String>, reason: impl Into<String>) -> ProviderEvent {
    ProviderEvent::Unknown {
        event_type: event_type.to_string(),
        resource_id,
        reason: reason.into(),
    }
}

pub fn parse(body: &[u8]) -> ProviderEvent {
    let envelope: RawEnvelope = match serde_json::from_slice(body) {
        Ok(envelope) => envelope,
        Err(e) => return unknown("unparseable", None, format!("invalid envelope: {}", e)),
    };
    let event_type = envelope.event_type.as_str();

    let Some(resource) = envelope.resource else {
        return unknown(event_type, None, "missing resource");
    };
    let Some(id) = resource.id.as_ref().and_then(id_string) else {
        return unknown(event_type, None, "missing resource id");
    };
    let data = match resource.data {
        Value::Null => Value::Object(Default::default()),
        data => data,
    };

    fn typed<T: serde::de::DeserializeOwned>(data: Value) -> Result<T, String> {
        serde_json::from_value(data).map_err(|e| e.to_string())
    }

    let parsed = match event_type {
        "order:created" => typed::<ProviderOrder>(data)
            .map(|order| ProviderEvent::OrderCreated { order_id: id.clone(), order }),
        "order:updated" => typed::<ProviderOrderUpdate>(data)
            .map(|update| ProviderEvent::OrderUpdated { order_id: id.clone(), update }),
        "order:sent-to-production" => Ok(ProviderEvent::OrderSentToProduction { order_id: id.clone() }),
        "shipment:created" => typed::<ProviderShipment>(data)
            .map(|shipment| ProviderEvent::ShipmentCreated { order_id: id.clone(), shipment }),
        "shipment:delivered" => typed::<ProviderShipment>(data)
            .map(|shipment| ProviderEvent::ShipmentDelivered { order_id: id.clone(), shipment }),
        "product:deleted" => Ok(ProviderEvent::ProductDeleted { product_id: id.clone() }),
        "product:publish:started" => Ok(ProviderEvent::ProductPublishStarted { product_id: id.clone() }),
        _ => Err("unsupported event type".to_string()),
    };

    parsed.unwrap_or_else(|reason| unknown(event_type, Some(id), reason))
}
