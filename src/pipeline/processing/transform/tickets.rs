use super::fields::{first_bool, first_str, parse_price};
use crate::constants::DEFAULT_TICKET_NAME;
use crate::domain::TicketType;
use serde_json::Value;

const NAME_KEYS: &[&str] = &["tipo", "name", "nombre"];
const DESCRIPTION_KEYS: &[&str] = &["descripcion", "description"];
const PRICE_KEYS: &[&str] = &["precio", "price"];
const SOLD_OUT_KEYS: &[&str] = &["agotadas", "agotado", "soldOut", "isSoldOut", "sold_out"];
const AVAILABLE_KEYS: &[&str] = &["disponible", "isAvailable", "available"];
const FEW_LEFT_KEYS: &[&str] = &["quedan_pocas", "fewLeft", "areFewLeft", "few_left"];
const PROMOTION_KEYS: &[&str] = &["isPromotion", "promocion", "esPromocion"];
const VIP_KEYS: &[&str] = &["isVip", "vip", "esVip"];
const RESTRICTION_KEYS: &[&str] = &["restricciones", "restrictions", "condiciones"];
const PURCHASE_URL_KEYS: &[&str] = &["url_compra", "purchaseUrl", "purchase_url", "url"];
const KIND_KEYS: &[&str] = &["tipo_entrada", "type"];
const STATUS_KEYS: &[&str] = &["status", "estado"];

/// Build one ticket type from its raw sub-record. `fallback_url` is used when
/// the ticket carries no purchase link of its own.
pub fn build_ticket(raw: &Value, party_id: &str, index: usize, fallback_url: &str) -> TicketType {
    let name = first_str(raw, NAME_KEYS).unwrap_or_else(|| DEFAULT_TICKET_NAME.to_string());
    let status = first_str(raw, STATUS_KEYS)
        .map(|s| s.to_lowercase())
        .unwrap_or_default();
    let kind = first_str(raw, KIND_KEYS)
        .map(|s| s.to_lowercase())
        .unwrap_or_default();
    let name_upper = name.to_uppercase();

    let is_sold_out = first_bool(raw, SOLD_OUT_KEYS).unwrap_or(false)
        || matches!(status.as_str(), "soldout" | "sold_out" | "agotado" | "agotadas");
    let is_available = first_bool(raw, AVAILABLE_KEYS).unwrap_or(!is_sold_out);
    let few_left = first_bool(raw, FEW_LEFT_KEYS).unwrap_or(false)
        || matches!(status.as_str(), "fewleft" | "few_left" | "quedan pocas");
    let is_promotion = first_bool(raw, PROMOTION_KEYS)
        .unwrap_or_else(|| kind.contains("promo") || name_upper.contains("PROMOCI"));
    let is_vip = first_bool(raw, VIP_KEYS)
        .unwrap_or_else(|| kind.contains("vip") || name_upper.contains("VIP"));

    TicketType {
        id: first_str(raw, &["id"]).unwrap_or_else(|| format!("{party_id}_ticket_{}", index + 1)),
        name,
        description: first_str(raw, DESCRIPTION_KEYS).unwrap_or_default(),
        price: parse_price(PRICE_KEYS.iter().find_map(|k| raw.get(*k))),
        is_available,
        is_sold_out,
        few_left,
        is_promotion,
        is_vip,
        restrictions: first_str(raw, RESTRICTION_KEYS).unwrap_or_default(),
        purchase_url: first_str(raw, PURCHASE_URL_KEYS).unwrap_or_else(|| fallback_url.to_string()),
    }
}
