use super::value_objects::OrderStatus;

/// Map a provider's free-text order status onto the canonical lifecycle.
///
/// `None` means the status is not recognized; callers must then leave the
/// order as it is.
pub fn map_provider_status(raw: &str) -> Option<OrderStatus> {
    let normalized = raw.trim().to_ascii_lowercase().replace('_', "-");

    match normalized.as_str() {
        "pending" | "on-hold" => Some(OrderStatus::Pending),
        // "processing" is a transient alias of in-production
        "sending-to-production" | "in-production" | "processing" => Some(OrderStatus::InProduction),
        "canceled" | "cancelled" => Some(OrderStatus::Cancelled),
        "fulfilled" => Some(OrderStatus::Delivered),
        "partially-fulfilled" => Some(OrderStatus::Shipped),
        "has-issues" => Some(OrderStatus::Failed),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_statuses() {
        let cases = [
            ("pending", OrderStatus::Pending),
            ("on-hold", OrderStatus::Pending),
            ("sending-to-production", OrderStatus::InProduction),
            ("in-production", OrderStatus::InProduction),
            ("canceled", OrderStatus::Cancelled),
            ("fulfilled", OrderStatus::Delivered),
            ("partially-fulfilled", OrderStatus::Shipped),
            ("has-issues", OrderStatus::Failed),
        ];

        for (raw, expected) in cases {
            assert_eq!(map_provider_status(raw), Some(expected), "{}", raw);
        }
    }

    #[test]
    fn test_normalizes_case_and_separators() {
        assert_eq!(map_provider_status(" In_Production "), Some(OrderStatus::InProduction));
        assert_eq!(map_provider_status("HAS-ISSUES"), Some(OrderStatus::Failed));
    }

    #[test]
    fn test_unknown_status_is_none() {
        assert_eq!(map_provider_status("awaiting-customs"), None);
        assert_eq!(map_provider_status(""), None);
    }
}
