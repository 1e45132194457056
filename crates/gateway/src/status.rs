//! Classification of raw provider delivery-status strings.
//!
//! The provider reports free-form status strings; the reconciler only acts on
//! the classes below. Anything outside the known vocabulary is flagged as
//! unrecognized rather than guessed at.

/// What a provider-reported status string means for the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// Accepted but not yet resolved.
    InFlight,
    /// Delivered to the recipient.
    Delivered,
    /// The provider has given up permanently.
    PermanentFailure,
    /// Transient provider-side failure, eligible for retry.
    TemporaryFailure,
    /// A status string this system does not know.
    Unrecognized,
}

/// Map a raw provider status string to its delivery outcome.
pub fn classify(status: &str) -> DeliveryOutcome {
    match status {
        "created" | "sending" | "pending" => DeliveryOutcome::InFlight,
        "sent" | "delivered" => DeliveryOutcome::Delivered,
        "permanent-failure" => DeliveryOutcome::PermanentFailure,
        "temporary-failure" | "technical-failure" => DeliveryOutcome::TemporaryFailure,
        _ => DeliveryOutcome::Unrecognized,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_flight_statuses() {
        assert_eq!(classify("created"), DeliveryOutcome::InFlight);
        assert_eq!(classify("sending"), DeliveryOutcome::InFlight);
        assert_eq!(classify("pending"), DeliveryOutcome::InFlight);
    }

    #[test]
    fn test_delivered_statuses() {
        assert_eq!(classify("sent"), DeliveryOutcome::Delivered);
        assert_eq!(classify("delivered"), DeliveryOutcome::Delivered);
    }

    #[test]
    fn test_failure_statuses() {
        assert_eq!(classify("permanent-failure"), DeliveryOutcome::PermanentFailure);
        assert_eq!(classify("temporary-failure"), DeliveryOutcome::TemporaryFailure);
        assert_eq!(classify("technical-failure"), DeliveryOutcome::TemporaryFailure);
    }

    #[test]
    fn test_unknown_status_is_unrecognized() {
        assert_eq!(classify("accepted"), DeliveryOutcome::Unrecognized);
        assert_eq!(classify(""), DeliveryOutcome::Unrecognized);
        // Case matters; the provider vocabulary is lowercase.
        assert_eq!(classify("Delivered"), DeliveryOutcome::Unrecognized);
    }
}
