use storefront_api::entity::enums::{OrderStatus, PaymentStatus};

#[tokio::test]
async fn order_transitions_follow_the_fulfilment_path() {
    use OrderStatus::*;

    assert!(Processing.can_transition_to(Shipped));
    assert!(Processing.can_transition_to(Cancelled));
    assert!(Shipped.can_transition_to(Completed));

    assert!(!Processing.can_transition_to(Completed));
    assert!(!Shipped.can_transition_to(Cancelled));
    assert!(!Shipped.can_transition_to(Processing));
    assert!(!Completed.can_transition_to(Cancelled));
    assert!(!Cancelled.can_transition_to(Processing));

    for status in [Processing, Shipped, Completed, Cancelled] {
        assert!(status.can_transition_to(status), "{status} -> {status}");
    }
}

#[tokio::test]
async fn order_status_parses_case_insensitively() {
    assert_eq!("shipped".parse::<OrderStatus>(), Ok(OrderStatus::Shipped));
    assert_eq!(" CANCELLED ".parse::<OrderStatus>(), Ok(OrderStatus::Cancelled));
    assert!("LOST".parse::<OrderStatus>().is_err());
    assert_eq!(OrderStatus::Completed.to_string(), "COMPLETED");
}

#[tokio::test]
async fn paid_and_failed_are_terminal() {
    assert!(!PaymentStatus::Pending.is_terminal());
    assert!(PaymentStatus::Paid.is_terminal());
    assert!(PaymentStatus::Failed.is_terminal());

    assert!(PaymentStatus::Pending.can_transition_to(PaymentStatus::Paid));
    assert!(PaymentStatus::Pending.can_transition_to(PaymentStatus::Failed));
    assert!(!PaymentStatus::Paid.can_transition_to(PaymentStatus::Pending));
    assert!(!PaymentStatus::Failed.can_transition_to(PaymentStatus::Paid));
}

#[tokio::test]
async fn statuses_serialize_in_screaming_case() {
    assert_eq!(
        serde_json::to_value(OrderStatus::Processing).expect("json"),
        "PROCESSING"
    );
    assert_eq!(
        serde_json::to_value(PaymentStatus::Pending).expect("json"),
        "PENDING"
    );
}
