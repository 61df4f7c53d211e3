use reqwest::{Method, StatusCode};
use serde_json::{json, Value};

use rfqhub_common::alert::{Alert, AlertKind};
use rfqhub_common::insight::{InsightShape, QuotationAnalysis, RfqSummary};
use rfqhub_common::order::Order;
use rfqhub_common::quotation::{Quotation, QuotationStatus};
use rfqhub_common::rfq::{NewRfq, Rfq, RfqStatus};
use rfqhub_common::sample::{SampleRequest, SampleStatus};
use rfqhub_integration::harness::{offer, tshirt_rfq, TestHarness};
use rfqhub_integration::Session;

/// Submit `rfq` as `buyer`, approve it, and assign it to `supplier`.
async fn matched(h: &TestHarness, buyer: &Session, supplier: &Session, rfq: NewRfq) -> Rfq {
    let rfq: Rfq = buyer.post("/rfqs", &rfq).await;
    let _: Rfq = h
        .admin
        .post(&format!("/admin/rfqs/{}/approve", rfq.id), &json!({}))
        .await;
    h.admin
        .post(
            &format!("/admin/rfqs/{}/assign", rfq.id),
            &json!({ "supplier_ids": [supplier.profile.id] }),
        )
        .await
}

/// Quote on `rfq` as `supplier` and have the admin release it to the buyer.
async fn released_quote(h: &TestHarness, supplier: &Session, rfq: &Rfq, price: u64) -> Quotation {
    let q: Quotation = supplier
        .post(&format!("/rfqs/{}/quotations", rfq.id), &offer(price, 1000))
        .await;
    h.admin
        .post(&format!("/admin/quotations/{}/approve", q.id), &json!({}))
        .await
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn cotton_tshirts_from_rfq_to_order() {
    let h = TestHarness::setup().await;

    let rfq: Rfq = h.alice.post("/rfqs", &tshirt_rfq()).await;
    assert_eq!(rfq.status, RfqStatus::PendingApproval);

    let rfq: Rfq = h
        .admin
        .post(&format!("/admin/rfqs/{}/approve", rfq.id), &json!({}))
        .await;
    assert_eq!(rfq.status, RfqStatus::Approved);

    let rfq: Rfq = h
        .admin
        .post(
            &format!("/admin/rfqs/{}/assign", rfq.id),
            &json!({ "supplier_ids": [h.gary.profile.id] }),
        )
        .await;
    assert_eq!(rfq.status, RfqStatus::Matched);

    let q: Quotation = h
        .gary
        .post(&format!("/rfqs/{}/quotations", rfq.id), &offer(320, 1000))
        .await;
    assert_eq!(q.status, QuotationStatus::PendingAdminReview);
    let rfq_now: Rfq = h.alice.get(&format!("/rfqs/{}", rfq.id)).await;
    assert_eq!(rfq_now.status, RfqStatus::Quoting);

    // Not released yet.
    let visible: Vec<Quotation> = h.alice.get(&format!("/rfqs/{}/quotations", rfq.id)).await;
    assert!(visible.is_empty());

    let q: Quotation = h
        .admin
        .post(&format!("/admin/quotations/{}/approve", q.id), &json!({}))
        .await;
    assert_eq!(q.status, QuotationStatus::ApprovedForBuyer);
    let visible: Vec<Quotation> = h.alice.get(&format!("/rfqs/{}/quotations", rfq.id)).await;
    assert_eq!(visible.len(), 1);

    let order: Order = h
        .alice
        .post(&format!("/quotations/{}/accept", q.id), &json!({}))
        .await;
    assert_eq!(order.quantity, 1000);
    assert_eq!(order.total_value_cents, 320_000);

    let rfq_now: Rfq = h.alice.get(&format!("/rfqs/{}", rfq.id)).await;
    assert_eq!(rfq_now.status, RfqStatus::Closed);
    let orders: Vec<Order> = h.gary.get("/orders").await;
    assert_eq!(orders.len(), 1);
    assert_eq!(orders[0].id, order.id);

    let alerts: Vec<Alert> = h.admin.get("/admin/alerts?unread_only=true").await;
    assert!(alerts
        .iter()
        .any(|a| matches!(a.kind, AlertKind::QuoteAccepted { order_id, .. } if order_id == order.id)));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn open_bidding_follows_supplier_categories() {
    let h = TestHarness::setup().await;

    let mut pepper = tshirt_rfq();
    pepper.title = "Black pepper".into();
    pepper.category = "Spices".into();
    pepper.unit = "kg".into();
    pepper.open_for_bidding = true;
    let mut chips = tshirt_rfq();
    chips.title = "Microcontrollers".into();
    chips.category = "Electronics".into();
    chips.open_for_bidding = true;

    for rfq in [pepper, chips] {
        let rfq: Rfq = h.alice.post("/rfqs", &rfq).await;
        let _: Rfq = h
            .admin
            .post(&format!("/admin/rfqs/{}/approve", rfq.id), &json!({}))
            .await;
    }

    let open: Vec<Rfq> = h.emma.get("/rfqs/open").await;
    assert_eq!(open.len(), 1);
    assert_eq!(open[0].category, "Spices");
    assert!(open[0].open_for_bidding);

    let none: Vec<Rfq> = h.gary.get("/rfqs/open").await;
    assert!(none.is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn sample_request_through_delivery() {
    let h = TestHarness::setup().await;
    let rfq = matched(&h, &h.alice, &h.gary, tshirt_rfq()).await;
    let q = released_quote(&h, &h.gary, &rfq, 320).await;

    let sample: SampleRequest = h
        .alice
        .post(
            &format!("/quotations/{}/samples", q.id),
            &json!({ "quantity": 3, "notes": "sizes S, M, L" }),
        )
        .await;
    assert_eq!(sample.status, SampleStatus::PendingAdminReview);
    assert_eq!(sample.rfq_id, rfq.id);

    // Suppliers cannot ship before the admin approves.
    h.gary
        .refused(
            Method::POST,
            &format!("/samples/{}/ship", sample.id),
            Some(&json!({ "courier_service": "DHL", "tracking_number": "JD014600006281" })),
            StatusCode::CONFLICT,
        )
        .await;

    let sample: SampleRequest = h
        .admin
        .post(&format!("/admin/samples/{}/approve", sample.id), &json!({}))
        .await;
    assert_eq!(sample.status, SampleStatus::ApprovedByAdmin);

    let sample: SampleRequest = h
        .gary
        .post(
            &format!("/samples/{}/ship", sample.id),
            &json!({ "courier_service": "DHL", "tracking_number": "JD014600006281" }),
        )
        .await;
    assert_eq!(sample.status, SampleStatus::ShippedBySupplier);
    assert_eq!(
        sample.shipment.as_ref().map(|s| s.tracking_number.as_str()),
        Some("JD014600006281")
    );

    let sample: SampleRequest = h
        .admin
        .post(&format!("/admin/samples/{}/deliver", sample.id), &json!({}))
        .await;
    assert_eq!(sample.status, SampleStatus::DeliveredToBuyer);
    assert!(sample.delivered_at.is_some());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn buyers_only_see_their_own_requests() {
    let h = TestHarness::setup().await;
    let rfq: Rfq = h.alice.post("/rfqs", &tshirt_rfq()).await;

    let body = h
        .bob
        .refused(
            Method::GET,
            &format!("/rfqs/{}", rfq.id),
            None::<&()>,
            StatusCode::NOT_FOUND,
        )
        .await;
    assert!(body["error"].as_str().is_some());

    let bobs: Vec<Rfq> = h.bob.get("/rfqs").await;
    assert!(bobs.is_empty());
    let alices: Vec<Rfq> = h.alice.get("/rfqs").await;
    assert_eq!(alices.len(), 1);

    // Suppliers see nothing until assigned.
    h.gary
        .refused(
            Method::GET,
            &format!("/rfqs/{}", rfq.id),
            None::<&()>,
            StatusCode::NOT_FOUND,
        )
        .await;

    // Buyers cannot moderate.
    h.alice
        .refused(
            Method::POST,
            &format!("/admin/rfqs/{}/approve", rfq.id),
            Some(&json!({})),
            StatusCode::FORBIDDEN,
        )
        .await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn second_acceptance_is_refused_and_siblings_superseded() {
    let h = TestHarness::setup().await;
    let rfq: Rfq = h.alice.post("/rfqs", &tshirt_rfq()).await;
    let _: Rfq = h
        .admin
        .post(&format!("/admin/rfqs/{}/approve", rfq.id), &json!({}))
        .await;
    let second = h.pending_supplier("Sam", "Apparel").await;
    let _: Value = h
        .admin
        .post(
            &format!("/admin/suppliers/{}/verify", second.id()),
            &json!({ "verified": true }),
        )
        .await;
    let rfq: Rfq = h
        .admin
        .post(
            &format!("/admin/rfqs/{}/assign", rfq.id),
            &json!({ "supplier_ids": [h.gary.profile.id, second.profile.id] }),
        )
        .await;

    let cheap = released_quote(&h, &h.gary, &rfq, 310).await;
    let dear = released_quote(&h, &second, &rfq, 340).await;

    let _: Order = h
        .alice
        .post(&format!("/quotations/{}/accept", cheap.id), &json!({}))
        .await;
    let body = h
        .alice
        .refused(
            Method::POST,
            &format!("/quotations/{}/accept", dear.id),
            Some(&json!({})),
            StatusCode::CONFLICT,
        )
        .await;
    assert!(body["error"].as_str().is_some());

    let quotes: Vec<Quotation> = h
        .admin
        .get(&format!("/quotations?rfq_id={}", rfq.id))
        .await;
    let status_of = |id| quotes.iter().find(|q| q.id == id).map(|q| q.status);
    assert_eq!(status_of(cheap.id), Some(QuotationStatus::Accepted));
    assert_eq!(status_of(dear.id), Some(QuotationStatus::Superseded));

    let orders: Vec<Order> = h.alice.get("/orders").await;
    assert_eq!(orders.len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn unverified_supplier_cannot_be_assigned() {
    let h = TestHarness::setup().await;
    let pending = h.pending_supplier("Pat", "Apparel").await;
    let rfq: Rfq = h.alice.post("/rfqs", &tshirt_rfq()).await;
    let _: Rfq = h
        .admin
        .post(&format!("/admin/rfqs/{}/approve", rfq.id), &json!({}))
        .await;

    let body = h
        .admin
        .refused(
            Method::POST,
            &format!("/admin/rfqs/{}/assign", rfq.id),
            Some(&json!({ "supplier_ids": [h.gary.profile.id, pending.profile.id] })),
            StatusCode::UNPROCESSABLE_ENTITY,
        )
        .await;
    assert_eq!(body["field"], "supplier_ids");

    // Nothing was written: the RFQ is still approved and gary has no access.
    let rfq_now: Rfq = h.admin.get(&format!("/rfqs/{}", rfq.id)).await;
    assert_eq!(rfq_now.status, RfqStatus::Approved);
    h.gary
        .refused(
            Method::GET,
            &format!("/rfqs/{}", rfq.id),
            None::<&()>,
            StatusCode::NOT_FOUND,
        )
        .await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn unreachable_model_falls_back_without_failing_writes() {
    let h = TestHarness::setup().await;
    let rfq = matched(&h, &h.alice, &h.gary, tshirt_rfq()).await;
    assert_eq!(rfq.insight, Some(RfqSummary::fallback()));

    let q: Quotation = h
        .gary
        .post(&format!("/rfqs/{}/quotations", rfq.id), &offer(320, 1000))
        .await;
    assert_eq!(q.insight, Some(QuotationAnalysis::fallback()));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn uploads_live_under_the_uploaders_id() {
    let h = TestHarness::setup().await;
    let own = format!("/files/certificates/{}/iso9001.pdf", h.gary.id());
    let (status, body) = h.gary.send(Method::PUT, &own, Some(&json!("pdf"))).await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert!(body["url"].as_str().is_some_and(|u| u.ends_with("iso9001.pdf")));

    let other = format!("/files/certificates/{}/iso9001.pdf", h.emma.id());
    h.gary
        .refused(Method::PUT, &other, Some(&json!("pdf")), StatusCode::FORBIDDEN)
        .await;

    let removed: Value = h.gary.ok(Method::DELETE, &own, None::<&()>).await;
    assert_eq!(removed["removed"], true);
}
