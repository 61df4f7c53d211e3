use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::identity::{ProfileId, SupplierDetails};
use crate::rfq::{Rfq, RfqId, RfqStatus};

/// Explicit admin routing of an RFQ to a supplier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assignment {
    pub rfq_id: RfqId,
    pub supplier_id: ProfileId,
    pub assigned_by: ProfileId,
    pub assigned_at: DateTime<Utc>,
}

/// Statuses in which an open-bidding RFQ is listed to suppliers.
pub fn is_open_bidding_status(status: RfqStatus) -> bool {
    matches!(
        status,
        RfqStatus::Approved | RfqStatus::Matched | RfqStatus::Quoting
    )
}

fn category_in(category: &str, categories: &BTreeSet<String>) -> bool {
    categories
        .iter()
        .any(|c| c.eq_ignore_ascii_case(category.trim()))
}

/// RFQs open for bidding, in a listable status, whose category is one of `categories`.
pub fn open_bidding_match<'a>(
    rfqs: impl IntoIterator<Item = &'a Rfq>,
    categories: &BTreeSet<String>,
) -> Vec<&'a Rfq> {
    rfqs.into_iter()
        .filter(|rfq| {
            rfq.open_for_bidding
                && is_open_bidding_status(rfq.status)
                && category_in(&rfq.category, categories)
        })
        .collect()
}

/// Whether `supplier` may see `rfq` without an explicit assignment.
/// Unverified suppliers never qualify.
pub fn visible_through_open_bidding(rfq: &Rfq, supplier: &SupplierDetails) -> bool {
    supplier.is_verified() && !open_bidding_match([rfq], &supplier.product_categories).is_empty()
}

/// Advisory fit of a supplier for an RFQ. Never used for gating.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchScore {
    pub supplier_id: ProfileId,
    pub score: u8,
    pub reasons: Vec<String>,
}

/// Heuristic ranking input: category fit, certifications, experience, and
/// whether the RFQ's certification text names something the supplier holds.
pub fn match_score(rfq: &Rfq, supplier: &SupplierDetails) -> MatchScore {
    let mut score: u32 = 0;
    let mut reasons = Vec::new();

    if supplier.serves_category(&rfq.category) {
        score += 40;
        reasons.push(format!("serves {}", rfq.category));
    }

    let certs = supplier.certifications.len() as u32;
    if certs > 0 {
        score += (certs * 5).min(20);
        reasons.push(format!("{certs} certifications"));
    }

    if let Some(required) = &rfq.certifications_required {
        let required = required.to_ascii_lowercase();
        let named: Vec<&String> = supplier
            .certifications
            .iter()
            .filter(|c| required.contains(&c.to_ascii_lowercase()))
            .collect();
        if !named.is_empty() {
            score += 20;
            reasons.push(format!("holds requested certification {}", named[0]));
        }
    }

    let years = supplier.years_in_business.min(10);
    if years > 0 {
        score += years * 2;
        reasons.push(format!("{} years in business", supplier.years_in_business));
    }

    MatchScore {
        supplier_id: supplier.supplier_id,
        score: score.min(100) as u8,
        reasons,
    }
}

/// Score and sort verified suppliers, best first. Ties keep id order.
pub fn rank_suppliers<'a>(
    rfq: &Rfq,
    suppliers: impl IntoIterator<Item = &'a SupplierDetails>,
) -> Vec<MatchScore> {
    let mut scores: Vec<MatchScore> = suppliers
        .into_iter()
        .filter(|s| s.is_verified() && s.serves_category(&rfq.category))
        .map(|s| match_score(rfq, s))
        .collect();
    scores.sort_by(|a, b| b.score.cmp(&a.score).then(a.supplier_id.cmp(&b.supplier_id)));
    scores
}
