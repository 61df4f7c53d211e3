use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::category::TurnoverBand;
use crate::error::{require_text, WorkflowError, WorkflowResult};

/// Declares a uuid-backed identifier that is transparent on the wire.
#[macro_export]
macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash,
            serde::Serialize, serde::Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub uuid::Uuid);

        impl $name {
            pub fn new() -> Self {
                Self(uuid::Uuid::new_v4())
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                self.0.fmt(f)
            }
        }

        impl std::str::FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                uuid::Uuid::parse_str(s).map(Self)
            }
        }
    };
}

define_id!(
    /// Identity of a buyer, supplier or admin profile.
    ProfileId
);

/// Role a profile has in the marketplace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Buyer,
    Supplier,
    Admin,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Buyer => "buyer",
            Role::Supplier => "supplier",
            Role::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The authenticated caller of an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: ProfileId,
    pub role: Role,
}

impl Actor {
    pub fn new(id: ProfileId, role: Role) -> Self {
        Self { id, role }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// Fail with `Forbidden` unless the actor has `role`.
    pub fn require(&self, role: Role) -> WorkflowResult<()> {
        if self.role != role {
            return Err(WorkflowError::forbidden(format!(
                "only a {role} may perform this action"
            )));
        }
        Ok(())
    }
}

/// Identity record, one per authenticated account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub id: ProfileId,
    pub role: Role,
    pub display_name: String,
    pub email: String,
    #[serde(default)]
    pub company_name: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Profile {
    pub fn new(
        role: Role,
        display_name: &str,
        email: &str,
        company_name: Option<String>,
        phone: Option<String>,
        now: DateTime<Utc>,
    ) -> WorkflowResult<Self> {
        require_text("display_name", display_name)?;
        let email = normalize_email(email)?;
        Ok(Self {
            id: ProfileId::new(),
            role,
            display_name: display_name.trim().to_string(),
            email,
            company_name,
            phone,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn actor(&self) -> Actor {
        Actor::new(self.id, self.role)
    }
}

/// Lower-case and sanity-check an email address used as a login name.
pub fn normalize_email(email: &str) -> WorkflowResult<String> {
    let email = email.trim().to_ascii_lowercase();
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && domain.contains('.') => Ok(email),
        _ => Err(WorkflowError::validation("email", "is not a valid address")),
    }
}

/// Admin vetting state of a supplier.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationStatus {
    #[default]
    Pending,
    Verified,
    Rejected,
}

impl fmt::Display for VerificationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            VerificationStatus::Pending => "pending",
            VerificationStatus::Verified => "verified",
            VerificationStatus::Rejected => "rejected",
        })
    }
}

/// 1:1 extension of a supplier profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SupplierDetails {
    pub supplier_id: ProfileId,
    pub product_categories: BTreeSet<String>,
    #[serde(default)]
    pub certifications: BTreeSet<String>,
    pub years_in_business: u32,
    pub annual_turnover: TurnoverBand,
    #[serde(default)]
    pub verification_status: VerificationStatus,
    pub updated_at: DateTime<Utc>,
}

impl SupplierDetails {
    pub fn is_verified(&self) -> bool {
        self.verification_status == VerificationStatus::Verified
    }

    /// Category names compare case-insensitively.
    pub fn serves_category(&self, category: &str) -> bool {
        self.product_categories
            .iter()
            .any(|c| c.eq_ignore_ascii_case(category.trim()))
    }
}

/// Self-service part of [`SupplierDetails`] a supplier may submit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupplierDetailsInput {
    pub product_categories: BTreeSet<String>,
    #[serde(default)]
    pub certifications: BTreeSet<String>,
    pub years_in_business: u32,
    pub annual_turnover: TurnoverBand,
}

impl SupplierDetailsInput {
    /// Build the stored record. Any resubmission goes back to `pending` review.
    pub fn into_details(
        self,
        supplier_id: ProfileId,
        now: DateTime<Utc>,
    ) -> WorkflowResult<SupplierDetails> {
        let product_categories: BTreeSet<String> = self
            .product_categories
            .iter()
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .collect();
        if product_categories.is_empty() {
            return Err(WorkflowError::validation(
                "product_categories",
                "at least one category is required",
            ));
        }
        let certifications = self
            .certifications
            .iter()
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .collect();
        Ok(SupplierDetails {
            supplier_id,
            product_categories,
            certifications,
            years_in_business: self.years_in_business,
            annual_turnover: self.annual_turnover,
            verification_status: VerificationStatus::Pending,
            updated_at: now,
        })
    }
}
