use chrono::Utc;
use serde::{Deserialize, Serialize};

use rfqhub_common::category::{Category, CategoryId, OnboardingRequirements};
use rfqhub_common::error::{WorkflowError, WorkflowResult};
use rfqhub_common::identity::{
    normalize_email, Actor, Profile, ProfileId, Role, SupplierDetails, SupplierDetailsInput,
    VerificationStatus,
};
use rfqhub_common::policy::{Field, Guarded, PolicyContext};

use super::Engine;
use crate::auth::{hash_password, verify_password};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignUp {
    pub role: Role,
    pub display_name: String,
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub company_name: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
}

/// Admin input for creating or replacing a category.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryInput {
    #[serde(default)]
    pub id: Option<CategoryId>,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub requirements: OnboardingRequirements,
}

impl Engine {
    // ─── Profiles ────────────────────────────────────────────────────────────

    /// Self-service registration. Admin profiles only come from bootstrap.
    pub async fn sign_up(&self, input: SignUp) -> WorkflowResult<Profile> {
        if input.role == Role::Admin {
            return Err(WorkflowError::forbidden(
                "admin accounts cannot be created by signup",
            ));
        }
        let profile = Profile::new(
            input.role,
            &input.display_name,
            &input.email,
            input.company_name,
            input.phone,
            Utc::now(),
        )?;
        let credential = hash_password(&input.password)?;
        self.store.insert_profile(&profile, &credential).await?;
        tracing::info!(profile_id = %profile.id, role = %profile.role, "profile created");
        Ok(profile)
    }

    /// Unknown email and wrong password are indistinguishable.
    pub async fn log_in(&self, email: &str, password: &str) -> WorkflowResult<Profile> {
        let email = normalize_email(email).map_err(|_| WorkflowError::Unauthenticated)?;
        match self.store.find_login(&email).await? {
            Some((profile, credential)) if verify_password(&credential, password) => Ok(profile),
            _ => {
                tracing::debug!(email, "login rejected");
                Err(WorkflowError::Unauthenticated)
            }
        }
    }

    /// Create the configured admin unless a profile with that email exists.
    pub async fn bootstrap_admin(&self, email: &str, password: &str) -> WorkflowResult<Profile> {
        let normalized = normalize_email(email)?;
        if let Some((existing, _)) = self.store.find_login(&normalized).await? {
            if existing.role != Role::Admin {
                return Err(WorkflowError::validation(
                    "admin_email",
                    format!("{normalized} is already registered as a {}", existing.role),
                ));
            }
            tracing::debug!(profile_id = %existing.id, "admin profile already present");
            return Ok(existing);
        }
        let profile = Profile::new(Role::Admin, "Administrator", &normalized, None, None, Utc::now())?;
        let credential = hash_password(password)?;
        self.store.insert_profile(&profile, &credential).await?;
        tracing::info!(profile_id = %profile.id, email = %profile.email, "bootstrapped admin profile");
        Ok(profile)
    }

    pub async fn profile(&self, actor: &Actor, id: ProfileId) -> WorkflowResult<Profile> {
        let profile = self
            .store
            .get_profile(id)
            .await?
            .filter(|p| p.can_view(actor, &PolicyContext::default()))
            .ok_or_else(|| WorkflowError::not_found("profile", id))?;
        Ok(profile)
    }

    // ─── Supplier details ────────────────────────────────────────────────────

    /// Create or replace the acting supplier's details.
    ///
    /// Every named category must exist and the supplier must meet its
    /// onboarding requirements. A verified supplier stays verified; a rejected
    /// one goes back to pending review.
    pub async fn submit_supplier_details(
        &self,
        actor: &Actor,
        input: SupplierDetailsInput,
    ) -> WorkflowResult<SupplierDetails> {
        actor.require(Role::Supplier)?;
        let mut details = input.into_details(actor.id, Utc::now())?;

        let categories = self.store.list_categories().await?;
        let mut unmet = Vec::new();
        for name in &details.product_categories {
            match categories.iter().find(|c| c.matches_name(name)) {
                None => unmet.push(format!("unknown category {name}")),
                Some(category) => {
                    if let Err(reasons) = category.check_onboarding(&details) {
                        unmet.extend(reasons);
                    }
                }
            }
        }
        if !unmet.is_empty() {
            return Err(WorkflowError::validation(
                "product_categories",
                unmet.join("; "),
            ));
        }

        if let Some(existing) = self.store.get_supplier_details(actor.id).await? {
            details.verification_status = match existing.verification_status {
                VerificationStatus::Rejected => VerificationStatus::Pending,
                other => other,
            };
        }
        self.store.put_supplier_details(&details).await?;
        tracing::info!(
            supplier_id = %actor.id,
            categories = details.product_categories.len(),
            verification = %details.verification_status,
            "supplier details saved"
        );
        Ok(details)
    }

    pub async fn supplier_details(
        &self,
        actor: &Actor,
        supplier: ProfileId,
    ) -> WorkflowResult<SupplierDetails> {
        self.store
            .get_supplier_details(supplier)
            .await?
            .filter(|d| d.can_view(actor, &PolicyContext::default()))
            .ok_or_else(|| WorkflowError::not_found("supplier details", supplier))
    }

    pub async fn list_suppliers(
        &self,
        actor: &Actor,
        status: Option<VerificationStatus>,
    ) -> WorkflowResult<Vec<SupplierDetails>> {
        actor.require(Role::Admin)?;
        Ok(self.store.list_supplier_details(status).await?)
    }

    /// Admin verdict on a supplier. Re-verifying a verified supplier is refused.
    pub async fn verify_supplier(
        &self,
        actor: &Actor,
        supplier: ProfileId,
        verified: bool,
    ) -> WorkflowResult<SupplierDetails> {
        actor.require(Role::Admin)?;
        let current = self.supplier_details(actor, supplier).await?;
        if !current.can_mutate(actor, Field::Verification, &PolicyContext::default()) {
            return Err(WorkflowError::forbidden("only an admin may change verification"));
        }
        let next = if verified {
            VerificationStatus::Verified
        } else {
            VerificationStatus::Rejected
        };
        if current.verification_status == next {
            return Err(WorkflowError::invalid_transition(
                "supplier verification",
                current.verification_status,
                next,
            ));
        }
        let updated = self
            .store
            .update_verification(supplier, current.verification_status, next)
            .await?;
        tracing::info!(
            supplier_id = %supplier,
            from = %current.verification_status,
            to = %next,
            "supplier verification changed"
        );
        Ok(updated)
    }

    // ─── Categories ──────────────────────────────────────────────────────────

    pub async fn list_categories(&self) -> WorkflowResult<Vec<Category>> {
        Ok(self.store.list_categories().await?)
    }

    pub async fn upsert_category(
        &self,
        actor: &Actor,
        input: CategoryInput,
    ) -> WorkflowResult<Category> {
        actor.require(Role::Admin)?;
        let category = Category {
            id: input.id.unwrap_or_default(),
            name: input.name.trim().to_string(),
            description: input.description,
            requirements: input.requirements,
        };
        category.validate()?;
        self.store.put_category(&category).await?;
        tracing::info!(category_id = %category.id, name = %category.name, "category saved");
        Ok(category)
    }

    pub async fn delete_category(&self, actor: &Actor, id: CategoryId) -> WorkflowResult<()> {
        actor.require(Role::Admin)?;
        if !self.store.delete_category(id).await? {
            return Err(WorkflowError::not_found("category", id));
        }
        tracing::info!(category_id = %id, "category deleted");
        Ok(())
    }
}
