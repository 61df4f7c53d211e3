use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{require_text, WorkflowResult};
use crate::identity::SupplierDetails;

crate::define_id!(
    /// Admin-configured product category.
    CategoryId
);

/// Annual turnover bracket declared by a supplier. Ordered smallest first.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum TurnoverBand {
    #[default]
    #[serde(rename = "under_1m")]
    Under1M,
    #[serde(rename = "1m_to_10m")]
    From1MTo10M,
    #[serde(rename = "10m_to_50m")]
    From10MTo50M,
    #[serde(rename = "over_50m")]
    Over50M,
}

impl fmt::Display for TurnoverBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TurnoverBand::Under1M => "under 1M",
            TurnoverBand::From1MTo10M => "1M to 10M",
            TurnoverBand::From10MTo50M => "10M to 50M",
            TurnoverBand::Over50M => "over 50M",
        })
    }
}

/// What a supplier must show before it may list this category.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OnboardingRequirements {
    #[serde(default)]
    pub min_certifications: u32,
    #[serde(default)]
    pub min_experience_years: u32,
    #[serde(default)]
    pub min_turnover: TurnoverBand,
    /// Specific certifications every supplier in the category must hold.
    #[serde(default)]
    pub required_certifications: BTreeSet<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub requirements: OnboardingRequirements,
}

impl Category {
    pub fn validate(&self) -> WorkflowResult<()> {
        require_text("name", &self.name)
    }

    pub fn matches_name(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name.trim())
    }

    /// Check a supplier's declared details against this category.
    /// Returns every unmet requirement, not just the first.
    pub fn check_onboarding(&self, details: &SupplierDetails) -> Result<(), Vec<String>> {
        let req = &self.requirements;
        let mut unmet = Vec::new();

        if (details.certifications.len() as u32) < req.min_certifications {
            unmet.push(format!(
                "{} requires at least {} certifications, {} given",
                self.name,
                req.min_certifications,
                details.certifications.len()
            ));
        }
        if details.years_in_business < req.min_experience_years {
            unmet.push(format!(
                "{} requires {} years in business, {} given",
                self.name, req.min_experience_years, details.years_in_business
            ));
        }
        if details.annual_turnover < req.min_turnover {
            unmet.push(format!(
                "{} requires turnover of at least {}, {} given",
                self.name, req.min_turnover, details.annual_turnover
            ));
        }
        for cert in &req.required_certifications {
            let held = details
                .certifications
                .iter()
                .any(|c| c.eq_ignore_ascii_case(cert));
            if !held {
                unmet.push(format!("{} requires certification {cert}", self.name));
            }
        }

        if unmet.is_empty() {
            Ok(())
        } else {
            Err(unmet)
        }
    }
}
