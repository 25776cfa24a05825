use std::collections::BTreeMap;

use chrono::NaiveDate;
use shared::{
    domain::{QuoteId, VendorId},
    protocol::{ChangePasswordRequest, LoginRequest, ProposalSubmission},
};
use thiserror::Error;

pub const MIN_PASSWORD_LEN: usize = 6;

/// Per-field messages, keyed by form field name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Error)]
#[error("{}", self.summary())]
pub struct FieldErrors {
    fields: BTreeMap<&'static str, String>,
}

impl FieldErrors {
    pub fn add(&mut self, field: &'static str, message: impl Into<String>) {
        self.fields.entry(field).or_insert_with(|| message.into());
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.fields.get(field).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn summary(&self) -> String {
        self.fields
            .values()
            .cloned()
            .collect::<Vec<_>>()
            .join("; ")
    }

    fn into_result<T>(self, value: T) -> Result<T, FieldErrors> {
        if self.is_empty() {
            Ok(value)
        } else {
            Err(self)
        }
    }
}

/// Non-whitespace, an `@`, then a domain with an interior dot.
pub fn is_valid_email(email: &str) -> bool {
    let email = email.trim();
    if email.is_empty() || email.chars().any(char::is_whitespace) {
        return false;
    }
    email.match_indices('@').any(|(at, _)| {
        let domain = &email[at + 1..];
        at > 0
            && domain
                .char_indices()
                .any(|(idx, c)| c == '.' && idx > 0 && idx + 1 < domain.len())
    })
}

#[derive(Debug, Clone, Default)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
}

impl LoginForm {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }

    pub fn validate(&self) -> Result<LoginRequest, FieldErrors> {
        let mut errors = FieldErrors::default();
        let email = self.email.trim();
        if email.is_empty() {
            errors.add("email", "Email is required");
        } else if !is_valid_email(email) {
            errors.add("email", "Please enter a valid email address");
        }

        if self.password.is_empty() {
            errors.add("password", "Password is required");
        } else if self.password.chars().count() < MIN_PASSWORD_LEN {
            errors.add(
                "password",
                format!("Password must be at least {MIN_PASSWORD_LEN} characters"),
            );
        }

        errors.into_result(LoginRequest {
            email: email.to_string(),
            password: self.password.clone(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProposalError {
    #[error("Please fill in all required fields including completion date")]
    Incomplete,
    #[error("Proposal amount must be a positive number")]
    InvalidAmount,
    #[error("Vendor information not found. Please login again.")]
    MissingVendor,
}

/// A vendor's proposal as typed into the quote form.
#[derive(Debug, Clone, Default)]
pub struct ProposalDraft {
    pub amount: String,
    pub description: String,
    pub completion_date: Option<NaiveDate>,
}

impl ProposalDraft {
    pub fn new(
        amount: impl Into<String>,
        description: impl Into<String>,
        completion_date: Option<NaiveDate>,
    ) -> Self {
        Self {
            amount: amount.into(),
            description: description.into(),
            completion_date,
        }
    }

    pub fn into_submission(
        self,
        vendor_id: Option<VendorId>,
        demand_id: QuoteId,
    ) -> Result<ProposalSubmission, ProposalError> {
        let amount = self.amount.trim();
        let description = self.description.trim();
        let (false, false, Some(duration)) =
            (amount.is_empty(), description.is_empty(), self.completion_date)
        else {
            return Err(ProposalError::Incomplete);
        };

        let price = amount
            .parse::<f64>()
            .ok()
            .filter(|price| price.is_finite() && *price > 0.0)
            .ok_or(ProposalError::InvalidAmount)?;
        let vendor_id = vendor_id.ok_or(ProposalError::MissingVendor)?;

        Ok(ProposalSubmission {
            vendor_id,
            demand_id,
            is_accepted: false,
            price,
            note: description.to_string(),
            duration,
        })
    }
}

#[derive(Debug, Clone, Default)]
pub struct PasswordChangeForm {
    pub current_password: String,
    pub new_password: String,
    pub confirm_new_password: String,
}

impl PasswordChangeForm {
    pub fn validate(&self) -> Result<ChangePasswordRequest, FieldErrors> {
        let mut errors = FieldErrors::default();
        if self.current_password.is_empty() {
            errors.add("currentPassword", "Current password is required");
        }
        if self.new_password.chars().count() < MIN_PASSWORD_LEN {
            errors.add(
                "newPassword",
                format!("Password must be at least {MIN_PASSWORD_LEN} characters"),
            );
        }
        if self.new_password != self.confirm_new_password {
            errors.add("confirmNewPassword", "Passwords do not match");
        }

        errors.into_result(ChangePasswordRequest {
            current_password: self.current_password.clone(),
            new_password: self.new_password.clone(),
        })
    }
}
