use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::domain::{
    OrderStatus, PaymentRecord, PlanId, QuoteId, SubscriptionPlan, Vendor, VendorId,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginResponse {
    pub token: String,
    pub vendor: Vendor,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VendorEnvelope {
    pub vendor: Vendor,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VendorProfileUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub business_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderStatusUpdate {
    pub status: OrderStatus,
    pub vendor_id: VendorId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderUpdate {
    pub shipping_address: serde_json::Value,
    pub total_amount: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductActivation {
    pub vendor_id: VendorId,
    pub is_active: bool,
}

/// Proposal body for `POST /quotes/submit`. Vendors only ever propose, so
/// `is_accepted` is always sent as `false`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProposalSubmission {
    pub vendor_id: VendorId,
    pub demand_id: QuoteId,
    pub is_accepted: bool,
    pub price: f64,
    pub note: String,
    pub duration: NaiveDate,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MessageResponse {
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaginationMeta {
    pub current_page: u32,
    pub total_pages: u32,
    pub total_count: u64,
    pub limit: u32,
    pub has_next_page: bool,
    pub has_prev_page: bool,
}

/// List responses come in three shapes depending on the endpoint: a
/// `{data, pagination}` envelope, a `{products, pagination?}` envelope, or a
/// bare array.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ListEnvelope<T> {
    Paged {
        data: Vec<T>,
        #[serde(default)]
        pagination: Option<PaginationMeta>,
    },
    Products {
        products: Vec<T>,
        #[serde(default)]
        pagination: Option<PaginationMeta>,
    },
    Bare(Vec<T>),
}

impl<T> ListEnvelope<T> {
    pub fn into_parts(self) -> (Vec<T>, Option<PaginationMeta>) {
        match self {
            Self::Paged { data, pagination } => (data, pagination),
            Self::Products {
                products,
                pagination,
            } => (products, pagination),
            Self::Bare(items) => (items, None),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionOverview {
    #[serde(default)]
    pub current_plan_id: Option<PlanId>,
    #[serde(default)]
    pub plans: Vec<SubscriptionPlan>,
    #[serde(default)]
    pub payment_history: Vec<PaymentRecord>,
}

impl SubscriptionOverview {
    pub fn current_plan(&self) -> Option<&SubscriptionPlan> {
        let current = self.current_plan_id.as_ref()?;
        self.plans.iter().find(|plan| &plan.id == current)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpgradeRequest {
    pub vendor_id: VendorId,
    pub plan_id: PlanId,
}
