use std::sync::Arc;

use reqwest::Method;
use serde::de::DeserializeOwned;
use shared::{
    domain::{OrderId, OrderStatus, PlanId, ProductId, Vendor, VendorId},
    protocol::{
        ChangePasswordRequest, ListEnvelope, LoginRequest, LoginResponse, MessageResponse,
        OrderStatusUpdate, OrderUpdate, ProductActivation, ProposalSubmission,
        SubscriptionOverview, UpgradeRequest, VendorEnvelope, VendorProfileUpdate,
    },
};

use crate::{
    listing::ListQuery,
    session::AuthController,
    transport::{ApiFailure, ApiTransport},
};

const NO_QUERY: &[(String, String)] = &[];

/// The three list endpoints behind the dashboard's tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListEndpoint {
    /// `GET /getorders?vendorId=…`
    Orders,
    /// `GET /getProducts/:vendorId`
    Products,
    /// `GET /quotes/visible`
    Quotes,
}

#[derive(Clone)]
pub struct VendorApi {
    transport: ApiTransport,
    auth: Arc<AuthController>,
}

impl VendorApi {
    pub fn new(transport: ApiTransport, auth: Arc<AuthController>) -> Self {
        Self { transport, auth }
    }

    async fn current_vendor(&self) -> Result<VendorId, ApiFailure> {
        self.auth.vendor_id().await.ok_or(ApiFailure::NoSession)
    }

    pub async fn login(&self, request: &LoginRequest) -> Result<LoginResponse, ApiFailure> {
        self.transport.post_public(&["login"], request).await
    }

    pub async fn vendor(&self, vendor_id: &VendorId) -> Result<Vendor, ApiFailure> {
        let envelope: VendorEnvelope = self
            .transport
            .get(&["get-vendor", vendor_id.as_str()], NO_QUERY)
            .await?;
        Ok(envelope.vendor)
    }

    pub async fn update_vendor(
        &self,
        vendor_id: &VendorId,
        update: &VendorProfileUpdate,
    ) -> Result<Vendor, ApiFailure> {
        let envelope: VendorEnvelope = self
            .transport
            .send(
                Method::PUT,
                &["update-vendor", vendor_id.as_str()],
                NO_QUERY,
                Some(update),
            )
            .await?;
        Ok(envelope.vendor)
    }

    pub async fn change_password(
        &self,
        request: &ChangePasswordRequest,
    ) -> Result<MessageResponse, ApiFailure> {
        let vendor_id = self.current_vendor().await?;
        self.transport
            .send(
                Method::PUT,
                &[vendor_id.as_str(), "change-password"],
                NO_QUERY,
                Some(request),
            )
            .await
    }

    pub async fn list<R: DeserializeOwned>(
        &self,
        endpoint: ListEndpoint,
        query: &ListQuery,
    ) -> Result<ListEnvelope<R>, ApiFailure> {
        let mut pairs = query.to_query_pairs();
        match endpoint {
            ListEndpoint::Orders => {
                let vendor_id = self.current_vendor().await?;
                pairs.insert(0, ("vendorId".to_string(), vendor_id.0));
                self.transport.get(&["getorders"], &pairs).await
            }
            ListEndpoint::Products => {
                let vendor_id = self.current_vendor().await?;
                self.transport
                    .get(&["getProducts", vendor_id.as_str()], &pairs)
                    .await
            }
            ListEndpoint::Quotes => self.transport.get(&["quotes", "visible"], &pairs).await,
        }
    }

    pub async fn update_order_status(
        &self,
        order_id: &OrderId,
        status: OrderStatus,
    ) -> Result<MessageResponse, ApiFailure> {
        let vendor_id = self.current_vendor().await?;
        let body = OrderStatusUpdate { status, vendor_id };
        self.transport
            .send(
                Method::PUT,
                &["orders", order_id.as_str(), "status"],
                NO_QUERY,
                Some(&body),
            )
            .await
    }

    pub async fn update_order(
        &self,
        order_id: &OrderId,
        update: &OrderUpdate,
    ) -> Result<MessageResponse, ApiFailure> {
        let vendor_id = self.current_vendor().await?;
        let query = [
            ("vendorId".to_string(), vendor_id.0),
            ("orderId".to_string(), order_id.0.clone()),
        ];
        self.transport
            .send(Method::PUT, &["updateOrder"], &query, Some(update))
            .await
    }

    pub async fn set_product_active(
        &self,
        product_id: &ProductId,
        is_active: bool,
    ) -> Result<MessageResponse, ApiFailure> {
        let vendor_id = self.current_vendor().await?;
        let body = ProductActivation {
            vendor_id,
            is_active,
        };
        self.transport
            .send(
                Method::PUT,
                &["updateProduct", product_id.as_str()],
                NO_QUERY,
                Some(&body),
            )
            .await
    }

    pub async fn delete_product(&self, product_id: &ProductId) -> Result<MessageResponse, ApiFailure> {
        self.transport
            .send::<(), _>(
                Method::DELETE,
                &["deleteProduct", product_id.as_str()],
                NO_QUERY,
                None,
            )
            .await
    }

    pub async fn submit_proposal(
        &self,
        proposal: &ProposalSubmission,
    ) -> Result<MessageResponse, ApiFailure> {
        self.transport
            .send(Method::POST, &["quotes", "submit"], NO_QUERY, Some(proposal))
            .await
    }

    pub async fn subscriptions(&self) -> Result<SubscriptionOverview, ApiFailure> {
        let vendor_id = self.current_vendor().await?;
        self.transport
            .get(&["subscriptions", vendor_id.as_str()], NO_QUERY)
            .await
    }

    pub async fn upgrade_subscription(&self, plan_id: &PlanId) -> Result<MessageResponse, ApiFailure> {
        let vendor_id = self.current_vendor().await?;
        let body = UpgradeRequest {
            vendor_id,
            plan_id: plan_id.clone(),
        };
        self.transport
            .send(Method::POST, &["subscriptions", "upgrade"], NO_QUERY, Some(&body))
            .await
    }
}
