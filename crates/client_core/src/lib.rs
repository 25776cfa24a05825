use std::sync::Arc;

use shared::{
    domain::{DemandQuote, Order, OrderId, OrderStatus, PlanId, Product, ProductId, QuoteId, Vendor},
    protocol::{MessageResponse, OrderUpdate, SubscriptionOverview, VendorProfileUpdate},
};
use storage::SessionStore;
use thiserror::Error;
use tokio::{sync::broadcast, task::JoinHandle};
use tracing::{info, warn};

pub mod api;
pub mod events;
pub mod gate;
pub mod listing;
pub mod push;
pub mod resources;
pub mod session;
pub mod settings;
pub mod token;
pub mod transport;
pub mod validation;

pub use api::{ListEndpoint, VendorApi};
pub use events::{ClientEvent, ListKind, Toast, ToastLevel};
pub use gate::{GateDecision, Route, RouteGate};
pub use listing::{
    FetchOutcome, Filter, FilterSet, ListController, ListItem, ListQuery, ListState, Page,
};
pub use session::{AuthController, AuthStatus, Session, SessionError};
pub use settings::{load_settings, ClientSettings, UnauthorizedPolicy};
pub use transport::{ApiFailure, ApiTransport};
pub use validation::{FieldErrors, LoginForm, PasswordChangeForm, ProposalDraft, ProposalError};

use push::PushMessaging;
use resources::HttpListSource;

const EVENT_CAPACITY: usize = 1024;
const LOGIN_SUCCESS: &str = "Login successful";
const LOGIN_FAILED: &str = "Login failed";
const PROPOSAL_SUBMITTED: &str = "Proposal submitted successfully";
const PROFILE_UPDATED: &str = "Profile updated successfully";
const PASSWORD_CHANGED: &str = "Password changed successfully";
const ORDER_UPDATED: &str = "Order updated successfully";
const PRODUCT_STATUS_UPDATED: &str = "Product status updated";
const PRODUCT_DELETED: &str = "Product deleted successfully";
const SUBSCRIPTION_UPGRADED: &str = "Subscription upgraded successfully";

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("invalid form: {0}")]
    Validation(#[from] FieldErrors),
    #[error(transparent)]
    Proposal(#[from] ProposalError),
    #[error(transparent)]
    Api(#[from] ApiFailure),
    #[error(transparent)]
    Session(#[from] SessionError),
}

impl ClientError {
    /// Text for the error toast. Server-provided messages win.
    pub fn toast_message(&self) -> String {
        match self {
            Self::Validation(errors) => errors.summary(),
            Self::Proposal(err) => err.to_string(),
            Self::Api(err) => err.user_message(),
            Self::Session(SessionError::NotAuthenticated) => {
                "Access token required. Please sign in again.".to_string()
            }
            Self::Session(err) => err.to_string(),
        }
    }
}

/// The dashboard client: session, route gate, API and the three list views,
/// all reporting through one event bus.
pub struct VendorClient {
    settings: ClientSettings,
    events: broadcast::Sender<ClientEvent>,
    auth: Arc<AuthController>,
    gate: RouteGate,
    api: VendorApi,
    orders: Arc<ListController<Order>>,
    products: Arc<ListController<Product>>,
    quotes: Arc<ListController<DemandQuote>>,
}

impl VendorClient {
    pub fn new(
        settings: ClientSettings,
        store: Arc<dyn SessionStore>,
    ) -> Result<Arc<Self>, ApiFailure> {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let auth = AuthController::new(store, events.clone());
        let transport = ApiTransport::new(&settings, Arc::clone(&auth))?;
        let api = VendorApi::new(transport, Arc::clone(&auth));

        let orders = ListController::new(
            ListKind::Orders,
            Arc::new(HttpListSource::<Order>::new(api.clone(), ListEndpoint::Orders)),
            events.clone(),
            settings.page_size,
            settings.search_debounce(),
        );
        let products = ListController::new(
            ListKind::Products,
            Arc::new(HttpListSource::<Product>::new(api.clone(), ListEndpoint::Products)),
            events.clone(),
            settings.page_size,
            settings.search_debounce(),
        );
        let quotes = ListController::new(
            ListKind::Quotes,
            Arc::new(HttpListSource::<DemandQuote>::new(api.clone(), ListEndpoint::Quotes)),
            events.clone(),
            settings.page_size,
            settings.search_debounce(),
        );

        Ok(Arc::new(Self {
            gate: RouteGate::new(Arc::clone(&auth)),
            settings,
            events,
            auth,
            api,
            orders,
            products,
            quotes,
        }))
    }

    pub fn settings(&self) -> &ClientSettings {
        &self.settings
    }

    pub fn auth(&self) -> &Arc<AuthController> {
        &self.auth
    }

    pub fn api(&self) -> &VendorApi {
        &self.api
    }

    pub fn orders(&self) -> &Arc<ListController<Order>> {
        &self.orders
    }

    pub fn products(&self) -> &Arc<ListController<Product>> {
        &self.products
    }

    pub fn quotes(&self) -> &Arc<ListController<DemandQuote>> {
        &self.quotes
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<ClientEvent> {
        self.events.subscribe()
    }

    pub async fn initialize(&self) -> Session {
        self.auth.initialize().await
    }

    pub async fn session(&self) -> Session {
        self.auth.session().await
    }

    /// Runs the gate for `route`. A redirect is also announced as navigation.
    pub async fn open(&self, route: Route) -> GateDecision {
        let decision = self.gate.decide(route).await;
        if let GateDecision::Redirect(target) = &decision {
            self.emit(ClientEvent::Navigate(target.clone()));
        }
        decision
    }

    pub async fn sign_in(&self, form: &LoginForm) -> Result<Session, ClientError> {
        let request = form.validate()?;
        let response = match self.api.login(&request).await {
            Ok(response) => response,
            Err(err) => {
                warn!(error = %err, "login request failed");
                let message = match &err {
                    ApiFailure::Unauthorized(api)
                    | ApiFailure::NotFound(api)
                    | ApiFailure::Server(api) => api.message.clone(),
                    ApiFailure::Decode(_) => LOGIN_FAILED.to_string(),
                    other => other.user_message(),
                };
                self.toast(Toast::error(message));
                return Err(err.into());
            }
        };

        let session = self
            .auth
            .login(response.token, response.vendor)
            .await
            .map_err(|err| self.report(err.into()))?;
        info!("vendor signed in");
        self.toast(Toast::success(LOGIN_SUCCESS));
        self.emit(ClientEvent::Navigate(Route::Products));
        Ok(session)
    }

    pub async fn sign_out(&self) {
        self.auth.logout().await;
    }

    /// Re-reads the vendor profile from the server into the session.
    pub async fn refresh_vendor(&self) -> Result<Vendor, ClientError> {
        let vendor_id = self.auth.vendor_id().await.ok_or(ApiFailure::NoSession)?;
        let vendor = self.api.vendor(&vendor_id).await?;
        self.auth.update_vendor_data(vendor.clone()).await?;
        Ok(vendor)
    }

    pub async fn update_profile(&self, update: &VendorProfileUpdate) -> Result<Vendor, ClientError> {
        let result = self.push_profile(update).await;
        self.finish(result, |_| PROFILE_UPDATED.to_string())
    }

    async fn push_profile(&self, update: &VendorProfileUpdate) -> Result<Vendor, ClientError> {
        let vendor_id = self.auth.vendor_id().await.ok_or(ApiFailure::NoSession)?;
        let vendor = self.api.update_vendor(&vendor_id, update).await?;
        self.auth.update_vendor_data(vendor.clone()).await?;
        Ok(vendor)
    }

    pub async fn change_password(&self, form: &PasswordChangeForm) -> Result<(), ClientError> {
        let request = form.validate()?;
        let result = self
            .api
            .change_password(&request)
            .await
            .map_err(ClientError::from);
        self.finish(result, |reply| message_or(reply, PASSWORD_CHANGED))
            .map(|_| ())
    }

    pub async fn update_order_status(
        &self,
        order_id: &OrderId,
        status: OrderStatus,
    ) -> Result<(), ClientError> {
        let result = self
            .api
            .update_order_status(order_id, status)
            .await
            .map_err(ClientError::from);
        self.finish(result, |reply| message_or(reply, ORDER_UPDATED))?;
        self.orders.refresh().await;
        Ok(())
    }

    pub async fn update_order(
        &self,
        order_id: &OrderId,
        update: &OrderUpdate,
    ) -> Result<(), ClientError> {
        let result = self
            .api
            .update_order(order_id, update)
            .await
            .map_err(ClientError::from);
        self.finish(result, |reply| message_or(reply, ORDER_UPDATED))?;
        self.orders.refresh().await;
        Ok(())
    }

    pub async fn set_product_active(
        &self,
        product_id: &ProductId,
        is_active: bool,
    ) -> Result<(), ClientError> {
        let result = self
            .api
            .set_product_active(product_id, is_active)
            .await
            .map_err(ClientError::from);
        self.finish(result, |reply| message_or(reply, PRODUCT_STATUS_UPDATED))?;
        self.products.refresh().await;
        Ok(())
    }

    pub async fn delete_product(&self, product_id: &ProductId) -> Result<(), ClientError> {
        let result = self
            .api
            .delete_product(product_id)
            .await
            .map_err(ClientError::from);
        self.finish(result, |reply| message_or(reply, PRODUCT_DELETED))?;
        self.products.refresh().await;
        Ok(())
    }

    /// Validates and sends a proposal for `quote_id`, then refreshes the
    /// quotes page currently shown.
    pub async fn submit_proposal(
        &self,
        quote_id: &QuoteId,
        draft: ProposalDraft,
    ) -> Result<MessageResponse, ClientError> {
        let vendor_id = self.auth.vendor_id().await;
        let submission = draft
            .into_submission(vendor_id, quote_id.clone())
            .map_err(|err| self.report(err.into()))?;

        let result = self
            .api
            .submit_proposal(&submission)
            .await
            .map_err(ClientError::from);
        let reply = self.finish(result, |reply| message_or(reply, PROPOSAL_SUBMITTED))?;
        info!(quote_id = %quote_id, "proposal submitted");
        self.quotes.refresh().await;
        Ok(reply)
    }

    pub async fn subscriptions(&self) -> Result<SubscriptionOverview, ClientError> {
        let result = self.api.subscriptions().await.map_err(ClientError::from);
        result.map_err(|err| self.report(err))
    }

    pub async fn upgrade_subscription(&self, plan_id: &PlanId) -> Result<(), ClientError> {
        let result = self
            .api
            .upgrade_subscription(plan_id)
            .await
            .map_err(ClientError::from);
        self.finish(result, |reply| message_or(reply, SUBSCRIPTION_UPGRADED))
            .map(|_| ())
    }

    /// Registers for push notifications; see [`push::start_push_forwarding`].
    pub async fn start_push(
        &self,
        messaging: &dyn PushMessaging,
    ) -> (Option<String>, Option<JoinHandle<()>>) {
        push::start_push_forwarding(messaging, self.events.clone()).await
    }

    fn finish<T>(
        &self,
        result: Result<T, ClientError>,
        success: impl FnOnce(&T) -> String,
    ) -> Result<T, ClientError> {
        match result {
            Ok(value) => {
                self.toast(Toast::success(success(&value)));
                Ok(value)
            }
            Err(err) => Err(self.report(err)),
        }
    }

    fn report(&self, err: ClientError) -> ClientError {
        warn!(error = %err, "dashboard action failed");
        self.toast(Toast::error(err.toast_message()));
        err
    }

    fn toast(&self, toast: Toast) {
        self.emit(ClientEvent::Toast(toast));
    }

    fn emit(&self, event: ClientEvent) {
        let _ = self.events.send(event);
    }
}

fn message_or(reply: &MessageResponse, fallback: &str) -> String {
    reply
        .message
        .clone()
        .filter(|message| !message.trim().is_empty())
        .unwrap_or_else(|| fallback.to_string())
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
