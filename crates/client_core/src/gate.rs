use std::{fmt, sync::Arc};

use shared::domain::{OrderId, ProductId};

use crate::session::{AuthController, AuthStatus, Session};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Route {
    SignIn,
    Registration,
    Products,
    AddProduct,
    EditProduct(ProductId),
    Orders,
    OrderDetails(OrderId),
    DemandQuotes,
    PosIntegration,
    SalesAnalytics,
    SalesManagement,
    SaleDetails(String),
    InventoryManagement,
    Reports,
    Settings,
    Subscriptions,
}

impl Route {
    pub fn is_protected(&self) -> bool {
        !matches!(self, Self::SignIn | Self::Registration)
    }

    pub fn path(&self) -> String {
        match self {
            Self::SignIn => "/sign-in".into(),
            Self::Registration => "/registration".into(),
            Self::Products => "/".into(),
            Self::AddProduct => "/add-product".into(),
            Self::EditProduct(id) => format!("/edit-product/{id}"),
            Self::Orders => "/manage-orders".into(),
            Self::OrderDetails(id) => format!("/manage-orders/{id}"),
            Self::DemandQuotes => "/demand-quotes".into(),
            Self::PosIntegration => "/pos-integration".into(),
            Self::SalesAnalytics => "/sales-analytics".into(),
            Self::SalesManagement => "/sales-management".into(),
            Self::SaleDetails(id) => format!("/sales/{id}"),
            Self::InventoryManagement => "/inventory-management".into(),
            Self::Reports => "/reports".into(),
            Self::Settings => "/settings".into(),
            Self::Subscriptions => "/subscription-manager".into(),
        }
    }

    pub fn from_path(path: &str) -> Option<Self> {
        let path = path.split(['?', '#']).next().unwrap_or_default();
        let trimmed = path.trim_end_matches('/');
        let segments: Vec<&str> = trimmed
            .split('/')
            .filter(|segment| !segment.is_empty())
            .collect();

        let route = match segments.as_slice() {
            [] => Self::Products,
            ["sign-in"] => Self::SignIn,
            ["registration"] => Self::Registration,
            ["add-product"] => Self::AddProduct,
            ["edit-product", id] => Self::EditProduct(ProductId::new(*id)),
            ["manage-orders"] => Self::Orders,
            ["manage-orders", id] => Self::OrderDetails(OrderId::new(*id)),
            ["demand-quotes"] => Self::DemandQuotes,
            ["pos-integration"] => Self::PosIntegration,
            ["sales-analytics"] => Self::SalesAnalytics,
            ["sales-management"] => Self::SalesManagement,
            ["sales", id] => Self::SaleDetails((*id).to_string()),
            ["inventory-management"] => Self::InventoryManagement,
            ["reports"] => Self::Reports,
            ["settings"] => Self::Settings,
            ["subscription-manager"] => Self::Subscriptions,
            _ => return None,
        };
        Some(route)
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateDecision {
    /// Authentication is still being resolved: show nothing, go nowhere.
    Placeholder,
    Render(Route),
    /// The requested route is dropped; sign-in never returns to it.
    Redirect(Route),
}

#[derive(Clone)]
pub struct RouteGate {
    auth: Arc<AuthController>,
}

impl RouteGate {
    pub fn new(auth: Arc<AuthController>) -> Self {
        Self { auth }
    }

    pub fn evaluate(session: &Session, requested: Route) -> GateDecision {
        if !requested.is_protected() {
            return GateDecision::Render(requested);
        }

        match session.status {
            AuthStatus::Loading => GateDecision::Placeholder,
            AuthStatus::Authenticated => GateDecision::Render(requested),
            AuthStatus::Unauthenticated => GateDecision::Redirect(Route::SignIn),
        }
    }

    pub async fn decide(&self, requested: Route) -> GateDecision {
        let session = self.auth.session().await;
        Self::evaluate(&session, requested)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loading_session_shows_placeholder() {
        assert_eq!(
            RouteGate::evaluate(&Session::loading(), Route::Orders),
            GateDecision::Placeholder
        );
    }

    #[test]
    fn signed_out_session_redirects_without_return_target() {
        assert_eq!(
            RouteGate::evaluate(
                &Session::signed_out(),
                Route::OrderDetails(OrderId::new("o-17"))
            ),
            GateDecision::Redirect(Route::SignIn)
        );
    }

    #[test]
    fn public_routes_render_while_loading() {
        assert_eq!(
            RouteGate::evaluate(&Session::loading(), Route::SignIn),
            GateDecision::Render(Route::SignIn)
        );
    }

    #[test]
    fn parses_parameterized_paths() {
        assert_eq!(
            Route::from_path("/manage-orders/abc123?tab=items"),
            Some(Route::OrderDetails(OrderId::new("abc123")))
        );
        assert_eq!(Route::from_path("/"), Some(Route::Products));
        assert_eq!(Route::from_path("/nowhere"), None);
        assert_eq!(Route::DemandQuotes.path(), "/demand-quotes");
    }
}
