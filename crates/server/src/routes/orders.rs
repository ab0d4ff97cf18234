use axum::extract::{Path, State};
use axum::http::{header, HeaderMap};
use axum::Json;
use chrono::Utc;
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use yesfree_core::domain::order::{Order, OrderNumber, OrderStatus};
use yesfree_core::domain::user::UserId;
use yesfree_core::projections::OrderView;
use yesfree_core::stores::FulfillmentUpdate;

use super::ApiError;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct OrderListResponse {
    pub orders: Vec<Order>,
}

pub async fn list_for_user(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<OrderListResponse>, ApiError> {
    let orders = state.orders.list_for_user(&UserId(user_id)).await?;
    Ok(Json(OrderListResponse { orders }))
}

pub async fn find_by_number(
    State(state): State<AppState>,
    Path(order_number): Path<String>,
) -> Result<Json<OrderView>, ApiError> {
    let number = OrderNumber(order_number);
    let order = state.orders.find_by_number(&number).await?.ok_or(ApiError::NotFound)?;
    let items = state.orders.items_for_order(&order.id).await?;
    Ok(Json(OrderView { order, items }))
}

#[derive(Debug, Deserialize)]
pub struct FulfillmentRequest {
    #[serde(default)]
    pub status: Option<OrderStatus>,
    #[serde(default)]
    pub courier: Option<String>,
    #[serde(default)]
    pub tracking_number: Option<String>,
    #[serde(default)]
    pub admin_memo: Option<String>,
}

pub async fn update_fulfillment(
    State(state): State<AppState>,
    Path(order_number): Path<String>,
    headers: HeaderMap,
    Json(body): Json<FulfillmentRequest>,
) -> Result<Json<Order>, ApiError> {
    require_admin(&state, &headers)?;

    let number = OrderNumber(order_number);
    let mut current = state.orders.find_by_number(&number).await?.ok_or(ApiError::NotFound)?;

    // Validate the requested transition against the loaded order; the
    // store write below performs the actual update.
    if let Some(next) = body.status {
        current
            .transition_to(next, Utc::now())
            .map_err(|error| ApiError::Conflict(error.to_string()))?;
    }

    let update = FulfillmentUpdate {
        status: body.status,
        courier: body.courier,
        tracking_number: body.tracking_number,
        admin_memo: body.admin_memo,
    };

    let updated = state
        .orders
        .update_fulfillment(&number, update, Utc::now())
        .await?
        .ok_or(ApiError::NotFound)?;

    tracing::info!(
        event_name = "checkout.admin.fulfillment_updated",
        order_number = %updated.order_number,
        status = updated.status.as_str(),
        "fulfillment fields updated"
    );

    Ok(Json(updated))
}

fn require_admin(state: &AppState, headers: &HeaderMap) -> Result<(), ApiError> {
    let presented = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .ok_or(ApiError::Unauthorized)?;

    if presented != state.admin_token.expose_secret() {
        return Err(ApiError::Unauthorized);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use axum::extract::{Path, State};
    use axum::http::{header, HeaderMap, HeaderValue};
    use axum::Json;
    use chrono::Utc;
    use yesfree_core::domain::order::{
        Order, OrderId, OrderNumber, OrderStatus, PaymentMethod, PaymentStatus,
    };
    use yesfree_core::domain::user::UserId;
    use yesfree_db::connect_memory;
    use yesfree_db::migrations::run_pending;

    use super::{find_by_number, update_fulfillment, FulfillmentRequest};
    use crate::routes::ApiError;
    use crate::state::AppState;

    async fn test_state() -> AppState {
        let pool = connect_memory().await.expect("connect");
        run_pending(&pool).await.expect("migrate");
        AppState::for_pool(pool, "admin-token")
    }

    fn order(number: &str) -> Order {
        let now = Utc::now();
        Order {
            id: OrderId(format!("order-{number}")),
            order_number: OrderNumber(number.to_string()),
            user_id: UserId("user-1".to_string()),
            status: OrderStatus::PaymentPending,
            subtotal: 80_000,
            shipping_fee: 3_000,
            discount_amount: 0,
            used_points: 0,
            total_amount: 83_000,
            earned_points: 0,
            recipient: "Han Seo-yun".to_string(),
            recipient_phone: "010-1234-5678".to_string(),
            shipping_address: "12 Hangang-daero, KR".to_string(),
            shipping_memo: None,
            payment_method: PaymentMethod::Card,
            payment_status: PaymentStatus::Pending,
            courier: None,
            tracking_number: None,
            admin_memo: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn bearer(token: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {token}")).expect("header value"),
        );
        headers
    }

    fn empty_update() -> FulfillmentRequest {
        FulfillmentRequest { status: None, courier: None, tracking_number: None, admin_memo: None }
    }

    #[tokio::test]
    async fn unknown_order_numbers_are_not_found() {
        let state = test_state().await;

        let error = find_by_number(State(state.clone()), Path("YES-00000000-0000".to_string()))
            .await
            .err()
            .expect("must fail");
        assert!(matches!(error, ApiError::NotFound));

        state.db_pool.close().await;
    }

    #[tokio::test]
    async fn fulfillment_requires_the_admin_token() {
        let state = test_state().await;
        state.orders.insert_order(&order("YES-20260810-0001")).await.expect("insert");

        let missing = update_fulfillment(
            State(state.clone()),
            Path("YES-20260810-0001".to_string()),
            HeaderMap::new(),
            Json(empty_update()),
        )
        .await
        .err()
        .expect("must fail");
        assert!(matches!(missing, ApiError::Unauthorized));

        let wrong = update_fulfillment(
            State(state.clone()),
            Path("YES-20260810-0001".to_string()),
            bearer("not-the-token"),
            Json(empty_update()),
        )
        .await
        .err()
        .expect("must fail");
        assert!(matches!(wrong, ApiError::Unauthorized));

        state.db_pool.close().await;
    }

    #[tokio::test]
    async fn fulfillment_walks_the_status_ladder() {
        let state = test_state().await;
        state.orders.insert_order(&order("YES-20260810-0001")).await.expect("insert");

        let mut body = empty_update();
        body.status = Some(OrderStatus::Preparing);
        body.courier = Some("YesFree Express".to_string());

        let Json(updated) = update_fulfillment(
            State(state.clone()),
            Path("YES-20260810-0001".to_string()),
            bearer("admin-token"),
            Json(body),
        )
        .await
        .expect("update");

        assert_eq!(updated.status, OrderStatus::Preparing);
        assert_eq!(updated.courier.as_deref(), Some("YesFree Express"));
        assert_eq!(updated.total_amount, 83_000);

        state.db_pool.close().await;
    }

    #[tokio::test]
    async fn skipping_ladder_steps_conflicts() {
        let state = test_state().await;
        state.orders.insert_order(&order("YES-20260810-0001")).await.expect("insert");

        let mut body = empty_update();
        body.status = Some(OrderStatus::Delivered);

        let error = update_fulfillment(
            State(state.clone()),
            Path("YES-20260810-0001".to_string()),
            bearer("admin-token"),
            Json(body),
        )
        .await
        .err()
        .expect("must fail");
        assert!(matches!(error, ApiError::Conflict(_)));

        state.db_pool.close().await;
    }
}
