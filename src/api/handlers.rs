use actix_web::{web, HttpResponse};
use serde::Deserialize;

use super::error::ApiError;
use super::AppState;
use crate::domain::order::{CreateOrder, OrderItemRequest, UpdateOrder};
use crate::messaging::messages;
use crate::models::OrderId;

/// Request body shared by create and update
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderRequest {
    pub customer_id: Option<i64>,
    pub restaurant_id: Option<i64>,
    #[serde(default)]
    pub items: Option<Vec<OrderItemRequest>>,
}

impl OrderRequest {
    fn into_create(self) -> Result<CreateOrder, ApiError> {
        let customer_id = self
            .customer_id
            .ok_or_else(|| ApiError::BadRequest("customerId is required".to_string()))?;
        let restaurant_id = self
            .restaurant_id
            .ok_or_else(|| ApiError::BadRequest("restaurantId is required".to_string()))?;

        Ok(CreateOrder {
            customer_id,
            restaurant_id,
            items: self.items.unwrap_or_default(),
        })
    }

    /// An absent `items` clears the order's items
    fn into_update(self) -> UpdateOrder {
        UpdateOrder {
            customer_id: self.customer_id,
            restaurant_id: self.restaurant_id,
            items: self.items.unwrap_or_default(),
        }
    }
}

pub async fn create_order(
    state: web::Data<AppState>,
    body: web::Json<OrderRequest>,
) -> Result<HttpResponse, ApiError> {
    let command = body.into_inner().into_create()?;
    let summary = state.engine.create(command).await?;

    state
        .order_bus
        .publish(messages::order_created(summary.order_id));

    Ok(HttpResponse::Ok().json(summary))
}

pub async fn list_orders(state: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    let orders = state.engine.get_all().await?;
    Ok(HttpResponse::Ok().json(orders))
}

pub async fn get_order(
    state: web::Data<AppState>,
    path: web::Path<i64>,
) -> Result<HttpResponse, ApiError> {
    let id = OrderId::from(path.into_inner());
    match state.engine.get_by_id(id).await? {
        Some(summary) => Ok(HttpResponse::Ok().json(summary)),
        None => Err(ApiError::OrderNotFound(id)),
    }
}

pub async fn update_order(
    state: web::Data<AppState>,
    path: web::Path<i64>,
    body: web::Json<OrderRequest>,
) -> Result<HttpResponse, ApiError> {
    let id = OrderId::from(path.into_inner());
    match state.engine.update(id, body.into_inner().into_update()).await? {
        Some(summary) => Ok(HttpResponse::Ok().json(summary)),
        None => Err(ApiError::OrderNotFound(id)),
    }
}

pub async fn delete_order(
    state: web::Data<AppState>,
    path: web::Path<i64>,
) -> Result<HttpResponse, ApiError> {
    let id = OrderId::from(path.into_inner());
    if state.engine.delete(id).await? {
        Ok(HttpResponse::NoContent().finish())
    } else {
        Err(ApiError::OrderNotFound(id))
    }
}

pub async fn order_history(
    state: web::Data<AppState>,
    path: web::Path<i64>,
) -> Result<HttpResponse, ApiError> {
    let history = state.engine.get_history(path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(history))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::configure;
    use crate::domain::order::OrderEngine;
    use crate::messaging::testing::{RecordingSink, SlowSink, UnreachableSink};
    use crate::messaging::{EventPublisher, EventSink};
    use crate::metrics::Metrics;
    use crate::store::InMemoryOrderStore;
    use actix_web::{http::StatusCode, test, App};
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;
    use serde_json::{json, Value};
    use std::str::FromStr;
    use std::sync::Arc;
    use std::time::{Duration, Instant};

    fn app_state(sink: Arc<dyn EventSink>) -> AppState {
        let metrics = Arc::new(Metrics::new().unwrap());
        let engine = OrderEngine::new(
            Arc::new(InMemoryOrderStore::new()),
            EventPublisher::new(sink.clone(), "order-events").with_metrics(metrics.clone()),
            metrics.clone(),
        );
        AppState {
            engine: Arc::new(engine),
            order_bus: EventPublisher::new(sink, "orders").with_metrics(metrics.clone()),
            metrics,
        }
    }

    fn amount(value: &Value) -> Decimal {
        Decimal::from_str(value.as_str().unwrap()).unwrap()
    }

    fn scenario_body() -> Value {
        json!({
            "customerId": 7,
            "restaurantId": 3,
            "items": [
                {"menuItemId": 1, "quantity": 2, "price": "5.00"},
                {"menuItemId": 2, "quantity": 1, "price": "3.50"}
            ]
        })
    }

    #[actix_web::test]
    async fn test_create_then_read() {
        let sink = Arc::new(RecordingSink::default());
        let state = app_state(sink.clone());
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state.clone()))
                .configure(configure),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/orders")
            .set_json(scenario_body())
            .to_request();
        let created: Value = test::call_and_read_body_json(&app, req).await;
        state.engine.flush_events().await;
        state.order_bus.flush().await;

        assert_eq!(amount(&created["totalAmount"]), dec!(13.50));
        assert_eq!(created["status"], "CREATED");
        assert_eq!(created["items"].as_array().unwrap().len(), 2);

        let id = created["orderId"].as_i64().unwrap();
        assert_eq!(sink.payloads_on("orders"), vec![format!("New Order Created: {id}")]);
        assert_eq!(
            sink.payloads_on("order-events"),
            vec![format!("Order Placed: {id} for Customer: 7")]
        );

        let req = test::TestRequest::get().uri(&format!("/orders/{id}")).to_request();
        let fetched: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(fetched, created);

        let req = test::TestRequest::get().uri("/orders").to_request();
        let all: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(all.as_array().unwrap().len(), 1);
    }

    #[actix_web::test]
    async fn test_create_requires_customer_and_restaurant() {
        let sink = Arc::new(RecordingSink::default());
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(app_state(sink.clone())))
                .configure(configure),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/orders")
            .set_json(json!({"restaurantId": 3}))
            .to_request();
        let resp = test::call_service(&app, req).await;

        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["code"], "BAD_REQUEST");
        assert!(sink.sent().is_empty());
    }

    #[actix_web::test]
    async fn test_malformed_body_is_bad_request() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(app_state(Arc::new(RecordingSink::default()))))
                .configure(configure),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/orders")
            .insert_header(("content-type", "application/json"))
            .set_payload(r#"{"customerId": "seven""#)
            .to_request();
        let resp = test::call_service(&app, req).await;

        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn test_create_succeeds_when_event_bus_is_down() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(app_state(Arc::new(UnreachableSink))))
                .configure(configure),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/orders")
            .set_json(scenario_body())
            .to_request();
        let resp = test::call_service(&app, req).await;

        assert_eq!(resp.status(), StatusCode::OK);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(amount(&body["totalAmount"]), dec!(13.50));
    }

    #[actix_web::test]
    async fn test_create_responds_before_events_are_delivered() {
        let sink = Arc::new(SlowSink::new(Duration::from_secs(10)));
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(app_state(sink.clone())))
                .configure(configure),
        )
        .await;

        let started = Instant::now();
        let req = test::TestRequest::post()
            .uri("/orders")
            .set_json(scenario_body())
            .to_request();
        let resp = test::call_service(&app, req).await;

        assert_eq!(resp.status(), StatusCode::OK);
        assert!(started.elapsed() < Duration::from_secs(1));
        assert!(sink.inner.sent().is_empty());
    }

    #[actix_web::test]
    async fn test_numeric_prices_are_exact() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(app_state(Arc::new(RecordingSink::default()))))
                .configure(configure),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/orders")
            .insert_header(("content-type", "application/json"))
            .set_payload(
                r#"{"customerId": 7, "restaurantId": 3, "items": [
                    {"menuItemId": 1, "quantity": 1, "price": 1234567890123456789.01},
                    {"menuItemId": 2, "quantity": 3, "price": 0.10}
                ]}"#,
            )
            .to_request();
        let created: Value = test::call_and_read_body_json(&app, req).await;

        assert_eq!(created["totalAmount"], "1234567890123456789.31");
        assert_eq!(created["items"][0]["price"], "1234567890123456789.01");
    }

    #[actix_web::test]
    async fn test_oversized_quantity_is_rejected_before_any_write() {
        let sink = Arc::new(RecordingSink::default());
        let state = app_state(sink.clone());
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state.clone()))
                .configure(configure),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/orders")
            .set_json(json!({
                "customerId": 7,
                "restaurantId": 3,
                "items": [
                    {"menuItemId": 1, "quantity": 2, "price": "5.00"},
                    {"menuItemId": 2, "quantity": 2147483648u64, "price": "1.00"}
                ]
            }))
            .to_request();
        let resp = test::call_service(&app, req).await;

        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["code"], "QUANTITY_OUT_OF_RANGE");

        state.engine.flush_events().await;
        state.order_bus.flush().await;
        let req = test::TestRequest::get().uri("/orders").to_request();
        let all: Value = test::call_and_read_body_json(&app, req).await;
        assert!(all.as_array().unwrap().is_empty());
        assert!(sink.sent().is_empty());
    }

    #[actix_web::test]
    async fn test_update_replaces_items() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(app_state(Arc::new(RecordingSink::default()))))
                .configure(configure),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/orders")
            .set_json(scenario_body())
            .to_request();
        let created: Value = test::call_and_read_body_json(&app, req).await;
        let id = created["orderId"].as_i64().unwrap();

        let req = test::TestRequest::put()
            .uri(&format!("/orders/{id}"))
            .set_json(json!({"items": [{"menuItemId": 9, "quantity": 4, "price": "2.00"}]}))
            .to_request();
        let updated: Value = test::call_and_read_body_json(&app, req).await;

        assert_eq!(amount(&updated["totalAmount"]), dec!(8.00));
        assert_eq!(updated["items"].as_array().unwrap().len(), 1);
        assert_eq!(updated["items"][0]["menuItemId"], 9);

        let req = test::TestRequest::put()
            .uri("/orders/999")
            .set_json(json!({"items": []}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[actix_web::test]
    async fn test_delete_then_not_found() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(app_state(Arc::new(RecordingSink::default()))))
                .configure(configure),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/orders")
            .set_json(scenario_body())
            .to_request();
        let created: Value = test::call_and_read_body_json(&app, req).await;
        let id = created["orderId"].as_i64().unwrap();

        let req = test::TestRequest::delete().uri(&format!("/orders/{id}")).to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NO_CONTENT);

        let req = test::TestRequest::get().uri(&format!("/orders/{id}")).to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["code"], "ORDER_NOT_FOUND");

        let req = test::TestRequest::delete().uri(&format!("/orders/{id}")).to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NOT_FOUND);
    }

    #[actix_web::test]
    async fn test_history_lists_newest_first() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(app_state(Arc::new(RecordingSink::default()))))
                .configure(configure),
        )
        .await;

        let mut ids = Vec::new();
        for customer in [7, 8, 7] {
            let req = test::TestRequest::post()
                .uri("/orders")
                .set_json(json!({"customerId": customer, "restaurantId": 1}))
                .to_request();
            let created: Value = test::call_and_read_body_json(&app, req).await;
            ids.push(created["orderId"].as_i64().unwrap());
        }

        let req = test::TestRequest::get().uri("/orders/history/7").to_request();
        let history: Value = test::call_and_read_body_json(&app, req).await;

        let listed: Vec<i64> = history
            .as_array()
            .unwrap()
            .iter()
            .map(|s| s["orderId"].as_i64().unwrap())
            .collect();
        assert_eq!(listed, vec![ids[2], ids[0]]);
    }
}
