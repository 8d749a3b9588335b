use axum::http::{Method, StatusCode};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::{json, Value};
use std::str::FromStr;

use super::auth_flow_test::verified_login;
use crate::common::{body_json, TestApp};
use vitafit::models::CreateProduct;

fn money(value: &Value) -> Decimal {
    Decimal::from_str(value.as_str().expect("decimal serialized as string")).unwrap()
}

#[tokio::test]
async fn test_order_totals_and_cancellation_restock() {
    let Some(app) = TestApp::with_database().await else {
        return;
    };
    let product = app
        .state
        .product_service
        .create_product(CreateProduct {
            name: format!("Kettlebell {}", uuid::Uuid::new_v4().simple()),
            description: None,
            category: "equipment".to_string(),
            price: dec!(80.00),
            sale_price: Some(dec!(60.00)),
            stock: 10,
            images: vec![],
            is_active: true,
            is_featured: false,
        })
        .await
        .unwrap();
    let product_id = product.product.id;

    let (_, data) = verified_login(&app, "buyer").await;
    let access = data["access_token"].as_str().unwrap();

    let response = app
        .request(
            Method::POST,
            "/api/orders",
            Some(json!({
                "items": [{ "product_id": product_id, "quantity": 2 }],
                "payment_method": "cash_on_delivery",
                "shipping_address": "12 Olaya Street",
                "shipping_city": "Riyadh",
                "shipping_phone": "+966500000000",
            })),
            Some(access),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let order = body_json(response).await["data"].clone();

    let (subtotal, discount, tax, shipping, total) = (
        money(&order["subtotal"]),
        money(&order["discount"]),
        money(&order["tax"]),
        money(&order["shipping"]),
        money(&order["total"]),
    );
    assert_eq!(subtotal, dec!(160.00));
    assert_eq!(discount, dec!(40.00));
    assert_eq!(total, subtotal - discount + tax + shipping);
    assert_eq!(order["items"].as_array().unwrap().len(), 1);

    let stock = |app: &TestApp| {
        let service = app.state.product_service.clone();
        async move { service.get_product(product_id, true).await.unwrap().product.stock }
    };
    assert_eq!(stock(&app).await, 8);

    let order_id = order["id"].as_str().unwrap();
    let response = app
        .request(Method::POST, &format!("/api/orders/{}/cancel", order_id), None, Some(access))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["data"]["status"], "cancelled");
    assert_eq!(stock(&app).await, 10);
}

#[tokio::test]
async fn test_order_exceeding_stock_is_rejected() {
    let Some(app) = TestApp::with_database().await else {
        return;
    };
    let product = app
        .state
        .product_service
        .create_product(CreateProduct {
            name: format!("Foam Roller {}", uuid::Uuid::new_v4().simple()),
            description: None,
            category: "equipment".to_string(),
            price: dec!(45.00),
            sale_price: None,
            stock: 1,
            images: vec![],
            is_active: true,
            is_featured: false,
        })
        .await
        .unwrap();

    let (_, data) = verified_login(&app, "greedy").await;
    let access = data["access_token"].as_str().unwrap();

    let response = app
        .request(
            Method::POST,
            "/api/orders",
            Some(json!({
                "items": [{ "product_id": product.product.id, "quantity": 3 }],
                "payment_method": "card",
                "shipping_address": "12 Olaya Street",
                "shipping_city": "Riyadh",
                "shipping_phone": "+966500000000",
            })),
            Some(access),
        )
        .await;
    assert!(response.status().is_client_error());
    assert_eq!(body_json(response).await["success"], false);
}
