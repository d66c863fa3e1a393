use atelier_infra::AtelierConfig;
use reqwest::StatusCode;
use serde_json::{Value, json};

struct TestServer {
    base_url: String,
    client: reqwest::Client,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn() -> Self {
        // Same router as prod, bound to an ephemeral port.
        let app = atelier_api::app::build_app(&AtelierConfig::default())
            .await
            .expect("failed to build app");
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{}", addr);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url,
            client: reqwest::Client::new(),
            handle,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn get(&self, path: &str) -> (StatusCode, Value) {
        let res = self.client.get(self.url(path)).send().await.unwrap();
        let status = res.status();
        (status, res.json().await.unwrap_or(Value::Null))
    }

    async fn post(&self, path: &str, body: Value) -> (StatusCode, Value) {
        let res = self.client.post(self.url(path)).json(&body).send().await.unwrap();
        let status = res.status();
        (status, res.json().await.unwrap_or(Value::Null))
    }

    async fn put(&self, path: &str, body: Value) -> (StatusCode, Value) {
        let res = self.client.put(self.url(path)).json(&body).send().await.unwrap();
        let status = res.status();
        (status, res.json().await.unwrap_or(Value::Null))
    }

    async fn delete(&self, path: &str) -> (StatusCode, Value) {
        let res = self.client.delete(self.url(path)).send().await.unwrap();
        let status = res.status();
        (status, res.json().await.unwrap_or(Value::Null))
    }

    async fn create_item(&self, name: &str, price: u64, stock: i64) -> String {
        let (status, body) = self
            .post("/items", json!({ "name": name, "price": price, "stock": stock }))
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        body["id"].as_str().unwrap().to_string()
    }

    async fn create_customer(&self, name: &str) -> String {
        let (status, body) = self
            .post("/customers", json!({ "name": name, "email": "ana@example.com" }))
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        body["id"].as_str().unwrap().to_string()
    }

    async fn sell(&self, customer: &str, item: &str, quantity: i64) -> (StatusCode, Value) {
        self.post(
            "/sales",
            json!({
                "customer_id": customer,
                "lines": [{ "item_id": item, "quantity": quantity }],
                "channel": { "type": "fair", "name": "Feria de Primavera" }
            }),
        )
        .await
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

#[tokio::test]
async fn health_is_ok() {
    let server = TestServer::spawn().await;
    let res = server.client.get(server.url("/health")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn created_item_is_readable_and_editable() {
    let server = TestServer::spawn().await;
    let id = server.create_item("Pendientes", 4_500, 12).await;

    let (status, item) = server.get(&format!("/items/{id}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(item["name"], "Pendientes");
    assert_eq!(item["stock"], 12);
    assert_eq!(item["active"], true);
    assert_eq!(item["stock_level"], "high");

    let (status, item) = server
        .put(&format!("/items/{id}/stock"), json!({ "stock": 7 }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(item["stock"], 7);
    assert_eq!(item["stock_level"], "medium");

    let (status, body) = server
        .put(&format!("/items/{id}/stock"), json!({ "stock": -1 }))
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"], "negative_stock");

    let (_, value) = server.get("/items/value").await;
    assert_eq!(value["value"], 7 * 4_500);
    assert_eq!(value["formatted"], "315.00 EUR");
}

#[tokio::test]
async fn sale_updates_stock_purchases_and_feed() {
    let server = TestServer::spawn().await;
    let item = server.create_item("Anillo", 100, 3).await;
    let customer = server.create_customer("Ana").await;

    let (status, sale) = server.sell(&customer, &item, 2).await;
    assert_eq!(status, StatusCode::CREATED, "{sale}");
    assert_eq!(sale["status"], "pending");
    assert_eq!(sale["total"], 200);
    assert_eq!(sale["lines"].as_array().unwrap().len(), 1);

    let (_, item_body) = server.get(&format!("/items/{item}")).await;
    assert_eq!(item_body["stock"], 1);
    let (_, customer_body) = server.get(&format!("/customers/{customer}")).await;
    assert_eq!(customer_body["total_purchases"], 1);

    let (status, feed) = server.get("/notifications?kind=sale").await;
    assert_eq!(status, StatusCode::OK);
    let feed = feed.as_array().unwrap();
    assert_eq!(feed.len(), 1);
    assert_eq!(feed[0]["read"], false);

    let (_, listed) = server.get(&format!("/sales?customer={customer}")).await;
    assert_eq!(listed.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn insufficient_stock_is_rejected_without_changes() {
    let server = TestServer::spawn().await;
    let item = server.create_item("Collar", 5_000, 1).await;
    let customer = server.create_customer("Luis").await;

    let (status, body) = server.sell(&customer, &item, 2).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "validation_error");

    let (_, item_body) = server.get(&format!("/items/{item}")).await;
    assert_eq!(item_body["stock"], 1);
    let (_, customer_body) = server.get(&format!("/customers/{customer}")).await;
    assert_eq!(customer_body["total_purchases"], 0);
    let (_, sales) = server.get("/sales").await;
    assert!(sales.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn cancel_restocks_and_repeated_cancel_conflicts() {
    let server = TestServer::spawn().await;
    let item = server.create_item("Broche", 300, 5).await;
    let customer = server.create_customer("Marta").await;
    let (_, sale) = server.sell(&customer, &item, 4).await;
    let sale_id = sale["id"].as_str().unwrap().to_string();

    let (status, paid) = server
        .post(&format!("/sales/{sale_id}/status"), json!({ "status": "paid" }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(paid["status"], "paid");

    let (status, cancelled) = server.post(&format!("/sales/{sale_id}/cancel"), json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cancelled["status"], "cancelled");
    let (_, item_body) = server.get(&format!("/items/{item}")).await;
    assert_eq!(item_body["stock"], 5);

    let (status, body) = server.post(&format!("/sales/{sale_id}/cancel"), json!({})).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "invalid_transition");
}

#[tokio::test]
async fn unknown_and_malformed_ids() {
    let server = TestServer::spawn().await;

    let (status, body) = server
        .get("/items/01890a5d-ac96-774b-bcce-b302099a8057")
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "not_found");

    let (status, body) = server.get("/sales/not-a-uuid").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invalid_id");
}

#[tokio::test]
async fn low_stock_alert_can_be_read_and_cleared() {
    let server = TestServer::spawn().await;
    let (_, welcome) = server.get("/notifications?kind=system").await;
    assert_eq!(welcome.as_array().unwrap().len(), 1);

    let item = server.create_item("Colgante", 2_500, 2).await;

    let (_, count) = server.get("/notifications/unread-count").await;
    assert_eq!(count["count"], 2);

    let (_, alerts) = server.get("/notifications?kind=stock&unread=true").await;
    let alerts = alerts.as_array().unwrap();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0]["related_id"], item.as_str());
    let alert_id = alerts[0]["id"].as_str().unwrap().to_string();

    let (status, changed) = server
        .post(&format!("/notifications/{alert_id}/read"), json!({}))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(changed["changed"], true);
    let (_, changed) = server
        .post(&format!("/notifications/{alert_id}/read"), json!({}))
        .await;
    assert_eq!(changed["changed"], false);

    let (_, count) = server.get("/notifications/unread-count").await;
    assert_eq!(count["count"], 1);

    let (status, _) = server.delete(&format!("/notifications/{alert_id}")).await;
    assert_eq!(status, StatusCode::OK);
    let (_, feed) = server.get("/notifications?kind=stock").await;
    assert!(feed.as_array().unwrap().is_empty());
    let (_, feed) = server.get("/notifications").await;
    assert_eq!(feed.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn mold_links_are_visible_from_the_item() {
    let server = TestServer::spawn().await;
    let item = server.create_item("Alianza", 9_000, 20).await;

    let (status, mold) = server
        .post("/molds", json!({ "code": "M-7", "name": "Alianza lisa" }))
        .await;
    assert_eq!(status, StatusCode::CREATED, "{mold}");
    let mold_id = mold["id"].as_str().unwrap().to_string();

    let (status, _) = server
        .put(&format!("/molds/{mold_id}/items/{item}"), json!({}))
        .await;
    assert_eq!(status, StatusCode::OK);

    let (_, molds) = server.get(&format!("/items/{item}/molds")).await;
    assert_eq!(molds.as_array().unwrap().len(), 1);
    assert_eq!(molds[0]["code"], "M-7");

    let (status, body) = server
        .post("/molds", json!({ "code": "M-7", "name": "Otra" }))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "conflict");
}

#[tokio::test]
async fn mold_can_be_renamed_looked_up_and_removed() {
    let server = TestServer::spawn().await;
    let item = server.create_item("Sello", 7_000, 15).await;
    let (_, mold) = server
        .post("/molds", json!({ "code": "M-9", "name": "Sello redondo" }))
        .await;
    let mold_id = mold["id"].as_str().unwrap().to_string();
    server
        .put(&format!("/molds/{mold_id}/items/{item}"), json!({}))
        .await;

    let (status, renamed) = server
        .put(
            &format!("/molds/{mold_id}"),
            json!({ "name": "Sello oval", "location": "Cajón 2" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{renamed}");
    assert_eq!(renamed["name"], "Sello oval");
    assert_eq!(renamed["code"], "M-9");

    let (status, found) = server.get("/molds/by-code/M-9").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(found["id"], mold_id.as_str());

    let (status, _) = server.delete(&format!("/molds/{mold_id}")).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = server.get("/molds/by-code/M-9").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (_, molds) = server.get(&format!("/items/{item}/molds")).await;
    assert!(molds.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn only_customers_without_sales_can_be_removed() {
    let server = TestServer::spawn().await;
    let item = server.create_item("Pulsera", 1_200, 10).await;
    let buyer = server.create_customer("Carmen").await;
    let idle = server.create_customer("Pablo").await;
    server.sell(&buyer, &item, 1).await;

    let (status, body) = server.delete(&format!("/customers/{buyer}")).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "conflict");

    let (status, _) = server.delete(&format!("/customers/{idle}")).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = server.get(&format!("/customers/{idle}")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (_, customers) = server.get("/customers").await;
    assert_eq!(customers.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn zero_priced_items_are_listed_with_their_level() {
    let server = TestServer::spawn().await;
    let unpriced = server.create_item("Muestra", 0, 2).await;
    server.create_item("Gargantilla", 3_000, 5).await;

    let (status, items) = server.get("/items/zero-priced").await;
    assert_eq!(status, StatusCode::OK);
    let items = items.as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["id"], unpriced.as_str());
    assert_eq!(items[0]["stock_level"], "low");
}
