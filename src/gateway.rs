//! Venue gateways.
//! Mission: one trait both venue classes implement, so the rest of the
//! engine never branches on which kind of venue it's talking to.

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info, warn};

use crate::errors::TransportError;
use crate::model::{Side, Venue};

/// A top-of-book quote for one contract on one venue, not yet resolved to a
/// unified symbol or folded into a [`crate::model::NormalizedTick`].
#[derive(Debug, Clone)]
pub enum RawTick {
    /// A V-Stream orderbook snapshot/delta: both YES and NO bid ladders for
    /// one market in a single message.
    VStreamOrderbook {
        market_ticker: String,
        /// `(price_cents, size)` pairs, best bid anywhere in the vec.
        yes_bids: Vec<(i64, u64)>,
        no_bids: Vec<(i64, u64)>,
    },
    /// A V-RPC top-of-book quote for a single contract (YES or NO
    /// instrument id resolved by the caller via the symbol map).
    VRpcQuote {
        contract_id: String,
        bid: Option<Decimal>,
        ask: Option<Decimal>,
        bid_size: Option<i64>,
        ask_size: Option<i64>,
        ts_venue: i64,
    },
}

/// Acknowledgement of an order state transition reported by a venue.
#[derive(Debug, Clone)]
pub struct OrderAck {
    pub order_id: String,
    pub filled_quantity: u64,
    pub fill_price: Option<Decimal>,
    pub status: OrderStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderStatus {
    Open,
    Filled,
    PartiallyFilled,
    Cancelled,
    Rejected,
}

/// One inbound message off a gateway's receive stream.
#[derive(Debug, Clone)]
pub enum RawEvent {
    Tick(RawTick),
    OrderAck(OrderAck),
    Heartbeat,
    Subscription { ticker_or_id: String, confirmed: bool },
}

/// An order request submitted to a venue.
#[derive(Debug, Clone)]
pub struct OrderRequest {
    pub symbol: String,
    pub side: Side,
    pub price: Decimal,
    pub quantity: u64,
}

#[derive(Debug, Clone)]
pub struct Balance {
    pub cash_available: Decimal,
}

#[derive(Debug, Clone)]
pub struct PositionSnapshot {
    pub symbol: String,
    pub side: Side,
    pub quantity: u64,
    pub avg_cost: Decimal,
}

/// Everything the rest of the engine needs from a venue: market data in, and
/// orders out. Both venue classes implement this one trait — the engine
/// never branches on which kind of venue it's talking to.
#[async_trait]
pub trait Gateway: Send + Sync {
    async fn connect(&self) -> Result<(), TransportError>;
    async fn disconnect(&self) -> Result<(), TransportError>;
    async fn subscribe(&self, ticker_or_id: &str) -> Result<(), TransportError>;
    async fn unsubscribe(&self, ticker_or_id: &str) -> Result<(), TransportError>;
    /// Suspend until the next inbound message, or time out.
    async fn receive(&self) -> Result<RawEvent, TransportError>;
    async fn place_order(&self, order: OrderRequest) -> Result<OrderAck, TransportError>;
    async fn cancel_order(&self, order_id: &str) -> Result<(), TransportError>;
    async fn get_order(&self, order_id: &str) -> Result<OrderAck, TransportError>;
    async fn get_balance(&self) -> Result<Balance, TransportError>;
    async fn get_positions(&self) -> Result<Vec<PositionSnapshot>, TransportError>;
}

/// WebSocket gateway for V-Stream-class venues: a background read loop feeds
/// an internal channel, `receive` just drains it. Subscribe requests go out
/// over a companion command channel so the write half is never contended
/// between the read loop and callers. Order management is a separate
/// concern entirely — it rides a plain REST client alongside the socket,
/// the same way the reference Kalshi integration splits `kalshi_websocket.py`
/// (market data) from `kalshi_rest.py` (orders): a resting-order venue's wire
/// protocol for placing/cancelling/querying orders has nothing to do with
/// its market-data transport.
pub struct VStreamGateway {
    venue: Venue,
    url: String,
    bearer_token: Option<String>,
    command_tx: mpsc::Sender<WsCommand>,
    command_rx: Mutex<Option<mpsc::Receiver<WsCommand>>>,
    event_rx: Mutex<mpsc::Receiver<RawEvent>>,
    event_tx: mpsc::Sender<RawEvent>,
    rest_base_url: String,
    rest_client: reqwest::Client,
}

enum WsCommand {
    Subscribe(String),
    Unsubscribe(String),
}

impl VStreamGateway {
    pub fn new(url: impl Into<String>, rest_base_url: impl Into<String>, bearer_token: Option<String>) -> Self {
        let (command_tx, command_rx) = mpsc::channel(256);
        let (event_tx, event_rx) = mpsc::channel(4096);
        Self {
            venue: Venue::VStream,
            url: url.into(),
            bearer_token,
            command_tx,
            command_rx: Mutex::new(Some(command_rx)),
            event_rx: Mutex::new(event_rx),
            event_tx,
            rest_base_url: rest_base_url.into(),
            rest_client: reqwest::Client::builder()
                .timeout(Duration::from_secs(10))
                .build()
                .expect("reqwest client builds with static config"),
        }
    }

    fn authed(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.bearer_token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    /// Maps the reference venue's order-status vocabulary
    /// (resting/pending/open/filled/executed/canceled/cancelled/expired)
    /// onto the engine's four-state [`OrderStatus`].
    fn parse_order_status(raw: &str) -> OrderStatus {
        match raw {
            "filled" | "executed" => OrderStatus::Filled,
            "canceled" | "cancelled" | "expired" => OrderStatus::Cancelled,
            "resting" | "pending" | "open" => OrderStatus::Open,
            _ => OrderStatus::Open,
        }
    }

    fn parse_order_ack(order_id_fallback: &str, body: &serde_json::Value) -> OrderAck {
        let order = body.get("order").unwrap_or(body);
        let fill_count = order.get("fill_count").and_then(|v| v.as_u64()).unwrap_or(0);
        let remaining = order.get("remaining_count").and_then(|v| v.as_u64());
        let initial = order.get("initial_count").and_then(|v| v.as_u64());
        let price_cents = order
            .get("yes_price")
            .or_else(|| order.get("no_price"))
            .and_then(|v| v.as_i64());

        let status_str = order.get("status").and_then(|v| v.as_str()).unwrap_or("pending");
        let mut status = Self::parse_order_status(status_str);
        // The reference client derives "filled" from count bookkeeping when the
        // status field itself is ambiguous (`remaining_count == 0 && fill_count > 0`).
        if status == OrderStatus::Open && remaining == Some(0) && fill_count > 0 {
            status = OrderStatus::Filled;
        } else if status == OrderStatus::Open && fill_count > 0 && initial.is_some_and(|i| fill_count < i) {
            status = OrderStatus::PartiallyFilled;
        }

        OrderAck {
            order_id: order
                .get("order_id")
                .and_then(|v| v.as_str())
                .map(String::from)
                .unwrap_or_else(|| order_id_fallback.to_string()),
            filled_quantity: fill_count,
            fill_price: price_cents.map(|c| Decimal::from(c) / Decimal::from(100)),
            status,
        }
    }

    fn parse_orderbook_message(text: &str) -> Option<RawEvent> {
        let value: serde_json::Value = serde_json::from_str(text).ok()?;
        let msg_type = value.get("type")?.as_str()?;
        match msg_type {
            "orderbook_snapshot" | "orderbook_delta" => {
                let msg = value.get("msg")?;
                let market_ticker = msg.get("market_ticker")?.as_str()?.to_string();
                let yes_bids = parse_ladder(msg.get("yes")?);
                let no_bids = parse_ladder(msg.get("no")?);
                Some(RawEvent::Tick(RawTick::VStreamOrderbook {
                    market_ticker,
                    yes_bids,
                    no_bids,
                }))
            }
            "subscribed" => {
                let ticker = value
                    .get("market_ticker")
                    .and_then(|v| v.as_str())
                    .unwrap_or_default()
                    .to_string();
                Some(RawEvent::Subscription {
                    ticker_or_id: ticker,
                    confirmed: true,
                })
            }
            _ => None,
        }
    }
}

fn parse_ladder(value: &serde_json::Value) -> Vec<(i64, u64)> {
    value
        .as_array()
        .map(|rows| {
            rows.iter()
                .filter_map(|row| {
                    let row = row.as_array()?;
                    let price = row.first()?.as_i64()?;
                    let size = row.get(1)?.as_u64()?;
                    Some((price, size))
                })
                .collect()
        })
        .unwrap_or_default()
}

#[async_trait]
impl Gateway for VStreamGateway {
    async fn connect(&self) -> Result<(), TransportError> {
        let url = self.url.clone();
        let venue = self.venue;
        let (ws_stream, _) = tokio_tungstenite::connect_async(&url).await.map_err(|e| {
            TransportError::ConnectionLost {
                venue,
                reason: e.to_string(),
            }
        })?;
        info!(venue = venue.as_str(), %url, "connected");

        let (mut write, mut read) = ws_stream.split();
        let mut command_rx = self
            .command_rx
            .lock()
            .await
            .take()
            .ok_or_else(|| TransportError::ConnectionLost {
                venue,
                reason: "gateway already connected once".into(),
            })?;
        let event_tx = self.event_tx.clone();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    msg = read.next() => {
                        match msg {
                            Some(Ok(Message::Text(text))) => {
                                if let Some(event) = VStreamGateway::parse_orderbook_message(&text) {
                                    if event_tx.send(event).await.is_err() {
                                        break;
                                    }
                                }
                            }
                            Some(Ok(Message::Ping(_))) => {
                                let _ = event_tx.send(RawEvent::Heartbeat).await;
                            }
                            Some(Ok(_)) => {}
                            Some(Err(e)) => {
                                warn!(venue = venue.as_str(), error = %e, "read error");
                                break;
                            }
                            None => {
                                warn!(venue = venue.as_str(), "stream closed");
                                break;
                            }
                        }
                    }
                    cmd = command_rx.recv() => {
                        match cmd {
                            Some(WsCommand::Subscribe(ticker)) => {
                                let frame = serde_json::json!({
                                    "cmd": "subscribe",
                                    "params": { "channels": ["orderbook_delta"], "market_ticker": ticker }
                                });
                                if write.send(Message::Text(frame.to_string())).await.is_err() {
                                    break;
                                }
                            }
                            Some(WsCommand::Unsubscribe(ticker)) => {
                                let frame = serde_json::json!({
                                    "cmd": "unsubscribe",
                                    "params": { "market_ticker": ticker }
                                });
                                if write.send(Message::Text(frame.to_string())).await.is_err() {
                                    break;
                                }
                            }
                            None => break,
                        }
                    }
                }
            }
            debug!(venue = venue.as_str(), "read loop exiting");
        });

        Ok(())
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        Ok(())
    }

    async fn subscribe(&self, ticker_or_id: &str) -> Result<(), TransportError> {
        self.command_tx
            .send(WsCommand::Subscribe(ticker_or_id.to_string()))
            .await
            .map_err(|_| TransportError::ConnectionLost {
                venue: self.venue,
                reason: "command channel closed".into(),
            })
    }

    async fn unsubscribe(&self, ticker_or_id: &str) -> Result<(), TransportError> {
        self.command_tx
            .send(WsCommand::Unsubscribe(ticker_or_id.to_string()))
            .await
            .map_err(|_| TransportError::ConnectionLost {
                venue: self.venue,
                reason: "command channel closed".into(),
            })
    }

    async fn receive(&self) -> Result<RawEvent, TransportError> {
        let mut rx = self.event_rx.lock().await;
        rx.recv()
            .await
            .ok_or(TransportError::ConnectionLost {
                venue: self.venue,
                reason: "event channel closed".into(),
            })
    }

    async fn place_order(&self, order: OrderRequest) -> Result<OrderAck, TransportError> {
        let url = format!("{}/portfolio/orders", self.rest_base_url);
        let price_cents = (order.price * Decimal::from(100))
            .round()
            .to_string()
            .parse::<i64>()
            .unwrap_or(0);
        let price_field = match order.side {
            Side::Yes => "yes_price",
            Side::No => "no_price",
        };
        let mut payload = serde_json::json!({
            "ticker": order.symbol,
            "action": "buy",
            "side": order.side.as_str().to_lowercase(),
            "count": order.quantity,
            "type": "limit",
            "client_order_id": uuid::Uuid::new_v4().to_string(),
        });
        payload[price_field] = serde_json::json!(price_cents);

        let resp = self
            .authed(self.rest_client.post(&url).json(&payload))
            .send()
            .await
            .map_err(|e| TransportError::Request {
                venue: self.venue,
                source: e.into(),
            })?;
        let body: serde_json::Value = resp.json().await.map_err(|e| TransportError::Request {
            venue: self.venue,
            source: e.into(),
        })?;
        Ok(Self::parse_order_ack("", &body))
    }

    async fn cancel_order(&self, order_id: &str) -> Result<(), TransportError> {
        let url = format!("{}/portfolio/orders/{}", self.rest_base_url, order_id);
        self.authed(self.rest_client.delete(&url))
            .send()
            .await
            .map_err(|e| TransportError::Request {
                venue: self.venue,
                source: e.into(),
            })?;
        Ok(())
    }

    async fn get_order(&self, order_id: &str) -> Result<OrderAck, TransportError> {
        let url = format!("{}/portfolio/orders/{}", self.rest_base_url, order_id);
        let resp = self
            .authed(self.rest_client.get(&url))
            .send()
            .await
            .map_err(|e| TransportError::Request {
                venue: self.venue,
                source: e.into(),
            })?;
        let body: serde_json::Value = resp.json().await.map_err(|e| TransportError::Request {
            venue: self.venue,
            source: e.into(),
        })?;
        Ok(Self::parse_order_ack(order_id, &body))
    }

    async fn get_balance(&self) -> Result<Balance, TransportError> {
        let url = format!("{}/portfolio/balance", self.rest_base_url);
        let resp = self
            .authed(self.rest_client.get(&url))
            .send()
            .await
            .map_err(|e| TransportError::Request {
                venue: self.venue,
                source: e.into(),
            })?;
        let body: serde_json::Value = resp.json().await.map_err(|e| TransportError::Request {
            venue: self.venue,
            source: e.into(),
        })?;
        let balance_cents = body.get("balance").and_then(|v| v.as_i64()).unwrap_or(0);
        Ok(Balance {
            cash_available: Decimal::from(balance_cents) / Decimal::from(100),
        })
    }

    async fn get_positions(&self) -> Result<Vec<PositionSnapshot>, TransportError> {
        let url = format!("{}/portfolio/positions", self.rest_base_url);
        let resp = self
            .authed(self.rest_client.get(&url))
            .send()
            .await
            .map_err(|e| TransportError::Request {
                venue: self.venue,
                source: e.into(),
            })?;
        let body: serde_json::Value = resp.json().await.map_err(|e| TransportError::Request {
            venue: self.venue,
            source: e.into(),
        })?;
        let rows = body
            .get("positions")
            .and_then(|v| v.as_array())
            .cloned()
            .unwrap_or_default();
        Ok(rows
            .iter()
            .filter_map(|row| {
                let price_cents = row.get("yes_price").or_else(|| row.get("no_price")).and_then(|v| v.as_i64())?;
                Some(PositionSnapshot {
                    symbol: row.get("ticker")?.as_str()?.to_string(),
                    side: match row.get("side")?.as_str()? {
                        "yes" => Side::Yes,
                        "no" => Side::No,
                        _ => return None,
                    },
                    quantity: row.get("fill_count")?.as_u64()?,
                    avg_cost: Decimal::from(price_cents) / Decimal::from(100),
                })
            })
            .collect())
    }
}

/// Polling REST gateway for V-RPC-class venues. `receive` polls quotes for
/// every subscribed contract on a fixed interval and emits them one at a
/// time from an internal buffer.
pub struct VRpcGateway {
    venue: Venue,
    base_url: String,
    bearer_token: Option<String>,
    client: reqwest::Client,
    subscribed: Mutex<Vec<String>>,
    buffered: Mutex<std::collections::VecDeque<RawEvent>>,
    poll_interval: Duration,
}

impl VRpcGateway {
    pub fn new(base_url: impl Into<String>, bearer_token: Option<String>) -> Self {
        Self {
            venue: Venue::VRpc,
            base_url: base_url.into(),
            bearer_token,
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(10))
                .build()
                .expect("reqwest client builds with static config"),
            subscribed: Mutex::new(Vec::new()),
            buffered: Mutex::new(std::collections::VecDeque::new()),
            poll_interval: Duration::from_millis(500),
        }
    }

    fn authed(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.bearer_token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn poll_one(&self, contract_id: &str) -> Result<RawTick, TransportError> {
        let url = format!("{}/contracts/{}/quote", self.base_url, contract_id);
        let resp = self
            .authed(self.client.get(&url))
            .send()
            .await
            .map_err(|e| TransportError::Request {
                venue: self.venue,
                source: e.into(),
            })?;
        let body: serde_json::Value = resp.json().await.map_err(|e| TransportError::Request {
            venue: self.venue,
            source: e.into(),
        })?;

        let decimal_field = |key: &str| -> Option<Decimal> {
            body.get(key).and_then(|v| match v {
                serde_json::Value::String(s) => s.parse().ok(),
                serde_json::Value::Number(n) => n.as_f64().and_then(Decimal::from_f64_retain),
                _ => None,
            })
        };

        Ok(RawTick::VRpcQuote {
            contract_id: contract_id.to_string(),
            bid: decimal_field("bid"),
            ask: decimal_field("ask"),
            bid_size: body.get("bid_size").and_then(|v| v.as_i64()),
            ask_size: body.get("ask_size").and_then(|v| v.as_i64()),
            ts_venue: body
                .get("ts_ns")
                .and_then(|v| v.as_i64())
                .unwrap_or_default(),
        })
    }
}

use rust_decimal::prelude::FromPrimitive;

#[async_trait]
impl Gateway for VRpcGateway {
    async fn connect(&self) -> Result<(), TransportError> {
        info!(venue = self.venue.as_str(), url = %self.base_url, "connected");
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        Ok(())
    }

    async fn subscribe(&self, ticker_or_id: &str) -> Result<(), TransportError> {
        self.subscribed.lock().await.push(ticker_or_id.to_string());
        Ok(())
    }

    async fn unsubscribe(&self, ticker_or_id: &str) -> Result<(), TransportError> {
        self.subscribed.lock().await.retain(|id| id != ticker_or_id);
        Ok(())
    }

    async fn receive(&self) -> Result<RawEvent, TransportError> {
        loop {
            if let Some(event) = self.buffered.lock().await.pop_front() {
                return Ok(event);
            }

            let ids: Vec<String> = self.subscribed.lock().await.clone();
            let mut buffered = self.buffered.lock().await;
            for id in &ids {
                match self.poll_one(id).await {
                    Ok(tick) => buffered.push_back(RawEvent::Tick(tick)),
                    Err(e) => {
                        error!(venue = self.venue.as_str(), contract_id = %id, error = %e, "poll failed");
                    }
                }
            }
            drop(buffered);
            tokio::time::sleep(self.poll_interval).await;
        }
    }

    async fn place_order(&self, order: OrderRequest) -> Result<OrderAck, TransportError> {
        let url = format!("{}/orders", self.base_url);
        let payload = serde_json::json!({
            "symbol": order.symbol,
            "side": order.side.as_str(),
            "price": order.price.to_string(),
            "quantity": order.quantity,
        });
        let resp = self
            .authed(self.client.post(&url).json(&payload))
            .send()
            .await
            .map_err(|e| TransportError::Request {
                venue: self.venue,
                source: e.into(),
            })?;
        let body: serde_json::Value = resp.json().await.map_err(|e| TransportError::Request {
            venue: self.venue,
            source: e.into(),
        })?;
        Ok(OrderAck {
            order_id: body
                .get("order_id")
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string(),
            filled_quantity: body.get("filled_quantity").and_then(|v| v.as_u64()).unwrap_or(0),
            fill_price: body.get("fill_price").and_then(|v| v.as_str()).and_then(|s| s.parse().ok()),
            status: match body.get("status").and_then(|v| v.as_str()) {
                Some("filled") => OrderStatus::Filled,
                Some("partially_filled") => OrderStatus::PartiallyFilled,
                Some("cancelled") => OrderStatus::Cancelled,
                Some("rejected") => OrderStatus::Rejected,
                _ => OrderStatus::Open,
            },
        })
    }

    async fn cancel_order(&self, order_id: &str) -> Result<(), TransportError> {
        let url = format!("{}/orders/{}/cancel", self.base_url, order_id);
        self.authed(self.client.post(&url))
            .send()
            .await
            .map_err(|e| TransportError::Request {
                venue: self.venue,
                source: e.into(),
            })?;
        Ok(())
    }

    async fn get_order(&self, order_id: &str) -> Result<OrderAck, TransportError> {
        let url = format!("{}/orders/{}", self.base_url, order_id);
        let resp = self
            .authed(self.client.get(&url))
            .send()
            .await
            .map_err(|e| TransportError::Request {
                venue: self.venue,
                source: e.into(),
            })?;
        let body: serde_json::Value = resp.json().await.map_err(|e| TransportError::Request {
            venue: self.venue,
            source: e.into(),
        })?;
        Ok(OrderAck {
            order_id: order_id.to_string(),
            filled_quantity: body.get("filled_quantity").and_then(|v| v.as_u64()).unwrap_or(0),
            fill_price: body.get("fill_price").and_then(|v| v.as_str()).and_then(|s| s.parse().ok()),
            status: match body.get("status").and_then(|v| v.as_str()) {
                Some("filled") => OrderStatus::Filled,
                Some("partially_filled") => OrderStatus::PartiallyFilled,
                Some("cancelled") => OrderStatus::Cancelled,
                Some("rejected") => OrderStatus::Rejected,
                _ => OrderStatus::Open,
            },
        })
    }

    async fn get_balance(&self) -> Result<Balance, TransportError> {
        let url = format!("{}/account/balance", self.base_url);
        let resp = self
            .authed(self.client.get(&url))
            .send()
            .await
            .map_err(|e| TransportError::Request {
                venue: self.venue,
                source: e.into(),
            })?;
        let body: serde_json::Value = resp.json().await.map_err(|e| TransportError::Request {
            venue: self.venue,
            source: e.into(),
        })?;
        Ok(Balance {
            cash_available: body
                .get("cash_available")
                .and_then(|v| v.as_str())
                .and_then(|s| s.parse().ok())
                .unwrap_or_default(),
        })
    }

    async fn get_positions(&self) -> Result<Vec<PositionSnapshot>, TransportError> {
        let url = format!("{}/account/positions", self.base_url);
        let resp = self
            .authed(self.client.get(&url))
            .send()
            .await
            .map_err(|e| TransportError::Request {
                venue: self.venue,
                source: e.into(),
            })?;
        let body: serde_json::Value = resp.json().await.map_err(|e| TransportError::Request {
            venue: self.venue,
            source: e.into(),
        })?;
        let rows = body.as_array().cloned().unwrap_or_default();
        Ok(rows
            .iter()
            .filter_map(|row| {
                Some(PositionSnapshot {
                    symbol: row.get("symbol")?.as_str()?.to_string(),
                    side: match row.get("side")?.as_str()? {
                        "YES" => Side::Yes,
                        "NO" => Side::No,
                        _ => return None,
                    },
                    quantity: row.get("quantity")?.as_u64()?,
                    avg_cost: row.get("avg_cost")?.as_str()?.parse().ok()?,
                })
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_orderbook_snapshot() {
        let text = r#"{"type":"orderbook_snapshot","msg":{"market_ticker":"FED-25MAR-T25","yes":[[40,100],[38,50]],"no":[[55,80]]}}"#;
        let event = VStreamGateway::parse_orderbook_message(text).unwrap();
        match event {
            RawEvent::Tick(RawTick::VStreamOrderbook {
                market_ticker,
                yes_bids,
                no_bids,
            }) => {
                assert_eq!(market_ticker, "FED-25MAR-T25");
                assert_eq!(yes_bids.len(), 2);
                assert_eq!(no_bids, vec![(55, 80)]);
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn ignores_unrecognized_message_types() {
        let text = r#"{"type":"ping"}"#;
        assert!(VStreamGateway::parse_orderbook_message(text).is_none());
    }
}
