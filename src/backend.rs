//! Custodial backend client.
//!
//! The backend holds the session wallets' keys, so every state changing
//! operation is a single JSON request to it and the returned transaction hash
//! is all the pipeline gets back. Non-2xx responses are failures.

use std::time::Duration;

use alloy::{
    hex::ToHexExt,
    primitives::{Address, U256, utils::format_ether},
};
use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

use crate::{error::BackendError, types::SubmittedTx};

/// Default timeout of a single backend request.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Trade and wallet operations of the custodial backend.
#[async_trait::async_trait]
pub trait TradeClient: Send + Sync {
    /// Creates a new custodial wallet.
    async fn create_wallet(&self) -> Result<Address, BackendError>;

    /// Native balance of `wallet`, in wei.
    async fn eth_balance(&self, wallet: Address) -> Result<U256, BackendError>;

    /// Balance of `token` held by `wallet`, in the token's base units.
    async fn token_balance(&self, wallet: Address, token: Address) -> Result<U256, BackendError>;

    /// Buys `token` from `pool` spending `eth_in` wei.
    async fn buy(
        &self,
        wallet: Address,
        pool: Address,
        token: Address,
        eth_in: U256,
        min_tokens_out: U256,
    ) -> Result<SubmittedTx, BackendError>;

    /// Allows `pool` to spend `amount` of `wallet`'s `token`.
    async fn approve(
        &self,
        wallet: Address,
        pool: Address,
        token: Address,
        amount: U256,
    ) -> Result<SubmittedTx, BackendError>;

    /// Sells `token_amount` of `token` back to `pool`.
    async fn sell(
        &self,
        wallet: Address,
        pool: Address,
        token: Address,
        token_amount: U256,
        min_refund: U256,
    ) -> Result<SubmittedTx, BackendError>;

    /// Transfers `eth_out` wei of the native asset.
    async fn transfer(
        &self,
        wallet: Address,
        to: Address,
        eth_out: U256,
    ) -> Result<SubmittedTx, BackendError>;

    /// Transfers `amount` of `token`.
    async fn transfer_token(
        &self,
        wallet: Address,
        to: Address,
        token: Address,
        amount: U256,
    ) -> Result<SubmittedTx, BackendError>;
}

/// [`TradeClient`] speaking the backend's HTTP API.
#[derive(Clone, derive_more::Debug)]
pub struct HttpTradeClient {
    base_url: Url,
    #[debug(skip)]
    api_key: Option<String>,
    #[debug(skip)]
    http: reqwest::Client,
}

#[derive(Serialize)]
struct BuyRequest {
    from: String,
    pair: String,
    token: String,
    eth_in: String,
    min_tokens_out_wei: String,
}

#[derive(Serialize)]
struct ApproveRequest {
    from: String,
    token: String,
    pair: String,
    amount_wei: String,
}

#[derive(Serialize)]
struct SellRequest {
    from: String,
    pair: String,
    token: String,
    token_amount_in_wei: String,
    min_refund_eth: String,
}

#[derive(Serialize)]
struct TransferRequest {
    from: String,
    to: String,
    eth_out: String,
}

#[derive(Serialize)]
struct TransferTokenRequest {
    from: String,
    to: String,
    token: String,
    amount_wei: String,
}

#[derive(Deserialize)]
struct WalletResponse {
    address: String,
}

#[derive(Deserialize)]
struct BalanceResponse {
    #[serde(default)]
    eth_wei: Option<String>,
    #[serde(default)]
    balance_wei: Option<String>,
}

#[derive(Deserialize)]
struct TxResponse {
    #[serde(default)]
    tx_hash: Option<String>,
}

impl HttpTradeClient {
    pub fn new(base_url: Url, api_key: Option<String>) -> Result<Self, BackendError> {
        Self::with_timeout(base_url, api_key, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(
        base_url: Url,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, BackendError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            base_url,
            api_key: api_key.filter(|k| !k.is_empty()),
            http,
        })
    }

    fn request(&self, method: reqwest::Method, path: &str) -> Result<reqwest::RequestBuilder, BackendError> {
        let url = self.base_url.join(path)?;
        let mut builder = self.http.request(method, url);
        if let Some(key) = &self.api_key {
            builder = builder.header("X-API-Key", key);
        }
        Ok(builder)
    }

    async fn send<T: for<'de> Deserialize<'de>>(
        &self,
        builder: reqwest::RequestBuilder,
    ) -> Result<T, BackendError> {
        let resp = builder.send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(BackendError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(resp.json().await?)
    }

    async fn post_trade<B: Serialize>(&self, path: &str, body: &B) -> Result<SubmittedTx, BackendError> {
        let builder = self.request(reqwest::Method::POST, path)?.json(body);
        let resp: TxResponse = self.send(builder).await?;
        let tx = resp.tx_hash.unwrap_or_else(|| "pending".to_string());
        debug!(path, %tx, "Backend accepted trade");
        Ok(tx)
    }

    async fn balance(&self, wallet: Address, token: Option<Address>) -> Result<U256, BackendError> {
        let mut query = vec![("address", hex(wallet))];
        if let Some(token) = token {
            query.push(("token", hex(token)));
        }
        let builder = self.request(reqwest::Method::GET, "balances")?.query(&query);
        let resp: BalanceResponse = self.send(builder).await?;
        let raw = match token {
            Some(_) => resp.balance_wei,
            None => resp.eth_wei,
        }
        .ok_or_else(|| BackendError::Decode("balance missing from response".to_string()))?;
        parse_wei(&raw)
    }
}

#[async_trait::async_trait]
impl TradeClient for HttpTradeClient {
    async fn create_wallet(&self) -> Result<Address, BackendError> {
        let builder = self.request(reqwest::Method::POST, "keys")?;
        let resp: WalletResponse = self.send(builder).await?;
        resp.address
            .parse()
            .map_err(|_| BackendError::Decode(format!("invalid wallet address {:?}", resp.address)))
    }

    async fn eth_balance(&self, wallet: Address) -> Result<U256, BackendError> {
        self.balance(wallet, None).await
    }

    async fn token_balance(&self, wallet: Address, token: Address) -> Result<U256, BackendError> {
        self.balance(wallet, Some(token)).await
    }

    async fn buy(
        &self,
        wallet: Address,
        pool: Address,
        token: Address,
        eth_in: U256,
        min_tokens_out: U256,
    ) -> Result<SubmittedTx, BackendError> {
        let body = BuyRequest {
            from: hex(wallet),
            pair: hex(pool),
            token: hex(token),
            eth_in: format_ether(eth_in),
            min_tokens_out_wei: min_tokens_out.to_string(),
        };
        self.post_trade("trade/buy", &body).await
    }

    async fn approve(
        &self,
        wallet: Address,
        pool: Address,
        token: Address,
        amount: U256,
    ) -> Result<SubmittedTx, BackendError> {
        let body = ApproveRequest {
            from: hex(wallet),
            token: hex(token),
            pair: hex(pool),
            amount_wei: amount.to_string(),
        };
        self.post_trade("trade/approve", &body).await
    }

    async fn sell(
        &self,
        wallet: Address,
        pool: Address,
        token: Address,
        token_amount: U256,
        min_refund: U256,
    ) -> Result<SubmittedTx, BackendError> {
        let body = SellRequest {
            from: hex(wallet),
            pair: hex(pool),
            token: hex(token),
            token_amount_in_wei: token_amount.to_string(),
            min_refund_eth: format_ether(min_refund),
        };
        self.post_trade("trade/sell", &body).await
    }

    async fn transfer(
        &self,
        wallet: Address,
        to: Address,
        eth_out: U256,
    ) -> Result<SubmittedTx, BackendError> {
        let body = TransferRequest {
            from: hex(wallet),
            to: hex(to),
            eth_out: format_ether(eth_out),
        };
        self.post_trade("trade/transfer", &body).await
    }

    async fn transfer_token(
        &self,
        wallet: Address,
        to: Address,
        token: Address,
        amount: U256,
    ) -> Result<SubmittedTx, BackendError> {
        let body = TransferTokenRequest {
            from: hex(wallet),
            to: hex(to),
            token: hex(token),
            amount_wei: amount.to_string(),
        };
        self.post_trade("trade/transfer_token", &body).await
    }
}

fn hex(addr: Address) -> String {
    addr.encode_hex_with_prefix()
}

fn parse_wei(raw: &str) -> Result<U256, BackendError> {
    raw.trim()
        .parse()
        .map_err(|_| BackendError::Decode(format!("invalid wei amount {raw:?}")))
}

#[cfg(test)]
mod tests {
    use alloy::primitives::address;

    use super::*;

    #[test]
    fn test_buy_request_wire_format() {
        let body = BuyRequest {
            from: hex(address!("0xabcdefabcdefabcdefabcdefabcdefabcdefabcd")),
            pair: hex(address!("0x1111111111111111111111111111111111111111")),
            token: hex(address!("0x2222222222222222222222222222222222222222")),
            eth_in: format_ether(U256::from(50_000_000_000_000_000u64)),
            min_tokens_out_wei: U256::from(900).to_string(),
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["from"], "0xabcdefabcdefabcdefabcdefabcdefabcdefabcd");
        assert_eq!(json["pair"], "0x1111111111111111111111111111111111111111");
        assert_eq!(json["eth_in"], "0.050000000000000000");
        assert_eq!(json["min_tokens_out_wei"], "900");
    }

    #[test]
    fn test_parse_wei() {
        assert_eq!(parse_wei("1000").unwrap(), U256::from(1000));
        assert_eq!(parse_wei(" 0 ").unwrap(), U256::ZERO);
        assert!(matches!(parse_wei("1.5"), Err(BackendError::Decode(_))));
    }

    #[test]
    fn test_endpoints_join_base_path() {
        let client = HttpTradeClient::new(
            Url::parse("http://localhost:8080/api/").unwrap(),
            Some(String::new()),
        )
        .unwrap();
        assert!(client.api_key.is_none());
        let req = client
            .request(reqwest::Method::POST, "trade/buy")
            .unwrap()
            .build()
            .unwrap();
        assert_eq!(req.url().as_str(), "http://localhost:8080/api/trade/buy");
    }
}
