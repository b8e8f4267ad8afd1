//! HTTP admin API for the STOWAGE host

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use stowage_core::{AccountId, ContractId, Currency, StowageError};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::runtime::HostRuntime;

/// API state containing host runtime
pub type ApiState = Arc<HostRuntime>;

/// Default number of roots returned per page
const DEFAULT_ROOTS_LIMIT: u64 = 100;

/// API response wrapper
#[derive(Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn err(error: impl ToString) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.to_string()),
        }
    }
}

/// Account response
#[derive(Serialize)]
pub struct AccountResponse {
    pub account: String,
    pub balance: String,
    pub durable_balance: String,
}

/// Deposit request
#[derive(Deserialize)]
pub struct DepositRequest {
    pub amount: String,
}

/// Contract response
#[derive(Serialize)]
pub struct ContractResponse {
    pub id: String,
    pub revision_number: u64,
    pub window_start: u64,
    pub window_end: u64,
    pub locked_collateral: String,
    pub sector_count: u64,
    pub merkle_root: String,
}

/// Sector roots query
#[derive(Deserialize)]
pub struct RootsQuery {
    pub offset: Option<u64>,
    pub limit: Option<u64>,
}

/// Host status response
#[derive(Serialize)]
pub struct StatusResponse {
    pub name: String,
    pub open_accounts: usize,
}

/// Create API router
pub fn create_router(state: ApiState) -> Router {
    let router = Router::new()
        // Health
        .route("/health", get(health))
        .route("/status", get(status))
        // Accounts
        .route("/accounts/:id", get(get_account))
        .route("/accounts/:id/deposit", post(deposit))
        // Contracts
        .route("/contracts/:id", get(get_contract))
        .route("/contracts/:id/roots", get(get_sector_roots));

    let router = if state.config().api.enable_cors {
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);
        router.layer(cors)
    } else {
        router
    };

    router.layer(TraceLayer::new_for_http()).with_state(state)
}

fn error_status(err: &StowageError) -> StatusCode {
    match err {
        StowageError::ContractNotFound(_) => StatusCode::NOT_FOUND,
        StowageError::BalanceExceedsMax { .. }
        | StowageError::InsufficientFunds { .. }
        | StowageError::Overflow => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn error_response<T: Serialize>(err: StowageError) -> (StatusCode, Json<ApiResponse<T>>) {
    (error_status(&err), Json(ApiResponse::err(err)))
}

fn bad_request<T: Serialize>(msg: &str) -> (StatusCode, Json<ApiResponse<T>>) {
    (StatusCode::BAD_REQUEST, Json(ApiResponse::err(msg)))
}

/// Health check
async fn health() -> impl IntoResponse {
    Json(serde_json::json!({"status": "ok"}))
}

/// Host status
async fn status(State(runtime): State<ApiState>) -> impl IntoResponse {
    let status = StatusResponse {
        name: runtime.config().name.clone(),
        open_accounts: runtime.open_accounts(),
    };
    Json(ApiResponse::ok(status))
}

/// Get account balances
async fn get_account(
    State(runtime): State<ApiState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let account = match AccountId::from_hex(&id) {
        Ok(account) => account,
        Err(_) => return bad_request::<AccountResponse>("Invalid account id"),
    };

    let balance = match runtime.spendable_balance(&account).await {
        Ok(balance) => balance,
        Err(e) => return error_response(e),
    };
    let durable_balance = match runtime.durable_balance(&account).await {
        Ok(balance) => balance,
        Err(e) => return error_response(e),
    };

    let response = AccountResponse {
        account: account.to_hex(),
        balance: balance.0.to_string(),
        durable_balance: durable_balance.0.to_string(),
    };
    (StatusCode::OK, Json(ApiResponse::ok(response)))
}

/// Deposit into an account
async fn deposit(
    State(runtime): State<ApiState>,
    Path(id): Path<String>,
    Json(req): Json<DepositRequest>,
) -> impl IntoResponse {
    let account = match AccountId::from_hex(&id) {
        Ok(account) => account,
        Err(_) => return bad_request::<AccountResponse>("Invalid account id"),
    };
    let amount = match req.amount.parse::<u128>() {
        Ok(amount) => Currency::new(amount),
        Err(_) => return bad_request("Invalid amount"),
    };

    match runtime.deposit(&account, amount).await {
        Ok(durable_balance) => {
            let balance = runtime
                .spendable_balance(&account)
                .await
                .unwrap_or(durable_balance);
            let response = AccountResponse {
                account: account.to_hex(),
                balance: balance.0.to_string(),
                durable_balance: durable_balance.0.to_string(),
            };
            (StatusCode::OK, Json(ApiResponse::ok(response)))
        }
        Err(e) => error_response(e),
    }
}

/// Get a contract and its Merkle root
async fn get_contract(
    State(runtime): State<ApiState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let id = match ContractId::from_hex(&id) {
        Ok(id) => id,
        Err(_) => return bad_request::<ContractResponse>("Invalid contract id"),
    };

    match runtime.contract(&id).await {
        Ok((contract, merkle_root)) => {
            let response = ContractResponse {
                id: contract.id.to_hex(),
                revision_number: contract.revision.revision_number,
                window_start: contract.revision.window_start,
                window_end: contract.revision.window_end,
                locked_collateral: contract.locked_collateral.0.to_string(),
                sector_count: contract.sector_count,
                merkle_root: merkle_root.to_hex(),
            };
            (StatusCode::OK, Json(ApiResponse::ok(response)))
        }
        Err(e) => error_response(e),
    }
}

/// Get a window of a contract's sector roots
async fn get_sector_roots(
    State(runtime): State<ApiState>,
    Path(id): Path<String>,
    Query(query): Query<RootsQuery>,
) -> impl IntoResponse {
    let id = match ContractId::from_hex(&id) {
        Ok(id) => id,
        Err(_) => return bad_request::<Vec<String>>("Invalid contract id"),
    };
    let offset = query.offset.unwrap_or(0);
    let limit = query.limit.unwrap_or(DEFAULT_ROOTS_LIMIT);

    match runtime.sector_roots(&id, offset, limit).await {
        Ok(roots) => {
            let roots: Vec<String> = roots.iter().map(|root| root.to_hex()).collect();
            (StatusCode::OK, Json(ApiResponse::ok(roots)))
        }
        Err(e) => error_response(e),
    }
}

/// Start API server
pub async fn start_api_server(runtime: Arc<HostRuntime>, listen_addr: &str) -> anyhow::Result<()> {
    let router = create_router(runtime);

    let listener = tokio::net::TcpListener::bind(listen_addr).await?;
    info!("API server listening on {}", listen_addr);

    axum::serve(listener, router).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use stowage_core::{Contract, ContractRevision, HostConfig, SectorRoot};
    use tempfile::TempDir;
    use tower::ServiceExt;

    async fn setup() -> (ApiState, TempDir) {
        let tmp = TempDir::new().unwrap();
        let config = HostConfig {
            data_dir: tmp.path().to_path_buf(),
            ..HostConfig::default()
        };
        (Arc::new(HostRuntime::new(config).unwrap()), tmp)
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_deposit_and_read_account() {
        let (state, _tmp) = setup().await;
        let account = AccountId::from_bytes([7u8; 32]).to_hex();

        let response = create_router(state.clone())
            .oneshot(
                Request::post(format!("/accounts/{}/deposit", account))
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"amount":"500"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = create_router(state)
            .oneshot(
                Request::get(format!("/accounts/{}", account))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["data"]["balance"], "500");
        assert_eq!(json["data"]["durable_balance"], "500");
    }

    #[tokio::test]
    async fn test_invalid_ids_rejected() {
        let (state, _tmp) = setup().await;
        let response = create_router(state)
            .oneshot(Request::get("/accounts/zz").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_contract_roots() {
        let (state, _tmp) = setup().await;
        let id = ContractId::from_bytes([9u8; 32]);
        state
            .contracts()
            .add_contract(&Contract::new(id, ContractRevision::default(), Currency::ZERO))
            .await
            .unwrap();
        let roots: Vec<SectorRoot> = (1..=3u8).map(|b| SectorRoot::from_bytes([b; 32])).collect();
        state
            .contracts()
            .update_contracts(|tx| {
                for root in &roots {
                    tx.append_sector(id, *root);
                }
                Ok(())
            })
            .await
            .unwrap();

        let response = create_router(state.clone())
            .oneshot(
                Request::get(format!("/contracts/{}/roots?offset=1&limit=5", id.to_hex()))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["data"][0], roots[1].to_hex());
        assert_eq!(json["data"].as_array().unwrap().len(), 2);

        let missing = ContractId::from_bytes([1u8; 32]).to_hex();
        let response = create_router(state)
            .oneshot(
                Request::get(format!("/contracts/{}", missing))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
