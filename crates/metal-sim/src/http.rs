//! HTTP surface of the simulator.
//!
//! Maps the provisioning API's wire paths onto [`Engine`] operations.

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        Path, Query, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use thiserror::Error;
use tower_http::trace::TraceLayer;
use tracing::debug;

use crate::engine::Engine;
use crate::error::EngineError;
use crate::models::{
    AssignNetworkParameter, ConfigureBondingParameter, EnableServerPortParameter,
    InterfacePort, ListServersParams, OsImage, OsInstallParameter, PortChannel, PortChannelId,
    PortId, PowerControlParameter, RaidStatus, ReadRaidStatusParams,
    ReadServerTrafficByPortParams, Server, ServerPowerStatus, Servers, TrafficGraph,
    UpdateServerPortParameter,
};

/// Errors returned by the HTTP handlers.
///
/// Requests the extractors cannot decode are reported as `invalid_request`,
/// with the same body shape as engine errors.
#[derive(Error, Debug)]
pub enum ApiError {
    /// The engine rejected the operation.
    #[error(transparent)]
    Engine(#[from] EngineError),

    /// The JSON body could not be decoded.
    #[error(transparent)]
    Json(#[from] JsonRejection),

    /// A path segment could not be decoded.
    #[error(transparent)]
    Path(#[from] PathRejection),

    /// The query string could not be decoded.
    #[error(transparent)]
    Query(#[from] QueryRejection),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            Self::Engine(EngineError::NotFound { .. }) => StatusCode::NOT_FOUND,
            Self::Engine(EngineError::Conflict { .. }) => StatusCode::CONFLICT,
            Self::Engine(EngineError::InvalidRequest { .. })
            | Self::Json(_)
            | Self::Path(_)
            | Self::Query(_) => StatusCode::BAD_REQUEST,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            Self::Engine(err) => err.kind(),
            Self::Json(_) | Self::Path(_) | Self::Query(_) => "invalid_request",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        debug!(status = %status, error = %self, "Request failed");
        let body = json!({
            "error": self.kind(),
            "message": self.to_string(),
        });
        (status, Json(body)).into_response()
    }
}

type ApiResult<T> = Result<Json<T>, ApiError>;

type JsonBody<T> = Result<Json<T>, JsonRejection>;
type PathParams<T> = Result<Path<T>, PathRejection>;
type QueryParams<T> = Result<Query<T>, QueryRejection>;

/// Build the router serving the provisioning API.
pub fn build_router(engine: Engine) -> Router {
    Router::new()
        .route("/ping", get(ping))
        .route("/servers/", get(list_servers))
        .route("/servers/{server_id}/", get(read_server))
        .route("/servers/{server_id}/os_images/", get(list_os_images))
        .route("/servers/{server_id}/os_install/", post(os_install))
        .route(
            "/servers/{server_id}/port_channels/{port_channel_id}/",
            get(read_port_channel),
        )
        .route(
            "/servers/{server_id}/port_channels/{port_channel_id}/configure_bonding/",
            post(configure_bonding),
        )
        .route(
            "/servers/{server_id}/ports/{port_id}/",
            get(read_port).patch(update_port),
        )
        .route(
            "/servers/{server_id}/ports/{port_id}/assign_network/",
            post(assign_network),
        )
        .route("/servers/{server_id}/ports/{port_id}/enable/", post(enable_port))
        .route(
            "/servers/{server_id}/ports/{port_id}/traffic_graph/",
            get(read_port_traffic),
        )
        .route("/servers/{server_id}/power_control/", post(power_control))
        .route("/servers/{server_id}/power_status/", get(read_power_status))
        .route("/servers/{server_id}/raid_status/", get(read_raid_status))
        .layer(TraceLayer::new_for_http())
        .with_state(engine)
}

async fn ping() -> &'static str {
    "pong"
}

async fn list_servers(
    State(engine): State<Engine>,
    query: QueryParams<ListServersParams>,
) -> ApiResult<Servers> {
    let Query(params) = query?;
    Ok(Json(engine.list_servers(&params).await))
}

async fn read_server(
    State(engine): State<Engine>,
    Path(server_id): Path<String>,
) -> ApiResult<Server> {
    Ok(Json(engine.read_server(&server_id).await?))
}

async fn list_os_images(
    State(engine): State<Engine>,
    Path(server_id): Path<String>,
) -> ApiResult<Vec<OsImage>> {
    Ok(Json(engine.list_os_images(&server_id).await?))
}

async fn os_install(
    State(engine): State<Engine>,
    Path(server_id): Path<String>,
    body: JsonBody<OsInstallParameter>,
) -> Result<StatusCode, ApiError> {
    let Json(params) = body?;
    engine.os_install(&server_id, &params).await?;
    Ok(StatusCode::ACCEPTED)
}

async fn read_port_channel(
    State(engine): State<Engine>,
    path: PathParams<(String, PortChannelId)>,
) -> ApiResult<PortChannel> {
    let Path((server_id, port_channel_id)) = path?;
    Ok(Json(
        engine.read_port_channel(&server_id, port_channel_id).await?,
    ))
}

async fn configure_bonding(
    State(engine): State<Engine>,
    path: PathParams<(String, PortChannelId)>,
    body: JsonBody<ConfigureBondingParameter>,
) -> ApiResult<PortChannel> {
    let Path((server_id, port_channel_id)) = path?;
    let Json(params) = body?;
    Ok(Json(
        engine
            .configure_bonding(&server_id, port_channel_id, &params)
            .await?,
    ))
}

async fn read_port(
    State(engine): State<Engine>,
    path: PathParams<(String, PortId)>,
) -> ApiResult<InterfacePort> {
    let Path((server_id, port_id)) = path?;
    Ok(Json(engine.read_port(&server_id, port_id).await?))
}

async fn update_port(
    State(engine): State<Engine>,
    path: PathParams<(String, PortId)>,
    body: JsonBody<UpdateServerPortParameter>,
) -> ApiResult<InterfacePort> {
    let Path((server_id, port_id)) = path?;
    let Json(params) = body?;
    Ok(Json(engine.update_port(&server_id, port_id, &params).await?))
}

async fn assign_network(
    State(engine): State<Engine>,
    path: PathParams<(String, PortId)>,
    body: JsonBody<AssignNetworkParameter>,
) -> ApiResult<InterfacePort> {
    let Path((server_id, port_id)) = path?;
    let Json(params) = body?;
    Ok(Json(
        engine.assign_network(&server_id, port_id, &params).await?,
    ))
}

async fn enable_port(
    State(engine): State<Engine>,
    path: PathParams<(String, PortId)>,
    body: JsonBody<EnableServerPortParameter>,
) -> ApiResult<InterfacePort> {
    let Path((server_id, port_id)) = path?;
    let Json(params) = body?;
    Ok(Json(engine.enable_port(&server_id, port_id, &params).await?))
}

async fn read_port_traffic(
    State(engine): State<Engine>,
    path: PathParams<(String, PortId)>,
    query: QueryParams<ReadServerTrafficByPortParams>,
) -> ApiResult<TrafficGraph> {
    let Path((server_id, port_id)) = path?;
    let Query(params) = query?;
    Ok(Json(
        engine
            .read_port_traffic(&server_id, port_id, &params)
            .await?,
    ))
}

async fn power_control(
    State(engine): State<Engine>,
    Path(server_id): Path<String>,
    body: JsonBody<PowerControlParameter>,
) -> Result<StatusCode, ApiError> {
    let Json(params) = body?;
    engine.power_control(&server_id, &params).await?;
    Ok(StatusCode::ACCEPTED)
}

async fn read_power_status(
    State(engine): State<Engine>,
    Path(server_id): Path<String>,
) -> ApiResult<ServerPowerStatus> {
    Ok(Json(engine.read_power_status(&server_id).await?))
}

async fn read_raid_status(
    State(engine): State<Engine>,
    Path(server_id): Path<String>,
    query: QueryParams<ReadRaidStatusParams>,
) -> ApiResult<RaidStatus> {
    let Query(params) = query?;
    Ok(Json(engine.read_raid_status(&server_id, &params).await?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ResourceKind;

    #[test]
    fn test_engine_error_status() {
        let cases = [
            (
                EngineError::not_found(ResourceKind::Server, "srv-9"),
                StatusCode::NOT_FOUND,
            ),
            (
                EngineError::conflict(ResourceKind::Server, "srv-1"),
                StatusCode::CONFLICT,
            ),
            (
                EngineError::invalid(ResourceKind::Port, 1, "invalid mode"),
                StatusCode::BAD_REQUEST,
            ),
        ];
        for (err, status) in cases {
            let err = ApiError::from(err);
            assert_eq!(err.status(), status);
            assert_eq!(err.into_response().status(), status);
        }
    }
}
