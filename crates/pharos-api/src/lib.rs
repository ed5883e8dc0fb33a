//! pharos-api — REST API for the Pharos anchor.
//!
//! All routes live under the environment's base path (`/api/v1`, or
//! `/pharos-node/api/v1` behind a reverse proxy). Unknown paths answer
//! `404 unsupported url`, known paths with the wrong method `400 invalid
//! method`.
//!
//! # API Routes
//!
//! | Method | Path | Description |
//! |---|---|---|
//! | GET | `/ping` | Self check |
//! | GET | `/management/nodes` | List nodes |
//! | POST | `/management/nodes/register` | Create or refresh a node |
//! | GET, DELETE | `/management/nodes/{id}` | Get / unregister a node |
//! | POST | `/management/nodes/{id}/ping` | Node heartbeat |
//! | GET | `/management/nodes/{id}/apps` | Apps on a node |
//! | POST | `/management/nodes/{id}/apps/deploy` | Deploy an app |
//! | GET, POST, DELETE | `/management/nodes/{id}/apps/{appId}` | Info / update / undeploy |
//! | POST | `/management/nodes/{id}/apps/{appId}/{start,stop,update}` | Lifecycle command |
//! | GET | `/management/groups` | List groups |
//! | POST | `/management/groups/create` | Create a group |
//! | GET, DELETE | `/management/groups/{id}` | Get / delete a group |
//! | GET | `/management/groups/{id}/nodes` | Member nodes |
//! | POST | `/management/groups/{id}/join`, `/leave` | Membership |
//! | POST | `/management/groups/{id}/apps/deploy` | Deploy to every member |
//! | POST, DELETE | `/management/groups/{id}/apps/{appId}` | Update / undeploy on members |
//! | POST | `/management/groups/{id}/apps/{appId}/{start,stop,update}` | Lifecycle command on members |
//! | GET, POST | `/management/registries` | List / add registries |
//! | GET, DELETE | `/management/registries/{id}` | Get / delete a registry |
//! | POST | `/management/registries/events` | Registry push notification |
//! | GET | `/monitoring/nodes/{id}/resource[/performance]` | Node resource usage |
//! | GET | `/search/{nodes,groups,apps}` | Filtered queries |
//! | POST | `/notification` | Subscribe |
//! | DELETE | `/notification/{id}` | Unsubscribe |

pub mod codec;
pub mod error;
pub mod extract;
pub mod group_handlers;
pub mod handlers;
pub mod query_handlers;
pub mod registry_handlers;

use axum::Router;
use axum::routing::{delete, get, post};

use pharos_events::EventPropagator;
use pharos_inventory::Inventory;

pub use error::{ApiError, ApiResult, ErrorKind};

/// Shared state for API handlers.
#[derive(Clone)]
pub struct ApiState {
    pub inventory: Inventory,
    pub events: EventPropagator,
}

impl ApiState {
    pub fn new(inventory: Inventory) -> Self {
        let events = EventPropagator::new(inventory.clone());
        Self { inventory, events }
    }
}

/// Build the complete API router.
pub fn build_router(state: ApiState) -> Router {
    let base = state.inventory.environment().base_path();

    let management = Router::new()
        .route("/nodes", get(handlers::list_nodes))
        .route("/nodes/register", post(handlers::register_node))
        .route("/nodes/{id}", get(handlers::get_node).delete(handlers::unregister_node))
        .route("/nodes/{id}/ping", post(handlers::ping_node))
        .route("/nodes/{id}/apps", get(handlers::list_node_apps))
        .route("/nodes/{id}/apps/deploy", post(handlers::deploy_app))
        .route(
            "/nodes/{id}/apps/{app_id}",
            get(handlers::app_info)
                .post(handlers::update_app_info)
                .delete(handlers::undeploy_app),
        )
        .route("/nodes/{id}/apps/{app_id}/{command}", post(handlers::app_command))
        .route("/groups", get(group_handlers::list_groups))
        .route("/groups/create", post(group_handlers::create_group))
        .route("/groups/{id}", get(group_handlers::get_group).delete(group_handlers::delete_group))
        .route("/groups/{id}/nodes", get(group_handlers::group_nodes))
        .route("/groups/{id}/join", post(group_handlers::join_group))
        .route("/groups/{id}/leave", post(group_handlers::leave_group))
        .route("/groups/{id}/apps/deploy", post(group_handlers::deploy_app))
        .route(
            "/groups/{id}/apps/{app_id}",
            post(group_handlers::update_app_info).delete(group_handlers::undeploy_app),
        )
        .route("/groups/{id}/apps/{app_id}/{command}", post(group_handlers::app_command))
        .route(
            "/registries",
            get(registry_handlers::list_registries).post(registry_handlers::add_registry),
        )
        .route("/registries/events", post(registry_handlers::registry_events))
        .route(
            "/registries/{id}",
            get(registry_handlers::get_registry).delete(registry_handlers::delete_registry),
        );

    let api_routes = Router::new()
        .route("/ping", get(handlers::ping))
        .nest("/management", management)
        .route("/monitoring/nodes/{id}/resource", get(handlers::node_resource))
        .route(
            "/monitoring/nodes/{id}/resource/performance",
            get(handlers::node_performance),
        )
        .route("/search/nodes", get(query_handlers::search_nodes))
        .route("/search/groups", get(query_handlers::search_groups))
        .route("/search/apps", get(query_handlers::search_apps))
        .route("/notification", post(query_handlers::subscribe))
        .route("/notification/{id}", delete(query_handlers::unsubscribe))
        .method_not_allowed_fallback(handlers::invalid_method)
        .fallback(handlers::unsupported_url)
        .with_state(state);

    Router::new()
        .nest(base, api_routes)
        .fallback(handlers::unsupported_url)
}
