use crate::{
    message::{self, *},
    middleware::auth_middleware,
    state::AppState,
};
use axum::{
    middleware,
    routing::{get, patch},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    paths(
        message::message_handlers::list_conversations,
        message::message_handlers::start_conversation,
        message::message_handlers::get_messages,
        message::message_handlers::send_message,
        message::message_handlers::unread_count,
        message::message_handlers::mark_message_read,
    ),
    components(
        schemas(
            SendMessageRequest,
            StartConversationRequest,
            UnreadCountResponse,
            ConversationSummary,
            ConversationDetails,
            ParticipantProfile,
            ProductSnippet,
            LastMessage,
            MessageResponse,
            ThreadResponse,
        )
    ),
    tags(
        (name = "conversations", description = "Buyer/seller conversations"),
        (name = "messages", description = "Read state and unread counts")
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

struct SecurityAddon;

impl utoipa::Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                utoipa::openapi::security::SecurityScheme::Http(
                    utoipa::openapi::security::Http::new(
                        utoipa::openapi::security::HttpAuthScheme::Bearer,
                    ),
                ),
            )
        }
    }
}

pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let conversation_routes = Router::new()
        .route("/", get(list_conversations).post(start_conversation))
        .route("/:id/messages", get(get_messages).post(send_message))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    let message_routes = Router::new()
        .route("/unread-count", get(unread_count))
        .route("/:id/read", patch(mark_message_read))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    let api_routes = Router::new()
        .nest("/conversations", conversation_routes)
        .nest("/messages", message_routes);

    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .nest("/api", api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
