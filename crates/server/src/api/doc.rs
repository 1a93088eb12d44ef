//! OpenAPI document for the control API, served through Scalar at `/docs`.

use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "herald API",
        version = "0.1.0",
        description = "Batch delivery of pending messages to a webhook endpoint.",
    ),
    tags(
        (name = "Health", description = "Service and dependency health"),
        (name = "Scheduler", description = "Start and stop the delivery loop"),
        (name = "Messages", description = "Paged listings of sent and failed messages"),
    ),
    paths(
        crate::api::health::health,
        crate::api::scheduler::scheduler_start,
        crate::api::scheduler::scheduler_stop,
        crate::api::messages::sent_messages,
        crate::api::messages::failed_messages,
    ),
    components(schemas(
        crate::api::ErrorResponse,
        crate::api::health::HealthResponse,
        crate::api::scheduler::SchedulerActionResponse,
        crate::api::messages::Pagination,
        crate::api::messages::MessagePage,
    ))
)]
pub struct ApiDoc;
