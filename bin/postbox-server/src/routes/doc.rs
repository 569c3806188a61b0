use crate::routes::{health, messages};
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(info(
    title = "postbox-server",
    description = "Message intake, processing status and live updates",
    version = "0.1.0"
))]
pub struct ApiDoc;

pub fn get_docs() -> utoipa::openapi::OpenApi {
    let mut root = ApiDoc::openapi();
    root.merge(health::HealthApi::openapi());
    root.merge(messages::MessagesApi::openapi());
    root
}
