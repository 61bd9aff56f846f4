mod auth;
mod error;
mod http;
mod messages;
mod projects;

pub use auth::AuthSession;
pub use error::ServiceError;
pub use http::{
    ChatReply, ClientConfig, GroupsResponse, HttpClient, RemoteMessage, RemoteProject,
    TokenResponse, UploadFile,
};
pub use messages::MessageService;
pub use projects::{NewDocument, ProjectService};
