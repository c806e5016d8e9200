// src/services/mod.rs
pub mod brief;
pub mod content;
pub mod listening;
pub mod social;
pub mod user;

pub use brief::BriefService;
pub use content::ContentService;
pub use listening::ListeningService;
pub use social::{ScheduledPostService, SocialAccountService};
pub use user::UserService;
