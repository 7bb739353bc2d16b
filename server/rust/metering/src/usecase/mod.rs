pub mod consume_usage;
pub mod get_usage;
pub mod issue_admin_token;

pub use consume_usage::ConsumeUsageUseCase;
pub use get_usage::GetUsageUseCase;
pub use issue_admin_token::IssueAdminTokenUseCase;
