pub mod advice_service;
pub mod auth_service;
pub mod email_service;
pub mod gamification_service;
pub mod levels;
pub mod models;
pub mod otp;
pub mod password;
pub mod templates;
pub mod token;
pub mod transaction_service;

pub use advice_service::AdviceService;
pub use auth_service::AuthService;
pub use email_service::OtpMailer;
pub use gamification_service::GamificationService;
pub use token::TokenService;
pub use transaction_service::TransactionService;
