use std::net::SocketAddr;
use std::sync::Arc;

use tracing::info;
use tracing_subscriber::EnvFilter;

use finance_advisor_backend::config::Config;
use finance_advisor_backend::domain::advice_service::GeminiClient;
use finance_advisor_backend::domain::email_service::OtpMailer;
use finance_advisor_backend::domain::otp::RedisOtpStore;
use finance_advisor_backend::domain::{
    AdviceService, AuthService, GamificationService, TokenService, TransactionService,
};
use finance_advisor_backend::rest::{app_router, AppState};
use finance_advisor_backend::storage::{
    DbConnection, GamificationRepository, TransactionRepository, UserRepository,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = Config::load();

    info!("setting up database at {}", config.database_url);
    let db = DbConnection::new(&config.database_url).await?;

    info!("connecting to OTP cache at {}", config.redis_url);
    let otp_store = Arc::new(RedisOtpStore::connect(&config.redis_url).await?);

    let mailer = OtpMailer::new(config.email.clone())?;
    let token_service = TokenService::new(&config.jwt_secret, config.jwt_expiry_seconds as i64)?;
    let generator = Arc::new(GeminiClient::new(
        config.gemini_api_key.clone(),
        config.gemini_model.clone(),
    )?);

    let gamification_service = GamificationService::new(
        GamificationRepository::new(db.clone()),
        TransactionRepository::new(db.clone()),
    );
    let state = AppState {
        auth_service: AuthService::new(
            UserRepository::new(db.clone()),
            otp_store,
            mailer,
            token_service.clone(),
        ),
        transaction_service: TransactionService::new(
            TransactionRepository::new(db.clone()),
            gamification_service.clone(),
        ),
        gamification_service,
        advice_service: AdviceService::new(TransactionRepository::new(db), generator),
        token_service,
    };

    let app = app_router(state, &config.frontend_origin)?;

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    info!("listening on {addr}");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
