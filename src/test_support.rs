use std::sync::Arc;

use crate::{
    auth::{
        dto::{AuthResponse, CreateAdminRequest, LoginRequest, RegisterRequest},
        memory::MemoryUserStore,
        repo::User,
        services::{self, AdminGate},
    },
    mailer::recording::RecordingMailer,
    state::AppState,
};

/// App state wired to the in-memory store and a recording mailer.
pub struct Harness {
    pub state: AppState,
    pub users: Arc<MemoryUserStore>,
    pub mailer: Arc<RecordingMailer>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_mailer(RecordingMailer::default())
    }

    pub fn with_failing_mailer() -> Self {
        Self::build(RecordingMailer::failing())
    }

    pub fn with_mailer(mailer: RecordingMailer) -> Self {
        Self::build(mailer)
    }

    pub fn without_admin_secret() -> Self {
        let h = Self::new();
        let mut config = (*h.state.config).clone();
        config.admin_secret = None;
        let state = AppState::from_parts(
            Arc::new(config),
            h.users.clone(),
            h.mailer.clone(),
        );
        Self { state, ..h }
    }

    fn build(mailer: RecordingMailer) -> Self {
        let users = Arc::new(MemoryUserStore::default());
        let mailer = Arc::new(mailer);
        let state = AppState::fake(users.clone(), mailer.clone());
        Self {
            state,
            users,
            mailer,
        }
    }

    pub fn stored(&self, email: &str) -> User {
        self.users.snapshot(email).expect("user stored")
    }

    /// Registers, verifies through the mailed token and logs in.
    pub async fn register_verified(&self, email: &str, password: &str) -> AuthResponse {
        services::register(
            &self.state,
            RegisterRequest {
                email: email.into(),
                password: password.into(),
            },
        )
        .await
        .expect("register");
        let token = self.mailer.last_token_for(email).expect("verification mail");
        services::verify_email(&self.state, &token).await.expect("verify");
        services::login(
            &self.state,
            LoginRequest {
                email: email.into(),
                password: password.into(),
            },
        )
        .await
        .expect("login")
    }

    pub async fn create_admin(&self, email: &str) {
        services::create_admin(
            &self.state,
            CreateAdminRequest {
                email: email.into(),
                password: "AdminPass1!".into(),
                secret_key: "bootstrap-secret".into(),
            },
            AdminGate::SecretOnly,
        )
        .await
        .expect("create admin");
    }
}
