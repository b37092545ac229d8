//! Dependency checks behind the health endpoints

use std::sync::Arc;
use std::time::Instant;

use mc_common::{HealthCheck, HealthReport};

use crate::repository::ConnectionRepository;
use crate::service::connection::ConnectionService;
use crate::service::identity::IdentityService;

pub struct HealthService {
    connections: Arc<ConnectionService>,
    identity: Arc<IdentityService>,
}

impl HealthService {
    pub fn new(connections: Arc<ConnectionService>, identity: Arc<IdentityService>) -> Self {
        Self { connections, identity }
    }

    pub async fn check_database(&self) -> HealthCheck {
        check_repository(self.connections.repository().as_ref()).await
    }

    /// Readiness only depends on the connection store
    pub async fn readiness(&self) -> HealthReport {
        HealthReport::from_checks(vec![self.check_database().await])
    }

    /// IdP and connection store, checked concurrently
    pub async fn auth(&self) -> HealthReport {
        let (idp, database) = tokio::join!(self.identity.check_jwks(), self.check_database());
        HealthReport::from_checks(vec![idp, database])
    }

    /// Ping Mailchimp with the user's stored connection
    pub async fn mailchimp(&self, user_id: &str) -> HealthReport {
        let started = Instant::now();
        let result = self.connections.validate(user_id).await;
        let latency_ms = started.elapsed().as_millis() as u64;

        let check = match result {
            Ok(response) => HealthCheck::healthy("mailchimp", latency_ms)
                .with_message(response.data.health_status),
            Err(e) => HealthCheck::unhealthy("mailchimp", latency_ms, e.public_message()),
        };
        HealthReport::from_checks(vec![check])
    }
}

async fn check_repository(repo: &dyn ConnectionRepository) -> HealthCheck {
    let started = Instant::now();
    let result = repo.ping().await;
    let latency_ms = started.elapsed().as_millis() as u64;
    match result {
        Ok(()) => HealthCheck::healthy("connection_store", latency_ms),
        Err(e) => HealthCheck::unhealthy("connection_store", latency_ms, e.to_string()),
    }
}
