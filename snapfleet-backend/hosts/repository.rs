use anyhow::Result;
use async_trait::async_trait;

use super::Host;

#[async_trait]
pub trait HostRepository: Send + Sync {
    async fn list(&self) -> Vec<Host>;
    async fn get(&self, id: &str) -> Option<Host>;
    async fn save(&self, host: Host) -> Result<()>;
    async fn delete(&self, id: &str) -> Result<bool>;
    async fn load_all(&self) -> Result<()>;
}
