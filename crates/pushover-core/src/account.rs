// ── Account API seam ──
//
// The realtime loop only needs two request/response calls: list pending
// messages and acknowledge them. Abstracting those behind a trait lets
// the connection run against the real `AccountClient` or any substitute.

use std::future::Future;

use secrecy::SecretString;

use pushover_api::{AccountClient, Error, Message};

/// Message retrieval calls used by the fetch cycle.
pub trait AccountApi: Send + Sync {
    /// Pending messages for the device, ascending by id.
    fn list_messages(
        &self,
        secret: &SecretString,
        device_id: &str,
    ) -> impl Future<Output = Result<Vec<Message>, Error>> + Send;

    /// Discard every message up to and including `highest_id`.
    fn acknowledge(
        &self,
        secret: &SecretString,
        device_id: &str,
        highest_id: u64,
    ) -> impl Future<Output = Result<(), Error>> + Send;
}

impl AccountApi for AccountClient {
    async fn list_messages(
        &self,
        secret: &SecretString,
        device_id: &str,
    ) -> Result<Vec<Message>, Error> {
        AccountClient::list_messages(self, secret, device_id).await
    }

    async fn acknowledge(
        &self,
        secret: &SecretString,
        device_id: &str,
        highest_id: u64,
    ) -> Result<(), Error> {
        AccountClient::acknowledge(self, secret, device_id, highest_id).await
    }
}
