use async_trait::async_trait;
use leadflow_client::{ApiClient, ApiResult};
use leadflow_core::{Lead, LeadDraft, LeadFilters, LeadId, LeadPatch, LeadStatus, PipelineStats};

/// The slice of the backend the store talks to. `ApiClient` is the real one;
/// tests script their own.
#[async_trait]
pub trait LeadApi: Send + Sync {
    async fn list_leads(&self, filters: &LeadFilters) -> ApiResult<Vec<Lead>>;
    async fn get_lead(&self, id: LeadId) -> ApiResult<Lead>;
    async fn create_lead(&self, draft: &LeadDraft) -> ApiResult<Lead>;
    async fn update_lead(&self, id: LeadId, patch: &LeadPatch) -> ApiResult<Lead>;
    async fn update_lead_status(&self, id: LeadId, status: LeadStatus) -> ApiResult<()>;
    async fn delete_lead(&self, id: LeadId) -> ApiResult<()>;
    async fn lead_stats(&self) -> ApiResult<PipelineStats>;
    async fn requalify_lead(&self, id: LeadId) -> ApiResult<Lead>;
}

#[async_trait]
impl LeadApi for ApiClient {
    async fn list_leads(&self, filters: &LeadFilters) -> ApiResult<Vec<Lead>> {
        ApiClient::list_leads(self, filters).await
    }

    async fn get_lead(&self, id: LeadId) -> ApiResult<Lead> {
        ApiClient::get_lead(self, id).await
    }

    async fn create_lead(&self, draft: &LeadDraft) -> ApiResult<Lead> {
        ApiClient::create_lead(self, draft).await
    }

    async fn update_lead(&self, id: LeadId, patch: &LeadPatch) -> ApiResult<Lead> {
        ApiClient::update_lead(self, id, patch).await
    }

    async fn update_lead_status(&self, id: LeadId, status: LeadStatus) -> ApiResult<()> {
        ApiClient::update_lead_status(self, id, status).await
    }

    async fn delete_lead(&self, id: LeadId) -> ApiResult<()> {
        ApiClient::delete_lead(self, id).await
    }

    async fn lead_stats(&self) -> ApiResult<PipelineStats> {
        ApiClient::lead_stats(self).await
    }

    async fn requalify_lead(&self, id: LeadId) -> ApiResult<Lead> {
        ApiClient::requalify_lead(self, id).await
    }
}
