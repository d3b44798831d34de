//! RPC Method Handlers
//!
//! Thin adapters from JSON-RPC params onto `ControlService`.

use crate::error::to_rpc_error;
use crate::types::{
    JobResponse, JobSummary, ListRequest, ListResponse, NameRequest, SetPriorityRequest,
    StatsRequest, StatsResponse,
};
use gantry_core::application::ControlService;
use gantry_core::domain::JobStatus;
use gantry_core::error::AppError;
use jsonrpsee::types::ErrorObjectOwned;
use std::sync::Arc;

type RpcResult<T> = Result<T, ErrorObjectOwned>;

/// RPC Handler with injected dependencies
pub struct RpcHandler {
    control: Arc<ControlService>,
    start_time: std::time::Instant,
}

impl RpcHandler {
    pub fn new(control: Arc<ControlService>) -> Self {
        Self {
            control,
            start_time: std::time::Instant::now(),
        }
    }

    /// queue.list.v1
    pub async fn list(&self, params: ListRequest) -> RpcResult<ListResponse> {
        let status = params
            .status
            .as_deref()
            .map(|s| s.to_ascii_lowercase().parse::<JobStatus>())
            .transpose()
            .map_err(|e| to_rpc_error(AppError::Domain(e)))?;

        let jobs = self.control.list_jobs(status).await.map_err(to_rpc_error)?;
        Ok(ListResponse {
            jobs: jobs.iter().map(JobSummary::from).collect(),
        })
    }

    /// queue.get.v1
    pub async fn get(&self, params: NameRequest) -> RpcResult<JobResponse> {
        let job = self.control.get_job(&params.name).await.map_err(to_rpc_error)?;
        Ok(JobResponse { job })
    }

    /// queue.set_priority.v1
    pub async fn set_priority(&self, params: SetPriorityRequest) -> RpcResult<JobResponse> {
        let job = self
            .control
            .set_priority(&params.name, params.priority)
            .await
            .map_err(to_rpc_error)?;
        Ok(JobResponse { job })
    }

    /// queue.god_mode.v1
    pub async fn god_mode(&self, params: NameRequest) -> RpcResult<JobResponse> {
        let job = self
            .control
            .god_mode(&params.name)
            .await
            .map_err(to_rpc_error)?;
        Ok(JobResponse { job })
    }

    /// queue.retry.v1
    pub async fn retry(&self, params: NameRequest) -> RpcResult<JobResponse> {
        let job = self
            .control
            .manual_retry(&params.name)
            .await
            .map_err(to_rpc_error)?;
        Ok(JobResponse { job })
    }

    /// admin.stats.v1
    pub async fn stats(&self, _params: StatsRequest) -> RpcResult<StatsResponse> {
        let counts = self.control.stats().await.map_err(to_rpc_error)?;
        Ok(StatsResponse::new(
            &counts,
            self.start_time.elapsed().as_secs(),
        ))
    }
}
