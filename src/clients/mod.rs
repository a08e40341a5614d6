pub mod job_api;
pub mod qas_client;

pub use job_api::JobApi;
pub use qas_client::QasClient;
